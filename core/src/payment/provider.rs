// core/src/payment/provider.rs

use crate::error::Result;
use crate::models::{BillingInfo, PaymentReference};
use crate::money::Money;
use crate::services::LineItem;
use async_trait::async_trait;

/// What the provider needs to take a payment.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRequest {
  /// Client-side reference for this attempt; echoed back by some providers.
  pub order_ref: String,
  pub amount: Money,
  pub customer_email: String,
  pub billing: BillingInfo,
  pub line_items: Vec<LineItem>,
}

/// What the host renders once the provider is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderSurface {
  /// A hidden form the host auto-submits into the named frame, carrying the token.
  HostedForm {
    action_url: String,
    token: String,
    target_frame: String,
  },
  /// The card element is already mounted; a charge has been submitted.
  CardElement { container_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionSignal {
  Approved(PaymentReference),
  Declined { reason: String },
  Cancelled { reason: String },
  TimedOut,
}

impl CompletionSignal {
  pub fn transaction_id(&self) -> Option<&str> {
    match self {
      CompletionSignal::Approved(reference) => Some(&reference.transaction_id),
      _ => None,
    }
  }
}

/// A card-capture surface: request a credential, show the UI, wait for the outcome.
///
/// Implementations must make `await_completion` cancel-safe; dropping its future leaves the
/// provider ready for another wait.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
  fn name(&self) -> &'static str;

  /// Resolves once the provider can accept a payment.
  async fn initialize(&self) -> Result<()>;

  async fn request_token(&self, request: &PaymentRequest) -> Result<String>;

  async fn activate_ui(&self, token: &str) -> Result<ProviderSurface>;

  async fn await_completion(&self) -> Result<CompletionSignal>;

  /// Tears the surface down. Idempotent.
  async fn cancel(&self);
}
