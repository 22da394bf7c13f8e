// core/src/payment/embedded_card.rs

//! Card element embedded in the page by a third-party SDK. The SDK is loaded asynchronously, so
//! initialization polls for it before attaching.

use super::provider::{CompletionSignal, PaymentProvider, PaymentRequest, ProviderSurface};
use crate::config::CheckoutConfig;
use crate::error::{CheckoutError, Result};
use crate::models::{BillingInfo, PaymentReference};
use crate::services::{ChargeOutcome, ChargeRequest, PaymentService};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, instrument, warn};

pub const CARD_CONTAINER: &str = "card-container";
pub const CHARGE_UNCONFIRMED_MESSAGE: &str =
  "We could not confirm whether your card was charged. Please contact support before trying again.";

/// The in-page card SDK.
#[async_trait]
pub trait CardSdk: Send + Sync {
  fn is_loaded(&self) -> bool;
  async fn attach(&self, container_id: &str) -> Result<()>;
  /// Exchanges the entered card for a single-use nonce.
  async fn tokenize(&self, billing: &BillingInfo) -> Result<String>;
  async fn detach(&self);
}

pub struct EmbeddedCardProvider {
  sdk: Arc<dyn CardSdk>,
  service: Arc<dyn PaymentService>,
  ready_timeout: Duration,
  poll_interval: Duration,
  attached: AtomicBool,
  pending: Mutex<Option<PaymentRequest>>,
  charge: Mutex<Option<JoinHandle<()>>>,
  outcome_tx: mpsc::UnboundedSender<Result<CompletionSignal>>,
  outcome_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Result<CompletionSignal>>>,
}

impl EmbeddedCardProvider {
  pub fn new(sdk: Arc<dyn CardSdk>, service: Arc<dyn PaymentService>, config: &CheckoutConfig) -> Self {
    let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
    Self {
      sdk,
      service,
      ready_timeout: config.sdk_ready_timeout,
      poll_interval: config.sdk_poll_interval,
      attached: AtomicBool::new(false),
      pending: Mutex::new(None),
      charge: Mutex::new(None),
      outcome_tx,
      outcome_rx: tokio::sync::Mutex::new(outcome_rx),
    }
  }

  async fn wait_for_sdk(&self) -> Result<()> {
    let deadline = Instant::now() + self.ready_timeout;
    while !self.sdk.is_loaded() {
      if Instant::now() >= deadline {
        warn!(timeout_ms = self.ready_timeout.as_millis() as u64, "Card SDK never became available.");
        return Err(CheckoutError::payment(
          "The payment form failed to load. Please refresh the page and try again.",
        ));
      }
      tokio::time::sleep(self.poll_interval).await;
    }
    Ok(())
  }
}

fn charge_signal(outcome: ChargeOutcome, provider: &str) -> CompletionSignal {
  match (outcome.success, outcome.transaction_id) {
    (true, Some(transaction_id)) => CompletionSignal::Approved(PaymentReference {
      transaction_id,
      authorization: outcome.authorization,
      account_number: outcome.card_last4.map(|last4| format!("XXXX{}", last4)),
      account_type: outcome.card_brand,
      provider: provider.to_string(),
    }),
    _ => CompletionSignal::Declined {
      reason: outcome
        .error
        .unwrap_or_else(|| "Your payment was declined. Please try another card.".to_string()),
    },
  }
}

#[async_trait]
impl PaymentProvider for EmbeddedCardProvider {
  fn name(&self) -> &'static str {
    "embedded_card"
  }

  #[instrument(skip(self))]
  async fn initialize(&self) -> Result<()> {
    self.wait_for_sdk().await?;
    if !self.attached.swap(true, Ordering::SeqCst) {
      if let Err(e) = self.sdk.attach(CARD_CONTAINER).await {
        self.attached.store(false, Ordering::SeqCst);
        return Err(e);
      }
      info!("Card element attached.");
    }
    Ok(())
  }

  async fn request_token(&self, request: &PaymentRequest) -> Result<String> {
    if !self.attached.load(Ordering::SeqCst) {
      return Err(CheckoutError::payment("The payment form is still loading. Please wait a moment."));
    }
    let nonce = self.sdk.tokenize(&request.billing).await?;
    *self.pending.lock() = Some(request.clone());
    Ok(nonce)
  }

  /// Submits the charge in the background; the result arrives through `await_completion`.
  async fn activate_ui(&self, token: &str) -> Result<ProviderSurface> {
    let request = self
      .pending
      .lock()
      .take()
      .ok_or_else(|| CheckoutError::payment("No card details to submit. Please try again."))?;
    let charge = ChargeRequest {
      source_id: token.to_string(),
      amount: request.amount,
      order_id: request.order_ref,
      customer_email: request.customer_email,
      billing_address: request.billing,
    };
    let service = self.service.clone();
    let tx = self.outcome_tx.clone();
    let provider = self.name();
    let handle = tokio::spawn(async move {
      let result = match service.charge(&charge).await {
        Ok(outcome) => Ok(charge_signal(outcome, provider)),
        Err(e) => {
          // The request may have reached the processor before the failure.
          warn!(order_ref = %charge.order_id, error = %e, "Charge request failed; outcome unknown.");
          Err(CheckoutError::payment(CHARGE_UNCONFIRMED_MESSAGE))
        }
      };
      let _ = tx.send(result);
    });
    if let Some(previous) = self.charge.lock().replace(handle) {
      previous.abort();
    }
    Ok(ProviderSurface::CardElement {
      container_id: CARD_CONTAINER.to_string(),
    })
  }

  async fn await_completion(&self) -> Result<CompletionSignal> {
    self
      .outcome_rx
      .lock()
      .await
      .recv()
      .await
      .ok_or_else(|| CheckoutError::payment("The payment form closed unexpectedly."))?
  }

  async fn cancel(&self) {
    if let Some(handle) = self.charge.lock().take() {
      handle.abort();
    }
    self.pending.lock().take();
    if self.attached.swap(false, Ordering::SeqCst) {
      self.sdk.detach().await;
    }
  }
}
