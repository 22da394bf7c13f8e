// core/src/payment/orchestrator.rs

use super::form::CheckoutForm;
use super::guard::IdempotencyGuard;
use super::provider::{CompletionSignal, PaymentProvider, PaymentRequest, ProviderSurface};
use crate::account::{AccountResolver, AuthState};
use crate::error::{CheckoutError, Result};
use crate::finalize::{FinalizedOrder, OrderFinalizer};
use crate::models::{AddOnOrderItem, CouponState, OrderItem, PaymentReference, PendingOrder};
use crate::pricing::CartTotals;
use crate::services::LineItem;
use crate::storage::{load_json, save_json, ClientStore, PENDING_ORDER_KEY};
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub const TIMED_OUT_MESSAGE: &str = "The payment form timed out. Please try again.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentPhase {
  Idle,
  FormValidated,
  TokenRequested,
  TokenReady,
  ProviderUiActive,
  AwaitingCompletion,
  Approved,
  Declined { reason: String },
  Cancelled { reason: String },
  TimedOut,
}

/// Everything the checkout page hands over when the customer presses pay.
#[derive(Debug, Clone)]
pub struct CheckoutSubmission {
  pub form: CheckoutForm,
  pub auth: AuthState,
  pub session_id: Option<String>,
  pub items: Vec<OrderItem>,
  pub add_ons: Vec<AddOnOrderItem>,
  pub totals: CartTotals,
  pub coupon: Option<CouponState>,
  pub loyalty_tokens: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PaymentOutcome {
  Completed(FinalizedOrder),
  /// The card UI stays up for another attempt.
  Declined { reason: String },
  Cancelled { reason: String },
  TimedOut { message: String },
  /// A completion signal for a transaction that was already handled.
  Duplicate { transaction_id: String },
}

struct SubmitGate<'a>(&'a AtomicBool);

impl Drop for SubmitGate<'_> {
  fn drop(&mut self) {
    self.0.store(false, Ordering::SeqCst);
  }
}

/// Drives one checkout's payment: validate, resolve the account, get a credential, show the
/// provider UI, then hand exactly one approved transaction to the finalizer.
pub struct PaymentOrchestrator {
  provider: Arc<dyn PaymentProvider>,
  accounts: Arc<AccountResolver>,
  finalizer: Arc<OrderFinalizer>,
  guard: Arc<IdempotencyGuard>,
  store: Arc<dyn ClientStore>,
  phase: Mutex<PaymentPhase>,
  surface: Mutex<Option<ProviderSurface>>,
  pending: Mutex<Option<PendingOrder>>,
  submitting: AtomicBool,
  processing: AtomicBool,
}

impl PaymentOrchestrator {
  pub fn new(
    provider: Arc<dyn PaymentProvider>,
    accounts: Arc<AccountResolver>,
    finalizer: Arc<OrderFinalizer>,
    guard: Arc<IdempotencyGuard>,
    store: Arc<dyn ClientStore>,
  ) -> Self {
    Self {
      provider,
      accounts,
      finalizer,
      guard,
      store,
      phase: Mutex::new(PaymentPhase::Idle),
      surface: Mutex::new(None),
      pending: Mutex::new(None),
      submitting: AtomicBool::new(false),
      processing: AtomicBool::new(false),
    }
  }

  pub fn phase(&self) -> PaymentPhase {
    self.phase.lock().clone()
  }

  pub fn surface(&self) -> Option<ProviderSurface> {
    self.surface.lock().clone()
  }

  /// True while an approved payment is being turned into an order.
  pub fn is_processing(&self) -> bool {
    self.processing.load(Ordering::SeqCst)
  }

  pub fn guard(&self) -> &Arc<IdempotencyGuard> {
    &self.guard
  }

  fn set_phase(&self, phase: PaymentPhase) {
    *self.phase.lock() = phase;
  }

  /// Submits the checkout. The account is settled before any payment credential is requested;
  /// the order snapshot is stored the moment the credential is issued.
  #[instrument(skip_all, fields(total = %submission.totals.total, provider = self.provider.name()))]
  pub async fn submit(&self, submission: CheckoutSubmission) -> Result<PaymentOutcome> {
    if self.submitting.swap(true, Ordering::SeqCst) {
      return Err(CheckoutError::validation("Your payment is already being processed."));
    }
    let _gate = SubmitGate(&self.submitting);

    let authenticated = submission.auth.user().is_some();
    submission.form.validate(authenticated)?;
    if !submission.totals.total.is_positive() {
      return Err(CheckoutError::validation("Your order total must be greater than zero."));
    }
    if submission.items.is_empty() {
      return Err(CheckoutError::validation("Your cart is empty."));
    }
    self.set_phase(PaymentPhase::FormValidated);

    let credentials = (!authenticated).then(|| submission.form.credentials());
    let resolved = self
      .accounts
      .resolve(&submission.auth, credentials.as_ref(), &submission.form.profile())
      .await?;

    let customer_email = resolved.user.email.clone();
    let mut billing = submission.form.billing.clone();
    billing.email = customer_email.clone();
    let request = PaymentRequest {
      order_ref: format!("order_{}", Uuid::new_v4().simple()),
      amount: submission.totals.total,
      customer_email: customer_email.clone(),
      billing: billing.clone(),
      line_items: line_items(&submission.items, &submission.add_ons),
    };

    self.set_phase(PaymentPhase::TokenRequested);
    let token = match self.request_token(&request).await {
      Ok(token) => token,
      Err(e) => {
        self.set_phase(PaymentPhase::FormValidated);
        return Err(e);
      }
    };
    self.set_phase(PaymentPhase::TokenReady);

    let pending = PendingOrder {
      session_id: submission.session_id,
      items: submission.items,
      add_ons: submission.add_ons,
      totals: submission.totals,
      billing,
      customer_email,
      music_genre: submission.form.music_genre.clone(),
      coupon: submission.coupon,
      loyalty_tokens_spent: submission.loyalty_tokens,
      loyalty_discount: submission.totals.loyalty_discount,
      user_id: Some(resolved.user.id),
      payment_token: token.clone(),
      created_at: Utc::now(),
    };
    save_json(self.store.as_ref(), PENDING_ORDER_KEY, &pending)?;
    *self.pending.lock() = Some(pending);

    let surface = match self.provider.activate_ui(&token).await {
      Ok(surface) => surface,
      Err(e) => {
        self.set_phase(PaymentPhase::FormValidated);
        return Err(e);
      }
    };
    *self.surface.lock() = Some(surface);
    self.set_phase(PaymentPhase::ProviderUiActive);

    self.await_outcome().await
  }

  async fn request_token(&self, request: &PaymentRequest) -> Result<String> {
    self.provider.initialize().await?;
    self.provider.request_token(request).await
  }

  /// Waits for the provider's next signal and handles it. Also used after a decline, when the
  /// card UI stays up for another attempt.
  pub async fn await_outcome(&self) -> Result<PaymentOutcome> {
    self.set_phase(PaymentPhase::AwaitingCompletion);
    let signal = match self.provider.await_completion().await {
      Ok(signal) => signal,
      Err(e) => {
        self.set_phase(PaymentPhase::FormValidated);
        return Err(e);
      }
    };
    self.handle_completion(signal).await
  }

  /// Handles one completion signal. Approved signals go through the idempotency guard, so a
  /// duplicate is a no-op.
  #[instrument(skip_all, fields(trans_id = signal.transaction_id().unwrap_or("-")))]
  pub async fn handle_completion(&self, signal: CompletionSignal) -> Result<PaymentOutcome> {
    match signal {
      CompletionSignal::Approved(reference) => self.finalize(reference).await,
      CompletionSignal::Declined { reason } => {
        info!(%reason, "Payment declined.");
        self.set_phase(PaymentPhase::Declined { reason: reason.clone() });
        self.set_phase(PaymentPhase::FormValidated);
        Ok(PaymentOutcome::Declined { reason })
      }
      CompletionSignal::Cancelled { reason } => {
        info!(%reason, "Payment cancelled.");
        self.set_phase(PaymentPhase::Cancelled { reason: reason.clone() });
        self.set_phase(PaymentPhase::FormValidated);
        Ok(PaymentOutcome::Cancelled { reason })
      }
      CompletionSignal::TimedOut => {
        self.set_phase(PaymentPhase::TimedOut);
        self.provider.cancel().await;
        self.surface.lock().take();
        Ok(PaymentOutcome::TimedOut {
          message: TIMED_OUT_MESSAGE.to_string(),
        })
      }
    }
  }

  async fn finalize(&self, reference: PaymentReference) -> Result<PaymentOutcome> {
    let transaction_id = reference.transaction_id.clone();
    let _permit = match self.guard.try_acquire(&transaction_id) {
      Ok(permit) => permit,
      Err(rejection) => {
        info!(?rejection, "Ignoring completion signal.");
        return Ok(PaymentOutcome::Duplicate { transaction_id });
      }
    };

    self.set_phase(PaymentPhase::Approved);
    self.processing.store(true, Ordering::SeqCst);

    let pending = self
      .pending
      .lock()
      .take()
      .or_else(|| load_json::<PendingOrder>(self.store.as_ref(), PENDING_ORDER_KEY));
    let result = match pending {
      Some(pending) => self.finalizer.finalize(pending, reference, None).await,
      None => {
        warn!(%transaction_id, "Approved payment has no pending order snapshot.");
        Err(self.finalizer.fail(
          &transaction_id,
          CheckoutError::Reconciliation {
            transaction_id: transaction_id.clone(),
            message: "pending order snapshot missing".to_string(),
          },
        ))
      }
    };

    self.processing.store(false, Ordering::SeqCst);
    self.surface.lock().take();
    result.map(PaymentOutcome::Completed)
  }

  /// Closes the provider UI and returns to the form.
  pub async fn cancel(&self) {
    self.provider.cancel().await;
    self.surface.lock().take();
    self.set_phase(PaymentPhase::Idle);
  }
}

fn line_items(items: &[OrderItem], add_ons: &[AddOnOrderItem]) -> Vec<LineItem> {
  items
    .iter()
    .enumerate()
    .map(|(index, item)| LineItem {
      id: format!("{}-{}", item.package.id, index),
      name: format!("{} - {}", item.package.name, item.track.title),
      quantity: 1,
      unit_price: item.discounted_price,
    })
    .chain(add_ons.iter().map(|a| LineItem {
      id: a.id.clone(),
      name: a.name.clone(),
      quantity: 1,
      unit_price: a.price,
    }))
    .collect()
}
