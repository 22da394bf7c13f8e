// core/src/payment/hosted_form.rs

//! Hosted payment form rendered in a frame. The token is posted into the frame; the outcome comes
//! back as a cross-window message relayed by the host.

use super::messages::{interpret, FrameMessage, MessageDisposition, OriginAllowList};
use super::provider::{CompletionSignal, PaymentProvider, PaymentRequest, ProviderSurface};
use crate::config::CheckoutConfig;
use crate::error::{CheckoutError, Result};
use crate::services::{PaymentService, TokenRequest};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

pub const PAYMENT_FRAME: &str = "paymentIframe";

pub struct HostedFormProvider {
  service: Arc<dyn PaymentService>,
  allow_list: OriginAllowList,
  timeout: Duration,
  sender: mpsc::UnboundedSender<FrameMessage>,
  receiver: tokio::sync::Mutex<mpsc::UnboundedReceiver<FrameMessage>>,
  form_url: Mutex<Option<String>>,
}

impl HostedFormProvider {
  pub fn new(service: Arc<dyn PaymentService>, config: &CheckoutConfig) -> Self {
    let (sender, receiver) = mpsc::unbounded_channel();
    Self {
      service,
      allow_list: OriginAllowList::new(&config.allowed_message_origins),
      timeout: config.hosted_form_timeout,
      sender,
      receiver: tokio::sync::Mutex::new(receiver),
      form_url: Mutex::new(None),
    }
  }

  /// The host's message listener forwards every window message here.
  pub fn message_sender(&self) -> mpsc::UnboundedSender<FrameMessage> {
    self.sender.clone()
  }

  pub fn post_message(&self, message: FrameMessage) {
    if self.sender.send(message).is_err() {
      debug!("Payment form listener is gone; message dropped.");
    }
  }

  /// Drops everything queued by an earlier attempt so a new form only hears its own result.
  async fn discard_queued(&self) {
    let mut receiver = self.receiver.lock().await;
    let mut dropped = 0usize;
    while receiver.try_recv().is_ok() {
      dropped += 1;
    }
    if dropped > 0 {
      debug!(dropped, "Discarded payment form messages from an earlier attempt.");
    }
  }
}

#[async_trait]
impl PaymentProvider for HostedFormProvider {
  fn name(&self) -> &'static str {
    "hosted_form"
  }

  async fn initialize(&self) -> Result<()> {
    Ok(())
  }

  #[instrument(skip_all, fields(order_ref = %request.order_ref, amount = %request.amount))]
  async fn request_token(&self, request: &PaymentRequest) -> Result<String> {
    let hosted = self
      .service
      .generate_token(&TokenRequest {
        amount: request.amount,
        order_id: request.order_ref.clone(),
        customer_email: request.customer_email.clone(),
        billing_address: request.billing.clone(),
        line_items: request.line_items.clone(),
      })
      .await?;
    *self.form_url.lock() = Some(hosted.payment_form_url);
    info!("Hosted payment token issued.");
    Ok(hosted.token)
  }

  async fn activate_ui(&self, token: &str) -> Result<ProviderSurface> {
    let action_url = self
      .form_url
      .lock()
      .clone()
      .ok_or_else(|| CheckoutError::payment("Payment form is not ready. Please try again."))?;
    self.discard_queued().await;
    Ok(ProviderSurface::HostedForm {
      action_url,
      token: token.to_string(),
      target_frame: PAYMENT_FRAME.to_string(),
    })
  }

  /// Waits for the first trusted outcome message, ignoring everything else, until the form
  /// timeout elapses.
  async fn await_completion(&self) -> Result<CompletionSignal> {
    let mut receiver = self.receiver.lock().await;
    let deadline = Instant::now() + self.timeout;
    loop {
      let message = match tokio::time::timeout_at(deadline, receiver.recv()).await {
        Err(_) => {
          warn!(timeout_secs = self.timeout.as_secs(), "Hosted payment form timed out.");
          return Ok(CompletionSignal::TimedOut);
        }
        Ok(None) => return Err(CheckoutError::payment("Payment form closed unexpectedly.")),
        Ok(Some(message)) => message,
      };
      match interpret(&message, &self.allow_list) {
        MessageDisposition::Completion(response) => return Ok(response.into_signal(self.name())),
        MessageDisposition::Cancelled => {
          return Ok(CompletionSignal::Cancelled {
            reason: "Payment was cancelled.".to_string(),
          })
        }
        MessageDisposition::Informational(kind) => debug!(%kind, "Payment form message."),
        MessageDisposition::UntrustedOrigin(_) | MessageDisposition::Unrecognized => {}
      }
    }
  }

  async fn cancel(&self) {
    self.form_url.lock().take();
    self.discard_queued().await;
  }
}
