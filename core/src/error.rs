// core/src/error.rs
use anyhow::Error as AnyhowError;
use std::time::Duration;
use thiserror::Error;

/// Failures raised by the step pipeline itself rather than by a step's business logic.
#[derive(Debug, Error)]
pub enum PipelineError {
  #[error("Step not found: {step_name}")]
  StepNotFound { step_name: String },

  #[error("Handler missing for non-optional step: {step_name}")]
  HandlerMissing { step_name: String },

  #[error("Error in step handler. Source: {source}")]
  HandlerError {
    #[source]
    source: AnyhowError,
  },

  #[error("Internal pipeline error: {0}")]
  Internal(String),
}

impl From<AnyhowError> for PipelineError {
  fn from(err: AnyhowError) -> Self {
    PipelineError::HandlerError { source: err }
  }
}

/// Why a checkout session could not be used as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionFailure {
  /// The session already produced an order. Terminal; the host redirects to the dashboard.
  AlreadyUsed { redirect_after: Duration },
  /// Expired or unknown, and the single recovery attempt failed.
  Expired { redirect_after: Duration },
  /// The session service answered with something we could not interpret.
  Invalid(String),
}

impl std::fmt::Display for SessionFailure {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      SessionFailure::AlreadyUsed { .. } => {
        write!(f, "This checkout has already been completed. Redirecting to your dashboard...")
      }
      SessionFailure::Expired { .. } => {
        write!(f, "Your checkout session has expired. Redirecting you to select your song again...")
      }
      SessionFailure::Invalid(m) => write!(f, "Invalid checkout session: {}", m),
    }
  }
}

/// The checkout error taxonomy. Every network or provider failure is converted into one of these
/// at the call site.
#[derive(Debug, Error)]
pub enum CheckoutError {
  /// Missing/invalid form input, rejected coupon, bad email format. Recovered locally.
  #[error("Validation Error: {message}")]
  Validation { field: Option<String>, message: String },

  #[error("Session Error: {0}")]
  Session(SessionFailure),

  /// Declined, cancelled or provider-load timeout. No charge is assumed to have occurred.
  #[error("Payment Error: {reason}")]
  Payment { reason: String },

  /// The payment succeeded but the order could not be recorded.
  #[error("Reconciliation Error (transaction {transaction_id}): {message}")]
  Reconciliation { transaction_id: String, message: String },

  #[error("Service Error: {0}")]
  Service(String),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Checkout Workflow Error: {source}")]
  Workflow {
    #[from]
    source: PipelineError,
  },
}

impl CheckoutError {
  pub fn validation(message: impl Into<String>) -> Self {
    CheckoutError::Validation {
      field: None,
      message: message.into(),
    }
  }

  pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
    CheckoutError::Validation {
      field: Some(field.into()),
      message: message.into(),
    }
  }

  pub fn payment(reason: impl Into<String>) -> Self {
    CheckoutError::Payment { reason: reason.into() }
  }

  /// Text that is safe to put in front of the customer.
  ///
  /// Provider decline text is shown verbatim; transport and internal failures are not.
  pub fn user_message(&self) -> String {
    match self {
      CheckoutError::Validation { message, .. } => message.clone(),
      CheckoutError::Session(failure) => failure.to_string(),
      CheckoutError::Payment { reason } => reason.clone(),
      CheckoutError::Reconciliation { transaction_id, .. } => format!(
        "Your payment was processed, but we could not finalize your order. Please contact support with transaction ID: {}",
        transaction_id
      ),
      CheckoutError::Service(_) | CheckoutError::Config(_) | CheckoutError::Workflow { .. } => {
        "Something went wrong. Please try again.".to_string()
      }
    }
  }

  pub fn is_reconciliation(&self) -> bool {
    matches!(self, CheckoutError::Reconciliation { .. })
  }
}

impl From<reqwest::Error> for CheckoutError {
  fn from(err: reqwest::Error) -> Self {
    CheckoutError::Service(format!("HTTP request failed: {}", err))
  }
}

impl From<serde_json::Error> for CheckoutError {
  fn from(err: serde_json::Error) -> Self {
    CheckoutError::Service(format!("Malformed JSON: {}", err))
  }
}

impl From<AnyhowError> for CheckoutError {
  fn from(err: AnyhowError) -> Self {
    // Keep the original classification when an anyhow chain wraps one of ours.
    match err.downcast::<CheckoutError>() {
      Ok(checkout_err) => checkout_err,
      Err(other) => CheckoutError::Service(other.to_string()),
    }
  }
}

pub type Result<T, E = CheckoutError> = std::result::Result<T, E>;
