// core/src/payment/messages.rs

//! Completion messages posted by the card-capture frame.
//!
//! The frame relays the provider's response as `{ "type": "PAYMENT_COMPLETE", "response": {...} }`.
//! Anything from an origin outside the allow-list is dropped before its payload is looked at.

use super::provider::CompletionSignal;
use crate::models::PaymentReference;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

pub const PAYMENT_COMPLETE: &str = "PAYMENT_COMPLETE";
pub const PAYMENT_CANCELLED: &str = "PAYMENT_CANCELLED";
/// Layout-only message from the hosted form; carries no outcome.
pub const RESIZE_WINDOW: &str = "RESIZE_WINDOW";

const APPROVED: &str = "1";

/// A message event as the host received it.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameMessage {
  pub origin: String,
  pub data: Value,
}

impl FrameMessage {
  pub fn new(origin: impl Into<String>, data: Value) -> Self {
    Self {
      origin: origin.into(),
      data,
    }
  }
}

/// The provider's transaction response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
  #[serde(deserialize_with = "code_as_string")]
  pub response_code: String,
  #[serde(default)]
  pub response_reason_text: Option<String>,
  #[serde(default)]
  pub trans_id: Option<String>,
  #[serde(default)]
  pub authorization: Option<String>,
  #[serde(default)]
  pub account_number: Option<String>,
  #[serde(default)]
  pub account_type: Option<String>,
}

/// Some gateways send the code as a number.
fn code_as_string<'de, D: serde::Deserializer<'de>>(d: D) -> Result<String, D::Error> {
  match Value::deserialize(d)? {
    Value::String(s) => Ok(s),
    Value::Number(n) => Ok(n.to_string()),
    other => Err(serde::de::Error::custom(format!("unexpected responseCode: {}", other))),
  }
}

impl PaymentResponse {
  pub fn is_approved(&self) -> bool {
    self.response_code.trim() == APPROVED
  }

  /// Approved with a transaction id becomes `Approved`; everything else is a decline carrying the
  /// provider's own reason text.
  pub fn into_signal(self, provider: &str) -> CompletionSignal {
    let raw_trans_id = self.trans_id.clone();
    let approved = self.is_approved();
    let trans_id = self.trans_id.filter(|t| !t.trim().is_empty() && t.trim() != "0");
    match (approved, trans_id) {
      (true, Some(transaction_id)) => CompletionSignal::Approved(PaymentReference {
        transaction_id,
        authorization: self.authorization,
        account_number: self.account_number,
        account_type: self.account_type,
        provider: provider.to_string(),
      }),
      (true, None) => {
        warn!(
          response_code = %self.response_code,
          trans_id = ?raw_trans_id,
          authorization = ?self.authorization,
          "Approval without a usable transaction id; treating as declined."
        );
        CompletionSignal::Declined {
          reason: "Payment was approved without a transaction ID. Please contact support.".to_string(),
        }
      }
      (false, _) => CompletionSignal::Declined {
        reason: self
          .response_reason_text
          .filter(|r| !r.trim().is_empty())
          .unwrap_or_else(|| "Your payment was declined. Please try another card.".to_string()),
      },
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessageDisposition {
  Completion(PaymentResponse),
  Cancelled,
  UntrustedOrigin(String),
  /// Recognized but not an outcome (e.g. a resize).
  Informational(String),
  Unrecognized,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AllowedOrigin {
  scheme: String,
  host: String,
  port: Option<u16>,
}

/// Same-origin, the storefront's production domains and the payment providers' domains.
#[derive(Debug, Clone, Default)]
pub struct OriginAllowList {
  allowed: Vec<AllowedOrigin>,
}

fn parse_origin(raw: &str) -> Option<AllowedOrigin> {
  let url = Url::parse(raw.trim()).ok()?;
  Some(AllowedOrigin {
    scheme: url.scheme().to_string(),
    host: url.host_str()?.to_ascii_lowercase(),
    port: url.port_or_known_default(),
  })
}

impl OriginAllowList {
  pub fn new<I, S>(origins: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    let allowed = origins
      .into_iter()
      .filter_map(|o| {
        let parsed = parse_origin(o.as_ref());
        if parsed.is_none() {
          warn!(origin = o.as_ref(), "Ignoring malformed allowed origin.");
        }
        parsed
      })
      .collect();
    Self { allowed }
  }

  /// Exact scheme and port; the host may be the allowed host or one of its subdomains.
  pub fn allows(&self, origin: &str) -> bool {
    let Some(candidate) = parse_origin(origin) else {
      return false;
    };
    self.allowed.iter().any(|a| {
      a.scheme == candidate.scheme
        && a.port == candidate.port
        && (candidate.host == a.host || candidate.host.ends_with(&format!(".{}", a.host)))
    })
  }
}

fn response_payload(data: &Value) -> Option<&Value> {
  match data.get("response") {
    Some(inner) if inner.is_object() => Some(inner),
    _ if data.get("responseCode").is_some() => Some(data),
    _ => None,
  }
}

/// Classifies one message. Completion payloads that arrive under an unexpected `type` are still
/// processed when they carry a `responseCode`.
pub fn interpret(message: &FrameMessage, allow_list: &OriginAllowList) -> MessageDisposition {
  if !allow_list.allows(&message.origin) {
    warn!(origin = %message.origin, "Dropped message from untrusted origin.");
    return MessageDisposition::UntrustedOrigin(message.origin.clone());
  }

  // postMessage payloads sometimes arrive as serialized JSON.
  let parsed;
  let data = match &message.data {
    Value::String(raw) => match serde_json::from_str::<Value>(raw) {
      Ok(v) => {
        parsed = v;
        &parsed
      }
      Err(_) => return MessageDisposition::Unrecognized,
    },
    other => other,
  };

  let kind = data.get("type").and_then(Value::as_str).unwrap_or_default();
  match kind {
    PAYMENT_CANCELLED => return MessageDisposition::Cancelled,
    RESIZE_WINDOW => return MessageDisposition::Informational(kind.to_string()),
    _ => {}
  }

  let Some(payload) = response_payload(data) else {
    debug!(%kind, "Ignoring message without a payment response.");
    return MessageDisposition::Unrecognized;
  };
  if kind != PAYMENT_COMPLETE {
    warn!(%kind, "Processing payment response that arrived under an unexpected message type.");
  }
  match PaymentResponse::deserialize(payload) {
    Ok(response) => MessageDisposition::Completion(response),
    Err(e) => {
      warn!(error = %e, "Malformed payment response ignored.");
      MessageDisposition::Unrecognized
    }
  }
}

