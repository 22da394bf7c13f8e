// core/src/services/session_service.rs

use super::ApiClient;
use crate::error::{CheckoutError, Result};
use crate::models::{PackageSelections, SessionData, Track};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
  pub tracks: Vec<Track>,
  pub selected_packages: PackageSelections,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidReason {
  AlreadyUsed,
  Expired,
  NotFound,
  Other(String),
}

impl InvalidReason {
  pub fn parse(reason: &str) -> Self {
    match reason {
      "already_used" => InvalidReason::AlreadyUsed,
      "expired" => InvalidReason::Expired,
      "session_not_found" => InvalidReason::NotFound,
      other => InvalidReason::Other(other.to_string()),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionValidation {
  Valid(SessionData),
  Invalid(InvalidReason),
}

#[async_trait]
pub trait SessionService: Send + Sync {
  /// Mints a session from raw track/package selections. Returns the new session id.
  async fn create(&self, request: &CreateSessionRequest) -> Result<String>;

  async fn validate(&self, session_id: &str) -> Result<SessionValidation>;

  /// Mints a replacement for an expired session with the same composition.
  /// `Ok(None)` when the service declines.
  async fn recover(&self, user_id: Option<&str>, expired_session_id: &str) -> Result<Option<String>>;

  async fn complete(&self, session_id: &str) -> Result<()>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionIdResponse {
  session_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValidateResponse {
  #[serde(default)]
  is_valid: Option<bool>,
  #[serde(default)]
  session_data: Option<SessionData>,
  #[serde(default)]
  reason: Option<String>,
}

#[async_trait]
impl SessionService for ApiClient {
  #[instrument(skip_all, fields(num_tracks = request.tracks.len()))]
  async fn create(&self, request: &CreateSessionRequest) -> Result<String> {
    let resp: SessionIdResponse = self.post_json("checkout-session", request).await?;
    resp
      .session_id
      .ok_or_else(|| CheckoutError::Service("checkout-session returned no sessionId".to_string()))
  }

  #[instrument(skip(self))]
  async fn validate(&self, session_id: &str) -> Result<SessionValidation> {
    let (_, resp): (_, ValidateResponse) = self
      .post_json_any_status("checkout-session/validate", &json!({ "sessionId": session_id }))
      .await?;
    match (resp.session_data, resp.reason) {
      (Some(data), None) if resp.is_valid.unwrap_or(true) => Ok(SessionValidation::Valid(data)),
      (_, Some(reason)) => Ok(SessionValidation::Invalid(InvalidReason::parse(&reason))),
      _ => Ok(SessionValidation::Invalid(InvalidReason::Other("invalid_response".to_string()))),
    }
  }

  #[instrument(skip(self))]
  async fn recover(&self, user_id: Option<&str>, expired_session_id: &str) -> Result<Option<String>> {
    let (status, resp): (_, SessionIdResponse) = self
      .post_json_any_status(
        "checkout-session/recover",
        &json!({ "userId": user_id, "expiredSessionId": expired_session_id }),
      )
      .await?;
    if !status.is_success() {
      return Ok(None);
    }
    Ok(resp.session_id)
  }

  #[instrument(skip(self))]
  async fn complete(&self, session_id: &str) -> Result<()> {
    let _: serde_json::Value = self
      .post_json("checkout-session/complete", &json!({ "sessionId": session_id }))
      .await?;
    Ok(())
  }
}
