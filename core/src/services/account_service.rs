// core/src/services/account_service.rs

use super::ApiClient;
use crate::error::{CheckoutError, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AuthUser {
  pub id: String,
  pub email: String,
}

/// Profile fields copied onto a freshly created account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileFields {
  pub first_name: String,
  pub last_name: String,
  pub phone: String,
  pub music_genre: String,
}

#[async_trait]
pub trait AccountService: Send + Sync {
  /// `Ok(None)` when the credentials are rejected.
  async fn sign_in(&self, email: &str, password: &str) -> Result<Option<AuthUser>>;
  async fn sign_up(&self, email: &str, password: &str, profile: &ProfileFields) -> Result<AuthUser>;
  async fn email_exists(&self, email: &str) -> Result<bool>;
  async fn sync_profile(&self, user_id: &str, profile: &ProfileFields) -> Result<()>;
  /// Marks the address as verified so the customer is not blocked on a confirmation email.
  async fn auto_confirm(&self, user_id: &str, email: &str) -> Result<()>;
}

#[derive(Deserialize)]
struct UserResponse {
  user: Option<AuthUser>,
  error: Option<String>,
}

#[derive(Deserialize)]
struct ExistsResponse {
  exists: bool,
}

#[async_trait]
impl AccountService for ApiClient {
  #[instrument(skip(self, password))]
  async fn sign_in(&self, email: &str, password: &str) -> Result<Option<AuthUser>> {
    let (status, resp): (_, UserResponse) = self
      .post_json_any_status("auth/sign-in", &json!({ "email": email, "password": password }))
      .await?;
    match status {
      s if s.is_success() => Ok(resp.user),
      s if s == StatusCode::BAD_REQUEST || s == StatusCode::UNAUTHORIZED => Ok(None),
      s => Err(CheckoutError::Service(format!(
        "auth/sign-in failed ({}): {}",
        s,
        resp.error.unwrap_or_default()
      ))),
    }
  }

  #[instrument(skip(self, password, profile))]
  async fn sign_up(&self, email: &str, password: &str, profile: &ProfileFields) -> Result<AuthUser> {
    let (status, resp): (_, UserResponse) = self
      .post_json_any_status(
        "auth/sign-up",
        &json!({ "email": email, "password": password, "profile": profile }),
      )
      .await?;
    match (status.is_success(), resp.user) {
      (true, Some(user)) => Ok(user),
      _ => Err(CheckoutError::Service(format!(
        "auth/sign-up failed ({}): {}",
        status,
        resp.error.unwrap_or_default()
      ))),
    }
  }

  #[instrument(skip(self))]
  async fn email_exists(&self, email: &str) -> Result<bool> {
    let resp: ExistsResponse = self.post_json("account/check-exists", &json!({ "email": email })).await?;
    Ok(resp.exists)
  }

  #[instrument(skip(self, profile))]
  async fn sync_profile(&self, user_id: &str, profile: &ProfileFields) -> Result<()> {
    let _: serde_json::Value = self
      .post_json("account/sync-profile", &json!({ "userId": user_id, "profile": profile }))
      .await?;
    Ok(())
  }

  #[instrument(skip(self))]
  async fn auto_confirm(&self, user_id: &str, email: &str) -> Result<()> {
    let _: serde_json::Value = self
      .post_json("account/auto-confirm", &json!({ "userId": user_id, "email": email }))
      .await?;
    Ok(())
  }
}
