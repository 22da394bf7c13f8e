// core/src/services/payment_service.rs

use super::ApiClient;
use crate::error::{CheckoutError, Result};
use crate::models::BillingInfo;
use crate::money::Money;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
  pub id: String,
  pub name: String,
  pub quantity: u32,
  pub unit_price: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
  pub amount: Money,
  pub order_id: String,
  pub customer_email: String,
  pub billing_address: BillingInfo,
  pub line_items: Vec<LineItem>,
}

/// Credential for the hosted payment form.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostedToken {
  pub token: String,
  pub payment_form_url: String,
}

/// Charge request carrying a card nonce produced by an embedded card element.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeRequest {
  pub source_id: String,
  pub amount: Money,
  pub order_id: String,
  pub customer_email: String,
  pub billing_address: BillingInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeOutcome {
  pub success: bool,
  #[serde(default)]
  pub transaction_id: Option<String>,
  #[serde(default)]
  pub status: Option<String>,
  #[serde(default)]
  pub error: Option<String>,
  #[serde(default)]
  pub authorization: Option<String>,
  #[serde(default)]
  pub card_last4: Option<String>,
  #[serde(default)]
  pub card_brand: Option<String>,
}

#[async_trait]
pub trait PaymentService: Send + Sync {
  async fn generate_token(&self, request: &TokenRequest) -> Result<HostedToken>;
  async fn charge(&self, request: &ChargeRequest) -> Result<ChargeOutcome>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
  success: bool,
  token: Option<String>,
  payment_form_url: Option<String>,
  error: Option<String>,
}

#[async_trait]
impl PaymentService for ApiClient {
  #[instrument(skip_all, fields(order_id = %request.order_id, amount = %request.amount))]
  async fn generate_token(&self, request: &TokenRequest) -> Result<HostedToken> {
    let resp: TokenResponse = self.post_json("payment/generate-token", request).await?;
    match (resp.success, resp.token, resp.payment_form_url) {
      (true, Some(token), Some(payment_form_url)) => Ok(HostedToken { token, payment_form_url }),
      _ => Err(CheckoutError::payment(
        resp
          .error
          .unwrap_or_else(|| "Failed to initialize payment form".to_string()),
      )),
    }
  }

  #[instrument(skip_all, fields(order_id = %request.order_id, amount = %request.amount))]
  async fn charge(&self, request: &ChargeRequest) -> Result<ChargeOutcome> {
    let (_, outcome): (_, ChargeOutcome) = self.post_json_any_status("payment/charge", request).await?;
    Ok(outcome)
  }
}
