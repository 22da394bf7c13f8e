// core/src/services/loyalty_service.rs

use super::ApiClient;
use crate::error::{CheckoutError, Result};
use crate::money::Money;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct LoyaltySettings {
  pub tokens_per_dollar: u64,
  pub redemption_tokens_per_dollar: u64,
  pub is_program_active: bool,
  pub minimum_order_total: Money,
}

/// Balance and redemption ceiling for one cart total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoyaltyQuote {
  pub balance: u64,
  pub max_tokens: u64,
  pub max_discount: Money,
  pub redemption_rate: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementRequest {
  pub user_id: String,
  pub order_id: String,
  pub order_total: Money,
  pub coupon_discount: Money,
  pub tokens_spent: u64,
  pub tokens_discount: Money,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Settlement {
  pub fashokens_spent: u64,
  pub fashokens_earned: u64,
  pub new_balance: u64,
}

#[async_trait]
pub trait LoyaltyService: Send + Sync {
  async fn fetch_settings(&self) -> Result<LoyaltySettings>;
  async fn calculate_max(&self, user_id: &str, cart_total: Money) -> Result<LoyaltyQuote>;
  async fn process_order(&self, request: &SettlementRequest) -> Result<Settlement>;
}

#[derive(Deserialize)]
struct SettingsResponse {
  success: bool,
  settings: Option<LoyaltySettings>,
}

#[derive(Deserialize)]
struct QuoteResponse {
  success: bool,
  #[serde(flatten)]
  quote: Option<LoyaltyQuote>,
}

#[async_trait]
impl LoyaltyService for ApiClient {
  #[instrument(skip(self))]
  async fn fetch_settings(&self) -> Result<LoyaltySettings> {
    let resp: SettingsResponse = self.get_json("loyalty/settings").await?;
    match (resp.success, resp.settings) {
      (true, Some(settings)) => Ok(settings),
      _ => Err(CheckoutError::Service("loyalty settings unavailable".to_string())),
    }
  }

  #[instrument(skip(self))]
  async fn calculate_max(&self, user_id: &str, cart_total: Money) -> Result<LoyaltyQuote> {
    let resp: QuoteResponse = self
      .post_json("loyalty/calculate-max", &json!({ "userId": user_id, "cartTotal": cart_total }))
      .await?;
    match (resp.success, resp.quote) {
      (true, Some(quote)) => Ok(quote),
      _ => Err(CheckoutError::Service("loyalty quote unavailable".to_string())),
    }
  }

  #[instrument(skip_all, fields(order_id = %request.order_id, tokens_spent = request.tokens_spent))]
  async fn process_order(&self, request: &SettlementRequest) -> Result<Settlement> {
    self.post_json("loyalty/process-order", request).await
  }
}
