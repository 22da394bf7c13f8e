// core/src/services/order_service.rs

use super::ApiClient;
use crate::error::{CheckoutError, Result};
use crate::models::{AddOnOrderItem, BillingInfo, CouponState, CreatedOrder, OrderItem, PaymentReference};
use crate::money::Money;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPayload {
  pub items: Vec<OrderItem>,
  pub add_on_items: Vec<AddOnOrderItem>,
  pub subtotal: Money,
  pub discount: Money,
  pub total: Money,
  pub customer_email: String,
  pub customer_name: String,
  pub billing_info: BillingInfo,
  pub payment_data: PaymentReference,
  pub user_id: Option<String>,
  pub coupon_id: Option<String>,
  pub coupon_code: Option<String>,
  pub coupon_discount: Money,
  pub fashokens_spent: u64,
  pub fashokens_discount: Money,
  pub music_genre: String,
  pub session_id: Option<String>,
}

#[async_trait]
pub trait OrderService: Send + Sync {
  async fn create_order(&self, payload: &OrderPayload) -> Result<CreatedOrder>;
}

#[derive(Deserialize)]
struct CreateOrderResponse {
  success: bool,
  order: Option<CreatedOrder>,
  error: Option<String>,
}

#[async_trait]
impl OrderService for ApiClient {
  #[instrument(skip_all, fields(trans_id = %payload.payment_data.transaction_id, total = %payload.total))]
  async fn create_order(&self, payload: &OrderPayload) -> Result<CreatedOrder> {
    let resp: CreateOrderResponse = self.post_json("order/create", payload).await?;
    match (resp.success, resp.order) {
      (true, Some(order)) => Ok(order),
      _ => Err(CheckoutError::Service(
        resp.error.unwrap_or_else(|| "order creation was not confirmed".to_string()),
      )),
    }
  }
}
