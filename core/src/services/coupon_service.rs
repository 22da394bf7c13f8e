// core/src/services/coupon_service.rs

use super::ApiClient;
use crate::error::Result;
use crate::models::{CouponState, DiscountType};
use crate::money::Money;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

#[derive(Debug, Clone, PartialEq)]
pub enum CouponValidation {
  Accepted { coupon: CouponState, message: Option<String> },
  Rejected(String),
}

#[async_trait]
pub trait CouponService: Send + Sync {
  /// `order_amount` is the total the coupon applies to (after per-item markdowns).
  async fn validate(&self, code: &str, order_amount: Money) -> Result<CouponValidation>;
}

#[derive(Deserialize)]
struct ValidateCouponResponse {
  success: bool,
  coupon: Option<CouponPayload>,
  message: Option<String>,
  error: Option<String>,
}

#[derive(Deserialize)]
struct CouponPayload {
  id: String,
  #[serde(default)]
  code: Option<String>,
  discount_type: DiscountType,
  discount_value: f64,
  calculated_discount: Money,
}

#[async_trait]
impl CouponService for ApiClient {
  #[instrument(skip(self))]
  async fn validate(&self, code: &str, order_amount: Money) -> Result<CouponValidation> {
    let (_, resp): (_, ValidateCouponResponse) = self
      .post_json_any_status("coupon/validate", &json!({ "code": code, "orderAmount": order_amount }))
      .await?;
    match (resp.success, resp.coupon) {
      (true, Some(c)) => Ok(CouponValidation::Accepted {
        coupon: CouponState {
          id: c.id,
          code: c.code.unwrap_or_else(|| code.to_string()),
          discount_type: c.discount_type,
          discount_value: c.discount_value,
          calculated_discount: c.calculated_discount,
        },
        message: resp.message,
      }),
      _ => Ok(CouponValidation::Rejected(
        resp
          .error
          .or(resp.message)
          .unwrap_or_else(|| "Invalid coupon code".to_string()),
      )),
    }
  }
}
