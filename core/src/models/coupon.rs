// core/src/models/coupon.rs

use crate::money::Money;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
  Percentage,
  Flat,
}

/// The single applied coupon.
///
/// `calculated_discount` comes from the coupon service and is the only amount ever subtracted;
/// `discount_type`/`discount_value` are for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouponState {
  pub id: String,
  pub code: String,
  pub discount_type: DiscountType,
  pub discount_value: f64,
  pub calculated_discount: Money,
}
