// core/src/coupon.rs

use crate::error::{CheckoutError, Result};
use crate::fencing::RequestFence;
use crate::models::CouponState;
use crate::money::Money;
use crate::services::{CouponService, CouponValidation};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, instrument};

/// Holds the one applied coupon. Applying a new code replaces the old one.
pub struct CouponClient {
  service: Arc<dyn CouponService>,
  fence: RequestFence,
  applied: Mutex<Option<CouponState>>,
}

impl CouponClient {
  pub fn new(service: Arc<dyn CouponService>) -> Self {
    Self {
      service,
      fence: RequestFence::new(),
      applied: Mutex::new(None),
    }
  }

  pub fn current(&self) -> Option<CouponState> {
    self.applied.lock().clone()
  }

  /// Validates `code` against `order_amount` and applies it.
  ///
  /// Returns `Ok(None)` when a newer apply/remove superseded this call while it was in flight.
  #[instrument(skip(self), fields(order_amount = %order_amount))]
  pub async fn apply(&self, code: &str, order_amount: Money) -> Result<Option<CouponState>> {
    let code = code.trim().to_uppercase();
    if code.is_empty() {
      return Err(CheckoutError::field("coupon", "Please enter a coupon code."));
    }

    let ticket = self.fence.begin();
    let validation = self.service.validate(&code, order_amount).await?;
    if !self.fence.is_current(ticket) {
      return Ok(None);
    }

    match validation {
      CouponValidation::Accepted { coupon, message } => {
        info!(code = %coupon.code, discount = %coupon.calculated_discount, ?message, "Coupon applied.");
        *self.applied.lock() = Some(coupon.clone());
        Ok(Some(coupon))
      }
      CouponValidation::Rejected(reason) => Err(CheckoutError::field("coupon", reason)),
    }
  }

  pub fn remove(&self) -> Option<CouponState> {
    self.fence.invalidate();
    self.applied.lock().take()
  }
}
