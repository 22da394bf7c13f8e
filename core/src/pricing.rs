// core/src/pricing.rs

//! Order totals across stacked discounts.
//!
//! Order of application:
//!  1. per-item markdowns (volume discount on every track after the first, add-on sale prices)
//!  2. the coupon's server-computed discount, floored at zero
//!  3. loyalty-token discount, floored at the minimum order total
//!
//! Everything here is pure: same inputs, same totals.

use crate::config::CheckoutConfig;
use crate::error::{CheckoutError, Result, SessionFailure};
use crate::models::{AddOnOrderItem, CouponState, OrderItem, PackageCatalog, PackageSelections, Track};
use crate::money::Money;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscountPolicy {
  /// Markdown applied to every track after the first.
  pub volume_discount_percent: u32,
  /// Loyalty redemption never takes the total below this.
  pub minimum_order_total: Money,
}

impl Default for DiscountPolicy {
  fn default() -> Self {
    Self {
      volume_discount_percent: 25,
      minimum_order_total: Money::from_whole(1),
    }
  }
}

impl From<&CheckoutConfig> for DiscountPolicy {
  fn from(config: &CheckoutConfig) -> Self {
    Self {
      volume_discount_percent: config.volume_discount_percent,
      minimum_order_total: config.minimum_order_total,
    }
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartTotals {
  /// Sum of original prices, tracks and add-ons.
  pub subtotal: Money,
  /// Per-item markdowns only. Coupon and loyalty are reported separately.
  pub discount: Money,
  pub coupon_discount: Money,
  /// Post-coupon total; the loyalty cap is computed against this.
  pub total_before_loyalty: Money,
  /// Loyalty discount actually applied after the floor.
  pub loyalty_discount: Money,
  pub total: Money,
}

#[derive(Debug, Clone, Default)]
pub struct DiscountEngine {
  policy: DiscountPolicy,
}

impl DiscountEngine {
  pub fn new(policy: DiscountPolicy) -> Self {
    Self { policy }
  }

  pub fn policy(&self) -> DiscountPolicy {
    self.policy
  }

  pub fn set_minimum_order_total(&mut self, minimum: Money) {
    self.policy.minimum_order_total = minimum;
  }

  /// Price of the track at `index`: full price for the first, volume-discounted for the rest,
  /// rounded up to the next whole currency unit.
  pub fn line_price(&self, index: usize, price: Money) -> Money {
    if index == 0 {
      return price;
    }
    price.percent_of_ceil_whole(100 - self.policy.volume_discount_percent.min(100))
  }

  /// Zips tracks with their package selections.
  ///
  /// Fails when a track has no package or references one the catalog does not know, since the
  /// session composition is then unusable.
  pub fn order_items(
    &self,
    tracks: &[Track],
    selections: &PackageSelections,
    catalog: &PackageCatalog,
  ) -> Result<Vec<OrderItem>> {
    tracks
      .iter()
      .enumerate()
      .map(|(index, track)| {
        let package_id = selections.get(&index).ok_or_else(|| {
          CheckoutError::Session(SessionFailure::Invalid(format!("no package selected for track {}", index)))
        })?;
        let package = catalog.get(package_id).ok_or_else(|| {
          CheckoutError::Session(SessionFailure::Invalid(format!("unknown package '{}'", package_id)))
        })?;
        let discounted_price = self.line_price(index, package.price);
        Ok(OrderItem {
          track: track.clone(),
          package: package.clone(),
          original_price: package.price,
          discounted_price,
          is_discounted: discounted_price < package.price,
        })
      })
      .collect()
  }

  pub fn compute_totals(
    &self,
    items: &[OrderItem],
    add_ons: &[AddOnOrderItem],
    coupon: Option<&CouponState>,
    loyalty_discount: Money,
  ) -> CartTotals {
    let subtotal: Money = items.iter().map(|i| i.original_price).sum::<Money>()
      + add_ons.iter().map(|a| a.original_price).sum::<Money>();

    let discount: Money = items
      .iter()
      .map(|i| i.original_price.saturating_sub(i.discounted_price))
      .sum::<Money>()
      + add_ons
        .iter()
        .map(|a| a.original_price.saturating_sub(a.price))
        .sum::<Money>();

    // Accepted as given even when it exceeds the remaining total; clamped here.
    let coupon_discount = coupon.map(|c| c.calculated_discount.max(Money::ZERO)).unwrap_or(Money::ZERO);
    let total_before_loyalty = subtotal.saturating_sub(discount).saturating_sub(coupon_discount);

    let total = if loyalty_discount.is_positive() {
      let floor = self.policy.minimum_order_total.min(total_before_loyalty);
      (total_before_loyalty - loyalty_discount).max(floor)
    } else {
      total_before_loyalty
    };

    CartTotals {
      subtotal,
      discount,
      coupon_discount,
      total_before_loyalty,
      loyalty_discount: total_before_loyalty - total,
      total,
    }
  }
}
