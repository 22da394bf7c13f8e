// core/src/models/order.rs

use super::{AddOnOrderItem, CouponState, Package, Track};
use crate::money::Money;
use crate::pricing::CartTotals;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
  pub track: Track,
  pub package: Package,
  pub original_price: Money,
  pub discounted_price: Money,
  pub is_discounted: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingInfo {
  pub first_name: String,
  pub last_name: String,
  pub address: String,
  pub address2: String,
  pub city: String,
  pub state: String,
  pub zip: String,
  pub country: String,
  pub phone: String,
  pub email: String,
}

/// What the provider reported for an approved charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReference {
  pub transaction_id: String,
  pub authorization: Option<String>,
  pub account_number: Option<String>,
  pub account_type: Option<String>,
  pub provider: String,
}

/// Everything needed to finalize an order, captured the moment a payment token is issued.
///
/// The card-capture surface runs outside this process's state, so this snapshot is what the
/// completion handler works from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOrder {
  pub session_id: Option<String>,
  pub items: Vec<OrderItem>,
  pub add_ons: Vec<AddOnOrderItem>,
  pub totals: CartTotals,
  pub billing: BillingInfo,
  pub customer_email: String,
  pub music_genre: String,
  pub coupon: Option<CouponState>,
  pub loyalty_tokens_spent: u64,
  pub loyalty_discount: Money,
  pub user_id: Option<String>,
  pub payment_token: String,
  pub created_at: DateTime<Utc>,
}

/// Returned by the order service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedOrder {
  pub id: String,
  pub order_number: String,
  pub created_at: String,
}

/// Snapshot handed to the confirmation page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedOrder {
  pub order_id: String,
  pub order_number: String,
  pub items: Vec<OrderItem>,
  pub add_ons: Vec<AddOnOrderItem>,
  pub totals: CartTotals,
  pub customer_email: String,
  pub customer_name: String,
  pub payment: PaymentReference,
  pub coupon: Option<CouponState>,
  pub loyalty_tokens_spent: u64,
  pub loyalty_tokens_earned: u64,
  pub new_loyalty_balance: Option<u64>,
  pub completed_at: DateTime<Utc>,
}
