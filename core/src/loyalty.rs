// core/src/loyalty.rs

//! Loyalty-token ("fashoken") redemption: program settings, redeemable maximum, clamping when the
//! cart total moves, and post-purchase settlement.

use crate::cache::TtlCache;
use crate::error::{CheckoutError, Result};
use crate::fencing::RequestFence;
use crate::money::Money;
use crate::services::{LoyaltyService, LoyaltySettings, Settlement, SettlementRequest};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Most tokens redeemable against `cart_total` without taking it below `minimum_order_total`.
///
/// `min(balance, floor((cart_total - minimum_order_total) * rate))`, never negative.
pub fn max_redeemable_tokens(balance: u64, cart_total: Money, minimum_order_total: Money, rate: u64) -> u64 {
  let headroom_cents = cart_total.cents() - minimum_order_total.cents();
  if headroom_cents <= 0 || rate == 0 {
    return 0;
  }
  let by_total = (headroom_cents as u64).saturating_mul(rate) / 100;
  balance.min(by_total)
}

/// `tokens / rate` dollars, truncated to the cent.
pub fn tokens_to_discount(tokens: u64, rate: u64) -> Money {
  if rate == 0 {
    return Money::ZERO;
  }
  Money::from_cents((tokens.saturating_mul(100) / rate) as i64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoyaltyStatus {
  pub program_active: bool,
  pub balance: u64,
  pub max_tokens: u64,
  pub max_discount: Money,
  pub redemption_rate: u64,
  pub tokens_per_dollar: u64,
  pub minimum_order_total: Money,
  pub applied_tokens: u64,
  pub applied_discount: Money,
}

impl LoyaltyStatus {
  pub fn inactive() -> Self {
    Self {
      program_active: false,
      balance: 0,
      max_tokens: 0,
      max_discount: Money::ZERO,
      redemption_rate: 0,
      tokens_per_dollar: 0,
      minimum_order_total: Money::ZERO,
      applied_tokens: 0,
      applied_discount: Money::ZERO,
    }
  }
}

pub struct LoyaltyTokenClient {
  service: Arc<dyn LoyaltyService>,
  settings_cache: TtlCache<&'static str, LoyaltySettings>,
  settings_ttl: Duration,
  fence: RequestFence,
  status: Mutex<LoyaltyStatus>,
}

const SETTINGS_KEY: &str = "settings";

impl LoyaltyTokenClient {
  pub fn new(service: Arc<dyn LoyaltyService>, settings_ttl: Duration) -> Self {
    Self {
      service,
      settings_cache: TtlCache::new(),
      settings_ttl,
      fence: RequestFence::new(),
      status: Mutex::new(LoyaltyStatus::inactive()),
    }
  }

  pub fn status(&self) -> LoyaltyStatus {
    *self.status.lock()
  }

  pub fn applied_discount(&self) -> Money {
    self.status.lock().applied_discount
  }

  #[instrument(skip(self))]
  pub async fn fetch_program_settings(&self) -> Result<LoyaltySettings> {
    if let Some(settings) = self.settings_cache.get(&SETTINGS_KEY) {
      return Ok(settings);
    }
    let settings = self.service.fetch_settings().await?;
    self.settings_cache.set(SETTINGS_KEY, settings, self.settings_ttl);
    Ok(settings)
  }

  /// Re-reads balance and maximum for a new post-coupon `cart_total`.
  ///
  /// Tokens applied earlier that no longer fit under the new maximum are clamped down and the
  /// discount recomputed. A response that arrives after a newer refresh started is discarded.
  #[instrument(skip(self), fields(cart_total = %cart_total))]
  pub async fn refresh(&self, user_id: &str, cart_total: Money) -> Result<LoyaltyStatus> {
    let ticket = self.fence.begin();

    let settings = self.fetch_program_settings().await?;
    if !settings.is_program_active {
      debug!("Loyalty program inactive; suppressing redemption.");
      let status = LoyaltyStatus::inactive();
      if self.fence.is_current(ticket) {
        *self.status.lock() = status;
      }
      return Ok(status);
    }

    let quote = self.service.calculate_max(user_id, cart_total).await?;
    if !self.fence.is_current(ticket) {
      debug!("Discarding superseded loyalty quote.");
      return Ok(self.status());
    }

    let rate = if quote.redemption_rate > 0 {
      quote.redemption_rate
    } else {
      settings.redemption_tokens_per_dollar
    };
    let max_tokens = max_redeemable_tokens(quote.balance, cart_total, settings.minimum_order_total, rate)
      .min(quote.max_tokens);

    let mut status = self.status.lock();
    let previously_applied = status.applied_tokens;
    let applied_tokens = previously_applied.min(max_tokens);
    if applied_tokens < previously_applied {
      info!(previously_applied, applied_tokens, "Clamped applied loyalty tokens to the new maximum.");
    }
    *status = LoyaltyStatus {
      program_active: true,
      balance: quote.balance,
      max_tokens,
      max_discount: tokens_to_discount(max_tokens, rate),
      redemption_rate: rate,
      tokens_per_dollar: settings.tokens_per_dollar,
      minimum_order_total: settings.minimum_order_total,
      applied_tokens,
      applied_discount: tokens_to_discount(applied_tokens, rate),
    };
    Ok(*status)
  }

  /// Applies `tokens` against the current maximum. Returns the resulting discount.
  pub fn apply_tokens(&self, tokens: u64) -> Result<Money> {
    let mut status = self.status.lock();
    if !status.program_active {
      return Err(CheckoutError::validation("Loyalty rewards are not available right now."));
    }
    if tokens > status.balance {
      return Err(CheckoutError::field(
        "fashokens",
        format!("You only have {} tokens available.", status.balance),
      ));
    }
    if tokens > status.max_tokens {
      return Err(CheckoutError::field(
        "fashokens",
        format!("You can use up to {} tokens on this order.", status.max_tokens),
      ));
    }
    status.applied_tokens = tokens;
    status.applied_discount = tokens_to_discount(tokens, status.redemption_rate);
    Ok(status.applied_discount)
  }

  pub fn clear_applied(&self) {
    let mut status = self.status.lock();
    status.applied_tokens = 0;
    status.applied_discount = Money::ZERO;
  }

  /// Records spend/earn for a created order. Call once, after the order exists.
  /// Failures are logged and swallowed.
  #[instrument(skip_all, fields(order_id = %request.order_id, tokens_spent = request.tokens_spent))]
  pub async fn settle(&self, request: &SettlementRequest) -> Option<Settlement> {
    match self.service.process_order(request).await {
      Ok(settlement) => {
        info!(
          spent = settlement.fashokens_spent,
          earned = settlement.fashokens_earned,
          new_balance = settlement.new_balance,
          "Loyalty tokens settled."
        );
        self.status.lock().balance = settlement.new_balance;
        Some(settlement)
      }
      Err(e) => {
        warn!(error = %e, "Loyalty settlement failed; order stands.");
        None
      }
    }
  }
}
