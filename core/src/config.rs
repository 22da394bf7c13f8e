// core/src/config.rs

use crate::error::{CheckoutError, Result};
use crate::money::Money;
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Origins a card-capture frame may post completion messages from when nothing is configured.
pub const DEFAULT_PROVIDER_ORIGINS: &[&str] = &[
  "https://accept.authorize.net",
  "https://test.authorize.net",
  "https://web.squarecdn.com",
  "https://sandbox.web.squarecdn.com",
];

pub const DEFAULT_PRODUCTION_ORIGINS: &[&str] = &["https://fasho.co", "https://www.fasho.co"];

#[derive(Debug, Clone)]
pub struct CheckoutConfig {
  pub api_base_url: String,
  pub app_base_url: String,
  pub allowed_message_origins: Vec<String>,

  pub http_timeout: Duration,
  /// How long the hosted payment form may stay open without reporting back.
  pub hosted_form_timeout: Duration,
  /// How long to wait for an embedded card SDK to become available.
  pub sdk_ready_timeout: Duration,
  pub sdk_poll_interval: Duration,

  pub already_used_redirect_delay: Duration,
  pub expired_redirect_delay: Duration,

  pub minimum_order_total: Money,
  pub volume_discount_percent: u32,

  pub debounce: Duration,
  pub profile_cache_ttl: Duration,
}

impl Default for CheckoutConfig {
  fn default() -> Self {
    let app_base_url = "http://127.0.0.1:3000".to_string();
    Self {
      api_base_url: format!("{}/api", app_base_url),
      allowed_message_origins: default_origins(&app_base_url),
      app_base_url,
      http_timeout: Duration::from_secs(30),
      hosted_form_timeout: Duration::from_secs(5 * 60),
      sdk_ready_timeout: Duration::from_millis(10_000),
      sdk_poll_interval: Duration::from_millis(100),
      already_used_redirect_delay: Duration::from_millis(2_500),
      expired_redirect_delay: Duration::from_millis(3_000),
      minimum_order_total: Money::from_whole(1),
      volume_discount_percent: 25,
      debounce: Duration::from_millis(500),
      profile_cache_ttl: Duration::from_secs(300),
    }
  }
}

fn default_origins(app_base_url: &str) -> Vec<String> {
  std::iter::once(app_base_url)
    .chain(DEFAULT_PRODUCTION_ORIGINS.iter().copied())
    .chain(DEFAULT_PROVIDER_ORIGINS.iter().copied())
    .map(|o| o.trim_end_matches('/').to_string())
    .collect()
}

fn parse_var<T: FromStr>(name: &str) -> Result<Option<T>>
where
  T::Err: std::fmt::Display,
{
  match env::var(name) {
    Ok(raw) => raw
      .trim()
      .parse::<T>()
      .map(Some)
      .map_err(|e| CheckoutError::Config(format!("Invalid {}: {}", name, e))),
    Err(_) => Ok(None),
  }
}

impl CheckoutConfig {
  /// Builds the configuration from the environment (and `.env` if present). Every key is
  /// optional; unset keys keep their defaults.
  pub fn from_env() -> Result<Self> {
    dotenv().ok();
    let mut cfg = Self::default();

    if let Some(app) = parse_var::<String>("CHECKOUT_APP_BASE_URL")? {
      cfg.app_base_url = app.trim_end_matches('/').to_string();
      cfg.api_base_url = format!("{}/api", cfg.app_base_url);
      cfg.allowed_message_origins = default_origins(&cfg.app_base_url);
    }
    if let Some(api) = parse_var::<String>("CHECKOUT_API_BASE_URL")? {
      cfg.api_base_url = api.trim_end_matches('/').to_string();
    }
    if let Some(origins) = parse_var::<String>("CHECKOUT_ALLOWED_ORIGINS")? {
      cfg.allowed_message_origins = origins
        .split(',')
        .map(|o| o.trim().trim_end_matches('/').to_string())
        .filter(|o| !o.is_empty())
        .collect();
    }

    let secs = |name: &str| parse_var::<u64>(name).map(|v| v.map(Duration::from_secs));
    let millis = |name: &str| parse_var::<u64>(name).map(|v| v.map(Duration::from_millis));

    if let Some(d) = secs("CHECKOUT_HTTP_TIMEOUT_SECS")? {
      cfg.http_timeout = d;
    }
    if let Some(d) = secs("CHECKOUT_HOSTED_FORM_TIMEOUT_SECS")? {
      cfg.hosted_form_timeout = d;
    }
    if let Some(d) = millis("CHECKOUT_SDK_POLL_TIMEOUT_MS")? {
      cfg.sdk_ready_timeout = d;
    }
    if let Some(d) = millis("CHECKOUT_SDK_POLL_INTERVAL_MS")? {
      cfg.sdk_poll_interval = d;
    }
    if let Some(d) = millis("CHECKOUT_ALREADY_USED_DELAY_MS")? {
      cfg.already_used_redirect_delay = d;
    }
    if let Some(d) = millis("CHECKOUT_EXPIRED_DELAY_MS")? {
      cfg.expired_redirect_delay = d;
    }
    if let Some(cents) = parse_var::<i64>("CHECKOUT_MIN_ORDER_TOTAL_CENTS")? {
      cfg.minimum_order_total = Money::from_cents(cents);
    }
    if let Some(pct) = parse_var::<u32>("CHECKOUT_VOLUME_DISCOUNT_PERCENT")? {
      if pct > 100 {
        return Err(CheckoutError::Config(format!(
          "CHECKOUT_VOLUME_DISCOUNT_PERCENT must be at most 100, got {}",
          pct
        )));
      }
      cfg.volume_discount_percent = pct;
    }
    if let Some(d) = millis("CHECKOUT_DEBOUNCE_MS")? {
      cfg.debounce = d;
    }
    if let Some(d) = secs("CHECKOUT_PROFILE_CACHE_TTL_SECS")? {
      cfg.profile_cache_ttl = d;
    }

    tracing::info!(api_base_url = %cfg.api_base_url, "Checkout configuration loaded.");
    Ok(cfg)
  }
}
