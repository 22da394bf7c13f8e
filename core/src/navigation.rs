// core/src/navigation.rs

use crate::error::{Result, SessionFailure};
use std::fmt;
use std::time::Duration;

/// Where the storefront can send the customer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
  Dashboard,
  /// The song-search entry point.
  TrackSelection,
  Checkout { session_id: String },
  ThankYou { order_number: String },
  /// Confirmation page in degraded mode: payment captured, order not recorded.
  ThankYouError { transaction_id: String },
}

impl Route {
  pub fn path(&self) -> String {
    match self {
      Route::Dashboard => "/dashboard".to_string(),
      Route::TrackSelection => "/add".to_string(),
      Route::Checkout { session_id } => format!("/checkout?sessionId={}", session_id),
      Route::ThankYou { order_number } => format!("/thank-you?order={}", order_number),
      Route::ThankYouError { transaction_id } => {
        format!("/thank-you?error=order_creation_failed&transaction={}", transaction_id)
      }
    }
  }
}

impl fmt::Display for Route {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.path())
  }
}

/// A redirect the host performs after showing a message for `delay`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledRedirect {
  pub route: Route,
  pub delay: Duration,
}

impl ScheduledRedirect {
  pub fn now(route: Route) -> Self {
    Self {
      route,
      delay: Duration::ZERO,
    }
  }
}

impl SessionFailure {
  pub fn redirect(&self) -> ScheduledRedirect {
    match self {
      SessionFailure::AlreadyUsed { redirect_after } => ScheduledRedirect {
        route: Route::Dashboard,
        delay: *redirect_after,
      },
      SessionFailure::Expired { redirect_after } => ScheduledRedirect {
        route: Route::TrackSelection,
        delay: *redirect_after,
      },
      SessionFailure::Invalid(_) => ScheduledRedirect::now(Route::TrackSelection),
    }
  }
}

/// The host's router.
pub trait Navigator: Send + Sync {
  /// Client-side navigation; may fail (e.g. the router is unmounted).
  fn navigate(&self, route: &Route) -> Result<()>;
  /// Full page load. Last resort; cannot fail from the caller's point of view.
  fn hard_redirect(&self, url: &str);
}

/// Navigates, falling back to a full page load so the customer is never left without a way
/// forward.
pub fn navigate_or_hard_redirect(navigator: &dyn Navigator, app_base_url: &str, route: &Route) {
  if let Err(e) = navigator.navigate(route) {
    tracing::warn!(%route, error = %e, "Router navigation failed, falling back to a hard redirect.");
    navigator.hard_redirect(&format!("{}{}", app_base_url.trim_end_matches('/'), route.path()));
  }
}
