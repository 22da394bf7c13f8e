// core/src/session.rs

//! Checkout-session lifecycle: create (legacy links), validate, recover once, complete.

use crate::config::CheckoutConfig;
use crate::error::{CheckoutError, Result, SessionFailure};
use crate::models::{PackageSelections, SessionData, Track};
use crate::navigation::{Route, ScheduledRedirect};
use crate::services::{CreateSessionRequest, InvalidReason, SessionService, SessionValidation};
use crate::storage::{load_json, save_json, ClientStore, CHECKOUT_CART_KEY};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
  Uninitialized,
  Validating,
  Valid { session_id: String },
  Recovering { expired_session_id: String },
  Error(String),
  Completed { session_id: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
  Valid { session_id: String, data: SessionData },
  /// A replacement session was minted; the host moves to it.
  Recovered { new_session_id: String, redirect: ScheduledRedirect },
}

/// Composition cached locally so in-page navigation can restore it without the session service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedCart {
  pub session_id: String,
  pub data: SessionData,
}

pub struct CheckoutSessionClient {
  service: Arc<dyn SessionService>,
  store: Arc<dyn ClientStore>,
  config: Arc<CheckoutConfig>,
  state: Mutex<SessionState>,
}

impl CheckoutSessionClient {
  pub fn new(service: Arc<dyn SessionService>, store: Arc<dyn ClientStore>, config: Arc<CheckoutConfig>) -> Self {
    Self {
      service,
      store,
      config,
      state: Mutex::new(SessionState::Uninitialized),
    }
  }

  pub fn state(&self) -> SessionState {
    self.state.lock().clone()
  }

  fn set_state(&self, state: SessionState) {
    *self.state.lock() = state;
  }

  /// Back-compat path for checkout links that carry raw track/package params.
  /// Returns the route that replaces the legacy URL.
  #[instrument(skip_all, fields(num_tracks = tracks.len()))]
  pub async fn create_from_legacy_params(
    &self,
    tracks: Vec<Track>,
    selected_packages: PackageSelections,
    user_id: Option<String>,
  ) -> Result<(String, Route)> {
    if tracks.is_empty() {
      return Err(CheckoutError::validation("No tracks selected for checkout."));
    }
    let session_id = self
      .service
      .create(&CreateSessionRequest {
        tracks,
        selected_packages,
        user_id,
      })
      .await?;
    info!(%session_id, "Created checkout session from legacy parameters.");
    let route = Route::Checkout {
      session_id: session_id.clone(),
    };
    Ok((session_id, route))
  }

  /// Validates `session_id`; an expired or unknown session gets exactly one recovery attempt.
  #[instrument(skip(self))]
  pub async fn validate(&self, session_id: &str, user_id: Option<&str>) -> Result<SessionOutcome> {
    self.set_state(SessionState::Validating);

    let validation = match self.service.validate(session_id).await {
      Ok(v) => v,
      Err(e) => {
        self.set_state(SessionState::Error(e.to_string()));
        return Err(e);
      }
    };

    match validation {
      SessionValidation::Valid(data) => {
        self.cache_composition(session_id, &data);
        self.set_state(SessionState::Valid {
          session_id: session_id.to_string(),
        });
        Ok(SessionOutcome::Valid {
          session_id: session_id.to_string(),
          data,
        })
      }
      SessionValidation::Invalid(InvalidReason::AlreadyUsed) => {
        info!(%session_id, "Checkout session already used.");
        let failure = SessionFailure::AlreadyUsed {
          redirect_after: self.config.already_used_redirect_delay,
        };
        self.set_state(SessionState::Error(failure.to_string()));
        Err(CheckoutError::Session(failure))
      }
      SessionValidation::Invalid(InvalidReason::Expired | InvalidReason::NotFound) => {
        self.recover(session_id, user_id).await
      }
      SessionValidation::Invalid(InvalidReason::Other(reason)) => {
        warn!(%session_id, %reason, "Checkout session rejected.");
        let failure = SessionFailure::Invalid(reason);
        self.set_state(SessionState::Error(failure.to_string()));
        Err(CheckoutError::Session(failure))
      }
    }
  }

  async fn recover(&self, expired_session_id: &str, user_id: Option<&str>) -> Result<SessionOutcome> {
    self.set_state(SessionState::Recovering {
      expired_session_id: expired_session_id.to_string(),
    });

    let recovered = match self.service.recover(user_id, expired_session_id).await {
      Ok(id) => id,
      Err(e) => {
        warn!(%expired_session_id, error = %e, "Session recovery call failed.");
        None
      }
    };

    match recovered {
      Some(new_session_id) => {
        info!(%expired_session_id, %new_session_id, "Recovered expired checkout session.");
        self.set_state(SessionState::Uninitialized);
        Ok(SessionOutcome::Recovered {
          redirect: ScheduledRedirect::now(Route::Checkout {
            session_id: new_session_id.clone(),
          }),
          new_session_id,
        })
      }
      None => {
        let failure = SessionFailure::Expired {
          redirect_after: self.config.expired_redirect_delay,
        };
        self.set_state(SessionState::Error(failure.to_string()));
        Err(CheckoutError::Session(failure))
      }
    }
  }

  /// Best effort: a failure here never blocks the post-payment redirect.
  #[instrument(skip(self))]
  pub async fn mark_completed(&self, session_id: &str) {
    match self.service.complete(session_id).await {
      Ok(()) => {
        info!(%session_id, "Checkout session marked completed.");
        self.set_state(SessionState::Completed {
          session_id: session_id.to_string(),
        });
      }
      Err(e) => warn!(%session_id, error = %e, "Failed to mark checkout session completed."),
    }
  }

  fn cache_composition(&self, session_id: &str, data: &SessionData) {
    let cached = CachedCart {
      session_id: session_id.to_string(),
      data: data.clone(),
    };
    if let Err(e) = save_json(self.store.as_ref(), CHECKOUT_CART_KEY, &cached) {
      warn!(error = %e, "Failed to cache checkout composition.");
    }
  }

  /// The composition cached by the last successful validation of `session_id`.
  pub fn cached_composition(&self, session_id: &str) -> Option<SessionData> {
    load_json::<CachedCart>(self.store.as_ref(), CHECKOUT_CART_KEY)
      .filter(|c| c.session_id == session_id)
      .map(|c| c.data)
  }
}
