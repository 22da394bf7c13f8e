// core/src/account.rs

//! Decides whether a checkout signs in, signs up, or reuses the current session, and performs
//! the account work before any payment credential is requested.

use crate::cache::TtlCache;
use crate::core::{ContextData, PipelineControl};
use crate::error::{CheckoutError, Result};
use crate::fencing::Debouncer;
use crate::pipeline::Pipeline;
use crate::services::{AccountService, AuthUser, ProfileFields};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use validator::validate_email;

pub const LOGIN_MISMATCH_MESSAGE: &str = "The email and password you entered do not match our records.";
pub const EXISTING_ACCOUNT_MESSAGE: &str =
  "An account with this email already exists. Please use the correct password or sign in instead.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
  Authenticated(AuthUser),
  Anonymous,
}

impl AuthState {
  pub fn user(&self) -> Option<&AuthUser> {
    match self {
      AuthState::Authenticated(user) => Some(user),
      AuthState::Anonymous => None,
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountCredentials {
  pub email: String,
  pub password: String,
  pub login_mode: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountOutcome {
  /// Already signed in; nothing was done.
  Existing,
  SignedIn,
  Created,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAccount {
  pub user: AuthUser,
  pub outcome: AccountOutcome,
}

/// RFC-style address check, plus a dotted domain: the storefront never accepts bare hosts.
pub fn is_valid_email(email: &str) -> bool {
  let email = email.trim();
  validate_email(email)
    && email
      .rsplit_once('@')
      .is_some_and(|(_, domain)| domain.contains('.') && !domain.ends_with('.'))
}

/// Shared state of the signup branch.
pub struct SignupCtxData {
  pub email: String,
  pub password: String,
  pub profile: ProfileFields,
  pub email_exists: bool,
  pub user: Option<AuthUser>,
  pub outcome: Option<AccountOutcome>,
}

fn signup_pipeline(service: Arc<dyn AccountService>) -> Pipeline<SignupCtxData, CheckoutError> {
  let mut p = Pipeline::<SignupCtxData, CheckoutError>::new(&[
    ("check_existing_email", false, None),
    ("sign_in_existing_account", false, Some(Arc::new(|c: &SignupCtxData| !c.email_exists))),
    ("create_account", false, Some(Arc::new(|c: &SignupCtxData| c.email_exists))),
    ("sync_profile", true, Some(Arc::new(|c: &SignupCtxData| c.outcome != Some(AccountOutcome::Created)))),
    ("auto_confirm_email", true, Some(Arc::new(|c: &SignupCtxData| c.outcome != Some(AccountOutcome::Created)))),
  ]);

  let svc = service.clone();
  p.on_root("check_existing_email", move |ctx: ContextData<SignupCtxData>| {
    let svc = svc.clone();
    async move {
      let email = ctx.with(|c| c.email.clone());
      let exists = svc.email_exists(&email).await?;
      ctx.write().email_exists = exists;
      Ok::<_, CheckoutError>(PipelineControl::Continue)
    }
  });

  let svc = service.clone();
  p.on_root("sign_in_existing_account", move |ctx: ContextData<SignupCtxData>| {
    let svc = svc.clone();
    async move {
      let (email, password) = ctx.with(|c| (c.email.clone(), c.password.clone()));
      match svc.sign_in(&email, &password).await? {
        Some(user) => {
          info!(user_id = %user.id, "Existing account signed in during signup checkout.");
          ctx.update(|c| {
            c.user = Some(user);
            c.outcome = Some(AccountOutcome::SignedIn);
          });
          Ok(PipelineControl::Continue)
        }
        None => Err(CheckoutError::field("password", EXISTING_ACCOUNT_MESSAGE)),
      }
    }
  });

  let svc = service.clone();
  p.on_root("create_account", move |ctx: ContextData<SignupCtxData>| {
    let svc = svc.clone();
    async move {
      let (email, password, profile) = ctx.with(|c| (c.email.clone(), c.password.clone(), c.profile.clone()));
      let user = svc.sign_up(&email, &password, &profile).await?;
      info!(user_id = %user.id, "Account created during checkout.");
      ctx.update(|c| {
        c.user = Some(user);
        c.outcome = Some(AccountOutcome::Created);
      });
      Ok::<_, CheckoutError>(PipelineControl::Continue)
    }
  });

  let svc = service.clone();
  p.on_root("sync_profile", move |ctx: ContextData<SignupCtxData>| {
    let svc = svc.clone();
    async move {
      let (user_id, profile) = ctx.with(|c| (c.user.as_ref().map(|u| u.id.clone()), c.profile.clone()));
      if let Some(user_id) = user_id {
        if let Err(e) = svc.sync_profile(&user_id, &profile).await {
          warn!(%user_id, error = %e, "Profile sync failed; continuing checkout.");
        }
      }
      Ok::<_, CheckoutError>(PipelineControl::Continue)
    }
  });

  let svc = service;
  p.on_root("auto_confirm_email", move |ctx: ContextData<SignupCtxData>| {
    let svc = svc.clone();
    async move {
      let user = ctx.with(|c| c.user.clone());
      if let Some(user) = user {
        if let Err(e) = svc.auto_confirm(&user.id, &user.email).await {
          warn!(user_id = %user.id, error = %e, "Email auto-confirm failed; continuing checkout.");
        }
      }
      Ok::<_, CheckoutError>(PipelineControl::Continue)
    }
  });

  p
}

pub struct AccountResolver {
  service: Arc<dyn AccountService>,
  signup: Pipeline<SignupCtxData, CheckoutError>,
  exists_cache: Arc<TtlCache<String, bool>>,
  exists_ttl: Duration,
  email_check: Debouncer,
}

impl AccountResolver {
  pub fn new(service: Arc<dyn AccountService>, exists_ttl: Duration, debounce: Duration) -> Self {
    Self {
      signup: signup_pipeline(service.clone()),
      service,
      exists_cache: Arc::new(TtlCache::new()),
      exists_ttl,
      email_check: Debouncer::new(debounce),
    }
  }

  /// Applies the auth decision table. Runs before any payment credential is requested.
  #[instrument(skip_all, fields(authenticated = auth.user().is_some()))]
  pub async fn resolve(
    &self,
    auth: &AuthState,
    credentials: Option<&AccountCredentials>,
    profile: &ProfileFields,
  ) -> Result<ResolvedAccount> {
    if let AuthState::Authenticated(user) = auth {
      return Ok(ResolvedAccount {
        user: user.clone(),
        outcome: AccountOutcome::Existing,
      });
    }

    let creds = credentials.ok_or_else(|| CheckoutError::field("email", "Please enter your email address."))?;
    let email = creds.email.trim().to_lowercase();
    if !is_valid_email(&email) {
      return Err(CheckoutError::field("email", "Please enter a valid email address."));
    }

    if creds.login_mode {
      return match self.service.sign_in(&email, &creds.password).await? {
        Some(user) => {
          info!(user_id = %user.id, "Signed in during checkout.");
          Ok(ResolvedAccount {
            user,
            outcome: AccountOutcome::SignedIn,
          })
        }
        None => Err(CheckoutError::field("password", LOGIN_MISMATCH_MESSAGE)),
      };
    }

    let ctx = ContextData::new(SignupCtxData {
      email,
      password: creds.password.clone(),
      profile: profile.clone(),
      email_exists: false,
      user: None,
      outcome: None,
    });
    if let Err(e) = self.signup.run(ctx.clone()).await {
      // The account may exist now even though the branch failed.
      self.exists_cache.invalidate(&ctx.with(|c| c.email.clone()));
      return Err(e);
    }

    let mut data = ctx.write();
    self.exists_cache.set(data.email.clone(), true, self.exists_ttl);
    match (data.user.take(), data.outcome) {
      (Some(user), Some(outcome)) => Ok(ResolvedAccount { user, outcome }),
      _ => Err(CheckoutError::Service("account resolution finished without a user".to_string())),
    }
  }

  /// Cached existence check, used to switch the form between signup and login hints.
  pub async fn email_exists(&self, email: &str) -> Result<bool> {
    check_exists(&*self.service, &self.exists_cache, self.exists_ttl, email).await
  }

  /// Debounced existence check for as-you-type input. A newer call cancels a pending one;
  /// `on_result` only runs for the last.
  pub fn schedule_email_check<F>(&self, email: String, on_result: F)
  where
    F: FnOnce(bool) + Send + 'static,
  {
    if !is_valid_email(&email) {
      self.email_check.cancel();
      return;
    }
    let service = self.service.clone();
    let cache = self.exists_cache.clone();
    let ttl = self.exists_ttl;
    self.email_check.schedule(async move {
      match check_exists(&*service, &cache, ttl, &email).await {
        Ok(exists) => on_result(exists),
        Err(e) => warn!(error = %e, "Email existence check failed."),
      }
    });
  }
}

async fn check_exists(
  service: &dyn AccountService,
  cache: &TtlCache<String, bool>,
  ttl: Duration,
  email: &str,
) -> Result<bool> {
  let key = email.trim().to_lowercase();
  if let Some(exists) = cache.get(&key) {
    return Ok(exists);
  }
  let exists = service.email_exists(&key).await?;
  cache.set(key, exists, ttl);
  Ok(exists)
}
