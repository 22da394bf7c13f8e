// core/src/checkout.rs

//! The checkout page's controller: loads a session, keeps totals in step with every cart,
//! coupon and loyalty change, and hands the final cart to the payment orchestrator.

use crate::account::{AccountResolver, AuthState};
use crate::config::CheckoutConfig;
use crate::coupon::CouponClient;
use crate::error::{CheckoutError, Result};
use crate::fencing::TaskSet;
use crate::finalize::{FinalizerDeps, OrderFinalizer};
use crate::loyalty::{LoyaltyStatus, LoyaltyTokenClient};
use crate::models::{
  AddOnCatalog, AddOnOrderItem, CouponState, OrderItem, PackageCatalog, PackageSelections, SessionData, Track,
};
use crate::money::Money;
use crate::navigation::{navigate_or_hard_redirect, Navigator, ScheduledRedirect};
use crate::payment::{CheckoutForm, CheckoutSubmission, IdempotencyGuard, PaymentOrchestrator, PaymentOutcome, PaymentProvider};
use crate::pricing::{CartTotals, DiscountEngine, DiscountPolicy};
use crate::services::{AccountService, CouponService, LoyaltyService, OrderService, SessionService};
use crate::session::{CheckoutSessionClient, SessionOutcome};
use crate::storage::{add_ons_key, load_json, save_json, ClientStore};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// How the checkout page was reached.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckoutEntry {
  Session { session_id: String },
  /// Old-style link carrying the selections in the query string.
  LegacyParams {
    tracks: Vec<Track>,
    selected_packages: PackageSelections,
  },
}

/// What the page renders.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutView {
  pub session_id: String,
  pub items: Vec<OrderItem>,
  pub add_ons: Vec<AddOnOrderItem>,
  pub totals: CartTotals,
  pub coupon: Option<CouponState>,
  pub loyalty: LoyaltyStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
  Ready(CheckoutView),
  /// The page is moving elsewhere (a recovered session); nothing to render.
  Redirecting(ScheduledRedirect),
}

/// Backend and host seams the controller is built from.
pub struct CheckoutServices {
  pub sessions: Arc<dyn SessionService>,
  pub coupons: Arc<dyn CouponService>,
  pub loyalty: Arc<dyn LoyaltyService>,
  pub accounts: Arc<dyn AccountService>,
  pub orders: Arc<dyn OrderService>,
  pub provider: Arc<dyn PaymentProvider>,
  pub navigator: Arc<dyn Navigator>,
  pub store: Arc<dyn ClientStore>,
}

struct Cart {
  session_id: String,
  tracks: Vec<Track>,
  selected_packages: PackageSelections,
  items: Vec<OrderItem>,
  add_on_ids: Vec<String>,
}

pub struct CheckoutController {
  config: Arc<CheckoutConfig>,
  engine: Mutex<DiscountEngine>,
  packages: PackageCatalog,
  add_on_catalog: AddOnCatalog,
  sessions: Arc<CheckoutSessionClient>,
  coupons: CouponClient,
  loyalty: Arc<LoyaltyTokenClient>,
  accounts: Arc<AccountResolver>,
  orchestrator: PaymentOrchestrator,
  navigator: Arc<dyn Navigator>,
  store: Arc<dyn ClientStore>,
  cart: Mutex<Option<Cart>>,
  tasks: TaskSet,
}

impl CheckoutController {
  pub fn new(config: CheckoutConfig, services: CheckoutServices) -> Self {
    Self::with_catalogs(config, services, PackageCatalog::default(), AddOnCatalog::default())
  }

  pub fn with_catalogs(
    config: CheckoutConfig,
    services: CheckoutServices,
    packages: PackageCatalog,
    add_on_catalog: AddOnCatalog,
  ) -> Self {
    let config = Arc::new(config);
    let sessions = Arc::new(CheckoutSessionClient::new(
      services.sessions,
      services.store.clone(),
      config.clone(),
    ));
    let loyalty = Arc::new(LoyaltyTokenClient::new(services.loyalty, config.profile_cache_ttl));
    let accounts = Arc::new(AccountResolver::new(
      services.accounts,
      config.profile_cache_ttl,
      config.debounce,
    ));
    let finalizer = Arc::new(OrderFinalizer::new(FinalizerDeps {
      orders: services.orders,
      sessions: sessions.clone(),
      loyalty: loyalty.clone(),
      accounts: accounts.clone(),
      store: services.store.clone(),
      navigator: services.navigator.clone(),
      app_base_url: config.app_base_url.clone(),
    }));
    let orchestrator = PaymentOrchestrator::new(
      services.provider,
      accounts.clone(),
      finalizer,
      IdempotencyGuard::new(),
      services.store.clone(),
    );

    Self {
      engine: Mutex::new(DiscountEngine::new(DiscountPolicy::from(config.as_ref()))),
      config,
      packages,
      add_on_catalog,
      sessions,
      coupons: CouponClient::new(services.coupons),
      loyalty,
      accounts,
      orchestrator,
      navigator: services.navigator,
      store: services.store,
      cart: Mutex::new(None),
      tasks: TaskSet::default(),
    }
  }

  pub fn orchestrator(&self) -> &PaymentOrchestrator {
    &self.orchestrator
  }

  pub fn accounts(&self) -> &AccountResolver {
    &self.accounts
  }

  pub fn sessions(&self) -> &CheckoutSessionClient {
    &self.sessions
  }

  /// Number of timers/background jobs still owned by this page.
  pub fn pending_tasks(&self) -> usize {
    self.tasks.len()
  }

  /// Performs `redirect` after its delay unless the page is torn down first.
  fn schedule_redirect(&self, redirect: ScheduledRedirect) {
    let navigator = self.navigator.clone();
    let base = self.config.app_base_url.clone();
    self.tasks.spawn(async move {
      if !redirect.delay.is_zero() {
        tokio::time::sleep(redirect.delay).await;
      }
      navigate_or_hard_redirect(navigator.as_ref(), &base, &redirect.route);
    });
  }

  #[instrument(skip_all)]
  pub async fn load(&self, entry: CheckoutEntry, auth: &AuthState) -> Result<LoadOutcome> {
    let user_id = auth.user().map(|u| u.id.clone());

    let session_id = match entry {
      CheckoutEntry::Session { session_id } => session_id,
      CheckoutEntry::LegacyParams {
        tracks,
        selected_packages,
      } => {
        let (session_id, route) = self
          .sessions
          .create_from_legacy_params(tracks, selected_packages, user_id.clone())
          .await?;
        navigate_or_hard_redirect(self.navigator.as_ref(), &self.config.app_base_url, &route);
        session_id
      }
    };

    let outcome = match self.sessions.validate(&session_id, user_id.as_deref()).await {
      Ok(outcome) => outcome,
      Err(CheckoutError::Session(failure)) => {
        self.schedule_redirect(failure.redirect());
        return Err(CheckoutError::Session(failure));
      }
      Err(e) => return Err(e),
    };

    let (session_id, data) = match outcome {
      SessionOutcome::Valid { session_id, data } => (session_id, data),
      SessionOutcome::Recovered { redirect, .. } => {
        self.schedule_redirect(redirect.clone());
        return Ok(LoadOutcome::Redirecting(redirect));
      }
    };

    self.install_cart(session_id, data)?;
    self.coupons.remove();
    self.loyalty.clear_applied();
    if let Some(user_id) = &user_id {
      self.refresh_loyalty(user_id).await;
    }
    Ok(LoadOutcome::Ready(self.view()?))
  }

  fn install_cart(&self, session_id: String, data: SessionData) -> Result<()> {
    let items = match self
      .engine
      .lock()
      .order_items(&data.tracks, &data.selected_packages, &self.packages)
    {
      Ok(items) => items,
      Err(CheckoutError::Session(failure)) => {
        self.schedule_redirect(failure.redirect());
        return Err(CheckoutError::Session(failure));
      }
      Err(e) => return Err(e),
    };
    if items.is_empty() {
      return Err(CheckoutError::validation("This checkout has no tracks."));
    }

    let add_on_ids: Vec<String> = load_json::<Vec<String>>(self.store.as_ref(), &add_ons_key(&session_id))
      .unwrap_or_default()
      .into_iter()
      .filter(|id| self.add_on_catalog.get(id).is_some())
      .collect();

    info!(%session_id, tracks = items.len(), add_ons = add_on_ids.len(), "Checkout cart loaded.");
    *self.cart.lock() = Some(Cart {
      session_id,
      tracks: data.tracks,
      selected_packages: data.selected_packages,
      items,
      add_on_ids,
    });
    Ok(())
  }

  fn with_cart<R>(&self, f: impl FnOnce(&Cart) -> R) -> Result<R> {
    self
      .cart
      .lock()
      .as_ref()
      .map(f)
      .ok_or_else(|| CheckoutError::validation("Checkout is not loaded yet."))
  }

  fn selected_add_ons(&self, cart: &Cart) -> Vec<AddOnOrderItem> {
    cart
      .add_on_ids
      .iter()
      .filter_map(|id| self.add_on_catalog.get(id))
      .map(AddOnOrderItem::from)
      .collect()
  }

  pub fn totals(&self) -> Result<CartTotals> {
    let coupon = self.coupons.current();
    let loyalty_discount = self.loyalty.applied_discount();
    let engine = self.engine.lock().clone();
    self.with_cart(|cart| engine.compute_totals(&cart.items, &self.selected_add_ons(cart), coupon.as_ref(), loyalty_discount))
  }

  /// What coupons are validated against: the total after per-item markdowns, before the coupon.
  fn pre_coupon_total(&self) -> Result<Money> {
    let engine = self.engine.lock().clone();
    self.with_cart(|cart| {
      engine
        .compute_totals(&cart.items, &self.selected_add_ons(cart), None, Money::ZERO)
        .total_before_loyalty
    })
  }

  pub fn view(&self) -> Result<CheckoutView> {
    let totals = self.totals()?;
    self.with_cart(|cart| CheckoutView {
      session_id: cart.session_id.clone(),
      items: cart.items.clone(),
      add_ons: self.selected_add_ons(cart),
      totals,
      coupon: self.coupons.current(),
      loyalty: self.loyalty.status(),
    })
  }

  async fn refresh_loyalty(&self, user_id: &str) {
    let total_before_loyalty = match self.totals() {
      Ok(t) => t.total_before_loyalty,
      Err(_) => return,
    };
    match self.loyalty.refresh(user_id, total_before_loyalty).await {
      Ok(status) if status.program_active => {
        self.engine.lock().set_minimum_order_total(status.minimum_order_total);
      }
      Ok(_) => {}
      Err(e) => warn!(error = %e, "Loyalty refresh failed; redemption unavailable."),
    }
  }

  /// Re-prices everything that depends on the cart: coupon (re-validated, dropped if no longer
  /// accepted) and then the loyalty maximum.
  async fn on_cart_changed(&self, auth: &AuthState) -> Result<()> {
    if let Some(coupon) = self.coupons.current() {
      let amount = self.pre_coupon_total()?;
      match self.coupons.apply(&coupon.code, amount).await {
        Ok(_) => {}
        Err(CheckoutError::Validation { message, .. }) => {
          info!(code = %coupon.code, %message, "Coupon no longer applies to the changed cart.");
          self.coupons.remove();
        }
        Err(e) => warn!(error = %e, "Coupon re-validation failed; keeping the applied coupon."),
      }
    }
    if let Some(user) = auth.user() {
      self.refresh_loyalty(&user.id).await;
    }
    Ok(())
  }

  #[instrument(skip(self, auth))]
  pub async fn toggle_add_on(&self, add_on_id: &str, auth: &AuthState) -> Result<CheckoutView> {
    if self.add_on_catalog.get(add_on_id).is_none() {
      return Err(CheckoutError::validation(format!("Unknown add-on '{}'.", add_on_id)));
    }
    let (session_id, ids) = {
      let mut guard = self.cart.lock();
      let cart = guard
        .as_mut()
        .ok_or_else(|| CheckoutError::validation("Checkout is not loaded yet."))?;
      match cart.add_on_ids.iter().position(|id| id == add_on_id) {
        Some(pos) => {
          cart.add_on_ids.remove(pos);
        }
        None => cart.add_on_ids.push(add_on_id.to_string()),
      }
      (cart.session_id.clone(), cart.add_on_ids.clone())
    };
    save_json(self.store.as_ref(), &add_ons_key(&session_id), &ids)?;
    self.on_cart_changed(auth).await?;
    self.view()
  }

  /// Drops the track at `index`. Later tracks shift up, so volume pricing is recomputed.
  #[instrument(skip(self, auth))]
  pub async fn remove_track(&self, index: usize, auth: &AuthState) -> Result<CheckoutView> {
    {
      let mut guard = self.cart.lock();
      let cart = guard
        .as_mut()
        .ok_or_else(|| CheckoutError::validation("Checkout is not loaded yet."))?;
      if index >= cart.tracks.len() {
        return Err(CheckoutError::validation("That track is no longer in your cart."));
      }
      if cart.tracks.len() == 1 {
        return Err(CheckoutError::validation("Your cart must contain at least one track."));
      }
      let mut tracks = cart.tracks.clone();
      tracks.remove(index);
      let selected_packages: PackageSelections = cart
        .selected_packages
        .iter()
        .filter(|(i, _)| **i != index)
        .map(|(i, pkg)| (if *i > index { i - 1 } else { *i }, pkg.clone()))
        .collect();
      let engine = self.engine.lock().clone();
      // Nothing is committed unless the remaining tracks still price.
      let items = engine.order_items(&tracks, &selected_packages, &self.packages)?;
      cart.tracks = tracks;
      cart.selected_packages = selected_packages;
      cart.items = items;
    }
    self.on_cart_changed(auth).await?;
    self.view()
  }

  #[instrument(skip(self, auth))]
  pub async fn apply_coupon(&self, code: &str, auth: &AuthState) -> Result<CheckoutView> {
    let amount = self.pre_coupon_total()?;
    self.coupons.apply(code, amount).await?;
    if let Some(user) = auth.user() {
      self.refresh_loyalty(&user.id).await;
    }
    self.view()
  }

  pub async fn remove_coupon(&self, auth: &AuthState) -> Result<CheckoutView> {
    self.coupons.remove();
    if let Some(user) = auth.user() {
      self.refresh_loyalty(&user.id).await;
    }
    self.view()
  }

  pub fn apply_loyalty_tokens(&self, tokens: u64) -> Result<CheckoutView> {
    if tokens == 0 {
      self.loyalty.clear_applied();
    } else {
      self.loyalty.apply_tokens(tokens)?;
    }
    self.view()
  }

  /// Submits the current cart with `form`.
  pub async fn submit_payment(&self, form: CheckoutForm, auth: AuthState) -> Result<PaymentOutcome> {
    let totals = self.totals()?;
    let (session_id, items, add_ons) =
      self.with_cart(|cart| (cart.session_id.clone(), cart.items.clone(), self.selected_add_ons(cart)))?;
    let submission = CheckoutSubmission {
      form,
      auth,
      session_id: Some(session_id),
      items,
      add_ons,
      totals,
      coupon: self.coupons.current(),
      loyalty_tokens: self.loyalty.status().applied_tokens,
    };
    self.orchestrator.submit(submission).await
  }

  /// Cancels timers, pending redirects and background checks owned by the page.
  pub fn teardown(&self) {
    self.tasks.abort_all();
  }
}

impl Drop for CheckoutController {
  fn drop(&mut self) {
    self.teardown();
  }
}
