// tests/common/mod.rs
#![allow(dead_code)] // Each test binary uses a different subset

use async_trait::async_trait;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use promo_checkout::account::AuthState;
use promo_checkout::checkout::{CheckoutController, CheckoutServices};
use promo_checkout::error::{CheckoutError, Result};
use promo_checkout::finalize::{FinalizerDeps, OrderFinalizer};
use promo_checkout::loyalty::{max_redeemable_tokens, LoyaltyTokenClient};
use promo_checkout::models::{
  BillingInfo, CouponState, CreatedOrder, DiscountType, PackageCatalog, PackageSelections, PaymentReference,
  PendingOrder, SessionData, Track,
};
use promo_checkout::money::Money;
use promo_checkout::navigation::{Navigator, Route};
use promo_checkout::payment::{CheckoutForm, CompletionSignal, PaymentProvider, PaymentRequest, ProviderSurface};
use promo_checkout::pricing::DiscountEngine;
use promo_checkout::services::{
  AccountService, AuthUser, ChargeOutcome, ChargeRequest, CouponService, CouponValidation, CreateSessionRequest,
  HostedToken, LoyaltyQuote, LoyaltyService, LoyaltySettings, OrderPayload, OrderService, PaymentService,
  ProfileFields, SessionService, SessionValidation, Settlement, SettlementRequest, TokenRequest,
};
use promo_checkout::session::CheckoutSessionClient;
use promo_checkout::storage::MemoryStore;
use promo_checkout::{AccountResolver, CheckoutConfig};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::Level;

// --- Tracing ---
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

/// Shared, ordered record of side effects across fakes.
pub type EventLog = Arc<Mutex<Vec<String>>>;

fn record(log: &EventLog, event: &str) {
  log.lock().push(event.to_string());
}

pub fn count(counter: &AtomicUsize) -> usize {
  counter.load(Ordering::SeqCst)
}

// --- Sample data ---
pub fn track(n: usize) -> Track {
  Track {
    id: format!("spotify-track-{}", n),
    title: format!("Song {}", n),
    artist: "The Testers".to_string(),
    image_url: format!("https://i.scdn.co/image/{}", n),
    url: format!("https://open.spotify.com/track/{}", n),
    artist_profile_url: None,
  }
}

pub fn session_data(packages: &[&str]) -> SessionData {
  SessionData {
    tracks: (0..packages.len()).map(track).collect(),
    selected_packages: packages
      .iter()
      .enumerate()
      .map(|(i, p)| (i, p.to_string()))
      .collect::<PackageSelections>(),
    user_id: None,
  }
}

pub fn authed(id: &str, email: &str) -> AuthState {
  AuthState::Authenticated(AuthUser {
    id: id.to_string(),
    email: email.to_string(),
  })
}

pub fn billing() -> BillingInfo {
  BillingInfo {
    first_name: "Ada".to_string(),
    last_name: "Lovelace".to_string(),
    address: "1 Analytical Way".to_string(),
    address2: String::new(),
    city: "London".to_string(),
    state: "LDN".to_string(),
    zip: "10001".to_string(),
    country: "US".to_string(),
    phone: "555-0100".to_string(),
    email: String::new(),
  }
}

/// A complete signup-mode form.
pub fn filled_form(email: &str, password: &str) -> CheckoutForm {
  CheckoutForm {
    email: email.to_string(),
    password: password.to_string(),
    confirm_password: password.to_string(),
    login_mode: false,
    billing: billing(),
    music_genre: "Hip-Hop".to_string(),
    terms_agreed: true,
  }
}

pub fn approved(trans_id: &str) -> CompletionSignal {
  CompletionSignal::Approved(PaymentReference {
    transaction_id: trans_id.to_string(),
    authorization: Some("AUTH01".to_string()),
    account_number: Some("XXXX1111".to_string()),
    account_type: Some("Visa".to_string()),
    provider: "scripted".to_string(),
  })
}

pub fn pending_order(packages: &[&str], user_id: Option<&str>, session_id: Option<&str>) -> PendingOrder {
  let engine = DiscountEngine::default();
  let data = session_data(packages);
  let items = engine
    .order_items(&data.tracks, &data.selected_packages, &PackageCatalog::default())
    .unwrap();
  let totals = engine.compute_totals(&items, &[], None, Money::ZERO);
  let mut billing = billing();
  billing.email = "ada@example.com".to_string();
  PendingOrder {
    session_id: session_id.map(str::to_string),
    items,
    add_ons: vec![],
    totals,
    billing,
    customer_email: "ada@example.com".to_string(),
    music_genre: "Hip-Hop".to_string(),
    coupon: None,
    loyalty_tokens_spent: 0,
    loyalty_discount: Money::ZERO,
    user_id: user_id.map(str::to_string),
    payment_token: "tok_123".to_string(),
    created_at: chrono::Utc::now(),
  }
}

// --- Session service ---
#[derive(Default)]
pub struct FakeSessionService {
  pub sessions: Mutex<HashMap<String, SessionValidation>>,
  pub recover_to: Mutex<Option<String>>,
  pub validate_calls: AtomicUsize,
  pub recover_calls: AtomicUsize,
  pub complete_calls: AtomicUsize,
  pub create_calls: AtomicUsize,
  pub fail_complete: AtomicBool,
}

impl FakeSessionService {
  pub fn insert(&self, session_id: &str, validation: SessionValidation) {
    self.sessions.lock().insert(session_id.to_string(), validation);
  }
}

#[async_trait]
impl SessionService for FakeSessionService {
  async fn create(&self, request: &CreateSessionRequest) -> Result<String> {
    let n = self.create_calls.fetch_add(1, Ordering::SeqCst) + 1;
    let session_id = format!("sess-legacy-{}", n);
    self.insert(
      &session_id,
      SessionValidation::Valid(SessionData {
        tracks: request.tracks.clone(),
        selected_packages: request.selected_packages.clone(),
        user_id: request.user_id.clone(),
      }),
    );
    Ok(session_id)
  }

  async fn validate(&self, session_id: &str) -> Result<SessionValidation> {
    self.validate_calls.fetch_add(1, Ordering::SeqCst);
    self
      .sessions
      .lock()
      .get(session_id)
      .cloned()
      .ok_or_else(|| CheckoutError::Service(format!("unknown session {}", session_id)))
  }

  async fn recover(&self, _user_id: Option<&str>, _expired_session_id: &str) -> Result<Option<String>> {
    self.recover_calls.fetch_add(1, Ordering::SeqCst);
    Ok(self.recover_to.lock().clone())
  }

  async fn complete(&self, session_id: &str) -> Result<()> {
    self.complete_calls.fetch_add(1, Ordering::SeqCst);
    if self.fail_complete.load(Ordering::SeqCst) {
      return Err(CheckoutError::Service(format!("could not complete {}", session_id)));
    }
    Ok(())
  }
}

// --- Coupon service ---
#[derive(Clone, Copy)]
pub struct CouponRule {
  pub discount_type: DiscountType,
  pub value: f64,
  pub minimum_order: Money,
}

#[derive(Default)]
pub struct FakeCouponService {
  pub rules: Mutex<HashMap<String, CouponRule>>,
  pub calls: AtomicUsize,
  pub last_amount: Mutex<Option<Money>>,
  pub gate: Mutex<Option<oneshot::Receiver<()>>>,
}

impl FakeCouponService {
  /// The next validation waits until the returned sender fires (or is dropped).
  pub fn hold_next(&self) -> oneshot::Sender<()> {
    let (tx, rx) = oneshot::channel();
    *self.gate.lock() = Some(rx);
    tx
  }

  pub fn add(&self, code: &str, discount_type: DiscountType, value: f64, minimum_order: Money) {
    self.rules.lock().insert(
      code.to_string(),
      CouponRule {
        discount_type,
        value,
        minimum_order,
      },
    );
  }
}

#[async_trait]
impl CouponService for FakeCouponService {
  async fn validate(&self, code: &str, order_amount: Money) -> Result<CouponValidation> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    *self.last_amount.lock() = Some(order_amount);
    let gate = self.gate.lock().take();
    if let Some(gate) = gate {
      let _ = gate.await;
    }
    let Some(rule) = self.rules.lock().get(code).copied() else {
      return Ok(CouponValidation::Rejected("Invalid coupon code".to_string()));
    };
    if order_amount < rule.minimum_order {
      return Ok(CouponValidation::Rejected(format!(
        "Minimum order amount of {} required",
        rule.minimum_order
      )));
    }
    let calculated_discount = match rule.discount_type {
      DiscountType::Percentage => Money::from_dollars(order_amount.as_dollars() * rule.value / 100.0),
      DiscountType::Flat => Money::from_dollars(rule.value),
    };
    Ok(CouponValidation::Accepted {
      coupon: CouponState {
        id: format!("coupon-{}", code.to_lowercase()),
        code: code.to_string(),
        discount_type: rule.discount_type,
        discount_value: rule.value,
        calculated_discount,
      },
      message: Some("Coupon applied".to_string()),
    })
  }
}

// --- Loyalty service ---
pub struct FakeLoyaltyService {
  pub settings: Mutex<LoyaltySettings>,
  pub balance: AtomicU64,
  pub settings_calls: AtomicUsize,
  pub quote_calls: AtomicUsize,
  pub settlements: Mutex<Vec<SettlementRequest>>,
  pub fail_settle: AtomicBool,
  pub quote_gate: Mutex<Option<oneshot::Receiver<()>>>,
}

impl Default for FakeLoyaltyService {
  fn default() -> Self {
    Self {
      settings: Mutex::new(LoyaltySettings {
        tokens_per_dollar: 100,
        redemption_tokens_per_dollar: 100,
        is_program_active: true,
        minimum_order_total: Money::from_whole(1),
      }),
      balance: AtomicU64::new(0),
      settings_calls: AtomicUsize::new(0),
      quote_calls: AtomicUsize::new(0),
      settlements: Mutex::new(Vec::new()),
      fail_settle: AtomicBool::new(false),
      quote_gate: Mutex::new(None),
    }
  }
}

impl FakeLoyaltyService {
  pub fn with_balance(balance: u64) -> Self {
    let svc = Self::default();
    svc.balance.store(balance, Ordering::SeqCst);
    svc
  }

  /// The next quote waits until the returned sender fires (or is dropped).
  pub fn hold_next_quote(&self) -> oneshot::Sender<()> {
    let (tx, rx) = oneshot::channel();
    *self.quote_gate.lock() = Some(rx);
    tx
  }
}

#[async_trait]
impl LoyaltyService for FakeLoyaltyService {
  async fn fetch_settings(&self) -> Result<LoyaltySettings> {
    self.settings_calls.fetch_add(1, Ordering::SeqCst);
    Ok(*self.settings.lock())
  }

  async fn calculate_max(&self, _user_id: &str, cart_total: Money) -> Result<LoyaltyQuote> {
    self.quote_calls.fetch_add(1, Ordering::SeqCst);
    let gate = self.quote_gate.lock().take();
    if let Some(gate) = gate {
      let _ = gate.await;
    }
    let settings = *self.settings.lock();
    let balance = self.balance.load(Ordering::SeqCst);
    let rate = settings.redemption_tokens_per_dollar;
    let max_tokens = max_redeemable_tokens(balance, cart_total, settings.minimum_order_total, rate);
    Ok(LoyaltyQuote {
      balance,
      max_tokens,
      max_discount: Money::from_cents((max_tokens * 100 / rate) as i64),
      redemption_rate: rate,
    })
  }

  async fn process_order(&self, request: &SettlementRequest) -> Result<Settlement> {
    self.settlements.lock().push(request.clone());
    if self.fail_settle.load(Ordering::SeqCst) {
      return Err(CheckoutError::Service("loyalty ledger unavailable".to_string()));
    }
    let earned = (request.order_total.cents() / 100) as u64 * self.settings.lock().tokens_per_dollar;
    let balance = self.balance.load(Ordering::SeqCst).saturating_sub(request.tokens_spent) + earned;
    self.balance.store(balance, Ordering::SeqCst);
    Ok(Settlement {
      fashokens_spent: request.tokens_spent,
      fashokens_earned: earned,
      new_balance: balance,
    })
  }
}

// --- Account service ---
#[derive(Default)]
pub struct FakeAccountService {
  pub users: Mutex<HashMap<String, (String, AuthUser)>>,
  pub sign_in_calls: AtomicUsize,
  pub sign_up_calls: AtomicUsize,
  pub exists_calls: AtomicUsize,
  pub sync_calls: AtomicUsize,
  pub confirm_calls: AtomicUsize,
  pub fail_sync: AtomicBool,
  pub log: EventLog,
}

impl FakeAccountService {
  pub fn register(&self, email: &str, password: &str, id: &str) {
    self.users.lock().insert(
      email.to_string(),
      (
        password.to_string(),
        AuthUser {
          id: id.to_string(),
          email: email.to_string(),
        },
      ),
    );
  }
}

#[async_trait]
impl AccountService for FakeAccountService {
  async fn sign_in(&self, email: &str, password: &str) -> Result<Option<AuthUser>> {
    self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
    record(&self.log, "account:sign_in");
    Ok(
      self
        .users
        .lock()
        .get(email)
        .filter(|(pw, _)| pw == password)
        .map(|(_, user)| user.clone()),
    )
  }

  async fn sign_up(&self, email: &str, password: &str, _profile: &ProfileFields) -> Result<AuthUser> {
    let n = self.sign_up_calls.fetch_add(1, Ordering::SeqCst) + 1;
    record(&self.log, "account:sign_up");
    let user = AuthUser {
      id: format!("user-new-{}", n),
      email: email.to_string(),
    };
    self
      .users
      .lock()
      .insert(email.to_string(), (password.to_string(), user.clone()));
    Ok(user)
  }

  async fn email_exists(&self, email: &str) -> Result<bool> {
    self.exists_calls.fetch_add(1, Ordering::SeqCst);
    Ok(self.users.lock().contains_key(email))
  }

  async fn sync_profile(&self, _user_id: &str, _profile: &ProfileFields) -> Result<()> {
    self.sync_calls.fetch_add(1, Ordering::SeqCst);
    if self.fail_sync.load(Ordering::SeqCst) {
      return Err(CheckoutError::Service("profile store down".to_string()));
    }
    Ok(())
  }

  async fn auto_confirm(&self, _user_id: &str, _email: &str) -> Result<()> {
    self.confirm_calls.fetch_add(1, Ordering::SeqCst);
    Ok(())
  }
}

// --- Order service ---
#[derive(Default)]
pub struct FakeOrderService {
  pub calls: AtomicUsize,
  pub payloads: Mutex<Vec<OrderPayload>>,
  pub fail: AtomicBool,
  pub delay_ms: AtomicU64,
  pub log: EventLog,
}

#[async_trait]
impl OrderService for FakeOrderService {
  async fn create_order(&self, payload: &OrderPayload) -> Result<CreatedOrder> {
    let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
    record(&self.log, "order:create");
    self.payloads.lock().push(payload.clone());
    let delay = self.delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
      tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    if self.fail.load(Ordering::SeqCst) {
      return Err(CheckoutError::Service("order/create failed: database unavailable".to_string()));
    }
    Ok(CreatedOrder {
      id: format!("ord_{}", n),
      order_number: format!("FASHO-{}", 1000 + n),
      created_at: "2024-05-01T12:00:00Z".to_string(),
    })
  }
}

// --- Payment service ---
pub struct FakePaymentService {
  pub token_calls: AtomicUsize,
  pub charge_calls: AtomicUsize,
  pub charge_outcome: Mutex<ChargeOutcome>,
  pub charges: Mutex<Vec<ChargeRequest>>,
  pub fail_charge: AtomicBool,
}

impl Default for FakePaymentService {
  fn default() -> Self {
    Self {
      token_calls: AtomicUsize::new(0),
      charge_calls: AtomicUsize::new(0),
      charge_outcome: Mutex::new(ChargeOutcome {
        success: true,
        transaction_id: Some("sq_txn_1".to_string()),
        status: Some("COMPLETED".to_string()),
        error: None,
        authorization: None,
        card_last4: Some("4242".to_string()),
        card_brand: Some("VISA".to_string()),
      }),
      charges: Mutex::new(Vec::new()),
      fail_charge: AtomicBool::new(false),
    }
  }
}

#[async_trait]
impl PaymentService for FakePaymentService {
  async fn generate_token(&self, request: &TokenRequest) -> Result<HostedToken> {
    self.token_calls.fetch_add(1, Ordering::SeqCst);
    Ok(HostedToken {
      token: format!("tok_{}", request.order_id),
      payment_form_url: "https://test.authorize.net/payment/payment".to_string(),
    })
  }

  async fn charge(&self, request: &ChargeRequest) -> Result<ChargeOutcome> {
    self.charge_calls.fetch_add(1, Ordering::SeqCst);
    self.charges.lock().push(request.clone());
    if self.fail_charge.load(Ordering::SeqCst) {
      return Err(CheckoutError::Service("payment/charge failed: gateway timeout".to_string()));
    }
    Ok(self.charge_outcome.lock().clone())
  }
}

// --- Navigator ---
#[derive(Default)]
pub struct RecordingNavigator {
  pub routes: Mutex<Vec<Route>>,
  pub hard_redirects: Mutex<Vec<String>>,
  pub fail: AtomicBool,
}

impl Navigator for RecordingNavigator {
  fn navigate(&self, route: &Route) -> Result<()> {
    if self.fail.load(Ordering::SeqCst) {
      return Err(CheckoutError::Service("router unavailable".to_string()));
    }
    self.routes.lock().push(route.clone());
    Ok(())
  }

  fn hard_redirect(&self, url: &str) {
    self.hard_redirects.lock().push(url.to_string());
  }
}

// --- Payment provider driven by the test ---
pub struct ScriptedProvider {
  sender: mpsc::UnboundedSender<CompletionSignal>,
  receiver: tokio::sync::Mutex<mpsc::UnboundedReceiver<CompletionSignal>>,
  pub token_calls: AtomicUsize,
  pub cancel_calls: AtomicUsize,
  pub requests: Mutex<Vec<PaymentRequest>>,
  pub log: EventLog,
}

impl ScriptedProvider {
  pub fn new(log: EventLog) -> Self {
    let (sender, receiver) = mpsc::unbounded_channel();
    Self {
      sender,
      receiver: tokio::sync::Mutex::new(receiver),
      token_calls: AtomicUsize::new(0),
      cancel_calls: AtomicUsize::new(0),
      requests: Mutex::new(Vec::new()),
      log,
    }
  }

  /// Queues the next signal `await_completion` returns.
  pub fn push(&self, signal: CompletionSignal) {
    self.sender.send(signal).ok();
  }
}

#[async_trait]
impl PaymentProvider for ScriptedProvider {
  fn name(&self) -> &'static str {
    "scripted"
  }

  async fn initialize(&self) -> Result<()> {
    Ok(())
  }

  async fn request_token(&self, request: &PaymentRequest) -> Result<String> {
    self.token_calls.fetch_add(1, Ordering::SeqCst);
    record(&self.log, "provider:request_token");
    self.requests.lock().push(request.clone());
    Ok(format!("tok_{}", request.order_ref))
  }

  async fn activate_ui(&self, token: &str) -> Result<ProviderSurface> {
    Ok(ProviderSurface::HostedForm {
      action_url: "https://test.authorize.net/payment/payment".to_string(),
      token: token.to_string(),
      target_frame: "paymentIframe".to_string(),
    })
  }

  async fn await_completion(&self) -> Result<CompletionSignal> {
    self
      .receiver
      .lock()
      .await
      .recv()
      .await
      .ok_or_else(|| CheckoutError::payment("provider closed"))
  }

  async fn cancel(&self) {
    self.cancel_calls.fetch_add(1, Ordering::SeqCst);
  }
}

// --- Wiring ---
pub struct Fixture {
  pub config: CheckoutConfig,
  pub store: Arc<MemoryStore>,
  pub sessions: Arc<FakeSessionService>,
  pub coupons: Arc<FakeCouponService>,
  pub loyalty: Arc<FakeLoyaltyService>,
  pub accounts: Arc<FakeAccountService>,
  pub orders: Arc<FakeOrderService>,
  pub provider: Arc<ScriptedProvider>,
  pub navigator: Arc<RecordingNavigator>,
  pub log: EventLog,
}

impl Fixture {
  pub fn new() -> Self {
    let log: EventLog = Arc::default();
    let accounts = FakeAccountService {
      log: log.clone(),
      ..Default::default()
    };
    let orders = FakeOrderService {
      log: log.clone(),
      ..Default::default()
    };
    Self {
      config: CheckoutConfig::default(),
      store: Arc::new(MemoryStore::new()),
      sessions: Arc::new(FakeSessionService::default()),
      coupons: Arc::new(FakeCouponService::default()),
      loyalty: Arc::new(FakeLoyaltyService::default()),
      accounts: Arc::new(accounts),
      orders: Arc::new(orders),
      provider: Arc::new(ScriptedProvider::new(log.clone())),
      navigator: Arc::new(RecordingNavigator::default()),
      log,
    }
  }

  pub fn events(&self) -> Vec<String> {
    self.log.lock().clone()
  }

  pub fn services(&self) -> CheckoutServices {
    CheckoutServices {
      sessions: self.sessions.clone(),
      coupons: self.coupons.clone(),
      loyalty: self.loyalty.clone(),
      accounts: self.accounts.clone(),
      orders: self.orders.clone(),
      provider: self.provider.clone(),
      navigator: self.navigator.clone(),
      store: self.store.clone(),
    }
  }

  pub fn controller(&self) -> CheckoutController {
    CheckoutController::new(self.config.clone(), self.services())
  }

  pub fn account_resolver(&self) -> AccountResolver {
    AccountResolver::new(self.accounts.clone(), Duration::from_secs(60), Duration::from_millis(50))
  }

  pub fn finalizer(&self) -> OrderFinalizer {
    let config = Arc::new(self.config.clone());
    OrderFinalizer::new(FinalizerDeps {
      orders: self.orders.clone(),
      sessions: Arc::new(CheckoutSessionClient::new(
        self.sessions.clone(),
        self.store.clone(),
        config.clone(),
      )),
      loyalty: Arc::new(LoyaltyTokenClient::new(self.loyalty.clone(), Duration::from_secs(60))),
      accounts: Arc::new(self.account_resolver()),
      store: self.store.clone(),
      navigator: self.navigator.clone(),
      app_base_url: config.app_base_url.clone(),
    })
  }
}
