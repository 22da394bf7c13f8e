// core/src/finalize.rs

//! Post-payment order finalization.
//!
//! Runs once per approved transaction, after the idempotency guard:
//! account (only if still missing) → order → session → loyalty → local state → redirect.
//! Only the order itself is required. If it fails the payment is already captured, so the
//! customer is sent to the degraded confirmation page with the transaction id.

use crate::account::{AccountCredentials, AccountResolver, AuthState};
use crate::core::{ContextData, PipelineControl};
use crate::error::{CheckoutError, Result};
use crate::loyalty::LoyaltyTokenClient;
use crate::models::{CompletedOrder, CreatedOrder, PaymentReference, PendingOrder};
use crate::navigation::{navigate_or_hard_redirect, Navigator, Route};
use crate::pipeline::Pipeline;
use crate::services::{OrderPayload, OrderService, ProfileFields, Settlement, SettlementRequest};
use crate::session::CheckoutSessionClient;
use crate::storage::{clear_checkout_state, save_json, ClientStore, COMPLETED_ORDER_KEY, PENDING_ORDER_KEY};
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Account details to resolve after payment when the pending order has no user yet.
#[derive(Debug, Clone)]
pub struct AccountRequest {
  pub auth: AuthState,
  pub credentials: Option<AccountCredentials>,
  pub profile: ProfileFields,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FinalizedOrder {
  pub order: CompletedOrder,
  pub route: Route,
}

pub struct FinalizeCtxData {
  pub pending: PendingOrder,
  pub payment: PaymentReference,
  pub account: Option<AccountRequest>,
  pub created: Option<CreatedOrder>,
  pub settlement: Option<Settlement>,
  pub completed: Option<CompletedOrder>,
  pub route: Option<Route>,
}

impl FinalizeCtxData {
  fn new(pending: PendingOrder, payment: PaymentReference, account: Option<AccountRequest>) -> Self {
    Self {
      pending,
      payment,
      account,
      created: None,
      settlement: None,
      completed: None,
      route: None,
    }
  }

  fn customer_name(&self) -> String {
    let b = &self.pending.billing;
    format!("{} {}", b.first_name.trim(), b.last_name.trim()).trim().to_string()
  }

  fn order_payload(&self) -> OrderPayload {
    let p = &self.pending;
    OrderPayload {
      items: p.items.clone(),
      add_on_items: p.add_ons.clone(),
      subtotal: p.totals.subtotal,
      discount: p.totals.discount,
      total: p.totals.total,
      customer_email: p.customer_email.clone(),
      customer_name: self.customer_name(),
      billing_info: p.billing.clone(),
      payment_data: self.payment.clone(),
      user_id: p.user_id.clone(),
      coupon_id: p.coupon.as_ref().map(|c| c.id.clone()),
      coupon_code: p.coupon.as_ref().map(|c| c.code.clone()),
      coupon_discount: p.totals.coupon_discount,
      fashokens_spent: p.loyalty_tokens_spent,
      fashokens_discount: p.totals.loyalty_discount,
      music_genre: p.music_genre.clone(),
      session_id: p.session_id.clone(),
    }
  }
}

/// Collaborators the finalization steps call.
pub struct FinalizerDeps {
  pub orders: Arc<dyn OrderService>,
  pub sessions: Arc<CheckoutSessionClient>,
  pub loyalty: Arc<LoyaltyTokenClient>,
  pub accounts: Arc<AccountResolver>,
  pub store: Arc<dyn ClientStore>,
  pub navigator: Arc<dyn Navigator>,
  pub app_base_url: String,
}

pub struct OrderFinalizer {
  pipeline: Pipeline<FinalizeCtxData, CheckoutError>,
  deps: Arc<FinalizerDeps>,
}

impl OrderFinalizer {
  pub fn new(deps: FinalizerDeps) -> Self {
    let deps = Arc::new(deps);
    Self {
      pipeline: finalize_pipeline(deps.clone()),
      deps,
    }
  }

  pub fn step_names(&self) -> Vec<&str> {
    self.pipeline.step_names()
  }

  /// Finalizes one approved payment. Any failure is reported as a reconciliation error after
  /// redirecting to the degraded confirmation page.
  #[instrument(skip_all, fields(trans_id = %payment.transaction_id, total = %pending.totals.total))]
  pub async fn finalize(
    &self,
    pending: PendingOrder,
    payment: PaymentReference,
    account: Option<AccountRequest>,
  ) -> Result<FinalizedOrder> {
    let transaction_id = payment.transaction_id.clone();
    let ctx = ContextData::new(FinalizeCtxData::new(pending, payment, account));

    if let Err(e) = self.pipeline.run(ctx.clone()).await {
      let e = match e {
        e @ CheckoutError::Reconciliation { .. } => e,
        other => CheckoutError::Reconciliation {
          transaction_id: transaction_id.clone(),
          message: other.to_string(),
        },
      };
      return Err(self.fail(&transaction_id, e));
    }

    let (completed, route) = ctx.with(|c| (c.completed.clone(), c.route.clone()));
    match (completed, route) {
      (Some(order), Some(route)) => Ok(FinalizedOrder { order, route }),
      _ => Err(self.fail(
        &transaction_id,
        CheckoutError::Reconciliation {
          transaction_id: transaction_id.clone(),
          message: "finalization stopped before the order was confirmed".to_string(),
        },
      )),
    }
  }

  /// Degraded path: payment captured, nothing recorded. Used directly when the pending order
  /// snapshot itself is gone.
  pub fn fail(&self, transaction_id: &str, e: CheckoutError) -> CheckoutError {
    error!(%transaction_id, error = %e, "Payment captured but order could not be finalized.");
    self.deps.store.remove(PENDING_ORDER_KEY);
    navigate_or_hard_redirect(
      self.deps.navigator.as_ref(),
      &self.deps.app_base_url,
      &Route::ThankYouError {
        transaction_id: transaction_id.to_string(),
      },
    );
    e
  }
}

fn finalize_pipeline(deps: Arc<FinalizerDeps>) -> Pipeline<FinalizeCtxData, CheckoutError> {
  let mut p = Pipeline::<FinalizeCtxData, CheckoutError>::new(&[
    (
      "resolve_account",
      true,
      Some(Arc::new(|c: &FinalizeCtxData| c.pending.user_id.is_some() || c.account.is_none())),
    ),
    ("create_order", false, None),
    (
      "mark_session_completed",
      true,
      Some(Arc::new(|c: &FinalizeCtxData| c.pending.session_id.is_none())),
    ),
    ("settle_loyalty", true, Some(Arc::new(|c: &FinalizeCtxData| c.pending.user_id.is_none()))),
    ("persist_completed_order", false, None),
    ("clear_checkout_state", false, None),
    ("redirect", false, None),
  ]);

  let d = deps.clone();
  p.on_root("resolve_account", move |ctx: ContextData<FinalizeCtxData>| {
    let d = d.clone();
    async move {
      let Some(account) = ctx.with(|c| c.account.clone()) else {
        return Ok::<_, CheckoutError>(PipelineControl::Continue);
      };
      match d
        .accounts
        .resolve(&account.auth, account.credentials.as_ref(), &account.profile)
        .await
      {
        Ok(resolved) => {
          info!(user_id = %resolved.user.id, "Account resolved after payment.");
          ctx.write().pending.user_id = Some(resolved.user.id);
        }
        Err(e) => warn!(error = %e, "Account resolution after payment failed; recording order without a user."),
      }
      Ok(PipelineControl::Continue)
    }
  });

  let d = deps.clone();
  p.on_root("create_order", move |ctx: ContextData<FinalizeCtxData>| {
    let d = d.clone();
    async move {
      let (payload, transaction_id) = ctx.with(|c| (c.order_payload(), c.payment.transaction_id.clone()));
      match d.orders.create_order(&payload).await {
        Ok(created) => {
          info!(order_number = %created.order_number, "Order created.");
          ctx.write().created = Some(created);
          Ok(PipelineControl::Continue)
        }
        Err(e) => Err(CheckoutError::Reconciliation {
          transaction_id,
          message: e.to_string(),
        }),
      }
    }
  });

  let d = deps.clone();
  p.on_root("mark_session_completed", move |ctx: ContextData<FinalizeCtxData>| {
    let d = d.clone();
    async move {
      if let Some(session_id) = ctx.with(|c| c.pending.session_id.clone()) {
        d.sessions.mark_completed(&session_id).await;
      }
      Ok::<_, CheckoutError>(PipelineControl::Continue)
    }
  });

  let d = deps.clone();
  p.on_root("settle_loyalty", move |ctx: ContextData<FinalizeCtxData>| {
    let d = d.clone();
    async move {
      let request = ctx.with(|c| {
        let user_id = c.pending.user_id.clone()?;
        let order = c.created.as_ref()?;
        Some(SettlementRequest {
          user_id,
          order_id: order.id.clone(),
          order_total: c.pending.totals.total,
          coupon_discount: c.pending.totals.coupon_discount,
          tokens_spent: c.pending.loyalty_tokens_spent,
          tokens_discount: c.pending.totals.loyalty_discount,
        })
      });
      if let Some(request) = request {
        let settlement = d.loyalty.settle(&request).await;
        ctx.write().settlement = settlement;
      }
      Ok::<_, CheckoutError>(PipelineControl::Continue)
    }
  });

  let d = deps.clone();
  p.on_root("persist_completed_order", move |ctx: ContextData<FinalizeCtxData>| {
    let d = d.clone();
    async move {
      let completed = ctx.with(|c| {
        let created = c.created.as_ref()?;
        Some(CompletedOrder {
          order_id: created.id.clone(),
          order_number: created.order_number.clone(),
          items: c.pending.items.clone(),
          add_ons: c.pending.add_ons.clone(),
          totals: c.pending.totals,
          customer_email: c.pending.customer_email.clone(),
          customer_name: c.customer_name(),
          payment: c.payment.clone(),
          coupon: c.pending.coupon.clone(),
          loyalty_tokens_spent: c.settlement.map_or(c.pending.loyalty_tokens_spent, |s| s.fashokens_spent),
          loyalty_tokens_earned: c.settlement.map_or(0, |s| s.fashokens_earned),
          new_loyalty_balance: c.settlement.map(|s| s.new_balance),
          completed_at: Utc::now(),
        })
      });
      let Some(completed) = completed else {
        return Err(CheckoutError::Service("no created order to persist".to_string()));
      };
      if let Err(e) = save_json(d.store.as_ref(), COMPLETED_ORDER_KEY, &completed) {
        warn!(error = %e, "Could not store completed order for the confirmation page.");
      }
      ctx.write().completed = Some(completed);
      Ok(PipelineControl::Continue)
    }
  });

  let d = deps.clone();
  p.on_root("clear_checkout_state", move |_ctx: ContextData<FinalizeCtxData>| {
    let d = d.clone();
    async move {
      clear_checkout_state(d.store.as_ref(), true);
      Ok::<_, CheckoutError>(PipelineControl::Continue)
    }
  });

  let d = deps;
  p.on_root("redirect", move |ctx: ContextData<FinalizeCtxData>| {
    let d = d.clone();
    async move {
      let order_number = ctx.with(|c| c.created.as_ref().map(|o| o.order_number.clone()));
      let Some(order_number) = order_number else {
        return Err(CheckoutError::Service("no order number to redirect to".to_string()));
      };
      let route = Route::ThankYou { order_number };
      navigate_or_hard_redirect(d.navigator.as_ref(), &d.app_base_url, &route);
      ctx.write().route = Some(route);
      Ok(PipelineControl::Continue)
    }
  });

  p
}
