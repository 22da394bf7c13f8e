// tests/finalizer_tests.rs
mod common;

use common::*;
use promo_checkout::account::{AccountCredentials, AuthState};
use promo_checkout::finalize::AccountRequest;
use promo_checkout::models::{CompletedOrder, PaymentReference};
use promo_checkout::money::Money;
use promo_checkout::navigation::Route;
use promo_checkout::services::ProfileFields;
use promo_checkout::storage::{
  add_ons_key, load_json, save_json, ClientStore, CHECKOUT_CART_KEY, COMPLETED_ORDER_KEY, PENDING_ORDER_KEY,
};
use serial_test::serial;
use std::sync::atomic::Ordering;

fn reference(trans_id: &str) -> PaymentReference {
  PaymentReference {
    transaction_id: trans_id.to_string(),
    authorization: Some("AUTH01".to_string()),
    account_number: Some("XXXX1111".to_string()),
    account_type: Some("Visa".to_string()),
    provider: "hosted_form".to_string(),
  }
}

fn seed_checkout_state(fx: &Fixture) {
  let pending = pending_order(&["breakthrough", "breakthrough"], Some("user-1"), Some("sess-1"));
  save_json(fx.store.as_ref(), PENDING_ORDER_KEY, &pending).unwrap();
  fx.store.set(CHECKOUT_CART_KEY, "{}".to_string());
  fx.store.set(&add_ons_key("sess-1"), "[\"express-launch\"]".to_string());
}

#[tokio::test]
#[serial]
async fn finalization_runs_every_step_in_order() {
  setup_tracing();
  let fx = Fixture::new();
  let finalizer = fx.finalizer();
  assert_eq!(
    finalizer.step_names(),
    vec![
      "resolve_account",
      "create_order",
      "mark_session_completed",
      "settle_loyalty",
      "persist_completed_order",
      "clear_checkout_state",
      "redirect",
    ]
  );

  seed_checkout_state(&fx);
  let pending = pending_order(&["breakthrough", "breakthrough"], Some("user-1"), Some("sess-1"));
  let finalized = finalizer.finalize(pending, reference("60123"), None).await.unwrap();

  assert_eq!(
    finalized.route,
    Route::ThankYou {
      order_number: "FASHO-1001".to_string()
    }
  );
  assert_eq!(*fx.navigator.routes.lock(), vec![finalized.route.clone()]);
  assert_eq!(finalized.order.order_id, "ord_1");
  assert_eq!(finalized.order.customer_name, "Ada Lovelace");
  assert_eq!(finalized.order.totals.total, Money::from_whole(69));
  assert_eq!(finalized.order.loyalty_tokens_earned, 6_900);
  assert_eq!(finalized.order.new_loyalty_balance, Some(6_900));

  let payload = fx.orders.payloads.lock()[0].clone();
  assert_eq!(payload.payment_data.transaction_id, "60123");
  assert_eq!(payload.user_id.as_deref(), Some("user-1"));
  assert_eq!(payload.session_id.as_deref(), Some("sess-1"));
  assert_eq!(payload.subtotal, Money::from_whole(78));
  assert_eq!(payload.discount, Money::from_whole(9));

  assert_eq!(count(&fx.sessions.complete_calls), 1);
  let settlements = fx.loyalty.settlements.lock().clone();
  assert_eq!(settlements.len(), 1);
  assert_eq!(settlements[0].order_id, "ord_1");
  assert_eq!(settlements[0].order_total, Money::from_whole(69));

  let stored: CompletedOrder = load_json(fx.store.as_ref(), COMPLETED_ORDER_KEY).unwrap();
  assert_eq!(stored.order_number, "FASHO-1001");
  assert!(fx.store.get(PENDING_ORDER_KEY).is_none());
  assert!(fx.store.get(CHECKOUT_CART_KEY).is_none());
  assert!(fx.store.get(&add_ons_key("sess-1")).is_none());
}

#[tokio::test]
#[serial]
async fn order_failure_becomes_a_reconciliation_error() {
  setup_tracing();
  let fx = Fixture::new();
  fx.orders.fail.store(true, Ordering::SeqCst);
  seed_checkout_state(&fx);
  let finalizer = fx.finalizer();

  let pending = pending_order(&["breakthrough"], Some("user-1"), Some("sess-1"));
  let err = finalizer.finalize(pending, reference("60999"), None).await.unwrap_err();

  assert!(err.is_reconciliation());
  assert_eq!(
    err.user_message(),
    "Your payment was processed, but we could not finalize your order. Please contact support with transaction ID: 60999"
  );
  assert_eq!(
    *fx.navigator.routes.lock(),
    vec![Route::ThankYouError {
      transaction_id: "60999".to_string()
    }]
  );
  assert!(fx.store.get(PENDING_ORDER_KEY).is_none());
  assert!(fx.store.get(COMPLETED_ORDER_KEY).is_none());
  assert_eq!(count(&fx.sessions.complete_calls), 0);
  assert!(fx.loyalty.settlements.lock().is_empty());
}

#[tokio::test]
#[serial]
async fn session_and_loyalty_failures_do_not_block_the_order() {
  setup_tracing();
  let fx = Fixture::new();
  fx.sessions.fail_complete.store(true, Ordering::SeqCst);
  fx.loyalty.fail_settle.store(true, Ordering::SeqCst);
  let finalizer = fx.finalizer();

  let mut pending = pending_order(&["momentum"], Some("user-1"), Some("sess-1"));
  pending.loyalty_tokens_spent = 500;
  let finalized = finalizer.finalize(pending, reference("61000"), None).await.unwrap();

  assert_eq!(count(&fx.sessions.complete_calls), 1);
  assert_eq!(fx.loyalty.settlements.lock().len(), 1);
  assert_eq!(finalized.order.loyalty_tokens_spent, 500);
  assert_eq!(finalized.order.loyalty_tokens_earned, 0);
  assert_eq!(finalized.order.new_loyalty_balance, None);
}

#[tokio::test]
#[serial]
async fn guest_orders_skip_session_and_loyalty() {
  setup_tracing();
  let fx = Fixture::new();
  let finalizer = fx.finalizer();

  let pending = pending_order(&["breakthrough"], None, None);
  finalizer.finalize(pending, reference("61001"), None).await.unwrap();

  assert_eq!(count(&fx.orders.calls), 1);
  assert_eq!(count(&fx.sessions.complete_calls), 0);
  assert!(fx.loyalty.settlements.lock().is_empty());
}

#[tokio::test]
#[serial]
async fn router_failure_falls_back_to_a_hard_redirect() {
  setup_tracing();
  let fx = Fixture::new();
  fx.navigator.fail.store(true, Ordering::SeqCst);
  let finalizer = fx.finalizer();

  let pending = pending_order(&["breakthrough"], Some("user-1"), None);
  let finalized = finalizer.finalize(pending, reference("61002"), None).await.unwrap();

  assert_eq!(finalized.order.order_number, "FASHO-1001");
  assert!(fx.navigator.routes.lock().is_empty());
  assert_eq!(
    *fx.navigator.hard_redirects.lock(),
    vec!["http://127.0.0.1:3000/thank-you?order=FASHO-1001".to_string()]
  );
}

#[tokio::test]
#[serial]
async fn missing_account_is_resolved_after_payment() {
  setup_tracing();
  let fx = Fixture::new();
  let finalizer = fx.finalizer();
  let account = AccountRequest {
    auth: AuthState::Anonymous,
    credentials: Some(AccountCredentials {
      email: "late@example.com".to_string(),
      password: "secret1".to_string(),
      login_mode: false,
    }),
    profile: ProfileFields::default(),
  };

  let pending = pending_order(&["breakthrough"], None, Some("sess-1"));
  finalizer
    .finalize(pending, reference("61003"), Some(account.clone()))
    .await
    .unwrap();
  assert_eq!(count(&fx.accounts.sign_up_calls), 1);
  assert_eq!(fx.orders.payloads.lock()[0].user_id.as_deref(), Some("user-new-1"));
  assert_eq!(fx.loyalty.settlements.lock()[0].user_id, "user-new-1");

  // Already attached to a user: the step is skipped.
  let pending = pending_order(&["breakthrough"], Some("user-1"), None);
  finalizer.finalize(pending, reference("61004"), Some(account)).await.unwrap();
  assert_eq!(count(&fx.accounts.sign_up_calls), 1);
}

#[tokio::test]
#[serial]
async fn failed_late_account_resolution_still_records_the_order() {
  setup_tracing();
  let fx = Fixture::new();
  fx.accounts.register("ada@example.com", "right-pass", "user-1");
  let finalizer = fx.finalizer();
  let account = AccountRequest {
    auth: AuthState::Anonymous,
    credentials: Some(AccountCredentials {
      email: "ada@example.com".to_string(),
      password: "wrong-pass".to_string(),
      login_mode: true,
    }),
    profile: ProfileFields::default(),
  };

  let pending = pending_order(&["breakthrough"], None, None);
  let finalized = finalizer
    .finalize(pending, reference("61005"), Some(account))
    .await
    .unwrap();
  assert_eq!(finalized.order.order_number, "FASHO-1001");
  assert_eq!(fx.orders.payloads.lock()[0].user_id, None);
  assert!(fx.loyalty.settlements.lock().is_empty());
}
