// src/lib.rs

//! Checkout core for a music-promotion storefront.
//!
//! Turns a checkout session (tracks plus one promotion package each) into a priced cart, takes
//! payment through a pluggable card-capture provider and finalizes exactly one order per
//! approved transaction.
//!
//!  - Pricing with stacked discounts: volume, add-on sale prices, coupon, loyalty tokens.
//!  - Session validation with one-shot recovery of expired sessions.
//!  - Account sign-in/sign-up resolved before any payment credential is requested.
//!  - Hosted-form and embedded-card providers behind one interface.
//!  - Idempotent post-payment finalization with a degraded path when the order cannot be
//!    recorded.

pub mod account;
pub mod cache;
pub mod checkout;
pub mod config;
pub mod core;
pub mod coupon;
pub mod error;
pub mod fencing;
pub mod finalize;
pub mod loyalty;
pub mod models;
pub mod money;
pub mod navigation;
pub mod payment;
pub mod pipeline;
pub mod pricing;
pub mod services;
pub mod session;
pub mod storage;

// --- Re-exports for the Public API ---

pub use crate::account::{AccountCredentials, AccountOutcome, AccountResolver, AuthState, ResolvedAccount};
pub use crate::checkout::{CheckoutController, CheckoutEntry, CheckoutServices, CheckoutView, LoadOutcome};
pub use crate::config::CheckoutConfig;
pub use crate::core::{ContextData, PipelineControl, PipelineResult, StepDef};
pub use crate::error::{CheckoutError, PipelineError, Result, SessionFailure};
pub use crate::finalize::{FinalizedOrder, OrderFinalizer};
pub use crate::money::Money;
pub use crate::navigation::{Navigator, Route, ScheduledRedirect};
pub use crate::payment::{
  CheckoutForm, CompletionSignal, EmbeddedCardProvider, HostedFormProvider, PaymentOrchestrator, PaymentOutcome,
  PaymentProvider,
};
pub use crate::pipeline::Pipeline;
pub use crate::pricing::{CartTotals, DiscountEngine, DiscountPolicy};
pub use crate::storage::{ClientStore, MemoryStore};
