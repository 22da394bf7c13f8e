// core/src/services/mod.rs

//! Seams to the backend. Each service is a trait so checkout logic can run against the HTTP
//! implementations on [`ApiClient`] or against in-memory doubles.

pub mod account_service;
pub mod coupon_service;
pub mod http;
pub mod loyalty_service;
pub mod order_service;
pub mod payment_service;
pub mod session_service;

pub use account_service::{AccountService, AuthUser, ProfileFields};
pub use coupon_service::{CouponService, CouponValidation};
pub use http::ApiClient;
pub use loyalty_service::{LoyaltyQuote, LoyaltyService, LoyaltySettings, Settlement, SettlementRequest};
pub use order_service::{OrderPayload, OrderService};
pub use payment_service::{ChargeOutcome, ChargeRequest, HostedToken, LineItem, PaymentService, TokenRequest};
pub use session_service::{CreateSessionRequest, InvalidReason, SessionService, SessionValidation};
