// core/src/payment/mod.rs

//! Payment orchestration: form gate, provider adapters, cross-frame completion messages and the
//! exactly-once guard in front of order finalization.

pub mod embedded_card;
pub mod form;
pub mod guard;
pub mod hosted_form;
pub mod messages;
pub mod orchestrator;
pub mod provider;

pub use embedded_card::{CardSdk, EmbeddedCardProvider};
pub use form::{CheckoutForm, FormField};
pub use guard::{FinalizationPermit, GuardRejection, IdempotencyGuard};
pub use hosted_form::HostedFormProvider;
pub use messages::{FrameMessage, MessageDisposition, OriginAllowList, PaymentResponse};
pub use orchestrator::{CheckoutSubmission, PaymentOrchestrator, PaymentOutcome, PaymentPhase};
pub use provider::{CompletionSignal, PaymentProvider, PaymentRequest, ProviderSurface};
