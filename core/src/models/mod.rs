// core/src/models/mod.rs

//! Data carried through the checkout: catalog entries, line items and order snapshots.

pub mod add_on;
pub mod coupon;
pub mod order;
pub mod package;
pub mod session;
pub mod track;

pub use add_on::{AddOn, AddOnCatalog, AddOnOrderItem};
pub use coupon::{CouponState, DiscountType};
pub use order::{BillingInfo, CompletedOrder, CreatedOrder, OrderItem, PaymentReference, PendingOrder};
pub use package::{Package, PackageCatalog};
pub use session::{PackageSelections, SessionData};
pub use track::Track;
