//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `payment` - Midtrans Snap and status API client
//! - `shipping` - `RajaOngkir` province, city and cost lookups
//! - `checkout` - Cart to pending order to payment session
//! - `notifications` - Applies payment gateway notifications to orders
//! - `identity` - Mirrors identity provider users into `shop.users`

pub mod checkout;
pub mod identity;
pub mod notifications;
pub mod payment;
pub mod shipping;

pub use checkout::{CheckoutError, CheckoutRequest, CheckoutResponse, CheckoutService};
pub use identity::{IdentityError, IdentityEvent, IdentityService};
pub use notifications::{
    NotificationAck, NotificationError, NotificationOutcome, NotificationService,
    PaymentNotification,
};
pub use payment::{MidtransClient, PaymentError};
pub use shipping::{ShippingClient, ShippingError};
