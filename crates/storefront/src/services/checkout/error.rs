//! Checkout error types.

use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::payment::PaymentError;
use crate::services::shipping::ShippingError;

/// Errors that can occur while placing an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Nothing to buy.
    #[error("cart is empty")]
    EmptyCart,

    /// The address does not exist or belongs to someone else.
    #[error("address not found")]
    AddressNotFound,

    /// A cart line asks for more than is in stock.
    #[error("not enough stock for {product}: {available} left, {requested} requested")]
    InsufficientStock {
        product: String,
        available: i32,
        requested: i32,
    },

    /// The order total does not fit in the amount type.
    #[error("order total is too large")]
    AmountOverflow,

    /// Shipping quote failed.
    #[error("shipping error: {0}")]
    Shipping(#[from] ShippingError),

    /// Payment gateway rejected or failed the transaction.
    #[error("payment error: {0}")]
    Payment(#[from] PaymentError),

    /// Callback URLs could not be built from the configured base URL.
    #[error("invalid base url: {0}")]
    BaseUrl(#[from] url::ParseError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}
