//! Domain models for the storefront.
//!
//! These are the validated shapes handlers work with and serialize to JSON.
//! Database row types live next to their queries in [`crate::db`].

pub mod address;
pub mod catalog;
pub mod cart;
pub mod order;
pub mod review;
pub mod user;

pub use address::{Address, AddressInput, NewAddress};
pub use catalog::{
    AdminCategory, AdminProduct, Category, CategoryInput, CategoryKind, CategoryRef, CategoryTree,
    NewCategory, NewProduct, ProductDetail, ProductFilters, ProductInput, ProductSummary,
    StockFilter, SubcategoryRef,
};
pub use cart::{CartLine, CartProduct};
pub use order::{
    AdminOrder, CustomerOrder, CustomerOrderItem, NewOrder, Order, OrderItemSnapshot,
    SalesSummary, generate_order_number,
};
pub use review::{ProductReview, Review, ReviewInput};
pub use user::{CurrentUser, Customer, IdentityProfile, User};

use thiserror::Error;

/// Input failed validation. The message is safe to show to clients.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Trim a required text field, rejecting blanks.
pub(crate) fn required(value: &str, field: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(format!("{field} is required")));
    }
    Ok(trimmed.to_owned())
}

/// Trim an optional text field, treating blanks as absent.
pub(crate) fn optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToOwned::to_owned)
}
