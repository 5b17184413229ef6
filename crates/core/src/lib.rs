//! Warung Core - Shared domain types.
//!
//! This crate provides the types used across all Warung components:
//! - `storefront` - The HTTP service (public catalog, customer, admin, webhooks)
//! - `cli` - Command-line tools for migrations and user management
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no database
//! access, no HTTP clients. Database encoding is available behind the
//! `postgres` feature.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, emails, money, statuses and ratings
//! - [`pagination`] - Keyset cursors for listings and offset page math
//! - [`analytics`] - Dashboard date ranges

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod analytics;
pub mod pagination;
pub mod types;

pub use analytics::{DateRange, RangeError, RangeOption};
pub use pagination::{
    CursorPage, Direction, Limit, OffsetPage, PageError, PageInfo, PageRequest, ProductCursor,
    ProductSort, TimeCursor,
};
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_types_are_reachable_from_the_crate_root() {
        let limit = Limit::new(None, 12);
        assert!(limit.is_ok());
        assert_eq!(ProductSort::from_param(None), ProductSort::Newest);
        let _: Option<CursorPage<ProductCursor>> = None;
        let _: Option<TimeCursor> = None;
        let _: Option<DateRange> = None;
        assert!(PageRequest::new(Some(1), Some(10)).is_ok());
    }
}
