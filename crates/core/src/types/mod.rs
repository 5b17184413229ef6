//! Core types for Warung.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod money;
pub mod rating;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::Rupiah;
pub use rating::{Rating, RatingError};
pub use status::*;
