//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::services::{MidtransClient, PaymentError, ShippingClient, ShippingError};

/// Error building the outbound API clients.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("payment client: {0}")]
    Payment(#[from] PaymentError),
    #[error("shipping client: {0}")]
    Shipping(#[from] ShippingError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    payment: MidtransClient,
    shipping: ShippingClient,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if an API client cannot be built from the
    /// configuration.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, StateError> {
        let payment = MidtransClient::new(&config.midtrans)?;
        let shipping = ShippingClient::new(&config.shipping)?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                payment,
                shipping,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the Midtrans client.
    #[must_use]
    pub fn payment(&self) -> &MidtransClient {
        &self.inner.payment
    }

    /// Get a reference to the `RajaOngkir` client.
    #[must_use]
    pub fn shipping(&self) -> &ShippingClient {
        &self.inner.shipping
    }
}
