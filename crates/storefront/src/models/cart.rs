//! Cart lines.

use chrono::{DateTime, Utc};
use serde::Serialize;

use warung_core::{CartItemId, ProductId, Rupiah};

/// Product fields shown next to a cart line.
#[derive(Debug, Clone, Serialize)]
pub struct CartProduct {
    pub id: ProductId,
    pub name: String,
    pub price: Rupiah,
    pub image_url: Option<String>,
    pub stock: i32,
}

/// One product in a user's cart.
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub id: CartItemId,
    pub quantity: i32,
    pub product: CartProduct,
    pub created_at: DateTime<Utc>,
}

impl CartLine {
    /// Price of the line at the current product price.
    #[must_use]
    pub fn subtotal(&self) -> Option<Rupiah> {
        self.product.price.checked_mul(self.quantity)
    }
}
