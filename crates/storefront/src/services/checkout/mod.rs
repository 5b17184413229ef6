//! Checkout service.
//!
//! Turns the caller's cart into a pending order and a Snap payment session.
//! Prices and stock are read from the product table at checkout time; the
//! cart only names products and quantities.

mod error;

pub use error::CheckoutError;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{info, instrument, warn};
use url::Url;

use warung_core::{AddressId, OrderId};

use crate::db::{AddressRepository, CartRepository, OrderRepository};
use crate::models::{
    Address, CartLine, CurrentUser, NewOrder, OrderItemSnapshot, generate_order_number,
};
use crate::services::payment::{
    Callbacks, CreditCard, CustomerDetails, ItemDetail, MidtransClient, SHIPPING_ITEM_ID,
    SnapRequest, TransactionDetails,
};
use crate::services::shipping::{CostRequest, ServiceQuote, ShippingClient};

/// Checkout form.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub address_id: AddressId,
    /// Courier code such as `jne`.
    pub courier: String,
    /// Service code of that courier such as `REG`.
    pub service: String,
}

/// What the UI needs to open the payment popup.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResponse {
    pub order_id: OrderId,
    pub order_number: String,
    pub token: String,
    pub redirect_url: String,
}

/// Checkout service.
pub struct CheckoutService<'a> {
    carts: CartRepository<'a>,
    addresses: AddressRepository<'a>,
    orders: OrderRepository<'a>,
    payment: &'a MidtransClient,
    shipping: &'a ShippingClient,
    base_url: &'a str,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(
        pool: &'a PgPool,
        payment: &'a MidtransClient,
        shipping: &'a ShippingClient,
        base_url: &'a str,
    ) -> Self {
        Self {
            carts: CartRepository::new(pool),
            addresses: AddressRepository::new(pool),
            orders: OrderRepository::new(pool),
            payment,
            shipping,
            base_url,
        }
    }

    /// Place an order for everything in the caller's cart.
    ///
    /// The pending order is written before the gateway is called so the
    /// gateway can never report on an order this service does not know. If
    /// the gateway call fails the order is removed again.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyCart`, `AddressNotFound` or
    /// `InsufficientStock` for carts that cannot be bought.
    /// Returns `CheckoutError::Shipping` if the courier service cannot be
    /// quoted and `CheckoutError::Payment` if the gateway fails.
    #[instrument(skip(self, user, request), fields(user_id = %user.id, courier = %request.courier))]
    pub async fn checkout(
        &self,
        user: &CurrentUser,
        request: &CheckoutRequest,
    ) -> Result<CheckoutResponse, CheckoutError> {
        let lines = self.carts.all(user.id).await?;
        let items = order_items(&lines)?;

        let address = self
            .addresses
            .get_owned(user.id, request.address_id)
            .await?
            .ok_or(CheckoutError::AddressNotFound)?;

        let quote = self.quote(&address, &items, request).await?;

        let order = NewOrder {
            order_number: generate_order_number(Utc::now()),
            user_id: user.id,
            address_id: address.id,
            delivery_address: address.one_line(),
            courier: quote.courier.clone(),
            courier_service: quote.service.clone(),
            items,
            shipping_amount: quote.cost,
        };
        if order.gross_amount().is_none() {
            return Err(CheckoutError::AmountOverflow);
        }

        let snap = snap_request(&order, user, &address, callbacks(self.base_url)?)?;
        let pending = self.orders.create_pending(&order).await?;

        let transaction = match self.payment.create_transaction(&snap).await {
            Ok(transaction) => transaction,
            Err(e) => {
                warn!(order_number = %pending.order_number, error = %e, "Gateway rejected checkout");
                if let Err(cleanup) = self.orders.delete_pending(pending.id).await {
                    warn!(order_number = %pending.order_number, error = %cleanup, "Failed to remove pending order");
                }
                return Err(e.into());
            }
        };

        info!(order_number = %pending.order_number, gross_amount = %pending.gross_amount, "Order placed");

        Ok(CheckoutResponse {
            order_id: pending.id,
            order_number: pending.order_number,
            token: transaction.token,
            redirect_url: transaction.redirect_url,
        })
    }

    async fn quote(
        &self,
        address: &Address,
        items: &[OrderItemSnapshot],
        request: &CheckoutRequest,
    ) -> Result<ServiceQuote, CheckoutError> {
        let units = items
            .iter()
            .map(|item| u32::try_from(item.quantity).unwrap_or(0))
            .fold(0_u32, u32::saturating_add);

        let cost = CostRequest {
            origin: None,
            destination: address.city_id.clone(),
            weight: self.shipping.parcel_weight(units),
            courier: request.courier.trim().to_lowercase(),
        };
        Ok(self.shipping.quote(&cost, request.service.trim()).await?)
    }
}

/// Snapshot every cart line at its current price, checking stock.
fn order_items(lines: &[CartLine]) -> Result<Vec<OrderItemSnapshot>, CheckoutError> {
    if lines.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    lines
        .iter()
        .map(|line| {
            if line.quantity > line.product.stock {
                return Err(CheckoutError::InsufficientStock {
                    product: line.product.name.clone(),
                    available: line.product.stock,
                    requested: line.quantity,
                });
            }
            Ok(OrderItemSnapshot {
                product_id: Some(line.product.id),
                product_name: line.product.name.clone(),
                unit_price: line.product.price,
                quantity: line.quantity,
            })
        })
        .collect()
}

/// Pages the gateway sends the buyer back to.
fn callbacks(base_url: &str) -> Result<Callbacks, url::ParseError> {
    let base = Url::parse(base_url)?;
    Ok(Callbacks {
        finish: base.join("/payment/success")?.to_string(),
        unfinish: base.join("/payment/pending")?.to_string(),
        error: base.join("/payment/failed")?.to_string(),
    })
}

/// Snap request for an order. The item lines, shipping included, add up to
/// the gross amount.
fn snap_request(
    order: &NewOrder,
    user: &CurrentUser,
    address: &Address,
    callbacks: Callbacks,
) -> Result<SnapRequest, CheckoutError> {
    let gross_amount = order.gross_amount().ok_or(CheckoutError::AmountOverflow)?;

    let mut item_details: Vec<ItemDetail> = order
        .items
        .iter()
        .map(|item| {
            let id = item
                .product_id
                .map_or_else(String::new, |id| id.to_string());
            ItemDetail::new(id, item.unit_price.amount(), item.quantity, &item.product_name)
        })
        .collect();
    item_details.push(ItemDetail::new(
        SHIPPING_ITEM_ID,
        order.shipping_amount.amount(),
        1,
        &format!(
            "Ongkir {} {}",
            order.courier.to_uppercase(),
            order.courier_service
        ),
    ));

    Ok(SnapRequest {
        transaction_details: TransactionDetails {
            order_id: order.order_number.clone(),
            gross_amount: gross_amount.amount(),
        },
        item_details,
        customer_details: CustomerDetails {
            first_name: user.name.clone(),
            email: user.email.to_string(),
            phone: Some(format!("+62{}", address.phone_number)),
        },
        credit_card: CreditCard { secure: true },
        callbacks,
    })
}
