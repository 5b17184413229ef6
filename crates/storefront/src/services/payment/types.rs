//! Midtrans request and response types.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use warung_core::{FraudStatus, PaymentOutcome, TransactionStatus};

/// Item names longer than this are rejected by Snap.
pub const MAX_ITEM_NAME: usize = 50;

/// Item id of the synthetic shipping line.
pub const SHIPPING_ITEM_ID: &str = "ONGKIR";

/// Gateway timestamps are Western Indonesia Time (UTC+7).
const GATEWAY_UTC_OFFSET_SECS: i32 = 7 * 3600;

/// Body of a Snap transaction request.
#[derive(Debug, Clone, Serialize)]
pub struct SnapRequest {
    pub transaction_details: TransactionDetails,
    pub item_details: Vec<ItemDetail>,
    pub customer_details: CustomerDetails,
    pub credit_card: CreditCard,
    pub callbacks: Callbacks,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionDetails {
    pub order_id: String,
    pub gross_amount: i64,
}

/// One line of the Snap order summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemDetail {
    pub id: String,
    pub price: i64,
    pub quantity: i32,
    pub name: String,
}

impl ItemDetail {
    /// Build an item, shortening the name to what Snap accepts.
    #[must_use]
    pub fn new(id: impl Into<String>, price: i64, quantity: i32, name: &str) -> Self {
        Self {
            id: id.into(),
            price,
            quantity,
            name: name.chars().take(MAX_ITEM_NAME).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomerDetails {
    pub first_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreditCard {
    pub secure: bool,
}

/// Pages the buyer is sent back to after paying.
#[derive(Debug, Clone, Serialize)]
pub struct Callbacks {
    pub finish: String,
    pub unfinish: String,
    pub error: String,
}

/// A created Snap transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapTransaction {
    pub token: String,
    pub redirect_url: String,
}

/// Transaction status as reported by the status API.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub status_code: Option<String>,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub transaction_status: Option<TransactionStatus>,
    #[serde(default)]
    pub fraud_status: Option<FraudStatus>,
    #[serde(default)]
    pub payment_type: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    /// `YYYY-MM-DD HH:MM:SS` in gateway local time.
    #[serde(default)]
    pub settlement_time: Option<String>,
}

impl StatusResponse {
    /// What the reported status means for the order.
    #[must_use]
    pub fn outcome(&self) -> PaymentOutcome {
        self.transaction_status
            .map_or(PaymentOutcome::Ignored, |status| status.outcome(self.fraud_status))
    }

    /// Settlement time in UTC, if reported and well formed.
    #[must_use]
    pub fn settled_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.settlement_time.as_deref()?;
        let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").ok()?;
        let offset = FixedOffset::east_opt(GATEWAY_UTC_OFFSET_SECS)?;
        naive
            .and_local_timezone(offset)
            .single()
            .map(|at| at.with_timezone(&Utc))
    }
}
