//! Payment notification handling.
//!
//! The notification body is only used to learn which order changed. The
//! order's actual state is re-read from the gateway status API and applied
//! idempotently: an order leaves `pending` at most once.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, instrument};

use warung_core::{OrderStatus, PaymentOutcome};

use crate::db::orders::{PaymentDetails, Settlement};
use crate::db::{OrderRepository, RepositoryError};
use crate::services::payment::{MidtransClient, PaymentError};

/// Errors that can occur while applying a payment notification.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// Neither this service nor the gateway knows the order.
    #[error("unknown order: {0}")]
    UnknownOrder(String),

    /// Status lookup failed.
    #[error("payment error: {0}")]
    Payment(PaymentError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<PaymentError> for NotificationError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::NotFound(order_id) => Self::UnknownOrder(order_id),
            other => Self::Payment(other),
        }
    }
}

/// Gateway notification body. Only the order reference is read.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentNotification {
    /// The order number this service sent at checkout.
    pub order_id: String,
}

/// What a notification did to the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationOutcome {
    Paid { stock_shortfall: bool },
    Waiting,
    Failed(OrderStatus),
    /// The order had already left `pending`; nothing changed.
    AlreadySettled(OrderStatus),
    Ignored,
}

impl NotificationOutcome {
    /// Acknowledgement sent back to the gateway.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Paid { .. } => "OK",
            Self::Waiting => "Waiting Payment",
            Self::Failed(_) => "Failure",
            Self::AlreadySettled(_) => "Already processed",
            Self::Ignored => "Ignored",
        }
    }
}

/// Acknowledgement body.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationAck {
    pub message: &'static str,
}

impl From<NotificationOutcome> for NotificationAck {
    fn from(outcome: NotificationOutcome) -> Self {
        Self {
            message: outcome.message(),
        }
    }
}

/// Applies gateway notifications to orders.
pub struct NotificationService<'a> {
    orders: OrderRepository<'a>,
    payment: &'a MidtransClient,
}

impl<'a> NotificationService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, payment: &'a MidtransClient) -> Self {
        Self {
            orders: OrderRepository::new(pool),
            payment,
        }
    }

    /// Re-read the order's status from the gateway and apply it.
    ///
    /// # Errors
    ///
    /// Returns `NotificationError::UnknownOrder` if the order number is not
    /// known locally or to the gateway.
    #[instrument(skip(self, notification), fields(order_number = %notification.order_id))]
    pub async fn handle(
        &self,
        notification: &PaymentNotification,
    ) -> Result<NotificationOutcome, NotificationError> {
        let order_number = notification.order_id.trim();
        if self.orders.find_by_number(order_number).await?.is_none() {
            return Err(NotificationError::UnknownOrder(order_number.to_owned()));
        }

        let status = self.payment.transaction_status(order_number).await?;
        let outcome = status.outcome();
        info!(?outcome, transaction_status = ?status.transaction_status, "Payment status fetched");

        let applied = match outcome {
            PaymentOutcome::Paid => {
                let details = PaymentDetails {
                    payment_type: status.payment_type.clone(),
                    currency: status.currency.clone(),
                    settlement_time: status.settled_at(),
                };
                match self.orders.mark_paid(order_number, &details).await? {
                    Settlement::Applied { stock_shortfall } => {
                        NotificationOutcome::Paid { stock_shortfall }
                    }
                    Settlement::AlreadySettled(current) => {
                        NotificationOutcome::AlreadySettled(current)
                    }
                }
            }
            PaymentOutcome::Failed(terminal) => {
                match self.orders.mark_failed(order_number, terminal).await? {
                    Settlement::Applied { .. } => NotificationOutcome::Failed(terminal),
                    Settlement::AlreadySettled(current) => {
                        NotificationOutcome::AlreadySettled(current)
                    }
                }
            }
            PaymentOutcome::Waiting => NotificationOutcome::Waiting,
            PaymentOutcome::Ignored => NotificationOutcome::Ignored,
        };

        Ok(applied)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_reads_only_order_id() {
        let notification: PaymentNotification = serde_json::from_str(
            r#"{"order_id":"ORD-20250309140507-123456","transaction_status":"settlement",
                "gross_amount":"188000.00","signature_key":"abc"}"#,
        )
        .unwrap();
        assert_eq!(notification.order_id, "ORD-20250309140507-123456");
    }

    #[test]
    fn test_acknowledgement_messages() {
        assert_eq!(NotificationOutcome::Waiting.message(), "Waiting Payment");
        assert_eq!(
            NotificationOutcome::Failed(OrderStatus::Expired).message(),
            "Failure"
        );
        assert_eq!(
            NotificationAck::from(NotificationOutcome::Paid {
                stock_shortfall: false
            })
            .message,
            "OK"
        );
    }

    #[test]
    fn test_gateway_not_found_is_unknown_order() {
        let err = NotificationError::from(PaymentError::NotFound("ORD-1".to_owned()));
        assert!(matches!(err, NotificationError::UnknownOrder(id) if id == "ORD-1"));
    }
}
