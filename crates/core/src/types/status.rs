//! Status enums for users, orders, and payment gateway transactions.

use serde::{Deserialize, Serialize};

/// Role of a shop user.
///
/// Mirrored from the identity provider's public metadata on every
/// `user.created` / `user.updated` webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shop.user_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Can manage the catalog, orders, and view analytics.
    Admin,
    /// Regular customer.
    #[default]
    User,
}

impl UserRole {
    /// Whether this role may use the admin console.
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::User => write!(f, "user"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "user" => Ok(Self::User),
            _ => Err(format!("invalid user role: {s}")),
        }
    }
}

/// Lifecycle status of an order.
///
/// ```text
/// pending ──> paid ──> shipped ──> completed
///    │
///    └──> cancelled | denied | expired
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shop.order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created at checkout, waiting for the gateway to report payment.
    #[default]
    Pending,
    /// Payment settled.
    Paid,
    /// Handed to the courier.
    Shipped,
    /// Delivered.
    Completed,
    /// Buyer or merchant cancelled the payment.
    Cancelled,
    /// Gateway or fraud check refused the payment.
    Denied,
    /// Payment window closed without payment.
    Expired,
}

impl OrderStatus {
    /// Statuses that never change again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Cancelled | Self::Denied | Self::Expired
        )
    }

    /// Whether an order in `self` may move to `next`.
    ///
    /// Setting the current status again is not a transition and is rejected.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (
                Self::Pending,
                Self::Paid | Self::Cancelled | Self::Denied | Self::Expired
            ) | (Self::Paid, Self::Shipped)
                | (Self::Shipped, Self::Completed)
        )
    }

    /// Statuses only checkout and payment notifications may set. Admins may
    /// ship, complete or cancel orders, nothing else.
    #[must_use]
    pub const fn is_set_by_gateway(self) -> bool {
        matches!(
            self,
            Self::Pending | Self::Paid | Self::Denied | Self::Expired
        )
    }

    /// Snake-case name as stored in the database.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Shipped => "shipped",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Denied => "denied",
            Self::Expired => "expired",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "shipped" => Ok(Self::Shipped),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            "denied" => Ok(Self::Denied),
            "expired" => Ok(Self::Expired),
            _ => Err(format!("invalid order status: {s}")),
        }
    }
}

/// `transaction_status` values reported by the payment gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Authorize,
    Capture,
    Settlement,
    Pending,
    Deny,
    Cancel,
    Expire,
    Failure,
    Refund,
    PartialRefund,
    /// Any value this service does not know about.
    #[serde(other)]
    Unknown,
}

/// `fraud_status` reported alongside card captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FraudStatus {
    Accept,
    Challenge,
    Deny,
    #[serde(other)]
    Unknown,
}

/// What a gateway notification means for the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// Money is in; mark the order paid.
    Paid,
    /// Still waiting on the buyer.
    Waiting,
    /// The payment will never complete; move the order to this status.
    Failed(OrderStatus),
    /// Nothing to do (refunds, authorizations, unknown values).
    Ignored,
}

impl TransactionStatus {
    /// Map a gateway status to the action to take on the order.
    #[must_use]
    pub const fn outcome(self, fraud: Option<FraudStatus>) -> PaymentOutcome {
        match (self, fraud) {
            (Self::Settlement, _) | (Self::Capture, None | Some(FraudStatus::Accept)) => {
                PaymentOutcome::Paid
            }
            (Self::Capture, Some(FraudStatus::Challenge)) | (Self::Pending, _) => {
                PaymentOutcome::Waiting
            }
            (Self::Capture, Some(FraudStatus::Deny)) | (Self::Deny, _) => {
                PaymentOutcome::Failed(OrderStatus::Denied)
            }
            (Self::Cancel, _) => PaymentOutcome::Failed(OrderStatus::Cancelled),
            (Self::Expire, _) => PaymentOutcome::Failed(OrderStatus::Expired),
            _ => PaymentOutcome::Ignored,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_happy_path() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Paid));
        assert!(OrderStatus::Paid.can_transition_to(OrderStatus::Shipped));
        assert!(OrderStatus::Shipped.can_transition_to(OrderStatus::Completed));
    }

    #[test]
    fn test_order_status_rejects_skips_and_reversals() {
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Shipped));
        assert!(!OrderStatus::Paid.can_transition_to(OrderStatus::Pending));
        assert!(!OrderStatus::Paid.can_transition_to(OrderStatus::Paid));
        assert!(!OrderStatus::Expired.can_transition_to(OrderStatus::Paid));
        assert!(!OrderStatus::Completed.can_transition_to(OrderStatus::Shipped));
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(!OrderStatus::Paid.is_terminal());
        assert!(OrderStatus::Completed.is_terminal());
        assert!(OrderStatus::Denied.is_terminal());
    }

    #[test]
    fn test_gateway_owned_statuses() {
        assert!(OrderStatus::Paid.is_set_by_gateway());
        assert!(OrderStatus::Expired.is_set_by_gateway());
        assert!(!OrderStatus::Shipped.is_set_by_gateway());
        assert!(!OrderStatus::Cancelled.is_set_by_gateway());
    }

    #[test]
    fn test_order_status_str_roundtrip() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Paid,
            OrderStatus::Shipped,
            OrderStatus::Completed,
            OrderStatus::Cancelled,
            OrderStatus::Denied,
            OrderStatus::Expired,
        ] {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("refunded".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_transaction_outcomes() {
        assert_eq!(
            TransactionStatus::Settlement.outcome(None),
            PaymentOutcome::Paid
        );
        assert_eq!(
            TransactionStatus::Capture.outcome(Some(FraudStatus::Accept)),
            PaymentOutcome::Paid
        );
        assert_eq!(
            TransactionStatus::Capture.outcome(Some(FraudStatus::Challenge)),
            PaymentOutcome::Waiting
        );
        assert_eq!(
            TransactionStatus::Pending.outcome(None),
            PaymentOutcome::Waiting
        );
        assert_eq!(
            TransactionStatus::Expire.outcome(None),
            PaymentOutcome::Failed(OrderStatus::Expired)
        );
        assert_eq!(
            TransactionStatus::Cancel.outcome(None),
            PaymentOutcome::Failed(OrderStatus::Cancelled)
        );
        assert_eq!(
            TransactionStatus::Refund.outcome(None),
            PaymentOutcome::Ignored
        );
    }

    #[test]
    fn test_unknown_gateway_status_deserializes() {
        let status: TransactionStatus = serde_json::from_str("\"chargeback\"").unwrap();
        assert_eq!(status, TransactionStatus::Unknown);
        let status: TransactionStatus = serde_json::from_str("\"partial_refund\"").unwrap();
        assert_eq!(status, TransactionStatus::PartialRefund);
    }

    #[test]
    fn test_user_role_parse() {
        assert_eq!("admin".parse::<UserRole>().unwrap(), UserRole::Admin);
        assert!(UserRole::Admin.is_admin());
        assert!(!UserRole::default().is_admin());
        assert!("root".parse::<UserRole>().is_err());
    }
}
