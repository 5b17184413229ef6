//! Product reviews.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warung_core::{ProductId, Rating, ReviewId, UserId};

use super::optional;

/// A review as stored.
#[derive(Debug, Clone, Serialize)]
pub struct Review {
    pub id: ReviewId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub rating: Rating,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A review shown on a product page, with the reviewer's name.
#[derive(Debug, Clone, Serialize)]
pub struct ProductReview {
    pub id: ReviewId,
    pub rating: Rating,
    pub description: Option<String>,
    pub reviewer_name: String,
    pub reviewer_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Review form. `rating` is range-checked while deserializing.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewInput {
    pub rating: Rating,
    pub description: Option<String>,
}

impl ReviewInput {
    /// Description with blanks treated as absent.
    #[must_use]
    pub fn description(&self) -> Option<String> {
        optional(self.description.as_deref())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_review_input_rejects_bad_rating() {
        assert!(serde_json::from_str::<ReviewInput>(r#"{"rating": 0}"#).is_err());
        let input: ReviewInput =
            serde_json::from_str(r#"{"rating": 5, "description": "  "}"#).unwrap();
        assert_eq!(input.rating.get(), 5);
        assert_eq!(input.description(), None);
    }
}
