//! Categories and products.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use warung_core::{CategoryId, ProductId, Rupiah};

use super::{ProductReview, ValidationError, optional, required};

static SLUG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("Invalid regex"));

// =============================================================================
// Categories
// =============================================================================

/// A category row.
#[derive(Debug, Clone, Serialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub color: Option<String>,
    pub parent_id: Option<CategoryId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// `{id, name}` pair used in dropdowns and embedded in products.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryRef {
    pub id: CategoryId,
    pub name: String,
}

/// Subcategory entry in the navigation tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubcategoryRef {
    pub name: String,
    pub slug: String,
}

/// A top-level category with its children, for navigation menus.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryTree {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub color: Option<String>,
    pub subcategories: Vec<SubcategoryRef>,
}

/// Category row in the admin table.
#[derive(Debug, Clone, Serialize)]
pub struct AdminCategory {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub color: Option<String>,
    pub parent_id: Option<CategoryId>,
    pub parent_name: Option<String>,
    pub product_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Which categories the admin table shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryKind {
    /// Top-level only.
    Parent,
    /// Subcategories only.
    Child,
    #[default]
    All,
}

/// Category form as submitted by admins.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryInput {
    pub name: String,
    pub slug: String,
    pub color: Option<String>,
    /// Empty string means top level.
    pub parent_id: Option<String>,
}

/// A validated category ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCategory {
    pub name: String,
    pub slug: String,
    pub color: Option<String>,
    pub parent_id: Option<CategoryId>,
}

impl CategoryInput {
    /// # Errors
    ///
    /// Returns `ValidationError` for blank names, malformed slugs, or a parent
    /// that is not a valid id.
    pub fn validate(&self) -> Result<NewCategory, ValidationError> {
        let name = required(&self.name, "name")?;
        let slug = required(&self.slug, "slug")?.to_lowercase();
        if !SLUG_PATTERN.is_match(&slug) {
            return Err(ValidationError::new(
                "slug may contain only letters, digits and single hyphens",
            ));
        }
        let parent_id = optional(self.parent_id.as_deref())
            .map(|raw| {
                raw.parse::<CategoryId>()
                    .map_err(|_| ValidationError::new("parent_id is not a valid id"))
            })
            .transpose()?;

        Ok(NewCategory {
            name,
            slug,
            color: optional(self.color.as_deref()),
            parent_id,
        })
    }
}

// =============================================================================
// Products
// =============================================================================

/// Product card in the public listing.
#[derive(Debug, Clone, Serialize)]
pub struct ProductSummary {
    pub id: ProductId,
    /// Unique, monotonically assigned tie-breaker for keyset pages.
    #[serde(skip_serializing)]
    pub sort_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub price: Rupiah,
    pub stock: i32,
    pub sold_count: i64,
    pub category: CategoryRef,
    pub average_rating: Option<f64>,
    pub review_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Product page.
#[derive(Debug, Clone, Serialize)]
pub struct ProductDetail {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub price: Rupiah,
    pub stock: i32,
    pub sold_count: i64,
    pub category: CategoryRef,
    pub average_rating: Option<f64>,
    pub review_count: i64,
    pub reviews: Vec<ProductReview>,
}

/// Product row in the admin table and the result of admin mutations.
#[derive(Debug, Clone, Serialize)]
pub struct AdminProduct {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub price: Rupiah,
    pub stock: i32,
    pub is_archived: bool,
    pub sold_count: i64,
    pub category: CategoryRef,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Product form as submitted by admins.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    pub name: String,
    pub description: Option<String>,
    pub content: Option<String>,
    pub price: i64,
    pub image_url: Option<String>,
    pub category_id: CategoryId,
    #[serde(default)]
    pub stock: i32,
    #[serde(default)]
    pub is_archived: bool,
}

/// A validated product ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub content: Option<String>,
    pub price: Rupiah,
    pub image_url: Option<String>,
    pub category_id: CategoryId,
    pub stock: i32,
    pub is_archived: bool,
}

impl ProductInput {
    /// # Errors
    ///
    /// Returns `ValidationError` for a blank name, a price below 1 or negative
    /// stock.
    pub fn validate(&self) -> Result<NewProduct, ValidationError> {
        let name = required(&self.name, "name")?;
        if self.price < 1 {
            return Err(ValidationError::new("price must be at least 1"));
        }
        if self.stock < 0 {
            return Err(ValidationError::new("stock cannot be negative"));
        }
        Ok(NewProduct {
            name,
            description: optional(self.description.as_deref()),
            content: optional(self.content.as_deref()),
            price: Rupiah::new(self.price),
            image_url: optional(self.image_url.as_deref()),
            category_id: self.category_id,
            stock: self.stock,
            is_archived: self.is_archived,
        })
    }
}

/// Stock availability filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum StockFilter {
    #[serde(rename = "in-stock")]
    InStock,
    #[serde(rename = "out-of-stock")]
    OutOfStock,
}

/// Public listing filters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilters {
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub stock: Option<StockFilter>,
    /// Category slug; includes its subcategories.
    pub category: Option<String>,
    /// Subcategory slug; takes precedence over `category`.
    pub subcategory: Option<String>,
    /// Case-insensitive name search.
    pub q: Option<String>,
}

impl ProductFilters {
    /// # Errors
    ///
    /// Returns `ValidationError` when `min_price` exceeds `max_price` or either
    /// is negative.
    pub fn validate(self) -> Result<Self, ValidationError> {
        if self.min_price.is_some_and(|p| p < 0) || self.max_price.is_some_and(|p| p < 0) {
            return Err(ValidationError::new("prices cannot be negative"));
        }
        if let (Some(min), Some(max)) = (self.min_price, self.max_price)
            && min > max
        {
            return Err(ValidationError::new("min_price cannot exceed max_price"));
        }
        Ok(Self {
            category: optional(self.category.as_deref()),
            subcategory: optional(self.subcategory.as_deref()),
            q: optional(self.q.as_deref()),
            ..self
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn category_input(slug: &str, parent: Option<&str>) -> CategoryInput {
        CategoryInput {
            name: "Minuman".to_owned(),
            slug: slug.to_owned(),
            color: Some("  ".to_owned()),
            parent_id: parent.map(ToOwned::to_owned),
        }
    }

    #[test]
    fn test_category_slug_is_normalized() {
        let category = category_input(" Kopi-Susu ", None).validate().unwrap();
        assert_eq!(category.slug, "kopi-susu");
        assert_eq!(category.color, None);
        assert_eq!(category.parent_id, None);
    }

    #[test]
    fn test_category_rejects_bad_slug() {
        assert!(category_input("kopi susu", None).validate().is_err());
        assert!(category_input("kopi--susu", None).validate().is_err());
        assert!(category_input("-kopi", None).validate().is_err());
    }

    #[test]
    fn test_category_empty_parent_means_top_level() {
        let category = category_input("teh", Some("")).validate().unwrap();
        assert_eq!(category.parent_id, None);
        assert!(category_input("teh", Some("nope")).validate().is_err());
    }

    #[test]
    fn test_product_validation() {
        let mut input = ProductInput {
            name: "Kopi Gayo 250g".to_owned(),
            description: Some(String::new()),
            content: None,
            price: 85_000,
            image_url: Some(String::new()),
            category_id: CategoryId::generate(),
            stock: 10,
            is_archived: false,
        };
        let product = input.validate().unwrap();
        assert_eq!(product.image_url, None);
        assert_eq!(product.description, None);

        input.price = 0;
        assert!(input.validate().is_err());
        input.price = 1;
        input.stock = -1;
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_filters_price_bounds() {
        let filters = ProductFilters {
            min_price: Some(10),
            max_price: Some(5),
            ..ProductFilters::default()
        };
        assert!(filters.validate().is_err());

        let filters = ProductFilters {
            q: Some("  ".to_owned()),
            ..ProductFilters::default()
        }
        .validate()
        .unwrap();
        assert_eq!(filters.q, None);
    }

    #[test]
    fn test_stock_filter_parses() {
        let f: StockFilter = serde_json::from_str("\"in-stock\"").unwrap();
        assert_eq!(f, StockFilter::InStock);
        assert!(serde_json::from_str::<StockFilter>("\"maybe\"").is_err());
    }
}
