//! Product repository.
//!
//! The public listing uses keyset pagination over `(metric, sort_id)` where
//! the metric depends on the sort mode. `sort_id` is unique, so the pair is a
//! total order and the row-value comparison
//! `(metric, sort_id) > ($m, $r)` (or `<` for descending sorts) starts the
//! next page strictly after the last row the client saw.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use warung_core::{
    CategoryId, CursorPage, Limit, PageRequest, ProductCursor, ProductId, ProductSort, Rating,
    ReviewId, Rupiah,
};

use super::RepositoryError;
use super::users::escape_like;
use crate::models::{
    AdminProduct, CategoryRef, NewProduct, ProductDetail, ProductFilters, ProductReview,
    ProductSummary, StockFilter,
};

const MISSING_CATEGORY: &str = "category does not exist";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ProductSummaryRow {
    id: Uuid,
    sort_id: i64,
    name: String,
    description: Option<String>,
    image_url: Option<String>,
    price: i64,
    stock: i32,
    sold_count: i64,
    category_id: Uuid,
    category_name: String,
    average_rating: Option<f64>,
    review_count: i64,
    created_at: DateTime<Utc>,
}

impl From<ProductSummaryRow> for ProductSummary {
    fn from(row: ProductSummaryRow) -> Self {
        Self {
            id: ProductId::new(row.id),
            sort_id: row.sort_id,
            name: row.name,
            description: row.description,
            image_url: row.image_url,
            price: Rupiah::new(row.price),
            stock: row.stock,
            sold_count: row.sold_count,
            category: CategoryRef {
                id: CategoryId::new(row.category_id),
                name: row.category_name,
            },
            average_rating: row.average_rating,
            review_count: row.review_count,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProductDetailRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    content: Option<String>,
    image_url: Option<String>,
    price: i64,
    stock: i32,
    sold_count: i64,
    category_id: Uuid,
    category_name: String,
    average_rating: Option<f64>,
    review_count: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct ProductReviewRow {
    id: Uuid,
    rating: i16,
    description: Option<String>,
    reviewer_name: String,
    reviewer_image_url: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ProductReviewRow> for ProductReview {
    type Error = RepositoryError;

    fn try_from(row: ProductReviewRow) -> Result<Self, Self::Error> {
        let rating = Rating::new(i64::from(row.rating))
            .map_err(|e| RepositoryError::DataCorruption(format!("review {}: {e}", row.id)))?;
        Ok(Self {
            id: ReviewId::new(row.id),
            rating,
            description: row.description,
            reviewer_name: row.reviewer_name,
            reviewer_image_url: row.reviewer_image_url,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AdminProductRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    content: Option<String>,
    image_url: Option<String>,
    price: i64,
    stock: i32,
    is_archived: bool,
    sold_count: i64,
    category_id: Uuid,
    category_name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AdminProductRow> for AdminProduct {
    fn from(row: AdminProductRow) -> Self {
        Self {
            id: ProductId::new(row.id),
            name: row.name,
            description: row.description,
            content: row.content,
            image_url: row.image_url,
            price: Rupiah::new(row.price),
            stock: row.stock,
            is_archived: row.is_archived,
            sold_count: row.sold_count,
            category: CategoryRef {
                id: CategoryId::new(row.category_id),
                name: row.category_name,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Archived and active product counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ActivityCounts {
    pub active: i64,
    pub inactive: i64,
}

const ADMIN_SELECT: &str = r"
    SELECT p.id, p.name, p.description, p.content, p.image_url, p.price, p.stock,
           p.is_archived, p.sold_count, p.created_at, p.updated_at,
           c.id AS category_id, c.name AS category_name
";

// =============================================================================
// Listing query
// =============================================================================

/// Resolved listing filters: category slugs turned into ids.
#[derive(Debug, Clone, Default)]
struct ListingScope {
    min_price: Option<i64>,
    max_price: Option<i64>,
    stock: Option<StockFilter>,
    category_ids: Option<Vec<Uuid>>,
    name_pattern: Option<String>,
}

/// Value of the sort metric for a listed product.
const fn metric_of(sort: ProductSort, product: &ProductSummary) -> i64 {
    match sort {
        ProductSort::Newest => product.sort_id,
        ProductSort::LowestPrice | ProductSort::HighestPrice => product.price.amount(),
        ProductSort::BestSeller => product.sold_count,
    }
}

fn listing_query(
    scope: ListingScope,
    sort: ProductSort,
    cursor: Option<ProductCursor>,
    fetch: i64,
) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::<Postgres>::new(
        r"SELECT p.id, p.sort_id, p.name, p.description, p.image_url, p.price, p.stock,
       p.sold_count, p.created_at, c.id AS category_id, c.name AS category_name,
       r.average_rating, COALESCE(r.review_count, 0) AS review_count
FROM shop.products p
JOIN shop.categories c ON c.id = p.category_id
LEFT JOIN LATERAL (
    SELECT AVG(rating)::FLOAT8 AS average_rating, COUNT(*) AS review_count
    FROM shop.reviews WHERE product_id = p.id
) r ON TRUE
WHERE NOT p.is_archived",
    );

    if let Some(min) = scope.min_price {
        qb.push(" AND p.price >= ").push_bind(min);
    }
    if let Some(max) = scope.max_price {
        qb.push(" AND p.price <= ").push_bind(max);
    }
    match scope.stock {
        Some(StockFilter::InStock) => {
            qb.push(" AND p.stock >= 1");
        }
        Some(StockFilter::OutOfStock) => {
            qb.push(" AND p.stock = 0");
        }
        None => {}
    }
    if let Some(ids) = scope.category_ids {
        qb.push(" AND p.category_id = ANY(").push_bind(ids).push(")");
    }
    if let Some(pattern) = scope.name_pattern {
        qb.push(" AND p.name ILIKE ").push_bind(pattern);
    }

    let column = sort.metric_column();
    let direction = sort.direction();
    if let Some(cursor) = cursor {
        qb.push(format!(
            " AND (p.{column}, p.sort_id) {} (",
            direction.after_operator()
        ))
        .push_bind(cursor.metric)
        .push(", ")
        .push_bind(cursor.row)
        .push(")");
    }

    let dir = direction.as_sql();
    if column == "sort_id" {
        qb.push(format!(" ORDER BY p.sort_id {dir} LIMIT "));
    } else {
        qb.push(format!(" ORDER BY p.{column} {dir}, p.sort_id {dir} LIMIT "));
    }
    qb.push_bind(fetch);
    qb
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for products.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// One page of the public catalog.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown category or
    /// subcategory slug.
    #[tracing::instrument(skip(self))]
    pub async fn list_public(
        &self,
        filters: ProductFilters,
        sort: ProductSort,
        cursor: Option<ProductCursor>,
        limit: Limit,
    ) -> Result<CursorPage<ProductSummary>, RepositoryError> {
        let category_ids = self
            .category_scope(filters.category.as_deref(), filters.subcategory.as_deref())
            .await?;

        let scope = ListingScope {
            min_price: filters.min_price,
            max_price: filters.max_price,
            stock: filters.stock,
            category_ids,
            name_pattern: filters.q.map(|q| format!("%{}%", escape_like(&q))),
        };

        let rows = listing_query(scope, sort, cursor, limit.fetch())
            .build_query_as::<ProductSummaryRow>()
            .fetch_all(self.pool)
            .await?;

        let products: Vec<ProductSummary> = rows.into_iter().map(Into::into).collect();
        Ok(CursorPage::from_overfetch(products, limit, |p| {
            ProductCursor::new(sort, metric_of(sort, p), p.sort_id).encode()
        }))
    }

    /// Category ids a listing is limited to. A subcategory selects only
    /// itself; a category selects itself and its children.
    async fn category_scope(
        &self,
        category: Option<&str>,
        subcategory: Option<&str>,
    ) -> Result<Option<Vec<Uuid>>, RepositoryError> {
        if let Some(slug) = subcategory {
            let id: Option<Uuid> =
                sqlx::query_scalar("SELECT id FROM shop.categories WHERE slug = $1")
                    .bind(slug)
                    .fetch_optional(self.pool)
                    .await?;
            return id.map(|id| Some(vec![id])).ok_or(RepositoryError::NotFound);
        }

        let Some(slug) = category else {
            return Ok(None);
        };
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r"
            SELECT id FROM shop.categories WHERE slug = $1
            UNION ALL
            SELECT child.id FROM shop.categories child
            JOIN shop.categories parent ON parent.id = child.parent_id
            WHERE parent.slug = $1
            ",
        )
        .bind(slug)
        .fetch_all(self.pool)
        .await?;

        if ids.is_empty() {
            return Err(RepositoryError::NotFound);
        }
        Ok(Some(ids))
    }

    /// Product page with reviews. Archived products are hidden.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn get_one(&self, id: ProductId) -> Result<ProductDetail, RepositoryError> {
        let row = sqlx::query_as::<_, ProductDetailRow>(
            r"
            SELECT p.id, p.name, p.description, p.content, p.image_url, p.price, p.stock,
                   p.sold_count, c.id AS category_id, c.name AS category_name,
                   r.average_rating, COALESCE(r.review_count, 0) AS review_count
            FROM shop.products p
            JOIN shop.categories c ON c.id = p.category_id
            LEFT JOIN LATERAL (
                SELECT AVG(rating)::FLOAT8 AS average_rating, COUNT(*) AS review_count
                FROM shop.reviews WHERE product_id = p.id
            ) r ON TRUE
            WHERE p.id = $1 AND NOT p.is_archived
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let reviews = sqlx::query_as::<_, ProductReviewRow>(
            r"
            SELECT r.id, r.rating, r.description, r.created_at,
                   u.name AS reviewer_name, u.image_url AS reviewer_image_url
            FROM shop.reviews r
            JOIN shop.users u ON u.id = r.user_id
            WHERE r.product_id = $1
            ORDER BY r.created_at DESC, r.id DESC
            ",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(TryInto::try_into)
        .collect::<Result<Vec<_>, _>>()?;

        Ok(ProductDetail {
            id: ProductId::new(row.id),
            name: row.name,
            description: row.description,
            content: row.content,
            image_url: row.image_url,
            price: Rupiah::new(row.price),
            stock: row.stock,
            sold_count: row.sold_count,
            category: CategoryRef {
                id: CategoryId::new(row.category_id),
                name: row.category_name,
            },
            average_rating: row.average_rating,
            review_count: row.review_count,
            reviews,
        })
    }

    /// Admin table page, newest first, including archived products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_admin(
        &self,
        page: PageRequest,
        q: Option<&str>,
    ) -> Result<(Vec<AdminProduct>, i64), RepositoryError> {
        let pattern = q.map(|q| format!("%{}%", escape_like(q)));

        let rows = sqlx::query_as::<_, AdminProductRow>(&format!(
            r"
            {ADMIN_SELECT}
            FROM shop.products p
            JOIN shop.categories c ON c.id = p.category_id
            WHERE $1::TEXT IS NULL OR p.name ILIKE $1
            ORDER BY p.created_at DESC, p.sort_id DESC
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(pattern.as_deref())
        .bind(page.page_size())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM shop.products WHERE $1::TEXT IS NULL OR name ILIKE $1",
        )
        .bind(pattern.as_deref())
        .fetch_one(self.pool)
        .await?;

        Ok((rows.into_iter().map(AdminProduct::from).collect(), total))
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the category does not exist.
    pub async fn create(&self, product: &NewProduct) -> Result<AdminProduct, RepositoryError> {
        let row = sqlx::query_as::<_, AdminProductRow>(&format!(
            r"
            WITH p AS (
                INSERT INTO shop.products
                    (name, description, content, price, image_url, category_id, stock, is_archived)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                RETURNING *
            )
            {ADMIN_SELECT}
            FROM p JOIN shop.categories c ON c.id = p.category_id
            "
        ))
        .bind(&product.name)
        .bind(product.description.as_deref())
        .bind(product.content.as_deref())
        .bind(product.price)
        .bind(product.image_url.as_deref())
        .bind(product.category_id)
        .bind(product.stock)
        .bind(product.is_archived)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::on_foreign_key_violation(e, MISSING_CATEGORY))?;

        Ok(row.into())
    }

    /// Replace a product's editable fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    /// Returns `RepositoryError::Conflict` if the category does not exist.
    pub async fn update(
        &self,
        id: ProductId,
        product: &NewProduct,
    ) -> Result<AdminProduct, RepositoryError> {
        let row = sqlx::query_as::<_, AdminProductRow>(&format!(
            r"
            WITH p AS (
                UPDATE shop.products
                SET name = $2, description = $3, content = $4, price = $5, image_url = $6,
                    category_id = $7, stock = $8, is_archived = $9, updated_at = NOW()
                WHERE id = $1
                RETURNING *
            )
            {ADMIN_SELECT}
            FROM p JOIN shop.categories c ON c.id = p.category_id
            "
        ))
        .bind(id)
        .bind(&product.name)
        .bind(product.description.as_deref())
        .bind(product.content.as_deref())
        .bind(product.price)
        .bind(product.image_url.as_deref())
        .bind(product.category_id)
        .bind(product.stock)
        .bind(product.is_archived)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::on_foreign_key_violation(e, MISSING_CATEGORY))?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Delete a product. Order items keep their snapshot; cart lines and
    /// reviews go with it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.products WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Count active and archived products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn activity_counts(&self) -> Result<ActivityCounts, RepositoryError> {
        let (active, inactive): (i64, i64) = sqlx::query_as(
            r"
            SELECT COUNT(*) FILTER (WHERE NOT is_archived),
                   COUNT(*) FILTER (WHERE is_archived)
            FROM shop.products
            ",
        )
        .fetch_one(self.pool)
        .await?;

        Ok(ActivityCounts { active, inactive })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sql(scope: ListingScope, sort: ProductSort, cursor: Option<ProductCursor>) -> String {
        listing_query(scope, sort, cursor, 13).sql().to_owned()
    }

    #[test]
    fn test_listing_first_page_has_no_cursor_predicate() {
        let sql = sql(ListingScope::default(), ProductSort::Newest, None);
        assert!(sql.contains("WHERE NOT p.is_archived"));
        assert!(!sql.contains("p.sort_id) <"));
        assert!(sql.ends_with("ORDER BY p.sort_id DESC LIMIT $1"));
    }

    #[test]
    fn test_newest_orders_by_sort_id_once() {
        let cursor = ProductCursor::new(ProductSort::Newest, 17, 17);
        let sql = sql(ListingScope::default(), ProductSort::Newest, Some(cursor));
        assert!(sql.contains("AND (p.sort_id, p.sort_id) < ($1, $2)"));
        assert!(sql.ends_with("ORDER BY p.sort_id DESC LIMIT $3"));
        assert_eq!(sql.matches("p.sort_id DESC").count(), 1);
    }

    #[test]
    fn test_listing_ascending_cursor_uses_greater_than() {
        let cursor = ProductCursor::new(ProductSort::LowestPrice, 10_000, 7);
        let sql = sql(ListingScope::default(), ProductSort::LowestPrice, Some(cursor));
        assert!(sql.contains("AND (p.price, p.sort_id) > ($1, $2)"));
        assert!(sql.ends_with("ORDER BY p.price ASC, p.sort_id ASC LIMIT $3"));
    }

    #[test]
    fn test_listing_descending_cursor_uses_less_than() {
        let cursor = ProductCursor::new(ProductSort::BestSeller, 40, 3);
        let sql = sql(ListingScope::default(), ProductSort::BestSeller, Some(cursor));
        assert!(sql.contains("AND (p.sold_count, p.sort_id) < ($1, $2)"));
        assert!(sql.ends_with("ORDER BY p.sold_count DESC, p.sort_id DESC LIMIT $3"));
    }

    #[test]
    fn test_listing_filters_bind_in_order() {
        let scope = ListingScope {
            min_price: Some(1_000),
            max_price: Some(50_000),
            stock: Some(StockFilter::OutOfStock),
            category_ids: Some(vec![Uuid::nil()]),
            name_pattern: Some("%kopi%".to_owned()),
        };
        let sql = sql(scope, ProductSort::HighestPrice, None);
        assert!(sql.contains("AND p.price >= $1"));
        assert!(sql.contains("AND p.price <= $2"));
        assert!(sql.contains("AND p.stock = 0"));
        assert!(sql.contains("AND p.category_id = ANY($3)"));
        assert!(sql.contains("AND p.name ILIKE $4"));
        assert!(sql.ends_with("ORDER BY p.price DESC, p.sort_id DESC LIMIT $5"));
    }

    #[test]
    fn test_in_stock_filter() {
        let scope = ListingScope {
            stock: Some(StockFilter::InStock),
            ..ListingScope::default()
        };
        assert!(sql(scope, ProductSort::Newest, None).contains("AND p.stock >= 1"));
    }

    #[test]
    fn test_metric_of_matches_sort_column() {
        let product = ProductSummary {
            id: ProductId::generate(),
            sort_id: 42,
            name: "Kopi".to_owned(),
            description: None,
            image_url: None,
            price: Rupiah::new(25_000),
            stock: 3,
            sold_count: 9,
            category: CategoryRef {
                id: CategoryId::generate(),
                name: "Minuman".to_owned(),
            },
            average_rating: None,
            review_count: 0,
            created_at: Utc::now(),
        };
        assert_eq!(metric_of(ProductSort::Newest, &product), 42);
        assert_eq!(metric_of(ProductSort::LowestPrice, &product), 25_000);
        assert_eq!(metric_of(ProductSort::HighestPrice, &product), 25_000);
        assert_eq!(metric_of(ProductSort::BestSeller, &product), 9);
    }
}
