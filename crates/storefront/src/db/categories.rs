//! Category repository.
//!
//! Categories nest one level deep: a category either has a top-level parent
//! or is itself top level.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use warung_core::{CategoryId, PageRequest};

use super::RepositoryError;
use crate::models::{
    AdminCategory, Category, CategoryKind, CategoryRef, CategoryTree, NewCategory, SubcategoryRef,
};

const SLUG_CONFLICT: &str = "a category with this slug already exists";

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    id: Uuid,
    name: String,
    slug: String,
    color: Option<String>,
    parent_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: CategoryId::new(row.id),
            name: row.name,
            slug: row.slug,
            color: row.color,
            parent_id: row.parent_id.map(CategoryId::new),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AdminCategoryRow {
    id: Uuid,
    name: String,
    slug: String,
    color: Option<String>,
    parent_id: Option<Uuid>,
    parent_name: Option<String>,
    product_count: i64,
    created_at: DateTime<Utc>,
}

impl From<AdminCategoryRow> for AdminCategory {
    fn from(row: AdminCategoryRow) -> Self {
        Self {
            id: CategoryId::new(row.id),
            name: row.name,
            slug: row.slug,
            color: row.color,
            parent_id: row.parent_id.map(CategoryId::new),
            parent_name: row.parent_name,
            product_count: row.product_count,
            created_at: row.created_at,
        }
    }
}

const CATEGORY_COLUMNS: &str = "id, name, slug, color, parent_id, created_at, updated_at";

/// Repository for categories.
pub struct CategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoryRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Top-level categories by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn parents(&self) -> Result<Vec<Category>, RepositoryError> {
        let rows = sqlx::query_as::<_, CategoryRow>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM shop.categories WHERE parent_id IS NULL ORDER BY name"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Category::from).collect())
    }

    /// Top-level categories with their subcategories, for navigation.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn tree(&self) -> Result<Vec<CategoryTree>, RepositoryError> {
        let rows = sqlx::query_as::<_, CategoryRow>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM shop.categories ORDER BY name"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(build_tree(rows.into_iter().map(Category::from).collect()))
    }

    /// `{id, name}` of every category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn all(&self) -> Result<Vec<CategoryRef>, RepositoryError> {
        let rows: Vec<(Uuid, String)> =
            sqlx::query_as("SELECT id, name FROM shop.categories ORDER BY name")
                .fetch_all(self.pool)
                .await?;

        Ok(rows
            .into_iter()
            .map(|(id, name)| CategoryRef {
                id: CategoryId::new(id),
                name,
            })
            .collect())
    }

    /// Find a category by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM shop.categories WHERE slug = $1"
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Category::from))
    }

    /// Admin table page, newest first, with parent name and product count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_admin(
        &self,
        page: PageRequest,
        kind: CategoryKind,
    ) -> Result<(Vec<AdminCategory>, i64), RepositoryError> {
        let filter = kind_filter(kind);

        let rows = sqlx::query_as::<_, AdminCategoryRow>(&format!(
            r"
            SELECT c.id, c.name, c.slug, c.color, c.parent_id, c.created_at,
                   p.name AS parent_name,
                   (SELECT COUNT(*) FROM shop.products pr WHERE pr.category_id = c.id)
                       AS product_count
            FROM shop.categories c
            LEFT JOIN shop.categories p ON p.id = c.parent_id
            WHERE {filter}
            ORDER BY c.created_at DESC, c.id DESC
            LIMIT $1 OFFSET $2
            "
        ))
        .bind(page.page_size())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM shop.categories c WHERE {filter}"
        ))
        .fetch_one(self.pool)
        .await?;

        Ok((rows.into_iter().map(AdminCategory::from).collect(), total))
    }

    /// Create a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` for a duplicate slug or a parent
    /// that is missing or itself a subcategory.
    pub async fn create(&self, category: &NewCategory) -> Result<Category, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        if let Some(parent_id) = category.parent_id {
            check_parent(&mut tx, parent_id).await?;
        }

        let row = sqlx::query_as::<_, CategoryRow>(&format!(
            r"
            INSERT INTO shop.categories (name, slug, color, parent_id)
            VALUES ($1, $2, $3, $4)
            RETURNING {CATEGORY_COLUMNS}
            "
        ))
        .bind(&category.name)
        .bind(&category.slug)
        .bind(category.color.as_deref())
        .bind(category.parent_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::on_unique_violation(e, SLUG_CONFLICT))?;

        tx.commit().await?;
        Ok(row.into())
    }

    /// Update a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist.
    /// Returns `RepositoryError::Conflict` for a duplicate slug, an invalid
    /// parent, or when giving a parent to a category that has subcategories.
    pub async fn update(
        &self,
        id: CategoryId,
        category: &NewCategory,
    ) -> Result<Category, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // The category and its new parent are locked together, in id order,
        // so concurrent re-parenting serializes and cannot build a cycle.
        let mut lock_ids = vec![id.as_uuid()];
        lock_ids.extend(category.parent_id.map(|parent_id| parent_id.as_uuid()));
        let locked: Vec<Uuid> = sqlx::query_scalar(LOCK_CATEGORIES)
            .bind(&lock_ids)
            .fetch_all(&mut *tx)
            .await?;
        if !locked.contains(&id.as_uuid()) {
            return Err(RepositoryError::NotFound);
        }

        if let Some(parent_id) = category.parent_id {
            if parent_id == id {
                return Err(RepositoryError::Conflict(
                    "a category cannot be its own parent".to_owned(),
                ));
            }
            check_parent(&mut tx, parent_id).await?;

            let children: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM shop.categories WHERE parent_id = $1")
                    .bind(id)
                    .fetch_one(&mut *tx)
                    .await?;
            if children > 0 {
                return Err(RepositoryError::Conflict(
                    "a category with subcategories cannot have a parent".to_owned(),
                ));
            }
        }

        let row = sqlx::query_as::<_, CategoryRow>(&format!(
            r"
            UPDATE shop.categories
            SET name = $2, slug = $3, color = $4, parent_id = $5, updated_at = NOW()
            WHERE id = $1
            RETURNING {CATEGORY_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&category.name)
        .bind(&category.slug)
        .bind(category.color.as_deref())
        .bind(category.parent_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::on_unique_violation(e, SLUG_CONFLICT))?;

        tx.commit().await?;
        Ok(row.into())
    }

    /// Delete a category and its subcategories.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist.
    /// Returns `RepositoryError::Conflict` if it or a subcategory still has
    /// products.
    pub async fn delete(&self, id: CategoryId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.categories WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| {
                RepositoryError::on_foreign_key_violation(
                    e,
                    "category still has products; move or delete them first",
                )
            })?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

const LOCK_CATEGORIES: &str =
    "SELECT id FROM shop.categories WHERE id = ANY($1) ORDER BY id FOR UPDATE";

/// The parent must exist and be top level. Locks the parent row so it cannot
/// gain a parent of its own before the caller commits.
async fn check_parent(conn: &mut PgConnection, parent_id: CategoryId) -> Result<(), RepositoryError> {
    let grandparent: Option<Option<Uuid>> =
        sqlx::query_scalar("SELECT parent_id FROM shop.categories WHERE id = $1 FOR UPDATE")
            .bind(parent_id)
            .fetch_optional(&mut *conn)
            .await?;

    match grandparent {
        None => Err(RepositoryError::Conflict(
            "parent category does not exist".to_owned(),
        )),
        Some(Some(_)) => Err(RepositoryError::Conflict(
            "parent must be a top-level category".to_owned(),
        )),
        Some(None) => Ok(()),
    }
}

const fn kind_filter(kind: CategoryKind) -> &'static str {
    match kind {
        CategoryKind::Parent => "c.parent_id IS NULL",
        CategoryKind::Child => "c.parent_id IS NOT NULL",
        CategoryKind::All => "TRUE",
    }
}

/// Group categories (sorted by name) under their top-level parents.
fn build_tree(categories: Vec<Category>) -> Vec<CategoryTree> {
    let mut children: HashMap<CategoryId, Vec<SubcategoryRef>> = HashMap::new();
    let mut parents = Vec::new();

    for category in categories {
        match category.parent_id {
            Some(parent_id) => children.entry(parent_id).or_default().push(SubcategoryRef {
                name: category.name,
                slug: category.slug,
            }),
            None => parents.push(category),
        }
    }

    parents
        .into_iter()
        .map(|parent| CategoryTree {
            subcategories: children.remove(&parent.id).unwrap_or_default(),
            id: parent.id,
            name: parent.name,
            slug: parent.slug,
            color: parent.color,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(name: &str, parent_id: Option<CategoryId>) -> Category {
        Category {
            id: CategoryId::generate(),
            name: name.to_owned(),
            slug: name.to_lowercase(),
            color: None,
            parent_id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_build_tree_groups_children() {
        let drinks = category("Minuman", None);
        let snacks = category("Camilan", None);
        let coffee = category("Kopi", Some(drinks.id));
        let tea = category("Teh", Some(drinks.id));
        let drinks_id = drinks.id;

        let tree = build_tree(vec![snacks, coffee, drinks, tea]);

        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].name, "Camilan");
        assert!(tree[0].subcategories.is_empty());
        assert_eq!(tree[1].id, drinks_id);
        let slugs: Vec<_> = tree[1].subcategories.iter().map(|s| s.slug.as_str()).collect();
        assert_eq!(slugs, ["kopi", "teh"]);
    }

    #[test]
    fn test_build_tree_drops_orphans() {
        let orphan = category("Yatim", Some(CategoryId::generate()));
        assert!(build_tree(vec![orphan]).is_empty());
    }

    #[test]
    fn test_category_locks_are_taken_in_id_order() {
        assert!(LOCK_CATEGORIES.contains("ORDER BY id FOR UPDATE"));
    }
}
