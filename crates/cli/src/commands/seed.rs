//! Seed the catalog with categories.
//!
//! Reads a YAML list of top-level categories with optional subcategories.
//! Without `--file` the bundled `seed/categories.yaml` is used. Existing
//! slugs are left untouched, so the command can be rerun safely.

use std::path::Path;

use serde::Deserialize;
use tracing::info;

use warung_core::CategoryId;
use warung_storefront::db::{self, CategoryRepository};
use warung_storefront::models::CategoryInput;

use super::{CommandError, database_url};

const DEFAULT_CATEGORIES: &str = include_str!("../../seed/categories.yaml");

#[derive(Debug, Deserialize)]
struct SeedCategory {
    name: String,
    slug: String,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    subcategories: Vec<SeedCategory>,
}

/// Totals reported after seeding.
#[derive(Debug, Default, PartialEq, Eq)]
struct SeedSummary {
    inserted: usize,
    skipped: usize,
}

fn parse(content: &str) -> Result<Vec<SeedCategory>, CommandError> {
    Ok(serde_yaml::from_str(content)?)
}

/// Seed categories from `file_path`, or the bundled defaults.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, an entry fails
/// validation, or a database operation fails.
pub async fn categories(file_path: Option<&str>) -> Result<(), CommandError> {
    let content = match file_path {
        Some(path) => tokio::fs::read_to_string(Path::new(path))
            .await
            .map_err(|source| CommandError::Io {
                path: path.to_owned(),
                source,
            })?,
        None => DEFAULT_CATEGORIES.to_owned(),
    };

    // Parse before connecting so a bad file fails fast
    let seed = parse(&content)?;
    info!(categories = seed.len(), "Parsed seed file");

    let database_url = database_url()?;
    let pool = db::create_pool(&database_url).await?;
    let repo = CategoryRepository::new(&pool);

    let mut summary = SeedSummary::default();
    for parent in &seed {
        let parent_id = ensure(&repo, parent, None, &mut summary).await?;
        for child in &parent.subcategories {
            ensure(&repo, child, Some(parent_id), &mut summary).await?;
        }
    }

    info!("Seeding complete!");
    info!("  Categories inserted: {}", summary.inserted);
    info!("  Categories skipped (already exist): {}", summary.skipped);
    Ok(())
}

async fn ensure(
    repo: &CategoryRepository<'_>,
    entry: &SeedCategory,
    parent_id: Option<CategoryId>,
    summary: &mut SeedSummary,
) -> Result<CategoryId, CommandError> {
    let input = CategoryInput {
        name: entry.name.clone(),
        slug: entry.slug.clone(),
        color: entry.color.clone(),
        parent_id: parent_id.map(|id| id.to_string()),
    };
    let category = input
        .validate()
        .map_err(|source| CommandError::InvalidCategory {
            name: entry.name.clone(),
            source,
        })?;

    if let Some(existing) = repo.get_by_slug(&category.slug).await? {
        summary.skipped += 1;
        return Ok(existing.id);
    }

    let created = repo.create(&category).await?;
    summary.inserted += 1;
    Ok(created.id)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_categories_parse() {
        let seed = parse(DEFAULT_CATEGORIES).unwrap();
        assert!(!seed.is_empty());
        assert!(seed.iter().all(|c| !c.slug.is_empty()));
        // One level of nesting only
        assert!(
            seed.iter()
                .flat_map(|c| &c.subcategories)
                .all(|c| c.subcategories.is_empty())
        );
    }

    #[test]
    fn test_subcategories_default_to_empty() {
        let seed = parse("- name: Kopi\n  slug: kopi\n").unwrap();
        let kopi = seed.first().unwrap();
        assert_eq!(seed.len(), 1);
        assert!(kopi.subcategories.is_empty());
        assert!(kopi.color.is_none());
    }
}
