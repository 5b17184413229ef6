//! Listing pagination.
//!
//! Two styles are used:
//!
//! - **Keyset** for customer-facing feeds (product catalog, cart, order
//!   history). The client gets an opaque cursor naming the last row it saw and
//!   the next page starts strictly after it. Ties on the sort metric are broken
//!   by a unique, monotonically assigned row number so no row is skipped or
//!   repeated between pages.
//! - **Offset** for admin tables, which need page numbers and totals.

use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Errors produced while reading pagination input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PageError {
    /// The cursor is not something this service issued.
    #[error("invalid cursor")]
    MalformedCursor,
    /// The cursor was issued for a different sort order.
    #[error("cursor was issued for sort '{issued}', not '{requested}'")]
    SortMismatch {
        /// Sort the cursor was created under.
        issued: ProductSort,
        /// Sort of the current request.
        requested: ProductSort,
    },
    /// A page or limit parameter is out of range.
    #[error("{0}")]
    OutOfRange(String),
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    /// SQL keyword.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    /// Row-value comparison operator selecting rows after a cursor.
    #[must_use]
    pub const fn after_operator(self) -> &'static str {
        match self {
            Self::Asc => ">",
            Self::Desc => "<",
        }
    }
}

/// Public product listing sort modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ProductSort {
    /// Most recently added first.
    #[default]
    #[serde(rename = "newest")]
    Newest,
    /// Cheapest first.
    #[serde(rename = "lowest_price")]
    LowestPrice,
    /// Most expensive first.
    #[serde(rename = "higher_price")]
    HighestPrice,
    /// Best sellers first.
    #[serde(rename = "best")]
    BestSeller,
}

impl ProductSort {
    /// Parse the `sort` query parameter. Unknown or missing values fall back to
    /// [`ProductSort::Newest`].
    #[must_use]
    pub fn from_param(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("lowest_price") => Self::LowestPrice,
            Some("higher_price") => Self::HighestPrice,
            Some("best") => Self::BestSeller,
            _ => Self::Newest,
        }
    }

    /// Direction applied to both the metric and the tie-break column.
    #[must_use]
    pub const fn direction(self) -> Direction {
        match self {
            Self::LowestPrice => Direction::Asc,
            Self::Newest | Self::HighestPrice | Self::BestSeller => Direction::Desc,
        }
    }

    /// Column of `shop.products` the listing is ordered by.
    #[must_use]
    pub const fn metric_column(self) -> &'static str {
        match self {
            Self::Newest => "sort_id",
            Self::LowestPrice | Self::HighestPrice => "price",
            Self::BestSeller => "sold_count",
        }
    }

    /// Query-parameter spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::LowestPrice => "lowest_price",
            Self::HighestPrice => "higher_price",
            Self::BestSeller => "best",
        }
    }
}

impl std::fmt::Display for ProductSort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position in the product listing: the last row a client has seen.
///
/// `metric` is the value of [`ProductSort::metric_column`] for that row and
/// `row` is its unique `sort_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCursor {
    #[serde(rename = "s")]
    pub sort: ProductSort,
    #[serde(rename = "m")]
    pub metric: i64,
    #[serde(rename = "r")]
    pub row: i64,
}

impl ProductCursor {
    /// Build a cursor for the given row.
    #[must_use]
    pub const fn new(sort: ProductSort, metric: i64, row: i64) -> Self {
        Self { sort, metric, row }
    }

    /// Encode as an opaque URL-safe token.
    #[must_use]
    pub fn encode(&self) -> String {
        encode_token(self)
    }

    /// Decode a token and check it belongs to the requested sort.
    ///
    /// # Errors
    ///
    /// Returns [`PageError::MalformedCursor`] for tokens this service did not
    /// produce and [`PageError::SortMismatch`] when the token was issued for
    /// another sort order.
    pub fn decode(token: &str, requested: ProductSort) -> Result<Self, PageError> {
        let cursor: Self = decode_token(token)?;
        if cursor.sort != requested {
            return Err(PageError::SortMismatch {
                issued: cursor.sort,
                requested,
            });
        }
        Ok(cursor)
    }

    /// Whether a row with the given `(metric, row)` comes strictly after this
    /// cursor in the listing order.
    ///
    /// This is the in-memory twin of the SQL row-value predicate
    /// `(metric, sort_id) > ($1, $2)` (ascending) or `<` (descending).
    #[must_use]
    pub fn admits(&self, metric: i64, row: i64) -> bool {
        let ord = (metric, row).cmp(&(self.metric, self.row));
        match self.sort.direction() {
            Direction::Asc => ord.is_gt(),
            Direction::Desc => ord.is_lt(),
        }
    }
}

/// Position in a feed ordered by `(created_at DESC, id DESC)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeCursor {
    #[serde(rename = "t")]
    pub at: DateTime<Utc>,
    #[serde(rename = "i")]
    pub id: Uuid,
}

impl TimeCursor {
    #[must_use]
    pub const fn new(at: DateTime<Utc>, id: Uuid) -> Self {
        Self { at, id }
    }

    #[must_use]
    pub fn encode(&self) -> String {
        encode_token(self)
    }

    /// # Errors
    ///
    /// Returns [`PageError::MalformedCursor`] if the token cannot be read.
    pub fn decode(token: &str) -> Result<Self, PageError> {
        decode_token(token)
    }
}

fn encode_token<T: Serialize>(value: &T) -> String {
    // Serializing plain structs of numbers, strings and timestamps cannot fail.
    let json = serde_json::to_vec(value).unwrap_or_default();
    general_purpose::URL_SAFE_NO_PAD.encode(json)
}

fn decode_token<T: for<'de> Deserialize<'de>>(token: &str) -> Result<T, PageError> {
    let bytes = general_purpose::URL_SAFE_NO_PAD
        .decode(token.trim())
        .map_err(|_| PageError::MalformedCursor)?;
    serde_json::from_slice(&bytes).map_err(|_| PageError::MalformedCursor)
}

/// One page of a keyset listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CursorPage<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

impl<T> CursorPage<T> {
    /// Build a page from a query that fetched `limit + 1` rows.
    ///
    /// The extra row only signals that more exist. It is dropped and the
    /// cursor is taken from the last row actually returned.
    pub fn from_overfetch(mut rows: Vec<T>, limit: Limit, cursor_of: impl Fn(&T) -> String) -> Self {
        let limit = limit.get();
        let has_more = rows.len() > limit;
        rows.truncate(limit);
        let next_cursor = if has_more {
            rows.last().map(cursor_of)
        } else {
            None
        };
        Self {
            items: rows,
            next_cursor,
        }
    }

    /// Transform every item, keeping the cursor.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> CursorPage<U> {
        CursorPage {
            items: self.items.into_iter().map(f).collect(),
            next_cursor: self.next_cursor,
        }
    }
}

/// Number of rows a keyset page returns, 1..=100.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit(usize);

impl Limit {
    /// Largest page a client may request.
    pub const MAX: usize = 100;

    /// Validate a client-provided limit, falling back to `default` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`PageError::OutOfRange`] if the value is outside 1..=100.
    pub fn new(value: Option<i64>, default: usize) -> Result<Self, PageError> {
        let Some(value) = value else {
            return Ok(Self(default.clamp(1, Self::MAX)));
        };
        usize::try_from(value)
            .ok()
            .filter(|v| (1..=Self::MAX).contains(v))
            .map(Self)
            .ok_or_else(|| PageError::OutOfRange(format!("limit must be between 1 and {}", Self::MAX)))
    }

    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }

    /// Rows to fetch so the presence of a next page can be detected.
    #[must_use]
    pub fn fetch(self) -> i64 {
        i64::try_from(self.0).unwrap_or(i64::MAX).saturating_add(1)
    }
}

/// Offset page request for admin tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: i64,
    page_size: i64,
}

impl PageRequest {
    /// Default rows per admin page.
    pub const DEFAULT_PAGE_SIZE: i64 = 10;
    /// Largest allowed page size.
    pub const MAX_PAGE_SIZE: i64 = 100;

    /// Validate page parameters. Missing values default to page 1 of 10 rows.
    ///
    /// # Errors
    ///
    /// Returns [`PageError::OutOfRange`] if `page < 1` or `page_size` is
    /// outside 1..=100.
    pub fn new(page: Option<i64>, page_size: Option<i64>) -> Result<Self, PageError> {
        let page = page.unwrap_or(1);
        let page_size = page_size.unwrap_or(Self::DEFAULT_PAGE_SIZE);
        if page < 1 {
            return Err(PageError::OutOfRange("page must be at least 1".to_owned()));
        }
        if !(1..=Self::MAX_PAGE_SIZE).contains(&page_size) {
            return Err(PageError::OutOfRange(format!(
                "page_size must be between 1 and {}",
                Self::MAX_PAGE_SIZE
            )));
        }
        Ok(Self { page, page_size })
    }

    #[must_use]
    pub const fn page(self) -> i64 {
        self.page
    }

    #[must_use]
    pub const fn page_size(self) -> i64 {
        self.page_size
    }

    /// SQL `OFFSET` for this page.
    #[must_use]
    pub const fn offset(self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: Self::DEFAULT_PAGE_SIZE,
        }
    }
}

/// Totals returned with every admin table page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub total: i64,
    pub total_pages: i64,
    pub has_next_page: bool,
}

impl PageInfo {
    #[must_use]
    pub const fn new(total: i64, request: PageRequest) -> Self {
        let total = if total < 0 { 0 } else { total };
        let total_pages = (total + request.page_size - 1) / request.page_size;
        Self {
            total,
            total_pages,
            has_next_page: request.page < total_pages,
        }
    }
}

/// Rows of an admin table page plus totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OffsetPage<T> {
    pub items: Vec<T>,
    #[serde(flatten)]
    pub info: PageInfo,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_param_parsing() {
        assert_eq!(ProductSort::from_param(None), ProductSort::Newest);
        assert_eq!(
            ProductSort::from_param(Some("lowest_price")),
            ProductSort::LowestPrice
        );
        assert_eq!(
            ProductSort::from_param(Some("higher_price")),
            ProductSort::HighestPrice
        );
        assert_eq!(ProductSort::from_param(Some("best")), ProductSort::BestSeller);
        assert_eq!(ProductSort::from_param(Some("random")), ProductSort::Newest);
    }

    #[test]
    fn test_cursor_token_roundtrip() {
        let cursor = ProductCursor::new(ProductSort::LowestPrice, 15_000, 42);
        let token = cursor.encode();
        assert!(!token.contains('='));
        assert_eq!(
            ProductCursor::decode(&token, ProductSort::LowestPrice).unwrap(),
            cursor
        );
    }

    #[test]
    fn test_cursor_rejects_other_sort() {
        let token = ProductCursor::new(ProductSort::BestSeller, 3, 7).encode();
        assert_eq!(
            ProductCursor::decode(&token, ProductSort::Newest),
            Err(PageError::SortMismatch {
                issued: ProductSort::BestSeller,
                requested: ProductSort::Newest,
            })
        );
    }

    #[test]
    fn test_cursor_rejects_garbage() {
        assert_eq!(
            ProductCursor::decode("%%%", ProductSort::Newest),
            Err(PageError::MalformedCursor)
        );
        let not_json = general_purpose::URL_SAFE_NO_PAD.encode(b"hello");
        assert_eq!(
            ProductCursor::decode(&not_json, ProductSort::Newest),
            Err(PageError::MalformedCursor)
        );
    }

    #[test]
    fn test_admits_ascending_breaks_ties_by_row() {
        let cursor = ProductCursor::new(ProductSort::LowestPrice, 10_000, 5);
        assert!(cursor.admits(10_000, 6));
        assert!(!cursor.admits(10_000, 5));
        assert!(!cursor.admits(10_000, 4));
        assert!(cursor.admits(10_001, 1));
        assert!(!cursor.admits(9_999, 100));
    }

    #[test]
    fn test_admits_descending_breaks_ties_by_row() {
        let cursor = ProductCursor::new(ProductSort::BestSeller, 20, 9);
        assert!(cursor.admits(20, 8));
        assert!(!cursor.admits(20, 9));
        assert!(!cursor.admits(20, 10));
        assert!(cursor.admits(19, 50));
        assert!(!cursor.admits(21, 1));
    }

    #[test]
    fn test_paging_with_ties_visits_every_row_once() {
        // (price, sort_id) with many equal prices.
        let mut rows: Vec<(i64, i64)> = vec![
            (5, 1),
            (5, 2),
            (3, 3),
            (5, 4),
            (3, 5),
            (7, 6),
            (5, 7),
        ];
        rows.sort_unstable();

        let limit = Limit::new(Some(2), 12).unwrap();
        let mut seen = Vec::new();
        let mut cursor: Option<ProductCursor> = None;
        loop {
            let batch: Vec<(i64, i64)> = rows
                .iter()
                .copied()
                .filter(|(m, r)| cursor.is_none_or(|c| c.admits(*m, *r)))
                .take(limit.get() + 1)
                .collect();
            let page = CursorPage::from_overfetch(batch, limit, |(m, r)| {
                ProductCursor::new(ProductSort::LowestPrice, *m, *r).encode()
            });
            seen.extend(page.items.iter().copied());
            match page.next_cursor {
                Some(token) => {
                    cursor = Some(ProductCursor::decode(&token, ProductSort::LowestPrice).unwrap());
                }
                None => break,
            }
        }
        assert_eq!(seen, rows);
    }

    #[test]
    fn test_overfetch_without_extra_row_has_no_cursor() {
        let limit = Limit::new(Some(3), 12).unwrap();
        let page = CursorPage::from_overfetch(vec![1, 2, 3], limit, ToString::to_string);
        assert_eq!(page.items, vec![1, 2, 3]);
        assert_eq!(page.next_cursor, None);

        let page = CursorPage::from_overfetch(vec![1, 2, 3, 4], limit, ToString::to_string);
        assert_eq!(page.items, vec![1, 2, 3]);
        assert_eq!(page.next_cursor.as_deref(), Some("3"));
    }

    #[test]
    fn test_limit_bounds() {
        assert_eq!(Limit::new(None, 12).unwrap().get(), 12);
        assert_eq!(Limit::new(Some(100), 12).unwrap().fetch(), 101);
        assert!(Limit::new(Some(0), 12).is_err());
        assert!(Limit::new(Some(101), 12).is_err());
        assert!(Limit::new(Some(-3), 12).is_err());
    }

    #[test]
    fn test_time_cursor_roundtrip() {
        let at = DateTime::parse_from_rfc3339("2025-02-01T08:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let cursor = TimeCursor::new(at, Uuid::nil());
        assert_eq!(TimeCursor::decode(&cursor.encode()).unwrap(), cursor);
        assert!(TimeCursor::decode("bm9wZQ").is_err());
    }

    #[test]
    fn test_page_request_validation() {
        let req = PageRequest::new(Some(3), Some(20)).unwrap();
        assert_eq!(req.offset(), 40);
        assert_eq!(PageRequest::new(None, None).unwrap(), PageRequest::default());
        assert!(PageRequest::new(Some(0), None).is_err());
        assert!(PageRequest::new(Some(1), Some(0)).is_err());
        assert!(PageRequest::new(Some(1), Some(101)).is_err());
    }

    #[test]
    fn test_page_info() {
        let req = PageRequest::new(Some(1), Some(10)).unwrap();
        assert_eq!(
            PageInfo::new(25, req),
            PageInfo {
                total: 25,
                total_pages: 3,
                has_next_page: true
            }
        );
        let last = PageRequest::new(Some(3), Some(10)).unwrap();
        assert!(!PageInfo::new(25, last).has_next_page);
        let empty = PageInfo::new(0, req);
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_next_page);
    }
}
