// crates/triage-gate-http/src/pagination.rs
// ============================================================================
// Module: Pagination And Filters
// Description: Parses page/perPage/filters[]/orderBy query parameters.
// Purpose: Share one query-parsing contract across every listing endpoint.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Listing endpoints accept `page`, `perPage` (one of 5/10/15), `filters[]`
//! entries of the form `field:op:value`, `orderBy` and `orderDirection`.
//! This module parses that contract once; each handler supplies its own
//! field/comparator semantics via a small callback.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;

use crate::error::ApiError;

/// Allowed page sizes.
const ALLOWED_PER_PAGE: [u32; 3] = [5, 10, 15];

/// Default page size when `perPage` is omitted.
const DEFAULT_PER_PAGE: u32 = 10;

/// Raw query parameters shared by every paginated listing endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct PageQuery {
    /// One-based page number; defaults to 1.
    #[serde(default)]
    pub page: Option<u32>,
    /// Page size; must be one of [`ALLOWED_PER_PAGE`].
    #[serde(default, rename = "perPage")]
    pub per_page: Option<u32>,
    /// Repeated `filters[]=field:op:value` entries.
    #[serde(default)]
    pub filters: Vec<String>,
    /// Field to sort by.
    #[serde(default, rename = "orderBy")]
    pub order_by: Option<String>,
    /// `asc` or `desc`; defaults to `asc`.
    #[serde(default, rename = "orderDirection")]
    pub order_direction: Option<String>,
}

/// One parsed `field:op:value` filter clause.
#[derive(Debug, Clone)]
pub struct Filter {
    /// Field name the filter applies to.
    pub field: String,
    /// Comparison operator.
    pub op: String,
    /// Right-hand side value, unparsed.
    pub value: String,
}

impl Filter {
    /// Parses one `field:op:value` clause.
    fn parse(raw: &str) -> Result<Self, ApiError> {
        let mut parts = raw.splitn(3, ':');
        let field = parts.next().filter(|part| !part.is_empty());
        let op = parts.next().filter(|part| !part.is_empty());
        let value = parts.next();
        match (field, op, value) {
            (Some(field), Some(op), Some(value)) => {
                Ok(Self { field: field.to_string(), op: op.to_string(), value: value.to_string() })
            }
            _ => Err(ApiError::Validation(format!("malformed filter clause: {raw}"))),
        }
    }
}

/// Resolved page parameters: zero-based offset and positive page size.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    /// One-based page number.
    pub number: u32,
    /// Page size, one of [`ALLOWED_PER_PAGE`].
    pub size: u32,
}

impl Page {
    /// Returns the zero-based row offset for this page.
    #[must_use]
    pub const fn offset(self) -> usize {
        ((self.number - 1) * self.size) as usize
    }
}

impl PageQuery {
    /// Resolves and validates the page number/size.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] if `perPage` is not one of
    /// [`ALLOWED_PER_PAGE`] or `page` is zero.
    pub fn resolve_page(&self) -> Result<Page, ApiError> {
        let number = self.page.unwrap_or(1);
        if number == 0 {
            return Err(ApiError::Validation("page must be >= 1".to_string()));
        }
        let size = self.per_page.unwrap_or(DEFAULT_PER_PAGE);
        if !ALLOWED_PER_PAGE.contains(&size) {
            return Err(ApiError::Validation("perPage must be one of 5, 10, 15".to_string()));
        }
        Ok(Page { number, size })
    }

    /// Parses every `filters[]` entry.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] if any clause is malformed.
    pub fn parse_filters(&self) -> Result<Vec<Filter>, ApiError> {
        self.filters.iter().map(|raw| Filter::parse(raw)).collect()
    }

    /// Returns whether results should sort descending.
    #[must_use]
    pub fn descending(&self) -> bool {
        self.order_direction.as_deref().is_some_and(|direction| direction.eq_ignore_ascii_case("desc"))
    }
}

/// Slices `items` (already sorted) to the requested page.
#[must_use]
pub fn paginate<T>(items: Vec<T>, page: Page) -> Vec<T> {
    items.into_iter().skip(page.offset()).take(page.size as usize).collect()
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions are permitted."
)]
mod tests {
    use super::Filter;
    use super::Page;
    use super::paginate;

    #[test]
    fn filter_parses_three_colon_separated_parts() {
        let filter = Filter::parse("criticality_level:eq:high").expect("parses");
        assert_eq!(filter.field, "criticality_level");
        assert_eq!(filter.op, "eq");
        assert_eq!(filter.value, "high");
    }

    #[test]
    fn filter_rejects_missing_parts() {
        assert!(Filter::parse("criticality_level:eq").is_err());
    }

    #[test]
    fn paginate_slices_by_offset_and_size() {
        let items: Vec<u32> = (0..25).collect();
        let page = Page { number: 2, size: 10 };
        let slice = paginate(items, page);
        assert_eq!(slice, (10..20).collect::<Vec<u32>>());
    }
}
