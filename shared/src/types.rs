//! Common types used across the platform

use serde::{Deserialize, Serialize};

/// Supported languages
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Spanish,
    English,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::Spanish => "es",
            Language::English => "en",
        }
    }
}

/// Largest page size a list endpoint will serve
pub const MAX_PER_PAGE: u32 = 100;

/// Pagination parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 20,
        }
    }
}

impl Pagination {
    /// Build pagination from optional query values, clamping to sane bounds
    pub fn from_query(page: Option<u32>, per_page: Option<u32>) -> Self {
        let defaults = Self::default();
        Self {
            page: page.unwrap_or(defaults.page).max(1),
            per_page: per_page
                .unwrap_or(defaults.per_page)
                .clamp(1, MAX_PER_PAGE),
        }
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.per_page)
    }
}

/// Paginated response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, pagination: &Pagination, total_items: u64) -> Self {
        Self {
            data,
            pagination: PaginationMeta::new(pagination, total_items),
        }
    }
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaginationMeta {
    pub page: u32,
    pub per_page: u32,
    pub total_items: u64,
    pub total_pages: u32,
}

impl PaginationMeta {
    pub fn new(pagination: &Pagination, total_items: u64) -> Self {
        let per_page = u64::from(pagination.per_page.max(1));
        let total_pages = total_items.div_ceil(per_page);
        Self {
            page: pagination.page,
            per_page: pagination.per_page,
            total_items,
            total_pages: u32::try_from(total_pages).unwrap_or(u32::MAX),
        }
    }
}

/// Date range for queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateRange {
    pub start: chrono::NaiveDate,
    pub end: chrono::NaiveDate,
}

impl DateRange {
    pub fn contains(&self, date: chrono::NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_clamps_values() {
        let p = Pagination::from_query(Some(0), Some(500));
        assert_eq!(p.page, 1);
        assert_eq!(p.per_page, MAX_PER_PAGE);

        let p = Pagination::from_query(None, None);
        assert_eq!(p.page, 1);
        assert_eq!(p.per_page, 20);
    }

    #[test]
    fn test_pagination_offset() {
        let p = Pagination::from_query(Some(3), Some(25));
        assert_eq!(p.offset(), 50);
        assert_eq!(p.limit(), 25);
    }

    #[test]
    fn test_total_pages_rounds_up() {
        let p = Pagination::from_query(Some(1), Some(20));
        assert_eq!(PaginationMeta::new(&p, 0).total_pages, 0);
        assert_eq!(PaginationMeta::new(&p, 20).total_pages, 1);
        assert_eq!(PaginationMeta::new(&p, 21).total_pages, 2);
    }
}
