//! Listing, pagination, and aggregate result types.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Columns a listing may be ordered by. Anything else falls back to `Name`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortField {
    #[default]
    Name,
    Address,
    CreatedAt,
    UpdatedAt,
}

impl SortField {
    pub fn parse(s: &str) -> Self {
        match s {
            "address" => Self::Address,
            "created_at" => Self::CreatedAt,
            "updated_at" => Self::UpdatedAt,
            _ => Self::Name,
        }
    }

    pub(crate) fn column(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Address => "address",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    /// `"desc"` sorts descending; every other value sorts ascending.
    pub fn parse(s: &str) -> Self {
        if s == "desc" { Self::Desc } else { Self::Asc }
    }

    pub(crate) fn keyword(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// One page of a listing. `page` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListQuery {
    pub page: u32,
    pub per_page: u32,
    pub sort: SortField,
    pub order: SortOrder,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 50,
            sort: SortField::Name,
            order: SortOrder::Asc,
        }
    }
}

impl ListQuery {
    pub(crate) fn offset(&self) -> u64 {
        u64::from(self.page.max(1) - 1) * u64::from(self.per_page)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
    pub total: usize,
    pub pages: usize,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(page: u32, per_page: u32, total: usize) -> Self {
        let pages = if per_page == 0 {
            0
        } else {
            total.div_ceil(per_page as usize)
        };
        Self {
            page,
            per_page,
            total,
            pages,
            has_next: (page as usize) < pages,
            has_prev: page > 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

/// Aggregate counts over the whole table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stats {
    pub total_pharmacies: usize,
    pub with_coordinates: usize,
    pub with_phone: usize,
    pub with_email: usize,
    pub last_update: Option<DateTime<Utc>>,
    pub database_size_mb: f64,
}
