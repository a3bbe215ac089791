//! Structured list/search requests.

use serde::{Deserialize, Serialize};

/// Sort direction for a single sort field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }

    /// Parse `"asc"`/`"desc"` (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Some(SortDirection::Asc),
            "desc" => Some(SortDirection::Desc),
            _ => None,
        }
    }
}

/// A structured list request: paging, free-text search, sorting and
/// resource-specific filters `F`.
///
/// Every field is optional; resource mappers translate the populated ones into
/// search parameters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListRequest<F = ()> {
    /// 1-based page number.
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub search: Option<String>,
    /// UI field names, paired positionally with `sort_directions`.
    pub sort_fields: Vec<String>,
    pub sort_directions: Vec<SortDirection>,
    pub filters: F,
}

impl<F: Default> ListRequest<F> {
    pub fn with_filters(filters: F) -> Self {
        Self {
            filters,
            ..Self::default()
        }
    }
}

impl<F> ListRequest<F> {
    pub fn page(mut self, page: u32, page_size: u32) -> Self {
        self.page = Some(page);
        self.page_size = Some(page_size);
        self
    }

    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort_fields.push(field.into());
        self.sort_directions.push(direction);
        self
    }

    /// Zero-based offset of the first entry of the requested page.
    pub fn offset(&self) -> Option<u32> {
        let size = self.page_size?;
        let page = self.page.unwrap_or(1).max(1);
        Some((page - 1).saturating_mul(size))
    }
}
