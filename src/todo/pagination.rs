//! Offset pagination for listings

use serde::{Deserialize, Serialize};

/// Largest page a listing will return
pub const MAX_PER_PAGE: u32 = 100;

/// 1-based page request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageRequest {
    /// Page number, starting at 1
    pub page: u32,
    /// Items per page, at most [`MAX_PER_PAGE`]
    pub per_page: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 20,
        }
    }
}

impl PageRequest {
    /// Build a request, clamping out-of-range values
    pub fn new(page: u32, per_page: u32) -> Self {
        Self { page, per_page }.normalized()
    }

    /// Clamp to `page >= 1` and `1 <= per_page <= MAX_PER_PAGE`
    pub fn normalized(self) -> Self {
        Self {
            page: self.page.max(1),
            per_page: self.per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    /// Number of items skipped before this page
    pub fn offset(&self) -> usize {
        let page = self.normalized();
        (page.page as usize - 1) * page.per_page as usize
    }

    /// Cut this page out of an already filtered and ordered sequence
    pub fn slice<T>(&self, items: Vec<T>) -> Page<T> {
        let request = self.normalized();
        let total = items.len();
        let items = items
            .into_iter()
            .skip(request.offset())
            .take(request.per_page as usize)
            .collect();

        Page {
            items,
            page: request.page,
            per_page: request.per_page,
            total,
            total_pages: total.div_ceil(request.per_page as usize),
        }
    }
}

/// One page of results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Items on this page
    pub items: Vec<T>,
    /// This page's number, starting at 1
    pub page: u32,
    /// Requested page size
    pub per_page: u32,
    /// Matching items across all pages
    pub total: usize,
    /// Number of non-empty pages
    pub total_pages: usize,
}

impl<T> Page<T> {
    /// Whether a later page has items
    pub fn has_next(&self) -> bool {
        (self.page as usize) < self.total_pages
    }
}
