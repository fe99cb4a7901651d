//! Fixed-size pages over an ordered result.
//!
//! Out-of-range page numbers clamp to the nearest page instead of failing, so
//! stale links keep working. A missing or non-numeric number means page 1.

use serde::Serialize;

pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Parse the raw `?page=` value.
pub fn parse_page_number(raw: Option<&str>) -> i64 {
    raw.and_then(|s| s.trim().parse::<i64>().ok()).unwrap_or(1)
}

/// Where a page sits in the full result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    /// 1-based page number after clamping.
    pub number: u64,
    pub num_pages: u64,
    pub offset: u64,
    pub limit: u64,
}

impl PageWindow {
    pub fn resolve(total: u64, page_size: usize, requested: i64) -> Self {
        let size = page_size.max(1) as u64;
        // An empty result still has one (empty) page.
        let num_pages = total.div_ceil(size).max(1);
        let number = requested.clamp(1, num_pages as i64) as u64;

        Self {
            number,
            num_pages,
            offset: (number - 1) * size,
            limit: size,
        }
    }
}

/// One page of items plus the navigation data templates need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u64,
    pub num_pages: u64,
    pub total: u64,
    pub has_previous: bool,
    pub has_next: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, window: PageWindow, total: u64) -> Self {
        Self {
            items,
            number: window.number,
            num_pages: window.num_pages,
            total,
            has_previous: window.number > 1,
            has_next: window.number < window.num_pages,
        }
    }
}

/// Slice an in-memory ordered sequence.
pub fn page<T: Clone>(sequence: &[T], page_size: usize, page_number: i64) -> Page<T> {
    let total = sequence.len() as u64;
    let window = PageWindow::resolve(total, page_size, page_number);
    let items = sequence
        .iter()
        .skip(window.offset as usize)
        .take(window.limit as usize)
        .cloned()
        .collect();
    Page::new(items, window, total)
}
