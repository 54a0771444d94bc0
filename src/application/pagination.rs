//! Offset pagination shared by every feed.
//!
//! Page numbers are 1-based. Requests past the last page are clamped to the
//! last page and requests below 1 are clamped to the first; an empty listing
//! still has exactly one (empty) page.

use serde::Serialize;

/// Fixed number of posts per feed page.
pub const PAGE_SIZE: u32 = 10;

/// Resolved position of a page inside a listing of known size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    number: u32,
    num_pages: u32,
    per_page: u32,
    total: u64,
}

impl PageWindow {
    /// Resolve `requested` against `total` items, clamping into range.
    pub fn resolve(total: u64, per_page: u32, requested: u32) -> Self {
        let per_page = per_page.max(1);
        let pages = total.div_ceil(u64::from(per_page)).max(1);
        let num_pages = u32::try_from(pages).unwrap_or(u32::MAX);
        let number = requested.clamp(1, num_pages);
        Self {
            number,
            num_pages,
            per_page,
            total,
        }
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn num_pages(&self) -> u32 {
        self.num_pages
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Number of items preceding this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.number - 1) * u64::from(self.per_page)
    }

    pub fn limit(&self) -> u32 {
        self.per_page
    }
}

/// Parse a raw `page` query value; anything that is not a positive integer means page 1.
pub fn parse_page_number(raw: Option<&str>) -> u32 {
    raw.and_then(|value| value.trim().parse::<u32>().ok())
        .filter(|number| *number > 0)
        .unwrap_or(1)
}

/// One page of a listing together with its navigation metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u32,
    pub num_pages: u32,
    pub per_page: u32,
    pub total_items: u64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl<T> Page<T> {
    pub fn from_window(window: PageWindow, items: Vec<T>) -> Self {
        Self {
            items,
            number: window.number,
            num_pages: window.num_pages,
            per_page: window.per_page,
            total_items: window.total,
            has_next: window.number < window.num_pages,
            has_previous: window.number > 1,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            number: self.number,
            num_pages: self.num_pages,
            per_page: self.per_page,
            total_items: self.total_items,
            has_next: self.has_next,
            has_previous: self.has_previous,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Slice an in-memory sequence into the requested page.
pub fn paginate<T>(items: Vec<T>, per_page: u32, requested: u32) -> Page<T> {
    let window = PageWindow::resolve(items.len() as u64, per_page, requested);
    let offset = usize::try_from(window.offset()).unwrap_or(usize::MAX);
    let limit = window.limit() as usize;
    let slice = items.into_iter().skip(offset).take(limit).collect();
    Page::from_window(window, slice)
}
