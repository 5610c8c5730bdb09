use thiserror::Error;

pub const PAGE_SIZE_OPTIONS: [usize; 4] = [10, 25, 50, 100];
pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PageError {
    #[error("page {requested} is out of range (valid pages: 1-{total_pages})")]
    OutOfRange {
        requested: usize,
        total_pages: usize,
    },

    #[error("invalid page size {requested}, expected one of 10, 25, 50, 100")]
    InvalidPageSize { requested: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageRequest {
    First,
    Previous,
    Next,
    Last,
    Jump(usize),
}

/// One visible page of an ordered view plus the numbers the footer shows.
/// `range_start`/`range_end` are 1-indexed and meaningful only when the view
/// is non-empty.
#[derive(Debug)]
pub struct PageView<'a, T> {
    pub items: &'a [T],
    pub page: usize,
    pub total_pages: usize,
    pub range_start: usize,
    pub range_end: usize,
    pub total: usize,
}

impl<'a, T> PageView<'a, T> {
    pub fn info(&self) -> PageInfo {
        PageInfo {
            page: self.page,
            total_pages: self.total_pages,
            range_start: self.range_start,
            range_end: self.range_end,
            total: self.total,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageInfo {
    pub page: usize,
    pub total_pages: usize,
    pub range_start: usize,
    pub range_end: usize,
    pub total: usize,
}

pub fn total_pages(len: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 1;
    }
    std::cmp::max(1, len.div_ceil(page_size))
}

pub fn validate_page_size(requested: usize) -> Result<usize, PageError> {
    if PAGE_SIZE_OPTIONS.contains(&requested) {
        Ok(requested)
    } else {
        Err(PageError::InvalidPageSize { requested })
    }
}

/// Slices the view into the requested page. The page number is clamped into
/// `[1, total_pages]`; rejecting out-of-range user input happens in
/// `navigate`, before this is reached.
pub fn paginate<'a, T>(view: &'a [T], page: usize, page_size: usize) -> PageView<'a, T> {
    let total = view.len();
    let total_pages = total_pages(total, page_size);
    let page = page.clamp(1, total_pages);

    let start = (page - 1).saturating_mul(page_size).min(total);
    let end = page.saturating_mul(page_size).min(total);

    PageView {
        items: &view[start..end],
        page,
        total_pages,
        range_start: if total == 0 { 0 } else { start + 1 },
        range_end: end,
        total,
    }
}

/// Resolves a navigation request against the current position. Boundary
/// navigation clamps; a direct jump outside `[1, total_pages]` is rejected so
/// typos surface instead of landing on a silently corrected page.
pub fn navigate(current: usize, total_pages: usize, request: PageRequest) -> Result<usize, PageError> {
    let last = std::cmp::max(1, total_pages);
    match request {
        PageRequest::First => Ok(1),
        PageRequest::Previous => Ok(std::cmp::max(1, current.saturating_sub(1))),
        PageRequest::Next => Ok(std::cmp::min(last, current + 1)),
        PageRequest::Last => Ok(last),
        PageRequest::Jump(requested) => {
            if requested >= 1 && requested <= last {
                Ok(requested)
            } else {
                Err(PageError::OutOfRange {
                    requested,
                    total_pages: last,
                })
            }
        }
    }
}
