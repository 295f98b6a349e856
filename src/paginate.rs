/// Number of pages for `total` rows. Never less than one, so an empty result
/// is still "page 1 of 1".
pub fn page_count(total: usize, page_size: usize) -> usize {
    total.div_ceil(page_size.max(1)).max(1)
}

pub fn clamp_page(page: usize, page_count: usize) -> usize {
    page.clamp(1, page_count.max(1))
}

/// The slice of a filtered and sorted sequence shown on one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: usize,
    pub page_count: usize,
    pub start: usize,
    pub end: usize,
}

impl PageWindow {
    pub fn new(total: usize, page_size: usize, requested_page: usize) -> Self {
        let page_size = page_size.max(1);
        let page_count = page_count(total, page_size);
        let page = clamp_page(requested_page, page_count);
        let start = ((page - 1) * page_size).min(total);
        let end = (start + page_size).min(total);
        Self {
            page,
            page_count,
            start,
            end,
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }
}
