use crate::constants::paging::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use serde::{Deserialize, Serialize};

/// Zero-based page selector for listing operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page_index: u32,
    pub page_size: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page_index: 0,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    /// Page size is clamped to `1..=MAX_PAGE_SIZE`
    pub fn new(page_index: u32, page_size: u32) -> Self {
        Self {
            page_index,
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page_index) * u64::from(self.page_size)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.page_size)
    }
}

/// One page of a listing plus totals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub total_hits: u64,
    pub total_pages: u32,
    pub page_index: u32,
    pub page_size: u32,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, total_hits: u64, request: PageRequest) -> Self {
        let size = u64::from(request.page_size.max(1));
        let total_pages = u32::try_from(total_hits.div_ceil(size)).unwrap_or(u32::MAX);
        Self {
            content,
            total_hits,
            total_pages,
            page_index: request.page_index,
            page_size: request.page_size,
        }
    }

    /// Slice an already ordered, fully materialised listing
    pub fn from_slice(all: &[T], request: PageRequest) -> Self
    where
        T: Clone,
    {
        let start = usize::try_from(request.offset()).unwrap_or(usize::MAX);
        let content = all
            .iter()
            .skip(start)
            .take(request.page_size as usize)
            .cloned()
            .collect();
        Self::new(content, all.len() as u64, request)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            total_hits: self.total_hits,
            total_pages: self.total_pages,
            page_index: self.page_index,
            page_size: self.page_size,
        }
    }
}
