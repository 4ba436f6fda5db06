// 1-indexed pagination over already-sorted result sets

use crate::config::ServiceConfig;
use crate::error::{BookingError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub limit: Option<u32>,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            limit: None,
        }
    }
}

impl PageRequest {
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page,
            limit: Some(limit),
        }
    }

    // Resolves the page size against the configured default and ceiling
    pub fn resolve(&self, config: &ServiceConfig) -> Result<(u32, u32)> {
        if self.page == 0 {
            return Err(BookingError::validation("Page numbers start at 1"));
        }
        let limit = match self.limit {
            Some(0) => return Err(BookingError::validation("Page size must be positive")),
            Some(limit) => limit.min(config.max_page_size),
            None => config.default_page_size,
        };
        Ok((self.page, limit))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub limit: u32,
    pub total: usize,
    pub total_pages: usize,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T> Page<T> {
    pub fn paginate(sorted: Vec<T>, request: &PageRequest, config: &ServiceConfig) -> Result<Self> {
        let (page, limit) = request.resolve(config)?;
        let total = sorted.len();
        let total_pages = total.div_ceil(limit as usize);
        let skip = (page as usize - 1).saturating_mul(limit as usize);
        let items: Vec<T> = sorted.into_iter().skip(skip).take(limit as usize).collect();

        Ok(Page {
            items,
            page,
            limit,
            total,
            total_pages,
            has_next: (page as usize) < total_pages,
            has_prev: page > 1,
        })
    }

    pub fn count(&self) -> usize {
        self.items.len()
    }
}
