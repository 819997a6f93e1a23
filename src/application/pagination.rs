//! Page-number pagination shared by every collection endpoint.

use serde::{Deserialize, Serialize};

use crate::application::filter::{PAGE_KEY, QueryParams};

pub const DEFAULT_PAGE_SIZE: u32 = 25;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Bounds applied when reading `page[size]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_size: u32,
    pub max_size: u32,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_size: DEFAULT_PAGE_SIZE,
            max_size: MAX_PAGE_SIZE,
        }
    }
}

/// Offset pagination request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub number: u32,
    pub size: u32,
}

impl PageRequest {
    pub fn new(number: u32, size: u32) -> Self {
        Self {
            number: number.max(1),
            size: size.max(1),
        }
    }

    /// Read `page[number]` and `page[size]`; missing or unparseable values fall back to defaults.
    pub fn from_params(params: &QueryParams, limits: PageLimits) -> Self {
        let number = params
            .nested(PAGE_KEY, "number")
            .and_then(|raw| raw.trim().parse::<u32>().ok())
            .unwrap_or(1);
        let size = params
            .nested(PAGE_KEY, "size")
            .and_then(|raw| raw.trim().parse::<u32>().ok())
            .unwrap_or(limits.default_size)
            .min(limits.max_size);
        Self::new(number, size)
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.number - 1) * u64::from(self.size)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE)
    }
}

/// One page of results plus the totals needed to render navigation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, total: u64, request: PageRequest) -> Self {
        Self {
            data,
            total,
            page: request.number,
            per_page: request.size,
        }
    }

    pub fn last_page(&self) -> u32 {
        let per_page = u64::from(self.per_page.max(1));
        let pages = self.total.div_ceil(per_page).max(1);
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    /// One-based index of the first item on this page, `None` when the page is empty.
    pub fn from(&self) -> Option<u64> {
        (!self.data.is_empty())
            .then(|| u64::from(self.page - 1) * u64::from(self.per_page) + 1)
    }

    pub fn to(&self) -> Option<u64> {
        self.from()
            .map(|from| from + self.data.len() as u64 - 1)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            data: self.data.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
        }
    }
}
