//! # Pagination Primitives
//!
//! Limit/offset pagination shared by the audit log and finding queries.
//! Limits are clamped at construction so no caller can request an
//! unbounded page.

use serde::{Deserialize, Serialize};

/// A limit/offset page request with clamped bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Maximum number of items to return (clamped to [1, `MAX_LIMIT`]).
    pub limit: u32,
    /// Number of items to skip.
    pub offset: u32,
}

impl PageRequest {
    /// Default page size when the caller does not specify one.
    pub const DEFAULT_LIMIT: u32 = 50;
    /// Hard ceiling on page size.
    pub const MAX_LIMIT: u32 = 500;

    /// Create a page request, clamping the limit into [1, `MAX_LIMIT`].
    pub fn new(limit: u32, offset: u32) -> Self {
        Self {
            limit: limit.clamp(1, Self::MAX_LIMIT),
            offset,
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            limit: Self::DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

/// One page of results plus the total count across all pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    /// The items on this page.
    pub items: Vec<T>,
    /// Total matching items across all pages.
    pub total: u64,
    /// The limit that produced this page.
    pub limit: u32,
    /// The offset that produced this page.
    pub offset: u32,
}

impl<T> Page<T> {
    /// Assemble a page from a full, already-filtered result set.
    ///
    /// Used by in-memory backends; SQL backends page in the query itself.
    pub fn slice_of(mut items: Vec<T>, request: PageRequest) -> Self {
        let total = items.len() as u64;
        let start = (request.offset as usize).min(items.len());
        let end = (start + request.limit as usize).min(items.len());
        let items = items.drain(start..end).collect();
        Self {
            items,
            total,
            limit: request.limit,
            offset: request.offset,
        }
    }
}
