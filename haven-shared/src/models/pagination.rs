//! Limit/offset pagination

use crate::db::StoreError;
use serde::Serialize;

pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 100;

/// Validated page window: `limit` in 1..=100, `offset` >= 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    limit: i64,
    offset: i64,
}

impl Pagination {
    pub fn new(limit: i64, offset: i64) -> Result<Self, StoreError> {
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(StoreError::validation(
                "limit",
                format!("must be between 1 and {}", MAX_LIMIT),
            ));
        }
        if offset < 0 {
            return Err(StoreError::validation("offset", "must be non-negative"));
        }

        Ok(Self { limit, offset })
    }

    /// Applies defaults (20, 0) for missing values before validating
    pub fn from_query(limit: Option<i64>, offset: Option<i64>) -> Result<Self, StoreError> {
        Self::new(limit.unwrap_or(DEFAULT_LIMIT), offset.unwrap_or(0))
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}
