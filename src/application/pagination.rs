//! Timestamp-cursor pagination over live and cached feeds.
//!
//! Feeds are ordered newest first. A `created_at__lt` cursor pages backward
//! through history; `created_at__gt` asks for everything published since the
//! client's newest item (a refresh, so `has_next_page` is always false on
//! that path). Cursors are RFC 3339 strings or integer epochs.

use serde::Serialize;
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::domain::entities::{FriendshipRecord, NewsFeedEntry, TweetRecord};
use crate::domain::types::{from_micros, to_micros};
use crate::rowstore::{
    FieldValue, Record, RowModel, RowStoreError, ScanQuery, MAX_TIMESTAMP,
};

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

/// Row-key field every paged sorted-row table orders by.
const CREATED_AT_FIELD: &str = "created_at";

/// Epoch cursors at or above this are interpreted as microseconds.
const EPOCH_MICROS_THRESHOLD: i64 = 1_000_000_000_000;

#[derive(Debug, Error)]
pub enum PaginationError {
    #[error("invalid cursor `{value}`: {reason}")]
    InvalidCursor { value: String, reason: &'static str },
    #[error("created_at__gt and created_at__lt are mutually exclusive")]
    ConflictingCursors,
}

/// Anything pageable by publication time.
pub trait CreatedAt {
    fn created_at(&self) -> OffsetDateTime;
}

impl CreatedAt for TweetRecord {
    fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }
}

impl CreatedAt for NewsFeedEntry {
    fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }
}

impl CreatedAt for FriendshipRecord {
    fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CursorQuery {
    pub created_at_gt: Option<OffsetDateTime>,
    pub created_at_lt: Option<OffsetDateTime>,
    pub size: Option<usize>,
}

impl CursorQuery {
    /// The newest page, no cursor.
    pub fn latest() -> Self {
        Self::default()
    }

    pub fn newer_than(cursor: OffsetDateTime) -> Self {
        Self {
            created_at_gt: Some(cursor),
            ..Self::default()
        }
    }

    pub fn older_than(cursor: OffsetDateTime) -> Self {
        Self {
            created_at_lt: Some(cursor),
            ..Self::default()
        }
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    /// Build a query from raw request parameters.
    pub fn from_params(
        created_at_gt: Option<&str>,
        created_at_lt: Option<&str>,
        size: Option<usize>,
    ) -> Result<Self, PaginationError> {
        if created_at_gt.is_some() && created_at_lt.is_some() {
            return Err(PaginationError::ConflictingCursors);
        }
        Ok(Self {
            created_at_gt: created_at_gt.map(parse_cursor).transpose()?,
            created_at_lt: created_at_lt.map(parse_cursor).transpose()?,
            size,
        })
    }
}

/// Parse an RFC 3339 timestamp, falling back to an integer epoch. Epochs at
/// or above 10^12 are microseconds, below that seconds.
pub fn parse_cursor(raw: &str) -> Result<OffsetDateTime, PaginationError> {
    if let Ok(ts) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Ok(ts);
    }
    let epoch: i64 = raw
        .parse()
        .map_err(|_| PaginationError::InvalidCursor {
            value: raw.to_string(),
            reason: "neither RFC 3339 nor an integer epoch",
        })?;
    let ts = if epoch.abs() >= EPOCH_MICROS_THRESHOLD {
        from_micros(epoch)
    } else {
        OffsetDateTime::from_unix_timestamp(epoch).ok()
    };
    ts.ok_or(PaginationError::InvalidCursor {
        value: raw.to_string(),
        reason: "epoch outside the representable date range",
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedPage<T> {
    pub items: Vec<T>,
    pub has_next_page: bool,
}

impl<T> FeedPage<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            has_next_page: false,
        }
    }
}

/// Stateless pager; `page_size` is the default when a query names none.
#[derive(Debug, Clone, Copy)]
pub struct FeedPager {
    page_size: usize,
}

impl Default for FeedPager {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl FeedPager {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    fn effective_size(&self, query: &CursorQuery) -> usize {
        query
            .size
            .unwrap_or(self.page_size)
            .clamp(1, MAX_PAGE_SIZE)
    }

    /// The query with its page size resolved against this pager's default,
    /// for handing to a backend that pages on its own.
    pub fn normalize(&self, query: &CursorQuery) -> CursorQuery {
        CursorQuery {
            size: Some(self.effective_size(query)),
            ..*query
        }
    }

    /// Page a newest-first in-memory list.
    pub fn paginate_ordered<T>(&self, items: &[T], query: &CursorQuery) -> FeedPage<T>
    where
        T: CreatedAt + Clone,
    {
        let size = self.effective_size(query);

        if let Some(cursor) = query.created_at_gt {
            // Refresh: everything strictly newer, in one shot.
            let items: Vec<T> = items
                .iter()
                .take_while(|item| item.created_at() > cursor)
                .cloned()
                .collect();
            return FeedPage {
                items,
                has_next_page: false,
            };
        }

        let skipped = match query.created_at_lt {
            Some(cursor) => {
                match items.iter().position(|item| item.created_at() < cursor) {
                    Some(index) => index,
                    None => items.len(),
                }
            }
            None => 0,
        };
        let remainder = &items[skipped..];
        FeedPage {
            items: remainder.iter().take(size).cloned().collect(),
            has_next_page: remainder.len() > size,
        }
    }

    /// Page a bounded cached list, or `None` when the cache cannot prove the
    /// page complete and the caller must consult the authoritative source.
    ///
    /// A cached list shorter than `cache_limit` holds the user's entire
    /// history, so any page it yields is definitive. A full list is a
    /// window: a short page at its end may be truncation, not the true end
    /// of history.
    pub fn paginate_cached<T>(
        &self,
        items: &[T],
        query: &CursorQuery,
        cache_limit: usize,
    ) -> Option<FeedPage<T>>
    where
        T: CreatedAt + Clone,
    {
        let page = self.paginate_ordered(items, query);
        if query.created_at_gt.is_some() {
            return Some(page);
        }
        if page.has_next_page {
            return Some(page);
        }
        if items.len() < cache_limit {
            return Some(page);
        }
        None
    }

    /// Page a sorted-row table directly via range scans.
    ///
    /// `prefix` fixes the leading row-key fields (everything before
    /// `created_at`). Scans overfetch by one or two rows: one to learn
    /// whether a next page exists, one to absorb the cursor row itself,
    /// which the inclusive scan bound may return.
    pub fn paginate_rows(
        &self,
        model: &RowModel,
        prefix: &[FieldValue],
        query: &CursorQuery,
    ) -> Result<FeedPage<Record>, RowStoreError> {
        let size = self.effective_size(query);
        let bound = |cursor: Option<i64>| -> Vec<Option<FieldValue>> {
            let mut parts: Vec<Option<FieldValue>> =
                prefix.iter().cloned().map(Some).collect();
            parts.push(cursor.map(FieldValue::Int));
            parts
        };

        if let Some(cursor) = query.created_at_gt {
            let micros = to_micros(cursor);
            let scan = ScanQuery {
                start: Some(bound(Some(micros))),
                stop: Some(bound(Some(MAX_TIMESTAMP))),
                ..Default::default()
            };
            let mut records = model.filter(&scan)?;
            if records
                .first()
                .is_some_and(|record| record.int(CREATED_AT_FIELD) == Some(micros))
            {
                records.remove(0);
            }
            records.reverse();
            return Ok(FeedPage {
                items: records,
                has_next_page: false,
            });
        }

        let mut records = match query.created_at_lt {
            Some(cursor) => {
                let micros = to_micros(cursor);
                let scan = ScanQuery {
                    start: Some(bound(Some(micros))),
                    stop: Some(bound(None)),
                    limit: Some(size + 2),
                    reverse: true,
                    ..Default::default()
                };
                let mut records = model.filter(&scan)?;
                if records
                    .first()
                    .is_some_and(|record| record.int(CREATED_AT_FIELD) == Some(micros))
                {
                    records.remove(0);
                }
                records
            }
            None => {
                let scan = ScanQuery {
                    prefix: Some(bound(None)),
                    limit: Some(size + 1),
                    reverse: true,
                    ..Default::default()
                };
                model.filter(&scan)?
            }
        };

        let has_next_page = records.len() > size;
        records.truncate(size);
        Ok(FeedPage {
            items: records,
            has_next_page,
        })
    }
}
