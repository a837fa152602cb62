//! Relay array-connection slicing.
//!
//! Offsets are zero-based positions in the full ordered result. A cursor
//! encodes one offset; `after` and `before` bound the window exclusively and
//! `first`/`last` cap it from either end.

use serde_json::{Map, Value};

use crate::config::ConnectionSettings;
use crate::error::ValidationError;
use crate::types::{Edge, PageInfo, PageWindow, cursor_to_offset, offset_to_cursor};

/// Pagination arguments of one request plus the connection's limits.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SliceArgs {
    pub before: Option<String>,
    pub after: Option<String>,
    pub first: Option<i64>,
    pub last: Option<i64>,
    pub max_limit: Option<u64>,
    pub enforce_first_or_last: bool,
}

impl SliceArgs {
    /// Reads `first`, `last`, `before` and `after` from a request.
    pub fn from_arguments(
        args: &Map<String, Value>,
        settings: &ConnectionSettings,
    ) -> Result<Self, ValidationError> {
        let count = |name: &str| -> Result<Option<i64>, ValidationError> {
            match args.get(name) {
                None | Some(Value::Null) => Ok(None),
                Some(value) => value.as_i64().map(Some).ok_or_else(|| {
                    ValidationError::InvalidArgument {
                        argument: name.to_string(),
                        message: "expected an integer".to_string(),
                    }
                }),
            }
        };
        let cursor = |name: &str| -> Result<Option<String>, ValidationError> {
            match args.get(name) {
                None | Some(Value::Null) => Ok(None),
                Some(Value::String(cursor)) => Ok(Some(cursor.clone())),
                Some(_) => Err(ValidationError::InvalidArgument {
                    argument: name.to_string(),
                    message: "expected a cursor".to_string(),
                }),
            }
        };

        Ok(Self {
            before: cursor("before")?,
            after: cursor("after")?,
            first: count("first")?,
            last: count("last")?,
            max_limit: settings.max_limit,
            enforce_first_or_last: settings.enforce_first_or_last,
        })
    }

    /// Shorthand for a forward page.
    pub fn first(count: i64) -> Self {
        Self {
            first: Some(count),
            ..Default::default()
        }
    }

    /// Sets the `after` cursor.
    pub fn after(mut self, cursor: impl Into<String>) -> Self {
        self.after = Some(cursor.into());
        self
    }
}

/// Decoded cursors and effective counts.
struct Limits {
    after_offset: Option<i64>,
    before_offset: Option<i64>,
    first: Option<i64>,
    last: Option<i64>,
}

impl SliceArgs {
    /// Checks cursors and counts against the connection's limits without
    /// slicing anything.
    pub fn validate(&self, connection: &str) -> Result<(), ValidationError> {
        self.limits(connection).map(|_| ())
    }

    fn limits(&self, connection: &str) -> Result<Limits, ValidationError> {
        let after_offset = decode(self.after.as_deref())?;
        let before_offset = decode(self.before.as_deref())?;

        for (argument, value) in [("first", self.first), ("last", self.last)] {
            if value.is_some_and(|v| v < 0) {
                return Err(ValidationError::NegativeLimit {
                    argument: argument.to_string(),
                });
            }
        }

        let mut first = self.first;
        let mut last = self.last;
        if self.enforce_first_or_last && first.is_none() && last.is_none() {
            return Err(ValidationError::MissingFirstOrLast {
                connection: connection.to_string(),
            });
        }

        if let Some(max_limit) = self.max_limit {
            let limit = i64::try_from(max_limit).unwrap_or(i64::MAX);
            if first.is_none() && last.is_none() {
                first = Some(limit);
            }
            for requested in [first, last].into_iter().flatten() {
                if requested > limit {
                    return Err(ValidationError::LimitExceeded {
                        requested: requested.unsigned_abs(),
                        connection: connection.to_string(),
                        limit: max_limit,
                    });
                }
            }
            first = first.map(|f| f.min(limit));
            last = last.map(|l| l.min(limit));
        }

        Ok(Limits {
            after_offset,
            before_offset,
            first,
            last,
        })
    }
}

/// Offsets of a window over the full result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceBounds {
    /// First offset in the window.
    pub start_offset: i64,
    /// One past the last offset in the window.
    pub end_offset: i64,
    after_offset: Option<i64>,
    before_offset: Option<i64>,
    first: Option<i64>,
    last: Option<i64>,
    list_length: i64,
}

impl SliceBounds {
    /// Number of items in the window.
    pub fn len(&self) -> u64 {
        u64::try_from(self.end_offset - self.start_offset).unwrap_or(0)
    }

    /// Returns true if the window is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The first offset as an engine `from`.
    pub fn from(&self) -> u64 {
        u64::try_from(self.start_offset).unwrap_or(0)
    }

    fn page_info(&self, start_cursor: Option<String>, end_cursor: Option<String>) -> PageInfo {
        let lower_bound = self.after_offset.map_or(0, |after| after.saturating_add(1));
        let upper_bound = self.before_offset.unwrap_or(self.list_length);
        PageInfo {
            start_cursor,
            end_cursor,
            has_previous_page: self.last.is_some() && self.start_offset > lower_bound,
            has_next_page: self.first.is_some() && self.end_offset < upper_bound,
        }
    }
}

fn decode(cursor: Option<&str>) -> Result<Option<i64>, ValidationError> {
    cursor.map(cursor_to_offset).transpose()
}

/// Applies limits and computes the window for a slice of the full result.
///
/// `slice_start` is the offset of the slice's first item and
/// `list_slice_length` its length.
pub fn slice_bounds(
    args: &SliceArgs,
    connection: &str,
    list_length: i64,
    slice_start: i64,
    list_slice_length: i64,
) -> Result<SliceBounds, ValidationError> {
    let Limits {
        after_offset,
        before_offset,
        first,
        last,
    } = args.limits(connection)?;

    let slice_end = slice_start.saturating_add(list_slice_length);
    let mut start_offset = slice_start
        .saturating_sub(1)
        .max(after_offset.unwrap_or(-1))
        .max(-1)
        .saturating_add(1);
    let mut end_offset = slice_end
        .min(before_offset.unwrap_or(list_length))
        .min(list_length);

    if let Some(first) = first {
        end_offset = end_offset.min(start_offset.saturating_add(first));
    }
    if let Some(last) = last {
        start_offset = start_offset.max(end_offset.saturating_sub(last));
    }
    end_offset = end_offset.max(start_offset);

    Ok(SliceBounds {
        start_offset,
        end_offset,
        after_offset,
        before_offset,
        first,
        last,
        list_length,
    })
}

/// Computes the window over a full result of `list_length` items, before
/// anything is fetched.
pub fn plan_window(
    args: &SliceArgs,
    connection: &str,
    list_length: i64,
) -> Result<SliceBounds, ValidationError> {
    slice_bounds(args, connection, list_length, 0, list_length)
}

/// Cuts the page out of `list_slice`, a slice of the full result starting at
/// offset `slice_start`. `list_slice_length` defaults to the slice's length.
///
/// Only the items inside the window are kept; everything else is dropped
/// before edges are built.
pub fn connection_from_slice<T>(
    list_slice: Vec<T>,
    args: &SliceArgs,
    connection: &str,
    list_length: i64,
    slice_start: i64,
    list_slice_length: Option<i64>,
) -> Result<PageWindow<T>, ValidationError> {
    let slice_len = i64::try_from(list_slice.len()).unwrap_or(i64::MAX);
    let list_slice_length = list_slice_length.unwrap_or(slice_len);
    let bounds = slice_bounds(args, connection, list_length, slice_start, list_slice_length)?;

    let slice_end = slice_start.saturating_add(list_slice_length);
    let lower = bounds.start_offset.saturating_sub(slice_start).clamp(0, slice_len);
    let upper = list_slice_length
        .saturating_sub(slice_end.saturating_sub(bounds.end_offset))
        .clamp(lower, slice_len);
    let (lower, upper) = (
        usize::try_from(lower).unwrap_or(0),
        usize::try_from(upper).unwrap_or(0),
    );

    let edges: Vec<Edge<T>> = list_slice
        .into_iter()
        .skip(lower)
        .take(upper - lower)
        .enumerate()
        .map(|(i, node)| Edge {
            node,
            cursor: offset_to_cursor(bounds.start_offset + i as i64),
        })
        .collect();

    let start_cursor = edges.first().map(|e| e.cursor.clone());
    let end_cursor = edges.last().map(|e| e.cursor.clone());
    Ok(PageWindow {
        page_info: bounds.page_info(start_cursor, end_cursor),
        edges,
    })
}
