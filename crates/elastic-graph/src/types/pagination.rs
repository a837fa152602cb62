//! Relay-style page windows and offset cursors.

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

const CURSOR_PREFIX: &str = "arrayconnection:";

/// Largest offset a cursor may carry.
pub const MAX_CURSOR_OFFSET: i64 = u32::MAX as i64;

/// Encodes a zero-based offset as an opaque cursor.
pub fn offset_to_cursor(offset: i64) -> String {
    STANDARD.encode(format!("{CURSOR_PREFIX}{offset}"))
}

/// Decodes a cursor produced by [`offset_to_cursor`].
pub fn cursor_to_offset(cursor: &str) -> Result<i64, ValidationError> {
    let invalid = || ValidationError::InvalidCursor {
        cursor: cursor.to_string(),
    };

    let bytes = STANDARD.decode(cursor).map_err(|_| invalid())?;
    let decoded = String::from_utf8(bytes).map_err(|_| invalid())?;
    decoded
        .strip_prefix(CURSOR_PREFIX)
        .and_then(|offset| offset.parse::<i64>().ok())
        .filter(|offset| (-1..=MAX_CURSOR_OFFSET).contains(offset))
        .ok_or_else(invalid)
}

/// Pagination metadata of a page window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub start_cursor: Option<String>,
    pub end_cursor: Option<String>,
    pub has_previous_page: bool,
    pub has_next_page: bool,
}

/// A node and the cursor of its position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge<T> {
    pub node: T,
    pub cursor: String,
}

/// The edges of one page plus their page info.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageWindow<T> {
    pub edges: Vec<Edge<T>>,
    pub page_info: PageInfo,
}

impl<T> PageWindow<T> {
    /// Creates a window with no edges.
    pub fn empty() -> Self {
        Self {
            edges: Vec::new(),
            page_info: PageInfo::default(),
        }
    }

    /// Returns the number of edges.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Returns true if the window has no edges.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Iterates the nodes in order.
    pub fn nodes(&self) -> impl Iterator<Item = &T> {
        self.edges.iter().map(|e| &e.node)
    }

    /// Maps the nodes to a different type.
    pub fn map<U, F: FnMut(T) -> U>(self, mut f: F) -> PageWindow<U> {
        PageWindow {
            edges: self
                .edges
                .into_iter()
                .map(|e| Edge {
                    node: f(e.node),
                    cursor: e.cursor,
                })
                .collect(),
            page_info: self.page_info,
        }
    }
}
