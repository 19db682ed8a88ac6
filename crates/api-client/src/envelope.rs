// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Raw and parsed outcome envelopes
//!
//! A [`FetchResult`] is what the pipeline hands to an adapter's parser; a
//! [`ParseResult`] is what the parser hands back. Both carry errors as data so
//! that multi-call flows can aggregate them instead of unwinding.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of a raw HTTP fetch
///
/// `errors` is the source of truth: a non-empty list means the fetch failed,
/// even when `data` holds a partial page-union.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchResult {
    /// HTTP status, `0` when the failure happened locally or in transport
    pub status_code: u16,
    /// Response headers with lowercase names
    pub headers: HashMap<String, String>,
    /// Decoded JSON body, opaque to the pipeline
    pub data: Value,
    /// Human-readable failure messages, empty on success
    pub errors: Vec<String>,
    /// Adapter-private context such as the queried address
    pub extra: HashMap<String, Value>,
    /// Best-effort server response time
    pub time: Option<DateTime<Utc>>,
    /// Pagination token for the next page
    pub cursor: Option<String>,
}

impl FetchResult {
    /// Successful fetch carrying a decoded body
    pub fn success(status_code: u16, data: Value) -> Self {
        Self {
            status_code,
            data,
            ..Self::default()
        }
    }

    /// Failed fetch with a single error message and no data
    pub fn failure(status_code: u16, error: impl Into<String>) -> Self {
        Self {
            status_code,
            errors: vec![error.into()],
            ..Self::default()
        }
    }

    /// Whether the fetch failed
    pub fn is_err(&self) -> bool {
        !self.errors.is_empty()
    }

    /// First error message, if any
    pub fn first_error(&self) -> Option<&str> {
        self.errors.first().map(String::as_str)
    }

    /// Replace the response headers
    #[must_use]
    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    /// Replace the adapter context
    #[must_use]
    pub fn with_extra(mut self, extra: HashMap<String, Value>) -> Self {
        self.extra = extra;
        self
    }

    /// Set the server response time
    #[must_use]
    pub fn with_time(mut self, time: Option<DateTime<Utc>>) -> Self {
        self.time = time;
        self
    }

    /// Set the pagination cursor
    #[must_use]
    pub fn with_cursor(mut self, cursor: Option<String>) -> Self {
        self.cursor = cursor;
        self
    }

    /// Look up a response header by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Look up a string from the adapter context
    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }
}

/// Outcome of interpreting a [`FetchResult`]
///
/// `data: None` is a valid "no content" result and is distinct from a failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseResult<T> {
    /// Parsed domain objects in upstream order
    pub data: Option<Vec<T>>,
    /// Propagated fetch errors and parse errors
    pub errors: Vec<String>,
    /// Cursor carried through for pagination continuation
    pub cursor: Option<String>,
}

impl<T> Default for ParseResult<T> {
    fn default() -> Self {
        Self {
            data: None,
            errors: Vec::new(),
            cursor: None,
        }
    }
}

impl<T> ParseResult<T> {
    /// Parsed items with no errors
    pub fn ok(data: Vec<T>) -> Self {
        Self {
            data: Some(data),
            ..Self::default()
        }
    }

    /// Nothing could be parsed, without this being an error
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse failed with the given errors
    pub fn failed(errors: Vec<String>) -> Self {
        Self {
            errors,
            ..Self::default()
        }
    }

    /// Carry the fetch's errors and cursor into a parse result with no data
    pub fn from_fetch_errors(fetch: &FetchResult) -> Self {
        Self {
            data: None,
            errors: fetch.errors.clone(),
            cursor: fetch.cursor.clone(),
        }
    }

    /// Set the pagination cursor
    #[must_use]
    pub fn with_cursor(mut self, cursor: Option<String>) -> Self {
        self.cursor = cursor;
        self
    }

    /// Whether any error was recorded
    pub fn is_err(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Parsed items, empty when there was no content
    pub fn into_items(self) -> Vec<T> {
        self.data.unwrap_or_default()
    }
}
