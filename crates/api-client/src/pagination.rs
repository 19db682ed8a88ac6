// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Cursor pagination over [`FetchResult`] pages

use std::future::Future;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::FetchResult;

/// Fetch pages sequentially and concatenate their `items_key` arrays
///
/// `fetch_page` receives the cursor of the previous page (`None` for the first
/// one). Accumulation stops when a page has no cursor, when `max_pages` pages
/// have been fetched (the remaining cursor is kept on the result), or when a page
/// reports errors. In the last case the result carries the items gathered so
/// far together with that page's status and errors.
///
/// The returned data is `{items_key: [...]}` with items in page order.
pub async fn collect_pages<F, Fut>(
    items_key: &str,
    max_pages: Option<usize>,
    mut fetch_page: F,
) -> FetchResult
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = FetchResult>,
{
    let mut items = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0usize;

    let mut last = loop {
        let page = fetch_page(cursor.clone()).await;
        pages += 1;

        if page.is_err() {
            warn!(
                pages,
                collected = items.len(),
                status = page.status_code,
                "pagination stopped on a failed page"
            );
            break page;
        }

        match page.data.get(items_key) {
            Some(Value::Array(page_items)) => items.extend(page_items.iter().cloned()),
            Some(Value::Null) | None => {}
            Some(_) => warn!(items_key, "page items are not an array, skipping"),
        }

        let next = page.cursor.clone().filter(|next| !next.is_empty());
        if next.is_some() && next == cursor {
            warn!(pages, "upstream repeated its cursor, stopping");
            break page.with_cursor(None);
        }
        if next.is_none() || max_pages.is_some_and(|max| pages >= max) {
            debug!(pages, collected = items.len(), "pagination finished");
            break page.with_cursor(next);
        }
        cursor = next;
    };

    let mut data = Map::new();
    data.insert(items_key.to_string(), Value::Array(items));
    last.data = Value::Object(data);
    last
}
