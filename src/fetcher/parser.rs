//! Response normalization
//!
//! Stateless conversion of raw listing responses into [`Page`]s. Every
//! source goes through [`normalize_page`]; the differences between APIs are
//! described by a [`ResponseShape`].

use serde_json::Value;
use tracing::debug;

use super::{FetcherError, FetcherResult, Page};
use crate::{Cursor, Record};

/// How a listing response reports where the next page is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationStyle {
    /// `paging.current` / `paging.total` page numbers
    PageNumbers,
    /// `meta.next_cursor` opaque cursor
    NextCursor,
}

/// Layout of a listing response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseShape {
    /// Top-level field holding the item array
    pub items_field: &'static str,
    /// Field each item wraps its record in, if any
    pub record_field: Option<&'static str>,
    /// Pagination style
    pub pagination: PaginationStyle,
}

impl ResponseShape {
    /// API-Sports `players/profiles`: `{"response": [{"player": {...}}], "paging": {...}}`
    pub const API_SPORTS: ResponseShape = ResponseShape {
        items_field: "response",
        record_field: Some("player"),
        pagination: PaginationStyle::PageNumbers,
    };

    /// balldontlie `players`: `{"data": [...], "meta": {"next_cursor": ...}}`
    pub const BALLDONTLIE: ResponseShape = ResponseShape {
        items_field: "data",
        record_field: None,
        pagination: PaginationStyle::NextCursor,
    };
}

/// Convert a raw response body into a page
///
/// # Arguments
/// * `body` - Parsed JSON body of a 2xx response
/// * `shape` - Layout of the response
/// * `requested` - Cursor the page was requested with
///
/// # Errors
/// - [`FetcherError::MalformedResponse`] when the body is not an object or
///   the items field is not an array
/// - [`FetcherError::Api`] when the body carries a non-empty `errors` field
pub fn normalize_page(
    body: Value,
    shape: &ResponseShape,
    requested: Option<&Cursor>,
) -> FetcherResult<Page> {
    let Value::Object(mut body) = body else {
        return Err(FetcherError::MalformedResponse(format!(
            "expected a JSON object, got {}",
            json_kind(&body)
        )));
    };

    if let Some(errors) = body.get("errors").filter(|e| !is_empty_errors(e)) {
        return Err(FetcherError::Api(errors.to_string()));
    }

    let items = match body.remove(shape.items_field) {
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(FetcherError::MalformedResponse(format!(
                "field '{}' is {}, expected an array",
                shape.items_field,
                json_kind(&other)
            )))
        }
        None => {
            return Err(FetcherError::MalformedResponse(format!(
                "missing field '{}'",
                shape.items_field
            )))
        }
    };

    let item_count = items.len();
    let mut records = Vec::with_capacity(item_count);
    let mut skipped = 0;
    for item in items {
        let candidate = match shape.record_field {
            Some(field) => match item {
                Value::Object(mut wrapper) => wrapper.remove(field).unwrap_or(Value::Null),
                other => other,
            },
            None => item,
        };
        match Record::try_from(candidate) {
            Ok(record) => records.push(record),
            Err(e) => {
                debug!(error = %e, "Skipping item without usable id");
                skipped += 1;
            }
        }
    }

    let (next, total_pages) = match shape.pagination {
        PaginationStyle::PageNumbers => page_number_continuation(&body, requested, item_count),
        PaginationStyle::NextCursor => cursor_continuation(&body),
    };

    Ok(Page {
        records,
        next,
        total_pages,
        skipped,
        ..Page::default()
    })
}

fn page_number_continuation(
    body: &serde_json::Map<String, Value>,
    requested: Option<&Cursor>,
    item_count: usize,
) -> (Option<Cursor>, Option<u64>) {
    let paging = body.get("paging");
    let total = paging.and_then(|p| p.get("total")).and_then(Value::as_u64);
    // The requested page wins over the echoed one; a stale echo would repeat it.
    let current = requested
        .and_then(Cursor::as_number)
        .or_else(|| paging.and_then(|p| p.get("current")).and_then(Value::as_u64))
        .unwrap_or(1);

    let next = match total {
        Some(total) if current >= total => None,
        Some(_) => Some(Cursor::Number(current + 1)),
        None if item_count == 0 => None,
        None => Some(Cursor::Number(current + 1)),
    };
    (next, total)
}

fn cursor_continuation(body: &serde_json::Map<String, Value>) -> (Option<Cursor>, Option<u64>) {
    let meta = body.get("meta");
    let next = meta
        .and_then(|m| m.get("next_cursor"))
        .and_then(Cursor::from_json);
    let total = meta
        .and_then(|m| m.get("total_pages"))
        .and_then(Value::as_u64);
    (next, total)
}

fn is_empty_errors(errors: &Value) -> bool {
    match errors {
        Value::Null => true,
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
