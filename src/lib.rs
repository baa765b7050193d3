//! # Player Data Downloader Library
//!
//! Pages through third-party sports-statistics APIs, accumulates player
//! records keyed by their integer `id`, and persists them to a local JSON file
//! with a checkpoint after every page so interrupted runs can be resumed.
//!
//! ## Features
//!
//! - **Checkpointed Pagination**: store and checkpoint are written atomically after every page
//! - **Resume Capability**: restart from the last durable checkpoint without refetching
//! - **Rate Limiting**: fixed minimum spacing between calls plus `Retry-After` aware backoff
//! - **Multiple Sources**: API-Sports (page numbers) and balldontlie (opaque cursors)
//! - **Deterministic Testing**: clock and endpoint are injectable
//!
//! ## Quick Start
//!
//! ```no_run
//! use player_data_downloader::downloader::{FetchConfig, FetchExecutor};
//! use player_data_downloader::fetcher::sources::Source;
//! use player_data_downloader::resume::ResumePaths;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = FetchConfig::default();
//! let endpoint = Source::Balldontlie.endpoint("my-api-key", None, &config)?;
//!
//! let executor = FetchExecutor::new(config, ResumePaths::for_output("players.json"));
//! let report = executor.run(&endpoint).await?;
//! println!("{} players stored", report.store.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`fetcher`] - Page fetchers, response normalization and error classification
//! - [`downloader`] - The fetch-and-checkpoint loop, throttling and backoff
//! - [`resume`] - Record store, checkpoint and atomic persistence
//! - [`shutdown`] - Cancellation between pages
//! - [`metrics`] - Prometheus counters
//! - [`cli`] - Command-line front end

#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// CLI command implementations
pub mod cli;

/// Fetch loop orchestration
pub mod downloader;

/// Page fetchers
pub mod fetcher;

/// Observability metrics
pub mod metrics;

/// Record store, checkpoint and persistence
pub mod resume;

/// Graceful shutdown coordination shared across modules
pub mod shutdown;

/// A single record returned by the remote API.
///
/// Any JSON object carrying an integer `id` is accepted; no other field is
/// interpreted. Serializes back to exactly the object it was built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct Record {
    id: i64,
    fields: Map<String, Value>,
}

impl Record {
    /// Record id
    pub fn id(&self) -> i64 {
        self.id
    }

    /// All fields of the record, including `id`
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Look up a single field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

impl TryFrom<Map<String, Value>> for Record {
    type Error = RecordError;

    fn try_from(fields: Map<String, Value>) -> Result<Self, Self::Error> {
        let id = match fields.get("id") {
            None | Some(Value::Null) => return Err(RecordError::MissingId),
            Some(value) => value
                .as_i64()
                .ok_or_else(|| RecordError::InvalidId(value.to_string()))?,
        };
        Ok(Self { id, fields })
    }
}

impl TryFrom<Value> for Record {
    type Error = RecordError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(fields) => Self::try_from(fields),
            other => Err(RecordError::NotAnObject(json_type_name(&other))),
        }
    }
}

impl From<Record> for Map<String, Value> {
    fn from(record: Record) -> Self {
        record.fields
    }
}

/// Reasons a JSON value cannot become a [`Record`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    /// Value is not a JSON object
    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),

    /// Object has no `id` field
    #[error("record has no id field")]
    MissingId,

    /// `id` is present but not an integer
    #[error("record id is not an integer: {0}")]
    InvalidId(String),
}

/// Pagination position understood by an endpoint.
///
/// Page-numbered APIs use [`Cursor::Number`] for the page index; cursor APIs
/// hand back either a numeric or an opaque string token. Serialized untagged
/// so a checkpoint stores a plain integer or string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cursor {
    /// Page number or numeric cursor
    Number(u64),
    /// Opaque cursor token
    Token(String),
}

impl Cursor {
    /// Numeric value, if this is a numeric cursor
    pub fn as_number(&self) -> Option<u64> {
        match self {
            Cursor::Number(n) => Some(*n),
            Cursor::Token(_) => None,
        }
    }

    /// Parse a cursor from a raw JSON value, treating falsy values as "no cursor".
    ///
    /// `null`, `0`, `""`, `false` and anything non-scalar all mean the
    /// endpoint has no further page.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_u64().filter(|n| *n > 0).map(Cursor::Number),
            Value::String(s) if !s.is_empty() => Some(Cursor::Token(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cursor::Number(n) => write!(f, "{n}"),
            Cursor::Token(t) => write!(f, "{t}"),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
