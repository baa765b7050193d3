//! In-memory record store and its on-disk envelope

use crate::Record;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

/// Unique records keyed by id, iterated in ascending id order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordStore {
    records: BTreeMap<i64, Record>,
}

impl RecordStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge records into the store, returning how many were new.
    ///
    /// First-seen wins: a record whose id is already present is ignored,
    /// including duplicates within the same batch.
    pub fn merge<I>(&mut self, records: I) -> usize
    where
        I: IntoIterator<Item = Record>,
    {
        let mut added = 0;
        for record in records {
            if let std::collections::btree_map::Entry::Vacant(slot) =
                self.records.entry(record.id())
            {
                slot.insert(record);
                added += 1;
            }
        }
        added
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Look up a record by id
    pub fn get(&self, id: i64) -> Option<&Record> {
        self.records.get(&id)
    }

    /// Whether a record with this id is stored
    pub fn contains(&self, id: i64) -> bool {
        self.records.contains_key(&id)
    }

    /// Stored ids in ascending order
    pub fn ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.records.keys().copied()
    }

    /// Stored records in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }

    /// Serialize into the on-disk envelope (pretty-printed, sorted by id)
    pub fn to_json_pretty(&self, meta: &StoreMeta) -> serde_json::Result<Vec<u8>> {
        let file = StoreFileRef {
            meta,
            records: self.records.values().collect(),
        };
        let mut bytes = serde_json::to_vec_pretty(&file)?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    /// Parse a store file, accepting either the `{meta, records}` envelope
    /// or a bare array of records.
    ///
    /// Entries that are not records with an integer id are skipped with a
    /// warning. Duplicate ids keep the first occurrence.
    pub fn from_json_slice(bytes: &[u8]) -> serde_json::Result<(Self, Option<StoreMeta>)> {
        let parsed: StoreFileRepr = serde_json::from_slice(bytes)?;
        let (raw, meta) = match parsed {
            StoreFileRepr::Envelope { meta, records } => (records, meta),
            StoreFileRepr::Bare(records) => (records, None),
        };

        let mut store = Self::new();
        let mut skipped = 0usize;
        let records = raw.into_iter().filter_map(|value| match Record::try_from(value) {
            Ok(record) => Some(record),
            Err(e) => {
                skipped += 1;
                warn!(error = %e, "Skipping stored entry that is not a valid record");
                None
            }
        });
        store.merge(records);

        if skipped > 0 {
            warn!(skipped, kept = store.len(), "Store file contained invalid entries");
        }
        Ok((store, meta))
    }
}

impl FromIterator<Record> for RecordStore {
    fn from_iter<T: IntoIterator<Item = Record>>(iter: T) -> Self {
        let mut store = Self::new();
        store.merge(iter);
        store
    }
}

/// Descriptive header written alongside the records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StoreMeta {
    /// Source the records came from
    #[serde(default)]
    pub source: String,
    /// Number of records in the file
    #[serde(default)]
    pub record_count: u64,
    /// Pages fetched so far
    #[serde(default)]
    pub pages_fetched: u64,
    /// Total pages as reported by the endpoint
    #[serde(default)]
    pub total_pages: Option<u64>,
    /// Whether the end of data was reached
    #[serde(default)]
    pub complete: bool,
    /// Unix seconds of the save
    #[serde(default)]
    pub saved_at: i64,
}

#[derive(Serialize)]
struct StoreFileRef<'a> {
    meta: &'a StoreMeta,
    records: Vec<&'a Record>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoreFileRepr {
    Envelope {
        #[serde(default)]
        meta: Option<StoreMeta>,
        // partial files of the older page-number script
        #[serde(alias = "players")]
        records: Vec<Value>,
    },
    Bare(Vec<Value>),
}
