//! Record Store
//!
//! Owns the live records, their primary order, the secondary indexes and the
//! revision counter as one unit. Share it between the single writer and readers
//! through a [`SharedStore`].
//!
//! # Duplicate detection
//!
//! `insert` never fails on an identity collision. It bumps the live record's
//! version and answers [`InsertOutcome::Duplicate`], which the import
//! reconciler uses to mark the record as reconfirmed.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::domain::{Record, RecordId, RevisionCounter, SourceId};
use crate::error::{Result, StoreError};
use crate::index::{IndexDefinition, IndexManager, BY_IDENTITY, BY_SOURCE, SOURCE_ATTRIBUTE};

/// Store handle shared by the writer and query collaborators
pub type SharedStore = Arc<RwLock<RecordStore>>;

/// Result of [`RecordStore::insert`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// New record stored under this identity
    Inserted(RecordId),
    /// A live record already has this identity; its version was bumped
    Duplicate { identity: RecordId, version: u64 },
}

impl InsertOutcome {
    pub fn identity(&self) -> &str {
        match self {
            InsertOutcome::Inserted(identity) => identity,
            InsertOutcome::Duplicate { identity, .. } => identity,
        }
    }

    pub fn is_inserted(&self) -> bool {
        matches!(self, InsertOutcome::Inserted(_))
    }
}

/// Result of [`RecordStore::view`]
#[derive(Debug, Clone, PartialEq)]
pub enum View<'a> {
    /// Known keys of the index
    Keys(Vec<&'a str>),
    /// Records sharing the requested value
    Records(Vec<&'a Record>),
}

impl<'a> View<'a> {
    pub fn len(&self) -> usize {
        match self {
            View::Keys(keys) => keys.len(),
            View::Records(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> &[&'a str] {
        match self {
            View::Keys(keys) => keys,
            View::Records(_) => &[],
        }
    }

    pub fn records(&self) -> &[&'a Record] {
        match self {
            View::Records(records) => records,
            View::Keys(_) => &[],
        }
    }
}

/// In-memory record store
#[derive(Debug, Clone)]
pub struct RecordStore {
    /// identity -> record (the reserved `byIdentity` index)
    records: HashMap<RecordId, Record>,
    /// Primary record list in insertion order
    order: Vec<RecordId>,
    indexes: IndexManager,
    revision: RevisionCounter,
    /// source -> import pass counter
    import_passes: HashMap<SourceId, u64>,
}

impl RecordStore {
    /// Create an empty store with the reserved `bySource` index registered
    pub fn new() -> Self {
        let mut store = Self {
            records: HashMap::new(),
            order: Vec::new(),
            indexes: IndexManager::new(),
            revision: RevisionCounter::new(),
            import_passes: HashMap::new(),
        };
        store.register_index(BY_SOURCE, SOURCE_ATTRIBUTE);
        store
    }

    /// Wrap the store in a [`SharedStore`] handle
    pub fn shared(self) -> SharedStore {
        Arc::new(RwLock::new(self))
    }

    /// Register a secondary index on `field` (idempotent)
    ///
    /// Existing records are not back-filled.
    pub fn register_index(&mut self, name: &str, field: &str) -> bool {
        if name == BY_IDENTITY {
            return false;
        }
        self.indexes.register_index(name, field, &mut self.revision)
    }

    pub fn index_definitions(&self) -> impl Iterator<Item = &IndexDefinition> {
        self.indexes.definitions()
    }

    /// Compute the identity of `record`; see [`Record::compute_identity`]
    pub fn compute_identity(record: &mut Record, force: bool) -> RecordId {
        record.compute_identity(force).to_string()
    }

    /// Insert a record, or bump the version of the live record sharing its identity
    pub fn insert(&mut self, mut record: Record) -> InsertOutcome {
        let identity = Self::compute_identity(&mut record, false);

        if let Some(existing) = self.records.get_mut(&identity) {
            let version = existing.bump_version();
            self.revision.bump();
            debug!("duplicate {} (version {})", identity, version);
            return InsertOutcome::Duplicate { identity, version };
        }

        let version = self.import_pass(record.source()).unwrap_or(1);
        record.set_version(version);
        record.refs_mut().position = self.order.len();
        self.order.push(identity.clone());

        self.indexes.index_record(&mut record, &mut self.revision);
        self.records.insert(identity.clone(), record);
        self.revision.bump();

        debug!("inserted {} (revision {})", identity, self.revision.current());
        InsertOutcome::Inserted(identity)
    }

    /// Remove a record from every index and from the primary list
    pub fn remove(&mut self, identity: &str) -> Result<Record> {
        let mut record = self
            .records
            .remove(identity)
            .ok_or_else(|| StoreError::record_not_found(identity))?;

        let names: Vec<String> = record.index_refs().index_names().map(str::to_string).collect();
        for name in &names {
            self.indexes
                .remove_from_index(&mut record, name, &mut self.revision);
        }

        let hint = record.index_refs().position;
        let position = if self.order.get(hint).map(String::as_str) == Some(identity) {
            Some(hint)
        } else {
            self.order.iter().position(|id| id == identity)
        };
        if let Some(position) = position {
            self.order.remove(position);
        }
        self.revision.bump();

        debug!("removed {} (revision {})", identity, self.revision.current());
        Ok(record)
    }

    /// Keys of an index, or the records sharing `value`
    pub fn view(&self, name: &str, value: Option<&str>) -> Result<View<'_>> {
        if name == BY_IDENTITY {
            return Ok(match value {
                None => View::Keys(self.order.iter().map(String::as_str).collect()),
                Some(identity) => View::Records(self.records.get(identity).into_iter().collect()),
            });
        }

        match value {
            None => Ok(View::Keys(self.indexes.keys(name)?)),
            Some(value) => {
                let records = self
                    .indexes
                    .bucket(name, value)?
                    .iter()
                    .filter_map(|identity| self.records.get(identity))
                    .collect();
                Ok(View::Records(records))
            }
        }
    }

    pub fn get(&self, identity: &str) -> Option<&Record> {
        self.records.get(identity)
    }

    /// Live records in primary (insertion) order
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.order.iter().filter_map(|identity| self.records.get(identity))
    }

    /// Identities currently filed under `source`
    pub fn source_records(&self, source: &str) -> Vec<RecordId> {
        self.indexes
            .bucket(BY_SOURCE, source)
            .map(<[RecordId]>::to_vec)
            .unwrap_or_default()
    }

    pub fn entry_count(&self) -> usize {
        self.order.len()
    }

    pub fn revision(&self) -> u64 {
        self.revision.current()
    }

    /// Current import pass of `source`, if it ever started one
    pub fn import_pass(&self, source: &str) -> Option<u64> {
        self.import_passes.get(source).copied()
    }

    /// Advance the import pass counter of `source`
    pub(crate) fn next_import_pass(&mut self, source: &str) -> u64 {
        let pass = self.import_passes.entry(source.to_string()).or_insert(0);
        *pass += 1;
        *pass
    }
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new()
    }
}
