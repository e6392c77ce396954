//! Secondary Index Manager
//!
//! Each registered index maps the rendered value of one record attribute to the
//! identities holding it, in insertion order. Buckets store identities rather
//! than positions so that removal never depends on slots captured earlier.
//!
//! Mutations report to the caller's `RevisionCounter`:
//! - index creation: +1
//! - record added to a bucket: +1 per index
//! - record removed from a bucket: +1 per index

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::domain::{IndexRef, Record, RecordId, RevisionCounter};
use crate::error::{Result, StoreError};

/// Reserved index over record identities (answered by the record table itself)
pub const BY_IDENTITY: &str = "byIdentity";

/// Reserved index over record sources, registered with every store
pub const BY_SOURCE: &str = "bySource";

/// Attribute name that addresses the reserved `source` attribute
pub const SOURCE_ATTRIBUTE: &str = "__source";

/// What an index reads from a record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexedAttribute {
    /// A visible field
    Field(String),
    /// The reserved source attribute
    Source,
}

impl IndexedAttribute {
    pub fn from_field_name(field: &str) -> Self {
        if field == SOURCE_ATTRIBUTE {
            IndexedAttribute::Source
        } else {
            IndexedAttribute::Field(field.to_string())
        }
    }

    /// Index key of this attribute for `record`, if the record has one
    pub fn key_of(&self, record: &Record) -> Option<String> {
        match self {
            IndexedAttribute::Field(name) => record.field(name).map(|v| v.key()),
            IndexedAttribute::Source => Some(record.source().to_string()),
        }
    }
}

/// Registered (name, attribute) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub name: String,
    pub attribute: IndexedAttribute,
}

impl IndexDefinition {
    pub fn new(name: impl Into<String>, field: &str) -> Self {
        Self {
            name: name.into(),
            attribute: IndexedAttribute::from_field_name(field),
        }
    }
}

#[derive(Debug, Clone)]
struct Index {
    definition: IndexDefinition,
    /// value -> identities in insertion order
    buckets: BTreeMap<String, Vec<RecordId>>,
}

impl Index {
    fn new(definition: IndexDefinition) -> Self {
        Self {
            definition,
            buckets: BTreeMap::new(),
        }
    }
}

/// Owns all secondary indexes of a store
#[derive(Debug, Clone, Default)]
pub struct IndexManager {
    /// Registration order is kept so indexing visits indexes deterministically
    indexes: Vec<Index>,
}

impl IndexManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an index. Returns `false` if the name was already registered.
    pub fn register_index(&mut self, name: &str, field: &str, revision: &mut RevisionCounter) -> bool {
        if self.contains(name) {
            return false;
        }

        self.indexes.push(Index::new(IndexDefinition::new(name, field)));
        revision.bump();
        debug!("created index {} on {}", name, field);
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    pub fn definitions(&self) -> impl Iterator<Item = &IndexDefinition> {
        self.indexes.iter().map(|index| &index.definition)
    }

    /// Add one record to every registered index
    ///
    /// The record's `index_refs` receive the (value, slot) of each bucket entry.
    /// Records without a value for an index's attribute are skipped by that index.
    pub fn index_record(&mut self, record: &mut Record, revision: &mut RevisionCounter) {
        let identity = record.compute_identity(false).to_string();

        for index in &mut self.indexes {
            let Some(value) = index.definition.attribute.key_of(record) else {
                continue;
            };

            let bucket = index.buckets.entry(value.clone()).or_default();
            let slot = bucket.len();
            bucket.push(identity.clone());

            record
                .refs_mut()
                .by_index
                .insert(index.definition.name.clone(), IndexRef { value, slot });
            revision.bump();
        }
    }

    /// Remove one record from the named index
    ///
    /// Returns `false` when the record holds no reference into that index.
    pub fn remove_from_index(
        &mut self,
        record: &mut Record,
        name: &str,
        revision: &mut RevisionCounter,
    ) -> bool {
        let Some(reference) = record.refs_mut().by_index.remove(name) else {
            return false;
        };
        let Some(identity) = record.identity() else {
            return false;
        };
        let Some(index) = self.indexes.iter_mut().find(|i| i.definition.name == name) else {
            return false;
        };
        let Some(bucket) = index.buckets.get_mut(&reference.value) else {
            return false;
        };

        let slot = if bucket.get(reference.slot).map(String::as_str) == Some(identity) {
            Some(reference.slot)
        } else {
            bucket.iter().position(|id| id == identity)
        };
        let Some(slot) = slot else {
            return false;
        };

        bucket.remove(slot);
        if bucket.is_empty() {
            index.buckets.remove(&reference.value);
        }
        revision.bump();
        true
    }

    /// Known keys of an index, in key order
    pub fn keys(&self, name: &str) -> Result<Vec<&str>> {
        let index = self.find(name).ok_or_else(|| StoreError::unknown_index(name))?;
        Ok(index.buckets.keys().map(String::as_str).collect())
    }

    /// Identities sharing `value`. Unknown values yield an empty slice.
    pub fn bucket(&self, name: &str, value: &str) -> Result<&[RecordId]> {
        let index = self.find(name).ok_or_else(|| StoreError::unknown_index(name))?;
        Ok(index
            .buckets
            .get(value)
            .map(Vec::as_slice)
            .unwrap_or_default())
    }

    fn find(&self, name: &str) -> Option<&Index> {
        self.indexes.iter().find(|index| index.definition.name == name)
    }
}
