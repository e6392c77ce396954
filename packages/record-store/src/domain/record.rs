//! Record domain model
//!
//! A record is a flat mapping of visible fields plus the reserved attributes the
//! store maintains on its behalf: identity, version, source and index references.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Record identity: hex SHA256 over the visible fields
pub type RecordId = String;

/// Source identifier (normalized data file path or any opaque origin name)
pub type SourceId = String;

/// Field names starting with this prefix are reserved and never hashed
pub const RESERVED_PREFIX: &str = "__";

/// Scalar field value
///
/// The index key of a value is its `Display` rendering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Integer(i64),
    Text(String),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Index key for this value
    pub fn key(&self) -> String {
        self.to_string()
    }

    fn type_tag(&self) -> u8 {
        match self {
            FieldValue::Bool(_) => b'b',
            FieldValue::Integer(_) => b'i',
            FieldValue::Text(_) => b's',
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Integer(i) => write!(f, "{}", i),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

/// Position of a record inside one index bucket
///
/// `slot` is the bucket position at the time the record was indexed. Earlier
/// removals shift buckets, so it is only a hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRef {
    pub value: String,
    pub slot: usize,
}

/// Back-references from a record into the structures holding it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexRefs {
    /// Position in the primary record list (hint, see `IndexRef`)
    pub position: usize,
    /// Index name -> bucket reference
    pub by_index: BTreeMap<String, IndexRef>,
}

impl IndexRefs {
    pub fn get(&self, index: &str) -> Option<&IndexRef> {
        self.by_index.get(index)
    }

    /// Index names this record participates in
    pub fn index_names(&self) -> impl Iterator<Item = &str> {
        self.by_index.keys().map(String::as_str)
    }
}

/// Stored record
///
/// # Examples
///
/// ```rust
/// use record_store::domain::Record;
///
/// let mut record = Record::new("/data/addressbook.txt")
///     .with_field("name", "Horned Reaper")
///     .with_field("gender", "Male");
///
/// let id = record.compute_identity(false).to_string();
/// assert_eq!(id.len(), 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    #[serde(flatten)]
    fields: BTreeMap<String, FieldValue>,
    #[serde(rename = "__uid", skip_serializing_if = "Option::is_none")]
    identity: Option<RecordId>,
    #[serde(rename = "__version")]
    version: u64,
    #[serde(rename = "__source")]
    source: SourceId,
    #[serde(skip)]
    refs: IndexRefs,
}

impl Record {
    pub fn new(source: impl Into<SourceId>) -> Self {
        Self {
            fields: BTreeMap::new(),
            identity: None,
            version: 0,
            source: source.into(),
            refs: IndexRefs::default(),
        }
    }

    pub fn from_fields<K, V>(
        source: impl Into<SourceId>,
        fields: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        let mut record = Self::new(source);
        for (name, value) in fields {
            record.fields.insert(name.into(), value.into());
        }
        record
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.set_field(name, value);
        self
    }

    /// Set a visible field. The cached identity is left untouched until forced.
    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }

    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn index_refs(&self) -> &IndexRefs {
        &self.refs
    }

    /// Compute (or return the cached) identity
    ///
    /// With `force` the hash is recomputed from the current field values.
    pub fn compute_identity(&mut self, force: bool) -> &str {
        if force {
            self.identity = None;
        }
        let fields = &self.fields;
        self.identity
            .get_or_insert_with(|| Self::content_hash(fields))
            .as_str()
    }

    /// SHA256 over the visible fields in name order
    ///
    /// Each component is length-prefixed so adjacent fields cannot run together.
    pub fn content_hash(fields: &BTreeMap<String, FieldValue>) -> RecordId {
        let mut hasher = Sha256::new();
        for (name, value) in fields {
            if name.starts_with(RESERVED_PREFIX) {
                continue;
            }
            let text = value.to_string();
            hasher.update((name.len() as u64).to_le_bytes());
            hasher.update(name.as_bytes());
            hasher.update([value.type_tag()]);
            hasher.update((text.len() as u64).to_le_bytes());
            hasher.update(text.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    pub(crate) fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    pub(crate) fn bump_version(&mut self) -> u64 {
        self.version += 1;
        self.version
    }

    pub(crate) fn refs_mut(&mut self) -> &mut IndexRefs {
        &mut self.refs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reaper(source: &str) -> Record {
        Record::new(source)
            .with_field("name", "Horned Reaper")
            .with_field("gender", "Male")
            .with_field("birthday", "0666-01-01")
    }

    #[test]
    fn test_identity_is_stable_across_runs() {
        let mut record = reaper("/a");
        assert_eq!(
            record.compute_identity(false),
            "72ca8ecc844c90ef927c46d3f2917df191ea863740388295563f01185ec605ab"
        );
    }

    #[test]
    fn test_identity_ignores_field_order() {
        let mut a = reaper("/a");
        let mut b = Record::new("/a")
            .with_field("birthday", "0666-01-01")
            .with_field("gender", "Male")
            .with_field("name", "Horned Reaper");

        assert_eq!(a.compute_identity(false), b.compute_identity(false));
    }

    #[test]
    fn test_identity_ignores_source() {
        let mut a = reaper("/a");
        let mut b = reaper("/b");

        assert_eq!(a.compute_identity(false), b.compute_identity(false));
    }

    #[test]
    fn test_identity_ignores_reserved_fields() {
        let mut a = reaper("/a");
        let mut b = reaper("/a").with_field("__refs", "whatever");

        assert_eq!(a.compute_identity(false), b.compute_identity(false));
    }

    #[test]
    fn test_identity_distinguishes_value_types() {
        let mut text = Record::new("/a").with_field("age", "42");
        let mut int = Record::new("/a").with_field("age", 42i64);

        assert_ne!(text.compute_identity(false), int.compute_identity(false));
    }

    #[test]
    fn test_identity_is_cached_until_forced() {
        let mut record = reaper("/a");
        let before = record.compute_identity(false).to_string();

        record.set_field("gender", "Female");
        assert_eq!(record.compute_identity(false), before);

        let forced = record.compute_identity(true).to_string();
        assert_ne!(forced, before);
        assert_eq!(record.identity(), Some(forced.as_str()));
    }

    #[test]
    fn test_identity_is_stable_hex() {
        let mut record = reaper("/a");
        let id = record.compute_identity(false).to_string();

        assert_eq!(id.len(), 64);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(id, Record::content_hash(record.fields()));
    }

    #[test]
    fn test_field_value_keys() {
        assert_eq!(FieldValue::from("Male").key(), "Male");
        assert_eq!(FieldValue::from(42i64).key(), "42");
        assert_eq!(FieldValue::from(true).key(), "true");
    }

    #[test]
    fn test_serialize_flattens_fields() {
        let mut record = reaper("/a");
        record.compute_identity(false);
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["name"], "Horned Reaper");
        assert_eq!(json["__source"], "/a");
        assert_eq!(json["__version"], 0);
        assert!(json["__uid"].is_string());
    }
}
