//! Domain layer
//!
//! # Domain Models
//!
//! - `Record`: visible fields plus reserved identity/version/source attributes
//! - `FieldValue`: scalar field value (text, integer, boolean)
//! - `IndexRefs`: back-references used for removal from indexes
//! - `RevisionCounter`: monotonic mutation token

pub mod record;
pub mod revision;

pub use record::{FieldValue, IndexRef, IndexRefs, Record, RecordId, SourceId, RESERVED_PREFIX};
pub use revision::RevisionCounter;
