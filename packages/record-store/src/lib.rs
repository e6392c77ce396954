//! Record Store - in-memory record store with content-hash identity
//!
//! > "Import the whole source again, keep what is still there, drop the rest."
//!
//! ## Core Principles
//!
//! 1. **Content Identity**: a record's identity is the hash of its visible fields
//! 2. **Single Writer**: every mutation goes through one writer; readers share the store
//! 3. **Mark and Sweep Imports**: re-importing a source removes records it no longer contains
//! 4. **Revision Counter**: any change to records or indexes bumps one monotonic counter
//!
//! ## Usage
//!
//! ```rust
//! use record_store::{ImportReconciler, Record, RecordStore};
//!
//! let mut store = RecordStore::new();
//! store.register_index("byGender", "gender");
//!
//! let mut reconciler = ImportReconciler::new(store.shared());
//! reconciler.prepare_import("book.txt");
//! reconciler
//!     .update(Record::new("book.txt").with_field("name", "Imp").with_field("gender", "Male"))
//!     .unwrap();
//! let summary = reconciler.close_import("book.txt").unwrap();
//! assert_eq!(summary.inserted, 1);
//!
//! let store = reconciler.store().read();
//! assert_eq!(store.view("byGender", Some("Male")).unwrap().len(), 1);
//! ```

pub mod config;
pub mod domain;
pub mod error;
pub mod import;
pub mod index;
pub mod ingest;
pub mod questions;
pub mod store;
pub mod watch;

pub use error::{ErrorKind, Result, StoreError};

pub use config::StoreConfig;
pub use domain::{FieldValue, Record, RecordId, RevisionCounter, SourceId};
pub use import::{ImportReconciler, ImportSummary, UpdateOutcome};
pub use index::{IndexDefinition, BY_IDENTITY, BY_SOURCE};
pub use ingest::{AddressBookParser, DataFileLoader, IngestEvent, IngestReport, IngestWriter};
pub use questions::{Answer, Question, QuestionAnswer};
pub use store::{InsertOutcome, RecordStore, SharedStore, View};
pub use watch::{DataFileWatcher, WatchConfig};
