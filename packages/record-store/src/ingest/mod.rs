//! Ingestion pipeline
//!
//! Producer/consumer split between a loader worker thread (file reading and
//! line parsing) and the single writer that applies events to the store.

pub mod loader;
pub mod parser;
pub mod ports;
pub mod writer;

pub use loader::{read_source, DataFileLoader, FileStats, LoaderHandle};
pub use parser::AddressBookParser;
pub use ports::{IngestEvent, LineParser, ParsedRecord};
pub use writer::{IngestReport, IngestWriter};
