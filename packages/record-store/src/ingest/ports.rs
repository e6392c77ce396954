//! Ports - messages and traits shared by the ingestion worker and the writer

use std::collections::BTreeMap;

use crate::domain::{FieldValue, Record, SourceId};

/// One well-formed line, tagged with its source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRecord {
    pub fields: BTreeMap<String, FieldValue>,
    pub source: SourceId,
}

impl ParsedRecord {
    pub fn into_record(self) -> Record {
        Record::from_fields(self.source, self.fields)
    }
}

/// Messages sent from the ingestion worker to the single writer
///
/// Per source the worker sends `SourceStarted`, the records, then exactly one
/// `SourceComplete`. A pass that fails midway never sends `SourceComplete`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestEvent {
    SourceStarted { source: SourceId },
    Record(ParsedRecord),
    SourceComplete { source: SourceId },
}

impl IngestEvent {
    pub fn source(&self) -> &str {
        match self {
            IngestEvent::SourceStarted { source } | IngestEvent::SourceComplete { source } => {
                source
            }
            IngestEvent::Record(record) => &record.source,
        }
    }
}

/// Turns one text line into a record, or `None` if the line is malformed
pub trait LineParser: Send + Sync {
    fn parse_line(&self, line: &str, source: &str) -> Option<ParsedRecord>;
}
