//! Single writer
//!
//! Drains ingestion events, in order, into the import reconciler. All store
//! mutation caused by ingestion happens on the thread running this loop.

use serde::Serialize;
use std::sync::mpsc::Receiver;
use tracing::debug;

use super::ports::IngestEvent;
use crate::error::Result;
use crate::import::{ImportReconciler, ImportSummary, UpdateOutcome};

/// Everything one drain of the event stream did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Completed passes, in completion order
    pub passes: Vec<ImportSummary>,
    /// Passes that started but never completed before the stream ended
    pub unfinished: Vec<String>,
}

pub struct IngestWriter {
    reconciler: ImportReconciler,
}

impl IngestWriter {
    pub fn new(reconciler: ImportReconciler) -> Self {
        Self { reconciler }
    }

    pub fn reconciler(&self) -> &ImportReconciler {
        &self.reconciler
    }

    pub fn into_reconciler(self) -> ImportReconciler {
        self.reconciler
    }

    /// Apply one event. Returns the pass summary when a source completes.
    ///
    /// Records or completions for a source without an open pass open one first.
    pub fn apply(&mut self, event: IngestEvent) -> Result<Option<ImportSummary>> {
        match event {
            IngestEvent::SourceStarted { source } => {
                self.reconciler.prepare_import(&source);
                Ok(None)
            }
            IngestEvent::Record(parsed) => {
                if !self.reconciler.is_importing(&parsed.source) {
                    debug!("record for {} before start of pass", parsed.source);
                    self.reconciler.prepare_import(&parsed.source);
                }
                let outcome = self.reconciler.update(parsed.into_record())?;
                if let UpdateOutcome::Inserted { identity } = &outcome {
                    debug!("ingested {}", identity);
                }
                Ok(None)
            }
            IngestEvent::SourceComplete { source } => {
                if !self.reconciler.is_importing(&source) {
                    self.reconciler.prepare_import(&source);
                }
                self.reconciler.close_import(&source).map(Some)
            }
        }
    }

    /// Apply events until every sender of the stream is gone
    pub fn drain(&mut self, events: &Receiver<IngestEvent>) -> Result<IngestReport> {
        let mut report = IngestReport::default();
        let mut open: Vec<String> = Vec::new();

        for event in events {
            let source = event.source().to_string();
            match self.apply(event)? {
                Some(summary) => {
                    open.retain(|source| source != &summary.source);
                    report.passes.push(summary);
                }
                // explicitly started or opened by a record
                None if self.reconciler.is_importing(&source) && !open.contains(&source) => {
                    open.push(source);
                }
                None => {}
            }
        }

        report.unfinished = open;
        Ok(report)
    }
}
