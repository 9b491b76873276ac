use std::sync::{Mutex, PoisonError};

use dat_core::ReconciliationError;

use crate::migrations::Reporter;

/// One call made on a [`RecordingReporter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportEvent {
    Attempt(String),
    Succeeded(String),
    Failed { label: String, diagnostic: String },
    Drift(Vec<String>),
}

/// Reporter that keeps every event for later inspection.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<ReportEvent>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events recorded so far.
    pub fn events(&self) -> Vec<ReportEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Labels of every attempted script, in order.
    pub fn attempts(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ReportEvent::Attempt(label) => Some(label),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: ReportEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl Reporter for RecordingReporter {
    fn attempt(&self, label: &str) {
        self.push(ReportEvent::Attempt(label.to_string()));
    }

    fn succeeded(&self, label: &str) {
        self.push(ReportEvent::Succeeded(label.to_string()));
    }

    fn failed(&self, label: &str, diagnostic: &str) {
        self.push(ReportEvent::Failed {
            label: label.to_string(),
            diagnostic: diagnostic.to_string(),
        });
    }

    fn drift(&self, error: &ReconciliationError) {
        self.push(ReportEvent::Drift(
            error.names().into_iter().map(str::to_string).collect(),
        ));
    }
}
