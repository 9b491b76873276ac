//! Testing utilities for dat.
//!
//! Provides an in-memory migration connection, a recording reporter and
//! assertion helpers so runner behaviour can be checked without a server.

mod assertions;
mod memory;
mod reporter;

pub use assertions::ledger_names;
pub use memory::{MemoryDatabase, MemoryEvent, MemoryTransaction};
pub use reporter::{RecordingReporter, ReportEvent};
