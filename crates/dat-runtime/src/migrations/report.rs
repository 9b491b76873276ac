use dat_core::ReconciliationError;
use tracing::{error, info, warn};

/// Receives progress of a migration run.
///
/// Every script is reported as an attempt followed by exactly one outcome.
pub trait Reporter: Send + Sync {
    /// A script is about to run.
    fn attempt(&self, label: &str);

    /// The script finished.
    fn succeeded(&self, label: &str);

    /// The script failed with `diagnostic`.
    fn failed(&self, label: &str, diagnostic: &str);

    /// Local migrations disagree with the ledger; nothing will run.
    fn drift(&self, error: &ReconciliationError);
}

/// Reporter that emits `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn attempt(&self, label: &str) {
        info!("{} ...", label);
    }

    fn succeeded(&self, label: &str) {
        info!("{} ... OK", label);
    }

    fn failed(&self, label: &str, diagnostic: &str) {
        error!("{} ... {}", label, diagnostic);
    }

    fn drift(&self, err: &ReconciliationError) {
        for drift in &err.violations {
            warn!("{}", drift);
        }
    }
}
