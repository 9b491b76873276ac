mod executor;
mod report;
mod runner;
mod source;
mod sprocs;

pub use executor::ScriptExecutor;
pub use report::{Reporter, TracingReporter};
pub use runner::{MigrationRunner, MigrationState, MigrationStatus, RunSummary};
pub use source::MigrationSource;
pub use sprocs::SprocRunner;
