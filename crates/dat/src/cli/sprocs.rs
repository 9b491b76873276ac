use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use console::style;

use dat_core::DatConfig;
use dat_runtime::{ScriptExecutor, SprocRunner, TracingReporter};

use super::{close, connect};

/// Re-apply every stored procedure script.
#[derive(Parser, Debug)]
pub struct SprocsCommand {}

impl SprocsCommand {
    pub async fn execute(self, config: DatConfig) -> Result<()> {
        config.validate_connection()?;
        let runner = SprocRunner::new(
            config.sprocs_dir(),
            ScriptExecutor::new(config.batch_separator.clone()),
            Arc::new(TracingReporter),
        );

        let mut conn = connect(&config.connection).await?;
        let result = runner.run(&mut conn).await;
        close(conn).await;
        let applied = result?;

        if applied.is_empty() {
            println!(
                "  {} No stored procedures in {}",
                style("ℹ").blue(),
                runner.dir().display()
            );
        } else {
            for name in &applied {
                println!("  {} {}", style("✓").green(), name);
            }
        }
        Ok(())
    }
}
