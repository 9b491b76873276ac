use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use console::style;

use dat_core::DatConfig;
use dat_runtime::{MigrationRunner, TracingReporter};

use super::{close, connect, database_name};

/// Apply pending migrations.
#[derive(Parser, Debug)]
pub struct MigrateCommand {}

impl MigrateCommand {
    pub async fn execute(self, config: DatConfig) -> Result<()> {
        config.validate_connection()?;
        let runner = MigrationRunner::from_config(&config, Arc::new(TracingReporter))?;

        println!();
        println!(
            "  {}  Migrating {}",
            style("dat").bold().cyan(),
            style(database_name(&config.connection)).bold()
        );
        println!();

        let mut conn = connect(&config.connection).await?;
        let result = runner.run(&mut conn).await;
        close(conn).await;
        let summary = result?;

        if summary.applied.is_empty() {
            println!(
                "  {} Nothing to migrate, {} already applied",
                style("ℹ").blue(),
                summary.skipped
            );
        } else {
            for name in &summary.applied {
                println!("  {} {}", style("✓").green(), name);
            }
            println!();
            println!(
                "  {} Applied {} migration(s)",
                style("✓").green(),
                summary.applied.len()
            );
        }
        println!();

        Ok(())
    }
}

/// Show applied and pending migrations.
#[derive(Parser, Debug)]
pub struct StatusCommand {
    /// Print the status as JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusCommand {
    pub async fn execute(self, config: DatConfig) -> Result<()> {
        config.validate_connection()?;
        let runner = MigrationRunner::from_config(&config, Arc::new(TracingReporter))?;

        let mut conn = connect(&config.connection).await?;
        let result = runner.status(&mut conn).await;
        close(conn).await;
        let status = result?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&status)?);
            return Ok(());
        }

        println!();
        println!(
            "  {}  Migration status of {}",
            style("dat").bold().cyan(),
            style(database_name(&config.connection)).bold()
        );
        println!();

        if status.applied.is_empty() && status.pending.is_empty() && status.drift.is_empty() {
            println!("  {} No migrations found", style("ℹ").blue());
            println!();
            return Ok(());
        }

        if !status.applied.is_empty() {
            println!("  {} Applied:", style("✓").green());
            for m in &status.applied {
                let down_marker = if m.has_down {
                    style("↓").green().to_string()
                } else {
                    style("-").dim().to_string()
                };
                let applied_at = m
                    .applied_at
                    .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_default();
                println!(
                    "    {} {} {} ({})",
                    down_marker,
                    style(&m.name).cyan(),
                    style("at").dim(),
                    applied_at
                );
            }
        }

        if !status.pending.is_empty() {
            if !status.applied.is_empty() {
                println!();
            }
            println!("  {} Pending:", style("○").yellow());
            for name in &status.pending {
                println!("    {} {}", style("→").dim(), style(name).yellow());
            }
        }

        if !status.drift.is_empty() {
            println!();
            println!("  {} Out of sync, rename as needed:", style("✗").red());
            for drift in &status.drift {
                println!("    {} {}", style("!").red(), drift);
            }
        }

        println!();
        println!(
            "  {} {} applied, {} pending",
            style("ℹ").blue(),
            status.applied.len(),
            status.pending.len()
        );
        println!();
        println!(
            "  {} = has down migration, {} = no down migration",
            style("↓").green(),
            style("-").dim()
        );
        println!();

        Ok(())
    }
}
