use anyhow::Result;
use clap::Parser;
use console::style;

use dat_core::DatConfig;
use dat_runtime::MigrationSource;

/// Scaffold a new migration directory.
#[derive(Parser, Debug)]
pub struct NewCommand {
    /// Migration title, slugified into the directory name.
    #[arg(required = true, num_args = 1..)]
    pub title: Vec<String>,
}

impl NewCommand {
    pub fn title(&self) -> String {
        self.title.join(" ")
    }

    pub fn execute(self, config: DatConfig) -> Result<()> {
        let source = MigrationSource::new(&config.migrations_dir);
        let path = source.create(&self.title(), chrono::Local::now().naive_local())?;

        println!(
            "  {} Created migration {}",
            style("✓").green(),
            style(path.display()).cyan()
        );
        Ok(())
    }
}
