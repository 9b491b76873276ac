use anyhow::{bail, Result};
use clap::Parser;
use console::style;

use dat_core::DatConfig;
use dat_runtime::{connect_options, drop_database};

use super::{close, connect};

/// Drop the configured database and its owner.
#[derive(Parser, Debug)]
pub struct DropCommand {
    /// Confirm the drop.
    #[arg(long)]
    pub yes: bool,

    /// Administrator user, defaults to postgres.
    #[arg(long)]
    pub super_user: Option<String>,

    /// Administrator password.
    #[arg(long, env = "DAT_SUPER_PASSWORD", hide_env_values = true)]
    pub super_password: String,
}

impl DropCommand {
    pub async fn execute(self, config: DatConfig) -> Result<()> {
        config.validate_connection()?;
        let (database, user) = drop_target(&config)?;
        if !self.yes {
            bail!("Refusing to drop database {} without --yes", database);
        }

        let admin = config.with_elevated_credentials(self.super_user.as_deref(), &self.super_password);
        let mut conn = connect(&admin.connection).await?;
        let result = drop_database(&mut conn, &database, &user).await;
        close(conn).await;
        result?;

        println!(
            "  {} Dropped database {} and user {}",
            style("✓").green(),
            style(&database).bold(),
            style(&user).bold()
        );
        Ok(())
    }
}

/// Database and owner the configured connection resolves to, url included.
fn drop_target(config: &DatConfig) -> Result<(String, String)> {
    let options = connect_options(&config.connection)?;
    let database = options.get_database().unwrap_or_default().to_string();
    let user = options.get_username().to_string();
    if database.is_empty() || user.is_empty() {
        bail!("Cannot drop without a configured database and user");
    }
    Ok((database, user))
}
