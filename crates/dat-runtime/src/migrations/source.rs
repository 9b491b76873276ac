//! Migration directories on disk.
//!
//! Each migration is a subdirectory named `<timestamp>-<slug>` holding
//! `up.sql` and optionally `down.sql` and `notx.sql`.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use tracing::debug;

use dat_core::error::{DatError, Result};
use dat_core::migration::{timestamped_name, DOWN_SCRIPT, NO_TX_SCRIPT, UP_SCRIPT};
use dat_core::{Migration, MigrationName};

/// Reads migrations from a directory.
#[derive(Debug, Clone)]
pub struct MigrationSource {
    dir: PathBuf,
}

impl MigrationSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of `file` inside the directory of `migration`.
    pub fn script_path(&self, migration: &Migration, file: &str) -> PathBuf {
        self.dir.join(migration.name()).join(file)
    }

    /// List migrations by name only, sorted ascending.
    ///
    /// Subdirectories whose names are not migration names are ignored. A
    /// missing directory has no migrations.
    pub fn partial_migrations(&self) -> Result<Vec<Migration>> {
        if !self.dir.exists() {
            debug!("Migrations directory does not exist: {:?}", self.dir);
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }

            let Some(dir_name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            match MigrationName::parse(&dir_name) {
                Ok(name) => names.push(name),
                Err(e) => debug!("Skipping directory {:?}: {}", dir_name, e),
            }
        }

        names.sort();
        debug!("Found {} local migrations", names.len());
        Ok(names.into_iter().map(Migration::partial).collect())
    }

    /// Fill in the script bodies of `migration`.
    ///
    /// `up.sql` is required; the others are optional.
    pub async fn load_scripts(&self, mut migration: Migration) -> Result<Migration> {
        let up_path = self.script_path(&migration, UP_SCRIPT);
        let up = read_optional(&up_path).await?.ok_or_else(|| {
            DatError::Discovery(format!(
                "Migration {} has no {} at {:?}",
                migration.name(),
                UP_SCRIPT,
                up_path
            ))
        })?;

        migration.no_tx_script = read_optional(&self.script_path(&migration, NO_TX_SCRIPT)).await?;
        migration.down_script = read_optional(&self.script_path(&migration, DOWN_SCRIPT)).await?;
        migration.up_script = Some(up);
        Ok(migration)
    }

    /// Scaffold a new migration directory for `title`.
    pub fn create(&self, title: &str, now: NaiveDateTime) -> Result<PathBuf> {
        let name = timestamped_name(title, now)?;
        let path = self.dir.join(name.as_str());
        if path.exists() {
            return Err(DatError::Discovery(format!(
                "Migration directory already exists: {:?}",
                path
            )));
        }

        std::fs::create_dir_all(&path)?;
        std::fs::write(path.join(UP_SCRIPT), "")?;
        std::fs::write(path.join(DOWN_SCRIPT), "")?;
        Ok(path)
    }
}

/// Read a file, mapping "not found" to `None`.
pub(crate) async fn read_optional(path: &Path) -> Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(DatError::Io(e)),
    }
}
