mod connection;

pub use connection::ConnectionConfig;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{DatError, Result};
use crate::script::DEFAULT_SEPARATOR;
use crate::sql::LedgerTable;

/// Config file read from the migrations directory.
pub const CONFIG_FILE: &str = "dat.toml";

/// Default ledger table name.
pub const DEFAULT_LEDGER_TABLE: &str = "migrations_ledger";

/// Prefix of process variables that override config keys.
pub const ENV_PREFIX: &str = "DAT_";

/// Variables under [`ENV_PREFIX`] that belong to the CLI, not the config.
const RESERVED_VARS: &[&str] = &["DAT_DIR", "DAT_ENV", "DAT_SUPER_PASSWORD"];

/// Root configuration for dat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatConfig {
    /// Connection settings.
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Token that splits a script into batches when alone on a line.
    #[serde(default = "default_batch_separator")]
    pub batch_separator: String,

    /// Table recording applied migrations.
    #[serde(default = "default_ledger_table")]
    pub ledger_table: String,

    /// Stored procedure directory, defaults to `<migrations>/sprocs`.
    #[serde(default)]
    pub sprocs_dir: Option<PathBuf>,

    /// Database vendor.
    #[serde(default)]
    pub vendor: Vendor,

    /// Directory holding the migrations and the config file.
    #[serde(skip)]
    pub migrations_dir: PathBuf,
}

/// Supported database vendors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
    #[default]
    Postgres,
}

impl DatConfig {
    /// Defaults for a migrations directory without a config file.
    pub fn for_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            connection: ConnectionConfig::default(),
            batch_separator: default_batch_separator(),
            ledger_table: default_ledger_table(),
            sprocs_dir: None,
            vendor: Vendor::default(),
            migrations_dir: dir.into(),
        }
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| DatError::Config(format!("Failed to read config file: {}", e)))?;

        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let content = substitute_env_vars(content, |name| std::env::var(name).ok());

        toml::from_str(&content)
            .map_err(|e| DatError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Load layered configuration for `dir` from the process environment.
    ///
    /// See [`DatConfig::load_with_vars`].
    pub fn load(dir: impl AsRef<Path>, run_env: Option<&str>) -> Result<Self> {
        Self::load_with_vars(dir, run_env, std::env::vars())
    }

    /// Load layered configuration for `dir`.
    ///
    /// Later layers win: `dat.toml`, then `dat-<run_env>.toml`, then
    /// `DAT_<SECTION>__<KEY>` variables from `vars`. Missing files are skipped.
    pub fn load_with_vars<I>(dir: impl AsRef<Path>, run_env: Option<&str>, vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let dir = dir.as_ref();
        let vars: Vec<(String, String)> = vars.into_iter().collect();
        let lookup = |name: &str| {
            vars.iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.clone())
        };

        let mut merged = toml::Table::new();
        let mut files = vec![dir.join(CONFIG_FILE)];
        if let Some(env) = run_env.filter(|env| !env.is_empty()) {
            files.push(dir.join(format!("dat-{}.toml", env)));
        }

        for path in files {
            if !path.exists() {
                tracing::debug!("Config file not found, skipping: {:?}", path);
                continue;
            }
            let content = std::fs::read_to_string(&path).map_err(|e| {
                DatError::Config(format!("Failed to read config file {:?}: {}", path, e))
            })?;
            let layer: toml::Table = toml::from_str(&substitute_env_vars(&content, lookup))
                .map_err(|e| {
                    DatError::Config(format!("Failed to parse config {:?}: {}", path, e))
                })?;
            merge_tables(&mut merged, layer);
        }

        apply_env_overrides(&mut merged, &vars);

        let mut config: DatConfig = toml::Value::Table(merged)
            .try_into()
            .map_err(|e| DatError::Config(format!("Failed to parse config: {}", e)))?;
        config.migrations_dir = dir.to_path_buf();
        config.validate()?;
        Ok(config)
    }

    /// Check settings every command relies on.
    pub fn validate(&self) -> Result<()> {
        if self.batch_separator.is_empty() || self.batch_separator.contains(['\n', '\r']) {
            return Err(DatError::Config(format!(
                "batch_separator must be a non-empty single-line token, got {:?}",
                self.batch_separator
            )));
        }
        self.ledger()?;
        Ok(())
    }

    /// Check that enough connection settings are present to connect.
    pub fn validate_connection(&self) -> Result<()> {
        if self.connection.url.is_some() {
            return Ok(());
        }
        if self.connection.database.is_empty() {
            return Err(DatError::Config("connection.database is required".into()));
        }
        if self.connection.user.is_empty() {
            return Err(DatError::Config("connection.user is required".into()));
        }
        Ok(())
    }

    /// The parsed ledger table name.
    pub fn ledger(&self) -> Result<LedgerTable> {
        LedgerTable::parse(&self.ledger_table)
    }

    pub fn sprocs_dir(&self) -> PathBuf {
        self.sprocs_dir
            .clone()
            .unwrap_or_else(|| self.migrations_dir.join("sprocs"))
    }

    /// Script run once when the ledger table is first created.
    pub fn init_script(&self) -> PathBuf {
        self.migrations_dir.join("_init").join("up.sql")
    }

    /// A copy of this configuration that logs in as an administrator.
    ///
    /// Connects to the `postgres` maintenance database as `user`, or
    /// `postgres` when no user is given. `self` is left untouched.
    pub fn with_elevated_credentials(&self, user: Option<&str>, password: &str) -> Self {
        let user = user.filter(|u| !u.is_empty()).unwrap_or("postgres");
        Self {
            connection: ConnectionConfig {
                user: user.to_string(),
                password: Some(password.to_string()),
                database: "postgres".to_string(),
                ..self.connection.clone()
            },
            ..self.clone()
        }
    }
}

fn default_batch_separator() -> String {
    DEFAULT_SEPARATOR.to_string()
}

fn default_ledger_table() -> String {
    DEFAULT_LEDGER_TABLE.to_string()
}

/// Merge `overlay` into `base`, recursing into tables. Overlay values win.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming)
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Apply `DAT_SECTION__KEY=value` variables as string values.
fn apply_env_overrides(table: &mut toml::Table, vars: &[(String, String)]) {
    'vars: for (name, value) in vars {
        let Some(path) = name.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        if path.is_empty() || RESERVED_VARS.contains(&name.as_str()) {
            continue;
        }

        let keys: Vec<String> = path.split("__").map(str::to_lowercase).collect();
        if keys.iter().any(String::is_empty) {
            continue;
        }

        let mut current = &mut *table;
        for key in &keys[..keys.len() - 1] {
            let entry = current
                .entry(key.clone())
                .or_insert_with(|| toml::Value::Table(toml::Table::new()));
            if !entry.is_table() {
                *entry = toml::Value::Table(toml::Table::new());
            }
            let Some(next) = entry.as_table_mut() else {
                continue 'vars;
            };
            current = next;
        }
        current.insert(keys[keys.len() - 1].clone(), toml::Value::String(value.clone()));
    }
}

/// Substitute environment variables in the format ${VAR_NAME}.
fn substitute_env_vars(content: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut result = content.to_string();
    let re = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("valid pattern");

    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        if let Some(value) = lookup(var_name) {
            result = result.replace(&cap[0], &value);
        }
    }

    result
}
