use serde::{Deserialize, Deserializer, Serialize};

/// Database connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Full connection URL. Explicit fields below override its parts.
    #[serde(default)]
    pub url: Option<String>,

    /// Server host.
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port.
    #[serde(default = "default_port", deserialize_with = "deserialize_port")]
    pub port: u16,

    /// Database name.
    #[serde(default)]
    pub database: String,

    /// Login role.
    #[serde(default)]
    pub user: String,

    /// Login password.
    #[serde(default)]
    pub password: Option<String>,

    /// Extra `key=value&key=value` connection parameters.
    #[serde(default)]
    pub extra_params: Option<String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: default_host(),
            port: default_port(),
            database: String::new(),
            user: String::new(),
            password: None,
            extra_params: None,
        }
    }
}

impl ConnectionConfig {
    /// Parsed `extra_params`, skipping empty pairs.
    pub fn extra_pairs(&self) -> Vec<(String, String)> {
        self.extra_params
            .as_deref()
            .unwrap_or("")
            .split('&')
            .filter(|pair| !pair.trim().is_empty())
            .map(|pair| match pair.split_once('=') {
                Some((key, value)) => (key.trim().to_string(), value.trim().to_string()),
                None => (pair.trim().to_string(), String::new()),
            })
            .collect()
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5432
}

/// Ports may come from TOML integers or from environment strings.
fn deserialize_port<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        Text(String),
    }

    match Port::deserialize(deserializer)? {
        Port::Number(port) => Ok(port),
        Port::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid port: {:?}", text))),
    }
}
