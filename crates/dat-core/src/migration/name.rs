use std::fmt;

use chrono::NaiveDateTime;
use serde::Serialize;
use thiserror::Error;

/// Format of the sortable timestamp prefix.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M";

/// Why a string is not a migration name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    #[error("{0:?} does not start with a numeric timestamp")]
    MissingTimestamp(String),

    #[error("{0:?} has no '-' after its timestamp")]
    MissingDash(String),

    #[error("{0:?} has an empty slug")]
    EmptySlug(String),

    #[error("{name:?} contains {found:?}, slugs allow only letters, digits, '_' and '-'")]
    InvalidCharacter { name: String, found: char },
}

/// A validated `<digits>-<slug>` migration name.
///
/// Names order lexicographically, which matches chronological order because
/// the timestamp prefix is fixed-width.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct MigrationName(String);

impl MigrationName {
    /// Parse `raw` against the `<digits>-<slug>` grammar.
    pub fn parse(raw: &str) -> Result<Self, NameError> {
        let digits = raw.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits == 0 {
            return Err(NameError::MissingTimestamp(raw.to_string()));
        }

        let slug = raw[digits..]
            .strip_prefix('-')
            .ok_or_else(|| NameError::MissingDash(raw.to_string()))?;
        if slug.is_empty() {
            return Err(NameError::EmptySlug(raw.to_string()));
        }
        if let Some(found) = slug.chars().find(|c| !is_slug_char(*c)) {
            return Err(NameError::InvalidCharacter {
                name: raw.to_string(),
                found,
            });
        }

        Ok(Self(raw.to_string()))
    }

    /// The numeric prefix.
    pub fn timestamp(&self) -> &str {
        let end = self.0.find('-').unwrap_or(self.0.len());
        &self.0[..end]
    }

    /// Everything after the first dash.
    pub fn slug(&self) -> &str {
        self.0.split_once('-').map(|(_, slug)| slug).unwrap_or("")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for MigrationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for MigrationName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn is_slug_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Lowercase `title` and collapse every run of other characters into one `-`.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;

    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// Build a new migration name for `title` stamped with `now`.
pub fn timestamped_name(title: &str, now: NaiveDateTime) -> Result<MigrationName, NameError> {
    let name = format!("{}-{}", now.format(TIMESTAMP_FORMAT), slugify(title));
    MigrationName::parse(&name)
}
