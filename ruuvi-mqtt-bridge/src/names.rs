//! Device identifier to display name mapping.
//!
//! Loaded once at startup from a properties file of `identifier=name` lines:
//!
//! ```text
//! # kitchen and sauna tags
//! aa:bb:cc:dd:ee:ff=Kitchen
//! 11:22:33:44:55:66 = Sauna
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use thiserror::Error;

/// Errors loading the name mapping.
#[derive(Debug, Error)]
pub enum NamesError {
    #[error("Failed to read properties file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Read-only mapping from device identifier to display name.
///
/// Iteration is ordered by identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameMap {
    names: BTreeMap<String, String>,
}

impl NameMap {
    /// Parse properties content.
    ///
    /// Lines starting with `#` and lines without `=` are skipped. Each entry
    /// is split on the first `=` and both sides are trimmed. Later entries for
    /// the same identifier win.
    pub fn parse(content: &str) -> Self {
        let names = content
            .lines()
            .filter(|line| !line.starts_with('#'))
            .filter_map(|line| line.split_once('='))
            .map(|(id, name)| (id.trim().to_string(), name.trim().to_string()))
            .collect();

        Self { names }
    }

    /// Load and parse a properties file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, NamesError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| NamesError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::parse(&content))
    }

    /// Configured name for an identifier, if any.
    pub fn get(&self, id: &str) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    /// Name to publish a device under.
    ///
    /// Falls back to the identifier itself when no non-empty name is mapped.
    pub fn display_name<'a>(&'a self, id: &'a str) -> &'a str {
        match self.get(id) {
            Some(name) if !name.is_empty() => name,
            _ => id,
        }
    }

    /// `(identifier, display name)` pairs for every mapped device.
    pub fn devices(&self) -> impl Iterator<Item = (&str, &str)> {
        self.names
            .keys()
            .map(|id| (id.as_str(), self.display_name(id)))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for NameMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            names: iter
                .into_iter()
                .map(|(id, name)| (id.into(), name.into()))
                .collect(),
        }
    }
}
