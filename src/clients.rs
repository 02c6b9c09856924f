//! Client directory: opaque client codes mapped to site identifiers.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

// ---

#[derive(Debug, Clone, Deserialize)]
pub struct ClientRecord {
    pub code: String,
    pub site: String,
}

/// Lookup table used by the HTTP layer to scope history to one site.
#[derive(Debug, Clone, Default)]
pub struct ClientDirectory {
    sites: HashMap<String, String>,
}

impl ClientDirectory {
    pub fn from_records(records: impl IntoIterator<Item = ClientRecord>) -> Self {
        Self {
            sites: records.into_iter().map(|r| (r.code, r.site)).collect(),
        }
    }

    /// Load `[{code, site}]` from `path`.
    ///
    /// No path or a missing file gives an empty directory; a file that exists
    /// but does not parse is a startup error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        // ---
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::warn!("Clients file {} not found, no client codes", path.display());
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()))
            }
        };

        let records: Vec<ClientRecord> = serde_json::from_str(&content)
            .with_context(|| format!("Invalid clients file {}", path.display()))?;
        tracing::info!("Loaded {} client codes", records.len());
        Ok(Self::from_records(records))
    }

    pub fn site_for(&self, code: &str) -> Option<&str> {
        self.sites.get(code).map(String::as_str)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_load_and_lookup() {
        // ---
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clients.json");
        fs::write(
            &path,
            r#"[{"code": "acme-7f3", "site": "Demo Tower"}, {"code": "globex-19a", "site": "Annex"}]"#,
        )
        .unwrap();

        let clients = ClientDirectory::load(Some(path.as_path())).unwrap();
        assert_eq!(clients.len(), 2);
        assert_eq!(clients.site_for("acme-7f3"), Some("Demo Tower"));
        assert_eq!(clients.site_for("unknown"), None);
    }

    #[test]
    fn test_missing_file_is_empty() {
        // ---
        let dir = tempfile::tempdir().unwrap();
        let clients = ClientDirectory::load(Some(dir.path().join("absent.json").as_path())).unwrap();
        assert!(clients.is_empty());
        assert!(ClientDirectory::load(None).unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_file_is_error() {
        // ---
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clients.json");
        fs::write(&path, "{ not a list").unwrap();
        tokio_test::assert_err!(ClientDirectory::load(Some(path.as_path())));
    }
}
