use crate::types::constants::AUTH_TOKEN_KEY;
use crate::types::Result;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Source of the authentication token appended to the endpoint.
///
/// Read on every connection attempt so a refreshed token is picked up by the
/// next reconnect.
pub trait TokenStore: Send + Sync {
    fn token(&self) -> Option<String>;
}

/// Token fixed at construction time
#[derive(Debug, Clone, Default)]
pub struct StaticTokenStore {
    token: Option<String>,
}

impl StaticTokenStore {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

impl TokenStore for StaticTokenStore {
    fn token(&self) -> Option<String> {
        self.token.clone().filter(|t| !t.trim().is_empty())
    }
}

/// Reads `auth_token` from a JSON key/value file (the local-storage analogue).
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
    key: String,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            key: AUTH_TOKEN_KEY.to_string(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the token, distinguishing "no token" from I/O and parse failures.
    pub fn load(&self) -> Result<Option<String>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let store: Value = serde_json::from_str(&contents)?;
        Ok(store
            .get(&self.key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string))
    }
}

impl TokenStore for FileTokenStore {
    fn token(&self) -> Option<String> {
        match self.load() {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(
                    "Failed to read auth token from {}: {}",
                    self.path.display(),
                    e
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn store_with(contents: &str) -> (tempfile::NamedTempFile, FileTokenStore) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        let store = FileTokenStore::new(file.path());
        (file, store)
    }

    #[test]
    fn test_reads_auth_token_key() {
        let (_file, store) = store_with(r#"{"auth_token":"abc.def","theme":"dark"}"#);
        assert_eq!(store.token(), Some("abc.def".to_string()));
    }

    #[test]
    fn test_missing_file_means_no_token() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("storage.json"));
        assert_eq!(store.load().unwrap(), None);
        assert_eq!(store.token(), None);
    }

    #[test]
    fn test_blank_or_missing_key_means_no_token() {
        let (_file, store) = store_with(r#"{"auth_token":"   "}"#);
        assert_eq!(store.token(), None);

        let (_file, store) = store_with(r#"{"other":"x"}"#);
        assert_eq!(store.token(), None);
    }

    #[test]
    fn test_corrupt_file_is_reported_by_load() {
        let (_file, store) = store_with("not json");
        assert!(store.load().is_err());
        assert_eq!(store.token(), None);
    }

    #[test]
    fn test_custom_key() {
        let (_file, store) = store_with(r#"{"session":"s1"}"#);
        let store = store.with_key("session");
        assert_eq!(store.token(), Some("s1".to_string()));
    }

    #[test]
    fn test_static_store() {
        assert_eq!(StaticTokenStore::new("t").token(), Some("t".to_string()));
        assert_eq!(StaticTokenStore::new("").token(), None);
        assert_eq!(StaticTokenStore::empty().token(), None);
    }
}
