use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::KeyValueStore;
use crate::auth::AuthError;

/// File-backed store: one file per key under a base directory.
///
/// Writes go to a temp file in the same directory, are synced, then renamed
/// over the target, so readers never see a half-written value.
///
/// # Example
/// ```no_run
/// use cgm_link::storage::{FileKeyValueStore, KeyValueStore};
///
/// # async fn example() -> Result<(), cgm_link::auth::AuthError> {
/// let store = FileKeyValueStore::new("/tmp/cgm-link");
/// store.set("greeting", "hello").await?;
/// assert_eq!(store.get("greeting").await?.as_deref(), Some("hello"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    base_dir: PathBuf,
}

impl FileKeyValueStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.base_dir.join(format!("{}.json", normalize_key(key)))
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        match fs::read_to_string(self.path_for(key)).await {
            Ok(data) => Ok(Some(data)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(AuthError::Io(err.to_string())),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), AuthError> {
        fs::create_dir_all(&self.base_dir).await?;
        let path = self.path_for(key);
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let temp_path = self.base_dir.join(format!(
            ".{}.tmp-{}-{nonce}",
            normalize_key(key),
            std::process::id()
        ));

        if let Err(err) = write_synced(&temp_path, value.as_bytes()).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(AuthError::Io(err.to_string()));
        }
        if let Err(err) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(AuthError::Io(err.to_string()));
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), AuthError> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(AuthError::Io(err.to_string())),
        }
    }
}

async fn write_synced(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);
    let mut file = options.open(path).await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    Ok(())
}

fn normalize_key(value: &str) -> String {
    let trimmed = value.trim();
    let mut out = String::with_capacity(trimmed.len());
    for ch in trimmed.chars() {
        let lower = ch.to_ascii_lowercase();
        if lower.is_ascii_alphanumeric() || lower == '-' || lower == '_' {
            out.push(lower);
        } else {
            out.push('-');
        }
    }
    if out.trim_matches('-').is_empty() {
        "default".to_string()
    } else {
        out
    }
}
