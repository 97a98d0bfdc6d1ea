use super::{Result, StorefrontError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

pub const CART_KEY: &str = "lunadine_cart";
pub const FAVORITES_KEY: &str = "lunadine_favorites";
pub const ORDER_HISTORY_KEY: &str = "lunadine_order_history";
pub const LANGUAGE_KEY: &str = "lunadine_language";
pub const PENDING_PROMO_KEY: &str = "lunadine_pending_promo";

/// Durable string storage keyed by name. Values are whole JSON documents;
/// there are no partial updates.
pub trait Storage: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>>;
    fn write(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;

    fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>>
    where
        Self: Sized,
    {
        match self.read(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Like [`Storage::load`] but an unreadable document is discarded.
    fn load_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T>
    where
        Self: Sized,
    {
        match self.load(key) {
            Ok(value) => Ok(value.unwrap_or_default()),
            Err(StorefrontError::Json(e)) => {
                warn!(key, error = %e, "Discarding unreadable stored value");
                self.remove(key)?;
                Ok(T::default())
            }
            Err(e) => Err(e),
        }
    }

    fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<()>
    where
        Self: Sized,
    {
        self.write(key, &serde_json::to_string(value)?)
    }
}

/// In-process storage, used for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|e| StorefrontError::Storage(e.to_string()))
    }
}

impl Storage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        self.entries()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries()?.remove(key);
        Ok(())
    }
}

/// One `<key>.json` file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl Storage for FileStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        // Write then rename so a reader never sees half a document
        let tmp = self.dir.join(format!("{}.json.tmp", key));
        fs::write(&tmp, value)?;
        fs::rename(&tmp, self.path_for(key))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn file_storage_round_trips_and_removes() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path().join("store")).unwrap();

        assert_eq!(storage.read(LANGUAGE_KEY).unwrap(), None);

        storage.save(LANGUAGE_KEY, &"bn").unwrap();
        let loaded: Option<String> = storage.load(LANGUAGE_KEY).unwrap();
        assert_eq!(loaded.as_deref(), Some("bn"));

        storage.remove(LANGUAGE_KEY).unwrap();
        storage.remove(LANGUAGE_KEY).unwrap();
        assert_eq!(storage.read(LANGUAGE_KEY).unwrap(), None);
    }

    #[test]
    fn unreadable_document_falls_back_to_default() {
        let storage = MemoryStorage::new();
        storage.write(FAVORITES_KEY, "{not json").unwrap();

        let favorites: Vec<i64> = storage.load_or_default(FAVORITES_KEY).unwrap();
        assert!(favorites.is_empty());
        assert_eq!(storage.read(FAVORITES_KEY).unwrap(), None);
    }
}
