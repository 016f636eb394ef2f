//! Whole-document JSON persistence with atomic replace.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid json in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StorageError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// JSON documents under a root directory.
///
/// `save` writes a sibling temp file, fsyncs it and renames it over the
/// target, so readers see either the old or the new document.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(relative)
    }

    pub fn exists(&self, relative: impl AsRef<Path>) -> bool {
        self.path(relative).is_file()
    }

    /// `None` when the document does not exist.
    pub fn load<T: DeserializeOwned>(&self, relative: impl AsRef<Path>) -> Result<Option<T>, StorageError> {
        let path = self.path(relative);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::io(&path, e)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StorageError::Json { path, source })
    }

    pub fn load_or_default<T: DeserializeOwned + Default>(
        &self,
        relative: impl AsRef<Path>,
    ) -> Result<T, StorageError> {
        Ok(self.load(relative)?.unwrap_or_default())
    }

    pub fn save<T: Serialize + ?Sized>(&self, relative: impl AsRef<Path>, value: &T) -> Result<(), StorageError> {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
        }

        let body = serde_json::to_vec_pretty(value).map_err(|source| StorageError::Json {
            path: path.clone(),
            source,
        })?;

        let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        tmp_name.push(".tmp");
        let tmp = path.with_file_name(tmp_name);

        let mut file = File::create(&tmp).map_err(|e| StorageError::io(&tmp, e))?;
        file.write_all(&body).map_err(|e| StorageError::io(&tmp, e))?;
        file.sync_all().map_err(|e| StorageError::io(&tmp, e))?;
        drop(file);

        fs::rename(&tmp, &path).map_err(|e| StorageError::io(&path, e))
    }

    /// Write `value` only if the document does not exist yet.
    pub fn create_if_missing<T: Serialize + ?Sized>(
        &self,
        relative: impl AsRef<Path>,
        value: &T,
    ) -> Result<bool, StorageError> {
        let relative = relative.as_ref();
        if self.exists(relative) {
            return Ok(false);
        }
        self.save(relative, value)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn temp_store() -> (TempDir, JsonFileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("store"));
        (dir, store)
    }

    #[test]
    fn save_then_load_and_replace() {
        let (_dir, store) = temp_store();
        let mut doc = BTreeMap::new();
        doc.insert("a".to_string(), 1);
        store.save("nested/doc.json", &doc).unwrap();
        doc.insert("b".to_string(), 2);
        store.save("nested/doc.json", &doc).unwrap();

        let loaded: BTreeMap<String, i32> = store.load("nested/doc.json").unwrap().unwrap();
        assert_eq!(loaded, doc);
        assert!(!store.path("nested/doc.json.tmp").exists());
    }

    #[test]
    fn missing_document_is_none_and_bad_json_is_an_error() {
        let (_dir, store) = temp_store();
        assert_eq!(store.load::<Vec<i32>>("missing.json").unwrap(), None);
        assert_eq!(store.load_or_default::<Vec<i32>>("missing.json").unwrap(), Vec::<i32>::new());

        fs::create_dir_all(store.root()).unwrap();
        fs::write(store.path("bad.json"), b"{ nope").unwrap();
        assert!(matches!(
            store.load::<Vec<i32>>("bad.json"),
            Err(StorageError::Json { .. })
        ));
    }

    #[test]
    fn create_if_missing_keeps_existing() {
        let (_dir, store) = temp_store();
        assert!(store.create_if_missing("x.json", &vec![1]).unwrap());
        assert!(!store.create_if_missing("x.json", &vec![2]).unwrap());
        assert_eq!(store.load::<Vec<i32>>("x.json").unwrap(), Some(vec![1]));
    }
}
