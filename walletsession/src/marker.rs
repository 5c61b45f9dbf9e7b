use crate::errors::MarkerError;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Persisted key/value markers, used to remember the last connected wallet
pub trait MarkerStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>, MarkerError>;
    fn store(&self, key: &str, value: &str) -> Result<(), MarkerError>;
    fn remove(&self, key: &str) -> Result<(), MarkerError>;
}

/// Markers that live as long as the process
#[derive(Debug, Default)]
pub struct MemoryMarkerStore {
    markers: Mutex<BTreeMap<String, String>>,
}

impl MemoryMarkerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MarkerStore for MemoryMarkerStore {
    fn load(&self, key: &str) -> Result<Option<String>, MarkerError> {
        Ok(self.markers.lock().get(key).cloned())
    }

    fn store(&self, key: &str, value: &str) -> Result<(), MarkerError> {
        self.markers.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), MarkerError> {
        self.markers.lock().remove(key);
        Ok(())
    }
}

/// Markers kept in a JSON object on disk
#[derive(Debug)]
pub struct FileMarkerStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileMarkerStore {
    pub const FILE_NAME: &'static str = "markers.json";

    /// Store backed by `markers.json` inside `dir`. The directory is created on first write.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(Self::FILE_NAME),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, MarkerError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Like `read_all`, but a corrupt file counts as empty so the next write replaces it
    fn read_all_for_update(&self) -> Result<BTreeMap<String, String>, MarkerError> {
        match self.read_all() {
            Err(MarkerError::Json(err)) => {
                warn!(path = %self.path.display(), error = %err, "discarding corrupt marker file");
                Ok(BTreeMap::new())
            }
            other => other,
        }
    }

    fn write_all(&self, markers: &BTreeMap<String, String>) -> Result<(), MarkerError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(markers)?)?;
        Ok(())
    }
}

impl MarkerStore for FileMarkerStore {
    fn load(&self, key: &str) -> Result<Option<String>, MarkerError> {
        let _guard = self.lock.lock();
        Ok(self.read_all()?.remove(key))
    }

    fn store(&self, key: &str, value: &str) -> Result<(), MarkerError> {
        let _guard = self.lock.lock();
        let mut markers = self.read_all_for_update()?;
        markers.insert(key.to_string(), value.to_string());
        self.write_all(&markers)
    }

    fn remove(&self, key: &str) -> Result<(), MarkerError> {
        let _guard = self.lock.lock();
        let mut markers = match self.read_all() {
            Ok(markers) => markers,
            Err(MarkerError::Json(err)) => {
                warn!(path = %self.path.display(), error = %err, "removing corrupt marker file");
                fs::remove_file(&self.path)?;
                return Ok(());
            }
            Err(err) => return Err(err),
        };
        if markers.remove(key).is_some() {
            self.write_all(&markers)?;
        }
        Ok(())
    }
}
