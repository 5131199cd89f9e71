//! Persistence seam for dataset entities.
//!
//! A [`StoredDataset`] (dataset + its records) is the unit of every write, so a dataset is never
//! visible without its records and removing it removes them too.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, warn};

use crate::error::{ProcessingError, ProcessingResult};
use crate::types::{Dataset, DatasetId, OwnerId, StoredDataset};

use super::retention::newest_first;

/// Durable storage for datasets and their records.
pub trait DatasetRepository: Send + Sync {
    /// Reserve a fresh dataset id.
    fn next_id(&self) -> ProcessingResult<DatasetId>;

    /// Persist a dataset together with all of its records.
    fn insert(&self, stored: StoredDataset) -> ProcessingResult<()>;

    /// Load a dataset and its records.
    fn get(&self, id: DatasetId) -> ProcessingResult<Option<StoredDataset>>;

    /// Datasets belonging to `owner`, most recent first.
    fn list_by_owner(&self, owner: &OwnerId) -> ProcessingResult<Vec<Dataset>>;

    /// Remove a dataset and its records. Returns the removed dataset, if it existed.
    fn remove(&self, id: DatasetId) -> ProcessingResult<Option<Dataset>>;
}

#[derive(Debug, Default)]
struct MemoryInner {
    last_id: u64,
    datasets: BTreeMap<DatasetId, StoredDataset>,
}

/// Process-local repository.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    inner: Mutex<MemoryInner>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DatasetRepository for MemoryRepository {
    fn next_id(&self) -> ProcessingResult<DatasetId> {
        let mut inner = self.lock();
        inner.last_id += 1;
        Ok(DatasetId(inner.last_id))
    }

    fn insert(&self, stored: StoredDataset) -> ProcessingResult<()> {
        let mut inner = self.lock();
        let id = stored.dataset.id;
        if inner.datasets.contains_key(&id) {
            return Err(ProcessingError::storage(format!("dataset {id} already exists")));
        }
        inner.datasets.insert(id, stored);
        Ok(())
    }

    fn get(&self, id: DatasetId) -> ProcessingResult<Option<StoredDataset>> {
        Ok(self.lock().datasets.get(&id).cloned())
    }

    fn list_by_owner(&self, owner: &OwnerId) -> ProcessingResult<Vec<Dataset>> {
        let inner = self.lock();
        let mut out: Vec<Dataset> = inner
            .datasets
            .values()
            .filter(|s| &s.dataset.owner == owner)
            .map(|s| s.dataset.clone())
            .collect();
        out.sort_by(newest_first);
        Ok(out)
    }

    fn remove(&self, id: DatasetId) -> ProcessingResult<Option<Dataset>> {
        Ok(self.lock().datasets.remove(&id).map(|s| s.dataset))
    }
}

/// One JSON document per dataset under a directory.
///
/// Dataset headers are indexed in memory; records are read from disk on [`DatasetRepository::get`].
/// Writes go to a temp file first and are renamed into place.
pub struct JsonFileRepository {
    dir: PathBuf,
    index: Mutex<JsonIndex>,
}

#[derive(Default)]
struct JsonIndex {
    last_id: u64,
    datasets: BTreeMap<DatasetId, Dataset>,
}

impl fmt::Debug for JsonFileRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = self.lock().datasets.len();
        f.debug_struct("JsonFileRepository")
            .field("dir", &self.dir)
            .field("datasets_len", &len)
            .finish()
    }
}

impl JsonFileRepository {
    /// Open (creating if needed) a repository rooted at `dir`, loading every existing document.
    ///
    /// Documents that fail to decode are skipped with a warning; their ids are still never reused.
    pub fn open(dir: impl AsRef<Path>) -> ProcessingResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let dir_str = dir.to_str().ok_or_else(|| {
            ProcessingError::storage(format!("non UTF-8 repository path: {}", dir.display()))
        })?;
        let pattern = format!("{}/dataset-*.json", glob::Pattern::escape(dir_str));
        let paths = glob::glob(&pattern)
            .map_err(|e| ProcessingError::storage(format!("bad glob pattern '{pattern}': {e}")))?;

        let mut index = JsonIndex {
            last_id: read_id_counter(&dir.join(ID_COUNTER_FILE))?,
            ..Default::default()
        };
        for entry in paths {
            let path = entry.map_err(|e| ProcessingError::storage(e.to_string()))?;
            if let Some(id) = id_from_path(&path) {
                index.last_id = index.last_id.max(id);
            }
            let stored: StoredDataset = match serde_json::from_slice(&fs::read(&path)?) {
                Ok(stored) => stored,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "skipping unreadable dataset document"
                    );
                    continue;
                }
            };
            let id = stored.dataset.id;
            index.last_id = index.last_id.max(id.0);
            index.datasets.insert(id, stored.dataset);
        }
        debug!(dir = %dir.display(), datasets = index.datasets.len(), "opened dataset repository");

        Ok(Self {
            dir,
            index: Mutex::new(index),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn document_path(&self, id: DatasetId) -> PathBuf {
        self.dir.join(format!("dataset-{id}.json"))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, JsonIndex> {
        self.index.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DatasetRepository for JsonFileRepository {
    fn next_id(&self) -> ProcessingResult<DatasetId> {
        let mut index = self.lock();
        let id = index.last_id + 1;
        write_replacing(&self.dir.join(ID_COUNTER_FILE), id.to_string().as_bytes())?;
        index.last_id = id;
        Ok(DatasetId(id))
    }

    fn insert(&self, stored: StoredDataset) -> ProcessingResult<()> {
        let id = stored.dataset.id;
        let mut index = self.lock();
        if index.datasets.contains_key(&id) {
            return Err(ProcessingError::storage(format!("dataset {id} already exists")));
        }

        let bytes = serde_json::to_vec(&stored)?;
        write_replacing(&self.document_path(id), &bytes)?;
        index.last_id = index.last_id.max(id.0);
        index.datasets.insert(id, stored.dataset);
        Ok(())
    }

    fn get(&self, id: DatasetId) -> ProcessingResult<Option<StoredDataset>> {
        // Held across the read so a concurrent remove cannot unlink the document in between.
        let index = self.lock();
        if !index.datasets.contains_key(&id) {
            return Ok(None);
        }
        let bytes = fs::read(self.document_path(id))?;
        drop(index);
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    fn list_by_owner(&self, owner: &OwnerId) -> ProcessingResult<Vec<Dataset>> {
        let index = self.lock();
        let mut out: Vec<Dataset> = index
            .datasets
            .values()
            .filter(|d| &d.owner == owner)
            .cloned()
            .collect();
        out.sort_by(newest_first);
        Ok(out)
    }

    fn remove(&self, id: DatasetId) -> ProcessingResult<Option<Dataset>> {
        let mut index = self.lock();
        if !index.datasets.contains_key(&id) {
            return Ok(None);
        }
        match fs::remove_file(self.document_path(id)) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(index.datasets.remove(&id))
    }
}

/// Highest id ever handed out, so deleted ids are not reissued after a reopen.
const ID_COUNTER_FILE: &str = "last-id";

fn read_id_counter(path: &Path) -> ProcessingResult<u64> {
    match fs::read_to_string(path) {
        Ok(raw) => raw.trim().parse().map_err(|e| {
            ProcessingError::storage(format!("bad id counter {}: {e}", path.display()))
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(e.into()),
    }
}

/// `dataset-<id>.json` → `<id>`.
fn id_from_path(path: &Path) -> Option<u64> {
    path.file_stem()?.to_str()?.strip_prefix("dataset-")?.parse().ok()
}

/// Write to a sibling temp file, then rename over `path`.
fn write_replacing(path: &Path, bytes: &[u8]) -> ProcessingResult<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, bytes)?;
    if let Err(e) = fs::rename(&tmp, path) {
        if let Err(cleanup) = fs::remove_file(&tmp) {
            warn!(path = %tmp.display(), error = %cleanup, "failed to remove temp file");
        }
        return Err(e.into());
    }
    Ok(())
}
