//! Backing copies of original uploads.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::ProcessingResult;
use crate::types::{DatasetId, OwnerId};

const TMP_EXTENSION: &str = "partial";

/// Stores upload bytes at `<root>/<owner>/<id>_<filename>`.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the artifact for `(owner, id, filename)` lives.
    pub fn path_for(&self, owner: &OwnerId, id: DatasetId, filename: &str) -> PathBuf {
        self.root
            .join(sanitize(owner.as_str()))
            .join(format!("{id}_{}", sanitize(filename)))
    }

    /// Write an upload's bytes and return the artifact path.
    ///
    /// The bytes land in a sibling temp file first; a failed write leaves neither file behind.
    pub fn write(
        &self,
        owner: &OwnerId,
        id: DatasetId,
        filename: &str,
        bytes: &[u8],
    ) -> ProcessingResult<PathBuf> {
        let path = self.path_for(owner, id, filename);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension(TMP_EXTENSION);
        let written = fs::write(&tmp, bytes).and_then(|()| fs::rename(&tmp, &path));
        if let Err(e) = written {
            if let Err(cleanup) = fs::remove_file(&tmp) {
                if cleanup.kind() != io::ErrorKind::NotFound {
                    warn!(
                        path = %tmp.display(),
                        error = %cleanup,
                        "failed to remove partial artifact"
                    );
                }
            }
            return Err(e.into());
        }
        Ok(path)
    }

    /// Delete an artifact. An already-missing file is not an error.
    pub fn remove(&self, path: &Path) -> ProcessingResult<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Reduce a client-supplied name to a single safe path component.
fn sanitize(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    match cleaned.trim_start_matches('.') {
        "" => "_".to_string(),
        s => s.to_string(),
    }
}
