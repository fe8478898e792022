use async_trait::async_trait;
use recallkit_core::{BlobStore, CoreError, CoreResult};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::task;
use tracing::debug;

pub mod paths;

/// Blob store over one flat directory; each blob is a file named after it.
///
/// Writes go through a temp file in the same directory and are renamed into
/// place, so a reader never sees a half-written blob.
#[derive(Clone, Debug)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// The directory is created on first write, not here.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn open_default() -> Self {
        Self::new(paths::data_root())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, name: &str) -> CoreResult<PathBuf> {
        let flat = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(|c: char| c == '/' || c == '\\');
        if !flat {
            return Err(CoreError::Storage(format!("invalid blob name {name:?}")));
        }
        Ok(self.root.join(name))
    }
}

fn io_error(op: &str, path: &Path, err: io::Error) -> CoreError {
    CoreError::Storage(format!("{op} {}: {err}", path.display()))
}

fn write_atomic(root: &Path, path: &Path, bytes: &[u8]) -> CoreResult<()> {
    fs::create_dir_all(root).map_err(|e| io_error("create", root, e))?;
    let mut tmp = NamedTempFile::new_in(root).map_err(|e| io_error("create temp in", root, e))?;
    tmp.write_all(bytes).map_err(|e| io_error("write", tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| io_error("sync", tmp.path(), e))?;
    tmp.persist(path).map_err(|e| io_error("rename into", path, e.error))?;
    Ok(())
}

fn list_suffix(root: &Path, suffix: &str) -> CoreResult<Vec<String>> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(io_error("list", root, err)),
    };
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| io_error("list", root, e))?;
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        // non-UTF-8 names cannot be blob names
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if name.ends_with(suffix) && !name.starts_with(".tmp") {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn write_blob(&self, name: &str, bytes: Vec<u8>) -> CoreResult<()> {
        let path = self.blob_path(name)?;
        let root = self.root.clone();
        let len = bytes.len();
        task::spawn_blocking(move || write_atomic(&root, &path, &bytes)).await??;
        debug!(blob = name, bytes = len, "blob written");
        Ok(())
    }

    async fn read_blob(&self, name: &str) -> CoreResult<Vec<u8>> {
        let path = self.blob_path(name)?;
        let owned = name.to_string();
        task::spawn_blocking(move || match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Err(CoreError::not_found("blob", owned))
            }
            Err(err) => Err(io_error("read", &path, err)),
        })
        .await?
    }

    async fn list_blobs(&self, suffix: &str) -> CoreResult<Vec<String>> {
        let root = self.root.clone();
        let suffix = suffix.to_string();
        task::spawn_blocking(move || list_suffix(&root, &suffix)).await?
    }
}
