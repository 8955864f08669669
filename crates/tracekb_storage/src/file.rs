//! File-based graph backend, shareable between processes.
//!
//! Store directory layout:
//!
//! ```text
//! <store>/
//! ├─ LOCK          # Advisory lock serializing writers across processes
//! ├─ graph.cbor    # Snapshot of the whole store
//! └─ graph.tmp     # Temporary file for atomic snapshot writes
//! ```

use crate::backend::{Fragment, FragmentUpdate, GraphBackend, GraphState, ResourceMeta, WriteGuard};
use crate::error::{StorageError, StorageResult};
use fs2::FileExt;
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const SNAPSHOT_FILE: &str = "graph.cbor";
const SNAPSHOT_TEMP: &str = "graph.tmp";

/// Current snapshot format version.
pub const FORMAT_VERSION: u16 = 1;

#[derive(Serialize, Deserialize)]
struct Snapshot {
    format_version: u16,
    state: GraphState,
}

/// A graph backend persisted in a directory.
///
/// Several processes may open the same directory. Writers are serialized by
/// an exclusive `fs2` lock on the `LOCK` file, and every commit replaces the
/// snapshot with write-then-rename, so readers always observe a complete
/// snapshot.
///
/// # Example
///
/// ```no_run
/// use tracekb_storage::{FileGraph, GraphBackend};
/// use std::path::Path;
///
/// let backend = FileGraph::open(Path::new("my_store"), true).unwrap();
/// let frag = backend.fragment("http://localhost/base1/").unwrap();
/// ```
#[derive(Debug)]
pub struct FileGraph {
    path: PathBuf,
    /// Serializes writers of this handle; `LOCK` serializes processes.
    writer: Mutex<()>,
}

impl FileGraph {
    /// Opens or creates a store directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory does not exist and
    /// `create_if_missing` is false, or if it cannot be created.
    pub fn open(path: &Path, create_if_missing: bool) -> StorageResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(StorageError::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("store directory does not exist: {}", path.display()),
                )));
            }
        }

        if !path.is_dir() {
            return Err(StorageError::Corrupted(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(()),
        })
    }

    /// Returns the store directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if no snapshot has been written yet.
    #[must_use]
    pub fn is_new(&self) -> bool {
        !self.path.join(SNAPSHOT_FILE).exists()
    }

    fn load(&self) -> StorageResult<GraphState> {
        let file = match File::open(self.path.join(SNAPSHOT_FILE)) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(GraphState::default()),
            Err(e) => return Err(e.into()),
        };
        if file.metadata()?.len() == 0 {
            return Ok(GraphState::default());
        }

        let snapshot: Snapshot =
            ciborium::from_reader(BufReader::new(file)).map_err(StorageError::codec)?;
        if snapshot.format_version != FORMAT_VERSION {
            return Err(StorageError::Corrupted(format!(
                "unsupported snapshot format version {}",
                snapshot.format_version
            )));
        }
        Ok(snapshot.state)
    }

    fn store(&self, state: GraphState) -> StorageResult<()> {
        let temp_path = self.path.join(SNAPSHOT_TEMP);
        let snapshot = Snapshot {
            format_version: FORMAT_VERSION,
            state,
        };

        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        ciborium::into_writer(&snapshot, &mut writer).map_err(StorageError::codec)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        drop(writer);

        fs::rename(&temp_path, self.path.join(SNAPSHOT_FILE))?;
        self.sync_directory()
    }

    #[cfg(unix)]
    fn sync_directory(&self) -> StorageResult<()> {
        File::open(&self.path)?.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_directory(&self) -> StorageResult<()> {
        Ok(())
    }
}

impl GraphBackend for FileGraph {
    fn fragment(&self, uri: &str) -> StorageResult<Fragment> {
        Ok(self.load()?.fragment(uri))
    }

    fn meta(&self, uri: &str) -> StorageResult<Option<ResourceMeta>> {
        Ok(self.load()?.resources.remove(uri))
    }

    fn resources(&self) -> StorageResult<Vec<(String, ResourceMeta)>> {
        Ok(self.load()?.list())
    }

    fn write(&self) -> StorageResult<Box<dyn WriteGuard + '_>> {
        let local = self.writer.lock();

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.path.join(LOCK_FILE))?;
        lock_file
            .lock_exclusive()
            .map_err(|e| StorageError::Locked(e.to_string()))?;

        let state = match self.load() {
            Ok(state) => state,
            Err(e) => {
                let _ = FileExt::unlock(&lock_file);
                return Err(e);
            }
        };

        Ok(Box::new(FileWriteGuard {
            backend: self,
            lock_file,
            state,
            dirty: false,
            _local: local,
        }))
    }
}

/// Write section of a [`FileGraph`]. Holds the `LOCK` file exclusively.
struct FileWriteGuard<'a> {
    backend: &'a FileGraph,
    lock_file: File,
    state: GraphState,
    dirty: bool,
    _local: MutexGuard<'a, ()>,
}

impl WriteGuard for FileWriteGuard<'_> {
    fn fragment(&self, uri: &str) -> StorageResult<Fragment> {
        Ok(self.state.fragment(uri))
    }

    fn apply(&mut self, uri: &str, update: FragmentUpdate) -> StorageResult<()> {
        self.state.apply(uri, update);
        self.dirty = true;
        Ok(())
    }

    fn commit(mut self: Box<Self>) -> StorageResult<()> {
        if self.dirty {
            let state = std::mem::take(&mut self.state);
            self.backend.store(state)?;
        }
        Ok(())
    }
}

impl Drop for FileWriteGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.lock_file) {
            tracing::warn!(error = %e, "failed to unlock store guard file");
        }
    }
}
