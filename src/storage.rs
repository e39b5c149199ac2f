use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};
use crate::model::Movie;

/// Whole-collection persistence. Every `save` replaces the full state; there
/// are no incremental writes.
pub trait RecordStore: Send + Sync {
    fn load(&self) -> StorageResult<Vec<Movie>>;
    fn save(&self, movies: &[Movie]) -> StorageResult<()>;
}

/// JSON array on disk, pretty-printed with 2-space indentation.
#[derive(Debug, Clone)]
pub struct FileStore {
    pub file_path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { file_path: path.as_ref().to_path_buf() }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    fn write_error(&self, source: io::Error) -> StorageError {
        StorageError::Write { path: self.file_path.clone(), source }
    }

    fn parent_dir(&self) -> &Path {
        match self.file_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }
}

impl RecordStore for FileStore {
    fn load(&self) -> StorageResult<Vec<Movie>> {
        let data = match fs::read_to_string(&self.file_path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(path = %self.file_path.display(), "store file missing, initialising empty collection");
                // A failed initialisation is still a failed load
                self.save(&[]).map_err(|e| match e {
                    StorageError::Write { path, source } => StorageError::Read { path, source },
                    other => other,
                })?;
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(StorageError::Read { path: self.file_path.clone(), source });
            }
        };

        serde_json::from_str(&data).map_err(|source| StorageError::Corrupt {
            path: self.file_path.clone(),
            source,
        })
    }

    fn save(&self, movies: &[Movie]) -> StorageResult<()> {
        let bytes = serde_json::to_vec_pretty(movies).map_err(StorageError::Encode)?;

        // 1. Stage next to the target so the rename stays on one filesystem
        let dir = self.parent_dir();
        fs::create_dir_all(dir).map_err(|e| self.write_error(e))?;
        let mut staged = NamedTempFile::new_in(dir).map_err(|e| self.write_error(e))?;

        // 2. Write + fsync the full collection
        staged.write_all(&bytes).map_err(|e| self.write_error(e))?;
        staged.as_file().sync_all().map_err(|e| self.write_error(e))?;

        // 3. Atomic swap; readers see either the old file or the new one
        staged.persist(&self.file_path).map_err(|e| self.write_error(e.error))?;

        debug!(path = %self.file_path.display(), records = movies.len(), "store saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{now_stamp, NewMovie};
    use tempfile::TempDir;

    fn movie(id: u64, title: &str, rating: f64) -> Movie {
        NewMovie {
            title: title.into(),
            director: "Someone".into(),
            year: 2000,
            genre: "Drama".into(),
            rating,
            description: "Ünïcödé ok".into(),
        }
        .into_movie(id, now_stamp())
    }

    #[test]
    fn test_missing_file_is_initialised_empty() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data").join("movies.json");
        let store = FileStore::new(&path);

        let movies = store.load().unwrap();
        assert!(movies.is_empty());
        assert!(path.exists());
        assert_eq!(fs::read_to_string(&path).unwrap(), "[]");
    }

    #[test]
    fn test_save_then_load_is_content_stable() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path().join("movies.json"));
        let movies = vec![movie(1, "Heat", 8.3), movie(2, "Ran", 8.2)];

        store.save(&movies).unwrap();
        let first_bytes = fs::read(store.path()).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded, movies);

        store.save(&loaded).unwrap();
        assert_eq!(fs::read(store.path()).unwrap(), first_bytes);
        assert_eq!(store.load().unwrap(), movies);
    }

    #[test]
    fn test_file_uses_two_space_indentation() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path().join("movies.json"));
        store.save(&[movie(1, "Heat", 8.3)]).unwrap();

        let text = fs::read_to_string(store.path()).unwrap();
        assert!(text.starts_with("[\n  {\n    \"id\": 1,"));
    }

    #[test]
    fn test_corrupt_file_is_a_read_failure() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("movies.json");
        fs::write(&path, "{ not json").unwrap();

        let err = FileStore::new(&path).load().unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { .. }));
        assert!(err.is_read_failure());
        // Not auto-repaired
        assert_eq!(fs::read_to_string(&path).unwrap(), "{ not json");
    }

    #[test]
    fn test_uninitialisable_location_is_a_read_failure() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        fs::write(&blocker, "file, not a directory").unwrap();

        let err = FileStore::new(blocker.join("movies.json")).load().unwrap_err();
        assert!(matches!(err, StorageError::Read { .. }));
        assert!(err.is_read_failure());
    }

    #[test]
    fn test_unwritable_location_is_a_write_failure() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        fs::write(&blocker, "file, not a directory").unwrap();

        let store = FileStore::new(blocker.join("movies.json"));
        let err = store.save(&[]).unwrap_err();
        assert!(matches!(err, StorageError::Write { .. }));
        assert!(!err.is_read_failure());
    }
}
