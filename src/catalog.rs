use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{error, info};

use crate::error::{CatalogError, CatalogResult};
use crate::model::{next_stamp, now_stamp, Movie, MoviePatch, NewMovie};
use crate::query::{self, MovieFilter, RatingStats, SortKey};
use crate::storage::{FileStore, RecordStore};

/// Record lifecycle manager and read facade over a `RecordStore`.
///
/// The store is the single source of truth: every operation reloads the
/// full collection, and nothing is cached between calls except the highest
/// id issued so far. Mutations run load -> modify -> save under the write
/// half of one process-wide lock; reads share the read half, so a reader
/// observes the collection either before or after any given mutation.
pub struct MovieCatalog {
    store: Arc<dyn RecordStore>,
    /// Highest id handed out or removed by this process. Guarded together
    /// with the mutation critical section.
    last_issued: RwLock<u64>,
}

impl std::fmt::Debug for MovieCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MovieCatalog")
        .field("last_issued", &self.last_issued.read().map(|g| *g).ok())
        .finish()
    }
}

impl MovieCatalog {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            last_issued: RwLock::new(0),
        }
    }

    pub fn open(path: impl AsRef<Path>) -> Self {
        Self::new(Arc::new(FileStore::new(path)))
    }

    // --- MUTATIONS ---

    /// Assigns `id = max(existing ids, last issued) + 1` and stamps both
    /// timestamps with the same instant. Input is trusted to be validated.
    pub fn create(&self, fields: NewMovie) -> CatalogResult<Movie> {
        let mut last_issued = self.write_gate()?;
        let mut movies = self.store.load()?;

        let id = next_id(&movies, *last_issued);
        let movie = fields.into_movie(id, now_stamp());
        movies.push(movie.clone());

        self.commit(&movies, "create", id)?;
        *last_issued = id;
        Ok(movie)
    }

    /// Merges `patch` onto the stored record. `id` and `created_at` are never
    /// touched; `updated_at` always moves forward, even for an empty patch.
    pub fn update(&self, id: u64, patch: MoviePatch) -> CatalogResult<Movie> {
        let _gate = self.write_gate()?;
        let mut movies = self.store.load()?;

        let slot = movies
        .iter_mut()
        .find(|m| m.id == id)
        .ok_or(CatalogError::NotFound(id))?;

        patch.apply(slot);
        slot.id = id;
        slot.updated_at = next_stamp(slot.updated_at);
        let updated = slot.clone();

        self.commit(&movies, "update", id)?;
        Ok(updated)
    }

    /// Removes the record and returns its last persisted state.
    pub fn delete(&self, id: u64) -> CatalogResult<Movie> {
        let mut last_issued = self.write_gate()?;
        let mut movies = self.store.load()?;

        let index = movies
        .iter()
        .position(|m| m.id == id)
        .ok_or(CatalogError::NotFound(id))?;
        let removed = movies.remove(index);

        self.commit(&movies, "delete", id)?;
        *last_issued = (*last_issued).max(removed.id);
        Ok(removed)
    }

    // --- READS ---

    pub fn find_by_id(&self, id: u64) -> CatalogResult<Movie> {
        self.snapshot()?
        .into_iter()
        .find(|m| m.id == id)
        .ok_or(CatalogError::NotFound(id))
    }

    pub fn all(&self) -> CatalogResult<Vec<Movie>> {
        self.snapshot()
    }

    /// Filter first, then sort. `sort: None` keeps stored order.
    pub fn list(&self, criteria: &MovieFilter, sort: Option<SortKey>) -> CatalogResult<Vec<Movie>> {
        let movies = self.snapshot()?;
        let matched = if criteria.is_empty() { movies } else { query::filter(&movies, criteria) };
        Ok(query::sort(matched, sort))
    }

    pub fn search(&self, term: &str) -> CatalogResult<Vec<Movie>> {
        let movies = self.snapshot()?;
        Ok(query::search_by_title(&movies, term))
    }

    /// `Ok(None)` when there is nothing to summarise.
    pub fn rating_stats(&self) -> CatalogResult<Option<RatingStats>> {
        let movies = self.snapshot()?;
        Ok(query::rating_stats(&movies))
    }

    // --- INTERNALS ---

    fn snapshot(&self) -> CatalogResult<Vec<Movie>> {
        let _gate = self.read_gate()?;
        Ok(self.store.load()?)
    }

    fn commit(&self, movies: &[Movie], op: &str, id: u64) -> CatalogResult<()> {
        match self.store.save(movies) {
            Ok(()) => {
                info!(op, id, total = movies.len(), "movie change committed");
                Ok(())
            }
            Err(e) => {
                error!(op, id, error = %e, "movie change rolled back");
                Err(CatalogError::Persistence(e))
            }
        }
    }

    fn read_gate(&self) -> CatalogResult<RwLockReadGuard<'_, u64>> {
        self.last_issued.read().map_err(|_| CatalogError::LockPoisoned)
    }

    fn write_gate(&self) -> CatalogResult<RwLockWriteGuard<'_, u64>> {
        self.last_issued.write().map_err(|_| CatalogError::LockPoisoned)
    }
}

fn next_id(movies: &[Movie], last_issued: u64) -> u64 {
    movies
    .iter()
    .map(|m| m.id)
    .max()
    .unwrap_or(0)
    .max(last_issued)
    + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::now_stamp;

    fn stored(id: u64) -> Movie {
        NewMovie {
            title: format!("Movie {}", id),
            director: "D".into(),
            year: 2000,
            genre: "G".into(),
            rating: 5.0,
            description: String::new(),
        }
        .into_movie(id, now_stamp())
    }

    #[test]
    fn test_next_id_on_empty_collection() {
        assert_eq!(next_id(&[], 0), 1);
    }

    #[test]
    fn test_next_id_follows_max_not_length() {
        let movies = vec![stored(7), stored(2)];
        assert_eq!(next_id(&movies, 0), 8);
    }

    #[test]
    fn test_next_id_respects_watermark() {
        let movies = vec![stored(2)];
        assert_eq!(next_id(&movies, 5), 6);
        assert_eq!(next_id(&[], 5), 6);
    }
}
