pub mod model;
pub mod error;
pub mod storage;
pub mod query;
pub mod catalog;
pub mod validation;
pub mod server;
pub mod config;
pub mod parser;

pub use catalog::MovieCatalog;
pub use error::{CatalogError, CatalogResult, StorageError, StorageResult};
pub use model::{Movie, MoviePatch, NewMovie};
pub use query::{MovieFilter, RatingStats, SortKey};
pub use storage::{FileStore, RecordStore};
