// Local persistence contract - users, movie cache and favorites
mod sqlite;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::db::models::{FavoriteMovie, Movie, MovieId, User};

pub use self::sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Durable storage for the three record kinds.
///
/// Writes are whole-row upserts keyed by primary key, except `insert_user`
/// which never overwrites an existing account.
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn find_user(&self, user_id: &str) -> Result<Option<User>, StoreError>;

    /// Insert if absent. Returns false when the user id is already taken.
    async fn insert_user(&self, user: &User) -> Result<bool, StoreError>;

    async fn cache_movies(&self, movies: &[Movie]) -> Result<(), StoreError>;

    async fn cached_movies(&self) -> Result<Vec<Movie>, StoreError>;

    async fn cached_movie(&self, movie_id: MovieId) -> Result<Option<Movie>, StoreError>;

    /// Case-insensitive substring match over cached titles
    async fn find_movies_by_title(&self, pattern: &str) -> Result<Vec<Movie>, StoreError>;

    async fn upsert_favorite(&self, favorite: &FavoriteMovie) -> Result<(), StoreError>;

    /// Returns whether a row was removed
    async fn delete_favorite(&self, user_id: &str, movie_id: MovieId)
        -> Result<bool, StoreError>;

    async fn is_favorite(&self, user_id: &str, movie_id: MovieId) -> Result<bool, StoreError>;

    async fn favorites_for_user(&self, user_id: &str) -> Result<Vec<FavoriteMovie>, StoreError>;
}

pub type DynLocalStore = Arc<dyn LocalStore>;
