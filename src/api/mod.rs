pub mod tmdb;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::db::models::{Movie, MovieId, MoviePage, Review};

pub use self::tmdb::TmdbClient;

#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// No connectivity, DNS failure or timeout
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Malformed payload: {0}")]
    Decode(String),
}

/// The four curated movie lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MovieCategory {
    Popular,
    TopRated,
    NowPlaying,
    Upcoming,
}

impl MovieCategory {
    pub const ALL: [MovieCategory; 4] = [
        MovieCategory::Popular,
        MovieCategory::TopRated,
        MovieCategory::NowPlaying,
        MovieCategory::Upcoming,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            MovieCategory::Popular => "movie/popular",
            MovieCategory::TopRated => "movie/top_rated",
            MovieCategory::NowPlaying => "movie/now_playing",
            MovieCategory::Upcoming => "movie/upcoming",
        }
    }
}

impl fmt::Display for MovieCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MovieCategory::Popular => "popular",
            MovieCategory::TopRated => "top-rated",
            MovieCategory::NowPlaying => "now-playing",
            MovieCategory::Upcoming => "upcoming",
        };
        f.write_str(label)
    }
}

/// Typed contract for the remote metadata provider.
///
/// Implementations do no retrying and no caching.
#[async_trait]
pub trait MovieApi: Send + Sync {
    async fn fetch_list(
        &self,
        category: MovieCategory,
        page: Option<u32>,
    ) -> Result<MoviePage, ApiError>;

    async fn fetch_detail(&self, movie_id: MovieId) -> Result<Movie, ApiError>;

    async fn fetch_reviews(&self, movie_id: MovieId) -> Result<Vec<Review>, ApiError>;

    async fn search(&self, query: &str, page: Option<u32>) -> Result<MoviePage, ApiError>;

    async fn fetch_similar(
        &self,
        movie_id: MovieId,
        page: Option<u32>,
    ) -> Result<MoviePage, ApiError>;

    async fn fetch_popular(&self, page: Option<u32>) -> Result<MoviePage, ApiError> {
        self.fetch_list(MovieCategory::Popular, page).await
    }

    async fn fetch_top_rated(&self, page: Option<u32>) -> Result<MoviePage, ApiError> {
        self.fetch_list(MovieCategory::TopRated, page).await
    }

    async fn fetch_now_playing(&self, page: Option<u32>) -> Result<MoviePage, ApiError> {
        self.fetch_list(MovieCategory::NowPlaying, page).await
    }

    async fn fetch_upcoming(&self, page: Option<u32>) -> Result<MoviePage, ApiError> {
        self.fetch_list(MovieCategory::Upcoming, page).await
    }
}

pub type DynMovieApi = Arc<dyn MovieApi>;
