// Remote-or-cache mediation: online failures are reported, never papered over with cached rows

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinSet;

use crate::api::{DynMovieApi, MovieCategory};
use crate::db::models::{FavoriteMovie, Movie, MovieId, MoviePage, Review, User};
use crate::error::{AppError, AppResult};
use crate::store::DynLocalStore;

/// Connectivity flag sensed outside the repository and pushed in.
#[derive(Debug, Clone, Default)]
pub struct Connectivity(Arc<AtomicBool>);

impl Connectivity {
    pub fn new(offline: bool) -> Self {
        Self(Arc::new(AtomicBool::new(offline)))
    }

    pub fn is_offline(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn set_offline(&self, offline: bool) {
        self.0.store(offline, Ordering::SeqCst);
    }
}

/// Where a fetched value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Remote,
    Cache,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<T> {
    pub value: T,
    pub source: Source,
}

impl<T> Fetched<T> {
    fn remote(value: T) -> Self {
        Self {
            value,
            source: Source::Remote,
        }
    }

    fn cache(value: T) -> Self {
        Self {
            value,
            source: Source::Cache,
        }
    }
}

pub struct SyncRepository {
    api: DynMovieApi,
    store: DynLocalStore,
    connectivity: Connectivity,
    cache_writes: Mutex<JoinSet<()>>,
}

impl SyncRepository {
    pub fn new(api: DynMovieApi, store: DynLocalStore, connectivity: Connectivity) -> Self {
        Self {
            api,
            store,
            connectivity,
            cache_writes: Mutex::new(JoinSet::new()),
        }
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    pub fn set_offline(&self, offline: bool) {
        self.connectivity.set_offline(offline);
    }

    // ------------------- Movie fetching ------------------- //

    pub async fn fetch_list(
        &self,
        category: MovieCategory,
        page: Option<u32>,
    ) -> AppResult<Fetched<MoviePage>> {
        if self.connectivity.is_offline() {
            tracing::debug!("Offline, serving {} from cache", category);
            return self.cached_page().await;
        }

        match self.api.fetch_list(category, page).await {
            Ok(page) => {
                self.spawn_cache_write(page.results.clone());
                Ok(Fetched::remote(page))
            }
            Err(e) => {
                let err = AppError::from(e);
                if self.connectivity.is_offline() {
                    tracing::debug!("Fetching {} failed after going offline: {}", category, err);
                    return self.cached_page().await;
                }
                Err(err)
            }
        }
    }

    pub async fn fetch_popular(&self, page: Option<u32>) -> AppResult<Fetched<MoviePage>> {
        self.fetch_list(MovieCategory::Popular, page).await
    }

    pub async fn fetch_top_rated(&self, page: Option<u32>) -> AppResult<Fetched<MoviePage>> {
        self.fetch_list(MovieCategory::TopRated, page).await
    }

    pub async fn fetch_now_playing(&self, page: Option<u32>) -> AppResult<Fetched<MoviePage>> {
        self.fetch_list(MovieCategory::NowPlaying, page).await
    }

    pub async fn fetch_upcoming(&self, page: Option<u32>) -> AppResult<Fetched<MoviePage>> {
        self.fetch_list(MovieCategory::Upcoming, page).await
    }

    pub async fn search(&self, query: &str, page: Option<u32>) -> AppResult<Fetched<MoviePage>> {
        if self.connectivity.is_offline() {
            return self.cached_search(query).await;
        }

        match self.api.search(query, page).await {
            Ok(page) => {
                self.spawn_cache_write(page.results.clone());
                Ok(Fetched::remote(page))
            }
            Err(e) => {
                let err = AppError::from(e);
                if self.connectivity.is_offline() {
                    return self.cached_search(query).await;
                }
                Err(err)
            }
        }
    }

    /// Detail for one movie. `None` when the provider does not know the id,
    /// or when offline and the movie was never cached.
    pub async fn fetch_detail(&self, movie_id: MovieId) -> AppResult<Fetched<Option<Movie>>> {
        if self.connectivity.is_offline() {
            let cached = self.store.cached_movie(movie_id).await?;
            return Ok(Fetched::cache(cached));
        }

        match self.api.fetch_detail(movie_id).await {
            Ok(movie) => {
                self.spawn_cache_write(vec![movie.clone()]);
                Ok(Fetched::remote(Some(movie)))
            }
            Err(e) => match AppError::from(e) {
                AppError::NotFound => Ok(Fetched::remote(None)),
                _ if self.connectivity.is_offline() => {
                    let cached = self.store.cached_movie(movie_id).await?;
                    Ok(Fetched::cache(cached))
                }
                err => Err(err),
            },
        }
    }

    /// Reviews are never cached. Offline or failing yields an empty list.
    pub async fn fetch_reviews(&self, movie_id: MovieId) -> Vec<Review> {
        if self.connectivity.is_offline() {
            return Vec::new();
        }
        match self.api.fetch_reviews(movie_id).await {
            Ok(reviews) => reviews,
            Err(e) => {
                tracing::warn!("Reviews for movie {} unavailable: {}", movie_id, e);
                Vec::new()
            }
        }
    }

    /// Similar titles. Offline or failing yields an empty list.
    pub async fn fetch_similar(&self, movie_id: MovieId, page: Option<u32>) -> Vec<Movie> {
        if self.connectivity.is_offline() {
            return Vec::new();
        }
        match self.api.fetch_similar(movie_id, page).await {
            Ok(page) => {
                self.spawn_cache_write(page.results.clone());
                page.results
            }
            Err(e) => {
                tracing::warn!("Similar movies for {} unavailable: {}", movie_id, e);
                Vec::new()
            }
        }
    }

    /// Everything in the movie cache, unfiltered.
    pub async fn cached_movies(&self) -> AppResult<Vec<Movie>> {
        Ok(self.store.cached_movies().await?)
    }

    async fn cached_page(&self) -> AppResult<Fetched<MoviePage>> {
        let movies = self.store.cached_movies().await?;
        Ok(Fetched::cache(MoviePage::single(movies)))
    }

    async fn cached_search(&self, query: &str) -> AppResult<Fetched<MoviePage>> {
        let movies = self.store.find_movies_by_title(query).await?;
        Ok(Fetched::cache(MoviePage::single(movies)))
    }

    fn spawn_cache_write(&self, movies: Vec<Movie>) {
        if movies.is_empty() {
            return;
        }
        let store = self.store.clone();
        let mut writes = self
            .cache_writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Reap finished writes so the set does not grow unbounded
        while writes.try_join_next().is_some() {}
        writes.spawn(async move {
            let count = movies.len();
            match store.cache_movies(&movies).await {
                Ok(()) => tracing::debug!("Cached {} movies", count),
                Err(e) => tracing::warn!("Failed to cache {} movies: {}", count, e),
            }
        });
    }

    /// Wait for every pending cache write to finish.
    pub async fn flush(&self) {
        let mut pending = {
            let mut writes = self
                .cache_writes
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *writes)
        };
        while let Some(result) = pending.join_next().await {
            if let Err(e) = result {
                tracing::warn!("Cache write task failed: {}", e);
            }
        }
    }

    // ------------------- User auth ------------------- //
    // Local only. Offline gating is the caller's job.

    pub async fn register(
        &self,
        user_id: &str,
        password: &str,
        preferred_name: &str,
    ) -> AppResult<User> {
        let user = User {
            user_id: user_id.to_string(),
            password: password.to_string(),
            preferred_name: preferred_name.to_string(),
        };
        if !self.store.insert_user(&user).await? {
            return Err(AppError::DuplicateUser(user_id.to_string()));
        }
        tracing::info!("Registered user {}", user_id);
        Ok(user)
    }

    /// Plaintext comparison against the stored password.
    pub async fn login(&self, user_id: &str, password: &str) -> AppResult<User> {
        match self.store.find_user(user_id).await? {
            Some(user) if user.password == password => Ok(user),
            _ => Err(AppError::InvalidCredentials),
        }
    }

    pub async fn check_user_id_exists(&self, user_id: &str) -> AppResult<bool> {
        Ok(self.store.find_user(user_id).await?.is_some())
    }

    // ------------------- Favorites ------------------- //

    pub async fn add_favorite(&self, user_id: &str, movie: &Movie) -> AppResult<FavoriteMovie> {
        let favorite = FavoriteMovie::snapshot(user_id, movie);
        self.store.upsert_favorite(&favorite).await?;
        Ok(favorite)
    }

    /// Removing a favorite that does not exist is not an error.
    pub async fn remove_favorite(&self, user_id: &str, movie_id: MovieId) -> AppResult<()> {
        if !self.store.delete_favorite(user_id, movie_id).await? {
            tracing::debug!("No favorite {} for {} to remove", movie_id, user_id);
        }
        Ok(())
    }

    /// Membership check. Storage failures read as "not a favorite".
    pub async fn is_favorite(&self, user_id: &str, movie_id: MovieId) -> bool {
        match self.store.is_favorite(user_id, movie_id).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!("Favorite check for {} failed: {}", movie_id, e);
                false
            }
        }
    }

    pub async fn list_favorites(&self, user_id: &str) -> AppResult<Vec<FavoriteMovie>> {
        Ok(self.store.favorites_for_user(user_id).await?)
    }
}
