// Shared fixtures for the integration tests
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tempfile::TempDir;
use tokio::sync::oneshot;

use movieviewer::api::{ApiError, MovieApi, MovieCategory};
use movieviewer::db;
use movieviewer::db::models::{FavoriteMovie, Movie, MovieId, MoviePage, Review, User};
use movieviewer::repository::{Connectivity, SyncRepository};
use movieviewer::state::AppState;
use movieviewer::store::{DynLocalStore, LocalStore, SqliteStore, StoreError};

pub fn movie(id: i64, title: &str) -> Movie {
    let mut movie = Movie::new(id, title);
    movie.overview = Some(format!("About {}", title));
    movie.poster_path = Some(format!("/poster{}.jpg", id));
    movie.release_date = Some("2010-07-16".to_string());
    movie.vote_average = Some(8.4);
    movie
}

pub fn review(id: &str, author: &str) -> Review {
    Review {
        id: id.to_string(),
        author: author.to_string(),
        content: format!("{} liked it", author),
        created_at: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
    }
}

#[derive(Default)]
struct Script {
    lists: HashMap<MovieCategory, Vec<Movie>>,
    searches: HashMap<String, Vec<Movie>>,
    details: HashMap<MovieId, Movie>,
    reviews: HashMap<MovieId, Vec<Review>>,
    similar: HashMap<MovieId, Vec<Movie>>,
    failure: Option<ApiError>,
    drop_connection: Option<Connectivity>,
    holds: VecDeque<oneshot::Receiver<()>>,
}

/// Scripted stand-in for the remote API.
///
/// Each response is decided when the call starts, so a held call keeps the
/// answer it was going to give even if the script changes meanwhile.
#[derive(Default)]
pub struct FakeApi {
    script: Mutex<Script>,
    calls: AtomicUsize,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn with_list(&self, category: MovieCategory, movies: Vec<Movie>) {
        self.script.lock().unwrap().lists.insert(category, movies);
    }

    pub fn with_search(&self, query: &str, movies: Vec<Movie>) {
        self.script
            .lock()
            .unwrap()
            .searches
            .insert(query.to_string(), movies);
    }

    pub fn with_detail(&self, movie: Movie) {
        self.script.lock().unwrap().details.insert(movie.id, movie);
    }

    pub fn with_reviews(&self, movie_id: i64, reviews: Vec<Review>) {
        self.script
            .lock()
            .unwrap()
            .reviews
            .insert(MovieId(movie_id), reviews);
    }

    pub fn with_similar(&self, movie_id: i64, movies: Vec<Movie>) {
        self.script
            .lock()
            .unwrap()
            .similar
            .insert(MovieId(movie_id), movies);
    }

    /// Every call fails with `error` until `recover` is called.
    pub fn fail_with(&self, error: ApiError) {
        self.script.lock().unwrap().failure = Some(error);
    }

    pub fn recover(&self) {
        self.script.lock().unwrap().failure = None;
    }

    /// Flip `connectivity` to offline whenever a call is made, like a
    /// connection dropping mid-request.
    pub fn drop_connection_on_call(&self, connectivity: Connectivity) {
        self.script.lock().unwrap().drop_connection = Some(connectivity);
    }

    /// Hold the next call until the returned sender fires or is dropped.
    pub fn hold_next(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.script.lock().unwrap().holds.push_back(rx);
        tx
    }

    /// Wait until at least `n` calls have started.
    pub async fn wait_for_calls(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.calls() < n {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("remote call never started");
    }

    async fn respond<T>(
        &self,
        answer: impl FnOnce(&Script) -> Result<T, ApiError> + Send,
    ) -> Result<T, ApiError>
    where
        T: Send,
    {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (result, hold) = {
            let mut script = self.script.lock().unwrap();
            if let Some(connectivity) = &script.drop_connection {
                connectivity.set_offline(true);
            }
            let result = match &script.failure {
                Some(error) => Err(error.clone()),
                None => answer(&script),
            };
            (result, script.holds.pop_front())
        };
        if let Some(gate) = hold {
            let _ = gate.await;
        }
        result
    }
}

fn not_found() -> ApiError {
    ApiError::Status {
        status: 404,
        message: "The resource you requested could not be found.".to_string(),
    }
}

#[async_trait]
impl MovieApi for FakeApi {
    async fn fetch_list(
        &self,
        category: MovieCategory,
        _page: Option<u32>,
    ) -> Result<MoviePage, ApiError> {
        self.respond(|s| {
            Ok(MoviePage::single(
                s.lists.get(&category).cloned().unwrap_or_default(),
            ))
        })
        .await
    }

    async fn fetch_detail(&self, movie_id: MovieId) -> Result<Movie, ApiError> {
        self.respond(|s| s.details.get(&movie_id).cloned().ok_or_else(not_found))
            .await
    }

    async fn fetch_reviews(&self, movie_id: MovieId) -> Result<Vec<Review>, ApiError> {
        self.respond(|s| Ok(s.reviews.get(&movie_id).cloned().unwrap_or_default()))
            .await
    }

    async fn search(&self, query: &str, _page: Option<u32>) -> Result<MoviePage, ApiError> {
        self.respond(|s| {
            Ok(MoviePage::single(
                s.searches.get(query).cloned().unwrap_or_default(),
            ))
        })
        .await
    }

    async fn fetch_similar(
        &self,
        movie_id: MovieId,
        _page: Option<u32>,
    ) -> Result<MoviePage, ApiError> {
        self.respond(|s| {
            Ok(MoviePage::single(
                s.similar.get(&movie_id).cloned().unwrap_or_default(),
            ))
        })
        .await
    }
}

/// Store whose movie cache writes always fail. Everything else is real.
pub struct BrokenCacheStore {
    inner: SqliteStore,
}

impl BrokenCacheStore {
    pub fn new(inner: SqliteStore) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl LocalStore for BrokenCacheStore {
    async fn find_user(&self, user_id: &str) -> Result<Option<User>, StoreError> {
        self.inner.find_user(user_id).await
    }

    async fn insert_user(&self, user: &User) -> Result<bool, StoreError> {
        self.inner.insert_user(user).await
    }

    async fn cache_movies(&self, _movies: &[Movie]) -> Result<(), StoreError> {
        Err(StoreError::Sql(rusqlite::Error::InvalidQuery))
    }

    async fn cached_movies(&self) -> Result<Vec<Movie>, StoreError> {
        self.inner.cached_movies().await
    }

    async fn cached_movie(&self, movie_id: MovieId) -> Result<Option<Movie>, StoreError> {
        self.inner.cached_movie(movie_id).await
    }

    async fn find_movies_by_title(&self, pattern: &str) -> Result<Vec<Movie>, StoreError> {
        self.inner.find_movies_by_title(pattern).await
    }

    async fn upsert_favorite(&self, favorite: &FavoriteMovie) -> Result<(), StoreError> {
        self.inner.upsert_favorite(favorite).await
    }

    async fn delete_favorite(&self, user_id: &str, movie_id: MovieId) -> Result<bool, StoreError> {
        self.inner.delete_favorite(user_id, movie_id).await
    }

    async fn is_favorite(&self, user_id: &str, movie_id: MovieId) -> Result<bool, StoreError> {
        self.inner.is_favorite(user_id, movie_id).await
    }

    async fn favorites_for_user(&self, user_id: &str) -> Result<Vec<FavoriteMovie>, StoreError> {
        self.inner.favorites_for_user(user_id).await
    }
}

/// Real store whose favorites reads can be held and whose membership checks can fail.
pub struct GatedStore {
    inner: SqliteStore,
    favorite_holds: Mutex<VecDeque<oneshot::Receiver<()>>>,
    favorite_reads: AtomicUsize,
    fail_membership: AtomicBool,
}

impl GatedStore {
    pub fn new(inner: SqliteStore) -> Self {
        Self {
            inner,
            favorite_holds: Mutex::new(VecDeque::new()),
            favorite_reads: AtomicUsize::new(0),
            fail_membership: AtomicBool::new(false),
        }
    }

    /// Hold the next favorites read until the returned sender fires or is dropped.
    pub fn hold_next_favorites(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.favorite_holds.lock().unwrap().push_back(rx);
        tx
    }

    pub async fn wait_for_favorite_reads(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.favorite_reads.load(Ordering::SeqCst) < n {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("favorites read never started");
    }

    pub fn fail_membership_checks(&self) {
        self.fail_membership.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl LocalStore for GatedStore {
    async fn find_user(&self, user_id: &str) -> Result<Option<User>, StoreError> {
        self.inner.find_user(user_id).await
    }

    async fn insert_user(&self, user: &User) -> Result<bool, StoreError> {
        self.inner.insert_user(user).await
    }

    async fn cache_movies(&self, movies: &[Movie]) -> Result<(), StoreError> {
        self.inner.cache_movies(movies).await
    }

    async fn cached_movies(&self) -> Result<Vec<Movie>, StoreError> {
        self.inner.cached_movies().await
    }

    async fn cached_movie(&self, movie_id: MovieId) -> Result<Option<Movie>, StoreError> {
        self.inner.cached_movie(movie_id).await
    }

    async fn find_movies_by_title(&self, pattern: &str) -> Result<Vec<Movie>, StoreError> {
        self.inner.find_movies_by_title(pattern).await
    }

    async fn upsert_favorite(&self, favorite: &FavoriteMovie) -> Result<(), StoreError> {
        self.inner.upsert_favorite(favorite).await
    }

    async fn delete_favorite(&self, user_id: &str, movie_id: MovieId) -> Result<bool, StoreError> {
        self.inner.delete_favorite(user_id, movie_id).await
    }

    async fn is_favorite(&self, user_id: &str, movie_id: MovieId) -> Result<bool, StoreError> {
        if self.fail_membership.load(Ordering::SeqCst) {
            return Err(StoreError::Sql(rusqlite::Error::InvalidQuery));
        }
        self.inner.is_favorite(user_id, movie_id).await
    }

    async fn favorites_for_user(&self, user_id: &str) -> Result<Vec<FavoriteMovie>, StoreError> {
        let hold = self.favorite_holds.lock().unwrap().pop_front();
        self.favorite_reads.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = hold {
            let _ = gate.await;
        }
        self.inner.favorites_for_user(user_id).await
    }
}

pub fn sqlite_store() -> (TempDir, SqliteStore) {
    let temp_dir = TempDir::new().unwrap();
    let pool = db::create_pool(&temp_dir.path().join("test.db")).unwrap();
    db::run_migrations(&pool).unwrap();
    (temp_dir, SqliteStore::new(pool))
}

/// Repository over a fake API and a throwaway database.
pub struct Harness {
    _temp_dir: TempDir,
    pub api: Arc<FakeApi>,
    pub store: DynLocalStore,
    pub connectivity: Connectivity,
    pub repo: Arc<SyncRepository>,
}

impl Harness {
    pub fn new(offline: bool) -> Self {
        let (temp_dir, store) = sqlite_store();
        Self::with_store(temp_dir, Arc::new(store), offline)
    }

    pub fn with_store(temp_dir: TempDir, store: DynLocalStore, offline: bool) -> Self {
        let api = FakeApi::new();
        let connectivity = Connectivity::new(offline);
        let repo = Arc::new(SyncRepository::new(
            api.clone(),
            store.clone(),
            connectivity.clone(),
        ));
        Self {
            _temp_dir: temp_dir,
            api,
            store,
            connectivity,
            repo,
        }
    }

    pub fn app(&self) -> AppState {
        AppState::new(self.repo.clone())
    }
}
