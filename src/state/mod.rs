// Observable view state; completions that lost the race to a newer request are dropped

pub mod sequence;
mod view;

use std::sync::Arc;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::api::MovieCategory;
use crate::db::models::{Movie, MovieId};
use crate::error::AppError;
use crate::repository::{Fetched, Source, SyncRepository};
use crate::validation::{self, Field, FieldError, Registration};

pub use self::sequence::{FetchKind, Sequencer, Slot, Ticket};
pub use self::view::{FetchStatus, ListQuery, Session, ViewState};

const OFFLINE_LOGIN: &str = "Login is unavailable while offline";
const OFFLINE_REGISTRATION: &str = "Registration is unavailable while offline";
const LOGIN_REQUIRED: &str = "Log in to manage favorites";

const DETAIL_SLOTS: &[Slot] = &[Slot::Detail, Slot::Reviews, Slot::Similar, Slot::Membership];

/// False once the detail view has moved on to another movie.
fn still_viewing(state: &ViewState, movie_id: MovieId) -> bool {
    state.viewing.map_or(true, |viewing| viewing == movie_id)
}

struct Inner {
    repo: Arc<SyncRepository>,
    view: watch::Sender<ViewState>,
    seq: Sequencer,
}

#[derive(Clone)]
pub struct AppState {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("view", &*self.inner.view.borrow())
            .finish()
    }
}

impl AppState {
    pub fn new(repo: Arc<SyncRepository>) -> Self {
        let initial = ViewState {
            offline: repo.connectivity().is_offline(),
            ..ViewState::default()
        };
        let (view, _) = watch::channel(initial);
        Self {
            inner: Arc::new(Inner {
                repo,
                view,
                seq: Sequencer::new(),
            }),
        }
    }

    pub fn repository(&self) -> &Arc<SyncRepository> {
        &self.inner.repo
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.inner.view.subscribe()
    }

    pub fn updates(&self) -> WatchStream<ViewState> {
        WatchStream::new(self.subscribe())
    }

    pub fn snapshot(&self) -> ViewState {
        self.inner.view.borrow().clone()
    }

    pub fn session(&self) -> Option<Session> {
        self.inner.view.borrow().session.clone()
    }

    fn current_user_id(&self) -> Option<String> {
        self.inner.view.borrow().user_id().map(str::to_string)
    }

    fn viewing(&self) -> Option<MovieId> {
        self.inner.view.borrow().viewing
    }

    fn is_offline(&self) -> bool {
        self.inner.view.borrow().offline
    }

    // ------------------- Sequencing ------------------- //

    fn begin(&self, slot: Slot, mark: impl FnOnce(&mut ViewState)) -> Ticket {
        let ticket = self.inner.seq.begin(slot);
        self.inner.view.send_modify(|state| {
            mark(state);
            state.loading = self.inner.seq.has_pending();
        });
        ticket
    }

    /// Publish a completion unless a newer one for the same slot already landed.
    fn complete(&self, ticket: Ticket, apply: impl FnOnce(&mut ViewState)) -> bool {
        let applied = self.inner.view.send_if_modified(|state| {
            if !self.inner.seq.try_apply(ticket) {
                return false;
            }
            apply(state);
            state.loading = self.inner.seq.has_pending();
            true
        });
        if !applied {
            tracing::debug!(
                "Discarded stale {:?} completion #{}",
                ticket.slot(),
                ticket.seq()
            );
        }
        applied
    }

    fn invalidate(&self, slots: &[Slot]) {
        for slot in slots {
            self.inner.seq.invalidate(*slot);
        }
    }

    // ------------------- Movie lists ------------------- //

    pub async fn load_movies(&self, category: MovieCategory) {
        self.run_list(ListQuery::Category(category)).await;
    }

    pub async fn load_popular(&self) {
        self.load_movies(MovieCategory::Popular).await;
    }

    pub async fn load_top_rated(&self) {
        self.load_movies(MovieCategory::TopRated).await;
    }

    pub async fn load_now_playing(&self) {
        self.load_movies(MovieCategory::NowPlaying).await;
    }

    pub async fn load_upcoming(&self) {
        self.load_movies(MovieCategory::Upcoming).await;
    }

    /// Blank queries are ignored.
    pub async fn search(&self, query: &str) {
        let query = query.trim();
        if query.is_empty() {
            return;
        }
        self.run_list(ListQuery::Search(query.to_string())).await;
    }

    async fn run_list(&self, query: ListQuery) {
        let kind = match &query {
            ListQuery::Category(category) => FetchKind::from(*category),
            ListQuery::Search(_) => FetchKind::Search,
        };
        let ticket = self.begin(kind.slot(), |state| {
            state.list_query = Some(query.clone());
            state.list_status = FetchStatus::Loading;
        });
        tracing::debug!("Fetching {:?} as #{}", kind, ticket.seq());

        let result = match &query {
            ListQuery::Category(category) => self.inner.repo.fetch_list(*category, None).await,
            ListQuery::Search(q) => self.inner.repo.search(q, None).await,
        };

        self.complete(ticket, |state| match result {
            Ok(fetched) => {
                state.movies = fetched.value.results;
                state.list_status = fetched.source.into();
                state.error = None;
            }
            Err(e) => {
                // Keep showing whatever was there; the error is retryable
                let message = e.user_message();
                state.list_status = FetchStatus::Error(message.clone());
                state.error = Some(message);
            }
        });
    }

    // ------------------- Movie detail ------------------- //

    /// Open the detail view: detail, reviews, similar titles and favorite flag.
    pub async fn open_movie(&self, movie_id: MovieId) {
        if self.viewing() != Some(movie_id) {
            // Requests for the movie being left must not land on this one
            self.invalidate(DETAIL_SLOTS);
        }
        self.inner.view.send_modify(|state| {
            if state.viewing != Some(movie_id) {
                state.detail = None;
                state.reviews.clear();
                state.similar.clear();
                state.is_favorite = false;
            }
            state.viewing = Some(movie_id);
        });

        futures::join!(
            self.load_detail(movie_id),
            self.load_reviews(movie_id),
            self.load_similar(movie_id),
            self.check_favorite(movie_id),
        );
    }

    /// Leave the detail view. In-flight detail requests become no-ops.
    pub fn close_movie(&self) {
        self.invalidate(DETAIL_SLOTS);
        self.inner.view.send_modify(|state| {
            state.viewing = None;
            state.detail = None;
            state.detail_status = FetchStatus::Idle;
            state.reviews.clear();
            state.similar.clear();
            state.is_favorite = false;
            state.loading = self.inner.seq.has_pending();
        });
    }

    pub async fn load_detail(&self, movie_id: MovieId) {
        let ticket = self.begin(FetchKind::Detail.slot(), |state| {
            state.detail_status = FetchStatus::Loading;
        });
        let result = self.inner.repo.fetch_detail(movie_id).await;

        self.complete(ticket, |state| {
            if !still_viewing(state, movie_id) {
                return;
            }
            match result {
                Ok(Fetched {
                    value: Some(movie),
                    source,
                }) => {
                    state.detail = Some(movie);
                    state.detail_status = source.into();
                    state.error = None;
                }
                Ok(Fetched {
                    value: None,
                    source: Source::Cache,
                }) => {
                    state.detail = None;
                    state.detail_status = FetchStatus::OfflineFallback;
                }
                Ok(Fetched {
                    value: None,
                    source: Source::Remote,
                }) => {
                    let message = AppError::NotFound.user_message();
                    state.detail = None;
                    state.detail_status = FetchStatus::Error(message.clone());
                    state.error = Some(message);
                }
                Err(e) => {
                    let message = e.user_message();
                    state.detail_status = FetchStatus::Error(message.clone());
                    state.error = Some(message);
                }
            }
        });
    }

    pub async fn load_reviews(&self, movie_id: MovieId) {
        let ticket = self.begin(FetchKind::Reviews.slot(), |_| {});
        let reviews = self.inner.repo.fetch_reviews(movie_id).await;
        self.complete(ticket, |state| {
            if still_viewing(state, movie_id) {
                state.reviews = reviews;
            }
        });
    }

    pub async fn load_similar(&self, movie_id: MovieId) {
        let ticket = self.begin(FetchKind::Similar.slot(), |_| {});
        let similar = self.inner.repo.fetch_similar(movie_id, None).await;
        self.complete(ticket, |state| {
            if still_viewing(state, movie_id) {
                state.similar = similar;
            }
        });
    }

    /// Refresh the favorite flag for a movie. Logged out reads as false.
    pub async fn check_favorite(&self, movie_id: MovieId) {
        let ticket = self.begin(Slot::Membership, |_| {});
        let found = match self.current_user_id() {
            Some(user_id) => self.inner.repo.is_favorite(&user_id, movie_id).await,
            None => false,
        };
        self.complete(ticket, |state| {
            if still_viewing(state, movie_id) {
                state.is_favorite = found;
            }
        });
    }

    // ------------------- Favorites ------------------- //

    pub async fn refresh_favorites(&self) {
        let Some(user_id) = self.current_user_id() else {
            self.invalidate(&[Slot::Favorites]);
            self.inner.view.send_modify(|state| state.favorites.clear());
            return;
        };

        let ticket = self.begin(Slot::Favorites, |_| {});
        let result = self.inner.repo.list_favorites(&user_id).await;
        self.complete(ticket, |state| match result {
            Ok(favorites) => state.favorites = favorites,
            Err(e) => state.error = Some(e.user_message()),
        });
    }

    pub async fn add_favorite(&self, movie: &Movie) {
        let Some(user_id) = self.current_user_id() else {
            self.inner
                .view
                .send_modify(|state| state.error = Some(LOGIN_REQUIRED.to_string()));
            return;
        };

        match self.inner.repo.add_favorite(&user_id, movie).await {
            Ok(_) => self.after_favorites_changed().await,
            Err(e) => self
                .inner
                .view
                .send_modify(|state| state.error = Some(e.user_message())),
        }
    }

    pub async fn remove_favorite(&self, movie_id: MovieId) {
        let Some(user_id) = self.current_user_id() else {
            self.inner
                .view
                .send_modify(|state| state.error = Some(LOGIN_REQUIRED.to_string()));
            return;
        };

        match self.inner.repo.remove_favorite(&user_id, movie_id).await {
            Ok(()) => self.after_favorites_changed().await,
            Err(e) => self
                .inner
                .view
                .send_modify(|state| state.error = Some(e.user_message())),
        }
    }

    async fn after_favorites_changed(&self) {
        match self.viewing() {
            Some(movie_id) => {
                futures::join!(self.refresh_favorites(), self.check_favorite(movie_id));
            }
            None => self.refresh_favorites().await,
        }
    }

    // ------------------- Auth ------------------- //

    /// Returns true when the user is now logged in.
    pub async fn login(&self, user_id: &str, password: &str) -> bool {
        if self.is_offline() {
            self.set_auth_error(OFFLINE_LOGIN);
            return false;
        }

        match self.inner.repo.login(user_id, password).await {
            Ok(user) => {
                tracing::info!("User {} logged in", user.user_id);
                self.invalidate(&[Slot::Favorites, Slot::Membership]);
                self.inner.view.send_modify(|state| {
                    state.session = Some(Session::from(user));
                    state.auth_error = None;
                    state.favorites.clear();
                });
                self.after_favorites_changed().await;
                true
            }
            Err(e) => {
                if !matches!(e, AppError::InvalidCredentials) {
                    tracing::warn!("Login for {} failed: {}", user_id, e);
                }
                self.set_auth_error(&e.user_message());
                false
            }
        }
    }

    /// Validate and create an account. Does not log in.
    pub async fn register(&self, form: &Registration) -> bool {
        if self.is_offline() {
            self.set_auth_error(OFFLINE_REGISTRATION);
            return false;
        }

        if let Err(errors) = validation::validate(form) {
            self.set_registration_errors(errors.0);
            return false;
        }

        match self.inner.repo.check_user_id_exists(&form.user_id).await {
            Ok(false) => {}
            Ok(true) => {
                let duplicate = AppError::DuplicateUser(form.user_id.clone());
                self.set_registration_errors(vec![FieldError::new(
                    Field::UserId,
                    duplicate.user_message(),
                )]);
                return false;
            }
            Err(e) => {
                self.set_auth_error(&e.user_message());
                return false;
            }
        }

        let result = self
            .inner
            .repo
            .register(&form.user_id, &form.password, &form.preferred_name)
            .await;

        match result {
            Ok(_) => {
                self.inner.view.send_modify(|state| {
                    state.auth_error = None;
                    state.registration_errors.clear();
                });
                true
            }
            Err(e @ AppError::DuplicateUser(_)) => {
                self.set_registration_errors(vec![FieldError::new(
                    Field::UserId,
                    e.user_message(),
                )]);
                false
            }
            Err(e) => {
                self.set_auth_error(&e.user_message());
                false
            }
        }
    }

    /// Existence probe for live form validation. Errors read as "free".
    pub async fn check_user_id_exists(&self, user_id: &str) -> bool {
        match self.inner.repo.check_user_id_exists(user_id).await {
            Ok(exists) => exists,
            Err(e) => {
                tracing::warn!("User id check failed: {}", e);
                false
            }
        }
    }

    pub fn logout(&self) {
        self.invalidate(&[Slot::Favorites, Slot::Membership]);
        self.inner.view.send_modify(|state| {
            state.session = None;
            state.favorites.clear();
            state.is_favorite = false;
            state.auth_error = None;
            state.loading = self.inner.seq.has_pending();
        });
    }

    fn set_auth_error(&self, message: &str) {
        self.inner.view.send_modify(|state| {
            state.auth_error = Some(message.to_string());
        });
    }

    fn set_registration_errors(&self, errors: Vec<FieldError>) {
        self.inner.view.send_modify(|state| {
            state.auth_error = errors.first().map(|e| e.message.clone());
            state.registration_errors = errors;
        });
    }

    // ------------------- Connectivity ------------------- //

    /// Going offline swaps the list for the cached movies. Coming back
    /// online re-runs whatever list was last requested, or clears the
    /// cached list when none was.
    pub async fn set_offline(&self, offline: bool) {
        let was_offline = self.inner.repo.connectivity().is_offline();
        self.inner.repo.set_offline(offline);
        self.inner.view.send_modify(|state| state.offline = offline);
        tracing::info!("Connectivity changed: offline = {}", offline);

        if offline {
            let ticket = self.begin(Slot::Movies, |state| {
                state.list_status = FetchStatus::Loading;
            });
            let result = self.inner.repo.cached_movies().await;
            self.complete(ticket, |state| match result {
                Ok(movies) => {
                    state.movies = movies;
                    state.list_status = FetchStatus::OfflineFallback;
                    state.error = None;
                }
                Err(e) => {
                    let message = e.user_message();
                    state.list_status = FetchStatus::Error(message.clone());
                    state.error = Some(message);
                }
            });
        } else if was_offline {
            let last = self.inner.view.borrow().list_query.clone();
            match last {
                Some(query) => self.run_list(query).await,
                None => {
                    // Nothing to refresh; drop the offline fallback list
                    self.invalidate(&[Slot::Movies]);
                    self.inner.view.send_modify(|state| {
                        state.movies.clear();
                        state.list_status = FetchStatus::Idle;
                        state.loading = self.inner.seq.has_pending();
                    });
                }
            }
        }
    }
}
