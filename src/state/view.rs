use crate::api::MovieCategory;
use crate::db::models::{FavoriteMovie, Movie, MovieId, Review, User};
use crate::repository::Source;
use crate::validation::FieldError;

/// Lifecycle of one fetch slot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FetchStatus {
    #[default]
    Idle,
    Loading,
    Success,
    Error(String),
    OfflineFallback,
}

impl From<Source> for FetchStatus {
    fn from(source: Source) -> Self {
        match source {
            Source::Remote => FetchStatus::Success,
            Source::Cache => FetchStatus::OfflineFallback,
        }
    }
}

/// What the movie list is currently showing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListQuery {
    Category(MovieCategory),
    Search(String),
}

/// The authenticated user, without credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub preferred_name: String,
}

impl From<User> for Session {
    fn from(user: User) -> Self {
        Self {
            user_id: user.user_id,
            preferred_name: user.preferred_name,
        }
    }
}

/// Everything a screen needs to render, published as one value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewState {
    pub movies: Vec<Movie>,
    pub list_query: Option<ListQuery>,
    pub list_status: FetchStatus,

    pub viewing: Option<MovieId>,
    pub detail: Option<Movie>,
    pub detail_status: FetchStatus,
    pub reviews: Vec<Review>,
    pub similar: Vec<Movie>,
    pub is_favorite: bool,

    pub favorites: Vec<FavoriteMovie>,
    pub session: Option<Session>,

    /// Last fetch or favorite error, retryable
    pub error: Option<String>,
    /// Form-level login/registration message
    pub auth_error: Option<String>,
    pub registration_errors: Vec<FieldError>,

    pub loading: bool,
    pub offline: bool,
}

impl ViewState {
    pub fn is_logged_in(&self) -> bool {
        self.session.is_some()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.user_id.as_str())
    }

    /// Favorite flag for a movie in a list, from the loaded favorites.
    pub fn is_in_favorites(&self, movie_id: MovieId) -> bool {
        self.favorites.iter().any(|f| f.movie_id == movie_id)
    }
}
