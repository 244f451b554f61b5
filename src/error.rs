use crate::api::ApiError;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Remote error: {0}")]
    Remote(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User already exists: {0}")]
    DuplicateUser(String),

    #[error("Not found")]
    NotFound,
}

impl AppError {
    /// Message safe to show to the user. Lower-layer detail goes to the log only.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Network(e) => {
                tracing::warn!("Network error: {}", e);
                "Network unavailable. Check your connection and try again.".to_string()
            }
            AppError::Remote(e) => {
                tracing::warn!("Remote error: {}", e);
                "The movie service returned an error. Please try again.".to_string()
            }
            AppError::Storage(e) => {
                tracing::error!("Storage error: {}", e);
                "Something went wrong. Please try again.".to_string()
            }
            AppError::InvalidCredentials => "Invalid username or password".to_string(),
            AppError::DuplicateUser(_) => "User ID already exists".to_string(),
            AppError::NotFound => "Movie not found".to_string(),
        }
    }

    /// Transport-level failure, as opposed to a reachable server misbehaving.
    pub fn is_network(&self) -> bool {
        matches!(self, AppError::Network(_))
    }
}

impl From<ApiError> for AppError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Network(msg) => AppError::Network(msg),
            ApiError::Status { status: 404, .. } => AppError::NotFound,
            other => AppError::Remote(other.to_string()),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
