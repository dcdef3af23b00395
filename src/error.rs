use actix_web::error::BlockingError;
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

use crate::backend::{AuthError, BackendError};
use crate::models::Notification;

/// Failures of board operations, as surfaced to callers.
#[derive(Error, Debug)]
pub enum BoardError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("failed to fetch {what}: {source}")]
    Fetch {
        what: &'static str,
        #[source]
        source: BackendError,
    },
    #[error("failed to write {what}: {source}")]
    Write {
        what: &'static str,
        #[source]
        source: BackendError,
    },
    #[error("failed to upload image: {0}")]
    Upload(#[source] BackendError),
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),
    #[error("background task failed: {0}")]
    Blocking(#[from] BlockingError),
}

impl BoardError {
    pub fn fetch(what: &'static str, source: BackendError) -> Self {
        BoardError::Fetch { what, source }
    }

    /// Write failure, except that a missing target document becomes `NotFound`.
    pub fn write(what: &'static str, source: BackendError) -> Self {
        match source {
            BackendError::NotFound(_) => BoardError::NotFound(what.to_string()),
            source => BoardError::Write { what, source },
        }
    }

    /// One-line message suitable for a user-facing notification.
    pub fn user_message(&self) -> String {
        match self {
            BoardError::Validation(msg) => msg.clone(),
            BoardError::NotFound(what) => format!("The {} could not be found.", what),
            BoardError::Fetch { what, .. } => {
                format!("Could not load the {}. Please try again later.", what)
            }
            BoardError::Write { what, .. } => format!("Could not save the {}. Please try again.", what),
            BoardError::Upload(_) => "Could not upload the image. Please try again.".to_string(),
            BoardError::Auth(e) => match e {
                AuthError::InvalidEmail => "The email address is not valid.".to_string(),
                AuthError::UserNotFound | AuthError::WrongPassword => {
                    "Incorrect email or password.".to_string()
                }
                AuthError::EmailAlreadyInUse => "This email is already registered.".to_string(),
                AuthError::WeakPassword => {
                    "The password must be at least 6 characters long.".to_string()
                }
                AuthError::Backend(_) => {
                    "Authentication failed. Please try again.".to_string()
                }
            },
            BoardError::Blocking(_) => "Something went wrong. Please try again.".to_string(),
        }
    }

    pub fn notification(&self) -> Notification {
        Notification::error(self.user_message())
    }
}

impl ResponseError for BoardError {
    fn status_code(&self) -> StatusCode {
        match self {
            BoardError::Validation(_) => StatusCode::BAD_REQUEST,
            BoardError::NotFound(_) => StatusCode::NOT_FOUND,
            BoardError::Fetch { .. } | BoardError::Write { .. } | BoardError::Blocking(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            BoardError::Upload(_) => StatusCode::BAD_GATEWAY,
            BoardError::Auth(e) => match e {
                AuthError::InvalidEmail | AuthError::WeakPassword => StatusCode::UNPROCESSABLE_ENTITY,
                AuthError::UserNotFound | AuthError::WrongPassword => StatusCode::UNAUTHORIZED,
                AuthError::EmailAlreadyInUse => StatusCode::CONFLICT,
                AuthError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .json(json!({ "success": false, "error": self.user_message() }))
    }
}
