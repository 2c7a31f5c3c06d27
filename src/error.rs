use argon2::Error as Argon2Error;
use jsonwebtoken::errors::Error as JwtError;
use log::{error, warn};
use mongodb::error::Error as DbError;
use rocket::{
    http::{Status, StatusClass},
    response::{self, Responder},
    serde::json::Json,
    Request,
};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    Argon2(#[from] Argon2Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),
    #[error("{entity} not found")]
    NotFound { entity: String },
    #[error("You have already voted in this election")]
    AlreadyVoted,
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Invalid {field}: {reason}")]
    ValidationFailed { field: &'static str, reason: String },
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Construct a `NotFound` error for the given entity description.
    pub fn not_found(entity: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
        }
    }

    /// Construct a `ValidationFailed` error for the given field.
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::ValidationFailed {
            field,
            reason: reason.into(),
        }
    }

    /// The HTTP status this error maps to.
    pub fn status(&self) -> Status {
        match self {
            Self::Db(_) | Self::Argon2(_) | Self::Io(_) | Self::Internal(_) => {
                Status::InternalServerError
            }
            Self::Jwt(_) | Self::Unauthenticated(_) => Status::Unauthorized,
            Self::NotFound { .. } => Status::NotFound,
            Self::AlreadyVoted => Status::BadRequest,
            Self::Forbidden(_) => Status::Forbidden,
            Self::ValidationFailed { .. } => Status::UnprocessableEntity,
            Self::Conflict(_) => Status::Conflict,
        }
    }
}

/// The JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        let message = if status.class() == StatusClass::ServerError {
            // Never leak storage details to the caller.
            error!("{self}");
            "An unexpected error occurred".to_string()
        } else {
            warn!("{self}");
            self.to_string()
        };
        (status, Json(ErrorBody::new(message))).respond_to(req)
    }
}
