use std::collections::BTreeMap;

use argon2::Error as Argon2Error;
use jsonwebtoken::errors::Error as JwtError;
use log::error;
use mongodb::error::Error as DbError;
use rocket::{
    http::Status,
    response::{self, status::Custom, Responder},
    serde::json::{json, Json},
    Request,
};
use thiserror::Error;
use validator::ValidationErrors;

use crate::model::{api::validation::field_errors, common::survey::QuestionType};

pub type Result<T> = std::result::Result<T, Error>;

/// Field-level validation failures, keyed by the path of the offending field.
pub type FieldErrors = BTreeMap<String, String>;

/// Message returned for any error whose detail must not leak to clients.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    Argon2(#[from] Argon2Error),
    #[error("Validation failed: {0:?}")]
    Validation(FieldErrors),
    #[error("Survey with this title already exists")]
    DuplicateTitle,
    #[error("Email already registered")]
    DuplicateEmail,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("{0} not found")]
    NotFound(String),
    #[error("Number of answers must match number of questions")]
    CountMismatch,
    #[error("Invalid answer type for {0} question")]
    InvalidAnswerType(QuestionType),
    #[error("Option not found")]
    OptionNotFound,
    #[error("Some options not found")]
    OptionsNotFound,
    #[error("User already submitted answers for this survey")]
    AlreadySubmitted,
    #[error("{0}")]
    Unauthenticated(String),
    #[error("{1}")]
    Status(Status, String),
}

impl Error {
    /// Convenience method for creating a not-found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// The HTTP status this error maps to.
    pub fn status(&self) -> Status {
        match self {
            Self::Db(_) | Self::Jwt(_) | Self::Argon2(_) => Status::InternalServerError,
            Self::Validation(_)
            | Self::DuplicateTitle
            | Self::DuplicateEmail
            | Self::InvalidCredentials
            | Self::CountMismatch
            | Self::InvalidAnswerType(_)
            | Self::OptionNotFound
            | Self::OptionsNotFound => Status::BadRequest,
            Self::NotFound(_) => Status::NotFound,
            Self::AlreadySubmitted => Status::Conflict,
            Self::Unauthenticated(_) => Status::Unauthorized,
            Self::Status(status, _) => *status,
        }
    }
}

impl From<ValidationErrors> for Error {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(field_errors(&errors))
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        let body = match self {
            Self::Validation(errors) => json!({ "errors": errors }),
            err if status.code >= 500 => {
                error!("{} {}: {err}", req.method(), req.uri());
                json!({ "error": INTERNAL_ERROR_MESSAGE })
            }
            err => json!({ "error": err.to_string() }),
        };
        Custom(status, Json(body)).respond_to(req)
    }
}
