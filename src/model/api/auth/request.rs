use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::model::api::validation::not_blank;

/// A request to create a new account.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(custom(function = "not_blank"))]
    pub username: String,
    #[validate(email(message = "must be a well-formed email address"))]
    pub email: String,
    #[validate(
        custom(function = "not_blank"),
        length(min = 6, message = "must be at least 6 characters long")
    )]
    pub password: String,
}

/// A request to log in to an existing account.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "must be a well-formed email address"))]
    pub email: String,
    #[validate(
        custom(function = "not_blank"),
        length(min = 6, message = "must be at least 6 characters long")
    )]
    pub password: String,
}

/// The body returned by both register and login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}
