mod request;
mod token;

pub use request::{LoginRequest, RegisterRequest, TokenResponse};
pub use token::{AuthFailure, AuthToken, TokenError, AUTHORIZATION_HEADER, BEARER_PREFIX};
