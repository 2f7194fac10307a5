use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{
    errors::ErrorKind as JwtErrorKind, DecodingKey, EncodingKey, Header, Validation,
};
use log::debug;
use mongodb::{bson::doc, Database};
use rocket::{
    http::Status,
    request::{FromRequest, Outcome},
    Request, State,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{db::user::User, mongodb::Coll, mongodb::Id};

pub const AUTHORIZATION_HEADER: &str = "Authorization";
pub const BEARER_PREFIX: &str = "Bearer ";

/// Why a bearer token was rejected.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Malformed, wrongly signed, or otherwise unusable.
    Invalid,
    /// Well-formed and correctly signed, but past its expiry.
    Expired,
}

impl TokenError {
    pub fn message(self) -> &'static str {
        match self {
            TokenError::Invalid => "JWT token malformed",
            TokenError::Expired => "JWT token expired",
        }
    }
}

/// Token claims: the user's email plus issue and expiry datetimes.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(rename = "sub")]
    email: String,
    #[serde(rename = "iat", with = "ts_seconds")]
    issued_at: DateTime<Utc>,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

/// The reason the last authentication attempt on a request failed, cached on
/// the request so the `401` catcher can report it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthFailure(pub String);

impl Default for AuthFailure {
    fn default() -> Self {
        Self("Authentication required".to_string())
    }
}

/// An authenticated user, proven by a valid bearer token whose subject still
/// exists in the database.
#[derive(Debug, Clone)]
pub struct AuthToken {
    pub user_id: Id,
    pub email: String,
}

impl AuthToken {
    /// Issue a signed token for the given email, valid for the configured TTL.
    pub fn issue(email: &str, config: &Config) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            email: email.to_string(),
            issued_at: now,
            expire_at: now + config.auth_ttl(),
        };
        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )?;
        Ok(token)
    }

    /// Verify a token's signature and expiry, revealing the email it was issued for.
    pub fn verify(token: &str, config: &Config) -> std::result::Result<String, TokenError> {
        jsonwebtoken::decode::<Claims>(
            token,
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|data| data.claims.email)
        .map_err(|err| match err.kind() {
            JwtErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid,
        })
    }
}

/// Reject the request as unauthenticated, remembering why.
fn unauthenticated<T>(req: &Request<'_>, message: &str) -> Outcome<T, Error> {
    debug!("Rejecting request: {message}");
    let failure = req.local_cache(|| AuthFailure(message.to_string()));
    Outcome::Error((
        Status::Unauthorized,
        Error::Unauthenticated(failure.0.clone()),
    ))
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthToken {
    type Error = Error;

    /// Get an [`AuthToken`] from the `Authorization: Bearer` header and check
    /// that the user it names still exists.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        // Unwrap is safe as `Config` is always managed.
        let config = req.guard::<&State<Config>>().await.unwrap();

        let header = match req.headers().get_one(AUTHORIZATION_HEADER) {
            Some(header) => header,
            None => return unauthenticated(req, "Authentication required"),
        };
        let token = match header.strip_prefix(BEARER_PREFIX) {
            Some(token) => token.trim(),
            None => return unauthenticated(req, "Authentication required"),
        };
        let email = match Self::verify(token, config) {
            Ok(email) => email,
            Err(err) => return unauthenticated(req, err.message()),
        };

        // Check the user actually exists.
        let db = req.guard::<&State<Database>>().await.unwrap();
        let users = Coll::<User>::from_db(db);
        match users.find_one(doc! { "email": &email }, None).await {
            Ok(Some(user)) => Outcome::Success(Self {
                user_id: user.id,
                email,
            }),
            Ok(None) => unauthenticated(req, "Authentication required"),
            Err(e) => Outcome::Error((Status::InternalServerError, e.into())),
        }
    }
}
