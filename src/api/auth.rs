use log::{info, warn};
use mongodb::bson::doc;
use rocket::{http::Status, response::status::Custom, serde::json::Json, Route, State};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            auth::{AuthToken, LoginRequest, RegisterRequest, TokenResponse},
            validation::{validated, JsonBody},
        },
        db::user::{NewUser, User},
        mongodb::{is_duplicate_key_error, Coll},
    },
    Config,
};

pub fn routes() -> Vec<Route> {
    routes![register, login]
}

#[post("/auth/register", data = "<request>", format = "json")]
async fn register(
    request: JsonBody<'_, RegisterRequest>,
    new_users: Coll<NewUser>,
    config: &State<Config>,
) -> Result<Custom<Json<TokenResponse>>> {
    let request = validated(request)?;

    // Check email uniqueness.
    let with_email = doc! { "email": &request.email };
    if new_users.find_one(with_email, None).await?.is_some() {
        warn!("Registration with taken email {}", request.email);
        return Err(Error::DuplicateEmail);
    }

    // Create and insert the user. The unique index catches concurrent registrations.
    let user = NewUser::new(request.username, request.email, &request.password)?;
    new_users.insert_one(&user, None).await.map_err(|e| {
        if is_duplicate_key_error(&e) {
            Error::DuplicateEmail
        } else {
            e.into()
        }
    })?;
    info!("Registered user {}", user.email);

    let token = AuthToken::issue(&user.email, config)?;
    Ok(Custom(Status::Created, Json(TokenResponse { token })))
}

#[post("/auth/login", data = "<request>", format = "json")]
async fn login(
    request: JsonBody<'_, LoginRequest>,
    users: Coll<User>,
    config: &State<Config>,
) -> Result<Json<TokenResponse>> {
    let request = validated(request)?;

    let with_email = doc! { "email": &request.email };
    let user = users
        .find_one(with_email, None)
        .await?
        .ok_or(Error::InvalidCredentials)?;
    if !user.verify_password(&request.password)? {
        return Err(Error::InvalidCredentials);
    }

    let token = AuthToken::issue(&user.email, config)?;
    Ok(Json(TokenResponse { token }))
}
