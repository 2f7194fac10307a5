use rocket::{
    http::Status,
    response::status::Custom,
    serde::json::{json, Json, Value},
    Catcher, Request,
};

use crate::error::INTERNAL_ERROR_MESSAGE;
use crate::model::api::auth::AuthFailure;

pub fn catchers() -> Vec<Catcher> {
    catchers![bad_request, unauthorized, not_found, unprocessable, internal_error]
}

#[catch(400)]
fn bad_request() -> Json<Value> {
    Json(json!({ "error": "Malformed request" }))
}

/// Report why the bearer token was rejected.
#[catch(401)]
fn unauthorized(req: &Request<'_>) -> Json<Value> {
    let failure = req.local_cache(AuthFailure::default);
    Json(json!({ "error": failure.0 }))
}

#[catch(404)]
fn not_found(req: &Request<'_>) -> Json<Value> {
    Json(json!({ "error": format!("No resource at {}", req.uri().path()) }))
}

/// Rocket reports bodies and path parameters it could not parse as `422`;
/// clients see these as plain bad requests.
#[catch(422)]
fn unprocessable() -> Custom<Json<Value>> {
    Custom(
        Status::BadRequest,
        Json(json!({ "error": "Malformed request" })),
    )
}

#[catch(500)]
fn internal_error() -> Json<Value> {
    Json(json!({ "error": INTERNAL_ERROR_MESSAGE }))
}
