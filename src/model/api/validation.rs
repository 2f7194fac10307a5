use std::borrow::Cow;

use rocket::{http::Status, serde::json::Json};
use validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

use crate::error::{Error, FieldErrors, Result};

pub use rocket::serde::json::Error as JsonError;

/// Key under which `validator` files struct-level (schema) errors.
const STRUCT_ERRORS_KEY: &str = "__all__";

/// A JSON request body whose parse failure is handed to the handler.
pub type JsonBody<'r, T> = std::result::Result<Json<T>, JsonError<'r>>;

/// Unwrap a JSON request body and validate it.
///
/// Bodies that fail to parse are rejected as bad requests rather than being
/// left to Rocket's default `422 Unprocessable Entity`.
pub fn validated<T: Validate>(body: JsonBody<'_, T>) -> Result<T> {
    let body = body
        .map_err(|err| match err {
            JsonError::Parse(_, err) => Error::Status(
                Status::BadRequest,
                format!("Malformed request body: {err}"),
            ),
            JsonError::Io(_) => {
                Error::Status(Status::BadRequest, "Malformed request body".to_string())
            }
        })?
        .into_inner();
    body.validate()?;
    Ok(body)
}

/// Reject empty and whitespace-only strings.
pub fn not_blank(value: &str) -> std::result::Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(invalid("blank", "must not be blank"))
    } else {
        Ok(())
    }
}

/// A validation error with a client-facing message.
///
/// Struct-level checks use the name of the offending field as `code`, which is
/// where [`field_errors`] reports them.
pub fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}

/// Flatten nested `validator` errors into one message per field path, e.g.
/// `questions[1].options[0].text`.
pub fn field_errors(errors: &ValidationErrors) -> FieldErrors {
    let mut fields = FieldErrors::new();
    flatten(errors, None, &mut fields);
    fields
}

fn flatten(errors: &ValidationErrors, prefix: Option<&str>, fields: &mut FieldErrors) {
    let path = |name: &str| match prefix {
        Some(prefix) => format!("{prefix}.{name}"),
        None => name.to_string(),
    };
    for (field, kind) in errors.errors() {
        let field: &str = field.as_ref();
        match kind {
            ValidationErrorsKind::Field(errors) => {
                for error in errors {
                    let name: &str = if field == STRUCT_ERRORS_KEY {
                        &error.code
                    } else {
                        field
                    };
                    fields.entry(path(name)).or_insert_with(|| message(error));
                }
            }
            ValidationErrorsKind::Struct(inner) => flatten(inner, Some(&path(field)), fields),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    flatten(inner, Some(&format!("{}[{index}]", path(field))), fields);
                }
            }
        }
    }
}

fn message(error: &ValidationError) -> String {
    match &error.message {
        Some(message) => message.to_string(),
        None => format!("is invalid ({})", error.code),
    }
}
