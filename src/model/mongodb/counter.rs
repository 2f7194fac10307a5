use std::ops::Range;

use mongodb::{
    bson::doc,
    error::Error as DbError,
    options::{FindOneAndUpdateOptions, ReturnDocument, UpdateOptions},
};
use rocket::http::Status;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::mongodb::Coll;

/// Counter for survey IDs.
pub const SURVEY_ID_COUNTER_ID: &str = "survey_id";
/// Counter for question IDs, shared by all surveys.
pub const QUESTION_ID_COUNTER_ID: &str = "question_id";
/// Counter for answer option IDs, shared by all questions.
pub const OPTION_ID_COUNTER_ID: &str = "option_id";

/// A counter object used to implement auto-increment fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counter {
    #[serde(rename = "_id")]
    pub id: String,
    pub next: i64,
}

impl Counter {
    /// Atomically retrieve the next value of the counter with the given ID.
    pub async fn next(counters: &Coll<Counter>, id: &str) -> Result<i64> {
        let block = Self::reserve(counters, id, 1).await?;
        Ok(block.start)
    }

    /// Atomically reserve `count` consecutive values of the counter with the
    /// given ID, returning the reserved range.
    pub async fn reserve(counters: &Coll<Counter>, id: &str, count: i64) -> Result<Range<i64>> {
        let update = doc! {
            "$inc": { "next": count }
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::Before)
            .build();
        let counter = counters
            .find_one_and_update(doc! { "_id": id }, update, options)
            .await?
            .ok_or_else(|| {
                Error::Status(
                    Status::InternalServerError,
                    format!("Failed to find counter with ID {}", id),
                )
            })?;
        Ok(counter.next..counter.next + count)
    }
}

/// Ensure the survey, question, and option ID counters exist, starting at 1.
///
/// This operation is idempotent: existing counters are left untouched.
pub async fn ensure_id_counters_exist(counters: &Coll<Counter>) -> std::result::Result<(), DbError> {
    let upsert = UpdateOptions::builder().upsert(true).build();
    for id in [
        SURVEY_ID_COUNTER_ID,
        QUESTION_ID_COUNTER_ID,
        OPTION_ID_COUNTER_ID,
    ] {
        counters
            .update_one(
                doc! { "_id": id },
                doc! { "$setOnInsert": { "next": 1_i64 } },
                upsert.clone(),
            )
            .await?;
    }
    Ok(())
}
