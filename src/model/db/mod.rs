//! DB-compatible (e.g. de/serialisable) types.
//!
//! The types in this module are serialised in an DB-friendly way, e.g.:
//!
//! - Object IDs and datetimes are serialised in MongoDB's own format.
//! - Surveys and submissions are single documents owning their nested parts.

pub mod submission;
pub mod survey;
pub mod user;
