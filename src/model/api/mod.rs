//! API-compatible types.
//!
//! The types in this module are serialised in an API-friendly way, e.g.:
//!
//! - Field names are camelCase.
//! - Object IDs are serialised as hex strings.
//! - Scoring information on options is never serialised towards respondents.

pub mod auth;
pub mod id;
pub mod submission;
pub mod survey;
pub mod validation;
