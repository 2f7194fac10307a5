use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{
    common::survey::{OptionId, QuestionId, SurveyId},
    mongodb::Id,
};

/// One respondent's complete set of answers to one survey, as stored in the
/// database. At most one exists per (survey, respondent) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    /// Unique ID.
    #[serde(rename = "_id")]
    pub id: Id,
    /// The survey answered.
    pub survey_id: SurveyId,
    /// The user who answered.
    pub respondent_id: Id,
    /// When the submission was accepted.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub submitted_at: DateTime<Utc>,
    /// Answers, in the survey's question order.
    pub answers: Vec<Answer>,
}

impl Submission {
    /// Create a new submission with a fresh ID, timestamped now.
    pub fn new(survey_id: SurveyId, respondent_id: Id, answers: Vec<Answer>) -> Self {
        Self {
            id: Id::new(),
            survey_id,
            respondent_id,
            submitted_at: Utc::now(),
            answers,
        }
    }
}

/// The answer to a single question.
///
/// Text questions set `text`; choice questions fill `selected_options`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    /// Unique ID.
    pub id: Id,
    /// The question answered.
    pub question_id: QuestionId,
    /// Free text answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Picked options, in the order the respondent gave them.
    #[serde(default)]
    pub selected_options: Vec<SelectedOption>,
}

impl Answer {
    /// A free text answer.
    pub fn text(question_id: QuestionId, text: String) -> Self {
        Self {
            id: Id::new(),
            question_id,
            text: Some(text),
            selected_options: Vec::new(),
        }
    }

    /// An answer picking the given options.
    pub fn choice(question_id: QuestionId, option_ids: impl IntoIterator<Item = OptionId>) -> Self {
        Self {
            id: Id::new(),
            question_id,
            text: None,
            selected_options: option_ids.into_iter().map(SelectedOption::new).collect(),
        }
    }

    /// IDs of the picked options.
    pub fn selected_option_ids(&self) -> impl Iterator<Item = OptionId> + '_ {
        self.selected_options.iter().map(|selected| selected.option_id)
    }
}

/// A single picked option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedOption {
    /// Unique ID.
    pub id: Id,
    /// The option picked.
    pub option_id: OptionId,
}

impl SelectedOption {
    pub fn new(option_id: OptionId) -> Self {
        Self {
            id: Id::new(),
            option_id,
        }
    }
}
