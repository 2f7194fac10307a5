use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Our survey IDs are integers.
pub type SurveyId = i64;
/// Our question IDs are integers.
pub type QuestionId = i64;
/// Our answer option IDs are integers.
pub type OptionId = i64;

/// How a survey's submissions are scored.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SurveyType {
    /// Answers are collected, nothing is scored.
    #[default]
    Standard,
    /// Each option carries points; the score is the sum of selected points.
    Scored,
    /// Each option is correct or not; the score counts correctly answered questions.
    Quiz,
}

/// The kind of answer a question accepts.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionType {
    /// Free text, no options.
    #[default]
    Text,
    /// Exactly one option is picked.
    SingleChoice,
    /// Any number of options are picked.
    MultipleChoice,
}

impl QuestionType {
    /// Does this question type offer options to choose from?
    pub fn has_options(self) -> bool {
        self != QuestionType::Text
    }
}

impl Display for QuestionType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            QuestionType::Text => "text",
            QuestionType::SingleChoice => "single choice",
            QuestionType::MultipleChoice => "multiple choice",
        };
        write!(f, "{name}")
    }
}
