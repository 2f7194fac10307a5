use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::model::{
    api::id::ApiId,
    common::survey::{OptionId, QuestionId, SurveyId},
    db::submission::Answer,
};

/// A respondent's answers, one per question in the survey's question order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct AnswerRequest {
    #[validate(length(min = 1, message = "must not be empty"))]
    pub answers: Vec<AnswerSubmission>,
}

/// The answer to a single question.
///
/// The variant is deduced from which fields are present, so each variant's
/// payload rejects unknown fields to keep the shapes disjoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerSubmission {
    /// `{"text": "..."}`
    Text(TextAnswer),
    /// `{"optionId": 7}`
    SingleChoice(SingleChoiceAnswer),
    /// `{"optionIds": [7, 8]}`
    MultipleChoice(MultipleChoiceAnswer),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TextAnswer {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SingleChoiceAnswer {
    pub option_id: OptionId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MultipleChoiceAnswer {
    pub option_ids: Vec<OptionId>,
}

impl AnswerSubmission {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(TextAnswer { text: text.into() })
    }

    pub fn single(option_id: OptionId) -> Self {
        Self::SingleChoice(SingleChoiceAnswer { option_id })
    }

    pub fn multiple(option_ids: impl Into<Vec<OptionId>>) -> Self {
        Self::MultipleChoice(MultipleChoiceAnswer {
            option_ids: option_ids.into(),
        })
    }
}

/// The outcome of a successful submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResult {
    pub answers: Vec<AnswerView>,
    /// `None` for standard surveys.
    pub total_score: Option<i64>,
    /// Per choice question correctness; only present for quizzes.
    pub correct_answers: Option<BTreeMap<QuestionId, bool>>,
}

/// A stored answer, as returned to the respondent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerView {
    pub id: ApiId,
    pub question_id: QuestionId,
    pub survey_id: SurveyId,
    pub text: Option<String>,
    pub selected_option_ids: Vec<OptionId>,
}

impl AnswerView {
    pub fn new(survey_id: SurveyId, answer: &Answer) -> Self {
        Self {
            id: answer.id.into(),
            question_id: answer.question_id,
            survey_id,
            text: answer.text.clone(),
            selected_option_ids: answer.selected_option_ids().collect(),
        }
    }
}
