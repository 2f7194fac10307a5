use std::collections::HashSet;

use rocket::http::Status;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::error::{Error, Result};
use crate::model::{
    api::{
        id::ApiId,
        validation::{invalid, not_blank},
    },
    common::survey::{OptionId, QuestionId, QuestionType, SurveyId, SurveyType},
    db::survey::{AnswerOption, Question, Survey},
    mongodb::Id,
};

const OPTIONS_MESSAGE: &str =
    "Options must be present for choice-based questions and absent for text questions";

/// A survey specification, as submitted by its author.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SurveySpec {
    /// Survey title, unique across all surveys.
    #[validate(custom(function = "not_blank"))]
    pub title: String,
    /// Scoring mode.
    #[serde(rename = "type", default)]
    pub survey_type: SurveyType,
    /// Question specifications, in answering order.
    #[validate(length(min = 1, message = "must not be empty"), nested)]
    pub questions: Vec<QuestionSpec>,
}

/// A question specification.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "check_options", skip_on_field_errors = false))]
pub struct QuestionSpec {
    #[validate(custom(function = "not_blank"))]
    pub text: String,
    #[serde(rename = "type", default)]
    pub question_type: QuestionType,
    #[serde(default)]
    #[validate(nested)]
    pub options: Option<Vec<OptionSpec>>,
}

/// An answer option specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OptionSpec {
    #[validate(custom(function = "not_blank"))]
    pub text: String,
    #[serde(default)]
    pub points: Option<i32>,
    #[serde(default)]
    pub is_correct: bool,
}

/// Choice questions need at least one option and no two options with the same
/// text; text questions take none.
fn check_options(question: &QuestionSpec) -> std::result::Result<(), ValidationError> {
    let options = question.options.as_deref().unwrap_or_default();
    let valid = if question.question_type.has_options() {
        let texts: HashSet<&str> = options.iter().map(|option| option.text.as_str()).collect();
        !options.is_empty() && texts.len() == options.len()
    } else {
        options.is_empty()
    };
    if valid {
        Ok(())
    } else {
        Err(invalid("options", OPTIONS_MESSAGE))
    }
}

fn id_count(count: usize) -> Result<i64> {
    i64::try_from(count)
        .map_err(|_| Error::Status(Status::BadRequest, "Survey is too large".to_string()))
}

impl SurveySpec {
    /// How many question IDs this survey needs.
    pub fn question_count(&self) -> Result<i64> {
        id_count(self.questions.len())
    }

    /// How many option IDs this survey needs, across all questions.
    pub fn option_count(&self) -> Result<i64> {
        id_count(self.questions.iter().map(QuestionSpec::option_count).sum())
    }

    /// Convert this spec into a survey, handing out question and option IDs
    /// in request order.
    ///
    /// The ID sources must yield at least [`Self::question_count`] and
    /// [`Self::option_count`] IDs respectively.
    pub fn into_survey(
        self,
        id: SurveyId,
        author_id: Id,
        question_ids: impl IntoIterator<Item = QuestionId>,
        option_ids: impl IntoIterator<Item = OptionId>,
    ) -> Survey {
        let mut option_ids = option_ids.into_iter();
        let questions = self
            .questions
            .into_iter()
            .zip(question_ids)
            .map(|(spec, question_id)| spec.into_question(question_id, &mut option_ids))
            .collect();
        Survey {
            id,
            title: self.title,
            survey_type: self.survey_type,
            author_id,
            questions,
        }
    }
}

impl QuestionSpec {
    fn option_count(&self) -> usize {
        self.options.as_ref().map_or(0, Vec::len)
    }

    /// Convert this spec into a question, drawing option IDs from `option_ids`.
    fn into_question(
        self,
        id: QuestionId,
        option_ids: &mut impl Iterator<Item = OptionId>,
    ) -> Question {
        let options = self
            .options
            .unwrap_or_default()
            .into_iter()
            .zip(option_ids)
            .map(|(spec, option_id)| AnswerOption {
                id: option_id,
                text: spec.text,
                is_correct: spec.is_correct,
                points: spec.points.unwrap_or(0),
            })
            .collect();
        Question {
            id,
            text: self.text,
            question_type: self.question_type,
            options,
        }
    }
}

/// A freshly created survey, as returned to its author.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyView {
    pub id: SurveyId,
    pub title: String,
    #[serde(rename = "type")]
    pub survey_type: SurveyType,
    pub author_id: ApiId,
    pub questions: Vec<QuestionSummary>,
}

/// A question's identity, without its options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionSummary {
    pub id: QuestionId,
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
}

impl From<&Survey> for SurveyView {
    fn from(survey: &Survey) -> Self {
        Self {
            id: survey.id,
            title: survey.title.clone(),
            survey_type: survey.survey_type,
            author_id: survey.author_id.into(),
            questions: survey
                .questions
                .iter()
                .map(|question| QuestionSummary {
                    id: question.id,
                    text: question.text.clone(),
                    question_type: question.question_type,
                })
                .collect(),
        }
    }
}

/// A question as shown to respondents. Scoring information is never included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionView {
    pub id: QuestionId,
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    /// `None` for text questions.
    pub options: Option<Vec<OptionView>>,
}

/// An option as shown to respondents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionView {
    pub id: OptionId,
    pub text: String,
}

impl From<&Question> for QuestionView {
    fn from(question: &Question) -> Self {
        let options = question.question_type.has_options().then(|| {
            question
                .options
                .iter()
                .map(|option| OptionView {
                    id: option.id,
                    text: option.text.clone(),
                })
                .collect()
        });
        Self {
            id: question.id,
            text: question.text.clone(),
            question_type: question.question_type,
            options,
        }
    }
}
