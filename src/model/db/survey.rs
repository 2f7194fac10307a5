use serde::{Deserialize, Serialize};

use crate::model::{
    common::survey::{OptionId, QuestionId, QuestionType, SurveyId, SurveyType},
    mongodb::Id,
};

/// A survey, as stored in the database. Questions and their options are
/// embedded, in the order they were created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Survey {
    /// Unique ID.
    #[serde(rename = "_id")]
    pub id: SurveyId,
    /// Globally unique title.
    pub title: String,
    /// Scoring mode.
    #[serde(rename = "type")]
    pub survey_type: SurveyType,
    /// The user who created the survey.
    pub author_id: Id,
    /// Questions, in canonical answering order.
    pub questions: Vec<Question>,
}

/// A single question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Unique ID.
    pub id: QuestionId,
    /// Question text.
    pub text: String,
    /// Kind of answer accepted.
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    /// Options to choose from; empty for text questions.
    #[serde(default)]
    pub options: Vec<AnswerOption>,
}

impl Survey {
    /// Every option of every question.
    pub fn options(&self) -> impl Iterator<Item = &AnswerOption> + '_ {
        self.questions
            .iter()
            .flat_map(|question| question.options.iter())
    }
}

impl Question {
    /// IDs of the options marked as correct.
    pub fn correct_option_ids(&self) -> impl Iterator<Item = OptionId> + '_ {
        self.options
            .iter()
            .filter(|option| option.is_correct)
            .map(|option| option.id)
    }
}

/// A possible answer to a choice question.
///
/// Both scoring fields are always stored; which one matters depends on the
/// survey type at scoring time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOption {
    /// Unique ID.
    pub id: OptionId,
    /// Option text.
    pub text: String,
    /// Whether picking this option is correct (quizzes).
    pub is_correct: bool,
    /// Points awarded for picking this option (scored surveys).
    pub points: i32,
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_span_all_questions() {
        let survey = Survey::scored_example();
        let ids: Vec<_> = survey.options().map(|option| option.id).collect();
        assert_eq!(ids, vec![100, 101, 102, 110, 111, 112]);
    }

    #[test]
    fn correct_options() {
        let survey = Survey::quiz_example();
        let correct: Vec<_> = survey.questions[1].correct_option_ids().collect();
        assert_eq!(correct, vec![210, 211, 212]);
    }

    #[test]
    fn stored_field_names() {
        let doc = mongodb::bson::to_document(&Survey::quiz_example()).unwrap();
        assert_eq!(doc.get_str("type").unwrap(), "QUIZ");
        assert!(doc.contains_key("_id"));
        let questions = doc.get_array("questions").unwrap();
        let first = questions[0].as_document().unwrap();
        assert_eq!(first.get_str("type").unwrap(), "SINGLE_CHOICE");
    }
}
