//! Checking a respondent's answers against a survey and scoring them.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::error::{Error, Result};
use crate::model::{
    api::submission::{AnswerSubmission, MultipleChoiceAnswer, SingleChoiceAnswer, TextAnswer},
    common::survey::{OptionId, QuestionId, QuestionType, SurveyType},
    db::{
        submission::Answer,
        survey::{AnswerOption, Question, Survey},
    },
};

/// The scoring outcome of a submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Score {
    /// Total points (scored surveys) or number of correct answers (quizzes).
    pub total_score: Option<i64>,
    /// Whether each choice question was answered correctly (quizzes only).
    pub correct_answers: Option<BTreeMap<QuestionId, bool>>,
}

/// Stored answer options by ID, whichever survey or question they belong to.
#[derive(Debug, Clone, Default)]
pub struct OptionIndex(HashMap<OptionId, AnswerOption>);

impl OptionIndex {
    /// Index every option of the given surveys.
    pub fn from_surveys<'a>(surveys: impl IntoIterator<Item = &'a Survey>) -> Self {
        Self(
            surveys
                .into_iter()
                .flat_map(Survey::options)
                .map(|option| (option.id, option.clone()))
                .collect(),
        )
    }

    pub fn get(&self, id: OptionId) -> Option<&AnswerOption> {
        self.0.get(&id)
    }
}

/// Every option ID the submitted answers refer to.
pub fn requested_option_ids(submissions: &[AnswerSubmission]) -> BTreeSet<OptionId> {
    submissions
        .iter()
        .flat_map(|submission| match submission {
            AnswerSubmission::Text(_) => Vec::new(),
            AnswerSubmission::SingleChoice(answer) => vec![answer.option_id],
            AnswerSubmission::MultipleChoice(answer) => answer.option_ids.clone(),
        })
        .collect()
}

/// Answers are matched to questions by position, so there must be exactly one
/// per question.
pub fn check_answer_count(survey: &Survey, submissions: &[AnswerSubmission]) -> Result<()> {
    if submissions.len() == survey.questions.len() {
        Ok(())
    } else {
        Err(Error::CountMismatch)
    }
}

/// Check each submitted answer against its question and turn it into a stored
/// [`Answer`], failing on the first answer that does not fit.
///
/// Option IDs are resolved against `options`, which must hold every stored
/// option the submissions refer to.
pub fn materialize(
    survey: &Survey,
    submissions: Vec<AnswerSubmission>,
    options: &OptionIndex,
) -> Result<Vec<Answer>> {
    check_answer_count(survey, &submissions)?;
    survey
        .questions
        .iter()
        .zip(submissions)
        .map(|(question, submission)| materialize_answer(question, submission, options))
        .collect()
}

fn materialize_answer(
    question: &Question,
    submission: AnswerSubmission,
    options: &OptionIndex,
) -> Result<Answer> {
    match (question.question_type, submission) {
        (QuestionType::Text, AnswerSubmission::Text(TextAnswer { text })) => {
            Ok(Answer::text(question.id, text))
        }
        (
            QuestionType::SingleChoice,
            AnswerSubmission::SingleChoice(SingleChoiceAnswer { option_id }),
        ) => {
            let option = options.get(option_id).ok_or(Error::OptionNotFound)?;
            Ok(Answer::choice(question.id, [option.id]))
        }
        (
            QuestionType::MultipleChoice,
            AnswerSubmission::MultipleChoice(MultipleChoiceAnswer { option_ids }),
        ) => {
            let resolved = resolve_options(options, &option_ids);
            if resolved.len() != option_ids.len() {
                return Err(Error::OptionsNotFound);
            }
            Ok(Answer::choice(question.id, resolved))
        }
        (question_type, _) => Err(Error::InvalidAnswerType(question_type)),
    }
}

/// The distinct requested options that exist, in the order first requested.
fn resolve_options(options: &OptionIndex, requested: &[OptionId]) -> Vec<OptionId> {
    let mut seen = HashSet::new();
    requested
        .iter()
        .copied()
        .filter(|&id| options.get(id).is_some() && seen.insert(id))
        .collect()
}

/// Score materialized answers, which must be in the survey's question order.
pub fn score(survey: &Survey, answers: &[Answer], options: &OptionIndex) -> Score {
    let pairs = survey.questions.iter().zip(answers);
    match survey.survey_type {
        SurveyType::Standard => Score::default(),
        SurveyType::Scored => {
            let total = answers
                .iter()
                .flat_map(Answer::selected_option_ids)
                .filter_map(|id| options.get(id))
                .map(|option| i64::from(option.points))
                .sum();
            Score {
                total_score: Some(total),
                correct_answers: None,
            }
        }
        SurveyType::Quiz => {
            let correct_answers: BTreeMap<_, _> = pairs
                .filter_map(|(question, answer)| {
                    is_correct(question, answer, options).map(|correct| (question.id, correct))
                })
                .collect();
            let total = correct_answers.values().filter(|&&correct| correct).count();
            Score {
                total_score: Some(i64::try_from(total).unwrap_or(i64::MAX)),
                correct_answers: Some(correct_answers),
            }
        }
    }
}

/// Whether a choice question was answered correctly; `None` for text questions.
fn is_correct(question: &Question, answer: &Answer, options: &OptionIndex) -> Option<bool> {
    match question.question_type {
        QuestionType::Text => None,
        QuestionType::SingleChoice => {
            let mut selected = answer.selected_option_ids();
            let correct = match (selected.next(), selected.next()) {
                (Some(id), None) => options.get(id).map_or(false, |option| option.is_correct),
                _ => false,
            };
            Some(correct)
        }
        QuestionType::MultipleChoice => {
            let selected: HashSet<_> = answer.selected_option_ids().collect();
            let correct: HashSet<_> = question.correct_option_ids().collect();
            Some(selected == correct)
        }
    }
}
