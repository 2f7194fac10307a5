use log::{info, warn};
use mongodb::bson::doc;
use rocket::{
    futures::TryStreamExt, http::Status, response::status::Custom, serde::json::Json, Route,
};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            auth::AuthToken,
            submission::{AnswerRequest, AnswerView, SubmissionResult},
            survey::{QuestionView, SurveySpec, SurveyView},
            validation::{validated, JsonBody},
        },
        common::survey::{OptionId, SurveyId},
        db::{submission::Submission, survey::Survey},
        mongodb::{
            int_id_filter, is_duplicate_key_error, Coll, Counter, OPTION_ID_COUNTER_ID,
            QUESTION_ID_COUNTER_ID, SURVEY_ID_COUNTER_ID,
        },
        submission::{check_answer_count, materialize, requested_option_ids, score, OptionIndex},
    },
};

pub fn routes() -> Vec<Route> {
    routes![create_survey, get_questions, submit_answers]
}

/// Load every stored option among `ids`, whichever survey owns it.
async fn find_options(surveys: &Coll<Survey>, ids: Vec<OptionId>) -> Result<OptionIndex> {
    if ids.is_empty() {
        return Ok(OptionIndex::default());
    }
    let owners: Vec<Survey> = surveys
        .find(doc! { "questions.options.id": { "$in": ids } }, None)
        .await?
        .try_collect()
        .await?;
    Ok(OptionIndex::from_surveys(&owners))
}

/// Load a survey by ID.
async fn find_survey(surveys: &Coll<Survey>, survey_id: SurveyId) -> Result<Survey> {
    surveys
        .find_one(int_id_filter(survey_id), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Survey with id={survey_id}")))
}

#[post("/surveys", data = "<spec>", format = "json")]
async fn create_survey(
    token: AuthToken,
    spec: JsonBody<'_, SurveySpec>,
    surveys: Coll<Survey>,
    counters: Coll<Counter>,
) -> Result<Custom<Json<SurveyView>>> {
    let spec = validated(spec)?;

    // Check title uniqueness.
    let with_title = doc! { "title": &spec.title };
    if surveys.find_one(with_title, None).await?.is_some() {
        warn!("Rejected survey with existing title {:?}", spec.title);
        return Err(Error::DuplicateTitle);
    }

    // Allocate IDs for the survey and everything it owns.
    let survey_id = Counter::next(&counters, SURVEY_ID_COUNTER_ID).await?;
    let question_ids =
        Counter::reserve(&counters, QUESTION_ID_COUNTER_ID, spec.question_count()?).await?;
    let option_ids =
        Counter::reserve(&counters, OPTION_ID_COUNTER_ID, spec.option_count()?).await?;
    let survey = spec.into_survey(survey_id, token.user_id, question_ids, option_ids);

    // A single insert stores the survey with its questions and options.
    surveys.insert_one(&survey, None).await.map_err(|e| {
        if is_duplicate_key_error(&e) {
            Error::DuplicateTitle
        } else {
            e.into()
        }
    })?;
    info!(
        "{} created {:?} survey {} {:?}",
        token.email, survey.survey_type, survey.id, survey.title
    );

    Ok(Custom(Status::Created, Json(SurveyView::from(&survey))))
}

#[get("/surveys/<survey_id>")]
async fn get_questions(
    _token: AuthToken,
    survey_id: SurveyId,
    surveys: Coll<Survey>,
) -> Result<Json<Vec<QuestionView>>> {
    let survey = find_survey(&surveys, survey_id).await?;
    let questions = survey.questions.iter().map(QuestionView::from).collect();
    Ok(Json(questions))
}

#[post("/surveys/<survey_id>/submit", data = "<request>", format = "json")]
async fn submit_answers(
    token: AuthToken,
    survey_id: SurveyId,
    request: JsonBody<'_, AnswerRequest>,
    surveys: Coll<Survey>,
    submissions: Coll<Submission>,
) -> Result<Custom<Json<SubmissionResult>>> {
    let request = validated(request)?;
    let survey = find_survey(&surveys, survey_id).await?;
    check_answer_count(&survey, &request.answers)?;

    // Only one submission per respondent.
    let already_submitted = doc! {
        "survey_id": survey.id,
        "respondent_id": token.user_id,
    };
    if submissions.find_one(already_submitted, None).await?.is_some() {
        warn!("{} tried to answer survey {} again", token.email, survey.id);
        return Err(Error::AlreadySubmitted);
    }

    // Nothing is stored unless every answer fits its question.
    let requested = requested_option_ids(&request.answers).into_iter().collect();
    let options = find_options(&surveys, requested).await?;
    let answers = materialize(&survey, request.answers, &options)?;
    let submission = Submission::new(survey.id, token.user_id, answers);
    submissions
        .insert_one(&submission, None)
        .await
        .map_err(|e| {
            if is_duplicate_key_error(&e) {
                Error::AlreadySubmitted
            } else {
                e.into()
            }
        })?;

    let score = score(&survey, &submission.answers, &options);
    info!(
        "{} answered survey {} (score {:?})",
        token.email, survey.id, score.total_score
    );

    let result = SubmissionResult {
        answers: submission
            .answers
            .iter()
            .map(|answer| AnswerView::new(survey.id, answer))
            .collect(),
        total_score: score.total_score,
        correct_answers: score.correct_answers,
    };
    Ok(Custom(Status::Created, Json(result)))
}

#[cfg(test)]
mod tests {
    use rocket::{
        futures::future::join,
        http::{ContentType, Header},
        local::asynchronous::Client,
        serde::json::{
            serde_json::{self, json},
            Value,
        },
    };

    use crate::model::{
        api::{
            auth::{RegisterRequest, TokenResponse, AUTHORIZATION_HEADER, BEARER_PREFIX},
            submission::AnswerSubmission,
        },
        common::survey::{QuestionType, SurveyType},
    };

    use super::*;

    async fn post_json(
        client: &Client,
        uri: String,
        auth: &Header<'static>,
        body: Value,
    ) -> (Status, Value) {
        let response = client
            .post(uri)
            .header(ContentType::JSON)
            .header(auth.clone())
            .body(body.to_string())
            .dispatch()
            .await;
        let status = response.status();
        (status, response.into_json().await.unwrap())
    }

    async fn create(client: &Client, auth: &Header<'static>, spec: &SurveySpec) -> SurveyView {
        let response = client
            .post(uri!(create_survey))
            .header(ContentType::JSON)
            .header(auth.clone())
            .body(json!(spec).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Created, response.status());
        response.into_json().await.unwrap()
    }

    async fn questions(
        client: &Client,
        auth: &Header<'static>,
        survey_id: SurveyId,
    ) -> Vec<QuestionView> {
        let response = client
            .get(uri!(get_questions(survey_id)))
            .header(auth.clone())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        response.into_json().await.unwrap()
    }

    async fn submit(
        client: &Client,
        auth: &Header<'static>,
        survey_id: SurveyId,
        answers: Vec<AnswerSubmission>,
    ) -> (Status, Value) {
        post_json(
            client,
            uri!(submit_answers(survey_id)).to_string(),
            auth,
            json!(AnswerRequest { answers }),
        )
        .await
    }

    /// Register a second user, returning their authorization header.
    async fn second_user(client: &Client) -> Header<'static> {
        let response = client
            .post("/auth/register")
            .header(ContentType::JSON)
            .body(json!(RegisterRequest::example2()).to_string())
            .dispatch()
            .await;
        let token: TokenResponse = response.into_json().await.unwrap();
        Header::new(AUTHORIZATION_HEADER, format!("{BEARER_PREFIX}{}", token.token))
    }

    #[backend_test(user)]
    async fn create_and_get(client: Client, auth: Header<'static>, surveys: Coll<Survey>) {
        let spec = SurveySpec::quiz_example();
        let view = create(&client, &auth, &spec).await;
        assert_eq!(view.title, spec.title);
        assert_eq!(view.survey_type, SurveyType::Quiz);
        let types: Vec<_> = view.questions.iter().map(|q| q.question_type).collect();
        assert_eq!(types, vec![QuestionType::SingleChoice, QuestionType::MultipleChoice]);

        // Everything is stored, including the scoring information.
        let stored = surveys
            .find_one(int_id_filter(view.id), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(*stored.author_id, **view.author_id);
        assert!(stored.questions[0].options[0].is_correct);
        assert_eq!(stored.questions[1].options.len(), 4);

        // Questions come back in order, without the scoring information.
        let fetched = questions(&client, &auth, view.id).await;
        let expected: Vec<_> = stored.questions.iter().map(QuestionView::from).collect();
        assert_eq!(fetched, expected);
        let texts: Vec<_> = fetched[1]
            .options
            .as_ref()
            .unwrap()
            .iter()
            .map(|option| option.text.as_str())
            .collect();
        assert_eq!(texts, vec!["Java 8", "Java 11", "Java 15", "JavaScript"]);

        let response = client
            .get(uri!(get_questions(view.id)))
            .header(auth.clone())
            .dispatch()
            .await;
        let raw = response.into_string().await.unwrap();
        assert!(!raw.contains("isCorrect"));
        assert!(!raw.contains("is_correct"));
        assert!(!raw.contains("points"));
    }

    #[backend_test(user)]
    async fn ids_are_unique_across_surveys(client: Client, auth: Header<'static>) {
        let first = create(&client, &auth, &SurveySpec::scored_example()).await;
        let second = create(&client, &auth, &SurveySpec::quiz_example()).await;
        assert_ne!(first.id, second.id);

        let first_questions = questions(&client, &auth, first.id).await;
        let second_questions = questions(&client, &auth, second.id).await;
        for question in &first_questions {
            assert!(second_questions.iter().all(|q| q.id != question.id));
        }
        let option_ids = |questions: &[QuestionView]| -> Vec<_> {
            questions
                .iter()
                .flat_map(|q| q.options.iter().flatten().map(|o| o.id))
                .collect()
        };
        let first_options = option_ids(&first_questions);
        assert!(option_ids(&second_questions)
            .iter()
            .all(|id| !first_options.contains(id)));
    }

    #[backend_test(user)]
    async fn duplicate_title(client: Client, auth: Header<'static>, surveys: Coll<Survey>) {
        create(&client, &auth, &SurveySpec::scored_example()).await;

        let mut spec = SurveySpec::quiz_example();
        spec.title = SurveySpec::scored_example().title;
        let (status, body) =
            post_json(&client, uri!(create_survey).to_string(), &auth, json!(spec)).await;
        assert_eq!(Status::BadRequest, status);
        assert_eq!(body, json!({ "error": "Survey with this title already exists" }));
        assert_eq!(surveys.count_documents(None, None).await.unwrap(), 1);
    }

    #[backend_test(user)]
    async fn concurrent_duplicate_titles(
        client: Client,
        auth: Header<'static>,
        surveys: Coll<Survey>,
    ) {
        let spec = json!(SurveySpec::scored_example());
        let post = || post_json(&client, uri!(create_survey).to_string(), &auth, spec.clone());
        let ((first, _), (second, _)) = join(post(), post()).await;

        let mut statuses = [first.code, second.code];
        statuses.sort_unstable();
        assert_eq!(statuses, [201, 400]);
        assert_eq!(surveys.count_documents(None, None).await.unwrap(), 1);
    }

    #[backend_test(user)]
    async fn invalid_survey(client: Client, auth: Header<'static>, surveys: Coll<Survey>) {
        let (status, body) = post_json(
            &client,
            uri!(create_survey).to_string(),
            &auth,
            json!({
                "title": "",
                "type": "QUIZ",
                "questions": [
                    { "text": "Pick one", "type": "SINGLE_CHOICE" },
                    { "text": "Say something", "options": [{ "text": "No" }] }
                ]
            }),
        )
        .await;
        assert_eq!(Status::BadRequest, status);
        let errors = body["errors"].as_object().unwrap();
        assert!(errors.contains_key("title"));
        assert!(errors.contains_key("questions[0].options"));
        assert!(errors.contains_key("questions[1].options"));

        let (status, _) = post_json(
            &client,
            uri!(create_survey).to_string(),
            &auth,
            json!({ "title": "Unknown type", "type": "POLL", "questions": [] }),
        )
        .await;
        assert_eq!(Status::BadRequest, status);
        assert_eq!(surveys.count_documents(None, None).await.unwrap(), 0);
    }

    #[backend_test(user)]
    async fn missing_survey(client: Client, auth: Header<'static>) {
        let response = client
            .get(uri!(get_questions(999_i64)))
            .header(auth.clone())
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body, json!({ "error": "Survey with id=999 not found" }));

        let (status, body) = submit(&client, &auth, 999, vec![AnswerSubmission::text("?")]).await;
        assert_eq!(Status::NotFound, status);
        assert_eq!(body, json!({ "error": "Survey with id=999 not found" }));
    }

    #[backend_test(user)]
    async fn scored_submission(
        client: Client,
        auth: Header<'static>,
        submissions: Coll<Submission>,
    ) {
        let survey = create(&client, &auth, &SurveySpec::scored_example()).await;
        let fetched = questions(&client, &auth, survey.id).await;
        let options = |i: usize| -> Vec<_> {
            fetched[i].options.iter().flatten().map(|o| o.id).collect()
        };
        let (single, multiple) = (options(0), options(1));

        let (status, body) = submit(
            &client,
            &auth,
            survey.id,
            vec![
                AnswerSubmission::single(single[1]),
                AnswerSubmission::multiple(multiple.clone()),
            ],
        )
        .await;
        assert_eq!(Status::Created, status);
        assert_eq!(body["totalScore"], json!(11));
        assert_eq!(body["correctAnswers"], Value::Null);
        assert_eq!(body["answers"][0]["questionId"], json!(fetched[0].id));
        assert_eq!(body["answers"][0]["surveyId"], json!(survey.id));
        assert_eq!(body["answers"][1]["selectedOptionIds"], json!(multiple));

        let stored = submissions
            .find_one(doc! { "survey_id": survey.id }, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.answers.len(), 2);
        let selected: Vec<_> = stored.answers[0].selected_option_ids().collect();
        assert_eq!(selected, vec![single[1]]);
    }

    #[backend_test(user)]
    async fn quiz_submission(client: Client, auth: Header<'static>) {
        let survey = create(&client, &auth, &SurveySpec::quiz_example()).await;
        let fetched = questions(&client, &auth, survey.id).await;
        let options = |i: usize| -> Vec<_> {
            fetched[i].options.iter().flatten().map(|o| o.id).collect()
        };
        let (single, multiple) = (options(0), options(1));

        let (status, body) = submit(
            &client,
            &auth,
            survey.id,
            vec![
                AnswerSubmission::single(single[0]),
                AnswerSubmission::multiple(vec![multiple[0], multiple[1]]),
            ],
        )
        .await;
        assert_eq!(Status::Created, status);
        assert_eq!(body["totalScore"], json!(1));
        let mut expected = serde_json::Map::new();
        expected.insert(fetched[0].id.to_string(), json!(true));
        expected.insert(fetched[1].id.to_string(), json!(false));
        assert_eq!(body["correctAnswers"], Value::Object(expected));
    }

    #[backend_test(user)]
    async fn standard_submission(client: Client, auth: Header<'static>) {
        let survey = create(&client, &auth, &SurveySpec::standard_example()).await;
        let fetched = questions(&client, &auth, survey.id).await;
        assert_eq!(fetched[0].options, None);
        let options = |i: usize| -> Vec<_> {
            fetched[i].options.iter().flatten().map(|o| o.id).collect()
        };

        let (status, body) = submit(
            &client,
            &auth,
            survey.id,
            vec![
                AnswerSubmission::text("Green"),
                AnswerSubmission::single(options(1)[0]),
                AnswerSubmission::multiple(options(2)),
            ],
        )
        .await;
        assert_eq!(Status::Created, status);
        assert_eq!(body["totalScore"], Value::Null);
        assert_eq!(body["correctAnswers"], Value::Null);
        assert_eq!(body["answers"][0]["text"], json!("Green"));
        assert_eq!(body["answers"][0]["selectedOptionIds"], json!([]));
    }

    #[backend_test(user)]
    async fn submit_once(client: Client, auth: Header<'static>, submissions: Coll<Submission>) {
        let survey = create(&client, &auth, &SurveySpec::standard_example()).await;
        let fetched = questions(&client, &auth, survey.id).await;
        let answers = vec![
            AnswerSubmission::text("Green"),
            AnswerSubmission::single(fetched[1].options.as_ref().unwrap()[0].id),
            AnswerSubmission::multiple(Vec::new()),
        ];

        let (status, _) = submit(&client, &auth, survey.id, answers.clone()).await;
        assert_eq!(Status::Created, status);

        let (status, body) = submit(&client, &auth, survey.id, answers.clone()).await;
        assert_eq!(Status::Conflict, status);
        assert_eq!(
            body,
            json!({ "error": "User already submitted answers for this survey" })
        );

        // Someone else may still answer.
        let other = second_user(&client).await;
        let (status, _) = submit(&client, &other, survey.id, answers).await;
        assert_eq!(Status::Created, status);
        assert_eq!(submissions.count_documents(None, None).await.unwrap(), 2);
    }

    #[backend_test(user)]
    async fn concurrent_submissions(
        client: Client,
        auth: Header<'static>,
        submissions: Coll<Submission>,
    ) {
        let survey = create(&client, &auth, &SurveySpec::standard_example()).await;
        let fetched = questions(&client, &auth, survey.id).await;
        let answers = vec![
            AnswerSubmission::text("Green"),
            AnswerSubmission::single(fetched[1].options.as_ref().unwrap()[0].id),
            AnswerSubmission::multiple(Vec::new()),
        ];

        let ((first, _), (second, _)) = join(
            submit(&client, &auth, survey.id, answers.clone()),
            submit(&client, &auth, survey.id, answers),
        )
        .await;
        let mut statuses = [first.code, second.code];
        statuses.sort_unstable();
        assert_eq!(statuses, [201, 409]);
        assert_eq!(submissions.count_documents(None, None).await.unwrap(), 1);
    }

    #[backend_test(user)]
    async fn options_from_other_surveys(client: Client, auth: Header<'static>) {
        let scored = create(&client, &auth, &SurveySpec::scored_example()).await;
        let standard = create(&client, &auth, &SurveySpec::standard_example()).await;
        let scored_questions = questions(&client, &auth, scored.id).await;
        let standard_questions = questions(&client, &auth, standard.id).await;
        let ids = |question: &QuestionView| -> Vec<_> {
            question.options.iter().flatten().map(|o| o.id).collect()
        };

        // "Tabs" (4 points) answers the first question; Spring Boot, Ktor and
        // Micronaut (3 + 3 + 2) the second.
        let tabs = ids(&standard_questions[1])[0];
        let (status, body) = submit(
            &client,
            &auth,
            scored.id,
            vec![
                AnswerSubmission::single(tabs),
                AnswerSubmission::multiple(ids(&scored_questions[1])),
            ],
        )
        .await;
        assert_eq!(Status::Created, status);
        assert_eq!(body["totalScore"], json!(12));
        assert_eq!(body["answers"][0]["selectedOptionIds"], json!([tabs]));
    }

    #[backend_test(user)]
    async fn ids_beyond_u32(client: Client, auth: Header<'static>) {
        let response = client
            .get(uri!(get_questions(5_000_000_000_i64)))
            .header(auth.clone())
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());

        let survey = create(&client, &auth, &SurveySpec::scored_example()).await;
        let (status, body) = submit(
            &client,
            &auth,
            survey.id,
            vec![
                AnswerSubmission::single(5_000_000_000),
                AnswerSubmission::multiple(Vec::new()),
            ],
        )
        .await;
        assert_eq!(Status::BadRequest, status);
        assert_eq!(body, json!({ "error": "Option not found" }));
    }

    #[backend_test(user)]
    async fn rejected_submissions_store_nothing(
        client: Client,
        auth: Header<'static>,
        submissions: Coll<Submission>,
    ) {
        let survey = create(&client, &auth, &SurveySpec::standard_example()).await;
        let fetched = questions(&client, &auth, survey.id).await;
        let single = fetched[1].options.as_ref().unwrap()[0].id;

        // Too few answers.
        let (status, body) =
            submit(&client, &auth, survey.id, vec![AnswerSubmission::text("Green")]).await;
        assert_eq!(Status::BadRequest, status);
        assert_eq!(
            body,
            json!({ "error": "Number of answers must match number of questions" })
        );

        // Wrong answer type for the last question.
        let (status, body) = submit(
            &client,
            &auth,
            survey.id,
            vec![
                AnswerSubmission::text("Green"),
                AnswerSubmission::single(single),
                AnswerSubmission::text("Vim"),
            ],
        )
        .await;
        assert_eq!(Status::BadRequest, status);
        assert_eq!(
            body,
            json!({ "error": "Invalid answer type for multiple choice question" })
        );

        // Unknown option.
        let (status, body) = submit(
            &client,
            &auth,
            survey.id,
            vec![
                AnswerSubmission::text("Green"),
                AnswerSubmission::single(999_999),
                AnswerSubmission::multiple(Vec::new()),
            ],
        )
        .await;
        assert_eq!(Status::BadRequest, status);
        assert_eq!(body, json!({ "error": "Option not found" }));

        // Unknown shape.
        let (status, _) = post_json(
            &client,
            uri!(submit_answers(survey.id)).to_string(),
            &auth,
            json!({ "answers": [{ "text": "Green" }, { "choice": 1 }, { "optionIds": [] }] }),
        )
        .await;
        assert_eq!(Status::BadRequest, status);

        // No answers at all.
        let (status, body) = submit(&client, &auth, survey.id, Vec::new()).await;
        assert_eq!(Status::BadRequest, status);
        assert!(body["errors"]["answers"].is_string());

        assert_eq!(submissions.count_documents(None, None).await.unwrap(), 0);
    }

    #[backend_test]
    async fn authentication_required(client: Client) {
        let response = client.get(uri!(get_questions(1_i64))).dispatch().await;
        assert_eq!(Status::Unauthorized, response.status());
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body, json!({ "error": "Authentication required" }));

        let response = client
            .get(uri!(get_questions(1_i64)))
            .header(Header::new(AUTHORIZATION_HEADER, "Bearer invalid.token"))
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body, json!({ "error": "JWT token malformed" }));

        let response = client
            .post(uri!(create_survey))
            .header(ContentType::JSON)
            .body(json!(SurveySpec::scored_example()).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
    }

    #[backend_test]
    async fn token_for_deleted_user(client: Client) {
        // A valid token whose user does not exist.
        let config = client.rocket().state::<crate::Config>().unwrap();
        let token = AuthToken::issue("ghost@example.com", config).unwrap();
        let response = client
            .get(uri!(get_questions(1_i64)))
            .header(Header::new(AUTHORIZATION_HEADER, format!("{BEARER_PREFIX}{token}")))
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
    }
}
