use crate::db::models::{Choice, Question, Tally};
use crate::error::{PollsError, Result};
use crate::forms::{NO_CHOICE_SELECTED, VoteForm};
use crate::sse::{PollEvent, publish};
use crate::startup::AppState;
use crate::templates::{STYLESHEET, display_datetime};
use axum::{
    extract::{Extension, Form, Path, rejection::FormRejection},
    http::header::CONTENT_TYPE,
    response::{Html, IntoResponse, Redirect, Response},
};
use chrono::Utc;
use serde::Serialize;
use tera::Context;
use tracing::{debug, info};

#[derive(Debug, Serialize)]
struct QuestionView {
    id: i64,
    question_text: String,
    pub_date: String,
}

impl From<&Question> for QuestionView {
    fn from(question: &Question) -> Self {
        QuestionView {
            id: question.id,
            question_text: question.question_text.clone(),
            pub_date: display_datetime(question.pub_date),
        }
    }
}

/// A question that exists and whose publication date has passed.
async fn published_question(app_state: &AppState, question_id: i64) -> Result<Question> {
    app_state
        .store
        .question(question_id)
        .await?
        .filter(|q| q.is_published(Utc::now()))
        .ok_or(PollsError::NotFound)
}

fn render_detail(
    app_state: &AppState,
    question: &Question,
    choices: &[Choice],
    error_message: Option<&str>,
) -> Result<Html<String>> {
    let mut context = Context::new();
    context.insert("question", &QuestionView::from(question));
    context.insert("choices", choices);
    context.insert("error_message", &error_message);
    app_state.templates.render("polls/detail.html", &context)
}

/// GET /polls/
pub async fn index(Extension(app_state): Extension<AppState>) -> Result<Html<String>> {
    let questions = app_state
        .store
        .published_questions(Utc::now(), app_state.settings.index_limit)
        .await?;
    debug!("Index lists {} questions", questions.len());

    let latest: Vec<QuestionView> = questions.iter().map(QuestionView::from).collect();
    let mut context = Context::new();
    context.insert("latest_question_list", &latest);
    app_state.templates.render("polls/index.html", &context)
}

/// GET /polls/:question_id/
pub async fn detail(
    Extension(app_state): Extension<AppState>,
    Path(question_id): Path<i64>,
) -> Result<Html<String>> {
    let question = published_question(&app_state, question_id).await?;
    let choices = app_state.store.choices(question.id).await?;
    render_detail(&app_state, &question, &choices, None)
}

/// GET /polls/:question_id/results/
pub async fn results(
    Extension(app_state): Extension<AppState>,
    Path(question_id): Path<i64>,
) -> Result<Html<String>> {
    let question = published_question(&app_state, question_id).await?;
    let tally = Tally::new(question.id, app_state.store.choices(question.id).await?);

    let mut context = Context::new();
    context.insert("question", &QuestionView::from(&question));
    context.insert("choices", &tally.choices);
    context.insert("total_votes", &tally.total_votes);
    app_state.templates.render("polls/results.html", &context)
}

/// POST /polls/:question_id/vote/
pub async fn vote(
    Extension(app_state): Extension<AppState>,
    Path(question_id): Path<i64>,
    form: std::result::Result<Form<VoteForm>, FormRejection>,
) -> Result<Response> {
    let question = published_question(&app_state, question_id).await?;

    // an empty or non-urlencoded body is treated as no selection
    let form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => {
            debug!("Unreadable vote form for question {}: {}", question.id, rejection);
            VoteForm::default()
        }
    };

    let voted = match form.choice_id() {
        Some(choice_id) => app_state.store.vote(question.id, choice_id).await?,
        None => None,
    };

    let Some(choice) = voted else {
        debug!("Vote on question {} without a valid choice", question.id);
        let choices = app_state.store.choices(question.id).await?;
        let page = render_detail(&app_state, &question, &choices, Some(NO_CHOICE_SELECTED))?;
        return Ok(page.into_response());
    };

    info!(
        "Vote for choice {} of question {} (now {})",
        choice.id, question.id, choice.votes
    );
    publish(
        &app_state.events,
        PollEvent::VoteCast {
            question_id: question.id,
            choice_id: choice.id,
            votes: choice.votes,
        },
    );

    Ok(Redirect::to(&format!("/polls/{}/results/", question.id)).into_response())
}

/// GET /static/polls/style.css
pub async fn stylesheet() -> impl IntoResponse {
    ([(CONTENT_TYPE, "text/css; charset=utf-8")], STYLESHEET)
}
