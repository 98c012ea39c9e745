//! Staff-only pages for managing questions and their choices.

use crate::auth::{require_admin, set_flash, take_flash};
use crate::db::models::{AdminUser, Question, QuestionQuery};
use crate::error::{PollsError, Result};
use crate::forms::QuestionForm;
use crate::sse::{PollEvent, publish};
use crate::startup::AppState;
use crate::templates::display_datetime;
use axum::{
    extract::{Extension, Form, Path, Query},
    http::Uri,
    response::{Html, IntoResponse, Redirect, Response},
};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tera::Context;
use tower_sessions::Session;
use tracing::info;

pub const LIST_PER_PAGE: i64 = 100;
const QUESTION_LIST: &str = "/admin/polls/question/";
const QUESTION_ADD: &str = "/admin/polls/question/add/";

/// Publication date filter offered on the question list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PubDateFilter {
    Any,
    Today,
    Past7Days,
    ThisMonth,
    ThisYear,
}

impl PubDateFilter {
    pub const ALL: [PubDateFilter; 5] = [
        PubDateFilter::Any,
        PubDateFilter::Today,
        PubDateFilter::Past7Days,
        PubDateFilter::ThisMonth,
        PubDateFilter::ThisYear,
    ];

    pub fn parse(raw: Option<&str>) -> Self {
        Self::ALL
            .into_iter()
            .find(|f| Some(f.slug()) == raw)
            .unwrap_or(PubDateFilter::Any)
    }

    pub fn slug(self) -> &'static str {
        match self {
            PubDateFilter::Any => "any",
            PubDateFilter::Today => "today",
            PubDateFilter::Past7Days => "past_7_days",
            PubDateFilter::ThisMonth => "this_month",
            PubDateFilter::ThisYear => "this_year",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PubDateFilter::Any => "Any date",
            PubDateFilter::Today => "Today",
            PubDateFilter::Past7Days => "Past 7 days",
            PubDateFilter::ThisMonth => "This month",
            PubDateFilter::ThisYear => "This year",
        }
    }

    /// Half-open `[since, until)` window in UTC.
    pub fn window(self, now: DateTime<Utc>) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        let midnight = |date: NaiveDate| date.and_time(NaiveTime::MIN).and_utc();
        let today = now.date_naive();
        let tomorrow = midnight(today) + Duration::days(1);

        match self {
            PubDateFilter::Any => (None, None),
            PubDateFilter::Today => (Some(midnight(today)), Some(tomorrow)),
            PubDateFilter::Past7Days => {
                (Some(midnight(today) - Duration::days(7)), Some(tomorrow))
            }
            PubDateFilter::ThisMonth => {
                let (year, month) = (today.year(), today.month());
                let next = if month == 12 {
                    NaiveDate::from_ymd_opt(year + 1, 1, 1)
                } else {
                    NaiveDate::from_ymd_opt(year, month + 1, 1)
                };
                (
                    NaiveDate::from_ymd_opt(year, month, 1).map(midnight),
                    next.map(midnight),
                )
            }
            PubDateFilter::ThisYear => (
                NaiveDate::from_ymd_opt(today.year(), 1, 1).map(midnight),
                NaiveDate::from_ymd_opt(today.year() + 1, 1, 1).map(midnight),
            ),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub q: Option<String>,
    pub pub_date: Option<String>,
    pub p: Option<i64>,
}

#[derive(Debug, Serialize)]
struct FilterLink {
    slug: &'static str,
    label: &'static str,
    selected: bool,
}

#[derive(Debug, Serialize)]
struct QuestionRow {
    id: i64,
    question_text: String,
    pub_date: String,
    was_published_recently: bool,
}

fn admin_context(user: &AdminUser, title: &str, flash: Option<String>) -> Context {
    let mut context = Context::new();
    context.insert("title", title);
    context.insert("username", &user.username);
    context.insert("flash", &flash);
    context
}

fn change_url(question_id: i64) -> String {
    format!("/admin/polls/question/{}/change/", question_id)
}

async fn existing_question(app_state: &AppState, question_id: i64) -> Result<Question> {
    app_state
        .store
        .question(question_id)
        .await?
        .ok_or(PollsError::NotFound)
}

/// GET /admin/
pub async fn home(
    Extension(app_state): Extension<AppState>,
    session: Session,
    uri: Uri,
) -> Result<Redirect> {
    require_admin(&app_state, &session, &uri).await?;
    Ok(Redirect::to(QUESTION_LIST))
}

/// GET /admin/polls/question/
pub async fn question_list(
    Extension(app_state): Extension<AppState>,
    session: Session,
    uri: Uri,
    Query(params): Query<ListParams>,
) -> Result<Html<String>> {
    let user = require_admin(&app_state, &session, &uri).await?;

    let now = Utc::now();
    let search = params
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_string);
    let filter = PubDateFilter::parse(params.pub_date.as_deref());
    let (since, until) = filter.window(now);
    let page = params.p.unwrap_or(0).max(0);

    let query = QuestionQuery {
        search: search.clone(),
        since,
        until,
        limit: LIST_PER_PAGE,
        offset: page.saturating_mul(LIST_PER_PAGE),
    };
    let (questions, total) = app_state.store.list_questions(&query).await?;

    let rows: Vec<QuestionRow> = questions
        .iter()
        .map(|q| QuestionRow {
            id: q.id,
            question_text: q.question_text.clone(),
            pub_date: display_datetime(q.pub_date),
            was_published_recently: q.was_published_recently(now),
        })
        .collect();
    let filters: Vec<FilterLink> = PubDateFilter::ALL
        .into_iter()
        .map(|f| FilterLink {
            slug: f.slug(),
            label: f.label(),
            selected: f == filter,
        })
        .collect();
    let page_count = ((total + LIST_PER_PAGE - 1) / LIST_PER_PAGE).max(1);

    let flash = take_flash(&session).await?;
    let mut context = admin_context(&user, "Select question to change", flash);
    context.insert("questions", &rows);
    context.insert("total", &total);
    context.insert("q", &search.unwrap_or_default());
    context.insert("pub_date", filter.slug());
    context.insert("filters", &filters);
    context.insert("page", &page);
    context.insert("page_count", &page_count);
    app_state.templates.render("admin/question_list.html", &context)
}

fn render_form(
    app_state: &AppState,
    user: &AdminUser,
    form: &QuestionForm,
    question_id: Option<i64>,
    flash: Option<String>,
) -> Result<Html<String>> {
    let (title, action) = match question_id {
        Some(id) => ("Change question", change_url(id)),
        None => ("Add question", QUESTION_ADD.to_string()),
    };
    let has_errors =
        !form.errors.is_empty() || form.choices.iter().any(|row| !row.errors.is_empty());

    let mut context = admin_context(user, title, flash);
    context.insert("form", form);
    context.insert("question_id", &question_id);
    context.insert("action", &action);
    context.insert("has_errors", &has_errors);
    app_state.templates.render("admin/question_form.html", &context)
}

/// Where to go after a successful save, following the submit button pressed.
fn after_save(fields: &HashMap<String, String>, question: &Question) -> (String, String) {
    let text = &question.question_text;
    if fields.contains_key("_continue") {
        (
            change_url(question.id),
            format!("The question “{}” was saved successfully. You may edit it again below.", text),
        )
    } else if fields.contains_key("_addanother") {
        (
            QUESTION_ADD.to_string(),
            format!("The question “{}” was saved successfully. You may add another question below.", text),
        )
    } else {
        (
            QUESTION_LIST.to_string(),
            format!("The question “{}” was saved successfully.", text),
        )
    }
}

/// GET /admin/polls/question/add/
pub async fn add_form(
    Extension(app_state): Extension<AppState>,
    session: Session,
    uri: Uri,
) -> Result<Html<String>> {
    let user = require_admin(&app_state, &session, &uri).await?;
    let flash = take_flash(&session).await?;
    render_form(&app_state, &user, &QuestionForm::blank(), None, flash)
}

/// POST /admin/polls/question/add/
pub async fn add(
    Extension(app_state): Extension<AppState>,
    session: Session,
    uri: Uri,
    Form(fields): Form<HashMap<String, String>>,
) -> Result<Response> {
    let user = require_admin(&app_state, &session, &uri).await?;

    let mut form = QuestionForm::from_submission(&fields);
    let Some((draft, changes)) = form.validate() else {
        return Ok(render_form(&app_state, &user, &form, None, None)?.into_response());
    };

    let question = app_state
        .store
        .save_question(None, &draft, &changes)
        .await?
        .ok_or(PollsError::NotFound)?;
    info!("{} added question {}", user.username, question.id);

    let (target, message) = after_save(&fields, &question);
    set_flash(&session, message).await?;
    Ok(Redirect::to(&target).into_response())
}

/// GET /admin/polls/question/:question_id/change/
pub async fn change_form(
    Extension(app_state): Extension<AppState>,
    session: Session,
    uri: Uri,
    Path(question_id): Path<i64>,
) -> Result<Html<String>> {
    let user = require_admin(&app_state, &session, &uri).await?;
    let question = existing_question(&app_state, question_id).await?;
    let choices = app_state.store.choices(question.id).await?;

    let flash = take_flash(&session).await?;
    let form = QuestionForm::from_question(&question, &choices);
    render_form(&app_state, &user, &form, Some(question.id), flash)
}

/// POST /admin/polls/question/:question_id/change/
pub async fn change(
    Extension(app_state): Extension<AppState>,
    session: Session,
    uri: Uri,
    Path(question_id): Path<i64>,
    Form(fields): Form<HashMap<String, String>>,
) -> Result<Response> {
    let user = require_admin(&app_state, &session, &uri).await?;
    let question = existing_question(&app_state, question_id).await?;

    let mut form = QuestionForm::from_submission(&fields);
    let Some((draft, changes)) = form.validate() else {
        return Ok(render_form(&app_state, &user, &form, Some(question.id), None)?.into_response());
    };

    let question = app_state
        .store
        .save_question(Some(question.id), &draft, &changes)
        .await?
        .ok_or(PollsError::NotFound)?;
    info!(
        "{} changed question {} ({} choice edits)",
        user.username,
        question.id,
        changes.len()
    );
    publish(&app_state.events, PollEvent::QuestionChanged(question.id));

    let (target, message) = after_save(&fields, &question);
    set_flash(&session, message).await?;
    Ok(Redirect::to(&target).into_response())
}

/// GET /admin/polls/question/:question_id/delete/
pub async fn delete_confirm(
    Extension(app_state): Extension<AppState>,
    session: Session,
    uri: Uri,
    Path(question_id): Path<i64>,
) -> Result<Html<String>> {
    let user = require_admin(&app_state, &session, &uri).await?;
    let question = existing_question(&app_state, question_id).await?;
    let choices = app_state.store.choices(question.id).await?;

    let mut context = admin_context(&user, "Are you sure?", None);
    context.insert("question", &question);
    context.insert("choices", &choices);
    app_state
        .templates
        .render("admin/question_confirm_delete.html", &context)
}

/// POST /admin/polls/question/:question_id/delete/
pub async fn delete(
    Extension(app_state): Extension<AppState>,
    session: Session,
    uri: Uri,
    Path(question_id): Path<i64>,
) -> Result<Redirect> {
    let user = require_admin(&app_state, &session, &uri).await?;
    let question = existing_question(&app_state, question_id).await?;

    if !app_state.store.delete_question(question.id).await? {
        return Err(PollsError::NotFound);
    }
    info!("{} deleted question {}", user.username, question.id);
    publish(&app_state.events, PollEvent::QuestionDeleted(question.id));

    set_flash(
        &session,
        format!("The question “{}” was deleted successfully.", question.question_text),
    )
    .await?;
    Ok(Redirect::to(QUESTION_LIST))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[rstest]
    #[case(None, PubDateFilter::Any)]
    #[case(Some("today"), PubDateFilter::Today)]
    #[case(Some("past_7_days"), PubDateFilter::Past7Days)]
    #[case(Some("bogus"), PubDateFilter::Any)]
    fn filter_parsing(#[case] raw: Option<&str>, #[case] expected: PubDateFilter) {
        assert_eq!(PubDateFilter::parse(raw), expected);
    }

    #[test]
    fn today_window_covers_the_calendar_day() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 15, 30, 0).unwrap();
        assert_eq!(
            PubDateFilter::Today.window(now),
            (Some(at(2026, 10, 19)), Some(at(2026, 10, 20)))
        );
        assert_eq!(
            PubDateFilter::Past7Days.window(now),
            (Some(at(2026, 10, 12)), Some(at(2026, 10, 20)))
        );
    }

    #[test]
    fn december_month_window_rolls_into_next_year() {
        let now = Utc.with_ymd_and_hms(2026, 12, 31, 23, 0, 0).unwrap();
        assert_eq!(
            PubDateFilter::ThisMonth.window(now),
            (Some(at(2026, 12, 1)), Some(at(2027, 1, 1)))
        );
        assert_eq!(
            PubDateFilter::ThisYear.window(now),
            (Some(at(2026, 1, 1)), Some(at(2027, 1, 1)))
        );
        assert_eq!(PubDateFilter::Any.window(now), (None, None));
    }

    #[rstest]
    #[case("_save", "/admin/polls/question/")]
    #[case("_continue", "/admin/polls/question/4/change/")]
    #[case("_addanother", "/admin/polls/question/add/")]
    fn submit_button_picks_the_next_page(#[case] button: &str, #[case] expected: &str) {
        let question = Question {
            id: 4,
            question_text: "Why?".to_string(),
            pub_date: at(2026, 1, 1),
        };
        let fields = HashMap::from([(button.to_string(), "1".to_string())]);
        let (target, message) = after_save(&fields, &question);
        assert_eq!(target, expected);
        assert!(message.starts_with("The question “Why?” was saved successfully."));
    }
}
