//! Live tallies over server-sent events.

mod common;

use axum::body::Body;
use axum::http::{Response, StatusCode, header};
use chrono::{DateTime, Utc};
use common::{location, test_app};
use http_body_util::BodyExt;
use polls::db::PollStore;
use polls::sse::{EVENT_CAPACITY, PollEvent, publish};
use std::time::Duration;

async fn next_event(body: &mut Body) -> String {
    let frame = tokio::time::timeout(Duration::from_secs(5), body.frame())
        .await
        .expect("an event within five seconds")
        .expect("the stream is still open")
        .unwrap();
    String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap()
}

fn into_body(response: Response<Body>) -> Body {
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");
    response.into_body()
}

#[tokio::test]
async fn stream_starts_with_the_current_tally() {
    let app = test_app();
    let question = app.create_question("Streamed?", -1).await;
    app.create_choice(&question, "Yes").await;

    let response = app
        .get(&format!("/polls/{}/results/stream", question.id), None)
        .await;
    let mut body = into_body(response);

    let event = next_event(&mut body).await;
    assert!(event.starts_with("event: tally"));
    assert!(event.contains("\"choice_text\":\"Yes\""));
    assert!(event.contains("\"total_votes\":0"));
}

#[tokio::test]
async fn votes_are_pushed_to_the_stream() {
    let app = test_app();
    let question = app.create_question("Live?", -1).await;
    let choice = app.create_choice(&question, "Yes").await;

    let response = app
        .get(&format!("/polls/{}/results/stream", question.id), None)
        .await;
    let mut body = into_body(response);
    next_event(&mut body).await;

    let vote = app
        .post_form(
            &format!("/polls/{}/vote/", question.id),
            &format!("choice={}", choice.id),
            None,
        )
        .await;
    assert_eq!(vote.status(), StatusCode::SEE_OTHER);

    let event = next_event(&mut body).await;
    assert!(event.starts_with("event: tally"));
    assert!(event.contains("\"votes\":1"));
    assert!(event.contains("\"total_votes\":1"));
}

fn change_body(question_text: &str, pub_date: DateTime<Utc>, choice_id: i64, choice_text: &str) -> String {
    format!(
        "question_text={}&pub_date_date={}&pub_date_time={}\
         &choices-TOTAL_FORMS=1&choices-0-id={}&choices-0-choice_text={}&choices-0-votes=0&_save=Save",
        question_text.replace(' ', "+"),
        pub_date.format("%Y-%m-%d"),
        pub_date.format("%H:%M:%S"),
        choice_id,
        choice_text.replace(' ', "+"),
    )
}

#[tokio::test]
async fn admin_edits_push_a_fresh_tally() {
    let app = test_app();
    let cookie = app.login().await;
    let question = app.create_question("Edited live?", -1).await;
    let choice = app.create_choice(&question, "Old text").await;

    let response = app
        .get(&format!("/polls/{}/results/stream", question.id), None)
        .await;
    let mut body = into_body(response);
    assert!(next_event(&mut body).await.contains("Old text"));

    let saved = app
        .post_form(
            &format!("/admin/polls/question/{}/change/", question.id),
            &change_body("Edited live?", question.pub_date, choice.id, "New text"),
            Some(&cookie),
        )
        .await;
    assert_eq!(saved.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&saved), "/admin/polls/question/");

    let event = next_event(&mut body).await;
    assert!(event.starts_with("event: tally"));
    assert!(event.contains("\"choice_text\":\"New text\""));
}

#[tokio::test]
async fn unpublishing_the_question_closes_the_stream() {
    let app = test_app();
    let cookie = app.login().await;
    let question = app.create_question("Pulled?", -1).await;
    let choice = app.create_choice(&question, "Yes").await;

    let response = app
        .get(&format!("/polls/{}/results/stream", question.id), None)
        .await;
    let mut body = into_body(response);
    next_event(&mut body).await;

    let later = Utc::now() + chrono::Duration::days(3);
    let saved = app
        .post_form(
            &format!("/admin/polls/question/{}/change/", question.id),
            &change_body("Pulled?", later, choice.id, "Yes"),
            Some(&cookie),
        )
        .await;
    assert_eq!(saved.status(), StatusCode::SEE_OTHER);

    let event = next_event(&mut body).await;
    assert!(event.starts_with("event: closed"));
}

#[tokio::test]
async fn lagging_subscriber_gets_a_full_tally() {
    let app = test_app();
    let question = app.create_question("Busy?", -1).await;
    let choice = app.create_choice(&question, "Yes").await;

    let response = app
        .get(&format!("/polls/{}/results/stream", question.id), None)
        .await;
    let mut body = into_body(response);
    assert!(next_event(&mut body).await.contains("\"total_votes\":0"));

    let burst = EVENT_CAPACITY + 50;
    for _ in 0..burst {
        let voted = app
            .store
            .vote(question.id, choice.id)
            .await
            .unwrap()
            .unwrap();
        publish(
            &app.state.events,
            PollEvent::VoteCast {
                question_id: question.id,
                choice_id: choice.id,
                votes: voted.votes,
            },
        );
    }

    let event = next_event(&mut body).await;
    assert!(event.starts_with("event: tally"));
    assert!(event.contains(&format!("\"total_votes\":{}", burst)));
}

#[tokio::test]
async fn deleting_the_question_closes_the_stream() {
    let app = test_app();
    let cookie = app.login().await;
    let question = app.create_question("Short lived?", -1).await;

    let response = app
        .get(&format!("/polls/{}/results/stream", question.id), None)
        .await;
    let mut body = into_body(response);
    next_event(&mut body).await;

    app.post_form(
        &format!("/admin/polls/question/{}/delete/", question.id),
        "",
        Some(&cookie),
    )
    .await;

    let event = next_event(&mut body).await;
    assert!(event.starts_with("event: closed"));
}

#[tokio::test]
async fn stream_for_missing_or_future_question_is_404() {
    let app = test_app();
    let future = app.create_question("Later?", 3).await;

    let response = app.get("/polls/42/results/stream", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .get(&format!("/polls/{}/results/stream", future.id), None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
