use crate::db::models::Tally;
use crate::db::store::PollStore;
use crate::error::PollsError;
use crate::sse::models::PollEvent;
use crate::startup::AppState;
use axum::{
    extract::{Extension, Path},
    response::sse::{Event, KeepAlive, Sse},
};
use chrono::Utc;
use futures::stream::Stream;
use serde_json::json;
use std::{convert::Infallible, time::Duration};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

async fn tally_event(store: &dyn PollStore, question_id: i64) -> Event {
    match store.choices(question_id).await {
        Ok(choices) => Event::default()
            .event("tally")
            .data(json!(Tally::new(question_id, choices)).to_string()),
        Err(e) => {
            warn!("Failed to load tally for question {}: {}", question_id, e);
            Event::default()
                .event("error")
                .data(json!({"error": "Failed to load results"}).to_string())
        }
    }
}

fn closed_event(question_id: i64) -> Event {
    Event::default()
        .event("closed")
        .data(json!({"question_id": question_id}).to_string())
}

/// A lookup failure keeps the stream open; the next tally reports it.
async fn still_published(store: &dyn PollStore, question_id: i64) -> bool {
    match store.question(question_id).await {
        Ok(question) => question.is_some_and(|q| q.is_published(Utc::now())),
        Err(e) => {
            warn!("Failed to reload question {}: {}", question_id, e);
            true
        }
    }
}

/// GET /polls/:question_id/results/stream
pub async fn results_stream(
    Extension(app_state): Extension<AppState>,
    Path(question_id): Path<i64>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, PollsError> {
    let question = app_state
        .store
        .question(question_id)
        .await?
        .filter(|q| q.is_published(Utc::now()))
        .ok_or(PollsError::NotFound)?;

    // subscribe before the first read so no vote falls in between
    let mut rx = app_state.events.subscribe();
    let store = app_state.store.clone();
    let question_id = question.id;

    let stream = async_stream::stream! {
        yield Ok(tally_event(store.as_ref(), question_id).await);

        loop {
            match rx.recv().await {
                Ok(event) if event.question_id() != question_id => continue,
                Ok(PollEvent::QuestionDeleted(_)) => {
                    yield Ok(closed_event(question_id));
                    break;
                }
                Ok(PollEvent::QuestionChanged(_)) => {
                    if !still_published(store.as_ref(), question_id).await {
                        debug!("Question {} is no longer published; closing its stream", question_id);
                        yield Ok(closed_event(question_id));
                        break;
                    }
                    yield Ok(tally_event(store.as_ref(), question_id).await);
                }
                Ok(_) => {
                    yield Ok(tally_event(store.as_ref(), question_id).await);
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!("Results stream for {} lagged by {} events", question_id, skipped);
                    yield Ok(tally_event(store.as_ref(), question_id).await);
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("keep-alive"),
    ))
}
