#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode, header},
};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use polls::config::Settings;
use polls::db::{Choice, ChoiceChange, InMemoryPollStore, PollStore, Question, QuestionDraft};
use polls::startup::SESSION_COOKIE;
use polls::{AppState, build_router};
use std::sync::Arc;
use tower::ServiceExt;
use tower_sessions::MemoryStore;

pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "correct horse";

pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryPollStore>,
    pub state: AppState,
}

pub fn test_app() -> TestApp {
    let store = Arc::new(InMemoryPollStore::new());
    let state = AppState::new(store.clone(), Settings::default()).unwrap();
    let router = build_router(state.clone(), MemoryStore::default());
    TestApp {
        router,
        store,
        state,
    }
}

impl TestApp {
    /// A question published `days` from now (negative for the past).
    pub async fn create_question(&self, question_text: &str, days: i64) -> Question {
        let draft = QuestionDraft {
            question_text: question_text.to_string(),
            pub_date: Utc::now() + Duration::days(days),
        };
        self.store
            .save_question(None, &draft, &[])
            .await
            .unwrap()
            .unwrap()
    }

    pub async fn create_choice(&self, question: &Question, choice_text: &str) -> Choice {
        let draft = QuestionDraft {
            question_text: question.question_text.clone(),
            pub_date: question.pub_date,
        };
        let change = ChoiceChange::Create {
            choice_text: choice_text.to_string(),
            votes: 0,
        };
        self.store
            .save_question(Some(question.id), &draft, &[change])
            .await
            .unwrap()
            .unwrap();
        self.store
            .choices(question.id)
            .await
            .unwrap()
            .pop()
            .unwrap()
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn post_form(&self, uri: &str, body: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    /// Create the staff account and log in; returns the session cookie.
    pub async fn login(&self) -> String {
        let hash = bcrypt::hash(ADMIN_PASSWORD, 4).unwrap();
        self.store
            .create_admin_user(ADMIN_USERNAME, &hash)
            .await
            .unwrap();

        let body = format!("username={}&password=correct+horse", ADMIN_USERNAME);
        let response = self.post_form("/admin/login/", &body, None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        session_cookie(&response).expect("login sets the session cookie")
    }
}

pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with(SESSION_COOKIE))
        .and_then(|value| value.split(';').next())
        .map(str::to_string)
}

pub fn location(response: &Response<Body>) -> &str {
    response.headers()[header::LOCATION].to_str().unwrap()
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}
