use crate::templates;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use tera::Context;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum PollsError {
    #[error("Not found")]
    NotFound,
    #[error("Login required for {0}")]
    LoginRequired(String),
    #[error("Admin user {0:?} already exists")]
    DuplicateAdmin(String),
    #[error("Invalid admin account: {0}")]
    InvalidAdmin(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Template error: {0}")]
    Template(String),
    #[error("Session error: {0}")]
    Session(String),
    #[error("Password hashing error: {0}")]
    PasswordHash(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{name} must not be empty")]
    Empty { name: &'static str },
    #[error("{name} must be greater than zero")]
    Zero { name: &'static str },
    #[error("POLLS_ADMIN_USERNAME and POLLS_ADMIN_PASSWORD must be set together")]
    PartialAdmin,
}

pub type Result<T, E = PollsError> = std::result::Result<T, E>;

/// Characters left as-is in the `next` query value.
const NEXT_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

fn error_page(status: StatusCode, title: &str, detail: &str) -> Response {
    let mut context = Context::new();
    context.insert("title", title);
    context.insert("detail", detail);
    match templates::render_error("error.html", &context) {
        Ok(page) => (status, page).into_response(),
        Err(e) => {
            error!("failed to render error page: {}", e);
            (status, title.to_string()).into_response()
        }
    }
}

pub async fn handler_404() -> Response {
    PollsError::NotFound.into_response()
}

impl IntoResponse for PollsError {
    fn into_response(self) -> Response {
        match &self {
            PollsError::NotFound => error_page(
                StatusCode::NOT_FOUND,
                "Not Found",
                "The requested resource was not found on this server.",
            ),
            PollsError::LoginRequired(next) => {
                let target = format!("/admin/login/?next={}", utf8_percent_encode(next, NEXT_VALUE));
                Redirect::to(&target).into_response()
            }
            PollsError::DuplicateAdmin(_) => {
                error_page(StatusCode::CONFLICT, "Conflict", "That username is taken.")
            }
            PollsError::InvalidAdmin(_) => {
                error_page(StatusCode::BAD_REQUEST, "Bad Request", "Invalid admin account.")
            }
            PollsError::Database(_)
            | PollsError::Template(_)
            | PollsError::Session(_)
            | PollsError::PasswordHash(_) => {
                error!("request failed: {}", self);
                error_page(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Server Error (500)",
                    "Something went wrong on our side.",
                )
            }
        }
    }
}

impl From<sqlx::Error> for PollsError {
    fn from(error: sqlx::Error) -> Self {
        PollsError::Database(error.to_string())
    }
}

impl From<tera::Error> for PollsError {
    fn from(error: tera::Error) -> Self {
        // tera hides the useful part in the source chain
        let mut message = error.to_string();
        let mut source = std::error::Error::source(&error);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        PollsError::Template(message)
    }
}

impl From<tower_sessions::session::Error> for PollsError {
    fn from(error: tower_sessions::session::Error) -> Self {
        PollsError::Session(error.to_string())
    }
}

impl From<bcrypt::BcryptError> for PollsError {
    fn from(error: bcrypt::BcryptError) -> Self {
        PollsError::PasswordHash(error.to_string())
    }
}
