use crate::db::models::AdminUser;
use crate::db::store::PollStore;
use crate::error::{PollsError, Result};
use crate::forms::{LoginForm, safe_next};
use crate::startup::AppState;
use axum::{
    extract::{Extension, Form, Query},
    http::Uri,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tera::Context;
use tower_sessions::Session;
use tracing::{info, warn};
use uuid::Uuid;

const ADMIN_USER_KEY: &str = "admin_user_id";
const FLASH_KEY: &str = "admin_flash";
const MAX_USERNAME_LEN: usize = 150;

pub const LOGIN_FAILED: &str = "Please enter the correct username and password for a staff account. \
                                Note that both fields may be case-sensitive.";

pub async fn hash_password(password: String, cost: u32) -> Result<String> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| PollsError::PasswordHash(e.to_string()))?
        .map_err(PollsError::from)
}

async fn verify_password(password: String, hash: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| PollsError::PasswordHash(e.to_string()))?
        .map_err(PollsError::from)
}

/// Create a staff account with a bcrypt-hashed password.
pub async fn create_admin(store: &dyn PollStore, username: &str, password: &str) -> Result<AdminUser> {
    let username = username.trim();
    if username.is_empty() || username.chars().count() > MAX_USERNAME_LEN || password.is_empty() {
        return Err(PollsError::InvalidAdmin(
            "username must be 1-150 characters and password non-empty".to_string(),
        ));
    }
    let hash = hash_password(password.to_string(), bcrypt::DEFAULT_COST).await?;
    let user = store.create_admin_user(username, &hash).await?;
    info!("Created admin user {}", user.username);
    Ok(user)
}

/// Create the configured bootstrap account unless it already exists.
pub async fn ensure_admin(store: &dyn PollStore, username: &str, password: &str) -> Result<()> {
    if store.admin_user(username.trim()).await?.is_some() {
        return Ok(());
    }
    match create_admin(store, username, password).await {
        Ok(_) | Err(PollsError::DuplicateAdmin(_)) => Ok(()),
        Err(e) => Err(e),
    }
}

pub async fn current_admin(app_state: &AppState, session: &Session) -> Result<Option<AdminUser>> {
    let Some(user_id) = session.get::<Uuid>(ADMIN_USER_KEY).await? else {
        return Ok(None);
    };
    Ok(app_state.store.admin_user_by_id(user_id).await?)
}

/// The logged-in admin, or a redirect to the login page that comes back to `uri`.
pub async fn require_admin(app_state: &AppState, session: &Session, uri: &Uri) -> Result<AdminUser> {
    current_admin(app_state, session).await?.ok_or_else(|| {
        let next = uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/admin/".to_string());
        PollsError::LoginRequired(next)
    })
}

pub async fn set_flash(session: &Session, message: String) -> Result<()> {
    session.insert(FLASH_KEY, message).await?;
    Ok(())
}

pub async fn take_flash(session: &Session) -> Result<Option<String>> {
    Ok(session.remove::<String>(FLASH_KEY).await?)
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    pub next: Option<String>,
}

fn login_context(username: &str, next: &str, error: Option<&str>) -> Context {
    let mut context = Context::new();
    context.insert("title", "Log in");
    context.insert("username", "");
    context.insert("login_username", username);
    context.insert("next", next);
    context.insert("error_message", &error);
    context.insert("flash", &None::<String>);
    context
}

/// GET /admin/login/
pub async fn login_page(
    Extension(app_state): Extension<AppState>,
    session: Session,
    Query(query): Query<LoginQuery>,
) -> Result<Response> {
    let next = safe_next(query.next.as_deref());
    if current_admin(&app_state, &session).await?.is_some() {
        return Ok(Redirect::to(next).into_response());
    }
    let page = app_state
        .templates
        .render("admin/login.html", &login_context("", next, None))?;
    Ok(page.into_response())
}

/// POST /admin/login/
pub async fn login(
    Extension(app_state): Extension<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    let next = safe_next(form.next.as_deref()).to_string();
    let username = form.username.trim();

    let user = app_state.store.admin_user(username).await?;
    let verified = match &user {
        Some(user) => verify_password(form.password, user.password_hash.clone()).await?,
        None => false,
    };
    let Some(user) = user.filter(|_| verified) else {
        warn!("Failed admin login for {:?}", username);
        let page = app_state.templates.render(
            "admin/login.html",
            &login_context(username, &next, Some(LOGIN_FAILED)),
        )?;
        return Ok(page.into_response());
    };

    session.cycle_id().await?;
    session.insert(ADMIN_USER_KEY, user.id).await?;
    info!("Admin {} logged in", user.username);

    Ok(Redirect::to(&next).into_response())
}

/// POST /admin/logout/
pub async fn logout(session: Session) -> Result<Redirect> {
    session.flush().await?;
    Ok(Redirect::to("/admin/login/"))
}
