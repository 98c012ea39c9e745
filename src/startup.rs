use crate::admin;
use crate::auth;
use crate::config::Settings;
use crate::db::connection::{DbPool, get_pool_stats, init_db};
use crate::db::{InMemoryPollStore, PgPollStore, PollStore};
use crate::error::{Result, handler_404};
use crate::polls;
use crate::sse::{self, EventSender, create_event_broadcaster};
use crate::templates::Templates;
use axum::{
    Router,
    extract::Extension,
    response::Redirect,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::time::{Duration, interval};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tower_sessions::{
    Expiry, ExpiredDeletion, MemoryStore, SessionManagerLayer, SessionStore,
    cookie::{SameSite, time::Duration as CookieDuration},
};
use tower_sessions_sqlx_store::PostgresStore;
use tracing::{debug, error, info, warn};

pub const SESSION_COOKIE: &str = "polls_session";

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PollStore>,
    pub templates: Arc<Templates>,
    pub events: EventSender,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(store: Arc<dyn PollStore>, settings: Settings) -> Result<Self> {
        Ok(AppState {
            store,
            templates: Arc::new(Templates::new()?),
            events: create_event_broadcaster(),
            settings: Arc::new(settings),
        })
    }

    /// Create the bootstrap staff account from settings, if one is configured.
    pub async fn bootstrap_admin(&self) -> Result<()> {
        if let Some((username, password)) = self.settings.bootstrap_admin() {
            auth::ensure_admin(self.store.as_ref(), username, password).await?;
        }
        Ok(())
    }
}

pub fn build_router<S>(app_state: AppState, session_store: S) -> Router
where
    S: SessionStore + Clone,
{
    let session_layer = SessionManagerLayer::new(session_store)
        .with_name(SESSION_COOKIE)
        .with_same_site(SameSite::Lax)
        .with_secure(app_state.settings.session_secure)
        .with_expiry(Expiry::OnInactivity(CookieDuration::seconds(
            app_state.settings.session_ttl_secs,
        )));

    Router::new()
        .route("/", get(|| async { Redirect::to("/polls/") }))
        .route("/polls/", get(polls::index))
        .route("/polls/:question_id/", get(polls::detail))
        .route("/polls/:question_id/vote/", post(polls::vote))
        .route("/polls/:question_id/results/", get(polls::results))
        .route(
            "/polls/:question_id/results/stream",
            get(sse::results_stream),
        )
        .route("/static/polls/style.css", get(polls::stylesheet))
        .route("/admin/", get(admin::home))
        .route("/admin/login/", get(auth::login_page).post(auth::login))
        .route("/admin/logout/", post(auth::logout))
        .route("/admin/polls/question/", get(admin::question_list))
        .route(
            "/admin/polls/question/add/",
            get(admin::add_form).post(admin::add),
        )
        .route(
            "/admin/polls/question/:question_id/change/",
            get(admin::change_form).post(admin::change),
        )
        .route(
            "/admin/polls/question/:question_id/delete/",
            get(admin::delete_confirm).post(admin::delete),
        )
        .fallback(handler_404)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(session_layer)
                .layer(Extension(app_state)),
        )
}

/// Probe the pool once a minute so a dead database shows up in the logs.
fn spawn_pool_health_check(pool: DbPool) {
    tokio::spawn(async move {
        let mut interval = interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            match pool.acquire().await {
                Ok(conn) => {
                    drop(conn);
                    debug!("{}", get_pool_stats(&pool));
                }
                Err(e) => {
                    error!("Database connection health check failed: {}", e);
                }
            }
        }
    });
}

/// Build the application for the configured backend and serve it until ctrl-c.
pub async fn serve(settings: Settings) -> anyhow::Result<()> {
    let bind = settings.bind;

    let app = match settings.database_url.clone() {
        Some(database_url) => {
            let pool = init_db(&database_url, settings.db_max_connections).await?;
            info!("Connected to database; {}", get_pool_stats(&pool));

            let session_store = PostgresStore::new(pool.clone());
            session_store.migrate().await?;
            tokio::spawn(
                session_store
                    .clone()
                    .continuously_delete_expired(Duration::from_secs(60)),
            );
            spawn_pool_health_check(pool.clone());

            let app_state = AppState::new(Arc::new(PgPollStore::new(pool)), settings)?;
            app_state.bootstrap_admin().await?;
            build_router(app_state, session_store)
        }
        None => {
            warn!("DATABASE_URL is not set; polls are kept in memory and lost on exit");
            let app_state = AppState::new(Arc::new(InMemoryPollStore::new()), settings)?;
            app_state.bootstrap_admin().await?;
            build_router(app_state, MemoryStore::default())
        }
    };

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("listening on http://{bind}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
