use crate::auth;
use crate::config::Settings;
use crate::db::connection::init_db;
use crate::db::PgPollStore;
use crate::startup;
use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tower_sessions_sqlx_store::PostgresStore;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "polls", version, about = "A small polls site with a staff admin")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub settings: Settings,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the web server (default)
    Serve,
    /// Create the database tables
    Migrate,
    /// Create a staff account for the admin site
    CreateAdmin {
        #[arg(long)]
        username: String,
        #[arg(long, env = "POLLS_NEW_ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    cli.settings.validate()?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => startup::serve(cli.settings).await,
        Command::Migrate => cmd_migrate(&cli.settings).await,
        Command::CreateAdmin { username, password } => {
            cmd_create_admin(&cli.settings, &username, &password).await
        }
    }
}

fn database_url(settings: &Settings) -> anyhow::Result<&str> {
    match settings.database_url.as_deref() {
        Some(url) => Ok(url),
        None => bail!("DATABASE_URL is required; the in-memory store does not outlive the process"),
    }
}

async fn cmd_migrate(settings: &Settings) -> anyhow::Result<()> {
    let pool = init_db(database_url(settings)?, settings.db_max_connections)
        .await
        .context("failed to create the polls tables")?;
    PostgresStore::new(pool)
        .migrate()
        .await
        .context("failed to create the session table")?;
    info!("Database schema is up to date");
    Ok(())
}

async fn cmd_create_admin(settings: &Settings, username: &str, password: &str) -> anyhow::Result<()> {
    let pool = init_db(database_url(settings)?, settings.db_max_connections).await?;
    let store = PgPollStore::new(pool);
    let user = auth::create_admin(&store, username, password).await?;
    println!("Admin user {} created", user.username);
    Ok(())
}
