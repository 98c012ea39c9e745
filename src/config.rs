//! Runtime settings: command-line flags with environment fallbacks.
//!
//! A `.env` file is loaded (via `dotenvy`) before parsing, so every setting can
//! live there as well.

use crate::error::ConfigError;
use clap::Args;
use std::net::SocketAddr;

pub const DEFAULT_BIND: &str = "127.0.0.1:8000";

#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// PostgreSQL URL; without one, polls are kept in memory
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Address to listen on
    #[arg(long, env = "POLLS_BIND", default_value = DEFAULT_BIND)]
    pub bind: SocketAddr,

    #[arg(long, env = "POLLS_DB_MAX_CONNECTIONS", default_value_t = 20)]
    pub db_max_connections: u32,

    /// Mark the session cookie `Secure` (enable behind HTTPS)
    #[arg(long, env = "POLLS_SESSION_SECURE", default_value_t = false)]
    pub session_secure: bool,

    /// Idle time before an admin session expires
    #[arg(long, env = "POLLS_SESSION_TTL_SECS", default_value_t = 1_209_600)]
    pub session_ttl_secs: i64,

    /// Number of questions on the index page
    #[arg(long, env = "POLLS_INDEX_LIMIT", default_value_t = 5)]
    pub index_limit: i64,

    /// Staff account created at startup if it does not exist yet
    #[arg(long, env = "POLLS_ADMIN_USERNAME")]
    pub admin_username: Option<String>,

    #[arg(long, env = "POLLS_ADMIN_PASSWORD", hide_env_values = true)]
    pub admin_password: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database_url: None,
            bind: SocketAddr::from(([127, 0, 0, 1], 8000)),
            db_max_connections: 20,
            session_secure: false,
            session_ttl_secs: 1_209_600,
            index_limit: 5,
            admin_username: None,
            admin_password: None,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self
            .database_url
            .as_deref()
            .is_some_and(|url| url.trim().is_empty())
        {
            return Err(ConfigError::Empty {
                name: "DATABASE_URL",
            });
        }
        if self.db_max_connections == 0 {
            return Err(ConfigError::Zero {
                name: "POLLS_DB_MAX_CONNECTIONS",
            });
        }
        if self.session_ttl_secs <= 0 {
            return Err(ConfigError::Zero {
                name: "POLLS_SESSION_TTL_SECS",
            });
        }
        if self.index_limit <= 0 {
            return Err(ConfigError::Zero {
                name: "POLLS_INDEX_LIMIT",
            });
        }
        if self.admin_username.is_some() != self.admin_password.is_some() {
            return Err(ConfigError::PartialAdmin);
        }
        Ok(())
    }

    /// Bootstrap staff credentials, when both halves are configured.
    pub fn bootstrap_admin(&self) -> Option<(&str, &str)> {
        match (&self.admin_username, &self.admin_password) {
            (Some(username), Some(password)) => Some((username.as_str(), password.as_str())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.bind.to_string(), DEFAULT_BIND);
        assert!(settings.bootstrap_admin().is_none());
    }

    #[test]
    fn zero_index_limit_is_rejected() {
        let settings = Settings {
            index_limit: 0,
            ..Settings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::Zero {
                name: "POLLS_INDEX_LIMIT"
            })
        ));
    }

    #[test]
    fn admin_credentials_come_in_pairs() {
        let settings = Settings {
            admin_username: Some("admin".to_string()),
            ..Settings::default()
        };
        assert!(matches!(settings.validate(), Err(ConfigError::PartialAdmin)));

        let settings = Settings {
            admin_password: Some("secret".to_string()),
            ..settings
        };
        assert_eq!(settings.bootstrap_admin(), Some(("admin", "secret")));
    }

    #[test]
    fn blank_database_url_is_rejected() {
        let settings = Settings {
            database_url: Some("  ".to_string()),
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }
}
