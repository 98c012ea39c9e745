pub mod admin;
pub mod auth;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod forms;
pub mod polls;
pub mod sse;
pub mod startup;
pub mod templates;

pub use error::{PollsError, Result};
pub use startup::{AppState, build_router};
