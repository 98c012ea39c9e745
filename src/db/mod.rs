pub mod connection;
pub mod memory;
pub mod models;
pub mod repositories;
pub mod store;

pub use connection::*;
pub use memory::InMemoryPollStore;
pub use models::*;
pub use store::{PgPollStore, PollStore};
