pub mod admin_user_repository;
pub mod choice_repository;
pub mod question_repository;

pub use admin_user_repository::*;
pub use choice_repository::*;
pub use question_repository::*;
