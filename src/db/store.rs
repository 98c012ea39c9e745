//! The storage seam between request handlers and persistence.

use crate::db::connection::DbPool;
use crate::db::models::{AdminUser, Choice, ChoiceChange, Question, QuestionDraft, QuestionQuery};
use crate::db::repositories;
use crate::error::{PollsError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[async_trait]
pub trait PollStore: Send + Sync {
    /// Questions published at or before `now`, newest first.
    async fn published_questions(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<Question>>;

    async fn question(&self, question_id: i64) -> Result<Option<Question>>;

    /// Choices of a question in creation order.
    async fn choices(&self, question_id: i64) -> Result<Vec<Choice>>;

    /// Add one vote to a choice of the question. `None` if the choice is not one of its choices.
    async fn vote(&self, question_id: i64, choice_id: i64) -> Result<Option<Choice>>;

    /// One page of questions matching the query, plus the total match count.
    async fn list_questions(&self, query: &QuestionQuery) -> Result<(Vec<Question>, i64)>;

    /// Create (`question_id == None`) or update a question together with its choice edits.
    /// `None` if the question to update does not exist.
    async fn save_question(
        &self,
        question_id: Option<i64>,
        draft: &QuestionDraft,
        changes: &[ChoiceChange],
    ) -> Result<Option<Question>>;

    /// Delete a question and its choices.
    async fn delete_question(&self, question_id: i64) -> Result<bool>;

    async fn admin_user(&self, username: &str) -> Result<Option<AdminUser>>;

    async fn admin_user_by_id(&self, user_id: Uuid) -> Result<Option<AdminUser>>;

    async fn create_admin_user(&self, username: &str, password_hash: &str) -> Result<AdminUser>;
}

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgPollStore {
    pool: DbPool,
}

impl PgPollStore {
    pub fn new(pool: DbPool) -> Self {
        PgPollStore { pool }
    }
}

#[async_trait]
impl PollStore for PgPollStore {
    async fn published_questions(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<Question>> {
        Ok(repositories::get_published_questions(&self.pool, now, limit).await?)
    }

    async fn question(&self, question_id: i64) -> Result<Option<Question>> {
        Ok(repositories::get_question(&self.pool, question_id).await?)
    }

    async fn choices(&self, question_id: i64) -> Result<Vec<Choice>> {
        Ok(repositories::get_choices(&self.pool, question_id).await?)
    }

    async fn vote(&self, question_id: i64, choice_id: i64) -> Result<Option<Choice>> {
        Ok(repositories::cast_vote(&self.pool, question_id, choice_id).await?)
    }

    async fn list_questions(&self, query: &QuestionQuery) -> Result<(Vec<Question>, i64)> {
        Ok(repositories::list_questions(&self.pool, query).await?)
    }

    async fn save_question(
        &self,
        question_id: Option<i64>,
        draft: &QuestionDraft,
        changes: &[ChoiceChange],
    ) -> Result<Option<Question>> {
        Ok(repositories::save_question(&self.pool, question_id, draft, changes).await?)
    }

    async fn delete_question(&self, question_id: i64) -> Result<bool> {
        Ok(repositories::delete_question(&self.pool, question_id).await?)
    }

    async fn admin_user(&self, username: &str) -> Result<Option<AdminUser>> {
        Ok(repositories::get_admin_user(&self.pool, username).await?)
    }

    async fn admin_user_by_id(&self, user_id: Uuid) -> Result<Option<AdminUser>> {
        Ok(repositories::get_admin_user_by_id(&self.pool, user_id).await?)
    }

    async fn create_admin_user(&self, username: &str, password_hash: &str) -> Result<AdminUser> {
        match repositories::create_admin_user(&self.pool, username, password_hash).await {
            Ok(user) => Ok(user),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(PollsError::DuplicateAdmin(username.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
