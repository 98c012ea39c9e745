use crate::db::connection::DbPool;
use crate::db::models::Choice;
use sqlx::Error;

pub async fn get_choices(pool: &DbPool, question_id: i64) -> Result<Vec<Choice>, Error> {
    sqlx::query_as::<_, Choice>(
        "SELECT id, question_id, choice_text, votes FROM choices WHERE question_id = $1 ORDER BY id",
    )
    .bind(question_id)
    .fetch_all(pool)
    .await
}

/// Count one vote. `None` when the choice does not belong to the question.
pub async fn cast_vote(
    pool: &DbPool,
    question_id: i64,
    choice_id: i64,
) -> Result<Option<Choice>, Error> {
    sqlx::query_as::<_, Choice>(
        "UPDATE choices SET votes = votes + 1 WHERE id = $1 AND question_id = $2 RETURNING id, question_id, choice_text, votes",
    )
    .bind(choice_id)
    .bind(question_id)
    .fetch_optional(pool)
    .await
}
