use crate::db::connection::DbPool;
use crate::db::models::{ChoiceChange, Question, QuestionDraft, QuestionQuery};
use chrono::{DateTime, Utc};
use sqlx::Error;

const QUESTION_FILTER: &str = "($1::TEXT IS NULL OR question_text ILIKE $1 ESCAPE '\\') \
     AND ($2::TIMESTAMPTZ IS NULL OR pub_date >= $2) \
     AND ($3::TIMESTAMPTZ IS NULL OR pub_date < $3)";

/// Turn free text into an ILIKE containment pattern.
fn like_pattern(search: &str) -> String {
    let escaped = search
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

pub async fn get_published_questions(
    pool: &DbPool,
    now: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<Question>, Error> {
    sqlx::query_as::<_, Question>(
        "SELECT id, question_text, pub_date FROM questions WHERE pub_date <= $1 ORDER BY pub_date DESC, id DESC LIMIT $2",
    )
    .bind(now)
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn get_question(pool: &DbPool, question_id: i64) -> Result<Option<Question>, Error> {
    sqlx::query_as::<_, Question>("SELECT id, question_text, pub_date FROM questions WHERE id = $1")
        .bind(question_id)
        .fetch_optional(pool)
        .await
}

pub async fn list_questions(
    pool: &DbPool,
    query: &QuestionQuery,
) -> Result<(Vec<Question>, i64), Error> {
    let pattern = query.search.as_deref().map(like_pattern);

    let total: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM questions WHERE {}",
        QUESTION_FILTER
    ))
    .bind(pattern.as_deref())
    .bind(query.since)
    .bind(query.until)
    .fetch_one(pool)
    .await?;

    let rows = sqlx::query_as::<_, Question>(&format!(
        "SELECT id, question_text, pub_date FROM questions WHERE {} ORDER BY pub_date DESC, id DESC LIMIT $4 OFFSET $5",
        QUESTION_FILTER
    ))
    .bind(pattern.as_deref())
    .bind(query.since)
    .bind(query.until)
    .bind(query.limit)
    .bind(query.offset)
    .fetch_all(pool)
    .await?;

    Ok((rows, total))
}

/// Insert or update a question and apply its inline choice edits in one transaction.
pub async fn save_question(
    pool: &DbPool,
    question_id: Option<i64>,
    draft: &QuestionDraft,
    changes: &[ChoiceChange],
) -> Result<Option<Question>, Error> {
    let mut tx = pool.begin().await?;

    let saved = match question_id {
        Some(id) => {
            sqlx::query_as::<_, Question>(
                "UPDATE questions SET question_text = $1, pub_date = $2 WHERE id = $3 RETURNING id, question_text, pub_date",
            )
            .bind(&draft.question_text)
            .bind(draft.pub_date)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
        }
        None => Some(
            sqlx::query_as::<_, Question>(
                "INSERT INTO questions (question_text, pub_date) VALUES ($1, $2) RETURNING id, question_text, pub_date",
            )
            .bind(&draft.question_text)
            .bind(draft.pub_date)
            .fetch_one(&mut *tx)
            .await?,
        ),
    };

    let Some(question) = saved else {
        tx.rollback().await?;
        return Ok(None);
    };

    for change in changes {
        match change {
            ChoiceChange::Create { choice_text, votes } => {
                sqlx::query("INSERT INTO choices (question_id, choice_text, votes) VALUES ($1, $2, $3)")
                    .bind(question.id)
                    .bind(choice_text)
                    .bind(votes)
                    .execute(&mut *tx)
                    .await?;
            }
            ChoiceChange::Update {
                id,
                choice_text,
                votes,
            } => {
                sqlx::query(
                    "UPDATE choices SET choice_text = $1, votes = $2 WHERE id = $3 AND question_id = $4",
                )
                .bind(choice_text)
                .bind(votes)
                .bind(id)
                .bind(question.id)
                .execute(&mut *tx)
                .await?;
            }
            ChoiceChange::Delete { id } => {
                sqlx::query("DELETE FROM choices WHERE id = $1 AND question_id = $2")
                    .bind(id)
                    .bind(question.id)
                    .execute(&mut *tx)
                    .await?;
            }
        }
    }

    tx.commit().await?;
    Ok(Some(question))
}

pub async fn delete_question(pool: &DbPool, question_id: i64) -> Result<bool, Error> {
    let result = sqlx::query("DELETE FROM questions WHERE id = $1")
        .bind(question_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
