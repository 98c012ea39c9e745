use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Question {
    pub id: i64,
    pub question_text: String,
    pub pub_date: DateTime<Utc>,
}

impl Question {
    /// Published at or before `now`.
    pub fn is_published(&self, now: DateTime<Utc>) -> bool {
        self.pub_date <= now
    }

    /// Published within the day leading up to `now`. Future questions never count.
    pub fn was_published_recently(&self, now: DateTime<Utc>) -> bool {
        now - Duration::days(1) <= self.pub_date && self.pub_date <= now
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Choice {
    pub id: i64,
    pub question_id: i64,
    pub choice_text: String,
    pub votes: i32,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AdminUser {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// A question's choices with their vote counts.
#[derive(Debug, Clone, Serialize)]
pub struct Tally {
    pub question_id: i64,
    pub choices: Vec<Choice>,
    pub total_votes: i64,
}

impl Tally {
    pub fn new(question_id: i64, choices: Vec<Choice>) -> Self {
        let total_votes = choices.iter().map(|c| i64::from(c.votes)).sum();
        Tally {
            question_id,
            choices,
            total_votes,
        }
    }
}

/// Fields an admin submits for a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionDraft {
    pub question_text: String,
    pub pub_date: DateTime<Utc>,
}

/// One inline choice edit applied together with its question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChoiceChange {
    Create { choice_text: String, votes: i32 },
    Update { id: i64, choice_text: String, votes: i32 },
    Delete { id: i64 },
}

/// Admin list filters and paging.
#[derive(Debug, Clone, Default)]
pub struct QuestionQuery {
    pub search: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: i64,
    pub offset: i64,
}

impl QuestionQuery {
    /// Case-insensitive containment used by the in-memory store; Postgres uses ILIKE.
    pub fn matches(&self, question: &Question) -> bool {
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            if !question.question_text.to_lowercase().contains(&needle) {
                return false;
            }
        }
        if let Some(since) = self.since {
            if question.pub_date < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if question.pub_date >= until {
                return false;
            }
        }
        true
    }
}
