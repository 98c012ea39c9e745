//! In-process store used when no database is configured, and by the test suite.

use crate::db::models::{AdminUser, Choice, ChoiceChange, Question, QuestionDraft, QuestionQuery};
use crate::db::store::PollStore;
use crate::error::{PollsError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    questions: BTreeMap<i64, Question>,
    choices: BTreeMap<i64, Choice>,
    admins: HashMap<String, AdminUser>,
    last_question_id: i64,
    last_choice_id: i64,
}

impl Tables {
    fn insert_choice(&mut self, question_id: i64, choice_text: &str, votes: i32) -> Choice {
        self.last_choice_id += 1;
        let choice = Choice {
            id: self.last_choice_id,
            question_id,
            choice_text: choice_text.to_string(),
            votes,
        };
        self.choices.insert(choice.id, choice.clone());
        choice
    }
}

#[derive(Default)]
pub struct InMemoryPollStore {
    tables: RwLock<Tables>,
}

impl InMemoryPollStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(a: &Question, b: &Question) -> std::cmp::Ordering {
    b.pub_date.cmp(&a.pub_date).then(b.id.cmp(&a.id))
}

#[async_trait]
impl PollStore for InMemoryPollStore {
    async fn published_questions(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<Question>> {
        let tables = self.tables.read().await;
        let mut questions: Vec<Question> = tables
            .questions
            .values()
            .filter(|q| q.is_published(now))
            .cloned()
            .collect();
        questions.sort_by(newest_first);
        questions.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(questions)
    }

    async fn question(&self, question_id: i64) -> Result<Option<Question>> {
        Ok(self.tables.read().await.questions.get(&question_id).cloned())
    }

    async fn choices(&self, question_id: i64) -> Result<Vec<Choice>> {
        let tables = self.tables.read().await;
        Ok(tables
            .choices
            .values()
            .filter(|c| c.question_id == question_id)
            .cloned()
            .collect())
    }

    async fn vote(&self, question_id: i64, choice_id: i64) -> Result<Option<Choice>> {
        let mut tables = self.tables.write().await;
        match tables.choices.get_mut(&choice_id) {
            Some(choice) if choice.question_id == question_id => {
                choice.votes = choice.votes.saturating_add(1);
                Ok(Some(choice.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn list_questions(&self, query: &QuestionQuery) -> Result<(Vec<Question>, i64)> {
        let tables = self.tables.read().await;
        let mut matching: Vec<Question> = tables
            .questions
            .values()
            .filter(|q| query.matches(q))
            .cloned()
            .collect();
        matching.sort_by(newest_first);

        let total = matching.len() as i64;
        let offset = usize::try_from(query.offset).unwrap_or(0);
        let limit = usize::try_from(query.limit).unwrap_or(0);
        let page = matching.into_iter().skip(offset).take(limit).collect();
        Ok((page, total))
    }

    async fn save_question(
        &self,
        question_id: Option<i64>,
        draft: &QuestionDraft,
        changes: &[ChoiceChange],
    ) -> Result<Option<Question>> {
        let mut tables = self.tables.write().await;

        let id = match question_id {
            Some(id) if tables.questions.contains_key(&id) => id,
            Some(_) => return Ok(None),
            None => {
                tables.last_question_id += 1;
                tables.last_question_id
            }
        };
        let question = Question {
            id,
            question_text: draft.question_text.clone(),
            pub_date: draft.pub_date,
        };
        tables.questions.insert(id, question.clone());

        for change in changes {
            match change {
                ChoiceChange::Create { choice_text, votes } => {
                    tables.insert_choice(id, choice_text, *votes);
                }
                ChoiceChange::Update {
                    id: choice_id,
                    choice_text,
                    votes,
                } => {
                    if let Some(choice) = tables.choices.get_mut(choice_id) {
                        if choice.question_id == id {
                            choice.choice_text = choice_text.clone();
                            choice.votes = *votes;
                        }
                    }
                }
                ChoiceChange::Delete { id: choice_id } => {
                    if tables
                        .choices
                        .get(choice_id)
                        .is_some_and(|c| c.question_id == id)
                    {
                        tables.choices.remove(choice_id);
                    }
                }
            }
        }

        Ok(Some(question))
    }

    async fn delete_question(&self, question_id: i64) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if tables.questions.remove(&question_id).is_none() {
            return Ok(false);
        }
        tables.choices.retain(|_, c| c.question_id != question_id);
        Ok(true)
    }

    async fn admin_user(&self, username: &str) -> Result<Option<AdminUser>> {
        Ok(self.tables.read().await.admins.get(username).cloned())
    }

    async fn admin_user_by_id(&self, user_id: Uuid) -> Result<Option<AdminUser>> {
        let tables = self.tables.read().await;
        Ok(tables.admins.values().find(|u| u.id == user_id).cloned())
    }

    async fn create_admin_user(&self, username: &str, password_hash: &str) -> Result<AdminUser> {
        let mut tables = self.tables.write().await;
        if tables.admins.contains_key(username) {
            return Err(PollsError::DuplicateAdmin(username.to_string()));
        }
        let user = AdminUser {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
        };
        tables.admins.insert(username.to_string(), user.clone());
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn draft(text: &str, days: i64) -> QuestionDraft {
        QuestionDraft {
            question_text: text.to_string(),
            pub_date: Utc::now() + Duration::days(days),
        }
    }

    fn create(text: &str) -> ChoiceChange {
        ChoiceChange::Create {
            choice_text: text.to_string(),
            votes: 0,
        }
    }

    #[tokio::test]
    async fn published_questions_skip_future_and_sort_newest_first() {
        let store = InMemoryPollStore::new();
        store.save_question(None, &draft("Old", -30), &[]).await.unwrap();
        store.save_question(None, &draft("Future", 30), &[]).await.unwrap();
        store.save_question(None, &draft("Recent", -5), &[]).await.unwrap();

        let texts: Vec<String> = store
            .published_questions(Utc::now(), 5)
            .await
            .unwrap()
            .into_iter()
            .map(|q| q.question_text)
            .collect();
        assert_eq!(texts, vec!["Recent", "Old"]);

        let limited = store.published_questions(Utc::now(), 1).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn vote_is_scoped_to_the_question() {
        let store = InMemoryPollStore::new();
        let first = store
            .save_question(None, &draft("First", -1), &[create("Yes")])
            .await
            .unwrap()
            .unwrap();
        let second = store
            .save_question(None, &draft("Second", -1), &[create("No")])
            .await
            .unwrap()
            .unwrap();
        let foreign = store.choices(second.id).await.unwrap()[0].id;

        assert_eq!(store.vote(first.id, foreign).await.unwrap(), None);

        let own = store.choices(first.id).await.unwrap()[0].id;
        let voted = store.vote(first.id, own).await.unwrap().unwrap();
        assert_eq!(voted.votes, 1);
        assert_eq!(store.choices(second.id).await.unwrap()[0].votes, 0);
    }

    #[tokio::test]
    async fn save_question_applies_choice_changes() {
        let store = InMemoryPollStore::new();
        let question = store
            .save_question(None, &draft("Colour?", -1), &[create("Red"), create("Blue")])
            .await
            .unwrap()
            .unwrap();
        let choices = store.choices(question.id).await.unwrap();

        let changes = vec![
            ChoiceChange::Update {
                id: choices[0].id,
                choice_text: "Crimson".to_string(),
                votes: 4,
            },
            ChoiceChange::Delete { id: choices[1].id },
            create("Green"),
        ];
        store
            .save_question(Some(question.id), &draft("Colour!", -1), &changes)
            .await
            .unwrap()
            .unwrap();

        let after = store.choices(question.id).await.unwrap();
        let texts: Vec<&str> = after.iter().map(|c| c.choice_text.as_str()).collect();
        assert_eq!(texts, vec!["Crimson", "Green"]);
        assert_eq!(after[0].votes, 4);
        assert_eq!(
            store.question(question.id).await.unwrap().unwrap().question_text,
            "Colour!"
        );
    }

    #[tokio::test]
    async fn saving_a_missing_question_returns_none() {
        let store = InMemoryPollStore::new();
        let saved = store.save_question(Some(42), &draft("Ghost", -1), &[]).await.unwrap();
        assert!(saved.is_none());
    }

    #[tokio::test]
    async fn deleting_a_question_cascades_to_choices() {
        let store = InMemoryPollStore::new();
        let question = store
            .save_question(None, &draft("Gone?", -1), &[create("Yes")])
            .await
            .unwrap()
            .unwrap();

        assert!(store.delete_question(question.id).await.unwrap());
        assert!(store.choices(question.id).await.unwrap().is_empty());
        assert!(!store.delete_question(question.id).await.unwrap());
    }

    #[tokio::test]
    async fn list_questions_pages_and_counts() {
        let store = InMemoryPollStore::new();
        for day in 1..=3 {
            store
                .save_question(None, &draft(&format!("Question {day}"), -day), &[])
                .await
                .unwrap();
        }
        let query = QuestionQuery {
            limit: 2,
            offset: 2,
            ..QuestionQuery::default()
        };
        let (page, total) = store.list_questions(&query).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].question_text, "Question 3");
    }

    #[tokio::test]
    async fn duplicate_admin_is_rejected() {
        let store = InMemoryPollStore::new();
        let user = store.create_admin_user("admin", "hash").await.unwrap();
        assert!(matches!(
            store.create_admin_user("admin", "other").await,
            Err(PollsError::DuplicateAdmin(_))
        ));
        assert_eq!(
            store.admin_user_by_id(user.id).await.unwrap().unwrap().username,
            "admin"
        );
    }
}
