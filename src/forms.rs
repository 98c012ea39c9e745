//! HTML form parsing and validation.
//!
//! Invalid input is never an error response: the handler re-renders the page
//! with the submitted values and the messages collected here.

use crate::db::models::{Choice, ChoiceChange, Question, QuestionDraft};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub const MAX_TEXT_LEN: usize = 200;
pub const EXTRA_CHOICE_FORMS: usize = 3;
/// Upper bound on inline rows accepted from one submission.
pub const MAX_CHOICE_FORMS: usize = 1000;

pub const REQUIRED: &str = "This field is required.";
pub const NO_CHOICE_SELECTED: &str = "You did not select a choice.";

#[derive(Debug, Default, Deserialize)]
pub struct VoteForm {
    pub choice: Option<String>,
}

impl VoteForm {
    pub fn choice_id(&self) -> Option<i64> {
        self.choice.as_deref()?.trim().parse().ok()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub next: Option<String>,
}

/// Only local admin paths are acceptable redirect targets after login.
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path) if path.starts_with("/admin/") && !path.starts_with("//") && !path.contains('\\') => {
            path
        }
        _ => "/admin/",
    }
}

/// One inline choice row of the question form.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChoiceRow {
    pub id: Option<i64>,
    pub choice_text: String,
    pub votes: String,
    pub delete: bool,
    pub errors: Vec<String>,
}

impl ChoiceRow {
    fn blank() -> Self {
        ChoiceRow {
            votes: "0".to_string(),
            ..ChoiceRow::default()
        }
    }

    fn from_choice(choice: &Choice) -> Self {
        ChoiceRow {
            id: Some(choice.id),
            choice_text: choice.choice_text.clone(),
            votes: choice.votes.to_string(),
            ..ChoiceRow::default()
        }
    }

    /// An extra row the user left as rendered.
    fn is_untouched_extra(&self) -> bool {
        self.id.is_none()
            && self.choice_text.trim().is_empty()
            && matches!(self.votes.trim(), "" | "0")
    }

    fn validate(&mut self) -> Option<ChoiceChange> {
        if self.id.is_none() && (self.delete || self.is_untouched_extra()) {
            return None;
        }
        if let (Some(id), true) = (self.id, self.delete) {
            return Some(ChoiceChange::Delete { id });
        }

        let choice_text = self.choice_text.trim().to_string();
        if choice_text.is_empty() {
            self.errors.push(format!("Choice text: {}", REQUIRED));
        } else if choice_text.chars().count() > MAX_TEXT_LEN {
            self.errors.push(too_long("Choice text", &choice_text));
        }

        let votes = match parse_votes(&self.votes) {
            Ok(votes) => votes,
            Err(message) => {
                self.errors.push(format!("Votes: {}", message));
                0
            }
        };

        if !self.errors.is_empty() {
            return None;
        }
        Some(match self.id {
            Some(id) => ChoiceChange::Update {
                id,
                choice_text,
                votes,
            },
            None => ChoiceChange::Create { choice_text, votes },
        })
    }
}

fn parse_votes(raw: &str) -> Result<i32, &'static str> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(0);
    }
    match raw.parse::<i32>() {
        Ok(votes) if votes >= 0 => Ok(votes),
        Ok(_) => Err("Ensure this value is greater than or equal to 0."),
        Err(_) => Err("Enter a whole number."),
    }
}

fn too_long(label: &str, value: &str) -> String {
    format!(
        "{}: Ensure this value has at most {} characters (it has {}).",
        label,
        MAX_TEXT_LEN,
        value.chars().count()
    )
}

/// Admin add/change form for a question and its inline choices.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QuestionForm {
    pub question_text: String,
    pub pub_date_date: String,
    pub pub_date_time: String,
    pub choices: Vec<ChoiceRow>,
    pub errors: BTreeMap<&'static str, Vec<String>>,
}

impl QuestionForm {
    pub fn blank() -> Self {
        QuestionForm {
            choices: (0..EXTRA_CHOICE_FORMS).map(|_| ChoiceRow::blank()).collect(),
            ..QuestionForm::default()
        }
    }

    pub fn from_question(question: &Question, choices: &[Choice]) -> Self {
        let mut rows: Vec<ChoiceRow> = choices.iter().map(ChoiceRow::from_choice).collect();
        rows.extend((0..EXTRA_CHOICE_FORMS).map(|_| ChoiceRow::blank()));
        QuestionForm {
            question_text: question.question_text.clone(),
            pub_date_date: question.pub_date.format("%Y-%m-%d").to_string(),
            pub_date_time: question.pub_date.format("%H:%M:%S").to_string(),
            choices: rows,
            errors: BTreeMap::new(),
        }
    }

    pub fn from_submission(fields: &HashMap<String, String>) -> Self {
        let field = |name: &str| fields.get(name).cloned().unwrap_or_default();

        let total = fields
            .get("choices-TOTAL_FORMS")
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .unwrap_or(0)
            .min(MAX_CHOICE_FORMS);

        let choices = (0..total)
            .map(|i| ChoiceRow {
                id: fields
                    .get(&format!("choices-{i}-id"))
                    .and_then(|raw| raw.trim().parse().ok()),
                choice_text: field(&format!("choices-{i}-choice_text")),
                votes: field(&format!("choices-{i}-votes")),
                delete: fields.contains_key(&format!("choices-{i}-DELETE")),
                errors: Vec::new(),
            })
            .collect();

        QuestionForm {
            question_text: field("question_text"),
            pub_date_date: field("pub_date_date"),
            pub_date_time: field("pub_date_time"),
            choices,
            errors: BTreeMap::new(),
        }
    }

    fn add_error(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.entry(field).or_default().push(message.into());
    }

    /// Validate every field; on success return what to store.
    pub fn validate(&mut self) -> Option<(QuestionDraft, Vec<ChoiceChange>)> {
        self.errors.clear();

        let question_text = self.question_text.trim().to_string();
        if question_text.is_empty() {
            self.add_error("question_text", REQUIRED);
        } else if question_text.chars().count() > MAX_TEXT_LEN {
            let message = too_long("Question text", &question_text);
            self.add_error("question_text", message);
        }

        let pub_date = self.parse_pub_date();

        let mut changes = Vec::new();
        let mut rows_valid = true;
        for row in &mut self.choices {
            row.errors.clear();
            if let Some(change) = row.validate() {
                changes.push(change);
            }
            rows_valid &= row.errors.is_empty();
        }

        match pub_date {
            Some(pub_date) if self.errors.is_empty() && rows_valid => Some((
                QuestionDraft {
                    question_text,
                    pub_date,
                },
                changes,
            )),
            _ => None,
        }
    }

    fn parse_pub_date(&mut self) -> Option<DateTime<Utc>> {
        let date_raw = self.pub_date_date.trim().to_string();
        let time_raw = self.pub_date_time.trim().to_string();

        let date = if date_raw.is_empty() {
            self.add_error("pub_date", format!("Date: {}", REQUIRED));
            None
        } else {
            let parsed = NaiveDate::parse_from_str(&date_raw, "%Y-%m-%d").ok();
            if parsed.is_none() {
                self.add_error("pub_date", "Enter a valid date.");
            }
            parsed
        };

        let time = if time_raw.is_empty() {
            self.add_error("pub_date", format!("Time: {}", REQUIRED));
            None
        } else {
            let parsed = NaiveTime::parse_from_str(&time_raw, "%H:%M:%S")
                .or_else(|_| NaiveTime::parse_from_str(&time_raw, "%H:%M"))
                .ok();
            if parsed.is_none() {
                self.add_error("pub_date", "Enter a valid time.");
            }
            parsed
        };

        Some(date?.and_time(time?).and_utc())
    }
}
