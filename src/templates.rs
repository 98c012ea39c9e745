//! Template rendering with the Tera engine.
//!
//! Templates are compiled into the binary and parsed once at startup. Names
//! ending in `.html` are auto-escaped.

use crate::error::{PollsError, Result};
use axum::response::Html;
use chrono::{DateTime, Utc};
use std::sync::LazyLock;
use tera::{Context, Tera};

const TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("../templates/base.html")),
    ("error.html", include_str!("../templates/error.html")),
    ("polls/index.html", include_str!("../templates/polls/index.html")),
    ("polls/detail.html", include_str!("../templates/polls/detail.html")),
    ("polls/results.html", include_str!("../templates/polls/results.html")),
    ("admin/base.html", include_str!("../templates/admin/base.html")),
    ("admin/login.html", include_str!("../templates/admin/login.html")),
    (
        "admin/question_list.html",
        include_str!("../templates/admin/question_list.html"),
    ),
    (
        "admin/question_form.html",
        include_str!("../templates/admin/question_form.html"),
    ),
    (
        "admin/question_confirm_delete.html",
        include_str!("../templates/admin/question_confirm_delete.html"),
    ),
];

pub const STYLESHEET: &str = include_str!("../static/polls/style.css");

pub struct Templates {
    tera: Tera,
}

impl Templates {
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(TEMPLATES.iter().copied())?;
        Ok(Templates { tera })
    }

    pub fn render(&self, name: &str, context: &Context) -> Result<Html<String>> {
        Ok(Html(self.tera.render(name, context)?))
    }
}

/// Templates for error responses, which are built without access to `AppState`.
static ERROR_TEMPLATES: LazyLock<std::result::Result<Templates, String>> =
    LazyLock::new(|| Templates::new().map_err(|e| e.to_string()));

pub fn render_error(name: &str, context: &Context) -> Result<Html<String>> {
    match &*ERROR_TEMPLATES {
        Ok(templates) => templates.render(name, context),
        Err(message) => Err(PollsError::Template(message.clone())),
    }
}

/// Timestamp as shown on every page, e.g. "Oct 9, 2026, 07:05 UTC".
pub fn display_datetime(value: DateTime<Utc>) -> String {
    value.format("%b %-d, %Y, %H:%M UTC").to_string()
}
