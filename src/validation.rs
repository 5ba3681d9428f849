//! Request body rules for questions, answers and votes.
//!
//! Bodies arrive as loose JSON. Presence follows JavaScript truthiness
//! (`null`, `false`, `0`, `""` all count as missing), so a client that sends
//! `{"vote": 0}` is told the request is invalid, not that zero is a bad vote.

use serde_json::Value;

/// Counted in UTF-16 code units, so characters outside the BMP count twice.
pub const MAX_ANSWER_CHARS: usize = 300;

pub const INVALID_REQUEST: &str = "Invalid request data.";
pub const CONTENT_TOO_LONG: &str = "Content must be fewer than 300 characters.";
pub const INVALID_VOTE: &str = "Invalid vote value.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejection {
    pub field: &'static str,
    pub reason: &'static str,
}

impl Rejection {
    fn new(field: &'static str, reason: &'static str) -> Self {
        Self { field, reason }
    }
}

pub trait Validate: Sized {
    fn validate(body: &Value) -> Result<Self, Rejection>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuestionInput {
    pub title: String,
    pub description: String,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnswerInput {
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoteInput {
    pub vote: f64,
}

struct TextField {
    name: &'static str,
    missing: &'static str,
    not_string: &'static str,
}

const QUESTION_FIELDS: [TextField; 3] = [
    TextField {
        name: "title",
        missing: "Title is required",
        not_string: "Title must be a string",
    },
    TextField {
        name: "description",
        missing: "Description is required",
        not_string: "Description must be a string",
    },
    TextField {
        name: "category",
        missing: "Category is required",
        not_string: "Category must be a string",
    },
];

impl Validate for QuestionInput {
    fn validate(body: &Value) -> Result<Self, Rejection> {
        for field in &QUESTION_FIELDS {
            if !is_truthy(body.get(field.name)) {
                return Err(Rejection::new(field.name, field.missing));
            }
        }

        let [title, description, category] = &QUESTION_FIELDS;
        Ok(QuestionInput {
            title: string_field(body, title)?,
            description: string_field(body, description)?,
            category: string_field(body, category)?,
        })
    }
}

fn string_field(body: &Value, field: &TextField) -> Result<String, Rejection> {
    body.get(field.name)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(Rejection::new(field.name, field.not_string))
}

impl Validate for AnswerInput {
    fn validate(body: &Value) -> Result<Self, Rejection> {
        let content = body
            .get("content")
            .and_then(Value::as_str)
            .ok_or(Rejection::new("content", INVALID_REQUEST))?;

        let trimmed = content.trim_matches(|c: char| c.is_whitespace() || c == '\u{FEFF}');
        if trimmed.is_empty() {
            return Err(Rejection::new("content", INVALID_REQUEST));
        }
        if trimmed.encode_utf16().count() > MAX_ANSWER_CHARS {
            return Err(Rejection::new("content", CONTENT_TOO_LONG));
        }

        Ok(AnswerInput {
            content: content.to_string(),
        })
    }
}

impl Validate for VoteInput {
    fn validate(body: &Value) -> Result<Self, Rejection> {
        let vote = body.get("vote");
        if !is_truthy(vote) {
            return Err(Rejection::new("vote", INVALID_REQUEST));
        }

        vote.and_then(Value::as_f64)
            .map(|vote| VoteInput { vote })
            .ok_or(Rejection::new("vote", INVALID_VOTE))
    }
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(number)) => number.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::String(text)) => !text.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}
