//! Question model.
//!
//! Questions are stored server-side in five sub-type tables, each with its own
//! id sequence and pagination stream. A question is identified locally by the
//! pair (sub-type, id).

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Entity, EntityKind};

/// Content sub-type of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionContentType {
    DragDropQuestion,
    TextOptionQuestion,
    SingleChoiceQuestion,
    MultiChoiceQuestion,
    ReorderChoiceQuestion,
}

impl QuestionContentType {
    pub const ALL: [QuestionContentType; 5] = [
        QuestionContentType::DragDropQuestion,
        QuestionContentType::TextOptionQuestion,
        QuestionContentType::SingleChoiceQuestion,
        QuestionContentType::MultiChoiceQuestion,
        QuestionContentType::ReorderChoiceQuestion,
    ];

    /// Wire value used for the `content_type` query parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionContentType::DragDropQuestion => "dragdropquestion",
            QuestionContentType::TextOptionQuestion => "textoptionquestion",
            QuestionContentType::SingleChoiceQuestion => "singlechoicequestion",
            QuestionContentType::MultiChoiceQuestion => "multichoicequestion",
            QuestionContentType::ReorderChoiceQuestion => "reorderchoicequestion",
        }
    }
}

impl fmt::Display for QuestionContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One answer option of a choice question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub is_answer: bool,
}

/// Choices are a list for choice questions and a delimited string for
/// drag-drop questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Choices {
    List(Vec<Choice>),
    Text(String),
}

impl Default for Choices {
    fn default() -> Self {
        Choices::List(Vec::new())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub title: String,
    pub content_type: QuestionContentType,
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub choices: Choices,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Identity of a question across all sub-types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QuestionKey {
    pub content_type: QuestionContentType,
    pub id: i64,
}

impl QuestionKey {
    pub fn new(content_type: QuestionContentType, id: i64) -> Self {
        Self { content_type, id }
    }
}

impl fmt::Display for QuestionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.content_type, self.id)
    }
}

impl Entity for Question {
    type Key = QuestionKey;

    const KIND: EntityKind = EntityKind::Question;

    fn key(&self) -> QuestionKey {
        QuestionKey::new(self.content_type, self.id)
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        Some(self.created_at)
    }
}
