use serde::{Deserialize, Serialize};

/// The one status every question carries during an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnswerStatus {
    #[default]
    NotVisited,
    NotAnswered,
    Answered,
    MarkedForReview,
}

impl AnswerStatus {
    pub fn is_visited(self) -> bool {
        self != AnswerStatus::NotVisited
    }
}

/// Palette rendering of a question. `AnsweredAndMarked` is derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisplayStatus {
    NotVisited,
    NotAnswered,
    Answered,
    MarkedForReview,
    AnsweredAndMarked,
}

impl DisplayStatus {
    pub fn label(self) -> &'static str {
        match self {
            DisplayStatus::NotVisited => "Not Visited",
            DisplayStatus::NotAnswered => "Not Answered",
            DisplayStatus::Answered => "Answered",
            DisplayStatus::MarkedForReview => "Marked for Review",
            DisplayStatus::AnsweredAndMarked => "Answered & Marked for Review",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub question_id: String,
    #[serde(default)]
    pub selected_option: Option<String>,
    #[serde(default)]
    pub integer_answer: Option<i64>,
    #[serde(default)]
    pub status: AnswerStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marks_awarded: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_spent: Option<u64>,
}

impl Answer {
    pub fn has_value(&self) -> bool {
        self.selected_option.is_some() || self.integer_answer.is_some()
    }
}
