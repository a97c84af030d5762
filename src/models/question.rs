use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    #[serde(default)]
    pub question_image: Option<String>,
    #[serde(default)]
    pub solution_image: Option<String>,
    #[serde(default)]
    pub correct_option: Option<String>,
    #[serde(default)]
    pub correct_integer: Option<i64>,
    #[serde(default = "default_marks")]
    pub marks: i32,
}

fn default_marks() -> i32 {
    4
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum QuestionType {
    #[default]
    #[serde(rename = "MCQ")]
    Mcq,
    #[serde(rename = "INTEGER")]
    Integer,
}

/// Options offered by every MCQ question.
pub const MCQ_OPTIONS: [&str; 4] = ["A", "B", "C", "D"];
