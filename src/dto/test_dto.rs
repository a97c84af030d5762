use crate::models::question::QuestionType;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// A complete create/update request: form fields plus image file parts.
#[derive(Debug, Clone, Validate)]
pub struct TestUpload {
    #[validate(length(min = 1, message = "Please enter test name"))]
    pub name: String,
    #[validate(range(min = 1, message = "Duration must be at least one minute"))]
    pub duration_minutes: u32,
    pub is_draft: bool,
    #[validate(length(min = 1, message = "At least one section is required"))]
    pub sections: Vec<SectionPayload>,
    pub images: Vec<ImagePart>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SectionPayload {
    pub name: String,
    pub question_type: QuestionType,
    #[validate(length(min = 1, message = "Each section must have at least one question"))]
    pub questions: Vec<QuestionPayload>,
}

/// Question fields carried in the `sections` JSON field. Image fields hold
/// already-uploaded URLs; new images travel as separate file parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionPayload {
    pub question_image: Option<String>,
    pub solution_image: Option<String>,
    pub correct_option: Option<String>,
    pub correct_integer: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageFile {
    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePart {
    /// Multipart field name, e.g. `sections[0].questions[2].questionImage`.
    pub field: String,
    pub file: ImageFile,
}
