use crate::dto::test_dto::{ImageFile, ImagePart, QuestionPayload, SectionPayload, TestUpload};
use crate::error::{Error, Result};
use crate::models::question::{QuestionType, MCQ_OPTIONS};
use crate::models::test::Test;
use crate::utils::validation::{is_integer_text, validate};
use tracing::debug;
use uuid::Uuid;
use validator::Validate;

const DEFAULT_HOURS: u32 = 3;
const DEFAULT_SECTION: &str = "Physics";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageField {
    Question,
    Solution,
}

impl ImageField {
    pub fn form_key(self) -> &'static str {
        match self {
            ImageField::Question => "questionImage",
            ImageField::Solution => "solutionImage",
        }
    }
}

/// One image input on the authoring form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSlot {
    pub section: usize,
    pub question: usize,
    pub field: ImageField,
}

impl ImageSlot {
    pub fn new(section: usize, question: usize, field: ImageField) -> Self {
        Self {
            section,
            question,
            field,
        }
    }
}

/// Either an image already stored by the backend or new bytes to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Url(String),
    File(ImageFile),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftQuestion {
    /// Local key, never sent to the backend.
    pub key: String,
    pub question_image: Option<ImageSource>,
    pub solution_image: Option<ImageSource>,
    pub correct_option: String,
    pub correct_integer: String,
}

impl DraftQuestion {
    fn new() -> Self {
        Self {
            key: format!("q-{}", Uuid::new_v4()),
            question_image: None,
            solution_image: None,
            correct_option: "A".to_string(),
            correct_integer: String::new(),
        }
    }

    fn image_mut(&mut self, field: ImageField) -> &mut Option<ImageSource> {
        match field {
            ImageField::Question => &mut self.question_image,
            ImageField::Solution => &mut self.solution_image,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftSection {
    pub name: String,
    pub question_type: QuestionType,
    pub questions: Vec<DraftQuestion>,
}

impl DraftSection {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            question_type: QuestionType::Mcq,
            questions: Vec::new(),
        }
    }
}

/// Authoring form state for creating or editing a test.
#[derive(Debug, Clone)]
pub struct TestBuilder {
    name: String,
    hours: u32,
    minutes: u32,
    sections: Vec<DraftSection>,
    editing: Option<String>,
    focused: Option<ImageSlot>,
}

impl Default for TestBuilder {
    fn default() -> Self {
        Self {
            name: String::new(),
            hours: DEFAULT_HOURS,
            minutes: 0,
            sections: vec![DraftSection::new(DEFAULT_SECTION)],
            editing: None,
            focused: None,
        }
    }
}

impl TestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn duration_minutes(&self) -> u32 {
        self.hours.saturating_mul(60).saturating_add(self.minutes)
    }

    pub fn set_duration(&mut self, hours: u32, minutes: u32) -> Result<()> {
        if minutes >= 60 {
            return Err(Error::InvalidInput("Minutes must be between 0 and 59".to_string()));
        }
        if hours.checked_mul(60).and_then(|m| m.checked_add(minutes)).is_none() {
            return Err(Error::InvalidInput("Duration is too long".to_string()));
        }
        self.hours = hours;
        self.minutes = minutes;
        Ok(())
    }

    pub fn sections(&self) -> &[DraftSection] {
        &self.sections
    }

    pub fn editing_id(&self) -> Option<&str> {
        self.editing.as_deref()
    }

    fn section_mut(&mut self, section: usize) -> Result<&mut DraftSection> {
        self.sections
            .get_mut(section)
            .ok_or_else(|| Error::InvalidInput(format!("No section {}", section + 1)))
    }

    fn question_mut(&mut self, section: usize, question: usize) -> Result<&mut DraftQuestion> {
        self.section_mut(section)?
            .questions
            .get_mut(question)
            .ok_or_else(|| Error::InvalidInput(format!("No question {}", question + 1)))
    }

    pub fn add_section(&mut self) -> usize {
        let name = format!("Section {}", self.sections.len() + 1);
        self.sections.push(DraftSection::new(name));
        self.sections.len() - 1
    }

    pub fn rename_section(&mut self, section: usize, name: impl Into<String>) -> Result<()> {
        self.section_mut(section)?.name = name.into();
        Ok(())
    }

    pub fn set_question_type(&mut self, section: usize, question_type: QuestionType) -> Result<()> {
        self.section_mut(section)?.question_type = question_type;
        Ok(())
    }

    pub fn delete_section(&mut self, section: usize) -> Result<()> {
        if self.sections.len() <= 1 {
            return Err(Error::InvalidInput("At least one section is required".to_string()));
        }
        self.section_mut(section)?;
        self.sections.remove(section);
        self.focused = None;
        Ok(())
    }

    /// Appends a question and returns its local key.
    pub fn add_question(&mut self, section: usize) -> Result<String> {
        let question = DraftQuestion::new();
        let key = question.key.clone();
        self.section_mut(section)?.questions.push(question);
        Ok(key)
    }

    pub fn delete_question(&mut self, section: usize, question: usize) -> Result<()> {
        let questions = &mut self.section_mut(section)?.questions;
        if question >= questions.len() {
            return Err(Error::InvalidInput(format!("No question {}", question + 1)));
        }
        questions.remove(question);
        self.focused = None;
        Ok(())
    }

    pub fn set_correct_option(&mut self, section: usize, question: usize, option: &str) -> Result<()> {
        if !MCQ_OPTIONS.contains(&option) {
            return Err(Error::InvalidInput(format!("Invalid option {}", option)));
        }
        self.question_mut(section, question)?.correct_option = option.to_string();
        Ok(())
    }

    /// Empty text clears the answer; anything else must be an integer.
    pub fn set_correct_integer(&mut self, section: usize, question: usize, text: &str) -> Result<()> {
        let text = text.trim();
        if !text.is_empty() && !is_integer_text(text) {
            return Err(Error::InvalidInput(format!("Not an integer: {}", text)));
        }
        self.question_mut(section, question)?.correct_integer = text.to_string();
        Ok(())
    }

    pub fn set_image(&mut self, slot: ImageSlot, file: ImageFile) -> Result<()> {
        if !file.is_image() {
            return Err(Error::InvalidInput("Please select an image file".to_string()));
        }
        *self
            .question_mut(slot.section, slot.question)?
            .image_mut(slot.field) = Some(ImageSource::File(file));
        Ok(())
    }

    pub fn clear_image(&mut self, slot: ImageSlot) -> Result<()> {
        *self
            .question_mut(slot.section, slot.question)?
            .image_mut(slot.field) = None;
        Ok(())
    }

    pub fn focus(&mut self, slot: ImageSlot) -> Result<()> {
        self.question_mut(slot.section, slot.question)?;
        self.focused = Some(slot);
        Ok(())
    }

    pub fn blur(&mut self) {
        self.focused = None;
    }

    pub fn focused(&self) -> Option<ImageSlot> {
        self.focused
    }

    /// Pastes into the focused image input only.
    pub fn paste_image(&mut self, file: ImageFile) -> Result<ImageSlot> {
        let slot = self
            .focused
            .ok_or_else(|| Error::InvalidInput("Click an image box before pasting".to_string()))?;
        self.set_image(slot, file)?;
        debug!(?slot, "image pasted");
        Ok(slot)
    }

    /// Loads an existing test for editing.
    pub fn edit(&mut self, test: &Test) {
        self.name = test.name.clone();
        self.hours = test.duration / 60;
        self.minutes = test.duration % 60;
        self.sections = test
            .sections
            .iter()
            .map(|section| DraftSection {
                name: section.name.clone(),
                question_type: section.question_type,
                questions: section
                    .questions
                    .iter()
                    .map(|q| DraftQuestion {
                        key: q.id.clone(),
                        question_image: q.question_image.clone().map(ImageSource::Url),
                        solution_image: q.solution_image.clone().map(ImageSource::Url),
                        correct_option: q.correct_option.clone().unwrap_or_else(|| "A".to_string()),
                        correct_integer: q.correct_integer.map(|v| v.to_string()).unwrap_or_default(),
                    })
                    .collect(),
            })
            .collect();
        if self.sections.is_empty() {
            self.sections.push(DraftSection::new(DEFAULT_SECTION));
        }
        self.editing = Some(test.id.clone());
        self.focused = None;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Validates the form and turns it into an upload. Drafts skip the
    /// completeness checks.
    pub fn build(&self, draft: bool) -> Result<TestUpload> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidInput("Please enter test name".to_string()));
        }
        if self.sections.iter().any(|s| s.questions.is_empty()) {
            return Err(Error::InvalidInput(
                "Each section must have at least one question".to_string(),
            ));
        }

        let mut sections = Vec::with_capacity(self.sections.len());
        let mut images = Vec::new();
        for (s, section) in self.sections.iter().enumerate() {
            let mut questions = Vec::with_capacity(section.questions.len());
            for (q, question) in section.questions.iter().enumerate() {
                if !draft {
                    self.check_complete(section, question, q)?;
                }
                let mut payload = QuestionPayload {
                    question_image: None,
                    solution_image: None,
                    correct_option: None,
                    correct_integer: None,
                };
                match section.question_type {
                    QuestionType::Mcq => payload.correct_option = Some(question.correct_option.clone()),
                    QuestionType::Integer => {
                        payload.correct_integer = if question.correct_integer.is_empty() {
                            None
                        } else {
                            Some(question.correct_integer.parse().map_err(|_| {
                                Error::InvalidInput(format!(
                                    "Correct answer for question {} is out of range",
                                    q + 1
                                ))
                            })?)
                        };
                    }
                }
                for field in [ImageField::Question, ImageField::Solution] {
                    let source = match field {
                        ImageField::Question => &question.question_image,
                        ImageField::Solution => &question.solution_image,
                    };
                    match source {
                        Some(ImageSource::Url(url)) => match field {
                            ImageField::Question => payload.question_image = Some(url.clone()),
                            ImageField::Solution => payload.solution_image = Some(url.clone()),
                        },
                        Some(ImageSource::File(file)) => images.push(ImagePart {
                            field: format!("sections[{}].questions[{}].{}", s, q, field.form_key()),
                            file: file.clone(),
                        }),
                        None => {}
                    }
                }
                questions.push(payload);
            }
            let section = SectionPayload {
                name: section.name.trim().to_string(),
                question_type: section.question_type,
                questions,
            };
            section.validate()?;
            sections.push(section);
        }

        let upload = TestUpload {
            name: self.name.trim().to_string(),
            duration_minutes: self.duration_minutes(),
            is_draft: draft,
            sections,
            images,
        };
        validate(&upload)?;
        Ok(upload)
    }

    fn check_complete(&self, section: &DraftSection, question: &DraftQuestion, index: usize) -> Result<()> {
        if question.question_image.is_none() {
            return Err(Error::InvalidInput(format!(
                "Question {} in {} needs a question image",
                index + 1,
                section.name
            )));
        }
        if section.question_type == QuestionType::Integer && question.correct_integer.is_empty() {
            return Err(Error::InvalidInput(format!(
                "Question {} in {} needs a correct integer answer",
                index + 1,
                section.name
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::Question;
    use crate::models::test::Section;

    fn png(name: &str) -> ImageFile {
        ImageFile {
            file_name: name.to_string(),
            content_type: "image/png".to_string(),
            bytes: vec![0x89, b'P', b'N', b'G'],
        }
    }

    #[test]
    fn starts_with_one_physics_section_and_three_hours() {
        let builder = TestBuilder::new();
        assert_eq!(builder.duration_minutes(), 180);
        assert_eq!(builder.sections().len(), 1);
        assert_eq!(builder.sections()[0].name, "Physics");
        assert_eq!(builder.sections()[0].question_type, QuestionType::Mcq);
    }

    #[test]
    fn last_section_cannot_be_deleted() {
        let mut builder = TestBuilder::new();
        assert!(builder.delete_section(0).is_err());
        let added = builder.add_section();
        assert_eq!(builder.sections()[added].name, "Section 2");
        builder.delete_section(0).unwrap();
        assert_eq!(builder.sections()[0].name, "Section 2");
    }

    #[test]
    fn paste_goes_to_the_focused_slot_only() {
        let mut builder = TestBuilder::new();
        builder.add_question(0).unwrap();
        builder.add_question(0).unwrap();
        assert!(builder.paste_image(png("a.png")).is_err());

        let slot = ImageSlot::new(0, 1, ImageField::Solution);
        builder.focus(slot).unwrap();
        assert_eq!(builder.paste_image(png("b.png")).unwrap(), slot);
        assert!(builder.sections()[0].questions[1].solution_image.is_some());
        assert!(builder.sections()[0].questions[0].solution_image.is_none());

        builder.blur();
        assert!(builder.paste_image(png("c.png")).is_err());
        assert!(builder.focus(ImageSlot::new(0, 5, ImageField::Question)).is_err());
    }

    #[test]
    fn non_images_are_rejected() {
        let mut builder = TestBuilder::new();
        builder.add_question(0).unwrap();
        let pdf = ImageFile {
            file_name: "notes.pdf".into(),
            content_type: "application/pdf".into(),
            bytes: vec![1, 2, 3],
        };
        assert!(builder
            .set_image(ImageSlot::new(0, 0, ImageField::Question), pdf)
            .is_err());
    }

    #[test]
    fn build_names_file_parts_by_position() {
        let mut builder = TestBuilder::new();
        builder.set_name("  Mock 1 ");
        builder.set_duration(2, 30).unwrap();
        builder.add_question(0).unwrap();
        builder.set_correct_option(0, 0, "C").unwrap();
        builder
            .set_image(ImageSlot::new(0, 0, ImageField::Question), png("q.png"))
            .unwrap();
        let s = builder.add_section();
        builder.set_question_type(s, QuestionType::Integer).unwrap();
        builder.add_question(s).unwrap();
        builder.set_correct_integer(s, 0, "-3").unwrap();
        builder
            .set_image(ImageSlot::new(s, 0, ImageField::Question), png("q2.png"))
            .unwrap();
        builder
            .set_image(ImageSlot::new(s, 0, ImageField::Solution), png("s2.png"))
            .unwrap();

        let upload = builder.build(false).unwrap();
        assert_eq!(upload.name, "Mock 1");
        assert_eq!(upload.duration_minutes, 150);
        assert!(!upload.is_draft);
        assert_eq!(upload.sections[0].questions[0].correct_option.as_deref(), Some("C"));
        assert_eq!(upload.sections[1].questions[0].correct_integer, Some(-3));
        assert_eq!(upload.sections[1].questions[0].correct_option, None);
        let fields: Vec<&str> = upload.images.iter().map(|i| i.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "sections[0].questions[0].questionImage",
                "sections[1].questions[0].questionImage",
                "sections[1].questions[0].solutionImage",
            ]
        );

        let json = serde_json::to_value(&upload.sections).unwrap();
        assert!(json[0]["questions"][0].get("key").is_none());
        assert_eq!(json[1]["questionType"], "INTEGER");
    }

    #[test]
    fn publishing_requires_complete_questions_but_drafts_do_not() {
        let mut builder = TestBuilder::new();
        builder.set_name("Draft");
        assert!(matches!(builder.build(true), Err(Error::InvalidInput(_))));

        builder.add_question(0).unwrap();
        assert!(builder.build(true).unwrap().is_draft);
        assert!(builder.build(false).is_err());

        builder.set_name(" ");
        assert!(builder.build(true).is_err());
    }

    #[test]
    fn zero_duration_fails_validation() {
        let mut builder = TestBuilder::new();
        builder.set_name("Quick");
        builder.set_duration(0, 0).unwrap();
        builder.add_question(0).unwrap();
        assert!(matches!(builder.build(true), Err(Error::Validation(_))));
        assert!(builder.set_duration(1, 75).is_err());
    }

    #[test]
    fn edit_keeps_stored_images_as_urls_and_reset_clears() {
        let test = Test {
            id: "t-9".into(),
            name: "Old".into(),
            duration: 95,
            total_marks: 4,
            is_live: false,
            is_draft: true,
            sections: vec![Section {
                id: None,
                name: "Maths".into(),
                question_type: QuestionType::Integer,
                questions: vec![Question {
                    id: "q-1".into(),
                    question_image: Some("https://img/q1.png".into()),
                    solution_image: None,
                    correct_option: None,
                    correct_integer: Some(0),
                    marks: 4,
                }],
            }],
            attempts: None,
        };
        let mut builder = TestBuilder::new();
        builder.edit(&test);
        assert_eq!(builder.editing_id(), Some("t-9"));
        assert_eq!(builder.duration_minutes(), 95);

        let upload = builder.build(false).unwrap();
        assert!(upload.images.is_empty());
        assert_eq!(
            upload.sections[0].questions[0].question_image.as_deref(),
            Some("https://img/q1.png")
        );
        assert_eq!(upload.sections[0].questions[0].correct_integer, Some(0));

        builder.reset();
        assert_eq!(builder.editing_id(), None);
        assert_eq!(builder.name(), "");
    }

    #[test]
    fn durations_past_the_minute_range_are_rejected() {
        let mut builder = TestBuilder::new();
        builder.set_duration(2, 15).unwrap();

        let err = builder.set_duration(u32::MAX / 60, 59).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        let err = builder.set_duration(u32::MAX, 0).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(builder.duration_minutes(), 135);
    }
}
