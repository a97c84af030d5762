use crate::dto::attempt_dto::AnswerPayload;
use crate::error::{Error, Result};
use crate::models::answer::{Answer, AnswerStatus, DisplayStatus};
use crate::models::question::MCQ_OPTIONS;
use crate::models::test::Test;
use crate::utils::validation::is_integer_text;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerEntry {
    pub selected_option: Option<String>,
    pub integer_answer: Option<i64>,
    pub status: AnswerStatus,
}

impl AnswerEntry {
    pub fn has_value(&self) -> bool {
        self.selected_option.is_some() || self.integer_answer.is_some()
    }

    pub fn display_status(&self) -> DisplayStatus {
        match self.status {
            AnswerStatus::NotVisited => DisplayStatus::NotVisited,
            AnswerStatus::NotAnswered => DisplayStatus::NotAnswered,
            AnswerStatus::Answered => DisplayStatus::Answered,
            AnswerStatus::MarkedForReview if self.has_value() => DisplayStatus::AnsweredAndMarked,
            AnswerStatus::MarkedForReview => DisplayStatus::MarkedForReview,
        }
    }
}

/// Partial update. The outer `Option` says whether a field is touched,
/// the inner one whether it is set or cleared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerPatch {
    pub selected_option: Option<Option<String>>,
    pub integer_answer: Option<Option<i64>>,
    pub status: Option<AnswerStatus>,
}

impl AnswerPatch {
    pub fn option(option: impl Into<String>) -> Self {
        Self {
            selected_option: Some(Some(option.into())),
            ..Self::default()
        }
    }

    pub fn integer(value: Option<i64>) -> Self {
        Self {
            integer_answer: Some(value),
            ..Self::default()
        }
    }

    pub fn status(status: AnswerStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn cleared() -> Self {
        Self {
            selected_option: Some(None),
            integer_answer: Some(None),
            status: Some(AnswerStatus::NotAnswered),
        }
    }

    pub fn with_status(mut self, status: AnswerStatus) -> Self {
        self.status = Some(status);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeypadKey {
    Digit(u8),
    Minus,
    Backspace,
    Clear,
}

impl KeypadKey {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "C" => Some(KeypadKey::Clear),
            "Backspace" => Some(KeypadKey::Backspace),
            "-" => Some(KeypadKey::Minus),
            _ => {
                let mut chars = raw.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => c.to_digit(10).map(|d| KeypadKey::Digit(d as u8)),
                    _ => None,
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub total: usize,
    /// Includes answered-and-marked questions.
    pub answered: usize,
    pub not_answered: usize,
    pub marked_for_review: usize,
    pub answered_and_marked: usize,
    pub not_visited: usize,
}

impl StatusCounts {
    fn add(&mut self, entry: Option<&AnswerEntry>) {
        self.total += 1;
        let Some(entry) = entry else {
            self.not_visited += 1;
            return;
        };
        match entry.display_status() {
            DisplayStatus::NotVisited => self.not_visited += 1,
            DisplayStatus::NotAnswered => self.not_answered += 1,
            DisplayStatus::Answered => self.answered += 1,
            DisplayStatus::MarkedForReview => self.marked_for_review += 1,
            DisplayStatus::AnsweredAndMarked => {
                self.marked_for_review += 1;
                self.answered_and_marked += 1;
                self.answered += 1;
            }
        }
    }
}

/// Question id to answer map; the single source of truth during an attempt.
#[derive(Debug, Clone, Default)]
pub struct AnswerStore {
    entries: BTreeMap<String, AnswerEntry>,
}

impl AnswerStore {
    /// Seeds one entry per question, then applies whatever the server persisted.
    pub fn from_attempt(test: &Test, persisted: &[Answer]) -> Self {
        let mut entries: BTreeMap<String, AnswerEntry> = test
            .questions()
            .map(|q| (q.id.clone(), AnswerEntry::default()))
            .collect();
        for answer in persisted {
            entries.insert(
                answer.question_id.clone(),
                AnswerEntry {
                    selected_option: answer.selected_option.clone(),
                    integer_answer: answer.integer_answer,
                    status: answer.status,
                },
            );
        }
        Self { entries }
    }

    pub fn get(&self, question_id: &str) -> Option<&AnswerEntry> {
        self.entries.get(question_id)
    }

    pub fn status(&self, question_id: &str) -> AnswerStatus {
        self.get(question_id).map(|e| e.status).unwrap_or_default()
    }

    pub fn display_status(&self, question_id: &str) -> DisplayStatus {
        self.get(question_id)
            .map(AnswerEntry::display_status)
            .unwrap_or(DisplayStatus::NotVisited)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry_mut(&mut self, question_id: &str) -> Result<&mut AnswerEntry> {
        self.entries
            .get_mut(question_id)
            .ok_or_else(|| Error::InvalidInput(format!("Unknown question {}", question_id)))
    }

    /// Merges `patch` into the answer. Without an explicit status the status
    /// follows value presence.
    pub fn update(&mut self, question_id: &str, patch: AnswerPatch) -> Result<&AnswerEntry> {
        let entry = self.entry_mut(question_id)?;
        if let Some(option) = patch.selected_option {
            entry.selected_option = option;
        }
        if let Some(value) = patch.integer_answer {
            entry.integer_answer = value;
        }
        entry.status = match patch.status {
            Some(AnswerStatus::NotVisited) if entry.status.is_visited() => entry.status,
            Some(status) => status,
            None if entry.has_value() => AnswerStatus::Answered,
            None => AnswerStatus::NotAnswered,
        };
        Ok(entry)
    }

    /// NOT_VISITED becomes NOT_ANSWERED; any other status is kept.
    pub fn mark_visited(&mut self, question_id: &str) {
        if let Some(entry) = self.entries.get_mut(question_id) {
            if entry.status == AnswerStatus::NotVisited {
                entry.status = AnswerStatus::NotAnswered;
            }
        }
    }

    fn answered_status(&self, question_id: &str) -> AnswerStatus {
        if self.status(question_id) == AnswerStatus::MarkedForReview {
            AnswerStatus::MarkedForReview
        } else {
            AnswerStatus::Answered
        }
    }

    pub fn select_option(&mut self, question_id: &str, option: &str) -> Result<()> {
        if !MCQ_OPTIONS.contains(&option) {
            return Err(Error::InvalidInput(format!("Invalid option {}", option)));
        }
        let status = self.answered_status(question_id);
        self.update(question_id, AnswerPatch::option(option).with_status(status))?;
        Ok(())
    }

    /// Applies typed integer text. Rejected text leaves the answer untouched.
    pub fn integer_input(&mut self, question_id: &str, text: &str) -> Result<()> {
        if text.is_empty() {
            self.update(
                question_id,
                AnswerPatch::integer(None).with_status(AnswerStatus::NotAnswered),
            )?;
            return Ok(());
        }
        if !is_integer_text(text) {
            return Err(Error::InvalidInput(format!("Not an integer: {}", text)));
        }
        let value: i64 = text
            .parse()
            .map_err(|_| Error::InvalidInput(format!("Integer out of range: {}", text)))?;
        let status = self.answered_status(question_id);
        self.update(question_id, AnswerPatch::integer(Some(value)).with_status(status))?;
        Ok(())
    }

    pub fn keypad(&mut self, question_id: &str, key: KeypadKey) -> Result<()> {
        let current = self
            .entry_mut(question_id)?
            .integer_answer
            .map(|v| v.to_string())
            .unwrap_or_default();
        match key {
            KeypadKey::Clear => self.integer_input(question_id, ""),
            KeypadKey::Backspace => {
                let mut text = current;
                text.pop();
                // A lone "-" is not a value.
                if !is_integer_text(&text) {
                    text.clear();
                }
                self.integer_input(question_id, &text)
            }
            KeypadKey::Minus => self.integer_input(question_id, &format!("{}-", current)),
            KeypadKey::Digit(d) => self.integer_input(question_id, &format!("{}{}", current, d)),
        }
    }

    pub fn mark_for_review(&mut self, question_id: &str) -> Result<()> {
        self.update(question_id, AnswerPatch::status(AnswerStatus::MarkedForReview))?;
        Ok(())
    }

    pub fn clear(&mut self, question_id: &str) -> Result<()> {
        self.update(question_id, AnswerPatch::cleared())?;
        Ok(())
    }

    /// Snapshot for sync and submit.
    pub fn payloads(&self) -> Vec<AnswerPayload> {
        self.entries
            .iter()
            .map(|(id, entry)| AnswerPayload {
                question_id: id.clone(),
                selected_option: entry.selected_option.clone(),
                integer_answer: entry.integer_answer,
                status: entry.status,
            })
            .collect()
    }

    pub fn counts<'a, I>(&self, question_ids: I) -> StatusCounts
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut counts = StatusCounts::default();
        for id in question_ids {
            counts.add(self.get(id));
        }
        counts
    }
}
