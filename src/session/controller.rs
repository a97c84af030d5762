use crate::config::SessionSettings;
use crate::error::{Error, Result};
use crate::models::question::{Question, QuestionType};
use crate::models::test::Test;
use crate::services::api_client::AttemptApi;
use crate::session::answer_store::{AnswerPatch, AnswerStore, KeypadKey, StatusCounts};
use crate::session::countdown::Countdown;
use crate::session::navigation::{Cursor, Layout};
use crate::session::platform::PlatformEvent;
use crate::session::time_tracker::TimeTracker;
use crate::session::violation::{ForceCause, ViolationMonitor, ViolationOutcome};
use serde::Serialize;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Loading,
    Active { cursor: Cursor },
    Submitting,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitReason {
    Manual,
    TimeUp,
    ViolationThreshold,
    WarningTimeout,
}

impl SubmitReason {
    pub fn is_forced(self) -> bool {
        self != SubmitReason::Manual
    }
}

impl From<ForceCause> for SubmitReason {
    fn from(cause: ForceCause) -> Self {
        match cause {
            ForceCause::ThresholdReached => SubmitReason::ViolationThreshold,
            ForceCause::WarningTimeout => SubmitReason::WarningTimeout,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Submitted(SubmitReason),
    /// Forced submission whose final post failed; the session ended anyway.
    Abandoned(SubmitReason),
    /// Another submission already claimed the session.
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionSummary {
    pub name: String,
    pub counts: StatusCounts,
}

/// Counts shown by the palette and the submit confirmation dialog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionSummary {
    pub sections: Vec<SectionSummary>,
    pub overall: StatusCounts,
}

/// Owns one attempt's state: cursor, answers, countdown, time accounting and
/// violation escalation.
pub struct SessionController {
    api: Arc<dyn AttemptApi>,
    settings: SessionSettings,
    attempt_id: String,
    phase: SessionPhase,
    test: Option<Test>,
    layout: Option<Layout>,
    answers: AnswerStore,
    countdown: Countdown,
    tracker: TimeTracker,
    violations: ViolationMonitor,
}

impl SessionController {
    pub fn new(api: Arc<dyn AttemptApi>, settings: SessionSettings, attempt_id: &str) -> Self {
        Self {
            api,
            settings,
            attempt_id: attempt_id.to_string(),
            phase: SessionPhase::Loading,
            test: None,
            layout: None,
            answers: AnswerStore::default(),
            countdown: Countdown::new(0),
            tracker: TimeTracker::new(),
            violations: ViolationMonitor::new(&settings),
        }
    }

    /// Fetches the attempt and its test, then opens the first question.
    pub async fn load(&mut self) -> Result<()> {
        if self.phase != SessionPhase::Loading {
            return Err(Error::InvalidInput("Session already loaded".to_string()));
        }
        let attempt = self.api.get_attempt(&self.attempt_id).await?;
        if attempt.is_completed {
            return Err(Error::AttemptCompleted(attempt.id));
        }
        let test = attempt
            .test
            .clone()
            .ok_or_else(|| Error::NotFound(format!("Test for attempt {}", attempt.id)))?;
        let layout = Layout::new(&test);
        let first = layout
            .first()
            .ok_or_else(|| Error::NotFound(format!("Questions for test {}", test.id)))?;

        self.answers = AnswerStore::from_attempt(&test, &attempt.answers);

        // Resume starts from the full duration again.
        let seconds = (u64::from(test.duration) * 60).max(self.settings.min_countdown_secs);
        self.countdown.reset(seconds);
        self.countdown.start();

        info!(
            attempt_id = %self.attempt_id,
            test_id = %test.id,
            questions = layout.len(),
            seconds,
            "test session loaded"
        );
        self.test = Some(test);
        self.layout = Some(layout);
        self.phase = SessionPhase::Active { cursor: first };
        self.open(first, Instant::now());
        Ok(())
    }

    fn open(&mut self, cursor: Cursor, now: Instant) {
        let Some(question_id) = self.question_id_at(cursor) else {
            return;
        };
        self.answers.mark_visited(&question_id);
        self.tracker.start(&question_id, now);
    }

    fn question_id_at(&self, cursor: Cursor) -> Option<String> {
        self.layout
            .as_ref()?
            .question_id(cursor)
            .map(str::to_string)
    }

    fn active_cursor(&self) -> Result<Cursor> {
        match self.phase {
            SessionPhase::Active { cursor } => Ok(cursor),
            _ => Err(Error::InvalidInput("Session is not active".to_string())),
        }
    }

    fn layout(&self) -> Result<&Layout> {
        self.layout
            .as_ref()
            .ok_or_else(|| Error::InvalidInput("Session is not loaded".to_string()))
    }

    fn current_id(&self) -> Result<String> {
        let cursor = self.active_cursor()?;
        self.question_id_at(cursor)
            .ok_or_else(|| Error::Internal("Cursor points outside the test".to_string()))
    }

    pub async fn navigate_to(&mut self, section: usize, question: usize) -> Result<()> {
        let current = self.active_cursor()?;
        let target = self.layout()?.check(Cursor::new(section, question))?;
        let now = Instant::now();

        self.tracker.stop(now);
        if let Some(previous) = self.question_id_at(current) {
            self.answers.mark_visited(&previous);
        }
        self.phase = SessionPhase::Active { cursor: target };
        self.open(target, now);
        Ok(())
    }

    /// Moves to the next question across sections; no-op on the last one.
    pub async fn next(&mut self) -> Result<()> {
        let cursor = self.active_cursor()?;
        match self.layout()?.next(cursor) {
            Some(target) => self.navigate_to(target.section, target.question).await,
            None => Ok(()),
        }
    }

    pub async fn previous(&mut self) -> Result<()> {
        let cursor = self.active_cursor()?;
        match self.layout()?.previous(cursor) {
            Some(target) => self.navigate_to(target.section, target.question).await,
            None => Ok(()),
        }
    }

    pub async fn select_section(&mut self, section: usize) -> Result<()> {
        self.navigate_to(section, 0).await
    }

    pub fn update_answer(&mut self, question_id: &str, patch: AnswerPatch) -> Result<()> {
        self.active_cursor()?;
        self.answers.update(question_id, patch)?;
        Ok(())
    }

    fn require_type(&self, expected: QuestionType) -> Result<()> {
        let cursor = self.active_cursor()?;
        let actual = self
            .test
            .as_ref()
            .and_then(|t| t.sections.get(cursor.section))
            .map(|s| s.question_type);
        if actual == Some(expected) {
            Ok(())
        } else {
            Err(Error::InvalidInput(format!(
                "Current question does not accept {:?} answers",
                expected
            )))
        }
    }

    pub fn select_option(&mut self, option: &str) -> Result<()> {
        self.require_type(QuestionType::Mcq)?;
        let id = self.current_id()?;
        self.answers.select_option(&id, option)
    }

    pub fn integer_input(&mut self, text: &str) -> Result<()> {
        self.require_type(QuestionType::Integer)?;
        let id = self.current_id()?;
        self.answers.integer_input(&id, text.trim())
    }

    pub fn keypad(&mut self, key: KeypadKey) -> Result<()> {
        self.require_type(QuestionType::Integer)?;
        let id = self.current_id()?;
        self.answers.keypad(&id, key)
    }

    pub async fn mark_for_review_and_next(&mut self) -> Result<()> {
        let id = self.current_id()?;
        self.answers.mark_for_review(&id)?;
        self.next().await
    }

    pub fn clear_response(&mut self) -> Result<()> {
        let id = self.current_id()?;
        self.answers.clear(&id)
    }

    /// Manual submit step one: the summary the candidate confirms.
    pub fn request_submit(&self) -> Result<QuestionSummary> {
        self.active_cursor()?;
        Ok(self.question_summary())
    }

    pub fn question_summary(&self) -> QuestionSummary {
        let (Some(test), Some(layout)) = (self.test.as_ref(), self.layout.as_ref()) else {
            return QuestionSummary {
                sections: Vec::new(),
                overall: StatusCounts::default(),
            };
        };
        let sections = test
            .sections
            .iter()
            .enumerate()
            .map(|(i, section)| SectionSummary {
                name: section.name.clone(),
                counts: self
                    .answers
                    .counts(layout.section_ids(i).iter().map(String::as_str)),
            })
            .collect();
        QuestionSummary {
            sections,
            overall: self
                .answers
                .counts(layout.all_ids().iter().map(String::as_str)),
        }
    }

    /// The only transition into `Submitting`. Returns the cursor to restore
    /// if a manual submission fails.
    pub fn begin_submit(&mut self) -> Option<Cursor> {
        match self.phase {
            SessionPhase::Active { cursor } => {
                self.phase = SessionPhase::Submitting;
                Some(cursor)
            }
            _ => None,
        }
    }

    pub async fn submit(&mut self, reason: SubmitReason) -> Result<SubmitOutcome> {
        let Some(cursor) = self.begin_submit() else {
            info!(?reason, "submission already in progress, ignoring");
            return Ok(SubmitOutcome::Ignored);
        };
        info!(attempt_id = %self.attempt_id, ?reason, "submitting test");

        let now = Instant::now();
        self.countdown.stop();
        self.tracker.stop(now);
        if let Err(e) = self.flush_times().await {
            warn!("Failed to sync time data before submit: {}", e);
        }

        let answers = self.answers.payloads();
        match self.api.submit_attempt(&self.attempt_id, &answers).await {
            Ok(()) => {
                self.phase = SessionPhase::Terminated;
                info!(attempt_id = %self.attempt_id, ?reason, "test submitted");
                Ok(SubmitOutcome::Submitted(reason))
            }
            Err(e) if reason.is_forced() => {
                error!(attempt_id = %self.attempt_id, ?reason, "forced submission failed: {}", e);
                self.phase = SessionPhase::Terminated;
                Ok(SubmitOutcome::Abandoned(reason))
            }
            Err(e) => {
                error!(attempt_id = %self.attempt_id, "submission failed: {}", e);
                self.phase = SessionPhase::Active { cursor };
                self.countdown.start();
                if let Some(id) = self.question_id_at(cursor) {
                    self.tracker.start(&id, Instant::now());
                }
                Err(e)
            }
        }
    }

    async fn flush_times(&mut self) -> Result<()> {
        let batch = self.tracker.take_pending();
        if batch.is_empty() {
            return Ok(());
        }
        match self.api.sync_times(&self.attempt_id, &batch).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.tracker.restore_pending(batch);
                Err(e)
            }
        }
    }

    pub async fn sync_answers(&mut self) -> Result<()> {
        if !self.is_active() {
            return Ok(());
        }
        let answers = self.answers.payloads();
        self.api.sync_answers(&self.attempt_id, &answers).await
    }

    /// Posts the pending time deltas; a failed batch is kept for the next call.
    pub async fn sync_times(&mut self) -> Result<()> {
        if !self.is_active() {
            return Ok(());
        }
        self.flush_times().await
    }

    pub fn page_hidden(&mut self) {
        if self.is_active() {
            self.tracker.pause(Instant::now());
        }
    }

    pub fn page_shown(&mut self) {
        if self.is_active() {
            self.tracker.resume(Instant::now());
        }
    }

    /// Feeds a platform event through time accounting and the violation
    /// monitor. Every new warning is reported to the backend.
    pub async fn handle_platform(&mut self, event: PlatformEvent) -> ViolationOutcome {
        if !self.is_active() {
            return ViolationOutcome::Ignored;
        }
        match event {
            PlatformEvent::PageHidden => self.page_hidden(),
            PlatformEvent::PageVisible => self.page_shown(),
            _ => {}
        }
        let outcome = self.violations.handle(event, Instant::now());
        let recorded = match outcome {
            ViolationOutcome::Warned { count, .. } => Some(count),
            ViolationOutcome::Forced {
                recorded: Some((count, _)),
                ..
            } => Some(count),
            _ => None,
        };
        if let Some(count) = recorded {
            if let Err(e) = self.api.report_warning(&self.attempt_id).await {
                warn!(count, "Failed to record warning: {}", e);
            }
        }
        outcome
    }

    /// Closes the warning dialog. `Some(true)` asks for fullscreen again.
    pub fn dismiss_warning(&mut self) -> Option<bool> {
        self.violations.dismiss()
    }

    pub fn set_fullscreen(&mut self, fullscreen: bool) {
        self.violations.set_fullscreen(fullscreen);
    }

    pub fn poll_warning(&mut self, now: Instant) -> Option<ForceCause> {
        if !self.is_active() {
            return None;
        }
        self.violations.poll(now)
    }

    pub fn warning_deadline(&self) -> Option<Instant> {
        self.violations.deadline()
    }

    /// One countdown second. Returns `true` on the tick that reaches zero.
    pub fn tick(&mut self) -> bool {
        self.is_active() && self.countdown.tick()
    }

    /// Window closing mid-test: stop timing, push what is pending and ask the
    /// creator for permission to resume.
    pub async fn unload(&mut self) {
        if !self.is_active() {
            return;
        }
        self.phase = SessionPhase::Terminated;
        self.countdown.stop();
        self.tracker.stop(Instant::now());
        info!(attempt_id = %self.attempt_id, "test window unloading");

        let api = Arc::clone(&self.api);
        let attempt_id = self.attempt_id.clone();
        let batch = self.tracker.take_pending();
        let flush = async move {
            if !batch.is_empty() {
                if let Err(e) = api.sync_times(&attempt_id, &batch).await {
                    warn!("Failed to sync time data on unload: {}", e);
                }
            }
            if let Err(e) = api.request_resume(&attempt_id).await {
                warn!("Failed to request resume: {}", e);
            }
        };
        if tokio::time::timeout(self.settings.unload_flush_timeout, flush)
            .await
            .is_err()
        {
            warn!(attempt_id = %self.attempt_id, "unload flush timed out");
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.phase, SessionPhase::Active { .. })
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn attempt_id(&self) -> &str {
        &self.attempt_id
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn test(&self) -> Option<&Test> {
        self.test.as_ref()
    }

    pub fn cursor(&self) -> Option<Cursor> {
        self.active_cursor().ok()
    }

    pub fn current_question(&self) -> Option<&Question> {
        let cursor = self.cursor()?;
        self.test.as_ref()?.question_at(cursor.section, cursor.question)
    }

    /// 1-based number of the current question across all sections.
    pub fn question_number(&self) -> Option<usize> {
        let cursor = self.cursor()?;
        Some(self.layout.as_ref()?.global_index(cursor) + 1)
    }

    pub fn answers(&self) -> &AnswerStore {
        &self.answers
    }

    pub fn countdown(&self) -> &Countdown {
        &self.countdown
    }

    pub fn time_tracker(&self) -> &TimeTracker {
        &self.tracker
    }

    pub fn warning_count(&self) -> u32 {
        self.violations.count()
    }
}
