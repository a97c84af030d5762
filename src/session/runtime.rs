use crate::error::{Error, Result};
use crate::services::keep_alive::KeepAlive;
use crate::session::answer_store::KeypadKey;
use crate::session::controller::{
    QuestionSummary, SessionController, SubmitOutcome, SubmitReason,
};
use crate::session::navigation::Cursor;
use crate::session::platform::{Platform, PlatformEvent};
use crate::session::violation::ViolationOutcome;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, sleep, sleep_until, Instant};
use tracing::{error, info, warn};

const KEEP_ALIVE_COMPONENT: &str = "test-window";

/// Candidate input delivered to a running session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Navigate { section: usize, question: usize },
    Next,
    Previous,
    SelectSection(usize),
    SelectOption(String),
    IntegerInput(String),
    Keypad(KeypadKey),
    MarkForReviewAndNext,
    ClearResponse,
    RequestSubmit,
    ConfirmSubmit,
    DismissWarning,
    Platform(PlatformEvent),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    StudentDashboard,
}

impl Route {
    pub fn path(self) -> &'static str {
        match self {
            Route::StudentDashboard => "/student",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Loaded {
        test_name: String,
        questions: usize,
        remaining_secs: u64,
    },
    Tick {
        remaining_secs: u64,
        formatted: String,
    },
    QuestionChanged {
        cursor: Cursor,
        number: usize,
        question_id: String,
    },
    CommandRejected {
        message: String,
    },
    WarningShown {
        count: u32,
        max: u32,
        reason: &'static str,
        timeout: Duration,
    },
    WarningDismissed {
        fullscreen_requested: bool,
    },
    SubmitConfirmation(QuestionSummary),
    TimeUp,
    Submitted {
        reason: SubmitReason,
    },
    SubmitFailed {
        message: String,
    },
    Redirect {
        route: Route,
        after: Duration,
    },
    LoadFailed {
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    Submitted(SubmitReason),
    /// Forced submission ran but the backend never confirmed it.
    Abandoned(SubmitReason),
    /// The window closed mid-test; a resume request was sent.
    Unloaded,
}

/// Single task that owns the controller and every session timer.
pub struct SessionRuntime {
    controller: SessionController,
    platform: Box<dyn Platform>,
    commands: mpsc::Receiver<SessionCommand>,
    events: mpsc::UnboundedSender<SessionEvent>,
    keep_alive: Option<KeepAlive>,
}

impl SessionRuntime {
    pub fn new(
        controller: SessionController,
        platform: Box<dyn Platform>,
        commands: mpsc::Receiver<SessionCommand>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            controller,
            platform,
            commands,
            events,
            keep_alive: None,
        }
    }

    pub fn with_keep_alive(mut self, keep_alive: KeepAlive) -> Self {
        self.keep_alive = Some(keep_alive);
        self
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    fn emit(&self, event: SessionEvent) {
        // A dropped listener does not stop the session.
        let _ = self.events.send(event);
    }

    pub async fn run(mut self) -> Result<SessionOutcome> {
        if let Some(keep_alive) = &self.keep_alive {
            keep_alive.start(KEEP_ALIVE_COMPONENT);
        }
        let result = self.drive().await;
        if let Some(keep_alive) = &self.keep_alive {
            keep_alive.stop(KEEP_ALIVE_COMPONENT);
        }
        result
    }

    async fn drive(&mut self) -> Result<SessionOutcome> {
        if let Err(e) = self.controller.load().await {
            error!(attempt_id = %self.controller.attempt_id(), "Failed to load test: {}", e);
            self.emit(SessionEvent::LoadFailed {
                message: e.user_message(),
            });
            if e.redirects() {
                self.emit(SessionEvent::Redirect {
                    route: Route::StudentDashboard,
                    after: self.controller.settings().load_failure_redirect,
                });
            }
            return Err(e);
        }

        if let Err(e) = self.platform.request_fullscreen() {
            warn!("Could not enter fullscreen: {}", e);
        }
        self.controller.set_fullscreen(self.platform.is_fullscreen());

        let settings = *self.controller.settings();
        let remaining_secs = self.controller.countdown().remaining();
        if let Some(test) = self.controller.test() {
            self.emit(SessionEvent::Loaded {
                test_name: test.name.clone(),
                questions: test.question_count(),
                remaining_secs,
            });
        }
        self.emit_question();

        let start = Instant::now();
        let second = Duration::from_secs(1);
        let mut countdown = interval_at(start + second, second);
        let mut answer_sync =
            interval_at(start + settings.answer_sync_interval, settings.answer_sync_interval);
        let mut time_sync =
            interval_at(start + settings.time_sync_interval, settings.time_sync_interval);

        loop {
            let deadline = self.controller.warning_deadline();
            let far_future = Instant::now() + Duration::from_secs(86_400);

            tokio::select! {
                _ = countdown.tick() => {
                    let expired = self.controller.tick();
                    let clock = self.controller.countdown();
                    self.emit(SessionEvent::Tick {
                        remaining_secs: clock.remaining(),
                        formatted: clock.formatted(),
                    });
                    if expired {
                        info!(attempt_id = %self.controller.attempt_id(), "time is up");
                        self.emit(SessionEvent::TimeUp);
                        sleep(settings.time_up_grace).await;
                        return self.force_submit(SubmitReason::TimeUp).await;
                    }
                }
                _ = answer_sync.tick() => {
                    if let Err(e) = self.controller.sync_answers().await {
                        warn!("Failed to sync answers: {}", e);
                    }
                }
                _ = time_sync.tick() => {
                    if let Err(e) = self.controller.sync_times().await {
                        warn!("Failed to sync time data, retrying next cycle: {}", e);
                    }
                }
                _ = sleep_until(deadline.unwrap_or(far_future)), if deadline.is_some() => {
                    if let Some(cause) = self.controller.poll_warning(Instant::now()) {
                        return self.force_submit(cause.into()).await;
                    }
                }
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        self.controller.unload().await;
                        return Ok(SessionOutcome::Unloaded);
                    };
                    if let Some(outcome) = self.handle(command).await? {
                        return Ok(outcome);
                    }
                }
            }
        }
    }

    fn emit_question(&self) {
        let (Some(cursor), Some(number), Some(question)) = (
            self.controller.cursor(),
            self.controller.question_number(),
            self.controller.current_question(),
        ) else {
            return;
        };
        self.emit(SessionEvent::QuestionChanged {
            cursor,
            number,
            question_id: question.id.clone(),
        });
    }

    fn report(&self, result: Result<()>) {
        if let Err(e) = result {
            self.emit(SessionEvent::CommandRejected {
                message: e.user_message(),
            });
        }
    }

    async fn handle(&mut self, command: SessionCommand) -> Result<Option<SessionOutcome>> {
        if let SessionCommand::Platform(event) = &command {
            self.platform.observe(*event);
        }
        match command {
            SessionCommand::Navigate { section, question } => {
                let result = self.controller.navigate_to(section, question).await;
                self.report(result);
                self.emit_question();
            }
            SessionCommand::Next => {
                let result = self.controller.next().await;
                self.report(result);
                self.emit_question();
            }
            SessionCommand::Previous => {
                let result = self.controller.previous().await;
                self.report(result);
                self.emit_question();
            }
            SessionCommand::SelectSection(section) => {
                let result = self.controller.select_section(section).await;
                self.report(result);
                self.emit_question();
            }
            SessionCommand::SelectOption(option) => {
                let result = self.controller.select_option(&option);
                self.report(result);
            }
            SessionCommand::IntegerInput(text) => {
                let result = self.controller.integer_input(&text);
                self.report(result);
            }
            SessionCommand::Keypad(key) => {
                let result = self.controller.keypad(key);
                self.report(result);
            }
            SessionCommand::MarkForReviewAndNext => {
                let result = self.controller.mark_for_review_and_next().await;
                self.report(result);
                self.emit_question();
            }
            SessionCommand::ClearResponse => {
                let result = self.controller.clear_response();
                self.report(result);
            }
            SessionCommand::RequestSubmit => match self.controller.request_submit() {
                Ok(summary) => self.emit(SessionEvent::SubmitConfirmation(summary)),
                Err(e) => self.report(Err(e)),
            },
            SessionCommand::ConfirmSubmit => {
                return self.manual_submit().await;
            }
            SessionCommand::DismissWarning => {
                if let Some(refullscreen) = self.controller.dismiss_warning() {
                    if refullscreen {
                        if let Err(e) = self.platform.request_fullscreen() {
                            warn!("Could not re-enter fullscreen: {}", e);
                        }
                        self.controller.set_fullscreen(self.platform.is_fullscreen());
                    }
                    self.emit(SessionEvent::WarningDismissed {
                        fullscreen_requested: refullscreen,
                    });
                }
            }
            SessionCommand::Platform(PlatformEvent::Unloading) => {
                self.controller.unload().await;
                return Ok(Some(SessionOutcome::Unloaded));
            }
            SessionCommand::Platform(event) => {
                match self.controller.handle_platform(event).await {
                    ViolationOutcome::Ignored => {}
                    ViolationOutcome::Warned { count, kind, .. } => {
                        let settings = self.controller.settings();
                        self.emit(SessionEvent::WarningShown {
                            count,
                            max: settings.max_warnings,
                            reason: kind.reason(),
                            timeout: settings.warning_timeout,
                        });
                    }
                    ViolationOutcome::Forced { cause, .. } => {
                        return self.force_submit(cause.into()).await.map(Some);
                    }
                }
            }
        }
        Ok(None)
    }

    async fn manual_submit(&mut self) -> Result<Option<SessionOutcome>> {
        match self.controller.submit(SubmitReason::Manual).await {
            Ok(SubmitOutcome::Submitted(reason)) => {
                let after = self.controller.settings().submitted_redirect;
                Ok(Some(self.submitted(reason, after)))
            }
            Ok(SubmitOutcome::Abandoned(reason)) => Ok(Some(SessionOutcome::Abandoned(reason))),
            Ok(SubmitOutcome::Ignored) => Ok(None),
            Err(e) => {
                self.emit(SessionEvent::SubmitFailed {
                    message: format!("Failed to submit test: {}", e.user_message()),
                });
                Ok(None)
            }
        }
    }

    async fn force_submit(&mut self, reason: SubmitReason) -> Result<SessionOutcome> {
        match self.controller.submit(reason).await? {
            SubmitOutcome::Submitted(reason) => Ok(self.submitted(reason, Duration::ZERO)),
            SubmitOutcome::Abandoned(reason) => {
                self.emit(SessionEvent::SubmitFailed {
                    message: "Failed to submit test. Returning to dashboard.".to_string(),
                });
                self.redirect(Duration::ZERO);
                Ok(SessionOutcome::Abandoned(reason))
            }
            SubmitOutcome::Ignored => Err(Error::Internal(
                "Forced submission found the session inactive".to_string(),
            )),
        }
    }

    fn submitted(&self, reason: SubmitReason, after: Duration) -> SessionOutcome {
        self.emit(SessionEvent::Submitted { reason });
        self.redirect(after);
        SessionOutcome::Submitted(reason)
    }

    /// Forced submissions leave at once; a confirmed manual submit lingers.
    fn redirect(&self, after: Duration) {
        self.emit(SessionEvent::Redirect {
            route: Route::StudentDashboard,
            after,
        });
    }
}
