use crate::config::SessionSettings;
use crate::session::platform::PlatformEvent;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    FullscreenExit,
    WindowSwitch,
    TabSwitch,
}

impl ViolationKind {
    pub fn reason(self) -> &'static str {
        match self {
            ViolationKind::FullscreenExit => "exiting fullscreen mode",
            ViolationKind::WindowSwitch => "window switching or Alt+Tab",
            ViolationKind::TabSwitch => "tab switching",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationState {
    Clean,
    Warned(u32),
    Terminal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForceCause {
    ThresholdReached,
    WarningTimeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationOutcome {
    Ignored,
    /// A new warning was recorded and the blocking dialog opened.
    Warned {
        count: u32,
        kind: ViolationKind,
        deadline: Instant,
    },
    /// Submission must be forced. `recorded` is the warning this trigger
    /// added, if it added one.
    Forced {
        cause: ForceCause,
        recorded: Option<(u32, ViolationKind)>,
    },
}

/// Escalating warning counter fed by platform events. Never decremented.
#[derive(Debug)]
pub struct ViolationMonitor {
    count: u32,
    max_warnings: u32,
    warning_timeout: std::time::Duration,
    blur_threshold: std::time::Duration,
    dialog_deadline: Option<Instant>,
    blurred_at: Option<Instant>,
    fullscreen: bool,
    terminal: bool,
}

impl ViolationMonitor {
    pub fn new(settings: &SessionSettings) -> Self {
        Self {
            count: 0,
            max_warnings: settings.max_warnings.max(1),
            warning_timeout: settings.warning_timeout,
            blur_threshold: settings.blur_threshold,
            dialog_deadline: None,
            blurred_at: None,
            fullscreen: false,
            terminal: false,
        }
    }

    pub fn handle(&mut self, event: PlatformEvent, now: Instant) -> ViolationOutcome {
        match event {
            PlatformEvent::FullscreenEntered => {
                self.fullscreen = true;
                ViolationOutcome::Ignored
            }
            PlatformEvent::FullscreenExited => {
                self.fullscreen = false;
                self.trigger(ViolationKind::FullscreenExit, now)
            }
            PlatformEvent::WindowBlurred => {
                self.blurred_at = Some(now);
                ViolationOutcome::Ignored
            }
            PlatformEvent::WindowFocused => match self.blurred_at.take() {
                Some(at) if now.saturating_duration_since(at) > self.blur_threshold => {
                    self.trigger(ViolationKind::WindowSwitch, now)
                }
                _ => ViolationOutcome::Ignored,
            },
            PlatformEvent::PageHidden => self.trigger(ViolationKind::TabSwitch, now),
            PlatformEvent::PageVisible | PlatformEvent::Unloading => ViolationOutcome::Ignored,
        }
    }

    fn trigger(&mut self, kind: ViolationKind, now: Instant) -> ViolationOutcome {
        if self.terminal || self.dialog_deadline.is_some() {
            return ViolationOutcome::Ignored;
        }
        if self.count >= self.max_warnings {
            self.terminal = true;
            return ViolationOutcome::Forced {
                cause: ForceCause::ThresholdReached,
                recorded: None,
            };
        }

        self.count += 1;
        tracing::info!(count = self.count, reason = kind.reason(), "test violation warning");

        if self.count >= self.max_warnings {
            self.terminal = true;
            return ViolationOutcome::Forced {
                cause: ForceCause::ThresholdReached,
                recorded: Some((self.count, kind)),
            };
        }

        let deadline = now + self.warning_timeout;
        self.dialog_deadline = Some(deadline);
        ViolationOutcome::Warned {
            count: self.count,
            kind,
            deadline,
        }
    }

    /// Candidate acknowledged the warning. Returns whether fullscreen must be
    /// requested again, or `None` when no dialog was open.
    pub fn dismiss(&mut self) -> Option<bool> {
        if self.terminal {
            return None;
        }
        self.dialog_deadline.take()?;
        Some(!self.fullscreen)
    }

    /// Fires the warning timeout once its deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<ForceCause> {
        match self.dialog_deadline {
            Some(deadline) if !self.terminal && now >= deadline => {
                tracing::info!("warning dialog timed out");
                self.dialog_deadline = None;
                self.terminal = true;
                Some(ForceCause::WarningTimeout)
            }
            _ => None,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        if self.terminal {
            None
        } else {
            self.dialog_deadline
        }
    }

    pub fn dialog_open(&self) -> bool {
        self.deadline().is_some()
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn set_fullscreen(&mut self, fullscreen: bool) {
        self.fullscreen = fullscreen;
    }

    pub fn state(&self) -> ViolationState {
        if self.terminal {
            ViolationState::Terminal
        } else if self.count == 0 {
            ViolationState::Clean
        } else {
            ViolationState::Warned(self.count)
        }
    }
}
