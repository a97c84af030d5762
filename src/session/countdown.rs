use crate::utils::time::format_clock;

/// Whole-second countdown. The owner drives it with one `tick()` per second.
#[derive(Debug, Clone)]
pub struct Countdown {
    remaining: u64,
    running: bool,
    expired: bool,
}

impl Countdown {
    pub fn new(seconds: u64) -> Self {
        Self {
            remaining: seconds,
            running: false,
            expired: false,
        }
    }

    pub fn start(&mut self) {
        if !self.expired {
            self.running = true;
        }
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Re-arms the countdown at `seconds`, stopped.
    pub fn reset(&mut self, seconds: u64) {
        self.remaining = seconds;
        self.running = false;
        self.expired = false;
    }

    /// Advances one second. Returns `true` exactly once, on the tick that reaches zero.
    pub fn tick(&mut self) -> bool {
        if !self.running || self.expired {
            return false;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.running = false;
            self.expired = true;
            return true;
        }
        false
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_expired(&self) -> bool {
        self.expired
    }

    pub fn formatted(&self) -> String {
        format_clock(self.remaining)
    }
}
