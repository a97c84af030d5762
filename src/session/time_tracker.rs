use std::collections::{BTreeMap, HashMap};
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct ActiveTimer {
    question_id: String,
    started_at: Instant,
}

/// Closed timing segment for one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub question_id: String,
    pub seconds: u64,
}

/// Accumulates active time per question. At most one question is timed at once.
#[derive(Debug, Default)]
pub struct TimeTracker {
    active: Option<ActiveTimer>,
    paused: Option<String>,
    hidden: bool,
    totals: HashMap<String, u64>,
    pending: BTreeMap<String, u64>,
}

impl TimeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts timing `question_id`, closing any running segment first. While
    /// the page is hidden the question is only parked until `resume`.
    pub fn start(&mut self, question_id: &str, now: Instant) -> Option<Segment> {
        let closed = if self.active.is_some() {
            tracing::debug!("previous question timer still active, stopping it first");
            self.stop(now)
        } else {
            None
        };
        if self.hidden {
            self.paused = Some(question_id.to_string());
            return closed;
        }
        self.paused = None;
        self.active = Some(ActiveTimer {
            question_id: question_id.to_string(),
            started_at: now,
        });
        closed
    }

    /// Closes the running segment. Whole seconds only; empty segments are dropped.
    pub fn stop(&mut self, now: Instant) -> Option<Segment> {
        let active = self.active.take()?;
        let seconds = now.saturating_duration_since(active.started_at).as_secs();
        if seconds == 0 {
            return None;
        }
        *self.totals.entry(active.question_id.clone()).or_insert(0) += seconds;
        *self.pending.entry(active.question_id.clone()).or_insert(0) += seconds;
        tracing::debug!(
            question_id = %active.question_id,
            seconds,
            pending_questions = self.pending.len(),
            "stopped question timer"
        );
        Some(Segment {
            question_id: active.question_id,
            seconds,
        })
    }

    /// Page hidden: stop timing but remember which question to resume.
    pub fn pause(&mut self, now: Instant) -> Option<Segment> {
        let question_id = self.active.as_ref().map(|a| a.question_id.clone());
        let closed = self.stop(now);
        if question_id.is_some() {
            self.paused = question_id;
        }
        self.hidden = true;
        closed
    }

    /// Page shown again: restart the question that was paused, if any.
    pub fn resume(&mut self, now: Instant) -> bool {
        self.hidden = false;
        match self.paused.take() {
            Some(question_id) if self.active.is_none() => {
                self.start(&question_id, now);
                true
            }
            _ => false,
        }
    }

    pub fn active_question(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.question_id.as_str())
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn is_tracking(&self) -> bool {
        self.active.is_some()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Hands the pending deltas to a sync attempt.
    pub fn take_pending(&mut self) -> BTreeMap<String, u64> {
        std::mem::take(&mut self.pending)
    }

    /// Puts back deltas whose sync failed so the next flush carries them.
    pub fn restore_pending(&mut self, batch: BTreeMap<String, u64>) {
        for (question_id, seconds) in batch {
            *self.pending.entry(question_id).or_insert(0) += seconds;
        }
    }

    /// Accumulated seconds for a question, including the running segment.
    pub fn current_time(&self, question_id: &str, now: Instant) -> u64 {
        let mut total = self.totals.get(question_id).copied().unwrap_or(0);
        if let Some(active) = &self.active {
            if active.question_id == question_id {
                total += now.saturating_duration_since(active.started_at).as_secs();
            }
        }
        total
    }

    pub fn total_time(&self) -> u64 {
        self.totals.values().sum()
    }

    pub fn totals(&self) -> &HashMap<String, u64> {
        &self.totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn switching_questions_closes_exactly_one_segment() {
        let t0 = Instant::now();
        let mut tracker = TimeTracker::new();

        assert!(tracker.start("a", t0).is_none());
        let closed = tracker.start("b", t0 + Duration::from_secs(7));
        assert_eq!(
            closed,
            Some(Segment {
                question_id: "a".into(),
                seconds: 7
            })
        );
        assert_eq!(tracker.active_question(), Some("b"));

        tracker.stop(t0 + Duration::from_secs(10));
        assert!(!tracker.is_tracking());
        assert_eq!(tracker.current_time("a", t0), 7);
        assert_eq!(tracker.current_time("b", t0), 3);
    }

    #[test]
    fn summed_time_matches_wall_clock_across_navigation() {
        let t0 = Instant::now();
        let mut tracker = TimeTracker::new();
        let mut now = t0;
        for (question, secs) in [("q1", 4), ("q2", 11), ("q1", 2), ("q3", 30)] {
            tracker.start(question, now);
            now += Duration::from_secs(secs);
        }
        tracker.stop(now);
        assert_eq!(tracker.total_time(), 47);
        assert_eq!(tracker.current_time("q1", now), 6);
    }

    #[test]
    fn sub_second_segments_are_dropped() {
        let t0 = Instant::now();
        let mut tracker = TimeTracker::new();
        tracker.start("a", t0);
        assert!(tracker.stop(t0 + Duration::from_millis(900)).is_none());
        assert!(!tracker.has_pending());
        assert!(tracker.stop(t0 + Duration::from_secs(5)).is_none());
    }

    #[test]
    fn failed_batch_is_merged_into_the_next_one() {
        let t0 = Instant::now();
        let mut tracker = TimeTracker::new();
        tracker.start("a", t0);
        tracker.start("b", t0 + Duration::from_secs(5));

        let failed = tracker.take_pending();
        assert_eq!(failed.get("a"), Some(&5));
        assert!(!tracker.has_pending());

        tracker.stop(t0 + Duration::from_secs(8));
        tracker.restore_pending(failed);

        let next = tracker.take_pending();
        assert_eq!(next.get("a"), Some(&5));
        assert_eq!(next.get("b"), Some(&3));
    }

    #[test]
    fn pause_and_resume_skip_the_hidden_gap() {
        let t0 = Instant::now();
        let mut tracker = TimeTracker::new();
        tracker.start("a", t0);
        tracker.pause(t0 + Duration::from_secs(3));
        assert!(!tracker.is_tracking());

        assert!(tracker.resume(t0 + Duration::from_secs(60)));
        assert_eq!(tracker.active_question(), Some("a"));
        tracker.stop(t0 + Duration::from_secs(62));
        assert_eq!(tracker.current_time("a", t0), 5);
        assert!(!tracker.resume(t0 + Duration::from_secs(70)));
    }

    #[test]
    fn questions_opened_while_hidden_wait_for_the_page() {
        let t0 = Instant::now();
        let mut tracker = TimeTracker::new();
        tracker.start("a", t0);
        tracker.pause(t0 + Duration::from_secs(2));

        tracker.start("b", t0 + Duration::from_secs(5));
        assert!(!tracker.is_tracking());
        assert!(tracker.is_hidden());

        assert!(tracker.resume(t0 + Duration::from_secs(105)));
        assert_eq!(tracker.active_question(), Some("b"));
        tracker.stop(t0 + Duration::from_secs(106));
        assert_eq!(tracker.current_time("a", t0), 2);
        assert_eq!(tracker.current_time("b", t0), 1);
        assert_eq!(tracker.total_time(), 3);
    }
}
