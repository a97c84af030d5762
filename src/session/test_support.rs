use crate::dto::attempt_dto::AnswerPayload;
use crate::error::Error;
use crate::models::question::{Question, QuestionType};
use crate::models::test::{Section, Test};
use crate::models::test_attempt::TestAttempt;
use crate::services::api_client::MockAttemptApi;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

fn question(id: &str) -> Question {
    Question {
        id: id.to_string(),
        question_image: Some(format!("https://img.example/{}.png", id)),
        solution_image: None,
        correct_option: Some("A".to_string()),
        correct_integer: None,
        marks: 4,
    }
}

/// Two sections: Physics (MCQ p1, p2) and Chemistry (INTEGER c1, c2).
pub(crate) fn attempt(duration_minutes: u32) -> TestAttempt {
    let test = Test {
        id: "test-1".to_string(),
        name: "JEE Mock 1".to_string(),
        duration: duration_minutes,
        total_marks: 16,
        is_live: true,
        is_draft: false,
        sections: vec![
            Section {
                id: Some("s1".to_string()),
                name: "Physics".to_string(),
                question_type: QuestionType::Mcq,
                questions: vec![question("p1"), question("p2")],
            },
            Section {
                id: Some("s2".to_string()),
                name: "Chemistry".to_string(),
                question_type: QuestionType::Integer,
                questions: vec![question("c1"), question("c2")],
            },
        ],
        attempts: None,
    };
    TestAttempt {
        id: "att-1".to_string(),
        test_id: test.id.clone(),
        candidate_name: "Asha".to_string(),
        candidate_image: None,
        start_time: None,
        end_time: None,
        total_marks: 0,
        warning_count: 0,
        is_completed: false,
        answers: Vec::new(),
        test: Some(test),
    }
}

#[derive(Default)]
struct Calls {
    submits: usize,
    submitted: Vec<AnswerPayload>,
    time_batches: Vec<BTreeMap<String, u64>>,
    answer_syncs: usize,
    warnings: usize,
    resume_requests: usize,
    failing_submits: usize,
    failing_time_syncs: usize,
}

/// Mock backend that records every call for later assertions.
pub(crate) struct RecordingApi {
    attempt: TestAttempt,
    calls: Arc<Mutex<Calls>>,
}

impl RecordingApi {
    pub(crate) fn new(attempt: TestAttempt) -> Self {
        Self {
            attempt,
            calls: Arc::new(Mutex::new(Calls::default())),
        }
    }

    pub(crate) fn failing_submits(self, n: usize) -> Self {
        self.calls.lock().unwrap().failing_submits = n;
        self
    }

    pub(crate) fn failing_time_syncs(self, n: usize) -> Self {
        self.calls.lock().unwrap().failing_time_syncs = n;
        self
    }

    pub(crate) fn mock(&self) -> MockAttemptApi {
        let mut api = MockAttemptApi::new();

        let attempt = self.attempt.clone();
        api.expect_get_attempt()
            .returning(move |_| Ok(attempt.clone()));

        let calls = Arc::clone(&self.calls);
        api.expect_submit_attempt().returning(move |_, answers| {
            let mut calls = calls.lock().unwrap();
            calls.submits += 1;
            calls.submitted = answers.to_vec();
            if calls.failing_submits > 0 {
                calls.failing_submits -= 1;
                return Err(Error::Network("connection reset".to_string()));
            }
            Ok(())
        });

        let calls = Arc::clone(&self.calls);
        api.expect_sync_times().returning(move |_, batch| {
            let mut calls = calls.lock().unwrap();
            calls.time_batches.push(batch.clone());
            if calls.failing_time_syncs > 0 {
                calls.failing_time_syncs -= 1;
                return Err(Error::Timeout);
            }
            Ok(())
        });

        let calls = Arc::clone(&self.calls);
        api.expect_sync_answers().returning(move |_, _| {
            calls.lock().unwrap().answer_syncs += 1;
            Ok(())
        });

        let calls = Arc::clone(&self.calls);
        api.expect_report_warning().returning(move |_| {
            calls.lock().unwrap().warnings += 1;
            Ok(())
        });

        let calls = Arc::clone(&self.calls);
        api.expect_request_resume().returning(move |_| {
            calls.lock().unwrap().resume_requests += 1;
            Ok(())
        });

        api
    }

    pub(crate) fn submits(&self) -> usize {
        self.calls.lock().unwrap().submits
    }

    pub(crate) fn submitted_answers(&self) -> Vec<AnswerPayload> {
        self.calls.lock().unwrap().submitted.clone()
    }

    pub(crate) fn time_batches(&self) -> Vec<BTreeMap<String, u64>> {
        self.calls.lock().unwrap().time_batches.clone()
    }

    pub(crate) fn answer_syncs(&self) -> usize {
        self.calls.lock().unwrap().answer_syncs
    }

    pub(crate) fn warnings(&self) -> usize {
        self.calls.lock().unwrap().warnings
    }

    pub(crate) fn resume_requests(&self) -> usize {
        self.calls.lock().unwrap().resume_requests
    }
}
