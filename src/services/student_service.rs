use crate::dto::attempt_dto::StartAttemptRequest;
use crate::error::{Error, Result};
use crate::models::test::Test;
use crate::models::test_attempt::TestAttempt;
use crate::services::api_client::{AttemptApi, TestApi};
use crate::services::candidate_store::CandidateStore;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone)]
pub struct StudentDashboard {
    /// Live tests the candidate has not completed yet.
    pub live_tests: Vec<Test>,
    pub attempts: Vec<TestAttempt>,
}

/// Share of graded answers that are correct, as a one-decimal percentage.
pub fn accuracy(attempt: &TestAttempt) -> String {
    let graded: Vec<bool> = attempt.answers.iter().filter_map(|a| a.is_correct).collect();
    if graded.is_empty() {
        return "0.0".to_string();
    }
    let correct = graded.iter().filter(|c| **c).count();
    format!("{:.1}", correct as f64 / graded.len() as f64 * 100.0)
}

#[derive(Clone)]
pub struct StudentService {
    tests: Arc<dyn TestApi>,
    attempts: Arc<dyn AttemptApi>,
    candidates: CandidateStore,
}

impl StudentService {
    pub fn new(
        tests: Arc<dyn TestApi>,
        attempts: Arc<dyn AttemptApi>,
        candidates: CandidateStore,
    ) -> Self {
        Self {
            tests,
            attempts,
            candidates,
        }
    }

    pub async fn dashboard(&self) -> Result<StudentDashboard> {
        let candidate = self.candidates.require().await?;
        let (live, attempts) = tokio::try_join!(
            self.tests.live_tests(),
            self.attempts.candidate_attempts(&candidate.candidate_name)
        )?;

        let completed: HashSet<&str> = attempts
            .iter()
            .filter(|a| a.is_completed)
            .map(|a| a.test_id.as_str())
            .collect();
        let live_tests = live
            .into_iter()
            .filter(|t| !completed.contains(t.id.as_str()))
            .collect();

        Ok(StudentDashboard {
            live_tests,
            attempts,
        })
    }

    /// Test shown on the instructions page.
    pub async fn instructions(&self, test_id: &str) -> Result<Test> {
        self.tests.get_test(test_id).await
    }

    /// Starts (or resumes) an attempt once the instructions were agreed to.
    pub async fn start_test(&self, test_id: &str, agreed: bool) -> Result<TestAttempt> {
        if !agreed {
            return Err(Error::InvalidInput(
                "Please read and agree to all instructions before starting the test.".to_string(),
            ));
        }
        let candidate = self.candidates.require().await?;
        let request = StartAttemptRequest {
            test_id: test_id.to_string(),
            candidate_name: candidate.candidate_name,
            candidate_image: candidate.candidate_image,
        };
        let attempt = self.attempts.start_attempt(&request).await?;
        info!(attempt_id = %attempt.id, test_id, "attempt started");
        Ok(attempt)
    }
}
