use crate::error::Result;
use crate::models::resume_request::ResumeRequest;
use crate::models::test::Test;
use crate::services::api_client::{AttemptApi, TestApi};
use crate::services::test_builder::TestBuilder;
use std::sync::Arc;
use tracing::info;

/// Creator dashboard buckets.
#[derive(Debug, Clone, Default)]
pub struct TestCategories {
    /// Not live and never attempted.
    pub new: Vec<Test>,
    pub live: Vec<Test>,
    /// Not live with at least one completed attempt.
    pub attempted: Vec<Test>,
}

pub fn categorize(tests: &[Test]) -> TestCategories {
    let mut categories = TestCategories::default();
    for test in tests {
        let attempts = test.attempts.as_deref().unwrap_or_default();
        if test.is_live {
            categories.live.push(test.clone());
        } else if attempts.is_empty() {
            categories.new.push(test.clone());
        } else if attempts.iter().any(|a| a.is_completed) {
            categories.attempted.push(test.clone());
        }
    }
    categories
}

#[derive(Clone)]
pub struct CreatorService {
    tests: Arc<dyn TestApi>,
    attempts: Arc<dyn AttemptApi>,
}

impl CreatorService {
    pub fn new(tests: Arc<dyn TestApi>, attempts: Arc<dyn AttemptApi>) -> Self {
        Self { tests, attempts }
    }

    pub async fn overview(&self) -> Result<TestCategories> {
        let tests = self.tests.list_tests().await?;
        Ok(categorize(&tests))
    }

    pub async fn resume_requests(&self) -> Result<Vec<ResumeRequest>> {
        self.attempts.resume_requests().await
    }

    pub async fn resume_requests_for(&self, test_id: &str) -> Result<Vec<ResumeRequest>> {
        let requests = self.attempts.resume_requests().await?;
        Ok(requests.into_iter().filter(|r| r.test.id == test_id).collect())
    }

    pub async fn allow_resume(&self, attempt_id: &str) -> Result<()> {
        self.attempts.allow_resume(attempt_id).await?;
        info!(attempt_id, "resume permission granted");
        Ok(())
    }

    pub async fn toggle_live(&self, test_id: &str, is_live: bool) -> Result<()> {
        self.tests.toggle_live(test_id, is_live).await?;
        info!(test_id, is_live, "test live status updated");
        Ok(())
    }

    pub async fn delete_test(&self, test_id: &str) -> Result<()> {
        self.tests.delete_test(test_id).await?;
        info!(test_id, "test deleted");
        Ok(())
    }

    /// Creates or updates depending on the builder's editing target, then
    /// resets the builder. On failure the form is kept.
    pub async fn save(&self, builder: &mut TestBuilder, draft: bool) -> Result<Test> {
        let upload = builder.build(draft)?;
        let saved = match builder.editing_id() {
            Some(test_id) => self.tests.update_test(test_id, upload).await?,
            None => self.tests.create_test(upload).await?,
        };
        info!(test_id = %saved.id, draft, "test saved");
        builder.reset();
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::models::resume_request::TestRef;
    use crate::models::test::AttemptSummary;
    use crate::services::api_client::{MockAttemptApi, MockTestApi};

    fn test(id: &str, is_live: bool, attempts: Option<Vec<bool>>) -> Test {
        Test {
            id: id.to_string(),
            name: id.to_uppercase(),
            duration: 180,
            total_marks: 0,
            is_live,
            is_draft: false,
            sections: Vec::new(),
            attempts: attempts.map(|flags| {
                flags
                    .into_iter()
                    .enumerate()
                    .map(|(i, done)| AttemptSummary {
                        id: format!("{}-{}", id, i),
                        candidate_name: None,
                        is_completed: done,
                    })
                    .collect()
            }),
        }
    }

    #[test]
    fn categorizes_by_live_flag_and_attempts() {
        let tests = vec![
            test("fresh", false, None),
            test("empty", false, Some(vec![])),
            test("live", true, Some(vec![true])),
            test("done", false, Some(vec![false, true])),
            test("abandoned", false, Some(vec![false])),
        ];
        let categories = categorize(&tests);
        let ids = |v: &[Test]| v.iter().map(|t| t.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&categories.new), vec!["fresh", "empty"]);
        assert_eq!(ids(&categories.live), vec!["live"]);
        assert_eq!(ids(&categories.attempted), vec!["done"]);
    }

    #[tokio::test]
    async fn resume_requests_are_grouped_per_test() {
        let mut attempts = MockAttemptApi::new();
        attempts.expect_resume_requests().returning(|| {
            Ok(["t1", "t2", "t1"]
                .iter()
                .enumerate()
                .map(|(i, test_id)| ResumeRequest {
                    id: format!("a{}", i),
                    candidate_name: "Asha".into(),
                    test: TestRef {
                        id: test_id.to_string(),
                        name: String::new(),
                    },
                    requested_at: None,
                })
                .collect())
        });
        let service = CreatorService::new(Arc::new(MockTestApi::new()), Arc::new(attempts));
        let for_t1 = service.resume_requests_for("t1").await.unwrap();
        let ids: Vec<&str> = for_t1.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a0", "a2"]);
    }

    #[tokio::test]
    async fn save_updates_when_editing_and_resets_the_form() {
        let mut tests = MockTestApi::new();
        tests
            .expect_update_test()
            .withf(|id, upload| id == "t-7" && upload.name == "Renamed")
            .times(1)
            .returning(|id, upload| {
                Ok(Test {
                    id: id.to_string(),
                    name: upload.name,
                    duration: upload.duration_minutes,
                    total_marks: 0,
                    is_live: false,
                    is_draft: upload.is_draft,
                    sections: Vec::new(),
                    attempts: None,
                })
            });
        tests.expect_create_test().never();
        let service = CreatorService::new(Arc::new(tests), Arc::new(MockAttemptApi::new()));

        let mut builder = TestBuilder::new();
        builder.edit(&test("t-7", false, None));
        builder.set_name("Renamed");
        builder.add_question(0).unwrap();

        let saved = service.save(&mut builder, true).await.unwrap();
        assert_eq!(saved.id, "t-7");
        assert!(saved.is_draft);
        assert_eq!(builder.editing_id(), None);
    }

    #[tokio::test]
    async fn failed_save_keeps_the_form() {
        let mut tests = MockTestApi::new();
        tests
            .expect_create_test()
            .returning(|_| Err(Error::Timeout));
        let service = CreatorService::new(Arc::new(tests), Arc::new(MockAttemptApi::new()));

        let mut builder = TestBuilder::new();
        builder.set_name("New");
        builder.add_question(0).unwrap();
        assert!(matches!(
            service.save(&mut builder, true).await,
            Err(Error::Timeout)
        ));
        assert_eq!(builder.name(), "New");
    }
}
