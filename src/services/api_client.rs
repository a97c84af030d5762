use crate::config::Config;
use crate::dto::attempt_dto::{
    AnswerPayload, AnswersRequest, ApiErrorBody, AttemptIdRequest, StartAttemptRequest,
    TimeSyncRequest, ToggleLiveRequest,
};
use crate::dto::test_dto::TestUpload;
use crate::error::{Error, Result};
use crate::models::resume_request::ResumeRequest;
use crate::models::test::Test;
use crate::models::test_attempt::TestAttempt;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Attempt endpoints used by the test window and the dashboards.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AttemptApi: Send + Sync {
    async fn start_attempt(&self, request: &StartAttemptRequest) -> Result<TestAttempt>;

    async fn get_attempt(&self, attempt_id: &str) -> Result<TestAttempt>;

    async fn sync_answers(&self, attempt_id: &str, answers: &[AnswerPayload]) -> Result<()>;

    async fn submit_attempt(&self, attempt_id: &str, answers: &[AnswerPayload]) -> Result<()>;

    async fn report_warning(&self, attempt_id: &str) -> Result<()>;

    async fn sync_times(&self, attempt_id: &str, question_times: &BTreeMap<String, u64>)
        -> Result<()>;

    async fn request_resume(&self, attempt_id: &str) -> Result<()>;

    async fn allow_resume(&self, attempt_id: &str) -> Result<()>;

    async fn resume_requests(&self) -> Result<Vec<ResumeRequest>>;

    async fn candidate_attempts(&self, candidate_name: &str) -> Result<Vec<TestAttempt>>;
}

/// Test catalogue and authoring endpoints.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TestApi: Send + Sync {
    async fn list_tests(&self) -> Result<Vec<Test>>;

    async fn live_tests(&self) -> Result<Vec<Test>>;

    async fn get_test(&self, test_id: &str) -> Result<Test>;

    async fn create_test(&self, upload: TestUpload) -> Result<Test>;

    async fn update_test(&self, test_id: &str, upload: TestUpload) -> Result<Test>;

    async fn toggle_live(&self, test_id: &str, is_live: bool) -> Result<()>;

    async fn delete_test(&self, test_id: &str) -> Result<()>;
}

/// Thin JSON client for the mock-test backend.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::Config(format!("Invalid API base URL {}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Config(format!("API base URL {} cannot be a base", base_url)));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.api_base_url, config.request_timeout)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Joins path segments onto the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Internal(format!("Cannot extend URL {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<(RequestBuilder, Url)> {
        let url = self.endpoint(segments)?;
        debug!("API request: {} {}", method, url);
        Ok((self.client.request(method, url.clone()), url))
    }

    async fn execute(&self, builder: RequestBuilder, url: &Url) -> Result<Response> {
        let response = builder.send().await.map_err(|e| {
            warn!("API request to {} failed: {}", url, e);
            Error::from(e)
        })?;
        let status = response.status();
        debug!("API response: {} - {}", url, status.as_u16());
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let body: ApiErrorBody = serde_json::from_str(&text).unwrap_or_default();
        let message = body.text().or_else(|| {
            let trimmed = text.trim();
            (!trimmed.is_empty() && !trimmed.starts_with('{')).then(|| trimmed.to_string())
        });
        warn!("API error from {}: {} {:?}", url, status, message);
        Err(Error::from_status(status, message, body.needs_resume))
    }

    async fn json<T: DeserializeOwned>(&self, builder: RequestBuilder, url: &Url) -> Result<T> {
        let response = self.execute(builder, url).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn empty(&self, builder: RequestBuilder, url: &Url) -> Result<()> {
        self.execute(builder, url).await?;
        Ok(())
    }

    async fn post_attempt_id(&self, action: &str, attempt_id: &str) -> Result<()> {
        let (builder, url) = self.request(Method::POST, &["attempts", action])?;
        let body = AttemptIdRequest {
            attempt_id: attempt_id.to_string(),
        };
        self.empty(builder.json(&body), &url).await
    }

    /// Liveness probe used by the keep-alive pinger.
    pub async fn health(&self) -> Result<()> {
        let (builder, url) = self.request(Method::GET, &["health"])?;
        self.empty(builder, &url).await
    }

    fn multipart(upload: TestUpload) -> Result<Form> {
        let sections = serde_json::to_string(&upload.sections)?;
        let mut form = Form::new()
            .text("name", upload.name)
            .text("duration", upload.duration_minutes.to_string())
            .text("isDraft", upload.is_draft.to_string())
            .text("sections", sections);
        for image in upload.images {
            let part = Part::bytes(image.file.bytes)
                .file_name(image.file.file_name)
                .mime_str(&image.file.content_type)?;
            form = form.part(image.field, part);
        }
        Ok(form)
    }
}

#[async_trait]
impl AttemptApi for ApiClient {
    async fn start_attempt(&self, request: &StartAttemptRequest) -> Result<TestAttempt> {
        let (builder, url) = self.request(Method::POST, &["attempts", "start"])?;
        self.json(builder.json(request), &url).await
    }

    async fn get_attempt(&self, attempt_id: &str) -> Result<TestAttempt> {
        let (builder, url) = self.request(Method::GET, &["attempts", attempt_id])?;
        self.json(builder, &url).await
    }

    async fn sync_answers(&self, attempt_id: &str, answers: &[AnswerPayload]) -> Result<()> {
        let (builder, url) = self.request(Method::POST, &["attempts", "sync"])?;
        let body = AnswersRequest {
            attempt_id: attempt_id.to_string(),
            answers: answers.to_vec(),
        };
        self.empty(builder.json(&body), &url).await
    }

    async fn submit_attempt(&self, attempt_id: &str, answers: &[AnswerPayload]) -> Result<()> {
        let (builder, url) = self.request(Method::POST, &["attempts", "submit"])?;
        let body = AnswersRequest {
            attempt_id: attempt_id.to_string(),
            answers: answers.to_vec(),
        };
        self.empty(builder.json(&body), &url).await
    }

    async fn report_warning(&self, attempt_id: &str) -> Result<()> {
        self.post_attempt_id("warning", attempt_id).await
    }

    async fn sync_times(
        &self,
        attempt_id: &str,
        question_times: &BTreeMap<String, u64>,
    ) -> Result<()> {
        let (builder, url) =
            self.request(Method::POST, &["attempts", attempt_id, "sync-times"])?;
        let body = TimeSyncRequest {
            question_times: question_times.clone(),
        };
        self.empty(builder.json(&body), &url).await
    }

    async fn request_resume(&self, attempt_id: &str) -> Result<()> {
        self.post_attempt_id("request-resume", attempt_id).await
    }

    async fn allow_resume(&self, attempt_id: &str) -> Result<()> {
        self.post_attempt_id("allow-resume", attempt_id).await
    }

    async fn resume_requests(&self) -> Result<Vec<ResumeRequest>> {
        let (builder, url) = self.request(Method::GET, &["attempts", "resume-requests"])?;
        self.json(builder, &url).await
    }

    async fn candidate_attempts(&self, candidate_name: &str) -> Result<Vec<TestAttempt>> {
        let (builder, url) = self.request(Method::GET, &["attempts", "user", candidate_name])?;
        self.json(builder, &url).await
    }
}

#[async_trait]
impl TestApi for ApiClient {
    async fn list_tests(&self) -> Result<Vec<Test>> {
        let (builder, url) = self.request(Method::GET, &["tests"])?;
        self.json(builder, &url).await
    }

    async fn live_tests(&self) -> Result<Vec<Test>> {
        let (builder, url) = self.request(Method::GET, &["tests", "live"])?;
        self.json(builder, &url).await
    }

    async fn get_test(&self, test_id: &str) -> Result<Test> {
        let (builder, url) = self.request(Method::GET, &["tests", test_id])?;
        self.json(builder, &url).await
    }

    async fn create_test(&self, upload: TestUpload) -> Result<Test> {
        let form = Self::multipart(upload)?;
        let (builder, url) = self.request(Method::POST, &["tests"])?;
        self.json(builder.multipart(form), &url).await
    }

    async fn update_test(&self, test_id: &str, upload: TestUpload) -> Result<Test> {
        let form = Self::multipart(upload)?;
        let (builder, url) = self.request(Method::PUT, &["tests", test_id])?;
        self.json(builder.multipart(form), &url).await
    }

    async fn toggle_live(&self, test_id: &str, is_live: bool) -> Result<()> {
        let (builder, url) = self.request(Method::PATCH, &["tests", test_id, "toggle-live"])?;
        self.empty(builder.json(&ToggleLiveRequest { is_live }), &url).await
    }

    async fn delete_test(&self, test_id: &str) -> Result<()> {
        let (builder, url) = self.request(Method::DELETE, &["tests", test_id])?;
        self.empty(builder, &url).await
    }
}
