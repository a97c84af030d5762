pub mod config;
pub mod dto;
pub mod error;
pub mod models;
pub mod services;
pub mod session;
pub mod utils;

use crate::config::Config;
use crate::error::Result;
use crate::services::{
    analytics_service::{AnalyticsService, RankTable},
    api_client::ApiClient,
    candidate_store::CandidateStore,
    creator_service::CreatorService,
    keep_alive::KeepAlive,
    student_service::StudentService,
};
use crate::session::SessionController;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub api: Arc<ApiClient>,
    pub candidates: CandidateStore,
    pub keep_alive: KeepAlive,
    pub student_service: StudentService,
    pub creator_service: CreatorService,
    pub analytics_service: AnalyticsService,
}

impl AppState {
    pub async fn new(config: &Config) -> Result<Self> {
        let api = Arc::new(ApiClient::from_config(config)?);
        let candidates = CandidateStore::new(config.candidate_store_path.clone());
        let table = RankTable::from_config(config.percentile_table_path.as_deref()).await?;

        let keep_alive = KeepAlive::new(api.clone(), config.keep_alive_interval);
        let student_service = StudentService::new(api.clone(), api.clone(), candidates.clone());
        let creator_service = CreatorService::new(api.clone(), api.clone());
        let analytics_service = AnalyticsService::new(api.clone(), table);

        Ok(Self {
            api,
            candidates,
            keep_alive,
            student_service,
            creator_service,
            analytics_service,
        })
    }

    /// Fresh controller for one test window.
    pub fn session(&self, config: &Config, attempt_id: &str) -> SessionController {
        SessionController::new(self.api.clone(), config.session, attempt_id)
    }
}
