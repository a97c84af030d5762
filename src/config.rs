use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

const DEFAULT_API_BASE_URL: &str = "http://localhost:5001/api";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    pub request_timeout: Duration,
    pub session: SessionSettings,
    pub keep_alive_interval: Duration,
    pub candidate_store_path: PathBuf,
    pub percentile_table_path: Option<PathBuf>,
    pub log_format: LogFormat,
}

/// Timing knobs for one test-taking session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub answer_sync_interval: Duration,
    pub time_sync_interval: Duration,
    pub warning_timeout: Duration,
    pub max_warnings: u32,
    pub blur_threshold: Duration,
    pub time_up_grace: Duration,
    pub min_countdown_secs: u64,
    pub load_failure_redirect: Duration,
    pub submitted_redirect: Duration,
    pub unload_flush_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            answer_sync_interval: Duration::from_secs(15),
            time_sync_interval: Duration::from_secs(15),
            warning_timeout: Duration::from_secs(60),
            max_warnings: 5,
            blur_threshold: Duration::from_millis(500),
            time_up_grace: Duration::from_secs(1),
            min_countdown_secs: 10,
            load_failure_redirect: Duration::from_secs(3),
            submitted_redirect: Duration::from_secs(2),
            unload_flush_timeout: Duration::from_secs(2),
        }
    }
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let defaults = SessionSettings::default();
        let session = SessionSettings {
            answer_sync_interval: Duration::from_secs(get_env_or("SYNC_INTERVAL_SECS", 15)?),
            time_sync_interval: Duration::from_secs(get_env_or("TIME_SYNC_INTERVAL_SECS", 15)?),
            warning_timeout: Duration::from_secs(get_env_or("WARNING_TIMEOUT_SECS", 60)?),
            max_warnings: get_env_or("MAX_WARNINGS", 5)?,
            blur_threshold: Duration::from_millis(get_env_or("BLUR_THRESHOLD_MS", 500)?),
            ..defaults
        };
        if session.max_warnings == 0 {
            return Err(Error::Config("MAX_WARNINGS must be at least 1".to_string()));
        }
        if session.answer_sync_interval.is_zero() || session.time_sync_interval.is_zero() {
            return Err(Error::Config("Sync intervals must be positive".to_string()));
        }

        let log_format = match env::var("LOG_FORMAT").ok().as_deref() {
            None | Some("") | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(Error::Config(format!("Invalid value for LOG_FORMAT: {}", other)))
            }
        };

        Ok(Self {
            api_base_url: env::var("API_BASE_URL")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            request_timeout: Duration::from_secs(get_env_or("REQUEST_TIMEOUT_SECS", 120)?),
            session,
            keep_alive_interval: Duration::from_secs(get_env_or("KEEP_ALIVE_INTERVAL_SECS", 600)?),
            candidate_store_path: env::var("CANDIDATE_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".mocktest/candidate.json")),
            percentile_table_path: env::var("PERCENTILE_TABLE_PATH").ok().map(PathBuf::from),
            log_format,
        })
    }
}

fn get_env_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        _ => Ok(default),
    }
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}
