use crate::error::Result;
use crate::services::api_client::ApiClient;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn ping(&self) -> Result<()>;
}

#[async_trait]
impl HealthCheck for ApiClient {
    async fn ping(&self) -> Result<()> {
        self.health().await
    }
}

#[derive(Default)]
struct State {
    components: BTreeSet<String>,
    task: Option<JoinHandle<()>>,
}

/// Keeps the backend warm while any registered component needs it.
#[derive(Clone)]
pub struct KeepAlive {
    probe: Arc<dyn HealthCheck>,
    interval: Duration,
    state: Arc<Mutex<State>>,
}

impl KeepAlive {
    pub fn new(probe: Arc<dyn HealthCheck>, interval: Duration) -> Self {
        Self {
            probe,
            interval,
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Registers `component`; the first registration pings immediately and
    /// then on every interval.
    pub fn start(&self, component: &str) {
        let mut state = self.state();
        state.components.insert(component.to_string());
        if state.task.is_some() {
            debug!(component, "keep-alive already running");
            return;
        }

        info!(component, interval_secs = self.interval.as_secs(), "starting keep-alive");
        let probe = Arc::clone(&self.probe);
        let period = self.interval;
        state.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                match probe.ping().await {
                    Ok(()) => debug!("keep-alive ping succeeded"),
                    Err(e) => warn!("Keep-alive ping failed: {}", e),
                }
            }
        }));
    }

    /// Unregisters `component`; pinging stops when nobody is left.
    pub fn stop(&self, component: &str) {
        let mut state = self.state();
        state.components.remove(component);
        if state.components.is_empty() {
            if let Some(task) = state.task.take() {
                task.abort();
                info!("keep-alive stopped");
            }
        } else {
            debug!(remaining = ?state.components, "keep-alive still needed");
        }
    }

    pub fn force_stop(&self) {
        let mut state = self.state();
        state.components.clear();
        if let Some(task) = state.task.take() {
            task.abort();
            info!("keep-alive force stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.state().task.is_some()
    }

    pub fn components(&self) -> Vec<String> {
        self.state().components.iter().cloned().collect()
    }
}
