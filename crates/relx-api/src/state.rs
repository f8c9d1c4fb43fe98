//! Application state management
//!
//! Author: hephaex@gmail.com

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;

use relx_core::AppConfig;
use relx_pipeline::PredictionFacade;

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Server start time
    pub start_time: Instant,
    /// Request counter
    pub request_count: AtomicU64,
    /// Loaded prediction facade; invocations run one at a time
    facade: Option<Arc<Mutex<PredictionFacade>>>,
}

impl AppState {
    /// State without a model; `/ping` reports unavailable
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            start_time: Instant::now(),
            request_count: AtomicU64::new(0),
            facade: None,
        }
    }

    /// State serving an already assembled facade
    pub fn with_facade(config: AppConfig, facade: PredictionFacade) -> Self {
        Self {
            facade: Some(Arc::new(Mutex::new(facade))),
            ..Self::new(config)
        }
    }

    /// Load schema, vocabulary and checkpoint named by `config`
    pub fn from_config(config: AppConfig) -> relx_core::Result<Self> {
        let facade = PredictionFacade::from_config(&config)?;
        Ok(Self::with_facade(config, facade))
    }

    /// Increment request counter
    pub fn increment_requests(&self) -> u64 {
        self.request_count.fetch_add(1, Ordering::SeqCst)
    }

    /// Get total request count
    pub fn get_request_count(&self) -> u64 {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn is_model_loaded(&self) -> bool {
        self.facade.is_some()
    }

    pub fn facade(&self) -> Option<Arc<Mutex<PredictionFacade>>> {
        self.facade.clone()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}
