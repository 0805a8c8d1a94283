use super::types::{Component, ComponentState, ShutdownReason};
use crate::config::MotionCamConfig;
use crate::error::Result;
use crate::trigger::TriggerStats;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Owns configuration, lifecycle state and the shutdown token for one run
pub struct MotionCamOrchestrator {
    pub(super) config: MotionCamConfig,

    // Lifecycle management
    pub(super) component_states: Arc<Mutex<HashMap<Component, ComponentState>>>,
    pub(super) shutdown_reason: Arc<Mutex<Option<ShutdownReason>>>,
    pub(super) cancellation_token: CancellationToken,
    pub(super) last_stats: Option<TriggerStats>,
}

impl MotionCamOrchestrator {
    /// Create an orchestrator for a validated configuration
    pub fn new(config: MotionCamConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            component_states: Arc::new(Mutex::new(HashMap::new())),
            shutdown_reason: Arc::new(Mutex::new(None)),
            cancellation_token: CancellationToken::new(),
            last_stats: None,
        })
    }

    pub fn config(&self) -> &MotionCamConfig {
        &self.config
    }

    /// Token that stops the trigger loop when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    pub async fn shutdown_reason(&self) -> Option<ShutdownReason> {
        self.shutdown_reason.lock().await.clone()
    }

    /// Statistics from the last completed run
    pub fn last_stats(&self) -> Option<&TriggerStats> {
        self.last_stats.as_ref()
    }
}
