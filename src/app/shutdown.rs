use super::{Component, ComponentState, MotionCamOrchestrator, ShutdownReason};
use crate::error::Result;
use crate::trigger::TriggerStats;
use tracing::{error, info};

impl MotionCamOrchestrator {
    /// Record how the trigger loop ended and settle component states
    pub(super) async fn shutdown(&mut self, outcome: Result<TriggerStats>) -> Result<i32> {
        info!("Beginning shutdown");
        self.cancellation_token.cancel();

        let loop_state = match outcome {
            Ok(stats) => {
                self.last_stats = Some(stats);
                self.shutdown_reason
                    .lock()
                    .await
                    .get_or_insert(ShutdownReason::Requested);
                ComponentState::Stopped
            }
            Err(e) => {
                error!("Trigger loop terminated: {}", e);
                *self.shutdown_reason.lock().await = Some(ShutdownReason::Error(e.to_string()));
                ComponentState::Failed
            }
        };

        self.set_component_state(Component::Trigger, loop_state)
            .await;
        self.set_component_state(Component::Sensor, loop_state)
            .await;
        self.set_component_state(Component::Camera, ComponentState::Stopped)
            .await;

        let reason = self
            .shutdown_reason()
            .await
            .unwrap_or(ShutdownReason::Requested);
        let exit_code = reason.exit_code();

        if let Some(stats) = &self.last_stats {
            info!("Run statistics: {}", stats);
        }
        info!(
            "Shutdown completed ({:?}) with exit code: {}",
            reason, exit_code
        );
        Ok(exit_code)
    }
}
