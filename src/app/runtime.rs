use super::{Component, ComponentState, MotionCamOrchestrator, ShutdownReason};
use crate::camera::V4l2Opener;
use crate::capture::FrameCapturer;
use crate::error::{MotionCamError, Result};
use crate::sensor::EventSource;
use crate::trigger::{TriggerLoop, TriggerSettings};
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;

impl MotionCamOrchestrator {
    /// Open the real devices and run until a signal or a fatal sensor error.
    ///
    /// Returns the process exit code.
    pub async fn run(&mut self) -> Result<i32> {
        let sensor = self.open_sensor().await?;
        let pipeline = self.open_camera(V4l2Opener).await?;
        self.run_with(sensor, pipeline).await
    }

    /// Run the trigger loop over the given collaborators
    pub async fn run_with<S, C>(&mut self, source: S, capturer: C) -> Result<i32>
    where
        S: EventSource + Send + 'static,
        C: FrameCapturer + Send + 'static,
    {
        self.setup_signal_handlers()?;

        self.set_component_state(Component::Trigger, ComponentState::Starting)
            .await;
        let trigger = TriggerLoop::new(
            source,
            capturer,
            TriggerSettings::from_config(&self.config),
            self.cancellation_token.clone(),
        );

        info!("Motioncam is running");
        let handle = tokio::task::spawn_blocking(move || trigger.run());
        self.set_component_state(Component::Trigger, ComponentState::Running)
            .await;

        let outcome = handle
            .await
            .map_err(|e| MotionCamError::system(format!("Trigger loop task failed: {}", e)))?;

        self.shutdown(outcome).await
    }

    /// Route SIGINT, SIGTERM and SIGQUIT into the shutdown token
    fn setup_signal_handlers(&self) -> Result<()> {
        let signals = [
            (SignalKind::interrupt(), "SIGINT"),
            (SignalKind::terminate(), "SIGTERM"),
            (SignalKind::quit(), "SIGQUIT"),
        ];

        for (kind, name) in signals {
            let mut stream = signal(kind)?;
            let token = self.cancellation_token.clone();
            let reason = Arc::clone(&self.shutdown_reason);

            tokio::spawn(async move {
                tokio::select! {
                    _ = token.cancelled() => {}
                    Some(()) = stream.recv() => {
                        info!("Received {} signal", name);
                        reason
                            .lock()
                            .await
                            .get_or_insert_with(|| ShutdownReason::Signal(name.to_string()));
                        token.cancel();
                    }
                }
            });
        }

        Ok(())
    }
}
