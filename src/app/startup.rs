use super::{Component, ComponentState, MotionCamOrchestrator};
use crate::camera::{DeviceOpener, V4l2Opener};
use crate::capture::CapturePipeline;
use crate::error::Result;
use crate::sensor::{EventSource, MotionSensor};
use tracing::{error, info, warn};

impl MotionCamOrchestrator {
    /// Register components and prepare the output location
    pub async fn initialize(&mut self) -> Result<()> {
        info!("Initializing motioncam components");

        for component in Component::ALL {
            self.set_component_state(component, ComponentState::Stopped)
                .await;
        }

        let output = self.config.capture.output_path();
        if let Some(dir) = output.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            if !dir.exists() {
                if self.config.capture.create_output_dir {
                    tokio::fs::create_dir_all(dir).await?;
                    info!("Created output directory {}", dir.display());
                } else {
                    warn!(
                        "Output directory {} does not exist, captures will fail",
                        dir.display()
                    );
                }
            }
        }

        info!("All components initialized successfully");
        Ok(())
    }

    /// Open the sensor and probe the capture device, then release both
    pub async fn check_devices(&self) -> Result<()> {
        let mut sensor = self.open_sensor().await?;
        sensor.close()?;
        self.set_component_state(Component::Sensor, ComponentState::Stopped)
            .await;

        CapturePipeline::from_config(V4l2Opener, &self.config.camera, &self.config.capture)
            .probe()
            .map_err(|e| {
                error!("Capture device check failed: {}", e);
                e
            })?;

        info!("Sensor and capture device are available");
        Ok(())
    }

    /// Open the sensor device; failure aborts startup
    pub(super) async fn open_sensor(&self) -> Result<MotionSensor> {
        self.set_component_state(Component::Sensor, ComponentState::Starting)
            .await;

        match MotionSensor::open(&self.config.sensor.device) {
            Ok(sensor) => {
                self.set_component_state(Component::Sensor, ComponentState::Running)
                    .await;
                Ok(sensor)
            }
            Err(e) => {
                self.set_component_state(Component::Sensor, ComponentState::Failed)
                    .await;
                error!("Failed to open motion sensor: {}", e);
                Err(e.into())
            }
        }
    }

    /// Build the capture pipeline, probing the device when configured to
    pub(super) async fn open_camera<O: DeviceOpener>(
        &self,
        opener: O,
    ) -> Result<CapturePipeline<O>> {
        self.set_component_state(Component::Camera, ComponentState::Starting)
            .await;

        let pipeline = CapturePipeline::from_config(opener, &self.config.camera, &self.config.capture);

        if self.config.camera.probe_on_startup {
            if let Err(e) = pipeline.probe() {
                self.set_component_state(Component::Camera, ComponentState::Failed)
                    .await;
                error!("Capture device check failed: {}", e);
                return Err(e.into());
            }
        }

        self.set_component_state(Component::Camera, ComponentState::Running)
            .await;
        info!(
            "Capture device {} ready ({}, {} buffer(s))",
            self.config.camera.device,
            pipeline.settings().requested,
            pipeline.settings().buffer_count
        );
        Ok(pipeline)
    }
}
