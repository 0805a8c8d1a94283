use super::stats::TriggerStats;
use crate::capture::FrameCapturer;
use crate::config::MotionCamConfig;
use crate::error::Result;
use crate::sensor::{EventSource, Readiness, TriggerEvent, TriggerKind};
use chrono::Local;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Loop parameters
#[derive(Debug, Clone)]
pub struct TriggerSettings {
    pub poll_timeout: Duration,
    pub payload_size: usize,
    pub output_path: PathBuf,
}

impl TriggerSettings {
    pub fn from_config(config: &MotionCamConfig) -> Self {
        Self {
            poll_timeout: config.sensor.poll_timeout(),
            payload_size: config.sensor.payload_size,
            output_path: config.capture.output_path(),
        }
    }
}

/// Waits on the sensor and captures one image per motion payload.
///
/// The shutdown token is checked once per iteration, so a cancellation is
/// seen within one poll timeout plus at most one capture. Captures run
/// synchronously on the loop's own thread.
pub struct TriggerLoop<S: EventSource, C: FrameCapturer> {
    source: S,
    capturer: C,
    settings: TriggerSettings,
    shutdown: CancellationToken,
    stats: TriggerStats,
}

impl<S: EventSource, C: FrameCapturer> TriggerLoop<S, C> {
    pub fn new(
        source: S,
        capturer: C,
        settings: TriggerSettings,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            source,
            capturer,
            settings,
            shutdown,
            stats: TriggerStats::default(),
        }
    }

    /// Run until cancelled or until the sensor fails.
    ///
    /// The sensor is told a consumer is active before the first wait, and
    /// inactive followed by close on every way out.
    pub fn run(mut self) -> Result<TriggerStats> {
        info!(
            "Trigger loop started, polling every {:?}",
            self.settings.poll_timeout
        );

        if let Err(e) = self.source.set_consumer_active(true) {
            warn!("Failed to notify sensor of active consumer: {}", e);
        }

        let outcome = self.poll_until_shutdown();

        if let Err(e) = self.source.set_consumer_active(false) {
            warn!("Failed to notify sensor of inactive consumer: {}", e);
        }
        if let Err(e) = self.source.close() {
            warn!("Failed to close sensor: {}", e);
        }

        info!("Trigger loop stopped: {}", self.stats);
        outcome.map(|()| self.stats)
    }

    fn poll_until_shutdown(&mut self) -> Result<()> {
        let mut buffer = vec![0u8; self.settings.payload_size];

        while !self.shutdown.is_cancelled() {
            self.stats.iterations += 1;

            match self.source.wait_readable(self.settings.poll_timeout) {
                Ok(Readiness::TimedOut) => {
                    self.stats.idle_timeouts += 1;
                    debug!("No movement detected");
                }
                Ok(Readiness::Interrupted) => {
                    self.stats.interrupts += 1;
                    trace!("Sensor wait interrupted");
                }
                Ok(Readiness::Readable) => self.handle_readable(&mut buffer),
                Err(e) if e.is_interrupted() => {
                    self.stats.interrupts += 1;
                    trace!("Sensor wait interrupted: {}", e);
                }
                Err(e) => {
                    error!("Poll error: {}", e);
                    return Err(e.into());
                }
            }
        }

        debug!("Shutdown requested, leaving trigger loop");
        Ok(())
    }

    fn handle_readable(&mut self, buffer: &mut [u8]) {
        let read = match self.source.read_payload(buffer) {
            Ok(read) => read,
            Err(e) => {
                self.stats.read_errors += 1;
                warn!("{}", e);
                return;
            }
        };

        let event = TriggerEvent::from_read(buffer, read);
        match event.kind {
            TriggerKind::Error => {
                self.stats.read_errors += 1;
                warn!("Empty read from sensor");
            }
            TriggerKind::NoMotion => {
                self.stats.non_motion_payloads += 1;
                debug!("No movement detected");
            }
            TriggerKind::Motion => {
                self.stats.motion_events += 1;
                info!(
                    "Motion detected! Time: {}",
                    Local::now().format("%a %b %e %H:%M:%S %Y")
                );
                self.capture();
            }
        }
    }

    fn capture(&mut self) {
        match self.capturer.capture(&self.settings.output_path) {
            Ok(report) => {
                self.stats.captures_succeeded += 1;
                info!(
                    "Image captured successfully and saved as {}",
                    report.path.display()
                );
            }
            Err(e) => {
                self.stats.captures_failed += 1;
                error!(stage = e.stage(), "Failed to capture image: {}", e);
            }
        }
    }
}
