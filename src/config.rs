use crate::frame::{CaptureFormat, FieldOrder, PixelFormat};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MotionCamConfig {
    pub sensor: SensorConfig,
    pub camera: CameraConfig,
    pub capture: CaptureConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SensorConfig {
    /// Motion sensor character device
    #[serde(default = "default_sensor_device")]
    pub device: String,

    /// Upper bound on each wait for a sensor event, in milliseconds
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,

    /// Bytes read from the sensor per event
    #[serde(default = "default_payload_size")]
    pub payload_size: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    /// V4L2 capture device
    #[serde(default = "default_camera_device")]
    pub device: String,

    /// Requested resolution (width, height)
    #[serde(default = "default_camera_resolution")]
    pub resolution: (u32, u32),

    /// Requested pixel format as a fourcc (RGB3 is packed RGB24)
    #[serde(default = "default_pixel_format")]
    pub pixel_format: PixelFormat,

    /// Requested field order
    #[serde(default = "default_field")]
    pub field: FieldOrder,

    /// Number of memory-mapped buffers requested per capture
    #[serde(default = "default_buffer_count")]
    pub buffer_count: u32,

    /// Upper bound on waiting for the device to fill a buffer, in milliseconds
    #[serde(default = "default_dequeue_timeout_ms")]
    pub dequeue_timeout_ms: u64,

    /// Accept a different resolution substituted by the driver
    #[serde(default = "default_allow_resolution_change")]
    pub allow_resolution_change: bool,

    /// Open the device once at startup and refuse to start if it is missing
    #[serde(default = "default_probe_on_startup")]
    pub probe_on_startup: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CaptureConfig {
    /// Image written on every motion trigger (overwritten each time)
    #[serde(default = "default_output_path")]
    pub output_path: String,

    /// JPEG quality, 1-100
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// Create the output directory at startup if it does not exist
    #[serde(default = "default_create_output_dir")]
    pub create_output_dir: bool,
}

impl MotionCamConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("motioncam.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("sensor.device", default_sensor_device())?
            .set_default("sensor.poll_timeout_ms", default_poll_timeout_ms())?
            .set_default("sensor.payload_size", default_payload_size() as u64)?
            .set_default("camera.device", default_camera_device())?
            .set_default(
                "camera.resolution",
                vec![default_camera_resolution().0, default_camera_resolution().1],
            )?
            .set_default("camera.pixel_format", default_pixel_format().to_string())?
            .set_default("camera.field", "interlaced")?
            .set_default("camera.buffer_count", default_buffer_count())?
            .set_default("camera.dequeue_timeout_ms", default_dequeue_timeout_ms())?
            .set_default(
                "camera.allow_resolution_change",
                default_allow_resolution_change(),
            )?
            .set_default("camera.probe_on_startup", default_probe_on_startup())?
            .set_default("capture.output_path", default_output_path())?
            .set_default("capture.jpeg_quality", default_jpeg_quality() as u64)?
            .set_default("capture.create_output_dir", default_create_output_dir())?
            .add_source(File::with_name(&path_str).required(false))
            // MOTIONCAM_CAMERA__DEVICE=/dev/video1
            .add_source(
                Environment::with_prefix("MOTIONCAM")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: MotionCamConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sensor.device.is_empty() {
            return Err(ConfigError::Message(
                "Sensor device path must not be empty".to_string(),
            ));
        }

        if self.sensor.poll_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "Sensor poll_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.sensor.payload_size == 0 {
            return Err(ConfigError::Message(
                "Sensor payload_size must be greater than 0".to_string(),
            ));
        }

        if self.camera.device.is_empty() {
            return Err(ConfigError::Message(
                "Camera device path must not be empty".to_string(),
            ));
        }

        if self.camera.resolution.0 == 0 || self.camera.resolution.1 == 0 {
            return Err(ConfigError::Message(
                "Camera resolution must be greater than 0".to_string(),
            ));
        }

        if self.camera.pixel_format != PixelFormat::Rgb24 {
            return Err(ConfigError::Message(format!(
                "Camera pixel_format {} cannot be encoded, only RGB3 is supported",
                self.camera.pixel_format
            )));
        }

        if !(1..=32).contains(&self.camera.buffer_count) {
            return Err(ConfigError::Message(
                "Camera buffer_count must be between 1 and 32".to_string(),
            ));
        }

        if self.camera.dequeue_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "Camera dequeue_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.capture.output_path.is_empty() {
            return Err(ConfigError::Message(
                "Capture output_path must not be empty".to_string(),
            ));
        }

        if !(1..=100).contains(&self.capture.jpeg_quality) {
            return Err(ConfigError::Message(
                "Capture jpeg_quality must be between 1 and 100".to_string(),
            ));
        }

        Ok(())
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> crate::error::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

impl SensorConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

impl CameraConfig {
    /// Format requested from the device
    pub fn requested_format(&self) -> CaptureFormat {
        CaptureFormat {
            width: self.resolution.0,
            height: self.resolution.1,
            pixel_format: self.pixel_format,
        }
    }

    pub fn dequeue_timeout(&self) -> Duration {
        Duration::from_millis(self.dequeue_timeout_ms)
    }
}

impl CaptureConfig {
    pub fn output_path(&self) -> PathBuf {
        PathBuf::from(&self.output_path)
    }
}

impl Default for MotionCamConfig {
    fn default() -> Self {
        Self {
            sensor: SensorConfig {
                device: default_sensor_device(),
                poll_timeout_ms: default_poll_timeout_ms(),
                payload_size: default_payload_size(),
            },
            camera: CameraConfig {
                device: default_camera_device(),
                resolution: default_camera_resolution(),
                pixel_format: default_pixel_format(),
                field: default_field(),
                buffer_count: default_buffer_count(),
                dequeue_timeout_ms: default_dequeue_timeout_ms(),
                allow_resolution_change: default_allow_resolution_change(),
                probe_on_startup: default_probe_on_startup(),
            },
            capture: CaptureConfig {
                output_path: default_output_path(),
                jpeg_quality: default_jpeg_quality(),
                create_output_dir: default_create_output_dir(),
            },
        }
    }
}

// Default value functions
fn default_sensor_device() -> String {
    "/dev/motion_sensor".to_string()
}
fn default_poll_timeout_ms() -> u64 {
    500
}
fn default_payload_size() -> usize {
    16
}

fn default_camera_device() -> String {
    "/dev/video0".to_string()
}
fn default_camera_resolution() -> (u32, u32) {
    (640, 480)
}
fn default_pixel_format() -> PixelFormat {
    PixelFormat::Rgb24
}
fn default_field() -> FieldOrder {
    FieldOrder::Interlaced
}
fn default_buffer_count() -> u32 {
    1
}
fn default_dequeue_timeout_ms() -> u64 {
    2000
}
fn default_allow_resolution_change() -> bool {
    true
}
fn default_probe_on_startup() -> bool {
    true
}

fn default_output_path() -> String {
    "captured_image.jpg".to_string()
}
fn default_jpeg_quality() -> u8 {
    75
}
fn default_create_output_dir() -> bool {
    true
}
