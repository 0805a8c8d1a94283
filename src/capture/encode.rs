use crate::error::CaptureError;
use crate::frame::{PixelFormat, RawFrame};
use image::codecs::jpeg::JpegEncoder;
use image::ColorType;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Writes RGB frames as baseline JPEG files
#[derive(Debug, Clone, Copy)]
pub struct ImageEncoder {
    quality: u8,
}

impl Default for ImageEncoder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_QUALITY)
    }
}

impl ImageEncoder {
    pub const DEFAULT_QUALITY: u8 = 75;

    /// Quality is clamped to 1..=100
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Encode `frame` to `output`, replacing any existing file.
    ///
    /// The image is written to a hidden sibling file first and renamed
    /// into place, so readers of `output` never see a partial JPEG.
    /// Returns the number of bytes written.
    pub fn encode(&self, frame: &RawFrame, output: &Path) -> Result<u64, CaptureError> {
        if frame.format != PixelFormat::Rgb24 {
            return Err(CaptureError::Encode {
                path: output.display().to_string(),
                details: format!("cannot encode {} frames", frame.format),
            });
        }

        if !frame.validate_size() {
            return Err(CaptureError::ShortFrame {
                expected: frame.expected_size().unwrap_or(0),
                actual: frame.data.len(),
            });
        }

        let partial = partial_path(output)?;
        let written = match self.write_jpeg(frame, &partial) {
            Ok(written) => written,
            Err(e) => {
                discard(&partial);
                return Err(e);
            }
        };

        if let Err(source) = fs::rename(&partial, output) {
            discard(&partial);
            return Err(CaptureError::EncodeIo {
                path: output.display().to_string(),
                source,
            });
        }

        debug!(
            path = %output.display(),
            bytes = written,
            quality = self.quality,
            "JPEG written"
        );
        Ok(written)
    }

    fn write_jpeg(&self, frame: &RawFrame, path: &Path) -> Result<u64, CaptureError> {
        let io_error = |source| CaptureError::EncodeIo {
            path: path.display().to_string(),
            source,
        };

        let file = File::create(path).map_err(io_error)?;
        let mut writer = BufWriter::new(file);

        JpegEncoder::new_with_quality(&mut writer, self.quality)
            .encode(&frame.data, frame.width, frame.height, ColorType::Rgb8)
            .map_err(|e| CaptureError::Encode {
                path: path.display().to_string(),
                details: e.to_string(),
            })?;

        writer.flush().map_err(io_error)?;
        let file = writer.into_inner().map_err(|e| io_error(e.into_error()))?;
        file.sync_all().map_err(io_error)?;

        Ok(file.metadata().map_err(io_error)?.len())
    }
}

/// `dir/.name.partial` next to `output`
fn partial_path(output: &Path) -> Result<PathBuf, CaptureError> {
    let name = output
        .file_name()
        .ok_or_else(|| CaptureError::Encode {
            path: output.display().to_string(),
            details: "output path has no file name".to_string(),
        })?
        .to_string_lossy();

    Ok(output.with_file_name(format!(".{}.partial", name)))
}

fn discard(partial: &Path) {
    if let Err(e) = fs::remove_file(partial) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove {}: {}", partial.display(), e);
        }
    }
}
