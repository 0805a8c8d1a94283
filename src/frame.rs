use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

/// Build a V4L2 fourcc code from its four ASCII characters
pub const fn fourcc(code: &[u8; 4]) -> u32 {
    (code[0] as u32) | ((code[1] as u32) << 8) | ((code[2] as u32) << 16) | ((code[3] as u32) << 24)
}

/// Pixel layout of a captured frame, written as its fourcc in config files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PixelFormat {
    /// Packed 8-bit R, G, B
    Rgb24,
    /// Packed 8-bit B, G, R
    Bgr24,
    /// YUV 4:2:2 interleaved
    Yuyv,
    /// Motion JPEG
    Mjpeg,
    /// Any other fourcc the driver reports
    Other(u32),
}

impl PixelFormat {
    pub fn fourcc(&self) -> u32 {
        match self {
            PixelFormat::Rgb24 => fourcc(b"RGB3"),
            PixelFormat::Bgr24 => fourcc(b"BGR3"),
            PixelFormat::Yuyv => fourcc(b"YUYV"),
            PixelFormat::Mjpeg => fourcc(b"MJPG"),
            PixelFormat::Other(code) => *code,
        }
    }

    pub fn from_fourcc(code: u32) -> Self {
        match code {
            c if c == fourcc(b"RGB3") => PixelFormat::Rgb24,
            c if c == fourcc(b"BGR3") => PixelFormat::Bgr24,
            c if c == fourcc(b"YUYV") => PixelFormat::Yuyv,
            c if c == fourcc(b"MJPG") => PixelFormat::Mjpeg,
            other => PixelFormat::Other(other),
        }
    }

    /// Bytes per pixel for packed formats, `None` for compressed ones
    pub fn bytes_per_pixel(&self) -> Option<usize> {
        match self {
            PixelFormat::Rgb24 | PixelFormat::Bgr24 => Some(3),
            PixelFormat::Yuyv => Some(2),
            PixelFormat::Mjpeg | PixelFormat::Other(_) => None,
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.fourcc().to_le_bytes();
        if bytes.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
            write!(f, "{}", String::from_utf8_lossy(&bytes))
        } else {
            write!(f, "0x{:08x}", self.fourcc())
        }
    }
}

impl FromStr for PixelFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != 4 {
            return Err(format!("Pixel format '{}' is not a four character code", s));
        }
        Ok(PixelFormat::from_fourcc(fourcc(&[
            bytes[0], bytes[1], bytes[2], bytes[3],
        ])))
    }
}

impl TryFrom<String> for PixelFormat {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PixelFormat> for String {
    fn from(format: PixelFormat) -> Self {
        format.to_string()
    }
}

/// Field order requested from the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldOrder {
    Any,
    None,
    Interlaced,
}

/// Resolution and pixel layout agreed with the capture device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureFormat {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
}

impl CaptureFormat {
    pub fn rgb24(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixel_format: PixelFormat::Rgb24,
        }
    }

    /// Bytes in one unpadded row
    pub fn packed_row_bytes(&self) -> Option<usize> {
        self.pixel_format
            .bytes_per_pixel()
            .map(|bpp| self.width as usize * bpp)
    }

    /// Bytes in one unpadded frame
    pub fn packed_frame_bytes(&self) -> Option<usize> {
        self.packed_row_bytes()
            .map(|row| row * self.height as usize)
    }
}

impl fmt::Display for CaptureFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} {}", self.width, self.height, self.pixel_format)
    }
}

/// One frame copied out of a dequeued capture buffer, rows tightly packed
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Driver sequence number
    pub sequence: u32,
    /// Timestamp when the frame was dequeued
    pub timestamp: SystemTime,
    /// Pixel data
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl RawFrame {
    pub fn new(sequence: u32, data: Vec<u8>, format: CaptureFormat) -> Self {
        Self {
            sequence,
            timestamp: SystemTime::now(),
            data,
            width: format.width,
            height: format.height,
            format: format.pixel_format,
        }
    }

    /// Expected frame size for uncompressed formats
    pub fn expected_size(&self) -> Option<usize> {
        self.format
            .bytes_per_pixel()
            .map(|bpp| self.width as usize * self.height as usize * bpp)
    }

    /// Validate frame data size against expected size
    pub fn validate_size(&self) -> bool {
        match self.expected_size() {
            Some(expected) => self.data.len() == expected,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fourcc_round_trip() {
        assert_eq!(fourcc(b"RGB3"), 0x3342_4752);
        assert_eq!(PixelFormat::from_fourcc(0x3342_4752), PixelFormat::Rgb24);
        assert_eq!("YUYV".parse::<PixelFormat>().unwrap(), PixelFormat::Yuyv);
        assert!("RGB".parse::<PixelFormat>().is_err());
        assert_eq!(PixelFormat::Rgb24.to_string(), "RGB3");
        assert_eq!(PixelFormat::Other(0).to_string(), "0x00000000");
    }

    #[test]
    fn test_capture_format_sizes() {
        let format = CaptureFormat::rgb24(640, 480);
        assert_eq!(format.packed_row_bytes(), Some(1920));
        assert_eq!(format.packed_frame_bytes(), Some(921_600));
        assert_eq!(format.to_string(), "640x480 RGB3");

        let mjpeg = CaptureFormat {
            pixel_format: PixelFormat::Mjpeg,
            ..format
        };
        assert_eq!(mjpeg.packed_frame_bytes(), None);
    }

    #[test]
    fn test_raw_frame_size_validation() {
        let format = CaptureFormat::rgb24(4, 2);
        let frame = RawFrame::new(0, vec![0u8; 24], format);
        assert!(frame.validate_size());

        let short = RawFrame::new(1, vec![0u8; 23], format);
        assert!(!short.validate_size());
    }
}
