use super::source::{EventSource, Readiness};
use crate::error::SensorError;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::io::AsRawFd;
use std::time::Duration;
use tracing::{debug, info, trace};

/// Motion sensor character device
pub struct MotionSensor {
    file: Option<File>,
    path: String,
}

impl MotionSensor {
    /// Open the device read+write
    pub fn open(path: &str) -> Result<Self, SensorError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| SensorError::from_open(path, e))?;

        info!("Opened motion sensor {}", path);
        Ok(Self {
            file: Some(file),
            path: path.to_string(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    fn file(&mut self) -> Result<&mut File, SensorError> {
        self.file.as_mut().ok_or(SensorError::Closed)
    }
}

/// Classify the `revents` of a poll that returned ready. `None` is a hangup with no data.
pub(super) fn readiness_from_revents(
    revents: libc::c_short,
) -> Result<Option<Readiness>, SensorError> {
    if revents & libc::POLLIN != 0 {
        return Ok(Some(Readiness::Readable));
    }

    if revents & (libc::POLLERR | libc::POLLNVAL) != 0 {
        return Err(SensorError::Poll {
            source: io::Error::new(
                io::ErrorKind::Other,
                format!("sensor reported poll events 0x{:x}", revents),
            ),
        });
    }

    Ok(None)
}

impl EventSource for MotionSensor {
    fn wait_readable(&mut self, timeout: Duration) -> Result<Readiness, SensorError> {
        let mut pfd = libc::pollfd {
            fd: self.file()?.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        let millis = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;

        let result = unsafe { libc::poll(&mut pfd, 1, millis) };
        if result < 0 {
            let source = io::Error::last_os_error();
            if source.kind() == io::ErrorKind::Interrupted {
                return Ok(Readiness::Interrupted);
            }
            return Err(SensorError::Poll { source });
        }

        if result == 0 {
            return Ok(Readiness::TimedOut);
        }

        match readiness_from_revents(pfd.revents)? {
            Some(readiness) => {
                trace!(revents = pfd.revents, "Sensor readable");
                Ok(readiness)
            }
            None => {
                // Hangup with nothing queued: poll keeps returning at once, so wait out the interval
                trace!(revents = pfd.revents, "Sensor hung up with no data");
                std::thread::sleep(timeout);
                Ok(Readiness::TimedOut)
            }
        }
    }

    fn read_payload(&mut self, buffer: &mut [u8]) -> Result<usize, SensorError> {
        self.file()?
            .read(buffer)
            .map_err(|source| SensorError::Read { source })
    }

    fn set_consumer_active(&mut self, active: bool) -> Result<(), SensorError> {
        let state: i32 = if active { 1 } else { 0 };
        self.file()?
            .write_all(&state.to_ne_bytes())
            .map_err(|source| SensorError::Notify { source })?;

        debug!("Sensor consumer state set to {}", state);
        Ok(())
    }

    fn close(&mut self) -> Result<(), SensorError> {
        if self.file.take().is_some() {
            info!("Closed motion sensor {}", self.path);
        }
        Ok(())
    }
}
