use super::source::{EventSource, Readiness};
use crate::error::SensorError;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// One scripted response of a [`ScriptedEventSource`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    /// The wait times out without data
    Timeout,
    /// The wait is interrupted by a signal
    Interrupted,
    /// The source becomes readable and yields this payload
    Payload(Vec<u8>),
    /// The source becomes readable but the read fails
    ReadError,
    /// The wait itself fails with a non-signal error
    PollError,
}

impl ScriptStep {
    /// A 16-byte payload whose first byte is `first`
    pub fn payload(first: u8) -> Self {
        let mut payload = vec![b'0'; 16];
        payload[0] = first;
        ScriptStep::Payload(payload)
    }
}

/// What the consumer did to the source, in order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceLog {
    pub notifications: Vec<bool>,
    pub waits: usize,
    pub reads: usize,
    pub closes: usize,
}

/// Replays a fixed script of poll and read outcomes.
///
/// Once the script runs out every wait times out, and the optional token is
/// cancelled so a loop under test winds down on its own.
pub struct ScriptedEventSource {
    script: VecDeque<ScriptStep>,
    pending: Option<io::Result<Vec<u8>>>,
    log: Arc<Mutex<SourceLog>>,
    shutdown: Option<CancellationToken>,
    closed: bool,
}

impl ScriptedEventSource {
    pub fn new(script: impl IntoIterator<Item = ScriptStep>) -> Self {
        Self {
            script: script.into_iter().collect(),
            pending: None,
            log: Arc::new(Mutex::new(SourceLog::default())),
            shutdown: None,
            closed: false,
        }
    }

    /// Cancel `token` when the script is exhausted
    pub fn cancel_when_done(mut self, token: CancellationToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    /// Shared handle to the call log
    pub fn log_handle(&self) -> Arc<Mutex<SourceLog>> {
        Arc::clone(&self.log)
    }

    fn ensure_open(&self) -> Result<(), SensorError> {
        if self.closed {
            Err(SensorError::Closed)
        } else {
            Ok(())
        }
    }
}

impl EventSource for ScriptedEventSource {
    fn wait_readable(&mut self, timeout: Duration) -> Result<Readiness, SensorError> {
        self.ensure_open()?;
        self.log.lock().waits += 1;

        let Some(step) = self.script.pop_front() else {
            if let Some(token) = &self.shutdown {
                token.cancel();
            }
            std::thread::sleep(timeout.min(Duration::from_millis(5)));
            return Ok(Readiness::TimedOut);
        };

        match step {
            ScriptStep::Timeout => Ok(Readiness::TimedOut),
            ScriptStep::Interrupted => Ok(Readiness::Interrupted),
            ScriptStep::PollError => Err(SensorError::Poll {
                source: io::Error::from_raw_os_error(libc::EBADF),
            }),
            ScriptStep::Payload(payload) => {
                self.pending = Some(Ok(payload));
                Ok(Readiness::Readable)
            }
            ScriptStep::ReadError => {
                self.pending = Some(Err(io::Error::from_raw_os_error(libc::EIO)));
                Ok(Readiness::Readable)
            }
        }
    }

    fn read_payload(&mut self, buffer: &mut [u8]) -> Result<usize, SensorError> {
        self.ensure_open()?;
        self.log.lock().reads += 1;

        match self.pending.take() {
            Some(Ok(payload)) => {
                let len = payload.len().min(buffer.len());
                buffer[..len].copy_from_slice(&payload[..len]);
                Ok(len)
            }
            Some(Err(source)) => Err(SensorError::Read { source }),
            None => Ok(0),
        }
    }

    fn set_consumer_active(&mut self, active: bool) -> Result<(), SensorError> {
        self.ensure_open()?;
        self.log.lock().notifications.push(active);
        Ok(())
    }

    fn close(&mut self) -> Result<(), SensorError> {
        if !self.closed {
            self.closed = true;
            self.log.lock().closes += 1;
        }
        Ok(())
    }
}
