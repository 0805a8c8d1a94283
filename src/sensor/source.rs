use crate::error::SensorError;
use std::time::Duration;

/// First payload byte that marks a motion event
pub const MOTION_SENTINEL: u8 = b'1';

/// Outcome of one bounded wait on an event source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// A payload can be read without blocking
    Readable,
    /// Nothing arrived before the timeout
    TimedOut,
    /// The wait was cut short by a signal; safe to wait again
    Interrupted,
}

/// A pollable endpoint that emits fixed-size event payloads and accepts a
/// consumer-presence notification.
pub trait EventSource {
    /// Wait up to `timeout` for the source to become readable
    fn wait_readable(&mut self, timeout: Duration) -> Result<Readiness, SensorError>;

    /// Read one payload into `buffer`, returning the bytes read
    fn read_payload(&mut self, buffer: &mut [u8]) -> Result<usize, SensorError>;

    /// Tell the producer whether a consumer is listening
    fn set_consumer_active(&mut self, active: bool) -> Result<(), SensorError>;

    /// Release the handle. Calling it again is a no-op.
    fn close(&mut self) -> Result<(), SensorError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    Motion,
    NoMotion,
    Error,
}

/// One payload read from the sensor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerEvent {
    pub kind: TriggerKind,
    pub payload: Vec<u8>,
}

impl TriggerEvent {
    /// Classify the result of a payload read. An empty read is an error.
    pub fn from_read(buffer: &[u8], bytes_read: usize) -> Self {
        let payload = buffer[..bytes_read.min(buffer.len())].to_vec();
        Self::from_payload(payload)
    }

    pub fn from_payload(payload: Vec<u8>) -> Self {
        let kind = match payload.first() {
            None => TriggerKind::Error,
            Some(&MOTION_SENTINEL) => TriggerKind::Motion,
            Some(_) => TriggerKind::NoMotion,
        };
        Self { kind, payload }
    }

    pub fn is_motion(&self) -> bool {
        self.kind == TriggerKind::Motion
    }
}
