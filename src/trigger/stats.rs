use std::fmt;

/// Counters collected over one trigger loop run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerStats {
    pub iterations: u64,
    pub idle_timeouts: u64,
    pub interrupts: u64,
    pub non_motion_payloads: u64,
    pub read_errors: u64,
    pub motion_events: u64,
    pub captures_succeeded: u64,
    pub captures_failed: u64,
}

impl TriggerStats {
    pub fn capture_attempts(&self) -> u64 {
        self.captures_succeeded + self.captures_failed
    }
}

impl fmt::Display for TriggerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} iterations, {} idle, {} interrupted, {} no-motion, {} read errors, \
             {} motion events, {}/{} captures succeeded",
            self.iterations,
            self.idle_timeouts,
            self.interrupts,
            self.non_motion_payloads,
            self.read_errors,
            self.motion_events,
            self.captures_succeeded,
            self.capture_attempts()
        )
    }
}
