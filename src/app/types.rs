use std::fmt;

/// Component lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Failed,
}

/// Parts of the system whose lifecycle is tracked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    Sensor,
    Camera,
    Trigger,
}

impl Component {
    pub const ALL: [Component; 3] = [Component::Sensor, Component::Camera, Component::Trigger];

    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Sensor => "sensor",
            Component::Camera => "camera",
            Component::Trigger => "trigger",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the trigger loop stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// A termination signal arrived
    Signal(String),
    /// The loop hit a fatal sensor error
    Error(String),
    /// The shutdown token was cancelled programmatically
    Requested,
}

impl ShutdownReason {
    pub fn exit_code(&self) -> i32 {
        match self {
            ShutdownReason::Error(_) => 1,
            ShutdownReason::Signal(_) | ShutdownReason::Requested => 0,
        }
    }
}
