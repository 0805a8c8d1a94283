mod device;
pub mod mock;
mod source;
#[cfg(test)]
mod tests;

pub use device::MotionSensor;
pub use mock::{ScriptStep, ScriptedEventSource, SourceLog};
pub use source::{EventSource, Readiness, TriggerEvent, TriggerKind, MOTION_SENTINEL};
