mod runner;
mod stats;
#[cfg(test)]
mod tests;

pub use runner::{TriggerLoop, TriggerSettings};
pub use stats::TriggerStats;
