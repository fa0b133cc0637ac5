pub mod model;

#[cfg(test)]
mod tests;

pub use model::{evaluate, Decision, DecisionInput, DecisionReason, DecisionSettings, NetGainDecision};
