pub mod ledger;

#[cfg(test)]
mod tests;

pub use ledger::{CleaningLedger, CleaningLog, CleaningState, CleaningType};
