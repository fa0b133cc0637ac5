pub mod book;
pub mod narrative;
pub mod recommend;
pub mod summary;


pub use book::{Alert, AlertBook, AlertCategory, AlertChanges, ClearReason};
pub use narrative::{narrate, NarrativeError, Narrator, NullNarrator};
pub use recommend::{recommend, Recommendation, HEALTHY_TEXT};
pub use summary::DiagnosticsSummary;
