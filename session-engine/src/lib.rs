#![allow(clippy::missing_docs_in_private_items)]

pub mod consolidation;
pub mod prompts;
pub mod protocol;
pub mod state;
pub mod store;
pub mod tutor;

pub use consolidation::{report::ConsolidationReport, ConsolidationScheduler};
pub use state::SessionState;
pub use store::SessionStore;
pub use tutor::{Tutor, TutorConfig};
