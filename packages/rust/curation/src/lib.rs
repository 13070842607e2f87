//! Curation state machine for one workflow instance.
//!
//! A [`CurationSession`] drives an instance through its [`WorkflowStage`]s,
//! maintains the candidate pool and the human-approved selection, and
//! checkpoints both so a restarted process resumes where it left off.

pub mod session;
pub mod stage;

pub use session::{
    CurationSession, Direction, MetadataFormatter, TrimFormatter, raw_metadata_line,
};
pub use stage::WorkflowStage;
