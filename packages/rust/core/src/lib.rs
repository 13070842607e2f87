//! Pipeline orchestration: the end-to-end finalize flow that turns a
//! confirmed selection into persisted report artifacts.

pub mod pipeline;

pub use pipeline::{
    FinalizeResult, ProgressReporter, ReportAssembler, SilentProgress, finalize,
};
