//! Workflow stages and the allowed transition table.

use serde::{Deserialize, Serialize};

/// Stage of one curation instance. Exactly one stage is active at a time;
/// the stage is checkpointed implicitly through which records exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStage {
    /// Entry view with a "start new" affordance.
    SmartHome,
    /// A new run was started; waiting for preview ingestion.
    Init,
    /// Preview articles ingested; waiting for the operator to begin sorting.
    AwaitSortConfirm,
    /// The curator is editing pool and selection.
    UiSorting,
    /// Selection confirmed; full-text retrieval and report generation run.
    FinalScraping,
    /// Reports persisted; the run is complete.
    Finished,
    /// Checkpoint inspection view, reachable from and returning to the home
    /// stage.
    DataViewer,
}

impl WorkflowStage {
    /// Whether a direct transition `self -> to` is allowed.
    ///
    /// Forward path: `smart_home → init → await_sort_confirm → ui_sorting →
    /// final_scraping → finished`. Side stage: `smart_home ↔ data_viewer`.
    /// Backward: `finished → ui_sorting` (rollback).
    pub fn can_transition(self, to: WorkflowStage) -> bool {
        use WorkflowStage::*;
        matches!(
            (self, to),
            (SmartHome, Init)
                | (SmartHome, DataViewer)
                | (DataViewer, SmartHome)
                | (Init, AwaitSortConfirm)
                | (AwaitSortConfirm, UiSorting)
                | (UiSorting, FinalScraping)
                | (FinalScraping, Finished)
                | (Finished, UiSorting)
        )
    }
}

impl std::fmt::Display for WorkflowStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WorkflowStage::SmartHome => "smart_home",
            WorkflowStage::Init => "init",
            WorkflowStage::AwaitSortConfirm => "await_sort_confirm",
            WorkflowStage::UiSorting => "ui_sorting",
            WorkflowStage::FinalScraping => "final_scraping",
            WorkflowStage::Finished => "finished",
            WorkflowStage::DataViewer => "data_viewer",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::WorkflowStage::*;

    #[test]
    fn forward_path_is_allowed() {
        assert!(SmartHome.can_transition(Init));
        assert!(Init.can_transition(AwaitSortConfirm));
        assert!(AwaitSortConfirm.can_transition(UiSorting));
        assert!(UiSorting.can_transition(FinalScraping));
        assert!(FinalScraping.can_transition(Finished));
    }

    #[test]
    fn rollback_and_data_viewer() {
        assert!(Finished.can_transition(UiSorting));
        assert!(SmartHome.can_transition(DataViewer));
        assert!(DataViewer.can_transition(SmartHome));
    }

    #[test]
    fn skipping_stages_is_rejected() {
        assert!(!SmartHome.can_transition(UiSorting));
        assert!(!Init.can_transition(FinalScraping));
        assert!(!Finished.can_transition(SmartHome));
        assert!(!DataViewer.can_transition(Init));
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&AwaitSortConfirm).unwrap();
        assert_eq!(json, "\"await_sort_confirm\"");
    }
}
