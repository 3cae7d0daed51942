use crate::core::error::AppError;
use crate::core::navigation::rules::{
    CohortAssignmentStep, CohortNavigationStep, NavigationBackRule, NavigationRule,
    NavigationSkipRule,
};
use crate::core::task::definition::{Task, TaskInfo};
use crate::core::task::result::ResultObject;
use std::sync::Arc;

/// Wire values for the `type` field of a decoded step.
pub mod step_type {
    pub const INSTRUCTION: &str = "instruction";
    pub const ACTIVE: &str = "active";
    pub const COUNTDOWN: &str = "countdown";
    pub const COMPLETION: &str = "completion";
    pub const FORM: &str = "form";
    pub const SECTION: &str = "section";
    pub const TASK_INFO: &str = "taskInfo";
    pub const SELECTION: &str = "selection";
    pub const REVIEW: &str = "review";
    pub const LOGGING: &str = "logging";
}

/// A single displayable node in a task.
///
/// Steps are immutable once decoded and shared via `Arc`. Capability
/// accessors expose the optional navigation behaviors a concrete step type
/// implements; the default for each is "does not apply".
pub trait Step: Send + Sync + std::fmt::Debug {
    /// Identifier unique within the step collection that contains this step.
    fn identifier(&self) -> &str;

    /// Wire type of the step, used for decoding and display.
    fn step_type(&self) -> &str;

    /// Fresh result to record for this step when it becomes current.
    fn instantiate_result(&self) -> ResultObject;

    /// Check the step's configuration. Runs when the containing task is
    /// entered; an error fails the run.
    fn validate(&self) -> Result<(), AppError> {
        Ok(())
    }

    fn navigation_rule(&self) -> Option<&dyn NavigationRule> {
        None
    }

    fn skip_rule(&self) -> Option<&dyn NavigationSkipRule> {
        None
    }

    fn back_rule(&self) -> Option<&dyn NavigationBackRule> {
        None
    }

    fn cohort_assignment(&self) -> Option<&dyn CohortAssignmentStep> {
        None
    }

    fn cohort_navigation(&self) -> Option<&dyn CohortNavigationStep> {
        None
    }

    /// A section presents a nested list of steps navigated in place.
    fn as_section(&self) -> Option<&dyn SectionStep> {
        None
    }

    /// A task info step stands in for a subtask fetched when reached.
    fn as_task_info(&self) -> Option<&TaskInfo> {
        None
    }
}

/// A step that groups a nested list of steps, navigated as a subtask.
pub trait SectionStep: Send + Sync {
    fn steps(&self) -> &[Arc<dyn Step>];

    /// Build the in-place subtask for this section.
    fn to_task(&self) -> Task;

    /// Number of steps to report for progress within this section.
    fn progress_markers(&self) -> Option<&[String]>;
}
