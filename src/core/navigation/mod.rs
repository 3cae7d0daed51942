//! Step navigation engine: the navigator trait, the rule capability traits,
//! and the two concrete navigators (conditional and tracked-items).

pub mod cohort;
pub mod conditional;
pub mod controller;
pub mod path;
pub mod rules;
pub mod survey;
pub mod tracked;

use crate::core::error::AppError;
use crate::core::navigation::rules::NavigationContext;
use crate::core::task::result::TaskResult;
use crate::core::task::step::Step;
use std::sync::{Arc, Mutex};

/// Reserved step identifiers with special navigation meaning. None of these
/// may be used as the identifier of an actual step.
pub mod sentinel {
    /// End the task (or the current section) immediately.
    pub const EXIT: &str = "exit";

    /// Continue to the next step in order.
    pub const NEXT_STEP: &str = "nextStep";

    /// Skip the remainder of the current section.
    pub const NEXT_SECTION: &str = "nextSection";

    pub fn is_reserved(identifier: &str) -> bool {
        matches!(identifier, EXIT | NEXT_STEP | NEXT_SECTION)
    }
}

/// Direction of travel for a transition, used by callers to pick the
/// presentation (slide forward, slide back, or none).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepDirection {
    Reverse,
    None,
    Forward,
}

/// Outcome of asking a navigator for the step after the current one.
///
/// `step` of `None` means navigation ends here; `direction` still applies
/// because a forward request can resolve to a step already in the history.
#[derive(Debug, Clone)]
pub struct NextStep {
    pub step: Option<Arc<dyn Step>>,
    pub direction: StepDirection,
}

impl NextStep {
    pub fn forward(step: Option<Arc<dyn Step>>) -> Self {
        NextStep {
            step,
            direction: StepDirection::Forward,
        }
    }

    pub fn reverse(step: Option<Arc<dyn Step>>) -> Self {
        NextStep {
            step,
            direction: StepDirection::Reverse,
        }
    }
}

/// Progress through a task as shown to the participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// One-based index of the current step.
    pub current: usize,
    pub total: usize,
    /// True when the total counts every step rather than marked milestones.
    pub is_estimated: bool,
}

/// Strategy for moving through the steps of a task.
///
/// Methods take `&mut self` because tracked-items navigators keep per-run
/// state. Peeking callers must pass `is_peeking = true` where offered so
/// that rule side effects (cohort mutation) are suppressed.
pub trait StepNavigator: Send + Sync + std::fmt::Debug {
    /// Look up a step anywhere in this navigator by identifier.
    fn step(&self, identifier: &str) -> Option<Arc<dyn Step>>;

    /// Adopt the run-scoped tracking rules. Called when a task run starts
    /// and when a subtask navigator joins a running task, so that one set of
    /// rules spans nested navigators.
    fn set_context(&mut self, _context: Arc<Mutex<NavigationContext>>) {}

    /// Check the navigator's configuration, including each step's own
    /// validation. Runs when the owning task is entered.
    fn validate(&self) -> Result<(), AppError> {
        Ok(())
    }

    /// Whether there is (or may be) a step after the given one.
    fn has_step_after(&mut self, step: Option<&Arc<dyn Step>>, result: &TaskResult) -> bool;

    /// Whether backward navigation from the given step is allowed.
    fn has_step_before(&mut self, step: Option<&Arc<dyn Step>>, result: &TaskResult) -> bool;

    /// Resolve the step after the given one. `is_peeking` suppresses any
    /// state mutation performed by tracking rules.
    fn step_after(
        &mut self,
        step: Option<&Arc<dyn Step>>,
        result: &mut TaskResult,
        is_peeking: bool,
    ) -> NextStep;

    /// Resolve the step to return to from the given one, or `None` when
    /// backward navigation is not allowed.
    fn step_before(
        &mut self,
        step: Option<&Arc<dyn Step>>,
        result: &TaskResult,
    ) -> Option<Arc<dyn Step>>;

    /// Progress to display for the given step, when determinable.
    fn progress(&self, step: &Arc<dyn Step>, result: &TaskResult) -> Option<Progress>;

    /// Whether resolving navigation from this step ends the whole task
    /// rather than just this navigator's scope.
    fn should_exit(&mut self, step: Option<&Arc<dyn Step>>, result: &mut TaskResult) -> bool;
}
