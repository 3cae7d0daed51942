use crate::core::navigation::cohort::CohortNavigationRule;
use crate::core::task::result::TaskResult;
use crate::core::task::step::Step;
use std::collections::HashSet;
use std::sync::Arc;

/// A step that names the step to show after itself.
pub trait NavigationRule: Send + Sync {
    /// Identifier of the next step, a sentinel, or `None` to fall through to
    /// the default ordering.
    fn next_step_identifier(&self, result: &TaskResult, is_peeking: bool) -> Option<String>;
}

/// A step that can be skipped based on the results so far.
pub trait NavigationSkipRule: Send + Sync {
    fn should_skip(&self, result: &TaskResult, is_peeking: bool) -> bool;
}

/// A step that can veto backward navigation to itself.
pub trait NavigationBackRule: Send + Sync {
    fn allows_backward(&self, result: &TaskResult) -> bool;
}

/// Cohorts to add to and remove from the participant's current set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CohortMutation {
    pub add: HashSet<String>,
    pub remove: HashSet<String>,
}

impl CohortMutation {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }

    /// Union another mutation into this one. A cohort named on both sides
    /// ends up removed; removal wins so a later rule can retract a cohort.
    pub fn merge(&mut self, other: CohortMutation) {
        self.add.extend(other.add);
        self.remove.extend(other.remove);
        self.add.retain(|cohort| !self.remove.contains(cohort));
    }
}

/// A step that assigns cohorts once the participant has answered it.
pub trait CohortAssignmentStep: Send + Sync {
    /// Cohorts to apply given the results so far, or `None` when the step's
    /// answers do not change cohort membership.
    fn cohorts_to_apply(&self, result: &TaskResult) -> Option<CohortMutation>;
}

/// A step that carries cohort rules evaluated before it is shown and after
/// it is answered.
pub trait CohortNavigationStep: Send + Sync {
    fn before_cohort_rules(&self) -> &[CohortNavigationRule];
    fn after_cohort_rules(&self) -> &[CohortNavigationRule];
}

/// A rule consulted around every step of a task run, with mutable per-run
/// state. Cohort tracking is the canonical implementation.
pub trait TrackingRule: Send + Sync + std::fmt::Debug {
    /// Redirect away from a step before it is shown. `is_peeking` suppresses
    /// state mutation.
    fn skip_to_step(
        &mut self,
        before_step: &Arc<dyn Step>,
        result: &TaskResult,
        is_peeking: bool,
    ) -> Option<String>;

    /// Redirect after a step has been answered.
    fn next_step_identifier(
        &mut self,
        after_step: &Arc<dyn Step>,
        result: &TaskResult,
        is_peeking: bool,
    ) -> Option<String>;

    /// Substitute a different step for the one about to be shown.
    fn replacement_step(
        &self,
        _for_step: &Arc<dyn Step>,
        _result: &TaskResult,
    ) -> Option<Arc<dyn Step>> {
        None
    }
}

/// Run-scoped dependencies handed to navigators. Tracking rules live here so
/// a single rule (one participant's cohorts) spans nested navigators.
#[derive(Debug, Default)]
pub struct NavigationContext {
    pub tracking_rules: Vec<Box<dyn TrackingRule>>,
}

impl NavigationContext {
    pub fn new() -> Self {
        NavigationContext::default()
    }

    pub fn with_tracking_rule(mut self, rule: Box<dyn TrackingRule>) -> Self {
        self.tracking_rules.push(rule);
        self
    }
}
