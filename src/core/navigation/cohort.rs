use crate::core::navigation::rules::TrackingRule;
use crate::core::navigation::sentinel;
use crate::core::task::result::TaskResult;
use crate::core::task::step::Step;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// How a cohort rule's required set is matched against the current cohorts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum CohortRuleOperator {
    /// Fire when every required cohort is present.
    #[default]
    All,
    /// Fire when at least one required cohort is present.
    Any,
}

/// A declarative rule that redirects navigation based on cohort membership.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CohortNavigationRule {
    #[serde(default)]
    pub required_cohorts: HashSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cohort_operator: Option<CohortRuleOperator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_to_identifier: Option<String>,
}

impl CohortNavigationRule {
    /// Whether this rule fires for the given cohort membership. A rule with
    /// an empty required set never fires.
    pub fn evaluate(&self, current_cohorts: &HashSet<String>) -> bool {
        if self.required_cohorts.is_empty() {
            return false;
        }
        let shared = self
            .required_cohorts
            .intersection(current_cohorts)
            .count();
        match self.cohort_operator.unwrap_or_default() {
            CohortRuleOperator::All => shared == self.required_cohorts.len(),
            CohortRuleOperator::Any => shared > 0,
        }
    }
}

/// Tracking rule that maintains the participant's cohort membership for one
/// task run and applies cohort navigation rules around each step.
#[derive(Debug, Clone, Default)]
pub struct CohortTrackingRule {
    /// Membership the participant entered the run with.
    pub initial_cohorts: HashSet<String>,
    /// Membership as mutated by assignment steps during the run.
    pub current_cohorts: HashSet<String>,
}

impl CohortTrackingRule {
    pub fn new(initial_cohorts: HashSet<String>) -> Self {
        CohortTrackingRule {
            current_cohorts: initial_cohorts.clone(),
            initial_cohorts,
        }
    }

    /// First firing rule wins. A firing rule without an explicit target uses
    /// the given default sentinel.
    fn skip_target(
        &self,
        rules: &[CohortNavigationRule],
        default_target: &str,
    ) -> Option<String> {
        rules
            .iter()
            .find(|rule| rule.evaluate(&self.current_cohorts))
            .map(|rule| {
                rule.skip_to_identifier
                    .clone()
                    .unwrap_or_else(|| default_target.to_string())
            })
    }
}

impl TrackingRule for CohortTrackingRule {
    fn skip_to_step(
        &mut self,
        before_step: &Arc<dyn Step>,
        _result: &TaskResult,
        _is_peeking: bool,
    ) -> Option<String> {
        let rules = before_step.cohort_navigation()?.before_cohort_rules();
        // Before a step is shown, an unfired target defaults to skipping
        // just that step.
        self.skip_target(rules, sentinel::NEXT_STEP)
    }

    fn next_step_identifier(
        &mut self,
        after_step: &Arc<dyn Step>,
        result: &TaskResult,
        is_peeking: bool,
    ) -> Option<String> {
        if !is_peeking {
            if let Some(assignment) = after_step.cohort_assignment() {
                if let Some(mutation) = assignment.cohorts_to_apply(result) {
                    self.current_cohorts.extend(mutation.add);
                    self.current_cohorts
                        .retain(|cohort| !mutation.remove.contains(cohort));
                    debug!(
                        step = after_step.identifier(),
                        cohorts = ?self.current_cohorts,
                        "updated cohorts"
                    );
                }
            }
        }
        let rules = after_step.cohort_navigation()?.after_cohort_rules();
        // After a step, an unfired target defaults to leaving the section.
        self.skip_target(rules, sentinel::NEXT_SECTION)
    }
}
