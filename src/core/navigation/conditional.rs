use crate::core::error::AppError;
use crate::core::navigation::rules::NavigationContext;
use crate::core::navigation::{sentinel, NextStep, Progress, StepDirection, StepNavigator};
use crate::core::task::factory::validate_steps;
use crate::core::task::result::TaskResult;
use crate::core::task::step::Step;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::warn;

/// Navigator over an ordered list of steps with conditional rules.
///
/// Forward navigation resolves, in priority order: the current step's own
/// navigation rule, then the run's tracking rules, then the next step in
/// list order. The resolved candidate is then checked against skip rules
/// and tracking-rule redirects before it is returned.
#[derive(Debug)]
pub struct ConditionalStepNavigator {
    steps: Vec<Arc<dyn Step>>,
    /// Step identifiers counted as progress milestones. When absent,
    /// progress is estimated from the flat step list.
    pub progress_markers: Option<Vec<String>>,
    context: Arc<Mutex<NavigationContext>>,
}

impl ConditionalStepNavigator {
    pub fn new(steps: Vec<Arc<dyn Step>>) -> Self {
        ConditionalStepNavigator {
            steps,
            progress_markers: None,
            context: Arc::new(Mutex::new(NavigationContext::new())),
        }
    }

    pub fn steps(&self) -> &[Arc<dyn Step>] {
        &self.steps
    }

    fn context(&self) -> MutexGuard<'_, NavigationContext> {
        self.context.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The step that follows the given identifier in list order.
    fn step_following(&self, identifier: &str) -> Option<Arc<dyn Step>> {
        let index = self
            .steps
            .iter()
            .position(|s| s.identifier() == identifier)?;
        self.steps.get(index + 1).cloned()
    }

    /// Resolve an explicit next-step identifier for the step just completed:
    /// the step's own navigation rule first, then the tracking rules.
    fn next_identifier_after(
        &self,
        previous: Option<&Arc<dyn Step>>,
        result: &TaskResult,
        is_peeking: bool,
    ) -> Option<String> {
        let previous = previous?;
        if let Some(rule) = previous.navigation_rule() {
            if let Some(identifier) = rule.next_step_identifier(result, is_peeking) {
                return Some(identifier);
            }
        }
        let mut context = self.context();
        context
            .tracking_rules
            .iter_mut()
            .find_map(|rule| rule.next_step_identifier(previous, result, is_peeking))
    }

    /// First tracking-rule redirect away from a step about to be shown.
    fn redirect_before(
        &self,
        candidate: &Arc<dyn Step>,
        result: &TaskResult,
        is_peeking: bool,
    ) -> Option<String> {
        let mut context = self.context();
        context
            .tracking_rules
            .iter_mut()
            .find_map(|rule| rule.skip_to_step(candidate, result, is_peeking))
    }

    fn resolve_step_after(
        &self,
        step: Option<&Arc<dyn Step>>,
        result: &mut TaskResult,
        is_peeking: bool,
    ) -> Option<NextStep> {
        let mut previous = step.cloned();
        let mut direction = StepDirection::Forward;
        let mut iterations = 0usize;

        loop {
            iterations += 1;
            if iterations > self.steps.len() + 1 {
                warn!(navigator = "conditional", "skip rules form a cycle, ending navigation");
                return Some(NextStep::forward(None));
            }

            let mut return_step = match self.next_identifier_after(
                previous.as_ref(),
                result,
                is_peeking,
            ) {
                Some(identifier) if identifier == sentinel::EXIT => return None,
                Some(identifier) if identifier == sentinel::NEXT_STEP => previous
                    .as_ref()
                    .and_then(|prev| self.step_following(prev.identifier())),
                Some(identifier) => {
                    // A rule that names a step already answered is moving
                    // backward through the ordered list.
                    if result.find_result(&identifier).is_some() {
                        direction = StepDirection::Reverse;
                    }
                    self.step(&identifier)
                }
                None => match previous.as_ref() {
                    Some(prev) => self.step_following(prev.identifier()),
                    None => self.steps.first().cloned(),
                },
            };

            if let Some(candidate) = return_step.clone() {
                if let Some(target) = self.redirect_before(&candidate, result, is_peeking) {
                    return_step = if target == sentinel::NEXT_STEP {
                        self.step_following(candidate.identifier())
                    } else {
                        self.step(&target)
                    };
                }
            }

            let should_skip = return_step
                .as_ref()
                .and_then(|candidate| candidate.skip_rule().map(|rule| (candidate, rule)))
                .is_some_and(|(_, rule)| rule.should_skip(result, is_peeking));
            if should_skip {
                previous = return_step;
                continue;
            }

            return Some(NextStep {
                step: return_step,
                direction,
            });
        }
    }

    /// Identifiers of the steps recorded so far, in order.
    fn history_identifiers(result: &TaskResult) -> Vec<&str> {
        result
            .step_history
            .iter()
            .map(|r| r.identifier())
            .collect()
    }
}

impl StepNavigator for ConditionalStepNavigator {
    fn step(&self, identifier: &str) -> Option<Arc<dyn Step>> {
        self.steps
            .iter()
            .find(|s| s.identifier() == identifier)
            .cloned()
    }

    fn set_context(&mut self, context: Arc<Mutex<NavigationContext>>) {
        self.context = context;
    }

    fn validate(&self) -> Result<(), AppError> {
        validate_steps(&self.steps)?;
        for step in &self.steps {
            step.validate()?;
        }
        Ok(())
    }

    fn has_step_after(&mut self, step: Option<&Arc<dyn Step>>, result: &TaskResult) -> bool {
        let mut peek_result = result.clone();
        self.resolve_step_after(step, &mut peek_result, true)
            .map(|next| next.step.is_some())
            .unwrap_or(false)
    }

    fn has_step_before(&mut self, step: Option<&Arc<dyn Step>>, result: &TaskResult) -> bool {
        self.step_before(step, result).is_some()
    }

    fn step_after(
        &mut self,
        step: Option<&Arc<dyn Step>>,
        result: &mut TaskResult,
        is_peeking: bool,
    ) -> NextStep {
        self.resolve_step_after(step, result, is_peeking)
            .unwrap_or_else(|| NextStep::forward(None))
    }

    fn step_before(
        &mut self,
        step: Option<&Arc<dyn Step>>,
        result: &TaskResult,
    ) -> Option<Arc<dyn Step>> {
        let step = step?;
        if let Some(rule) = step.back_rule() {
            if !rule.allows_backward(result) {
                return None;
            }
        }
        let history = Self::history_identifiers(result);
        // When the step is already in the history, go to the entry before
        // it. Otherwise the step has not been recorded yet and the last
        // history entry is the one on screen before it.
        let marker = if let Some(index) = history.iter().position(|id| *id == step.identifier()) {
            index.checked_sub(1).map(|i| history[i])
        } else {
            history.last().copied()
        }?;
        let found = self.step(marker);
        if found.is_none() {
            warn!(identifier = marker, "previous step is not in this navigator");
        }
        found
    }

    fn progress(&self, step: &Arc<dyn Step>, result: &TaskResult) -> Option<Progress> {
        match &self.progress_markers {
            Some(markers) => {
                let mut shown: Vec<&str> = Self::history_identifiers(result);
                shown.push(step.identifier());
                let index = markers
                    .iter()
                    .rposition(|marker| shown.contains(&marker.as_str()))?;
                let current = index + 1;
                if current == markers.len() && !markers.iter().any(|m| m == step.identifier()) {
                    // Beyond the last marker; progress no longer applies.
                    return None;
                }
                Some(Progress {
                    current,
                    total: markers.len(),
                    is_estimated: false,
                })
            }
            None => {
                let shown: HashSet<&str> = Self::history_identifiers(result).into_iter().collect();
                let all: HashSet<&str> = self
                    .steps
                    .iter()
                    .map(|s| s.identifier())
                    .chain(shown.iter().copied())
                    .collect();
                let current = shown
                    .iter()
                    .filter(|id| **id != step.identifier())
                    .count();
                Some(Progress {
                    current: current + 1,
                    total: all.len(),
                    is_estimated: true,
                })
            }
        }
    }

    fn should_exit(&mut self, step: Option<&Arc<dyn Step>>, result: &mut TaskResult) -> bool {
        self.next_identifier_after(step, result, false)
            .is_some_and(|identifier| identifier == sentinel::EXIT)
    }
}
