use crate::core::error::AppError;
use crate::core::navigation::rules::{NavigationContext, NavigationRule};
use crate::core::navigation::sentinel;
use crate::core::navigation::{NextStep, Progress, StepDirection, StepNavigator};
use crate::core::task::answer::{AnswerType, BaseType};
use crate::core::task::objects::QuestionStepObject;
use crate::core::task::result::{AnswerResult, BaseResult, ResultObject, TaskResult};
use crate::core::task::step::{step_type, Step};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// An item a participant can select for tracking, such as a medication or a
/// symptom trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedItem {
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Grouping header for the selection list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedSection {
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// The recorded state for one selected item. An item is complete once its
/// detail answer has been captured.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedItemAnswer {
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logged_date: Option<DateTime<Utc>>,
}

impl TrackedItemAnswer {
    pub fn new(identifier: impl Into<String>) -> Self {
        TrackedItemAnswer {
            identifier: identifier.into(),
            details: None,
            logged_date: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.details.is_some()
    }
}

/// Result accumulated across the tracked-items flow for one task run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedItemsResult {
    pub identifier: String,
    #[serde(default)]
    pub selected_answers: Vec<TrackedItemAnswer>,
    pub start_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
}

impl TrackedItemsResult {
    pub fn new(identifier: impl Into<String>) -> Self {
        TrackedItemsResult {
            identifier: identifier.into(),
            selected_answers: Vec::new(),
            start_date: Utc::now(),
            end_date: None,
        }
    }

    pub fn selected_identifiers(&self) -> Vec<&str> {
        self.selected_answers
            .iter()
            .map(|a| a.identifier.as_str())
            .collect()
    }

    /// Replace the selection, keeping the recorded details of items that
    /// remain selected.
    pub fn update_selected(&mut self, selected: &[String]) {
        let mut updated = Vec::with_capacity(selected.len());
        for identifier in selected {
            let existing = self
                .selected_answers
                .iter()
                .find(|a| &a.identifier == identifier)
                .cloned();
            updated.push(existing.unwrap_or_else(|| TrackedItemAnswer::new(identifier.clone())));
        }
        self.selected_answers = updated;
    }

    /// Record the detail answer for one selected item.
    pub fn update_details(&mut self, identifier: &str, details: Value) {
        if let Some(answer) = self
            .selected_answers
            .iter_mut()
            .find(|a| a.identifier == identifier)
        {
            answer.details = Some(details);
            answer.logged_date = Some(Utc::now());
        }
    }

    pub fn has_incomplete(&self) -> bool {
        self.selected_answers.iter().any(|a| !a.is_complete())
    }
}

/// Step that presents the full item list for selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedSelectionStepObject {
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Step for TrackedSelectionStepObject {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn step_type(&self) -> &str {
        step_type::SELECTION
    }

    fn instantiate_result(&self) -> ResultObject {
        ResultObject::Answer(AnswerResult::new(
            self.identifier.clone(),
            AnswerType::array(BaseType::String),
        ))
    }
}

/// Step that reviews the current selection and its recorded details.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedReviewStepObject {
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Detail step to jump to next, overriding the circular search.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_step_identifier: Option<String>,
}

impl NavigationRule for TrackedReviewStepObject {
    fn next_step_identifier(&self, _result: &TaskResult, _is_peeking: bool) -> Option<String> {
        self.next_step_identifier.clone()
    }
}

impl Step for TrackedReviewStepObject {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn step_type(&self) -> &str {
        step_type::REVIEW
    }

    fn instantiate_result(&self) -> ResultObject {
        ResultObject::Base(BaseResult::new(self.identifier.clone()))
    }

    fn navigation_rule(&self) -> Option<&dyn NavigationRule> {
        self.next_step_identifier.as_ref().map(|_| self as _)
    }
}

/// Final step where day-to-day logging happens for the selected items.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedLoggingStepObject {
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Step for TrackedLoggingStepObject {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn step_type(&self) -> &str {
        step_type::LOGGING
    }

    fn instantiate_result(&self) -> ResultObject {
        ResultObject::Base(BaseResult::new(self.identifier.clone()))
    }
}

/// Declarative configuration for a tracked-items flow.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedItemsConfig {
    pub identifier: String,
    #[serde(default)]
    pub items: Vec<TrackedItem>,
    #[serde(default)]
    pub sections: Vec<TrackedSection>,
    pub selection: TrackedSelectionStepObject,
    #[serde(default)]
    pub review: Option<TrackedReviewStepObject>,
    #[serde(default)]
    pub logging: Option<TrackedLoggingStepObject>,
    /// Template instantiated once per selected item that needs details.
    #[serde(default)]
    pub detail: Option<QuestionStepObject>,
}

/// Navigator for the selection, review, detail, and logging flow of a
/// tracked-items task.
///
/// The flow is selection, then review. From review, each selected item
/// without recorded details gets a detail step instantiated from the
/// template; leaving a detail step moves straight on to the next incomplete
/// item, and review comes back once every item is complete. A complete
/// review leads to the logging step when one is configured.
#[derive(Debug)]
pub struct TrackedItemsStepNavigator {
    items: Vec<TrackedItem>,
    sections: Vec<TrackedSection>,
    selection_step: Arc<TrackedSelectionStepObject>,
    review_step: Arc<TrackedReviewStepObject>,
    logging_step: Option<Arc<TrackedLoggingStepObject>>,
    detail_template: Option<QuestionStepObject>,
    /// Working result for this run, mirrored into the task result whenever
    /// it changes.
    in_memory_result: TrackedItemsResult,
    /// Index of the most recent detail item, for the circular search.
    last_detail_index: Option<usize>,
}

impl TrackedItemsStepNavigator {
    pub fn new(config: TrackedItemsConfig) -> Result<Self, AppError> {
        let mut seen = HashSet::new();
        for item in &config.items {
            if sentinel::is_reserved(&item.identifier) {
                return Err(AppError::validation("tracked item identifier is reserved")
                    .with_context("identifier", &item.identifier));
            }
            if !seen.insert(item.identifier.clone()) {
                return Err(AppError::validation("duplicate tracked item identifier")
                    .with_context("identifier", &item.identifier));
            }
        }
        let review_step = config.review.unwrap_or_else(|| TrackedReviewStepObject {
            identifier: "review".to_string(),
            title: None,
            text: None,
            next_step_identifier: None,
        });
        let in_memory_result = TrackedItemsResult::new(config.identifier.clone());
        Ok(TrackedItemsStepNavigator {
            items: config.items,
            sections: config.sections,
            selection_step: Arc::new(config.selection),
            review_step: Arc::new(review_step),
            logging_step: config.logging.map(Arc::new),
            detail_template: config.detail,
            in_memory_result,
            last_detail_index: None,
        })
    }

    /// Seed the working result from a previous run, so a flow whose items
    /// are already complete resumes at the logging step.
    pub fn with_previous_result(mut self, mut previous: TrackedItemsResult) -> Self {
        previous.identifier = self.in_memory_result.identifier.clone();
        self.in_memory_result = previous;
        self
    }

    pub fn items(&self) -> &[TrackedItem] {
        &self.items
    }

    pub fn sections(&self) -> &[TrackedSection] {
        &self.sections
    }

    pub fn result(&self) -> &TrackedItemsResult {
        &self.in_memory_result
    }

    fn selection_arc(&self) -> Arc<dyn Step> {
        self.selection_step.clone()
    }

    fn review_arc(&self) -> Arc<dyn Step> {
        self.review_step.clone()
    }

    fn item_index(&self, identifier: &str) -> Option<usize> {
        self.items.iter().position(|i| i.identifier == identifier)
    }

    /// Build the detail step for one item from the template.
    fn detail_step(&self, item: &TrackedItem) -> Option<Arc<dyn Step>> {
        let template = self.detail_template.as_ref()?;
        let mut step = template.clone();
        step.identifier = item.identifier.clone();
        if step.title.is_none() {
            step.title = item.title.clone();
        }
        if step.text.is_none() {
            step.text = item.detail.clone();
        }
        Some(Arc::new(step))
    }

    /// Find the next selected item without details, searching circularly
    /// from the index after the given one and wrapping at most once.
    fn next_incomplete_item(&self, after: Option<usize>) -> Option<&TrackedItem> {
        if self.detail_template.is_none() {
            return None;
        }
        let count = self.items.len();
        if count == 0 {
            return None;
        }
        let start = after.map(|i| i + 1).unwrap_or(0);
        (0..count)
            .map(|offset| (start + offset) % count)
            .map(|index| &self.items[index])
            .find(|item| {
                self.in_memory_result
                    .selected_answers
                    .iter()
                    .any(|a| a.identifier == item.identifier && !a.is_complete())
            })
    }

    /// Pull the selection answer recorded for the selection step.
    fn selected_from_result(&self, result: &TaskResult) -> Option<Vec<String>> {
        let answer = result.find_answer_result(self.selection_step.identifier())?;
        let values = answer.value.as_ref()?.as_array()?;
        Some(
            values
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
        )
    }

    /// Mirror the working result into the task result step history.
    fn commit(&mut self, result: &mut TaskResult) {
        result.append_step_history(ResultObject::TrackedItems(self.in_memory_result.clone()));
    }

    fn resolve_after(
        &mut self,
        step: Option<&Arc<dyn Step>>,
        result: &mut TaskResult,
        is_peeking: bool,
    ) -> Option<Arc<dyn Step>> {
        let Some(step) = step else {
            // A run seeded with a fully completed result skips straight to
            // day-to-day logging.
            if let Some(logging) = &self.logging_step {
                if !self.in_memory_result.selected_answers.is_empty()
                    && !self.in_memory_result.has_incomplete()
                {
                    return Some(logging.clone() as Arc<dyn Step>);
                }
            }
            return Some(self.selection_arc());
        };
        let identifier = step.identifier().to_string();
        if identifier == self.selection_step.identifier {
            if !is_peeking {
                if let Some(selected) = self.selected_from_result(result) {
                    self.in_memory_result.update_selected(&selected);
                    debug!(count = selected.len(), "updated tracked item selection");
                    self.commit(result);
                }
            }
            return Some(self.review_arc());
        }
        if identifier == self.review_step.identifier {
            if !is_peeking {
                // The review UI may hand back a reworked result wholesale.
                let updated = match result.find_result(&identifier) {
                    Some(ResultObject::TrackedItems(reviewed)) => Some(reviewed.clone()),
                    _ => None,
                };
                if let Some(reviewed) = updated {
                    self.in_memory_result = reviewed;
                    self.commit(result);
                }
            }
            // The review step's own navigation rule can pick which detail
            // step to show next, as long as that item is still incomplete.
            if let Some(rule) = step.navigation_rule() {
                if let Some(target) = rule.next_step_identifier(result, is_peeking) {
                    if let Some(index) = self.item_index(&target) {
                        let incomplete = self
                            .in_memory_result
                            .selected_answers
                            .iter()
                            .any(|a| a.identifier == target && !a.is_complete());
                        if incomplete {
                            let detail = self.detail_step(&self.items[index]);
                            if !is_peeking {
                                self.last_detail_index = Some(index);
                            }
                            return detail;
                        }
                    }
                }
            }
            if let Some(item) = self.next_incomplete_item(self.last_detail_index) {
                let index = self.item_index(&item.identifier);
                let detail = self.detail_step(item);
                if !is_peeking {
                    self.last_detail_index = index;
                }
                return detail;
            }
            return self.logging_step.clone().map(|s| s as Arc<dyn Step>);
        }
        if let Some(logging) = &self.logging_step {
            if identifier == logging.identifier {
                return None;
            }
        }
        if let Some(index) = self.item_index(&identifier) {
            // Leaving a detail step records its answer, then moves on to the
            // next selected item still missing details. Review comes back
            // only once every item is complete.
            if !is_peeking {
                if let Some(answer) = result.find_answer_result(&identifier) {
                    if let Some(value) = answer.value.clone() {
                        self.in_memory_result.update_details(&identifier, value);
                    }
                }
                self.commit(result);
            }
            if let Some(item) = self.next_incomplete_item(Some(index)) {
                let next_index = self.item_index(&item.identifier);
                let detail = self.detail_step(item);
                if !is_peeking {
                    self.last_detail_index = next_index;
                }
                return detail;
            }
            if !is_peeking {
                self.last_detail_index = Some(index);
            }
            return Some(self.review_arc());
        }
        None
    }
}

impl StepNavigator for TrackedItemsStepNavigator {
    fn step(&self, identifier: &str) -> Option<Arc<dyn Step>> {
        if identifier == self.selection_step.identifier {
            return Some(self.selection_arc());
        }
        if identifier == self.review_step.identifier {
            return Some(self.review_arc());
        }
        if let Some(logging) = &self.logging_step {
            if identifier == logging.identifier {
                return Some(logging.clone());
            }
        }
        self.item_index(identifier)
            .and_then(|index| self.detail_step(&self.items[index]))
    }

    fn set_context(&mut self, _context: Arc<Mutex<NavigationContext>>) {}

    fn has_step_after(&mut self, step: Option<&Arc<dyn Step>>, result: &TaskResult) -> bool {
        let mut peek_result = result.clone();
        self.resolve_after(step, &mut peek_result, true).is_some()
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
        let next = self.resolve_after(step, result, is_peeking);
        let direction = match (&next, step) {
            // Returning to review from a detail step travels backward in
            // presentation order.
            (Some(next_step), Some(current))
                if next_step.identifier() == self.review_step.identifier
                    && self.item_index(current.identifier()).is_some() =>
            {
                StepDirection::Reverse
            }
            _ => StepDirection::Forward,
        };
        NextStep {
            step: next,
            direction,
        }
    }

    fn step_before(
        &mut self,
        step: Option<&Arc<dyn Step>>,
        _result: &TaskResult,
    ) -> Option<Arc<dyn Step>> {
        let step = step?;
        let identifier = step.identifier();
        if identifier == self.selection_step.identifier {
            return None;
        }
        if identifier == self.review_step.identifier {
            return Some(self.selection_arc());
        }
        // Detail and logging steps always collapse back to review.
        Some(self.review_arc())
    }

    fn progress(&self, _step: &Arc<dyn Step>, _result: &TaskResult) -> Option<Progress> {
        None
    }

    fn should_exit(&mut self, _step: Option<&Arc<dyn Step>>, _result: &mut TaskResult) -> bool {
        false
    }
}
