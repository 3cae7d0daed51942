use crate::core::error::AppError;
use crate::core::navigation::cohort::CohortNavigationRule;
use crate::core::navigation::conditional::ConditionalStepNavigator;
use crate::core::navigation::rules::{
    CohortAssignmentStep, CohortMutation, CohortNavigationStep, NavigationBackRule,
    NavigationRule, NavigationSkipRule,
};
use crate::core::navigation::sentinel;
use crate::core::navigation::survey::{self, ComparableSurveyRule};
use crate::core::task::answer::AnswerType;
use crate::core::task::definition::{Task, TaskInfo};
use crate::core::task::result::{
    AnswerResult, BaseResult, CollectionResult, ResultObject, TaskResult,
};
use crate::core::task::step::{step_type, SectionStep, Step};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// A display-only step: instructions, active measurements, countdowns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructionStepObject {
    pub identifier: String,
    #[serde(rename = "type", default = "default_instruction_type")]
    pub step_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footnote: Option<String>,
    /// Fixed next-step override. A sentinel is allowed here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_step_identifier: Option<String>,
    /// Declarative veto of backward navigation into this step.
    #[serde(default = "default_true")]
    pub allows_back_navigation: bool,
    /// Skip this step when the history already holds a result for it.
    #[serde(default)]
    pub skip_if_answered: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub before_cohort_rules: Vec<CohortNavigationRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub after_cohort_rules: Vec<CohortNavigationRule>,
}

fn default_instruction_type() -> String {
    step_type::INSTRUCTION.to_string()
}

fn default_true() -> bool {
    true
}

impl InstructionStepObject {
    pub fn new(identifier: impl Into<String>) -> Self {
        InstructionStepObject {
            identifier: identifier.into(),
            step_type: default_instruction_type(),
            title: None,
            text: None,
            footnote: None,
            next_step_identifier: None,
            allows_back_navigation: true,
            skip_if_answered: false,
            before_cohort_rules: Vec::new(),
            after_cohort_rules: Vec::new(),
        }
    }

    pub fn with_next_step(mut self, identifier: impl Into<String>) -> Self {
        self.next_step_identifier = Some(identifier.into());
        self
    }
}

impl NavigationRule for InstructionStepObject {
    fn next_step_identifier(&self, _result: &TaskResult, _is_peeking: bool) -> Option<String> {
        self.next_step_identifier.clone()
    }
}

impl NavigationSkipRule for InstructionStepObject {
    fn should_skip(&self, result: &TaskResult, _is_peeking: bool) -> bool {
        self.skip_if_answered && result.find_result(&self.identifier).is_some()
    }
}

impl NavigationBackRule for InstructionStepObject {
    fn allows_backward(&self, _result: &TaskResult) -> bool {
        self.allows_back_navigation
    }
}

impl CohortNavigationStep for InstructionStepObject {
    fn before_cohort_rules(&self) -> &[CohortNavigationRule] {
        &self.before_cohort_rules
    }

    fn after_cohort_rules(&self) -> &[CohortNavigationRule] {
        &self.after_cohort_rules
    }
}

impl Step for InstructionStepObject {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn step_type(&self) -> &str {
        &self.step_type
    }

    fn instantiate_result(&self) -> ResultObject {
        ResultObject::Base(BaseResult::new(self.identifier.clone()))
    }

    fn navigation_rule(&self) -> Option<&dyn NavigationRule> {
        self.next_step_identifier.as_ref().map(|_| self as _)
    }

    fn skip_rule(&self) -> Option<&dyn NavigationSkipRule> {
        self.skip_if_answered.then_some(self as _)
    }

    fn back_rule(&self) -> Option<&dyn NavigationBackRule> {
        (!self.allows_back_navigation).then_some(self as _)
    }

    fn cohort_navigation(&self) -> Option<&dyn CohortNavigationStep> {
        (!self.before_cohort_rules.is_empty() || !self.after_cohort_rules.is_empty())
            .then_some(self as _)
    }
}

/// Final step of a task. Reaching it marks the run ready to finish.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionStepObject {
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Step for CompletionStepObject {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn step_type(&self) -> &str {
        step_type::COMPLETION
    }

    fn instantiate_result(&self) -> ResultObject {
        ResultObject::Base(BaseResult::new(self.identifier.clone()))
    }
}

/// Fallback step kept when the factory is configured to tolerate unknown
/// step types. Preserves the raw payload for display and archiving.
#[derive(Debug, Clone)]
pub struct GenericStepObject {
    pub identifier: String,
    pub step_type: String,
    pub payload: serde_json::Value,
}

impl Step for GenericStepObject {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn step_type(&self) -> &str {
        &self.step_type
    }

    fn instantiate_result(&self) -> ResultObject {
        ResultObject::Base(BaseResult::new(self.identifier.clone()))
    }
}

/// One question within a form step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputField {
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default)]
    pub answer_type: AnswerType,
    #[serde(default)]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub survey_rules: Vec<ComparableSurveyRule>,
}

impl InputField {
    pub fn new(identifier: impl Into<String>, answer_type: AnswerType) -> Self {
        InputField {
            identifier: identifier.into(),
            prompt: None,
            answer_type,
            optional: false,
            survey_rules: Vec::new(),
        }
    }

    pub fn with_rule(mut self, rule: ComparableSurveyRule) -> Self {
        self.survey_rules.push(rule);
        self
    }
}

/// A form step whose input fields carry survey rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionStepObject {
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub input_fields: Vec<InputField>,
    /// Where to go when every field was left unanswered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_to_if_nil: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub before_cohort_rules: Vec<CohortNavigationRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub after_cohort_rules: Vec<CohortNavigationRule>,
}

impl QuestionStepObject {
    pub fn new(identifier: impl Into<String>) -> Self {
        QuestionStepObject {
            identifier: identifier.into(),
            title: None,
            text: None,
            input_fields: Vec::new(),
            skip_to_if_nil: None,
            before_cohort_rules: Vec::new(),
            after_cohort_rules: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: InputField) -> Self {
        self.input_fields.push(field);
        self
    }

    /// The recorded answer for one field. A single-field step records its
    /// answer under the step identifier, so fall back to that when the field
    /// identifier finds nothing.
    fn answer_for<'a>(
        &self,
        field: &InputField,
        result: &'a TaskResult,
    ) -> Option<&'a AnswerResult> {
        result
            .find_answer_result(&field.identifier)
            .or_else(|| result.find_answer_result(&self.identifier))
    }

    /// Evaluate every field's survey rules against the recorded answers.
    ///
    /// A skip target is honored only when exactly one rule fires; two firing
    /// rules are ambiguous even when they name the same target. When no rule
    /// fires and every answer is nil, the step's `skip_to_if_nil` applies.
    fn evaluate_survey_rules(&self, result: &TaskResult, is_peeking: bool) -> Option<String> {
        if is_peeking {
            return None;
        }
        let mut all_answers_nil = true;
        let mut skip_identifiers = Vec::new();
        for field in &self.input_fields {
            let answer = self.answer_for(field, result);
            all_answers_nil &= answer.and_then(|a| a.value.as_ref()).is_none();
            for rule in &field.survey_rules {
                if let Some(skip_to) = rule.evaluate_rule(answer) {
                    skip_identifiers.push(skip_to);
                }
            }
        }
        if skip_identifiers.len() == 1 {
            return skip_identifiers.pop();
        }
        if all_answers_nil {
            return self.skip_to_if_nil.clone();
        }
        None
    }

    /// Overlay the key/values carried by a generic step onto this one,
    /// keeping the identifier and any field the override does not name.
    pub fn merge_from(&mut self, overrides: &GenericStepObject) -> Result<(), AppError> {
        let mut merged = serde_json::to_value(&*self)?;
        if let (serde_json::Value::Object(base), serde_json::Value::Object(over)) =
            (&mut merged, &overrides.payload)
        {
            for (key, value) in over {
                if key == "identifier" || key == "type" {
                    continue;
                }
                base.insert(key.clone(), value.clone());
            }
        }
        let mut updated: QuestionStepObject = serde_json::from_value(merged)?;
        updated.identifier = self.identifier.clone();
        updated.validate()?;
        *self = updated;
        Ok(())
    }
}

impl NavigationRule for QuestionStepObject {
    fn next_step_identifier(&self, result: &TaskResult, is_peeking: bool) -> Option<String> {
        self.evaluate_survey_rules(result, is_peeking)
    }
}

impl CohortAssignmentStep for QuestionStepObject {
    fn cohorts_to_apply(&self, result: &TaskResult) -> Option<CohortMutation> {
        let mut combined = CohortMutation::default();
        for field in &self.input_fields {
            let answer = self.answer_for(field, result);
            if let Some(mutation) = survey::evaluate_cohorts(&field.survey_rules, answer) {
                combined.merge(mutation);
            }
        }
        (!combined.is_empty()).then_some(combined)
    }
}

impl CohortNavigationStep for QuestionStepObject {
    fn before_cohort_rules(&self) -> &[CohortNavigationRule] {
        &self.before_cohort_rules
    }

    fn after_cohort_rules(&self) -> &[CohortNavigationRule] {
        &self.after_cohort_rules
    }
}

impl Step for QuestionStepObject {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn step_type(&self) -> &str {
        step_type::FORM
    }

    fn validate(&self) -> Result<(), AppError> {
        if sentinel::is_reserved(&self.identifier) {
            return Err(AppError::validation("step identifier is reserved")
                .with_context("identifier", &self.identifier));
        }
        let mut seen = HashSet::new();
        for field in &self.input_fields {
            if !seen.insert(field.identifier.as_str()) {
                return Err(AppError::validation("duplicate input field identifier")
                    .with_context("identifier", &field.identifier)
                    .with_context("step", &self.identifier));
            }
            for rule in &field.survey_rules {
                rule.validate()?;
            }
        }
        Ok(())
    }

    /// A single-field step records a plain answer result; multiple fields
    /// record a collection keyed by field identifier.
    fn instantiate_result(&self) -> ResultObject {
        match self.input_fields.as_slice() {
            [field] => ResultObject::Answer(AnswerResult::new(
                self.identifier.clone(),
                field.answer_type.clone(),
            )),
            _ => ResultObject::Collection(CollectionResult::new(self.identifier.clone())),
        }
    }

    fn navigation_rule(&self) -> Option<&dyn NavigationRule> {
        Some(self as _)
    }

    fn cohort_assignment(&self) -> Option<&dyn CohortAssignmentStep> {
        Some(self as _)
    }

    fn cohort_navigation(&self) -> Option<&dyn CohortNavigationStep> {
        (!self.before_cohort_rules.is_empty() || !self.after_cohort_rules.is_empty())
            .then_some(self as _)
    }
}

/// A step that groups nested steps, navigated in place as a subtask.
#[derive(Debug, Clone)]
pub struct SectionStepObject {
    pub identifier: String,
    pub steps: Vec<Arc<dyn Step>>,
    pub progress_markers: Option<Vec<String>>,
}

impl SectionStepObject {
    pub fn new(identifier: impl Into<String>, steps: Vec<Arc<dyn Step>>) -> Self {
        SectionStepObject {
            identifier: identifier.into(),
            steps,
            progress_markers: None,
        }
    }
}

impl SectionStep for SectionStepObject {
    fn steps(&self) -> &[Arc<dyn Step>] {
        &self.steps
    }

    fn to_task(&self) -> Task {
        let mut navigator = ConditionalStepNavigator::new(self.steps.clone());
        navigator.progress_markers = self.progress_markers.clone();
        Task::new(self.identifier.clone(), Box::new(navigator))
    }

    fn progress_markers(&self) -> Option<&[String]> {
        self.progress_markers.as_deref()
    }
}

impl Step for SectionStepObject {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn step_type(&self) -> &str {
        step_type::SECTION
    }

    fn instantiate_result(&self) -> ResultObject {
        ResultObject::Task(TaskResult::new(self.identifier.clone()))
    }

    fn as_section(&self) -> Option<&dyn SectionStep> {
        Some(self as _)
    }
}

/// Placeholder step for a subtask fetched when the step is reached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskInfoStepObject {
    #[serde(flatten)]
    pub task_info: TaskInfo,
}

impl TaskInfoStepObject {
    pub fn new(task_info: TaskInfo) -> Self {
        TaskInfoStepObject { task_info }
    }
}

impl Step for TaskInfoStepObject {
    fn identifier(&self) -> &str {
        &self.task_info.identifier
    }

    fn step_type(&self) -> &str {
        step_type::TASK_INFO
    }

    fn instantiate_result(&self) -> ResultObject {
        ResultObject::Task(TaskResult::new(self.task_info.identifier.clone()))
    }

    fn as_task_info(&self) -> Option<&TaskInfo> {
        Some(&self.task_info)
    }
}
