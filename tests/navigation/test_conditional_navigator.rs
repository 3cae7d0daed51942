use serde_json::json;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use waypoint::core::navigation::cohort::CohortTrackingRule;
use waypoint::core::navigation::conditional::ConditionalStepNavigator;
use waypoint::core::navigation::rules::{
    NavigationBackRule, NavigationContext, NavigationRule, NavigationSkipRule,
};
use waypoint::core::navigation::{StepDirection, StepNavigator};
use waypoint::core::task::answer::{AnswerType, BaseType};
use waypoint::core::task::objects::{InputField, InstructionStepObject, QuestionStepObject};
use waypoint::core::task::result::{AnswerResult, BaseResult, ResultObject, TaskResult};
use waypoint::core::task::step::Step;

/// Minimal step with scriptable navigation behavior.
#[derive(Debug)]
struct TestStep {
    identifier: String,
    next: Option<String>,
    skip: bool,
    allows_back: bool,
}

impl TestStep {
    fn new(identifier: &str) -> Self {
        TestStep {
            identifier: identifier.to_string(),
            next: None,
            skip: false,
            allows_back: true,
        }
    }

    fn with_next(mut self, next: &str) -> Self {
        self.next = Some(next.to_string());
        self
    }

    fn skipped(mut self) -> Self {
        self.skip = true;
        self
    }

    fn no_back(mut self) -> Self {
        self.allows_back = false;
        self
    }
}

impl NavigationRule for TestStep {
    fn next_step_identifier(&self, _result: &TaskResult, _is_peeking: bool) -> Option<String> {
        self.next.clone()
    }
}

impl NavigationSkipRule for TestStep {
    fn should_skip(&self, _result: &TaskResult, _is_peeking: bool) -> bool {
        self.skip
    }
}

impl NavigationBackRule for TestStep {
    fn allows_backward(&self, _result: &TaskResult) -> bool {
        self.allows_back
    }
}

impl Step for TestStep {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn step_type(&self) -> &str {
        "test"
    }

    fn instantiate_result(&self) -> ResultObject {
        ResultObject::Base(BaseResult::new(self.identifier.clone()))
    }

    fn navigation_rule(&self) -> Option<&dyn NavigationRule> {
        self.next.as_ref().map(|_| self as _)
    }

    fn skip_rule(&self) -> Option<&dyn NavigationSkipRule> {
        self.skip.then_some(self as _)
    }

    fn back_rule(&self) -> Option<&dyn NavigationBackRule> {
        (!self.allows_back).then_some(self as _)
    }
}

fn navigator(steps: Vec<TestStep>) -> ConditionalStepNavigator {
    ConditionalStepNavigator::new(
        steps
            .into_iter()
            .map(|s| Arc::new(s) as Arc<dyn Step>)
            .collect(),
    )
}

fn result_with_history(identifiers: &[&str]) -> TaskResult {
    let mut result = TaskResult::new("task");
    for identifier in identifiers {
        result.append_step_history(ResultObject::Base(BaseResult::new(*identifier)));
    }
    result
}

#[test]
fn navigates_the_list_in_order() {
    let mut nav = navigator(vec![TestStep::new("a"), TestStep::new("b"), TestStep::new("c")]);
    let mut result = TaskResult::new("task");

    let first = nav.step_after(None, &mut result, false);
    assert_eq!(first.step.unwrap().identifier(), "a");
    assert_eq!(first.direction, StepDirection::Forward);

    let a = nav.step("a").unwrap();
    let second = nav.step_after(Some(&a), &mut result, false);
    assert_eq!(second.step.unwrap().identifier(), "b");

    let c = nav.step("c").unwrap();
    assert!(nav.step_after(Some(&c), &mut result, false).step.is_none());
    assert!(!nav.should_exit(Some(&c), &mut result));
}

#[test]
fn navigation_rules_jump_over_steps() {
    let mut nav = navigator(vec![
        TestStep::new("a").with_next("c"),
        TestStep::new("b"),
        TestStep::new("c"),
    ]);
    let mut result = result_with_history(&["a"]);
    let a = nav.step("a").unwrap();
    let next = nav.step_after(Some(&a), &mut result, false);
    assert_eq!(next.step.unwrap().identifier(), "c");
    assert_eq!(next.direction, StepDirection::Forward);
}

#[test]
fn exit_sentinel_ends_the_whole_task() {
    let mut nav = navigator(vec![TestStep::new("a").with_next("exit"), TestStep::new("b")]);
    let mut result = result_with_history(&["a"]);
    let a = nav.step("a").unwrap();
    assert!(nav.step_after(Some(&a), &mut result, false).step.is_none());
    assert!(nav.should_exit(Some(&a), &mut result));
}

#[test]
fn jumping_to_an_answered_step_travels_in_reverse() {
    let mut nav = navigator(vec![
        TestStep::new("a"),
        TestStep::new("b").with_next("a"),
        TestStep::new("c"),
    ]);
    let mut result = result_with_history(&["a", "b"]);
    let b = nav.step("b").unwrap();
    let next = nav.step_after(Some(&b), &mut result, false);
    assert_eq!(next.step.unwrap().identifier(), "a");
    assert_eq!(next.direction, StepDirection::Reverse);
}

#[test]
fn skip_rules_drop_steps_from_the_path() {
    let mut nav = navigator(vec![
        TestStep::new("a"),
        TestStep::new("b").skipped(),
        TestStep::new("c"),
    ]);
    let mut result = result_with_history(&["a"]);
    let a = nav.step("a").unwrap();
    let next = nav.step_after(Some(&a), &mut result, false);
    assert_eq!(next.step.unwrap().identifier(), "c");
}

#[test]
fn skipping_every_remaining_step_ends_navigation() {
    let mut nav = navigator(vec![TestStep::new("a"), TestStep::new("b").skipped()]);
    let mut result = result_with_history(&["a"]);
    let a = nav.step("a").unwrap();
    assert!(nav.step_after(Some(&a), &mut result, false).step.is_none());
}

#[test]
fn skip_cycles_end_navigation_instead_of_looping() {
    let mut nav = navigator(vec![TestStep::new("a").with_next("a").skipped()]);
    let mut result = TaskResult::new("task");
    assert!(nav.step_after(None, &mut result, false).step.is_none());
}

#[test]
fn step_before_walks_the_history() {
    let mut nav = navigator(vec![TestStep::new("a"), TestStep::new("b"), TestStep::new("c")]);
    let result = result_with_history(&["a", "b", "c"]);

    let c = nav.step("c").unwrap();
    assert_eq!(
        nav.step_before(Some(&c), &result).unwrap().identifier(),
        "b"
    );
    let a = nav.step("a").unwrap();
    assert!(nav.step_before(Some(&a), &result).is_none());
}

#[test]
fn back_rules_veto_backward_navigation() {
    let mut nav = navigator(vec![TestStep::new("a"), TestStep::new("b").no_back()]);
    let result = result_with_history(&["a", "b"]);
    let b = nav.step("b").unwrap();
    assert!(nav.step_before(Some(&b), &result).is_none());
    assert!(!nav.has_step_before(Some(&b), &result));
}

#[test]
fn declarative_back_and_skip_fields_wire_the_rules() {
    let no_back: InstructionStepObject = serde_json::from_value(json!({
        "identifier": "b",
        "allowsBackNavigation": false
    }))
    .unwrap();
    let revisit: InstructionStepObject = serde_json::from_value(json!({
        "identifier": "c",
        "skipIfAnswered": true
    }))
    .unwrap();
    let steps: Vec<Arc<dyn Step>> = vec![
        Arc::new(TestStep::new("a")),
        Arc::new(no_back),
        Arc::new(revisit),
        Arc::new(TestStep::new("d")),
    ];
    let mut nav = ConditionalStepNavigator::new(steps);

    let result = result_with_history(&["a", "b"]);
    let b = nav.step("b").unwrap();
    assert!(nav.step_before(Some(&b), &result).is_none());

    // A step answered on an earlier pass drops out of the forward path.
    let mut result = result_with_history(&["a", "b", "c"]);
    let next = nav.step_after(Some(&b), &mut result, false);
    assert_eq!(next.step.unwrap().identifier(), "d");
}

#[test]
fn cohort_redirects_apply_before_a_step_is_shown() {
    let gated: InstructionStepObject = serde_json::from_value(json!({
        "identifier": "b",
        "beforeCohortRules": [{"requiredCohorts": ["skipper"], "skipToIdentifier": "c"}]
    }))
    .unwrap();
    let steps: Vec<Arc<dyn Step>> = vec![
        Arc::new(TestStep::new("a")),
        Arc::new(gated),
        Arc::new(TestStep::new("c")),
    ];
    let mut nav = ConditionalStepNavigator::new(steps);
    let cohorts: HashSet<String> = ["skipper".to_string()].into_iter().collect();
    nav.set_context(Arc::new(Mutex::new(
        NavigationContext::new()
            .with_tracking_rule(Box::new(CohortTrackingRule::new(cohorts))),
    )));

    let mut result = result_with_history(&["a"]);
    let a = nav.step("a").unwrap();
    let next = nav.step_after(Some(&a), &mut result, false);
    assert_eq!(next.step.unwrap().identifier(), "c");
}

#[test]
fn peeking_ignores_survey_navigation() {
    let question = QuestionStepObject::new("question").with_field(
        InputField::new("question", AnswerType::new(BaseType::Integer)).with_rule(
            serde_json::from_value(json!({"matchingAnswer": 1})).unwrap(),
        ),
    );
    let steps: Vec<Arc<dyn Step>> = vec![Arc::new(question), Arc::new(TestStep::new("b"))];
    let mut nav = ConditionalStepNavigator::new(steps);

    let mut result = TaskResult::new("task");
    result.append_step_history(ResultObject::Answer(
        AnswerResult::new("question", AnswerType::new(BaseType::Integer)).with_value(json!(1)),
    ));
    let question = nav.step("question").unwrap();

    // Peeking sees the in-order next step even though the answered rule
    // would exit the task.
    assert!(nav.has_step_after(Some(&question), &result));
    assert!(nav
        .step_after(Some(&question), &mut result, false)
        .step
        .is_none());
}

#[test]
fn marker_progress_counts_milestones() {
    let mut nav = navigator(vec![TestStep::new("a"), TestStep::new("b"), TestStep::new("c")]);
    nav.progress_markers = Some(vec!["a".to_string(), "c".to_string()]);
    let nav: &mut dyn StepNavigator = &mut nav;

    let a = nav.step("a").unwrap();
    let progress = nav.progress(&a, &result_with_history(&["a"])).unwrap();
    assert_eq!((progress.current, progress.total), (1, 2));
    assert!(!progress.is_estimated);

    // An unmarked step keeps the progress of the last marker reached.
    let b = nav.step("b").unwrap();
    let progress = nav.progress(&b, &result_with_history(&["a", "b"])).unwrap();
    assert_eq!(progress.current, 1);

    let c = nav.step("c").unwrap();
    let progress = nav
        .progress(&c, &result_with_history(&["a", "b", "c"]))
        .unwrap();
    assert_eq!((progress.current, progress.total), (2, 2));
}

#[test]
fn estimated_progress_uses_the_flat_list() {
    let mut nav = navigator(vec![TestStep::new("a"), TestStep::new("b"), TestStep::new("c")]);
    let nav: &mut dyn StepNavigator = &mut nav;
    let b = nav.step("b").unwrap();
    let progress = nav.progress(&b, &result_with_history(&["a"])).unwrap();
    assert_eq!((progress.current, progress.total), (2, 3));
    assert!(progress.is_estimated);
}
