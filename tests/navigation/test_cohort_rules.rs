use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use waypoint::core::navigation::cohort::{
    CohortNavigationRule, CohortRuleOperator, CohortTrackingRule,
};
use waypoint::core::navigation::rules::{CohortAssignmentStep, TrackingRule};
use waypoint::core::task::answer::{AnswerType, BaseType};
use waypoint::core::task::objects::{InputField, InstructionStepObject, QuestionStepObject};
use waypoint::core::task::result::{AnswerResult, ResultObject, TaskResult};
use waypoint::core::task::step::Step;

fn cohorts(names: &[&str]) -> HashSet<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn rule(required: &[&str], operator: CohortRuleOperator, skip_to: Option<&str>) -> CohortNavigationRule {
    CohortNavigationRule {
        required_cohorts: cohorts(required),
        cohort_operator: Some(operator),
        skip_to_identifier: skip_to.map(str::to_string),
    }
}

#[test]
fn all_operator_requires_every_cohort() {
    let rule = rule(&["a", "b"], CohortRuleOperator::All, None);
    assert!(rule.evaluate(&cohorts(&["a", "b"])));
    assert!(rule.evaluate(&cohorts(&["a", "b", "c"])));
    assert!(!rule.evaluate(&cohorts(&["a"])));
    assert!(!rule.evaluate(&HashSet::new()));
}

#[test]
fn any_operator_requires_an_overlap() {
    let rule = rule(&["a", "b"], CohortRuleOperator::Any, None);
    assert!(rule.evaluate(&cohorts(&["b", "z"])));
    assert!(!rule.evaluate(&cohorts(&["z"])));
}

#[test]
fn empty_required_cohorts_never_fire() {
    let all = rule(&[], CohortRuleOperator::All, Some("anywhere"));
    let any = rule(&[], CohortRuleOperator::Any, Some("anywhere"));
    assert!(!all.evaluate(&HashSet::new()));
    assert!(!any.evaluate(&cohorts(&["a"])));
}

#[test]
fn before_rules_default_to_skipping_the_step() {
    let step: Arc<dyn Step> = Arc::new(
        serde_json::from_value::<InstructionStepObject>(json!({
            "identifier": "optional",
            "beforeCohortRules": [{"requiredCohorts": ["skipper"]}]
        }))
        .unwrap(),
    );
    let result = TaskResult::new("task");
    let mut tracking = CohortTrackingRule::new(cohorts(&["skipper"]));
    assert_eq!(
        tracking.skip_to_step(&step, &result, false),
        Some("nextStep".to_string())
    );

    let mut not_member = CohortTrackingRule::default();
    assert_eq!(not_member.skip_to_step(&step, &result, false), None);
}

#[test]
fn after_rules_default_to_leaving_the_section() {
    let step: Arc<dyn Step> = Arc::new(
        serde_json::from_value::<InstructionStepObject>(json!({
            "identifier": "gate",
            "afterCohortRules": [{"requiredCohorts": ["done"]}]
        }))
        .unwrap(),
    );
    let result = TaskResult::new("task");
    let mut tracking = CohortTrackingRule::new(cohorts(&["done"]));
    assert_eq!(
        tracking.next_step_identifier(&step, &result, false),
        Some("nextSection".to_string())
    );
}

fn assignment_step() -> QuestionStepObject {
    QuestionStepObject::new("screening").with_field(
        InputField::new("screening", AnswerType::new(BaseType::Integer)).with_rule(
            serde_json::from_value(json!({"matchingAnswer": 1, "cohort": "eligible"})).unwrap(),
        ),
    )
}

fn result_with_answer(value: serde_json::Value) -> TaskResult {
    let mut result = TaskResult::new("task");
    result.append_step_history(ResultObject::Answer(
        AnswerResult::new("screening", AnswerType::new(BaseType::Integer)).with_value(value),
    ));
    result
}

#[test]
fn assignment_steps_mutate_the_current_cohorts() {
    let step: Arc<dyn Step> = Arc::new(assignment_step());
    let mut tracking = CohortTrackingRule::default();

    tracking.next_step_identifier(&step, &result_with_answer(json!(1)), false);
    assert!(tracking.current_cohorts.contains("eligible"));

    // A non-matching answer retracts the cohort again.
    tracking.next_step_identifier(&step, &result_with_answer(json!(0)), false);
    assert!(!tracking.current_cohorts.contains("eligible"));
}

#[test]
fn mutation_leaves_the_initial_membership_intact() {
    let step: Arc<dyn Step> = Arc::new(assignment_step());
    let mut tracking = CohortTrackingRule::new(cohorts(&["enrolled"]));

    tracking.next_step_identifier(&step, &result_with_answer(json!(1)), false);
    assert_eq!(tracking.current_cohorts, cohorts(&["enrolled", "eligible"]));
    assert_eq!(tracking.initial_cohorts, cohorts(&["enrolled"]));
}

#[test]
fn peeking_never_mutates_the_cohorts() {
    let step: Arc<dyn Step> = Arc::new(assignment_step());
    let mut tracking = CohortTrackingRule::default();
    tracking.next_step_identifier(&step, &result_with_answer(json!(1)), true);
    assert!(tracking.current_cohorts.is_empty());
}

#[test]
fn cohort_mutations_union_across_rules() {
    let step = QuestionStepObject::new("screening").with_field(
        InputField::new("screening", AnswerType::new(BaseType::Integer))
            .with_rule(
                serde_json::from_value(json!({"matchingAnswer": 1, "cohort": "one"})).unwrap(),
            )
            .with_rule(
                serde_json::from_value(json!({"matchingAnswer": 2, "cohort": "two"})).unwrap(),
            ),
    );
    let mutation = step.cohorts_to_apply(&result_with_answer(json!(1))).unwrap();
    assert!(mutation.add.contains("one"));
    assert!(mutation.remove.contains("two"));
}
