use serde_json::json;
use std::sync::Arc;
use waypoint::core::navigation::tracked::{
    TrackedItemsConfig, TrackedItemsResult, TrackedItemsStepNavigator,
};
use waypoint::core::navigation::{StepDirection, StepNavigator};
use waypoint::core::task::answer::{AnswerType, BaseType};
use waypoint::core::task::result::{AnswerResult, ResultObject, TaskResult};
use waypoint::core::task::step::Step;

fn config(value: serde_json::Value) -> TrackedItemsConfig {
    serde_json::from_value(value).unwrap()
}

fn medication_navigator() -> TrackedItemsStepNavigator {
    TrackedItemsStepNavigator::new(config(json!({
        "identifier": "medications",
        "items": [
            {"identifier": "ibuprofen", "title": "Ibuprofen"},
            {"identifier": "naproxen", "title": "Naproxen"},
            {"identifier": "aspirin", "title": "Aspirin"}
        ],
        "selection": {"identifier": "selection", "title": "What do you take?"},
        "review": {"identifier": "review"},
        "logging": {"identifier": "logging"},
        "detail": {
            "identifier": "detail",
            "inputFields": [
                {"identifier": "dose", "answerType": {"baseType": "string"}}
            ]
        }
    })))
    .unwrap()
}

fn select(result: &mut TaskResult, items: &[&str]) {
    result.append_step_history(ResultObject::Answer(
        AnswerResult::new("selection", AnswerType::array(BaseType::String))
            .with_value(json!(items)),
    ));
}

fn record_detail(result: &mut TaskResult, identifier: &str, dose: &str) {
    result.append_step_history(ResultObject::Answer(
        AnswerResult::new(identifier, AnswerType::new(BaseType::String))
            .with_value(json!(dose)),
    ));
}

#[test]
fn the_flow_starts_with_selection() {
    let mut nav = medication_navigator();
    let mut result = TaskResult::new("medications");
    let first = nav.step_after(None, &mut result, false);
    assert_eq!(first.step.unwrap().identifier(), "selection");
}

#[test]
fn selection_leads_to_review_and_details() {
    let mut nav = medication_navigator();
    let mut result = TaskResult::new("medications");
    select(&mut result, &["ibuprofen", "aspirin"]);

    let selection = nav.step("selection").unwrap();
    let next = nav.step_after(Some(&selection), &mut result, false);
    assert_eq!(next.step.unwrap().identifier(), "review");
    assert_eq!(
        nav.result().selected_identifiers(),
        vec!["ibuprofen", "aspirin"]
    );

    // Review hands out a detail step for the first incomplete item.
    let review = nav.step("review").unwrap();
    let detail = nav.step_after(Some(&review), &mut result, false);
    let detail_step = detail.step.unwrap();
    assert_eq!(detail_step.identifier(), "ibuprofen");
    assert_eq!(detail_step.step_type(), "form");
}

#[test]
fn details_chain_through_the_incomplete_items() {
    let mut nav = medication_navigator();
    let mut result = TaskResult::new("medications");
    select(&mut result, &["ibuprofen", "naproxen", "aspirin"]);

    let selection = nav.step("selection").unwrap();
    nav.step_after(Some(&selection), &mut result, false);
    let review = nav.step("review").unwrap();

    let first = nav.step_after(Some(&review), &mut result, false).step.unwrap();
    assert_eq!(first.identifier(), "ibuprofen");

    // Leaving a detail step moves straight on to the next incomplete item.
    record_detail(&mut result, "ibuprofen", "200mg");
    let second = nav.step_after(Some(&first), &mut result, false);
    assert_eq!(second.direction, StepDirection::Forward);
    let second = second.step.unwrap();
    assert_eq!(second.identifier(), "naproxen");

    record_detail(&mut result, "naproxen", "500mg");
    let third = nav.step_after(Some(&second), &mut result, false).step.unwrap();
    assert_eq!(third.identifier(), "aspirin");

    // The last detail collapses back to review.
    record_detail(&mut result, "aspirin", "80mg");
    let back = nav.step_after(Some(&third), &mut result, false);
    assert_eq!(back.step.unwrap().identifier(), "review");
    assert_eq!(back.direction, StepDirection::Reverse);

    // All items complete, so review leads to logging.
    let next = nav.step_after(Some(&review), &mut result, false);
    assert_eq!(next.step.unwrap().identifier(), "logging");

    let logging = nav.step("logging").unwrap();
    assert!(nav.step_after(Some(&logging), &mut result, false).step.is_none());

    let answers = &nav.result().selected_answers;
    assert!(answers.iter().all(|a| a.is_complete()));
}

#[test]
fn a_completed_previous_run_resumes_at_logging() {
    let mut previous = TrackedItemsResult::new("medications");
    previous.update_selected(&["ibuprofen".to_string(), "aspirin".to_string()]);
    previous.update_details("ibuprofen", json!("200mg"));
    previous.update_details("aspirin", json!("80mg"));

    let mut nav = medication_navigator().with_previous_result(previous);
    let mut result = TaskResult::new("medications");
    let first = nav.step_after(None, &mut result, false);
    assert_eq!(first.step.unwrap().identifier(), "logging");
}

#[test]
fn an_incomplete_previous_run_starts_over_at_selection() {
    let mut previous = TrackedItemsResult::new("medications");
    previous.update_selected(&["ibuprofen".to_string()]);

    let mut nav = medication_navigator().with_previous_result(previous);
    let mut result = TaskResult::new("medications");
    let first = nav.step_after(None, &mut result, false);
    assert_eq!(first.step.unwrap().identifier(), "selection");
}

#[test]
fn review_navigation_rules_pick_the_next_detail() {
    let mut nav = TrackedItemsStepNavigator::new(config(json!({
        "identifier": "medications",
        "items": [
            {"identifier": "ibuprofen"},
            {"identifier": "aspirin"}
        ],
        "selection": {"identifier": "selection"},
        "review": {"identifier": "review", "nextStepIdentifier": "aspirin"},
        "detail": {
            "identifier": "detail",
            "inputFields": [
                {"identifier": "dose", "answerType": {"baseType": "string"}}
            ]
        }
    })))
    .unwrap();
    let mut result = TaskResult::new("medications");
    select(&mut result, &["ibuprofen", "aspirin"]);
    let selection = nav.step("selection").unwrap();
    nav.step_after(Some(&selection), &mut result, false);

    let review = nav.step("review").unwrap();
    let detail = nav.step_after(Some(&review), &mut result, false).step.unwrap();
    assert_eq!(detail.identifier(), "aspirin");

    // Once the named item is complete the rule no longer applies.
    record_detail(&mut result, "aspirin", "80mg");
    nav.step_after(Some(&detail), &mut result, false);
    let fallback = nav.step_after(Some(&review), &mut result, false).step.unwrap();
    assert_eq!(fallback.identifier(), "ibuprofen");
}

#[test]
fn the_working_result_is_mirrored_into_the_task_result() {
    let mut nav = medication_navigator();
    let mut result = TaskResult::new("medications");
    select(&mut result, &["naproxen"]);
    let selection = nav.step("selection").unwrap();
    nav.step_after(Some(&selection), &mut result, false);

    let mirrored = result.find_result("medications").unwrap();
    match mirrored {
        ResultObject::TrackedItems(tracked) => {
            assert_eq!(tracked.selected_identifiers(), vec!["naproxen"]);
        }
        other => panic!("expected a tracked items result, got {:?}", other),
    }
}

#[test]
fn peeking_does_not_advance_the_detail_rotation() {
    let mut nav = medication_navigator();
    let mut result = TaskResult::new("medications");
    select(&mut result, &["ibuprofen", "aspirin"]);
    let selection = nav.step("selection").unwrap();
    nav.step_after(Some(&selection), &mut result, false);

    let review = nav.step("review").unwrap();
    assert!(nav.has_step_after(Some(&review), &result));
    // Peeking twice still starts the rotation at the first incomplete item.
    let first = nav.step_after(Some(&review), &mut result, false).step.unwrap();
    assert_eq!(first.identifier(), "ibuprofen");
}

#[test]
fn reselection_keeps_recorded_details() {
    let mut nav = medication_navigator();
    let mut result = TaskResult::new("medications");
    select(&mut result, &["ibuprofen", "aspirin"]);
    let selection = nav.step("selection").unwrap();
    nav.step_after(Some(&selection), &mut result, false);

    let review = nav.step("review").unwrap();
    let detail = nav.step_after(Some(&review), &mut result, false).step.unwrap();
    record_detail(&mut result, "ibuprofen", "200mg");
    nav.step_after(Some(&detail), &mut result, false);

    // Deselect aspirin, keep ibuprofen, add naproxen.
    select(&mut result, &["ibuprofen", "naproxen"]);
    nav.step_after(Some(&selection), &mut result, false);

    let answers = &nav.result().selected_answers;
    assert_eq!(answers.len(), 2);
    assert!(answers[0].is_complete());
    assert!(!answers[1].is_complete());
}

#[test]
fn backward_navigation_collapses_to_review() {
    let mut nav = medication_navigator();
    let result = TaskResult::new("medications");

    let selection = nav.step("selection").unwrap();
    assert!(nav.step_before(Some(&selection), &result).is_none());

    let review = nav.step("review").unwrap();
    assert_eq!(
        nav.step_before(Some(&review), &result).unwrap().identifier(),
        "selection"
    );

    let detail: Arc<dyn Step> = nav.step("ibuprofen").unwrap();
    assert_eq!(
        nav.step_before(Some(&detail), &result).unwrap().identifier(),
        "review"
    );
    let logging = nav.step("logging").unwrap();
    assert_eq!(
        nav.step_before(Some(&logging), &result).unwrap().identifier(),
        "review"
    );
}

#[test]
fn review_without_logging_can_be_the_last_step() {
    let mut nav = TrackedItemsStepNavigator::new(config(json!({
        "identifier": "triggers",
        "items": [{"identifier": "pollen"}],
        "selection": {"identifier": "selection"},
        "review": {"identifier": "review"},
        "detail": {
            "identifier": "detail",
            "inputFields": [
                {"identifier": "severity", "answerType": {"baseType": "integer"}}
            ]
        }
    })))
    .unwrap();

    let mut result = TaskResult::new("triggers");
    select(&mut result, &["pollen"]);
    let selection = nav.step("selection").unwrap();
    nav.step_after(Some(&selection), &mut result, false);

    let review = nav.step("review").unwrap();
    // Incomplete item: there is still a step after review.
    assert!(nav.has_step_after(Some(&review), &result));

    let detail = nav.step_after(Some(&review), &mut result, false).step.unwrap();
    record_detail(&mut result, "pollen", "3");
    nav.step_after(Some(&detail), &mut result, false);

    // Everything complete and no logging step: review is the end.
    assert!(!nav.has_step_after(Some(&review), &result));
    assert!(nav.step_after(Some(&review), &mut result, false).step.is_none());
}

#[test]
fn duplicate_and_reserved_item_identifiers_are_rejected() {
    let duplicate = TrackedItemsStepNavigator::new(config(json!({
        "identifier": "items",
        "items": [{"identifier": "a"}, {"identifier": "a"}],
        "selection": {"identifier": "selection"}
    })));
    assert!(duplicate.is_err());

    let reserved = TrackedItemsStepNavigator::new(config(json!({
        "identifier": "items",
        "items": [{"identifier": "exit"}],
        "selection": {"identifier": "selection"}
    })));
    assert!(reserved.is_err());
}
