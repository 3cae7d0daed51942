use serde_json::json;
use waypoint::core::task::answer::{AnswerType, BaseType};
use waypoint::core::task::result::{
    AnswerResult, BaseResult, CollectionResult, ResultObject, TaskResult,
};

fn answer(identifier: &str, value: serde_json::Value) -> ResultObject {
    ResultObject::Answer(
        AnswerResult::new(identifier, AnswerType::new(BaseType::Integer)).with_value(value),
    )
}

#[test]
fn step_history_keeps_one_entry_per_identifier() {
    let mut result = TaskResult::new("task");
    assert!(result.append_step_history(answer("intro", json!(0))).is_none());
    result.append_step_history(answer("question", json!(1)));
    let displaced = result.append_step_history(answer("intro", json!(2)));

    assert_eq!(displaced.unwrap().identifier(), "intro");
    let order: Vec<_> = result.step_history.iter().map(|r| r.identifier()).collect();
    assert_eq!(order, vec!["question", "intro"]);
}

#[test]
fn remove_step_history_removes_the_suffix_in_order() {
    let mut result = TaskResult::new("task");
    for identifier in ["a", "b", "c", "d"] {
        result.append_step_history(answer(identifier, json!(1)));
    }
    let removed = result.remove_step_history("c");
    let removed_ids: Vec<_> = removed.iter().map(|r| r.identifier()).collect();
    assert_eq!(removed_ids, vec!["c", "d"]);
    assert_eq!(result.step_history.len(), 2);
}

#[test]
fn find_answer_result_searches_newest_first() {
    let mut result = TaskResult::new("task");
    result.append_step_history(answer("question", json!(1)));
    let mut subtask = TaskResult::new("section");
    subtask.append_step_history(answer("nested", json!(5)));
    result.append_step_history(ResultObject::Task(subtask));

    assert_eq!(result.find_answer_result("question").unwrap().value, Some(json!(1)));
    assert_eq!(result.find_answer_result("nested").unwrap().value, Some(json!(5)));
    assert!(result.find_answer_result("missing").is_none());
}

#[test]
fn collection_results_replace_fields_by_identifier() {
    let mut collection = CollectionResult::new("form");
    collection.append_input_results(answer("field", json!(1)));
    let displaced = collection.append_input_results(answer("field", json!(2)));
    assert!(displaced.is_some());
    assert_eq!(collection.input_results.len(), 1);
}

#[test]
fn result_objects_round_trip_through_their_type_tag() {
    let mut result = TaskResult::new("task");
    result.append_step_history(ResultObject::Base(BaseResult::new("intro")));
    result.append_step_history(answer("question", json!(3)));

    let encoded = serde_json::to_value(&ResultObject::Task(result)).unwrap();
    assert_eq!(encoded["type"], "task");
    assert_eq!(encoded["stepHistory"][0]["type"], "base");
    assert_eq!(encoded["stepHistory"][1]["type"], "answer");
    assert!(encoded["taskRunUUID"].is_string());

    let decoded: ResultObject = serde_json::from_value(encoded).unwrap();
    let task = decoded.as_task().unwrap();
    assert_eq!(task.step_history.len(), 2);
    assert_eq!(task.find_answer_result("question").unwrap().value, Some(json!(3)));
}

#[test]
fn async_results_accumulate_without_replacement() {
    let mut result = TaskResult::new("task");
    result.append_async_result(answer("motion", json!(1)));
    result.append_async_result(answer("motion", json!(2)));
    assert_eq!(result.async_results.len(), 2);
}
