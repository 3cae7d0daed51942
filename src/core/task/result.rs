use crate::core::navigation::tracked::TrackedItemsResult;
use crate::core::task::answer::AnswerType;
use crate::core::task::definition::SchemaInfo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Any result recorded while running a task, tagged by its wire type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ResultObject {
    Base(BaseResult),
    Answer(AnswerResult),
    Collection(CollectionResult),
    Task(TaskResult),
    File(FileResult),
    Error(ErrorResult),
    TrackedItems(TrackedItemsResult),
}

impl ResultObject {
    pub fn identifier(&self) -> &str {
        match self {
            ResultObject::Base(r) => &r.identifier,
            ResultObject::Answer(r) => &r.identifier,
            ResultObject::Collection(r) => &r.identifier,
            ResultObject::Task(r) => &r.identifier,
            ResultObject::File(r) => &r.identifier,
            ResultObject::Error(r) => &r.identifier,
            ResultObject::TrackedItems(r) => &r.identifier,
        }
    }

    /// Close out this result at the given time.
    pub fn set_end_date(&mut self, end_date: DateTime<Utc>) {
        match self {
            ResultObject::Base(r) => r.end_date = Some(end_date),
            ResultObject::Answer(r) => r.end_date = Some(end_date),
            ResultObject::Collection(r) => r.end_date = Some(end_date),
            ResultObject::Task(r) => r.end_date = Some(end_date),
            ResultObject::File(r) => r.end_date = Some(end_date),
            ResultObject::Error(r) => r.end_date = Some(end_date),
            ResultObject::TrackedItems(r) => r.end_date = Some(end_date),
        }
    }

    pub fn as_answer(&self) -> Option<&AnswerResult> {
        match self {
            ResultObject::Answer(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_collection(&self) -> Option<&CollectionResult> {
        match self {
            ResultObject::Collection(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_task(&self) -> Option<&TaskResult> {
        match self {
            ResultObject::Task(r) => Some(r),
            _ => None,
        }
    }

    /// Find an answer result for the given identifier within this result.
    ///
    /// An answer result matches directly on its identifier. A collection or
    /// task result is searched one level down through its children.
    pub fn find_answer_result(&self, identifier: &str) -> Option<&AnswerResult> {
        match self {
            ResultObject::Answer(r) if r.identifier == identifier => Some(r),
            ResultObject::Collection(r) => r
                .input_results
                .iter()
                .find_map(|child| child.find_answer_result(identifier)),
            ResultObject::Task(r) => r.find_answer_result(identifier),
            _ => None,
        }
    }
}

/// Marker result recorded for steps that capture no data of their own.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseResult {
    pub identifier: String,
    pub start_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
}

impl BaseResult {
    pub fn new(identifier: impl Into<String>) -> Self {
        BaseResult {
            identifier: identifier.into(),
            start_date: Utc::now(),
            end_date: None,
        }
    }
}

/// A single recorded answer with its typed value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerResult {
    pub identifier: String,
    #[serde(default)]
    pub answer_type: AnswerType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    pub start_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
}

impl AnswerResult {
    pub fn new(identifier: impl Into<String>, answer_type: AnswerType) -> Self {
        AnswerResult {
            identifier: identifier.into(),
            answer_type,
            value: None,
            start_date: Utc::now(),
            end_date: None,
        }
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }
}

/// Result for a step with multiple input fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionResult {
    pub identifier: String,
    #[serde(default)]
    pub input_results: Vec<ResultObject>,
    pub start_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
}

impl CollectionResult {
    pub fn new(identifier: impl Into<String>) -> Self {
        CollectionResult {
            identifier: identifier.into(),
            input_results: Vec::new(),
            start_date: Utc::now(),
            end_date: None,
        }
    }

    /// Insert a child result, replacing any previous result with the same
    /// identifier. Returns the replaced result when there was one.
    pub fn append_input_results(&mut self, result: ResultObject) -> Option<ResultObject> {
        let previous = self
            .input_results
            .iter()
            .position(|r| r.identifier() == result.identifier())
            .map(|index| self.input_results.remove(index));
        self.input_results.push(result);
        previous
    }
}

/// Result recorded for a file written by an async action or step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileResult {
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub start_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
}

/// Result recorded when a task ends because of a failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResult {
    pub identifier: String,
    pub error_description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_domain: Option<String>,
    pub start_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
}

/// Aggregate result for a single run of a task.
///
/// `step_history` holds at most one entry per step identifier, ordered by
/// when each step was most recently shown. Results displaced by re-running a
/// step or by backward navigation move to `previous_results`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResult {
    pub identifier: String,
    #[serde(rename = "taskRunUUID")]
    pub task_run_uuid: Uuid,
    pub start_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub step_history: Vec<ResultObject>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub async_results: Vec<ResultObject>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub previous_results: Vec<ResultObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_info: Option<SchemaInfo>,
}

impl TaskResult {
    pub fn new(identifier: impl Into<String>) -> Self {
        TaskResult {
            identifier: identifier.into(),
            task_run_uuid: Uuid::new_v4(),
            start_date: Utc::now(),
            end_date: None,
            step_history: Vec::new(),
            async_results: Vec::new(),
            previous_results: Vec::new(),
            schema_info: None,
        }
    }

    /// Append a result to the step history. Any prior entry with the same
    /// identifier is removed so the history stays one-per-step, and is
    /// returned so the caller can archive it.
    pub fn append_step_history(&mut self, result: ResultObject) -> Option<ResultObject> {
        let previous = self
            .step_history
            .iter()
            .position(|r| r.identifier() == result.identifier())
            .map(|index| self.step_history.remove(index));
        self.step_history.push(result);
        previous
    }

    /// Remove every entry from the given identifier (inclusive) to the end of
    /// the step history and return the removed suffix in order.
    pub fn remove_step_history(&mut self, from_identifier: &str) -> Vec<ResultObject> {
        match self
            .step_history
            .iter()
            .position(|r| r.identifier() == from_identifier)
        {
            Some(index) => self.step_history.split_off(index),
            None => Vec::new(),
        }
    }

    pub fn append_async_result(&mut self, result: ResultObject) {
        self.async_results.push(result);
    }

    pub fn find_result(&self, identifier: &str) -> Option<&ResultObject> {
        self.step_history
            .iter()
            .rev()
            .find(|r| r.identifier() == identifier)
    }

    pub fn find_result_mut(&mut self, identifier: &str) -> Option<&mut ResultObject> {
        self.step_history
            .iter_mut()
            .rev()
            .find(|r| r.identifier() == identifier)
    }

    /// Search the step history, newest first, for an answer result. Matches
    /// a top-level answer, a field inside a collection result, or an answer
    /// nested in a subtask result.
    pub fn find_answer_result(&self, identifier: &str) -> Option<&AnswerResult> {
        self.step_history
            .iter()
            .rev()
            .find_map(|result| result.find_answer_result(identifier))
    }
}
