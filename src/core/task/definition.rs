use crate::core::error::AppError;
use crate::core::navigation::StepNavigator;
use crate::core::task::factory::TaskFactory;
use crate::core::task::result::TaskResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

/// Identifies the archive schema a task's results map onto.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaInfo {
    pub identifier: String,
    #[serde(default)]
    pub revision: u32,
}

/// Lightweight description of a task that can be fetched when reached.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInfo {
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_minutes: Option<u32>,
    /// Name of the resource holding the full task definition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_info: Option<SchemaInfo>,
}

/// Configuration for a background recorder that runs alongside steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsyncActionConfiguration {
    pub identifier: String,
    #[serde(rename = "type")]
    pub action_type: String,
    /// Step at which to start recording. Absent means the start of the task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_step_identifier: Option<String>,
    /// Step at which to stop. Absent means the end of the task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_step_identifier: Option<String>,
}

/// A runnable task: an identifier, its navigation strategy, and the async
/// actions to run alongside it.
#[derive(Debug)]
pub struct Task {
    pub identifier: String,
    pub schema_info: Option<SchemaInfo>,
    pub navigator: Box<dyn StepNavigator>,
    pub async_actions: Vec<AsyncActionConfiguration>,
}

impl Task {
    pub fn new(identifier: impl Into<String>, navigator: Box<dyn StepNavigator>) -> Self {
        Task {
            identifier: identifier.into(),
            schema_info: None,
            navigator,
            async_actions: Vec::new(),
        }
    }

    /// Check the task's configuration by validating its navigator and every
    /// step it holds. Run when the task is entered.
    pub fn validate(&self) -> Result<(), AppError> {
        self.navigator.validate()
    }

    pub fn instantiate_result(&self) -> TaskResult {
        let mut result = TaskResult::new(self.identifier.clone());
        result.schema_info = self.schema_info.clone();
        result
    }
}

/// Turns a `TaskInfo` placeholder into a runnable task. The fetch is async
/// because production transformers read from disk or the network.
#[async_trait]
pub trait TaskTransformer: Send + Sync + std::fmt::Debug {
    async fn fetch_task(
        &self,
        task_info: &TaskInfo,
        factory: &TaskFactory,
    ) -> Result<Task, AppError>;
}

/// Transformer that resolves task resources to JSON files under a base
/// directory.
#[derive(Debug, Clone)]
pub struct JsonFileTaskTransformer {
    pub base_path: PathBuf,
}

impl JsonFileTaskTransformer {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        JsonFileTaskTransformer {
            base_path: base_path.into(),
        }
    }
}

#[async_trait]
impl TaskTransformer for JsonFileTaskTransformer {
    async fn fetch_task(
        &self,
        task_info: &TaskInfo,
        factory: &TaskFactory,
    ) -> Result<Task, AppError> {
        let resource = task_info
            .resource_name
            .clone()
            .unwrap_or_else(|| format!("{}.json", task_info.identifier));
        let path = self.base_path.join(&resource);
        info!(task = %task_info.identifier, path = %path.display(), "fetching subtask");
        let text = tokio::fs::read_to_string(&path).await.map_err(|e| {
            AppError::from(e).with_context("resource", path.display().to_string())
        })?;
        let value: serde_json::Value = serde_json::from_str(&text)?;
        factory.decode_task(&value)
    }
}
