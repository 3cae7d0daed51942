use crate::core::config::FactoryConfig;
use crate::core::error::AppError;
use crate::core::navigation::conditional::ConditionalStepNavigator;
use crate::core::navigation::sentinel;
use crate::core::navigation::tracked::{TrackedItemsConfig, TrackedItemsStepNavigator};
use crate::core::task::definition::{AsyncActionConfiguration, SchemaInfo, Task};
use crate::core::task::objects::{
    CompletionStepObject, GenericStepObject, InstructionStepObject, QuestionStepObject,
    SectionStepObject, TaskInfoStepObject,
};
use crate::core::task::step::{step_type, Step};
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

type StepDecoder = fn(&TaskFactory, &Value) -> Result<Arc<dyn Step>, AppError>;

/// Decodes declarative JSON task definitions into runnable tasks.
///
/// Step decoding dispatches on the `type` field through a registry, so an
/// embedding application can register its own step types next to the
/// built-in ones.
pub struct TaskFactory {
    /// Keyed by wire type, iterated in registration order.
    decoders: IndexMap<String, StepDecoder>,
    config: FactoryConfig,
}

impl Default for TaskFactory {
    fn default() -> Self {
        TaskFactory::new()
    }
}

impl TaskFactory {
    pub fn new() -> Self {
        let mut factory = TaskFactory {
            decoders: IndexMap::new(),
            config: FactoryConfig::default(),
        };
        factory.register(step_type::INSTRUCTION, decode_instruction);
        factory.register(step_type::ACTIVE, decode_instruction);
        factory.register(step_type::COUNTDOWN, decode_instruction);
        factory.register(step_type::COMPLETION, decode_completion);
        factory.register(step_type::FORM, decode_question);
        factory.register(step_type::SECTION, decode_section);
        factory.register(step_type::TASK_INFO, decode_task_info);
        factory
    }

    pub fn with_config(mut self, config: FactoryConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a decoder for a step type, replacing any existing one.
    pub fn register(&mut self, step_type: &str, decoder: StepDecoder) {
        self.decoders.insert(step_type.to_string(), decoder);
    }

    pub fn decode_step(&self, value: &Value) -> Result<Arc<dyn Step>, AppError> {
        let step_type = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or(step_type::INSTRUCTION);
        if let Some(decoder) = self.decoders.get(step_type) {
            return decoder(self, value);
        }
        if self.config.allow_unknown_step_types {
            debug!(step_type, "decoding unregistered step type as generic");
            return decode_generic(value, step_type);
        }
        Err(AppError::decoding("unregistered step type")
            .with_context("type", step_type))
    }

    pub fn decode_steps(&self, value: &Value) -> Result<Vec<Arc<dyn Step>>, AppError> {
        let items = value
            .as_array()
            .ok_or_else(|| AppError::decoding("\"steps\" must be an array"))?;
        items.iter().map(|item| self.decode_step(item)).collect()
    }

    /// Decode a complete task definition. The navigator is a tracked-items
    /// navigator when the definition carries a `trackedItems` block, and a
    /// conditional navigator over `steps` otherwise.
    pub fn decode_task(&self, value: &Value) -> Result<Task, AppError> {
        let identifier = value
            .get("identifier")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::decoding("task definition is missing an identifier"))?
            .to_string();

        let navigator: Box<dyn crate::core::navigation::StepNavigator> =
            if let Some(tracked) = value.get("trackedItems") {
                let config: TrackedItemsConfig = serde_json::from_value(tracked.clone())?;
                Box::new(TrackedItemsStepNavigator::new(config)?)
            } else {
                let steps = self.decode_steps(
                    value
                        .get("steps")
                        .ok_or_else(|| AppError::decoding("task definition has no steps"))?,
                )?;
                validate_steps(&steps)?;
                let mut navigator = ConditionalStepNavigator::new(steps);
                if let Some(markers) = value.get("progressMarkers") {
                    navigator.progress_markers = Some(serde_json::from_value(markers.clone())?);
                }
                Box::new(navigator)
            };

        let mut task = Task::new(identifier, navigator);
        if let Some(schema) = value.get("schemaInfo") {
            let schema: SchemaInfo = serde_json::from_value(schema.clone())?;
            task.schema_info = Some(schema);
        }
        if let Some(actions) = value.get("asyncActions") {
            let actions: Vec<AsyncActionConfiguration> =
                serde_json::from_value(actions.clone())?;
            task.async_actions = actions;
        }
        Ok(task)
    }
}

impl std::fmt::Debug for TaskFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskFactory")
            .field("registered_types", &self.decoders.keys().collect::<Vec<_>>())
            .field("config", &self.config)
            .finish()
    }
}

/// Reject duplicate and reserved step identifiers.
pub fn validate_steps(steps: &[Arc<dyn Step>]) -> Result<(), AppError> {
    let mut seen = HashSet::new();
    for step in steps {
        let identifier = step.identifier();
        if sentinel::is_reserved(identifier) {
            return Err(AppError::validation("step identifier is reserved")
                .with_context("identifier", identifier));
        }
        if !seen.insert(identifier.to_string()) {
            return Err(AppError::validation("duplicate step identifier")
                .with_context("identifier", identifier));
        }
    }
    Ok(())
}

fn decode_instruction(_factory: &TaskFactory, value: &Value) -> Result<Arc<dyn Step>, AppError> {
    let step: InstructionStepObject = serde_json::from_value(value.clone())?;
    Ok(Arc::new(step))
}

fn decode_completion(_factory: &TaskFactory, value: &Value) -> Result<Arc<dyn Step>, AppError> {
    let step: CompletionStepObject = serde_json::from_value(value.clone())?;
    Ok(Arc::new(step))
}

fn decode_question(_factory: &TaskFactory, value: &Value) -> Result<Arc<dyn Step>, AppError> {
    let step: QuestionStepObject = serde_json::from_value(value.clone())?;
    step.validate()?;
    Ok(Arc::new(step))
}

fn decode_section(factory: &TaskFactory, value: &Value) -> Result<Arc<dyn Step>, AppError> {
    let identifier = value
        .get("identifier")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::decoding("section step is missing an identifier"))?
        .to_string();
    let steps = factory.decode_steps(
        value
            .get("steps")
            .ok_or_else(|| AppError::decoding("section step has no steps"))?,
    )?;
    validate_steps(&steps)?;
    let mut section = SectionStepObject::new(identifier, steps);
    if let Some(markers) = value.get("progressMarkers") {
        section.progress_markers = Some(serde_json::from_value(markers.clone())?);
    }
    Ok(Arc::new(section))
}

fn decode_task_info(_factory: &TaskFactory, value: &Value) -> Result<Arc<dyn Step>, AppError> {
    let step: TaskInfoStepObject = serde_json::from_value(value.clone())?;
    Ok(Arc::new(step))
}

fn decode_generic(value: &Value, step_type: &str) -> Result<Arc<dyn Step>, AppError> {
    let identifier = value
        .get("identifier")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::decoding("step is missing an identifier"))?
        .to_string();
    Ok(Arc::new(GenericStepObject {
        identifier,
        step_type: step_type.to_string(),
        payload: value.clone(),
    }))
}
