use crate::cli::args::{ExplainArgs, ValidateArgs};
use crate::cli::{Args, Command};
use crate::core::config::{FactoryConfig, WaypointConfig};
use crate::core::task::TaskFactory;
use anyhow::Context;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use tracing::info;

/// Dispatch the parsed command. Returns the process exit code.
pub fn run(args: &Args, config: &WaypointConfig) -> crate::Result<i32> {
    match &args.command {
        Command::Validate(validate_args) => validate(validate_args, config),
        Command::Explain(explain_args) => explain(explain_args, config),
    }
}

fn load_definition(path: &Path) -> crate::Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("{} is not valid JSON", path.display()))
}

fn validate(args: &ValidateArgs, config: &WaypointConfig) -> crate::Result<i32> {
    let definition = load_definition(&args.file)?;
    let factory = TaskFactory::new().with_config(FactoryConfig {
        allow_unknown_step_types: args.allow_unknown || config.factory.allow_unknown_step_types,
    });
    match factory.decode_task(&definition) {
        Ok(task) => {
            info!(task = %task.identifier, "task definition is valid");
            println!("ok: {}", task.identifier);
            Ok(0)
        }
        Err(error) => {
            eprintln!("invalid: {}", error);
            Ok(1)
        }
    }
}

#[derive(Debug, Serialize)]
struct StepSummary {
    identifier: String,
    #[serde(rename = "type")]
    step_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_step_identifier: Option<String>,
    #[serde(skip_serializing_if = "is_zero")]
    survey_rules: usize,
    #[serde(skip_serializing_if = "is_zero")]
    cohort_rules: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    steps: Option<Vec<StepSummary>>,
}

#[derive(Debug, Serialize)]
struct TaskSummary {
    identifier: String,
    steps: Vec<StepSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    progress_markers: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tracked_items: Option<usize>,
}

fn is_zero(count: &usize) -> bool {
    *count == 0
}

fn explain(args: &ExplainArgs, config: &WaypointConfig) -> crate::Result<i32> {
    let definition = load_definition(&args.file)?;
    // Decode first so the description is only printed for a valid task.
    let factory = TaskFactory::new().with_config(config.factory.clone());
    let task = factory
        .decode_task(&definition)
        .map_err(anyhow::Error::new)?;
    let summary = summarize(&definition, &task.identifier);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(0)
}

fn summarize(definition: &Value, identifier: &str) -> TaskSummary {
    TaskSummary {
        identifier: identifier.to_string(),
        steps: definition
            .get("steps")
            .and_then(Value::as_array)
            .map(|steps| steps.iter().map(summarize_step).collect())
            .unwrap_or_default(),
        progress_markers: definition
            .get("progressMarkers")
            .and_then(|v| serde_json::from_value(v.clone()).ok()),
        tracked_items: definition
            .get("trackedItems")
            .and_then(|t| t.get("items"))
            .and_then(Value::as_array)
            .map(|items| items.len()),
    }
}

fn summarize_step(step: &Value) -> StepSummary {
    let survey_rules = step
        .get("inputFields")
        .and_then(Value::as_array)
        .map(|fields| {
            fields
                .iter()
                .filter_map(|f| f.get("surveyRules").and_then(Value::as_array))
                .map(Vec::len)
                .sum()
        })
        .unwrap_or(0);
    let cohort_rules = ["beforeCohortRules", "afterCohortRules"]
        .iter()
        .filter_map(|key| step.get(*key).and_then(Value::as_array))
        .map(Vec::len)
        .sum();
    StepSummary {
        identifier: step
            .get("identifier")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        step_type: step
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("instruction")
            .to_string(),
        next_step_identifier: step
            .get("nextStepIdentifier")
            .and_then(Value::as_str)
            .map(str::to_string),
        survey_rules,
        cohort_rules,
        steps: step
            .get("steps")
            .and_then(Value::as_array)
            .map(|steps| steps.iter().map(summarize_step).collect()),
    }
}

fn print_summary(summary: &TaskSummary) {
    println!("task: {}", summary.identifier);
    if let Some(markers) = &summary.progress_markers {
        println!("progress markers: {}", markers.join(", "));
    }
    if let Some(count) = summary.tracked_items {
        println!("tracked items: {}", count);
    }
    print_steps(&summary.steps, 1);
}

fn print_steps(steps: &[StepSummary], depth: usize) {
    for step in steps {
        let indent = "  ".repeat(depth);
        let mut notes = Vec::new();
        if let Some(next) = &step.next_step_identifier {
            notes.push(format!("next: {}", next));
        }
        if step.survey_rules > 0 {
            notes.push(format!("{} survey rule(s)", step.survey_rules));
        }
        if step.cohort_rules > 0 {
            notes.push(format!("{} cohort rule(s)", step.cohort_rules));
        }
        let suffix = if notes.is_empty() {
            String::new()
        } else {
            format!(" [{}]", notes.join(", "))
        };
        println!("{}{} ({}){}", indent, step.identifier, step.step_type, suffix);
        if let Some(children) = &step.steps {
            print_steps(children, depth + 1);
        }
    }
}
