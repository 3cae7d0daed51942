use crate::core::navigation::rules::NavigationContext;
use crate::core::task::definition::Task;
use crate::core::task::result::{ResultObject, TaskResult};
use crate::core::task::step::Step;
use std::sync::{Arc, Mutex};

/// One level of a running task: the task, its accumulating result, and the
/// step currently on screen.
///
/// Subtasks (sections and fetched tasks) run as their own path stacked on
/// top of the parent's; the controller folds a finished path's result into
/// the parent's step history.
#[derive(Debug)]
pub struct TaskPath {
    pub task: Task,
    pub result: TaskResult,
    pub current_step: Option<Arc<dyn Step>>,
}

impl TaskPath {
    pub fn new(task: Task) -> Self {
        let result = task.instantiate_result();
        TaskPath {
            task,
            result,
            current_step: None,
        }
    }

    /// Hand the run's shared tracking rules to this path's navigator.
    pub fn adopt_context(&mut self, context: Arc<Mutex<NavigationContext>>) {
        self.task.navigator.set_context(context);
    }

    /// Append a result to the step history, archiving any displaced entry
    /// under `previous_results`.
    pub fn append_step_history(&mut self, result: ResultObject) {
        if let Some(displaced) = self.result.append_step_history(result) {
            self.result.previous_results.push(displaced);
        }
    }

    /// Drop the step history from the given identifier onward, archiving the
    /// removed entries. Used when navigating backward.
    pub fn rewind_to(&mut self, identifier: &str) {
        let removed = self.result.remove_step_history(identifier);
        self.result.previous_results.extend(removed);
    }
}
