use crate::core::error::AppError;
use crate::core::navigation::path::TaskPath;
use crate::core::navigation::rules::{NavigationContext, TrackingRule};
use crate::core::navigation::{Progress, StepDirection, StepNavigator};
use crate::core::task::definition::{AsyncActionConfiguration, Task, TaskInfo, TaskTransformer};
use crate::core::task::factory::TaskFactory;
use crate::core::task::result::{ErrorResult, ResultObject, TaskResult};
use crate::core::task::step::Step;
use crate::core::types::ErrorCategory;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Lifecycle of one task run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    NotStarted,
    /// A subtask fetch is in flight. Navigation requests are ignored.
    Loading,
    Stepping,
    Completed,
    Exited,
}

/// Why a task run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Completed,
    /// A navigation rule resolved to the exit sentinel.
    EarlyExit,
    Failed,
}

/// Callbacks from the controller to the embedding UI layer.
pub trait TaskControllerDelegate: Send {
    fn step_did_change(
        &mut self,
        step: &Arc<dyn Step>,
        direction: StepDirection,
        progress: Option<Progress>,
    );

    fn task_did_finish(&mut self, reason: FinishReason, result: &TaskResult);
}

/// A background recorder running alongside the task.
#[async_trait]
pub trait AsyncAction: Send + Sync {
    fn configuration(&self) -> &AsyncActionConfiguration;

    async fn start(&mut self) -> Result<(), AppError>;

    /// Stop recording and hand back the recorded result.
    async fn stop(&mut self) -> Result<ResultObject, AppError>;
}

/// Builds async actions from their declarative configuration.
pub trait AsyncActionVendor: Send + Sync {
    fn instantiate(&self, configuration: &AsyncActionConfiguration) -> Option<Box<dyn AsyncAction>>;
}

/// Drives a task run: holds the path stack, resolves navigation through
/// each path's navigator, manages subtask fetches and async actions, and
/// reports changes to the delegate.
pub struct TaskController {
    state: TaskState,
    paths: Vec<TaskPath>,
    context: Arc<Mutex<NavigationContext>>,
    delegate: Box<dyn TaskControllerDelegate>,
    transformer: Arc<dyn TaskTransformer>,
    factory: Arc<TaskFactory>,
    async_vendor: Option<Box<dyn AsyncActionVendor>>,
    active_actions: Vec<Box<dyn AsyncAction>>,
    final_result: Option<TaskResult>,
}

impl TaskController {
    pub fn new(
        task: Task,
        delegate: Box<dyn TaskControllerDelegate>,
        transformer: Arc<dyn TaskTransformer>,
        factory: Arc<TaskFactory>,
    ) -> Self {
        TaskController {
            state: TaskState::NotStarted,
            paths: vec![TaskPath::new(task)],
            context: Arc::new(Mutex::new(NavigationContext::new())),
            delegate,
            transformer,
            factory,
            async_vendor: None,
            active_actions: Vec::new(),
            final_result: None,
        }
    }

    pub fn with_tracking_rule(self, rule: Box<dyn TrackingRule>) -> Self {
        {
            let mut context = self.context.lock().unwrap_or_else(|e| e.into_inner());
            context.tracking_rules.push(rule);
        }
        self
    }

    pub fn with_async_vendor(mut self, vendor: Box<dyn AsyncActionVendor>) -> Self {
        self.async_vendor = Some(vendor);
        self
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn current_step(&self) -> Option<&Arc<dyn Step>> {
        self.paths.last().and_then(|p| p.current_step.as_ref())
    }

    /// The result accumulating at the current navigation level, or the
    /// finished result once the run has ended.
    pub fn task_result(&self) -> Option<&TaskResult> {
        self.paths
            .last()
            .map(|p| &p.result)
            .or(self.final_result.as_ref())
    }

    /// The whole-run result, available once the task has finished.
    pub fn final_result(&self) -> Option<&TaskResult> {
        self.final_result.as_ref()
    }

    /// Record a result for the current step, replacing the placeholder the
    /// controller instantiated when the step was presented.
    pub fn record_result(&mut self, result: ResultObject) -> Result<(), AppError> {
        let path = self.paths.last_mut().ok_or_else(no_path)?;
        path.append_step_history(result);
        Ok(())
    }

    /// Begin the run: adopt the shared tracking rules, validate the task,
    /// start task-scoped async actions, and move to the first step.
    pub async fn start(&mut self) -> Result<(), AppError> {
        if self.state != TaskState::NotStarted {
            return Err(AppError::new(
                ErrorCategory::NavigationError,
                "task has already started",
            ));
        }
        self.state = TaskState::Stepping;
        if let Some(path) = self.paths.last_mut() {
            path.adopt_context(self.context.clone());
            info!(task = %path.task.identifier, "starting task");
        }
        // Configuration problems surface when the task is entered, failing
        // the run rather than being silently ignored.
        let validation = self
            .paths
            .last()
            .map(|path| (path.task.identifier.clone(), path.task.validate()));
        if let Some((identifier, Err(error))) = validation {
            warn!(task = %identifier, %error, "task validation failed");
            self.record_failure(&identifier, &error)?;
            return self.finish(FinishReason::Failed).await;
        }
        self.start_actions(None).await;
        self.go_forward().await
    }

    /// Move to the next step, descending into subtasks and folding finished
    /// ones into their parent as needed.
    pub async fn go_forward(&mut self) -> Result<(), AppError> {
        match self.state {
            TaskState::Stepping => {}
            TaskState::Loading => {
                warn!("ignoring forward navigation while a subtask fetch is in flight");
                return Ok(());
            }
            _ => {
                return Err(AppError::new(
                    ErrorCategory::NavigationError,
                    "task is not running",
                ))
            }
        }

        self.finalize_current_step();

        loop {
            let next = {
                let path = self.paths.last_mut().ok_or_else(no_path)?;
                let TaskPath {
                    task,
                    result,
                    current_step,
                } = path;
                task.navigator.step_after(current_step.as_ref(), result, false)
            };

            let Some(step) = next.step else {
                let exits = {
                    let path = self.paths.last_mut().ok_or_else(no_path)?;
                    let TaskPath {
                        task,
                        result,
                        current_step,
                    } = path;
                    task.navigator.should_exit(current_step.as_ref(), result)
                };
                if exits {
                    return self.finish(FinishReason::EarlyExit).await;
                }
                if self.paths.len() > 1 {
                    self.fold_top_path();
                    continue;
                }
                return self.finish(FinishReason::Completed).await;
            };

            if let Some(section) = step.as_section() {
                let subtask = section.to_task();
                debug!(section = step.identifier(), "entering section");
                self.set_current(step.clone());
                self.push_subtask(subtask);
                continue;
            }

            if let Some(task_info) = step.as_task_info().cloned() {
                self.set_current(step.clone());
                match self.fetch_subtask(&task_info).await {
                    Ok(task) => {
                        self.push_subtask(task);
                        continue;
                    }
                    Err(error) => {
                        warn!(task = %task_info.identifier, %error, "subtask fetch failed");
                        self.record_failure(&task_info.identifier, &error)?;
                        return self.finish(FinishReason::Failed).await;
                    }
                }
            }

            return self.present(step, next.direction).await;
        }
    }

    /// Move back to the previous step. Backward navigation has no async
    /// side effects; async actions keep running.
    pub fn go_back(&mut self) -> Result<(), AppError> {
        if self.state != TaskState::Stepping {
            return Err(AppError::new(
                ErrorCategory::NavigationError,
                "task is not running",
            ));
        }
        let previous = {
            let path = self.paths.last_mut().ok_or_else(no_path)?;
            let TaskPath {
                task,
                result,
                current_step,
            } = path;
            let Some(current) = current_step.as_ref() else {
                return Err(AppError::new(
                    ErrorCategory::NavigationError,
                    "cannot go back before any step was presented",
                ));
            };
            match task.navigator.step_before(Some(current), result) {
                Some(previous) => previous,
                None => {
                    warn!(
                        step = current.identifier(),
                        "backward navigation is not allowed here"
                    );
                    return Ok(());
                }
            }
        };
        {
            let path = self.paths.last_mut().ok_or_else(no_path)?;
            path.rewind_to(previous.identifier());
            path.append_step_history(previous.instantiate_result());
            path.current_step = Some(previous.clone());
        }
        let progress = self.progress_for(&previous);
        self.delegate
            .step_did_change(&previous, StepDirection::Reverse, progress);
        Ok(())
    }

    /// Whether the UI should offer forward navigation from the current step.
    pub fn has_step_after(&mut self) -> bool {
        let Some(path) = self.paths.last_mut() else {
            return false;
        };
        let TaskPath {
            task,
            result,
            current_step,
        } = path;
        task.navigator.has_step_after(current_step.as_ref(), result)
    }

    /// Whether the UI should offer backward navigation from the current step.
    pub fn has_step_before(&mut self) -> bool {
        let Some(path) = self.paths.last_mut() else {
            return false;
        };
        let TaskPath {
            task,
            result,
            current_step,
        } = path;
        task.navigator.has_step_before(current_step.as_ref(), result)
    }

    /// Close out the result of the step being left, synthesizing the history
    /// entry when the step never recorded one.
    fn finalize_current_step(&mut self) {
        let Some(path) = self.paths.last_mut() else {
            return;
        };
        let Some(current) = path.current_step.clone() else {
            return;
        };
        let now = Utc::now();
        if let Some(entry) = path.result.find_result_mut(current.identifier()) {
            entry.set_end_date(now);
        } else {
            let mut entry = current.instantiate_result();
            entry.set_end_date(now);
            path.append_step_history(entry);
        }
    }

    fn set_current(&mut self, step: Arc<dyn Step>) {
        if let Some(path) = self.paths.last_mut() {
            path.current_step = Some(step);
        }
    }

    fn push_subtask(&mut self, task: Task) {
        let mut path = TaskPath::new(task);
        path.adopt_context(self.context.clone());
        self.paths.push(path);
    }

    /// Fold the finished top path's result into the parent's step history.
    fn fold_top_path(&mut self) {
        let Some(mut finished) = self.paths.pop() else {
            return;
        };
        finished.result.end_date = Some(Utc::now());
        debug!(subtask = %finished.result.identifier, "folding subtask result");
        if let Some(parent) = self.paths.last_mut() {
            parent.append_step_history(ResultObject::Task(finished.result));
        }
    }

    async fn fetch_subtask(&mut self, task_info: &TaskInfo) -> Result<Task, AppError> {
        self.state = TaskState::Loading;
        let fetched = self
            .transformer
            .fetch_task(task_info, &self.factory)
            .await;
        self.state = TaskState::Stepping;
        fetched
    }

    fn record_failure(&mut self, identifier: &str, error: &AppError) -> Result<(), AppError> {
        let path = self.paths.last_mut().ok_or_else(no_path)?;
        path.append_step_history(ResultObject::Error(ErrorResult {
            identifier: identifier.to_string(),
            error_description: error.to_string(),
            error_domain: Some(error.category.to_string()),
            start_date: Utc::now(),
            end_date: Some(Utc::now()),
        }));
        Ok(())
    }

    async fn present(
        &mut self,
        step: Arc<dyn Step>,
        direction: StepDirection,
    ) -> Result<(), AppError> {
        // Stop actions bound to this step before recording it, then start
        // the ones that begin here.
        self.stop_actions(step.identifier()).await;
        self.start_actions(Some(step.identifier())).await;
        let path = self.paths.last_mut().ok_or_else(no_path)?;
        path.append_step_history(step.instantiate_result());
        path.current_step = Some(step.clone());
        debug!(step = step.identifier(), "presenting step");
        let progress = self.progress_for(&step);
        self.delegate.step_did_change(&step, direction, progress);
        Ok(())
    }

    fn progress_for(&self, step: &Arc<dyn Step>) -> Option<Progress> {
        let path = self.paths.last()?;
        path.task.navigator.progress(step, &path.result)
    }

    /// Instantiate and start the actions whose start step matches. `None`
    /// starts the task-scoped actions.
    async fn start_actions(&mut self, step_identifier: Option<&str>) {
        let Some(vendor) = self.async_vendor.as_ref() else {
            return;
        };
        let configurations: Vec<AsyncActionConfiguration> = self
            .paths
            .last()
            .map(|path| {
                path.task
                    .async_actions
                    .iter()
                    .filter(|c| c.start_step_identifier.as_deref() == step_identifier)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        for configuration in configurations {
            let Some(mut action) = vendor.instantiate(&configuration) else {
                warn!(
                    action = %configuration.identifier,
                    "no async action available for configuration"
                );
                continue;
            };
            match action.start().await {
                Ok(()) => {
                    debug!(action = %configuration.identifier, "async action started");
                    self.active_actions.push(action);
                }
                Err(error) => {
                    warn!(action = %configuration.identifier, %error, "async action failed to start");
                }
            }
        }
    }

    /// Stop the active actions whose stop step matches, recording their
    /// results.
    async fn stop_actions(&mut self, step_identifier: &str) {
        self.stop_matching(|c| c.stop_step_identifier.as_deref() == Some(step_identifier))
            .await;
    }

    async fn stop_all_actions(&mut self) {
        self.stop_matching(|_| true).await;
    }

    async fn stop_matching<F>(&mut self, matches: F)
    where
        F: Fn(&AsyncActionConfiguration) -> bool,
    {
        let mut remaining = Vec::new();
        for mut action in self.active_actions.drain(..) {
            if !matches(action.configuration()) {
                remaining.push(action);
                continue;
            }
            let identifier = action.configuration().identifier.clone();
            match action.stop().await {
                Ok(result) => {
                    debug!(action = %identifier, "async action stopped");
                    if let Some(path) = self.paths.last_mut() {
                        path.result.append_async_result(result);
                    }
                }
                Err(error) => {
                    warn!(action = %identifier, %error, "async action failed to stop");
                }
            }
        }
        self.active_actions = remaining;
    }

    async fn finish(&mut self, reason: FinishReason) -> Result<(), AppError> {
        self.stop_all_actions().await;
        while self.paths.len() > 1 {
            self.fold_top_path();
        }
        let Some(mut root) = self.paths.pop() else {
            return Err(no_path());
        };
        root.result.end_date = Some(Utc::now());
        self.state = match reason {
            FinishReason::Completed => TaskState::Completed,
            FinishReason::EarlyExit | FinishReason::Failed => TaskState::Exited,
        };
        info!(task = %root.result.identifier, ?reason, "task finished");
        self.delegate.task_did_finish(reason, &root.result);
        self.final_result = Some(root.result);
        Ok(())
    }
}

fn no_path() -> AppError {
    AppError::new(ErrorCategory::InternalError, "task path stack is empty")
}
