use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};

use params::{Mapping, ParameterDomain};

use crate::{DispatchHook, Operation, Task, Untouched};

/// A template for many tasks: one operation, an argument template, and the
/// parameter domains to expand it over.
///
/// Tasks are built lazily, the first time they are requested, and cached.
/// Later requests return the same tasks; nothing triggers a rebuild except an
/// explicit call to [`TaskDefinition::invalidate`].
pub struct TaskDefinition {
    /// Unique (dotted) identifier, also the prefix of every task identifier
    identifier: String,
    /// Human-readable description
    description: String,
    /// What each task runs
    operation: Arc<dyn Operation>,
    /// Argument template; string values may contain placeholders
    arguments: Mapping,
    /// Candidate values for the placeholders
    parameters: ParameterDomain,
    /// Post-resolution expansion of argument sets
    dispatch: Arc<dyn DispatchHook>,
    /// Whether the tasks may run concurrently
    asynchronous: bool,
    /// Built tasks, once requested
    tasks: Option<Vec<Task>>,
    /// Number of task identifiers minted so far
    next_id: usize,
}

impl TaskDefinition {
    /// Create a new definition with no arguments, no parameters, and the default dispatch hook.
    pub fn new<T: Into<String>>(identifier: T, operation: Arc<dyn Operation>) -> Self {
        Self {
            identifier: identifier.into(),
            description: String::with_capacity(0),
            operation,
            arguments: Mapping::new(),
            parameters: ParameterDomain::new(),
            dispatch: Arc::new(Untouched),
            asynchronous: false,
            tasks: None,
            next_id: 0,
        }
    }

    pub fn with_description<T: Into<String>>(mut self, description: T) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_arguments(mut self, arguments: Mapping) -> Self {
        self.arguments = arguments;
        self
    }

    pub fn with_parameters(mut self, parameters: ParameterDomain) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_dispatch(mut self, dispatch: Arc<dyn DispatchHook>) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn asynchronous(mut self, asynchronous: bool) -> Self {
        self.asynchronous = asynchronous;
        self
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn arguments(&self) -> &Mapping {
        &self.arguments
    }

    pub fn parameters(&self) -> &ParameterDomain {
        &self.parameters
    }

    pub fn is_asynchronous(&self) -> bool {
        self.asynchronous
    }

    /// true if tasks have been built and cached.
    pub fn is_built(&self) -> bool {
        self.tasks.is_some()
    }

    /// Tasks built so far, without building them.
    pub fn cached_tasks(&self) -> Option<&[Task]> {
        self.tasks.as_deref()
    }

    /// Get this definition's tasks, building them on first use.
    pub fn tasks(&mut self) -> Result<&[Task]> {
        Ok(self.tasks_mut()?)
    }

    /// Mutable version of [`TaskDefinition::tasks`], for running them.
    pub fn tasks_mut(&mut self) -> Result<&mut [Task]> {
        if self.tasks.is_none() {
            let tasks = self.build()?;
            self.tasks = Some(tasks);
        }
        Ok(self.tasks.get_or_insert_with(Vec::new))
    }

    /// Drop cached tasks so the next request builds new ones.
    /// Identifiers are never reused: new tasks continue the count.
    pub fn invalidate(&mut self) {
        self.tasks = None;
    }

    fn build(&mut self) -> Result<Vec<Task>> {
        let resolved = params::resolve_mapping(&self.arguments, &self.parameters)
            .with_context(|| {
                format!("while resolving arguments of task \"{}\"", self.identifier)
            })?;

        let mut tasks = Vec::with_capacity(resolved.len());
        for args in resolved {
            let dispatched = self.dispatch.dispatch(args).with_context(|| {
                format!("while dispatching arguments of task \"{}\"", self.identifier)
            })?;
            for args in dispatched {
                self.next_id += 1;
                let id = format!("{}.{}", self.identifier, self.next_id);
                tasks.push(Task::new(id, self.operation.clone(), args));
            }
        }

        log::debug!("built {} tasks for {}", tasks.len(), self.identifier);
        Ok(tasks)
    }
}

impl fmt::Debug for TaskDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDefinition")
            .field("identifier", &self.identifier)
            .field("description", &self.description)
            .field("arguments", &self.arguments)
            .field("parameters", &self.parameters)
            .field("asynchronous", &self.asynchronous)
            .field("tasks", &self.tasks)
            .finish()
    }
}
