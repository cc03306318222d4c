use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use params::{Mapping, Value};

use crate::{Error, Operation};

/// Outcome of the most recent run of a task.
#[derive(Debug, Default)]
pub enum TaskResult {
    /// The task hasn't been run yet (or its run was cut short before it started).
    #[default]
    Pending,
    /// The operation returned normally, with this value.
    Finished(Value),
    /// The operation failed; the error is kept here instead of being propagated.
    Failed(anyhow::Error),
}

impl TaskResult {
    /// true iff the operation returned without failing.
    pub fn finished(&self) -> bool {
        matches!(self, Self::Finished(_))
    }

    pub fn failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn return_value(&self) -> Option<&Value> {
        match self {
            Self::Finished(v) => Some(v),
            _ => None,
        }
    }

    pub fn exception(&self) -> Option<&anyhow::Error> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Anything that can be run as one unit of a batch.
pub trait Runnable {
    /// Unique identifier, used for logging and reporting.
    fn identifier(&self) -> &str;
    /// The concrete arguments this unit runs with.
    fn arguments(&self) -> &Mapping;
    /// Run, replacing the previous result. Never propagates the operation's failure.
    fn run(&mut self) -> &TaskResult;
    /// Result of the most recent run.
    fn result(&self) -> &TaskResult;
}

/// A single concrete unit of work: an operation bound to fixed arguments.
pub struct Task {
    identifier: String,
    operation: Arc<dyn Operation>,
    arguments: Mapping,
    result: TaskResult,
}

impl Task {
    pub fn new<T: Into<String>>(
        identifier: T,
        operation: Arc<dyn Operation>,
        arguments: Mapping,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            operation,
            arguments,
            result: TaskResult::Pending,
        }
    }

    /// What a worker thread needs to run this task away from the task itself.
    pub(crate) fn job(&self) -> (Arc<dyn Operation>, Mapping) {
        (self.operation.clone(), self.arguments.clone())
    }

    pub(crate) fn set_result(&mut self, result: TaskResult) {
        self.result = result;
    }
}

impl Runnable for Task {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn arguments(&self) -> &Mapping {
        &self.arguments
    }

    fn run(&mut self) -> &TaskResult {
        self.result = invoke(&*self.operation, &self.arguments);
        &self.result
    }

    fn result(&self) -> &TaskResult {
        &self.result
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("identifier", &self.identifier)
            .field("arguments", &self.arguments)
            .field("result", &self.result)
            .finish()
    }
}

/// Call `op`, turning both errors and panics into a failed result.
pub(crate) fn invoke(op: &dyn Operation, args: &Mapping) -> TaskResult {
    match panic::catch_unwind(AssertUnwindSafe(|| op.call(args))) {
        Ok(Ok(val)) => TaskResult::Finished(val),
        Ok(Err(e)) => TaskResult::Failed(e),
        Err(payload) => TaskResult::Failed(Error::Panicked(panic_message(&*payload)).into()),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("unknown panic payload")
    }
}
