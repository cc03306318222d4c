//!
//! The functions in this mod turn task definitions into runnable tasks, and run them.
//!
//! A [`TaskDefinition`] is built into tasks in 3 steps:
//! 1. Resolve the argument template against the parameter domain (see [`params::resolve`]).
//! 2. Pass each resolved argument set through the definition's [`DispatchHook`],
//!    which may expand it further (e.g. one set per file matching a wildcard).
//! 3. Give each final argument set an identifier and bind it to the definition's [`Operation`].
//!
//! The resulting [`Task`]s are independent of each other. A [`Runner`] executes them,
//! one at a time or on a pool of worker threads. A task that fails only records its
//! failure in its own [`TaskResult`]; the rest of the batch carries on regardless.

use std::time::Duration;

/// Operations, dispatch hooks, and the registry that names them
mod operation;
pub use operation::{DispatchHook, Operation, Untouched};

mod registry;
pub use registry::Registry;

/// Single runnable units of work
mod task;
pub use task::{Runnable, Task, TaskResult};

/// Definitions that expand into lists of tasks
mod definition;
pub use definition::TaskDefinition;

/// Sequential and concurrent execution
mod runner;
pub use runner::{Interrupt, Runner, WaitPolicy};

/// Success/failure counts and error recap
mod summary;
pub use summary::Summary;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Unknown operation \"{0}\"")]
    UnknownOperation(String),
    #[error("Unknown dispatch hook \"{0}\"")]
    UnknownDispatchHook(String),
    #[error("\"{0}\" is already registered")]
    AlreadyRegistered(String),
    #[error("Operation panicked: {0}")]
    Panicked(String),
    #[error("Task did not finish within {0:?}")]
    TimedOut(Duration),
    #[error("Interrupted by user after {completed} of {total} tasks")]
    Interrupted { completed: usize, total: usize },
    #[error("{0} failed due to {1} failed tasks")]
    TasksFailed(String, usize),
    #[error("Concurrent runner needs at least one worker")]
    NoWorkers,
    #[error("Unable to start worker threads: {0}")]
    ThreadPool(rayon::ThreadPoolBuildError),
}
