use anyhow::Result;

use params::{Mapping, Value};

/// Something a task can run: takes a concrete argument set, returns a value or fails.
///
/// Any `Fn(&Mapping) -> anyhow::Result<Value>` closure is an `Operation`.
pub trait Operation: Send + Sync {
    fn call(&self, args: &Mapping) -> Result<Value>;
}

impl<F> Operation for F
where
    F: Fn(&Mapping) -> Result<Value> + Send + Sync,
{
    fn call(&self, args: &Mapping) -> Result<Value> {
        self(args)
    }
}

/// Transform applied to each resolved argument set while building tasks.
/// May return zero, one, or many argument sets; each becomes one task.
///
/// Hooks should depend on nothing but their input, since a definition
/// builds its tasks only once and caches them.
pub trait DispatchHook: Send + Sync {
    fn dispatch(&self, args: Mapping) -> Result<Vec<Mapping>>;
}

impl<F> DispatchHook for F
where
    F: Fn(Mapping) -> Result<Vec<Mapping>> + Send + Sync,
{
    fn dispatch(&self, args: Mapping) -> Result<Vec<Mapping>> {
        self(args)
    }
}

/// The default hook: passes each argument set through as-is.
#[derive(Debug, Default, Clone, Copy)]
pub struct Untouched;

impl DispatchHook for Untouched {
    fn dispatch(&self, args: Mapping) -> Result<Vec<Mapping>> {
        Ok(vec![args])
    }
}
