use std::sync::Arc;

use util::HashMap;

use crate::{DispatchHook, Error, Operation};

/// Named operations and dispatch hooks, populated at startup
/// so that config files can refer to them by name.
#[derive(Default)]
pub struct Registry {
    operations: HashMap<String, Arc<dyn Operation>>,
    hooks: HashMap<String, Arc<dyn DispatchHook>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an operation under `name`. Names can only be registered once.
    pub fn add_operation<T, O>(&mut self, name: T, op: O) -> Result<(), Error>
    where
        T: Into<String>,
        O: Operation + 'static,
    {
        let name = name.into();
        if self.operations.contains_key(&name) {
            return Err(Error::AlreadyRegistered(name));
        }
        log::trace!("registering operation {name}");
        self.operations.insert(name, Arc::new(op));
        Ok(())
    }

    /// Register a dispatch hook under `name`. Names can only be registered once.
    pub fn add_hook<T, H>(&mut self, name: T, hook: H) -> Result<(), Error>
    where
        T: Into<String>,
        H: DispatchHook + 'static,
    {
        let name = name.into();
        if self.hooks.contains_key(&name) {
            return Err(Error::AlreadyRegistered(name));
        }
        log::trace!("registering dispatch hook {name}");
        self.hooks.insert(name, Arc::new(hook));
        Ok(())
    }

    pub fn operation(&self, name: &str) -> Result<Arc<dyn Operation>, Error> {
        self.operations
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownOperation(name.to_owned()))
    }

    pub fn hook(&self, name: &str) -> Result<Arc<dyn DispatchHook>, Error> {
        self.hooks
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownDispatchHook(name.to_owned()))
    }

    /// Sorted names of all registered operations.
    pub fn operation_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.operations.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("operations", &self.operation_names())
            .field("hooks", &self.hooks.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use anyhow::Result;
    use params::{Mapping, Value};

    #[test]
    fn test_lookup() -> Result<()> {
        let mut reg = Registry::new();
        reg.add_operation("noop", |_: &Mapping| -> Result<Value> { Ok(Value::Null) })?;
        reg.add_hook("twice", |args: Mapping| -> Result<Vec<Mapping>> {
            Ok(vec![args.clone(), args])
        })?;

        let op = reg.operation("noop")?;
        assert_eq!(op.call(&Mapping::new())?, Value::Null);
        assert_eq!(reg.hook("twice")?.dispatch(Mapping::new())?.len(), 2);

        assert!(matches!(reg.operation("nope"), Err(Error::UnknownOperation(_))));
        assert!(matches!(reg.hook("nope"), Err(Error::UnknownDispatchHook(_))));
        Ok(())
    }

    #[test]
    fn test_duplicate_name() -> Result<()> {
        let mut reg = Registry::new();
        reg.add_operation("noop", |_: &Mapping| -> Result<Value> { Ok(Value::Null) })?;
        let res = reg.add_operation("noop", |_: &Mapping| -> Result<Value> { Ok(Value::Int(1)) });
        assert!(matches!(res, Err(Error::AlreadyRegistered(name)) if name == "noop"));
        assert_eq!(reg.operation_names(), ["noop"]);
        Ok(())
    }
}
