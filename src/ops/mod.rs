use anyhow::Result;

use params::{Mapping, Value};
use tasks::Registry;

/// Running shell commands
mod shell;
pub use shell::shell;

/// Gzip compression
mod compress;
pub use compress::gzip;

/// Copying files from `file://` sources
mod fetch;
pub use fetch::fetch;

/// The `expand_glob` dispatch hook
mod expand_glob;
pub use expand_glob::expand_glob;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Command `{0}` exited with {1}")]
    CommandFailed(String, String),
    #[error("Unable to start command `{0}`: {1}")]
    SpawnFailed(String, std::io::Error),
    #[error("Url scheme \"{0}\" is not supported; only file:// urls can be fetched")]
    UnsupportedScheme(String),
    #[error("Url \"{0}\" does not name a local path")]
    NotALocalPath(String),
    #[error("Path is neither file nor dir: {0:?}")]
    UnknownPathType(std::path::PathBuf),
    #[error("Invalid glob pattern \"{0}\": {1}")]
    InvalidPattern(String, glob::PatternError),
}

/// Registry with all built-in operations and dispatch hooks.
pub fn registry() -> Result<Registry> {
    let mut registry = Registry::new();
    registry.add_operation("echo", echo)?;
    registry.add_operation("shell", shell)?;
    registry.add_operation("gzip", gzip)?;
    registry.add_operation("fetch", fetch)?;
    registry.add_hook("expand_glob", expand_glob)?;
    Ok(registry)
}

/// Returns its arguments unchanged.
pub fn echo(args: &Mapping) -> Result<Value> {
    Ok(Value::Map(args.clone()))
}
