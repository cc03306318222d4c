use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::Result;

use tasks::WaitPolicy;

use crate::args::Args;

const DEFAULT_WORKERS: usize = 4;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Config file {0:?} does not exist")]
    ConfigNotFound(PathBuf),
    #[error("Number of workers must be at least 1")]
    NoWorkers,
    #[error("Timeout must be a positive number of seconds, got {0}")]
    InvalidTimeout(f64),
}

/// Settings are like Args, except all the logic has
/// been applied so e.g. defaults are added in.
#[derive(Debug)]
pub struct Settings {
    pub config: PathBuf,
    pub tasks: Vec<String>,
    pub dry_run: bool,
    pub sources: bool,
    pub workers: usize,
    pub wait: WaitPolicy,
    pub sequential: bool,
    pub yes: bool,
    pub verbose: u8,
}

impl TryFrom<Args> for Settings {
    type Error = anyhow::Error;
    fn try_from(args: Args) -> Result<Self, Self::Error> {
        let config = PathBuf::from(&args.config);
        if !config.exists() {
            return Err(Error::ConfigNotFound(config).into());
        }
        let config = config.canonicalize()?;

        let workers = match args.workers {
            Some(0) => return Err(Error::NoWorkers.into()),
            Some(n) => n,
            None => thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(DEFAULT_WORKERS),
        };

        let wait = match args.timeout {
            None => WaitPolicy::Indefinitely,
            Some(secs) if secs.is_finite() && secs > 0.0 => {
                WaitPolicy::Timeout(Duration::from_secs_f64(secs))
            }
            Some(secs) => return Err(Error::InvalidTimeout(secs).into()),
        };

        Ok(Self {
            config,
            tasks: args.tasks,
            dry_run: args.dry_run,
            sources: args.sources,
            workers,
            wait,
            sequential: args.sequential,
            yes: args.yes,
            verbose: args.verbose,
        })
    }
}
