use std::sync::OnceLock;
use std::time::SystemTime;

use anyhow::{Context, Result};
use colored::Colorize;

use sources::Source;
use tasks::{Interrupt, Runnable, Runner, Summary, TaskDefinition};

use crate::config::Config;
use crate::ops;
use crate::settings::Settings;
use crate::ui::Ui;

/// This struct actually runs the command-line app.
pub struct App {
    /// Interpreted command line settings
    settings: Settings,
    /// User interface
    ui: Ui,
}

impl App {
    /// Create a new `App`.
    pub fn new(settings: Settings) -> Self {
        let ui = Ui::new(&settings);
        Self { settings, ui }
    }

    /// Run the app: list sources, or build and run the configured tasks.
    pub fn run(mut self) -> Result<()> {
        let config = self.load_config()?;

        if self.settings.sources {
            return self.list_sources(&config);
        }

        let registry = ops::registry()?;
        let mut defs = config.definitions(&registry, &self.settings.tasks)?;
        if defs.is_empty() {
            log::warn!("config defines no tasks");
            return Ok(());
        }

        let total = self.build_tasks(&mut defs)?;

        if self.settings.dry_run {
            self.print_tasks(&defs);
            return Ok(());
        }

        let prompt = format!("Run {total} tasks from {} definitions?", defs.len());
        if !self.ui.confirm(&prompt)? {
            eprintln!("Exiting.");
            return Ok(());
        }

        self.run_tasks(&mut defs)
    }

    fn load_config(&self) -> Result<Config> {
        self.ui.verbose_progress_debug("Reading config file", &self.settings.config);
        let config = Config::load(&self.settings.config)?;
        self.ui.done();

        if self.ui.verbose {
            eprintln!(
                "Loaded config with {} task definitions and {} sources.",
                config.tasks.len(),
                config.sources.len()
            );
        }
        Ok(config)
    }
}

// SOURCES //////////////////
impl App {
    fn list_sources(&self, config: &Config) -> Result<()> {
        let now = SystemTime::now();
        for source in config.sources()? {
            self.list_source(&source, now)
                .with_context(|| format!("while resolving source \"{}\"", source.identifier()))?;
        }
        Ok(())
    }

    fn list_source(&self, source: &Source, now: SystemTime) -> Result<()> {
        let pairs = source.resolve()?;
        self.ui.heading(&format!(
            "{} ({} files) {}",
            source.identifier(),
            pairs.len(),
            source.description()
        ));
        for pair in &pairs {
            if source.needs_fetch(pair, now)? {
                self.ui.item("fetch", pair);
            } else {
                self.ui.item("keep ", pair);
            }
        }
        Ok(())
    }
}

// TASKS //////////////////
impl App {
    /// Build all tasks up front, so config errors surface before anything runs.
    fn build_tasks(&mut self, defs: &mut [TaskDefinition]) -> Result<usize> {
        self.ui.verbose_progress("Building tasks");
        self.ui.start_timer();

        let mut total = 0;
        for def in defs.iter_mut() {
            let id = def.identifier().to_owned();
            total += def
                .tasks()
                .with_context(|| format!("while building tasks of \"{id}\""))?
                .len();
        }

        self.ui.done();
        self.ui.print_elapsed("Building tasks");
        Ok(total)
    }

    fn print_tasks(&self, defs: &[TaskDefinition]) {
        eprintln!("{}", "Dry run; nothing will be executed.".magenta());
        for def in defs {
            let tasks = def.cached_tasks().unwrap_or_default();
            self.ui.heading(&format!(
                "{} ({} tasks{}) {}",
                def.identifier(),
                tasks.len(),
                if def.is_asynchronous() { ", asynchronous" } else { "" },
                def.description()
            ));
            for task in tasks {
                self.ui.item(task.identifier(), task.arguments());
            }
        }
    }

    fn run_tasks(&mut self, defs: &mut [TaskDefinition]) -> Result<()> {
        let interrupt = interrupt();
        self.ui.start_timer();

        let mut outcome = Ok(());
        for def in defs.iter_mut() {
            let runner = self.runner_for(def, &interrupt)?;
            let id = def.identifier().to_owned();
            if let Err(e) = runner.run(&id, def.tasks_mut()?) {
                outcome = Err(e);
                break;
            }
        }

        let mut summary = Summary::default();
        for def in defs.iter() {
            summary.add(def.cached_tasks().unwrap_or_default());
        }
        self.ui.print_elapsed("Running tasks");
        let recap = summary.print_recap("running tasks");

        outcome?;
        recap?;
        Ok(())
    }

    fn runner_for(&self, def: &TaskDefinition, interrupt: &Interrupt) -> Result<Runner> {
        let runner = if def.is_asynchronous() && !self.settings.sequential {
            Runner::concurrent(self.settings.workers)?.with_wait(self.settings.wait)
        } else {
            Runner::sequential()
        };
        Ok(runner
            .with_interrupt(interrupt.clone())
            .verbose(self.ui.verbose))
    }
}

/// The process-wide interrupt flag, set by Ctrl-C.
/// A handler can only be installed once per process, so the flag is shared by every run.
fn interrupt() -> Interrupt {
    static INTERRUPT: OnceLock<Interrupt> = OnceLock::new();
    INTERRUPT
        .get_or_init(|| {
            let interrupt = Interrupt::new();
            let handle = interrupt.clone();
            let res = ctrlc::set_handler(move || {
                eprintln!("\n{}", "Interrupted by user; stopping.".red());
                handle.trigger();
            });
            if let Err(e) = res {
                log::warn!("unable to install Ctrl-C handler: {e}");
            }
            interrupt
        })
        .clone()
}
