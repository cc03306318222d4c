use colored::Colorize;

use crate::{Error, Runnable, TaskResult};

/// Counts of task outcomes across one or more batches, plus the failures themselves.
#[derive(Debug, Default)]
pub struct Summary<'a> {
    finished: usize,
    pending: usize,
    // ideally we won't have any:
    failed: Vec<(&'a str, &'a anyhow::Error)>,
}

impl<'a> Summary<'a> {
    /// Summary of a single batch.
    pub fn of<T: Runnable>(tasks: &'a [T]) -> Self {
        let mut summary = Self::default();
        summary.add(tasks);
        summary
    }

    pub fn add<T: Runnable>(&mut self, tasks: &'a [T]) {
        for task in tasks {
            match task.result() {
                TaskResult::Finished(_) => self.finished += 1,
                TaskResult::Pending => self.pending += 1,
                TaskResult::Failed(e) => {
                    log::trace!("{}: {e:?}", task.identifier());
                    self.failed.push((task.identifier(), e));
                }
            }
        }
    }

    pub fn finished(&self) -> usize {
        self.finished
    }

    pub fn failed(&self) -> usize {
        self.failed.len()
    }

    pub fn pending(&self) -> usize {
        self.pending
    }

    pub fn total(&self) -> usize {
        self.finished + self.pending + self.failed.len()
    }

    /// Identifiers of failed tasks, in the order they were added.
    pub fn failed_identifiers(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.failed.iter().map(|(id, _)| *id)
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Print counts and the full list of failures to stderr, fail w/ an aggregated error
    /// if one or more tasks failed.
    pub fn print_recap(&self, label: &str) -> Result<(), Error> {
        eprintln!(
            "\n{}: {} finished, {} failed, {} not run",
            label.magenta(),
            self.finished.to_string().green(),
            self.failed.len().to_string().red(),
            self.pending,
        );
        if self.failed.is_empty() {
            Ok(())
        } else {
            eprintln!("\nEncountered errors while {label}:\n");
            for (id, e) in &self.failed {
                eprintln!("{} in {id}: {e:?}\n", "ERROR".red());
            }
            Err(Error::TasksFailed(label.to_owned(), self.failed.len()))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{Operation, Runner, Task};
    use anyhow::{bail, Result};
    use params::{Mapping, Value};
    use std::sync::Arc;

    fn tasks() -> Vec<Task> {
        let op: Arc<dyn Operation> = Arc::new(|args: &Mapping| -> Result<Value> {
            if args.require_str("station")? == "XXXX" {
                bail!("unknown station");
            }
            Ok(Value::Null)
        });
        ["ONSA", "XXXX", "WTZR"]
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let args: Mapping = [("station", Value::from(*s))].into_iter().collect();
                Task::new(format!("stations.{}", i + 1), op.clone(), args)
            })
            .collect()
    }

    #[test]
    fn test_counts() -> Result<()> {
        let mut tasks = tasks();
        let summary = Summary::of(&tasks);
        assert_eq!(summary.pending(), 3);
        assert!(summary.is_success());

        Runner::sequential().run("stations", &mut tasks)?;
        let summary = Summary::of(&tasks);
        assert_eq!(summary.finished(), 2);
        assert_eq!(summary.failed(), 1);
        assert_eq!(summary.total(), 3);
        assert_eq!(summary.failed_identifiers().collect::<Vec<_>>(), ["stations.2"]);
        Ok(())
    }

    #[test]
    fn test_recap_fails_on_failed_tasks() -> Result<()> {
        let mut first = tasks();
        let mut second = tasks();
        Runner::sequential().run("first", &mut first)?;
        Runner::sequential().run("second", &mut second)?;

        let mut summary = Summary::default();
        summary.add(&first);
        summary.add(&second);
        assert!(matches!(
            summary.print_recap("running tasks"),
            Err(Error::TasksFailed(_, 2))
        ));
        Ok(())
    }

    #[test]
    fn test_recap_ok_without_failures() {
        let summary = Summary::of::<Task>(&[]);
        assert!(summary.print_recap("running tasks").is_ok());
    }
}
