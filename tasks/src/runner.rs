use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use colored::Colorize;
use crossbeam_channel::{unbounded, Receiver, Sender};
use rayon::{ThreadPool, ThreadPoolBuilder};

use params::Mapping;
use util::Timer;

use crate::task::invoke;
use crate::{Error, Operation, Runnable, Task, TaskResult};

/// How often the concurrent runner wakes up to check for interrupts and timeouts.
const TICK: Duration = Duration::from_millis(50);

/// How a batch of tasks is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// One after another, in order.
    Sequential,
    /// On a pool of this many worker threads.
    Concurrent { workers: usize },
}

/// What the concurrent runner does about tasks that take a long time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WaitPolicy {
    /// Wait as long as it takes.
    #[default]
    Indefinitely,
    /// Record a task as failed if it hasn't finished this long after it started.
    /// The worker running it is abandoned and replaced, and its eventual result discarded.
    Timeout(Duration),
}

/// Shared flag signalling that the user asked to stop.
/// Cloning gives another handle to the same flag.
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

struct Job {
    idx: usize,
    operation: Arc<dyn Operation>,
    arguments: Mapping,
}

enum Event {
    Started(usize, Instant),
    Finished(usize, TaskResult),
}

/// Runs batches of tasks and reports progress on stderr.
///
/// Whatever the mode, a failing task never stops the batch: its error is
/// recorded in its own result. The only thing that stops a batch early is an
/// [`Interrupt`]: no new tasks are started, the ones already running are
/// waited for and their results stored, and the run reports [`Error::Interrupted`].
#[derive(Debug, Clone)]
pub struct Runner {
    mode: Mode,
    wait: WaitPolicy,
    interrupt: Interrupt,
    verbose: bool,
}

impl Runner {
    pub fn sequential() -> Self {
        Self {
            mode: Mode::Sequential,
            wait: WaitPolicy::default(),
            interrupt: Interrupt::default(),
            verbose: false,
        }
    }

    pub fn concurrent(workers: usize) -> Result<Self, Error> {
        if workers == 0 {
            return Err(Error::NoWorkers);
        }
        Ok(Self {
            mode: Mode::Concurrent { workers },
            ..Self::sequential()
        })
    }

    pub fn with_wait(mut self, wait: WaitPolicy) -> Self {
        self.wait = wait;
        self
    }

    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Run all `tasks`, labelling progress output with `group`.
    pub fn run(&self, group: &str, tasks: &mut [Task]) -> Result<(), Error> {
        match self.mode {
            Mode::Sequential => self.run_sequential(group, tasks),
            Mode::Concurrent { workers } => self.run_concurrent(group, tasks, workers),
        }
    }

    /// Run `tasks` one at a time, in order.
    pub fn run_sequential<T: Runnable>(&self, group: &str, tasks: &mut [T]) -> Result<(), Error> {
        let total = tasks.len();
        self.announce(group, total, "sequentially");

        for (i, task) in tasks.iter_mut().enumerate() {
            if self.interrupt.is_set() {
                return Err(Error::Interrupted {
                    completed: i,
                    total,
                });
            }
            self.report_start(task.identifier(), task.arguments());
            let timer = Timer::now();
            task.run();
            self.report_result(task.identifier(), task.result(), &timer);
        }

        if self.interrupt.is_set() {
            return Err(Error::Interrupted {
                completed: total,
                total,
            });
        }
        Ok(())
    }

    /// Run `tasks` on `workers` threads.
    ///
    /// Jobs are handed out here, never more than there are idle workers,
    /// so every job that has been handed out is either running or about to.
    /// That lets an interrupt stop the batch without losing any result.
    fn run_concurrent(&self, group: &str, tasks: &mut [Task], workers: usize) -> Result<(), Error> {
        let total = tasks.len();
        let workers = workers.min(total);
        self.announce(group, total, &format!("on {workers} workers"));
        if total == 0 {
            return Ok(());
        }

        let (job_tx, job_rx) = unbounded::<Job>();
        let (event_tx, event_rx) = unbounded::<Event>();
        // dropping a pool doesn't wait for its threads,
        // which exit once the job queue is closed:
        let mut pools = vec![build_pool(workers)?];
        for _ in 0..workers {
            spawn_worker(&pools[0], &job_rx, &event_tx);
        }

        let mut started: Vec<Option<Instant>> = vec![None; total];
        let mut done = vec![false; total];
        let mut completed = 0;
        let mut next = 0;
        let mut in_flight = 0;

        loop {
            let interrupted = self.interrupt.is_set();
            if !interrupted {
                while next < total && in_flight < workers {
                    let (operation, arguments) = tasks[next].job();
                    // can't fail, since we still hold a receiver:
                    let _ = job_tx.send(Job {
                        idx: next,
                        operation,
                        arguments,
                    });
                    next += 1;
                    in_flight += 1;
                }
            }
            if in_flight == 0 && (interrupted || next == total) {
                break;
            }

            // we still hold a sender, so the only possible error is a timeout:
            if let Ok(event) = event_rx.recv_timeout(TICK) {
                match event {
                    Event::Started(idx, at) => {
                        started[idx] = Some(at);
                        self.report_start(tasks[idx].identifier(), tasks[idx].arguments());
                    }
                    Event::Finished(idx, result) => {
                        if done[idx] {
                            log::debug!("discarding late result of {}", tasks[idx].identifier());
                        } else {
                            done[idx] = true;
                            completed += 1;
                            in_flight -= 1;
                            tasks[idx].set_result(result);
                            self.report_finished(&tasks[idx], started[idx]);
                        }
                    }
                }
            }

            if let WaitPolicy::Timeout(limit) = self.wait {
                for idx in 0..next {
                    let overdue = started[idx].is_some_and(|at| at.elapsed() >= limit);
                    if !done[idx] && overdue {
                        done[idx] = true;
                        completed += 1;
                        in_flight -= 1;
                        tasks[idx].set_result(TaskResult::Failed(Error::TimedOut(limit).into()));
                        self.report_finished(&tasks[idx], started[idx]);

                        // the abandoned worker is still busy, so replace it:
                        let spare = build_pool(1)?;
                        spawn_worker(&spare, &job_rx, &event_tx);
                        pools.push(spare);
                    }
                }
            }
        }

        drop(job_tx);
        log::debug!("ran {group} on {} thread pools", pools.len());
        if self.interrupt.is_set() {
            return Err(Error::Interrupted { completed, total });
        }
        Ok(())
    }

    fn announce(&self, group: &str, total: usize, how: &str) {
        eprintln!(
            "{} {} ({} {}, {how})",
            "Running".magenta(),
            group.cyan(),
            total,
            if total == 1 { "task" } else { "tasks" },
        );
        log::info!("running {total} tasks of {group} {how}");
    }

    fn report_start(&self, id: &str, args: &Mapping) {
        eprintln!("{} {id}", "RUN".green());
        if self.verbose {
            eprintln!("    with {args}");
        }
    }

    fn report_result(&self, id: &str, result: &TaskResult, timer: &Timer) {
        match result {
            TaskResult::Finished(_) => {
                eprintln!("{} {id} in {:?}", "DONE".green(), timer.elapsed());
            }
            TaskResult::Failed(e) => {
                eprintln!("{} {id}: {e:#}", "FAILED".red());
                log::debug!("{id} failed: {e:?}");
            }
            TaskResult::Pending => (),
        }
    }

    fn report_finished(&self, task: &Task, started: Option<Instant>) {
        let timer = Timer::from_instant(started.unwrap_or_else(Instant::now));
        self.report_result(task.identifier(), task.result(), &timer);
    }
}

fn build_pool(threads: usize) -> Result<ThreadPool, Error> {
    ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("gf-worker-{i}"))
        .build()
        .map_err(Error::ThreadPool)
}

fn spawn_worker(pool: &ThreadPool, jobs: &Receiver<Job>, events: &Sender<Event>) {
    let jobs = jobs.clone();
    let events = events.clone();
    pool.spawn(move || work(jobs, events));
}

/// Worker loop: run jobs until the queue is closed.
fn work(jobs: Receiver<Job>, events: Sender<Event>) {
    for job in jobs.iter() {
        if events.send(Event::Started(job.idx, Instant::now())).is_err() {
            break;
        }
        let result = invoke(&*job.operation, &job.arguments);
        if events.send(Event::Finished(job.idx, result)).is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use anyhow::{bail, Result};
    use params::Value;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    fn task(id: &str, op: Arc<dyn Operation>) -> Task {
        let args: Mapping = [("id", Value::from(id))].into_iter().collect();
        Task::new(id, op, args)
    }

    fn fail_second() -> Arc<dyn Operation> {
        Arc::new(|args: &Mapping| -> Result<Value> {
            let id = args.require_str("id")?;
            if id == "t.2" {
                bail!("no data for {id}");
            }
            Ok(Value::from(id))
        })
    }

    fn batch(op: Arc<dyn Operation>, n: usize) -> Vec<Task> {
        (1..=n).map(|i| task(&format!("t.{i}"), op.clone())).collect()
    }

    #[test]
    fn test_sequential_isolates_failures() -> Result<()> {
        let mut tasks = batch(fail_second(), 3);
        Runner::sequential().run("group", &mut tasks)?;

        let finished: Vec<bool> = tasks.iter().map(|t| t.result().finished()).collect();
        assert_eq!(finished, [true, false, true]);
        assert!(tasks[1].result().exception().is_some());
        assert_eq!(tasks[2].result().return_value(), Some(&Value::from("t.3")));
        Ok(())
    }

    #[test]
    fn test_concurrent_isolates_failures() -> Result<()> {
        let mut tasks = batch(fail_second(), 8);
        Runner::concurrent(3)?.run("group", &mut tasks)?;

        for (i, task) in tasks.iter().enumerate() {
            if i == 1 {
                assert!(task.result().failed());
            } else {
                let expected = Value::from(format!("t.{}", i + 1));
                assert_eq!(task.result().return_value(), Some(&expected));
            }
        }
        Ok(())
    }

    #[test]
    fn test_concurrent_runs_in_parallel() -> Result<()> {
        let op: Arc<dyn Operation> = Arc::new(|_: &Mapping| -> Result<Value> {
            thread::sleep(Duration::from_millis(200));
            Ok(Value::Null)
        });
        let mut tasks = batch(op, 4);
        let timer = Timer::now();
        Runner::concurrent(4)?.run("group", &mut tasks)?;
        assert!(timer.elapsed() < Duration::from_millis(700));
        assert!(tasks.iter().all(|t| t.result().finished()));
        Ok(())
    }

    #[test]
    fn test_timeout_marks_slow_task_failed() -> Result<()> {
        let op: Arc<dyn Operation> = Arc::new(|args: &Mapping| -> Result<Value> {
            if args.require_str("id")? == "t.1" {
                thread::sleep(Duration::from_secs(2));
            }
            Ok(Value::Null)
        });
        let mut tasks = batch(op, 3);
        let timer = Timer::now();
        Runner::concurrent(2)?
            .with_wait(WaitPolicy::Timeout(Duration::from_millis(200)))
            .run("group", &mut tasks)?;

        assert!(timer.elapsed() < Duration::from_secs(2));
        let err = tasks[0].result().exception().expect("slow task failed");
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::TimedOut(_))));
        assert!(tasks[1].result().finished());
        assert!(tasks[2].result().finished());
        Ok(())
    }

    #[test]
    fn test_timeout_frees_busy_worker() -> Result<()> {
        let op: Arc<dyn Operation> = Arc::new(|args: &Mapping| -> Result<Value> {
            if args.require_str("id")? == "t.1" {
                thread::sleep(Duration::from_secs(3));
            }
            Ok(Value::Null)
        });
        let mut tasks = batch(op, 3);
        let timer = Timer::now();
        // the only worker gets stuck on t.1:
        Runner::concurrent(1)?
            .with_wait(WaitPolicy::Timeout(Duration::from_millis(200)))
            .run("group", &mut tasks)?;

        assert!(timer.elapsed() < Duration::from_secs(2));
        let err = tasks[0].result().exception().expect("slow task failed");
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::TimedOut(_))));
        assert!(tasks[1].result().finished());
        assert!(tasks[2].result().finished());
        Ok(())
    }

    #[test]
    fn test_interrupt_stops_sequential_run() -> Result<()> {
        let interrupt = Interrupt::new();
        let trigger = interrupt.clone();
        let op: Arc<dyn Operation> = Arc::new(move |_: &Mapping| -> Result<Value> {
            trigger.trigger();
            Ok(Value::Null)
        });
        let mut tasks = batch(op, 3);
        let res = Runner::sequential()
            .with_interrupt(interrupt)
            .run("group", &mut tasks);

        assert!(matches!(
            res,
            Err(Error::Interrupted {
                completed: 1,
                total: 3
            })
        ));
        assert!(tasks[0].result().finished());
        assert!(tasks[1].result().is_pending());
        assert!(tasks[2].result().is_pending());
        Ok(())
    }

    #[test]
    fn test_interrupt_before_concurrent_run() -> Result<()> {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let op: Arc<dyn Operation> = Arc::new(move |_: &Mapping| -> Result<Value> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Null)
        });
        let interrupt = Interrupt::new();
        interrupt.trigger();

        let mut tasks = batch(op, 4);
        let res = Runner::concurrent(2)?
            .with_interrupt(interrupt)
            .run("group", &mut tasks);

        assert!(matches!(res, Err(Error::Interrupted { completed: 0, .. })));
        assert!(tasks.iter().all(|t| t.result().is_pending()));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[test]
    fn test_interrupt_during_concurrent_run() -> Result<()> {
        let interrupt = Interrupt::new();
        let trigger = interrupt.clone();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let op: Arc<dyn Operation> = Arc::new(move |_: &Mapping| -> Result<Value> {
            counter.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(30));
            trigger.trigger();
            Ok(Value::Null)
        });

        let mut tasks = batch(op, 6);
        let res = Runner::concurrent(2)?
            .with_interrupt(interrupt)
            .run("group", &mut tasks);

        // both running tasks complete and keep their results; nothing else starts:
        assert!(matches!(
            res,
            Err(Error::Interrupted {
                completed: 2,
                total: 6
            })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(tasks[..2].iter().all(|t| t.result().finished()));
        assert!(tasks[2..].iter().all(|t| t.result().is_pending()));
        Ok(())
    }

    #[test]
    fn test_interrupt_keeps_all_finished_results() -> Result<()> {
        let interrupt = Interrupt::new();
        let trigger = interrupt.clone();
        let op: Arc<dyn Operation> = Arc::new(move |_: &Mapping| -> Result<Value> {
            thread::sleep(Duration::from_millis(30));
            trigger.trigger();
            Ok(Value::Null)
        });

        let mut tasks = batch(op, 4);
        let res = Runner::concurrent(4)?
            .with_interrupt(interrupt)
            .run("group", &mut tasks);

        assert!(matches!(
            res,
            Err(Error::Interrupted {
                completed: 4,
                total: 4
            })
        ));
        assert!(tasks.iter().all(|t| t.result().finished()));
        Ok(())
    }

    #[test]
    fn test_no_workers() {
        assert!(matches!(Runner::concurrent(0), Err(Error::NoWorkers)));
    }

    #[test]
    fn test_empty_batch() -> Result<()> {
        let mut tasks: Vec<Task> = Vec::new();
        Runner::concurrent(2)?.run("empty", &mut tasks)?;
        Runner::sequential().run("empty", &mut tasks)?;
        Ok(())
    }
}
