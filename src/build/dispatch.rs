//! Parallel compile dispatch.
//!
//! A fixed set of workers drains one shared queue. The first failing command raises
//! the [`FailureFlag`]; workers finish what they are running and take nothing new.
//! Interrupts raise the same flag.

use super::utils::run_shell;
use crate::error::{BuildError, Result};
use crate::ui::Console;
use colored::*;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// One compile job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub source: PathBuf,
    pub object: PathBuf,
    pub command: String,
    pub index: usize,
}

/// Raised once, never lowered. Shared by workers, the coordinator and the
/// interrupt handler.
#[derive(Debug, Clone, Default)]
pub struct FailureFlag(Arc<AtomicBool>);

impl FailureFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Runs one command to completion.
pub trait CommandRunner: Sync {
    fn run(&self, command: &str) -> Result<()>;
}

/// `sh -c` / `cmd /C` with inherited stdio.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn run(&self, command: &str) -> Result<()> {
        run_shell(command)
    }
}

#[derive(Debug, Default)]
pub struct DispatchReport {
    pub started: usize,
    pub completed: usize,
    pub failures: Vec<(Task, BuildError)>,
}

impl DispatchReport {
    pub fn succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Number of hardware threads, falling back to one.
pub fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

pub struct Dispatcher<'a, R: CommandRunner> {
    jobs: usize,
    runner: &'a R,
    console: &'a Console,
    flag: FailureFlag,
}

impl<'a, R: CommandRunner> Dispatcher<'a, R> {
    pub fn new(jobs: usize, runner: &'a R, console: &'a Console, flag: FailureFlag) -> Self {
        Self {
            jobs: jobs.max(1),
            runner,
            console,
            flag,
        }
    }

    /// Runs every task at most once; blocks until all workers have exited.
    pub fn run(&self, tasks: Vec<Task>) -> Result<DispatchReport> {
        let total = tasks.len();
        if total == 0 {
            return Ok(DispatchReport::default());
        }

        let workers = self.jobs.clamp(1, total);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("mb-worker-{}", i))
            .build()?;
        log::debug!("dispatching {} tasks on {} workers", total, workers);

        let queue = Mutex::new(VecDeque::from(tasks));
        let started = AtomicUsize::new(0);
        let completed = AtomicUsize::new(0);
        let failures = Mutex::new(Vec::new());

        pool.scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|_| {
                    self.work(&queue, total, &started, &completed, &failures);
                });
            }
        });

        let failures = failures.into_inner().unwrap_or_else(PoisonError::into_inner);
        Ok(DispatchReport {
            started: started.into_inner(),
            completed: completed.into_inner(),
            failures,
        })
    }

    fn work(
        &self,
        queue: &Mutex<VecDeque<Task>>,
        total: usize,
        started: &AtomicUsize,
        completed: &AtomicUsize,
        failures: &Mutex<Vec<(Task, BuildError)>>,
    ) {
        loop {
            let task = {
                let mut queue = queue.lock().unwrap_or_else(PoisonError::into_inner);
                queue.pop_front()
            };
            let Some(task) = task else {
                return;
            };
            if self.flag.is_raised() {
                return;
            }

            let n = started.fetch_add(1, Ordering::SeqCst) + 1;
            self.console.status(format!(
                "{} {}",
                format!("[{}/{}]", n, total).dimmed(),
                task.command
            ));

            match self.runner.run(&task.command) {
                Ok(()) => {
                    completed.fetch_add(1, Ordering::SeqCst);
                }
                Err(e) => {
                    self.flag.raise();
                    self.console
                        .error(format!("Compiling {} failed: {}", task.source.display(), e));
                    failures
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push((task, e));
                    return;
                }
            }
        }
    }
}
