//! Cooperative re-entrant task runner.
//!
//! A [`CooperativeTask`] executes one long logical operation (for example
//! "render every thumbnail at the current picture size") on the thread that
//! also runs the host event loop. The operation is a step function that loops
//! over its work units and calls [`Checkpoint::check`] after each one. A
//! checkpoint yields to the host loop so pending input is serviced, then aborts
//! the pass with [`TaskError::Cancelled`] if an interruption is pending.
//!
//! Because the host loop runs inside a checkpoint, event handlers may call
//! [`CooperativeTask::run`] while the original call is still on the stack.
//! Such calls never nest: they only record that another pass is wanted, and
//! the outer loop runs exactly one follow-up pass however many requests
//! arrived.
//!
//! # Example
//!
//! ```ignore
//! let queue = Rc::new(EventQueue::new());
//! let task = CooperativeTask::new("thumbnails", queue.clone(), move |cp| {
//!     for id in pending_ids() {
//!         render_one(id);
//!         cp.check()?;
//!     }
//!     Ok(())
//! });
//! task.run()?;
//! ```

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use thiserror::Error;

/// Errors a step function can end with.
#[derive(Error, Debug)]
pub enum TaskError {
    /// The pass was abandoned at a checkpoint. Swallowed by the execution loop.
    #[error("task pass cancelled")]
    Cancelled,

    /// Any other failure. Propagates out of [`CooperativeTask::run`].
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

/// The cooperative-yield primitive supplied by the host event loop.
pub trait HostLoop {
    /// Service pending events, then return to the caller.
    fn process_events(&self);
}

/// Strategy-object form of a step function.
pub trait TaskStep {
    fn step(&mut self, checkpoint: &Checkpoint<'_>) -> Result<(), TaskError>;
}

struct FnStep<F>(F);

impl<F> TaskStep for FnStep<F>
where
    F: FnMut(&Checkpoint<'_>) -> Result<(), TaskError>,
{
    fn step(&mut self, checkpoint: &Checkpoint<'_>) -> Result<(), TaskError> {
        (self.0)(checkpoint)
    }
}

/// What a `run()` request arriving mid-pass does to the pass in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RerunPolicy {
    /// The current pass runs to completion, then one follow-up pass starts.
    #[default]
    Finish,
    /// The current pass is abandoned at its next checkpoint and the
    /// follow-up pass starts right away.
    Restart,
}

/// Pass counters for one task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskStats {
    pub passes_started: u64,
    pub passes_completed: u64,
    pub passes_cancelled: u64,
    pub passes_failed: u64,
    /// `run()` calls absorbed into a follow-up pass
    pub coalesced_requests: u64,
}

/// Handle passed to the step function.
pub struct Checkpoint<'a> {
    task: &'a CooperativeTask,
}

impl Checkpoint<'_> {
    /// Yield to the host loop, then abort the pass if it was interrupted.
    ///
    /// Propagate the result with `?`; the cancellation never reaches code after
    /// the checkpoint.
    pub fn check(&self) -> Result<(), TaskError> {
        self.task.host.process_events();
        if self.task.interrupted.get() {
            return Err(TaskError::Cancelled);
        }
        Ok(())
    }
}

/// Re-entrant "run latest" executor for a single interruptible operation.
///
/// All state lives in `Cell`s so that `run()`/`interrupt()` work through a
/// shared reference from inside event handlers dispatched at a checkpoint.
pub struct CooperativeTask {
    name: String,
    host: Rc<dyn HostLoop>,
    step: RefCell<Box<dyn TaskStep>>,
    policy: RerunPolicy,
    running: Cell<bool>,
    interrupted: Cell<bool>,
    rerun_requested: Cell<bool>,
    stats: Cell<TaskStats>,
}

/// Clears the task flags when the execution loop exits by any path,
/// including a panic inside the step function.
struct RunningGuard<'a> {
    task: &'a CooperativeTask,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.task.running.set(false);
        self.task.interrupted.set(false);
    }
}

impl CooperativeTask {
    /// Create a task bound to a step closure, with [`RerunPolicy::Finish`].
    pub fn new<F>(name: impl Into<String>, host: Rc<dyn HostLoop>, step: F) -> Self
    where
        F: FnMut(&Checkpoint<'_>) -> Result<(), TaskError> + 'static,
    {
        Self::with_step(name, host, FnStep(step))
    }

    /// Create a task bound to a [`TaskStep`] strategy object.
    pub fn with_step<S>(name: impl Into<String>, host: Rc<dyn HostLoop>, step: S) -> Self
    where
        S: TaskStep + 'static,
    {
        Self {
            name: name.into(),
            host,
            step: RefCell::new(Box::new(step)),
            policy: RerunPolicy::default(),
            running: Cell::new(false),
            interrupted: Cell::new(false),
            rerun_requested: Cell::new(false),
            stats: Cell::new(TaskStats::default()),
        }
    }

    /// Builder-style override of the rerun policy.
    pub fn with_policy(mut self, policy: RerunPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> RerunPolicy {
        self.policy
    }

    /// Request that the operation execute at least once more.
    ///
    /// When idle, this runs the step function to completion (plus any
    /// follow-up pass requested meanwhile) before returning. When already
    /// running, including from inside a checkpoint of the current pass, it
    /// only records the request and returns immediately.
    ///
    /// # Errors
    ///
    /// Returns the error of a step function that failed with anything other
    /// than [`TaskError::Cancelled`].
    pub fn run(&self) -> anyhow::Result<()> {
        if self.running.get() {
            self.rerun_requested.set(true);
            if self.policy == RerunPolicy::Restart {
                self.interrupted.set(true);
            }
            self.bump(|s| s.coalesced_requests += 1);
            tracing::trace!(task = %self.name, "run requested while active, coalescing");
            return Ok(());
        }

        self.running.set(true);
        let _guard = RunningGuard { task: self };

        loop {
            self.rerun_requested.set(false);
            self.bump(|s| s.passes_started += 1);
            tracing::debug!(task = %self.name, "pass started");

            let result = {
                let mut step = self.step.borrow_mut();
                step.step(&Checkpoint { task: self })
            };
            self.interrupted.set(false);

            match result {
                Ok(()) => {
                    self.bump(|s| s.passes_completed += 1);
                    tracing::debug!(task = %self.name, "pass completed");
                }
                Err(TaskError::Cancelled) => {
                    self.bump(|s| s.passes_cancelled += 1);
                    tracing::debug!(task = %self.name, "pass cancelled");
                }
                Err(TaskError::Failed(e)) => {
                    self.rerun_requested.set(false);
                    self.bump(|s| s.passes_failed += 1);
                    tracing::warn!(task = %self.name, "pass failed: {:#}", e);
                    return Err(e);
                }
            }

            if !self.rerun_requested.get() {
                break;
            }
        }

        Ok(())
    }

    /// Abort the pass in flight at its next checkpoint. No-op when idle.
    ///
    /// A pending rerun request survives the interruption.
    pub fn interrupt(&self) {
        if self.running.get() {
            tracing::debug!(task = %self.name, "interrupt requested");
            self.interrupted.set(true);
        }
    }

    /// Interrupt the pass in flight and drop any pending rerun request.
    pub fn stop(&self) {
        if self.running.get() {
            tracing::debug!(task = %self.name, "stop requested");
            self.rerun_requested.set(false);
            self.interrupted.set(true);
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    pub fn stats(&self) -> TaskStats {
        self.stats.get()
    }

    fn bump(&self, f: impl FnOnce(&mut TaskStats)) {
        let mut stats = self.stats.get();
        f(&mut stats);
        self.stats.set(stats);
    }
}

impl std::fmt::Debug for CooperativeTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CooperativeTask")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .field("running", &self.running.get())
            .field("interrupted", &self.interrupted.get())
            .field("rerun_requested", &self.rerun_requested.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Host loop whose "events" are closures scheduled for specific yields.
    #[derive(Default)]
    struct ScriptedHost {
        yields: Cell<usize>,
        script: RefCell<VecDeque<(usize, Box<dyn FnOnce()>)>>,
    }

    impl ScriptedHost {
        fn at(&self, yield_no: usize, f: impl FnOnce() + 'static) {
            self.script.borrow_mut().push_back((yield_no, Box::new(f)));
        }
    }

    impl HostLoop for ScriptedHost {
        fn process_events(&self) {
            let n = self.yields.get() + 1;
            self.yields.set(n);
            loop {
                let next = {
                    let mut script = self.script.borrow_mut();
                    match script.front() {
                        Some((at, _)) if *at == n => script.pop_front(),
                        _ => None,
                    }
                };
                match next {
                    Some((_, f)) => f(),
                    None => break,
                }
            }
        }
    }

    fn counting_task(
        host: Rc<ScriptedHost>,
        units: usize,
        policy: RerunPolicy,
    ) -> (Rc<CooperativeTask>, Rc<RefCell<Vec<usize>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let log_step = log.clone();
        let task = CooperativeTask::new("test", host, move |cp| {
            for unit in 0..units {
                log_step.borrow_mut().push(unit);
                cp.check()?;
            }
            Ok(())
        })
        .with_policy(policy);
        (Rc::new(task), log)
    }

    #[test]
    fn test_single_pass() {
        let host = Rc::new(ScriptedHost::default());
        let (task, log) = counting_task(host, 3, RerunPolicy::Finish);

        task.run().unwrap();

        assert_eq!(*log.borrow(), vec![0, 1, 2]);
        assert!(!task.is_running());
        assert_eq!(task.stats().passes_completed, 1);
    }

    #[test]
    fn test_reentrant_run_coalesces() {
        let host = Rc::new(ScriptedHost::default());
        let (task, log) = counting_task(host.clone(), 3, RerunPolicy::Finish);

        for _ in 0..4 {
            let t = task.clone();
            host.at(1, move || {
                assert!(t.is_running());
                t.run().unwrap();
            });
        }
        task.run().unwrap();

        assert_eq!(*log.borrow(), vec![0, 1, 2, 0, 1, 2]);
        let stats = task.stats();
        assert_eq!(stats.passes_started, 2);
        assert_eq!(stats.passes_completed, 2);
        assert_eq!(stats.coalesced_requests, 4);
    }

    #[test]
    fn test_interrupt_aborts_pass() {
        let host = Rc::new(ScriptedHost::default());
        let (task, log) = counting_task(host.clone(), 5, RerunPolicy::Finish);

        let t = task.clone();
        host.at(2, move || t.interrupt());
        task.run().unwrap();

        assert_eq!(*log.borrow(), vec![0, 1]);
        assert!(!task.is_running());
        assert_eq!(task.stats().passes_cancelled, 1);
    }

    #[test]
    fn test_interrupt_keeps_pending_rerun() {
        let host = Rc::new(ScriptedHost::default());
        let (task, log) = counting_task(host.clone(), 3, RerunPolicy::Finish);

        let t = task.clone();
        host.at(1, move || t.run().unwrap());
        let t = task.clone();
        host.at(1, move || t.interrupt());
        task.run().unwrap();

        // first pass stops after unit 0, second pass runs fully
        assert_eq!(*log.borrow(), vec![0, 0, 1, 2]);
        assert!(!task.is_running());
        let stats = task.stats();
        assert_eq!(stats.passes_cancelled, 1);
        assert_eq!(stats.passes_completed, 1);
    }

    #[test]
    fn test_restart_policy_abandons_current_pass() {
        let host = Rc::new(ScriptedHost::default());
        let (task, log) = counting_task(host.clone(), 3, RerunPolicy::Restart);

        let t = task.clone();
        host.at(2, move || t.run().unwrap());
        task.run().unwrap();

        assert_eq!(*log.borrow(), vec![0, 1, 0, 1, 2]);
        assert_eq!(task.stats().passes_cancelled, 1);
    }

    #[test]
    fn test_stop_drops_rerun() {
        let host = Rc::new(ScriptedHost::default());
        let (task, log) = counting_task(host.clone(), 3, RerunPolicy::Finish);

        let t = task.clone();
        host.at(1, move || {
            t.run().unwrap();
            t.stop();
        });
        task.run().unwrap();

        assert_eq!(*log.borrow(), vec![0]);
        assert_eq!(task.stats().passes_started, 1);
    }

    #[test]
    fn test_idle_interrupt_is_noop() {
        let host = Rc::new(ScriptedHost::default());
        let (task, log) = counting_task(host, 2, RerunPolicy::Finish);

        task.interrupt();
        task.stop();
        assert!(!task.is_running());

        task.run().unwrap();
        assert_eq!(*log.borrow(), vec![0, 1]);
    }

    #[test]
    fn test_failure_propagates_and_resets() {
        let host = Rc::new(ScriptedHost::default());
        let calls = Rc::new(Cell::new(0));
        let calls_step = calls.clone();
        let task = CooperativeTask::new("failing", host, move |_cp| {
            calls_step.set(calls_step.get() + 1);
            Err(anyhow::anyhow!("decoder exploded").into())
        });

        let err = task.run().unwrap_err();
        assert!(err.to_string().contains("decoder exploded"));
        assert!(!task.is_running());
        assert_eq!(task.stats().passes_failed, 1);

        // The task is usable again afterwards
        assert!(task.run().is_err());
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_strategy_object_step() {
        struct Counter(Rc<Cell<u32>>);

        impl TaskStep for Counter {
            fn step(&mut self, checkpoint: &Checkpoint<'_>) -> Result<(), TaskError> {
                self.0.set(self.0.get() + 1);
                checkpoint.check()
            }
        }

        let count = Rc::new(Cell::new(0));
        let host = Rc::new(ScriptedHost::default());
        let task = CooperativeTask::with_step("strategy", host, Counter(count.clone()));
        task.run().unwrap();
        task.run().unwrap();

        assert_eq!(count.get(), 2);
    }
}
