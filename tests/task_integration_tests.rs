//! Integration tests for CooperativeTask driven by the EventQueue host loop
//!
//! These tests verify that:
//! - Events posted to the queue run at checkpoints of the active pass
//! - Nested run() calls coalesce into one follow-up pass
//! - interrupt() aborts the current pass without surfacing an error
//! - Failures propagate and leave the task idle

use photo_organizer::task::{Checkpoint, CooperativeTask, RerunPolicy, TaskError};
use photo_organizer::EventQueue;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

type Log = Rc<RefCell<Vec<(u32, usize)>>>;

/// A task whose step records `(pass, unit)` for each of `units` work units.
fn recording_task(queue: &Rc<EventQueue>, units: usize) -> (Rc<CooperativeTask>, Log) {
    let log: Log = Rc::new(RefCell::new(Vec::new()));
    let pass_no = Rc::new(Cell::new(0));

    let step_log = Rc::clone(&log);
    let task = CooperativeTask::new("scenario", queue.clone(), move |cp: &Checkpoint<'_>| {
        let pass = pass_no.get() + 1;
        pass_no.set(pass);
        for unit in 0..units {
            step_log.borrow_mut().push((pass, unit));
            cp.check()?;
        }
        Ok(())
    });

    (Rc::new(task), log)
}

#[test]
fn test_nested_run_then_interrupt_in_first_checkpoint() {
    let queue = Rc::new(EventQueue::new());
    let (task, log) = recording_task(&queue, 3);

    let seen_running = Rc::new(Cell::new(false));
    {
        let task = Rc::clone(&task);
        let seen_running = Rc::clone(&seen_running);
        queue.post(move || {
            seen_running.set(task.is_running());
            task.run().unwrap();
        });
    }
    {
        let task = Rc::clone(&task);
        queue.post(move || task.interrupt());
    }

    task.run().unwrap();

    // First pass aborted after its first unit, second pass ran fully
    assert_eq!(*log.borrow(), vec![(1, 0), (2, 0), (2, 1), (2, 2)]);
    assert!(seen_running.get());
    assert!(!task.is_running());

    let stats = task.stats();
    assert_eq!(stats.passes_started, 2);
    assert_eq!(stats.passes_cancelled, 1);
    assert_eq!(stats.passes_completed, 1);
    assert_eq!(queue.pending(), 0);
}

#[test]
fn test_many_requests_coalesce_into_one_pass() {
    let queue = Rc::new(EventQueue::new());
    let (task, log) = recording_task(&queue, 2);

    for _ in 0..5 {
        let task = Rc::clone(&task);
        queue.post(move || task.run().unwrap());
    }

    task.run().unwrap();

    assert_eq!(*log.borrow(), vec![(1, 0), (1, 1), (2, 0), (2, 1)]);
    assert_eq!(task.stats().coalesced_requests, 5);
    assert!(!task.is_running());
}

#[test]
fn test_interrupt_without_rerun_goes_idle() {
    let queue = Rc::new(EventQueue::new());
    let (task, log) = recording_task(&queue, 4);

    {
        let task = Rc::clone(&task);
        queue.post(move || task.interrupt());
    }

    assert!(task.run().is_ok());
    assert_eq!(*log.borrow(), vec![(1, 0)]);
    assert!(!task.is_running());
}

#[test]
fn test_idle_interrupt_has_no_effect() {
    let queue = Rc::new(EventQueue::new());
    let (task, log) = recording_task(&queue, 2);

    task.interrupt();
    task.interrupt();
    assert!(!task.is_running());

    task.run().unwrap();
    assert_eq!(*log.borrow(), vec![(1, 0), (1, 1)]);
}

#[test]
fn test_restart_policy_abandons_current_pass() {
    let queue = Rc::new(EventQueue::new());
    let (task, log) = recording_task(&queue, 3);
    let task = Rc::new(
        Rc::try_unwrap(task)
            .expect("task is not shared yet")
            .with_policy(RerunPolicy::Restart),
    );

    {
        let task = Rc::clone(&task);
        queue.post(move || task.run().unwrap());
    }

    task.run().unwrap();

    assert_eq!(*log.borrow(), vec![(1, 0), (2, 0), (2, 1), (2, 2)]);
    assert_eq!(task.stats().passes_cancelled, 1);
}

#[test]
fn test_failure_propagates_and_resets() {
    let queue = Rc::new(EventQueue::new());
    let attempts = Rc::new(Cell::new(0));

    let counter = Rc::clone(&attempts);
    let task = CooperativeTask::new("failing", queue.clone(), move |cp: &Checkpoint<'_>| {
        counter.set(counter.get() + 1);
        cp.check()?;
        Err(TaskError::Failed(anyhow::anyhow!("disk on fire")))
    });

    let err = task.run().unwrap_err();
    assert!(err.to_string().contains("disk on fire"));
    assert!(!task.is_running());

    // The task is usable again afterwards
    assert!(task.run().is_err());
    assert_eq!(attempts.get(), 2);
    assert_eq!(task.stats().passes_failed, 2);
}
