// EventQueue - the single-threaded host loop the controller runs on
//
// UI callbacks (or the CLI driver) post closures here. The queue is also the
// HostLoop of every CooperativeTask: a checkpoint inside a long-running pass
// calls process_events(), so callbacks posted by the user run in the middle
// of the pass, on the same thread, and may call back into the controller.

use crate::task::HostLoop;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

type Callback = Box<dyn FnOnce()>;

/// FIFO of pending callbacks, drained at cooperative yields
///
/// # Example
/// ```ignore
/// let queue = Rc::new(EventQueue::new());
/// let controller = Controller::new(queue.clone(), ...);
///
/// let c = controller.clone();
/// queue.post(move || c.move_up());
/// queue.run_until_idle();
/// ```
#[derive(Default)]
pub struct EventQueue {
    pending: RefCell<VecDeque<Callback>>,

    /// Number of callbacks executed so far
    dispatched: Cell<u64>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a callback for the next yield
    pub fn post<F>(&self, callback: F)
    where
        F: FnOnce() + 'static,
    {
        self.pending.borrow_mut().push_back(Box::new(callback));
    }

    /// Number of callbacks waiting
    pub fn pending(&self) -> usize {
        self.pending.borrow().len()
    }

    pub fn dispatched(&self) -> u64 {
        self.dispatched.get()
    }

    /// Drain the queue completely, including callbacks posted while draining
    ///
    /// # Returns
    /// The number of callbacks executed
    pub fn run_until_idle(&self) -> usize {
        let mut executed = 0;
        while let Some(callback) = self.pop() {
            self.dispatch(callback);
            executed += 1;
        }
        executed
    }

    fn pop(&self) -> Option<Callback> {
        self.pending.borrow_mut().pop_front()
    }

    fn dispatch(&self, callback: Callback) {
        // The queue borrow is released before the callback runs, so it can post
        callback();
        self.dispatched.set(self.dispatched.get() + 1);
    }
}

impl HostLoop for EventQueue {
    /// Run the callbacks that were pending when the yield started.
    ///
    /// Callbacks posted by those callbacks wait for the next yield, so a
    /// checkpoint always returns.
    fn process_events(&self) {
        let batch = self.pending();
        for _ in 0..batch {
            let Some(callback) = self.pop() else {
                break;
            };
            self.dispatch(callback);
        }
    }
}

impl std::fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventQueue")
            .field("pending", &self.pending())
            .field("dispatched", &self.dispatched())
            .finish()
    }
}
