//! The one capability a promise needs from its host: run this later.
//!
use futures::executor::LocalSpawner;
use futures::task::LocalSpawnExt;
use log::warn;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce()>;

/// Queues a task to run on a later turn of the same thread, after the tasks
/// queued before it.
pub trait Schedule {
    fn schedule(&self, task: Task);
}

/// The scheduler a promise and its continuations share.
pub type Scheduler = Rc<dyn Schedule>;

/// A FIFO of tasks that the host drains by hand.
///
/// # Examples
///
/// ```
/// use promise_aplus::{Schedule, TaskQueue};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let queue = TaskQueue::new();
/// let hits = Rc::new(Cell::new(0));
/// let h = hits.clone();
/// queue.schedule(Box::new(move || h.set(h.get() + 1)));
/// assert_eq!(hits.get(), 0);
/// assert_eq!(queue.run_until_idle(), 1);
/// assert_eq!(hits.get(), 1);
/// ```
#[derive(Default)]
pub struct TaskQueue {
    tasks: RefCell<VecDeque<Task>>,
}

impl TaskQueue {
    /// An empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tasks waiting to run.
    pub fn len(&self) -> usize {
        self.tasks.borrow().len()
    }

    /// True when no task is waiting.
    pub fn is_empty(&self) -> bool {
        self.tasks.borrow().is_empty()
    }

    /// Runs the oldest task, if any. Returns whether one ran.
    pub fn run_once(&self) -> bool {
        // Release the borrow first, the task may schedule more work.
        let task = self.tasks.borrow_mut().pop_front();
        match task {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Runs tasks until the queue is empty, including the ones scheduled
    /// along the way. Returns how many ran.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while self.run_once() {
            ran += 1;
        }
        ran
    }
}

impl Schedule for TaskQueue {
    fn schedule(&self, task: Task) {
        self.tasks.borrow_mut().push_back(task);
    }
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue")
            .field("pending", &self.len())
            .finish()
    }
}

/// Runs each task as a local future on the spawner's `LocalPool`, which
/// polls new tasks in spawn order.
impl Schedule for LocalSpawner {
    fn schedule(&self, task: Task) {
        if let Err(err) = self.spawn_local(async move { task() }) {
            warn!("dropping promise task, spawner unavailable: {}", err);
        }
    }
}
