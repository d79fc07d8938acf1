//! The promise state machine: status, settled value and the FIFO queue of
//! observers waiting on it.
//!
use crate::resolve::{resolve, RejectFn, ResolveFn, Resolution, Thenable};
use crate::schedule::Scheduler;
use crate::Error;
use log::{log_enabled, trace};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

/// A callback registered through [`Promise::then`]. Returning `Err` is the
/// equivalent of the handler raising: the continuation rejects with it.
pub type Handler<A, T, E> = Box<dyn FnOnce(A) -> Result<Resolution<T, E>, E>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Status {
    Pending,
    Fulfilled,
    Rejected,
}

#[derive(Clone)]
pub(crate) enum State<T, E> {
    Pending,
    Fulfilled(T),
    Rejected(E),
}

impl<T, E> State<T, E> {
    fn status(&self) -> Status {
        match self {
            State::Pending => Status::Pending,
            State::Fulfilled(_) => Status::Fulfilled,
            State::Rejected(_) => Status::Rejected,
        }
    }
}

struct Observer<T, E> {
    on_fulfilled: Option<Handler<T, T, E>>,
    on_rejected: Option<Handler<E, T, E>>,
    continuation: Promise<T, E>,
}

struct Inner<T, E> {
    state: State<T, E>,
    observers: VecDeque<Observer<T, E>>,
    scheduler: Scheduler,
}

/// A deferred value that settles at most once.
///
/// `Promise` is a handle; clones refer to the same state machine.
///
/// # Examples
///
/// ```
/// use promise_aplus::{Promise, TaskQueue};
/// use std::rc::Rc;
///
/// let queue = Rc::new(TaskQueue::new());
/// let seen = Rc::new(std::cell::Cell::new(0));
///
/// let promise = Promise::<i32, String>::new(queue.clone(), |fulfill, _reject| fulfill.call(7));
/// let sink = seen.clone();
/// promise.map(move |v| { sink.set(v); v });
///
/// // Handlers never run inline.
/// assert_eq!(seen.get(), 0);
/// queue.run_until_idle();
/// assert_eq!(seen.get(), 7);
/// ```
pub struct Promise<T, E> {
    inner: Rc<RefCell<Inner<T, E>>>,
}

impl<T, E> Clone for Promise<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T, E> fmt::Debug for Promise<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_borrow() {
            Ok(inner) => f
                .debug_struct("Promise")
                .field("status", &inner.state.status())
                .field("observers", &inner.observers.len())
                .finish(),
            Err(_) => f.debug_struct("Promise").finish_non_exhaustive(),
        }
    }
}

impl<T, E> Promise<T, E> {
    /// Returns true when both handles refer to the same promise.
    pub fn ptr_eq(&self, other: &Promise<T, E>) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn scheduler(&self) -> Scheduler {
        self.inner.borrow().scheduler.clone()
    }
}

impl<T, E> Promise<T, E>
where
    T: Clone + 'static,
    E: Clone + From<Error> + 'static,
{
    /// Creates a promise and synchronously runs `producer` with the two
    /// capabilities that settle it.
    ///
    /// The producer is not guarded: a panic inside it unwinds straight
    /// through `new`.
    pub fn new<P>(scheduler: Scheduler, producer: P) -> Self
    where
        P: FnOnce(Fulfill<T, E>, Reject<T, E>),
    {
        let promise = Self::pending(scheduler);
        producer(
            Fulfill {
                promise: promise.clone(),
            },
            Reject {
                promise: promise.clone(),
            },
        );
        promise
    }

    /// Like [`Promise::new`] for producers that can fail.
    ///
    /// A producer error is handed back to the caller as is. The promise is
    /// not rejected with it, and it is no longer reachable through the return
    /// value. Capabilities the producer stored elsewhere still settle it.
    pub fn try_new<P, X>(scheduler: Scheduler, producer: P) -> Result<Self, X>
    where
        P: FnOnce(Fulfill<T, E>, Reject<T, E>) -> Result<(), X>,
    {
        let promise = Self::pending(scheduler);
        producer(
            Fulfill {
                promise: promise.clone(),
            },
            Reject {
                promise: promise.clone(),
            },
        )?;
        Ok(promise)
    }

    /// A promise that adopts the outcome of `value`, or is fulfilled with it
    /// right away when it is a plain value.
    pub fn resolved_with(scheduler: Scheduler, value: Resolution<T, E>) -> Self {
        let promise = Self::pending(scheduler);
        resolve(&promise, value);
        promise
    }

    /// A promise that is already rejected with `reason`.
    pub fn rejected_with(scheduler: Scheduler, reason: E) -> Self {
        Self::new(scheduler, |_, reject| reject.call(reason))
    }

    /// Registers handlers for the outcome and returns the continuation.
    ///
    /// A missing handler passes the parent's outcome through unchanged.
    /// Supplied handlers run on a later turn of the scheduler, even when
    /// this promise is already settled, and their result settles the
    /// continuation through [`resolve`].
    pub fn then(
        &self,
        on_fulfilled: Option<Handler<T, T, E>>,
        on_rejected: Option<Handler<E, T, E>>,
    ) -> Promise<T, E> {
        let continuation = Self::new(self.scheduler(), |_, _| {});
        self.inner.borrow_mut().observers.push_back(Observer {
            on_fulfilled,
            on_rejected,
            continuation: continuation.clone(),
        });
        self.dispatch();
        continuation
    }

    /// Registers only a fulfillment handler; rejections pass through.
    pub fn and_then<F>(&self, on_fulfilled: F) -> Promise<T, E>
    where
        F: FnOnce(T) -> Result<Resolution<T, E>, E> + 'static,
    {
        self.then(Some(Box::new(on_fulfilled)), None)
    }

    /// Registers only a rejection handler; fulfillments pass through.
    pub fn or_else<R>(&self, on_rejected: R) -> Promise<T, E>
    where
        R: FnOnce(E) -> Result<Resolution<T, E>, E> + 'static,
    {
        self.then(None, Some(Box::new(on_rejected)))
    }

    /// Fulfillment handler that cannot fail and never returns a thenable.
    pub fn map<F>(&self, op: F) -> Promise<T, E>
    where
        F: FnOnce(T) -> T + 'static,
    {
        self.and_then(move |value| Ok(Resolution::Value(op(value))))
    }

    pub(crate) fn pending(scheduler: Scheduler) -> Self {
        Promise {
            inner: Rc::new(RefCell::new(Inner {
                state: State::Pending,
                observers: VecDeque::new(),
                scheduler,
            })),
        }
    }

    pub(crate) fn fulfill(&self, value: T) {
        self.transition(State::Fulfilled(value));
    }

    pub(crate) fn reject(&self, reason: E) {
        self.transition(State::Rejected(reason));
    }

    fn transition(&self, state: State<T, E>) {
        let mut stack = Vec::new();
        self.settle(state, &mut stack);
        Self::notify_all(stack);
    }

    fn dispatch(&self) {
        let mut stack = Vec::new();
        self.drain_into(&mut stack);
        Self::notify_all(stack);
    }

    // The only place the state changes.
    fn settle(&self, state: State<T, E>, stack: &mut Vec<(Observer<T, E>, State<T, E>)>) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.state.status() != Status::Pending {
                return;
            }
            if log_enabled!(log::Level::Trace) {
                trace!(
                    "promise {:p} settled {:?} with {} observers waiting",
                    Rc::as_ptr(&self.inner),
                    state.status(),
                    inner.observers.len()
                );
            }
            inner.state = state;
        }
        self.drain_into(stack);
    }

    // Pushes the observers in reverse, so the first registered is popped first.
    fn drain_into(&self, stack: &mut Vec<(Observer<T, E>, State<T, E>)>) {
        let mut inner = self.inner.borrow_mut();
        if inner.state.status() == Status::Pending || inner.observers.is_empty() {
            return;
        }
        trace!(
            "promise {:p} dispatching {} observers",
            Rc::as_ptr(&self.inner),
            inner.observers.len()
        );
        let state = inner.state.clone();
        stack.extend(
            inner
                .observers
                .drain(..)
                .rev()
                .map(|observer| (observer, state.clone())),
        );
    }

    // Pass-through continuations settle from this loop, never recursively.
    // Observers pop one at a time, depth first, in registration order.
    fn notify_all(mut stack: Vec<(Observer<T, E>, State<T, E>)>) {
        while let Some((observer, state)) = stack.pop() {
            if let Some((continuation, state)) = observer.notify(state) {
                continuation.settle(state, &mut stack);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn outcome(&self) -> Option<Result<T, E>> {
        match &self.inner.borrow().state {
            State::Pending => None,
            State::Fulfilled(value) => Some(Ok(value.clone())),
            State::Rejected(reason) => Some(Err(reason.clone())),
        }
    }
}

impl<T, E> Observer<T, E>
where
    T: Clone + 'static,
    E: Clone + From<Error> + 'static,
{
    /// Schedules the matching handler, or hands back the continuation and
    /// state to pass through when there is none.
    fn notify(self, state: State<T, E>) -> Option<(Promise<T, E>, State<T, E>)> {
        let Observer {
            on_fulfilled,
            on_rejected,
            continuation,
        } = self;
        match state {
            State::Pending => None,
            State::Fulfilled(value) => match on_fulfilled {
                Some(handler) => {
                    run_later(handler, value, continuation);
                    None
                }
                None => Some((continuation, State::Fulfilled(value))),
            },
            State::Rejected(reason) => match on_rejected {
                Some(handler) => {
                    run_later(handler, reason, continuation);
                    None
                }
                None => Some((continuation, State::Rejected(reason))),
            },
        }
    }
}

fn run_later<A, T, E>(
    handler: Handler<A, T, E>,
    arg: A,
    continuation: Promise<T, E>,
) where
    A: 'static,
    T: Clone + 'static,
    E: Clone + From<Error> + 'static,
{
    trace!("scheduling handler for {:p}", Rc::as_ptr(&continuation.inner));
    let scheduler = continuation.scheduler();
    scheduler.schedule(Box::new(move || match handler(arg) {
        Ok(x) => resolve(&continuation, x),
        Err(reason) => continuation.reject(reason),
    }));
}

/// Settles its promise as fulfilled. Only the first call across this and the
/// matching [`Reject`] has any effect.
pub struct Fulfill<T, E> {
    promise: Promise<T, E>,
}

/// Settles its promise as rejected. Only the first call across this and the
/// matching [`Fulfill`] has any effect.
pub struct Reject<T, E> {
    promise: Promise<T, E>,
}

impl<T, E> Clone for Fulfill<T, E> {
    fn clone(&self) -> Self {
        Fulfill {
            promise: self.promise.clone(),
        }
    }
}

impl<T, E> Clone for Reject<T, E> {
    fn clone(&self) -> Self {
        Reject {
            promise: self.promise.clone(),
        }
    }
}

impl<T, E> Fulfill<T, E>
where
    T: Clone + 'static,
    E: Clone + From<Error> + 'static,
{
    pub fn call(&self, value: T) {
        self.promise.fulfill(value);
    }
}

impl<T, E> Reject<T, E>
where
    T: Clone + 'static,
    E: Clone + From<Error> + 'static,
{
    pub fn call(&self, reason: E) {
        self.promise.reject(reason);
    }
}

impl<T, E> Thenable<T, E> for Promise<T, E>
where
    T: Clone + 'static,
    E: Clone + From<Error> + 'static,
{
    fn then(&self, resolve: ResolveFn<T, E>, reject: RejectFn<E>) -> Result<(), E> {
        Promise::then(
            self,
            Some(Box::new(move |value: T| {
                resolve(Resolution::Value(value.clone()));
                Ok(Resolution::Value(value))
            })),
            Some(Box::new(move |reason: E| {
                reject(reason.clone());
                Err(reason)
            })),
        );
        Ok(())
    }
}
