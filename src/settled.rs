//! Awaiting a promise from async Rust.
//!
use crate::{Error, Promise, Resolution};
use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

/// Resolves to the promise's outcome once the scheduler has delivered it.
///
/// # Examples
///
/// ```
/// use futures::executor::LocalPool;
/// use promise_aplus::{Promise, Resolution};
/// use std::rc::Rc;
///
/// let mut pool = LocalPool::new();
/// let promise = Promise::<i32, String>::resolved_with(Rc::new(pool.spawner()), Resolution::Value(42))
///     .map(|v| v + 1);
/// assert_eq!(pool.run_until(promise.settled()), Ok(43));
/// ```
#[derive(Debug)]
pub struct Settled<T, E> {
    inner: Rc<RefCell<Inner<T, E>>>,
}

#[derive(Debug)]
enum WakerState {
    Fresh,
    Tainted,
}

#[derive(Debug)]
struct Inner<T, E> {
    value: Option<Result<T, E>>,
    waker: Result<Waker, WakerState>,
}

/// The sending half, owned by the handlers registered on the promise.
struct Notifier<T, E> {
    inner: Rc<RefCell<Inner<T, E>>>,
}

impl<T, E> Notifier<T, E> {
    fn deliver(&self, outcome: Result<T, E>) {
        let waker = {
            let mut inner = self.inner.borrow_mut();
            inner.value = Some(outcome);
            std::mem::replace(&mut inner.waker, Err(WakerState::Tainted))
        };
        if let Ok(waker) = waker {
            waker.wake()
        }
    }
}

impl<T, E> Drop for Notifier<T, E> {
    /// If the outcome never arrived, wake the waiter with an error.
    fn drop(&mut self) {
        let waker = std::mem::replace(&mut self.inner.borrow_mut().waker, Err(WakerState::Tainted));
        if let Ok(waker) = waker {
            waker.wake()
        }
    }
}

impl<T, E> Promise<T, E>
where
    T: Clone + 'static,
    E: Clone + From<Error> + 'static,
{
    /// Returns a future for this promise's outcome.
    ///
    /// Delivery goes through [`Promise::then`], so it happens on a later
    /// turn of the scheduler like any other handler. If the scheduler drops
    /// that turn, or the promise is dropped unsettled, the future resolves to
    /// [`Error::Abandoned`].
    pub fn settled(&self) -> Settled<T, E> {
        let inner = Rc::new(RefCell::new(Inner {
            value: None,
            waker: Err(WakerState::Fresh),
        }));
        let on_fulfilled = Rc::new(Notifier {
            inner: inner.clone(),
        });
        let on_rejected = on_fulfilled.clone();
        self.then(
            Some(Box::new(move |value: T| {
                on_fulfilled.deliver(Ok(value.clone()));
                Ok(Resolution::Value(value))
            })),
            Some(Box::new(move |reason: E| {
                on_rejected.deliver(Err(reason.clone()));
                Err(reason)
            })),
        );
        Settled { inner }
    }
}

impl<T, E> Future for Settled<T, E>
where
    E: From<Error>,
{
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut inner = self.inner.borrow_mut();
        match inner.value.take() {
            Some(value) => Poll::Ready(value),
            None => match std::mem::replace(&mut inner.waker, Ok(cx.waker().clone())) {
                Err(WakerState::Tainted) => Poll::Ready(Err(E::from(Error::Abandoned))),
                _ => Poll::Pending,
            },
        }
    }
}
