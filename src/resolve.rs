//! Settling a promise from an arbitrary value, unwrapping nested promises and
//! thenables along the way.
use crate::promise::Promise;
use crate::Error;
use log::debug;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// Hands a value back to the promise being resolved. It may itself be
/// another promise or thenable.
pub type ResolveFn<T, E> = Rc<dyn Fn(Resolution<T, E>)>;

/// Rejects the promise being resolved.
pub type RejectFn<E> = Rc<dyn Fn(E)>;

/// Anything exposing a callable `then(resolve, reject)`.
///
/// An `Err` return stands for `then` raising, whether while it was being
/// looked up or while it ran.
pub trait Thenable<T, E> {
    fn then(&self, resolve: ResolveFn<T, E>, reject: RejectFn<E>) -> Result<(), E>;
}

/// What a promise can be resolved with.
///
/// A structured value without a callable `then` is a `Value`.
pub enum Resolution<T, E> {
    Value(T),
    Promise(Promise<T, E>),
    Thenable(Rc<dyn Thenable<T, E>>),
}

impl<T, E> From<Promise<T, E>> for Resolution<T, E> {
    fn from(promise: Promise<T, E>) -> Self {
        Resolution::Promise(promise)
    }
}

impl<T: fmt::Debug, E> fmt::Debug for Resolution<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Resolution::Promise(promise) => f.debug_tuple("Promise").field(promise).finish(),
            Resolution::Thenable(_) => f.write_str("Thenable(..)"),
        }
    }
}

/// Settles `target` from `x`.
///
/// - `target` itself: rejected with [`Error::ChainingCycle`].
/// - another promise: `target` follows its outcome.
/// - a thenable: its `then` is invoked with callbacks that settle `target`,
///   of which only the first call counts.
/// - a plain value: `target` is fulfilled with it.
pub fn resolve<T, E>(target: &Promise<T, E>, x: Resolution<T, E>)
where
    T: Clone + 'static,
    E: Clone + From<Error> + 'static,
{
    match x {
        Resolution::Promise(promise) if promise.ptr_eq(target) => {
            debug!("promise resolved with itself, rejecting");
            target.reject(E::from(Error::ChainingCycle));
        }
        Resolution::Promise(promise) => adopt(target, &promise),
        Resolution::Thenable(thenable) => follow(target, thenable.as_ref()),
        Resolution::Value(value) => target.fulfill(value),
    }
}

fn adopt<T, E>(target: &Promise<T, E>, source: &Promise<T, E>)
where
    T: Clone + 'static,
    E: Clone + From<Error> + 'static,
{
    let on_fulfilled = target.clone();
    let on_rejected = target.clone();
    source.then(
        Some(Box::new(move |value: T| {
            on_fulfilled.fulfill(value.clone());
            Ok(Resolution::Value(value))
        })),
        Some(Box::new(move |reason: E| {
            on_rejected.reject(reason.clone());
            Err(reason)
        })),
    );
}

fn follow<T, E>(target: &Promise<T, E>, thenable: &dyn Thenable<T, E>)
where
    T: Clone + 'static,
    E: Clone + From<Error> + 'static,
{
    // Shared by both callbacks; set before either acts.
    let called = Rc::new(Cell::new(false));

    let on_resolve: ResolveFn<T, E> = {
        let called = called.clone();
        let target = target.clone();
        Rc::new(move |y| {
            if !called.replace(true) {
                resolve(&target, y);
            }
        })
    };
    let on_reject: RejectFn<E> = {
        let called = called.clone();
        let target = target.clone();
        Rc::new(move |reason| {
            if !called.replace(true) {
                target.reject(reason);
            }
        })
    };

    if let Err(reason) = thenable.then(on_resolve, on_reject) {
        if called.replace(true) {
            debug!("thenable failed after settling its promise, ignoring");
        } else {
            target.reject(reason);
        }
    }
}
