//! Promises/A+ style deferred values for a single logical thread.
//!
//! A [`Promise`] settles at most once, to either a fulfillment value or a
//! rejection reason. Handlers registered with [`Promise::then`] always run on
//! a later turn of the injected [`Schedule`], in registration order, and
//! whatever they return is flattened through [`resolve`].
//!
//! # Examples
//!
//! ```
//! use futures::executor::LocalPool;
//! use promise_aplus::{Promise, Resolution};
//! use std::rc::Rc;
//!
//! let mut pool = LocalPool::new();
//! let answer = Promise::<i32, String>::resolved_with(Rc::new(pool.spawner()), Resolution::Value(42))
//!     .map(|v| v + 1);
//! assert_eq!(pool.run_until(answer.settled()), Ok(43));
//! ```
pub mod promise;
pub mod resolve;
pub mod schedule;
pub mod settled;

pub use promise::{Fulfill, Handler, Promise, Reject};
pub use resolve::{resolve, RejectFn, ResolveFn, Resolution, Thenable};
pub use schedule::{Schedule, Scheduler, Task, TaskQueue};
pub use settled::Settled;

use thiserror::Error;

/// Reasons this crate synthesizes on its own.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("TypeError: a promise cannot be resolved with itself")]
    ChainingCycle,
    #[error("promise registration dropped before settlement")]
    Abandoned,
}

impl From<Error> for String {
    fn from(err: Error) -> Self {
        err.to_string()
    }
}
