#[cfg(test)]
mod tests {
    use futures::executor::{block_on, LocalPool};
    use futures::FutureExt;
    use promise_aplus::{
        Error, Promise, RejectFn, Resolution, ResolveFn, Schedule, TaskQueue, Thenable,
    };
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    type P = Promise<usize, String>;

    struct Nested {
        depth: usize,
        value: usize,
    }

    impl Thenable<usize, String> for Nested {
        fn then(&self, resolve: ResolveFn<usize, String>, _: RejectFn<String>) -> Result<(), String> {
            if self.depth == 0 {
                resolve(Resolution::Value(self.value));
            } else {
                resolve(Resolution::Thenable(Rc::new(Nested {
                    depth: self.depth - 1,
                    value: self.value,
                })));
            }
            Ok(())
        }
    }

    /// Calls both callbacks, in the configured order, twice over.
    struct Fickle {
        reject_first: bool,
    }

    impl Thenable<usize, String> for Fickle {
        fn then(&self, resolve: ResolveFn<usize, String>, reject: RejectFn<String>) -> Result<(), String> {
            for _ in 0..2 {
                if self.reject_first {
                    reject("rejected".into());
                    resolve(Resolution::Value(1));
                } else {
                    resolve(Resolution::Value(1));
                    reject("rejected".into());
                }
            }
            Ok(())
        }
    }

    #[test]
    fn test_scenario_resolved_then_increment() {
        let mut pool = LocalPool::new();
        let promise = P::resolved_with(Rc::new(pool.spawner()), Resolution::Value(42)).map(|v| v + 1);
        assert_eq!(pool.run_until(promise.settled()), Ok(43));
    }

    #[test]
    fn test_scenario_rejected_then_recover() {
        let mut pool = LocalPool::new();
        let promise = P::rejected_with(Rc::new(pool.spawner()), "boom".into())
            .then(None, Some(Box::new(|r: String| Ok(Resolution::Value(r.len())))));
        assert_eq!(pool.run_until(promise.settled()), Ok(4));
    }

    #[test]
    fn test_scenario_handler_error_rejects() {
        let mut pool = LocalPool::new();
        let promise = P::resolved_with(Rc::new(pool.spawner()), Resolution::Value(0))
            .and_then(|_| Err("x".to_string()));
        assert_eq!(pool.run_until(promise.settled()), Err("x".to_string()));
    }

    #[test]
    fn test_scenario_adopt_late_rejection() {
        let queue = Rc::new(TaskQueue::new());
        let stash = Rc::new(RefCell::new(None));
        let slot = stash.clone();
        let late = P::new(queue.clone(), move |_, reject| {
            *slot.borrow_mut() = Some(reject);
        });
        let outer = P::resolved_with(queue.clone(), Resolution::Promise(late));
        let settled = outer.settled();

        queue.run_until_idle();
        stash.borrow_mut().take().unwrap().call("late".into());
        queue.run_until_idle();
        assert_eq!(block_on(settled), Err("late".to_string()));
    }

    #[test]
    fn test_settles_once_from_producer() {
        let queue = Rc::new(TaskQueue::new());
        let promise = P::new(queue.clone(), |fulfill, reject| {
            fulfill.call(1);
            fulfill.call(2);
            reject.call("no".into());
        });
        let settled = promise.settled();
        queue.run_until_idle();
        assert_eq!(settled.now_or_never(), Some(Ok(1)));
    }

    #[test]
    fn test_fifo_dispatch_across_chains() {
        let queue = Rc::new(TaskQueue::new());
        let order = Rc::new(RefCell::new(Vec::new()));
        let stash = Rc::new(RefCell::new(None));
        let slot = stash.clone();
        let promise = P::new(queue.clone(), move |_, reject| {
            *slot.borrow_mut() = Some(reject);
        });
        for i in 0..4 {
            let order = order.clone();
            promise.or_else(move |_| {
                order.borrow_mut().push(i);
                Ok(Resolution::Value(i))
            });
        }
        stash.borrow_mut().take().unwrap().call("go".into());
        queue.run_until_idle();
        assert_eq!(*order.borrow(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_then_on_settled_promise_never_runs_inline() {
        let queue = Rc::new(TaskQueue::new());
        let ran = Rc::new(Cell::new(false));
        let flag = ran.clone();
        let promise = P::rejected_with(queue.clone(), "done".into());
        promise.or_else(move |_| {
            flag.set(true);
            Ok(Resolution::Value(0))
        });
        assert!(!ran.get());
        assert!(queue.run_once());
        assert!(ran.get());
    }

    #[test]
    fn test_pass_through_both_ways() {
        let queue = Rc::new(TaskQueue::new());
        let ok = P::resolved_with(queue.clone(), Resolution::Value(3)).then(None, None);
        let err = P::rejected_with(queue.clone(), "e".into()).then(None, None).then(None, None);
        let ok = ok.settled();
        let err = err.settled();
        queue.run_until_idle();
        assert_eq!(ok.now_or_never(), Some(Ok(3)));
        assert_eq!(err.now_or_never(), Some(Err("e".to_string())));
    }

    #[test]
    fn test_returning_own_continuation_rejects() {
        let queue = Rc::new(TaskQueue::new());
        let slot: Rc<RefCell<Option<P>>> = Rc::new(RefCell::new(None));
        let me = slot.clone();
        let next = P::resolved_with(queue.clone(), Resolution::Value(1))
            .and_then(move |_| {
                let me = me.borrow_mut().take().unwrap();
                Ok(Resolution::Promise(me))
            });
        *slot.borrow_mut() = Some(next.clone());
        let settled = next.settled();
        queue.run_until_idle();
        assert_eq!(
            settled.now_or_never(),
            Some(Err(Error::ChainingCycle.to_string()))
        );
    }

    #[test]
    fn test_nested_thenables_flatten_to_value() {
        let queue = Rc::new(TaskQueue::new());
        let promise = P::resolved_with(
            queue.clone(),
            Resolution::Thenable(Rc::new(Nested { depth: 2, value: 11 })),
        );
        let doubled = promise.map(|v| v * 2);
        let settled = doubled.settled();
        queue.run_until_idle();
        assert_eq!(settled.now_or_never(), Some(Ok(22)));
    }

    #[test]
    fn test_handler_returning_thenable_is_unwrapped() {
        let queue = Rc::new(TaskQueue::new());
        let promise = P::resolved_with(queue.clone(), Resolution::Value(5)).and_then(|v| {
            Ok(Resolution::Thenable(Rc::new(Nested { depth: 1, value: v + 1 })))
        });
        let settled = promise.settled();
        queue.run_until_idle();
        assert_eq!(settled.now_or_never(), Some(Ok(6)));
    }

    #[test]
    fn test_fickle_thenable_settles_by_first_call() {
        let queue = Rc::new(TaskQueue::new());
        let resolved = P::resolved_with(
            queue.clone(),
            Resolution::Thenable(Rc::new(Fickle { reject_first: false })),
        )
        .settled();
        let rejected = P::resolved_with(
            queue.clone(),
            Resolution::Thenable(Rc::new(Fickle { reject_first: true })),
        )
        .settled();
        queue.run_until_idle();
        assert_eq!(resolved.now_or_never(), Some(Ok(1)));
        assert_eq!(rejected.now_or_never(), Some(Err("rejected".to_string())));
    }

    #[test]
    fn test_custom_scheduler_sees_every_handler() {
        #[derive(Default)]
        struct Counting {
            queue: TaskQueue,
            scheduled: Cell<usize>,
        }

        impl Schedule for Counting {
            fn schedule(&self, task: promise_aplus::Task) {
                self.scheduled.set(self.scheduled.get() + 1);
                self.queue.schedule(task);
            }
        }

        let host = Rc::new(Counting::default());
        let promise = P::resolved_with(host.clone(), Resolution::Value(1))
            .map(|v| v + 1)
            .then(None, None)
            .map(|v| v + 1);
        let settled = promise.settled();
        host.queue.run_until_idle();
        assert_eq!(host.scheduled.get(), 3);
        assert_eq!(settled.now_or_never(), Some(Ok(3)));
    }
}
