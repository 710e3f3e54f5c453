use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use crate::error::DriverError;

/// Result type carried by an [`Activity`]. The error is `Arc`-wrapped
/// so it can be handed to both a blocking waiter and a completion
/// callback without requiring `DriverError: Clone`.
pub type ActivityResult<T> = std::result::Result<T, Arc<DriverError>>;

enum State<T> {
    Pending(Option<Box<dyn FnOnce(ActivityResult<T>) + Send>>),
    Done(ActivityResult<T>),
}

struct Inner<T> {
    state: Mutex<State<T>>,
    condvar: Condvar,
    cancellation_requested: AtomicBool,
}

/// A one-shot completion handle for an asynchronous workflow. Created
/// pending, transitions exactly once to a terminal state. Completion
/// can be observed by blocking on [`Activity::wait`] or by registering
/// a single callback with [`Activity::on_complete`] — registering after
/// completion fires the callback immediately on the calling thread.
pub struct Activity<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Activity<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// The producer-side half of an [`Activity`], held by whatever task is
/// actually running the workflow. Not exposed outside the crate — the
/// public API only ever hands out the consumer half.
pub(crate) struct ActivityCompleter<T> {
    inner: Arc<Inner<T>>,
}

pub(crate) fn new_activity<T>() -> (Activity<T>, ActivityCompleter<T>) {
    let inner = Arc::new(Inner {
        state: Mutex::new(State::Pending(None)),
        condvar: Condvar::new(),
        cancellation_requested: AtomicBool::new(false),
    });
    (
        Activity {
            inner: inner.clone(),
        },
        ActivityCompleter { inner },
    )
}

impl<T> Activity<T> {
    pub fn is_done(&self) -> bool {
        matches!(*self.inner.state.lock().unwrap(), State::Done(_))
    }

    /// Request cancellation. Non-blocking; the workflow observes this
    /// only at finger-presence polling boundaries.
    pub fn cancel(&self) {
        self.inner.cancellation_requested.store(true, Ordering::SeqCst);
    }

    pub fn cancellation_requested(&self) -> bool {
        self.inner.cancellation_requested.load(Ordering::SeqCst)
    }

    /// Block the calling thread until the activity reaches a terminal
    /// state.
    pub fn wait(self) -> ActivityResult<T> {
        let mut guard = self.inner.state.lock().unwrap();
        loop {
            match &*guard {
                State::Done(_) => {
                    break;
                }
                State::Pending(_) => {
                    guard = self.inner.condvar.wait(guard).unwrap();
                }
            }
        }
        match std::mem::replace(&mut *guard, State::Done(Err(Arc::new(stale_error())))) {
            State::Done(result) => result,
            State::Pending(_) => unreachable!("checked Done above"),
        }
    }

    /// Register the activity's single completion callback. If the
    /// activity has already completed, the callback runs immediately.
    pub fn on_complete<F>(&self, callback: F)
    where
        F: FnOnce(ActivityResult<T>) + Send + 'static,
    {
        let mut guard = self.inner.state.lock().unwrap();
        match &mut *guard {
            State::Done(_) => {
                let result = match std::mem::replace(&mut *guard, State::Done(Err(Arc::new(stale_error())))) {
                    State::Done(result) => result,
                    State::Pending(_) => unreachable!(),
                };
                drop(guard);
                callback(result);
            }
            State::Pending(slot) => {
                *slot = Some(Box::new(callback));
            }
        }
    }
}

impl<T> ActivityCompleter<T> {
    /// Transition to the terminal state. Panics if called twice — a
    /// single terminal transition is the contract this type exists to
    /// enforce.
    ///
    /// If a callback was already registered via `on_complete`, `result`
    /// goes straight to it and the stored state becomes a stale
    /// placeholder (a later `wait()` on another clone would otherwise
    /// have nothing real to return); if no callback is registered yet,
    /// `result` is stored directly so `wait()`/`on_complete()` can pick
    /// it up later.
    pub(crate) fn complete(self, result: ActivityResult<T>) {
        let mut guard = self.inner.state.lock().unwrap();
        let callback = match &mut *guard {
            State::Pending(callback) => callback.take(),
            State::Done(_) => panic!("Activity completed twice"),
        };
        match callback {
            Some(callback) => {
                *guard = State::Done(Err(Arc::new(stale_error())));
                drop(guard);
                self.inner.condvar.notify_all();
                callback(result);
            }
            None => {
                *guard = State::Done(result);
                drop(guard);
                self.inner.condvar.notify_all();
            }
        }
    }

    pub(crate) fn cancellation_requested(&self) -> bool {
        self.inner.cancellation_requested.load(Ordering::SeqCst)
    }
}

fn stale_error() -> DriverError {
    DriverError::Sensor(crate::error::SensorError::Cancelled)
}
