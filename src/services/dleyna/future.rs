use std::{
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use parking_lot::{Condvar, Mutex};

use super::CallError;

/// Success callback handed to a callback-style call
pub type OnReply<T> = Box<dyn FnOnce(T) + Send>;

/// Failure callback handed to a callback-style call
pub type OnError = Box<dyn FnOnce(CallError) + Send>;

enum Slot<T> {
    Pending,
    Done(Result<T, CallError>),
}

/// Resolution that is computed on demand by the first reader.
///
/// Hands itself back when `timeout` expires first so a later read can retry.
trait Deferred<T>: Send {
    fn resolve(
        self: Box<Self>,
        timeout: Option<Duration>,
    ) -> Result<Result<T, CallError>, Box<dyn Deferred<T>>>;
}

struct Chained<T, F> {
    base: RemoteCallFuture<T>,
    transform: F,
}

impl<T, U, F> Deferred<U> for Chained<T, F>
where
    T: Clone + Send + 'static,
    U: Send + 'static,
    F: FnOnce(T) -> Result<U, CallError> + Send + 'static,
{
    fn resolve(
        self: Box<Self>,
        timeout: Option<Duration>,
    ) -> Result<Result<U, CallError>, Box<dyn Deferred<U>>> {
        match self.base.get(timeout) {
            Ok(value) => Ok((self.transform)(value)),
            Err(CallError::Timeout(_)) if !self.base.is_ready() => Err(self),
            Err(error) => Ok(Err(error)),
        }
    }
}

struct Cell<T> {
    slot: Mutex<Slot<T>>,
    resolved: Condvar,
    deferred: Mutex<Option<Box<dyn Deferred<T>>>>,
}

impl<T> Cell<T> {
    fn new(slot: Slot<T>) -> Self {
        Self {
            slot: Mutex::new(slot),
            resolved: Condvar::new(),
            deferred: Mutex::new(None),
        }
    }

    /// Store the outcome. Returns `false` if the cell was already resolved.
    fn complete(&self, result: Result<T, CallError>) -> bool {
        let mut slot = self.slot.lock();
        if matches!(*slot, Slot::Done(_)) {
            return false;
        }
        *slot = Slot::Done(result);
        self.resolved.notify_all();
        true
    }
}

/// Single-assignment result of a remote call
///
/// Created pending when a call is issued, resolved exactly once from the
/// dispatch thread, and read by blocking on [`get`](Self::get). Clones are
/// handles onto the same result.
pub struct RemoteCallFuture<T> {
    cell: Arc<Cell<T>>,
}

impl<T> Clone for RemoteCallFuture<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T> fmt::Debug for RemoteCallFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.cell.slot.lock() {
            Slot::Pending => "pending",
            Slot::Done(Ok(_)) => "resolved",
            Slot::Done(Err(_)) => "failed",
        };
        f.debug_struct("RemoteCallFuture")
            .field("state", &state)
            .finish()
    }
}

impl<T: Send + 'static> RemoteCallFuture<T> {
    /// Create an unresolved future together with the handle that resolves it
    pub fn pending() -> (Completer<T>, Self) {
        let cell = Arc::new(Cell::new(Slot::Pending));
        let completer = Completer {
            cell: Some(Arc::clone(&cell)),
        };
        (completer, Self { cell })
    }

    /// An already resolved future
    pub fn from_value(value: T) -> Self {
        Self {
            cell: Arc::new(Cell::new(Slot::Done(Ok(value)))),
        }
    }

    /// An already failed future
    pub fn from_error(error: CallError) -> Self {
        Self {
            cell: Arc::new(Cell::new(Slot::Done(Err(error)))),
        }
    }

    /// Bridge a call that reports completion through a success and a failure callback
    ///
    /// `issue` runs immediately and must not block. Whichever callback fires
    /// first resolves the future; a later one is ignored. If both callbacks are
    /// dropped unused the future fails with [`CallError::Abandoned`].
    pub fn from_callbacks<F>(issue: F) -> Self
    where
        F: FnOnce(OnReply<T>, OnError),
    {
        let (completer, future) = Self::pending();
        let on_reply_slot = Arc::new(Mutex::new(Some(completer)));
        let on_error_slot = Arc::clone(&on_reply_slot);

        issue(
            Box::new(move |value| {
                if let Some(completer) = on_reply_slot.lock().take() {
                    completer.set(value);
                }
            }),
            Box::new(move |error| {
                if let Some(completer) = on_error_slot.lock().take() {
                    completer.set_error(error);
                }
            }),
        );

        future
    }

    /// Whether a result is available without blocking
    ///
    /// Futures derived through [`apply`](Self::apply) stay unready until read.
    pub fn is_ready(&self) -> bool {
        matches!(*self.cell.slot.lock(), Slot::Done(_))
    }
}

impl<T: Clone + Send + 'static> RemoteCallFuture<T> {
    /// Block until the call resolves and return its outcome
    ///
    /// `None` waits indefinitely. On expiry returns [`CallError::Timeout`]
    /// and leaves the future untouched, so it can be read again later.
    ///
    /// # Errors
    /// Returns the failure the call resolved with, or `Timeout` if it did not
    /// resolve in time.
    pub fn get(&self, timeout: Option<Duration>) -> Result<T, CallError> {
        let deadline = timeout.and_then(|timeout| Instant::now().checked_add(timeout));
        let expired = || CallError::Timeout(timeout.unwrap_or_default());

        self.run_deferred(deadline).map_err(|()| expired())?;

        let mut slot = self.cell.slot.lock();
        loop {
            if let Slot::Done(result) = &*slot {
                return result.clone();
            }
            match deadline {
                None => self.cell.resolved.wait(&mut slot),
                Some(deadline) => {
                    if self.cell.resolved.wait_until(&mut slot, deadline).timed_out() {
                        return match &*slot {
                            Slot::Done(result) => result.clone(),
                            Slot::Pending => Err(expired()),
                        };
                    }
                }
            }
        }
    }

    /// Derive a future whose value is `transform` applied to this one's
    ///
    /// `transform` runs on the first read of the derived future, never before,
    /// and not at all if this future fails.
    pub fn apply<U, F>(&self, transform: F) -> RemoteCallFuture<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.and_then(move |value| Ok(transform(value)))
    }

    /// Like [`apply`](Self::apply) for transforms that can fail
    pub fn and_then<U, F>(&self, transform: F) -> RemoteCallFuture<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Result<U, CallError> + Send + 'static,
    {
        let derived = RemoteCallFuture {
            cell: Arc::new(Cell::new(Slot::Pending)),
        };
        *derived.cell.deferred.lock() = Some(Box::new(Chained {
            base: self.clone(),
            transform,
        }));
        derived
    }

    fn run_deferred(&self, deadline: Option<Instant>) -> Result<(), ()> {
        let mut deferred = match deadline {
            None => self.cell.deferred.lock(),
            Some(deadline) => self.cell.deferred.try_lock_until(deadline).ok_or(())?,
        };

        let Some(pending) = deferred.take() else {
            return Ok(());
        };

        let remaining = deadline.map(|deadline| deadline.saturating_duration_since(Instant::now()));
        match pending.resolve(remaining) {
            Ok(result) => {
                self.cell.complete(result);
                Ok(())
            }
            Err(pending) => {
                *deferred = Some(pending);
                Err(())
            }
        }
    }
}

/// Producer half of a [`RemoteCallFuture`]
///
/// Consumed by resolving, so a future can only be resolved once through it.
/// Dropping it unresolved fails the future with [`CallError::Abandoned`].
pub struct Completer<T> {
    cell: Option<Arc<Cell<T>>>,
}

impl<T> Completer<T> {
    /// Resolve with a value
    pub fn set(self, value: T) {
        self.complete(Ok(value));
    }

    /// Resolve with a failure
    pub fn set_error(self, error: CallError) {
        self.complete(Err(error));
    }

    /// Resolve with either outcome
    pub fn complete(mut self, result: Result<T, CallError>) {
        if let Some(cell) = self.cell.take() {
            cell.complete(result);
        }
    }
}

impl<T> Drop for Completer<T> {
    fn drop(&mut self) {
        if let Some(cell) = self.cell.take() {
            cell.complete(Err(CallError::Abandoned));
        }
    }
}

impl<T> fmt::Debug for Completer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completer")
            .field("armed", &self.cell.is_some())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        thread,
    };

    use super::*;

    const LONG: Option<Duration> = Some(Duration::from_secs(5));

    #[test]
    fn from_value_resolves_immediately() {
        for value in [0, 1, 42, u32::MAX] {
            let future = RemoteCallFuture::from_value(value);
            assert!(future.is_ready());
            assert_eq!(future.get(Some(Duration::ZERO)).unwrap(), value);
            assert_eq!(future.get(None).unwrap(), value);
        }
    }

    #[test]
    fn get_returns_value_set_before_read() {
        let (completer, future) = RemoteCallFuture::pending();
        completer.set(String::from("reply"));
        assert_eq!(future.get(Some(Duration::ZERO)).unwrap(), "reply");
    }

    #[test]
    fn get_blocks_until_set_from_another_thread() {
        let (completer, future) = RemoteCallFuture::pending();
        let producer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            completer.set(7_u32);
        });
        assert_eq!(future.get(LONG).unwrap(), 7);
        producer.join().unwrap();
    }

    #[test]
    fn failure_is_surfaced_on_every_read() {
        let (completer, future) = RemoteCallFuture::<u32>::pending();
        completer.set_error(CallError::transport(
            "Rescan",
            zbus::Error::Failure("server went away".to_string()),
        ));

        for _ in 0..3 {
            match future.get(LONG) {
                Err(CallError::Transport { method, source }) => {
                    assert_eq!(method, "Rescan");
                    assert!(source.to_string().contains("server went away"));
                }
                other => panic!("unexpected outcome {other:?}"),
            }
        }
    }

    #[test]
    fn second_completion_is_rejected() {
        let cell = Cell::new(Slot::Pending);
        assert!(cell.complete(Ok(1_u32)));
        assert!(!cell.complete(Ok(2)));
        assert!(!cell.complete(Err(CallError::Abandoned)));

        let future = RemoteCallFuture {
            cell: Arc::new(cell),
        };
        assert_eq!(future.get(None).unwrap(), 1);
    }

    #[test]
    fn zero_timeout_on_unresolved_future_times_out_then_sees_later_set() {
        let (completer, future) = RemoteCallFuture::pending();

        let started = Instant::now();
        let error = future.get(Some(Duration::ZERO)).unwrap_err();
        assert!(error.is_timeout());
        assert!(started.elapsed() < Duration::from_secs(1));

        completer.set(5_i32);
        assert_eq!(future.get(Some(Duration::ZERO)).unwrap(), 5);
    }

    #[test]
    fn dropped_completer_abandons_future() {
        let (completer, future) = RemoteCallFuture::<u8>::pending();
        drop(completer);
        assert!(matches!(future.get(LONG), Err(CallError::Abandoned)));
    }

    #[test]
    fn apply_is_lazy_until_derived_future_is_read() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (completer, future) = RemoteCallFuture::pending();

        let counter = Arc::clone(&calls);
        let derived = future.apply(move |value: u32| {
            counter.fetch_add(1, Ordering::SeqCst);
            value * 2
        });

        completer.set(21);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!derived.is_ready());

        assert_eq!(derived.get(LONG).unwrap(), 42);
        assert_eq!(derived.get(LONG).unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn apply_skips_transform_when_base_fails() {
        let calls = Arc::new(AtomicUsize::new(0));
        let future = RemoteCallFuture::<u32>::from_error(CallError::decode("ListChildren", "bad"));

        let counter = Arc::clone(&calls);
        let derived = future.apply(move |value| {
            counter.fetch_add(1, Ordering::SeqCst);
            value + 1
        });

        assert!(matches!(derived.get(LONG), Err(CallError::Decode { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn derived_future_survives_timeout_of_base() {
        let (completer, future) = RemoteCallFuture::pending();
        let derived = future.apply(|value: u32| value + 1);

        assert!(derived.get(Some(Duration::ZERO)).unwrap_err().is_timeout());

        completer.set(1);
        assert_eq!(derived.get(Some(Duration::ZERO)).unwrap(), 2);
    }

    #[test]
    fn and_then_propagates_transform_failure() {
        let derived = RemoteCallFuture::from_value(3_u32)
            .and_then(|_| Err::<u32, _>(CallError::decode("GetAll", "missing UDN")));
        assert!(matches!(derived.get(LONG), Err(CallError::Decode { .. })));
    }

    #[test]
    fn from_callbacks_uses_first_callback_only() {
        let future = RemoteCallFuture::from_callbacks(|on_reply, on_error| {
            on_reply(10_u32);
            on_error(CallError::Abandoned);
        });
        assert_eq!(future.get(LONG).unwrap(), 10);

        let future = RemoteCallFuture::<u32>::from_callbacks(|on_reply, on_error| {
            thread::spawn(move || {
                on_error(CallError::ServerNotFound("uuid:missing".into()));
                drop(on_reply);
            });
        });
        assert!(matches!(
            future.get(LONG),
            Err(CallError::ServerNotFound(udn)) if udn.as_str() == "uuid:missing"
        ));
    }

    #[test]
    fn concurrent_readers_observe_the_same_value() {
        let (completer, future) = RemoteCallFuture::pending();
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let future = future.clone();
                thread::spawn(move || future.get(LONG).unwrap())
            })
            .collect();

        completer.set(vec![1_u8, 2, 3]);
        for reader in readers {
            assert_eq!(reader.join().unwrap(), vec![1, 2, 3]);
        }
    }
}
