use std::{future::Future, time::Instant};

use tokio::{runtime::Handle, task::JoinHandle};
use tracing::{Dispatch, debug, instrument::WithSubscriber};

use super::{CallError, RemoteCall, RemoteCallFuture};

/// Issues remote calls on the dispatch runtime and resolves their futures
///
/// Every task it spawns logs through the dispatch it was created with, so
/// output follows the client rather than whatever subscriber happens to be
/// global on the runtime's worker threads.
#[derive(Clone, Debug)]
pub struct CallDispatcher {
    handle: Handle,
    dispatch: Dispatch,
}

impl CallDispatcher {
    /// Dispatcher running on `handle`, logging through `dispatch`
    pub fn new(handle: Handle, dispatch: Dispatch) -> Self {
        Self { handle, dispatch }
    }

    /// Issue `request` and return a future for its outcome
    ///
    /// Returns immediately. The call is made exactly once; failures end up in
    /// the future and are never retried here. Elapsed times in the log count
    /// from this call, including any wait for a free dispatch thread.
    pub fn call<T, Fut>(&self, call: RemoteCall, request: Fut) -> RemoteCallFuture<T>
    where
        T: Send + 'static,
        Fut: Future<Output = Result<T, CallError>> + Send + 'static,
    {
        tracing::dispatcher::with_default(&self.dispatch, || {
            debug!(path = %call.path, "Calling D-Bus method {call}");
        });

        let start = Instant::now();
        RemoteCallFuture::from_callbacks(|on_reply, on_error| {
            self.spawn(async move {
                match request.await {
                    Ok(value) => {
                        debug!(
                            "{} reply after {:.3}s",
                            call.method,
                            start.elapsed().as_secs_f64()
                        );
                        on_reply(value);
                    }
                    Err(error) => {
                        debug!(
                            "{} error after {:.3}s: {error}",
                            call.method,
                            start.elapsed().as_secs_f64()
                        );
                        on_error(error);
                    }
                }
            });
        })
    }

    /// Run a background task on the dispatch runtime
    pub fn spawn<F>(&self, task: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handle.spawn(task.with_subscriber(self.dispatch.clone()))
    }

    /// Logging dispatch attached to spawned tasks
    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::{fmt::Debug, sync::Arc, thread, time::Duration};

    use parking_lot::Mutex;
    use tracing::{
        Event, Subscriber,
        field::{Field, Visit},
    };
    use tracing_subscriber::{
        layer::{Context, Layer, SubscriberExt},
        registry,
    };

    use super::*;
    use crate::services::dleyna::{SERVER_MANAGER_IFACE, SERVER_ROOT_PATH};

    #[derive(Clone, Default)]
    struct Messages(Arc<Mutex<Vec<String>>>);

    struct MessageVisitor<'a>(&'a mut String);

    impl Visit for MessageVisitor<'_> {
        fn record_debug(&mut self, field: &Field, value: &dyn Debug) {
            if field.name() == "message" {
                *self.0 = format!("{value:?}");
            }
        }
    }

    impl<S: Subscriber> Layer<S> for Messages {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            let mut message = String::new();
            event.record(&mut MessageVisitor(&mut message));
            self.0.lock().push(message);
        }
    }

    #[test]
    fn call_resolves_on_runtime_and_returns_immediately() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let dispatcher = CallDispatcher::new(runtime.handle().clone(), Dispatch::none());
        let call = RemoteCall::new(SERVER_ROOT_PATH, SERVER_MANAGER_IFACE, "Rescan");

        let (release, gate) = tokio::sync::oneshot::channel::<u32>();
        let future = dispatcher.call(call.clone(), async move {
            gate.await.map_err(|_| CallError::Abandoned)
        });
        assert!(!future.is_ready());

        release.send(5).unwrap();
        assert_eq!(future.get(Some(Duration::from_secs(5))).unwrap(), 5);

        let failed = dispatcher.call::<u32, _>(call, async { Err(CallError::decode("Rescan", "bad")) });
        assert!(matches!(
            failed.get(Some(Duration::from_secs(5))),
            Err(CallError::Decode { .. })
        ));
    }

    #[test]
    fn elapsed_time_counts_from_issue() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let messages = Messages::default();
        let dispatch = Dispatch::new(registry().with(messages.clone()));
        let dispatcher = CallDispatcher::new(runtime.handle().clone(), dispatch);
        let call = RemoteCall::new(SERVER_ROOT_PATH, SERVER_MANAGER_IFACE, "Rescan");

        // Nothing drives the runtime yet, so the request waits in its queue.
        let future = dispatcher.call(call, async { Ok(()) });
        thread::sleep(Duration::from_millis(200));
        runtime.block_on(async { tokio::time::sleep(Duration::from_millis(20)).await });
        future.get(Some(Duration::ZERO)).unwrap();

        let messages = messages.0.lock().clone();
        let reply = messages
            .iter()
            .find_map(|message| message.strip_prefix("Rescan reply after "))
            .unwrap();
        let seconds: f64 = reply.trim_end_matches('s').parse().unwrap();
        assert!(seconds >= 0.2, "logged {seconds}s");
    }
}
