use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use hotkeys_input::{KeyChord, KeyEvent};
use log::debug;
use tokio::runtime::Handle;

use crate::bindings::BindingTable;
use crate::callback::{
    AsyncFn, Callback, CallbackFailure, ErrorHook, panic_message,
};
use crate::queue::UnhandledQueue;

/// Routes resolved keys to their callback or to the unhandled queue.
pub(crate) struct Dispatcher {
    bindings: Arc<BindingTable>,
    unhandled: Arc<UnhandledQueue>,
    scheduler: Option<Handle>,
    error_hook: ErrorHook,
}

impl Dispatcher {
    pub(crate) fn new(
        bindings: Arc<BindingTable>,
        unhandled: Arc<UnhandledQueue>,
        scheduler: Option<Handle>,
        error_hook: ErrorHook,
    ) -> Self {
        Self {
            bindings,
            unhandled,
            scheduler,
            error_hook,
        }
    }

    pub(crate) fn dispatch(&self, event: KeyEvent) {
        let Some(callback) = self.bindings.get(event.chord()) else {
            self.unhandled.push(event);
            return;
        };

        debug!("dispatching `{event}`");
        match callback {
            Callback::Sync(callback) => {
                let chord = *event.chord();
                let result =
                    panic::catch_unwind(AssertUnwindSafe(|| callback(&event)));
                if let Err(payload) = result {
                    self.report(chord, panic_message(payload.as_ref()));
                }
            },
            Callback::Async(callback) => self.schedule(&callback, event),
        }
    }

    /// Spawn the task without waiting for it. A second task watches the
    /// first one and reports a panic through the error hook.
    fn schedule(
        &self,
        callback: &Arc<AsyncFn>,
        event: KeyEvent,
    ) {
        let chord = *event.chord();
        let Some(scheduler) = &self.scheduler else {
            self.report(chord, "no scheduler configured".to_string());
            return;
        };

        let future =
            match panic::catch_unwind(AssertUnwindSafe(|| callback(event))) {
                Ok(future) => future,
                Err(payload) => {
                    self.report(chord, panic_message(payload.as_ref()));
                    return;
                },
            };

        let task = scheduler.spawn(future);
        let error_hook = self.error_hook.clone();
        scheduler.spawn(async move {
            if let Err(err) = task.await {
                let reason = if err.is_panic() {
                    panic_message(err.into_panic().as_ref())
                } else {
                    "task was cancelled".to_string()
                };
                error_hook(&CallbackFailure { chord, reason });
            }
        });
    }

    fn report(&self, chord: KeyChord, reason: String) {
        (self.error_hook)(&CallbackFailure { chord, reason });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use hotkeys_input::{Key, KeyChord};
    use parking_lot::Mutex;

    use super::*;

    struct Fixture {
        bindings: Arc<BindingTable>,
        unhandled: Arc<UnhandledQueue>,
        failures: Arc<Mutex<Vec<CallbackFailure>>>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                bindings: Arc::default(),
                unhandled: Arc::new(UnhandledQueue::new(16)),
                failures: Arc::default(),
            }
        }

        fn dispatcher(&self, scheduler: Option<Handle>) -> Dispatcher {
            let failures = self.failures.clone();
            Dispatcher::new(
                self.bindings.clone(),
                self.unhandled.clone(),
                scheduler,
                Arc::new(move |failure: &CallbackFailure| {
                    failures.lock().push(failure.clone())
                }),
            )
        }
    }

    fn event(spec: &str) -> KeyEvent {
        let chord: KeyChord = spec.parse().expect("valid chord");
        KeyEvent::new(chord, spec.as_bytes().to_vec())
    }

    #[test]
    fn unbound_keys_are_queued() {
        let fixture = Fixture::new();
        let dispatcher = fixture.dispatcher(None);

        dispatcher.dispatch(event("q"));
        assert_eq!(fixture.unhandled.pop(), Some(event("q")));
    }

    #[test]
    fn sync_callback_runs_inline() {
        let fixture = Fixture::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        fixture.bindings.insert(
            "f9".parse().expect("chord"),
            Callback::sync(move |event| {
                assert_eq!(event.key(), Key::Function(9));
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        fixture.dispatcher(None).dispatch(event("f9"));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(fixture.unhandled.is_empty());
    }

    #[test]
    fn panicking_callback_is_reported() {
        let fixture = Fixture::new();
        fixture.bindings.insert(
            "ctrl+x".parse().expect("chord"),
            Callback::sync(|_| panic!("broken binding")),
        );
        let dispatcher = fixture.dispatcher(None);

        dispatcher.dispatch(event("ctrl+x"));
        dispatcher.dispatch(event("ctrl+x"));

        let failures = fixture.failures.lock();
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].reason, "broken binding");
        assert_eq!(failures[0].chord.to_string(), "ctrl+x");
    }

    #[test]
    fn async_callback_runs_on_scheduler() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_time()
            .build()
            .expect("runtime");
        let fixture = Fixture::new();
        let (tx, rx) = flume::unbounded();
        fixture.bindings.insert(
            "f10".parse().expect("chord"),
            Callback::asynchronous(move |event| {
                let tx = tx.clone();
                async move {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    let _ = tx.send(event.to_string());
                }
            }),
        );

        fixture
            .dispatcher(Some(runtime.handle().clone()))
            .dispatch(event("f10"));

        let fired = rx.recv_timeout(Duration::from_secs(2)).expect("task ran");
        assert_eq!(fired, "f10");
    }

    #[test]
    fn async_panic_is_reported() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .build()
            .expect("runtime");
        let fixture = Fixture::new();
        fixture.bindings.insert(
            "f11".parse().expect("chord"),
            Callback::asynchronous(|_| async { panic!("task failed") }),
        );

        fixture
            .dispatcher(Some(runtime.handle().clone()))
            .dispatch(event("f11"));

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while fixture.failures.lock().is_empty()
            && std::time::Instant::now() < deadline
        {
            std::thread::sleep(Duration::from_millis(5));
        }
        let failures = fixture.failures.lock();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].reason, "task failed");
    }

    #[test]
    fn async_without_scheduler_is_reported() {
        let fixture = Fixture::new();
        fixture.bindings.insert(
            "f12".parse().expect("chord"),
            Callback::asynchronous(|_| async {}),
        );

        fixture.dispatcher(None).dispatch(event("f12"));

        assert_eq!(fixture.failures.lock().len(), 1);
        assert!(fixture.unhandled.is_empty());
    }
}
