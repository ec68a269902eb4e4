use std::any::Any;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use hotkeys_input::{KeyChord, KeyEvent};
use log::error;
use thiserror::Error;

/// Future produced by an asynchronous callback.
pub type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

pub(crate) type SyncFn = dyn Fn(&KeyEvent) + Send + Sync + 'static;
pub(crate) type AsyncFn = dyn Fn(KeyEvent) -> BoxFuture + Send + Sync + 'static;

/// A bound action, tagged once at registration.
#[derive(Clone)]
pub enum Callback {
    /// Runs on the reader thread; key intake waits until it returns.
    Sync(Arc<SyncFn>),
    /// Produces a task that is spawned on the configured scheduler.
    Async(Arc<AsyncFn>),
}

impl Callback {
    pub fn sync<F>(callback: F) -> Self
    where
        F: Fn(&KeyEvent) + Send + Sync + 'static,
    {
        Callback::Sync(Arc::new(callback))
    }

    pub fn asynchronous<F, Fut>(callback: F) -> Self
    where
        F: Fn(KeyEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Callback::Async(Arc::new(move |event| -> BoxFuture {
            Box::pin(callback(event))
        }))
    }

    pub fn is_async(&self) -> bool {
        matches!(self, Callback::Async(_))
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callback::Sync(_) => f.write_str("Callback::Sync"),
            Callback::Async(_) => f.write_str("Callback::Async"),
        }
    }
}

/// A callback that panicked or could not be run.
#[derive(Debug, Clone, Error)]
#[error("callback for `{chord}` failed: {reason}")]
pub struct CallbackFailure {
    pub chord: KeyChord,
    pub reason: String,
}

/// Receiver of callback failures.
pub type ErrorHook = Arc<dyn Fn(&CallbackFailure) + Send + Sync + 'static>;

pub(crate) fn default_error_hook() -> ErrorHook {
    Arc::new(|failure: &CallbackFailure| error!("{failure}"))
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    "callback panicked".to_string()
}
