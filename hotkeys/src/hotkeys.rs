use std::fmt;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;

use hotkeys_input::{KeyChord, KeyEvent};
use hotkeys_tty::{
    InputSource, RawModeGuard, SignalRestore, StdinSource, StdinTerminal,
    TerminalControl, restore,
};
use log::{debug, error, warn};
use parking_lot::{Mutex, MutexGuard};

use crate::bindings::BindingTable;
use crate::builder::HotkeysBuilder;
use crate::callback::{Callback, ErrorHook};
use crate::dispatcher::Dispatcher;
use crate::error::{Error, Result};
use crate::options::HotkeysOptions;
use crate::queue::UnhandledQueue;
use crate::reader::{ReaderHandle, SourceSlot, on_reader_thread};

static NEXT_OWNER: AtomicU64 = AtomicU64::new(1);

/// Where the controller is in its lifecycle.
///
/// The terminal is in raw mode exactly while `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LifecycleState {
    Stopped,
    Running,
    Suspended,
}

impl LifecycleState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => LifecycleState::Running,
            2 => LifecycleState::Suspended,
            _ => LifecycleState::Stopped,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LifecycleState::Stopped => "stopped",
            LifecycleState::Running => "running",
            LifecycleState::Suspended => "suspended",
        })
    }
}

/// Transition requested from a callback while another thread held the
/// lifecycle lock. Higher values win.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum Deferred {
    Suspend = 1,
    Stop = 2,
}

struct Session {
    reader: ReaderHandle,
    raw: Option<RawModeGuard>,
    _signals: Option<SignalRestore>,
}

struct Lifecycle {
    state: LifecycleState,
    session: Option<Session>,
    /// Reader that was stopped from its own thread and still needs a join.
    detached: Option<JoinHandle<()>>,
}

pub(crate) struct Shared {
    owner: u64,
    control: Arc<dyn TerminalControl>,
    source: SourceSlot,
    options: HotkeysOptions,
    bindings: Arc<BindingTable>,
    unhandled: Arc<UnhandledQueue>,
    scheduler: Option<tokio::runtime::Handle>,
    error_hook: ErrorHook,
    lifecycle: Mutex<Lifecycle>,
    /// Mirror of `Lifecycle::state` readable without the lock.
    state: AtomicU8,
    deferred: AtomicU8,
}

/// Terminal hotkey listener.
///
/// Owns the terminal while started: `start` saves the terminal mode,
/// switches to raw mode and spawns a reader thread that resolves key
/// presses and runs the bound callbacks. `stop`, `suspend` and `resume`
/// move between the lifecycle states; calls that do not apply to the
/// current state are no-ops.
///
/// Dropping the listener stops it.
pub struct Hotkeys {
    shared: Arc<Shared>,
}

impl Hotkeys {
    /// Listener on the controlling terminal with default options.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    pub fn builder() -> HotkeysBuilder {
        HotkeysBuilder::new()
    }

    pub(crate) fn from_parts(
        options: HotkeysOptions,
        control: Option<Arc<dyn TerminalControl>>,
        source: Option<Box<dyn InputSource>>,
        scheduler: Option<tokio::runtime::Handle>,
        error_hook: ErrorHook,
    ) -> Result<Self> {
        let control: Arc<dyn TerminalControl> = match control {
            Some(control) => control,
            None => Arc::new(StdinTerminal::new()),
        };
        let source: Box<dyn InputSource> = match source {
            Some(source) => source,
            None => Box::new(StdinSource::new()),
        };

        let shared = Shared {
            owner: NEXT_OWNER.fetch_add(1, Ordering::Relaxed),
            control,
            source: Arc::new(Mutex::new(Some(source))),
            unhandled: Arc::new(UnhandledQueue::new(options.unhandled_capacity)),
            options,
            bindings: Arc::default(),
            scheduler,
            error_hook,
            lifecycle: Mutex::new(Lifecycle {
                state: LifecycleState::Stopped,
                session: None,
                detached: None,
            }),
            state: AtomicU8::new(LifecycleState::Stopped as u8),
            deferred: AtomicU8::new(0),
        };

        Ok(Self {
            shared: Arc::new(shared),
        })
    }

    /// A weak handle for use inside callbacks.
    pub fn handle(&self) -> HotkeysHandle {
        HotkeysHandle {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Bind `key` to `callback`, replacing any previous binding of the same
    /// chord. Returns the canonical chord.
    pub fn register_hotkey(
        &self,
        key: &str,
        callback: Callback,
    ) -> Result<KeyChord> {
        let chord: KeyChord = key.parse()?;
        if callback.is_async() && self.shared.scheduler.is_none() {
            return Err(Error::MissingScheduler);
        }

        if self.shared.bindings.insert(chord, callback).is_some() {
            debug!("replaced binding for `{chord}`");
        } else {
            debug!("registered `{chord}`");
        }
        Ok(chord)
    }

    /// Remove the binding of `key`. Returns whether one existed.
    pub fn unregister_hotkey(&self, key: &str) -> Result<bool> {
        let chord: KeyChord = key.parse()?;
        let removed = self.shared.bindings.remove(&chord);
        if removed {
            debug!("unregistered `{chord}`");
        }
        Ok(removed)
    }

    pub fn registered_hotkeys(&self) -> Vec<KeyChord> {
        self.shared.bindings.chords()
    }

    pub fn start(&self) -> Result<()> {
        self.shared.start()
    }

    pub fn stop(&self) -> Result<()> {
        self.shared.stop()
    }

    pub fn suspend(&self) -> Result<()> {
        self.shared.suspend()
    }

    pub fn resume(&self) -> Result<()> {
        self.shared.resume()
    }

    pub fn state(&self) -> LifecycleState {
        self.shared.state()
    }

    pub fn is_running(&self) -> bool {
        self.state() == LifecycleState::Running
    }

    /// Oldest key that had no binding, if any.
    pub fn unhandled_key(&self) -> Option<KeyEvent> {
        self.shared.unhandled.pop()
    }

    pub fn clear_unhandled_keys(&self) {
        self.shared.unhandled.clear();
    }

    pub fn queue_size(&self) -> usize {
        self.shared.unhandled.len()
    }

    /// Unhandled keys dropped because the queue was full.
    pub fn evicted_unhandled(&self) -> u64 {
        self.shared.unhandled.evicted()
    }
}

impl Drop for Hotkeys {
    fn drop(&mut self) {
        if let Err(err) = self.shared.stop() {
            error!("failed to stop hotkeys: {err}");
        }
        self.shared.join_detached();
    }
}

/// Lifecycle control without ownership.
///
/// Meant to be moved into callbacks: calls made from the reader thread do
/// not wait for the reader, so `stop` and `suspend` are safe there. Once
/// the [`Hotkeys`] is dropped every call is a no-op.
#[derive(Clone)]
pub struct HotkeysHandle {
    shared: Weak<Shared>,
}

impl HotkeysHandle {
    pub fn stop(&self) -> Result<()> {
        self.with(Shared::stop)
    }

    pub fn suspend(&self) -> Result<()> {
        self.with(Shared::suspend)
    }

    pub fn resume(&self) -> Result<()> {
        self.with(Shared::resume)
    }

    pub fn state(&self) -> LifecycleState {
        self.shared
            .upgrade()
            .map_or(LifecycleState::Stopped, |shared| shared.state())
    }

    fn with(&self, op: fn(&Shared) -> Result<()>) -> Result<()> {
        match self.shared.upgrade() {
            Some(shared) => op(&shared),
            None => Ok(()),
        }
    }
}

impl Shared {
    fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, lifecycle: &mut Lifecycle, state: LifecycleState) {
        lifecycle.state = state;
        self.state.store(state as u8, Ordering::SeqCst);
    }

    fn start(&self) -> Result<()> {
        let Some(mut lifecycle) = self.lock(None) else {
            warn!("start requested from a callback during a transition, ignored");
            return Ok(());
        };
        let result = self.start_locked(&mut lifecycle);
        self.unlock(lifecycle, result)
    }

    fn resume(&self) -> Result<()> {
        let Some(mut lifecycle) = self.lock(None) else {
            warn!("resume requested from a callback during a transition, ignored");
            return Ok(());
        };
        let result = self.resume_locked(&mut lifecycle);
        self.unlock(lifecycle, result)
    }

    fn suspend(&self) -> Result<()> {
        let Some(mut lifecycle) = self.lock(Some(Deferred::Suspend)) else {
            return Ok(());
        };
        let result = self.suspend_locked(&mut lifecycle);
        self.unlock(lifecycle, result)
    }

    fn stop(&self) -> Result<()> {
        let Some(mut lifecycle) = self.lock(Some(Deferred::Stop)) else {
            return Ok(());
        };
        let result = self.stop_locked(&mut lifecycle);
        self.unlock(lifecycle, result)
    }

    fn on_reader_thread(&self) -> bool {
        on_reader_thread(self.owner)
    }

    /// Lock the lifecycle. The reader thread only tries the lock, since the
    /// holder may be waiting for the reader; a failed attempt records
    /// `defer` for the holder to carry out.
    fn lock(&self, defer: Option<Deferred>) -> Option<MutexGuard<'_, Lifecycle>> {
        if !self.on_reader_thread() {
            return Some(self.lifecycle.lock());
        }

        if let Some(lifecycle) = self.lifecycle.try_lock() {
            return Some(lifecycle);
        }

        if let Some(request) = defer {
            debug!("deferring {request:?} requested from a callback");
            self.deferred.fetch_max(request as u8, Ordering::SeqCst);
            // The holder may have released the lock in the meantime.
            if let Some(lifecycle) = self.lifecycle.try_lock() {
                return Some(lifecycle);
            }
        }
        None
    }

    /// Run deferred requests, release the lock and pick up requests that
    /// arrived while releasing it.
    fn unlock(
        &self,
        mut lifecycle: MutexGuard<'_, Lifecycle>,
        result: Result<()>,
    ) -> Result<()> {
        let deferred = self.run_deferred(&mut lifecycle);
        drop(lifecycle);

        while self.deferred.load(Ordering::SeqCst) != 0 {
            let Some(mut lifecycle) = self.lifecycle.try_lock() else {
                break;
            };
            if let Err(err) = self.run_deferred(&mut lifecycle) {
                error!("deferred lifecycle request failed: {err}");
            }
        }

        result.and(deferred)
    }

    fn run_deferred(&self, lifecycle: &mut Lifecycle) -> Result<()> {
        match self.deferred.swap(0, Ordering::SeqCst) {
            value if value == Deferred::Stop as u8 => self.stop_locked(lifecycle),
            value if value == Deferred::Suspend as u8 => {
                self.suspend_locked(lifecycle)
            },
            _ => Ok(()),
        }
    }

    fn start_locked(&self, lifecycle: &mut Lifecycle) -> Result<()> {
        if lifecycle.state != LifecycleState::Stopped {
            debug!("start ignored: hotkeys are {}", lifecycle.state);
            return Ok(());
        }
        if !self.control.is_terminal() {
            return Err(Error::NotATerminal);
        }

        if let Some(thread) = lifecycle.detached.take() {
            if thread.join().is_err() {
                error!("previous reader thread panicked");
            }
        }

        self.control.save_mode()?;
        let raw = RawModeGuard::acquire(self.control.clone())?;
        let signals = if self.options.restore_on_signal {
            SignalRestore::install(self.control.clone())
                .inspect_err(|err| warn!("signal restore unavailable: {err}"))
                .ok()
        } else {
            None
        };

        let dispatcher = Dispatcher::new(
            self.bindings.clone(),
            self.unhandled.clone(),
            self.scheduler.clone(),
            self.error_hook.clone(),
        );
        let reader = match ReaderHandle::spawn(
            self.owner,
            self.source.clone(),
            dispatcher,
            &self.options,
        ) {
            Ok(reader) => reader,
            Err(err) => {
                if let Err(restore_err) = raw.release() {
                    error!("failed to restore terminal mode: {restore_err}");
                }
                return Err(err);
            },
        };

        lifecycle.session = Some(Session {
            reader,
            raw: Some(raw),
            _signals: signals,
        });
        self.set_state(lifecycle, LifecycleState::Running);
        debug!("hotkeys started");
        Ok(())
    }

    fn suspend_locked(&self, lifecycle: &mut Lifecycle) -> Result<()> {
        if lifecycle.state != LifecycleState::Running {
            debug!("suspend ignored: hotkeys are {}", lifecycle.state);
            return Ok(());
        }
        let Some(session) = lifecycle.session.as_mut() else {
            self.set_state(lifecycle, LifecycleState::Stopped);
            return Ok(());
        };

        if let Err(err) = session.reader.pause(!self.on_reader_thread()) {
            self.stop_locked(lifecycle)?;
            return Err(err);
        }

        let raw = session.raw.take();
        self.set_state(lifecycle, LifecycleState::Suspended);
        if let Some(raw) = raw {
            raw.release()?;
        }
        debug!("hotkeys suspended");
        Ok(())
    }

    fn resume_locked(&self, lifecycle: &mut Lifecycle) -> Result<()> {
        if lifecycle.state != LifecycleState::Suspended {
            debug!("resume ignored: hotkeys are {}", lifecycle.state);
            return Ok(());
        }
        let Some(session) = lifecycle.session.as_mut() else {
            self.set_state(lifecycle, LifecycleState::Stopped);
            return Ok(());
        };

        let raw = RawModeGuard::acquire(self.control.clone())?;
        if let Err(err) = session.reader.resume(!self.on_reader_thread()) {
            drop(raw);
            self.stop_locked(lifecycle)?;
            return Err(err);
        }

        session.raw = Some(raw);
        self.set_state(lifecycle, LifecycleState::Running);
        debug!("hotkeys resumed");
        Ok(())
    }

    fn stop_locked(&self, lifecycle: &mut Lifecycle) -> Result<()> {
        if lifecycle.state == LifecycleState::Stopped {
            debug!("stop ignored: hotkeys are already stopped");
            return Ok(());
        }
        self.set_state(lifecycle, LifecycleState::Stopped);
        let Some(session) = lifecycle.session.take() else {
            return Ok(());
        };

        let Session {
            reader,
            raw,
            _signals: signals,
        } = session;

        let blocking = !self.on_reader_thread();
        let reader_result = match reader.shutdown(blocking) {
            Ok(Some(thread)) => {
                lifecycle.detached = Some(thread);
                Ok(())
            },
            Ok(None) => Ok(()),
            Err(err) => Err(err),
        };

        let restored = match raw {
            Some(raw) => raw.release(),
            None => restore(self.control.as_ref()),
        };
        drop(signals);
        debug!("hotkeys stopped");

        restored?;
        reader_result
    }

    fn join_detached(&self) {
        if self.on_reader_thread() {
            return;
        }
        let detached = self.lifecycle.lock().detached.take();
        if let Some(thread) = detached {
            if thread.join().is_err() {
                error!("reader thread panicked");
            }
        }
    }
}
