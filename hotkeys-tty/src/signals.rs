use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use log::{debug, error, warn};
use parking_lot::Mutex;
use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;
use signal_hook::low_level;

use crate::Result;
use crate::control::{TerminalControl, restore};

/// Signals whose default action ends the process.
pub const RESTORE_SIGNALS: [i32; 4] = [SIGINT, SIGTERM, SIGHUP, SIGQUIT];

type Registration = (u64, Arc<dyn TerminalControl>);

/// Terminals currently in raw mode.
static ACTIVE: Mutex<Vec<Registration>> = Mutex::new(Vec::new());
/// Whether the listener thread runs.
static LISTENING: Mutex<bool> = Mutex::new(false);
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Restores the terminal when the process is asked to terminate.
///
/// The first install starts a listener thread for [`RESTORE_SIGNALS`] that
/// lives as long as the process. On delivery it restores every terminal
/// with a live `SignalRestore` and then performs the signal's default
/// action, so the process still exits. Dropping the value only removes its
/// terminal; the signals keep ending the process afterwards.
pub struct SignalRestore {
    id: u64,
}

impl SignalRestore {
    pub fn install(control: Arc<dyn TerminalControl>) -> Result<Self> {
        ensure_listener()?;

        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        ACTIVE.lock().push((id, control));
        debug!("terminal #{id} restored on fatal signals");
        Ok(Self { id })
    }
}

impl Drop for SignalRestore {
    fn drop(&mut self) {
        ACTIVE.lock().retain(|(id, _)| *id != self.id);
    }
}

fn ensure_listener() -> Result<()> {
    let mut listening = LISTENING.lock();
    if *listening {
        return Ok(());
    }

    let mut signals = Signals::new(RESTORE_SIGNALS)?;
    thread::Builder::new()
        .name("hotkeys-signals".into())
        .spawn(move || {
            for signal in signals.forever() {
                restore_active(signal);
                if let Err(err) = low_level::emulate_default_handler(signal) {
                    error!("failed to run default action of {signal}: {err}");
                }
            }
        })?;

    *listening = true;
    Ok(())
}

/// Restore every registered terminal. Returns how many were restored.
fn restore_active(signal: i32) -> usize {
    let active: Vec<Arc<dyn TerminalControl>> =
        ACTIVE.lock().iter().map(|(_, control)| control.clone()).collect();
    if active.is_empty() {
        return 0;
    }

    warn!("signal {signal} received, restoring terminal mode");
    for control in &active {
        if let Err(err) = restore(control.as_ref()) {
            error!("failed to restore terminal mode: {err}");
        }
    }
    active.len()
}
