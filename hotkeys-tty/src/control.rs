use std::sync::Arc;

use log::{debug, error, warn};

use crate::{Result, TtyError};

/// Mode switching for one terminal device.
///
/// Implementations remember the mode captured by [`save_mode`] and put it
/// back on [`restore_mode`].
///
/// [`save_mode`]: TerminalControl::save_mode
/// [`restore_mode`]: TerminalControl::restore_mode
pub trait TerminalControl: Send + Sync {
    /// Whether the device is an interactive terminal.
    fn is_terminal(&self) -> bool;

    /// Capture the current mode for a later restore.
    fn save_mode(&self) -> Result<()>;

    /// Switch to raw mode: no line buffering, no echo, no signal keys.
    fn enable_raw(&self) -> Result<()>;

    /// Reapply the mode captured by the last `save_mode`.
    fn restore_mode(&self) -> Result<()>;

    /// Apply generic cooked-mode defaults.
    fn restore_sane(&self) -> Result<()>;
}

/// Reapply the saved mode, falling back to sane defaults when that fails.
///
/// A fallback still reports [`TtyError::Restore`] since the caller's exact
/// mode is lost.
pub fn restore(control: &dyn TerminalControl) -> Result<()> {
    let Err(err) = control.restore_mode() else {
        return Ok(());
    };

    warn!("restoring saved terminal mode failed: {err}");
    let fallback_applied = match control.restore_sane() {
        Ok(()) => true,
        Err(sane_err) => {
            error!("sane terminal mode fallback failed: {sane_err}");
            false
        },
    };

    Err(TtyError::Restore {
        source: Box::new(err),
        fallback_applied,
    })
}

/// Raw mode held for as long as the guard lives.
///
/// The saved mode is restored exactly once, either by [`release`] or on
/// drop.
///
/// [`release`]: RawModeGuard::release
pub struct RawModeGuard {
    control: Arc<dyn TerminalControl>,
    active: bool,
}

impl RawModeGuard {
    pub fn acquire(control: Arc<dyn TerminalControl>) -> Result<Self> {
        control.enable_raw()?;
        debug!("terminal switched to raw mode");
        Ok(Self {
            control,
            active: true,
        })
    }

    /// Restore the saved mode now and report the outcome.
    pub fn release(mut self) -> Result<()> {
        self.active = false;
        let result = restore(self.control.as_ref());
        debug!("terminal mode restored");
        result
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if !self.active {
            return;
        }

        self.active = false;
        if let Err(err) = restore(self.control.as_ref()) {
            error!("failed to restore terminal mode on drop: {err}");
        }
    }
}
