//! In-memory terminal and pipe-backed keyboard for tests.

use std::io::{self, Write};

use mio::unix::pipe;
use parking_lot::Mutex;

use crate::control::TerminalControl;
use crate::source::PipeSource;
use crate::{Result, TtyError};

/// A mode change observed by [`FakeTerminal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeTransition {
    Saved,
    Raw,
    Restored,
    Sane,
}

#[derive(Default)]
struct FakeState {
    saved: bool,
    raw: bool,
    fail_restore: bool,
    transitions: Vec<ModeTransition>,
}

/// Terminal that records mode transitions instead of touching a device.
pub struct FakeTerminal {
    interactive: bool,
    state: Mutex<FakeState>,
}

impl FakeTerminal {
    pub fn interactive() -> Self {
        Self {
            interactive: true,
            state: Mutex::default(),
        }
    }

    /// A terminal that behaves like redirected input.
    pub fn detached() -> Self {
        Self {
            interactive: false,
            state: Mutex::default(),
        }
    }

    pub fn is_raw(&self) -> bool {
        self.state.lock().raw
    }

    pub fn transitions(&self) -> Vec<ModeTransition> {
        self.state.lock().transitions.clone()
    }

    /// Make subsequent `restore_mode` calls fail.
    pub fn fail_restore(&self, fail: bool) {
        self.state.lock().fail_restore = fail;
    }
}

impl TerminalControl for FakeTerminal {
    fn is_terminal(&self) -> bool {
        self.interactive
    }

    fn save_mode(&self) -> Result<()> {
        if !self.interactive {
            return Err(TtyError::NotATerminal);
        }

        let mut state = self.state.lock();
        state.saved = true;
        state.transitions.push(ModeTransition::Saved);
        Ok(())
    }

    fn enable_raw(&self) -> Result<()> {
        let mut state = self.state.lock();
        if !state.saved {
            return Err(TtyError::NotSaved);
        }

        state.raw = true;
        state.transitions.push(ModeTransition::Raw);
        Ok(())
    }

    fn restore_mode(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.fail_restore {
            return Err(TtyError::IO(io::Error::other("restore rejected")));
        }
        if !state.saved {
            return Err(TtyError::NotSaved);
        }

        state.raw = false;
        state.transitions.push(ModeTransition::Restored);
        Ok(())
    }

    fn restore_sane(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.raw = false;
        state.transitions.push(ModeTransition::Sane);
        Ok(())
    }
}

/// Writing end of a [`keyboard`] pipe.
pub struct FakeKeyboard {
    sender: pipe::Sender,
}

impl FakeKeyboard {
    /// Deliver bytes as if the user typed them.
    pub fn press(&self, bytes: &[u8]) -> io::Result<()> {
        (&self.sender).write_all(bytes)
    }
}

/// A keyboard and the [`PipeSource`] that reads what it types.
pub fn keyboard() -> io::Result<(FakeKeyboard, PipeSource)> {
    let (sender, receiver) = pipe::new()?;
    Ok((FakeKeyboard { sender }, PipeSource::new(receiver)))
}
