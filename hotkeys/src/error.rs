use std::io;

use thiserror::Error;

use hotkeys_input::KeySpecError;
use hotkeys_tty::TtyError;

/// Errors reported by the hotkeys runtime.
#[derive(Debug, Error)]
pub enum Error {
    #[error("input is not an interactive terminal")]
    NotATerminal,

    #[error("invalid key specification: {0}")]
    InvalidKeySpec(#[from] KeySpecError),

    #[error("terminal mode could not be restored: {0}")]
    TerminalRestore(TtyError),

    #[error("terminal error: {0}")]
    Tty(TtyError),

    #[error("poll error: {0}")]
    Poll(io::Error),

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to wake reader: {0}")]
    Wake(io::Error),

    #[error("reader command channel closed")]
    ReaderChannelClosed,

    #[error("reader thread panicked")]
    ReaderPanicked,

    #[error("failed to spawn reader thread: {0}")]
    ReaderSpawn(io::Error),

    #[error("asynchronous callbacks require a scheduler")]
    MissingScheduler,

    #[error("input source is held by a reader that has not exited yet")]
    SourceUnavailable,
}

impl From<TtyError> for Error {
    fn from(err: TtyError) -> Self {
        match err {
            TtyError::NotATerminal => Error::NotATerminal,
            err @ TtyError::Restore { .. } => Error::TerminalRestore(err),
            err => Error::Tty(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
