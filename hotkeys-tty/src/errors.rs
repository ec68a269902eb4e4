use std::io;

use nix::errno::Errno;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TtyError {
    #[error("input is not an interactive terminal")]
    NotATerminal,

    #[error("error from *nix bindings")]
    Nix(#[from] Errno),

    #[error("terminal I/O error: {0}")]
    IO(#[from] io::Error),

    #[error("terminal mode was never saved")]
    NotSaved,

    #[error(
        "failed to restore terminal mode (sane fallback applied: \
         {fallback_applied}): {source}"
    )]
    Restore {
        #[source]
        source: Box<TtyError>,
        fallback_applied: bool,
    },
}

pub type Result<T> = std::result::Result<T, TtyError>;
