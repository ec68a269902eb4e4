//! Terminal device boundary: raw mode switching with guaranteed
//! restoration, and pollable keyboard byte sources.

mod control;
mod errors;
mod signals;
mod source;
mod stdin;

pub mod fake;

pub use control::{RawModeGuard, TerminalControl, restore};
pub use errors::{Result, TtyError};
pub use signals::{RESTORE_SIGNALS, SignalRestore};
pub use source::{InputSource, PipeSource};
pub use stdin::{CONTROLLING_TTY, StdinSource, StdinTerminal};
