//! Keyboard shortcuts for interactive terminal programs.
//!
//! [`Hotkeys`] puts the terminal into raw mode, recognizes key presses
//! (plain characters, control bytes and escape sequences) on a background
//! reader thread and runs the callback bound to each chord. Keys without a
//! binding are kept in a bounded queue for the program to poll.
//!
//! ```no_run
//! use hotkeys::{Callback, Hotkeys};
//!
//! # fn main() -> hotkeys::Result<()> {
//! let hotkeys = Hotkeys::new()?;
//! hotkeys.register_hotkey("ctrl+shift+h", Callback::sync(|event| {
//!     log::info!("pressed {event}");
//! }))?;
//! hotkeys.start()?;
//! // ...
//! hotkeys.stop()?;
//! # Ok(())
//! # }
//! ```

mod bindings;
mod builder;
mod callback;
mod dispatcher;
mod error;
mod hotkeys;
mod options;
mod queue;
mod reader;

pub use hotkeys_input as input;
pub use hotkeys_tty as tty;

pub use hotkeys_input::{Key, KeyChord, KeyEvent, Modifiers, NamedKey};

pub use builder::HotkeysBuilder;
pub use callback::{BoxFuture, Callback, CallbackFailure, ErrorHook};
pub use error::{Error, Result};
pub use hotkeys::{Hotkeys, HotkeysHandle, LifecycleState};
pub use options::{DEFAULT_UNHANDLED_CAPACITY, HotkeysOptions, MIN_POLL_INTERVAL};
pub use queue::{UnhandledEntry, UnhandledQueue};
