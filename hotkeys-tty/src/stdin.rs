//! The process' controlling input: termios mode switching on standard
//! input and a pollable, non-blocking reader of the controlling terminal.

use std::fs::File;
use std::io::{self, IsTerminal, Read};
use std::os::fd::{AsRawFd, BorrowedFd, RawFd};
use std::path::PathBuf;

use log::debug;
use mio::unix::SourceFd;
use mio::{Interest, Registry, Token};
use nix::fcntl::{self, OFlag};
use nix::sys::stat::Mode;
use nix::sys::termios::{
    self, InputFlags, LocalFlags, OutputFlags, SetArg, SpecialCharacterIndices,
    Termios,
};
use parking_lot::Mutex;

use crate::control::TerminalControl;
use crate::source::InputSource;
use crate::{Result, TtyError};

/// termios control of standard input.
pub struct StdinTerminal {
    fd: RawFd,
    saved: Mutex<Option<Termios>>,
}

impl Default for StdinTerminal {
    fn default() -> Self {
        Self::new()
    }
}

impl StdinTerminal {
    pub fn new() -> Self {
        Self {
            fd: io::stdin().as_raw_fd(),
            saved: Mutex::new(None),
        }
    }

    fn borrowed(&self) -> BorrowedFd<'_> {
        unsafe { BorrowedFd::borrow_raw(self.fd) }
    }

    fn saved(&self) -> Result<Termios> {
        self.saved.lock().clone().ok_or(TtyError::NotSaved)
    }

    fn apply(&self, mode: &Termios) -> Result<()> {
        termios::tcsetattr(self.borrowed(), SetArg::TCSANOW, mode)?;
        Ok(())
    }
}

impl TerminalControl for StdinTerminal {
    fn is_terminal(&self) -> bool {
        self.borrowed().is_terminal()
    }

    fn save_mode(&self) -> Result<()> {
        if !self.is_terminal() {
            return Err(TtyError::NotATerminal);
        }

        let mode = termios::tcgetattr(self.borrowed())?;
        *self.saved.lock() = Some(mode);
        Ok(())
    }

    fn enable_raw(&self) -> Result<()> {
        let mut raw = self.saved()?;
        termios::cfmakeraw(&mut raw);
        // Keep output post-processing so "\n" from the host program still
        // returns the carriage.
        raw.output_flags |= OutputFlags::OPOST | OutputFlags::ONLCR;
        raw.control_chars[SpecialCharacterIndices::VMIN as usize] = 1;
        raw.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;
        self.apply(&raw)
    }

    fn restore_mode(&self) -> Result<()> {
        let saved = self.saved()?;
        self.apply(&saved)
    }

    fn restore_sane(&self) -> Result<()> {
        let mut sane = termios::tcgetattr(self.borrowed())?;
        sane.input_flags |=
            InputFlags::BRKINT | InputFlags::ICRNL | InputFlags::IXON;
        sane.output_flags |= OutputFlags::OPOST | OutputFlags::ONLCR;
        sane.local_flags |= LocalFlags::ISIG
            | LocalFlags::ICANON
            | LocalFlags::ECHO
            | LocalFlags::ECHOE
            | LocalFlags::ECHOK
            | LocalFlags::IEXTEN;
        sane.control_chars[SpecialCharacterIndices::VMIN as usize] = 1;
        sane.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;
        self.apply(&sane)
    }
}

/// Path of the controlling terminal.
pub const CONTROLLING_TTY: &str = "/dev/tty";

/// The controlling terminal as a non-blocking [`InputSource`].
///
/// The device is opened on first registration with its own open file
/// description, so `O_NONBLOCK` never leaks into the process' standard
/// streams that share the descriptor of the terminal they were inherited
/// from.
pub struct StdinSource {
    path: PathBuf,
    file: Option<File>,
}

impl Default for StdinSource {
    fn default() -> Self {
        Self::new()
    }
}

impl StdinSource {
    pub fn new() -> Self {
        Self::with_path(CONTROLLING_TTY)
    }

    /// Read from the device or FIFO at `path` instead.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }

    fn file(&mut self) -> io::Result<&mut File> {
        if self.file.is_none() {
            let flags = OFlag::O_RDONLY
                | OFlag::O_NONBLOCK
                | OFlag::O_CLOEXEC
                | OFlag::O_NOCTTY;
            let fd = fcntl::open(self.path.as_path(), flags, Mode::empty())?;
            debug!("opened {} for keyboard input", self.path.display());
            self.file = Some(File::from(fd));
        }
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotConnected))
    }
}

impl InputSource for StdinSource {
    fn register(&mut self, registry: &Registry, token: Token) -> io::Result<()> {
        let fd = self.file()?.as_raw_fd();
        registry.register(&mut SourceFd(&fd), token, Interest::READABLE)
    }

    fn deregister(&mut self, registry: &Registry) -> io::Result<()> {
        let fd = self.file()?.as_raw_fd();
        registry.deregister(&mut SourceFd(&fd))
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let file = self.file()?;
        loop {
            match file.read(buf) {
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {
                    continue;
                },
                result => return result,
            }
        }
    }
}
