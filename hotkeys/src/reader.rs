use std::cell::Cell;
use std::io::ErrorKind;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use flume::{Receiver, Sender, TryRecvError};
use hotkeys_input::{Actor, InputParser, Resolution};
use hotkeys_tty::InputSource;
use log::{debug, error, trace};
use mio::{Events, Poll, Token, Waker};
use parking_lot::Mutex;

use crate::dispatcher::Dispatcher;
use crate::error::{Error, Result};
use crate::options::HotkeysOptions;

const INPUT_TOKEN: Token = Token(0);
const WAKE_TOKEN: Token = Token(1);
const DEFAULT_EVENT_CAPACITY: usize = 16;

/// Keyboard source handed between the controller and successive readers.
pub(crate) type SourceSlot = Arc<Mutex<Option<Box<dyn InputSource>>>>;

thread_local! {
    static READER_OF: Cell<Option<u64>> = const { Cell::new(None) };
}

/// Whether the current thread is the reader of controller `owner`.
pub(crate) fn on_reader_thread(owner: u64) -> bool {
    READER_OF.with(|cell| cell.get() == Some(owner))
}

enum ReaderCommand {
    /// Stop reading and drop partial input; acknowledged once done.
    Pause(Sender<()>),
    /// Start reading again from a clean parser.
    Resume(Sender<()>),
    Shutdown,
}

enum Flow {
    Continue,
    Exit,
}

/// Controller side of a running reader thread.
pub(crate) struct ReaderHandle {
    commands: Sender<ReaderCommand>,
    waker: Arc<Waker>,
    thread: JoinHandle<()>,
}

impl ReaderHandle {
    /// Take the source out of `slot` and start reading it on a new thread.
    /// The source goes back into `slot` when the thread exits.
    pub(crate) fn spawn(
        owner: u64,
        slot: SourceSlot,
        dispatcher: Dispatcher,
        options: &HotkeysOptions,
    ) -> Result<Self> {
        let poll = Poll::new().map_err(Error::Poll)?;
        let waker =
            Arc::new(Waker::new(poll.registry(), WAKE_TOKEN).map_err(Error::Wake)?);
        let source = slot.lock().take().ok_or(Error::SourceUnavailable)?;
        let (commands_tx, commands_rx) = flume::unbounded();

        let mut reader = ReaderLoop {
            poll,
            events: Events::with_capacity(DEFAULT_EVENT_CAPACITY),
            source: Some(source),
            slot,
            registered: false,
            readable: false,
            parser: InputParser::new(options.timeout),
            dispatcher,
            commands: commands_rx,
            buffer: vec![0; options.read_buffer_capacity.max(1)],
            poll_interval: options.reader_poll_interval(),
        };
        reader.register_source()?;

        let thread = thread::Builder::new()
            .name("hotkeys-reader".into())
            .spawn(move || reader.run(owner))
            .map_err(Error::ReaderSpawn)?;

        Ok(Self {
            commands: commands_tx,
            waker,
            thread,
        })
    }

    /// Stop reading. With `blocking`, waits until the reader has let go of
    /// the input.
    pub(crate) fn pause(&self, blocking: bool) -> Result<()> {
        self.request(ReaderCommand::Pause, blocking)
    }

    pub(crate) fn resume(&self, blocking: bool) -> Result<()> {
        self.request(ReaderCommand::Resume, blocking)
    }

    /// Ask the reader to exit. With `blocking`, joins the thread; otherwise
    /// the handle is returned so it can be joined later.
    pub(crate) fn shutdown(
        self,
        blocking: bool,
    ) -> Result<Option<JoinHandle<()>>> {
        // A closed channel means the thread is already gone; joining below
        // still reports how it ended.
        let sent = self.send(ReaderCommand::Shutdown);
        if !blocking {
            return sent.map(|()| Some(self.thread));
        }

        self.thread.join().map_err(|_| Error::ReaderPanicked)?;
        Ok(None)
    }

    fn request(
        &self,
        command: fn(Sender<()>) -> ReaderCommand,
        blocking: bool,
    ) -> Result<()> {
        let (ack_tx, ack_rx) = flume::bounded(1);
        self.send(command(ack_tx))?;
        if blocking {
            ack_rx.recv().map_err(|_| Error::ReaderChannelClosed)?;
        }
        Ok(())
    }

    fn send(&self, command: ReaderCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| Error::ReaderChannelClosed)?;
        self.waker.wake().map_err(Error::Wake)?;
        Ok(())
    }
}

/// Reader thread state: polls the source, parses and dispatches keys.
struct ReaderLoop {
    poll: Poll,
    events: Events,
    source: Option<Box<dyn InputSource>>,
    slot: SourceSlot,
    registered: bool,
    /// Input may be available without a new readiness event.
    readable: bool,
    parser: InputParser,
    dispatcher: Dispatcher,
    commands: Receiver<ReaderCommand>,
    buffer: Vec<u8>,
    poll_interval: Duration,
}

impl ReaderLoop {
    fn run(mut self, owner: u64) {
        READER_OF.with(|cell| cell.set(Some(owner)));
        debug!("reader started");

        loop {
            if let Err(err) = self.poll_once() {
                error!("reader poll failed: {err}");
                break;
            }
            if let Flow::Exit = self.handle_commands() {
                break;
            }

            if self.readable && self.registered {
                self.read_input();
                if let Flow::Exit = self.handle_commands() {
                    break;
                }
            }

            let mut actor = DispatchActor {
                dispatcher: &self.dispatcher,
                commands: &self.commands,
            };
            self.parser.tick(Instant::now(), &mut actor);
        }

        debug!("reader stopped");
    }

    fn poll_once(&mut self) -> std::io::Result<()> {
        let timeout = if self.readable && self.registered {
            Duration::ZERO
        } else {
            let now = Instant::now();
            self.parser
                .next_deadline()
                .map(|deadline| deadline.saturating_duration_since(now))
                .map_or(self.poll_interval, |until| until.min(self.poll_interval))
        };

        self.events.clear();
        loop {
            match self.poll.poll(&mut self.events, Some(timeout)) {
                Ok(()) => break,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }

        if self.events.iter().any(|event| event.token() == INPUT_TOKEN) {
            self.readable = true;
        }
        Ok(())
    }

    /// Read until the source would block. Stops early once a control
    /// request is queued so it is handled before further input.
    fn read_input(&mut self) {
        loop {
            if !self.commands.is_empty() {
                return;
            }

            let result = match self.source.as_mut() {
                Some(source) => source.read(&mut self.buffer),
                None => Ok(0),
            };

            match result {
                Ok(0) => {
                    debug!("keyboard input closed");
                    self.deregister_source();
                    return;
                },
                Ok(read) => {
                    let mut actor = DispatchActor {
                        dispatcher: &self.dispatcher,
                        commands: &self.commands,
                    };
                    self.parser.advance(
                        &self.buffer[..read],
                        Instant::now(),
                        &mut actor,
                    );
                },
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    self.readable = false;
                    return;
                },
                Err(err) => {
                    error!("failed to read keyboard input: {err}");
                    self.deregister_source();
                    return;
                },
            }
        }
    }

    fn handle_commands(&mut self) -> Flow {
        loop {
            match self.commands.try_recv() {
                Ok(ReaderCommand::Pause(ack)) => {
                    self.parser.reset();
                    self.deregister_source();
                    debug!("reader paused");
                    let _ = ack.send(());
                },
                Ok(ReaderCommand::Resume(ack)) => {
                    self.parser.reset();
                    if let Err(err) = self.register_source() {
                        error!("failed to resume keyboard input: {err}");
                    }
                    debug!("reader resumed");
                    let _ = ack.send(());
                },
                Ok(ReaderCommand::Shutdown) => return Flow::Exit,
                Err(TryRecvError::Disconnected) => return Flow::Exit,
                Err(TryRecvError::Empty) => return Flow::Continue,
            }
        }
    }

    fn register_source(&mut self) -> std::io::Result<()> {
        if self.registered {
            return Ok(());
        }
        if let Some(source) = self.source.as_mut() {
            source.register(self.poll.registry(), INPUT_TOKEN)?;
            self.registered = true;
        }
        Ok(())
    }

    fn deregister_source(&mut self) {
        self.readable = false;
        if !self.registered {
            return;
        }
        self.registered = false;
        if let Some(source) = self.source.as_mut() {
            if let Err(err) = source.deregister(self.poll.registry()) {
                debug!("failed to deregister keyboard input: {err}");
            }
        }
    }
}

impl Drop for ReaderLoop {
    fn drop(&mut self) {
        self.deregister_source();
        if let Some(source) = self.source.take() {
            *self.slot.lock() = Some(source);
        }
    }
}

/// Forwards parsed keys to the dispatcher until a control request shows
/// up; keys behind a pause or shutdown request are dropped.
struct DispatchActor<'a> {
    dispatcher: &'a Dispatcher,
    commands: &'a Receiver<ReaderCommand>,
}

impl Actor for DispatchActor<'_> {
    fn resolve(&mut self, resolution: Resolution) {
        if !self.commands.is_empty() {
            debug!("dropping `{}` after a control request", resolution.event());
            return;
        }
        if !resolution.is_matched() {
            trace!("unmatched input {:?}", resolution.event().raw());
        }
        self.dispatcher.dispatch(resolution.into_event());
    }
}
