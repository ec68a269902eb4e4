use std::io::{self, Read};

use mio::unix::pipe;
use mio::{Interest, Registry, Token};

/// A non-blocking byte source the reader polls for keyboard input.
pub trait InputSource: Send {
    /// Register for readable events under `token`.
    fn register(&mut self, registry: &Registry, token: Token) -> io::Result<()>;

    fn deregister(&mut self, registry: &Registry) -> io::Result<()>;

    /// Read available bytes. `Ok(0)` means end of input,
    /// [`io::ErrorKind::WouldBlock`] means nothing is available yet.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl<T: InputSource + ?Sized> InputSource for Box<T> {
    fn register(&mut self, registry: &Registry, token: Token) -> io::Result<()> {
        (**self).register(registry, token)
    }

    fn deregister(&mut self, registry: &Registry) -> io::Result<()> {
        (**self).deregister(registry)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }
}

/// Reading end of a pipe.
pub struct PipeSource {
    receiver: pipe::Receiver,
}

impl PipeSource {
    pub fn new(receiver: pipe::Receiver) -> Self {
        Self { receiver }
    }
}

impl InputSource for PipeSource {
    fn register(&mut self, registry: &Registry, token: Token) -> io::Result<()> {
        registry.register(&mut self.receiver, token, Interest::READABLE)
    }

    fn deregister(&mut self, registry: &Registry) -> io::Result<()> {
        registry.deregister(&mut self.receiver)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            match self.receiver.read(buf) {
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {
                    continue;
                },
                result => return result,
            }
        }
    }
}
