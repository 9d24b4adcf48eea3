//! Duplex byte ports.
//!
//! Both tools talk to a [`Port`] rather than to a serial device directly,
//! so the simulator and the runner can be driven over an in-process
//! [`MemoryPort`] pair in tests.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::info;

use crate::error::{Error, Result};

/// A duplex byte port.
pub trait Port: Send {
    /// Reads whatever is available into `buf`, waiting up to `timeout`.
    ///
    /// Returns `Ok(0)` if nothing arrived in time.
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    fn write_all(&mut self, data: &[u8]) -> Result<()>;

    /// Number of bytes that can be read without waiting.
    fn bytes_to_read(&self) -> Result<usize>;

    /// Discards any unread input.
    fn clear_input(&mut self) -> Result<()>;

    /// Opens a second handle to the same port, e.g. for a writer thread.
    fn try_clone_port(&self) -> Result<Box<dyn Port>>;
}

impl Port for Box<dyn Port> {
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        (**self).read(buf, timeout)
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        (**self).write_all(data)
    }

    fn bytes_to_read(&self) -> Result<usize> {
        (**self).bytes_to_read()
    }

    fn clear_input(&mut self) -> Result<()> {
        (**self).clear_input()
    }

    fn try_clone_port(&self) -> Result<Box<dyn Port>> {
        (**self).try_clone_port()
    }
}

fn serial_err(e: serialport::Error) -> Error {
    Error::Io(io::Error::from(e))
}

/// A [`Port`] backed by a serial device (8N1, no flow control).
pub struct SerialLink {
    inner: Box<dyn serialport::SerialPort>,
}

impl SerialLink {
    /// Opens `path` at `baud`. Failure is [`Error::PortUnavailable`].
    pub fn open(path: &str, baud: u32, timeout: Duration) -> Result<Self> {
        let inner = serialport::new(path, baud)
            .timeout(timeout)
            .open()
            .map_err(|source| Error::PortUnavailable {
                path: path.to_string(),
                source,
            })?;
        info!(port = path, baud, "serial port open");
        Ok(Self { inner })
    }
}

impl Port for SerialLink {
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        if self.inner.timeout() != timeout {
            self.inner.set_timeout(timeout).map_err(serial_err)?;
        }
        match self.inner.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.inner.write_all(data)?;
        self.inner.flush()?;
        Ok(())
    }

    fn bytes_to_read(&self) -> Result<usize> {
        let n = self.inner.bytes_to_read().map_err(serial_err)?;
        Ok(n as usize)
    }

    fn clear_input(&mut self) -> Result<()> {
        self.inner
            .clear(serialport::ClearBuffer::Input)
            .map_err(serial_err)
    }

    fn try_clone_port(&self) -> Result<Box<dyn Port>> {
        let inner = self.inner.try_clone().map_err(serial_err)?;
        Ok(Box::new(SerialLink { inner }))
    }
}

#[derive(Debug, Default)]
struct PipeState {
    data: VecDeque<u8>,
    closed: bool,
}

// One direction of a memory link.
#[derive(Debug, Default)]
struct Pipe {
    state: Mutex<PipeState>,
    ready: Condvar,
}

impl Pipe {
    fn lock(&self) -> MutexGuard<'_, PipeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn disconnected() -> Error {
    Error::Io(io::Error::new(io::ErrorKind::BrokenPipe, "port disconnected"))
}

/// One end of an in-process linked port pair.
///
/// Bytes written on one end become readable on the other. Clones share the
/// same pipes.
#[derive(Debug, Clone)]
pub struct MemoryPort {
    rx: Arc<Pipe>,
    tx: Arc<Pipe>,
}

impl MemoryPort {
    /// Creates two connected ends.
    pub fn pair() -> (MemoryPort, MemoryPort) {
        let a_to_b = Arc::new(Pipe::default());
        let b_to_a = Arc::new(Pipe::default());
        (
            MemoryPort {
                rx: Arc::clone(&b_to_a),
                tx: Arc::clone(&a_to_b),
            },
            MemoryPort {
                rx: a_to_b,
                tx: b_to_a,
            },
        )
    }

    /// Simulates unplugging the cable; both ends start failing.
    pub fn disconnect(&self) {
        for pipe in [&self.rx, &self.tx] {
            pipe.lock().closed = true;
            pipe.ready.notify_all();
        }
    }
}

impl Port for MemoryPort {
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let deadline = Instant::now() + timeout;
        let mut state = self.rx.lock();
        loop {
            if !state.data.is_empty() {
                let n = buf.len().min(state.data.len());
                for (slot, byte) in buf.iter_mut().zip(state.data.drain(..n)) {
                    *slot = byte;
                }
                return Ok(n);
            }
            if state.closed {
                return Err(disconnected());
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(0);
            }
            state = self
                .rx
                .ready
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let mut state = self.tx.lock();
        if state.closed {
            return Err(disconnected());
        }
        state.data.extend(data);
        self.tx.ready.notify_all();
        Ok(())
    }

    fn bytes_to_read(&self) -> Result<usize> {
        Ok(self.rx.lock().data.len())
    }

    fn clear_input(&mut self) -> Result<()> {
        self.rx.lock().data.clear();
        Ok(())
    }

    fn try_clone_port(&self) -> Result<Box<dyn Port>> {
        Ok(Box::new(self.clone()))
    }
}
