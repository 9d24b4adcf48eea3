//! The DUT side: a reader thread that frames, dispatches and acknowledges.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info};

use crate::device::SharedDevice;
use crate::error::{Error, Result};
use crate::frame;
use crate::framer::{FramerStats, StreamFramer};
use crate::transport::Port;

/// Default read poll interval of the reader thread.
pub const DEFAULT_POLL: Duration = Duration::from_millis(10);

const READ_CHUNK: usize = 256;

/// Serialized write side of the port, shared by the reader and the operator.
///
/// Each [`send`](Outbound::send) writes its bytes under one lock, so an ACK
/// and an unsolicited send never interleave.
#[derive(Clone)]
pub struct Outbound {
    port: Arc<Mutex<Box<dyn Port>>>,
}

impl Outbound {
    pub fn new(port: Box<dyn Port>) -> Self {
        Self {
            port: Arc::new(Mutex::new(port)),
        }
    }

    pub fn send(&self, bytes: &[u8]) -> Result<()> {
        let mut port = self.port.lock().unwrap_or_else(PoisonError::into_inner);
        port.write_all(bytes)
    }
}

/// The reader loop and everything it needs.
pub struct Simulator {
    device: SharedDevice,
    reader: Box<dyn Port>,
    outbound: Outbound,
    running: Arc<AtomicBool>,
    poll: Duration,
}

impl Simulator {
    /// Builds a simulator on `port`. A cloned handle becomes the write side.
    pub fn new(device: SharedDevice, port: Box<dyn Port>) -> Result<Self> {
        let outbound = Outbound::new(port.try_clone_port()?);
        Ok(Self {
            device,
            reader: port,
            outbound,
            running: Arc::new(AtomicBool::new(true)),
            poll: DEFAULT_POLL,
        })
    }

    /// Sets how long each read waits; this bounds shutdown latency.
    pub fn with_poll_interval(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }

    pub fn outbound(&self) -> Outbound {
        self.outbound.clone()
    }

    /// Runs the reader loop on the current thread until the run flag clears
    /// or the port fails.
    pub fn run(&mut self) -> Result<FramerStats> {
        let mut framer = StreamFramer::new();
        let mut buf = [0u8; READ_CHUNK];
        info!(poll_ms = self.poll.as_millis() as u64, "reader started");

        let result = self.pump(&mut framer, &mut buf);
        // Either way the control side must see that the reader is gone.
        self.running.store(false, Ordering::Release);

        let stats = framer.stats();
        info!(
            frames = stats.frames,
            malformed = stats.malformed,
            skipped = stats.skipped_bytes,
            "reader stopped"
        );
        result.map(|()| stats)
    }

    fn pump(&mut self, framer: &mut StreamFramer, buf: &mut [u8]) -> Result<()> {
        while self.running.load(Ordering::Acquire) {
            let n = self.reader.read(buf, self.poll).map_err(|e| {
                error!(error = %e, "read failed");
                e
            })?;
            if n == 0 {
                continue;
            }
            debug!(len = n, "rx chunk");

            for request in framer.push(&buf[..n]) {
                let reply = self.device.dispatch(request);
                debug!(
                    cmd = %format_args!("0x{:02X}", request.cmd()),
                    param = %format_args!("0x{:02X}", request.param()),
                    reply = %reply,
                    "dispatched"
                );
                self.outbound.send(&frame::encode_ack(&reply)).map_err(|e| {
                    error!(error = %e, "write failed");
                    e
                })?;
            }
        }
        Ok(())
    }

    /// Starts the reader loop on its own thread.
    pub fn spawn(mut self) -> Result<ReaderHandle> {
        let running = Arc::clone(&self.running);
        let thread = thread::Builder::new()
            .name("dut-reader".into())
            .spawn(move || self.run())?;
        Ok(ReaderHandle { running, thread })
    }
}

/// Handle to a spawned reader thread.
pub struct ReaderHandle {
    running: Arc<AtomicBool>,
    thread: JoinHandle<Result<FramerStats>>,
}

impl ReaderHandle {
    /// False once the reader has exited or been asked to stop.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Asks the reader to exit after its current poll.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// Waits for the reader and returns its result.
    pub fn join(self) -> Result<FramerStats> {
        self.thread.join().map_err(|_| Error::ReaderStopped)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceState;
    use crate::frame::encode;
    use crate::transport::MemoryPort;
    use std::time::Instant;

    fn read_reply(port: &mut MemoryPort) -> String {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut out = Vec::new();
        let mut byte = [0u8; 1];
        while Instant::now() < deadline {
            if port.read(&mut byte, Duration::from_millis(50)).unwrap() == 1 {
                out.push(byte[0]);
                if byte[0] == frame::TERMINATOR {
                    break;
                }
            }
        }
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn acknowledges_frames() {
        let (dut, mut pc) = MemoryPort::pair();
        let device = SharedDevice::new(DeviceState::default());
        let handle = Simulator::new(device.clone(), Box::new(dut))
            .unwrap()
            .spawn()
            .unwrap();

        pc.write_all(&encode(0x0C, 0x09)).unwrap();
        assert_eq!(read_reply(&mut pc), "ACK: OK (Vol:9)\r");
        assert_eq!(device.snapshot().state.volume, 9);

        handle.stop();
        let stats = handle.join().unwrap();
        assert_eq!(stats.frames, 1);
    }

    #[test]
    fn garbage_then_frame() {
        let (dut, mut pc) = MemoryPort::pair();
        let handle = Simulator::new(SharedDevice::default(), Box::new(dut))
            .unwrap()
            .spawn()
            .unwrap();

        pc.write_all(b"\x00\xFFjunk").unwrap();
        pc.write_all(&encode(0x00, 0x00)).unwrap();
        assert_eq!(read_reply(&mut pc), "ACK: v1.0.5\r");

        handle.stop();
        handle.join().unwrap();
    }

    #[test]
    fn outbound_send_reaches_peer() {
        let (dut, mut pc) = MemoryPort::pair();
        let sim = Simulator::new(SharedDevice::default(), Box::new(dut)).unwrap();
        sim.outbound()
            .send(&frame::encode_unsolicited("BTN:Play"))
            .unwrap();
        assert_eq!(read_reply(&mut pc), "BTN:Play\r");
    }

    #[test]
    fn stop_is_prompt() {
        let (dut, _pc) = MemoryPort::pair();
        let handle = Simulator::new(SharedDevice::default(), Box::new(dut))
            .unwrap()
            .with_poll_interval(Duration::from_millis(5))
            .spawn()
            .unwrap();
        assert!(handle.is_running());
        let started = Instant::now();
        handle.stop();
        handle.join().unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn disconnect_ends_reader_with_error() {
        let (dut, pc) = MemoryPort::pair();
        let handle = Simulator::new(SharedDevice::default(), Box::new(dut))
            .unwrap()
            .spawn()
            .unwrap();
        pc.disconnect();

        let deadline = Instant::now() + Duration::from_secs(5);
        while handle.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(!handle.is_running());
        let result = handle.join();
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn acks_and_unsolicited_sends_never_interleave() {
        const ROUNDS: usize = 50;
        let (dut, mut pc) = MemoryPort::pair();
        let sim = Simulator::new(SharedDevice::default(), Box::new(dut)).unwrap();
        let outbound = sim.outbound();
        let handle = sim.spawn().unwrap();

        let text = "U".repeat(500);
        let sender = {
            let text = text.clone();
            thread::spawn(move || {
                for _ in 0..ROUNDS {
                    outbound.send(&frame::encode_unsolicited(&text)).unwrap();
                }
            })
        };
        let mut writer = pc.clone();
        for _ in 0..ROUNDS {
            writer.write_all(&encode(0x00, 0x00)).unwrap();
        }
        sender.join().unwrap();

        let mut lines = Vec::new();
        while lines.len() < 2 * ROUNDS {
            let line = read_reply(&mut pc);
            assert!(line.ends_with('\r'), "timed out after {} lines", lines.len());
            lines.push(line);
        }
        handle.stop();
        handle.join().unwrap();

        let acks = lines.iter().filter(|l| *l == "ACK: v1.0.5\r").count();
        let sends = lines.iter().filter(|l| **l == format!("{text}\r")).count();
        assert_eq!(acks, ROUNDS);
        assert_eq!(sends, ROUNDS);
    }
}
