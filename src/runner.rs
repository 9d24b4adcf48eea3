//! The PC side: sends test frames and judges the replies.

use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::TestCase;
use crate::error::{Error, Result};
use crate::frame::{self, FRAME_LEN, TERMINATOR};
use crate::transport::Port;
use crate::validator::{self, Verdict};

/// Timing of one request/reply exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Wait after writing before starting to read.
    pub settle: Duration,
    /// Upper bound on waiting for the reply delimiter.
    pub timeout: Duration,
    /// Pause between cases of a full run.
    pub between_cases: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(200),
            timeout: Duration::from_secs(1),
            between_cases: Duration::from_millis(500),
        }
    }
}

/// What was sent and what came back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub sent: [u8; FRAME_LEN],
    /// Reply text with the delimiter and surrounding whitespace removed;
    /// `None` on timeout.
    pub reply: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseResult {
    pub id: String,
    pub name: String,
    pub exchange: Option<Exchange>,
    pub verdict: Verdict,
}

impl CaseResult {
    pub fn passed(&self) -> bool {
        self.verdict.passed()
    }
}

/// Results of a run, in submission order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    pub results: Vec<CaseResult>,
}

impl Report {
    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.passed()
    }

    pub fn all_passed(&self) -> bool {
        self.failed() == 0
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for r in &self.results {
            let mark = if r.passed() { "PASS" } else { "FAIL" };
            writeln!(f, "{:>4}  {mark}  {}", r.id, r.name)?;
        }
        write!(
            f,
            "{} passed, {} failed, {} total",
            self.passed(),
            self.failed(),
            self.results.len()
        )
    }
}

/// Drives a unit over `port`, one exchange at a time.
pub struct TestRunner<P: Port> {
    port: P,
    timing: Timing,
}

impl<P: Port> TestRunner<P> {
    pub fn new(port: P, timing: Timing) -> Self {
        Self { port, timing }
    }

    /// Sends one request frame and waits for one reply.
    pub fn exchange(&mut self, cmd: u8, param: u8) -> Result<Exchange> {
        let sent = frame::encode(cmd, param);

        // Drop stale unsolicited data so it is not taken as our reply.
        self.port.clear_input()?;
        debug!(tx = %frame::hex_dump(&sent), "send");
        self.port.write_all(&sent)?;
        thread::sleep(self.timing.settle);

        let raw = self.read_until_delimiter()?;
        let text = String::from_utf8_lossy(&raw).trim().to_string();
        let reply = if text.is_empty() {
            warn!(cmd, param, "no reply before timeout");
            None
        } else {
            debug!(rx = %text, "reply");
            Some(text)
        };
        Ok(Exchange { sent, reply })
    }

    // Byte-at-a-time so anything after the delimiter stays in the port.
    fn read_until_delimiter(&mut self) -> Result<Vec<u8>> {
        let deadline = Instant::now() + self.timing.timeout;
        let mut out = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            if self.port.read(&mut byte, deadline - now)? == 0 {
                continue;
            }
            out.push(byte[0]);
            if byte[0] == TERMINATOR {
                break;
            }
        }
        Ok(out)
    }

    /// Runs a single case. Transport failures propagate; everything else
    /// becomes the case's verdict.
    pub fn run_case(&mut self, case: &TestCase) -> Result<CaseResult> {
        let id = case.id.to_string();
        let (cmd, param) = match (case.cmd(), case.param()) {
            (Ok(cmd), Ok(param)) => (cmd, param),
            (Err(Error::InvalidHex(bad)), _) | (_, Err(Error::InvalidHex(bad))) => {
                warn!(id = %id, value = %bad, "test case has an invalid hex byte");
                return Ok(CaseResult {
                    id,
                    name: case.name.clone(),
                    exchange: None,
                    verdict: Verdict::InvalidCase(format!("invalid hex byte {bad:?}")),
                });
            }
            (Err(e), _) | (_, Err(e)) => return Err(e),
        };

        let exchange = self.exchange(cmd, param)?;
        let verdict = validator::validate(exchange.reply.as_deref(), &case.expectation());
        info!(id = %id, name = %case.name, passed = verdict.passed(), "case done");
        Ok(CaseResult {
            id,
            name: case.name.clone(),
            exchange: Some(exchange),
            verdict,
        })
    }

    /// Runs every case in order, calling `on_result` as each one finishes.
    ///
    /// A failing case never stops the batch; only a transport error does.
    pub fn run_all<F>(&mut self, cases: &[TestCase], mut on_result: F) -> Result<Report>
    where
        F: FnMut(&CaseResult),
    {
        let mut report = Report::default();
        for (i, case) in cases.iter().enumerate() {
            if i > 0 {
                thread::sleep(self.timing.between_cases);
            }
            let result = self.run_case(case)?;
            on_result(&result);
            report.results.push(result);
        }
        info!(
            passed = report.passed(),
            failed = report.failed(),
            "run complete"
        );
        Ok(report)
    }

    pub fn into_port(self) -> P {
        self.port
    }
}
