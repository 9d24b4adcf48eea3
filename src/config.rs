//! Test-case configuration for the PC tester.
//!
//! The file is JSON:
//!
//! ```json
//! {
//!   "uart_settings": { "port": "/dev/ttyUSB0", "baudrate": 115200, "timeout": 1 },
//!   "test_cases": [
//!     { "id": 1, "name": "Firmware", "cmd_hex": "0x00", "param_hex": "0x00",
//!       "expect_type": "exact", "criteria": "v1.0.5" }
//!   ]
//! }
//! ```

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::validator::Expectation;

#[cfg(windows)]
const DEFAULT_PORT: &str = "COM5";
#[cfg(not(windows))]
const DEFAULT_PORT: &str = "/dev/ttyUSB0";

pub const DEFAULT_BAUDRATE: u32 = 115_200;

/// A JSON value that may be written either as a number or as a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Int(i64),
    Text(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(n) => write!(f, "{n}"),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UartSettings {
    pub port: String,
    pub baudrate: u32,
    /// Read timeout in seconds.
    pub timeout: f64,
}

impl UartSettings {
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout).unwrap_or(Duration::from_secs(1))
    }
}

impl Default for UartSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.to_string(),
            baudrate: DEFAULT_BAUDRATE,
            timeout: 1.0,
        }
    }
}

// One declarative test record. Order in the file is execution order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: Scalar,
    pub name: String,
    pub cmd_hex: String,
    pub param_hex: String,
    #[serde(default)]
    pub expect_type: Option<String>,
    #[serde(default)]
    pub criteria: Option<Scalar>,
}

impl TestCase {
    pub fn cmd(&self) -> Result<u8> {
        parse_hex_u8(&self.cmd_hex)
    }

    pub fn param(&self) -> Result<u8> {
        parse_hex_u8(&self.param_hex)
    }

    pub fn expectation(&self) -> Expectation {
        let criteria = self.criteria.as_ref().map(Scalar::to_string);
        Expectation::from_parts(self.expect_type.as_deref(), criteria.as_deref())
    }

    /// Matches a menu selection against this case's id.
    pub fn is_selected_by(&self, choice: &str) -> bool {
        self.id.to_string().eq_ignore_ascii_case(choice.trim())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TesterConfig {
    #[serde(default)]
    pub uart_settings: UartSettings,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
}

impl TesterConfig {
    /// Loads the config at `path`.
    ///
    /// A missing file is not an error: the defaults with no test cases are
    /// returned instead.
    pub fn load(path: &Path) -> Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "config not found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        let config: Self = serde_json::from_str(&text).map_err(|source| Error::Config {
            path: path.to_path_buf(),
            source,
        })?;
        info!(
            path = %path.display(),
            cases = config.test_cases.len(),
            "loaded test config"
        );
        Ok(config)
    }

    pub fn find(&self, choice: &str) -> Option<&TestCase> {
        self.test_cases.iter().find(|t| t.is_selected_by(choice))
    }
}

/// Parses `"0x0C"`, `"0X0c"` or `"0C"` into a byte.
pub fn parse_hex_u8(s: &str) -> Result<u8> {
    let trimmed = s.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    u8::from_str_radix(digits, 16).map_err(|_| Error::InvalidHex(s.to_string()))
}
