use std::io::{self, BufRead, Write};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use lt_sim::control::{self, Action, Choice};
use lt_sim::device::{DeviceState, SharedDevice, DEFAULT_BT_ADDRESS, DEFAULT_FIRMWARE};
use lt_sim::{SerialLink, Simulator};

const BAUD_RATES: [u32; 5] = [9600, 19200, 38400, 57600, 115200];

/// Emulates the control unit on a serial port.
#[derive(Parser)]
#[command(name = "dut_simulator", version, about)]
struct Cli {
    /// Serial port to listen on. Prompts with a list when omitted.
    #[arg(long)]
    port: Option<String>,

    #[arg(long, default_value_t = 115_200)]
    baud: u32,

    /// Reader poll interval in milliseconds.
    #[arg(long, default_value_t = 10)]
    poll_ms: u64,

    /// Firmware version reported by command 0x00.
    #[arg(long, default_value = DEFAULT_FIRMWARE)]
    firmware: String,

    /// Bluetooth address reported by command 0x01.
    #[arg(long, default_value = DEFAULT_BT_ADDRESS)]
    bt_address: String,

    /// Log filter, e.g. `debug` or `lt_sim=trace`. Overrides RUST_LOG.
    #[arg(long)]
    log_level: Option<String>,
}

fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

// The main entry point for the DUT simulator.
fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    println!("=============================");
    println!("  Loewe Test DUT Simulator   ");
    println!("=============================");

    let (port_name, baud) = match cli.port {
        Some(port) => (port, cli.baud),
        None => (select_port()?, select_baud()?),
    };

    // Opening the port is the one fatal startup failure.
    let link = SerialLink::open(&port_name, baud, Duration::from_millis(cli.poll_ms))
        .with_context(|| format!("cannot start simulator on {port_name}"))?;

    let device = SharedDevice::new(DeviceState::new(cli.firmware, cli.bt_address));
    let simulator = Simulator::new(device.clone(), Box::new(link))?
        .with_poll_interval(Duration::from_millis(cli.poll_ms));
    let outbound = simulator.outbound();
    let reader = simulator.spawn()?;

    println!("\nListening on {port_name} at {baud} baud.");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        if !reader.is_running() {
            eprintln!("[ERROR] Reader stopped; exiting.");
            break;
        }
        println!("\n{}", control::MENU);
        prompt("> ")?;

        let Some(line) = lines.next() else { break };
        let line = line?;

        let Some(choice) = Choice::parse(&line) else {
            eprintln!("[ERROR] Invalid choice '{}'.", line.trim());
            continue;
        };

        let text = match choice.text_prompt() {
            Some(label) => {
                prompt(&format!("{label}: "))?;
                match lines.next() {
                    Some(text) => text?,
                    None => break,
                }
            }
            None => String::new(),
        };

        let action = choice.into_action(text);
        let quit = action == Action::Quit;
        match control::apply(action, &device, &outbound) {
            Ok(feedback) => println!("{feedback}"),
            Err(e) => {
                eprintln!("[ERROR] {e}");
                break;
            }
        }
        if quit {
            break;
        }
    }

    reader.stop();
    reader.join().context("reader task failed")?;
    Ok(())
}

fn prompt(text: &str) -> io::Result<()> {
    print!("{text}");
    io::stdout().flush()
}

fn read_line() -> io::Result<String> {
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

// Lists the available serial ports and asks for one.
fn select_port() -> Result<String> {
    let ports = serialport::available_ports().context("could not enumerate serial ports")?;
    if ports.is_empty() {
        bail!("no serial ports found");
    }

    println!("Available serial ports:");
    for (i, port) in ports.iter().enumerate() {
        println!("  {}: {}", i, port.port_name);
    }
    prompt("Select a port (number): ")?;
    match read_line()?.parse::<usize>() {
        Ok(i) if i < ports.len() => Ok(ports[i].port_name.clone()),
        _ => bail!("invalid port selection"),
    }
}

fn select_baud() -> Result<u32> {
    println!("Available baud rates:");
    for (i, rate) in BAUD_RATES.iter().enumerate() {
        println!("  {i}: {rate}");
    }
    prompt("Select a baud rate (number, default 115200): ")?;
    let input = read_line()?;
    if input.is_empty() {
        return Ok(115_200);
    }
    match input.parse::<usize>() {
        Ok(i) if i < BAUD_RATES.len() => Ok(BAUD_RATES[i]),
        _ => bail!("invalid baud rate selection"),
    }
}
