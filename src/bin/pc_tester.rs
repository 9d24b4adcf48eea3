use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::style::Stylize;
use tracing_subscriber::EnvFilter;

use lt_sim::config::{parse_hex_u8, TesterConfig};
use lt_sim::frame::hex_dump;
use lt_sim::runner::{CaseResult, Exchange, TestRunner, Timing};
use lt_sim::validator::Verdict;
use lt_sim::{Port, SerialLink};

/// Production test fixture: drives the unit over a serial port.
#[derive(Parser)]
#[command(name = "pc_tester", version, about)]
struct Cli {
    /// Test-case file.
    #[arg(long, default_value = "test_config.json")]
    config: PathBuf,

    /// Overrides `uart_settings.port`.
    #[arg(long)]
    port: Option<String>,

    /// Overrides `uart_settings.baudrate`.
    #[arg(long)]
    baud: Option<u32>,

    /// Run every case once and exit; non-zero status if any case fails.
    #[arg(long)]
    run_all: bool,

    /// Log filter, e.g. `debug`. Overrides RUST_LOG.
    #[arg(long)]
    log_level: Option<String>,
}

fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    let config = TesterConfig::load(&cli.config)?;
    let uart = &config.uart_settings;
    let port_name = cli.port.clone().unwrap_or_else(|| uart.port.clone());
    let baud = cli.baud.unwrap_or(uart.baudrate);

    let link = SerialLink::open(&port_name, baud, uart.timeout())
        .with_context(|| format!("cannot open {port_name}"))?;
    println!("Connected to {port_name} @ {baud}");

    let timing = Timing {
        timeout: uart.timeout(),
        ..Timing::default()
    };
    let mut runner = TestRunner::new(link, timing);

    if cli.run_all {
        let report = run_all(&mut runner, &config)?;
        return Ok(if report { ExitCode::SUCCESS } else { ExitCode::FAILURE });
    }

    loop {
        print_menu(&config);
        let choice = read_line("Select: ")?.to_uppercase();
        match choice.as_str() {
            "Q" => break,
            "M" => manual_input(&mut runner)?,
            "A" => {
                run_all(&mut runner, &config)?;
            }
            other => match config.find(other) {
                Some(case) => {
                    println!("\n--- {} ---", case.name);
                    let result = runner.run_case(case)?;
                    print_result(&result);
                }
                None => println!("Invalid choice"),
            },
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn print_menu(config: &TesterConfig) {
    println!("\n==============================");
    println!("      MCU Production Test     ");
    println!("==============================");
    for case in &config.test_cases {
        println!("{}. {}", case.id, case.name);
    }
    println!("------------------------------");
    println!("M. Manual input");
    println!("A. Run all tests");
    println!("Q. Quit");
    println!("==============================");
}

fn read_line(label: &str) -> io::Result<String> {
    print!("{label}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

// Returns true when every case passed.
fn run_all<P: Port>(runner: &mut TestRunner<P>, config: &TesterConfig) -> Result<bool> {
    println!("\n*** Running all tests ***");
    let report = runner.run_all(&config.test_cases, |result| {
        println!("\n--- {} ---", result.name);
        print_result(result);
    })?;

    println!("\n*** Summary ***");
    println!("{report}");
    Ok(report.all_passed())
}

fn print_exchange(exchange: &Exchange) {
    println!("TX (Hex): {}", hex_dump(&exchange.sent));
    match &exchange.reply {
        Some(reply) => println!("RX (Str): {}", reply.as_str().cyan()),
        None => println!("RX: [no response / timeout]"),
    }
}

fn print_result(result: &CaseResult) {
    if let Some(exchange) = &result.exchange {
        print_exchange(exchange);
    }
    match &result.verdict {
        Verdict::Pass => println!(">>> {}", "PASS".green()),
        Verdict::NoResponse => println!(">>> {} (no response)", "FAIL".red()),
        Verdict::Mismatch { expected, actual } => {
            println!(">>> {} (expected {expected}, got {actual:?})", "FAIL".red())
        }
        Verdict::InvalidCase(why) => println!(">>> {} ({why})", "FAIL".red()),
    }
}

// Sends a hand-typed CMD/PARAM pair and shows the raw reply.
fn manual_input<P: Port>(runner: &mut TestRunner<P>) -> Result<()> {
    println!("\n[ Manual input ]");
    println!("Enter hex bytes, e.g. 0C or 0x0C");

    let cmd = read_line("CMD (Hex): ")?;
    if cmd.is_empty() {
        return Ok(());
    }
    let param = read_line("PARAM (Hex): ")?;
    if param.is_empty() {
        return Ok(());
    }

    let (cmd, param) = match (parse_hex_u8(&cmd), parse_hex_u8(&param)) {
        (Ok(cmd), Ok(param)) => (cmd, param),
        _ => {
            println!("Error: enter a hex byte (00-FF)");
            return Ok(());
        }
    };

    println!("\n--- Manual CMD:0x{cmd:02X} PARAM:0x{param:02X} ---");
    let exchange = runner.exchange(cmd, param)?;
    print_exchange(&exchange);
    Ok(())
}
