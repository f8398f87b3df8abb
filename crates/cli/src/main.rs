// RvEcho - Soft-Core UART Echo Firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use clap::{Parser, Subcommand};
use rvecho_config::{parse_size, BoardConfig};
use rvecho_core::bus::SystemBus;
use rvecho_core::cpu::RiscV;
use rvecho_core::memory::ProgramImage;
use rvecho_core::{Cpu, Machine, RunLimits, StopReason};
use rvecho_loader::{CoeError, CoeWidth};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

mod runner;

const EXIT_PASS: u8 = 0;
const EXIT_ASSERT_FAIL: u8 = 1;
const EXIT_CONFIG_ERROR: u8 = 2;
const EXIT_RUNTIME_ERROR: u8 = 3;

fn parse_u32_addr(s: &str) -> Result<u32, String> {
    let trimmed = s.trim();
    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        u32::from_str_radix(&hex.replace('_', ""), 16)
            .map_err(|e| format!("Invalid hex address '{}': {}", s, e))
    } else {
        u32::from_str(trimmed).map_err(|e| format!("Invalid address '{}': {}", s, e))
    }
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "RvEcho soft-core UART echo toolkit",
    long_about = None
)]
struct Cli {
    /// Enable instruction-level execution tracing
    #[arg(short, long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Simulate firmware on the soft-core SoC and show its UART output.
    Run(RunArgs),

    /// Deterministic, CI-friendly runner mode driven by a test script (YAML).
    Test(runner::TestArgs),

    /// Convert a firmware image into a Xilinx BRAM initialisation (.coe) file.
    Coe(CoeArgs),

    /// Write the built-in RV32I echo program as a flat binary.
    Reference(ReferenceArgs),
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Firmware image (ELF or flat binary)
    #[arg(short, long)]
    firmware: PathBuf,

    /// Board description (YAML); defaults to the Project 6 memory map
    #[arg(short, long)]
    board: Option<PathBuf>,

    /// Text queued on the UART receive path before the run
    #[arg(short, long)]
    input: Option<String>,

    /// File whose bytes are queued on the UART receive path (after --input)
    #[arg(long)]
    input_file: Option<PathBuf>,

    /// Maximum number of instructions to execute
    #[arg(long, default_value = "1000000")]
    max_steps: u64,

    /// Stop once the firmware has polled an idle UART this many times in a row (0 disables)
    #[arg(long, default_value = "64")]
    idle_polls: u64,

    /// Breakpoint PC address (repeatable). Stops simulation when PC matches.
    #[arg(long, value_parser = parse_u32_addr)]
    breakpoint: Vec<u32>,

    /// Disable UART stdout echo
    #[arg(long)]
    no_uart_stdout: bool,
}

#[derive(Parser, Debug)]
struct CoeArgs {
    /// Firmware image (flat binary or ELF)
    #[arg(short, long, default_value = "firmware.bin")]
    input: PathBuf,

    /// Output .coe path
    #[arg(short, long, default_value = "firmware.coe")]
    output: PathBuf,

    /// Entry width in bits (8 or 32)
    #[arg(short, long, default_value = "8")]
    width: u32,
}

#[derive(Parser, Debug)]
struct ReferenceArgs {
    /// Output path for the flat binary
    #[arg(short, long, default_value = "firmware.bin")]
    output: PathBuf,

    /// UART base address the program talks to
    #[arg(long, default_value = "0x80000000", value_parser = parse_u32_addr)]
    base: u32,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // UART output owns stdout; diagnostics go to stderr.
    let level = if cli.trace {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run(args) => run_firmware(args),
        Commands::Test(args) => runner::run_test(args),
        Commands::Coe(args) => run_coe(args),
        Commands::Reference(args) => run_reference(args),
    }
}

pub(crate) fn load_board(board_path: Option<&Path>) -> anyhow::Result<BoardConfig> {
    match board_path {
        Some(path) => {
            info!("Loading board config: {:?}", path);
            BoardConfig::from_file(path)
        }
        None => {
            info!("Using default hardware configuration");
            Ok(BoardConfig::default())
        }
    }
}

/// Builds a machine for `board` with `program` loaded and the UART TX
/// captured into `uart_tx`.
pub(crate) fn build_machine(
    board: &BoardConfig,
    program: &ProgramImage,
    uart_tx: &Arc<Mutex<Vec<u8>>>,
    uart_stdout: bool,
) -> anyhow::Result<Machine<RiscV>> {
    let mut bus = SystemBus::from_config(board)?;
    bus.attach_uart_tx_sink(uart_tx.clone(), uart_stdout);

    if program.arch != rvecho_core::Arch::RiscV {
        warn!(
            "Architecture Mismatch! Board expects RV32I, but image is {:?}",
            program.arch
        );
    }

    let mut machine = Machine::new(RiscV::new(), bus);
    machine.reset_vector = board.reset_vector;
    machine.load_firmware(program)?;
    Ok(machine)
}

fn run_firmware(args: RunArgs) -> ExitCode {
    info!("Starting RvEcho Simulator");

    let board = match load_board(args.board.as_deref()) {
        Ok(board) => board,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    info!("Loading firmware: {:?}", args.firmware);
    let program = match rvecho_loader::load_image(&args.firmware, board.memory.base) {
        Ok(program) => program,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };
    info!("Entry Point: {:#x}", program.entry_point);

    let mut rx = args.input.unwrap_or_default().into_bytes();
    if let Some(path) = &args.input_file {
        match std::fs::read(path) {
            Ok(bytes) => rx.extend_from_slice(&bytes),
            Err(e) => {
                error!("Failed to read input file {:?}: {}", path, e);
                return ExitCode::from(EXIT_CONFIG_ERROR);
            }
        }
    }

    let uart_tx = Arc::new(Mutex::new(Vec::new()));
    let mut machine = match build_machine(&board, &program, &uart_tx, !args.no_uart_stdout) {
        Ok(machine) => machine,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };
    machine.breakpoints.extend(args.breakpoint.iter().copied());
    machine.feed_uart(&rx);

    let limits = RunLimits {
        max_steps: args.max_steps,
        idle_polls: (args.idle_polls > 0).then_some(args.idle_polls),
    };
    info!("Running for up to {} steps...", limits.max_steps);

    let outcome = machine.run(limits);
    let uart_bytes = uart_tx.lock().map(|g| g.len()).unwrap_or(0);

    info!("Simulation loop finished.");
    info!("Final PC: {:#x}", machine.cpu.get_pc());
    info!("Total Steps: {}", machine.steps);
    info!("UART bytes transmitted: {}", uart_bytes);
    if let Some(uart) = machine.bus.uart() {
        let stats = uart.stats();
        info!(
            "UART accesses: {} status polls, {} data reads, {} data writes",
            stats.status_reads, stats.data_reads, stats.data_writes
        );
    }

    match outcome {
        Ok(StopReason::Breakpoint(pc)) => {
            info!("Breakpoint hit at PC={:#x}", pc);
            ExitCode::from(EXIT_PASS)
        }
        Ok(StopReason::Idle) => {
            info!("Firmware idle: waiting for UART input");
            ExitCode::from(EXIT_PASS)
        }
        Ok(StopReason::MaxSteps) => {
            info!("Step limit reached");
            ExitCode::from(EXIT_PASS)
        }
        Err(e) => {
            error!("Simulation error: {}", e);
            ExitCode::from(EXIT_RUNTIME_ERROR)
        }
    }
}

fn run_coe(args: CoeArgs) -> ExitCode {
    let width = match CoeWidth::try_from(args.width) {
        Ok(width) => width,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    if !args.input.exists() {
        error!("Error: {:?} not found. Build the firmware first.", args.input);
        return ExitCode::from(EXIT_CONFIG_ERROR);
    }

    let image = match rvecho_loader::load_image(&args.input, 0) {
        Ok(image) => image,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };
    if let Some((start, end)) = image.span() {
        info!("Image spans {:#x}..{:#x}", start, end);
    }

    let bram = match parse_size(&BoardConfig::default().memory.size) {
        Ok(bram) => bram,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };
    let data = match rvecho_loader::flatten(&image, bram) {
        Ok(data) => data,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };
    if data.is_empty() {
        error!("{}", CoeError::EmptyImage);
        return ExitCode::from(EXIT_CONFIG_ERROR);
    }

    let result = std::fs::File::create(&args.output)
        .map_err(CoeError::from)
        .and_then(|f| rvecho_loader::write_coe(&mut BufWriter::new(f), &data, width));

    match result {
        Ok(entries) => {
            info!("Wrote {} entries", entries);
            println!(
                "Successfully created {} ({}-bit entries)",
                args.output.display(),
                width.bits()
            );
            ExitCode::from(EXIT_PASS)
        }
        Err(e) => {
            error!("Failed to write {:?}: {}", args.output, e);
            ExitCode::from(EXIT_RUNTIME_ERROR)
        }
    }
}

fn run_reference(args: ReferenceArgs) -> ExitCode {
    let code = rvecho_core::reference::echo_program(args.base, rvecho_core::reference::BANNER);
    match std::fs::write(&args.output, &code) {
        Ok(()) => {
            println!(
                "Wrote reference echo image to {} ({} bytes, UART at {:#010x})",
                args.output.display(),
                code.len(),
                args.base
            );
            ExitCode::from(EXIT_PASS)
        }
        Err(e) => {
            error!("Failed to write {:?}: {}", args.output, e);
            ExitCode::from(EXIT_RUNTIME_ERROR)
        }
    }
}
