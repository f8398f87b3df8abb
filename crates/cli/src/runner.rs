// RvEcho - Soft-Core UART Echo Firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use clap::Parser;
use rvecho_config::{
    load_test_script, resolve_relative, StopReason, TestAssertion, TestLimits, TestScript,
};
use rvecho_core::peripherals::UartStats;
use rvecho_core::{RunLimits, SimulationError};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use tracing::{error, info};

use crate::{EXIT_ASSERT_FAIL, EXIT_CONFIG_ERROR, EXIT_PASS, EXIT_RUNTIME_ERROR};

const RESULT_SCHEMA_VERSION: &str = "1.0";

/// Guard against accidentally huge runs from CI misconfiguration.
const MAX_ALLOWED_STEPS: u64 = 50_000_000;

#[derive(Parser, Debug)]
pub struct TestArgs {
    /// Path to the test script (YAML)
    #[arg(short = 'c', long)]
    script: PathBuf,

    /// Firmware image; overrides inputs.firmware from the script
    #[arg(short = 'f', long)]
    firmware: Option<PathBuf>,

    /// Board description; overrides inputs.board from the script
    #[arg(short = 'b', long)]
    board: Option<PathBuf>,

    /// Override max steps (takes precedence over script)
    #[arg(long)]
    max_steps: Option<u64>,

    /// Breakpoint PC address (repeatable); added to limits.breakpoints.
    #[arg(long, value_parser = crate::parse_u32_addr)]
    breakpoint: Vec<u32>,

    /// Disable UART stdout echo (still captured for assertions/artifacts)
    #[arg(long)]
    no_uart_stdout: bool,

    /// Directory to write test artifacts (result.json, uart.log)
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct TestResult {
    result_schema_version: String,
    status: String,
    steps_executed: u64,
    stop_reason: StopReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_pc: Option<u32>,
    limits: TestLimits,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    assertions: Vec<AssertionResult>,
    uart: UartStats,
    firmware_hash: String,
    config: TestConfig,
}

#[derive(Debug, Serialize, Clone)]
struct AssertionResult {
    assertion: TestAssertion,
    passed: bool,
}

#[derive(Debug, Serialize, Default)]
struct TestConfig {
    firmware: PathBuf,
    board: Option<PathBuf>,
    script: PathBuf,
}

/// Everything the artifacts need besides the captured UART bytes.
struct Outcome {
    status: &'static str,
    steps_executed: u64,
    stop_reason: StopReason,
    stop_pc: Option<u32>,
    limits: TestLimits,
    message: Option<String>,
    assertions: Vec<AssertionResult>,
    uart: UartStats,
    firmware_hash: String,
    config: TestConfig,
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn stop_reason_for_error(e: &SimulationError) -> StopReason {
    match e {
        SimulationError::MemoryViolation(_) => StopReason::MemoryViolation,
        SimulationError::DecodeError(_) => StopReason::DecodeError,
        SimulationError::MisalignedFetch(_) => StopReason::MisalignedFetch,
    }
}

fn evaluate(assertion: &TestAssertion, uart: &[u8], stop_reason: StopReason) -> bool {
    match assertion {
        TestAssertion::UartContains(a) => {
            String::from_utf8_lossy(uart).contains(a.uart_contains.as_str())
        }
        TestAssertion::UartEquals(a) => uart == a.uart_equals.as_bytes(),
        TestAssertion::ExpectedStopReason(a) => a.expected_stop_reason == stop_reason,
    }
}

fn config_error(
    args: &TestArgs,
    config: TestConfig,
    limits: Option<TestLimits>,
    message: String,
) -> ExitCode {
    error!("{}", message);
    let outcome = Outcome {
        status: "error",
        steps_executed: 0,
        stop_reason: StopReason::ConfigError,
        stop_pc: None,
        limits: limits.unwrap_or(TestLimits {
            max_steps: 0,
            idle_polls: None,
            breakpoints: Vec::new(),
        }),
        message: Some(message),
        assertions: Vec::new(),
        uart: UartStats::default(),
        firmware_hash: String::new(),
        config,
    };
    write_outputs(args, outcome, &[]);
    ExitCode::from(EXIT_CONFIG_ERROR)
}

pub fn run_test(args: TestArgs) -> ExitCode {
    let script: TestScript = match load_test_script(&args.script) {
        Ok(s) => s,
        Err(e) => {
            let config = TestConfig {
                script: args.script.clone(),
                board: args.board.clone(),
                ..TestConfig::default()
            };
            return config_error(&args, config, None, format!("{:#}", e));
        }
    };

    let mut breakpoints = script.limits.breakpoints.clone();
    for pc in &args.breakpoint {
        if !breakpoints.contains(pc) {
            breakpoints.push(*pc);
        }
    }
    let limits = TestLimits {
        max_steps: args.max_steps.unwrap_or(script.limits.max_steps),
        idle_polls: script.limits.idle_polls,
        breakpoints,
    };

    let firmware_path = args
        .firmware
        .clone()
        .unwrap_or_else(|| resolve_relative(&args.script, &script.inputs.firmware));
    let board_path = args.board.clone().or_else(|| {
        script
            .inputs
            .board
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(|s| resolve_relative(&args.script, s))
    });
    let config = TestConfig {
        firmware: firmware_path.clone(),
        board: board_path.clone(),
        script: args.script.clone(),
    };

    if limits.max_steps > MAX_ALLOWED_STEPS {
        let msg = format!(
            "max_steps {} exceeds MAX_ALLOWED_STEPS {}",
            limits.max_steps, MAX_ALLOWED_STEPS
        );
        return config_error(&args, config, Some(limits), msg);
    }

    let board = match crate::load_board(board_path.as_deref()) {
        Ok(board) => board,
        Err(e) => return config_error(&args, config, Some(limits), format!("{:#}", e)),
    };

    let firmware_bytes = match std::fs::read(&firmware_path) {
        Ok(b) => b,
        Err(e) => {
            let msg = format!("Failed to read firmware {:?}: {}", firmware_path, e);
            return config_error(&args, config, Some(limits), msg);
        }
    };
    let firmware_hash = sha256_hex(&firmware_bytes);

    let program = match rvecho_loader::load_image(&firmware_path, board.memory.base) {
        Ok(program) => program,
        Err(e) => return config_error(&args, config, Some(limits), format!("{:#}", e)),
    };

    let uart_tx = Arc::new(Mutex::new(Vec::new()));
    let mut machine =
        match crate::build_machine(&board, &program, &uart_tx, !args.no_uart_stdout) {
            Ok(machine) => machine,
            Err(e) => return config_error(&args, config, Some(limits), format!("{:#}", e)),
        };
    machine.feed_uart(script.stimulus.uart_rx.as_bytes());
    machine.breakpoints.extend(limits.breakpoints.iter().copied());

    let run_limits = RunLimits {
        max_steps: limits.max_steps,
        idle_polls: limits.idle_polls.or(RunLimits::default().idle_polls),
    };
    info!(
        "Running {:?} for up to {} steps",
        firmware_path, run_limits.max_steps
    );

    let (stop_reason, stop_pc, sim_error) = match machine.run(run_limits) {
        Ok(rvecho_core::StopReason::MaxSteps) => (StopReason::MaxSteps, None, None),
        Ok(rvecho_core::StopReason::Idle) => (StopReason::Idle, None, None),
        Ok(rvecho_core::StopReason::Breakpoint(pc)) => (StopReason::Breakpoint, Some(pc), None),
        Err(e) => {
            error!("Simulation error at step {}: {}", machine.steps, e);
            (stop_reason_for_error(&e), None, Some(e.to_string()))
        }
    };

    let uart_bytes = uart_tx.lock().map(|g| g.clone()).unwrap_or_default();

    let mut all_passed = true;
    let mut expected_stop_reason_matched = false;
    let mut assertions = Vec::new();
    for assertion in &script.assertions {
        let passed = evaluate(assertion, &uart_bytes, stop_reason);
        if matches!(assertion, TestAssertion::ExpectedStopReason(_)) && passed {
            expected_stop_reason_matched = true;
        }
        if !passed {
            all_passed = false;
            error!(
                "Assertion failed: {:?} (captured len={})",
                assertion,
                uart_bytes.len()
            );
        }
        assertions.push(AssertionResult {
            assertion: assertion.clone(),
            passed,
        });
    }

    let (status, code) = if !all_passed {
        ("fail", EXIT_ASSERT_FAIL)
    } else if sim_error.is_some() && !expected_stop_reason_matched {
        ("error", EXIT_RUNTIME_ERROR)
    } else {
        ("pass", EXIT_PASS)
    };
    info!("Test {}: stopped with {:?} after {} steps", status, stop_reason, machine.steps);

    let outcome = Outcome {
        status,
        steps_executed: machine.steps,
        stop_reason,
        stop_pc,
        limits,
        message: sim_error,
        assertions,
        uart: machine.bus.uart().map(|u| u.stats()).unwrap_or_default(),
        firmware_hash,
        config,
    };
    write_outputs(&args, outcome, &uart_bytes);

    ExitCode::from(code)
}

fn write_outputs(args: &TestArgs, outcome: Outcome, uart_bytes: &[u8]) {
    let Some(output_dir) = &args.output_dir else {
        return;
    };
    if let Err(e) = std::fs::create_dir_all(output_dir) {
        error!("Failed to create output directory {:?}: {}", output_dir, e);
        return;
    }

    let result = TestResult {
        result_schema_version: RESULT_SCHEMA_VERSION.to_string(),
        status: outcome.status.to_string(),
        steps_executed: outcome.steps_executed,
        stop_reason: outcome.stop_reason,
        stop_pc: outcome.stop_pc,
        limits: outcome.limits,
        message: outcome.message,
        assertions: outcome.assertions,
        uart: outcome.uart,
        firmware_hash: outcome.firmware_hash,
        config: outcome.config,
    };

    write_result_json(&output_dir.join("result.json"), &result);

    let uart_path = output_dir.join("uart.log");
    if let Err(e) = std::fs::write(&uart_path, uart_bytes) {
        error!("Failed to write uart.log: {}", e);
    }
}

fn write_result_json(path: &Path, result: &TestResult) {
    match std::fs::File::create(path) {
        Ok(f) => {
            if let Err(e) = serde_json::to_writer_pretty(f, result) {
                error!("Failed to write result.json: {}", e);
            }
        }
        Err(e) => error!("Failed to create result.json: {}", e),
    }
}
