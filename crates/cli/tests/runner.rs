// RvEcho - Soft-Core UART Echo Firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::path::Path;
use std::process::{Command, Output};

fn rvecho(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_rvecho"))
        .args(args)
        .output()
        .expect("Failed to execute command")
}

/// Reference firmware plus `script.yaml` in `dir`; returns the script path.
fn setup(dir: &Path, script: &str) -> String {
    let bin = dir.join("echo.bin");
    let output = rvecho(&["reference", "--output", bin.to_str().unwrap()]);
    assert!(output.status.success());

    let script_path = dir.join("script.yaml");
    std::fs::write(&script_path, script).unwrap();
    script_path.to_str().unwrap().to_string()
}

fn run_script(script: &str, output_dir: &Path) -> Output {
    rvecho(&[
        "test",
        "--script",
        script,
        "--no-uart-stdout",
        "--output-dir",
        output_dir.to_str().unwrap(),
    ])
}

fn read_result(output_dir: &Path) -> serde_json::Value {
    let text = std::fs::read_to_string(output_dir.join("result.json")).unwrap();
    serde_json::from_str(&text).unwrap()
}

#[test]
fn test_echo_script_passes() {
    let dir = tempfile::tempdir().unwrap();
    let script = setup(
        dir.path(),
        r#"
schema_version: "1.0"
inputs:
  firmware: "echo.bin"
stimulus:
  uart_rx: "A"
limits:
  max_steps: 100000
assertions:
  - uart_contains: "Booted! Echo is active."
  - uart_equals: "RISC-V Project 6 Booted! Echo is active.\r\nA"
  - expected_stop_reason: idle
"#,
    );
    let artifacts = dir.path().join("artifacts");

    let output = run_script(&script, &artifacts);
    assert_eq!(output.status.code(), Some(0), "{:?}", output);
    assert!(output.stdout.is_empty(), "UART echo must be disabled");

    let result = read_result(&artifacts);
    assert_eq!(result["result_schema_version"], "1.0");
    assert_eq!(result["status"], "pass");
    assert_eq!(result["stop_reason"], "idle");
    assert_eq!(result["assertions"].as_array().unwrap().len(), 3);
    assert_eq!(result["uart"]["data_reads"], 1);
    assert_eq!(result["firmware_hash"].as_str().unwrap().len(), 64);

    let uart_log = std::fs::read(artifacts.join("uart.log")).unwrap();
    assert_eq!(uart_log, b"RISC-V Project 6 Booted! Echo is active.\r\nA".to_vec());
}

#[test]
fn test_failed_assertion_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let script = setup(
        dir.path(),
        r#"
schema_version: "1.0"
inputs:
  firmware: "echo.bin"
limits:
  max_steps: 100000
assertions:
  - uart_contains: "never printed"
"#,
    );
    let artifacts = dir.path().join("artifacts");

    let output = run_script(&script, &artifacts);
    assert_eq!(output.status.code(), Some(1));

    let result = read_result(&artifacts);
    assert_eq!(result["status"], "fail");
    assert_eq!(result["assertions"][0]["passed"], false);
}

#[test]
fn test_max_steps_override() {
    let dir = tempfile::tempdir().unwrap();
    let script = setup(
        dir.path(),
        r#"
schema_version: "1.0"
inputs:
  firmware: "echo.bin"
limits:
  max_steps: 100000
assertions:
  - expected_stop_reason: max_steps
"#,
    );
    let artifacts = dir.path().join("artifacts");

    let output = rvecho(&[
        "test",
        "--script",
        &script,
        "--max-steps",
        "5",
        "--output-dir",
        artifacts.to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(0));

    let result = read_result(&artifacts);
    assert_eq!(result["steps_executed"], 5);
    assert_eq!(result["limits"]["max_steps"], 5);
}

#[test]
fn test_board_from_script_is_applied() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("board.yaml"),
        r#"
name: "slow-uart"
arch: "riscv"
memory:
  base: 0x0
  size: "16KiB"
uart:
  base_address: 0x80000000
  tx_busy_cycles: 40
"#,
    )
    .unwrap();
    let script = setup(
        dir.path(),
        r#"
schema_version: "1.0"
inputs:
  firmware: "echo.bin"
  board: "board.yaml"
stimulus:
  uart_rx: "xyz"
limits:
  max_steps: 500000
assertions:
  - uart_contains: "active.\r\nxyz"
  - expected_stop_reason: idle
"#,
    );
    let artifacts = dir.path().join("artifacts");

    let output = run_script(&script, &artifacts);
    assert_eq!(output.status.code(), Some(0), "{:?}", output);

    let result = read_result(&artifacts);
    assert!(result["config"]["board"]
        .as_str()
        .unwrap()
        .ends_with("board.yaml"));
    let polls = result["uart"]["status_reads"].as_u64().unwrap();
    let writes = result["uart"]["data_writes"].as_u64().unwrap();
    assert!(polls > writes * 5);
}

#[test]
fn test_invalid_script_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let script = setup(
        dir.path(),
        r#"
schema_version: "1.0"
inputs:
  firmware: "echo.bin"
limits:
  max_steps: 0
"#,
    );
    let artifacts = dir.path().join("artifacts");

    let output = run_script(&script, &artifacts);
    assert_eq!(output.status.code(), Some(2));

    let result = read_result(&artifacts);
    assert_eq!(result["status"], "error");
    assert_eq!(result["stop_reason"], "config_error");
    assert!(result["message"].as_str().unwrap().contains("max_steps"));
    assert!(artifacts.join("uart.log").exists());
}

#[test]
fn test_runtime_error_and_expected_fault() {
    let dir = tempfile::tempdir().unwrap();
    // An all-zero word is not a valid RV32I instruction.
    std::fs::write(dir.path().join("zeros.bin"), [0u8; 8]).unwrap();

    let script_path = dir.path().join("fault.yaml");
    std::fs::write(
        &script_path,
        r#"
schema_version: "1.0"
inputs:
  firmware: "zeros.bin"
limits:
  max_steps: 10
"#,
    )
    .unwrap();
    let artifacts = dir.path().join("artifacts");
    let output = run_script(script_path.to_str().unwrap(), &artifacts);
    assert_eq!(output.status.code(), Some(3));
    let result = read_result(&artifacts);
    assert_eq!(result["status"], "error");
    assert_eq!(result["stop_reason"], "decode_error");

    std::fs::write(
        &script_path,
        r#"
schema_version: "1.0"
inputs:
  firmware: "zeros.bin"
limits:
  max_steps: 10
assertions:
  - expected_stop_reason: decode_error
"#,
    )
    .unwrap();
    let output = run_script(script_path.to_str().unwrap(), &artifacts);
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(read_result(&artifacts)["status"], "pass");
}

#[test]
fn test_breakpoint_stop_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let script = setup(
        dir.path(),
        r#"
schema_version: "1.0"
inputs:
  firmware: "echo.bin"
limits:
  max_steps: 100000
  breakpoints: [0xC]
assertions:
  - expected_stop_reason: breakpoint
"#,
    );
    let artifacts = dir.path().join("artifacts");

    let output = run_script(&script, &artifacts);
    assert_eq!(output.status.code(), Some(0), "{:?}", output);

    let result = read_result(&artifacts);
    assert_eq!(result["status"], "pass");
    assert_eq!(result["stop_reason"], "breakpoint");
    assert_eq!(result["stop_pc"], 0xC);
    // lui, auipc, addi run before the print loop.
    assert_eq!(result["steps_executed"], 3);
    assert_eq!(result["limits"]["breakpoints"][0], 0xC);
    assert!(std::fs::read(artifacts.join("uart.log")).unwrap().is_empty());
}

#[test]
fn test_breakpoint_flag_adds_to_script() {
    let dir = tempfile::tempdir().unwrap();
    let script = setup(
        dir.path(),
        r#"
schema_version: "1.0"
inputs:
  firmware: "echo.bin"
limits:
  max_steps: 100000
"#,
    );
    let artifacts = dir.path().join("artifacts");

    let output = rvecho(&[
        "test",
        "--script",
        &script,
        "--breakpoint",
        "0x8",
        "--no-uart-stdout",
        "--output-dir",
        artifacts.to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(0), "{:?}", output);

    let result = read_result(&artifacts);
    assert_eq!(result["stop_reason"], "breakpoint");
    assert_eq!(result["stop_pc"], 8);
    assert_eq!(result["steps_executed"], 2);
}
