// RvEcho - Soft-Core UART Echo Firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default schema version for YAML configs
fn default_schema_version() -> String {
    "1.0".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    #[serde(alias = "riscv32", alias = "rv32i")]
    RiscV,
    Unknown,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MemoryRange {
    pub base: u64,
    pub size: String, // e.g. "16KiB"
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UartConfig {
    pub base_address: u64,
    /// Ticks TX_READY stays low after each transmitted byte.
    #[serde(default)]
    pub tx_busy_cycles: u32,
}

/// Memory map of the soft-core SoC.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BoardConfig {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub name: String,
    pub arch: Arch,
    pub memory: MemoryRange,
    pub uart: UartConfig,
    #[serde(default)]
    pub reset_vector: Option<u32>,
}

impl Default for BoardConfig {
    /// Project 6: 16 KiB block RAM at 0, `simple_uart` at `0x8000_0000`.
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            name: "project6".to_string(),
            arch: Arch::RiscV,
            memory: MemoryRange {
                base: 0x0,
                size: "16 KiB".to_string(),
            },
            uart: UartConfig {
                base_address: 0x8000_0000,
                tx_busy_cycles: 0,
            },
            reset_vector: None,
        }
    }
}

impl BoardConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let f = std::fs::File::open(path)
            .with_context(|| format!("Failed to open board config at {:?}", path))?;
        let board: Self =
            serde_yaml::from_reader(f).context("Failed to parse Board Config YAML")?;
        board.validate()?;
        Ok(board)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != "1.0" {
            anyhow::bail!(
                "Unsupported schema_version '{}'. Supported versions: '1.0'",
                self.schema_version
            );
        }

        if self.arch != Arch::RiscV {
            anyhow::bail!("Board '{}' must use arch 'riscv'", self.name);
        }

        let ram_size = parse_size(&self.memory.size)?;
        if ram_size == 0 {
            anyhow::bail!("Memory size for board '{}' must be non-zero", self.name);
        }

        let ram_end = self.memory.base.saturating_add(ram_size);
        let uart = self.uart.base_address;
        if uart < ram_end && uart.saturating_add(8) > self.memory.base {
            anyhow::bail!(
                "UART at {:#x} overlaps RAM {:#x}..{:#x}",
                uart,
                self.memory.base,
                ram_end
            );
        }

        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct TestInputs {
    pub firmware: String,
    #[serde(default)]
    pub board: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct TestStimulus {
    /// Bytes queued on the UART receive path before the run starts.
    #[serde(default)]
    pub uart_rx: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct TestLimits {
    pub max_steps: u64,
    /// Consecutive idle UART polls that end the run; the runner uses 64 when unset.
    #[serde(default)]
    pub idle_polls: Option<u64>,
    /// PC values that stop the run with `breakpoint`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub breakpoints: Vec<u32>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Runner failed before simulation started (e.g. script parse/validation error).
    ConfigError,
    MaxSteps,
    Breakpoint,
    Idle,
    MemoryViolation,
    DecodeError,
    MisalignedFetch,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct UartContainsAssertion {
    pub uart_contains: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct UartEqualsAssertion {
    pub uart_equals: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct StopReasonAssertion {
    pub expected_stop_reason: StopReason,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(untagged)]
pub enum TestAssertion {
    UartContains(UartContainsAssertion),
    UartEquals(UartEqualsAssertion),
    ExpectedStopReason(StopReasonAssertion),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct TestScript {
    pub schema_version: String,
    pub inputs: TestInputs,
    #[serde(default)]
    pub stimulus: TestStimulus,
    pub limits: TestLimits,
    #[serde(default)]
    pub assertions: Vec<TestAssertion>,
}

impl TestScript {
    pub fn validate(&self) -> Result<()> {
        if self.schema_version != "1.0" {
            anyhow::bail!(
                "Unsupported schema_version '{}'. Supported versions: '1.0'",
                self.schema_version
            );
        }

        if self.inputs.firmware.trim().is_empty() {
            anyhow::bail!("Input 'firmware' path cannot be empty");
        }

        if self.limits.max_steps == 0 {
            anyhow::bail!("Limit 'max_steps' must be greater than zero");
        }

        if self.limits.idle_polls == Some(0) {
            anyhow::bail!("Limit 'idle_polls' must be greater than zero when set");
        }

        Ok(())
    }
}

/// Resolve `path` the way script inputs are written: relative to the
/// directory holding the script.
pub fn resolve_relative(script_path: &Path, path: &str) -> PathBuf {
    let candidate = PathBuf::from(path);
    if candidate.is_absolute() {
        return candidate;
    }
    script_path
        .parent()
        .map(|dir| dir.join(&candidate))
        .unwrap_or(candidate)
}

/// Load and validate a CI test script from YAML.
pub fn load_test_script<P: AsRef<Path>>(path: P) -> Result<TestScript> {
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read test script at {:?}", path.as_ref()))?;

    let script: TestScript = serde_yaml::from_str(&contents)
        .context("Failed to parse Test Script YAML (expected schema_version: \"1.0\")")?;
    script.validate()?;
    Ok(script)
}

/// Parse a human readable size such as `"16 KiB"`, `"16KiB"` or `"4096"`.
///
/// Binary multiples use the `KiB`/`MiB` spelling; `KB`/`MB` are decimal.
pub fn parse_size(size_str: &str) -> Result<u64> {
    use human_size::{Byte, Size, SpecificSize};

    let trimmed = size_str.trim();
    if let Ok(bytes) = trimmed.parse::<u64>() {
        return Ok(bytes);
    }

    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (value, unit) = trimmed.split_at(split);
    let normalized = format!("{} {}", value, unit.trim());

    let s: Size = normalized
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid size format '{}': {}", size_str, e))?;
    let bytes: SpecificSize<Byte> = s.into();
    Ok(bytes.value() as u64)
}
