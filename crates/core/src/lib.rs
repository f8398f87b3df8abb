// RvEcho - Soft-Core UART Echo Firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod bus;
pub mod cpu;
pub mod decoder;
pub mod encoder;
pub mod memory;
pub mod peripherals;
pub mod reference;

use std::any::Any;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Arch {
    RiscV,
    Unknown,
}

#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("Memory access violation at {0:#x}")]
    MemoryViolation(u64),
    #[error("Instruction decoding error at {0:#x}")]
    DecodeError(u64),
    #[error("Misaligned instruction fetch at {0:#x}")]
    MisalignedFetch(u64),
}

pub type SimResult<T> = Result<T, SimulationError>;

/// Trait representing a CPU architecture
pub trait Cpu: Send {
    fn reset(&mut self);
    fn step(&mut self, bus: &mut dyn Bus) -> SimResult<()>;
    fn set_pc(&mut self, val: u32);
    fn get_pc(&self) -> u32;
}

/// Trait representing a memory-mapped peripheral.
///
/// Access is byte-granular. `read` takes `&mut self` because reading a
/// FIFO-backed register consumes data.
pub trait Peripheral: std::fmt::Debug + Send {
    fn read(&mut self, offset: u64) -> SimResult<u8>;
    fn write(&mut self, offset: u64, value: u8) -> SimResult<()>;
    fn tick(&mut self) {}
    fn as_any(&self) -> Option<&dyn Any> {
        None
    }
    fn as_any_mut(&mut self) -> Option<&mut dyn Any> {
        None
    }
}

/// Trait representing the system bus
pub trait Bus {
    fn read_u8(&mut self, addr: u64) -> SimResult<u8>;
    fn write_u8(&mut self, addr: u64, value: u8) -> SimResult<()>;
    fn tick_peripherals(&mut self);

    fn read_u16(&mut self, addr: u64) -> SimResult<u16> {
        let b0 = self.read_u8(addr)? as u16;
        let b1 = self.read_u8(addr + 1)? as u16;
        // Little Endian
        Ok(b0 | (b1 << 8))
    }

    fn read_u32(&mut self, addr: u64) -> SimResult<u32> {
        let b0 = self.read_u8(addr)? as u32;
        let b1 = self.read_u8(addr + 1)? as u32;
        let b2 = self.read_u8(addr + 2)? as u32;
        let b3 = self.read_u8(addr + 3)? as u32;
        Ok(b0 | (b1 << 8) | (b2 << 16) | (b3 << 24))
    }

    fn write_u16(&mut self, addr: u64, value: u16) -> SimResult<()> {
        self.write_u8(addr, (value & 0xFF) as u8)?;
        self.write_u8(addr + 1, (value >> 8) as u8)?;
        Ok(())
    }

    fn write_u32(&mut self, addr: u64, value: u32) -> SimResult<()> {
        for (i, byte) in value.to_le_bytes().into_iter().enumerate() {
            self.write_u8(addr + i as u64, byte)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    MaxSteps,
    Breakpoint(u32),
    /// Firmware is parked waiting on the UART with nothing left to receive.
    Idle,
}

#[derive(Debug, Clone, Copy)]
pub struct RunLimits {
    pub max_steps: u64,
    /// Consecutive starved status polls that count as [`StopReason::Idle`].
    /// `None` disables idle detection.
    pub idle_polls: Option<u64>,
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            max_steps: 1_000_000,
            idle_polls: Some(64),
        }
    }
}

pub struct Machine<C: Cpu> {
    pub cpu: C,
    pub bus: bus::SystemBus,
    pub reset_vector: Option<u32>,

    // Debug state
    pub breakpoints: HashSet<u32>,
    pub steps: u64,
}

impl<C: Cpu> Machine<C> {
    pub fn new(cpu: C, bus: bus::SystemBus) -> Self {
        Self {
            cpu,
            bus,
            reset_vector: None,
            breakpoints: HashSet::new(),
            steps: 0,
        }
    }

    pub fn load_firmware(&mut self, image: &memory::ProgramImage) -> SimResult<()> {
        for segment in &image.segments {
            if !self.bus.ram.load_from_segment(segment) {
                tracing::warn!(
                    "Failed to load segment at {:#x} ({} bytes) - outside of memory map",
                    segment.start_addr,
                    segment.data.len()
                );
            }
        }

        self.reset();
        if self.reset_vector.is_none() {
            self.cpu.set_pc(image.entry_point as u32);
        }
        tracing::debug!("Reset PC: {:#x}", self.cpu.get_pc());

        Ok(())
    }

    pub fn reset(&mut self) {
        self.cpu.reset();
        self.steps = 0;
        if let Some(vector) = self.reset_vector {
            self.cpu.set_pc(vector);
        }
    }

    pub fn step(&mut self) -> SimResult<()> {
        let res = self.cpu.step(&mut self.bus);
        self.steps += 1;
        self.bus.tick_peripherals();
        res
    }

    /// Runs until a breakpoint, the step limit, or the firmware goes idle.
    pub fn run(&mut self, limits: RunLimits) -> SimResult<StopReason> {
        let mut executed: u64 = 0;
        loop {
            let pc = self.cpu.get_pc();
            if self.breakpoints.contains(&pc) {
                return Ok(StopReason::Breakpoint(pc));
            }
            if executed >= limits.max_steps {
                return Ok(StopReason::MaxSteps);
            }

            self.step()?;
            executed += 1;

            if let Some(threshold) = limits.idle_polls {
                let starved = self.bus.uart().map_or(0, |u| u.stats().starved_polls);
                if starved >= threshold {
                    return Ok(StopReason::Idle);
                }
            }
        }
    }

    /// Queues bytes on the UART receive path.
    pub fn feed_uart(&mut self, bytes: &[u8]) -> bool {
        match self.bus.uart_mut() {
            Some(uart) => {
                uart.push_rx(bytes);
                true
            }
            None => false,
        }
    }
}
