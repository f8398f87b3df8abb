// RvEcho - Soft-Core UART Echo Firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::SimResult;
use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

pub const DATA_OFFSET: u64 = 0x00;
pub const STATUS_OFFSET: u64 = 0x04;
/// Two 32-bit registers.
pub const WINDOW_SIZE: u64 = 0x08;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct UartStatus: u32 {
        const RX_VALID = 1 << 0;
        const TX_READY = 1 << 1;
    }
}

/// Access counters, exported with run results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct UartStats {
    pub status_reads: u64,
    pub data_reads: u64,
    pub data_writes: u64,
    /// Status polls in a row that found nothing to receive and an idle
    /// transmitter. Any data access or new input resets it.
    pub starved_polls: u64,
}

/// Model of the FPGA `simple_uart`: one-byte data register plus a two-flag
/// status register. The receive side is fed by the host.
#[derive(Debug, Default)]
pub struct SoftUart {
    rx: VecDeque<u8>,
    tx_busy_cycles: u32,
    tx_busy: u32,
    sink: Option<Arc<Mutex<Vec<u8>>>>,
    echo_stdout: bool,
    stats: UartStats,
}

impl SoftUart {
    pub fn new() -> Self {
        Self::default()
    }

    /// After each transmitted byte TX_READY stays low for `cycles` ticks.
    pub fn with_tx_busy_cycles(mut self, cycles: u32) -> Self {
        self.tx_busy_cycles = cycles;
        self
    }

    pub fn set_sink(&mut self, sink: Option<Arc<Mutex<Vec<u8>>>>, echo_stdout: bool) {
        self.sink = sink;
        self.echo_stdout = echo_stdout;
    }

    pub fn push_rx(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes.iter().copied());
        self.stats.starved_polls = 0;
    }

    pub fn rx_pending(&self) -> usize {
        self.rx.len()
    }

    pub fn stats(&self) -> UartStats {
        self.stats
    }

    pub fn status(&self) -> UartStatus {
        let mut status = UartStatus::empty();
        if !self.rx.is_empty() {
            status |= UartStatus::RX_VALID;
        }
        if self.tx_busy == 0 {
            status |= UartStatus::TX_READY;
        }
        status
    }

    fn transmit(&mut self, value: u8) {
        self.stats.data_writes += 1;
        self.stats.starved_polls = 0;
        self.tx_busy = self.tx_busy_cycles;

        if let Some(sink) = &self.sink {
            if let Ok(mut guard) = sink.lock() {
                guard.push(value);
            }
        }

        if self.echo_stdout {
            let mut out = io::stdout();
            // Best effort; a closed stdout must not stop the simulation.
            let _ = out.write_all(&[value]).and_then(|_| out.flush());
        }
    }

    fn receive(&mut self) -> u8 {
        self.stats.data_reads += 1;
        self.stats.starved_polls = 0;
        match self.rx.pop_front() {
            Some(byte) => byte,
            None => {
                tracing::debug!("UART data read with empty receive queue");
                0
            }
        }
    }
}

impl crate::Peripheral for SoftUart {
    fn read(&mut self, offset: u64) -> SimResult<u8> {
        Ok(match offset {
            DATA_OFFSET => self.receive(),
            STATUS_OFFSET => {
                let status = self.status();
                self.stats.status_reads += 1;
                if status == UartStatus::TX_READY {
                    self.stats.starved_polls += 1;
                } else {
                    self.stats.starved_polls = 0;
                }
                status.bits() as u8
            }
            // Upper bytes of either word read as zero without side effects.
            _ => 0,
        })
    }

    fn write(&mut self, offset: u64, value: u8) -> SimResult<()> {
        if offset == DATA_OFFSET {
            self.transmit(value);
        }
        Ok(())
    }

    fn tick(&mut self) {
        self.tx_busy = self.tx_busy.saturating_sub(1);
    }

    fn as_any(&self) -> Option<&dyn std::any::Any> {
        Some(self)
    }

    fn as_any_mut(&mut self) -> Option<&mut dyn std::any::Any> {
        Some(self)
    }
}
