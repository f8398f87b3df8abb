// RvEcho - Soft-Core UART Echo Firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::regs::{Status, UartRegisters};

/// Polling UART driver.
///
/// Both primitives busy-wait on the status register with no timeout: a
/// peripheral that never raises its flag parks the caller forever.
#[derive(Debug)]
pub struct Uart<R> {
    regs: R,
}

impl<R: UartRegisters> Uart<R> {
    pub fn new(regs: R) -> Self {
        Self { regs }
    }

    /// Blocks until `RX_VALID`, then consumes exactly one byte.
    pub fn getchar(&mut self) -> u8 {
        while !self.regs.read_status().contains(Status::RX_VALID) {}
        self.regs.read_data()
    }

    /// Blocks until `TX_READY`, then hands `byte` to the transmitter.
    pub fn putchar(&mut self, byte: u8) {
        while !self.regs.read_status().contains(Status::TX_READY) {}
        self.regs.write_data(byte);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.putchar(b);
        }
    }

    pub fn registers(&self) -> &R {
        &self.regs
    }

    pub fn into_inner(self) -> R {
        self.regs
    }
}

impl<R: UartRegisters> core::fmt::Write for Uart<R> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        self.write_bytes(s.as_bytes());
        Ok(())
    }
}
