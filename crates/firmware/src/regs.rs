// RvEcho - Soft-Core UART Echo Firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! UART register map of the Project 6 SoC.
//!
//! The address decoder in the FPGA design places the `simple_uart` block at
//! [`UART_BASE`]. Both registers are 32 bits wide; only the low bits carry
//! meaning.

use core::ptr::{read_volatile, write_volatile};

/// Base address of the UART window (fixed by the hardware decoder).
pub const UART_BASE: usize = 0x8000_0000;
/// Data register: low byte is the payload in both directions.
pub const DATA_OFFSET: usize = 0x00;
/// Status register: read-only readiness flags.
pub const STATUS_OFFSET: usize = 0x04;

bitflags::bitflags! {
    /// Status register flags.
    ///
    /// Only these two bits exist in this design; anything else read back
    /// from the hardware is dropped by [`Status::from_bits_truncate`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Status: u32 {
        /// A received byte is waiting in the data register.
        const RX_VALID = 1 << 0;
        /// The transmitter can accept a new byte.
        const TX_READY = 1 << 1;
    }
}

/// Access to the two UART registers.
///
/// Every call must reach the peripheral exactly once: implementations may not
/// cache the status or batch data accesses.
pub trait UartRegisters {
    fn read_status(&mut self) -> Status;
    fn read_data(&mut self) -> u8;
    fn write_data(&mut self, byte: u8);
}

/// Memory-mapped register block at a fixed physical address.
#[derive(Debug)]
pub struct MmioUart {
    base: usize,
}

impl MmioUart {
    /// # Safety
    ///
    /// `base` must be the address of a `simple_uart` register window that is
    /// mapped for the whole lifetime of the returned handle, and no other
    /// handle to the same window may be used concurrently.
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }

    fn data_ptr(&self) -> *mut u32 {
        (self.base + DATA_OFFSET) as *mut u32
    }

    fn status_ptr(&self) -> *const u32 {
        (self.base + STATUS_OFFSET) as *const u32
    }
}

impl UartRegisters for MmioUart {
    fn read_status(&mut self) -> Status {
        // SAFETY: address validity is the contract of `MmioUart::new`.
        let raw = unsafe { read_volatile(self.status_ptr()) };
        Status::from_bits_truncate(raw)
    }

    fn read_data(&mut self) -> u8 {
        // SAFETY: see `read_status`.
        let raw = unsafe { read_volatile(self.data_ptr()) };
        (raw & 0xFF) as u8
    }

    fn write_data(&mut self, byte: u8) {
        // SAFETY: see `read_status`.
        unsafe { write_volatile(self.data_ptr(), byte as u32) }
    }
}
