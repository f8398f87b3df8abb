// RvEcho - Soft-Core UART Echo Firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Firmware logic for the Project 6 soft-core.
//!
//! Everything here is target-independent: the register block is reached
//! through [`regs::UartRegisters`], so the same code runs against the real
//! MMIO window on the FPGA and against scripted peripherals in host tests.
#![cfg_attr(not(test), no_std)]

pub mod app;
pub mod regs;
pub mod uart;

#[cfg(test)]
mod testutil;

pub use app::{boot, echo_once, run, BANNER};
pub use regs::{MmioUart, Status, UartRegisters, UART_BASE};
pub use uart::Uart;
