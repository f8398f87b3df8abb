// RvEcho - Soft-Core UART Echo Firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.
#![no_std]
#![no_main]

use panic_halt as _;
use riscv_rt::entry;
use rvecho_firmware::{MmioUart, Uart, UART_BASE};

#[entry]
fn main() -> ! {
    // SAFETY: UART_BASE is the decoder-assigned window and this is the only
    // handle ever created for it.
    let regs = unsafe { MmioUart::new(UART_BASE) };
    let mut uart = Uart::new(regs);
    rvecho_firmware::run(&mut uart)
}
