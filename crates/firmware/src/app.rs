// RvEcho - Soft-Core UART Echo Firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::regs::UartRegisters;
use crate::uart::Uart;

/// Greeting sent once after reset. Carries its own CR/LF.
pub const BANNER: &[u8] = b"RISC-V Project 6 Booted! Echo is active.\r\n";

/// Sends [`BANNER`].
pub fn boot<R: UartRegisters>(uart: &mut Uart<R>) {
    uart.write_bytes(BANNER);
}

/// One round of the echo loop: wait for a byte and send it straight back.
pub fn echo_once<R: UartRegisters>(uart: &mut Uart<R>) -> u8 {
    let c = uart.getchar();
    uart.putchar(c);
    c
}

/// Firmware main: banner, then echo forever.
pub fn run<R: UartRegisters>(uart: &mut Uart<R>) -> ! {
    boot(uart);
    loop {
        echo_once(uart);
    }
}
