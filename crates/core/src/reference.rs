// RvEcho - Soft-Core UART Echo Firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Hand-assembled RV32I build of the echo firmware.
//!
//! The image prints the boot banner and then echoes every received byte,
//! polling the same status bits in the same order as the Rust firmware.
//! It needs no cross toolchain, so it is what the simulator tests and the
//! `.coe` smoke test run.

use crate::encoder::*;
use crate::memory::ProgramImage;
use crate::Arch;

pub const BANNER: &[u8] = b"RISC-V Project 6 Booted! Echo is active.\r\n";
pub const DEFAULT_UART_BASE: u32 = 0x8000_0000;

const RX_VALID: i32 = 0b01;
const TX_READY: i32 = 0b10;

// Register allocation.
const UART: u8 = 5; // t0
const PTR: u8 = 6; // t1
const CH: u8 = 7; // t2
const ST: u8 = 28; // t3

/// `lui`/`addi` pair for an arbitrary 32-bit constant.
fn split_hi_lo(value: u32) -> (u32, i32) {
    let hi = value.wrapping_add(0x800) >> 12;
    let lo = value.wrapping_sub(hi << 12) as i32;
    (hi & 0xFFFFF, lo)
}

/// Spin until `mask` is set in the status register.
fn emit_wait(asm: &mut Assembler, mask: i32) {
    let top = asm.here();
    asm.emit(lw(ST, UART, 4));
    asm.emit(andi(ST, ST, mask));
    let branch = asm.here();
    asm.emit(beq(ST, 0, Assembler::offset(branch, top)));
}

/// Assembles the echo program for a UART mapped at `uart_base`.
///
/// The code is position independent; the NUL-terminated `banner` is placed
/// directly after it.
pub fn echo_program(uart_base: u32, banner: &[u8]) -> Vec<u8> {
    let mut asm = Assembler::new();

    let (hi, lo) = split_hi_lo(uart_base);
    asm.emit(lui(UART, hi));
    if lo != 0 {
        asm.emit(addi(UART, UART, lo));
    }
    let anchor = asm.emit(auipc(PTR, 0));
    let banner_addi = asm.emit(0);

    // Boot: print the banner one byte at a time.
    let print_loop = asm.here();
    asm.emit(lbu(CH, PTR, 0));
    let to_echo = asm.emit(0);
    emit_wait(&mut asm, TX_READY);
    asm.emit(sw(CH, UART, 0));
    asm.emit(addi(PTR, PTR, 1));
    let back = asm.here();
    asm.emit(jal(0, Assembler::offset(back, print_loop)));

    // Echo forever.
    let echo_loop = asm.here();
    emit_wait(&mut asm, RX_VALID);
    asm.emit(lw(CH, UART, 0));
    asm.emit(andi(CH, CH, 0xFF));
    emit_wait(&mut asm, TX_READY);
    asm.emit(sw(CH, UART, 0));
    let back = asm.here();
    asm.emit(jal(0, Assembler::offset(back, echo_loop)));

    let text = asm.emit_bytes(banner);
    asm.emit_bytes(&[0]);

    asm.patch(
        banner_addi,
        addi(PTR, PTR, Assembler::offset(anchor, text)),
    );
    asm.patch(to_echo, beq(CH, 0, Assembler::offset(to_echo, echo_loop)));

    asm.finish()
}

/// The echo program with the default banner, loaded at `load_addr`.
pub fn echo_image(uart_base: u32, load_addr: u32) -> ProgramImage {
    let mut image = ProgramImage::new(load_addr as u64, Arch::RiscV);
    image.add_segment(load_addr as u64, echo_program(uart_base, BANNER));
    image
}
