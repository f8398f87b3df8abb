// RvEcho - Soft-Core UART Echo Firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! RV32I instruction encoding, the inverse of [`crate::decoder::riscv`].
//!
//! Operand order follows assembler syntax (`sw rs2, imm(rs1)` becomes
//! `sw(rs2, rs1, imm)`). Immediates out of range for their format panic.

fn check_signed(imm: i32, bits: u32, what: &str) {
    let min = -(1i32 << (bits - 1));
    let max = (1i32 << (bits - 1)) - 1;
    assert!(
        (min..=max).contains(&imm),
        "{} immediate {} does not fit in {} bits",
        what,
        imm,
        bits
    );
}

fn r_type(funct7: u32, rs2: u8, rs1: u8, funct3: u32, rd: u8, opcode: u32) -> u32 {
    (funct7 << 25)
        | ((rs2 as u32) << 20)
        | ((rs1 as u32) << 15)
        | (funct3 << 12)
        | ((rd as u32) << 7)
        | opcode
}

fn i_type(imm: i32, rs1: u8, funct3: u32, rd: u8, opcode: u32) -> u32 {
    check_signed(imm, 12, "I-type");
    (((imm as u32) & 0xFFF) << 20)
        | ((rs1 as u32) << 15)
        | (funct3 << 12)
        | ((rd as u32) << 7)
        | opcode
}

fn s_type(imm: i32, rs2: u8, rs1: u8, funct3: u32) -> u32 {
    check_signed(imm, 12, "S-type");
    let imm = imm as u32;
    (((imm >> 5) & 0x7F) << 25)
        | ((rs2 as u32) << 20)
        | ((rs1 as u32) << 15)
        | (funct3 << 12)
        | ((imm & 0x1F) << 7)
        | 0x23
}

fn b_type(offset: i32, rs2: u8, rs1: u8, funct3: u32) -> u32 {
    check_signed(offset, 13, "B-type");
    assert_eq!(offset & 1, 0, "branch offset {} is odd", offset);
    let imm = offset as u32;
    (((imm >> 12) & 0x1) << 31)
        | (((imm >> 5) & 0x3F) << 25)
        | ((rs2 as u32) << 20)
        | ((rs1 as u32) << 15)
        | (funct3 << 12)
        | (((imm >> 1) & 0xF) << 8)
        | (((imm >> 11) & 0x1) << 7)
        | 0x63
}

pub fn lui(rd: u8, upper: u32) -> u32 {
    assert!(upper <= 0xFFFFF, "LUI immediate {:#x} exceeds 20 bits", upper);
    (upper << 12) | ((rd as u32) << 7) | 0x37
}

pub fn auipc(rd: u8, upper: u32) -> u32 {
    assert!(upper <= 0xFFFFF, "AUIPC immediate {:#x} exceeds 20 bits", upper);
    (upper << 12) | ((rd as u32) << 7) | 0x17
}

pub fn jal(rd: u8, offset: i32) -> u32 {
    check_signed(offset, 21, "J-type");
    assert_eq!(offset & 1, 0, "jump offset {} is odd", offset);
    let imm = offset as u32;
    (((imm >> 20) & 0x1) << 31)
        | (((imm >> 1) & 0x3FF) << 21)
        | (((imm >> 11) & 0x1) << 20)
        | (((imm >> 12) & 0xFF) << 12)
        | ((rd as u32) << 7)
        | 0x6F
}

pub fn jalr(rd: u8, rs1: u8, imm: i32) -> u32 {
    i_type(imm, rs1, 0, rd, 0x67)
}

pub fn beq(rs1: u8, rs2: u8, offset: i32) -> u32 {
    b_type(offset, rs2, rs1, 0)
}

pub fn bne(rs1: u8, rs2: u8, offset: i32) -> u32 {
    b_type(offset, rs2, rs1, 1)
}

pub fn lb(rd: u8, rs1: u8, imm: i32) -> u32 {
    i_type(imm, rs1, 0, rd, 0x03)
}

pub fn lw(rd: u8, rs1: u8, imm: i32) -> u32 {
    i_type(imm, rs1, 2, rd, 0x03)
}

pub fn lbu(rd: u8, rs1: u8, imm: i32) -> u32 {
    i_type(imm, rs1, 4, rd, 0x03)
}

pub fn sb(rs2: u8, rs1: u8, imm: i32) -> u32 {
    s_type(imm, rs2, rs1, 0)
}

pub fn sw(rs2: u8, rs1: u8, imm: i32) -> u32 {
    s_type(imm, rs2, rs1, 2)
}

pub fn addi(rd: u8, rs1: u8, imm: i32) -> u32 {
    i_type(imm, rs1, 0, rd, 0x13)
}

pub fn andi(rd: u8, rs1: u8, imm: i32) -> u32 {
    i_type(imm, rs1, 7, rd, 0x13)
}

pub fn add(rd: u8, rs1: u8, rs2: u8) -> u32 {
    r_type(0x00, rs2, rs1, 0, rd, 0x33)
}

pub fn csrrw(rd: u8, csr: u16, rs1: u8) -> u32 {
    r_type(0, 0, rs1, 1, rd, 0x73) | ((csr as u32) << 20)
}

pub fn csrrs(rd: u8, csr: u16, rs1: u8) -> u32 {
    r_type(0, 0, rs1, 2, rd, 0x73) | ((csr as u32) << 20)
}

pub fn ecall() -> u32 {
    0x0000_0073
}

pub fn mret() -> u32 {
    0x3020_0073
}

/// Append-only code buffer with back-patching for forward branches.
#[derive(Debug, Default, Clone)]
pub struct Assembler {
    code: Vec<u8>,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Byte offset of the next emitted item.
    pub fn here(&self) -> usize {
        self.code.len()
    }

    pub fn emit(&mut self, word: u32) -> usize {
        let at = self.here();
        self.code.extend_from_slice(&word.to_le_bytes());
        at
    }

    pub fn emit_bytes(&mut self, bytes: &[u8]) -> usize {
        let at = self.here();
        self.code.extend_from_slice(bytes);
        at
    }

    /// Overwrites the instruction word previously emitted at `at`.
    pub fn patch(&mut self, at: usize, word: u32) {
        self.code[at..at + 4].copy_from_slice(&word.to_le_bytes());
    }

    /// Signed distance from `from` to `to`, for PC-relative operands.
    pub fn offset(from: usize, to: usize) -> i32 {
        to as i32 - from as i32
    }

    pub fn finish(self) -> Vec<u8> {
        self.code
    }
}
