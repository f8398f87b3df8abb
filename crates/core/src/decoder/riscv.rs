// RvEcho - Soft-Core UART Echo Firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! RV32I base integer set plus the machine-mode bits (Zicsr, MRET, WFI) the
//! `riscv-rt` start-up code touches.

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BranchCond {
    Eq,
    Ne,
    Lt,
    Ge,
    Ltu,
    Geu,
}

impl BranchCond {
    pub fn taken(self, a: u32, b: u32) -> bool {
        match self {
            BranchCond::Eq => a == b,
            BranchCond::Ne => a != b,
            BranchCond::Lt => (a as i32) < (b as i32),
            BranchCond::Ge => (a as i32) >= (b as i32),
            BranchCond::Ltu => a < b,
            BranchCond::Geu => a >= b,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum LoadWidth {
    Byte,
    Half,
    Word,
    ByteUnsigned,
    HalfUnsigned,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum StoreWidth {
    Byte,
    Half,
    Word,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum AluOp {
    Add,
    Sub,
    Sll,
    Slt,
    Sltu,
    Xor,
    Srl,
    Sra,
    Or,
    And,
}

impl AluOp {
    pub fn apply(self, a: u32, b: u32) -> u32 {
        let shamt = b & 0x1F;
        match self {
            AluOp::Add => a.wrapping_add(b),
            AluOp::Sub => a.wrapping_sub(b),
            AluOp::Sll => a << shamt,
            AluOp::Slt => ((a as i32) < (b as i32)) as u32,
            AluOp::Sltu => (a < b) as u32,
            AluOp::Xor => a ^ b,
            AluOp::Srl => a >> shamt,
            AluOp::Sra => ((a as i32) >> shamt) as u32,
            AluOp::Or => a | b,
            AluOp::And => a & b,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CsrOp {
    ReadWrite,
    ReadSet,
    ReadClear,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CsrSource {
    Reg(u8),
    Imm(u8),
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Instruction {
    Lui { rd: u8, imm: u32 },
    Auipc { rd: u8, imm: u32 },
    Jal { rd: u8, imm: i32 },
    Jalr { rd: u8, rs1: u8, imm: i32 },
    Branch { cond: BranchCond, rs1: u8, rs2: u8, imm: i32 },
    Load { width: LoadWidth, rd: u8, rs1: u8, imm: i32 },
    Store { width: StoreWidth, rs1: u8, rs2: u8, imm: i32 },
    /// Register-immediate ALU op. For shifts `imm` is the shift amount.
    OpImm { op: AluOp, rd: u8, rs1: u8, imm: i32 },
    Op { op: AluOp, rd: u8, rs1: u8, rs2: u8 },
    Fence,
    Ecall,
    Ebreak,
    Mret,
    Wfi,
    Csr { op: CsrOp, rd: u8, src: CsrSource, csr: u16 },
    Unknown(u32),
}

fn imm_i(inst: u32) -> i32 {
    (inst as i32) >> 20
}

fn imm_s(inst: u32) -> i32 {
    (((inst as i32) >> 25) << 5) | ((inst >> 7) & 0x1F) as i32
}

fn imm_b(inst: u32) -> i32 {
    (((inst as i32) >> 31) << 12)
        | (((inst >> 7) & 0x1) << 11) as i32
        | (((inst >> 25) & 0x3F) << 5) as i32
        | (((inst >> 8) & 0xF) << 1) as i32
}

fn imm_j(inst: u32) -> i32 {
    (((inst as i32) >> 31) << 20)
        | (((inst >> 12) & 0xFF) << 12) as i32
        | (((inst >> 20) & 0x1) << 11) as i32
        | (((inst >> 21) & 0x3FF) << 1) as i32
}

pub fn decode_rv32(inst: u32) -> Instruction {
    let opcode = inst & 0x7F;
    let rd = ((inst >> 7) & 0x1F) as u8;
    let funct3 = (inst >> 12) & 0x7;
    let rs1 = ((inst >> 15) & 0x1F) as u8;
    let rs2 = ((inst >> 20) & 0x1F) as u8;
    let funct7 = inst >> 25;

    match opcode {
        0x37 => Instruction::Lui {
            rd,
            imm: inst & 0xFFFF_F000,
        },
        0x17 => Instruction::Auipc {
            rd,
            imm: inst & 0xFFFF_F000,
        },
        0x6F => Instruction::Jal {
            rd,
            imm: imm_j(inst),
        },
        0x67 if funct3 == 0 => Instruction::Jalr {
            rd,
            rs1,
            imm: imm_i(inst),
        },
        0x63 => {
            let cond = match funct3 {
                0 => BranchCond::Eq,
                1 => BranchCond::Ne,
                4 => BranchCond::Lt,
                5 => BranchCond::Ge,
                6 => BranchCond::Ltu,
                7 => BranchCond::Geu,
                _ => return Instruction::Unknown(inst),
            };
            Instruction::Branch {
                cond,
                rs1,
                rs2,
                imm: imm_b(inst),
            }
        }
        0x03 => {
            let width = match funct3 {
                0 => LoadWidth::Byte,
                1 => LoadWidth::Half,
                2 => LoadWidth::Word,
                4 => LoadWidth::ByteUnsigned,
                5 => LoadWidth::HalfUnsigned,
                _ => return Instruction::Unknown(inst),
            };
            Instruction::Load {
                width,
                rd,
                rs1,
                imm: imm_i(inst),
            }
        }
        0x23 => {
            let width = match funct3 {
                0 => StoreWidth::Byte,
                1 => StoreWidth::Half,
                2 => StoreWidth::Word,
                _ => return Instruction::Unknown(inst),
            };
            Instruction::Store {
                width,
                rs1,
                rs2,
                imm: imm_s(inst),
            }
        }
        0x13 => {
            let (op, imm) = match (funct3, funct7) {
                (0, _) => (AluOp::Add, imm_i(inst)),
                (2, _) => (AluOp::Slt, imm_i(inst)),
                // Immediate is sign-extended even for the unsigned compare.
                (3, _) => (AluOp::Sltu, imm_i(inst)),
                (4, _) => (AluOp::Xor, imm_i(inst)),
                (6, _) => (AluOp::Or, imm_i(inst)),
                (7, _) => (AluOp::And, imm_i(inst)),
                (1, 0x00) => (AluOp::Sll, rs2 as i32),
                (5, 0x00) => (AluOp::Srl, rs2 as i32),
                (5, 0x20) => (AluOp::Sra, rs2 as i32),
                _ => return Instruction::Unknown(inst),
            };
            Instruction::OpImm { op, rd, rs1, imm }
        }
        0x33 => {
            let op = match (funct3, funct7) {
                (0, 0x00) => AluOp::Add,
                (0, 0x20) => AluOp::Sub,
                (1, 0x00) => AluOp::Sll,
                (2, 0x00) => AluOp::Slt,
                (3, 0x00) => AluOp::Sltu,
                (4, 0x00) => AluOp::Xor,
                (5, 0x00) => AluOp::Srl,
                (5, 0x20) => AluOp::Sra,
                (6, 0x00) => AluOp::Or,
                (7, 0x00) => AluOp::And,
                _ => return Instruction::Unknown(inst),
            };
            Instruction::Op { op, rd, rs1, rs2 }
        }
        // FENCE / FENCE.I: single hart, no caches.
        0x0F => Instruction::Fence,
        0x73 => {
            let csr = (inst >> 20) as u16;
            let op = match funct3 {
                0 => {
                    return match inst >> 20 {
                        0x000 => Instruction::Ecall,
                        0x001 => Instruction::Ebreak,
                        0x302 => Instruction::Mret,
                        0x105 => Instruction::Wfi,
                        _ => Instruction::Unknown(inst),
                    }
                }
                1 | 5 => CsrOp::ReadWrite,
                2 | 6 => CsrOp::ReadSet,
                3 | 7 => CsrOp::ReadClear,
                _ => return Instruction::Unknown(inst),
            };
            let src = if funct3 >= 5 {
                CsrSource::Imm(rs1)
            } else {
                CsrSource::Reg(rs1)
            };
            Instruction::Csr { op, rd, src, csr }
        }
        _ => Instruction::Unknown(inst),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_uart_poll_sequence() {
        // lui t0, 0x80000
        assert_eq!(
            decode_rv32(0x800002B7),
            Instruction::Lui {
                rd: 5,
                imm: 0x8000_0000
            }
        );
        // lw t1, 4(t0)
        assert_eq!(
            decode_rv32(0x0042A303),
            Instruction::Load {
                width: LoadWidth::Word,
                rd: 6,
                rs1: 5,
                imm: 4
            }
        );
        // andi t1, t1, 2
        assert_eq!(
            decode_rv32(0x00237313),
            Instruction::OpImm {
                op: AluOp::And,
                rd: 6,
                rs1: 6,
                imm: 2
            }
        );
        // beq t1, zero, -8
        assert_eq!(
            decode_rv32(0xFE030CE3),
            Instruction::Branch {
                cond: BranchCond::Eq,
                rs1: 6,
                rs2: 0,
                imm: -8
            }
        );
        // sw t2, 0(t0)
        assert_eq!(
            decode_rv32(0x0072A023),
            Instruction::Store {
                width: StoreWidth::Word,
                rs1: 5,
                rs2: 7,
                imm: 0
            }
        );
    }

    #[test]
    fn test_decode_jumps() {
        // jal zero, -36
        assert_eq!(decode_rv32(0xFDDFF06F), Instruction::Jal { rd: 0, imm: -36 });
        // jal ra, 2048
        assert_eq!(decode_rv32(0x001000EF), Instruction::Jal { rd: 1, imm: 2048 });
        // jalr zero, 0(ra)
        assert_eq!(
            decode_rv32(0x00008067),
            Instruction::Jalr {
                rd: 0,
                rs1: 1,
                imm: 0
            }
        );
    }

    #[test]
    fn test_decode_negative_store_offset() {
        // sw ra, -4(sp)
        assert_eq!(
            decode_rv32(0xFE112E23),
            Instruction::Store {
                width: StoreWidth::Word,
                rs1: 2,
                rs2: 1,
                imm: -4
            }
        );
    }

    #[test]
    fn test_decode_system() {
        assert_eq!(decode_rv32(0x00000073), Instruction::Ecall);
        assert_eq!(decode_rv32(0x00100073), Instruction::Ebreak);
        assert_eq!(decode_rv32(0x30200073), Instruction::Mret);
        assert_eq!(decode_rv32(0x10500073), Instruction::Wfi);
        // csrr a2, mhartid
        assert_eq!(
            decode_rv32(0xF1402673),
            Instruction::Csr {
                op: CsrOp::ReadSet,
                rd: 12,
                src: CsrSource::Reg(0),
                csr: 0xF14
            }
        );
        // csrwi mie, 0
        assert_eq!(
            decode_rv32(0x30405073),
            Instruction::Csr {
                op: CsrOp::ReadWrite,
                rd: 0,
                src: CsrSource::Imm(0),
                csr: 0x304
            }
        );
    }

    #[test]
    fn test_decode_rejects_rv32m_and_compressed() {
        // mul a0, a0, a1 (RV32M is not part of this core)
        assert_eq!(decode_rv32(0x02B50533), Instruction::Unknown(0x02B50533));
        // c.nop padded into a word
        assert_eq!(decode_rv32(0x00000001), Instruction::Unknown(0x00000001));
    }

    #[test]
    fn test_alu_shift_and_compare() {
        assert_eq!(AluOp::Sra.apply(0x8000_0000, 4), 0xF800_0000);
        assert_eq!(AluOp::Srl.apply(0x8000_0000, 36), 0x0800_0000);
        assert_eq!(AluOp::Slt.apply(-1i32 as u32, 0), 1);
        assert_eq!(AluOp::Sltu.apply(-1i32 as u32, 0), 0);
        assert!(BranchCond::Geu.taken(0xFFFF_FFFF, 1));
        assert!(!BranchCond::Ge.taken(0xFFFF_FFFF, 1));
    }
}
