// RvEcho - Soft-Core UART Echo Firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::decoder::riscv::{decode_rv32, CsrOp, CsrSource, Instruction, LoadWidth, StoreWidth};
use crate::{Bus, Cpu, SimResult, SimulationError};

/// `misa` for the soft-core: MXL=1 (32-bit), extension I only.
const MISA_RV32I: u32 = 0x4000_0100;

const MSTATUS_MIE: u32 = 1 << 3;
const MSTATUS_MPIE: u32 = 1 << 7;

const CAUSE_BREAKPOINT: u32 = 3;
const CAUSE_ECALL_M: u32 = 11;

/// Single RV32I hart in machine mode. No interrupt sources are wired up.
#[derive(Debug, Default)]
pub struct RiscV {
    pub x: [u32; 32], // x0 reads as zero via read_reg
    pub pc: u32,

    // CSRs
    pub mstatus: u32,
    pub mie: u32,
    pub mip: u32,
    pub mtvec: u32,
    pub mscratch: u32,
    pub mepc: u32,
    pub mcause: u32,
    pub mtval: u32,

    pub cycles: u64,
    pub instret: u64,
}

impl RiscV {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read_reg(&self, n: u8) -> u32 {
        if n == 0 {
            0
        } else {
            self.x[n as usize]
        }
    }

    pub fn write_reg(&mut self, n: u8, val: u32) {
        if n != 0 {
            self.x[n as usize] = val;
        }
    }

    fn read_csr(&self, csr: u16) -> u32 {
        match csr {
            0x300 => self.mstatus,
            0x301 => MISA_RV32I,
            0x304 => self.mie,
            0x305 => self.mtvec,
            0x340 => self.mscratch,
            0x341 => self.mepc,
            0x342 => self.mcause,
            0x343 => self.mtval,
            0x344 => self.mip,
            0xB00 | 0xC00 => self.cycles as u32,
            0xB80 | 0xC80 => (self.cycles >> 32) as u32,
            0xB02 | 0xC02 => self.instret as u32,
            0xB82 | 0xC82 => (self.instret >> 32) as u32,
            // mvendorid, marchid, mimpid, mhartid and anything unimplemented
            _ => 0,
        }
    }

    fn write_csr(&mut self, csr: u16, val: u32) {
        match csr {
            0x300 => self.mstatus = val & (MSTATUS_MIE | MSTATUS_MPIE | 0x1800),
            0x304 => self.mie = val,
            0x305 => self.mtvec = val,
            0x340 => self.mscratch = val,
            0x341 => self.mepc = val & !0x3,
            0x342 => self.mcause = val,
            0x343 => self.mtval = val,
            0x344 => self.mip = val,
            _ => tracing::debug!("Ignoring write to CSR {:#x}", csr),
        }
    }

    fn take_trap(&mut self, cause: u32, epc: u32) {
        self.mepc = epc;
        self.mcause = cause;
        // MPIE <- MIE, MIE <- 0
        let mie = self.mstatus & MSTATUS_MIE;
        self.mstatus = (self.mstatus & !(MSTATUS_MIE | MSTATUS_MPIE)) | (mie << 4);
        self.pc = self.mtvec & !3;
    }

    fn load(&self, bus: &mut dyn Bus, width: LoadWidth, addr: u32) -> SimResult<u32> {
        let addr = addr as u64;
        Ok(match width {
            LoadWidth::Byte => bus.read_u8(addr)? as i8 as i32 as u32,
            LoadWidth::Half => bus.read_u16(addr)? as i16 as i32 as u32,
            LoadWidth::Word => bus.read_u32(addr)?,
            LoadWidth::ByteUnsigned => bus.read_u8(addr)? as u32,
            LoadWidth::HalfUnsigned => bus.read_u16(addr)? as u32,
        })
    }

    fn store(&self, bus: &mut dyn Bus, width: StoreWidth, addr: u32, val: u32) -> SimResult<()> {
        let addr = addr as u64;
        match width {
            StoreWidth::Byte => bus.write_u8(addr, val as u8),
            StoreWidth::Half => bus.write_u16(addr, val as u16),
            StoreWidth::Word => bus.write_u32(addr, val),
        }
    }
}

impl Cpu for RiscV {
    fn reset(&mut self) {
        *self = Self::default();
    }

    fn step(&mut self, bus: &mut dyn Bus) -> SimResult<()> {
        if self.pc & 0x3 != 0 {
            return Err(SimulationError::MisalignedFetch(self.pc as u64));
        }
        let opcode = bus.read_u32(self.pc as u64)?;
        let instruction = decode_rv32(opcode);
        tracing::debug!(
            "PC={:#010x}, Op={:#010x}, Instr={:?}",
            self.pc,
            opcode,
            instruction
        );

        self.cycles = self.cycles.wrapping_add(1);
        let mut next_pc = self.pc.wrapping_add(4);

        match instruction {
            Instruction::Lui { rd, imm } => self.write_reg(rd, imm),
            Instruction::Auipc { rd, imm } => self.write_reg(rd, self.pc.wrapping_add(imm)),
            Instruction::Jal { rd, imm } => {
                self.write_reg(rd, next_pc);
                next_pc = self.pc.wrapping_add(imm as u32);
            }
            Instruction::Jalr { rd, rs1, imm } => {
                // Read rs1 before writing rd: they may be the same register.
                let target = self.read_reg(rs1).wrapping_add(imm as u32) & !1;
                self.write_reg(rd, next_pc);
                next_pc = target;
            }
            Instruction::Branch {
                cond,
                rs1,
                rs2,
                imm,
            } => {
                if cond.taken(self.read_reg(rs1), self.read_reg(rs2)) {
                    next_pc = self.pc.wrapping_add(imm as u32);
                }
            }
            Instruction::Load {
                width,
                rd,
                rs1,
                imm,
            } => {
                let addr = self.read_reg(rs1).wrapping_add(imm as u32);
                let val = self.load(bus, width, addr)?;
                self.write_reg(rd, val);
            }
            Instruction::Store {
                width,
                rs1,
                rs2,
                imm,
            } => {
                let addr = self.read_reg(rs1).wrapping_add(imm as u32);
                self.store(bus, width, addr, self.read_reg(rs2))?;
            }
            Instruction::OpImm { op, rd, rs1, imm } => {
                let res = op.apply(self.read_reg(rs1), imm as u32);
                self.write_reg(rd, res);
            }
            Instruction::Op { op, rd, rs1, rs2 } => {
                let res = op.apply(self.read_reg(rs1), self.read_reg(rs2));
                self.write_reg(rd, res);
            }
            Instruction::Fence | Instruction::Wfi => {}
            Instruction::Ecall | Instruction::Ebreak => {
                let cause = if instruction == Instruction::Ecall {
                    CAUSE_ECALL_M
                } else {
                    CAUSE_BREAKPOINT
                };
                tracing::warn!("{:?} at {:#x}, trapping to {:#x}", instruction, self.pc, self.mtvec);
                self.take_trap(cause, self.pc);
                self.instret = self.instret.wrapping_add(1);
                return Ok(());
            }
            Instruction::Mret => {
                // MIE <- MPIE, MPIE <- 1
                let mpie = self.mstatus & MSTATUS_MPIE;
                self.mstatus = (self.mstatus & !MSTATUS_MIE) | (mpie >> 4) | MSTATUS_MPIE;
                next_pc = self.mepc;
            }
            Instruction::Csr { op, rd, src, csr } => {
                let old = self.read_csr(csr);
                let (operand, writes) = match src {
                    CsrSource::Reg(rs1) => (self.read_reg(rs1), rs1 != 0),
                    CsrSource::Imm(imm) => (imm as u32, imm != 0),
                };
                match op {
                    CsrOp::ReadWrite => self.write_csr(csr, operand),
                    CsrOp::ReadSet if writes => self.write_csr(csr, old | operand),
                    CsrOp::ReadClear if writes => self.write_csr(csr, old & !operand),
                    _ => {}
                }
                self.write_reg(rd, old);
            }
            Instruction::Unknown(inst) => {
                tracing::error!("Unknown instruction {:#x} at {:#x}", inst, self.pc);
                return Err(SimulationError::DecodeError(self.pc as u64));
            }
        }

        self.instret = self.instret.wrapping_add(1);
        self.pc = next_pc;
        Ok(())
    }

    fn set_pc(&mut self, val: u32) {
        self.pc = val;
    }
    fn get_pc(&self) -> u32 {
        self.pc
    }
}
