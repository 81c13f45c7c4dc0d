//! RV64I 命令のデコードと実行

use crate::{Memory, Registers, Result};

/// 整数演算の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
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

/// 分岐条件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchCond {
    Eq,
    Ne,
    Lt,
    Ge,
    Ltu,
    Geu,
}

/// デコード済み命令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Lui { rd: usize, imm: i64 },
    Auipc { rd: usize, imm: i64 },
    Jal { rd: usize, offset: i64 },
    Jalr { rd: usize, rs1: usize, offset: i64 },
    Branch { cond: BranchCond, rs1: usize, rs2: usize, offset: i64 },
    Load { width: usize, signed: bool, rd: usize, rs1: usize, offset: i64 },
    Store { width: usize, rs1: usize, rs2: usize, offset: i64 },
    /// `word` が真なら32ビット演算（ADDIW等）
    OpImm { op: AluOp, word: bool, rd: usize, rs1: usize, imm: i64 },
    Op { op: AluOp, word: bool, rd: usize, rs1: usize, rs2: usize },
    Ebreak,
}

/// 命令実行の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// 次の命令へ進む
    Continue,
    /// EBREAK によりマシンを停止する
    Halt,
}

fn bits(raw: u32, hi: u32, lo: u32) -> u32 {
    (raw >> lo) & ((1u32 << (hi - lo + 1)) - 1)
}

fn sign_extend(value: u64, width: u32) -> i64 {
    let shift = 64 - width;
    ((value << shift) as i64) >> shift
}

fn imm_i(raw: u32) -> i64 {
    (raw as i32 >> 20) as i64
}

fn imm_s(raw: u32) -> i64 {
    let value = (bits(raw, 31, 25) << 5) | bits(raw, 11, 7);
    sign_extend(value as u64, 12)
}

fn imm_b(raw: u32) -> i64 {
    let value = (bits(raw, 31, 31) << 12)
        | (bits(raw, 7, 7) << 11)
        | (bits(raw, 30, 25) << 5)
        | (bits(raw, 11, 8) << 1);
    sign_extend(value as u64, 13)
}

fn imm_u(raw: u32) -> i64 {
    (raw & 0xffff_f000) as i32 as i64
}

fn imm_j(raw: u32) -> i64 {
    let value = (bits(raw, 31, 31) << 20)
        | (bits(raw, 19, 12) << 12)
        | (bits(raw, 20, 20) << 11)
        | (bits(raw, 30, 21) << 1);
    sign_extend(value as u64, 21)
}

impl Instruction {
    /// 32ビットの命令語をデコードする
    pub fn decode(raw: u32) -> Result<Self> {
        let opcode = bits(raw, 6, 0);
        let rd = bits(raw, 11, 7) as usize;
        let funct3 = bits(raw, 14, 12);
        let rs1 = bits(raw, 19, 15) as usize;
        let rs2 = bits(raw, 24, 20) as usize;
        let funct7 = bits(raw, 31, 25);
        let invalid = || anyhow::anyhow!("invalid instruction 0x{:08x}", raw);

        let inst = match opcode {
            0b0110111 => Instruction::Lui { rd, imm: imm_u(raw) },
            0b0010111 => Instruction::Auipc { rd, imm: imm_u(raw) },
            0b1101111 => Instruction::Jal { rd, offset: imm_j(raw) },
            0b1100111 if funct3 == 0 => Instruction::Jalr { rd, rs1, offset: imm_i(raw) },
            0b1100011 => {
                let cond = match funct3 {
                    0b000 => BranchCond::Eq,
                    0b001 => BranchCond::Ne,
                    0b100 => BranchCond::Lt,
                    0b101 => BranchCond::Ge,
                    0b110 => BranchCond::Ltu,
                    0b111 => BranchCond::Geu,
                    _ => return Err(invalid()),
                };
                Instruction::Branch { cond, rs1, rs2, offset: imm_b(raw) }
            }
            0b0000011 => {
                let (width, signed) = match funct3 {
                    0b000 => (1, true),
                    0b001 => (2, true),
                    0b010 => (4, true),
                    0b011 => (8, true),
                    0b100 => (1, false),
                    0b101 => (2, false),
                    0b110 => (4, false),
                    _ => return Err(invalid()),
                };
                Instruction::Load { width, signed, rd, rs1, offset: imm_i(raw) }
            }
            0b0100011 => {
                let width = match funct3 {
                    0b000 => 1,
                    0b001 => 2,
                    0b010 => 4,
                    0b011 => 8,
                    _ => return Err(invalid()),
                };
                Instruction::Store { width, rs1, rs2, offset: imm_s(raw) }
            }
            0b0010011 | 0b0011011 => {
                let word = opcode == 0b0011011;
                // RV64 のシフト量は6ビット、W命令は5ビット
                let shamt_hi = if word { 24 } else { 25 };
                let arith = bits(raw, 31, shamt_hi + 1) == (0b0100000 >> (shamt_hi - 24));
                let logical = bits(raw, 31, shamt_hi + 1) == 0;
                let op = match funct3 {
                    0b000 => AluOp::Add,
                    0b001 if logical => AluOp::Sll,
                    0b101 if logical => AluOp::Srl,
                    0b101 if arith => AluOp::Sra,
                    0b010 if !word => AluOp::Slt,
                    0b011 if !word => AluOp::Sltu,
                    0b100 if !word => AluOp::Xor,
                    0b110 if !word => AluOp::Or,
                    0b111 if !word => AluOp::And,
                    _ => return Err(invalid()),
                };
                let imm = match op {
                    AluOp::Sll | AluOp::Srl | AluOp::Sra => bits(raw, shamt_hi, 20) as i64,
                    _ => imm_i(raw),
                };
                Instruction::OpImm { op, word, rd, rs1, imm }
            }
            0b0110011 | 0b0111011 => {
                let word = opcode == 0b0111011;
                let op = match (funct3, funct7) {
                    (0b000, 0b0000000) => AluOp::Add,
                    (0b000, 0b0100000) => AluOp::Sub,
                    (0b001, 0b0000000) => AluOp::Sll,
                    (0b101, 0b0000000) => AluOp::Srl,
                    (0b101, 0b0100000) => AluOp::Sra,
                    (0b010, 0b0000000) if !word => AluOp::Slt,
                    (0b011, 0b0000000) if !word => AluOp::Sltu,
                    (0b100, 0b0000000) if !word => AluOp::Xor,
                    (0b110, 0b0000000) if !word => AluOp::Or,
                    (0b111, 0b0000000) if !word => AluOp::And,
                    _ => return Err(invalid()),
                };
                Instruction::Op { op, word, rd, rs1, rs2 }
            }
            0b1110011 if raw == 0x0010_0073 => Instruction::Ebreak,
            _ => return Err(invalid()),
        };

        Ok(inst)
    }

    /// 命令を実行し、PCを更新する
    pub fn execute(self, regs: &mut Registers, memory: &mut Memory) -> Result<Effect> {
        let pc = regs.pc();
        let mut next_pc = pc.wrapping_add(4);

        match self {
            Instruction::Lui { rd, imm } => regs.set_gpr(rd, imm as u64),
            Instruction::Auipc { rd, imm } => regs.set_gpr(rd, pc.wrapping_add(imm as u64)),
            Instruction::Jal { rd, offset } => {
                regs.set_gpr(rd, next_pc);
                next_pc = pc.wrapping_add(offset as u64);
            }
            Instruction::Jalr { rd, rs1, offset } => {
                let target = regs.gpr(rs1).wrapping_add(offset as u64) & !1;
                regs.set_gpr(rd, next_pc);
                next_pc = target;
            }
            Instruction::Branch { cond, rs1, rs2, offset } => {
                let (a, b) = (regs.gpr(rs1), regs.gpr(rs2));
                let taken = match cond {
                    BranchCond::Eq => a == b,
                    BranchCond::Ne => a != b,
                    BranchCond::Lt => (a as i64) < (b as i64),
                    BranchCond::Ge => (a as i64) >= (b as i64),
                    BranchCond::Ltu => a < b,
                    BranchCond::Geu => a >= b,
                };
                if taken {
                    next_pc = pc.wrapping_add(offset as u64);
                }
            }
            Instruction::Load { width, signed, rd, rs1, offset } => {
                let address = regs.gpr(rs1).wrapping_add(offset as u64);
                let value = memory.read(address, width)?;
                let value = if signed {
                    sign_extend(value, (width * 8) as u32) as u64
                } else {
                    value
                };
                regs.set_gpr(rd, value);
            }
            Instruction::Store { width, rs1, rs2, offset } => {
                let address = regs.gpr(rs1).wrapping_add(offset as u64);
                memory.write(address, width, regs.gpr(rs2))?;
            }
            Instruction::OpImm { op, word, rd, rs1, imm } => {
                regs.set_gpr(rd, alu(op, word, regs.gpr(rs1), imm as u64));
            }
            Instruction::Op { op, word, rd, rs1, rs2 } => {
                regs.set_gpr(rd, alu(op, word, regs.gpr(rs1), regs.gpr(rs2)));
            }
            Instruction::Ebreak => return Ok(Effect::Halt),
        }

        regs.set_pc(next_pc);
        Ok(Effect::Continue)
    }
}

fn alu(op: AluOp, word: bool, a: u64, b: u64) -> u64 {
    if word {
        let (a, b) = (a as u32, b as u32);
        let shamt = b & 0x1f;
        let result = match op {
            AluOp::Add => a.wrapping_add(b),
            AluOp::Sub => a.wrapping_sub(b),
            AluOp::Sll => a << shamt,
            AluOp::Srl => a >> shamt,
            AluOp::Sra => ((a as i32) >> shamt) as u32,
            // デコーダがW形式で生成しない
            _ => 0,
        };
        return result as i32 as i64 as u64;
    }

    let shamt = (b & 0x3f) as u32;
    match op {
        AluOp::Add => a.wrapping_add(b),
        AluOp::Sub => a.wrapping_sub(b),
        AluOp::Sll => a << shamt,
        AluOp::Slt => ((a as i64) < (b as i64)) as u64,
        AluOp::Sltu => (a < b) as u64,
        AluOp::Xor => a ^ b,
        AluOp::Srl => a >> shamt,
        AluOp::Sra => ((a as i64) >> shamt) as u64,
        AluOp::Or => a | b,
        AluOp::And => a & b,
    }
}
