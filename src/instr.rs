use std::fmt;

use crate::error::DecodeError;
use crate::layout::{bits, Layout};
use crate::symbol::{BranchCondition, Register, TrapVector};

/// Second source operand of `ADD` and `AND`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Operand {
    Reg(Register),
    /// Sign extended 5-bit immediate.
    Imm(i16),
}

/// A single decoded LC3 instruction.
///
/// Each variant carries exactly the fields its encoding holds. Offsets are already sign
/// extended and are relative to the incremented program counter, or to a base register for
/// `Ldr`/`Str`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Instruction {
    /// Add SR1 (source register 1) with an operand and store in DR (destination register)
    Add {
        dr: Register,
        sr1: Register,
        src2: Operand,
    },
    /// Bitwise-and SR1 with an operand and store in DR
    And {
        dr: Register,
        sr1: Register,
        src2: Operand,
    },
    /// Add offset to PC if any requested flag matches the condition code
    Br { cond: BranchCondition, offset: i16 },
    /// Set PC to the base register. `RET` is `JMP R7`.
    Jmp { base: Register },
    /// Save PC in R7 and add offset to PC
    Jsr { offset: i16 },
    /// Save PC in R7 and set PC to the base register
    Jsrr { base: Register },
    Ld { dr: Register, offset: i16 },
    Ldi { dr: Register, offset: i16 },
    Ldr {
        dr: Register,
        base: Register,
        offset: i16,
    },
    Lea { dr: Register, offset: i16 },
    Not { dr: Register, sr: Register },
    Rti,
    St { sr: Register, offset: i16 },
    Sti { sr: Register, offset: i16 },
    Str {
        sr: Register,
        base: Register,
        offset: i16,
    },
    Trap { vector: u8 },
}

impl Instruction {
    /// Layout used to encode this instruction.
    pub fn layout(&self) -> Layout {
        match self {
            Instruction::Add { src2, .. } => match src2 {
                Operand::Reg(_) => Layout::ADD_REG,
                Operand::Imm(_) => Layout::ADD_IMM,
            },
            Instruction::And { src2, .. } => match src2 {
                Operand::Reg(_) => Layout::AND_REG,
                Operand::Imm(_) => Layout::AND_IMM,
            },
            Instruction::Br { .. } => Layout::BR,
            Instruction::Jmp { .. } => Layout::JMP,
            Instruction::Jsr { .. } => Layout::JSR,
            Instruction::Jsrr { .. } => Layout::JSRR,
            Instruction::Ld { .. } => Layout::LD,
            Instruction::Ldi { .. } => Layout::LDI,
            Instruction::Ldr { .. } => Layout::LDR,
            Instruction::Lea { .. } => Layout::LEA,
            Instruction::Not { .. } => Layout::NOT,
            Instruction::Rti => Layout::RTI,
            Instruction::St { .. } => Layout::ST,
            Instruction::Sti { .. } => Layout::STI,
            Instruction::Str { .. } => Layout::STR,
            Instruction::Trap { .. } => Layout::TRAP,
        }
    }

    /// Whether this is `RET`, ie. `JMP R7`.
    pub fn is_ret(&self) -> bool {
        matches!(self, Instruction::Jmp { base: Register::R7 })
    }

    pub fn is_halt(&self) -> bool {
        matches!(self, Instruction::Trap { vector } if *vector == TrapVector::Halt.vector())
    }
}

/// Decode a raw word.
///
/// Only the reserved opcode `0b1101` fails; padding bits are ignored.
pub fn decode(word: u16) -> Result<Instruction, DecodeError> {
    let opcode = bits(word, 15, 4);
    // Mode bit selecting the form of `ADD`/`AND` and `JSR`/`JSRR`
    let imm = bits(word, 5, 1) == 1;
    let long = bits(word, 11, 1) == 1;

    let instr = match opcode {
        0x0 => {
            let [nzp, offset, ..] = Layout::BR.unpack(word);
            Instruction::Br {
                cond: BranchCondition::from_bits(nzp),
                offset: offset as i16,
            }
        }
        0x1 | 0x5 => {
            let (dr, sr1, src2) = if imm {
                let layout = if opcode == 0x1 { Layout::ADD_IMM } else { Layout::AND_IMM };
                let [dr, sr1, imm5, ..] = layout.unpack(word);
                (dr, sr1, Operand::Imm(imm5 as i16))
            } else {
                let layout = if opcode == 0x1 { Layout::ADD_REG } else { Layout::AND_REG };
                let [dr, sr1, sr2, ..] = layout.unpack(word);
                (dr, sr1, Operand::Reg(Register::from_bits(sr2)))
            };
            let (dr, sr1) = (Register::from_bits(dr), Register::from_bits(sr1));
            if opcode == 0x1 {
                Instruction::Add { dr, sr1, src2 }
            } else {
                Instruction::And { dr, sr1, src2 }
            }
        }
        0x2 => {
            let [dr, offset, ..] = Layout::LD.unpack(word);
            Instruction::Ld {
                dr: Register::from_bits(dr),
                offset: offset as i16,
            }
        }
        0x3 => {
            let [sr, offset, ..] = Layout::ST.unpack(word);
            Instruction::St {
                sr: Register::from_bits(sr),
                offset: offset as i16,
            }
        }
        0x4 if long => {
            let [offset, ..] = Layout::JSR.unpack(word);
            Instruction::Jsr {
                offset: offset as i16,
            }
        }
        0x4 => {
            let [base, ..] = Layout::JSRR.unpack(word);
            Instruction::Jsrr {
                base: Register::from_bits(base),
            }
        }
        0x6 => {
            let [dr, base, offset, ..] = Layout::LDR.unpack(word);
            Instruction::Ldr {
                dr: Register::from_bits(dr),
                base: Register::from_bits(base),
                offset: offset as i16,
            }
        }
        0x7 => {
            let [sr, base, offset, ..] = Layout::STR.unpack(word);
            Instruction::Str {
                sr: Register::from_bits(sr),
                base: Register::from_bits(base),
                offset: offset as i16,
            }
        }
        0x8 => Instruction::Rti,
        0x9 => {
            let [dr, sr, ..] = Layout::NOT.unpack(word);
            Instruction::Not {
                dr: Register::from_bits(dr),
                sr: Register::from_bits(sr),
            }
        }
        0xA => {
            let [dr, offset, ..] = Layout::LDI.unpack(word);
            Instruction::Ldi {
                dr: Register::from_bits(dr),
                offset: offset as i16,
            }
        }
        0xB => {
            let [sr, offset, ..] = Layout::STI.unpack(word);
            Instruction::Sti {
                sr: Register::from_bits(sr),
                offset: offset as i16,
            }
        }
        0xC => {
            let [base, ..] = Layout::JMP.unpack(word);
            Instruction::Jmp {
                base: Register::from_bits(base),
            }
        }
        0xE => {
            let [dr, offset, ..] = Layout::LEA.unpack(word);
            Instruction::Lea {
                dr: Register::from_bits(dr),
                offset: offset as i16,
            }
        }
        0xF => {
            let [vector, ..] = Layout::TRAP.unpack(word);
            Instruction::Trap {
                vector: vector as u8,
            }
        }
        // 0xD is reserved
        _ => return Err(DecodeError::IllegalOpcode { word }),
    };
    Ok(instr)
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Reg(reg) => write!(f, "{reg}"),
            Operand::Imm(imm) => write!(f, "#{imm}"),
        }
    }
}

/// Assembly syntax, with offsets written as literals.
impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instruction::*;
        match self {
            Add { dr, sr1, src2 } => write!(f, "ADD {dr}, {sr1}, {src2}"),
            And { dr, sr1, src2 } => write!(f, "AND {dr}, {sr1}, {src2}"),
            Br { cond, offset } => write!(f, "BR{cond} #{offset}"),
            Jmp { base: Register::R7 } => write!(f, "RET"),
            Jmp { base } => write!(f, "JMP {base}"),
            Jsr { offset } => write!(f, "JSR #{offset}"),
            Jsrr { base } => write!(f, "JSRR {base}"),
            Ld { dr, offset } => write!(f, "LD {dr}, #{offset}"),
            Ldi { dr, offset } => write!(f, "LDI {dr}, #{offset}"),
            Ldr { dr, base, offset } => write!(f, "LDR {dr}, {base}, #{offset}"),
            Lea { dr, offset } => write!(f, "LEA {dr}, #{offset}"),
            Not { dr, sr } => write!(f, "NOT {dr}, {sr}"),
            Rti => write!(f, "RTI"),
            St { sr, offset } => write!(f, "ST {sr}, #{offset}"),
            Sti { sr, offset } => write!(f, "STI {sr}, #{offset}"),
            Str { sr, base, offset } => write!(f, "STR {sr}, {base}, #{offset}"),
            Trap { vector } => match TrapVector::try_from(*vector) {
                Ok(trap) => write!(f, "{trap}"),
                Err(()) => write!(f, "TRAP x{vector:02X}"),
            },
        }
    }
}
