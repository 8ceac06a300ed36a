use std::cmp::Ordering;
use std::fmt;

use crate::symbol::{BranchCondition, Register};

/// Condition code, set using the result of the previous code-setting instruction.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ConditionCode {
    /// Negative
    N = 0b100,
    /// Zero
    Z = 0b010,
    /// Positive
    P = 0b001,
    /// No code-setting instruction has executed yet
    Uninit = 0b000,
}

impl ConditionCode {
    pub fn of(value: u16) -> Self {
        match (value as i16).cmp(&0) {
            Ordering::Less => ConditionCode::N,
            Ordering::Equal => ConditionCode::Z,
            Ordering::Greater => ConditionCode::P,
        }
    }

    /// Whether a branch requesting `cond` is taken under this code.
    pub fn matches(self, cond: BranchCondition) -> bool {
        cond.is_empty() || self as u16 & cond.bits() != 0
    }
}

impl fmt::Display for ConditionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConditionCode::N => "N",
            ConditionCode::Z => "Z",
            ConditionCode::P => "P",
            ConditionCode::Uninit => "-",
        };
        f.write_str(name)
    }
}

/// General purpose registers, condition code and program counter.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct RegisterFile {
    /// 8x 16-bit registers
    reg: [u16; 8],
    /// Program counter
    pc: u16,
    /// Condition code
    cc: ConditionCode,
}

impl RegisterFile {
    pub fn new(pc: u16) -> Self {
        RegisterFile {
            reg: [0; 8],
            pc,
            cc: ConditionCode::Uninit,
        }
    }

    #[inline]
    pub fn get(&self, reg: Register) -> u16 {
        self.reg[reg.index()]
    }

    #[inline]
    pub fn set(&mut self, reg: Register, value: u16) {
        self.reg[reg.index()] = value;
    }

    /// Write `value` to `reg` and set the condition code from it.
    #[inline]
    pub fn set_with_cc(&mut self, reg: Register, value: u16) {
        self.set(reg, value);
        self.cc = ConditionCode::of(value);
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn set_pc(&mut self, pc: u16) {
        self.pc = pc;
    }

    /// `PC + offset`, wrapping around the address space.
    #[inline]
    pub fn pc_offset(&self, offset: i16) -> u16 {
        self.pc.wrapping_add(offset as u16)
    }

    pub fn cc(&self) -> ConditionCode {
        self.cc
    }

    pub fn set_cc(&mut self, cc: ConditionCode) {
        self.cc = cc;
    }

    pub fn all(&self) -> &[u16; 8] {
        &self.reg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_sign() {
        assert_eq!(ConditionCode::of(0), ConditionCode::Z);
        assert_eq!(ConditionCode::of(1), ConditionCode::P);
        assert_eq!(ConditionCode::of(0x7FFF), ConditionCode::P);
        assert_eq!(ConditionCode::of(0x8000), ConditionCode::N);
        assert_eq!(ConditionCode::of(0xFFFF), ConditionCode::N);
    }

    #[test]
    fn branch_matching() {
        let nz = BranchCondition::from_bits(0b110);
        assert!(ConditionCode::N.matches(nz));
        assert!(ConditionCode::Z.matches(nz));
        assert!(!ConditionCode::P.matches(nz));
        assert!(!ConditionCode::Uninit.matches(nz));
        // No requested flags always branches
        let none = BranchCondition::default();
        for cc in [ConditionCode::N, ConditionCode::Z, ConditionCode::P, ConditionCode::Uninit] {
            assert!(cc.matches(none));
        }
    }

    #[test]
    fn set_with_cc() {
        let mut regs = RegisterFile::new(0x3000);
        assert_eq!(regs.cc(), ConditionCode::Uninit);
        regs.set_with_cc(Register::R3, 0xFFFE);
        assert_eq!(regs.get(Register::R3), 0xFFFE);
        assert_eq!(regs.cc(), ConditionCode::N);
        regs.set(Register::R3, 0);
        assert_eq!(regs.cc(), ConditionCode::N);
        assert_eq!(regs.pc_offset(-1), 0x2FFF);
    }
}
