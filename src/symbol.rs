use std::{fmt, str::FromStr};

use fxhash::FxBuildHasher;
use indexmap::IndexMap;

// Symbol table of label -> word offset from `.ORIG`
type FxMap<K, V> = IndexMap<K, V, FxBuildHasher>;

/// Labels resolved by the front-end, as word offsets from the unit origin.
///
/// Owned by the caller and lent to the encoder, so separate assemblies never share state.
#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
    table: FxMap<String, u16>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            table: IndexMap::with_hasher(FxBuildHasher::default()),
        }
    }

    /// Returns the previous offset if the label was already defined.
    pub fn insert(&mut self, label: impl Into<String>, offset: u16) -> Option<u16> {
        self.table.insert(label.into(), offset)
    }

    pub fn get(&self, label: &str) -> Option<u16> {
        self.table.get(label).copied()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.table.contains_key(label)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Labels in definition order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u16)> {
        self.table.iter().map(|(label, offs)| (label.as_str(), *offs))
    }
}

impl<S: Into<String>> FromIterator<(S, u16)> for SymbolTable {
    fn from_iter<I: IntoIterator<Item = (S, u16)>>(iter: I) -> Self {
        let mut table = SymbolTable::new();
        for (label, offs) in iter {
            table.insert(label, offs);
        }
        table
    }
}

/// Represents the CPU registers.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Register {
    R0 = 0,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    /// Link register for `JSR`/`JSRR`, by convention only.
    R7,
}

impl Register {
    pub const ALL: [Register; 8] = [
        Register::R0,
        Register::R1,
        Register::R2,
        Register::R3,
        Register::R4,
        Register::R5,
        Register::R6,
        Register::R7,
    ];

    /// Register named by the low three bits of `bits`.
    pub fn from_bits(bits: u16) -> Register {
        Self::ALL[(bits & 0b111) as usize]
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl FromStr for Register {
    type Err = ();

    /// Accepts `R0`..`R7`, in either case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix('R')
            .or_else(|| s.strip_prefix('r'))
            .ok_or(())?;
        match digits {
            "0" => Ok(Register::R0),
            "1" => Ok(Register::R1),
            "2" => Ok(Register::R2),
            "3" => Ok(Register::R3),
            "4" => Ok(Register::R4),
            "5" => Ok(Register::R5),
            "6" => Ok(Register::R6),
            "7" => Ok(Register::R7),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", *self as u8)
    }
}

/// Flags requested by a `BR` instruction.
///
/// When no flag is requested the branch is taken unconditionally.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct BranchCondition {
    pub n: bool,
    pub z: bool,
    pub p: bool,
}

impl BranchCondition {
    pub const ALWAYS: BranchCondition = BranchCondition {
        n: true,
        z: true,
        p: true,
    };

    pub fn from_bits(bits: u16) -> Self {
        BranchCondition {
            n: bits & 0b100 != 0,
            z: bits & 0b010 != 0,
            p: bits & 0b001 != 0,
        }
    }

    /// Bits in `nzp` order.
    pub fn bits(self) -> u16 {
        (self.n as u16) << 2 | (self.z as u16) << 1 | self.p as u16
    }

    pub fn is_empty(self) -> bool {
        self.bits() == 0
    }

    /// Parse the flag suffix of a branch mnemonic, eg. `nz` of `BRnz`.
    ///
    /// An empty suffix means `nzp`.
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        if suffix.is_empty() {
            return Some(Self::ALWAYS);
        }
        let mut cond = BranchCondition::default();
        // Flags must appear in `nzp` order, each at most once
        let mut rest = suffix;
        for (flag, slot) in [('n', &mut cond.n), ('z', &mut cond.z), ('p', &mut cond.p)] {
            if let Some(tail) = rest
                .strip_prefix(flag)
                .or_else(|| rest.strip_prefix(flag.to_ascii_uppercase()))
            {
                *slot = true;
                rest = tail;
            }
        }
        rest.is_empty().then_some(cond)
    }
}

impl fmt::Display for BranchCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.n {
            f.write_str("n")?;
        }
        if self.z {
            f.write_str("z")?;
        }
        if self.p {
            f.write_str("p")?;
        }
        Ok(())
    }
}

/// Built-in trap service routines.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TrapVector {
    Getc = 0x20,
    Out = 0x21,
    Puts = 0x22,
    In = 0x23,
    Putsp = 0x24,
    Halt = 0x25,
}

impl TrapVector {
    pub fn vector(self) -> u8 {
        self as u8
    }

    /// Trap alias mnemonic, eg. `HALT` for `TRAP x25`.
    pub fn from_alias(name: &str) -> Option<Self> {
        let trap = match name.to_ascii_uppercase().as_str() {
            "GETC" => TrapVector::Getc,
            "OUT" => TrapVector::Out,
            "PUTS" => TrapVector::Puts,
            "IN" => TrapVector::In,
            "PUTSP" => TrapVector::Putsp,
            "HALT" => TrapVector::Halt,
            _ => return None,
        };
        Some(trap)
    }
}

impl TryFrom<u8> for TrapVector {
    type Error = ();

    fn try_from(vector: u8) -> Result<Self, Self::Error> {
        match vector {
            0x20 => Ok(TrapVector::Getc),
            0x21 => Ok(TrapVector::Out),
            0x22 => Ok(TrapVector::Puts),
            0x23 => Ok(TrapVector::In),
            0x24 => Ok(TrapVector::Putsp),
            0x25 => Ok(TrapVector::Halt),
            _ => Err(()),
        }
    }
}

impl fmt::Display for TrapVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrapVector::Getc => "GETC",
            TrapVector::Out => "OUT",
            TrapVector::Puts => "PUTS",
            TrapVector::In => "IN",
            TrapVector::Putsp => "PUTSP",
            TrapVector::Halt => "HALT",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DirKind {
    Orig,
    End,
    Stringz,
    Blkw,
    Fill,
}

impl DirKind {
    pub fn from_name(name: &str) -> Option<Self> {
        let dir = match name.to_ascii_uppercase().as_str() {
            ".ORIG" => DirKind::Orig,
            ".END" => DirKind::End,
            ".STRINGZ" => DirKind::Stringz,
            ".BLKW" => DirKind::Blkw,
            ".FILL" => DirKind::Fill,
            _ => return None,
        };
        Some(dir)
    }
}
