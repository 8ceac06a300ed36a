//! Bit layouts of every instruction form.
//!
//! A [`Layout`] lists the fields of one instruction form from the most significant bit
//! downward. The decoder reads fields out of a word with [`Layout::unpack`] and the encoder
//! writes them back with [`Layout::pack`], so both sides agree on every width by
//! construction.

use crate::error::AsmError;

/// Word width of the machine.
pub const WORD_BITS: u32 = 16;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FieldKind {
    /// Read as-is.
    Unsigned,
    /// Two's complement, sign extended when read.
    Signed,
    /// Fixed bit pattern; written by the encoder, ignored by the decoder.
    Const(u16),
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Field {
    pub name: &'static str,
    pub width: u32,
    pub kind: FieldKind,
}

macro_rules! unsigned {
    ($name:literal, $width:literal) => {
        Field {
            name: $name,
            width: $width,
            kind: FieldKind::Unsigned,
        }
    };
}

macro_rules! signed {
    ($name:literal, $width:literal) => {
        Field {
            name: $name,
            width: $width,
            kind: FieldKind::Signed,
        }
    };
}

macro_rules! constant {
    ($name:literal, $width:literal, $value:literal) => {
        Field {
            name: $name,
            width: $width,
            kind: FieldKind::Const($value),
        }
    };
}

/// Ordered field list of one instruction form.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Layout {
    pub name: &'static str,
    pub fields: &'static [Field],
}

/// Field values of a word, in layout order, with constant fields skipped.
pub type Values = [u16; 4];

impl Layout {
    pub const ADD_REG: Layout = Layout {
        name: "ADD",
        fields: &[
            constant!("opcode", 4, 0b0001),
            unsigned!("dr", 3),
            unsigned!("sr1", 3),
            constant!("mode", 1, 0),
            constant!("unused", 2, 0),
            unsigned!("sr2", 3),
        ],
    };
    pub const ADD_IMM: Layout = Layout {
        name: "ADD",
        fields: &[
            constant!("opcode", 4, 0b0001),
            unsigned!("dr", 3),
            unsigned!("sr1", 3),
            constant!("mode", 1, 1),
            signed!("imm5", 5),
        ],
    };
    pub const AND_REG: Layout = Layout {
        name: "AND",
        fields: &[
            constant!("opcode", 4, 0b0101),
            unsigned!("dr", 3),
            unsigned!("sr1", 3),
            constant!("mode", 1, 0),
            constant!("unused", 2, 0),
            unsigned!("sr2", 3),
        ],
    };
    pub const AND_IMM: Layout = Layout {
        name: "AND",
        fields: &[
            constant!("opcode", 4, 0b0101),
            unsigned!("dr", 3),
            unsigned!("sr1", 3),
            constant!("mode", 1, 1),
            signed!("imm5", 5),
        ],
    };
    pub const BR: Layout = Layout {
        name: "BR",
        fields: &[
            constant!("opcode", 4, 0b0000),
            unsigned!("nzp", 3),
            signed!("offset9", 9),
        ],
    };
    pub const JMP: Layout = Layout {
        name: "JMP",
        fields: &[
            constant!("opcode", 4, 0b1100),
            constant!("unused", 3, 0),
            unsigned!("base", 3),
            constant!("unused", 6, 0),
        ],
    };
    pub const JSR: Layout = Layout {
        name: "JSR",
        fields: &[
            constant!("opcode", 4, 0b0100),
            constant!("mode", 1, 1),
            signed!("offset11", 11),
        ],
    };
    pub const JSRR: Layout = Layout {
        name: "JSRR",
        fields: &[
            constant!("opcode", 4, 0b0100),
            constant!("mode", 1, 0),
            constant!("unused", 2, 0),
            unsigned!("base", 3),
            constant!("unused", 6, 0),
        ],
    };
    pub const LD: Layout = Layout {
        name: "LD",
        fields: &[
            constant!("opcode", 4, 0b0010),
            unsigned!("dr", 3),
            signed!("offset9", 9),
        ],
    };
    pub const LDI: Layout = Layout {
        name: "LDI",
        fields: &[
            constant!("opcode", 4, 0b1010),
            unsigned!("dr", 3),
            signed!("offset9", 9),
        ],
    };
    pub const LEA: Layout = Layout {
        name: "LEA",
        fields: &[
            constant!("opcode", 4, 0b1110),
            unsigned!("dr", 3),
            signed!("offset9", 9),
        ],
    };
    pub const ST: Layout = Layout {
        name: "ST",
        fields: &[
            constant!("opcode", 4, 0b0011),
            unsigned!("sr", 3),
            signed!("offset9", 9),
        ],
    };
    pub const STI: Layout = Layout {
        name: "STI",
        fields: &[
            constant!("opcode", 4, 0b1011),
            unsigned!("sr", 3),
            signed!("offset9", 9),
        ],
    };
    pub const LDR: Layout = Layout {
        name: "LDR",
        fields: &[
            constant!("opcode", 4, 0b0110),
            unsigned!("dr", 3),
            unsigned!("base", 3),
            signed!("offset6", 6),
        ],
    };
    pub const STR: Layout = Layout {
        name: "STR",
        fields: &[
            constant!("opcode", 4, 0b0111),
            unsigned!("sr", 3),
            unsigned!("base", 3),
            signed!("offset6", 6),
        ],
    };
    pub const NOT: Layout = Layout {
        name: "NOT",
        fields: &[
            constant!("opcode", 4, 0b1001),
            unsigned!("dr", 3),
            unsigned!("sr", 3),
            constant!("ones", 6, 0b111111),
        ],
    };
    pub const RTI: Layout = Layout {
        name: "RTI",
        fields: &[constant!("opcode", 4, 0b1000), constant!("unused", 12, 0)],
    };
    pub const TRAP: Layout = Layout {
        name: "TRAP",
        fields: &[
            constant!("opcode", 4, 0b1111),
            constant!("unused", 4, 0),
            unsigned!("trapvect8", 8),
        ],
    };

    /// Total width of all fields.
    pub fn width(&self) -> u32 {
        self.fields.iter().map(|field| field.width).sum()
    }

    /// Read every non-constant field of `word`, sign extending signed fields.
    ///
    /// The layout must be well-formed (see [`Layout::width`]).
    pub fn unpack(&self, word: u16) -> Values {
        let mut values = [0; 4];
        let mut slot = 0;
        let mut msb = WORD_BITS - 1;
        for field in self.fields {
            let raw = bits(word, msb, field.width);
            match field.kind {
                FieldKind::Const(_) => (),
                FieldKind::Unsigned => {
                    values[slot] = raw;
                    slot += 1;
                }
                FieldKind::Signed => {
                    values[slot] = sign_extend(raw, field.width) as u16;
                    slot += 1;
                }
            }
            msb = msb.wrapping_sub(field.width);
        }
        values
    }

    /// Pack `values` into the non-constant fields of this layout, in order.
    ///
    /// Signed values are passed as their two's complement `u16` representation.
    pub fn pack(&self, values: &[u16]) -> Result<u16, AsmError> {
        let mut packer = BitPacker::new(self.name);
        let mut values = values.iter();
        for field in self.fields {
            let value = match field.kind {
                FieldKind::Const(value) => value,
                FieldKind::Unsigned | FieldKind::Signed => {
                    *values.next().ok_or(AsmError::MalformedInstruction {
                        layout: self.name,
                        width: self.width(),
                    })?
                }
            };
            packer.push(field, value)?;
        }
        packer.finish()
    }
}

/// Accumulates fields into a word, most significant first.
#[derive(Debug)]
pub struct BitPacker {
    layout: &'static str,
    word: u32,
    /// Bits written so far.
    width: u32,
}

impl BitPacker {
    pub fn new(layout: &'static str) -> Self {
        BitPacker {
            layout,
            word: 0,
            width: 0,
        }
    }

    pub fn push(&mut self, field: &Field, value: u16) -> Result<(), AsmError> {
        if !fits(value, field) {
            let shown = match field.kind {
                FieldKind::Signed => (value as i16).to_string(),
                _ => value.to_string(),
            };
            return Err(AsmError::InvalidOperand {
                operand: shown,
                expected: describe_range(field),
            });
        }
        self.width += field.width;
        if self.width > WORD_BITS {
            return Err(AsmError::MalformedInstruction {
                layout: self.layout,
                width: self.width,
            });
        }
        let mask = (1u32 << field.width) - 1;
        self.word = (self.word << field.width) | (value as u32 & mask);
        Ok(())
    }

    pub fn finish(self) -> Result<u16, AsmError> {
        if self.width != WORD_BITS {
            return Err(AsmError::MalformedInstruction {
                layout: self.layout,
                width: self.width,
            });
        }
        Ok(self.word as u16)
    }
}

/// Whether `value` is representable in `field`.
fn fits(value: u16, field: &Field) -> bool {
    match field.kind {
        FieldKind::Signed => {
            let (min, max) = signed_range(field.width);
            (min..=max).contains(&(value as i16 as i32))
        }
        FieldKind::Unsigned | FieldKind::Const(_) => {
            field.width >= WORD_BITS || (value as u32) < (1u32 << field.width)
        }
    }
}

fn describe_range(field: &Field) -> String {
    match field.kind {
        FieldKind::Signed => {
            let (min, max) = signed_range(field.width);
            format!("{} in range [{min}, {max}]", field.name)
        }
        _ => format!(
            "{} in range [0, {}]",
            field.name,
            (1u32 << field.width.min(WORD_BITS)) - 1
        ),
    }
}

/// Inclusive range of a signed field of `width` bits.
pub fn signed_range(width: u32) -> (i32, i32) {
    let half = 1i32 << (width - 1);
    (-half, half - 1)
}

/// Field of `width` bits whose most significant bit is bit `msb` of `word`.
#[inline]
pub fn bits(word: u16, msb: u32, width: u32) -> u16 {
    debug_assert!(width > 0 && width <= msb + 1);
    let lsb = msb + 1 - width;
    ((word as u32 >> lsb) & ((1u32 << width) - 1)) as u16
}

/// Interpret the low `width` bits of `value` as two's complement.
#[inline]
pub fn sign_extend(value: u16, width: u32) -> i16 {
    debug_assert!(width > 0 && width <= WORD_BITS);
    let shift = WORD_BITS - width;
    ((value << shift) as i16) >> shift
}
