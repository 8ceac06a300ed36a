//! Encoding of instructions and assembler statements into words.

use crate::error::AsmError;
use crate::instr::{Instruction, Operand};
use crate::layout::signed_range;
use crate::literal;
use crate::symbol::{BranchCondition, DirKind, Register, SymbolTable, TrapVector};

/// Encode an instruction into its word, the inverse of [`crate::decode`].
pub fn encode(instr: &Instruction) -> Result<u16, AsmError> {
    use Instruction::*;
    let reg = |reg: &Register| *reg as u16;
    let offs = |offset: &i16| *offset as u16;
    let values: Vec<u16> = match instr {
        Add { dr, sr1, src2 } | And { dr, sr1, src2 } => match src2 {
            Operand::Reg(sr2) => vec![reg(dr), reg(sr1), reg(sr2)],
            Operand::Imm(imm) => vec![reg(dr), reg(sr1), offs(imm)],
        },
        Br { cond, offset } => vec![cond.bits(), offs(offset)],
        Jmp { base } | Jsrr { base } => vec![reg(base)],
        Jsr { offset } => vec![offs(offset)],
        Ld { dr, offset } | Ldi { dr, offset } | Lea { dr, offset } => vec![reg(dr), offs(offset)],
        St { sr, offset } | Sti { sr, offset } => vec![reg(sr), offs(offset)],
        Ldr { dr, base, offset } => vec![reg(dr), reg(base), offs(offset)],
        Str { sr, base, offset } => vec![reg(sr), reg(base), offs(offset)],
        Not { dr, sr } => vec![reg(dr), reg(sr)],
        Rti => vec![],
        Trap { vector } => vec![*vector as u16],
    };
    instr.layout().pack(&values)
}

/// Output of a single assembler statement, to be placed verbatim by the writer.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Emit {
    /// `.ORIG`: load address of the unit.
    Origin(u16),
    /// An instruction or `.FILL` value.
    Word(u16),
    /// `.BLKW`: amount of zeroed words to reserve.
    Block(u16),
    /// `.STRINGZ`: one word per character, including the terminating zero.
    Chars(Vec<u16>),
    /// `.END`: nothing is emitted.
    End,
}

impl Emit {
    /// Amount of words this statement occupies in the image.
    pub fn len(&self) -> usize {
        match self {
            Emit::Origin(_) | Emit::End => 0,
            Emit::Word(_) => 1,
            Emit::Block(count) => *count as usize,
            Emit::Chars(chars) => chars.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Position of the statement being encoded, for resolving labels.
#[derive(Clone, Copy, Debug)]
pub struct Context<'a> {
    pub symbols: &'a SymbolTable,
    /// Unit origin, once known.
    pub orig: u16,
    /// Word offset of the statement from the origin.
    pub offset: u16,
}

impl<'a> Context<'a> {
    pub fn new(symbols: &'a SymbolTable, orig: u16, offset: u16) -> Self {
        Context {
            symbols,
            orig,
            offset,
        }
    }

    /// Offset from the incremented PC to `label`.
    fn relative(&self, label: &str) -> Result<i32, AsmError> {
        let target = self
            .symbols
            .get(label)
            .ok_or_else(|| AsmError::UndefinedLabel {
                label: label.to_string(),
            })?;
        Ok(target as i32 - (self.offset as i32 + 1))
    }

    fn absolute(&self, label: &str) -> Result<u16, AsmError> {
        let offset = self
            .symbols
            .get(label)
            .ok_or_else(|| AsmError::UndefinedLabel {
                label: label.to_string(),
            })?;
        Ok(self.orig.wrapping_add(offset))
    }
}

/// Encode one statement: an instruction mnemonic or a directive with its operand tokens.
pub fn encode_statement(
    mnemonic: &str,
    operands: &[&str],
    ctx: &Context,
) -> Result<Emit, AsmError> {
    if let Some(dir) = DirKind::from_name(mnemonic) {
        return encode_directive(dir, mnemonic, operands, ctx);
    }
    let instr = parse_instruction(mnemonic, operands, ctx)?;
    Ok(Emit::Word(encode(&instr)?))
}

/// Resolve a mnemonic and its operand tokens into an [`Instruction`].
///
/// The register or immediate form of `ADD`/`AND` is chosen here from the shape of the last
/// operand.
pub fn parse_instruction(
    mnemonic: &str,
    operands: &[&str],
    ctx: &Context,
) -> Result<Instruction, AsmError> {
    let upper = mnemonic.to_ascii_uppercase();
    let ops = Operands { mnemonic, operands };

    if let Some(trap) = TrapVector::from_alias(&upper) {
        ops.count(0)?;
        return Ok(Instruction::Trap {
            vector: trap.vector(),
        });
    }

    let instr = match upper.as_str() {
        "ADD" | "AND" => {
            ops.count(3)?;
            let dr = reg(operands[0])?;
            let sr1 = reg(operands[1])?;
            let src2 = reg_or_imm5(operands[2])?;
            if upper == "ADD" {
                Instruction::Add { dr, sr1, src2 }
            } else {
                Instruction::And { dr, sr1, src2 }
            }
        }
        "JMP" => {
            ops.count(1)?;
            Instruction::Jmp {
                base: reg(operands[0])?,
            }
        }
        "RET" => {
            ops.count(0)?;
            Instruction::Jmp { base: Register::R7 }
        }
        "JSR" => {
            ops.count(1)?;
            Instruction::Jsr {
                offset: pc_offset(operands[0], 11, ctx)?,
            }
        }
        "JSRR" => {
            ops.count(1)?;
            Instruction::Jsrr {
                base: reg(operands[0])?,
            }
        }
        "LD" | "LDI" | "LEA" | "ST" | "STI" => {
            ops.count(2)?;
            let reg = reg(operands[0])?;
            let offset = pc_offset(operands[1], 9, ctx)?;
            match upper.as_str() {
                "LD" => Instruction::Ld { dr: reg, offset },
                "LDI" => Instruction::Ldi { dr: reg, offset },
                "LEA" => Instruction::Lea { dr: reg, offset },
                "ST" => Instruction::St { sr: reg, offset },
                _ => Instruction::Sti { sr: reg, offset },
            }
        }
        "LDR" | "STR" => {
            ops.count(3)?;
            let reg = reg(operands[0])?;
            let base = self::reg(operands[1])?;
            let offset = signed_lit(operands[2], 6)?;
            if upper == "LDR" {
                Instruction::Ldr {
                    dr: reg,
                    base,
                    offset,
                }
            } else {
                Instruction::Str {
                    sr: reg,
                    base,
                    offset,
                }
            }
        }
        "NOT" => {
            ops.count(2)?;
            Instruction::Not {
                dr: reg(operands[0])?,
                sr: reg(operands[1])?,
            }
        }
        "RTI" => {
            ops.count(0)?;
            Instruction::Rti
        }
        "TRAP" => {
            ops.count(1)?;
            let vector = lit(operands[0])?;
            if !(0..=0xFF).contains(&vector) {
                return Err(invalid(operands[0], "trap vector in range [x00, xFF]"));
            }
            Instruction::Trap {
                vector: vector as u8,
            }
        }
        _ => {
            // Branches carry their flags in the mnemonic, eg. `BRnz`
            let cond = upper
                .strip_prefix("BR")
                .and_then(|_| BranchCondition::from_suffix(&mnemonic[2..]))
                .ok_or_else(|| AsmError::UnknownMnemonic {
                    name: mnemonic.to_string(),
                })?;
            ops.count(1)?;
            Instruction::Br {
                cond,
                offset: pc_offset(operands[0], 9, ctx)?,
            }
        }
    };
    Ok(instr)
}

fn encode_directive(
    dir: DirKind,
    name: &str,
    operands: &[&str],
    ctx: &Context,
) -> Result<Emit, AsmError> {
    let ops = Operands {
        mnemonic: name,
        operands,
    };
    let emit = match dir {
        DirKind::Orig => {
            ops.count(1)?;
            Emit::Origin(unsigned_lit(operands[0], "address in range [x0000, xFFFF]")?)
        }
        DirKind::Fill => {
            ops.count(1)?;
            let value = match literal::parse(operands[0]) {
                Some(value) => literal::to_word(value),
                None => label(operands[0], |label| ctx.absolute(label))?,
            };
            Emit::Word(value)
        }
        DirKind::Blkw => {
            ops.count(1)?;
            Emit::Block(unsigned_lit(operands[0], "word count in range [0, 65535]")?)
        }
        DirKind::Stringz => {
            ops.count(1)?;
            let mut chars = operands[0]
                .chars()
                .map(|ch| u16::try_from(ch as u32).map_err(|_| invalid(operands[0], "string of 16-bit characters")))
                .collect::<Result<Vec<_>, _>>()?;
            chars.push(0);
            Emit::Chars(chars)
        }
        DirKind::End => {
            ops.count(0)?;
            Emit::End
        }
    };
    Ok(emit)
}

struct Operands<'a, 'b> {
    mnemonic: &'a str,
    operands: &'a [&'b str],
}

impl Operands<'_, '_> {
    fn count(&self, expected: usize) -> Result<(), AsmError> {
        if self.operands.len() != expected {
            return Err(AsmError::OperandCount {
                mnemonic: self.mnemonic.to_string(),
                expected,
                found: self.operands.len(),
            });
        }
        Ok(())
    }
}

fn invalid(operand: &str, expected: &str) -> AsmError {
    AsmError::InvalidOperand {
        operand: operand.to_string(),
        expected: expected.to_string(),
    }
}

fn reg(token: &str) -> Result<Register, AsmError> {
    token
        .parse()
        .map_err(|()| invalid(token, "register R0-R7"))
}

fn lit(token: &str) -> Result<i32, AsmError> {
    literal::parse(token).ok_or_else(|| invalid(token, "numeric literal"))
}

fn unsigned_lit(token: &str, expected: &str) -> Result<u16, AsmError> {
    let value = lit(token)?;
    u16::try_from(value).map_err(|_| invalid(token, expected))
}

/// Literal for a signed field of `width` bits. Hex literals may be written as the field's
/// two's complement word, eg. `xFFFF` for `-1`.
fn signed_lit(token: &str, width: u32) -> Result<i16, AsmError> {
    let mut value = lit(token)?;
    if literal::is_hex(token) {
        value = literal::to_word(value) as i16 as i32;
    }
    let (min, max) = signed_range(width);
    if !(min..=max).contains(&value) {
        return Err(invalid(token, &format!("literal in range [{min}, {max}]")));
    }
    Ok(value as i16)
}

fn reg_or_imm5(token: &str) -> Result<Operand, AsmError> {
    if let Ok(reg) = token.parse() {
        return Ok(Operand::Reg(reg));
    }
    if literal::parse(token).is_some() {
        return signed_lit(token, 5).map(Operand::Imm);
    }
    Err(invalid(token, "register R0-R7 or literal in range [-16, 15]"))
}

/// Label lookup for a token that is not a literal.
fn label<T>(token: &str, resolve: impl FnOnce(&str) -> Result<T, AsmError>) -> Result<T, AsmError> {
    if token.parse::<Register>().is_ok() || !is_label(token) {
        return Err(invalid(token, "label or numeric literal"));
    }
    resolve(token)
}

/// PC-relative offset of `width` bits, written as a literal or a label.
fn pc_offset(token: &str, width: u32, ctx: &Context) -> Result<i16, AsmError> {
    if literal::parse(token).is_some() {
        return signed_lit(token, width);
    }
    let offset = label(token, |label| ctx.relative(label))?;
    let (min, max) = signed_range(width);
    if !(min..=max).contains(&offset) {
        return Err(AsmError::LabelOutOfRange {
            label: token.to_string(),
            width,
        });
    }
    Ok(offset as i16)
}

/// Test if a token could name a label.
pub fn is_label(token: &str) -> bool {
    let mut chars = token.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instr::decode;
    use crate::layout::signed_range;
    use Register::*;

    fn symbols() -> SymbolTable {
        [("START", 0u16), ("LOOP", 2), ("DATA", 10), ("FAR", 600)]
            .into_iter()
            .collect()
    }

    fn stmt(mnemonic: &str, operands: &[&str], offset: u16) -> Result<Emit, AsmError> {
        let symbols = symbols();
        let ctx = Context::new(&symbols, 0x3000, offset);
        encode_statement(mnemonic, operands, &ctx)
    }

    fn word(mnemonic: &str, operands: &[&str]) -> u16 {
        match stmt(mnemonic, operands, 4).unwrap() {
            Emit::Word(word) => word,
            other => panic!("expected a word, found {other:?}"),
        }
    }

    #[test]
    fn round_trips_every_opcode() {
        let mut cases = Vec::new();
        for reg in Register::ALL {
            cases.push(Instruction::Add { dr: reg, sr1: R6, src2: Operand::Reg(reg) });
            cases.push(Instruction::And { dr: R1, sr1: reg, src2: Operand::Reg(R0) });
            cases.push(Instruction::Jmp { base: reg });
            cases.push(Instruction::Jsrr { base: reg });
            cases.push(Instruction::Not { dr: reg, sr: R3 });
        }
        let (min5, max5) = signed_range(5);
        for imm in [min5, -1, 0, 1, max5] {
            let imm = imm as i16;
            cases.push(Instruction::Add { dr: R1, sr1: R2, src2: Operand::Imm(imm) });
            cases.push(Instruction::And { dr: R7, sr1: R7, src2: Operand::Imm(imm) });
        }
        for offset in [-32, -1, 0, 31] {
            cases.push(Instruction::Ldr { dr: R4, base: R5, offset });
            cases.push(Instruction::Str { sr: R0, base: R6, offset });
        }
        for offset in [-256, -1, 0, 255] {
            cases.push(Instruction::Ld { dr: R0, offset });
            cases.push(Instruction::Ldi { dr: R1, offset });
            cases.push(Instruction::Lea { dr: R2, offset });
            cases.push(Instruction::St { sr: R3, offset });
            cases.push(Instruction::Sti { sr: R4, offset });
            for nzp in 0..8 {
                cases.push(Instruction::Br { cond: BranchCondition::from_bits(nzp), offset });
            }
        }
        for offset in [-1024, -1, 0, 1023] {
            cases.push(Instruction::Jsr { offset });
        }
        for vector in [0x00, 0x20, 0x25, 0xFF] {
            cases.push(Instruction::Trap { vector });
        }
        cases.push(Instruction::Rti);

        for instr in cases {
            let word = encode(&instr).unwrap();
            assert_eq!(decode(word), Ok(instr), "word 0x{word:04x}");
        }
    }

    #[test]
    fn out_of_range_fields_are_rejected() {
        let cases = [
            Instruction::Add { dr: R0, sr1: R0, src2: Operand::Imm(16) },
            Instruction::And { dr: R0, sr1: R0, src2: Operand::Imm(-17) },
            Instruction::Ldr { dr: R0, base: R0, offset: 32 },
            Instruction::Ld { dr: R0, offset: -257 },
            Instruction::Jsr { offset: 1024 },
        ];
        for instr in cases {
            assert!(
                matches!(encode(&instr), Err(AsmError::InvalidOperand { .. })),
                "{instr:?}"
            );
        }
    }

    #[test]
    fn decimal_literals_must_fit() {
        let cases: [(&str, &[&str]); 12] = [
            ("ADD", &["R0", "R0", "#16"]),
            ("ADD", &["R0", "R0", "#65535"]),
            ("AND", &["R0", "R0", "#-17"]),
            ("LDR", &["R0", "R1", "#32"]),
            ("LDR", &["R0", "R1", "#65504"]),
            ("STR", &["R0", "R1", "#-33"]),
            ("BRz", &["#256"]),
            ("LD", &["R0", "#65280"]),
            ("ST", &["R0", "#-257"]),
            ("JSR", &["#1024"]),
            ("JSR", &["#64512"]),
            ("JSR", &["#-1025"]),
        ];
        for (mnemonic, operands) in cases {
            assert!(
                matches!(stmt(mnemonic, operands, 0), Err(AsmError::InvalidOperand { .. })),
                "{mnemonic} {operands:?}"
            );
        }

        // Bounds still fit, and hex keeps its two's complement reading
        assert_eq!(word("ADD", &["R0", "R0", "#-16"]), 0x1030);
        assert_eq!(word("ADD", &["R0", "R0", "xFFFF"]), 0x103F);
        assert_eq!(word("LDR", &["R0", "R1", "#31"]), 0x605F);
        assert_eq!(word("LDR", &["R0", "R1", "xFFE0"]), 0x6060);
        assert_eq!(word("BRnzp", &["#-256"]), 0x0F00);
        assert_eq!(word("LD", &["R0", "#255"]), 0x20FF);
        assert_eq!(word("JSR", &["#-1024"]), 0x4C00);
        assert_eq!(word("JSR", &["xFC00"]), 0x4C00);
    }

    #[test]
    fn add_operand_shape() {
        assert_eq!(word("ADD", &["R1", "R2", "R3"]), 0x1283);
        assert_eq!(word("add", &["r1", "r2", "#-1"]), 0x12BF);
        assert_eq!(word("AND", &["R0", "R0", "#0"]), 0x5020);
        assert_eq!(word("ADD", &["R1", "R1", "x1"]), 0x1261);
        assert_eq!(word("ADD", &["R1", "R1", "#15"]), 0x126F);
        assert!(matches!(
            stmt("ADD", &["R1", "R1", "#16"], 0),
            Err(AsmError::InvalidOperand { .. })
        ));
        assert!(matches!(
            stmt("ADD", &["R1", "R1", "R8"], 0),
            Err(AsmError::InvalidOperand { .. })
        ));
        assert!(matches!(
            stmt("ADD", &["R1", "#1", "R2"], 0),
            Err(AsmError::InvalidOperand { .. })
        ));
        assert!(matches!(
            stmt("ADD", &["R1", "R2"], 0),
            Err(AsmError::OperandCount { expected: 3, found: 2, .. })
        ));
    }

    #[test]
    fn labels_resolve_relative_to_next_word() {
        // Statement at offset 4, LOOP at offset 2: 2 - (4 + 1) = -3
        assert_eq!(word("BRnz", &["LOOP"]), 0x0DFD);
        assert_eq!(word("LD", &["R1", "DATA"]), 0x2205);
        assert_eq!(word("LEA", &["R0", "START"]), 0xE1FB);
        assert_eq!(word("JSR", &["FAR"]), 0x4800 | 595);
        assert_eq!(word("BR", &["#-1"]), 0x0FFF);
        assert!(matches!(
            stmt("LD", &["R1", "FAR"], 0),
            Err(AsmError::LabelOutOfRange { width: 9, .. })
        ));
        assert_eq!(
            stmt("ST", &["R1", "MISSING"], 0),
            Err(AsmError::UndefinedLabel {
                label: "MISSING".to_string()
            })
        );
    }

    #[test]
    fn mnemonic_aliases() {
        assert_eq!(word("RET", &[]), 0xC1C0);
        assert_eq!(word("HALT", &[]), 0xF025);
        assert_eq!(word("getc", &[]), 0xF020);
        assert_eq!(word("TRAP", &["x22"]), 0xF022);
        assert_eq!(word("NOT", &["R0", "R1"]), 0x907F);
        assert_eq!(word("JSRR", &["R3"]), 0x40C0);
        assert_eq!(word("LDR", &["R2", "R6", "#-32"]), 0x65A0);
        assert_eq!(word("STR", &["R2", "R6", "#31"]), 0x759F);
        assert_eq!(word("RTI", &[]), 0x8000);
        assert!(matches!(
            stmt("TRAP", &["x100"], 0),
            Err(AsmError::InvalidOperand { .. })
        ));
        assert!(matches!(
            stmt("BRx", &["LOOP"], 0),
            Err(AsmError::UnknownMnemonic { .. })
        ));
        assert!(matches!(
            stmt("MUL", &["R0"], 0),
            Err(AsmError::UnknownMnemonic { .. })
        ));
    }

    #[test]
    fn directives() {
        assert_eq!(stmt(".ORIG", &["x3000"], 0), Ok(Emit::Origin(0x3000)));
        assert_eq!(stmt(".fill", &["#-1"], 0), Ok(Emit::Word(0xFFFF)));
        assert_eq!(stmt(".FILL", &["DATA"], 0), Ok(Emit::Word(0x300A)));
        assert_eq!(stmt(".BLKW", &["#3"], 0), Ok(Emit::Block(3)));
        assert_eq!(
            stmt(".STRINGZ", &["Hi!"], 0),
            Ok(Emit::Chars(vec!['H' as u16, 'i' as u16, '!' as u16, 0]))
        );
        assert_eq!(stmt(".STRINGZ", &[""], 0), Ok(Emit::Chars(vec![0])));
        assert_eq!(stmt(".END", &[], 0), Ok(Emit::End));
        assert!(matches!(
            stmt(".BLKW", &["#-1"], 0),
            Err(AsmError::InvalidOperand { .. })
        ));
        assert!(matches!(
            stmt(".FILL", &["R1"], 0),
            Err(AsmError::InvalidOperand { .. })
        ));
        assert!(matches!(
            stmt(".END", &["x1"], 0),
            Err(AsmError::OperandCount { .. })
        ));
    }
}
