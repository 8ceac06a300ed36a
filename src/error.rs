use std::io;

use miette::Diagnostic;
use thiserror::Error;

// Decoder errors

#[derive(Debug, Error, Diagnostic, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Word 0x{word:04x} does not encode an instruction")]
    #[diagnostic(
        code(decode::illegal),
        help("opcode 0b1101 is reserved and has no meaning on this machine")
    )]
    IllegalOpcode { word: u16 },
}

// Runtime errors

#[derive(Debug, Error, Diagnostic)]
pub enum RunError {
    #[error("Illegal instruction 0x{word:04x} at address 0x{pc:04x}")]
    #[diagnostic(
        code(run::illegal_instruction),
        help("data may have been executed as code; check that control flow stays within the program")
    )]
    IllegalInstruction { pc: u16, word: u16 },

    #[error("Unsupported trap in word 0x{word:04x} at address 0x{pc:04x}")]
    #[diagnostic(
        code(run::unsupported_trap),
        help("available traps are GETC x20, OUT x21, PUTS x22, IN x23, PUTSP x24 and HALT x25")
    )]
    UnsupportedTrap { pc: u16, word: u16 },

    #[error("Console I/O failed in trap at address 0x{pc:04x}")]
    #[diagnostic(code(run::io), help("input may have ended before the program read it"))]
    Io {
        pc: u16,
        #[source]
        source: io::Error,
    },

    #[error("Program did not halt within {limit} instructions")]
    #[diagnostic(
        code(run::step_limit),
        help("raise the limit with `--step-limit` or `LC3VM_STEP_LIMIT`")
    )]
    StepLimitExceeded { limit: u64 },
}

// Image loading errors

#[derive(Debug, Error, Diagnostic)]
pub enum ImageLoadError {
    #[error("Failed to read image")]
    #[diagnostic(code(load::io))]
    Io(#[from] io::Error),

    #[error("Image is empty and has no origin word")]
    #[diagnostic(code(load::empty))]
    Empty,

    #[error("Image of {len} bytes is not aligned to 16 bits")]
    #[diagnostic(
        code(load::misaligned),
        help("the file may be truncated; images are a sequence of big-endian 16-bit words")
    )]
    Misaligned { len: usize },

    #[error("Image of {len} words at origin 0x{orig:04x} does not fit in memory")]
    #[diagnostic(code(load::too_long))]
    TooLong { orig: u16, len: usize },
}

// Encoder errors

#[derive(Debug, Error, Diagnostic, PartialEq, Eq)]
pub enum AsmError {
    #[error("Invalid operand `{operand}`, expected {expected}")]
    #[diagnostic(
        code(asm::invalid_operand),
        help("check the type and range of operands allowed for this instruction")
    )]
    InvalidOperand { operand: String, expected: String },

    #[error("Fields of `{layout}` span {width} bits instead of 16")]
    #[diagnostic(code(asm::malformed))]
    MalformedInstruction { layout: &'static str, width: u32 },

    #[error("Unknown instruction or directive `{name}`")]
    #[diagnostic(
        code(asm::unknown),
        help("check the list of available instructions and directives in the documentation")
    )]
    UnknownMnemonic { name: String },

    #[error("`{mnemonic}` takes {expected} operand(s), found {found}")]
    #[diagnostic(code(asm::operand_count))]
    OperandCount {
        mnemonic: String,
        expected: usize,
        found: usize,
    },

    #[error("Label `{label}` is not defined")]
    #[diagnostic(code(asm::undefined_label))]
    UndefinedLabel { label: String },

    #[error("Label `{label}` is out of reach for a {width}-bit offset")]
    #[diagnostic(
        code(asm::label_range),
        help("load the address with `LD`/`LEA` from a nearby `.FILL` instead")
    )]
    LabelOutOfRange { label: String, width: u32 },

    #[error("Expected `.ORIG` before the first statement")]
    #[diagnostic(code(asm::missing_orig))]
    MissingOrigin,

    #[error("Origin set twice")]
    #[diagnostic(
        code(asm::duplicate_orig),
        help("an assembly unit has exactly one `.ORIG`, as its first statement")
    )]
    DuplicateOrigin,

    #[error("Statement after `.END`")]
    #[diagnostic(code(asm::after_end))]
    AfterEnd,

    #[error("Assembly unit does not fit in memory")]
    #[diagnostic(code(asm::overflow))]
    Overflow,
}

// Front-end errors

#[derive(Debug, Error, Diagnostic, PartialEq, Eq)]
pub enum SourceError {
    #[error("Line {line}: duplicate label `{label}`")]
    #[diagnostic(
        code(parse::duplicate_label),
        help("labels are only allowed once per file")
    )]
    DuplicateLabel { line: usize, label: String },

    #[error("Line {line}: unterminated string literal")]
    #[diagnostic(
        code(parse::str_lit),
        help("make sure to close string literals with a \" character")
    )]
    UnterminatedString { line: usize },

    #[error("Line {line}: {source}")]
    #[diagnostic(code(parse::statement))]
    Statement {
        line: usize,
        #[source]
        #[diagnostic_source]
        source: AsmError,
    },
}
