use log::trace;

use crate::encode::{encode_statement, Context, Emit};
use crate::error::AsmError;
use crate::memory::MEMORY_MAX;
use crate::symbol::{DirKind, SymbolTable};

/// Assembled unit, contains starting address and emitted words.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Air {
    /// Memory address to start program at
    orig: Option<u16>,
    words: Vec<u16>,
    /// Whether `.END` was reached
    ended: bool,
}

impl Air {
    pub fn new() -> Self {
        Air::default()
    }

    pub fn orig(&self) -> Option<u16> {
        self.orig
    }

    /// Set the .orig offset for the program. Error if set twice.
    pub fn set_orig(&mut self, val: u16) -> Result<(), AsmError> {
        if self.orig.is_some() {
            return Err(AsmError::DuplicateOrigin);
        }
        self.orig = Some(val);
        Ok(())
    }

    /// Place the output of one statement.
    pub fn push(&mut self, emit: Emit) -> Result<(), AsmError> {
        if self.ended {
            return Err(AsmError::AfterEnd);
        }
        let orig = match (self.orig, &emit) {
            (None, Emit::Origin(_)) | (Some(_), _) => self.orig.unwrap_or_default(),
            (None, _) => return Err(AsmError::MissingOrigin),
        };
        if orig as usize + self.words.len() + emit.len() > MEMORY_MAX {
            return Err(AsmError::Overflow);
        }
        match emit {
            Emit::Origin(val) => self.set_orig(val)?,
            Emit::Word(word) => self.words.push(word),
            Emit::Block(count) => self.words.resize(self.words.len() + count as usize, 0),
            Emit::Chars(chars) => self.words.extend(chars),
            Emit::End => self.ended = true,
        }
        Ok(())
    }

    pub fn words(&self) -> &[u16] {
        &self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Origin word followed by the program words, as loaded by
    /// [`crate::MemoryImage::load_raw`].
    pub fn to_raw(&self) -> Vec<u16> {
        let mut raw = Vec::with_capacity(self.words.len() + 1);
        raw.push(self.orig.unwrap_or(crate::memory::USER_ORIG));
        raw.extend_from_slice(&self.words);
        raw
    }

    /// Binary image with big-endian words.
    pub fn to_image(&self) -> Vec<u8> {
        self.to_raw()
            .into_iter()
            .flat_map(|word| word.to_be_bytes())
            .collect()
    }
}

/// Feeds resolved statements through the encoder into an [`Air`].
///
/// A statement that fails leaves the unit as it was.
#[derive(Debug)]
pub struct Assembler<'a> {
    symbols: &'a SymbolTable,
    air: Air,
}

impl<'a> Assembler<'a> {
    pub fn new(symbols: &'a SymbolTable) -> Self {
        Assembler {
            symbols,
            air: Air::new(),
        }
    }

    /// Encode and place one statement.
    pub fn statement(&mut self, mnemonic: &str, operands: &[&str]) -> Result<(), AsmError> {
        if self.air.is_ended() {
            return Err(AsmError::AfterEnd);
        }
        let is_orig = DirKind::from_name(mnemonic) == Some(DirKind::Orig);
        let orig = match self.air.orig() {
            Some(_) if is_orig => return Err(AsmError::DuplicateOrigin),
            Some(orig) => orig,
            None if is_orig => 0,
            None => return Err(AsmError::MissingOrigin),
        };
        let offset = self.air.len() as u16;
        let ctx = Context::new(self.symbols, orig, offset);
        let emit = encode_statement(mnemonic, operands, &ctx)?;
        trace!("0x{:04x}: {mnemonic} {operands:?} -> {emit:?}", orig.wrapping_add(offset));
        self.air.push(emit)
    }

    pub fn air(&self) -> &Air {
        &self.air
    }

    /// Finish the unit. An empty unit without `.ORIG` is an error.
    pub fn finish(self) -> Result<Air, AsmError> {
        if self.air.orig().is_none() {
            return Err(AsmError::MissingOrigin);
        }
        Ok(self.air)
    }
}
