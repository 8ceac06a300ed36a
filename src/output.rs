use std::fmt::{self, Write};

use crate::instr::decode;
use crate::state::RegisterFile;
use crate::symbol::Register;

/// Register table printed after a run.
///
/// Minimal output prints one `name value` pair per line with no color.
pub struct RegisterDump<'a> {
    regs: &'a RegisterFile,
    minimal: bool,
}

impl<'a> RegisterDump<'a> {
    pub fn new(regs: &'a RegisterFile, minimal: bool) -> Self {
        RegisterDump { regs, minimal }
    }
}

impl fmt::Display for RegisterDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.minimal {
            for reg in Register::ALL {
                writeln!(f, "{} {}", reg, self.regs.get(reg) as i16)?;
            }
            writeln!(f, "PC {}", self.regs.pc())?;
            writeln!(f, "CC {}", self.regs.cc())?;
            return Ok(());
        }

        writeln!(f, "\x1b[2m┌────────────────────────────────────┐\x1b[0m")?;
        writeln!(
            f,
            "\x1b[2m│        \x1b[3mhex     int    uint    char\x1b[0m\x1b[2m │\x1b[0m"
        )?;
        for reg in Register::ALL {
            let value = self.regs.get(reg);
            write!(f, "\x1b[2m│\x1b[0m \x1b[1m{}\x1b[0m  ", reg)?;
            write!(f, "0x{:04x}  {:-6}  {:-6}     ", value, value as i16, value)?;
            f.write_str(&char_display(value))?;
            writeln!(f, " \x1b[2m│\x1b[0m")?;
        }
        write!(f, "\x1b[2m│\x1b[0m \x1b[1mPC\x1b[0m  0x{:04x}", self.regs.pc())?;
        write!(f, "                 \x1b[1mCC\x1b[0m  {}  ", self.regs.cc())?;
        writeln!(f, " \x1b[2m│\x1b[0m")?;
        writeln!(f, "\x1b[2m└────────────────────────────────────┘\x1b[0m")
    }
}

/// Three column wide display of a word as a character.
fn char_display(value: u16) -> String {
    match value {
        // ASCII control characters which are arbitrarily considered significant
        0x00 => "NUL".into(),
        0x08 => "BS ".into(),
        0x09 => "HT ".into(),
        0x0a => "LF ".into(),
        0x0b => "VT ".into(),
        0x0c => "FF ".into(),
        0x0d => "CR ".into(),
        0x1b => "ESC".into(),
        0x7f => "DEL".into(),
        0x20 => "[_]".into(),
        0x21..=0x7e => format!("{:<3}", value as u8 as char),
        // Unimportant control characters
        0x00..=0x7f => "\x1b[2m───\x1b[0m".into(),
        0x0080.. => "\x1b[2m┄┄┄\x1b[0m".into(),
    }
}

/// Disassembly of a loaded image, one line per word: address, raw word and instruction.
///
/// Words which do not decode are shown as `.FILL`.
pub fn listing(orig: u16, words: &[u16]) -> String {
    let mut out = String::new();
    for (i, &word) in words.iter().enumerate() {
        let addr = orig.wrapping_add(i as u16);
        // Writing to a `String` cannot fail
        let _ = match decode(word) {
            Ok(instr) => writeln!(out, "x{addr:04X}  x{word:04X}  {instr}"),
            Err(_) => writeln!(out, "x{addr:04X}  x{word:04X}  .FILL x{word:04X}"),
        };
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_dump() {
        let mut regs = RegisterFile::new(0x3000);
        regs.set_with_cc(Register::R2, 0xFFFF);
        regs.set(Register::R7, 12);
        let dump = RegisterDump::new(&regs, true).to_string();
        let lines: Vec<_> = dump.lines().collect();
        assert_eq!(lines.len(), 10);
        assert_eq!(lines[2], "R2 -1");
        assert_eq!(lines[7], "R7 12");
        assert_eq!(lines[8], "PC 12288");
        assert_eq!(lines[9], "CC N");
    }

    #[test]
    fn fancy_dump_shows_chars() {
        let mut regs = RegisterFile::new(0x3000);
        regs.set(Register::R0, 'A' as u16);
        let dump = RegisterDump::new(&regs, false).to_string();
        assert!(dump.contains("0x0041"));
        assert!(dump.contains("A  "));
        assert!(dump.contains("0x3000"));
    }

    #[test]
    fn listing_lines() {
        let text = listing(0x3000, &[0x1283, 0xF025, 0xD000]);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "x3000  x1283  ADD R1, R2, R3");
        assert_eq!(lines[1], "x3001  xF025  HALT");
        assert_eq!(lines[2], "x3002  xD000  .FILL xD000");
    }
}
