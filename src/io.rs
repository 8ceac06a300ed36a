use std::collections::VecDeque;
use std::io::{self, stdin, stdout, IsTerminal, Read, Write};

use console::Term;

/// Character device used by the trap routines.
pub trait Console {
    /// Block until one character is available.
    fn read_char(&mut self) -> io::Result<u8>;

    fn write_char(&mut self, ch: u8) -> io::Result<()>;

    /// Called once a trap routine has finished writing.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Process stdin and stdout.
///
/// Reads single unbuffered keys when stdin is an interactive terminal.
#[derive(Debug, Default)]
pub struct StdConsole;

impl Console for StdConsole {
    fn read_char(&mut self) -> io::Result<u8> {
        if stdin().is_terminal() {
            key_to_byte(Term::stdout().read_char()?)
        } else {
            let mut buf = [0; 1];
            stdin().read_exact(&mut buf)?;
            Ok(buf[0])
        }
    }

    fn write_char(&mut self, ch: u8) -> io::Result<()> {
        stdout().write_all(&[ch])
    }

    fn flush(&mut self) -> io::Result<()> {
        stdout().flush()
    }
}

/// Keys outside ASCII have no single-byte encoding for `R0`.
fn key_to_byte(key: char) -> io::Result<u8> {
    if key.is_ascii() {
        Ok(key as u8)
    } else {
        Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Key '{key}' is not an ASCII character"),
        ))
    }
}

/// In-memory console with scripted input and captured output.
#[derive(Debug, Default, Clone)]
pub struct BufferConsole {
    input: VecDeque<u8>,
    output: Vec<u8>,
}

impl BufferConsole {
    pub fn new(input: impl AsRef<[u8]>) -> Self {
        BufferConsole {
            input: input.as_ref().iter().copied().collect(),
            output: Vec::new(),
        }
    }

    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Output decoded lossily as UTF-8.
    pub fn output_str(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }
}

impl Console for BufferConsole {
    fn read_char(&mut self) -> io::Result<u8> {
        self.input
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "console input exhausted"))
    }

    fn write_char(&mut self, ch: u8) -> io::Result<()> {
        self.output.push(ch);
        Ok(())
    }
}
