use std::borrow::Cow;

use log::debug;

use crate::air::{Air, Assembler};
use crate::encode::is_label;
use crate::error::{AsmError, SourceError};
use crate::literal;
use crate::symbol::{BranchCondition, DirKind, SymbolTable, TrapVector};

const OPCODES: [&str; 17] = [
    "ADD", "AND", "JMP", "RET", "JSR", "JSRR", "LD", "LDI", "LDR", "LEA", "NOT", "RTI", "ST",
    "STI", "STR", "TRAP", "BR",
];

/// Operand token on a source line.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Token {
    Word(String),
    /// Quoted string with escapes already resolved.
    Str(String),
}

/// One source line holding an instruction or directive.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Statement {
    /// 1-based source line
    pub line: usize,
    pub label: Option<String>,
    pub mnemonic: String,
    pub operands: Vec<Token>,
}

impl Statement {
    /// Operand text as handed to the encoder. Only `.STRINGZ` takes a string literal.
    pub fn operand_strs(&self) -> Result<Vec<&str>, SourceError> {
        let is_stringz = DirKind::from_name(&self.mnemonic) == Some(DirKind::Stringz);
        self.operands
            .iter()
            .map(|token| match (token, is_stringz) {
                (Token::Str(s), true) | (Token::Word(s), false) => Ok(s.as_str()),
                (Token::Word(s), true) => Err(invalid(self.line, s.clone(), "a string literal")),
                (Token::Str(s), false) => Err(invalid(
                    self.line,
                    format!("\"{s}\""),
                    "a register, literal or label",
                )),
            })
            .collect()
    }
}

/// Statements of a source file together with the labels found in the first pass.
#[derive(Debug)]
pub struct Source {
    pub statements: Vec<Statement>,
    pub symbols: SymbolTable,
    lines: usize,
}

/// Split source text into statements and assign every label its offset from `.ORIG`.
pub fn read(src: &str) -> Result<Source, SourceError> {
    let mut statements = Vec::new();
    let mut symbols = SymbolTable::new();
    let mut offset: usize = 0;
    let mut lines = 0;

    for (i, text) in src.lines().enumerate() {
        let line = i + 1;
        lines = line;
        let mut tokens = tokenize(text, line)?.into_iter();
        let Some(first) = tokens.next() else {
            continue;
        };
        let first = match first {
            Token::Word(word) => word,
            Token::Str(s) => return Err(unknown(line, format!("\"{s}\""))),
        };

        let (label, mnemonic) = if is_mnemonic(&first) {
            (None, Some(first))
        } else {
            let name = first.strip_suffix(':').unwrap_or(&first);
            if !is_label(name) {
                return Err(unknown(line, first));
            }
            let mnemonic = match tokens.next() {
                Some(Token::Word(word)) => Some(word),
                Some(Token::Str(s)) => return Err(unknown(line, format!("\"{s}\""))),
                None => None,
            };
            (Some(name.to_string()), mnemonic)
        };

        // Label refers to the next word placed
        if let Some(label) = &label {
            let Ok(offset) = u16::try_from(offset) else {
                return Err(SourceError::Statement {
                    line,
                    source: AsmError::Overflow,
                });
            };
            if symbols.insert(label.as_str(), offset).is_some() {
                return Err(SourceError::DuplicateLabel {
                    line,
                    label: label.clone(),
                });
            }
        }
        let Some(mnemonic) = mnemonic else {
            continue;
        };

        let statement = Statement {
            line,
            label,
            mnemonic,
            operands: tokens.collect(),
        };
        offset += statement_size(&statement);
        statements.push(statement);
    }

    debug!(
        "Read {} statements with {} labels",
        statements.len(),
        symbols.len()
    );
    Ok(Source {
        statements,
        symbols,
        lines,
    })
}

/// Assemble source text into a unit.
pub fn assemble(src: &str) -> Result<Air, SourceError> {
    let source = read(src)?;
    let mut asm = Assembler::new(&source.symbols);
    for statement in &source.statements {
        let operands = statement.operand_strs()?;
        asm.statement(&statement.mnemonic, &operands)
            .map_err(|err| SourceError::Statement {
                line: statement.line,
                source: err,
            })?;
    }
    asm.finish().map_err(|err| SourceError::Statement {
        line: source.lines.max(1),
        source: err,
    })
}

/// Words a statement occupies. Unparseable sizes count as zero, the encoder reports them.
fn statement_size(statement: &Statement) -> usize {
    match DirKind::from_name(&statement.mnemonic) {
        Some(DirKind::Orig | DirKind::End) => 0,
        Some(DirKind::Blkw) => match statement.operands.first() {
            Some(Token::Word(count)) => literal::parse(count)
                .filter(|count| *count >= 0)
                .map_or(0, |count| count as usize),
            _ => 0,
        },
        Some(DirKind::Stringz) => match statement.operands.first() {
            Some(Token::Str(s)) => s.chars().count() + 1,
            _ => 0,
        },
        Some(DirKind::Fill) | None => 1,
    }
}

fn is_mnemonic(token: &str) -> bool {
    let upper = token.to_ascii_uppercase();
    DirKind::from_name(&upper).is_some()
        || TrapVector::from_alias(&upper).is_some()
        || OPCODES.contains(&upper.as_str())
        || (upper.starts_with("BR") && BranchCondition::from_suffix(&token[2..]).is_some())
}

/// Split a line into tokens on whitespace and commas, dropping any `;` comment.
fn tokenize(text: &str, line: usize) -> Result<Vec<Token>, SourceError> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        match c {
            ';' => break,
            c if c.is_whitespace() || c == ',' => {
                chars.next();
            }
            '"' => {
                chars.next();
                let mut escaped = false;
                let mut end = None;
                for (i, c) in chars.by_ref() {
                    match c {
                        '"' if !escaped => {
                            end = Some(i);
                            break;
                        }
                        '\\' => escaped = !escaped,
                        _ => escaped = false,
                    }
                }
                let end = end.ok_or(SourceError::UnterminatedString { line })?;
                tokens.push(Token::Str(unescape(&text[start + 1..end]).into_owned()));
            }
            _ => {
                let mut end = text.len();
                while let Some(&(i, c)) = chars.peek() {
                    if c.is_whitespace() || c == ',' || c == ';' || c == '"' {
                        end = i;
                        break;
                    }
                    chars.next();
                }
                tokens.push(Token::Word(text[start..end].to_string()));
            }
        }
    }
    Ok(tokens)
}

/// Resolve backslash escapes. Unknown escapes are kept as written.
fn unescape(s: &str) -> Cow<str> {
    if !s.contains('\\') {
        return Cow::Borrowed(s);
    }
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some('0') => result.push('\0'),
            Some('\\') => result.push('\\'),
            Some('"') => result.push('"'),
            Some(c) => {
                result.push('\\');
                result.push(c);
            }
            // Trailing backslash
            None => result.push('\\'),
        }
    }
    Cow::Owned(result)
}

fn unknown(line: usize, name: String) -> SourceError {
    SourceError::Statement {
        line,
        source: AsmError::UnknownMnemonic { name },
    }
}

fn invalid(line: usize, operand: String, expected: &str) -> SourceError {
    SourceError::Statement {
        line,
        source: AsmError::InvalidOperand {
            operand,
            expected: expected.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(text: &str) -> Vec<Token> {
        tokenize(text, 1).unwrap()
    }

    fn word(s: &str) -> Token {
        Token::Word(s.to_string())
    }

    #[test]
    fn tokenize_operands() {
        assert_eq!(
            words("  ADD R1,R2, #-1 ; increment"),
            vec![word("ADD"), word("R1"), word("R2"), word("#-1")]
        );
        assert_eq!(words("; only a comment"), vec![]);
        assert_eq!(words(""), vec![]);
        assert_eq!(
            words("MSG .STRINGZ \"a; b, \\\"c\\\"\\n\" ; trailing"),
            vec![
                word("MSG"),
                word(".STRINGZ"),
                Token::Str("a; b, \"c\"\n".to_string())
            ]
        );
    }

    #[test]
    fn unterminated_string() {
        assert_eq!(
            tokenize(".STRINGZ \"oops", 7),
            Err(SourceError::UnterminatedString { line: 7 })
        );
        assert_eq!(
            tokenize(".STRINGZ \"ends in escape\\\"", 2),
            Err(SourceError::UnterminatedString { line: 2 })
        );
    }

    #[test]
    fn unescape_sequences() {
        assert_eq!(unescape("plain"), "plain");
        assert_eq!(unescape("a\\tb\\0"), "a\tb\0");
        assert_eq!(unescape("\\\\"), "\\");
        assert_eq!(unescape("\\q"), "\\q");
        assert_eq!(unescape("end\\"), "end\\");
    }

    #[test]
    fn labels_get_offsets() {
        let src = "\
        .ORIG x3000
START   LEA R0, MSG
        PUTS
LOOP:
        BRnzp LOOP
MSG     .STRINGZ \"Hi\"
BUF     .BLKW #3
END     .FILL x0
        .END
";
        let source = read(src).unwrap();
        assert_eq!(source.symbols.get("START"), Some(0));
        assert_eq!(source.symbols.get("LOOP"), Some(2));
        assert_eq!(source.symbols.get("MSG"), Some(3));
        assert_eq!(source.symbols.get("BUF"), Some(6));
        assert_eq!(source.symbols.get("END"), Some(9));
        assert_eq!(source.statements.len(), 8);
        assert_eq!(source.statements[1].label.as_deref(), Some("START"));
        assert_eq!(source.statements[3].mnemonic, "BRnzp");
    }

    #[test]
    fn mnemonics_are_not_labels() {
        for name in ["add", "BR", "BRnz", "halt", "puts", ".orig", "RET"] {
            assert!(is_mnemonic(name), "{name}");
        }
        for name in ["LOOP", "BRANCH", "ORIG", "Getchar"] {
            assert!(!is_mnemonic(name), "{name}");
        }
    }

    #[test]
    fn duplicate_label() {
        let src = ".ORIG x3000\nA HALT\nA HALT\n.END";
        assert_eq!(
            read(src).unwrap_err(),
            SourceError::DuplicateLabel {
                line: 3,
                label: "A".to_string()
            }
        );
    }

    #[test]
    fn label_past_end_of_memory() {
        let src = ".ORIG x0\n.BLKW #65535\n.BLKW #2\nLAST HALT\n.END";
        assert_eq!(
            read(src).unwrap_err(),
            SourceError::Statement {
                line: 4,
                source: AsmError::Overflow
            }
        );
    }

    #[test]
    fn assemble_program() {
        let src = "\
; Print a greeting
        .ORIG x3000
        LEA R0, MSG
        PUTS
        HALT
MSG     .STRINGZ \"Hi\\n\"
        .END
";
        let air = assemble(src).unwrap();
        assert_eq!(air.orig(), Some(0x3000));
        assert_eq!(air.words(), &[0xE002, 0xF022, 0xF025, 0x48, 0x69, 0x0A, 0]);
    }

    #[test]
    fn loop_with_backward_branch() {
        let src = "\
        .ORIG x3000
        AND R0, R0, #0
        ADD R1, R0, #5
LOOP    ADD R0, R0, #2
        ADD R1, R1, #-1
        BRp LOOP
        HALT
        .END
";
        let air = assemble(src).unwrap();
        // BRp #-3
        assert_eq!(air.words()[4], 0x03FD);
    }

    #[test]
    fn errors_carry_line() {
        let err = assemble(".ORIG x3000\nADD R0, R0, #16\n.END").unwrap_err();
        assert!(matches!(
            err,
            SourceError::Statement {
                line: 2,
                source: AsmError::InvalidOperand { .. }
            }
        ));

        let err = assemble(".ORIG x3000\nLD R0, NOWHERE\n").unwrap_err();
        assert!(matches!(
            err,
            SourceError::Statement {
                line: 2,
                source: AsmError::UndefinedLabel { .. }
            }
        ));

        let err = assemble(".ORIG x3000\nFOO BAR R1\n").unwrap_err();
        assert!(matches!(
            err,
            SourceError::Statement {
                line: 2,
                source: AsmError::UnknownMnemonic { .. }
            }
        ));

        let err = assemble(".ORIG x3000\n.STRINGZ hello\n").unwrap_err();
        assert!(matches!(
            err,
            SourceError::Statement {
                line: 2,
                source: AsmError::InvalidOperand { .. }
            }
        ));

        let err = assemble("; nothing\n").unwrap_err();
        assert!(matches!(
            err,
            SourceError::Statement {
                line: 1,
                source: AsmError::MissingOrigin
            }
        ));
    }
}
