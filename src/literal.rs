//! Numeric literals as written in assembly source.

/// Parse a numeric literal.
///
/// Accepts `#` decimal (`#-5`), bare decimal (`-5`, `12`), `x` hex (`x3000`) and `0x` hex
/// (`0x3000`). Returns `None` for anything else, including values outside the range of a
/// signed or unsigned 16-bit word.
pub fn parse(token: &str) -> Option<i32> {
    let value = if let Some(dec) = token.strip_prefix('#') {
        parse_dec(dec)?
    } else if let Some(hex) = hex_digits(token) {
        parse_hex(hex)?
    } else {
        parse_dec(token)?
    };
    (i16::MIN as i32..=u16::MAX as i32)
        .contains(&value)
        .then_some(value)
}

/// Whether the literal is written in hex, which [`parse`] reads as an unsigned word.
pub fn is_hex(token: &str) -> bool {
    hex_digits(token).is_some()
}

/// Two's complement word of a literal value from [`parse`].
pub fn to_word(value: i32) -> u16 {
    value as u16
}

fn hex_digits(token: &str) -> Option<&str> {
    token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .or_else(|| token.strip_prefix('x'))
        .or_else(|| token.strip_prefix('X'))
}

fn parse_dec(digits: &str) -> Option<i32> {
    let unsigned = digits
        .strip_prefix('-')
        .or_else(|| digits.strip_prefix('+'))
        .unwrap_or(digits);
    if unsigned.is_empty() || !unsigned.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn parse_hex(digits: &str) -> Option<i32> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    i32::from_str_radix(digits, 16).ok()
}
