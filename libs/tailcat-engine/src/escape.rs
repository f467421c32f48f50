//! Unescaping of values written as the body of a double-quoted literal.
//!
//! Producers sometimes write JSON text pre-escaped (`{\"id\":1}`) or with
//! escape sequences for control bytes. A value is accepted if wrapping it in
//! double quotes gives a valid quoted literal: no bare `"`, no raw newline,
//! and only the escapes `\a \b \f \n \r \t \v \\ \" \xHH \ooo \uHHHH
//! \UHHHHHHHH`.

use std::borrow::Cow;

/// Unescape `input`, or return `None` if it is not a valid literal body.
pub fn unescape(input: &[u8]) -> Option<Cow<'_, [u8]>> {
    let text = std::str::from_utf8(input).ok()?;
    if !text.contains(['\\', '"', '\n']) {
        return Some(Cow::Borrowed(input));
    }

    let mut out = Vec::with_capacity(input.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' | '\n' => return None,
            '\\' => unescape_sequence(&mut chars, &mut out)?,
            c => push_char(&mut out, c),
        }
    }
    Some(Cow::Owned(out))
}

/// Unescape `input`, falling back to the bytes unmodified.
pub fn unescape_or_raw(input: &[u8]) -> Cow<'_, [u8]> {
    unescape(input).unwrap_or(Cow::Borrowed(input))
}

fn unescape_sequence(chars: &mut std::str::Chars<'_>, out: &mut Vec<u8>) -> Option<()> {
    let byte = match chars.next()? {
        'a' => 0x07,
        'b' => 0x08,
        'f' => 0x0c,
        'n' => b'\n',
        'r' => b'\r',
        't' => b'\t',
        'v' => 0x0b,
        '\\' => b'\\',
        '"' => b'"',
        // \x and octal escapes denote raw bytes, not code points.
        'x' => u8::try_from(hex_digits(chars, 2)?).ok()?,
        first @ '0'..='7' => {
            let mut value = first.to_digit(8)?;
            for _ in 0..2 {
                value = value * 8 + chars.next()?.to_digit(8)?;
            }
            u8::try_from(value).ok()?
        }
        'u' => {
            push_char(out, char::from_u32(hex_digits(chars, 4)?)?);
            return Some(());
        }
        'U' => {
            push_char(out, char::from_u32(hex_digits(chars, 8)?)?);
            return Some(());
        }
        _ => return None,
    };
    out.push(byte);
    Some(())
}

fn hex_digits(chars: &mut std::str::Chars<'_>, count: usize) -> Option<u32> {
    let mut value = 0u32;
    for _ in 0..count {
        value = (value << 4) | chars.next()?.to_digit(16)?;
    }
    Some(value)
}

fn push_char(out: &mut Vec<u8>, c: char) {
    let mut buf = [0u8; 4];
    out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
}
