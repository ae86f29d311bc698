/// Lexical context of the byte currently being scanned.
#[derive(Clone)]
pub(super) enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    Backtick,
    LineComment,
    BlockComment(u32),
    DollarQuoted(String),
}

/// End index (exclusive) of an identifier starting at `start`, if one starts there.
pub(super) fn scan_identifier(bytes: &[u8], start: usize) -> Option<usize> {
    let first = *bytes.get(start)?;
    if !(first.is_ascii_alphabetic() || first == b'_') {
        return None;
    }
    let mut idx = start + 1;
    while idx < bytes.len() && (bytes[idx].is_ascii_alphanumeric() || bytes[idx] == b'_') {
        idx += 1;
    }
    Some(idx)
}

pub(super) fn starts_with_digit(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx).is_some_and(u8::is_ascii_digit)
}
