use std::borrow::Cow;

mod parsers;
mod scanner;

use parsers::{
    is_block_comment_end, is_block_comment_start, is_line_comment_start, matches_tag,
    try_start_dollar_quote,
};
use scanner::{State, scan_identifier, starts_with_digit};

/// Positional placeholder syntax a client library accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaceholderStyle {
    /// Anonymous `?` markers (SQLite, MySQL).
    #[default]
    Question,
    /// Numbered `$1`, `$2`, ... markers (PostgreSQL).
    Dollar,
}

/// Lexical rules used while scanning for placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanOptions {
    pub target: PlaceholderStyle,
    /// MySQL lexing: backslash escapes inside quotes and `#` line comments.
    pub mysql_lexing: bool,
}

impl ScanOptions {
    #[must_use]
    pub fn new(target: PlaceholderStyle) -> Self {
        Self {
            target,
            mysql_lexing: false,
        }
    }

    #[must_use]
    pub fn with_mysql_lexing(mut self, enabled: bool) -> Self {
        self.mysql_lexing = enabled;
        self
    }
}

/// The placeholders found in one SQL text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PlaceholderSet {
    #[default]
    None,
    /// `N` anonymous `?` markers, addressed 1..=N.
    Positional(usize),
    /// Named markers in order of appearance; a name may repeat.
    Named(Vec<String>),
}

impl PlaceholderSet {
    /// Number of positions the rewritten SQL expects values for.
    #[must_use]
    pub fn positions(&self) -> usize {
        match self {
            PlaceholderSet::None => 0,
            PlaceholderSet::Positional(n) => *n,
            PlaceholderSet::Named(names) => names.len(),
        }
    }

    #[must_use]
    pub fn contains_name(&self, name: &str) -> bool {
        matches!(self, PlaceholderSet::Named(names) if names.iter().any(|n| n == name))
    }
}

/// SQL rewritten to positional form plus the placeholders it referenced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSql<'a> {
    pub sql: Cow<'a, str>,
    pub placeholders: PlaceholderSet,
    blank: bool,
}

impl ParsedSql<'_> {
    /// True when nothing but whitespace, comments and `;` was found.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.blank
    }
}

/// Scan `sql` for `?` and `:name` placeholders and rewrite named ones to the
/// positional `target` syntax.
///
/// Quoted strings, quoted identifiers, comments, dollar-quoted bodies and
/// `::` casts are skipped, so `'12:30'` or `x::text` never count as
/// placeholders. Rewriting is idempotent: feeding the output back in
/// returns it unchanged. Returns a borrowed `Cow` when nothing changes.
///
/// ```rust
/// use sql_facade::translation::{PlaceholderSet, PlaceholderStyle, ScanOptions, parse_placeholders};
///
/// let parsed = parse_placeholders(
///     "UPDATE log SET descrizione_evento = :log_desc WHERE id = :log_id",
///     ScanOptions::new(PlaceholderStyle::Question),
/// )
/// .unwrap();
/// assert_eq!(parsed.sql, "UPDATE log SET descrizione_evento = ? WHERE id = ?");
/// assert_eq!(
///     parsed.placeholders,
///     PlaceholderSet::Named(vec!["log_desc".into(), "log_id".into()])
/// );
/// ```
///
/// # Errors
/// Returns a diagnostic when positional and named placeholders are mixed, or
/// when numbered `?N` markers are used.
pub fn parse_placeholders(sql: &str, options: ScanOptions) -> Result<ParsedSql<'_>, String> {
    let bytes = sql.as_bytes();
    let mut out: Option<String> = None;
    let mut copied = 0;
    let mut positional = 0usize;
    let mut named: Vec<String> = Vec::new();
    let mut state = State::Normal;
    let mut idx = 0;
    let mut blank = true;

    let mut splice = |out: &mut Option<String>, start: usize, end: usize, with: &str| {
        let buf = out.get_or_insert_with(|| String::with_capacity(sql.len() + 8));
        buf.push_str(&sql[copied..start]);
        buf.push_str(with);
        copied = end;
    };

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                _ if blank && starts_code(bytes, idx, options.mysql_lexing) => {
                    blank = false;
                    continue;
                }
                b'\'' => state = State::SingleQuoted,
                b'"' => state = State::DoubleQuoted,
                b'`' => state = State::Backtick,
                _ if is_line_comment_start(bytes, idx, options.mysql_lexing) => {
                    state = State::LineComment;
                }
                _ if is_block_comment_start(bytes, idx) => {
                    state = State::BlockComment(1);
                    idx += 1;
                }
                b'$' => {
                    if let Some((tag, advance)) = try_start_dollar_quote(bytes, idx) {
                        state = State::DollarQuoted(tag);
                        idx = advance;
                    }
                }
                b'?' => {
                    if starts_with_digit(bytes, idx + 1) {
                        return Err(format!(
                            "numbered placeholder at byte {idx} is not supported; use ? or :name"
                        ));
                    }
                    positional += 1;
                    if options.target == PlaceholderStyle::Dollar {
                        splice(&mut out, idx, idx + 1, &format!("${positional}"));
                    }
                }
                b':' => {
                    if bytes.get(idx + 1) == Some(&b':') {
                        idx += 1; // `::` cast
                    } else if let Some(end) = scan_identifier(bytes, idx + 1) {
                        named.push(sql[idx + 1..end].to_string());
                        let marker = match options.target {
                            PlaceholderStyle::Question => "?".to_string(),
                            PlaceholderStyle::Dollar => format!("${}", named.len()),
                        };
                        splice(&mut out, idx, end, &marker);
                        idx = end - 1;
                    }
                }
                _ => {}
            },
            State::SingleQuoted | State::DoubleQuoted | State::Backtick => {
                let quote = match state {
                    State::SingleQuoted => b'\'',
                    State::DoubleQuoted => b'"',
                    _ => b'`',
                };
                if options.mysql_lexing && b == b'\\' && quote != b'`' {
                    idx += 1;
                } else if b == quote {
                    if bytes.get(idx + 1) == Some(&quote) {
                        idx += 1; // doubled quote
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment(depth) => {
                if is_block_comment_start(bytes, idx) {
                    state = State::BlockComment(depth + 1);
                    idx += 1;
                } else if is_block_comment_end(bytes, idx) {
                    state = if depth == 1 {
                        State::Normal
                    } else {
                        State::BlockComment(depth - 1)
                    };
                    idx += 1;
                }
            }
            State::DollarQuoted(ref tag) => {
                if b == b'$' && matches_tag(bytes, idx, tag) {
                    idx += tag.len() + 1;
                    state = State::Normal;
                }
            }
        }
        idx += 1;
    }

    if positional > 0 && !named.is_empty() {
        return Err(
            "positional (?) and named (:name) placeholders cannot be mixed in one statement"
                .to_string(),
        );
    }

    let placeholders = if !named.is_empty() {
        PlaceholderSet::Named(named)
    } else if positional > 0 {
        PlaceholderSet::Positional(positional)
    } else {
        PlaceholderSet::None
    };

    let sql = match out {
        Some(mut buf) => {
            buf.push_str(&sql[copied..]);
            Cow::Owned(buf)
        }
        None => Cow::Borrowed(sql),
    };
    Ok(ParsedSql {
        sql,
        placeholders,
        blank,
    })
}

/// Whether the byte at `idx` (lexer in its normal state) begins something
/// other than whitespace, a statement separator or a comment.
fn starts_code(bytes: &[u8], idx: usize, mysql_lexing: bool) -> bool {
    let b = bytes[idx];
    !(b.is_ascii_whitespace()
        || b == b';'
        || is_line_comment_start(bytes, idx, mysql_lexing)
        || is_block_comment_start(bytes, idx))
}

/// Up to the first three words of every `;`-separated statement in `sql`,
/// uppercased. Quoted text, comments and dollar-quoted bodies are skipped;
/// a statement that does not open with a word yields an empty list. Blank
/// statements yield nothing, so blank SQL returns an empty vector.
///
/// ```rust
/// use sql_facade::translation::statement_heads;
///
/// let heads = statement_heads("begin; /* x */ ROLLBACK TO sp1;; ", false);
/// assert_eq!(heads, vec![vec!["BEGIN"], vec!["ROLLBACK", "TO", "SP1"]]);
/// assert!(statement_heads(" -- nothing\n ; ", false).is_empty());
/// ```
#[must_use]
pub fn statement_heads(sql: &str, mysql_lexing: bool) -> Vec<Vec<String>> {
    const WORDS: usize = 3;
    let bytes = sql.as_bytes();
    let mut heads = Vec::new();
    let mut current: Option<Vec<String>> = None;
    let mut collecting = true;
    let mut state = State::Normal;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => {
                if b == b';' {
                    heads.extend(current.take());
                    collecting = true;
                } else if is_line_comment_start(bytes, idx, mysql_lexing) {
                    state = State::LineComment;
                } else if is_block_comment_start(bytes, idx) {
                    state = State::BlockComment(1);
                    idx += 1;
                } else if !b.is_ascii_whitespace() {
                    let words = current.get_or_insert_with(Vec::new);
                    if let Some(end) = scan_identifier(bytes, idx).filter(|_| collecting) {
                        words.push(sql[idx..end].to_ascii_uppercase());
                        collecting = words.len() < WORDS;
                        idx = end;
                        continue;
                    }
                    collecting = false;
                    match b {
                        b'\'' => state = State::SingleQuoted,
                        b'"' => state = State::DoubleQuoted,
                        b'`' => state = State::Backtick,
                        b'$' => {
                            if let Some((tag, advance)) = try_start_dollar_quote(bytes, idx) {
                                state = State::DollarQuoted(tag);
                                idx = advance;
                            }
                        }
                        _ => {}
                    }
                }
            }
            State::SingleQuoted | State::DoubleQuoted | State::Backtick => {
                let quote = match state {
                    State::SingleQuoted => b'\'',
                    State::DoubleQuoted => b'"',
                    _ => b'`',
                };
                if mysql_lexing && b == b'\\' && quote != b'`' {
                    idx += 1;
                } else if b == quote {
                    if bytes.get(idx + 1) == Some(&quote) {
                        idx += 1;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment(depth) => {
                if is_block_comment_start(bytes, idx) {
                    state = State::BlockComment(depth + 1);
                    idx += 1;
                } else if is_block_comment_end(bytes, idx) {
                    state = if depth == 1 {
                        State::Normal
                    } else {
                        State::BlockComment(depth - 1)
                    };
                    idx += 1;
                }
            }
            State::DollarQuoted(ref tag) => {
                if b == b'$' && matches_tag(bytes, idx, tag) {
                    idx += tag.len() + 1;
                    state = State::Normal;
                }
            }
        }
        idx += 1;
    }
    heads.extend(current);
    heads
}

/// True when `sql` holds nothing but whitespace, comments and `;`.
#[must_use]
pub fn is_blank_sql(sql: &str, mysql_lexing: bool) -> bool {
    statement_heads(sql, mysql_lexing).is_empty()
}

/// Whether `name` is a bare identifier, optionally schema-qualified
/// (`error_log`, `app.error_log`), safe to splice into SQL text.
#[must_use]
pub fn is_plain_identifier(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() <= 2
        && parts
            .iter()
            .all(|part| scan_identifier(part.as_bytes(), 0) == Some(part.len()))
}
