//! Quote-aware scanning helpers shared by the matcher, dispatcher and
//! evaluator.
//!
//! Both `"…"` and `'…'` delimit string literals. Braces, commas, operators and
//! comment markers inside a literal are never structural. Inside a literal a
//! backslash escapes the next character; `\"`, `\'` and `\\` decode to the
//! character itself, any other escape is kept verbatim.

use std::borrow::Cow;
use std::str::CharIndices;

/// Iterator over the characters of a line that lie outside string literals.
/// The quote characters themselves are skipped.
pub(crate) struct Unquoted<'a> {
    chars: CharIndices<'a>,
    quote: Option<char>,
}

impl Iterator for Unquoted<'_> {
    type Item = (usize, char);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (i, c) = self.chars.next()?;
            match self.quote {
                Some(_) if c == '\\' => {
                    self.chars.next();
                }
                Some(q) => {
                    if c == q {
                        self.quote = None;
                    }
                }
                None if c == '"' || c == '\'' => self.quote = Some(c),
                None => return Some((i, c)),
            }
        }
    }
}

/// Characters of `s` outside string literals, with byte offsets.
pub(crate) fn unquoted(s: &str) -> Unquoted<'_> {
    Unquoted {
        chars: s.char_indices(),
        quote: None,
    }
}

/// Byte offset of the first occurrence of `pat` outside string literals.
pub(crate) fn find_unquoted(s: &str, pat: &str) -> Option<usize> {
    unquoted(s)
        .map(|(i, _)| i)
        .find(|&i| s[i..].starts_with(pat))
}

/// Split on `sep` where it appears outside literals and parentheses.
pub(crate) fn split_top_level(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in unquoted(s) {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            c if c == sep && depth == 0 => {
                parts.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

/// Split on every occurrence of `pat` outside literals and parentheses.
pub(crate) fn split_unquoted<'a>(s: &'a str, pat: &str) -> Vec<&'a str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut skip_until = 0;
    let mut depth = 0i32;
    for (i, c) in unquoted(s) {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            _ => {}
        }
        if i < skip_until || depth != 0 {
            continue;
        }
        if s[i..].starts_with(pat) {
            parts.push(&s[start..i]);
            start = i + pat.len();
            skip_until = start;
        }
    }
    parts.push(&s[start..]);
    parts
}

/// Byte offset of the `)` matching the `(` at `open`.
pub(crate) fn matching_paren(s: &str, open: usize) -> Option<usize> {
    let mut depth = 0i32;
    for (i, c) in unquoted(&s[open..]) {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Decoded contents of a string literal, if `s` is exactly one.
pub(crate) fn strip_quotes(s: &str) -> Option<Cow<'_, str>> {
    let s = s.trim();
    let first = s.chars().next()?;
    if first != '"' && first != '\'' {
        return None;
    }
    // The literal must close on the last character and nowhere before it.
    let mut chars = s.char_indices().skip(1);
    while let Some((i, c)) = chars.next() {
        if c == '\\' {
            chars.next();
        } else if c == first {
            return (i == s.len() - 1).then(|| unescape(&s[1..i], first));
        }
    }
    None
}

/// Decode the escapes in the contents of a literal quoted by `quote`.
pub(crate) fn unescape(inner: &str, quote: char) -> Cow<'_, str> {
    if !inner.contains('\\') {
        return Cow::Borrowed(inner);
    }
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(next) if next == quote || next == '\\' => out.push(next),
            Some(next) => {
                out.push('\\');
                out.push(next);
            }
            None => out.push('\\'),
        }
    }
    Cow::Owned(out)
}

/// Render `s` as a double-quoted literal that [`strip_quotes`] reads back.
pub(crate) fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Whether `s` is a plain identifier.
pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Split `name(args)` into its name and raw argument text. The closing
/// parenthesis must be the last character.
pub(crate) fn split_call(s: &str) -> Option<(&str, &str)> {
    let s = s.trim();
    let open = s.find('(')?;
    let name = s[..open].trim();
    if !is_identifier(name) {
        return None;
    }
    let close = matching_paren(s, open)?;
    if close != s.len() - 1 {
        return None;
    }
    Some((name, &s[open + 1..close]))
}

/// Comma-separated call arguments; an empty list yields no arguments.
pub(crate) fn split_args(args: &str) -> Vec<&str> {
    if args.trim().is_empty() {
        return Vec::new();
    }
    split_top_level(args, ',').into_iter().map(str::trim).collect()
}
