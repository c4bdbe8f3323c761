//! Source normalization.
//!
//! Scripts are interpreted line by line, but authors write compact forms such
//! as `while (x) { click(1,1) }` or `} else {`. Normalization rewrites the
//! source so that every `{` ends its header line, every `}` stands alone, and
//! `;` separates statements. Each resulting [`Line`] keeps the 1-based number
//! of the source line it came from.

use crate::script::text::find_unquoted;

/// One normalized statement or block delimiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// 1-based line number in the script source
    pub number: usize,
    /// Trimmed statement text
    pub text: String,
}

impl Line {
    /// Create a line.
    pub fn new(number: usize, text: impl Into<String>) -> Self {
        Self {
            number,
            text: text.into(),
        }
    }
}

impl AsRef<str> for Line {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

/// Normalize a script into statement lines.
pub fn normalize(source: &str) -> Vec<Line> {
    let mut lines = Vec::new();

    for (index, raw) in source.lines().enumerate() {
        let number = index + 1;
        let code = match find_unquoted(raw, "//") {
            Some(at) => &raw[..at],
            None => raw,
        };

        let mut current = String::new();
        let mut quote = None;
        let mut escaped = false;
        for c in code.chars() {
            if let Some(q) = quote {
                current.push(c);
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
                continue;
            }
            match c {
                '"' | '\'' => {
                    quote = Some(c);
                    current.push(c);
                }
                '{' => {
                    current.push('{');
                    push_line(&mut lines, number, &current);
                    current.clear();
                }
                '}' => {
                    push_line(&mut lines, number, &current);
                    push_line(&mut lines, number, "}");
                    current.clear();
                }
                ';' => {
                    push_line(&mut lines, number, &current);
                    current.clear();
                }
                _ => current.push(c),
            }
        }
        push_line(&mut lines, number, &current);
    }

    lines
}

fn push_line(lines: &mut Vec<Line>, number: usize, text: &str) {
    let text = text.trim();
    if text.is_empty() {
        return;
    }
    // A brace on its own line opens the block of the header above it.
    if text == "{" {
        if let Some(prev) = lines.last_mut() {
            if prev.text != "}" && !prev.text.ends_with('{') {
                prev.text.push_str(" {");
                return;
            }
        }
    }
    lines.push(Line::new(number, text));
}
