//! Brace-balanced block discovery.

use crate::script::text::unquoted;

/// Net brace count of one line: `{` minus `}` outside string literals.
pub fn brace_delta(line: &str) -> i32 {
    unquoted(line).fold(0, |depth, (_, c)| match c {
        '{' => depth + 1,
        '}' => depth - 1,
        _ => depth,
    })
}

/// Find the line that closes the block opened at `start`.
///
/// Brace counts are accumulated line by line from `start`; the result is the
/// first index after `start` at which the running count drops back to zero.
/// A block that is never closed extends to the last line, so a malformed
/// script still runs instead of failing as a whole.
///
/// # Examples
///
/// ```
/// use autoscript::script::find_block_end;
///
/// let lines = ["while (true) {", "if (x) {", "click(1,1)", "}", "}", "log(\"done\")"];
/// assert_eq!(find_block_end(&lines, 0), 4);
/// assert_eq!(find_block_end(&lines, 1), 3);
/// assert_eq!(find_block_end(&["if (x) {", "click(1,1)"], 0), 1);
/// ```
pub fn find_block_end<S: AsRef<str>>(lines: &[S], start: usize) -> usize {
    let last = lines.len().saturating_sub(1);
    let mut depth = 0;
    for (index, line) in lines.iter().enumerate().skip(start) {
        depth += brace_delta(line.as_ref());
        if index > start && depth <= 0 {
            return index;
        }
    }
    last
}
