//! Condition and expression evaluation.
//!
//! Conditions are split textually: first on `&&` (every part must hold), then
//! on `||` (any part must hold), and what remains is a simple condition. Values
//! are resolved from literals, variables, `random(min,max)` and arithmetic.
//! Device queries such as `getColor(x,y)` never reach this module; the
//! interpreter replaces them with their literal result beforehand.

use std::sync::LazyLock;

use rand::Rng;
use regex::{Captures, Regex};

use crate::script::context::Context;
use crate::script::text::{
    find_unquoted, matching_paren, split_top_level, split_unquoted, strip_quotes,
};
use crate::script::value::Value;

static RANDOM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\brandom\s*\(([^()]*)\)").expect("valid random regex"));

static INTERPOLATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_]\w*)\}|\$([A-Za-z_]\w*)").expect("valid interpolation regex")
});

/// Comparators, in the order they are searched for so that `>=` and `<=` are
/// not split by `>` or `<`.
const COMPARATORS: [&str; 6] = [">=", "<=", "!=", "==", ">", "<"];

/// Evaluates conditions and values against one variable frame.
pub struct Evaluator<'a> {
    vars: &'a Context,
    exit: bool,
}

impl<'a> Evaluator<'a> {
    /// Evaluate against `vars`; `exit` is the current value of the `EXIT` flag.
    pub fn new(vars: &'a Context, exit: bool) -> Self {
        Self { vars, exit }
    }

    /// Evaluate a condition.
    ///
    /// ```
    /// use autoscript::script::{Context, Evaluator};
    ///
    /// let vars = Context::new();
    /// let eval = Evaluator::new(&vars, false);
    /// assert!(!eval.evaluate_condition("5 >= 3 && 2 < 1"));
    /// assert!(eval.evaluate_condition("5 >= 3 || 2 < 1"));
    /// assert!(eval.evaluate_condition("!false"));
    /// ```
    pub fn evaluate_condition(&self, text: &str) -> bool {
        let text = text.trim();

        let all = split_unquoted(text, "&&");
        if all.len() > 1 {
            return all.iter().all(|part| self.evaluate_condition(part));
        }

        let any = split_unquoted(text, "||");
        if any.len() > 1 {
            return any.iter().any(|part| self.evaluate_condition(part));
        }

        self.simple_condition(text)
    }

    fn simple_condition(&self, text: &str) -> bool {
        let stripped = strip_parens(text);
        if stripped.len() != text.len() {
            return self.evaluate_condition(stripped);
        }
        let text = stripped;

        if let Some(rest) = text.strip_prefix('!') {
            if !rest.starts_with('=') {
                return !self.evaluate_condition(rest);
            }
        }

        match text {
            "" | "false" => return false,
            "true" => return true,
            "EXIT" => return self.exit,
            _ => {}
        }

        for op in COMPARATORS {
            if let Some(at) = find_unquoted(text, op) {
                let left = &text[..at];
                let right = &text[at + op.len()..];
                return self.compare(left, op, right);
            }
        }

        self.resolve_value(text).is_true()
    }

    fn compare(&self, left: &str, op: &str, right: &str) -> bool {
        match op {
            "==" => self.resolve_value(left).as_string() == self.resolve_value(right).as_string(),
            "!=" => self.resolve_value(left).as_string() != self.resolve_value(right).as_string(),
            _ => {
                let l = self.resolve_number(left);
                let r = self.resolve_number(right);
                match op {
                    ">=" => l >= r,
                    "<=" => l <= r,
                    ">" => l > r,
                    _ => l < r,
                }
            }
        }
    }

    /// Resolve a value: a literal, a variable, `random(min,max)`, or an
    /// arithmetic expression over those.
    ///
    /// Text that is none of these is kept as a string after replacing the
    /// variables it mentions.
    pub fn resolve_value(&self, text: &str) -> Value {
        let text = self.substitute_random(text.trim());
        let text = text.trim();

        if let Ok(operand) = self.parse_expression(text) {
            return operand.value;
        }

        let substituted = self.substitute_variables(text);
        match strip_quotes(&substituted) {
            Some(inner) => Value::String(inner.into_owned()),
            None => Value::String(substituted.trim().to_string()),
        }
    }

    /// Resolve a value and coerce it to a number; anything unresolvable is 0.
    pub fn resolve_number(&self, text: &str) -> f64 {
        self.resolve_value(text).as_number().unwrap_or(0.0)
    }

    /// Replace `${name}` and `$name` with variable values. Unknown names are
    /// left untouched.
    pub fn interpolate(&self, text: &str) -> String {
        INTERPOLATION
            .replace_all(text, |caps: &Captures| {
                let name = caps
                    .get(1)
                    .or_else(|| caps.get(2))
                    .map(|m| m.as_str())
                    .unwrap_or_default();
                match self.vars.get_variable(name) {
                    Some(value) => value.as_string(),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }

    fn substitute_random(&self, text: &str) -> String {
        if !text.contains("random") {
            return text.to_string();
        }
        RANDOM
            .replace_all(text, |caps: &Captures| {
                let bounds: Vec<i64> = split_top_level(&caps[1], ',')
                    .into_iter()
                    .map(|b| self.resolve_number(b) as i64)
                    .collect();
                match bounds.as_slice() {
                    [a, b] => {
                        let (lo, hi) = if a <= b { (*a, *b) } else { (*b, *a) };
                        rand::thread_rng().gen_range(lo..=hi).to_string()
                    }
                    _ => "0".to_string(),
                }
            })
            .into_owned()
    }

    /// Replace known variable names, on identifier boundaries and outside
    /// string literals, with their string values.
    fn substitute_variables(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut word = String::new();
        let mut quote = None;
        let mut escaped = false;

        let flush = |word: &mut String, out: &mut String| {
            if word.is_empty() {
                return;
            }
            match self.vars.get_variable(word) {
                Some(value) => out.push_str(&value.as_string()),
                None => out.push_str(word),
            }
            word.clear();
        };

        for c in text.chars() {
            if let Some(q) = quote {
                out.push(c);
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
                continue;
            }
            if c.is_ascii_alphanumeric() || c == '_' {
                word.push(c);
                continue;
            }
            flush(&mut word, &mut out);
            if c == '"' || c == '\'' {
                quote = Some(c);
            }
            out.push(c);
        }
        flush(&mut word, &mut out);
        out
    }

    fn parse_expression(&self, text: &str) -> Result<Operand, ()> {
        let tokens = tokenize(text)?;
        let mut parser = Parser {
            tokens: &tokens,
            pos: 0,
            eval: self,
        };
        let operand = parser.expr()?;
        if parser.pos != tokens.len() {
            return Err(());
        }
        Ok(operand)
    }

    fn atom(&self, name: &str) -> Operand {
        let value = match self.vars.get_variable(name) {
            Some(value) => value.clone(),
            None => match name {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                "EXIT" => Value::Bool(self.exit),
                "null" => Value::Null,
                other => Value::String(other.to_string()),
            },
        };
        Operand {
            value,
            quoted: false,
        }
    }
}

/// Strip parentheses that wrap the whole text.
fn strip_parens(text: &str) -> &str {
    let mut text = text.trim();
    while text.starts_with('(') && matching_paren(text, 0) == Some(text.len() - 1) {
        text = text[1..text.len() - 1].trim();
    }
    text
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    Op(char),
}

fn tokenize(text: &str) -> Result<Vec<Token>, ()> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '"' | '\'' => {
                chars.next();
                let mut s = String::new();
                let mut closed = false;
                while let Some((_, ch)) = chars.next() {
                    if ch == c {
                        closed = true;
                        break;
                    }
                    if ch == '\\' {
                        match chars.next() {
                            Some((_, next)) if next == c || next == '\\' => s.push(next),
                            Some((_, next)) => {
                                s.push('\\');
                                s.push(next);
                            }
                            None => break,
                        }
                        continue;
                    }
                    s.push(ch);
                }
                if !closed {
                    return Err(());
                }
                tokens.push(Token::Str(s));
            }
            c if c.is_ascii_digit() || c == '.' => {
                let mut end = start;
                while let Some(&(i, ch)) = chars.peek() {
                    if ch.is_ascii_digit() || ch == '.' {
                        end = i + ch.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let number = text[start..end].parse::<f64>().map_err(|_| ())?;
                tokens.push(Token::Number(number));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut end = start;
                while let Some(&(i, ch)) = chars.peek() {
                    if ch.is_ascii_alphanumeric() || ch == '_' {
                        end = i + ch.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(text[start..end].to_string()));
            }
            '+' | '-' | '*' | '/' | '%' | '(' | ')' => {
                chars.next();
                tokens.push(Token::Op(c));
            }
            _ => return Err(()),
        }
    }

    if tokens.is_empty() {
        return Err(());
    }
    Ok(tokens)
}

/// A resolved operand; quoted literals never take part in arithmetic.
#[derive(Debug, Clone)]
struct Operand {
    value: Value,
    quoted: bool,
}

impl Operand {
    fn number(&self) -> Option<f64> {
        if self.quoted {
            None
        } else {
            self.value.as_number()
        }
    }
}

struct Parser<'t, 'e> {
    tokens: &'t [Token],
    pos: usize,
    eval: &'t Evaluator<'e>,
}

impl Parser<'_, '_> {
    fn peek_op(&self) -> Option<char> {
        match self.tokens.get(self.pos) {
            Some(Token::Op(c)) => Some(*c),
            _ => None,
        }
    }

    fn expr(&mut self) -> Result<Operand, ()> {
        let mut left = self.term()?;
        while let Some(op @ ('+' | '-')) = self.peek_op() {
            self.pos += 1;
            let right = self.term()?;
            left = match (op, left.number(), right.number()) {
                ('+', Some(a), Some(b)) => numeric(a + b),
                ('-', Some(a), Some(b)) => numeric(a - b),
                ('+', _, _) => Operand {
                    value: Value::String(left.value.as_string() + &right.value.as_string()),
                    quoted: true,
                },
                _ => return Err(()),
            };
        }
        Ok(left)
    }

    fn term(&mut self) -> Result<Operand, ()> {
        let mut left = self.factor()?;
        while let Some(op @ ('*' | '/' | '%')) = self.peek_op() {
            self.pos += 1;
            let right = self.factor()?;
            let (a, b) = left.number().zip(right.number()).ok_or(())?;
            left = match op {
                '*' => numeric(a * b),
                _ if b == 0.0 => return Err(()),
                '/' => numeric(a / b),
                _ => numeric(a % b),
            };
        }
        Ok(left)
    }

    fn factor(&mut self) -> Result<Operand, ()> {
        let token = self.tokens.get(self.pos).ok_or(())?;
        self.pos += 1;
        match token {
            Token::Op('-') => {
                let inner = self.factor()?;
                inner.number().map(|n| numeric(-n)).ok_or(())
            }
            Token::Op('(') => {
                let inner = self.expr()?;
                match self.tokens.get(self.pos) {
                    Some(Token::Op(')')) => {
                        self.pos += 1;
                        Ok(inner)
                    }
                    _ => Err(()),
                }
            }
            Token::Number(n) => Ok(numeric(*n)),
            Token::Str(s) => Ok(Operand {
                value: Value::String(s.clone()),
                quoted: true,
            }),
            Token::Ident(name) => Ok(self.eval.atom(name)),
            Token::Op(_) => Err(()),
        }
    }
}

fn numeric(n: f64) -> Operand {
    Operand {
        value: Value::Number(n),
        quoted: false,
    }
}
