//! Automation script language.
//!
//! Scripts are line oriented: one statement per line, `if`/`while` blocks and
//! function definitions delimited by braces. Execution never builds a syntax
//! tree; the interpreter walks normalized lines and finds block extents with
//! the brace matcher.
//!
//! # Example
//!
//! ```rust
//! use autoscript::script::Script;
//!
//! let script: Script = "while (false) { click(1,1) }\nlog(\"done\")".parse().unwrap();
//! let lines: Vec<&str> = script.lines().iter().map(|l| l.text.as_str()).collect();
//! assert_eq!(lines, vec!["while (false) {", "click(1,1)", "}", "log(\"done\")"]);
//! ```

mod block;
mod command;
mod context;
mod error;
mod eval;
mod functions;
pub(crate) mod interpreter;
pub(crate) mod runtime;
mod source;
mod text;
mod value;

pub use block::{brace_delta, find_block_end};
pub use command::{is_builtin, Command};
pub use context::{Context, RESULT_VAR};
pub use error::ScriptError;
pub use eval::Evaluator;
pub use functions::{parse_header, FunctionDef, FunctionRegistry};
pub use source::{normalize, Line};
pub use value::Value;

use std::convert::Infallible;
use std::path::Path;
use std::str::FromStr;

/// A normalized script ready for execution.
#[derive(Debug, Clone)]
pub struct Script {
    lines: Vec<Line>,
}

impl Script {
    /// Normalize script source.
    pub fn new(source: &str) -> Self {
        Self {
            lines: normalize(source),
        }
    }

    /// Read and normalize a script file.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use autoscript::script::Script;
    /// let script = Script::from_file("daily.script")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScriptError> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::new(&content))
    }

    /// Normalized statement lines.
    pub fn lines(&self) -> &[Line] {
        &self.lines
    }
}

impl FromStr for Script {
    type Err = Infallible;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(source))
    }
}
