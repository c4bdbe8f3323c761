//! Function registry and the definition pre-scan.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{debug, warn};

use crate::script::block::find_block_end;
use crate::script::command::is_builtin;
use crate::script::source::Line;

static HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:fun\s+)?([A-Za-z_]\w*)\s*\(([^()]*)\)\s*\{$").expect("valid header regex")
});

/// Names that introduce control-flow blocks rather than functions.
const KEYWORDS: &[&str] = &["if", "while", "else", "fun"];

/// A user-defined function.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    /// Function name
    pub name: String,
    /// Parameter names in declaration order
    pub params: Vec<String>,
    /// Lines between the header and its closing brace
    pub body: Vec<Line>,
}

/// Parse a definition header: `fun name(a, b) {` or `name(a, b) {`.
pub fn parse_header(text: &str) -> Option<(&str, Vec<String>)> {
    let caps = HEADER.captures(text.trim())?;
    let name = caps.get(1)?.as_str();
    if KEYWORDS.contains(&name) {
        return None;
    }
    let params = caps
        .get(2)
        .map(|m| m.as_str())
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();
    Some((name, params))
}

/// Lines of the block opened at `start` and closed at `end`, excluding both
/// braces. A block left unclosed by a malformed script keeps its last line.
pub(crate) fn block_body(lines: &[Line], start: usize, end: usize) -> &[Line] {
    if end <= start {
        return &[];
    }
    if lines[end].text == "}" {
        &lines[start + 1..end]
    } else {
        &lines[start + 1..=end]
    }
}

/// Function definitions of one run, keyed by name.
#[derive(Debug, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<FunctionDef>>,
}

impl FunctionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every definition in `lines`, skipping over each definition's
    /// block. A later definition with the same name replaces an earlier one;
    /// a definition named after a built-in is never registered.
    pub fn scan(lines: &[Line]) -> Self {
        let mut registry = Self::new();
        let mut index = 0;
        while index < lines.len() {
            let Some((name, params)) = parse_header(&lines[index].text) else {
                index += 1;
                continue;
            };
            let end = find_block_end(lines, index);
            if is_builtin(name) {
                warn!(line = lines[index].number, name, "Definition shadows a built-in; ignored");
                index = end + 1;
                continue;
            }
            let def = FunctionDef {
                name: name.to_string(),
                params,
                body: block_body(lines, index, end).to_vec(),
            };
            registry.define(def);
            index = end + 1;
        }
        registry
    }

    /// Add or replace a definition.
    pub fn define(&mut self, def: FunctionDef) {
        if self.functions.contains_key(&def.name) {
            debug!(name = %def.name, "Function redefined; later definition wins");
        }
        self.functions.insert(def.name.clone(), Arc::new(def));
    }

    /// Look up a definition.
    pub fn get(&self, name: &str) -> Option<Arc<FunctionDef>> {
        self.functions.get(name).cloned()
    }

    /// Number of definitions.
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Whether no functions are defined.
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}
