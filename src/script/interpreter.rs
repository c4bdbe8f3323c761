//! Line-range interpreter for automation scripts.
//!
//! Blocks are never parsed into a tree. The executor walks a slice of
//! normalized lines and, on reaching a block header, locates the block's
//! closing line with [`find_block_end`] and recurses into the enclosed range.

use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::debug;

use crate::script::block::find_block_end;
use crate::script::command::{self, Command};
use crate::script::error::ScriptError;
use crate::script::functions::{block_body, parse_header, FunctionDef, FunctionRegistry};
use crate::script::runtime::Runtime;
use crate::script::source::Line;
use crate::script::text::{is_identifier, matching_paren, split_args, split_call, unquoted};
use crate::script::value::Value;

/// Declaration keywords accepted, and ignored, in front of an assignment
/// target.
const DECLARATIONS: [&str; 5] = ["val", "var", "int", "float", "string"];

/// Upper bound on query calls expanded within one expression.
const MAX_QUERY_EXPANSIONS: usize = 64;

/// How a block finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Ran to its end, or stopped
    Normal,
    /// Left through `break` or `continue`
    Break,
}

/// Run a whole script: register its functions, then execute it.
pub async fn run(lines: &[Line], runtime: &mut Runtime) -> Flow {
    let functions = FunctionRegistry::scan(lines);
    debug!(count = functions.len(), "Registered functions");
    runtime.set_functions(functions);
    execute_block(lines, runtime).await
}

/// Execute a range of lines.
///
/// `break` and `continue` both end the current block. Inside a loop the
/// [`Flow::Break`] they produce passes up through `if` branches until the
/// `while` consumes it; outside any loop it ends only the `if` branch it
/// appears in, or the function body or script when it stands there directly.
/// Loops in a caller never see a break from a called function. `return` sets
/// the stop flag and so ends the run.
pub fn execute_block<'a>(lines: &'a [Line], runtime: &'a mut Runtime) -> BoxFuture<'a, Flow> {
    Box::pin(async move {
        let mut index = 0;
        while index < lines.len() {
            if runtime.should_stop() {
                return Flow::Normal;
            }

            let line = &lines[index];
            let text = line.text.as_str();

            if let Some(condition) = block_header(text, "while") {
                let end = find_block_end(lines, index);
                let body = block_body(lines, index, end);
                let depth = runtime.loop_depth();
                runtime.set_loop_depth(depth + 1);
                loop {
                    if runtime.should_stop() || !loop_condition(condition, line, runtime).await {
                        break;
                    }
                    if execute_block(body, runtime).await == Flow::Break {
                        break;
                    }
                    tokio::task::yield_now().await;
                }
                runtime.set_loop_depth(depth);
                index = end + 1;
                continue;
            }

            if block_header(text, "if").is_some() {
                let (next, flow) = execute_if(lines, index, runtime).await;
                if flow == Flow::Break {
                    if runtime.loop_depth() > 0 {
                        return Flow::Break;
                    }
                    debug!(line = line.number, "break outside a loop ends its branch only");
                }
                index = next;
                continue;
            }

            if text.ends_with('{') {
                // Definitions were registered up front.
                if parse_header(text).is_none() {
                    runtime.warn(line.number, &format!("Skipping unsupported block: {}", text));
                }
                index = find_block_end(lines, index) + 1;
                continue;
            }

            match text {
                "break" | "continue" => return Flow::Break,
                "}" => {
                    index += 1;
                    continue;
                }
                _ => {}
            }
            if text == "return" || text.starts_with("return ") {
                debug!(line = line.number, "return stops the run");
                runtime.stop();
                return Flow::Normal;
            }

            if let Err(e) = dispatch(line, runtime).await {
                report(runtime, line.number, &e);
            }
            index += 1;
        }
        Flow::Normal
    })
}

/// Log a failed statement; the run continues with the next line.
fn report(runtime: &Runtime, line: usize, err: &ScriptError) {
    match err {
        ScriptError::Validation { .. } | ScriptError::Arity { .. } => {
            runtime.warn(line, &err.to_string())
        }
        _ => runtime.error(line, &err.to_string()),
    }
}

/// Run an `if` / `else if` / `else` chain starting at `start`.
///
/// Returns the index after the chain and the flow of the branch taken.
async fn execute_if(lines: &[Line], start: usize, runtime: &mut Runtime) -> (usize, Flow) {
    let mut index = start;
    let mut taken = false;
    let mut flow = Flow::Normal;

    loop {
        let line = &lines[index];
        let condition = if index == start {
            block_header(&line.text, "if")
        } else {
            else_header(&line.text).flatten()
        };
        let end = find_block_end(lines, index);

        if !taken {
            let run = match condition {
                Some(condition) => evaluate_condition(condition, line, runtime).await,
                None => true,
            };
            if run {
                taken = true;
                flow = execute_block(block_body(lines, index, end), runtime).await;
            }
        }

        index = end + 1;
        match lines.get(index) {
            Some(next) if else_header(&next.text).is_some() => continue,
            _ => return (index, flow),
        }
    }
}

/// Condition of a `keyword (condition) {` header.
fn block_header<'t>(text: &'t str, keyword: &str) -> Option<&'t str> {
    let rest = text.strip_prefix(keyword)?.trim_start();
    if !rest.starts_with('(') {
        return None;
    }
    let condition = rest.strip_suffix('{')?.trim_end();
    condition.ends_with(')').then_some(condition)
}

/// `else {` yields `Some(None)`, `else if (c) {` yields `Some(Some(c))`.
fn else_header(text: &str) -> Option<Option<&str>> {
    let rest = text.strip_prefix("else")?.trim_start();
    if rest == "{" {
        return Some(None);
    }
    block_header(rest, "if").map(Some)
}

/// The literals `true`, `false` and `!EXIT` bypass the evaluator.
async fn loop_condition(condition: &str, line: &Line, runtime: &Runtime) -> bool {
    match strip_wrapping_parens(condition) {
        "true" => true,
        "false" => false,
        "!EXIT" => !runtime.should_stop(),
        _ => evaluate_condition(condition, line, runtime).await,
    }
}

fn strip_wrapping_parens(text: &str) -> &str {
    let text = text.trim();
    if text.starts_with('(') && matching_paren(text, 0) == Some(text.len() - 1) {
        text[1..text.len() - 1].trim()
    } else {
        text
    }
}

async fn evaluate_condition(condition: &str, line: &Line, runtime: &Runtime) -> bool {
    match expand_queries(condition, line.number, runtime).await {
        Ok(expanded) => runtime.evaluator().evaluate_condition(&expanded),
        Err(e) => {
            report(runtime, line.number, &e);
            false
        }
    }
}

/// Replace every query call in `text` (`getColor(…)`, `findText(…)`, …) with
/// the literal of its result.
///
/// The rightmost call is expanded first so nested calls resolve inside out.
async fn expand_queries(text: &str, line: usize, runtime: &Runtime) -> Result<String, ScriptError> {
    let mut text = text.to_string();
    for _ in 0..MAX_QUERY_EXPANSIONS {
        let Some((start, name, open, close)) = last_query_call(&text) else {
            break;
        };
        let Some(spec) = command::lookup(name) else {
            break;
        };
        let command = command::parse(
            spec,
            &text[open + 1..close],
            &runtime.evaluator(),
            runtime.config(),
        )?;
        let value = command.execute(runtime, line).await?.unwrap_or(Value::Null);
        text.replace_range(start..=close, &value.to_literal());
    }
    Ok(text)
}

/// Position of the last query call outside string literals: its start, name,
/// and the offsets of its parentheses.
fn last_query_call(text: &str) -> Option<(usize, &str, usize, usize)> {
    let mut found = None;
    let mut word_start = None;
    let mut prev_end = 0;

    for (i, c) in unquoted(text) {
        if c.is_ascii_alphanumeric() || c == '_' {
            if word_start.is_none() || prev_end != i {
                word_start = Some(i);
            }
            prev_end = i + 1;
            continue;
        }
        if c == '(' {
            if let Some(start) = word_start.filter(|_| prev_end == i) {
                let name = &text[start..i];
                if command::lookup(name).is_some_and(|spec| spec.is_query()) {
                    if let Some(close) = matching_paren(text, i) {
                        found = Some((start, name, i, close));
                    }
                }
            }
        }
        word_start = None;
    }
    found
}

/// Assignment operator of a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AssignOp {
    Set,
    Add,
    Sub,
    Mul,
    Div,
}

/// A statement split into its target, operator and right-hand side.
#[derive(Debug, PartialEq)]
struct Assignment<'t> {
    target: &'t str,
    op: AssignOp,
    value: &'t str,
}

/// Split `[decl] name op= value`, `name++` and `name--`.
fn split_assignment(text: &str) -> Option<Assignment<'_>> {
    for (suffix, op) in [("++", AssignOp::Add), ("--", AssignOp::Sub)] {
        if let Some(target) = text.strip_suffix(suffix) {
            let target = strip_declaration(target.trim());
            if is_identifier(target) {
                return Some(Assignment {
                    target,
                    op,
                    value: "1",
                });
            }
        }
    }

    let at = assignment_operator(text)?;
    let (lhs, op) = match text[..at].chars().last() {
        Some('+') => (&text[..at - 1], AssignOp::Add),
        Some('-') => (&text[..at - 1], AssignOp::Sub),
        Some('*') => (&text[..at - 1], AssignOp::Mul),
        Some('/') => (&text[..at - 1], AssignOp::Div),
        _ => (&text[..at], AssignOp::Set),
    };
    let target = strip_declaration(lhs.trim());
    if !is_identifier(target) {
        return None;
    }
    Some(Assignment {
        target,
        op,
        value: text[at + 1..].trim(),
    })
}

/// Offset of a bare `=` (not part of `==`, `!=`, `<=`, `>=`) outside literals
/// and parentheses.
fn assignment_operator(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0i32;
    for (i, c) in unquoted(text) {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            '=' if depth == 0 => {
                let prev = i.checked_sub(1).map(|p| bytes[p]);
                let next = bytes.get(i + 1).copied();
                if next == Some(b'=') || matches!(prev, Some(b'=' | b'!' | b'<' | b'>')) {
                    return None;
                }
                return Some(i);
            }
            _ => {}
        }
    }
    None
}

fn strip_declaration(target: &str) -> &str {
    for keyword in DECLARATIONS {
        if let Some(rest) = target.strip_prefix(keyword) {
            if rest.starts_with(char::is_whitespace) {
                return rest.trim_start();
            }
        }
    }
    target
}

/// Execute one leaf statement.
async fn dispatch(line: &Line, runtime: &mut Runtime) -> Result<(), ScriptError> {
    let text = line.text.trim();
    if text.is_empty() || text.starts_with("//") {
        return Ok(());
    }

    let assignment = split_assignment(text);
    let (target, expression) = match &assignment {
        Some(a) if a.op == AssignOp::Set => (Some(a.target), a.value),
        Some(_) => (None, ""),
        None => (None, text),
    };

    // Built-in call, optionally binding its result.
    if let Some((name, args)) = split_call(expression) {
        if let Some(spec) = command::lookup(name) {
            let command: Command =
                command::parse(spec, args, &runtime.evaluator(), runtime.config())?;
            let value = command.execute(runtime, line.number).await?;
            if let (Some(target), Some(value)) = (target, value) {
                runtime.context_mut().set_variable(target, value);
            }
            return Ok(());
        }
    }

    if let Some(assignment) = assignment {
        if assignment.target == "EXIT" {
            if runtime.evaluator().evaluate_condition(assignment.value) {
                debug!(line = line.number, "EXIT set by script");
                runtime.stop();
            }
            return Ok(());
        }
        return assign(assignment, line, runtime).await;
    }

    match split_call(text) {
        Some((name, args)) => {
            let def = runtime
                .functions()
                .get(name)
                .ok_or_else(|| ScriptError::UndefinedFunction(name.to_string()))?;
            call_function(def, args, None, line, runtime).await
        }
        None => Err(ScriptError::Unrecognized(text.to_string())),
    }
}

async fn assign(
    assignment: Assignment<'_>,
    line: &Line,
    runtime: &mut Runtime,
) -> Result<(), ScriptError> {
    if assignment.op == AssignOp::Set {
        if let Some((name, args)) = split_call(assignment.value) {
            if let Some(def) = runtime.functions().get(name) {
                return call_function(def, args, Some(assignment.target), line, runtime).await;
            }
        }
    }

    let expanded = expand_queries(assignment.value, line.number, runtime).await?;
    let value = runtime.evaluator().resolve_value(&expanded);
    let value = match assignment.op {
        AssignOp::Set => value,
        op => {
            let current = runtime
                .context()
                .get_variable(assignment.target)
                .cloned()
                .unwrap_or(Value::Number(0.0));
            combine(&current, op, &value)?
        }
    };
    runtime
        .context_mut()
        .set_variable(assignment.target, value);
    Ok(())
}

/// Apply a compound assignment; `+=` concatenates when either side is not
/// numeric.
fn combine(current: &Value, op: AssignOp, value: &Value) -> Result<Value, ScriptError> {
    let numbers = current.as_number().zip(value.as_number());
    match (op, numbers) {
        (AssignOp::Add, Some((a, b))) => Ok(Value::Number(a + b)),
        (AssignOp::Add, None) => Ok(Value::String(current.as_string() + &value.as_string())),
        (AssignOp::Sub, Some((a, b))) => Ok(Value::Number(a - b)),
        (AssignOp::Mul, Some((a, b))) => Ok(Value::Number(a * b)),
        (AssignOp::Div, Some((_, b))) if b == 0.0 => {
            Err(ScriptError::invalid("assignment", "division by zero"))
        }
        (AssignOp::Div, Some((a, b))) => Ok(Value::Number(a / b)),
        _ => Err(ScriptError::invalid(
            "assignment",
            format!(
                "cannot apply arithmetic to {} and {}",
                current.type_name(),
                value.type_name()
            ),
        )),
    }
}

/// Call a user function: bind arguments as strings in a new frame, run the
/// body, restore the caller's frame and hand `result` to `target`.
async fn call_function(
    def: Arc<FunctionDef>,
    args: &str,
    target: Option<&str>,
    line: &Line,
    runtime: &mut Runtime,
) -> Result<(), ScriptError> {
    let max_depth = runtime.config().max_call_depth;
    if runtime.context().depth() >= max_depth {
        return Err(ScriptError::CallDepthExceeded(max_depth));
    }

    let expanded = expand_queries(args, line.number, runtime).await?;
    let values: Vec<Value> = {
        let eval = runtime.evaluator();
        split_args(&expanded)
            .into_iter()
            .map(|arg| Value::String(eval.resolve_value(arg).as_string()))
            .collect()
    };
    if values.len() != def.params.len() {
        debug!(
            function = %def.name,
            expected = def.params.len(),
            got = values.len(),
            "Argument count differs from parameter count"
        );
    }

    runtime
        .context_mut()
        .push_frame(def.params.iter().zip(values));
    let caller_loops = runtime.loop_depth();
    runtime.set_loop_depth(0);
    execute_block(&def.body, runtime).await;
    runtime.set_loop_depth(caller_loops);
    let result = runtime.context_mut().pop_frame();

    if let (Some(target), Some(result)) = (target, result) {
        runtime.context_mut().set_variable(target, result);
    }
    Ok(())
}
