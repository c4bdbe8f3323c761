//! Variable store with per-call frames.

use std::collections::HashMap;

use crate::script::value::Value;

/// Reserved variable through which a function hands a value back to its
/// caller.
pub const RESULT_VAR: &str = "result";

/// Variables of one frame.
#[derive(Debug, Clone, Default)]
struct Frame {
    variables: HashMap<String, Value>,
}

/// Execution context: a stack of variable frames indexed by call depth.
///
/// Frame 0 is the script's top level. A function call pushes a copy of the
/// caller's frame (minus any stale `result`), binds the parameters into it,
/// and pops it when the body finishes. The caller's frame is untouched while
/// the callee runs, so the only way a value leaves a call is the `result`
/// variable returned by [`pop_frame`](Context::pop_frame).
#[derive(Debug)]
pub struct Context {
    frames: Vec<Frame>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// Create a context with an empty top-level frame.
    pub fn new() -> Self {
        Self {
            frames: vec![Frame::default()],
        }
    }

    /// Drop every frame and variable.
    pub fn clear(&mut self) {
        self.frames.clear();
        self.frames.push(Frame::default());
    }

    fn current(&self) -> &Frame {
        // frames is never empty: new/clear push frame 0 and pop_frame keeps it
        &self.frames[self.frames.len() - 1]
    }

    fn current_mut(&mut self) -> &mut Frame {
        let top = self.frames.len() - 1;
        &mut self.frames[top]
    }

    /// Set a variable in the current frame.
    pub fn set_variable(&mut self, name: impl Into<String>, value: Value) {
        self.current_mut().variables.insert(name.into(), value);
    }

    /// Get a variable from the current frame.
    pub fn get_variable(&self, name: &str) -> Option<&Value> {
        self.current().variables.get(name)
    }

    /// Whether the current frame defines `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.current().variables.contains_key(name)
    }

    /// Current call depth; 0 at top level.
    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    /// Enter a function: snapshot the caller's variables into a new frame
    /// and bind `params` positionally to `args`.
    pub fn push_frame<'a>(&mut self, params: impl IntoIterator<Item = (&'a String, Value)>) {
        let mut frame = self.current().clone();
        frame.variables.remove(RESULT_VAR);
        for (name, value) in params {
            frame.variables.insert(name.clone(), value);
        }
        self.frames.push(frame);
    }

    /// Leave a function, restoring the caller's variables. Returns the
    /// callee's `result`, if it set one.
    pub fn pop_frame(&mut self) -> Option<Value> {
        if self.frames.len() == 1 {
            return None;
        }
        self.frames
            .pop()
            .and_then(|mut frame| frame.variables.remove(RESULT_VAR))
    }

    /// Extract the top-level variables (for returning from script execution).
    pub fn into_variables(mut self) -> HashMap<String, Value> {
        self.frames.truncate(1);
        self.frames
            .pop()
            .map(|frame| frame.variables)
            .unwrap_or_default()
    }
}
