//! Variable scope management.
//!
//! A scope is a global frame plus one frame per active function call.
//! Function bodies see their own frame and the globals.

use std::collections::HashMap;

use super::value::Value;

/// Variable bindings with nested call frames.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    /// Bindings visible everywhere.
    globals: HashMap<String, Value>,
    /// Call frames. Last element is the innermost.
    frames: Vec<HashMap<String, Value>>,
}

impl Scope {
    /// Create an empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Structurally independent copy for a throwaway evaluation.
    ///
    /// Values own their contents, so the clone shares nothing mutable
    /// with `self`.
    pub fn snapshot(&self) -> Self {
        self.clone()
    }

    /// Push a frame for a function call.
    pub fn push_frame(&mut self) {
        self.frames.push(HashMap::new());
    }

    /// Pop the innermost call frame. The global frame is never popped.
    pub fn pop_frame(&mut self) {
        self.frames.pop();
    }

    /// Number of active call frames.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Look a variable up in the innermost frame, then the globals.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.frames
            .last()
            .and_then(|frame| frame.get(name))
            .or_else(|| self.globals.get(name))
    }

    /// Mutable lookup with the same resolution order as [`get`](Self::get).
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        if let Some(frame) = self.frames.last_mut() {
            if frame.contains_key(name) {
                return frame.get_mut(name);
            }
        }
        self.globals.get_mut(name)
    }

    /// Declare a variable in the innermost frame.
    pub fn declare(&mut self, name: impl Into<String>, value: Value) {
        match self.frames.last_mut() {
            Some(frame) => frame.insert(name.into(), value),
            None => self.globals.insert(name.into(), value),
        };
    }

    /// Assign to an existing variable, or create a global.
    pub fn assign(&mut self, name: &str, value: Value) {
        match self.get_mut(name) {
            Some(slot) => *slot = value,
            None => {
                self.globals.insert(name.to_string(), value);
            }
        }
    }

    /// Set a global binding directly.
    pub fn set_global(&mut self, name: impl Into<String>, value: Value) {
        self.globals.insert(name.into(), value);
    }

    /// Names of all global bindings, sorted.
    pub fn global_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.globals.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
