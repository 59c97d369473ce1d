//! Name binding for flowsh pipelines.
//!
//! Scopes provide bindings with:
//! - Nested frames (push/pop around subroutine calls)
//! - A base frame that lives for the whole run (imports land there)
//! - A flattened read-only view for the evaluator via [`Bindings`]

use std::collections::{BTreeSet, HashMap};
use std::ops::{Deref, DerefMut};

use flowsh_types::{Bindings, Value};

/// Binding scope with nested frames.
///
/// Names are looked up from innermost to outermost frame.
#[derive(Debug, Clone)]
pub struct Scope {
    /// Stack of frames. Last element is the innermost scope.
    frames: Vec<HashMap<String, Value>>,
}

impl Scope {
    /// Create a new scope with one empty frame.
    pub fn new() -> Self {
        Self {
            frames: vec![HashMap::new()],
        }
    }

    /// Push a new frame (entering a subroutine body).
    pub fn push_frame(&mut self) {
        self.frames.push(HashMap::new());
    }

    /// Pop the innermost frame. The base frame is never popped.
    pub fn pop_frame(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    /// Push a frame that is popped again when the guard drops, whatever
    /// happens in between.
    pub fn enter(&mut self) -> FrameGuard<'_> {
        let depth = self.frames.len();
        self.push_frame();
        FrameGuard { scope: self, depth }
    }

    /// Number of frames, base included.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Bind a name in the current (innermost) frame.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.into(), value);
        }
    }

    /// Bind a name in the base frame.
    pub fn set_global(&mut self, name: impl Into<String>, value: Value) {
        if let Some(frame) = self.frames.first_mut() {
            frame.insert(name.into(), value);
        }
    }

    /// Get a binding by name, searching from innermost to outermost frame.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Remove a binding, searching from innermost to outermost frame.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.frames.iter_mut().rev().find_map(|frame| frame.remove(name))
    }

    /// All visible names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let names: BTreeSet<&str> = self
            .frames
            .iter()
            .flat_map(|frame| frame.keys().map(String::as_str))
            .collect();
        names.into_iter().collect()
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl Bindings for Scope {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

/// A pushed frame. Dropping the guard restores the scope to the depth it
/// had before [`Scope::enter`].
pub struct FrameGuard<'a> {
    scope: &'a mut Scope,
    depth: usize,
}

impl Deref for FrameGuard<'_> {
    type Target = Scope;

    fn deref(&self) -> &Scope {
        self.scope
    }
}

impl DerefMut for FrameGuard<'_> {
    fn deref_mut(&mut self) -> &mut Scope {
        self.scope
    }
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        self.scope.frames.truncate(self.depth.max(1));
    }
}
