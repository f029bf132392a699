//! Scoped binding environment for template execution.

use std::collections::HashMap;
use stencil_types::{Bindings, Value};

/// A single scope level.
#[derive(Debug, Clone, Default)]
struct Scope {
    bindings: HashMap<String, Value>,
}

/// Scoped variable environment with push/pop semantics.
///
/// The outermost scope holds globals and imports; blocks and loop bodies
/// push their own scope. Lookups search innermost to outermost.
#[derive(Debug, Clone)]
pub struct Environment {
    scopes: Vec<Scope>,
}

impl Environment {
    /// Create a new environment with one outer scope.
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::default()],
        }
    }

    /// Bind every pair into the outer scope, in order. A later name
    /// overrides an earlier one, so binding globals then imports lets
    /// imports win.
    pub fn bind_all(&mut self, bindings: &Bindings) {
        for (name, value) in bindings {
            self.scopes[0].bindings.insert(name.clone(), value.clone());
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    /// Pop the innermost scope. The outer scope is never popped.
    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Define a variable in the innermost scope.
    pub fn define(&mut self, name: &str, value: Value) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.bindings.insert(name.to_string(), value);
        }
    }

    /// Look up a variable, searching from innermost to outermost scope.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.bindings.get(name))
    }

    /// Update a variable in the first scope where it exists.
    /// Returns `false` if no scope binds `name`.
    pub fn set(&mut self, name: &str, value: Value) -> bool {
        match self
            .scopes
            .iter_mut()
            .rev()
            .find_map(|scope| scope.bindings.get_mut(name))
        {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
