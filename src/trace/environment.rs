use crate::trace::value::TraceValue;
use std::collections::HashMap;

type Scope = HashMap<String, TraceValue>;

/// Name-to-binding map for one trace. Assignment always rebinds a name,
/// never mutates what the name pointed at.
#[derive(Clone, Debug)]
pub struct Environment {
    scopes: Vec<Scope>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::new()],
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::new());
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
        if self.scopes.is_empty() {
            self.scopes.push(Scope::new());
        }
    }

    pub fn declare(&mut self, name: &str, value: TraceValue) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), value);
        }
    }

    /// Rebinds in the innermost scope that already holds `name`, so rebinding
    /// an enclosing name from inside a transient scope survives that scope.
    /// A name bound nowhere is created in the innermost scope.
    pub fn assign(&mut self, name: &str, value: TraceValue) {
        for index in (0..self.scopes.len()).rev() {
            if self.scopes[index].contains_key(name) {
                self.scopes[index].insert(name.to_string(), value);
                return;
            }
        }
        self.declare(name, value);
    }

    pub fn get(&self, name: &str) -> Option<&TraceValue> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
    }
}
