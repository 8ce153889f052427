use crate::dyn_value::DynValue;
use crate::result::ExecError;
use crate::result::ExecResult;
use std::collections::HashMap;

/// Per-call variable bindings. Every function invocation gets a fresh
/// environment; `phi` is the only operation that removes a binding.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: HashMap<String, DynValue>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            vars: HashMap::new(),
        }
    }

    /// Look up a variable that the program claims exists.
    pub fn get(&self, name: &str) -> ExecResult<&DynValue> {
        self.vars.get(name).ok_or_else(|| ExecError::UndefinedVariable {
            name: name.to_string(),
        })
    }

    /// Look up a variable that may legitimately be unbound (phi sources,
    /// previous bindings of an assignment destination).
    pub fn lookup(&self, name: &str) -> Option<&DynValue> {
        self.vars.get(name)
    }

    pub fn define(&mut self, name: impl Into<String>, val: DynValue) {
        self.vars.insert(name.into(), val);
    }

    pub fn remove(&mut self, name: &str) {
        self.vars.remove(name);
    }
}
