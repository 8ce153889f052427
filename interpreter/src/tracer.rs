use ir_lang::Instruction;
use linked_hash_map::LinkedHashMap;
use std::collections::HashMap;
use std::collections::HashSet;

pub const DEFAULT_HOT_THRESHOLD: u64 = 5;

/// Records the instruction stream of hot functions. A function becomes
/// hot when its call count reaches the threshold while no other trace is
/// active; its instructions are then logged until the activating call
/// returns, after which it is marked fully traced and never recorded
/// again. Recording never alters execution.
#[derive(Debug, Clone)]
pub struct Tracer {
    enabled: bool,
    hot_threshold: u64,

    call_counts: HashMap<String, u64>,
    traced: HashSet<String>,
    logs: LinkedHashMap<String, Vec<Instruction>>,

    active: Option<String>,
}

impl Tracer {
    pub fn new(enabled: bool, hot_threshold: u64) -> Self {
        Tracer {
            enabled,
            hot_threshold,
            call_counts: HashMap::new(),
            traced: HashSet::new(),
            logs: LinkedHashMap::new(),
            active: None,
        }
    }

    /// Note a call to `func`. Returns true if this call activated a
    /// trace; the caller must pass that back to [`Tracer::exit_call`]
    /// when the call returns.
    pub fn enter_call(&mut self, func: &str) -> bool {
        if !self.enabled || self.traced.contains(func) {
            return false;
        }

        let count = self.call_counts.entry(func.to_string()).or_insert(0);
        *count += 1;

        if *count >= self.hot_threshold && self.active.is_none() {
            self.active = Some(func.to_string());
            self.logs.insert(func.to_string(), Vec::new());
            true
        } else {
            false
        }
    }

    /// Append `instr` to the active log, if any. Calls made from inside
    /// a traced function keep appending to the activating function's
    /// log; they never start traces of their own.
    pub fn record(&mut self, instr: &Instruction) {
        if let Some(name) = &self.active {
            if let Some(log) = self.logs.get_mut(name) {
                log.push(instr.clone());
            }
        }
    }

    /// The call noted by a matching [`Tracer::enter_call`] returned.
    pub fn exit_call(&mut self, func: &str, activated: bool) {
        if activated {
            self.active = None;
            self.traced.insert(func.to_string());
        }
    }

    /// Completed (and in-flight) trace logs, in activation order.
    pub fn traces(&self) -> &LinkedHashMap<String, Vec<Instruction>> {
        &self.logs
    }
}

#[cfg(test)]
mod test;
