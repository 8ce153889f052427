use crate::dyn_value::DynValue;
use crate::heap::Heap;
use crate::ptr::Key;
use crate::result::ExecResult;
use std::collections::HashMap;

/// Assignment-oriented reference counter. Counts how many named bindings
/// currently hold each pointer key; it sees only explicit pointer
/// assignments, so pointers stored into heap cells (and any cycles built
/// through them) are invisible to it.
#[derive(Debug, Clone, Default)]
pub struct RefCounter {
    counts: HashMap<Key, u64>,

    pub trace: bool,
}

impl RefCounter {
    pub fn new(trace: bool) -> Self {
        RefCounter {
            counts: HashMap::new(),
            trace,
        }
    }

    /// A pointer value is being bound over `old`, the destination's
    /// previous binding. Releases the old pointer (freeing its
    /// allocation when the last named binding goes away), then retains
    /// the new one.
    pub fn on_assign(
        &mut self,
        old: Option<&DynValue>,
        new_key: Key,
        heap: &mut Heap,
    ) -> ExecResult<()> {
        if let Some(DynValue::Pointer(old_ptr)) = old {
            self.release(old_ptr.key, heap)?;
        }

        let count = self.counts.entry(new_key).or_insert(0);
        *count += 1;

        if self.trace {
            eprintln!("rc: retain {} ({} refs)", new_key, count);
        }

        Ok(())
    }

    /// The program freed `key` explicitly; its count entry no longer
    /// applies.
    pub fn on_free(&mut self, key: Key) {
        if self.counts.remove(&key).is_some() && self.trace {
            eprintln!("rc: forget {} (freed explicitly)", key);
        }
    }

    /// Free every allocation still tracked. Run once at program end.
    pub fn sweep(&mut self, heap: &mut Heap) -> ExecResult<()> {
        for (key, _) in self.counts.drain() {
            heap.free(key)?;
        }

        if self.trace {
            eprintln!("rc: sweep complete");
        }

        Ok(())
    }

    fn release(&mut self, key: Key, heap: &mut Heap) -> ExecResult<()> {
        let count = match self.counts.get_mut(&key) {
            Some(count) => {
                *count -= 1;
                *count
            }
            None => return Ok(()),
        };

        if count == 0 {
            self.counts.remove(&key);
            heap.free(key)?;

            if self.trace {
                eprintln!("rc: free {} (no refs left)", key);
            }
        } else if self.trace {
            eprintln!("rc: release {} ({} refs left)", key, count);
        }

        Ok(())
    }
}
