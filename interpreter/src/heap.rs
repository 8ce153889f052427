use crate::dyn_value::DynValue;
use crate::ptr::Key;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone)]
pub enum HeapError {
    CannotAlloc(i64),
    BadFree(Key),
    OutOfRange(Key),
}

impl fmt::Display for HeapError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HeapError::CannotAlloc(count) => {
                write!(f, "cannot allocate {} entries", count)
            }
            HeapError::BadFree(key) => {
                write!(f, "tried to free illegal memory location {}", key)
            }
            HeapError::OutOfRange(key) => {
                write!(f, "memory access out of range at {}", key)
            }
        }
    }
}

pub type HeapResult<T> = Result<T, HeapError>;

/// Slotted value heap. Each allocation is a fixed-length run of slots
/// keyed by a base id; bases are issued monotonically from 0 and never
/// reused, so a key into a freed allocation stays invalid forever.
/// Slots start out uninitialized and reads of them are the caller's
/// fault to report.
#[derive(Debug, Clone, Default)]
pub struct Heap {
    allocs: BTreeMap<usize, Vec<Option<DynValue>>>,
    next_base: usize,

    pub trace: bool,
}

impl Heap {
    pub fn new(trace: bool) -> Self {
        Heap {
            allocs: BTreeMap::new(),
            next_base: 0,
            trace,
        }
    }

    pub fn alloc(&mut self, count: i64) -> HeapResult<Key> {
        if count <= 0 {
            return Err(HeapError::CannotAlloc(count));
        }

        let base = self.next_base;
        self.next_base += 1;

        let len = cast::usize(count).map_err(|_| HeapError::CannotAlloc(count))?;
        self.allocs.insert(base, vec![None; len]);

        if self.trace {
            eprintln!("heap: base {} allocated with {} slots", base, len);
        }

        Ok(Key { base, offset: 0 })
    }

    pub fn free(&mut self, key: Key) -> HeapResult<()> {
        if key.offset != 0 {
            return Err(HeapError::BadFree(key));
        }

        match self.allocs.remove(&key.base) {
            Some(slots) => {
                if self.trace {
                    eprintln!("heap: {} freed ({} slots)", key, slots.len());
                }
                Ok(())
            }
            None => Err(HeapError::BadFree(key)),
        }
    }

    /// Read the slot at `key`. `Ok(None)` means the slot exists but was
    /// never written.
    pub fn read(&self, key: Key) -> HeapResult<Option<&DynValue>> {
        let slots = self.allocs.get(&key.base).ok_or(HeapError::OutOfRange(key))?;
        let index = cast::usize(key.offset).map_err(|_| HeapError::OutOfRange(key))?;

        match slots.get(index) {
            Some(slot) => Ok(slot.as_ref()),
            None => Err(HeapError::OutOfRange(key)),
        }
    }

    pub fn write(&mut self, key: Key, val: DynValue) -> HeapResult<()> {
        let slots = self.allocs.get_mut(&key.base).ok_or(HeapError::OutOfRange(key))?;
        let index = cast::usize(key.offset).map_err(|_| HeapError::OutOfRange(key))?;

        match slots.get_mut(index) {
            Some(slot) => {
                *slot = Some(val);
                Ok(())
            }
            None => Err(HeapError::OutOfRange(key)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.allocs.is_empty()
    }

    /// Number of live allocations, for the end-of-run leak report.
    pub fn live_allocs(&self) -> usize {
        self.allocs.len()
    }
}
