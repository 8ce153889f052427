use ir_lang::Type;
use std::fmt;

/// Opaque identity of a heap location: which allocation, and the signed
/// slot index within it. Keys compare equal iff both fields are equal.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct Key {
    pub base: usize,
    pub offset: i64,
}

impl Key {
    pub fn offset_by(self, delta: i64) -> Self {
        Key {
            base: self.base,
            offset: self.offset.wrapping_add(delta),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "@{}.{}", self.base, self.offset)
    }
}

/// A runtime pointer value: a heap key paired with the pointee type.
#[derive(Debug, Clone, PartialEq)]
pub struct Pointer {
    pub key: Key,
    pub ty: Type,
}

impl Pointer {
    /// The pointer `delta` slots further into the same allocation, with
    /// the pointee type preserved.
    pub fn offset_by(&self, delta: i64) -> Self {
        Pointer {
            key: self.key.offset_by(delta),
            ty: self.ty.clone(),
        }
    }
}

impl fmt::Display for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.key)
    }
}
