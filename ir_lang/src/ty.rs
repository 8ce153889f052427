use serde::Deserialize;
use serde::Serialize;
use std::fmt;

/// Static type of a value or destination. Equality is structural:
/// `ptr<A>` equals `ptr<B>` iff `A` equals `B`.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Type {
    Int,
    Bool,
    Float,
    Ptr(Box<Type>),
}

impl Type {
    pub fn ptr(self) -> Self {
        Type::Ptr(Box::new(self))
    }

    /// The pointee type, if this is a pointer type.
    pub fn deref_ty(&self) -> Option<&Self> {
        match self {
            Type::Ptr(target) => Some(target),
            _ => None,
        }
    }

    pub fn is_ptr(&self) -> bool {
        matches!(self, Type::Ptr(..))
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Bool => write!(f, "bool"),
            Type::Float => write!(f, "float"),
            Type::Ptr(target) => write!(f, "ptr<{}>", target),
        }
    }
}
