use crate::instruction::Code;
use crate::ty::Type;
use serde::Deserialize;
use serde::Serialize;
use std::fmt;

/// A formal parameter: name plus declared type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Type,
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.ty)
    }
}

/// A named function: ordered parameters, optional return type, and a
/// linear sequence of labels and instructions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Param>,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub return_ty: Option<Type>,

    #[serde(default)]
    pub instrs: Vec<Code>,
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "@{}", self.name)?;

        if !self.args.is_empty() {
            write!(f, "(")?;
            for (i, param) in self.args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", param)?;
            }
            write!(f, ")")?;
        }

        if let Some(return_ty) = &self.return_ty {
            write!(f, ": {}", return_ty)?;
        }

        Ok(())
    }
}
