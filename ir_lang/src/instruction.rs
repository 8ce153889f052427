use crate::ty::Type;
use crate::val::Literal;
use serde::Deserialize;
use serde::Serialize;
use std::fmt;

/// One item in a function body: either a label marking a position the
/// control-transfer instructions can target, or an executable instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Code {
    Label { label: String },
    Instr(Instruction),
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Code::Label { label } => write!(f, ".{}:", label),
            Code::Instr(instr) => write!(f, "{}", instr),
        }
    }
}

/// The single opcode a `Constant`-shaped instruction can carry. Keeping it
/// as its own type lets the wire form discriminate the three instruction
/// shapes without a tag field.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub enum ConstOp {
    #[serde(rename = "const")]
    Const,
}

/// An instruction in one of its three shapes.
///
/// `Constant` binds a literal, `Value` binds the result of an operation to
/// a typed destination, and `Effect` runs an operation for its side
/// effects alone. Operation names stay plain strings: the upstream parser
/// hands over names, and an unrecognized one is a runtime fault of the
/// program being interpreted, not of its decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Instruction {
    Constant {
        op: ConstOp,
        dest: String,
        #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
        ty: Option<Type>,
        value: Literal,
    },

    Value {
        op: String,
        dest: String,
        #[serde(rename = "type")]
        ty: Type,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        funcs: Vec<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        labels: Vec<String>,
    },

    Effect {
        op: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        funcs: Vec<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        labels: Vec<String>,
    },
}

const NO_NAMES: &[String] = &[];

impl Instruction {
    pub fn op(&self) -> &str {
        match self {
            Instruction::Constant { .. } => "const",
            Instruction::Value { op, .. } => op,
            Instruction::Effect { op, .. } => op,
        }
    }

    pub fn args(&self) -> &[String] {
        match self {
            Instruction::Constant { .. } => NO_NAMES,
            Instruction::Value { args, .. } => args,
            Instruction::Effect { args, .. } => args,
        }
    }

    pub fn funcs(&self) -> &[String] {
        match self {
            Instruction::Constant { .. } => NO_NAMES,
            Instruction::Value { funcs, .. } => funcs,
            Instruction::Effect { funcs, .. } => funcs,
        }
    }

    pub fn labels(&self) -> &[String] {
        match self {
            Instruction::Constant { .. } => NO_NAMES,
            Instruction::Value { labels, .. } => labels,
            Instruction::Effect { labels, .. } => labels,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Instruction::Constant { dest, ty, value, .. } => {
                match ty {
                    Some(ty) => write!(f, "{}: {} = const {}", dest, ty, value),
                    None => write!(f, "{} = const {}", dest, value),
                }
            }

            Instruction::Value { op, dest, ty, args, funcs, labels } => {
                write!(f, "{}: {} = {}", dest, ty, op)?;
                write_operands(f, args, funcs, labels)
            }

            Instruction::Effect { op, args, funcs, labels } => {
                write!(f, "{}", op)?;
                write_operands(f, args, funcs, labels)
            }
        }
    }
}

fn write_operands(
    f: &mut fmt::Formatter,
    args: &[String],
    funcs: &[String],
    labels: &[String],
) -> fmt::Result {
    for func in funcs {
        write!(f, " @{}", func)?;
    }
    for arg in args {
        write!(f, " {}", arg)?;
    }
    for label in labels {
        write!(f, " .{}", label)?;
    }
    Ok(())
}
