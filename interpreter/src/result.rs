use crate::dyn_value::DynValue;
use crate::heap::HeapError;
use crate::ptr::Key;
use ir_lang::Type;
use std::fmt;

/// Every way the engine can fault. All of these are fatal: they propagate
/// out of the evaluator unchanged and the driver reports them once.
#[derive(Debug, Clone)]
pub enum ExecError {
    UnknownOpcode {
        op: String,
    },
    ArityMismatch {
        op: String,
        expected: usize,
        found: usize,
    },
    MissingLabel {
        op: String,
    },
    MissingFunction {
        op: String,
    },
    PhiListMismatch {
        labels: usize,
        args: usize,
    },
    OperandType {
        expected: &'static str,
        found: DynValue,
    },
    TypeCheck {
        value: DynValue,
        ty: Type,
    },
    UndefinedVariable {
        name: String,
    },
    UndefinedFunction {
        name: String,
    },
    DuplicateFunction {
        name: String,
    },
    UnresolvedLabel {
        label: String,
        func: String,
    },
    AllocType {
        ty: Type,
    },
    Heap(HeapError),
    UninitializedRead {
        key: Key,
    },
    MemoryLeak {
        count: usize,
    },
    DivisionByZero,
    IllegalDuringSpeculation {
        op: String,
    },
    NotSpeculating {
        op: String,
    },
    ImplicitSpeculativeReturn,
    CallArity {
        func: String,
        expected: usize,
        found: usize,
    },
    EffectCallResult {
        func: String,
    },
    MissingReturnType {
        func: String,
    },
    MissingReturnValue {
        func: String,
    },
    ReturnTypeMismatch {
        func: String,
        call_ty: Type,
        ret_ty: Type,
    },
    BadEntryArg {
        arg: String,
        ty: Type,
    },
    EntryArityMismatch {
        expected: usize,
        found: usize,
    },
    IllegalState {
        msg: String,
    },
}

impl ExecError {
    pub fn illegal_state(msg: impl Into<String>) -> Self {
        ExecError::IllegalState { msg: msg.into() }
    }
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ExecError::UnknownOpcode { op } => {
                write!(f, "unknown opcode `{}`", op)
            }
            ExecError::ArityMismatch { op, expected, found } => {
                write!(f, "`{}` takes {} arguments, found {}", op, expected, found)
            }
            ExecError::MissingLabel { op } => {
                write!(f, "`{}` is missing a target label", op)
            }
            ExecError::MissingFunction { op } => {
                write!(f, "`{}` is missing a target function", op)
            }
            ExecError::PhiListMismatch { labels, args } => {
                write!(f, "phi has {} labels but {} arguments", labels, args)
            }
            ExecError::OperandType { expected, found } => {
                write!(f, "expected {} operand, found {}", expected, found)
            }
            ExecError::TypeCheck { value, ty } => {
                write!(f, "value {} does not satisfy type {}", value, ty)
            }
            ExecError::UndefinedVariable { name } => {
                write!(f, "undefined variable `{}`", name)
            }
            ExecError::UndefinedFunction { name } => {
                write!(f, "undefined function @{}", name)
            }
            ExecError::DuplicateFunction { name } => {
                write!(f, "duplicate function @{}", name)
            }
            ExecError::UnresolvedLabel { label, func } => {
                write!(f, "label .{} not found in @{}", label, func)
            }
            ExecError::AllocType { ty } => {
                write!(f, "cannot allocate into non-pointer type {}", ty)
            }
            ExecError::Heap(err) => write!(f, "{}", err),
            ExecError::UninitializedRead { key } => {
                write!(f, "uninitialized data read at {}", key)
            }
            ExecError::MemoryLeak { count } => {
                write!(
                    f,
                    "some memory locations have not been freed by the end of execution ({} allocations live)",
                    count
                )
            }
            ExecError::DivisionByZero => write!(f, "integer division by zero"),
            ExecError::IllegalDuringSpeculation { op } => {
                write!(f, "`{}` not allowed during speculation", op)
            }
            ExecError::NotSpeculating { op } => {
                write!(f, "`{}` without an active speculation", op)
            }
            ExecError::ImplicitSpeculativeReturn => {
                write!(f, "implicit return in speculative state")
            }
            ExecError::CallArity { func, expected, found } => {
                write!(f, "@{} expects {} arguments, found {}", func, expected, found)
            }
            ExecError::EffectCallResult { func } => {
                write!(f, "effect call to @{} must not produce a value", func)
            }
            ExecError::MissingReturnType { func } => {
                write!(f, "call expects a value but @{} declares no return type", func)
            }
            ExecError::MissingReturnValue { func } => {
                write!(f, "@{} did not return a value", func)
            }
            ExecError::ReturnTypeMismatch { func, call_ty, ret_ty } => {
                write!(
                    f,
                    "call declares type {} but @{} returns {}",
                    call_ty, func, ret_ty
                )
            }
            ExecError::BadEntryArg { arg, ty } => {
                write!(f, "cannot parse entry argument `{}` as {}", arg, ty)
            }
            ExecError::EntryArityMismatch { expected, found } => {
                write!(f, "entry function expects {} arguments, found {}", expected, found)
            }
            ExecError::IllegalState { msg } => {
                write!(f, "illegal interpreter state: {}", msg)
            }
        }
    }
}

impl From<HeapError> for ExecError {
    fn from(err: HeapError) -> Self {
        ExecError::Heap(err)
    }
}

pub type ExecResult<T> = Result<T, ExecError>;
