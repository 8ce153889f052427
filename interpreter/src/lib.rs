pub use crate::dyn_value::DynValue;
pub use crate::env::Environment;
pub use crate::heap::Heap;
pub use crate::heap::HeapError;
pub use crate::ptr::Key;
pub use crate::ptr::Pointer;
pub use crate::result::ExecError;
pub use crate::result::ExecResult;
pub use crate::tracer::DEFAULT_HOT_THRESHOLD;

use crate::gc::RefCounter;
use crate::tracer::Tracer;
use derivative::Derivative;
use ir_lang::Code;
use ir_lang::Function;
use ir_lang::Instruction;
use ir_lang::Literal;
use ir_lang::Program;
use ir_lang::Type;
use linked_hash_map::LinkedHashMap;
use std::io::Write;
use std::rc::Rc;

mod dyn_value;
mod env;
mod gc;
mod heap;
mod ptr;
pub mod result;
mod tracer;


/// Name of the function execution starts from.
pub const ENTRY_FUNCTION: &str = "main";

/// Execution options installed by the driver before the run starts.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Opts {
    /// count named pointer bindings and free allocations nobody names
    pub enable_gc: bool,
    /// treat `free` instructions as no-ops
    pub defer_free: bool,
    /// record hot-function traces
    pub trace: bool,
    /// call count at which a function becomes hot
    pub hot_threshold: u64,

    pub trace_heap: bool,
    pub trace_rc: bool,
}

impl Default for Opts {
    fn default() -> Self {
        Opts {
            enable_gc: false,
            defer_free: false,
            trace: false,
            hot_threshold: DEFAULT_HOT_THRESHOLD,
            trace_heap: false,
            trace_rc: false,
        }
    }
}

/// Signal an instruction hands back to the function evaluator to drive
/// control flow.
#[derive(Debug, Clone)]
pub enum Action {
    Next,
    Jump(String),
    End(Option<DynValue>),
    Speculate,
    Commit,
    Abort(String),
}

/// Frame-local snapshot taken at `speculate`. Only the fields a
/// matching abort must restore live here; shared resources (heap,
/// reference counter, tracer) are never copied.
#[derive(Debug)]
struct Snapshot {
    env: Environment,
    last_label: Option<String>,
    cur_label: Option<String>,
    parent: Option<Box<Snapshot>>,
}

/// Per-call state: the variable bindings, the label bookkeeping phi
/// resolution depends on, and the active speculation snapshot if any.
#[derive(Debug, Default)]
struct Frame {
    env: Environment,
    last_label: Option<String>,
    cur_label: Option<String>,
    spec: Option<Box<Snapshot>>,
}

#[derive(Derivative)]
#[derivative(Debug)]
pub struct Interpreter {
    functions: LinkedHashMap<String, Rc<Function>>,

    heap: Heap,
    gc: RefCounter,
    tracer: Tracer,

    opts: Opts,
    icount: u64,

    #[derivative(Debug = "ignore")]
    out: Box<dyn Write>,
}

impl Interpreter {
    /// Build the interpreter for `program`, writing `print` output to
    /// `out`. Fails if the program defines the same function name twice.
    pub fn new(program: Program, opts: Opts, out: Box<dyn Write>) -> ExecResult<Self> {
        let mut functions = LinkedHashMap::new();

        for func in program.functions {
            let name = func.name.clone();
            if functions.insert(name.clone(), Rc::new(func)).is_some() {
                return Err(ExecError::DuplicateFunction { name });
            }
        }

        Ok(Interpreter {
            functions,
            heap: Heap::new(opts.trace_heap),
            gc: RefCounter::new(opts.trace_rc),
            tracer: Tracer::new(opts.trace, opts.hot_threshold),
            opts,
            icount: 0,
            out,
        })
    }

    /// Parse `raw_args` against the entry function's parameter types and
    /// run it to completion.
    pub fn run_main(&mut self, raw_args: &[String]) -> ExecResult<()> {
        let func = self
            .functions
            .get(ENTRY_FUNCTION)
            .cloned()
            .ok_or_else(|| ExecError::UndefinedFunction {
                name: ENTRY_FUNCTION.to_string(),
            })?;

        if raw_args.len() != func.args.len() {
            return Err(ExecError::EntryArityMismatch {
                expected: func.args.len(),
                found: raw_args.len(),
            });
        }

        let mut env = Environment::new();
        for (param, raw) in func.args.iter().zip(raw_args) {
            env.define(param.name.as_str(), parse_entry_arg(raw, &param.ty)?);
        }

        self.eval_func(func, env)?;
        Ok(())
    }

    /// End-of-run bookkeeping: sweep the reference counter's survivors
    /// if it was enabled, then require the heap to be empty.
    pub fn finalize(&mut self) -> ExecResult<()> {
        if self.opts.enable_gc {
            self.gc.sweep(&mut self.heap)?;
        }

        if !self.heap.is_empty() {
            return Err(ExecError::MemoryLeak {
                count: self.heap.live_allocs(),
            });
        }

        Ok(())
    }

    /// Dynamic instruction count so far.
    pub fn instruction_count(&self) -> u64 {
        self.icount
    }

    /// Recorded hot-function traces, in activation order.
    pub fn traces(&self) -> &LinkedHashMap<String, Vec<Instruction>> {
        self.tracer.traces()
    }

    /// Walk a function body, dispatching instructions and acting on the
    /// returned [`Action`]s. Labels update the phi bookkeeping as the
    /// cursor crosses them.
    fn eval_func(&mut self, func: Rc<Function>, env: Environment) -> ExecResult<Option<DynValue>> {
        let mut frame = Frame {
            env,
            ..Frame::default()
        };

        let mut pc = 0;
        while pc < func.instrs.len() {
            match &func.instrs[pc] {
                Code::Label { label } => {
                    frame.last_label = frame.cur_label.take();
                    frame.cur_label = Some(label.clone());
                    pc += 1;
                }

                Code::Instr(instr) => match self.exec_instruction(&mut frame, instr)? {
                    Action::Next => {
                        pc += 1;
                    }

                    Action::End(val) => {
                        return Ok(val);
                    }

                    Action::Jump(label) => {
                        pc = find_label(&func, &label)?;
                    }

                    Action::Speculate => {
                        frame.spec = Some(Box::new(Snapshot {
                            env: frame.env.clone(),
                            last_label: frame.last_label.clone(),
                            cur_label: frame.cur_label.clone(),
                            parent: frame.spec.take(),
                        }));
                        pc += 1;
                    }

                    Action::Commit => {
                        // pops one level: an enclosing speculation, if
                        // any, stays active
                        let snapshot = frame.spec.take().ok_or_else(|| {
                            ExecError::NotSpeculating {
                                op: "commit".to_string(),
                            }
                        })?;
                        frame.spec = snapshot.parent;
                        pc += 1;
                    }

                    Action::Abort(label) => {
                        let snapshot = frame.spec.take().ok_or_else(|| {
                            ExecError::NotSpeculating {
                                op: "guard".to_string(),
                            }
                        })?;

                        // the instruction count is deliberately not
                        // restored: aborted instructions still count
                        frame.env = snapshot.env;
                        frame.last_label = snapshot.last_label;
                        frame.cur_label = snapshot.cur_label;
                        frame.spec = snapshot.parent;

                        pc = find_label(&func, &label)?;
                    }
                },
            }
        }

        if frame.spec.is_some() {
            return Err(ExecError::ImplicitSpeculativeReturn);
        }

        Ok(None)
    }

    fn exec_instruction(&mut self, frame: &mut Frame, instr: &Instruction) -> ExecResult<Action> {
        self.icount += 1;
        self.tracer.record(instr);

        let op = instr.op();

        if op != "const" {
            let arity = op_arity(op).ok_or_else(|| ExecError::UnknownOpcode {
                op: op.to_string(),
            })?;

            if let Some(expected) = arity {
                let found = instr.args().len();
                if found != expected {
                    return Err(ExecError::ArityMismatch {
                        op: op.to_string(),
                        expected,
                        found,
                    });
                }
            }
        }

        if frame.spec.is_some() && (op == "call" || op == "ret") {
            return Err(ExecError::IllegalDuringSpeculation {
                op: op.to_string(),
            });
        }

        let action = match instr {
            Instruction::Constant { dest, ty, value, .. } => {
                self.exec_const(frame, dest, ty.as_ref(), value)?
            }

            _ => match op {
                "id" => self.exec_id(frame, instr)?,

                "add" | "mul" | "sub" | "div" => self.exec_int_arith(frame, instr)?,
                "lt" | "le" | "gt" | "ge" | "eq" => self.exec_int_cmp(frame, instr)?,

                "not" => self.exec_not(frame, instr)?,
                "and" | "or" => self.exec_logic(frame, instr)?,

                "fadd" | "fsub" | "fmul" | "fdiv" => self.exec_float_arith(frame, instr)?,
                "flt" | "fle" | "fgt" | "fge" | "feq" => self.exec_float_cmp(frame, instr)?,

                "print" => self.exec_print(frame, instr)?,

                "jmp" => Action::Jump(label_of(instr, 0)?.to_string()),
                "br" => self.exec_br(frame, instr)?,
                "ret" => exec_ret(frame, instr)?,
                "nop" => Action::Next,
                "call" => self.exec_call(frame, instr)?,

                "alloc" => self.exec_alloc(frame, instr)?,
                "free" => self.exec_free(frame, instr)?,
                "store" => self.exec_store(frame, instr)?,
                "load" => self.exec_load(frame, instr)?,
                "ptradd" => self.exec_ptradd(frame, instr)?,

                "phi" => exec_phi(frame, instr)?,

                "speculate" => Action::Speculate,
                "guard" => self.exec_guard(frame, instr)?,
                "commit" => Action::Commit,

                other => {
                    return Err(ExecError::UnknownOpcode {
                        op: other.to_string(),
                    })
                }
            },
        };

        Ok(action)
    }

    fn exec_const(
        &mut self,
        frame: &mut Frame,
        dest: &str,
        ty: Option<&Type>,
        value: &Literal,
    ) -> ExecResult<Action> {
        // numeric literals follow the declared type: float destinations
        // widen, everything else floors to an integer
        let val = match value {
            Literal::Int(i) => match ty {
                Some(Type::Float) => DynValue::Float(*i as f64),
                _ => DynValue::Int(*i),
            },
            Literal::Float(x) => match ty {
                Some(Type::Float) => DynValue::Float(*x),
                _ => DynValue::Int(x.floor() as i64),
            },
            Literal::Bool(b) => DynValue::Bool(*b),
        };

        frame.env.define(dest, val);
        Ok(Action::Next)
    }

    fn exec_id(&mut self, frame: &mut Frame, instr: &Instruction) -> ExecResult<Action> {
        let (dest, _) = dest_ty(instr)?;
        let val = frame.env.get(&instr.args()[0])?.clone();

        self.bind_with_rc(frame, dest, val)?;
        Ok(Action::Next)
    }

    fn exec_int_arith(&mut self, frame: &mut Frame, instr: &Instruction) -> ExecResult<Action> {
        let (dest, _) = dest_ty(instr)?;
        let a = arg_int(frame, instr, 0)?;
        let b = arg_int(frame, instr, 1)?;

        // results wrap to 64-bit two's complement
        let result = match instr.op() {
            "add" => a.wrapping_add(b),
            "mul" => a.wrapping_mul(b),
            "sub" => a.wrapping_sub(b),
            _ => {
                if b == 0 {
                    return Err(ExecError::DivisionByZero);
                }
                a.wrapping_div(b)
            }
        };

        frame.env.define(dest, DynValue::Int(result));
        Ok(Action::Next)
    }

    fn exec_int_cmp(&mut self, frame: &mut Frame, instr: &Instruction) -> ExecResult<Action> {
        let (dest, _) = dest_ty(instr)?;
        let a = arg_int(frame, instr, 0)?;
        let b = arg_int(frame, instr, 1)?;

        let result = match instr.op() {
            "lt" => a < b,
            "le" => a <= b,
            "gt" => a > b,
            "ge" => a >= b,
            _ => a == b,
        };

        frame.env.define(dest, DynValue::Bool(result));
        Ok(Action::Next)
    }

    fn exec_not(&mut self, frame: &mut Frame, instr: &Instruction) -> ExecResult<Action> {
        let (dest, _) = dest_ty(instr)?;
        let a = arg_bool(frame, instr, 0)?;

        frame.env.define(dest, DynValue::Bool(!a));
        Ok(Action::Next)
    }

    fn exec_logic(&mut self, frame: &mut Frame, instr: &Instruction) -> ExecResult<Action> {
        let (dest, _) = dest_ty(instr)?;
        let a = arg_bool(frame, instr, 0)?;
        let b = arg_bool(frame, instr, 1)?;

        let result = match instr.op() {
            "and" => a && b,
            _ => a || b,
        };

        frame.env.define(dest, DynValue::Bool(result));
        Ok(Action::Next)
    }

    fn exec_float_arith(&mut self, frame: &mut Frame, instr: &Instruction) -> ExecResult<Action> {
        let (dest, _) = dest_ty(instr)?;
        let a = arg_float(frame, instr, 0)?;
        let b = arg_float(frame, instr, 1)?;

        let result = match instr.op() {
            "fadd" => a + b,
            "fsub" => a - b,
            "fmul" => a * b,
            _ => a / b,
        };

        frame.env.define(dest, DynValue::Float(result));
        Ok(Action::Next)
    }

    fn exec_float_cmp(&mut self, frame: &mut Frame, instr: &Instruction) -> ExecResult<Action> {
        let (dest, _) = dest_ty(instr)?;
        let a = arg_float(frame, instr, 0)?;
        let b = arg_float(frame, instr, 1)?;

        let result = match instr.op() {
            "flt" => a < b,
            "fle" => a <= b,
            "fgt" => a > b,
            "fge" => a >= b,
            _ => a == b,
        };

        frame.env.define(dest, DynValue::Bool(result));
        Ok(Action::Next)
    }

    fn exec_print(&mut self, frame: &mut Frame, instr: &Instruction) -> ExecResult<Action> {
        let mut parts = Vec::with_capacity(instr.args().len());
        for arg in instr.args() {
            parts.push(frame.env.get(arg)?.to_string());
        }

        writeln!(self.out, "{}", parts.join(" "))
            .map_err(|err| ExecError::illegal_state(format!("output write failed: {}", err)))?;

        Ok(Action::Next)
    }

    fn exec_br(&mut self, frame: &mut Frame, instr: &Instruction) -> ExecResult<Action> {
        let cond = arg_bool(frame, instr, 0)?;
        let target = if cond {
            label_of(instr, 0)?
        } else {
            label_of(instr, 1)?
        };

        Ok(Action::Jump(target.to_string()))
    }

    fn exec_call(&mut self, frame: &mut Frame, instr: &Instruction) -> ExecResult<Action> {
        let func_name = instr.funcs().first().ok_or_else(|| ExecError::MissingFunction {
            op: "call".to_string(),
        })?;

        let func = self
            .functions
            .get(func_name)
            .cloned()
            .ok_or_else(|| ExecError::UndefinedFunction {
                name: func_name.clone(),
            })?;

        let actuals = instr.args();
        if actuals.len() != func.args.len() {
            return Err(ExecError::CallArity {
                func: func.name.clone(),
                expected: func.args.len(),
                found: actuals.len(),
            });
        }

        let mut callee_env = Environment::new();
        for (param, actual) in func.args.iter().zip(actuals) {
            let val = frame.env.get(actual)?.clone();
            if !val.satisfies(&param.ty) {
                return Err(ExecError::TypeCheck {
                    value: val,
                    ty: param.ty.clone(),
                });
            }
            callee_env.define(param.name.as_str(), val);
        }

        let activated = self.tracer.enter_call(&func.name);
        let result = self.eval_func(Rc::clone(&func), callee_env)?;
        self.tracer.exit_call(&func.name, activated);

        match instr {
            Instruction::Effect { .. } => {
                if func.return_ty.is_some() || result.is_some() {
                    return Err(ExecError::EffectCallResult {
                        func: func.name.clone(),
                    });
                }
            }

            Instruction::Value { dest, ty, .. } => {
                let ret_ty = func.return_ty.clone().ok_or_else(|| {
                    ExecError::MissingReturnType {
                        func: func.name.clone(),
                    }
                })?;

                let value = result.ok_or_else(|| ExecError::MissingReturnValue {
                    func: func.name.clone(),
                })?;

                if !value.satisfies(ty) {
                    return Err(ExecError::TypeCheck {
                        value,
                        ty: ty.clone(),
                    });
                }

                if *ty != ret_ty {
                    return Err(ExecError::ReturnTypeMismatch {
                        func: func.name.clone(),
                        call_ty: ty.clone(),
                        ret_ty,
                    });
                }

                frame.env.define(dest.as_str(), value);
            }

            Instruction::Constant { .. } => {
                return Err(ExecError::illegal_state("const instruction cannot call"));
            }
        }

        Ok(Action::Next)
    }

    fn exec_alloc(&mut self, frame: &mut Frame, instr: &Instruction) -> ExecResult<Action> {
        let (dest, ty) = dest_ty(instr)?;

        let pointee = ty
            .deref_ty()
            .cloned()
            .ok_or_else(|| ExecError::AllocType { ty: ty.clone() })?;

        let count = arg_int(frame, instr, 0)?;
        let key = self.heap.alloc(count)?;

        let val = DynValue::Pointer(Pointer { key, ty: pointee });
        self.bind_with_rc(frame, dest, val)?;

        Ok(Action::Next)
    }

    fn exec_free(&mut self, frame: &mut Frame, instr: &Instruction) -> ExecResult<Action> {
        if self.opts.defer_free {
            return Ok(Action::Next);
        }

        let ptr = arg_pointer(frame, instr, 0)?;
        self.heap.free(ptr.key)?;
        self.gc.on_free(ptr.key);

        Ok(Action::Next)
    }

    fn exec_store(&mut self, frame: &mut Frame, instr: &Instruction) -> ExecResult<Action> {
        let ptr = arg_pointer(frame, instr, 0)?;
        let val = frame.env.get(&instr.args()[1])?.clone();

        if !val.satisfies(&ptr.ty) {
            return Err(ExecError::TypeCheck {
                value: val,
                ty: ptr.ty,
            });
        }

        self.heap.write(ptr.key, val)?;
        Ok(Action::Next)
    }

    fn exec_load(&mut self, frame: &mut Frame, instr: &Instruction) -> ExecResult<Action> {
        let (dest, _) = dest_ty(instr)?;
        let ptr = arg_pointer(frame, instr, 0)?;

        let val = match self.heap.read(ptr.key)? {
            Some(val) => val.clone(),
            None => return Err(ExecError::UninitializedRead { key: ptr.key }),
        };

        frame.env.define(dest, val);
        Ok(Action::Next)
    }

    fn exec_ptradd(&mut self, frame: &mut Frame, instr: &Instruction) -> ExecResult<Action> {
        let (dest, _) = dest_ty(instr)?;
        let ptr = arg_pointer(frame, instr, 0)?;
        let delta = arg_int(frame, instr, 1)?;

        frame.env.define(dest, DynValue::Pointer(ptr.offset_by(delta)));
        Ok(Action::Next)
    }

    fn exec_guard(&mut self, frame: &mut Frame, instr: &Instruction) -> ExecResult<Action> {
        if arg_bool(frame, instr, 0)? {
            Ok(Action::Next)
        } else {
            Ok(Action::Abort(label_of(instr, 0)?.to_string()))
        }
    }

    /// Bind `val` to `dest`, routing pointer values through the
    /// reference counter when it is enabled.
    fn bind_with_rc(&mut self, frame: &mut Frame, dest: &str, val: DynValue) -> ExecResult<()> {
        if self.opts.enable_gc {
            if let DynValue::Pointer(new_ptr) = &val {
                let old = frame.env.lookup(dest).cloned();
                self.gc.on_assign(old.as_ref(), new_ptr.key, &mut self.heap)?;
            }
        }

        frame.env.define(dest, val);
        Ok(())
    }
}

/// Expected argument count per operation; `None` means variadic (the
/// operation checks its own argument list).
fn op_arity(op: &str) -> Option<Option<usize>> {
    let arity = match op {
        "add" | "mul" | "sub" | "div" | "lt" | "le" | "gt" | "ge" | "eq" | "and" | "or"
        | "fadd" | "fsub" | "fmul" | "fdiv" | "flt" | "fle" | "fgt" | "fge" | "feq" | "store"
        | "ptradd" => Some(2),

        "id" | "not" | "br" | "alloc" | "free" | "load" | "guard" => Some(1),

        "jmp" | "nop" | "speculate" | "commit" => Some(0),

        "print" | "call" | "ret" | "phi" => None,

        _ => return None,
    };

    Some(arity)
}

fn dest_ty(instr: &Instruction) -> ExecResult<(&str, &Type)> {
    match instr {
        Instruction::Value { dest, ty, .. } => Ok((dest, ty)),
        _ => Err(ExecError::illegal_state(format!(
            "`{}` requires a typed destination",
            instr.op()
        ))),
    }
}

fn label_of(instr: &Instruction, index: usize) -> ExecResult<&str> {
    instr
        .labels()
        .get(index)
        .map(String::as_str)
        .ok_or_else(|| ExecError::MissingLabel {
            op: instr.op().to_string(),
        })
}

fn find_label(func: &Function, label: &str) -> ExecResult<usize> {
    func.instrs
        .iter()
        .position(|code| matches!(code, Code::Label { label: name } if name == label))
        .ok_or_else(|| ExecError::UnresolvedLabel {
            label: label.to_string(),
            func: func.name.clone(),
        })
}

fn arg_int(frame: &Frame, instr: &Instruction, index: usize) -> ExecResult<i64> {
    match frame.env.get(&instr.args()[index])? {
        DynValue::Int(x) => Ok(*x),
        other => Err(ExecError::OperandType {
            expected: "int",
            found: other.clone(),
        }),
    }
}

fn arg_bool(frame: &Frame, instr: &Instruction, index: usize) -> ExecResult<bool> {
    match frame.env.get(&instr.args()[index])? {
        DynValue::Bool(b) => Ok(*b),
        other => Err(ExecError::OperandType {
            expected: "bool",
            found: other.clone(),
        }),
    }
}

fn arg_float(frame: &Frame, instr: &Instruction, index: usize) -> ExecResult<f64> {
    match frame.env.get(&instr.args()[index])? {
        DynValue::Float(x) => Ok(*x),
        other => Err(ExecError::OperandType {
            expected: "float",
            found: other.clone(),
        }),
    }
}

fn arg_pointer(frame: &Frame, instr: &Instruction, index: usize) -> ExecResult<Pointer> {
    match frame.env.get(&instr.args()[index])? {
        DynValue::Pointer(ptr) => Ok(ptr.clone()),
        other => Err(ExecError::OperandType {
            expected: "pointer",
            found: other.clone(),
        }),
    }
}

fn exec_ret(frame: &mut Frame, instr: &Instruction) -> ExecResult<Action> {
    match instr.args() {
        [] => Ok(Action::End(None)),
        [name] => Ok(Action::End(Some(frame.env.get(name)?.clone()))),
        args => Err(ExecError::ArityMismatch {
            op: "ret".to_string(),
            expected: 1,
            found: args.len(),
        }),
    }
}

fn exec_phi(frame: &mut Frame, instr: &Instruction) -> ExecResult<Action> {
    let (dest, _) = dest_ty(instr)?;
    let labels = instr.labels();
    let args = instr.args();

    if labels.len() != args.len() {
        return Err(ExecError::PhiListMismatch {
            labels: labels.len(),
            args: args.len(),
        });
    }

    let selected = frame
        .last_label
        .as_ref()
        .and_then(|last| labels.iter().position(|label| label == last));

    match selected {
        // no predecessor recorded, or one this phi has no arm for:
        // the destination becomes unbound
        None => frame.env.remove(dest),

        Some(index) => match frame.env.lookup(&args[index]).cloned() {
            Some(val) => frame.env.define(dest, val),
            None => frame.env.remove(dest),
        },
    }

    Ok(Action::Next)
}

fn parse_entry_arg(raw: &str, ty: &Type) -> ExecResult<DynValue> {
    let bad_arg = || ExecError::BadEntryArg {
        arg: raw.to_string(),
        ty: ty.clone(),
    };

    match ty {
        Type::Int => raw.parse::<i64>().map(DynValue::Int).map_err(|_| bad_arg()),

        Type::Float => match raw.parse::<f64>() {
            Ok(x) if !x.is_nan() => Ok(DynValue::Float(x)),
            _ => Err(bad_arg()),
        },

        Type::Bool => match raw {
            "true" => Ok(DynValue::Bool(true)),
            "false" => Ok(DynValue::Bool(false)),
            _ => Err(bad_arg()),
        },

        Type::Ptr(..) => Err(bad_arg()),
    }
}
