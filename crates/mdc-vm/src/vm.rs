//! The virtual machine.
//!
//! A fetch-decode-execute loop over a read-only [`Module`]. The VM owns
//! its call frames, value stack and globals map; nothing outlives a call
//! to [`Vm::run`], so embedders wanting parallelism give each thread its
//! own `Vm`.
//!
//! Frames carry the return pc, the active chunk, a local-slot array and
//! the caller's stack height. Frame depth is bounded (`max_frames`,
//! default 1024, `MD_VM_STACK` override); an optional step limit bounds
//! runaway programs.

use std::rc::Rc;

use rustc_hash::FxHashMap;
use tracing::trace;

use mdc_bc::{BcConst, Chunk, Module, Op};

use crate::builtins::{self, BuiltinImpl, BUILTINS};
use crate::error::{RuntimeError, RuntimeErrorKind};
use crate::value::{arith, compare_order, negate, strict_eq, value_eq, ArithOp, Value};

/// Knobs for one VM instance.
#[derive(Clone, Debug)]
pub struct VmOptions {
    /// Maximum call-frame depth before `StackOverflow`.
    pub max_frames: usize,
    /// Abort after this many instructions, if set.
    pub step_limit: Option<u64>,
    /// Collect `print`/`say` output instead of writing to stdout.
    pub capture_output: bool,
}

impl Default for VmOptions {
    fn default() -> Self {
        Self {
            max_frames: 1024,
            step_limit: None,
            capture_output: false,
        }
    }
}

impl VmOptions {
    /// Defaults with the `MD_VM_STACK` environment override applied.
    pub fn from_env() -> Self {
        let mut options = Self::default();
        if let Ok(raw) = std::env::var("MD_VM_STACK") {
            if let Ok(depth) = raw.trim().parse::<usize>() {
                if depth > 0 {
                    options.max_frames = depth;
                }
            }
        }
        options
    }
}

/// The virtual machine. Reusable; each [`Vm::run`] starts from a fresh
/// globals map.
pub struct Vm {
    options: VmOptions,
    output: Vec<String>,
}

struct Frame {
    /// `None` is the main chunk; otherwise an index into `functions`.
    chunk: Option<u16>,
    name: String,
    pc: usize,
    locals: Vec<Value>,
    /// Caller's stack height; everything above belongs to this frame.
    stack_base: usize,
}

impl Vm {
    pub fn new(options: VmOptions) -> Self {
        Self {
            options,
            output: Vec::new(),
        }
    }

    /// Captured `print`/`say` lines, when `capture_output` is on.
    pub fn output(&self) -> &[String] {
        &self.output
    }

    /// Execute a module and produce its result value.
    pub fn run(&mut self, module: &Module) -> Result<Value, RuntimeError> {
        self.output.clear();

        // Shared immutable strings for the run.
        let strings: Vec<Rc<str>> =
            module.strings.iter().map(|s| Rc::from(s.as_str())).collect();

        // Seed globals from the module's symbol table and name the chunks
        // for call-chain reporting.
        let mut globals: FxHashMap<String, Value> = FxHashMap::default();
        let mut chunk_names: FxHashMap<u16, String> = FxHashMap::default();
        for (&name_idx, &const_idx) in &module.globals {
            let Some(name) = module.string(name_idx) else {
                continue;
            };
            let Some(&constant) = module.constants.get(const_idx as usize) else {
                continue;
            };
            let value = const_value(constant, &strings);
            if let Value::Function(chunk) = value {
                chunk_names.insert(chunk, name.to_owned());
            }
            globals.insert(name.to_owned(), value);
        }

        let mut frames = vec![Frame {
            chunk: None,
            name: "main".to_owned(),
            pc: 0,
            locals: vec![Value::Empty; module.main.locals as usize],
            stack_base: 0,
        }];
        let mut stack: Vec<Value> = Vec::new();
        let mut steps: u64 = 0;

        macro_rules! fail {
            ($kind:expr, $msg:expr, $inst_pc:expr) => {
                return Err(error_at(module, &frames, $kind, $msg, $inst_pc))
            };
        }

        loop {
            let fi = frames.len() - 1;
            let chunk = chunk_of(module, frames[fi].chunk);
            let mut pc = frames[fi].pc;

            if pc >= chunk.code.len() {
                // Fell off the end of a chunk; behave like HALT.
                return Ok(stack.pop().unwrap_or(Value::Empty));
            }

            if let Some(limit) = self.options.step_limit {
                steps += 1;
                if steps > limit {
                    fail!(
                        RuntimeErrorKind::StepLimit,
                        format!("exceeded the limit of {limit} instructions"),
                        pc
                    );
                }
            }

            let inst_pc = pc;
            let byte = chunk.code[pc];
            pc += 1;
            let Some(op) = Op::from_u8(byte) else {
                fail!(
                    RuntimeErrorKind::InvalidBytecode,
                    format!("unknown opcode {byte:#04x}"),
                    inst_pc
                );
            };
            trace!(pc = inst_pc, op = op.mnemonic(), "dispatch");

            // Decode the operand up front; `pc` then points at the next
            // instruction, which is what jump offsets are relative to.
            let operand = match decode_operand(chunk, &mut pc, op) {
                Ok(operand) => operand,
                Err(mut err) => {
                    err.call_chain = frames_snapshot(&frames);
                    return Err(err);
                }
            };
            frames[fi].pc = pc;

            match op {
                Op::LoadConst => {
                    let index = operand as u16;
                    let Some(&constant) = module.constants.get(index as usize) else {
                        fail!(
                            RuntimeErrorKind::InvalidBytecode,
                            format!("constant index {index} out of range"),
                            inst_pc
                        );
                    };
                    stack.push(const_value(constant, &strings));
                }
                Op::LoadUrl => {
                    let index = operand as u16;
                    match module.constants.get(index as usize) {
                        Some(BcConst::StrRef(s)) => match strings.get(*s as usize) {
                            Some(text) => stack.push(Value::Url(Rc::clone(text))),
                            None => fail!(
                                RuntimeErrorKind::InvalidBytecode,
                                format!("string index {s} out of range"),
                                inst_pc
                            ),
                        },
                        _ => fail!(
                            RuntimeErrorKind::InvalidBytecode,
                            format!("LOAD_URL expects a string constant at {index}"),
                            inst_pc
                        ),
                    }
                }
                Op::LoadTrue => stack.push(Value::Bool(true)),
                Op::LoadFalse => stack.push(Value::Bool(false)),
                Op::LoadEmpty => stack.push(Value::Empty),
                Op::LoadLocal => {
                    let slot = operand as usize;
                    match frames[fi].locals.get(slot) {
                        Some(value) => stack.push(value.clone()),
                        None => fail!(
                            RuntimeErrorKind::InvalidBytecode,
                            format!("local slot {slot} out of range"),
                            inst_pc
                        ),
                    }
                }
                Op::StoreLocal => {
                    let slot = operand as usize;
                    let value = pop(&mut stack, module, &frames, inst_pc)?;
                    match frames[fi].locals.get_mut(slot) {
                        Some(cell) => *cell = value,
                        None => fail!(
                            RuntimeErrorKind::InvalidBytecode,
                            format!("local slot {slot} out of range"),
                            inst_pc
                        ),
                    }
                }
                Op::LoadGlobal => {
                    let index = operand as u16;
                    let Some(name) = global_name(module, index) else {
                        fail!(
                            RuntimeErrorKind::InvalidBytecode,
                            format!("LOAD_GLOBAL expects a string constant at {index}"),
                            inst_pc
                        );
                    };
                    if let Some(value) = globals.get(name) {
                        stack.push(value.clone());
                    } else if let Some(builtin) = builtins::lookup(name) {
                        stack.push(Value::Builtin(builtin));
                    } else {
                        fail!(
                            RuntimeErrorKind::UnknownName,
                            format!("`{name}` is not defined"),
                            inst_pc
                        );
                    }
                }
                Op::StoreGlobal => {
                    let index = operand as u16;
                    let Some(name) = global_name(module, index) else {
                        fail!(
                            RuntimeErrorKind::InvalidBytecode,
                            format!("STORE_GLOBAL expects a string constant at {index}"),
                            inst_pc
                        );
                    };
                    let name = name.to_owned();
                    let value = pop(&mut stack, module, &frames, inst_pc)?;
                    globals.insert(name, value);
                }
                Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Mod | Op::Pow => {
                    let rhs = pop(&mut stack, module, &frames, inst_pc)?;
                    let lhs = pop(&mut stack, module, &frames, inst_pc)?;
                    let arith_op = match op {
                        Op::Add => ArithOp::Add,
                        Op::Sub => ArithOp::Sub,
                        Op::Mul => ArithOp::Mul,
                        Op::Div => ArithOp::Div,
                        Op::Mod => ArithOp::Mod,
                        _ => ArithOp::Pow,
                    };
                    match arith(arith_op, &lhs, &rhs) {
                        Ok(value) => stack.push(value),
                        Err((kind, message)) => fail!(kind, message, inst_pc),
                    }
                }
                Op::Neg => {
                    let operand_value = pop(&mut stack, module, &frames, inst_pc)?;
                    match negate(&operand_value) {
                        Ok(value) => stack.push(value),
                        Err((kind, message)) => fail!(kind, message, inst_pc),
                    }
                }
                Op::Eq | Op::Neq | Op::StrictEq | Op::StrictNeq => {
                    let rhs = pop(&mut stack, module, &frames, inst_pc)?;
                    let lhs = pop(&mut stack, module, &frames, inst_pc)?;
                    let result = match op {
                        Op::Eq => value_eq(&lhs, &rhs),
                        Op::Neq => !value_eq(&lhs, &rhs),
                        Op::StrictEq => strict_eq(&lhs, &rhs),
                        _ => !strict_eq(&lhs, &rhs),
                    };
                    stack.push(Value::Bool(result));
                }
                Op::Lt | Op::Gt | Op::Lte | Op::Gte => {
                    let rhs = pop(&mut stack, module, &frames, inst_pc)?;
                    let lhs = pop(&mut stack, module, &frames, inst_pc)?;
                    match compare_order(&lhs, &rhs) {
                        Ok(ordering) => {
                            let result = match op {
                                Op::Lt => ordering.is_lt(),
                                Op::Gt => ordering.is_gt(),
                                Op::Lte => ordering.is_le(),
                                _ => ordering.is_ge(),
                            };
                            stack.push(Value::Bool(result));
                        }
                        Err((kind, message)) => fail!(kind, message, inst_pc),
                    }
                }
                Op::Not => {
                    let operand_value = pop(&mut stack, module, &frames, inst_pc)?;
                    stack.push(Value::Bool(!operand_value.is_truthy()));
                }
                Op::And => {
                    let rhs = pop(&mut stack, module, &frames, inst_pc)?;
                    let lhs = pop(&mut stack, module, &frames, inst_pc)?;
                    stack.push(if lhs.is_truthy() { rhs } else { lhs });
                }
                Op::Or => {
                    let rhs = pop(&mut stack, module, &frames, inst_pc)?;
                    let lhs = pop(&mut stack, module, &frames, inst_pc)?;
                    stack.push(if lhs.is_truthy() { lhs } else { rhs });
                }
                Op::Jump => {
                    let offset = operand as i16;
                    let target = branch_target(chunk, pc, offset)
                        .ok_or_else(|| {
                            error_at(
                                module,
                                &frames,
                                RuntimeErrorKind::InvalidBytecode,
                                format!("jump offset {offset} lands outside the code"),
                                inst_pc,
                            )
                        })?;
                    frames[fi].pc = target;
                }
                Op::JumpIfFalse => {
                    let offset = operand as i16;
                    let cond = pop(&mut stack, module, &frames, inst_pc)?;
                    if !cond.is_truthy() {
                        let target = branch_target(chunk, pc, offset)
                            .ok_or_else(|| {
                                error_at(
                                    module,
                                    &frames,
                                    RuntimeErrorKind::InvalidBytecode,
                                    format!("jump offset {offset} lands outside the code"),
                                    inst_pc,
                                )
                            })?;
                        frames[fi].pc = target;
                    }
                }
                Op::Call => {
                    let argc = operand as usize;
                    if stack.len() < argc + 1 {
                        fail!(
                            RuntimeErrorKind::InvalidBytecode,
                            "stack underflow in CALL".to_owned(),
                            inst_pc
                        );
                    }
                    let callee_index = stack.len() - argc - 1;
                    let callee = stack[callee_index].clone();
                    match callee {
                        Value::Function(chunk_index) => {
                            let Some(target) = module.functions.get(chunk_index as usize)
                            else {
                                fail!(
                                    RuntimeErrorKind::InvalidBytecode,
                                    format!("function chunk {chunk_index} out of range"),
                                    inst_pc
                                );
                            };
                            let name = chunk_names
                                .get(&chunk_index)
                                .cloned()
                                .unwrap_or_else(|| format!("fn[{chunk_index}]"));
                            if argc != target.arity as usize {
                                fail!(
                                    RuntimeErrorKind::WrongArity,
                                    format!(
                                        "`{name}` expects {} argument(s), got {argc}",
                                        target.arity
                                    ),
                                    inst_pc
                                );
                            }
                            if frames.len() >= self.options.max_frames {
                                fail!(
                                    RuntimeErrorKind::StackOverflow,
                                    format!(
                                        "call depth exceeded {} frames",
                                        self.options.max_frames
                                    ),
                                    inst_pc
                                );
                            }
                            if (target.locals as usize) < argc {
                                fail!(
                                    RuntimeErrorKind::InvalidBytecode,
                                    format!(
                                        "`{name}` declares {} slots for {argc} parameter(s)",
                                        target.locals
                                    ),
                                    inst_pc
                                );
                            }
                            let mut locals = vec![Value::Empty; target.locals as usize];
                            for (slot, value) in
                                stack[callee_index + 1..].iter().cloned().enumerate()
                            {
                                locals[slot] = value;
                            }
                            stack.truncate(callee_index);
                            frames.push(Frame {
                                chunk: Some(chunk_index),
                                name,
                                pc: 0,
                                locals,
                                stack_base: callee_index,
                            });
                        }
                        Value::Builtin(index) => {
                            let builtin = &BUILTINS[index as usize];
                            if !builtin.arity.accepts(argc) {
                                fail!(
                                    RuntimeErrorKind::WrongArity,
                                    format!(
                                        "`{}` expects {} argument(s), got {argc}",
                                        builtin.name, builtin.arity
                                    ),
                                    inst_pc
                                );
                            }
                            let args = stack[callee_index + 1..].to_vec();
                            let result = match &builtin.imp {
                                BuiltinImpl::Print => {
                                    self.write_out(args[0].to_string());
                                    Ok(Value::Empty)
                                }
                                BuiltinImpl::Pure(f) => f(&args),
                            };
                            stack.truncate(callee_index);
                            match result {
                                Ok(value) => stack.push(value),
                                Err((kind, message)) => fail!(kind, message, inst_pc),
                            }
                        }
                        other => fail!(
                            RuntimeErrorKind::TypeMismatch,
                            format!("a {} value is not callable", other.type_name()),
                            inst_pc
                        ),
                    }
                }
                Op::Return => {
                    let result = stack.pop().unwrap_or(Value::Empty);
                    let finished = frames.pop().expect("at least the main frame");
                    if frames.is_empty() {
                        return Ok(result);
                    }
                    stack.truncate(finished.stack_base);
                    stack.push(result);
                }
                Op::Pop => {
                    pop(&mut stack, module, &frames, inst_pc)?;
                }
                Op::Dup => match stack.last().cloned() {
                    Some(top) => stack.push(top),
                    None => fail!(
                        RuntimeErrorKind::InvalidBytecode,
                        "stack underflow in DUP".to_owned(),
                        inst_pc
                    ),
                },
                Op::Swap => {
                    let len = stack.len();
                    if len < 2 {
                        fail!(
                            RuntimeErrorKind::InvalidBytecode,
                            "stack underflow in SWAP".to_owned(),
                            inst_pc
                        );
                    }
                    stack.swap(len - 1, len - 2);
                }
                Op::Print => {
                    let value = pop(&mut stack, module, &frames, inst_pc)?;
                    self.write_out(value.to_string());
                }
                Op::Halt => {
                    return Ok(stack.pop().unwrap_or(Value::Empty));
                }
                Op::Nop => {}
            }
        }
    }

    fn write_out(&mut self, line: String) {
        if self.options.capture_output {
            self.output.push(line);
        } else {
            println!("{line}");
        }
    }
}

fn chunk_of<'m>(module: &'m Module, index: Option<u16>) -> &'m Chunk {
    match index {
        None => &module.main,
        Some(i) => &module.functions[i as usize],
    }
}

fn const_value(constant: BcConst, strings: &[Rc<str>]) -> Value {
    match constant {
        BcConst::Empty => Value::Empty,
        BcConst::Int(i) => Value::Int(i),
        BcConst::Float(f) => Value::Float(f),
        BcConst::StrRef(s) => strings
            .get(s as usize)
            .map(|text| Value::Str(Rc::clone(text)))
            .unwrap_or(Value::Empty),
        BcConst::FuncRef(i) => Value::Function(i),
    }
}

fn global_name(module: &Module, const_index: u16) -> Option<&str> {
    match module.constants.get(const_index as usize)? {
        BcConst::StrRef(s) => module.string(*s),
        _ => None,
    }
}

/// Read the operand for `op`, advancing `pc` past it. The returned raw
/// value is reinterpreted per opcode (u8 count, u16 index, i16 offset).
fn decode_operand(chunk: &Chunk, pc: &mut usize, op: Op) -> Result<u32, RuntimeError> {
    let width = op.operand().width();
    if *pc + width > chunk.code.len() {
        return Err(truncated(*pc));
    }
    let raw = match width {
        0 => 0,
        1 => {
            let value = chunk.code[*pc] as u32;
            *pc += 1;
            value
        }
        _ => {
            let value = u16::from_le_bytes([chunk.code[*pc], chunk.code[*pc + 1]]) as u32;
            *pc += 2;
            value
        }
    };
    Ok(raw)
}

fn truncated(pc: usize) -> RuntimeError {
    RuntimeError {
        kind: RuntimeErrorKind::InvalidBytecode,
        message: format!("code ends inside the instruction at pc {pc}"),
        line: 0,
        column: 0,
        call_chain: Vec::new(),
    }
}

/// Resolve a jump offset relative to the instruction after the jump.
fn branch_target(chunk: &Chunk, pc: usize, offset: i16) -> Option<usize> {
    let target = pc as i64 + offset as i64;
    if target < 0 || target > chunk.code.len() as i64 {
        return None;
    }
    Some(target as usize)
}

fn frames_snapshot(frames: &[Frame]) -> Vec<String> {
    frames.iter().rev().map(|f| f.name.clone()).collect()
}

fn pop(
    stack: &mut Vec<Value>,
    module: &Module,
    frames: &[Frame],
    inst_pc: usize,
) -> Result<Value, RuntimeError> {
    stack.pop().ok_or_else(|| {
        error_at(
            module,
            frames,
            RuntimeErrorKind::InvalidBytecode,
            "stack underflow".to_owned(),
            inst_pc,
        )
    })
}

fn error_at(
    module: &Module,
    frames: &[Frame],
    kind: RuntimeErrorKind,
    message: String,
    inst_pc: usize,
) -> RuntimeError {
    let (line, column) = frames
        .last()
        .and_then(|frame| chunk_of(module, frame.chunk).lines.lookup(inst_pc as u32))
        .unwrap_or((0, 0));
    RuntimeError {
        kind,
        message,
        line,
        column,
        call_chain: frames_snapshot(frames),
    }
}
