//! The built-in function registry.
//!
//! A fixed, read-only table initialised at compile time. Each entry
//! declares its arity, checked at call time before the implementation
//! runs. `print` and `say` are the same operation under two names; both
//! write to the VM's output sink and return `Empty`, so they are marked
//! rather than implemented as pure functions.

use crate::error::RuntimeErrorKind;
use crate::value::{compare_order, OpError, Value};

/// Declared argument count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arity {
    Exact(u8),
    AtLeast(u8),
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exact(n) => count == n as usize,
            Arity::AtLeast(n) => count >= n as usize,
        }
    }
}

impl std::fmt::Display for Arity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "{n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
        }
    }
}

/// How a built-in runs.
pub enum BuiltinImpl {
    /// Writes its argument to the output sink; handled by the VM loop.
    Print,
    /// A pure function over its arguments.
    Pure(fn(&[Value]) -> Result<Value, OpError>),
}

pub struct Builtin {
    pub name: &'static str,
    pub arity: Arity,
    pub imp: BuiltinImpl,
}

/// The registry. Index order is the `Value::Builtin` payload.
pub static BUILTINS: &[Builtin] = &[
    Builtin {
        name: "print",
        arity: Arity::Exact(1),
        imp: BuiltinImpl::Print,
    },
    Builtin {
        name: "say",
        arity: Arity::Exact(1),
        imp: BuiltinImpl::Print,
    },
    Builtin {
        name: "type",
        arity: Arity::Exact(1),
        imp: BuiltinImpl::Pure(builtin_type),
    },
    Builtin {
        name: "len",
        arity: Arity::Exact(1),
        imp: BuiltinImpl::Pure(builtin_len),
    },
    Builtin {
        name: "str",
        arity: Arity::Exact(1),
        imp: BuiltinImpl::Pure(builtin_str),
    },
    Builtin {
        name: "int",
        arity: Arity::Exact(1),
        imp: BuiltinImpl::Pure(builtin_int),
    },
    Builtin {
        name: "float",
        arity: Arity::Exact(1),
        imp: BuiltinImpl::Pure(builtin_float),
    },
    Builtin {
        name: "bool",
        arity: Arity::Exact(1),
        imp: BuiltinImpl::Pure(builtin_bool),
    },
    Builtin {
        name: "abs",
        arity: Arity::Exact(1),
        imp: BuiltinImpl::Pure(builtin_abs),
    },
    Builtin {
        name: "min",
        arity: Arity::AtLeast(1),
        imp: BuiltinImpl::Pure(builtin_min),
    },
    Builtin {
        name: "max",
        arity: Arity::AtLeast(1),
        imp: BuiltinImpl::Pure(builtin_max),
    },
    Builtin {
        name: "is_empty",
        arity: Arity::Exact(1),
        imp: BuiltinImpl::Pure(builtin_is_empty),
    },
    Builtin {
        name: "round",
        arity: Arity::Exact(1),
        imp: BuiltinImpl::Pure(builtin_round),
    },
];

/// Registry index for a name.
pub fn lookup(name: &str) -> Option<u8> {
    BUILTINS
        .iter()
        .position(|b| b.name == name)
        .map(|i| i as u8)
}

fn type_error(message: String) -> OpError {
    (RuntimeErrorKind::TypeMismatch, message)
}

fn builtin_type(args: &[Value]) -> Result<Value, OpError> {
    Ok(Value::Str(args[0].type_name().into()))
}

fn builtin_len(args: &[Value]) -> Result<Value, OpError> {
    match &args[0] {
        Value::Str(s) | Value::Url(s) => Ok(Value::Int(s.chars().count() as i64)),
        other => Err(type_error(format!(
            "len expects a string, got {}",
            other.type_name()
        ))),
    }
}

fn builtin_str(args: &[Value]) -> Result<Value, OpError> {
    Ok(Value::Str(args[0].to_string().into()))
}

fn builtin_int(args: &[Value]) -> Result<Value, OpError> {
    match &args[0] {
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Float(f) => Ok(Value::Int(*f as i64)),
        Value::Bool(b) => Ok(Value::Int(*b as i64)),
        Value::Str(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| type_error(format!("cannot convert {s:?} to int"))),
        other => Err(type_error(format!(
            "cannot convert {} to int",
            other.type_name()
        ))),
    }
}

fn builtin_float(args: &[Value]) -> Result<Value, OpError> {
    match &args[0] {
        Value::Int(i) => Ok(Value::Float(*i as f64)),
        Value::Float(f) => Ok(Value::Float(*f)),
        Value::Bool(b) => Ok(Value::Float(*b as i64 as f64)),
        Value::Str(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| type_error(format!("cannot convert {s:?} to float"))),
        other => Err(type_error(format!(
            "cannot convert {} to float",
            other.type_name()
        ))),
    }
}

fn builtin_bool(args: &[Value]) -> Result<Value, OpError> {
    Ok(Value::Bool(args[0].is_truthy()))
}

fn builtin_abs(args: &[Value]) -> Result<Value, OpError> {
    match &args[0] {
        Value::Int(i) => Ok(Value::Int(i.wrapping_abs())),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        other => Err(type_error(format!(
            "abs expects a number, got {}",
            other.type_name()
        ))),
    }
}

fn builtin_min(args: &[Value]) -> Result<Value, OpError> {
    fold_extremum(args, std::cmp::Ordering::Less)
}

fn builtin_max(args: &[Value]) -> Result<Value, OpError> {
    fold_extremum(args, std::cmp::Ordering::Greater)
}

fn fold_extremum(args: &[Value], keep: std::cmp::Ordering) -> Result<Value, OpError> {
    let mut best = args[0].clone();
    for candidate in &args[1..] {
        if compare_order(candidate, &best)? == keep {
            best = candidate.clone();
        }
    }
    Ok(best)
}

fn builtin_is_empty(args: &[Value]) -> Result<Value, OpError> {
    let empty = match &args[0] {
        Value::Empty => true,
        Value::Str(s) | Value::Url(s) => s.is_empty(),
        _ => false,
    };
    Ok(Value::Bool(empty))
}

fn builtin_round(args: &[Value]) -> Result<Value, OpError> {
    match &args[0] {
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Float(f) => Ok(Value::Int(f.round() as i64)),
        other => Err(type_error(format!(
            "round expects a number, got {}",
            other.type_name()
        ))),
    }
}
