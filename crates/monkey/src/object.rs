//! The runtime value type shared by the evaluator and the VM.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::ast::{Block, Expression, Identifier};
use crate::code::Instructions;
use crate::environment::EnvRef;

/// A function defined by a `fn` literal, evaluated and ready to be called.
///
/// Held behind an `Rc` so that cloning an `Object::Function` (e.g. into an
/// array, or when passed as a call argument) is a pointer copy, and so that
/// identity comparison (spec section 3: "Function ... equality is by
/// identity") is just `Rc::ptr_eq`.
#[derive(Debug)]
pub struct FunctionData {
    pub params: Vec<Identifier>,
    pub body: Block,
    pub env: EnvRef,
}

/// A function already reduced to bytecode, stored as a constant and
/// referenced by the VM's `Closure` opcode.
#[derive(Debug)]
pub struct CompiledFunctionData {
    pub instructions: Instructions,
    pub num_locals: usize,
    pub num_params: usize,
}

/// Builtins are looked up by name at compile time and by dense index at
/// runtime (the `GetBuiltin u8` opcode), so the full set doubles as the
/// dispatch table the VM indexes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Builtin {
    Len,
    First,
    Last,
    Rest,
    Push,
    Puts,
}

impl Builtin {
    pub const ALL: [Builtin; 6] = [
        Builtin::Len,
        Builtin::First,
        Builtin::Last,
        Builtin::Rest,
        Builtin::Push,
        Builtin::Puts,
    ];

    /// Index into [`Builtin::ALL`], the stable ordering `GetBuiltin` operands
    /// index into.
    pub fn index(self) -> u8 {
        Self::ALL.iter().position(|b| *b == self).expect("self is in ALL") as u8
    }

    pub fn from_index(index: u8) -> Option<Builtin> {
        Self::ALL.get(index as usize).copied()
    }

    pub fn lookup(name: &str) -> Option<Builtin> {
        Self::ALL.into_iter().find(|b| b.to_string() == name)
    }
}

/// A hashable projection of [`Object`], used as `Dict` keys. Only
/// `Int`/`Bool`/`Str` are hashable per spec section 3.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HashKey {
    Int(i64),
    Bool(bool),
    Str(String),
}

/// The closed set of runtime values produced by both the evaluator and the
/// VM.
#[derive(Debug, Clone)]
pub enum Object {
    Null,
    Int(i64),
    Bool(bool),
    Str(Rc<str>),
    /// Marks a value in flight from a `return` statement; unwrapped by the
    /// nearest enclosing function call or the top-level program.
    Return(Box<Object>),
    Error(String),
    Function(Rc<FunctionData>),
    Builtin(Builtin),
    Array(Rc<Vec<Object>>),
    Dict(Rc<IndexMap<HashKey, (Object, Object)>>),
    /// An unevaluated AST fragment, per spec section 3's closed object set.
    Quote(Rc<Expression>),
    CompiledFunc(Rc<CompiledFunctionData>),
}

impl Object {
    pub fn str(s: impl Into<String>) -> Object {
        Object::Str(Rc::from(s.into()))
    }

    pub fn array(items: Vec<Object>) -> Object {
        Object::Array(Rc::new(items))
    }

    /// Truthiness per spec section 4.3: only `Null` and `Bool(false)` are
    /// falsy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Object::Null | Object::Bool(false))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Null => "NULL",
            Object::Int(_) => "INTEGER",
            Object::Bool(_) => "BOOLEAN",
            Object::Str(_) => "STRING",
            Object::Return(_) => "RETURN_VALUE",
            Object::Error(_) => "ERROR",
            Object::Function(_) => "FUNCTION",
            Object::Builtin(_) => "BUILTIN",
            Object::Array(_) => "ARRAY",
            Object::Dict(_) => "HASH",
            Object::Quote(_) => "QUOTE",
            Object::CompiledFunc(_) => "COMPILED_FUNCTION_OBJ",
        }
    }

    /// Projects this object to a [`HashKey`] if it is hashable, for use as a
    /// `Dict` key or dict-literal key.
    pub fn hash_key(&self) -> Option<HashKey> {
        match self {
            Object::Int(v) => Some(HashKey::Int(*v)),
            Object::Bool(v) => Some(HashKey::Bool(*v)),
            Object::Str(v) => Some(HashKey::Str(v.to_string())),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Object::Error(_))
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Object::Null, Object::Null) => true,
            (Object::Int(a), Object::Int(b)) => a == b,
            (Object::Bool(a), Object::Bool(b)) => a == b,
            (Object::Str(a), Object::Str(b)) => a == b,
            (Object::Error(a), Object::Error(b)) => a == b,
            (Object::Array(a), Object::Array(b)) => a == b,
            (Object::Dict(a), Object::Dict(b)) => a == b,
            (Object::Return(a), Object::Return(b)) => a == b,
            // Functions and compiled functions compare by identity, not structure.
            (Object::Function(a), Object::Function(b)) => Rc::ptr_eq(a, b),
            (Object::CompiledFunc(a), Object::CompiledFunc(b)) => Rc::ptr_eq(a, b),
            (Object::Builtin(a), Object::Builtin(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Null => write!(f, "null"),
            Object::Int(v) => write!(f, "{v}"),
            Object::Bool(v) => write!(f, "{v}"),
            Object::Str(v) => write!(f, "{v}"),
            Object::Return(v) => write!(f, "{v}"),
            Object::Error(msg) => write!(f, "ERROR: {msg}"),
            Object::Function(func) => {
                write!(f, "fn(")?;
                for (i, p) in func.params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ") {{\n{}\n}}", func.body)
            }
            Object::Builtin(b) => write!(f, "builtin function: {b}"),
            Object::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Object::Dict(pairs) => {
                write!(f, "{{")?;
                for (i, (key, value)) in pairs.values().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                write!(f, "}}")
            }
            Object::Quote(expr) => write!(f, "QUOTE({expr})"),
            Object::CompiledFunc(func) => write!(f, "CompiledFunction[{:p}]", Rc::as_ptr(func)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inspect_matches_spec_examples() {
        assert_eq!(Object::Int(5).to_string(), "5");
        assert_eq!(Object::Bool(true).to_string(), "true");
        assert_eq!(Object::Null.to_string(), "null");
    }

    #[test]
    fn truthiness_rules() {
        assert!(!Object::Null.is_truthy());
        assert!(!Object::Bool(false).is_truthy());
        assert!(Object::Bool(true).is_truthy());
        assert!(Object::Int(0).is_truthy());
        assert!(Object::str("").is_truthy());
    }

    #[test]
    fn builtin_index_round_trips() {
        for b in Builtin::ALL {
            assert_eq!(Builtin::from_index(b.index()), Some(b));
        }
    }

    #[test]
    fn array_and_dict_equality_is_structural() {
        assert_eq!(Object::array(vec![Object::Int(1)]), Object::array(vec![Object::Int(1)]));
        assert_ne!(Object::array(vec![Object::Int(1)]), Object::array(vec![Object::Int(2)]));
    }
}
