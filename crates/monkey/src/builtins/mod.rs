//! Built-in functions callable from Monkey source, shared by the evaluator
//! and the VM.
//!
//! Each builtin gets its own submodule, mirroring how the teacher splits
//! builtin implementations one-per-file rather than as one large match.

mod first;
mod last;
mod len;
mod push;
mod puts;
mod rest;

use crate::object::{Builtin, Object};

/// Dispatches a call to `builtin` with the already-evaluated `args`.
///
/// `print` receives anything `puts` writes, so that embedders (and tests)
/// can capture output instead of it going to stdout unconditionally.
pub fn call(builtin: Builtin, args: &[Object], print: &mut dyn FnMut(&str)) -> Object {
    match builtin {
        Builtin::Len => len::call(args),
        Builtin::First => first::call(args),
        Builtin::Last => last::call(args),
        Builtin::Rest => rest::call(args),
        Builtin::Push => push::call(args),
        Builtin::Puts => puts::call(args, print),
    }
}

/// Builds the standard `Error("wrong number of arguments. got=N, want=M")`
/// object spec section 4.3 mandates for builtin arity mismatches.
pub(crate) fn wrong_arg_count(got: usize, want: usize) -> Object {
    Object::Error(format!("wrong number of arguments. got={got}, want={want}"))
}

pub(crate) fn unsupported_arg_type(name: &str, arg: &Object) -> Object {
    Object::Error(format!("argument to `{name}` not supported, got {}", arg.type_name()))
}
