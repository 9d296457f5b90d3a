//! Implementation of the `len` builtin.

use crate::object::Object;

/// Returns the number of bytes in a string or elements in an array.
pub fn call(args: &[Object]) -> Object {
    if args.len() != 1 {
        return super::wrong_arg_count(args.len(), 1);
    }
    match &args[0] {
        Object::Str(s) => Object::Int(s.len() as i64),
        Object::Array(items) => Object::Int(items.len() as i64),
        other => super::unsupported_arg_type("len", other),
    }
}
