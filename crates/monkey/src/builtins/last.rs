//! Implementation of the `last` builtin.

use crate::object::Object;

/// Returns the last element of an array, or `Null` if it is empty.
pub fn call(args: &[Object]) -> Object {
    if args.len() != 1 {
        return super::wrong_arg_count(args.len(), 1);
    }
    match &args[0] {
        Object::Array(items) => items.last().cloned().unwrap_or(Object::Null),
        other => super::unsupported_arg_type("last", other),
    }
}
