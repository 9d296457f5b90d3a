//! Implementation of the `first` builtin.

use crate::object::Object;

/// Returns the first element of an array, or `Null` if it is empty.
pub fn call(args: &[Object]) -> Object {
    if args.len() != 1 {
        return super::wrong_arg_count(args.len(), 1);
    }
    match &args[0] {
        Object::Array(items) => items.first().cloned().unwrap_or(Object::Null),
        other => super::unsupported_arg_type("first", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_of_nonempty_array() {
        assert_eq!(call(&[Object::array(vec![Object::Int(1), Object::Int(2)])]), Object::Int(1));
    }

    #[test]
    fn first_of_empty_array_is_null() {
        assert_eq!(call(&[Object::array(vec![])]), Object::Null);
    }
}
