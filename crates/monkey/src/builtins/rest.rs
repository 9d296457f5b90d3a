//! Implementation of the `rest` builtin.

use crate::object::Object;

/// Returns a new array containing every element but the first, or `Null` if
/// the input array is empty.
pub fn call(args: &[Object]) -> Object {
    if args.len() != 1 {
        return super::wrong_arg_count(args.len(), 1);
    }
    match &args[0] {
        Object::Array(items) => {
            if items.is_empty() {
                Object::Null
            } else {
                Object::array(items[1..].to_vec())
            }
        }
        other => super::unsupported_arg_type("rest", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rest_drops_first_element() {
        let result = call(&[Object::array(vec![Object::Int(1), Object::Int(2), Object::Int(3)])]);
        assert_eq!(result, Object::array(vec![Object::Int(2), Object::Int(3)]));
    }

    #[test]
    fn rest_of_empty_array_is_null() {
        assert_eq!(call(&[Object::array(vec![])]), Object::Null);
    }
}
