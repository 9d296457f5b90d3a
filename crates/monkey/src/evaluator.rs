//! Tree-walking evaluator: walks the AST directly, producing [`Object`]s.
//!
//! Errors are *values* (`Object::Error`), not `Result::Err` — any expression
//! that observes an error operand returns it unchanged, so error handling is
//! ordinary match arms rather than `?` propagation. This mirrors spec
//! section 4.3 exactly and is the one place this crate's error handling
//! deliberately diverges from the `Result`-based style used everywhere else
//! (see `DESIGN.md`).

use std::rc::Rc;

use indexmap::IndexMap;

use crate::ast::{Block, Expression, InfixOp, PrefixOp, Program, Statement};
use crate::builtins;
use crate::environment::{EnvRef, Environment};
use crate::object::{Builtin, FunctionData, Object};

/// Evaluates a [`Program`] against `env`, returning its final value.
///
/// `print` receives output from the `puts` builtin.
pub fn eval_program(program: &Program, env: &EnvRef, print: &mut dyn FnMut(&str)) -> Object {
    let mut result = Object::Null;
    for stmt in &program.statements {
        result = eval_statement(stmt, env, print);
        match result {
            // Program unwraps a top-level Return to its inner value.
            Object::Return(value) => return *value,
            Object::Error(_) => return result,
            _ => {}
        }
    }
    result
}

/// Evaluates a block *without* unwrapping `Return`/`Error`, so the marker
/// keeps propagating up through nested blocks (spec section 4.3).
fn eval_block(block: &Block, env: &EnvRef, print: &mut dyn FnMut(&str)) -> Object {
    let mut result = Object::Null;
    for stmt in &block.statements {
        result = eval_statement(stmt, env, print);
        if matches!(result, Object::Return(_) | Object::Error(_)) {
            return result;
        }
    }
    result
}

fn eval_statement(stmt: &Statement, env: &EnvRef, print: &mut dyn FnMut(&str)) -> Object {
    match stmt {
        Statement::Expr { expr } => eval_expression(expr, env, print),
        Statement::Return { value } => {
            let evaluated = eval_expression(value, env, print);
            if evaluated.is_error() {
                evaluated
            } else {
                Object::Return(Box::new(evaluated))
            }
        }
        Statement::Let { name, value } => {
            let evaluated = eval_expression(value, env, print);
            if evaluated.is_error() {
                return evaluated;
            }
            env.borrow_mut().set(name.name.clone(), evaluated);
            Object::Null
        }
    }
}

fn eval_expression(expr: &Expression, env: &EnvRef, print: &mut dyn FnMut(&str)) -> Object {
    match expr {
        Expression::IntLiteral(v) => Object::Int(*v),
        Expression::BoolLiteral(v) => Object::Bool(*v),
        Expression::StringLiteral(v) => Object::str(v.clone()),
        Expression::Identifier(ident) => eval_identifier(&ident.name, env),
        Expression::Prefix { op, rhs } => {
            let right = eval_expression(rhs, env, print);
            if right.is_error() {
                return right;
            }
            eval_prefix_expr(*op, right)
        }
        Expression::Infix { op, lhs, rhs } => {
            let left = eval_expression(lhs, env, print);
            if left.is_error() {
                return left;
            }
            let right = eval_expression(rhs, env, print);
            if right.is_error() {
                return right;
            }
            eval_infix_expr(*op, left, right)
        }
        Expression::If {
            cond,
            then_block,
            else_block,
        } => eval_if_expr(cond, then_block, else_block.as_ref(), env, print),
        Expression::FunctionLiteral { params, body } => Object::Function(Rc::new(FunctionData {
            params: params.clone(),
            body: body.clone(),
            env: env.clone(),
        })),
        Expression::Call { callee, args } => eval_call_expr(callee, args, env, print),
        Expression::ArrayLiteral(elements) => {
            let values = match eval_expressions(elements, env, print) {
                Ok(values) => values,
                Err(err) => return err,
            };
            Object::array(values)
        }
        Expression::DictLiteral(pairs) => eval_dict_literal(pairs, env, print),
        Expression::Index { collection, index } => {
            let collection_val = eval_expression(collection, env, print);
            if collection_val.is_error() {
                return collection_val;
            }
            let index_val = eval_expression(index, env, print);
            if index_val.is_error() {
                return index_val;
            }
            eval_index_expr(collection_val, index_val)
        }
    }
}

fn eval_identifier(name: &str, env: &EnvRef) -> Object {
    if let Some(value) = env.borrow().get(name) {
        return value;
    }
    if let Some(builtin) = Builtin::lookup(name) {
        return Object::Builtin(builtin);
    }
    Object::Error(format!("identifier not found: {name}"))
}

fn eval_prefix_expr(op: PrefixOp, right: Object) -> Object {
    match op {
        PrefixOp::Not => Object::Bool(!right.is_truthy()),
        PrefixOp::Minus => match right {
            Object::Int(v) => Object::Int(-v),
            other => Object::Error(format!("unknown operator: -{}", other.type_name())),
        },
    }
}

fn eval_infix_expr(op: InfixOp, left: Object, right: Object) -> Object {
    match (&left, &right) {
        (Object::Int(l), Object::Int(r)) => eval_int_infix(op, *l, *r),
        (Object::Str(l), Object::Str(r)) => eval_str_infix(op, l, r),
        (Object::Bool(l), Object::Bool(r)) => eval_bool_infix(op, *l, *r),
        _ if left.type_name() != right.type_name() => Object::Error(format!(
            "type mismatch: {} {} {}",
            left.type_name(),
            op,
            right.type_name()
        )),
        _ => Object::Error(format!("unknown operator: {} {} {}", left.type_name(), op, right.type_name())),
    }
}

fn eval_int_infix(op: InfixOp, l: i64, r: i64) -> Object {
    match op {
        InfixOp::Add => Object::Int(l.wrapping_add(r)),
        InfixOp::Sub => Object::Int(l.wrapping_sub(r)),
        InfixOp::Mul => Object::Int(l.wrapping_mul(r)),
        InfixOp::Div => {
            if r == 0 {
                Object::Error("division by zero".to_owned())
            } else {
                Object::Int(l.wrapping_div(r))
            }
        }
        InfixOp::Lt => Object::Bool(l < r),
        InfixOp::Le => Object::Bool(l <= r),
        InfixOp::Gt => Object::Bool(l > r),
        InfixOp::Ge => Object::Bool(l >= r),
        InfixOp::Eq => Object::Bool(l == r),
        InfixOp::NotEq => Object::Bool(l != r),
    }
}

fn eval_str_infix(op: InfixOp, l: &str, r: &str) -> Object {
    match op {
        InfixOp::Add => Object::str(format!("{l}{r}")),
        _ => Object::Error(format!("unknown operator: STRING {op} STRING")),
    }
}

fn eval_bool_infix(op: InfixOp, l: bool, r: bool) -> Object {
    match op {
        InfixOp::Eq => Object::Bool(l == r),
        InfixOp::NotEq => Object::Bool(l != r),
        _ => Object::Error(format!("unknown operator: BOOLEAN {op} BOOLEAN")),
    }
}

fn eval_if_expr(
    cond: &Expression,
    then_block: &Block,
    else_block: Option<&Block>,
    env: &EnvRef,
    print: &mut dyn FnMut(&str),
) -> Object {
    let cond_val = eval_expression(cond, env, print);
    if cond_val.is_error() {
        return cond_val;
    }
    if cond_val.is_truthy() {
        eval_block(then_block, env, print)
    } else if let Some(alt) = else_block {
        eval_block(alt, env, print)
    } else {
        Object::Null
    }
}

fn eval_expressions(exprs: &[Expression], env: &EnvRef, print: &mut dyn FnMut(&str)) -> Result<Vec<Object>, Object> {
    let mut values = Vec::with_capacity(exprs.len());
    for expr in exprs {
        let value = eval_expression(expr, env, print);
        if value.is_error() {
            return Err(value);
        }
        values.push(value);
    }
    Ok(values)
}

fn eval_dict_literal(pairs: &[(Expression, Expression)], env: &EnvRef, print: &mut dyn FnMut(&str)) -> Object {
    let mut map = IndexMap::new();
    for (key_expr, value_expr) in pairs {
        let key = eval_expression(key_expr, env, print);
        if key.is_error() {
            return key;
        }
        let value = eval_expression(value_expr, env, print);
        if value.is_error() {
            return value;
        }
        let Some(hash_key) = key.hash_key() else {
            return Object::Error(format!("unusable as hash key: {}", key.type_name()));
        };
        map.insert(hash_key, (key, value));
    }
    Object::Dict(Rc::new(map))
}

fn eval_call_expr(callee: &Expression, args: &[Expression], env: &EnvRef, print: &mut dyn FnMut(&str)) -> Object {
    let function = eval_expression(callee, env, print);
    if function.is_error() {
        return function;
    }
    let arg_values = match eval_expressions(args, env, print) {
        Ok(values) => values,
        Err(err) => return err,
    };
    apply_function(function, &arg_values, print)
}

fn apply_function(function: Object, args: &[Object], print: &mut dyn FnMut(&str)) -> Object {
    match function {
        Object::Function(func) => {
            if args.len() != func.params.len() {
                return Object::Error("wrong number of arguments".to_owned());
            }
            let call_env = Environment::enclosed(func.env.clone());
            for (param, arg) in func.params.iter().zip(args) {
                call_env.borrow_mut().set(param.name.clone(), arg.clone());
            }
            match eval_block(&func.body, &call_env, print) {
                Object::Return(value) => *value,
                other => other,
            }
        }
        Object::Builtin(builtin) => builtins::call(builtin, args, print),
        other => Object::Error(format!("not a function: {}", other.type_name())),
    }
}

fn eval_index_expr(collection: Object, index: Object) -> Object {
    match (&collection, &index) {
        (Object::Array(items), Object::Int(i)) => {
            if *i < 0 || *i as usize >= items.len() {
                Object::Null
            } else {
                items[*i as usize].clone()
            }
        }
        (Object::Dict(map), _) => match index.hash_key() {
            Some(key) => map.get(&key).map(|(_, v)| v.clone()).unwrap_or(Object::Null),
            None => Object::Error(format!("unusable as hash key: {}", index.type_name())),
        },
        _ => Object::Error(format!("index operator not supported: {}", collection.type_name())),
    }
}
