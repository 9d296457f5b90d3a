//! Lexer, parser, tree-walking evaluator, and bytecode compiler/VM for the
//! Monkey language, plus a small set of builtin functions shared by both
//! execution engines.
//!
//! The embedding surface is the handful of free functions at the crate root:
//! [`parse`] turns source into an AST, [`eval`] walks it directly, and
//! [`run`] compiles it to bytecode and executes that on the VM. Both
//! execution paths produce the same [`Object`] values for the same program.

pub mod ast;
pub mod builtins;
pub mod code;
pub mod compiler;
pub mod environment;
pub mod evaluator;
pub mod lexer;
pub mod object;
pub mod parser;
pub mod symbol_table;
pub mod token;
pub mod vm;

use std::fmt;

use ast::Program;
use compiler::{CompileError, Compiler};
use environment::{EnvRef, Environment};
use object::Object;
use parser::Parser;
use vm::{Vm, VmError};

/// Everything that can go wrong turning source into a value, across either
/// engine.
#[derive(Debug, PartialEq, Eq)]
pub enum MonkeyError {
    Parse(Vec<String>),
    Compile(CompileError),
    Vm(VmError),
}

impl fmt::Display for MonkeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonkeyError::Parse(errors) => {
                writeln!(f, "parser errors:")?;
                for err in errors {
                    writeln!(f, "\t{err}")?;
                }
                Ok(())
            }
            MonkeyError::Compile(err) => write!(f, "compile error: {err}"),
            MonkeyError::Vm(err) => write!(f, "vm error: {err}"),
        }
    }
}

impl std::error::Error for MonkeyError {}

impl From<CompileError> for MonkeyError {
    fn from(err: CompileError) -> Self {
        MonkeyError::Compile(err)
    }
}

impl From<VmError> for MonkeyError {
    fn from(err: VmError) -> Self {
        MonkeyError::Vm(err)
    }
}

/// Parses `source` into a [`Program`], collecting every diagnostic the
/// parser raised rather than stopping at the first one.
pub fn parse(source: &str) -> Result<Program, MonkeyError> {
    let mut parser = Parser::from_source(source);
    let program = parser.parse_program();
    if parser.errors().is_empty() {
        Ok(program)
    } else {
        Err(MonkeyError::Parse(parser.errors().to_vec()))
    }
}

/// Parses and tree-walk-evaluates `source` against a fresh global
/// environment. `print` receives output from the `puts` builtin.
pub fn eval(source: &str, print: &mut dyn FnMut(&str)) -> Result<Object, MonkeyError> {
    let env = Environment::new();
    eval_with_env(source, &env, print)
}

/// Like [`eval`], but against a caller-supplied environment — so a REPL can
/// keep bindings alive across lines.
pub fn eval_with_env(source: &str, env: &EnvRef, print: &mut dyn FnMut(&str)) -> Result<Object, MonkeyError> {
    let program = parse(source)?;
    Ok(evaluator::eval_program(&program, env, print))
}

/// Parses, compiles, and runs `source` on the bytecode VM against a fresh
/// set of globals.
pub fn run(source: &str, print: &mut dyn FnMut(&str)) -> Result<Object, MonkeyError> {
    let (result, _globals) = run_with_globals(source, Vec::new(), print)?;
    Ok(result)
}

/// Like [`run`], but threads a globals store through so a REPL can keep
/// `let` bindings alive across lines; returns the updated globals alongside
/// the result.
pub fn run_with_globals(
    source: &str,
    globals: Vec<Object>,
    print: &mut dyn FnMut(&str),
) -> Result<(Object, Vec<Object>), MonkeyError> {
    let program = parse(source)?;
    let bytecode = Compiler::new().compile_program(&program)?;
    let mut machine = Vm::with_globals(bytecode, globals);
    machine.run(print)?;
    let result = machine.last_popped_stack_elem();
    Ok((result, machine.take_globals()))
}
