//! Stack-based bytecode interpreter: fetch-decode-execute over the
//! instruction stream a [`Compiler`](crate::compiler::Compiler) produced.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::builtins;
use crate::code::{read_u16, Opcode};
use crate::compiler::Bytecode;
use crate::object::{Builtin, CompiledFunctionData, Object};

const STACK_SIZE: usize = 2048;
const GLOBALS_SIZE: usize = 65536;
const MAX_FRAMES: usize = 1024;

#[derive(Debug, PartialEq, Eq)]
pub enum VmError {
    StackOverflow,
    FrameOverflow,
    UnsupportedBinaryTypes(&'static str, &'static str),
    DivideByZero,
    NotCallable(&'static str),
    WrongArgumentCount { want: usize, got: usize },
    UnknownOperator(&'static str),
    IndexError(&'static str),
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmError::StackOverflow => write!(f, "stack overflow"),
            VmError::FrameOverflow => write!(f, "call stack overflow"),
            VmError::UnsupportedBinaryTypes(a, b) => write!(f, "unsupported types for binary operation: {a} {b}"),
            VmError::DivideByZero => write!(f, "division by zero"),
            VmError::NotCallable(type_name) => write!(f, "calling non-function and non-built-in: {type_name}"),
            VmError::WrongArgumentCount { want, got } => {
                write!(f, "wrong number of arguments: want={want}, got={got}")
            }
            VmError::UnknownOperator(op) => write!(f, "unknown operator: {op}"),
            VmError::IndexError(type_name) => write!(f, "index operator not supported: {type_name}"),
        }
    }
}

impl std::error::Error for VmError {}

pub type VmResult<T> = Result<T, VmError>;

/// One function activation: the compiled function being executed, its
/// instruction pointer, and where its locals begin on the shared stack.
struct Frame {
    func: Rc<CompiledFunctionData>,
    ip: usize,
    base_pointer: usize,
}

impl Frame {
    fn instructions(&self) -> &[u8] {
        self.func.instructions.as_slice()
    }
}

pub struct Vm {
    constants: Vec<Object>,
    stack: Vec<Object>,
    sp: usize,
    globals: Vec<Object>,
    frames: Vec<Frame>,
}

impl Vm {
    pub fn new(bytecode: Bytecode) -> Self {
        let main_func = Rc::new(CompiledFunctionData {
            instructions: bytecode.instructions,
            num_locals: 0,
            num_params: 0,
        });
        Vm {
            constants: bytecode.constants,
            stack: vec![Object::Null; STACK_SIZE],
            sp: 0,
            globals: vec![Object::Null; GLOBALS_SIZE],
            frames: vec![Frame { func: main_func, ip: 0, base_pointer: 0 }],
        }
    }

    /// Reuses a globals store across REPL evaluations, so `let` bindings
    /// from one line are visible on the next.
    pub fn with_globals(bytecode: Bytecode, globals: Vec<Object>) -> Self {
        let mut vm = Self::new(bytecode);
        for (i, value) in globals.into_iter().enumerate() {
            vm.globals[i] = value;
        }
        vm
    }

    pub fn take_globals(self) -> Vec<Object> {
        self.globals
    }

    /// The top value popped from the stack, kept around after a pop so a
    /// REPL (or test) can inspect the value an expression statement produced
    /// without the VM keeping it live on the stack.
    pub fn last_popped_stack_elem(&self) -> Object {
        self.stack[self.sp].clone()
    }

    fn current_frame(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("at least one frame")
    }

    fn push_frame(&mut self, frame: Frame) -> VmResult<()> {
        if self.frames.len() >= MAX_FRAMES {
            return Err(VmError::FrameOverflow);
        }
        self.frames.push(frame);
        Ok(())
    }

    fn pop_frame(&mut self) -> Frame {
        self.frames.pop().expect("at least one frame")
    }

    fn push(&mut self, obj: Object) -> VmResult<()> {
        if self.sp >= STACK_SIZE {
            return Err(VmError::StackOverflow);
        }
        self.stack[self.sp] = obj;
        self.sp += 1;
        Ok(())
    }

    fn pop(&mut self) -> Object {
        self.sp -= 1;
        std::mem::replace(&mut self.stack[self.sp], Object::Null)
    }

    pub fn run(&mut self, print: &mut dyn FnMut(&str)) -> VmResult<()> {
        loop {
            let ip = self.current_frame().ip;
            if ip >= self.current_frame().instructions().len() {
                if self.frames.len() == 1 {
                    return Ok(());
                }
                self.pop_frame();
                continue;
            }
            let op_byte = self.current_frame().instructions()[ip];
            let op = Opcode::from_byte(op_byte).expect("compiler only emits valid opcodes");
            self.current_frame().ip += 1;

            match op {
                Opcode::Const => {
                    let index = self.read_u16_operand();
                    let constant = self.constants[index as usize].clone();
                    self.push(constant)?;
                }
                Opcode::Pop => {
                    self.pop();
                }
                Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div => self.exec_binary_op(op)?,
                Opcode::True => self.push(Object::Bool(true))?,
                Opcode::False => self.push(Object::Bool(false))?,
                Opcode::Null => self.push(Object::Null)?,
                Opcode::Equal | Opcode::NotEqual | Opcode::GreaterThan | Opcode::GreaterEqual => {
                    self.exec_comparison(op)?
                }
                Opcode::Minus => self.exec_minus()?,
                Opcode::Bang => self.exec_bang()?,
                Opcode::JumpNotTruthy => {
                    let target = self.read_u16_operand();
                    let cond = self.pop();
                    if !cond.is_truthy() {
                        self.current_frame().ip = target as usize;
                    }
                }
                Opcode::Jump => {
                    let target = self.read_u16_operand();
                    self.current_frame().ip = target as usize;
                }
                Opcode::GetGlobal => {
                    let index = self.read_u16_operand();
                    self.push(self.globals[index as usize].clone())?;
                }
                Opcode::SetGlobal => {
                    let index = self.read_u16_operand();
                    let value = self.pop();
                    self.globals[index as usize] = value;
                }
                Opcode::GetLocal => {
                    let index = self.read_u8_operand();
                    let base = self.current_frame().base_pointer;
                    self.push(self.stack[base + index as usize].clone())?;
                }
                Opcode::SetLocal => {
                    let index = self.read_u8_operand();
                    let base = self.current_frame().base_pointer;
                    let value = self.pop();
                    self.stack[base + index as usize] = value;
                }
                Opcode::GetBuiltin => {
                    let index = self.read_u8_operand();
                    let builtin = Builtin::from_index(index).expect("compiler only emits valid builtin indices");
                    self.push(Object::Builtin(builtin))?;
                }
                Opcode::Array => {
                    let count = self.read_u16_operand() as usize;
                    let items = self.stack[self.sp - count..self.sp].to_vec();
                    self.sp -= count;
                    self.push(Object::array(items))?;
                }
                Opcode::Hash => {
                    let count = self.read_u16_operand() as usize;
                    let mut map = IndexMap::new();
                    let start = self.sp - count;
                    let mut i = start;
                    while i < self.sp {
                        let key = self.stack[i].clone();
                        let value = self.stack[i + 1].clone();
                        let Some(hash_key) = key.hash_key() else {
                            return Err(VmError::IndexError(key.type_name()));
                        };
                        map.insert(hash_key, (key, value));
                        i += 2;
                    }
                    self.sp -= count;
                    self.push(Object::Dict(Rc::new(map)))?;
                }
                Opcode::Index => self.exec_index()?,
                Opcode::Call => {
                    let num_args = self.read_u8_operand() as usize;
                    self.exec_call(num_args, print)?;
                }
                Opcode::ReturnValue => {
                    let value = self.pop();
                    let frame = self.pop_frame();
                    self.sp = frame.base_pointer - 1;
                    self.push(value)?;
                }
                Opcode::Return => {
                    let frame = self.pop_frame();
                    self.sp = frame.base_pointer - 1;
                    self.push(Object::Null)?;
                }
                Opcode::Closure => {
                    // No free-variable capture is supported (spec's object set has
                    // no "Closure" variant distinct from `CompiledFunc`): the
                    // second operand is always 0 and is read only to advance ip.
                    let const_index = self.read_u16_operand();
                    let _num_free = self.read_u8_operand();
                    let constant = self.constants[const_index as usize].clone();
                    self.push(constant)?;
                }
            }
        }
    }

    fn read_u16_operand(&mut self) -> u16 {
        let frame = self.current_frame();
        let ip = frame.ip;
        let value = read_u16(&frame.instructions()[ip..]);
        frame.ip += 2;
        value
    }

    fn read_u8_operand(&mut self) -> u8 {
        let frame = self.current_frame();
        let ip = frame.ip;
        let value = frame.instructions()[ip];
        frame.ip += 1;
        value
    }

    fn exec_binary_op(&mut self, op: Opcode) -> VmResult<()> {
        let right = self.pop();
        let left = self.pop();
        let result = match (&left, &right) {
            (Object::Int(l), Object::Int(r)) => {
                let v = match op {
                    Opcode::Add => l.wrapping_add(*r),
                    Opcode::Sub => l.wrapping_sub(*r),
                    Opcode::Mul => l.wrapping_mul(*r),
                    Opcode::Div => {
                        if *r == 0 {
                            return Err(VmError::DivideByZero);
                        }
                        l.wrapping_div(*r)
                    }
                    _ => unreachable!("exec_binary_op only called for arithmetic opcodes"),
                };
                Object::Int(v)
            }
            (Object::Str(l), Object::Str(r)) if op == Opcode::Add => Object::str(format!("{l}{r}")),
            _ => return Err(VmError::UnsupportedBinaryTypes(left.type_name(), right.type_name())),
        };
        self.push(result)
    }

    fn exec_comparison(&mut self, op: Opcode) -> VmResult<()> {
        let right = self.pop();
        let left = self.pop();
        let result = match (&left, &right) {
            (Object::Int(l), Object::Int(r)) => match op {
                Opcode::Equal => l == r,
                Opcode::NotEqual => l != r,
                Opcode::GreaterThan => l > r,
                Opcode::GreaterEqual => l >= r,
                _ => unreachable!("exec_comparison only called for comparison opcodes"),
            },
            (Object::Bool(l), Object::Bool(r)) => match op {
                Opcode::Equal => l == r,
                Opcode::NotEqual => l != r,
                _ => return Err(VmError::UnsupportedBinaryTypes(left.type_name(), right.type_name())),
            },
            _ => return Err(VmError::UnsupportedBinaryTypes(left.type_name(), right.type_name())),
        };
        self.push(Object::Bool(result))
    }

    fn exec_minus(&mut self) -> VmResult<()> {
        let operand = self.pop();
        match operand {
            Object::Int(v) => self.push(Object::Int(-v)),
            other => Err(VmError::UnknownOperator(other.type_name())),
        }
    }

    fn exec_bang(&mut self) -> VmResult<()> {
        let operand = self.pop();
        self.push(Object::Bool(!operand.is_truthy()))
    }

    fn exec_index(&mut self) -> VmResult<()> {
        let index = self.pop();
        let collection = self.pop();
        let result = match (&collection, &index) {
            (Object::Array(items), Object::Int(i)) => {
                if *i < 0 || *i as usize >= items.len() {
                    Object::Null
                } else {
                    items[*i as usize].clone()
                }
            }
            (Object::Dict(map), _) => match index.hash_key() {
                Some(key) => map.get(&key).map(|(_, v)| v.clone()).unwrap_or(Object::Null),
                None => return Err(VmError::IndexError(index.type_name())),
            },
            _ => return Err(VmError::IndexError(collection.type_name())),
        };
        self.push(result)
    }

    fn exec_call(&mut self, num_args: usize, print: &mut dyn FnMut(&str)) -> VmResult<()> {
        let callee = self.stack[self.sp - 1 - num_args].clone();
        match callee {
            Object::CompiledFunc(func) => {
                if num_args != func.num_params {
                    return Err(VmError::WrongArgumentCount { want: func.num_params, got: num_args });
                }
                let base_pointer = self.sp - num_args;
                let num_locals = func.num_locals;
                self.push_frame(Frame { func, ip: 0, base_pointer })?;
                self.sp = base_pointer + num_locals;
                Ok(())
            }
            Object::Builtin(builtin) => {
                let args = self.stack[self.sp - num_args..self.sp].to_vec();
                self.sp -= num_args + 1;
                let result = builtins::call(builtin, &args, print);
                self.push(result)
            }
            other => Err(VmError::NotCallable(other.type_name())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::Compiler;
    use crate::parser::Parser;

    fn run(src: &str) -> Object {
        let mut parser = Parser::from_source(src);
        let program = parser.parse_program();
        assert!(parser.errors().is_empty(), "parser errors: {:?}", parser.errors());
        let bytecode = Compiler::new().compile_program(&program).expect("compiles");
        let mut vm = Vm::new(bytecode);
        vm.run(&mut |_| {}).expect("runs");
        vm.last_popped_stack_elem()
    }

    #[test]
    fn integer_arithmetic() {
        assert_eq!(run("1 + 2"), Object::Int(3));
        assert_eq!(run("50 / 2 * 2 + 10 - 5"), Object::Int(55));
        assert_eq!(run("5 * (2 + 10)"), Object::Int(60));
    }

    #[test]
    fn comparisons_including_swapped_less_than() {
        assert_eq!(run("1 < 2"), Object::Bool(true));
        assert_eq!(run("1 > 2"), Object::Bool(false));
        assert_eq!(run("1 <= 1"), Object::Bool(true));
        assert_eq!(run("1 >= 2"), Object::Bool(false));
        assert_eq!(run("(1 < 2) == true"), Object::Bool(true));
    }

    #[test]
    fn division_by_zero_is_a_vm_error() {
        let mut parser = Parser::from_source("1 / 0");
        let program = parser.parse_program();
        let bytecode = Compiler::new().compile_program(&program).unwrap();
        let mut vm = Vm::new(bytecode);
        assert_eq!(vm.run(&mut |_| {}), Err(VmError::DivideByZero));
    }

    #[test]
    fn prefix_operators() {
        assert_eq!(run("-5"), Object::Int(-5));
        assert_eq!(run("!true"), Object::Bool(false));
        assert_eq!(run("!!5"), Object::Bool(true));
    }

    #[test]
    fn conditionals() {
        assert_eq!(run("if (true) { 10 } else { 20 }"), Object::Int(10));
        assert_eq!(run("if (false) { 10 } else { 20 }"), Object::Int(20));
        assert_eq!(run("if (false) { 10 }"), Object::Null);
    }

    #[test]
    fn global_let_statements() {
        assert_eq!(run("let one = 1; let two = 2; one + two"), Object::Int(3));
    }

    #[test]
    fn string_concatenation() {
        assert_eq!(run(r#""mon" + "key""#), Object::str("monkey"));
    }

    #[test]
    fn arrays_and_dicts() {
        assert_eq!(run("[1, 2, 3][1]"), Object::Int(2));
        assert_eq!(run("[1, 2, 3][99]"), Object::Null);
        assert_eq!(run(r#"{"a": 1}["a"]"#), Object::Int(1));
    }

    #[test]
    fn calling_functions_without_arguments() {
        assert_eq!(run("let f = fn() { 5 + 10 }; f();"), Object::Int(15));
        assert_eq!(run("let one = fn() { 1; }; let two = fn() { 2; }; one() + two()"), Object::Int(3));
    }

    #[test]
    fn calling_functions_with_bindings_and_arguments() {
        assert_eq!(run("let f = fn() { let a = 1; a }; f();"), Object::Int(1));
        assert_eq!(run("let sum = fn(a, b) { a + b }; sum(1, 2);"), Object::Int(3));
    }

    #[test]
    fn recursive_functions_via_vm() {
        let src = "let fib = fn(x) { if (x < 2) { x } else { fib(x - 1) + fib(x - 2) } }; fib(10);";
        assert_eq!(run(src), Object::Int(55));
    }

    #[test]
    fn calling_a_function_with_the_wrong_arity_is_an_error() {
        let mut parser = Parser::from_source("let f = fn(a) { a }; f(1, 2);");
        let program = parser.parse_program();
        let bytecode = Compiler::new().compile_program(&program).unwrap();
        let mut vm = Vm::new(bytecode);
        assert_eq!(vm.run(&mut |_| {}), Err(VmError::WrongArgumentCount { want: 1, got: 2 }));
    }

    #[test]
    fn builtin_functions_via_vm() {
        assert_eq!(run(r#"len("hello")"#), Object::Int(5));
        assert_eq!(run("first([1, 2, 3])"), Object::Int(1));
        assert_eq!(run("push([1], 2)"), Object::array(vec![Object::Int(1), Object::Int(2)]));
    }
}
