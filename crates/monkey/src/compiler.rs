//! Walks the AST once and emits bytecode, resolving every identifier to a
//! storage slot via [`SymbolTable`] instead of carrying names into the VM.

use std::fmt;
use std::rc::Rc;

use crate::ast::{Block, Expression, InfixOp, PrefixOp, Program, Statement};
use crate::code::{make, Instructions, Opcode};
use crate::object::{Builtin, CompiledFunctionData, Object};
use crate::symbol_table::{Scope, SymbolTable};

#[derive(Debug, PartialEq, Eq)]
pub enum CompileError {
    UnknownOperator(String),
    UndefinedVariable(String),
    TooManyConstants,
    TooManyLocals,
    TooManyArguments,
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::UnknownOperator(op) => write!(f, "unknown operator: {op}"),
            CompileError::UndefinedVariable(name) => write!(f, "undefined variable: {name}"),
            CompileError::TooManyConstants => write!(f, "too many constants in one program"),
            CompileError::TooManyLocals => write!(f, "too many local bindings in one scope"),
            CompileError::TooManyArguments => write!(f, "too many arguments in one call"),
        }
    }
}

impl std::error::Error for CompileError {}

pub type CompileResult<T> = Result<T, CompileError>;

/// Tracks the most recently emitted instruction so the compiler can patch
/// or rewind it — used to drop a trailing `OpPop` from a function body
/// and turn the bare value left on the stack into `OpReturnValue`.
#[derive(Debug, Clone, Copy, Default)]
struct EmittedInstruction {
    opcode: Option<Opcode>,
    position: usize,
}

/// Per-function-literal compilation state: its own instruction buffer and
/// symbol table, pushed on `enter_scope` and popped on `leave_scope`.
struct CompilationScope {
    instructions: Instructions,
    last: EmittedInstruction,
    previous: EmittedInstruction,
}

pub struct Compiler {
    constants: Vec<Object>,
    symbol_table: SymbolTable,
    scopes: Vec<CompilationScope>,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    pub fn new() -> Self {
        let mut symbol_table = SymbolTable::new();
        for (i, builtin) in Builtin::ALL.iter().enumerate() {
            symbol_table.define_builtin(i, builtin.to_string());
        }
        Compiler {
            constants: Vec::new(),
            symbol_table,
            scopes: vec![CompilationScope {
                instructions: Instructions::new(),
                last: EmittedInstruction::default(),
                previous: EmittedInstruction::default(),
            }],
        }
    }

    pub fn compile_program(mut self, program: &Program) -> CompileResult<Bytecode> {
        for stmt in &program.statements {
            self.compile_statement(stmt)?;
        }
        Ok(Bytecode {
            instructions: self.current_instructions().clone(),
            constants: self.constants,
        })
    }

    fn current_instructions(&self) -> &Instructions {
        &self.scopes.last().expect("at least one scope").instructions
    }

    fn emit(&mut self, op: Opcode, operands: &[usize]) -> usize {
        let instruction = make(op, operands);
        let scope = self.scopes.last_mut().expect("at least one scope");
        let position = scope.instructions.len();
        scope.instructions.extend(&instruction);
        scope.previous = scope.last;
        scope.last = EmittedInstruction { opcode: Some(op), position };
        position
    }

    /// Defines `name` in the current scope, rejecting the 256th local
    /// binding in a function scope — `OpSetLocal`/`OpGetLocal` address
    /// locals with a one-byte operand.
    fn define_symbol(&mut self, name: impl Into<String>) -> CompileResult<crate::symbol_table::Symbol> {
        let symbol = self.symbol_table.define(name);
        if symbol.scope == Scope::Local && symbol.index > u8::MAX as usize {
            return Err(CompileError::TooManyLocals);
        }
        Ok(symbol)
    }

    fn add_constant(&mut self, obj: Object) -> CompileResult<usize> {
        self.constants.push(obj);
        let index = self.constants.len() - 1;
        if index > u16::MAX as usize {
            return Err(CompileError::TooManyConstants);
        }
        Ok(index)
    }

    fn last_is(&self, op: Opcode) -> bool {
        self.scopes.last().expect("at least one scope").last.opcode == Some(op)
    }

    fn remove_last_pop(&mut self) {
        let scope = self.scopes.last_mut().expect("at least one scope");
        scope.instructions.0.truncate(scope.last.position);
        scope.last = scope.previous;
    }

    /// Rewrites `OpPop` into `OpReturnValue` when it is the last instruction
    /// emitted — used so a function body's trailing expression statement
    /// becomes its return value instead of being discarded.
    fn replace_last_pop_with_return(&mut self) {
        let scope = self.scopes.last().expect("at least one scope");
        let last_pos = scope.last.position;
        let new_instruction = make(Opcode::ReturnValue, &[]);
        self.replace_instruction(last_pos, &new_instruction);
        self.scopes.last_mut().unwrap().last.opcode = Some(Opcode::ReturnValue);
    }

    fn replace_instruction(&mut self, position: usize, new_instruction: &[u8]) {
        let scope = self.scopes.last_mut().expect("at least one scope");
        for (i, byte) in new_instruction.iter().enumerate() {
            scope.instructions.0[position + i] = *byte;
        }
    }

    fn change_operand(&mut self, position: usize, operand: usize) {
        let op = Opcode::from_byte(self.current_instructions().0[position]).expect("valid opcode");
        let new_instruction = make(op, &[operand]);
        self.replace_instruction(position, &new_instruction);
    }

    fn enter_scope(&mut self) {
        self.scopes.push(CompilationScope {
            instructions: Instructions::new(),
            last: EmittedInstruction::default(),
            previous: EmittedInstruction::default(),
        });
        let outer = std::mem::replace(&mut self.symbol_table, SymbolTable::new());
        self.symbol_table = SymbolTable::enclosed(outer);
    }

    fn leave_scope(&mut self) -> Instructions {
        let scope = self.scopes.pop().expect("at least one scope");
        let outer = std::mem::replace(&mut self.symbol_table, SymbolTable::new());
        self.symbol_table = outer.pop();
        scope.instructions
    }

    fn compile_statement(&mut self, stmt: &Statement) -> CompileResult<()> {
        match stmt {
            Statement::Expr { expr } => {
                self.compile_expression(expr)?;
                self.emit(Opcode::Pop, &[]);
            }
            Statement::Let { name, value } => {
                // Defined before the rhs is compiled, so a function literal
                // bound by this `let` can resolve a recursive reference to
                // its own name.
                let symbol = self.define_symbol(name.name.clone())?;
                self.compile_expression(value)?;
                match symbol.scope {
                    Scope::Global => {
                        self.emit(Opcode::SetGlobal, &[symbol.index]);
                    }
                    Scope::Local => {
                        self.emit(Opcode::SetLocal, &[symbol.index]);
                    }
                    Scope::Builtin => unreachable!("let never defines into builtin scope"),
                }
            }
            Statement::Return { value } => {
                self.compile_expression(value)?;
                self.emit(Opcode::ReturnValue, &[]);
            }
        }
        Ok(())
    }

    fn compile_block(&mut self, block: &Block) -> CompileResult<()> {
        for stmt in &block.statements {
            self.compile_statement(stmt)?;
        }
        Ok(())
    }

    fn compile_expression(&mut self, expr: &Expression) -> CompileResult<()> {
        match expr {
            Expression::IntLiteral(v) => {
                let index = self.add_constant(Object::Int(*v))?;
                self.emit(Opcode::Const, &[index]);
            }
            Expression::StringLiteral(v) => {
                let index = self.add_constant(Object::str(v.clone()))?;
                self.emit(Opcode::Const, &[index]);
            }
            Expression::BoolLiteral(true) => {
                self.emit(Opcode::True, &[]);
            }
            Expression::BoolLiteral(false) => {
                self.emit(Opcode::False, &[]);
            }
            Expression::Identifier(ident) => {
                let symbol = self
                    .symbol_table
                    .resolve(&ident.name)
                    .ok_or_else(|| CompileError::UndefinedVariable(ident.name.clone()))?;
                match symbol.scope {
                    Scope::Global => self.emit(Opcode::GetGlobal, &[symbol.index]),
                    Scope::Local => self.emit(Opcode::GetLocal, &[symbol.index]),
                    Scope::Builtin => self.emit(Opcode::GetBuiltin, &[symbol.index]),
                };
            }
            Expression::Prefix { op, rhs } => {
                self.compile_expression(rhs)?;
                match op {
                    PrefixOp::Not => self.emit(Opcode::Bang, &[]),
                    PrefixOp::Minus => self.emit(Opcode::Minus, &[]),
                };
            }
            // `<` and `<=` are compiled by swapping operand order and emitting the
            // `>`/`>=` opcode — the VM never needs a "less than" instruction.
            Expression::Infix {
                op: op @ (InfixOp::Lt | InfixOp::Le),
                lhs,
                rhs,
            } => {
                self.compile_expression(rhs)?;
                self.compile_expression(lhs)?;
                self.emit(
                    if *op == InfixOp::Lt { Opcode::GreaterThan } else { Opcode::GreaterEqual },
                    &[],
                );
            }
            Expression::Infix { op, lhs, rhs } => {
                self.compile_expression(lhs)?;
                self.compile_expression(rhs)?;
                match op {
                    InfixOp::Add => self.emit(Opcode::Add, &[]),
                    InfixOp::Sub => self.emit(Opcode::Sub, &[]),
                    InfixOp::Mul => self.emit(Opcode::Mul, &[]),
                    InfixOp::Div => self.emit(Opcode::Div, &[]),
                    InfixOp::Gt => self.emit(Opcode::GreaterThan, &[]),
                    InfixOp::Ge => self.emit(Opcode::GreaterEqual, &[]),
                    InfixOp::Eq => self.emit(Opcode::Equal, &[]),
                    InfixOp::NotEq => self.emit(Opcode::NotEqual, &[]),
                    InfixOp::Lt | InfixOp::Le => unreachable!("handled above"),
                };
            }
            Expression::If {
                cond,
                then_block,
                else_block,
            } => self.compile_if(cond, then_block, else_block.as_ref())?,
            Expression::FunctionLiteral { params, body } => self.compile_function_literal(params, body)?,
            Expression::Call { callee, args } => {
                self.compile_expression(callee)?;
                for arg in args {
                    self.compile_expression(arg)?;
                }
                if args.len() > u8::MAX as usize {
                    return Err(CompileError::TooManyArguments);
                }
                self.emit(Opcode::Call, &[args.len()]);
            }
            Expression::ArrayLiteral(elements) => {
                for element in elements {
                    self.compile_expression(element)?;
                }
                self.emit(Opcode::Array, &[elements.len()]);
            }
            Expression::DictLiteral(pairs) => self.compile_dict_literal(pairs)?,
            Expression::Index { collection, index } => {
                self.compile_expression(collection)?;
                self.compile_expression(index)?;
                self.emit(Opcode::Index, &[]);
            }
        }
        Ok(())
    }

    fn compile_if(&mut self, cond: &Expression, then_block: &Block, else_block: Option<&Block>) -> CompileResult<()> {
        self.compile_expression(cond)?;
        let jump_not_truthy_pos = self.emit(Opcode::JumpNotTruthy, &[0]);

        self.compile_block(then_block)?;
        if self.last_is(Opcode::Pop) {
            self.remove_last_pop();
        }

        let jump_pos = self.emit(Opcode::Jump, &[0]);
        let after_then_pos = self.current_instructions().len();
        self.change_operand(jump_not_truthy_pos, after_then_pos);

        match else_block {
            Some(alt) => {
                self.compile_block(alt)?;
                if self.last_is(Opcode::Pop) {
                    self.remove_last_pop();
                }
            }
            None => {
                self.emit(Opcode::Null, &[]);
            }
        }
        let after_else_pos = self.current_instructions().len();
        self.change_operand(jump_pos, after_else_pos);
        Ok(())
    }

    fn compile_function_literal(&mut self, params: &[crate::ast::Identifier], body: &Block) -> CompileResult<()> {
        self.enter_scope();
        for param in params {
            self.define_symbol(param.name.clone())?;
        }
        self.compile_block(body)?;

        if self.last_is(Opcode::Pop) {
            self.replace_last_pop_with_return();
        }
        if !self.last_is(Opcode::ReturnValue) {
            self.emit(Opcode::Return, &[]);
        }

        let num_locals = self.symbol_table.num_definitions();
        let instructions = self.leave_scope();

        let compiled = Object::CompiledFunc(Rc::new(CompiledFunctionData {
            instructions,
            num_locals,
            num_params: params.len(),
        }));
        let index = self.add_constant(compiled)?;
        // No free-variable capture is implemented (the source's free-variable
        // set is always empty), so the second operand is always 0.
        self.emit(Opcode::Closure, &[index, 0]);
        Ok(())
    }

    fn compile_dict_literal(&mut self, pairs: &[(Expression, Expression)]) -> CompileResult<()> {
        // Compiled in source order, not sorted, so the VM builds the map with
        // the same key order every run.
        for (key, value) in pairs {
            self.compile_expression(key)?;
            self.compile_expression(value)?;
        }
        self.emit(Opcode::Hash, &[pairs.len() * 2]);
        Ok(())
    }
}

/// The final product of compilation: a flat instruction stream plus the
/// constant pool it indexes into.
#[derive(Debug, Clone)]
pub struct Bytecode {
    pub instructions: Instructions,
    pub constants: Vec<Object>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::{make, Opcode};
    use crate::parser::Parser;

    fn compile(src: &str) -> Bytecode {
        let mut parser = Parser::from_source(src);
        let program = parser.parse_program();
        assert!(parser.errors().is_empty(), "parser errors: {:?}", parser.errors());
        Compiler::new().compile_program(&program).expect("compiles")
    }

    fn concat(chunks: &[Vec<u8>]) -> Vec<u8> {
        chunks.iter().flatten().copied().collect()
    }

    #[test]
    fn compiles_integer_arithmetic() {
        let bytecode = compile("1 + 2");
        assert_eq!(bytecode.constants, vec![Object::Int(1), Object::Int(2)]);
        let expected = concat(&[
            make(Opcode::Const, &[0]),
            make(Opcode::Const, &[1]),
            make(Opcode::Add, &[]),
            make(Opcode::Pop, &[]),
        ]);
        assert_eq!(bytecode.instructions.0, expected);
    }

    #[test]
    fn less_than_is_compiled_as_swapped_greater_than() {
        let bytecode = compile("1 < 2");
        let expected = concat(&[
            make(Opcode::Const, &[0]),
            make(Opcode::Const, &[1]),
            make(Opcode::GreaterThan, &[]),
            make(Opcode::Pop, &[]),
        ]);
        assert_eq!(bytecode.instructions.0, expected);
        // constant 0 is the literal that appeared second in source (2), since
        // operands are swapped before the compare.
        assert_eq!(bytecode.constants[0], Object::Int(1));
        assert_eq!(bytecode.constants[1], Object::Int(2));
    }

    #[test]
    fn if_without_else_emits_null_branch() {
        let bytecode = compile("if (true) { 10 }; 3333;");
        let expected = concat(&[
            make(Opcode::True, &[]),
            make(Opcode::JumpNotTruthy, &[10]),
            make(Opcode::Const, &[0]),
            make(Opcode::Jump, &[11]),
            make(Opcode::Null, &[]),
            make(Opcode::Pop, &[]),
            make(Opcode::Const, &[1]),
            make(Opcode::Pop, &[]),
        ]);
        assert_eq!(bytecode.instructions.0, expected);
    }

    #[test]
    fn global_let_statements_use_global_slots() {
        let bytecode = compile("let one = 1; let two = 2;");
        let expected = concat(&[
            make(Opcode::Const, &[0]),
            make(Opcode::SetGlobal, &[0]),
            make(Opcode::Const, &[1]),
            make(Opcode::SetGlobal, &[1]),
        ]);
        assert_eq!(bytecode.instructions.0, expected);
    }

    #[test]
    fn string_literals_are_pooled_constants() {
        let bytecode = compile(r#""monkey""#);
        assert_eq!(bytecode.constants, vec![Object::str("monkey")]);
    }

    #[test]
    fn array_literal_compiles_elements_then_array_opcode() {
        let bytecode = compile("[1, 2, 3]");
        let expected = concat(&[
            make(Opcode::Const, &[0]),
            make(Opcode::Const, &[1]),
            make(Opcode::Const, &[2]),
            make(Opcode::Array, &[3]),
            make(Opcode::Pop, &[]),
        ]);
        assert_eq!(bytecode.instructions.0, expected);
    }

    #[test]
    fn function_literal_compiles_its_own_scope_with_implicit_return() {
        let bytecode = compile("fn() { 5 + 10 }");
        let constants = &bytecode.constants;
        match constants.last().unwrap() {
            Object::CompiledFunc(func) => {
                let expected = concat(&[
                    make(Opcode::Const, &[0]),
                    make(Opcode::Const, &[1]),
                    make(Opcode::Add, &[]),
                    make(Opcode::ReturnValue, &[]),
                ]);
                assert_eq!(func.instructions.0, expected);
            }
            other => panic!("expected compiled function, got {other:?}"),
        }
    }

    #[test]
    fn call_expression_emits_call_with_argument_count() {
        let bytecode = compile("let f = fn() { 24 }; f();");
        let expected_tail = concat(&[make(Opcode::Call, &[0]), make(Opcode::Pop, &[])]);
        assert!(bytecode.instructions.0.ends_with(&expected_tail));
    }

    #[test]
    fn function_literal_is_emitted_as_a_closure_with_zero_free_variables() {
        let bytecode = compile("fn() { 24 };");
        let expected = concat(&[make(Opcode::Closure, &[0, 0]), make(Opcode::Pop, &[])]);
        assert_eq!(bytecode.instructions.0, expected);
    }

    #[test]
    fn undefined_variable_is_a_compile_error() {
        let mut parser = Parser::from_source("foobar;");
        let program = parser.parse_program();
        let err = Compiler::new().compile_program(&program).unwrap_err();
        assert_eq!(err, CompileError::UndefinedVariable("foobar".to_owned()));
    }

    #[test]
    fn local_bindings_use_local_slots_inside_functions() {
        let bytecode = compile("fn() { let num = 55; num }");
        match bytecode.constants.last().unwrap() {
            Object::CompiledFunc(func) => {
                let expected = concat(&[
                    make(Opcode::Const, &[0]),
                    make(Opcode::SetLocal, &[0]),
                    make(Opcode::GetLocal, &[0]),
                    make(Opcode::ReturnValue, &[]),
                ]);
                assert_eq!(func.instructions.0, expected);
                assert_eq!(func.num_locals, 1);
            }
            other => panic!("expected compiled function, got {other:?}"),
        }
    }

    #[test]
    fn builtin_identifier_resolves_to_get_builtin() {
        let bytecode = compile("len([1])");
        assert!(bytecode
            .instructions
            .0
            .starts_with(&make(Opcode::GetBuiltin, &[Builtin::Len.index() as usize])));
    }
}
