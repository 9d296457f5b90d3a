//! Pratt (top-down operator precedence) parser: tokens -> [`Program`].

use crate::ast::{Block, Expression, Identifier, InfixOp, PrefixOp, Program, Statement};
use crate::lexer::Lexer;
use crate::token::Token;

/// Operator-precedence ladder, lowest to highest, per spec section 4.2.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
enum Precedence {
    Lowest,
    Equality,
    LessGreater,
    Sum,
    Product,
    Prefix,
    Call,
    Index,
}

fn precedence_of(tok: &Token) -> Precedence {
    match tok {
        Token::Eq | Token::NotEq => Precedence::Equality,
        Token::Lt | Token::Le | Token::Gt | Token::Ge => Precedence::LessGreater,
        Token::Plus | Token::Minus => Precedence::Sum,
        Token::Slash | Token::Asterisk => Precedence::Product,
        Token::LParen => Precedence::Call,
        Token::LBracket => Precedence::Index,
        _ => Precedence::Lowest,
    }
}

/// Recursive-descent Pratt parser.
///
/// The "two dispatch tables keyed by token category" from the design are
/// expressed as the two `match`-based dispatch methods [`Parser::parse_prefix`]
/// and [`Parser::parse_infix`] rather than literal function-pointer maps —
/// an exhaustive match is the idiomatic stand-in and the compiler enforces
/// that every token category is handled (or falls through to "no prefix
/// parse function").
pub struct Parser {
    lexer: Lexer,
    cur_token: Token,
    peek_token: Token,
    errors: Vec<String>,
}

impl Parser {
    pub fn new(mut lexer: Lexer) -> Self {
        let cur_token = lexer.next_token();
        let peek_token = lexer.next_token();
        Self {
            lexer,
            cur_token,
            peek_token,
            errors: Vec::new(),
        }
    }

    pub fn from_source(source: &str) -> Self {
        Self::new(Lexer::new(source))
    }

    /// Diagnostics accumulated so far. Empty iff parsing was fully successful.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    fn next_token(&mut self) {
        std::mem::swap(&mut self.cur_token, &mut self.peek_token);
        self.peek_token = self.lexer.next_token();
    }

    fn peek_is(&self, tok: &Token) -> bool {
        std::mem::discriminant(&self.peek_token) == std::mem::discriminant(tok)
    }

    /// Advances past `peek_token` if it matches `expected`, else records a
    /// diagnostic and leaves the cursor in place.
    fn expect_peek(&mut self, expected: Token) -> bool {
        if self.peek_is(&expected) {
            self.next_token();
            true
        } else {
            self.errors.push(format!(
                "expected next token to be {}, got {} instead",
                expected.kind_name(),
                self.peek_token.kind_name()
            ));
            false
        }
    }

    fn peek_precedence(&self) -> Precedence {
        precedence_of(&self.peek_token)
    }

    fn cur_precedence(&self) -> Precedence {
        precedence_of(&self.cur_token)
    }

    /// Parses every statement up to `EOF`. Statement-level errors are
    /// recorded and parsing resumes at the next `;`, per spec section 4.2.
    pub fn parse_program(&mut self) -> Program {
        let mut program = Program::default();
        while self.cur_token != Token::Eof {
            if let Some(stmt) = self.parse_statement() {
                program.statements.push(stmt);
            }
            self.next_token();
        }
        program
    }

    fn parse_statement(&mut self) -> Option<Statement> {
        match self.cur_token {
            Token::Let => self.parse_let_statement(),
            Token::Return => self.parse_return_statement(),
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_let_statement(&mut self) -> Option<Statement> {
        if !self.expect_peek(Token::Ident(String::new())) {
            self.synchronize();
            return None;
        }
        let name = match &self.cur_token {
            Token::Ident(s) => Identifier { name: s.clone() },
            _ => unreachable!("expect_peek guarantees Ident"),
        };

        if !self.expect_peek(Token::Assign) {
            self.synchronize();
            return None;
        }
        self.next_token();

        let value = match self.parse_expression(Precedence::Lowest) {
            Some(v) => v,
            None => {
                self.synchronize();
                return None;
            }
        };

        if self.peek_is(&Token::Semicolon) {
            self.next_token();
        }
        Some(Statement::Let { name, value })
    }

    fn parse_return_statement(&mut self) -> Option<Statement> {
        self.next_token();
        let value = match self.parse_expression(Precedence::Lowest) {
            Some(v) => v,
            None => {
                self.synchronize();
                return None;
            }
        };
        if self.peek_is(&Token::Semicolon) {
            self.next_token();
        }
        Some(Statement::Return { value })
    }

    fn parse_expression_statement(&mut self) -> Option<Statement> {
        let expr = self.parse_expression(Precedence::Lowest)?;
        if self.peek_is(&Token::Semicolon) {
            self.next_token();
        }
        Some(Statement::Expr { expr })
    }

    /// Advances past tokens until the next `;` or `EOF`, so one bad
    /// statement doesn't cascade into unrelated diagnostics.
    fn synchronize(&mut self) {
        while self.cur_token != Token::Semicolon && self.cur_token != Token::Eof {
            self.next_token();
        }
    }

    fn parse_expression(&mut self, precedence: Precedence) -> Option<Expression> {
        let mut left = self.parse_prefix()?;

        while !self.peek_is(&Token::Semicolon) && precedence < self.peek_precedence() {
            self.next_token();
            left = self.parse_infix(left)?;
        }

        Some(left)
    }

    fn parse_prefix(&mut self) -> Option<Expression> {
        match self.cur_token.clone() {
            Token::Ident(name) => Some(Expression::Identifier(Identifier { name })),
            Token::Int(s) => match s.parse::<i64>() {
                Ok(v) => Some(Expression::IntLiteral(v)),
                Err(_) => {
                    self.errors.push(format!("could not parse {s} as integer"));
                    None
                }
            },
            Token::True => Some(Expression::BoolLiteral(true)),
            Token::False => Some(Expression::BoolLiteral(false)),
            Token::Str(s) => Some(Expression::StringLiteral(s)),
            Token::Bang => self.parse_prefix_expr(PrefixOp::Not),
            Token::Minus => self.parse_prefix_expr(PrefixOp::Minus),
            Token::LParen => self.parse_grouped_expr(),
            Token::If => self.parse_if_expr(),
            Token::Function => self.parse_function_literal(),
            Token::LBracket => self.parse_array_literal(),
            Token::LBrace => self.parse_dict_literal(),
            other => {
                self.errors
                    .push(format!("no prefix parse function for {} found", other.kind_name()));
                None
            }
        }
    }

    fn parse_infix(&mut self, left: Expression) -> Option<Expression> {
        match self.cur_token {
            Token::Plus
            | Token::Minus
            | Token::Slash
            | Token::Asterisk
            | Token::Eq
            | Token::NotEq
            | Token::Lt
            | Token::Le
            | Token::Gt
            | Token::Ge => self.parse_infix_expr(left),
            Token::LParen => self.parse_call_expr(left),
            Token::LBracket => self.parse_index_expr(left),
            _ => Some(left),
        }
    }

    fn parse_prefix_expr(&mut self, op: PrefixOp) -> Option<Expression> {
        self.next_token();
        let rhs = self.parse_expression(Precedence::Prefix)?;
        Some(Expression::Prefix { op, rhs: Box::new(rhs) })
    }

    fn parse_infix_expr(&mut self, lhs: Expression) -> Option<Expression> {
        let op = match self.cur_token {
            Token::Plus => InfixOp::Add,
            Token::Minus => InfixOp::Sub,
            Token::Asterisk => InfixOp::Mul,
            Token::Slash => InfixOp::Div,
            Token::Lt => InfixOp::Lt,
            Token::Le => InfixOp::Le,
            Token::Gt => InfixOp::Gt,
            Token::Ge => InfixOp::Ge,
            Token::Eq => InfixOp::Eq,
            Token::NotEq => InfixOp::NotEq,
            _ => unreachable!("parse_infix only calls this for binary operator tokens"),
        };
        let precedence = self.cur_precedence();
        self.next_token();
        let rhs = self.parse_expression(precedence)?;
        Some(Expression::Infix {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    fn parse_grouped_expr(&mut self) -> Option<Expression> {
        self.next_token();
        let expr = self.parse_expression(Precedence::Lowest)?;
        if !self.expect_peek(Token::RParen) {
            return None;
        }
        Some(expr)
    }

    fn parse_if_expr(&mut self) -> Option<Expression> {
        if !self.expect_peek(Token::LParen) {
            return None;
        }
        self.next_token();
        let cond = self.parse_expression(Precedence::Lowest)?;

        if !self.expect_peek(Token::RParen) {
            return None;
        }
        if !self.expect_peek(Token::LBrace) {
            return None;
        }
        let then_block = self.parse_block();

        let else_block = if self.peek_is(&Token::Else) {
            self.next_token();
            if !self.expect_peek(Token::LBrace) {
                return None;
            }
            Some(self.parse_block())
        } else {
            None
        };

        Some(Expression::If {
            cond: Box::new(cond),
            then_block,
            else_block,
        })
    }

    fn parse_block(&mut self) -> Block {
        let mut block = Block::default();
        self.next_token();
        while self.cur_token != Token::RBrace && self.cur_token != Token::Eof {
            if let Some(stmt) = self.parse_statement() {
                block.statements.push(stmt);
            }
            self.next_token();
        }
        block
    }

    fn parse_function_literal(&mut self) -> Option<Expression> {
        if !self.expect_peek(Token::LParen) {
            return None;
        }
        let params = self.parse_function_params()?;
        if !self.expect_peek(Token::LBrace) {
            return None;
        }
        let body = self.parse_block();
        Some(Expression::FunctionLiteral { params, body })
    }

    fn parse_function_params(&mut self) -> Option<Vec<Identifier>> {
        let mut params = Vec::new();

        if self.peek_is(&Token::RParen) {
            self.next_token();
            return Some(params);
        }

        self.next_token();
        params.push(self.parse_identifier_cur()?);

        while self.peek_is(&Token::Comma) {
            self.next_token();
            self.next_token();
            params.push(self.parse_identifier_cur()?);
        }

        if !self.expect_peek(Token::RParen) {
            return None;
        }
        Some(params)
    }

    fn parse_identifier_cur(&mut self) -> Option<Identifier> {
        match &self.cur_token {
            Token::Ident(name) => Some(Identifier { name: name.clone() }),
            other => {
                self.errors
                    .push(format!("expected next token to be IDENT, got {} instead", other.kind_name()));
                None
            }
        }
    }

    fn parse_call_expr(&mut self, callee: Expression) -> Option<Expression> {
        let args = self.parse_expression_list(Token::RParen)?;
        Some(Expression::Call {
            callee: Box::new(callee),
            args,
        })
    }

    fn parse_index_expr(&mut self, collection: Expression) -> Option<Expression> {
        self.next_token();
        let index = self.parse_expression(Precedence::Lowest)?;
        if !self.expect_peek(Token::RBracket) {
            return None;
        }
        Some(Expression::Index {
            collection: Box::new(collection),
            index: Box::new(index),
        })
    }

    fn parse_array_literal(&mut self) -> Option<Expression> {
        let elements = self.parse_expression_list(Token::RBracket)?;
        Some(Expression::ArrayLiteral(elements))
    }

    fn parse_dict_literal(&mut self) -> Option<Expression> {
        let mut pairs = Vec::new();

        while !self.peek_is(&Token::RBrace) {
            self.next_token();
            let key = self.parse_expression(Precedence::Lowest)?;

            if !self.expect_peek(Token::Colon) {
                return None;
            }
            self.next_token();
            let value = self.parse_expression(Precedence::Lowest)?;
            pairs.push((key, value));

            if !self.peek_is(&Token::RBrace) && !self.expect_peek(Token::Comma) {
                return None;
            }
        }

        if !self.expect_peek(Token::RBrace) {
            return None;
        }
        Some(Expression::DictLiteral(pairs))
    }

    fn parse_expression_list(&mut self, end: Token) -> Option<Vec<Expression>> {
        let mut list = Vec::new();

        if self.peek_is(&end) {
            self.next_token();
            return Some(list);
        }

        self.next_token();
        list.push(self.parse_expression(Precedence::Lowest)?);

        while self.peek_is(&Token::Comma) {
            self.next_token();
            self.next_token();
            list.push(self.parse_expression(Precedence::Lowest)?);
        }

        if !self.expect_peek(end) {
            return None;
        }
        Some(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Expression as E;

    fn parse(src: &str) -> Program {
        let mut parser = Parser::from_source(src);
        let program = parser.parse_program();
        assert!(parser.errors().is_empty(), "parser errors: {:?}", parser.errors());
        program
    }

    #[test]
    fn parses_let_statements() {
        let program = parse("let x = 5; let y = true; let foobar = y;");
        assert_eq!(program.statements.len(), 3);
        match &program.statements[0] {
            Statement::Let { name, value } => {
                assert_eq!(name.name, "x");
                assert_eq!(*value, E::IntLiteral(5));
            }
            other => panic!("expected let, got {other:?}"),
        }
    }

    #[test]
    fn let_statement_missing_ident_records_error() {
        let mut parser = Parser::from_source("let = 1;");
        parser.parse_program();
        assert!(!parser.errors().is_empty());
        assert!(parser.errors()[0].contains("expected next token to be IDENT"));
    }

    #[test]
    fn operator_precedence_matches_expected_string_form() {
        let cases = [
            ("-a * b", "((-a) * b)"),
            ("a + b + c", "((a + b) + c)"),
            ("a + b - c", "((a + b) - c)"),
            ("a * b * c", "((a * b) * c)"),
            ("a + b * c + d / e - f", "(((a + (b * c)) + (d / e)) - f)"),
            ("3 + 4; -5 * 5", "(3 + 4)((-5) * 5)"),
            ("5 < 4 != 3 > 4", "((5 < 4) != (3 > 4))"),
            ("5 <= 4 == 3 >= 4", "((5 <= 4) == (3 >= 4))"),
            ("3 > 5 == false", "((3 > 5) == false)"),
            ("1 + (2 + 3) + 4", "((1 + (2 + 3)) + 4)"),
            ("(5 + 5) * 2", "((5 + 5) * 2)"),
            ("!(true == true)", "(!(true == true))"),
            ("a + add(b * c) + d", "((a + add((b * c))) + d)"),
            ("a * [1, 2, 3, 4][b * c] * d", "((a * ([1, 2, 3, 4][(b * c)])) * d)"),
        ];
        for (src, expected) in cases {
            assert_eq!(parse(src).to_string(), expected, "input: {src}");
        }
    }

    #[test]
    fn parses_if_else_expression() {
        let program = parse("if (x < y) { x } else { y }");
        match &program.statements[0] {
            Statement::Expr {
                expr: E::If { else_block, .. },
            } => assert!(else_block.is_some()),
            other => panic!("expected if expression, got {other:?}"),
        }
    }

    #[test]
    fn parses_function_literal_params() {
        let program = parse("fn(x, y) { x + y; }");
        match &program.statements[0] {
            Statement::Expr {
                expr: E::FunctionLiteral { params, .. },
            } => {
                assert_eq!(params.len(), 2);
                assert_eq!(params[0].name, "x");
                assert_eq!(params[1].name, "y");
            }
            other => panic!("expected function literal, got {other:?}"),
        }
    }

    #[test]
    fn parses_call_expression_arguments() {
        let program = parse("add(1, 2 * 3, 4 + 5);");
        match &program.statements[0] {
            Statement::Expr {
                expr: E::Call { args, .. },
            } => assert_eq!(args.len(), 3),
            other => panic!("expected call, got {other:?}"),
        }
    }

    #[test]
    fn parses_string_literal() {
        let program = parse(r#""hello world";"#);
        assert_eq!(
            program.statements[0],
            Statement::Expr {
                expr: E::StringLiteral("hello world".to_owned())
            }
        );
    }

    #[test]
    fn parses_array_and_index_expressions() {
        let program = parse("[1, 2 * 2, 3 + 3][1 + 1]");
        match &program.statements[0] {
            Statement::Expr {
                expr: E::Index { collection, .. },
            } => match collection.as_ref() {
                E::ArrayLiteral(elems) => assert_eq!(elems.len(), 3),
                other => panic!("expected array literal, got {other:?}"),
            },
            other => panic!("expected index expr, got {other:?}"),
        }
    }

    #[test]
    fn parses_dict_literal_with_string_keys() {
        let program = parse(r#"{"one": 1, "two": 2}"#);
        match &program.statements[0] {
            Statement::Expr {
                expr: E::DictLiteral(pairs),
            } => assert_eq!(pairs.len(), 2),
            other => panic!("expected dict literal, got {other:?}"),
        }
    }

    #[test]
    fn displaying_and_reparsing_a_program_yields_an_equal_program() {
        let src = "let a = 1 + 2 * 3; if (a > 5) { return a; } else { return 0; }";
        let first = parse(src);
        let reparsed = parse(&first.to_string());
        assert_eq!(first.to_string(), reparsed.to_string());
    }
}
