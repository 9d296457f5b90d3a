//! Sum-typed AST nodes produced by the parser.
//!
//! Every node implements `Display` so that `.to_string()` reproduces
//! round-trip-legible concrete syntax, used both for debugging and by the
//! parser's own test suite (spec section 8's `Program.String()` property).

use std::fmt;

/// An identifier used as an expression, a `let` target, or a function
/// parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    pub name: String,
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixOp {
    Minus,
    Not,
}

impl fmt::Display for PrefixOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PrefixOp::Minus => "-",
            PrefixOp::Not => "!",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfixOp {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    NotEq,
}

impl fmt::Display for InfixOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InfixOp::Add => "+",
            InfixOp::Sub => "-",
            InfixOp::Mul => "*",
            InfixOp::Div => "/",
            InfixOp::Lt => "<",
            InfixOp::Le => "<=",
            InfixOp::Gt => ">",
            InfixOp::Ge => ">=",
            InfixOp::Eq => "==",
            InfixOp::NotEq => "!=",
        })
    }
}

/// A statement block: `{ stmt1; stmt2; ... }`. Used as the body of `if`
/// branches and function literals.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    pub statements: Vec<Statement>,
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for stmt in &self.statements {
            write!(f, "{stmt}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Identifier(Identifier),
    IntLiteral(i64),
    BoolLiteral(bool),
    StringLiteral(String),
    ArrayLiteral(Vec<Expression>),
    DictLiteral(Vec<(Expression, Expression)>),
    Prefix {
        op: PrefixOp,
        rhs: Box<Expression>,
    },
    Infix {
        op: InfixOp,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    If {
        cond: Box<Expression>,
        then_block: Block,
        else_block: Option<Block>,
    },
    FunctionLiteral {
        params: Vec<Identifier>,
        body: Block,
    },
    Call {
        callee: Box<Expression>,
        args: Vec<Expression>,
    },
    Index {
        collection: Box<Expression>,
        index: Box<Expression>,
    },
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Identifier(ident) => write!(f, "{ident}"),
            Expression::IntLiteral(v) => write!(f, "{v}"),
            Expression::BoolLiteral(v) => write!(f, "{v}"),
            Expression::StringLiteral(v) => write!(f, "{v}"),
            Expression::ArrayLiteral(elements) => {
                write!(f, "[")?;
                write_comma_separated(f, elements)?;
                write!(f, "]")
            }
            Expression::DictLiteral(pairs) => {
                write!(f, "{{")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}:{v}")?;
                }
                write!(f, "}}")
            }
            Expression::Prefix { op, rhs } => write!(f, "({op}{rhs})"),
            Expression::Infix { op, lhs, rhs } => write!(f, "({lhs} {op} {rhs})"),
            Expression::If {
                cond,
                then_block,
                else_block,
            } => {
                write!(f, "if{cond} {{ {then_block} }}")?;
                if let Some(alt) = else_block {
                    write!(f, " else {{ {alt} }}")?;
                }
                Ok(())
            }
            Expression::FunctionLiteral { params, body } => {
                write!(f, "fn(")?;
                write_comma_separated(f, params.iter().map(|p| &p.name))?;
                write!(f, ") {{ {body} }}")
            }
            Expression::Call { callee, args } => {
                write!(f, "{callee}(")?;
                write_comma_separated(f, args)?;
                write!(f, ")")
            }
            Expression::Index { collection, index } => write!(f, "({collection}[{index}])"),
        }
    }
}

fn write_comma_separated<T: fmt::Display>(
    f: &mut fmt::Formatter<'_>,
    items: impl IntoIterator<Item = T>,
) -> fmt::Result {
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Let { name: Identifier, value: Expression },
    Return { value: Expression },
    Expr { expr: Expression },
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Let { name, value } => write!(f, "let {name} = {value};"),
            Statement::Return { value } => write!(f, "return {value};"),
            Statement::Expr { expr } => write!(f, "{expr}"),
        }
    }
}

/// The root AST node: an ordered list of statements.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub statements: Vec<Statement>,
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for stmt in &self.statements {
            write!(f, "{stmt}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_a_let_statement_round_trip_legibly() {
        let program = Program {
            statements: vec![Statement::Let {
                name: Identifier { name: "myVar".to_owned() },
                value: Expression::Identifier(Identifier {
                    name: "anotherVar".to_owned(),
                }),
            }],
        };
        assert_eq!(program.to_string(), "let myVar = anotherVar;");
    }

    #[test]
    fn displays_nested_infix_with_explicit_parens() {
        let expr = Expression::Infix {
            op: InfixOp::Add,
            lhs: Box::new(Expression::IntLiteral(1)),
            rhs: Box::new(Expression::Infix {
                op: InfixOp::Mul,
                lhs: Box::new(Expression::IntLiteral(2)),
                rhs: Box::new(Expression::IntLiteral(3)),
            }),
        };
        assert_eq!(expr.to_string(), "(1 + (2 * 3))");
    }
}
