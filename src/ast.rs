//! Abstract syntax tree of the rule language.
//!
//! A [`Program`] is an ordered list of [`Statement`]s. Trees are immutable once parsed and are
//! shared read-only (behind `Arc`) between executions.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Program {
    pub statements: Vec<Statement>,
}

impl Program {
    pub fn new(statements: Vec<Statement>) -> Self {
        Self { statements }
    }

    /// Function definitions in source order.
    pub fn functions(&self) -> impl Iterator<Item = &FunctionDef> {
        self.statements.iter().filter_map(|statement| match statement {
            Statement::FunctionDefinition(def) => Some(def),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Block {
    pub statements: Vec<Statement>,
}

impl Block {
    pub fn new(statements: Vec<Statement>) -> Self {
        Self { statements }
    }
}

/// `RULE name(parameters) ... ENDRULE`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    pub parameters: Vec<String>,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    FunctionDefinition(FunctionDef),
    /// `CALL name(arguments)`; the result is discarded.
    Call {
        name: String,
        arguments: Vec<Expression>,
    },
    Expression(Expression),
    Return(Expression),
    Block(Block),
    /// `SET name = value`
    Set {
        name: String,
        value: Expression,
    },
    Log(Expression),
    Export(String),
}

impl Statement {
    /// Variant name, used by diagnostics and analysis output.
    pub fn kind(&self) -> &'static str {
        match self {
            Statement::FunctionDefinition(_) => "FunctionDefinition",
            Statement::Call { .. } => "CallStatement",
            Statement::Expression(_) => "ExpressionStatement",
            Statement::Return(_) => "ReturnStatement",
            Statement::Block(_) => "Block",
            Statement::Set { .. } => "SetStatement",
            Statement::Log(_) => "LogStatement",
            Statement::Export(_) => "ExportStatement",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    Literal(Literal),
    Variable(String),
    Binary {
        op: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Unary {
        op: UnaryOperator,
        operand: Box<Expression>,
    },
    Conditional {
        condition: Box<Expression>,
        then_branch: Box<Expression>,
        else_branch: Box<Expression>,
    },
    FunctionCall {
        function: String,
        arguments: Vec<Expression>,
    },
    Array(Vec<Expression>),
    Member {
        object: Box<Expression>,
        property: MemberProperty,
    },
}

impl Expression {
    pub fn number(n: f64) -> Self {
        Expression::Literal(Literal::Number(n))
    }

    pub fn string(s: impl Into<String>) -> Self {
        Expression::Literal(Literal::String(s.into()))
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Expression::Variable(name.into())
    }

    pub fn binary(op: BinaryOperator, left: Expression, right: Expression) -> Self {
        Expression::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Number(f64),
    String(String),
    Boolean(bool),
    Null,
}

/// `object.name` or `object[expression]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MemberProperty {
    Named(String),
    Computed(Box<Expression>),
}

impl MemberProperty {
    pub fn is_computed(&self) -> bool {
        matches!(self, MemberProperty::Computed(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
pub enum BinaryOperator {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Subtract,
    #[strum(serialize = "*")]
    Multiply,
    #[strum(serialize = "/")]
    Divide,
    #[strum(serialize = "%")]
    Modulo,
    #[strum(serialize = "^")]
    Power,
    #[strum(serialize = "==")]
    Equal,
    #[strum(serialize = "!=")]
    NotEqual,
    #[strum(serialize = "<")]
    LessThan,
    #[strum(serialize = "<=")]
    LessThanEqual,
    #[strum(serialize = ">")]
    GreaterThan,
    #[strum(serialize = ">=")]
    GreaterThanEqual,
    #[strum(serialize = "AND")]
    And,
    #[strum(serialize = "OR")]
    Or,
}

/// Binding strength of a binary operator, higher binds tighter. The conditional
/// operator sits below all of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    Conditional,
    Or,
    And,
    Equality,
    Relational,
    Additive,
    Multiplicative,
    Power,
    Unary,
    Postfix,
}

impl BinaryOperator {
    pub fn precedence(&self) -> Precedence {
        match self {
            BinaryOperator::Or => Precedence::Or,
            BinaryOperator::And => Precedence::And,
            BinaryOperator::Equal | BinaryOperator::NotEqual => Precedence::Equality,
            BinaryOperator::LessThan
            | BinaryOperator::LessThanEqual
            | BinaryOperator::GreaterThan
            | BinaryOperator::GreaterThanEqual => Precedence::Relational,
            BinaryOperator::Add | BinaryOperator::Subtract => Precedence::Additive,
            BinaryOperator::Multiply | BinaryOperator::Divide | BinaryOperator::Modulo => {
                Precedence::Multiplicative
            }
            BinaryOperator::Power => Precedence::Power,
        }
    }

    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self.precedence(),
            Precedence::Additive | Precedence::Multiplicative | Precedence::Power
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
pub enum UnaryOperator {
    #[strum(serialize = "+")]
    Plus,
    #[strum(serialize = "-")]
    Minus,
    #[strum(serialize = "!")]
    Not,
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Number(n) => write!(f, "{}", n),
            Literal::String(s) => write!(f, "{}", s),
            Literal::Boolean(true) => write!(f, "TRUE"),
            Literal::Boolean(false) => write!(f, "FALSE"),
            Literal::Null => write!(f, "NULL"),
        }
    }
}
