//! AST for the DwiSlpy language
//!
//! ASDL:
//!   program = Program(definition* defs, block main)
//!   definition = Definition(identifier name, formal* formals, type return_type, block body)
//!   formal = Formal(identifier name, type)
//!   block = Block(statement*)
//!   statement = Intro(identifier name, type, expression)
//!             | Assign(identifier name, expression)
//!             | PlusAssign(identifier name, expression)
//!             | MinusAssign(identifier name, expression)
//!             | TimesAssign(identifier name, expression)
//!             | Print(expression* args)
//!             | Pass
//!             | While(expression condition, block body)
//!             | IfElse(expression condition, block then_block, block else_block)
//!             | Return(expression? value)
//!             | Call(identifier name, expression* args)
//!   expression = Literal(value)
//!              | Variable(identifier)
//!              | Binary(binary_operator, expression, expression)
//!              | Not(expression)
//!              | Input(expression prompt)
//!              | IntCast(expression)
//!              | StrCast(expression)
//!              | Call(identifier name, expression* args)
//!   binary_operator = Add | Subtract | Multiply | Divide | Remainder
//!                   | LessThan | LessOrEqual | Equal | And | Or
//!
//! Every node records the location of its first token. Expression nodes also
//! carry a type slot that the semantic analysis fills in and the lowering
//! reads back.

use crate::semantics::Type;
use crate::util::Location;
use crate::value::Value;

pub type Name = String;

#[derive(Debug, PartialEq, Clone)]
pub struct Program {
    pub definitions: Vec<Definition>,
    pub main: Block,
    pub location: Location,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Definition {
    pub name: Name,
    pub formals: Vec<Formal>,
    pub return_type: Type,
    pub body: Block,
    pub location: Location,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Formal {
    pub name: Name,
    pub ty: Type,
    pub location: Location,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Block {
    pub statements: Vec<Statement>,
    pub location: Location,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Statement {
    Intro {
        name: Name,
        ty: Type,
        expression: Expression,
        location: Location,
    },
    Assign {
        name: Name,
        expression: Expression,
        location: Location,
    },
    PlusAssign {
        name: Name,
        expression: Expression,
        location: Location,
    },
    MinusAssign {
        name: Name,
        expression: Expression,
        location: Location,
    },
    TimesAssign {
        name: Name,
        expression: Expression,
        location: Location,
    },
    Print {
        args: Vec<Expression>,
        location: Location,
    },
    Pass {
        location: Location,
    },
    While {
        condition: Expression,
        body: Block,
        location: Location,
    },
    IfElse {
        condition: Expression,
        then_block: Block,
        else_block: Block,
        location: Location,
    },
    Return {
        value: Option<Expression>,
        location: Location,
    },
    Call {
        name: Name,
        args: Vec<Expression>,
        location: Location,
    },
}

impl Statement {
    pub fn location(&self) -> &Location {
        match self {
            Statement::Intro { location, .. }
            | Statement::Assign { location, .. }
            | Statement::PlusAssign { location, .. }
            | Statement::MinusAssign { location, .. }
            | Statement::TimesAssign { location, .. }
            | Statement::Print { location, .. }
            | Statement::Pass { location }
            | Statement::While { location, .. }
            | Statement::IfElse { location, .. }
            | Statement::Return { location, .. }
            | Statement::Call { location, .. } => location,
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub location: Location,
    /// Filled in by semantic analysis; `None` until then.
    pub ty: Option<Type>,
}

impl Expression {
    pub fn new(kind: ExpressionKind, location: Location) -> Self {
        Expression {
            kind,
            location,
            ty: None,
        }
    }

    /// The type recorded by semantic analysis.
    ///
    /// Lowering runs strictly after a successful analysis, so an unset slot
    /// is a bug in this crate, not in the program being compiled.
    pub fn checked_type(&self) -> Type {
        self.ty
            .expect("expression type is set during semantic analysis")
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum ExpressionKind {
    Literal(Value),
    Variable(Name),
    Binary(BinaryOperator, Box<Expression>, Box<Expression>),
    Not(Box<Expression>),
    Input(Box<Expression>),
    IntCast(Box<Expression>),
    StrCast(Box<Expression>),
    Call(Name, Vec<Expression>),
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
    LessThan,
    LessOrEqual,
    Equal,
    And,
    Or,
}

impl BinaryOperator {
    /// The surface syntax for the operator, used by the pretty printer.
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "//",
            BinaryOperator::Remainder => "%",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessOrEqual => "<=",
            BinaryOperator::Equal => "==",
            BinaryOperator::And => "and",
            BinaryOperator::Or => "or",
        }
    }
}
