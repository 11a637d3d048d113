//! Semantic analysis: types, return-behavior checking, and symbol tables.
//!
//! The checker walks the AST once per scope, recording introduced names in a
//! [`SymbolTable`], writing the computed [`Type`] into every expression node,
//! and folding statement-level [`Returns`] values to decide whether a block
//! definitely returns, might return, or falls through.

use crate::ast::{
    BinaryOperator, Block, Definition, Expression, ExpressionKind, Name, Program, Statement,
};
use crate::util::Location;
use crate::value::Value;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// The static types of DwiSlpy.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Type {
    Int,
    Str,
    Bool,
    None,
}

impl Type {
    pub fn name(&self) -> &'static str {
        match self {
            Type::Int => "int",
            Type::Str => "str",
            Type::Bool => "bool",
            Type::None => "None",
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The return behavior of a statement or block.
///
/// `Void` never returns, `Always(t)` returns a `t` on every path, and
/// `VoidOr(t)` returns a `t` on some paths and falls through on others.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Returns {
    Void,
    VoidOr(Type),
    Always(Type),
}

impl fmt::Display for Returns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Returns::Void => write!(f, "no return"),
            Returns::VoidOr(t) => write!(f, "a possible return of {t}"),
            Returns::Always(t) => write!(f, "a return of {t}"),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SymbolKind {
    Formal,
    Local,
    Temp,
}

#[derive(Debug, PartialEq, Clone)]
pub struct SymbolInfo {
    pub name: Name,
    pub id: usize,
    pub ty: Type,
    pub kind: SymbolKind,
    pub frame_offset: i32,
}

/// A per-scope table of variable information.
///
/// `formals` and `locals` keep declaration order; `locals` also holds the
/// temporaries that lowering introduces, and later the two saved-register
/// slots the emitter reserves. Frame offsets and the frame size are filled
/// in during frame layout.
#[derive(Debug, PartialEq, Default)]
pub struct SymbolTable {
    entries: HashMap<Name, SymbolInfo>,
    formals: Vec<Name>,
    locals: Vec<Name>,
    next_id: usize,
    frame_size: i32,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable::default()
    }

    fn insert(&mut self, name: Name, ty: Type, kind: SymbolKind) {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert(
            name.clone(),
            SymbolInfo {
                name,
                id,
                ty,
                kind,
                frame_offset: 0,
            },
        );
    }

    pub fn add_formal(&mut self, name: Name, ty: Type) {
        self.formals.push(name.clone());
        self.insert(name, ty, SymbolKind::Formal);
    }

    pub fn add_local(&mut self, name: Name, ty: Type) {
        self.locals.push(name.clone());
        self.insert(name, ty, SymbolKind::Local);
    }

    /// Introduces a fresh compiler temporary and returns its name.
    pub fn add_temp(&mut self, ty: Type) -> Name {
        let name = format!("temp_{}", self.next_id);
        self.locals.push(name.clone());
        self.insert(name.clone(), ty, SymbolKind::Temp);
        name
    }

    pub fn has(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&SymbolInfo> {
        self.entries.get(name)
    }

    pub fn formals(&self) -> &[Name] {
        &self.formals
    }

    pub fn locals(&self) -> &[Name] {
        &self.locals
    }

    pub fn set_frame_offset(&mut self, name: &str, offset: i32) {
        let info = self
            .entries
            .get_mut(name)
            .expect("frame offsets are only assigned to recorded names");
        info.frame_offset = offset;
    }

    pub fn frame_offset(&self, name: &str) -> i32 {
        self.entries
            .get(name)
            .expect("frame offsets are only read for recorded names")
            .frame_offset
    }

    pub fn set_frame_size(&mut self, size: i32) {
        self.frame_size = size;
    }

    pub fn frame_size(&self) -> i32 {
        self.frame_size
    }
}

/// The callable surface of a definition, split out so bodies can be checked
/// against every definition's signature without aliasing the AST.
#[derive(Debug, PartialEq, Clone)]
pub struct Signature {
    pub name: Name,
    pub formal_types: Vec<Type>,
    pub return_type: Type,
}

impl Signature {
    fn of(definition: &Definition) -> Self {
        Signature {
            name: definition.name.clone(),
            formal_types: definition.formals.iter().map(|f| f.ty).collect(),
            return_type: definition.return_type,
        }
    }
}

/// Definition lookup is last-match-wins, everywhere: the most recent
/// definition of a name is the one called.
pub fn lookup_signature<'a>(signatures: &'a [Signature], name: &str) -> Option<&'a Signature> {
    signatures.iter().rev().find(|s| s.name == name)
}

#[derive(Debug, PartialEq, Error)]
pub enum Error {
    #[error("{0}: unknown identifier '{1}'")]
    UnknownIdentifier(Location, Name),

    #[error("{0}: variable '{1}' introduced twice")]
    DuplicateIntroduction(Location, Name),

    #[error("{0}: duplicate parameter '{1}'")]
    DuplicateFormal(Location, Name),

    #[error("{0}: variable '{1}' never introduced")]
    NeverIntroduced(Location, Name),

    #[error("{0}: type mismatch, expected an expression of type {1}, found {2}")]
    TypeMismatch(Location, Type, Type),

    #[error("{0}: wrong operand types for {1}")]
    WrongOperandTypes(Location, String),

    #[error("{0}: input prompt must be a str, found {1}")]
    InputPromptNotString(Location, Type),

    #[error("{0}: cannot convert None to {1}")]
    CannotConvertNone(Location, &'static str),

    #[error("{0}: function or procedure '{1}' is not defined")]
    UnknownFunction(Location, Name),

    #[error("{0}: function '{1}' called as a procedure")]
    FunctionCalledAsProcedure(Location, Name),

    #[error("{0}: procedure '{1}' called as a function")]
    ProcedureCalledAsFunction(Location, Name),

    #[error("{0}: incorrect number of arguments for '{1}': expected {2}, saw {3}")]
    ArityMismatch(Location, Name, usize, usize),

    #[error("{0}: type mismatch in argument, expected {1}, found {2}")]
    ArgumentTypeMismatch(Location, Type, Type),

    #[error("{0}: unexpected return")]
    UnexpectedReturn(Location),

    #[error("{0}: return type mismatch, expected {1}, found {2}")]
    ReturnTypeMismatch(Location, Type, Type),

    #[error("{0}: mismatched return behavior: {1} joined with {2}")]
    BranchMismatch(Location, Returns, Returns),

    #[error("{0}: body of '{1}' never returns")]
    BodyNeverReturns(Location, Name),

    #[error("{0}: body of '{1}' might not return")]
    BodyMightNotReturn(Location, Name),

    #[error("{0}: the main script should not return")]
    MainReturns(Location),
}

/// Everything the later phases need from the analysis: one symbol table per
/// definition (in definition order) and one for the main script.
#[derive(Debug)]
pub struct Analysis {
    pub main_symbols: SymbolTable,
    pub definition_symbols: Vec<SymbolTable>,
}

/// Checks the whole program, filling in expression types as a side effect.
pub fn analyse(program: &mut Program) -> Result<Analysis, Error> {
    let signatures: Vec<Signature> = program.definitions.iter().map(Signature::of).collect();

    let mut definition_symbols = Vec::new();
    for definition in &mut program.definitions {
        definition_symbols.push(check_definition(definition, &signatures)?);
    }

    let mut main_symbols = SymbolTable::new();
    let returns = check_block(
        &mut program.main,
        &Returns::Void,
        &signatures,
        &mut main_symbols,
    )?;
    if returns != Returns::Void {
        return Err(Error::MainReturns(program.main.location.clone()));
    }

    Ok(Analysis {
        main_symbols,
        definition_symbols,
    })
}

fn check_definition(
    definition: &mut Definition,
    signatures: &[Signature],
) -> Result<SymbolTable, Error> {
    let mut symbols = SymbolTable::new();
    for formal in &definition.formals {
        if symbols.has(&formal.name) {
            return Err(Error::DuplicateFormal(
                formal.location.clone(),
                formal.name.clone(),
            ));
        }
        symbols.add_formal(formal.name.clone(), formal.ty);
    }

    let expected = Returns::Always(definition.return_type);
    let returns = check_block(&mut definition.body, &expected, signatures, &mut symbols)?;
    match returns {
        Returns::Always(_) => Ok(symbols),
        Returns::Void => Err(Error::BodyNeverReturns(
            definition.body.location.clone(),
            definition.name.clone(),
        )),
        Returns::VoidOr(_) => Err(Error::BodyMightNotReturn(
            definition.body.location.clone(),
            definition.name.clone(),
        )),
    }
}

fn check_block(
    block: &mut Block,
    expected: &Returns,
    signatures: &[Signature],
    symbols: &mut SymbolTable,
) -> Result<Returns, Error> {
    let mut returns = Returns::Void;
    for statement in &mut block.statements {
        let location = statement.location().clone();
        let statement_returns = check_statement(statement, expected, signatures, symbols)?;
        returns = sequence(returns, statement_returns, &location)?;
    }
    Ok(returns)
}

/// Folds one statement's behavior into the running behavior of its block.
/// Statements after a definite return are dead but not an error.
fn sequence(first: Returns, second: Returns, location: &Location) -> Result<Returns, Error> {
    Ok(match (first, second) {
        (Returns::Void, second) => second,
        (Returns::Always(t), _) => Returns::Always(t),
        (Returns::VoidOr(t), Returns::Void) => Returns::VoidOr(t),
        (Returns::VoidOr(t), Returns::VoidOr(u)) if t == u => Returns::VoidOr(t),
        (Returns::VoidOr(t), Returns::Always(u)) if t == u => Returns::Always(u),
        (first, second) => {
            return Err(Error::BranchMismatch(location.clone(), first, second));
        }
    })
}

/// The least upper bound of two branches' behaviors.
fn join(first: Returns, second: Returns, location: &Location) -> Result<Returns, Error> {
    Ok(match (first, second) {
        (Returns::Void, Returns::Void) => Returns::Void,
        (Returns::Void, Returns::Always(t)) | (Returns::Always(t), Returns::Void) => {
            Returns::VoidOr(t)
        }
        (Returns::Void, Returns::VoidOr(t)) | (Returns::VoidOr(t), Returns::Void) => {
            Returns::VoidOr(t)
        }
        (Returns::Always(t), Returns::Always(u)) if t == u => Returns::Always(t),
        (Returns::VoidOr(t), Returns::VoidOr(u)) if t == u => Returns::VoidOr(t),
        (Returns::VoidOr(t), Returns::Always(u)) | (Returns::Always(u), Returns::VoidOr(t))
            if t == u =>
        {
            Returns::VoidOr(t)
        }
        (first, second) => {
            return Err(Error::BranchMismatch(location.clone(), first, second));
        }
    })
}

fn check_statement(
    statement: &mut Statement,
    expected: &Returns,
    signatures: &[Signature],
    symbols: &mut SymbolTable,
) -> Result<Returns, Error> {
    match statement {
        Statement::Intro {
            name,
            ty,
            expression,
            location,
        } => {
            if symbols.has(name) {
                return Err(Error::DuplicateIntroduction(location.clone(), name.clone()));
            }
            symbols.add_local(name.clone(), *ty);
            let expression_ty = check_expression(expression, signatures, symbols)?;
            if expression_ty != *ty {
                return Err(Error::TypeMismatch(
                    expression.location.clone(),
                    *ty,
                    expression_ty,
                ));
            }
            Ok(Returns::Void)
        }

        Statement::Assign {
            name,
            expression,
            location,
        } => {
            let name_ty = symbols
                .get(name)
                .ok_or_else(|| Error::NeverIntroduced(location.clone(), name.clone()))?
                .ty;
            let expression_ty = check_expression(expression, signatures, symbols)?;
            if expression_ty != name_ty {
                return Err(Error::TypeMismatch(
                    expression.location.clone(),
                    name_ty,
                    expression_ty,
                ));
            }
            Ok(Returns::Void)
        }

        Statement::PlusAssign {
            name,
            expression,
            location,
        } => check_compound_assign(name, expression, location, "+=", signatures, symbols),
        Statement::MinusAssign {
            name,
            expression,
            location,
        } => check_compound_assign(name, expression, location, "-=", signatures, symbols),
        Statement::TimesAssign {
            name,
            expression,
            location,
        } => check_compound_assign(name, expression, location, "*=", signatures, symbols),

        Statement::Print { args, .. } => {
            for arg in args {
                check_expression(arg, signatures, symbols)?;
            }
            Ok(Returns::Void)
        }

        Statement::Pass { .. } => Ok(Returns::Void),

        Statement::While {
            condition,
            body,
            location,
        } => {
            check_expression(condition, signatures, symbols)?;
            let body_returns = check_block(body, expected, signatures, symbols)?;
            // The loop may run zero times.
            join(body_returns, Returns::Void, location)
        }

        Statement::IfElse {
            condition,
            then_block,
            else_block,
            location,
        } => {
            check_expression(condition, signatures, symbols)?;
            let then_returns = check_block(then_block, expected, signatures, symbols)?;
            let else_returns = check_block(else_block, expected, signatures, symbols)?;
            join(then_returns, else_returns, location)
        }

        Statement::Return {
            value: None,
            location,
        } => match expected {
            Returns::Always(Type::None) | Returns::VoidOr(Type::None) => {
                Ok(Returns::Always(Type::None))
            }
            Returns::Always(t) | Returns::VoidOr(t) => Err(Error::ReturnTypeMismatch(
                location.clone(),
                *t,
                Type::None,
            )),
            Returns::Void => Err(Error::UnexpectedReturn(location.clone())),
        },

        Statement::Return {
            value: Some(expression),
            location,
        } => {
            let expression_ty = check_expression(expression, signatures, symbols)?;
            match expected {
                Returns::Void => Err(Error::UnexpectedReturn(location.clone())),
                Returns::Always(t) | Returns::VoidOr(t) => {
                    if expression_ty == *t {
                        Ok(Returns::Always(expression_ty))
                    } else {
                        Err(Error::ReturnTypeMismatch(
                            location.clone(),
                            *t,
                            expression_ty,
                        ))
                    }
                }
            }
        }

        Statement::Call {
            name,
            args,
            location,
        } => {
            let signature = lookup_signature(signatures, name)
                .ok_or_else(|| Error::UnknownFunction(location.clone(), name.clone()))?;
            if signature.return_type != Type::None {
                return Err(Error::FunctionCalledAsProcedure(
                    location.clone(),
                    name.clone(),
                ));
            }
            check_call_arguments(name, args, signature, location, signatures, symbols)?;
            Ok(Returns::Void)
        }
    }
}

fn check_compound_assign(
    name: &str,
    expression: &mut Expression,
    location: &Location,
    op: &str,
    signatures: &[Signature],
    symbols: &SymbolTable,
) -> Result<Returns, Error> {
    let name_ty = symbols
        .get(name)
        .ok_or_else(|| Error::NeverIntroduced(location.clone(), name.to_string()))?
        .ty;
    let expression_ty = check_expression(expression, signatures, symbols)?;
    // The lowered forms are integer ADD/SUB/MLT, so only int works.
    if name_ty != Type::Int || expression_ty != Type::Int {
        return Err(Error::WrongOperandTypes(location.clone(), op.to_string()));
    }
    Ok(Returns::Void)
}

fn check_call_arguments(
    name: &str,
    args: &mut [Expression],
    signature: &Signature,
    location: &Location,
    signatures: &[Signature],
    symbols: &SymbolTable,
) -> Result<(), Error> {
    if args.len() != signature.formal_types.len() {
        return Err(Error::ArityMismatch(
            location.clone(),
            name.to_string(),
            signature.formal_types.len(),
            args.len(),
        ));
    }
    for (arg, expected_ty) in args.iter_mut().zip(&signature.formal_types) {
        let arg_ty = check_expression(arg, signatures, symbols)?;
        if arg_ty != *expected_ty {
            return Err(Error::ArgumentTypeMismatch(
                arg.location.clone(),
                *expected_ty,
                arg_ty,
            ));
        }
    }
    Ok(())
}

fn check_expression(
    expression: &mut Expression,
    signatures: &[Signature],
    symbols: &SymbolTable,
) -> Result<Type, Error> {
    let location = expression.location.clone();
    let ty = match &mut expression.kind {
        ExpressionKind::Literal(value) => match value {
            Value::Int(_) => Type::Int,
            Value::Str(_) => Type::Str,
            Value::Bool(_) => Type::Bool,
            Value::None => Type::None,
        },

        ExpressionKind::Variable(name) => {
            symbols
                .get(name)
                .ok_or_else(|| Error::UnknownIdentifier(location.clone(), name.clone()))?
                .ty
        }

        ExpressionKind::Binary(op, left, right) => {
            let left_ty = check_expression(left, signatures, symbols)?;
            let right_ty = check_expression(right, signatures, symbols)?;
            match op {
                BinaryOperator::Add => {
                    if left_ty == Type::Int && right_ty == Type::Int {
                        Type::Int
                    } else if left_ty == Type::Str && right_ty == Type::Str {
                        Type::Str
                    } else {
                        return Err(Error::WrongOperandTypes(location, "+".to_string()));
                    }
                }
                BinaryOperator::Subtract
                | BinaryOperator::Multiply
                | BinaryOperator::Divide
                | BinaryOperator::Remainder => {
                    if left_ty == Type::Int && right_ty == Type::Int {
                        Type::Int
                    } else {
                        return Err(Error::WrongOperandTypes(
                            location,
                            op.symbol().to_string(),
                        ));
                    }
                }
                BinaryOperator::LessThan | BinaryOperator::LessOrEqual => {
                    if left_ty == Type::Int && right_ty == Type::Int {
                        Type::Bool
                    } else {
                        return Err(Error::WrongOperandTypes(
                            location,
                            op.symbol().to_string(),
                        ));
                    }
                }
                // `==` accepts any operand types; mismatched kinds just
                // compare unequal at run time.
                BinaryOperator::Equal => Type::Bool,
                // `and`/`or` resolve truthiness at run time.
                BinaryOperator::And | BinaryOperator::Or => Type::Bool,
            }
        }

        ExpressionKind::Not(operand) => {
            check_expression(operand, signatures, symbols)?;
            Type::Bool
        }

        ExpressionKind::Input(prompt) => {
            let prompt_ty = check_expression(prompt, signatures, symbols)?;
            if prompt_ty != Type::Str {
                return Err(Error::InputPromptNotString(location, prompt_ty));
            }
            Type::Str
        }

        ExpressionKind::IntCast(operand) => {
            let operand_ty = check_expression(operand, signatures, symbols)?;
            if operand_ty == Type::None {
                return Err(Error::CannotConvertNone(location, "int"));
            }
            Type::Int
        }

        ExpressionKind::StrCast(operand) => {
            let operand_ty = check_expression(operand, signatures, symbols)?;
            if operand_ty == Type::None {
                return Err(Error::CannotConvertNone(location, "str"));
            }
            Type::Str
        }

        ExpressionKind::Call(name, args) => {
            let signature = lookup_signature(signatures, name)
                .ok_or_else(|| Error::UnknownFunction(location.clone(), name.clone()))?;
            if signature.return_type == Type::None {
                return Err(Error::ProcedureCalledAsFunction(location, name.clone()));
            }
            check_call_arguments(name, args, signature, &location, signatures, symbols)?;
            signature.return_type
        }
    };

    expression.ty = Some(ty);
    Ok(ty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;
    use crate::parser::parse;
    use assert_matches::assert_matches;

    fn analysed(src: &str) -> Result<(Program, Analysis), Error> {
        let tokens = lex(src, "test.slpy").expect("lexing should succeed");
        let mut program = parse(&tokens, "test.slpy").expect("parsing should succeed");
        let analysis = analyse(&mut program)?;
        Ok((program, analysis))
    }

    #[test]
    fn test_intro_records_local() {
        let (_, analysis) = analysed("x : int = 3\nprint(x)\n").unwrap();
        let info = analysis.main_symbols.get("x").unwrap();
        assert_eq!(info.ty, Type::Int);
        assert_eq!(info.kind, SymbolKind::Local);
    }

    #[test]
    fn test_expression_types_are_recorded() {
        let (program, _) = analysed("x : int = 1 + 2\n").unwrap();
        let Statement::Intro { expression, .. } = &program.main.statements[0] else {
            panic!("expected an introduction");
        };
        assert_eq!(expression.ty, Some(Type::Int));
        let ExpressionKind::Binary(_, left, right) = &expression.kind else {
            panic!("expected a binary expression");
        };
        assert_eq!(left.ty, Some(Type::Int));
        assert_eq!(right.ty, Some(Type::Int));
    }

    #[test]
    fn test_string_plus_is_str() {
        let (program, _) = analysed("s : str = \"a\" + \"b\"\n").unwrap();
        let Statement::Intro { expression, .. } = &program.main.statements[0] else {
            panic!("expected an introduction");
        };
        assert_eq!(expression.ty, Some(Type::Str));
    }

    #[test]
    fn test_mixed_plus_is_rejected() {
        assert_matches!(
            analysed("x : int = 1 + \"a\"\n"),
            Err(Error::WrongOperandTypes(_, op)) if op == "+"
        );
    }

    #[test]
    fn test_unknown_identifier() {
        assert_matches!(
            analysed("print(y)\n"),
            Err(Error::UnknownIdentifier(location, name))
                if name == "y" && location.line == 1
        );
    }

    #[test]
    fn test_assign_before_intro() {
        assert_matches!(
            analysed("x = 3\n"),
            Err(Error::NeverIntroduced(_, name)) if name == "x"
        );
    }

    #[test]
    fn test_duplicate_introduction() {
        assert_matches!(
            analysed("x : int = 1\nx : int = 2\n"),
            Err(Error::DuplicateIntroduction(location, name))
                if name == "x" && location.line == 2
        );
    }

    #[test]
    fn test_intro_type_mismatch() {
        assert_matches!(
            analysed("x : int = \"three\"\n"),
            Err(Error::TypeMismatch(_, Type::Int, Type::Str))
        );
    }

    #[test]
    fn test_compound_assign_requires_int() {
        assert_matches!(
            analysed("s : str = \"a\"\ns += \"b\"\n"),
            Err(Error::WrongOperandTypes(_, op)) if op == "+="
        );
    }

    #[test]
    fn test_equality_accepts_any_types() {
        let (program, _) = analysed("b : bool = 1 == \"one\"\n").unwrap();
        let Statement::Intro { expression, .. } = &program.main.statements[0] else {
            panic!("expected an introduction");
        };
        assert_eq!(expression.ty, Some(Type::Bool));
    }

    #[test]
    fn test_return_in_main_is_rejected() {
        assert_matches!(analysed("return 3\n"), Err(Error::UnexpectedReturn(_)));
    }

    #[test]
    fn test_function_must_return_on_every_path() {
        let src = "\
def sgn(n : int) -> int:
    if n < 0:
        return 0 - 1
    else:
        pass
print(sgn(3))
";
        assert_matches!(
            analysed(src),
            Err(Error::BodyMightNotReturn(_, name)) if name == "sgn"
        );
    }

    #[test]
    fn test_if_else_joins_to_definite_return() {
        let src = "\
def sgn(n : int) -> int:
    if n < 0:
        return 0 - 1
    else:
        return 1
print(sgn(3))
";
        assert!(analysed(src).is_ok());
    }

    #[test]
    fn test_while_alone_cannot_satisfy_return() {
        let src = "\
def f(n : int) -> int:
    while n < 10:
        return n
    pass
print(f(3))
";
        assert_matches!(analysed(src), Err(Error::BodyMightNotReturn(_, _)));
    }

    #[test]
    fn test_fallthrough_after_possible_return_is_definite() {
        let src = "\
def f(n : int) -> int:
    if n < 0:
        return 0
    else:
        pass
    return n
print(f(3))
";
        assert!(analysed(src).is_ok());
    }

    #[test]
    fn test_procedure_needs_explicit_return() {
        let src = "\
def g(b : bool) -> None:
    if b:
        return
    else:
        pass
    return
g(True)
";
        assert!(analysed(src).is_ok());
    }

    #[test]
    fn test_procedure_called_as_function() {
        let src = "\
def p() -> None:
    return
x : int = p()
";
        assert_matches!(
            analysed(src),
            Err(Error::ProcedureCalledAsFunction(_, name)) if name == "p"
        );
    }

    #[test]
    fn test_function_called_as_procedure() {
        let src = "\
def f() -> int:
    return 1
f()
";
        assert_matches!(
            analysed(src),
            Err(Error::FunctionCalledAsProcedure(_, name)) if name == "f"
        );
    }

    #[test]
    fn test_arity_mismatch() {
        let src = "\
def f(a : int, b : int) -> int:
    return a + b
print(f(1))
";
        assert_matches!(
            analysed(src),
            Err(Error::ArityMismatch(_, name, 2, 1)) if name == "f"
        );
    }

    #[test]
    fn test_argument_type_mismatch() {
        let src = "\
def f(a : int) -> int:
    return a
print(f(\"one\"))
";
        assert_matches!(
            analysed(src),
            Err(Error::ArgumentTypeMismatch(_, Type::Int, Type::Str))
        );
    }

    #[test]
    fn test_input_prompt_must_be_str() {
        assert_matches!(
            analysed("s : str = input(3)\n"),
            Err(Error::InputPromptNotString(_, Type::Int))
        );
    }

    #[test]
    fn test_cannot_convert_none() {
        assert_matches!(
            analysed("x : int = int(None)\n"),
            Err(Error::CannotConvertNone(_, "int"))
        );
    }

    #[test]
    fn test_bare_return_needs_none_expectation() {
        let src = "\
def f() -> int:
    return
print(f())
";
        assert_matches!(
            analysed(src),
            Err(Error::ReturnTypeMismatch(_, Type::Int, Type::None))
        );
    }

    #[test]
    fn test_last_definition_wins() {
        let src = "\
def f() -> int:
    return 1
def f() -> str:
    return \"one\"
s : str = f()
";
        assert!(analysed(src).is_ok());
    }

    #[test]
    fn test_statements_after_definite_return_are_dead_but_legal() {
        let src = "\
def f() -> int:
    return 1
    print(\"unreachable\")
print(f())
";
        assert!(analysed(src).is_ok());
    }

    #[test]
    fn test_analysis_is_idempotent() {
        let src = "\
def sq(n : int) -> int:
    return n * n
x : int = 3
print(sq(x))
";
        let tokens = lex(src, "test.slpy").unwrap();
        let mut program = parse(&tokens, "test.slpy").unwrap();
        analyse(&mut program).unwrap();
        let first = program.clone();
        analyse(&mut program).unwrap();
        assert_eq!(first, program);
    }
}
