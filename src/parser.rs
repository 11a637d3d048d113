//! Recursive-descent parser over the lexer's token stream.
//!
//! Each grammar production is a winnow parser over a `TokenSlice`;
//! alternatives backtrack, so statement forms that all begin with a name
//! (introduction, assignment, compound assignment, call) sort themselves
//! out without lookahead plumbing.

use crate::ast::{
    BinaryOperator, Block, Definition, Expression, ExpressionKind, Formal, Name, Program,
    Statement,
};
use crate::lexer::{Keyword, Token, TokenKind};
use crate::semantics::Type;
use crate::util::Location;
use crate::value::Value;
use thiserror::Error;
use winnow::combinator::{alt, opt, repeat, separated};
use winnow::error::{ContextError, ErrMode, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::stream::TokenSlice;
use winnow::token::any;

#[derive(Debug, PartialEq, Error)]
#[error("{location}: {message}")]
pub struct ParserError {
    pub message: String,
    pub location: Location,
}

impl ParserError {
    // Avoiding `From` so winnow types don't become part of our public API
    fn from_parse(
        error: winnow::error::ParseError<Tokens<'_>, ContextError>,
        tokens: &[Token],
        source_name: &str,
    ) -> Self {
        let expected = error
            .inner()
            .context()
            .filter_map(|c| match c {
                StrContext::Expected(e) => Some(e.to_string()),
                _ => None,
            })
            .next()
            .unwrap_or_else(|| "valid syntax".to_string());

        let (found, location) = match tokens.get(error.offset()) {
            Some(token) => (describe(&token.kind), token.location.clone()),
            None => (
                "end of input".to_string(),
                tokens
                    .last()
                    .map(|t| t.location.clone())
                    .unwrap_or_else(|| Location::whole_file(source_name)),
            ),
        };

        ParserError {
            message: format!("expected {expected}, found {found}"),
            location,
        }
    }
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Keyword(k) => format!("keyword {k:?}"),
        TokenKind::Name(n) => format!("name '{n}'"),
        TokenKind::Number(n) => format!("number {n}"),
        TokenKind::StringLiteral(_) => "string literal".to_string(),
        TokenKind::Newline => "end of line".to_string(),
        TokenKind::Indent => "indent".to_string(),
        TokenKind::Dedent => "dedent".to_string(),
        other => format!("{other:?}"),
    }
}

type Tokens<'i> = TokenSlice<'i, Token>;

pub fn parse(tokens: &[Token], source_name: &str) -> Result<Program, ParserError> {
    let stream = Tokens::new(tokens);
    program
        .parse(stream)
        .map_err(|e| ParserError::from_parse(e, tokens, source_name))
}

/// Matches a single token of the given kind, yielding the token itself so
/// callers can pick up its location.
fn token<'i>(kind: TokenKind) -> impl Parser<Tokens<'i>, &'i Token, ErrMode<ContextError>> {
    any.verify(move |t: &Token| t.kind == kind)
}

fn program(i: &mut Tokens<'_>) -> winnow::ModalResult<Program> {
    let definitions: Vec<Definition> = repeat(0.., definition).parse_next(i)?;
    let statements: Vec<Statement> = repeat(1.., statement)
        .context(StrContext::Label("program"))
        .context(StrContext::Expected(StrContextValue::Description(
            "statement",
        )))
        .parse_next(i)?;
    let main_location = statements[0].location().clone();
    let location = definitions
        .first()
        .map(|d| d.location.clone())
        .unwrap_or_else(|| main_location.clone());
    Ok(Program {
        definitions,
        main: Block {
            statements,
            location: main_location,
        },
        location,
    })
}

fn definition(i: &mut Tokens<'_>) -> winnow::ModalResult<Definition> {
    let def = token(TokenKind::Keyword(Keyword::Def)).parse_next(i)?;
    let (name, _) = name
        .context(StrContext::Label("definition"))
        .context(StrContext::Expected(StrContextValue::Description(
            "function name",
        )))
        .parse_next(i)?;
    token(TokenKind::OpenParen)
        .context(StrContext::Expected(StrContextValue::StringLiteral("(")))
        .parse_next(i)?;
    let formals: Vec<Formal> =
        separated(0.., formal, token(TokenKind::Comma)).parse_next(i)?;
    token(TokenKind::CloseParen)
        .context(StrContext::Expected(StrContextValue::StringLiteral(")")))
        .parse_next(i)?;
    token(TokenKind::Arrow)
        .context(StrContext::Expected(StrContextValue::StringLiteral("->")))
        .parse_next(i)?;
    let return_type = type_name
        .context(StrContext::Expected(StrContextValue::Description("type")))
        .parse_next(i)?;
    let body = block.parse_next(i)?;
    Ok(Definition {
        name,
        formals,
        return_type,
        body,
        location: def.location.clone(),
    })
}

fn formal(i: &mut Tokens<'_>) -> winnow::ModalResult<Formal> {
    let (name, location) = name.parse_next(i)?;
    token(TokenKind::Colon)
        .context(StrContext::Expected(StrContextValue::StringLiteral(":")))
        .parse_next(i)?;
    let ty = type_name
        .context(StrContext::Expected(StrContextValue::Description("type")))
        .parse_next(i)?;
    Ok(Formal { name, ty, location })
}

fn type_name(i: &mut Tokens<'_>) -> winnow::ModalResult<Type> {
    any.try_map(|t: &Token| match t.kind {
        TokenKind::Keyword(Keyword::Int) => Ok(Type::Int),
        TokenKind::Keyword(Keyword::Str) => Ok(Type::Str),
        TokenKind::Keyword(Keyword::Bool) => Ok(Type::Bool),
        TokenKind::Keyword(Keyword::None) => Ok(Type::None),
        _ => Err(ParserError {
            message: "expected a type".to_string(),
            location: t.location.clone(),
        }),
    })
    .parse_next(i)
}

/// A `:`-introduced, indented, non-empty sequence of statements.
fn block(i: &mut Tokens<'_>) -> winnow::ModalResult<Block> {
    token(TokenKind::Colon)
        .context(StrContext::Expected(StrContextValue::StringLiteral(":")))
        .parse_next(i)?;
    token(TokenKind::Newline)
        .context(StrContext::Expected(StrContextValue::Description(
            "end of line",
        )))
        .parse_next(i)?;
    token(TokenKind::Indent)
        .context(StrContext::Expected(StrContextValue::Description(
            "indented block",
        )))
        .parse_next(i)?;
    let statements: Vec<Statement> = repeat(1.., statement).parse_next(i)?;
    token(TokenKind::Dedent).parse_next(i)?;
    let location = statements[0].location().clone();
    Ok(Block {
        statements,
        location,
    })
}

fn statement(i: &mut Tokens<'_>) -> winnow::ModalResult<Statement> {
    alt((
        print_statement,
        pass_statement,
        while_statement,
        if_statement,
        return_statement,
        intro_statement,
        plus_assign_statement,
        minus_assign_statement,
        times_assign_statement,
        assign_statement,
        call_statement,
    ))
    .context(StrContext::Label("statement"))
    .context(StrContext::Expected(StrContextValue::Description(
        "statement",
    )))
    .parse_next(i)
}

fn print_statement(i: &mut Tokens<'_>) -> winnow::ModalResult<Statement> {
    let print = token(TokenKind::Keyword(Keyword::Print)).parse_next(i)?;
    token(TokenKind::OpenParen).parse_next(i)?;
    let args: Vec<Expression> =
        separated(0.., expression, token(TokenKind::Comma)).parse_next(i)?;
    token(TokenKind::CloseParen).parse_next(i)?;
    token(TokenKind::Newline).parse_next(i)?;
    Ok(Statement::Print {
        args,
        location: print.location.clone(),
    })
}

fn pass_statement(i: &mut Tokens<'_>) -> winnow::ModalResult<Statement> {
    let pass = token(TokenKind::Keyword(Keyword::Pass)).parse_next(i)?;
    token(TokenKind::Newline).parse_next(i)?;
    Ok(Statement::Pass {
        location: pass.location.clone(),
    })
}

fn while_statement(i: &mut Tokens<'_>) -> winnow::ModalResult<Statement> {
    let kw = token(TokenKind::Keyword(Keyword::While)).parse_next(i)?;
    let condition = expression.parse_next(i)?;
    let body = block.parse_next(i)?;
    Ok(Statement::While {
        condition,
        body,
        location: kw.location.clone(),
    })
}

fn if_statement(i: &mut Tokens<'_>) -> winnow::ModalResult<Statement> {
    let kw = token(TokenKind::Keyword(Keyword::If)).parse_next(i)?;
    let condition = expression.parse_next(i)?;
    let then_block = block.parse_next(i)?;
    token(TokenKind::Keyword(Keyword::Else))
        .context(StrContext::Expected(StrContextValue::Description("else")))
        .parse_next(i)?;
    let else_block = block.parse_next(i)?;
    Ok(Statement::IfElse {
        condition,
        then_block,
        else_block,
        location: kw.location.clone(),
    })
}

fn return_statement(i: &mut Tokens<'_>) -> winnow::ModalResult<Statement> {
    let kw = token(TokenKind::Keyword(Keyword::Return)).parse_next(i)?;
    let value = opt(expression).parse_next(i)?;
    token(TokenKind::Newline).parse_next(i)?;
    Ok(Statement::Return {
        value,
        location: kw.location.clone(),
    })
}

fn intro_statement(i: &mut Tokens<'_>) -> winnow::ModalResult<Statement> {
    let (name, location) = name.parse_next(i)?;
    token(TokenKind::Colon).parse_next(i)?;
    let ty = type_name.parse_next(i)?;
    token(TokenKind::Assign).parse_next(i)?;
    let expression = expression
        .context(StrContext::Expected(StrContextValue::Description(
            "expression",
        )))
        .parse_next(i)?;
    token(TokenKind::Newline).parse_next(i)?;
    Ok(Statement::Intro {
        name,
        ty,
        expression,
        location,
    })
}

fn assign_statement(i: &mut Tokens<'_>) -> winnow::ModalResult<Statement> {
    let (name, location) = name.parse_next(i)?;
    token(TokenKind::Assign).parse_next(i)?;
    let expression = expression.parse_next(i)?;
    token(TokenKind::Newline).parse_next(i)?;
    Ok(Statement::Assign {
        name,
        expression,
        location,
    })
}

fn plus_assign_statement(i: &mut Tokens<'_>) -> winnow::ModalResult<Statement> {
    let (name, location) = name.parse_next(i)?;
    token(TokenKind::PlusAssign).parse_next(i)?;
    let expression = expression.parse_next(i)?;
    token(TokenKind::Newline).parse_next(i)?;
    Ok(Statement::PlusAssign {
        name,
        expression,
        location,
    })
}

fn minus_assign_statement(i: &mut Tokens<'_>) -> winnow::ModalResult<Statement> {
    let (name, location) = name.parse_next(i)?;
    token(TokenKind::MinusAssign).parse_next(i)?;
    let expression = expression.parse_next(i)?;
    token(TokenKind::Newline).parse_next(i)?;
    Ok(Statement::MinusAssign {
        name,
        expression,
        location,
    })
}

fn times_assign_statement(i: &mut Tokens<'_>) -> winnow::ModalResult<Statement> {
    let (name, location) = name.parse_next(i)?;
    token(TokenKind::TimesAssign).parse_next(i)?;
    let expression = expression.parse_next(i)?;
    token(TokenKind::Newline).parse_next(i)?;
    Ok(Statement::TimesAssign {
        name,
        expression,
        location,
    })
}

fn call_statement(i: &mut Tokens<'_>) -> winnow::ModalResult<Statement> {
    let (name, location) = name.parse_next(i)?;
    token(TokenKind::OpenParen).parse_next(i)?;
    let args: Vec<Expression> =
        separated(0.., expression, token(TokenKind::Comma)).parse_next(i)?;
    token(TokenKind::CloseParen).parse_next(i)?;
    token(TokenKind::Newline).parse_next(i)?;
    Ok(Statement::Call {
        name,
        args,
        location,
    })
}

// Expressions, loosest binding first.

fn expression(i: &mut Tokens<'_>) -> winnow::ModalResult<Expression> {
    disjunction(i)
}

fn binary(op: BinaryOperator, left: Expression, right: Expression) -> Expression {
    let location = left.location.clone();
    Expression::new(
        ExpressionKind::Binary(op, Box::new(left), Box::new(right)),
        location,
    )
}

fn disjunction(i: &mut Tokens<'_>) -> winnow::ModalResult<Expression> {
    let mut expression = conjunction(i)?;
    while opt(token(TokenKind::Keyword(Keyword::Or)))
        .parse_next(i)?
        .is_some()
    {
        let right = conjunction(i)?;
        expression = binary(BinaryOperator::Or, expression, right);
    }
    Ok(expression)
}

fn conjunction(i: &mut Tokens<'_>) -> winnow::ModalResult<Expression> {
    let mut expression = inversion(i)?;
    while opt(token(TokenKind::Keyword(Keyword::And)))
        .parse_next(i)?
        .is_some()
    {
        let right = inversion(i)?;
        expression = binary(BinaryOperator::And, expression, right);
    }
    Ok(expression)
}

fn inversion(i: &mut Tokens<'_>) -> winnow::ModalResult<Expression> {
    if let Some(not) = opt(token(TokenKind::Keyword(Keyword::Not))).parse_next(i)? {
        let operand = inversion(i)?;
        return Ok(Expression::new(
            ExpressionKind::Not(Box::new(operand)),
            not.location.clone(),
        ));
    }
    comparison(i)
}

// Comparisons do not chain: `a < b < c` is a parse error.
fn comparison(i: &mut Tokens<'_>) -> winnow::ModalResult<Expression> {
    let left = additive(i)?;
    let op = opt(alt((
        token(TokenKind::LessThan).value(BinaryOperator::LessThan),
        token(TokenKind::LessOrEqual).value(BinaryOperator::LessOrEqual),
        token(TokenKind::EqualEqual).value(BinaryOperator::Equal),
    )))
    .parse_next(i)?;
    match op {
        Some(op) => {
            let right = additive(i)?;
            Ok(binary(op, left, right))
        }
        None => Ok(left),
    }
}

fn additive(i: &mut Tokens<'_>) -> winnow::ModalResult<Expression> {
    let mut expression = multiplicative(i)?;
    loop {
        let op = opt(alt((
            token(TokenKind::Plus).value(BinaryOperator::Add),
            token(TokenKind::Minus).value(BinaryOperator::Subtract),
        )))
        .parse_next(i)?;
        let Some(op) = op else { break };
        let right = multiplicative(i)?;
        expression = binary(op, expression, right);
    }
    Ok(expression)
}

fn multiplicative(i: &mut Tokens<'_>) -> winnow::ModalResult<Expression> {
    let mut expression = atom(i)?;
    loop {
        let op = opt(alt((
            token(TokenKind::Star).value(BinaryOperator::Multiply),
            token(TokenKind::SlashSlash).value(BinaryOperator::Divide),
            token(TokenKind::Percent).value(BinaryOperator::Remainder),
        )))
        .parse_next(i)?;
        let Some(op) = op else { break };
        let right = atom(i)?;
        expression = binary(op, expression, right);
    }
    Ok(expression)
}

fn atom(i: &mut Tokens<'_>) -> winnow::ModalResult<Expression> {
    alt((
        literal_atom,
        input_expression,
        int_cast,
        str_cast,
        call_expression,
        variable,
        parenthesised,
    ))
    .context(StrContext::Label("expression"))
    .context(StrContext::Expected(StrContextValue::Description(
        "expression",
    )))
    .parse_next(i)
}

fn literal_atom(i: &mut Tokens<'_>) -> winnow::ModalResult<Expression> {
    any.try_map(|t: &Token| {
        let value = match &t.kind {
            TokenKind::Number(n) => Value::Int(*n),
            TokenKind::StringLiteral(s) => Value::Str(s.clone()),
            TokenKind::Keyword(Keyword::True) => Value::Bool(true),
            TokenKind::Keyword(Keyword::False) => Value::Bool(false),
            TokenKind::Keyword(Keyword::None) => Value::None,
            _ => {
                return Err(ParserError {
                    message: "expected a literal".to_string(),
                    location: t.location.clone(),
                });
            }
        };
        Ok(Expression::new(
            ExpressionKind::Literal(value),
            t.location.clone(),
        ))
    })
    .parse_next(i)
}

fn input_expression(i: &mut Tokens<'_>) -> winnow::ModalResult<Expression> {
    let kw = token(TokenKind::Keyword(Keyword::Input)).parse_next(i)?;
    token(TokenKind::OpenParen).parse_next(i)?;
    let prompt = expression.parse_next(i)?;
    token(TokenKind::CloseParen).parse_next(i)?;
    Ok(Expression::new(
        ExpressionKind::Input(Box::new(prompt)),
        kw.location.clone(),
    ))
}

fn int_cast(i: &mut Tokens<'_>) -> winnow::ModalResult<Expression> {
    let kw = token(TokenKind::Keyword(Keyword::Int)).parse_next(i)?;
    token(TokenKind::OpenParen).parse_next(i)?;
    let operand = expression.parse_next(i)?;
    token(TokenKind::CloseParen).parse_next(i)?;
    Ok(Expression::new(
        ExpressionKind::IntCast(Box::new(operand)),
        kw.location.clone(),
    ))
}

fn str_cast(i: &mut Tokens<'_>) -> winnow::ModalResult<Expression> {
    let kw = token(TokenKind::Keyword(Keyword::Str)).parse_next(i)?;
    token(TokenKind::OpenParen).parse_next(i)?;
    let operand = expression.parse_next(i)?;
    token(TokenKind::CloseParen).parse_next(i)?;
    Ok(Expression::new(
        ExpressionKind::StrCast(Box::new(operand)),
        kw.location.clone(),
    ))
}

fn call_expression(i: &mut Tokens<'_>) -> winnow::ModalResult<Expression> {
    let (name, location) = name.parse_next(i)?;
    token(TokenKind::OpenParen).parse_next(i)?;
    let args: Vec<Expression> =
        separated(0.., expression, token(TokenKind::Comma)).parse_next(i)?;
    token(TokenKind::CloseParen).parse_next(i)?;
    Ok(Expression::new(ExpressionKind::Call(name, args), location))
}

fn variable(i: &mut Tokens<'_>) -> winnow::ModalResult<Expression> {
    let (name, location) = name.parse_next(i)?;
    Ok(Expression::new(ExpressionKind::Variable(name), location))
}

fn parenthesised(i: &mut Tokens<'_>) -> winnow::ModalResult<Expression> {
    token(TokenKind::OpenParen).parse_next(i)?;
    let inner = expression.parse_next(i)?;
    token(TokenKind::CloseParen).parse_next(i)?;
    Ok(inner)
}

fn name(i: &mut Tokens<'_>) -> winnow::ModalResult<(Name, Location)> {
    any.try_map(|t: &Token| match &t.kind {
        TokenKind::Name(n) => Ok((n.clone(), t.location.clone())),
        _ => Err(ParserError {
            message: "expected a name".to_string(),
            location: t.location.clone(),
        }),
    })
    .parse_next(i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;
    use assert_matches::assert_matches;

    fn parse_source(src: &str) -> Result<Program, ParserError> {
        let tokens = lex(src, "test.slpy").expect("lexing should succeed");
        parse(&tokens, "test.slpy")
    }

    #[test]
    fn test_hello_world() {
        let program = parse_source("print(\"Hello, world!\")\n").unwrap();
        assert!(program.definitions.is_empty());
        assert_matches!(
            &program.main.statements[..],
            [Statement::Print { args, .. }]
                if matches!(&args[0].kind,
                    ExpressionKind::Literal(Value::Str(s)) if s == "Hello, world!")
        );
    }

    #[test]
    fn test_intro_and_precedence() {
        let program = parse_source("x : int = 1 + 2 * 3\n").unwrap();
        let Statement::Intro {
            name,
            ty,
            expression,
            ..
        } = &program.main.statements[0]
        else {
            panic!("expected an introduction");
        };
        assert_eq!(name, "x");
        assert_eq!(*ty, Type::Int);
        // 1 + (2 * 3)
        assert_matches!(
            &expression.kind,
            ExpressionKind::Binary(BinaryOperator::Add, left, right)
                if matches!(left.kind, ExpressionKind::Literal(Value::Int(1)))
                    && matches!(right.kind, ExpressionKind::Binary(BinaryOperator::Multiply, _, _))
        );
    }

    #[test]
    fn test_parenthesised_grouping() {
        let program = parse_source("x : int = (1 + 2) * 3\n").unwrap();
        let Statement::Intro { expression, .. } = &program.main.statements[0] else {
            panic!("expected an introduction");
        };
        assert_matches!(
            &expression.kind,
            ExpressionKind::Binary(BinaryOperator::Multiply, left, _)
                if matches!(left.kind, ExpressionKind::Binary(BinaryOperator::Add, _, _))
        );
    }

    #[test]
    fn test_definition() {
        let src = "def sq(n : int) -> int:\n    return n * n\nprint(sq(7))\n";
        let program = parse_source(src).unwrap();
        assert_eq!(program.definitions.len(), 1);
        let def = &program.definitions[0];
        assert_eq!(def.name, "sq");
        assert_eq!(def.formals.len(), 1);
        assert_eq!(def.formals[0].ty, Type::Int);
        assert_eq!(def.return_type, Type::Int);
        assert_matches!(
            &def.body.statements[..],
            [Statement::Return { value: Some(_), .. }]
        );
    }

    #[test]
    fn test_if_else_and_while() {
        let src = "\
while x < 10:
    if x == 5:
        x += 2
    else:
        x += 1
print(x)
";
        let program = parse_source(src).unwrap();
        let Statement::While { body, .. } = &program.main.statements[0] else {
            panic!("expected a while loop");
        };
        assert_matches!(&body.statements[..], [Statement::IfElse { .. }]);
    }

    #[test]
    fn test_logic_precedence() {
        // `not a and b or c` parses as `((not a) and b) or c`
        let program = parse_source("x : bool = not a and b or c\n").unwrap();
        let Statement::Intro { expression, .. } = &program.main.statements[0] else {
            panic!("expected an introduction");
        };
        assert_matches!(
            &expression.kind,
            ExpressionKind::Binary(BinaryOperator::Or, left, _)
                if matches!(&left.kind,
                    ExpressionKind::Binary(BinaryOperator::And, inner, _)
                        if matches!(inner.kind, ExpressionKind::Not(_)))
        );
    }

    #[test]
    fn test_bare_and_valued_return() {
        let src = "\
def f() -> None:
    return
def g() -> int:
    return 1
pass
";
        let program = parse_source(src).unwrap();
        assert_matches!(
            &program.definitions[0].body.statements[..],
            [Statement::Return { value: None, .. }]
        );
        assert_matches!(
            &program.definitions[1].body.statements[..],
            [Statement::Return { value: Some(_), .. }]
        );
    }

    #[test]
    fn test_error_reports_location() {
        let err = parse_source("x = \n").unwrap_err();
        assert_eq!(err.location.line, 1);
        assert!(err.message.contains("expected"));
    }

    #[test]
    fn test_error_if_without_else() {
        assert_matches!(
            parse_source("if x:\n    pass\npass\n"),
            Err(ParserError { message, .. }) if message.contains("expected")
        );
    }

    #[test]
    fn test_empty_input_is_an_error() {
        assert_matches!(parse_source(""), Err(ParserError { .. }));
    }
}
