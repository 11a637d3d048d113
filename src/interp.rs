//! The tree-walking interpreter.
//!
//! Statements execute against a context mapping names to values; a
//! statement yields `Some(value)` to mean "return this value upward", and
//! the nearest enclosing call catches it. Calls get a fresh context holding
//! only their argument bindings.
//!
//! The interpreter is deliberately robust without prior checking: every
//! type assumption is re-verified at run time and reported as a located
//! error.

use crate::ast::{
    BinaryOperator, Block, Definition, Expression, ExpressionKind, Name, Program, Statement,
};
use crate::util::Location;
use crate::value::Value;
use std::collections::HashMap;
use std::io::{BufRead, Write};
use thiserror::Error;

pub type Context = HashMap<Name, Value>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}: run-time error: variable '{1}' not defined")]
    UndefinedVariable(Location, Name),

    #[error("{0}: run-time error: division by 0")]
    DivisionByZero(Location),

    #[error("{0}: run-time error: wrong operand type for {1}")]
    WrongOperandType(Location, String),

    #[error("{0}: run-time error: prompt is not a string")]
    PromptNotString(Location),

    #[error("{0}: run-time error: \"{1}\" cannot be converted to an int")]
    BadIntParse(Location, String),

    #[error("{0}: run-time error: cannot convert to an int")]
    CannotConvertToInt(Location),

    #[error("{0}: run-time error: function or procedure '{1}' is not defined")]
    UndefinedFunction(Location, Name),

    #[error("{0}: run-time error: incorrect number of arguments for '{1}': expected {2}, saw {3}")]
    ArityMismatch(Location, Name, usize, usize),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Runs the program's main block with an empty context.
pub fn run<R: BufRead, W: Write>(
    program: &Program,
    input: &mut R,
    output: &mut W,
) -> Result<(), Error> {
    let mut machine = Machine {
        definitions: &program.definitions,
        input,
        output,
    };
    let mut context = Context::new();
    machine.exec_block(&program.main, &mut context)?;
    machine.output.flush()?;
    Ok(())
}

struct Machine<'a, R, W> {
    definitions: &'a [Definition],
    input: &'a mut R,
    output: &'a mut W,
}

impl<R: BufRead, W: Write> Machine<'_, R, W> {
    fn exec_block(&mut self, block: &Block, context: &mut Context) -> Result<Option<Value>, Error> {
        for statement in &block.statements {
            if let Some(value) = self.exec_statement(statement, context)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    fn exec_statement(
        &mut self,
        statement: &Statement,
        context: &mut Context,
    ) -> Result<Option<Value>, Error> {
        match statement {
            Statement::Intro {
                name, expression, ..
            }
            | Statement::Assign {
                name, expression, ..
            } => {
                let value = self.eval(expression, context)?;
                context.insert(name.clone(), value);
                Ok(None)
            }

            Statement::PlusAssign {
                name,
                expression,
                location,
            } => self.compound_assign(name, expression, location, "+=", context),
            Statement::MinusAssign {
                name,
                expression,
                location,
            } => self.compound_assign(name, expression, location, "-=", context),
            Statement::TimesAssign {
                name,
                expression,
                location,
            } => self.compound_assign(name, expression, location, "*=", context),

            Statement::Print { args, .. } => {
                for arg in args {
                    let value = self.eval(arg, context)?;
                    writeln!(self.output, "{}", value.to_display_string())?;
                }
                Ok(None)
            }

            Statement::Pass { .. } => Ok(None),

            Statement::While {
                condition, body, ..
            } => {
                loop {
                    let value = self.eval(condition, context)?;
                    if !value.is_truthy() {
                        break;
                    }
                    if let Some(returned) = self.exec_block(body, context)? {
                        return Ok(Some(returned));
                    }
                }
                Ok(None)
            }

            Statement::IfElse {
                condition,
                then_block,
                else_block,
                ..
            } => {
                let value = self.eval(condition, context)?;
                if value.is_truthy() {
                    self.exec_block(then_block, context)
                } else {
                    self.exec_block(else_block, context)
                }
            }

            Statement::Return { value: None, .. } => Ok(Some(Value::None)),
            Statement::Return {
                value: Some(expression),
                ..
            } => Ok(Some(self.eval(expression, context)?)),

            Statement::Call {
                name,
                args,
                location,
            } => {
                self.call(name, args, context, location)?;
                Ok(None)
            }
        }
    }

    fn compound_assign(
        &mut self,
        name: &str,
        expression: &Expression,
        location: &Location,
        op: &str,
        context: &mut Context,
    ) -> Result<Option<Value>, Error> {
        let current = context
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UndefinedVariable(location.clone(), name.to_string()))?;
        let value = self.eval(expression, context)?;
        let combined = match (current, value) {
            (Value::Int(a), Value::Int(b)) => match op {
                "+=" => Value::Int(a + b),
                "-=" => Value::Int(a - b),
                _ => Value::Int(a * b),
            },
            _ => {
                return Err(Error::WrongOperandType(location.clone(), op.to_string()));
            }
        };
        context.insert(name.to_string(), combined);
        Ok(None)
    }

    /// Finds the definition by last-match-wins, binds the evaluated
    /// arguments into a fresh context, and runs the body. Falling off the
    /// end of the body yields `None`.
    fn call(
        &mut self,
        name: &str,
        args: &[Expression],
        context: &Context,
        location: &Location,
    ) -> Result<Value, Error> {
        let definition = self
            .definitions
            .iter()
            .rev()
            .find(|d| d.name == name)
            .ok_or_else(|| Error::UndefinedFunction(location.clone(), name.to_string()))?;

        if args.len() != definition.formals.len() {
            return Err(Error::ArityMismatch(
                location.clone(),
                name.to_string(),
                definition.formals.len(),
                args.len(),
            ));
        }

        let mut frame = Context::new();
        for (formal, arg) in definition.formals.iter().zip(args) {
            let value = self.eval(arg, context)?;
            frame.insert(formal.name.clone(), value);
        }

        match self.exec_block(&definition.body, &mut frame)? {
            Some(value) => Ok(value),
            None => Ok(Value::None),
        }
    }

    fn eval(&mut self, expression: &Expression, context: &Context) -> Result<Value, Error> {
        let location = &expression.location;
        match &expression.kind {
            ExpressionKind::Literal(value) => Ok(value.clone()),

            ExpressionKind::Variable(name) => context
                .get(name)
                .cloned()
                .ok_or_else(|| Error::UndefinedVariable(location.clone(), name.clone())),

            ExpressionKind::Binary(op, left, right) => {
                let left_value = self.eval(left, context)?;
                let right_value = self.eval(right, context)?;
                self.apply_binary(*op, left_value, right_value, location)
            }

            ExpressionKind::Not(operand) => {
                let value = self.eval(operand, context)?;
                Ok(Value::Bool(!value.is_truthy()))
            }

            ExpressionKind::Input(prompt) => {
                let value = self.eval(prompt, context)?;
                let Value::Str(prompt) = value else {
                    return Err(Error::PromptNotString(location.clone()));
                };
                write!(self.output, "{prompt}")?;
                self.output.flush()?;
                Ok(Value::Str(self.read_token()?))
            }

            ExpressionKind::IntCast(operand) => {
                let value = self.eval(operand, context)?;
                match value {
                    Value::Int(n) => Ok(Value::Int(n)),
                    // No whitespace trimming: `int("  42")` is an error.
                    Value::Str(s) => s
                        .parse::<i64>()
                        .map(Value::Int)
                        .map_err(|_| Error::BadIntParse(location.clone(), s.clone())),
                    Value::Bool(b) => Ok(Value::Int(if b { 1 } else { 0 })),
                    Value::None => Err(Error::CannotConvertToInt(location.clone())),
                }
            }

            ExpressionKind::StrCast(operand) => {
                let value = self.eval(operand, context)?;
                Ok(Value::Str(value.to_display_string()))
            }

            ExpressionKind::Call(name, args) => self.call(name, args, context, location),
        }
    }

    fn apply_binary(
        &mut self,
        op: BinaryOperator,
        left: Value,
        right: Value,
        location: &Location,
    ) -> Result<Value, Error> {
        let wrong = || Error::WrongOperandType(location.clone(), op.symbol().to_string());
        match op {
            BinaryOperator::Add => match (left, right) {
                (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a + b)),
                (Value::Str(a), Value::Str(b)) => Ok(Value::Str(a + &b)),
                _ => Err(wrong()),
            },
            BinaryOperator::Subtract => match (left, right) {
                (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a - b)),
                _ => Err(wrong()),
            },
            BinaryOperator::Multiply => match (left, right) {
                (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a * b)),
                _ => Err(wrong()),
            },
            BinaryOperator::Divide => match (left, right) {
                (Value::Int(_), Value::Int(0)) => Err(Error::DivisionByZero(location.clone())),
                // Truncating quotient, like the target machine's `div`.
                (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a / b)),
                _ => Err(wrong()),
            },
            BinaryOperator::Remainder => match (left, right) {
                (Value::Int(_), Value::Int(0)) => Err(Error::DivisionByZero(location.clone())),
                (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a % b)),
                _ => Err(wrong()),
            },
            BinaryOperator::LessThan => match (left, right) {
                (Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a < b)),
                _ => Err(wrong()),
            },
            BinaryOperator::LessOrEqual => match (left, right) {
                (Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a <= b)),
                _ => Err(wrong()),
            },
            BinaryOperator::Equal => Ok(Value::Bool(left == right)),
            // Both sides are already evaluated: `and`/`or` do not
            // short-circuit in the interpreter.
            BinaryOperator::And => Ok(Value::Bool(left.is_truthy() && right.is_truthy())),
            BinaryOperator::Or => Ok(Value::Bool(left.is_truthy() || right.is_truthy())),
        }
    }

    /// Reads one whitespace-delimited token, skipping leading whitespace and
    /// leaving the terminator unconsumed.
    fn read_token(&mut self) -> Result<String, Error> {
        let mut bytes = Vec::new();
        loop {
            let buffer = self.input.fill_buf()?;
            if buffer.is_empty() {
                break;
            }
            let mut consumed = 0;
            let mut done = false;
            for &byte in buffer {
                if byte.is_ascii_whitespace() {
                    if bytes.is_empty() {
                        consumed += 1;
                        continue;
                    }
                    done = true;
                    break;
                }
                bytes.push(byte);
                consumed += 1;
            }
            self.input.consume(consumed);
            if done {
                break;
            }
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;
    use crate::parser::parse;
    use assert_matches::assert_matches;
    use std::io::Cursor;

    fn run_source(src: &str, stdin: &str) -> Result<String, Error> {
        let tokens = lex(src, "test.slpy").expect("lexing should succeed");
        let program = parse(&tokens, "test.slpy").expect("parsing should succeed");
        let mut input = Cursor::new(stdin.as_bytes().to_vec());
        let mut output = Vec::new();
        run(&program, &mut input, &mut output)?;
        Ok(String::from_utf8(output).expect("output should be UTF-8"))
    }

    #[test]
    fn test_hello_world() {
        assert_eq!(
            run_source("print(\"Hello, world!\")\n", "").unwrap(),
            "Hello, world!\n"
        );
    }

    #[test]
    fn test_arithmetic_and_variables() {
        let src = "x : int = 3\ny : int = 4\nprint(x * x + y * y)\n";
        assert_eq!(run_source(src, "").unwrap(), "25\n");
    }

    #[test]
    fn test_while_loop() {
        let src = "\
i : int = 0
s : int = 0
while i <= 10:
    s += i
    i += 1
print(s)
";
        assert_eq!(run_source(src, "").unwrap(), "55\n");
    }

    #[test]
    fn test_function_with_return() {
        let src = "\
def sq(n : int) -> int:
    return n * n
print(sq(7))
";
        assert_eq!(run_source(src, "").unwrap(), "49\n");
    }

    #[test]
    fn test_sign_function() {
        let src = "\
def sgn(n : int) -> int:
    if n < 0:
        return 0 - 1
    else:
        if n == 0:
            return 0
        else:
            return 1
print(sgn(0 - 5))
print(sgn(0))
print(sgn(5))
";
        assert_eq!(run_source(src, "").unwrap(), "-1\n0\n1\n");
    }

    #[test]
    fn test_division_by_zero() {
        assert_matches!(
            run_source("print(10 // 0)\n", ""),
            Err(Error::DivisionByZero(location)) if location.line == 1
        );
        assert_matches!(run_source("print(10 % 0)\n", ""), Err(Error::DivisionByZero(_)));
    }

    #[test]
    fn test_string_concatenation() {
        assert_eq!(run_source("print(\"\" + \"\")\n", "").unwrap(), "\n");
        assert_eq!(
            run_source("print(\"ab\" + \"cd\" + \"ef\")\n", "").unwrap(),
            "abcdef\n"
        );
    }

    #[test]
    fn test_truthiness_of_not() {
        let src = "\
print(not 0)
print(not \"\")
print(not None)
print(not 1)
";
        assert_eq!(run_source(src, "").unwrap(), "True\nTrue\nTrue\nFalse\n");
    }

    #[test]
    fn test_and_or_evaluate_both_sides() {
        // Both prompts appear even though the first operand decides.
        let src = "b : bool = int(input(\"a\")) == 0 and int(input(\"b\")) == 0\nprint(b)\n";
        assert_eq!(run_source(src, "1 1\n").unwrap(), "abFalse\n");
    }

    #[test]
    fn test_equality_across_kinds_is_false() {
        let src = "print(1 == \"1\")\nprint(None == 0)\nprint(2 == 2)\n";
        assert_eq!(run_source(src, "").unwrap(), "False\nFalse\nTrue\n");
    }

    #[test]
    fn test_print_one_value_per_line() {
        assert_eq!(run_source("print(1, 2, 3)\n", "").unwrap(), "1\n2\n3\n");
    }

    #[test]
    fn test_input_reads_one_token() {
        let src = "s : str = input(\"? \")\nprint(s)\n";
        assert_eq!(run_source(src, "hello world\n").unwrap(), "? hello\n");
    }

    #[test]
    fn test_int_conversion() {
        let src = "print(int(\"42\"))\nprint(int(True))\nprint(int(False))\nprint(int(7))\n";
        assert_eq!(run_source(src, "").unwrap(), "42\n1\n0\n7\n");
    }

    #[test]
    fn test_int_of_bad_string() {
        assert_matches!(
            run_source("print(int(\"\"))\n", ""),
            Err(Error::BadIntParse(_, s)) if s.is_empty()
        );
        assert_matches!(
            run_source("print(int(\"   42\"))\n", ""),
            Err(Error::BadIntParse(_, _))
        );
    }

    #[test]
    fn test_str_conversion() {
        let src = "print(str(42) + \"!\")\nprint(str(True))\n";
        assert_eq!(run_source(src, "").unwrap(), "42!\nTrue\n");
    }

    #[test]
    fn test_undefined_variable() {
        assert_matches!(
            run_source("print(nope)\n", ""),
            Err(Error::UndefinedVariable(_, name)) if name == "nope"
        );
    }

    #[test]
    fn test_functions_do_not_see_caller_variables() {
        let src = "\
def f() -> int:
    return x
x : int = 1
print(f())
";
        assert_matches!(run_source(src, ""), Err(Error::UndefinedVariable(_, _)));
    }

    #[test]
    fn test_last_definition_wins() {
        let src = "\
def f() -> int:
    return 1
def f() -> int:
    return 2
print(f())
";
        assert_eq!(run_source(src, "").unwrap(), "2\n");
    }

    #[test]
    fn test_procedure_falls_through_to_none() {
        let src = "\
def shout(s : str) -> None:
    print(s + \"!\")
shout(\"hey\")
";
        assert_eq!(run_source(src, "").unwrap(), "hey!\n");
    }

    #[test]
    fn test_arity_checked_at_run_time() {
        // The interpreter is robust even though this never passed analysis.
        let src = "\
def f(a : int) -> int:
    return a
print(f(1, 2))
";
        assert_matches!(
            run_source(src, ""),
            Err(Error::ArityMismatch(_, name, 1, 2)) if name == "f"
        );
    }

    #[test]
    fn test_mismatched_operands_at_run_time() {
        assert_matches!(
            run_source("print(1 + \"one\")\n", ""),
            Err(Error::WrongOperandType(_, op)) if op == "+"
        );
    }
}
