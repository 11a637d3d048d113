//! Output of parsed programs: a syntax-tree dump and a source-equivalent
//! pretty printer.
//!
//! The dump writes one four-letter node tag per line with children indented
//! by four spaces. The pretty printer writes code that parses back to an
//! equal tree: four-space blocks, fully parenthesised expressions, and
//! re-escaped string literals.

use crate::ast::{
    BinaryOperator, Block, Definition, Expression, ExpressionKind, Program, Statement,
};
use std::io::{self, Write};

pub fn dump<W: Write>(program: &Program, output: &mut W) -> io::Result<()> {
    writeln!(output, "PRGM")?;
    for definition in &program.definitions {
        dump_definition(definition, 1, output)?;
    }
    dump_block(&program.main, 1, output)
}

fn pad(level: usize) -> String {
    "    ".repeat(level)
}

fn dump_definition<W: Write>(
    definition: &Definition,
    level: usize,
    output: &mut W,
) -> io::Result<()> {
    writeln!(output, "{}DEFN", pad(level))?;
    writeln!(output, "{}{}", pad(level + 1), definition.name)?;
    for formal in &definition.formals {
        writeln!(output, "{}FRML", pad(level + 1))?;
        writeln!(output, "{}{}", pad(level + 2), formal.name)?;
        writeln!(output, "{}{}", pad(level + 2), formal.ty)?;
    }
    writeln!(output, "{}RETY", pad(level + 1))?;
    writeln!(output, "{}{}", pad(level + 2), definition.return_type)?;
    dump_block(&definition.body, level + 1, output)
}

fn dump_block<W: Write>(block: &Block, level: usize, output: &mut W) -> io::Result<()> {
    writeln!(output, "{}BLCK", pad(level))?;
    for statement in &block.statements {
        dump_statement(statement, level + 1, output)?;
    }
    Ok(())
}

fn dump_statement<W: Write>(
    statement: &Statement,
    level: usize,
    output: &mut W,
) -> io::Result<()> {
    match statement {
        Statement::Intro {
            name,
            ty,
            expression,
            ..
        } => {
            writeln!(output, "{}NTRO", pad(level))?;
            writeln!(output, "{}{}", pad(level + 1), name)?;
            writeln!(output, "{}{}", pad(level + 1), ty)?;
            dump_expression(expression, level + 1, output)
        }
        Statement::Assign {
            name, expression, ..
        } => {
            writeln!(output, "{}ASGN", pad(level))?;
            writeln!(output, "{}{}", pad(level + 1), name)?;
            dump_expression(expression, level + 1, output)
        }
        Statement::PlusAssign {
            name, expression, ..
        } => {
            writeln!(output, "{}PLEQ", pad(level))?;
            writeln!(output, "{}{}", pad(level + 1), name)?;
            dump_expression(expression, level + 1, output)
        }
        Statement::MinusAssign {
            name, expression, ..
        } => {
            writeln!(output, "{}MIEQ", pad(level))?;
            writeln!(output, "{}{}", pad(level + 1), name)?;
            dump_expression(expression, level + 1, output)
        }
        Statement::TimesAssign {
            name, expression, ..
        } => {
            writeln!(output, "{}TIEQ", pad(level))?;
            writeln!(output, "{}{}", pad(level + 1), name)?;
            dump_expression(expression, level + 1, output)
        }
        Statement::Print { args, .. } => {
            writeln!(output, "{}PRNT", pad(level))?;
            for arg in args {
                dump_expression(arg, level + 1, output)?;
            }
            Ok(())
        }
        Statement::Pass { .. } => writeln!(output, "{}PASS", pad(level)),
        Statement::While {
            condition, body, ..
        } => {
            writeln!(output, "{}WHLE", pad(level))?;
            dump_expression(condition, level + 1, output)?;
            dump_block(body, level + 1, output)
        }
        Statement::IfElse {
            condition,
            then_block,
            else_block,
            ..
        } => {
            writeln!(output, "{}TERN", pad(level))?;
            dump_expression(condition, level + 1, output)?;
            dump_block(then_block, level + 1, output)?;
            dump_block(else_block, level + 1, output)
        }
        Statement::Return { value: None, .. } => writeln!(output, "{}RETN", pad(level)),
        Statement::Return {
            value: Some(expression),
            ..
        } => {
            writeln!(output, "{}RETE", pad(level))?;
            dump_expression(expression, level + 1, output)
        }
        Statement::Call { name, args, .. } => {
            writeln!(output, "{}PROC", pad(level))?;
            writeln!(output, "{}{}", pad(level + 1), name)?;
            for arg in args {
                dump_expression(arg, level + 1, output)?;
            }
            Ok(())
        }
    }
}

fn dump_expression<W: Write>(
    expression: &Expression,
    level: usize,
    output: &mut W,
) -> io::Result<()> {
    match &expression.kind {
        ExpressionKind::Literal(value) => {
            writeln!(output, "{}LTRL", pad(level))?;
            writeln!(output, "{}{}", pad(level + 1), value.to_repr_string())
        }
        ExpressionKind::Variable(name) => {
            writeln!(output, "{}LKUP", pad(level))?;
            writeln!(output, "{}{}", pad(level + 1), name)
        }
        ExpressionKind::Binary(op, left, right) => {
            let tag = match op {
                BinaryOperator::Add => "PLUS",
                BinaryOperator::Subtract => "MNUS",
                BinaryOperator::Multiply => "TMES",
                BinaryOperator::Divide => "IDIV",
                BinaryOperator::Remainder => "IMOD",
                BinaryOperator::LessThan => "LESS",
                BinaryOperator::LessOrEqual => "LTEQ",
                BinaryOperator::Equal => "EQAL",
                BinaryOperator::And => "CONJ",
                BinaryOperator::Or => "DISJ",
            };
            writeln!(output, "{}{}", pad(level), tag)?;
            dump_expression(left, level + 1, output)?;
            dump_expression(right, level + 1, output)
        }
        ExpressionKind::Not(operand) => {
            writeln!(output, "{}NEGT", pad(level))?;
            dump_expression(operand, level + 1, output)
        }
        ExpressionKind::Input(prompt) => {
            writeln!(output, "{}INPT", pad(level))?;
            dump_expression(prompt, level + 1, output)
        }
        ExpressionKind::IntCast(operand) => {
            writeln!(output, "{}INTC", pad(level))?;
            dump_expression(operand, level + 1, output)
        }
        ExpressionKind::StrCast(operand) => {
            writeln!(output, "{}STRC", pad(level))?;
            dump_expression(operand, level + 1, output)
        }
        ExpressionKind::Call(name, args) => {
            writeln!(output, "{}FUNC", pad(level))?;
            writeln!(output, "{}{}", pad(level + 1), name)?;
            for arg in args {
                dump_expression(arg, level + 1, output)?;
            }
            Ok(())
        }
    }
}

pub fn pretty<W: Write>(program: &Program, output: &mut W) -> io::Result<()> {
    for definition in &program.definitions {
        let formals = definition
            .formals
            .iter()
            .map(|f| format!("{} : {}", f.name, f.ty))
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(
            output,
            "def {}({}) -> {}:",
            definition.name, formals, definition.return_type
        )?;
        pretty_block(&definition.body, 1, output)?;
    }
    pretty_block(&program.main, 0, output)
}

fn pretty_block<W: Write>(block: &Block, level: usize, output: &mut W) -> io::Result<()> {
    for statement in &block.statements {
        pretty_statement(statement, level, output)?;
    }
    Ok(())
}

fn pretty_statement<W: Write>(
    statement: &Statement,
    level: usize,
    output: &mut W,
) -> io::Result<()> {
    let indent = pad(level);
    match statement {
        Statement::Intro {
            name,
            ty,
            expression,
            ..
        } => writeln!(
            output,
            "{indent}{name} : {ty} = {}",
            expression_text(expression)
        ),
        Statement::Assign {
            name, expression, ..
        } => writeln!(output, "{indent}{name} = {}", expression_text(expression)),
        Statement::PlusAssign {
            name, expression, ..
        } => writeln!(output, "{indent}{name} += {}", expression_text(expression)),
        Statement::MinusAssign {
            name, expression, ..
        } => writeln!(output, "{indent}{name} -= {}", expression_text(expression)),
        Statement::TimesAssign {
            name, expression, ..
        } => writeln!(output, "{indent}{name} *= {}", expression_text(expression)),
        Statement::Print { args, .. } => {
            let args = args
                .iter()
                .map(expression_text)
                .collect::<Vec<_>>()
                .join(", ");
            writeln!(output, "{indent}print({args})")
        }
        Statement::Pass { .. } => writeln!(output, "{indent}pass"),
        Statement::While {
            condition, body, ..
        } => {
            writeln!(output, "{indent}while {}:", expression_text(condition))?;
            pretty_block(body, level + 1, output)
        }
        Statement::IfElse {
            condition,
            then_block,
            else_block,
            ..
        } => {
            writeln!(output, "{indent}if {}:", expression_text(condition))?;
            pretty_block(then_block, level + 1, output)?;
            writeln!(output, "{indent}else:")?;
            pretty_block(else_block, level + 1, output)
        }
        Statement::Return { value: None, .. } => writeln!(output, "{indent}return"),
        Statement::Return {
            value: Some(expression),
            ..
        } => writeln!(output, "{indent}return {}", expression_text(expression)),
        Statement::Call { name, args, .. } => {
            let args = args
                .iter()
                .map(expression_text)
                .collect::<Vec<_>>()
                .join(", ");
            writeln!(output, "{indent}{name}({args})")
        }
    }
}

fn expression_text(expression: &Expression) -> String {
    match &expression.kind {
        ExpressionKind::Literal(value) => value.to_repr_string(),
        ExpressionKind::Variable(name) => name.clone(),
        ExpressionKind::Binary(op, left, right) => format!(
            "({} {} {})",
            expression_text(left),
            op.symbol(),
            expression_text(right)
        ),
        ExpressionKind::Not(operand) => format!("(not {})", expression_text(operand)),
        ExpressionKind::Input(prompt) => format!("input({})", expression_text(prompt)),
        ExpressionKind::IntCast(operand) => format!("int({})", expression_text(operand)),
        ExpressionKind::StrCast(operand) => format!("str({})", expression_text(operand)),
        ExpressionKind::Call(name, args) => {
            let args = args
                .iter()
                .map(expression_text)
                .collect::<Vec<_>>()
                .join(", ");
            format!("{name}({args})")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;

    fn parsed(src: &str) -> Program {
        let tokens = lex(src, "test.slpy").expect("lexing should succeed");
        parse(&tokens, "test.slpy").expect("parsing should succeed")
    }

    fn dumped(src: &str) -> String {
        let mut out = Vec::new();
        dump(&parsed(src), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn prettied(src: &str) -> String {
        let mut out = Vec::new();
        pretty(&parsed(src), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_dump_simple_program() {
        let expected = "\
PRGM
    BLCK
        NTRO
            x
            int
            PLUS
                LTRL
                    1
                LTRL
                    2
        PRNT
            LKUP
                x
";
        assert_eq!(dumped("x : int = 1 + 2\nprint(x)\n"), expected);
    }

    #[test]
    fn test_dump_definition() {
        let expected = "\
PRGM
    DEFN
        sq
        FRML
            n
            int
        RETY
            int
        BLCK
            RETE
                TMES
                    LKUP
                        n
                    LKUP
                        n
    BLCK
        PRNT
            FUNC
                sq
                LTRL
                    7
";
        let src = "def sq(n : int) -> int:\n    return n * n\nprint(sq(7))\n";
        assert_eq!(dumped(src), expected);
    }

    #[test]
    fn test_pretty_parenthesises_and_quotes() {
        let src = "x : int = 1 + 2 * 3\nprint(\"a\\nb\", x)\n";
        let expected = "x : int = (1 + (2 * 3))\nprint(\"a\\nb\", x)\n";
        assert_eq!(prettied(src), expected);
    }

    #[test]
    fn test_pretty_blocks() {
        let src = "\
def sgn(n : int) -> int:
    if n < 0:
        return 0 - 1
    else:
        return 1
print(sgn(5))
";
        let expected = "\
def sgn(n : int) -> int:
    if (n < 0):
        return (0 - 1)
    else:
        return 1
print(sgn(5))
";
        assert_eq!(prettied(src), expected);
    }

    #[test]
    fn test_pretty_round_trip() {
        let src = "\
def f(a : int, b : str) -> int:
    while not a == 0 and True:
        a -= 1
    s : str = b + \"!\"
    print(s)
    return a
x : int = f(3, input(\"? \"))
pass
";
        let once = prettied(src);
        let twice = prettied(&once);
        assert_eq!(once, twice);
    }
}
