//! A toolchain for DwiSlpy, a small statically typed, Python-flavoured
//! language: a tree-walking interpreter and a MIPS32 (SPIM) compiler over a
//! shared front end.
//!
//! The pipeline is staged: lex → parse → analyse → (run | dump | lower →
//! emit). Each stage has its own error type; this crate-level [`Error`]
//! aggregates them for the drivers.

pub mod ast;
pub mod emitter;
pub mod interp;
pub mod ir;
pub mod lexer;
pub mod parser;
pub mod printer;
pub mod semantics;
pub mod util;
pub mod value;

use log::info;
use std::fs;
use std::io::{BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O: {path}")]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },

    #[error(transparent)]
    Lexer(#[from] lexer::LexerError),

    #[error(transparent)]
    Parser(#[from] parser::ParserError),

    #[error(transparent)]
    Semantics(#[from] semantics::Error),

    #[error(transparent)]
    Runtime(#[from] interp::Error),

    #[error(transparent)]
    Emitter(#[from] emitter::EmitterError),
}

pub fn read_input(input_filename: &Path) -> Result<String, Error> {
    info!("Reading input file: {}", input_filename.display());
    let input = fs::read_to_string(input_filename).map_err(|e| Error::Io {
        source: e,
        path: input_filename.into(),
    })?;
    Ok(input)
}

/// Lexes and parses one source file.
pub fn parse(input: &str, source_name: &str) -> Result<ast::Program, Error> {
    info!("Lexing {source_name}");
    let tokens = lexer::lex(input, source_name)?;
    info!("Parsing {source_name}");
    Ok(parser::parse(&tokens, source_name)?)
}

/// Type- and return-checks the program, filling in expression types.
pub fn analyse(program: &mut ast::Program) -> Result<semantics::Analysis, Error> {
    info!("Semantic analysis");
    Ok(semantics::analyse(program)?)
}

/// Runs the program against the given input and output streams.
pub fn interpret<R: BufRead, W: Write>(
    program: &ast::Program,
    input: &mut R,
    output: &mut W,
) -> Result<(), Error> {
    info!("Running");
    Ok(interp::run(program, input, output)?)
}

/// Lowers a checked program to IR and writes MIPS32 assembly beside the
/// source.
pub fn compile_to_file(
    program: &ast::Program,
    analysis: semantics::Analysis,
    output_filename: &Path,
) -> Result<(), Error> {
    let ir = ir::lower(program, analysis);
    emitter::emit(ir, output_filename.to_path_buf())?;
    Ok(())
}

/// Like [`compile_to_file`], but returns the assembly listing as a string.
pub fn compile_to_string(
    program: &ast::Program,
    analysis: semantics::Analysis,
) -> Result<String, Error> {
    let ir = ir::lower(program, analysis);
    let mut writer = BufWriter::new(Vec::new());
    emitter::write_out(ir, &mut writer).map_err(|e| emitter::EmitterError {
        message: e.to_string(),
    })?;
    let bytes = writer.into_inner().map_err(|e| emitter::EmitterError {
        message: e.to_string(),
    })?;
    String::from_utf8(bytes).map_err(|e| {
        Error::Emitter(emitter::EmitterError {
            message: e.to_string(),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use assertables::assert_ok;
    use std::io::Cursor;

    fn run_program(src: &str, stdin: &str) -> Result<String, Error> {
        let mut program = parse(src, "test.slpy")?;
        analyse(&mut program)?;
        let mut input = Cursor::new(stdin.as_bytes().to_vec());
        let mut output = Vec::new();
        interpret(&program, &mut input, &mut output)?;
        Ok(String::from_utf8(output).expect("output should be UTF-8"))
    }

    fn compile_program(src: &str) -> Result<String, Error> {
        let mut program = parse(src, "test.slpy")?;
        let analysis = analyse(&mut program)?;
        compile_to_string(&program, analysis)
    }

    fn pretty_text(src: &str) -> String {
        let program = parse(src, "test.slpy").expect("parsing should succeed");
        let mut out = Vec::new();
        printer::pretty(&program, &mut out).expect("printing should succeed");
        String::from_utf8(out).expect("output should be UTF-8")
    }

    pub(crate) fn listing_is_equivalent(listing: &str, expected: &str) -> Result<(), String> {
        let listing = listing
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::trim)
            .collect::<Vec<_>>();
        let expected = expected
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::trim)
            .collect::<Vec<_>>();

        if listing.len() != expected.len() {
            return Err(format!(
                "listing has {} lines, expected {}",
                listing.len(),
                expected.len()
            ));
        }

        for (actual, expected) in listing.iter().zip(expected) {
            let actual_parts = actual.split_whitespace().collect::<Vec<_>>();
            let expected_parts = expected.split_whitespace().collect::<Vec<_>>();
            if actual_parts != expected_parts {
                return Err(format!("mismatch:\nactual:   {actual}\nexpected: {expected}"));
            }
        }
        Ok(())
    }

    #[test]
    fn test_scenario_hello_world() {
        assert_eq!(
            run_program("print(\"Hello, world!\")\n", "").unwrap(),
            "Hello, world!\n"
        );
    }

    #[test]
    fn test_scenario_arithmetic_and_vars() {
        let src = "x : int = 3\ny : int = 4\nprint(x * x + y * y)\n";
        assert_eq!(run_program(src, "").unwrap(), "25\n");
    }

    #[test]
    fn test_scenario_while_loop() {
        let src = "\
i : int = 0
s : int = 0
while i <= 10:
    s += i
    i += 1
print(s)
";
        assert_eq!(run_program(src, "").unwrap(), "55\n");
    }

    #[test]
    fn test_scenario_function_with_return() {
        let src = "\
def sq(n : int) -> int:
    return n * n
print(sq(7))
";
        assert_eq!(run_program(src, "").unwrap(), "49\n");
    }

    #[test]
    fn test_scenario_if_else_return_flow() {
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
        assert_eq!(run_program(src, "").unwrap(), "-1\n0\n1\n");
    }

    #[test]
    fn test_scenario_division_by_zero_checks_but_does_not_run() {
        let src = "print(10 // 0)\n";
        // The checker accepts the program and it compiles,
        assert_ok!(compile_program(src));
        // but running it raises a located division error.
        assert_matches!(
            run_program(src, ""),
            Err(Error::Runtime(interp::Error::DivisionByZero(location)))
                if location.line == 1
        );
    }

    #[test]
    fn test_interactive_program() {
        let src = "\
def double(n : int) -> int:
    return n + n
x : int = int(input(\"n? \"))
print(double(x))
";
        assert_eq!(run_program(src, "21\n").unwrap(), "n? 42\n");
    }

    #[test]
    fn test_pretty_round_trip_is_stable() {
        let sources = [
            "print(\"Hello, world!\")\n",
            "x : int = 3\ny : int = 4\nprint(x * x + y * y)\n",
            "\
def sgn(n : int) -> int:
    if n < 0:
        return 0 - 1
    else:
        if n == 0:
            return 0
        else:
            return 1
print(sgn(0 - 5))
",
            "\
b : bool = True and not False or 1 < 2
while b:
    b = False
print(b)
",
        ];
        for src in sources {
            let once = pretty_text(src);
            let twice = pretty_text(&once);
            assert_eq!(once, twice, "round trip diverged for:\n{src}");
        }
    }

    #[test]
    fn test_checked_types_survive_reanalysis() {
        let src = "x : int = 1 + 2\nprint(x < 3)\n";
        let mut program = parse(src, "test.slpy").unwrap();
        analyse(&mut program).unwrap();
        let once = program.clone();
        analyse(&mut program).unwrap();
        assert_eq!(once, program);
    }

    #[test]
    fn test_compilation_is_deterministic() {
        let src = "\
def sq(n : int) -> int:
    return n * n
print(sq(7))
";
        assert_eq!(compile_program(src).unwrap(), compile_program(src).unwrap());
    }

    #[test]
    fn test_full_listing_print_int() {
        let listing = compile_program("print(7)\n");
        assert_ok!(&listing);

        // S_0..S_3 are the standard newline/True/False/None constants and
        // S_4 the reserved input buffer; main prints 7 then a newline.
        let expected = r#"
            .data
        S_0:
            .asciiz "\n"
        S_1:
            .asciiz "True"
        S_2:
            .asciiz "False"
        S_3:
            .asciiz "None"
        S_4:
            .asciiz "                                                                                "
            .text
            .globl main
        main:
            sw $ra,-12($sp)
            sw $fp,-16($sp)
            move $fp, $sp
            addi $sp,$sp,-40
            li $t0,7
            sw $t0,-4($fp)
            lw $a0,-4($fp)
            li $v0,1
            syscall
            la $t0,S_0
            sw $t0,-8($fp)
            li $v0,4
            lw $a0,-8($fp)
            syscall
        main_done:
            lw $ra,-12($fp)
            lw $fp,-16($fp)
            addi $sp,$sp,40
            jr $ra
        "#;
        assert_ok!(listing_is_equivalent(&listing.unwrap(), expected));
    }

    #[test]
    fn test_error_messages_carry_source_positions() {
        let err = run_program("x : int = \"three\"\n", "").unwrap_err();
        assert_eq!(
            err.to_string(),
            "test.slpy:1:11: type mismatch, expected an expression of type int, found str"
        );
    }

    #[test]
    fn test_compile_rejects_what_the_checker_rejects() {
        assert_matches!(
            compile_program("print(undefined)\n"),
            Err(Error::Semantics(semantics::Error::UnknownIdentifier(_, _)))
        );
    }
}
