//! The DwiSlpy compiler.
//!
//! Usage: dwislpyc [--dump [--pretty]] <file>
//!
//! Parses and checks a DwiSlpy program, then writes SPIM-compatible MIPS32
//! assembly to `<stem>.s` beside the source. `--dump` prints the syntax
//! tree (or, with `--pretty`, source-equivalent code) instead.

use anyhow::Context;
use clap::Parser;
use dwislpy::{analyse, compile_to_file, parse, printer, read_input};
use env_logger::Env;
use log::info;
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(version, about = "DwiSlpy to MIPS32 compiler", long_about = None)]
struct Cli {
    /// Path to the DwiSlpy source file
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Print the parsed syntax tree instead of compiling
    #[arg(long)]
    dump: bool,

    /// With --dump, print source-equivalent code
    #[arg(long, requires = "dump")]
    pretty: bool,

    #[arg(short = 'd', long = "debug", action)]
    debug: bool,

    #[arg(short = 'v', long = "verbose", action)]
    verbose: bool,

    #[arg(short = 'q', long = "quiet", action)]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = match (cli.debug, cli.verbose, cli.quiet) {
        // --quiet always wins
        (_, _, true) => "error",
        (true, _, _) => "debug",
        (_, true, _) => "info",
        (_, _, _) => "warn",
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();

    let source_name = cli.input.display().to_string();
    let source = read_input(&cli.input)?;
    let mut program = parse(&source, &source_name)?;

    if cli.dump {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        if cli.pretty {
            printer::pretty(&program, &mut out).context("writing pretty output")?;
        } else {
            printer::dump(&program, &mut out).context("writing dump output")?;
        }
        return Ok(());
    }

    let analysis = analyse(&mut program)?;

    let output_filename = cli.input.with_extension("s");
    info!(
        "Compiling {} -> {}",
        source_name,
        output_filename.display()
    );
    compile_to_file(&program, analysis, &output_filename)?;

    Ok(())
}
