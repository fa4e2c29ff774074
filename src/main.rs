// cequiv: decide whether two small C programs are equivalent

use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use cequiv::interpreter::Interpreter;
use cequiv::parser::parse::Parser as SourceParser;
use cequiv::{canonicalize_with, compare, CompareOptions, Verdict};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Exit status for a completed comparison that found a difference, and for
/// anything that stopped the tool before a verdict.
const EXIT_DIFFERENT: i32 = 1;
const EXIT_ERROR: i32 = 2;

#[derive(Parser)]
#[command(
    name = "cequiv",
    version,
    about = "Program-equivalence checker for a small C subset"
)]
struct Cli {
    #[command(flatten)]
    options: OptionArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct OptionArgs {
    /// Deepest nesting of macro expansions
    #[arg(long, global = true, value_name = "DEPTH")]
    max_macro_depth: Option<usize>,
    /// Cap on fixed-point iterations per canonicalization pass
    #[arg(long, global = true, value_name = "N")]
    max_iterations: Option<usize>,
    /// Report constructs the checker cannot reason about as equivalent
    #[arg(long, global = true)]
    unsupported_as_equivalent: bool,
}

impl OptionArgs {
    fn to_options(&self) -> CompareOptions {
        let mut options = CompareOptions::new()
            .with_treat_unsupported_as_equivalent(self.unsupported_as_equivalent);
        if let Some(depth) = self.max_macro_depth {
            options = options.with_max_macro_expansion_depth(depth);
        }
        if let Some(iterations) = self.max_iterations {
            options = options.with_max_fixed_point_iterations(iterations);
        }
        options
    }
}

#[derive(Subcommand)]
enum Command {
    /// Compare two C files (exit 0 if equivalent, 1 if not, 2 on error)
    Compare {
        a: PathBuf,
        b: PathBuf,
        /// Print the verdict as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the canonical form of a C file
    Canonicalize { file: PathBuf },
    /// Interpret a C file and exit with main's return value
    Run { file: PathBuf },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let options = cli.options.to_options();

    let code = match cli.command {
        Command::Compare { a, b, json } => cmd_compare(&a, &b, json, &options),
        Command::Canonicalize { file } => cmd_canonicalize(&file, &options),
        Command::Run { file } => cmd_run(&file),
    };
    process::exit(code);
}

fn read_source(path: &Path) -> String {
    match fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", path.display(), e);
            process::exit(EXIT_ERROR);
        }
    }
}

fn cmd_compare(a: &Path, b: &Path, json: bool, options: &CompareOptions) -> i32 {
    let source_a = read_source(a);
    let source_b = read_source(b);

    let verdict = match compare(&source_a, &source_b, options) {
        Ok(verdict) => verdict,
        Err(e) => {
            let path = match e.input() {
                cequiv::engine::Input::A => a,
                cequiv::engine::Input::B => b,
            };
            eprintln!("error: {}: {}", path.display(), e);
            return EXIT_ERROR;
        }
    };

    if json {
        match serde_json::to_string_pretty(&verdict) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("error: cannot serialize verdict: {}", e);
                return EXIT_ERROR;
            }
        }
    } else {
        println!("{}", verdict);
    }

    match verdict {
        Verdict::Equivalent => 0,
        Verdict::NotEquivalent(_) | Verdict::Unsupported(_) => EXIT_DIFFERENT,
    }
}

fn cmd_canonicalize(file: &Path, options: &CompareOptions) -> i32 {
    let source = read_source(file);
    match canonicalize_with(&source, options) {
        Ok(form) => {
            info!(fingerprint = %form.fingerprint, "canonicalized");
            print!("{}", form.program);
            0
        }
        Err(e) => {
            eprintln!("error: {}: {}", file.display(), e);
            EXIT_ERROR
        }
    }
}

fn cmd_run(file: &Path) -> i32 {
    let source = read_source(file);
    let program = match SourceParser::new(&source).and_then(|mut parser| parser.parse_program()) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("error: {}: {}", file.display(), e);
            return EXIT_ERROR;
        }
    };

    let mut interpreter = Interpreter::new(&program);
    let result = interpreter.run();
    print!("{}", interpreter.output());
    match result {
        Ok(status) => {
            info!(steps = interpreter.steps(), status, "program finished");
            status as i32
        }
        Err(e) => {
            eprintln!("runtime error: {}", e);
            EXIT_ERROR
        }
    }
}
