//! Command-line driver: reads a source file, runs it, and maps the result
//! to an exit code.
//!
//! Mirrors `examples/parcadei-ouros/crates/ouros-cli/src/main.rs` — plain
//! `std::env::args()` instead of a flag-parsing crate, `eprintln!` for
//! diagnostics, a hand-rolled `Result<Vec<u8>, String>` for the one
//! fallible I/O step, and a manual `ExitCode` rather than `std::process::exit`.
//! The teacher's own CLI carries no argument-parsing or logging dependency,
//! so this one doesn't either.

use std::io::Write as _;
use std::process::ExitCode;
use std::{env, fs};
use tagscript::output::StdOutput;
use tagscript::{run_source, Diagnostic};

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let Some(path) = args.get(1) else {
        eprintln!("usage: tagscript <file>");
        return ExitCode::FAILURE;
    };

    let source = match read_file(path) {
        Ok(bytes) => bytes,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let mut err = Vec::new();
    match run_source(&source, StdOutput, &mut err) {
        Ok(Ok(())) => ExitCode::SUCCESS,
        Ok(Err(_)) => {
            let _ = std::io::stderr().write_all(&err);
            ExitCode::FAILURE
        }
        Err(diagnostics) => {
            for d in &diagnostics {
                report(path, d);
            }
            ExitCode::FAILURE
        }
    }
}

fn report(path: &str, d: &Diagnostic) {
    eprintln!("{path}: {d}");
}

fn read_file(path: &str) -> Result<Vec<u8>, String> {
    match fs::metadata(path) {
        Ok(meta) if !meta.is_file() => return Err(format!("error: {path} is not a file")),
        Ok(_) => {}
        Err(err) => return Err(format!("error reading {path}: {err}")),
    }
    fs::read(path).map_err(|err| format!("error reading {path}: {err}"))
}
