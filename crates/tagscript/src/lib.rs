//! A lexer, Pratt parser, and tree-walking evaluator for a small C-family
//! dynamic scripting language, plus the serialization format and built-in
//! registry the language exposes to scripts.
//!
//! Mirrors the shape of the teacher's own `lib.rs`
//! (`examples/parcadei-ouros/crates/ouros/src/lib.rs`): module declarations
//! up top, a flat re-export list of the types a caller actually needs, and a
//! small convenience entry point (`run_source`, playing the role of the
//! teacher's `Runner`) in front of the lex/parse/evaluate pipeline so the
//! CLI crate doesn't have to wire the three stages together itself.

pub mod array;
pub mod ast;
mod builtins;
pub mod class;
pub mod environment;
pub mod evaluator;
pub mod exception;
pub mod generator;
pub mod lexer;
pub mod output;
pub mod parser;
pub mod resource;
pub mod serialize;
pub mod token;
pub mod value;

pub use evaluator::{Callable, Evaluator, Frame, Signal};
pub use exception::{RunError, RunResult};
pub use output::{CollectOutput, NullOutput, OutputSink, StdOutput};
pub use resource::{LimitTracker, NoLimitTracker, ResourceError, ResourceTracker};

use lexer::{LexError, Lexer};
use parser::{ParseError, Parser};

/// A source file that has lexed and parsed cleanly, ready to run.
///
/// Kept as its own type (rather than handing callers a bare `ast::File`) so
/// `parse` is the one place diagnostics from both stages are merged, the way
/// the teacher's `prepare.rs` front-end collects lexer and parser
/// diagnostics into one list before a `Runner` is ever constructed.
pub struct Program {
    file: ast::File,
}

/// Either stage's diagnostic, flattened to a single renderable list —
/// callers that just want to print errors don't need to know which stage
/// produced which.
#[derive(Debug, Clone)]
pub enum Diagnostic {
    Lex(LexError),
    Parse(ParseError),
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::Lex(e) => write!(f, "{e}"),
            Diagnostic::Parse(e) => write!(f, "{e}"),
        }
    }
}

impl Program {
    /// Lexes and parses `src`. Returns every diagnostic collected across
    /// both stages on failure; a non-empty diagnostic list means `file` may
    /// still be a best-effort tree, which is why this returns `Err` instead
    /// of returning the partial tree alongside warnings.
    pub fn parse(src: &[u8]) -> Result<Program, Vec<Diagnostic>> {
        let (tokens, lex_errors) = Lexer::new(src).tokenize();
        let (file, parse_errors) = Parser::new(tokens).parse_file();
        if lex_errors.is_empty() && parse_errors.is_empty() {
            return Ok(Program { file });
        }
        let mut diags: Vec<Diagnostic> = lex_errors.into_iter().map(Diagnostic::Lex).collect();
        diags.extend(parse_errors.into_iter().map(Diagnostic::Parse));
        Err(diags)
    }

    pub fn ast(&self) -> &ast::File {
        &self.file
    }
}

/// Parses `src` and runs it to completion against a fresh [`Evaluator`]
/// backed by `sink`, writing an uncaught-throwable trace to `err` the way
/// [`Evaluator::run`] already does.
///
/// A parse failure short-circuits with `Err` (diagnostics only — there is no
/// point constructing an evaluator for a tree that didn't parse). A runtime
/// failure instead comes back as `Ok(Err(_))`: parsing and running are
/// different failure domains, and the caller (the CLI) needs to tell them
/// apart to pick an exit code and error format.
pub fn run_source<S: OutputSink>(src: &[u8], sink: S, err: &mut impl std::io::Write) -> Result<RunResult<()>, Vec<Diagnostic>> {
    let program = Program::parse(src)?;
    let evaluator = Evaluator::new(sink);
    Ok(evaluator.run(&program.file, err))
}
