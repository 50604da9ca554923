//! Error handling for the hipoengine template engine.
//! Defines the error types and results used throughout the crate.

use std::fmt;
use std::io;
use thiserror::Error;

/// Source-positioned parse failure. Carries the originating file name when
/// the template came from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub file: Option<String>,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(
                f,
                "Parse error in {} at line {}, col {}: {}",
                file, self.line, self.column, self.message
            ),
            None => write!(
                f,
                "Parse error at line {}, col {}: {}",
                self.line, self.column, self.message
            ),
        }
    }
}

/// Error types for hipoengine operations.
///
/// Parse and evaluation errors are fatal and abort the current render; soft
/// failures (missing variables, translations, functions and filters) degrade
/// in-band and never surface here.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed template source: unterminated tags or blocks, bad
    /// `set`/`for`/`with` syntax.
    #[error("{0}")]
    Parse(ParseError),

    /// A typed mismatch the interpreter cannot degrade, e.g. a `for` loop
    /// over a non-sequence value.
    #[error("Evaluation error: {0}.")]
    Eval(String),

    /// Template name did not resolve through aliases or search paths.
    #[error("Template not found: {0}.")]
    TemplateNotFound(String),

    /// Represents errors that occur during file system operations.
    #[error("IO error: {0}.")]
    Io(#[from] io::Error),

    /// Represents errors while decoding translation files.
    #[error("JSON error: {0}.")]
    Json(#[from] serde_json::Error),

    /// The sandbox step budget was exhausted (infinite-loop protection).
    #[error("Render aborted: step limit exceeded.")]
    StepLimitExceeded,

    /// The sandbox wall-clock deadline passed during rendering.
    #[error("Render aborted: timeout exceeded.")]
    Timeout,
}

/// Convenience type alias for Results with [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Default error handler that prints the error and exits the program.
pub fn default_error_handler(err: Error) -> ! {
    eprintln!("{}", err);
    std::process::exit(1);
}
