//! Error types for statement parsing, schema construction and diffing.
//!
//! [`ParseError`] carries the structured details of a sqlparser failure.
//! [`EngineError`] is what every public entry point of this crate returns; its
//! variants are stable so callers can match on specific validation failures
//! (for example [`EngineError::ExpectedCreateTable`]) instead of comparing
//! message text.

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;
#[cfg(feature = "tracing")]
use tracing::trace;

/// Error encountered while tokenizing or parsing SQL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// Human-readable error message.
    pub message: String,
    /// Location of the error, if the parser reported one.
    pub position: Option<Position>,
    /// The specific category of parse error.
    pub kind: ParseErrorKind,
}

/// Position information for a parse error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    /// Line number (1-indexed).
    pub line: usize,
    /// Column number (1-indexed).
    pub column: usize,
}

/// Category of parse error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseErrorKind {
    /// Unexpected token or character in input.
    #[default]
    SyntaxError,
    /// Invalid or unexpected end of input.
    UnexpectedEof,
    /// Lexer/tokenization error, e.g. an unterminated quote.
    LexerError,
}

impl ParseError {
    /// Creates a new parse error with just a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            position: None,
            kind: ParseErrorKind::SyntaxError,
        }
    }

    /// Sets the error kind.
    pub fn with_kind(mut self, kind: ParseErrorKind) -> Self {
        self.kind = kind;
        self
    }

    /// Extracts a position from sqlparser's "... at Line: X, Column: Y" suffix.
    fn parse_position_from_message(message: &str) -> Option<Position> {
        static POSITION_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
        let re = POSITION_REGEX
            .get_or_init(|| Regex::new(r"Line:\s*(\d+)\s*,\s*Column:\s*(\d+)").ok())
            .as_ref()?;

        let result = re.captures(message).and_then(|caps| {
            let line: usize = caps.get(1)?.as_str().parse().ok()?;
            let column: usize = caps.get(2)?.as_str().parse().ok()?;
            Some(Position { line, column })
        });

        #[cfg(feature = "tracing")]
        if result.is_none() && message.contains("Line") {
            trace!("no position found in parser message: {}", message);
        }

        result
    }

    fn infer_kind_from_message(message: &str) -> ParseErrorKind {
        let lower = message.to_lowercase();
        if lower.contains("unexpected end") || lower.contains("eof") {
            ParseErrorKind::UnexpectedEof
        } else if lower.contains("unterminated") || lower.contains("tokenizer") {
            ParseErrorKind::LexerError
        } else {
            ParseErrorKind::SyntaxError
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parse error")?;
        if let Some(pos) = self.position {
            write!(f, " at line {}, column {}", pos.line, pos.column)?;
        }
        write!(f, ": {}", self.message)
    }
}

impl std::error::Error for ParseError {}

impl From<sqlparser::parser::ParserError> for ParseError {
    fn from(err: sqlparser::parser::ParserError) -> Self {
        let message = err.to_string();
        let position = Self::parse_position_from_message(&message);
        let kind = Self::infer_kind_from_message(&message);
        Self {
            message,
            position,
            kind,
        }
    }
}

impl From<sqlparser::tokenizer::TokenizerError> for ParseError {
    fn from(err: sqlparser::tokenizer::TokenizerError) -> Self {
        let message = err.to_string();
        let position = Self::parse_position_from_message(&message);
        Self {
            message,
            position,
            kind: ParseErrorKind::LexerError,
        }
    }
}

/// Errors returned by the schema engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("expected CREATE TABLE statement, found: {0}")]
    ExpectedCreateTable(String),

    #[error("expected CREATE VIEW statement, found: {0}")]
    ExpectedCreateView(String),

    #[error("unsupported statement, only CREATE TABLE and CREATE VIEW are allowed: {0}")]
    UnsupportedStatement(String),

    #[error("duplicate entity name: {0}")]
    DuplicateEntity(String),

    #[error("view {view} selects from unknown entities: {}", .missing.join(", "))]
    UnresolvedViewReference { view: String, missing: Vec<String> },

    #[error("deadline exceeded while ordering schema diffs")]
    DeadlineExceeded,

    #[error("no valid order to apply changes to: {}", .0.join(", "))]
    UnresolvableOrder(Vec<String>),
}
