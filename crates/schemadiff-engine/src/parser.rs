//! Statement splitting and parsing for the MySQL dialect.

use crate::error::{EngineError, ParseError};
use sqlparser::ast::Statement;
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::{Token, Tokenizer};

/// Split a multi-statement SQL blob on top-level `;` boundaries.
///
/// Semicolons inside quoted strings, quoted identifiers and comments do not
/// split. Each returned piece is the original text of one statement, trimmed,
/// without its terminator. Pieces holding nothing but whitespace or comments
/// are dropped, so empty input yields an empty vector.
pub fn split_statements(sql: &str) -> Result<Vec<String>, EngineError> {
    let dialect = MySqlDialect {};
    let mut tokenizer = Tokenizer::new(&dialect, sql);
    let tokens = tokenizer
        .tokenize_with_location()
        .map_err(ParseError::from)?;

    let mut cursor = OffsetCursor::new(sql);
    let mut statements = Vec::new();
    let mut start = 0usize;
    let mut has_content = false;

    for token in &tokens {
        match token.token {
            Token::SemiColon => {
                let end = cursor
                    .offset_of(
                        token.span.start.line as usize,
                        token.span.start.column as usize,
                    )
                    .ok_or_else(|| ParseError::new("statement terminator outside of input"))?;
                if has_content {
                    statements.push(sql[start..end].trim().to_string());
                }
                start = end + ';'.len_utf8();
                has_content = false;
            }
            Token::Whitespace(_) | Token::EOF => {}
            _ => has_content = true,
        }
    }

    if has_content {
        statements.push(sql[start..].trim().to_string());
    }

    Ok(statements)
}

/// Parse SQL text into statements using the MySQL dialect.
pub fn parse_sql(sql: &str) -> Result<Vec<Statement>, EngineError> {
    let dialect = MySqlDialect {};
    Parser::parse_sql(&dialect, sql).map_err(|err| EngineError::Parse(err.into()))
}

/// Forward-only conversion of the tokenizer's 1-indexed line/column
/// locations into byte offsets. Columns count characters, not bytes.
/// Locations must be requested in increasing order.
struct OffsetCursor<'a> {
    chars: std::str::CharIndices<'a>,
    line: usize,
    column: usize,
    offset: usize,
}

impl<'a> OffsetCursor<'a> {
    fn new(sql: &'a str) -> Self {
        Self {
            chars: sql.char_indices(),
            line: 1,
            column: 1,
            offset: 0,
        }
    }

    fn offset_of(&mut self, line: usize, column: usize) -> Option<usize> {
        if line == 0 || column == 0 {
            return None;
        }
        while (self.line, self.column) < (line, column) {
            let (idx, ch) = self.chars.next()?;
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
            self.offset = idx + ch.len_utf8();
        }
        ((self.line, self.column) == (line, column)).then_some(self.offset)
    }
}
