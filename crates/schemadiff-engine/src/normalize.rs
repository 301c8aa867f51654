//! Token-level normalization of SQL fragments.
//!
//! Definitions coming from hand-written files and from `SHOW CREATE` output
//! differ in case, quoting and whitespace. Every fragment that ends up in a
//! canonical statement goes through [`canonicalize_fragment`] so that equal
//! definitions render to equal text.

use crate::error::{EngineError, ParseError};
use sqlparser::dialect::MySqlDialect;
use sqlparser::tokenizer::{Token, Tokenizer};
use std::collections::BTreeSet;

/// Words rendered as uppercase keywords. Any other bare word is an identifier.
const KEYWORDS: &[&str] = &[
    "ACTION", "ALL", "ALWAYS", "AND", "ANY", "AS", "ASC", "AUTO_INCREMENT", "BETWEEN", "BINARY",
    "BTREE", "BY", "CASCADE", "CASE", "CHAR", "CHARACTER", "CHARSET", "CHECK", "COLLATE",
    "COMMENT", "CONSTRAINT", "CROSS", "CURRENT", "CURRENT_TIMESTAMP", "DATE", "DATETIME",
    "DECIMAL", "DEFAULT", "DELETE", "DESC", "DISTINCT", "DIV", "DOUBLE", "ELSE", "END",
    "ENFORCED", "EXISTS", "FALSE", "FLOAT", "FOLLOWING", "FOR",
    "FOREIGN", "FROM", "FULLTEXT", "GENERATED", "GROUP", "HASH", "HAVING", "IN", "INDEX",
    "INNER", "INTEGER", "INTERVAL", "INVISIBLE", "IS", "JOIN", "JSON", "KEY", "LEFT", "LIKE", "LIMIT", "MOD",
    "NATURAL", "NO", "NOT", "NULL", "OFFSET", "ON", "OR", "ORDER", "OUTER", "OVER",
    "PARTITION", "PRECEDING", "PRIMARY", "RANGE", "RECURSIVE", "REFERENCES", "REGEXP",
    "RESTRICT", "RIGHT", "RLIKE", "ROW", "ROWS", "SELECT", "SEPARATOR", "SET", "SIGNED",
    "SOME", "SPATIAL", "STORED", "STRAIGHT_JOIN", "THEN", "TIME", "TRUE", "UNBOUNDED", "UNION",
    "UNIQUE", "UNSIGNED", "UPDATE", "USING", "VALUES", "VIRTUAL", "VISIBLE", "WHEN", "WHERE",
    "WINDOW", "WITH", "XOR", "ZEROFILL",
];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Keyword(String),
    Ident(String),
    Call(String),
    Open,
    Close,
    Comma,
    Period,
    Operator(String),
    Literal(String),
}

/// Quote an identifier with backticks, doubling embedded backticks.
pub fn quote_identifier(name: &str) -> String {
    let mut quoted = String::with_capacity(name.len() + 2);
    quoted.push('`');
    for c in name.chars() {
        quoted.push(c);
        if c == '`' {
            quoted.push('`');
        }
    }
    quoted.push('`');
    quoted
}

/// Rewrite a fragment with uppercase keywords, quoted identifiers, lowercase
/// function names and single-space separation.
pub(crate) fn canonicalize_fragment(text: &str) -> Result<String, EngineError> {
    Ok(render(&pieces(text)?))
}

/// Identifiers referenced by a fragment, unquoted.
pub(crate) fn referenced_identifiers(text: &str) -> Result<BTreeSet<String>, EngineError> {
    Ok(pieces(text)?
        .into_iter()
        .filter_map(|piece| match piece {
            Piece::Ident(name) => Some(name),
            _ => None,
        })
        .collect())
}

/// Lowercase a data type rendering, leaving quoted literals such as enum
/// members untouched.
pub(crate) fn lowercase_type(rendered: &str) -> String {
    match rendered.find('\'') {
        Some(idx) => format!("{}{}", rendered[..idx].to_lowercase(), &rendered[idx..]),
        None => rendered.to_lowercase(),
    }
}

fn pieces(text: &str) -> Result<Vec<Piece>, EngineError> {
    let dialect = MySqlDialect {};
    let tokens = Tokenizer::new(&dialect, text)
        .tokenize()
        .map_err(ParseError::from)?;

    let mut pieces = Vec::with_capacity(tokens.len());
    for (idx, token) in tokens.iter().enumerate() {
        // A word immediately followed by `(` is a function call or a type,
        // except for the referenced table of a foreign key.
        let after_references = matches!(pieces.last(), Some(Piece::Keyword(k)) if k == "REFERENCES");
        let call = !after_references && matches!(tokens.get(idx + 1), Some(Token::LParen));
        let piece = match token {
            Token::Whitespace(_) | Token::EOF => continue,
            Token::Word(word) if word.quote_style.is_some() => Piece::Ident(word.value.clone()),
            Token::Word(word) if call => Piece::Call(word.value.to_lowercase()),
            Token::Word(word) => {
                let upper = word.value.to_uppercase();
                if KEYWORDS.contains(&upper.as_str()) {
                    Piece::Keyword(upper)
                } else {
                    Piece::Ident(word.value.clone())
                }
            }
            Token::LParen => Piece::Open,
            Token::RParen => Piece::Close,
            Token::Comma => Piece::Comma,
            Token::Period => Piece::Period,
            Token::SingleQuotedString(value) => Piece::Literal(format!(
                "'{}'",
                value.replace('\\', "\\\\").replace('\'', "''")
            )),
            Token::Number(..) | Token::DoubleQuotedString(_) | Token::HexStringLiteral(_) => {
                Piece::Literal(token.to_string())
            }
            other => Piece::Operator(other.to_string()),
        };
        pieces.push(piece);
    }
    Ok(pieces)
}

fn render(pieces: &[Piece]) -> String {
    let mut out = String::new();
    let mut prev: Option<&Piece> = None;
    // A sign operator in prefix position binds to the following operand.
    let mut glue_next = false;

    for piece in pieces {
        let space = match (prev, piece) {
            (None, _) => false,
            (_, Piece::Close | Piece::Comma | Piece::Period) => false,
            (Some(Piece::Open | Piece::Period), _) => false,
            (Some(Piece::Call(_)), Piece::Open) => false,
            _ => !glue_next,
        };
        if space {
            out.push(' ');
        }

        glue_next = match piece {
            Piece::Operator(op) if op == "-" || op == "+" => matches!(
                prev,
                None | Some(Piece::Keyword(_) | Piece::Open | Piece::Comma | Piece::Operator(_))
            ),
            _ => false,
        };

        match piece {
            Piece::Keyword(word) | Piece::Call(word) | Piece::Operator(word) | Piece::Literal(word) => {
                out.push_str(word)
            }
            Piece::Ident(name) => out.push_str(&quote_identifier(name)),
            Piece::Open => out.push('('),
            Piece::Close => out.push(')'),
            Piece::Comma => out.push(','),
            Piece::Period => out.push('.'),
        }
        prev = Some(piece);
    }
    out
}
