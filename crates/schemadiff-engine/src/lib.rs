pub mod diff;
pub mod entity;
pub mod error;
pub mod normalize;
pub mod parser;
pub mod schema;

mod ordering;
mod textual;

// Re-export main types and functions
pub use diff::{
    diff_create_tables, diff_create_views, AutoIncrementStrategy, DiffHints, EntityDiff,
    RangeRotationStrategy,
};
pub use entity::{Column, Entity, EntityKind, Key, KeyKind, Table, View};
pub use error::{EngineError, ParseError, ParseErrorKind, Position};
pub use normalize::quote_identifier;
pub use parser::{parse_sql, split_statements};
pub use schema::{Schema, SchemaDiff};
