//! Entity-level diffs and their renderings.

use crate::entity::{Entity, EntityKind, Key, KeyKind, Table, View};
use crate::error::EngineError;
use crate::normalize::quote_identifier;
use crate::textual::{line_diff, prefix_lines};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// How differences in `AUTO_INCREMENT=N` table options are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutoIncrementStrategy {
    /// Counter values never produce an alteration.
    #[default]
    Ignore,
    /// Counter values are compared like any other option.
    Apply,
}

/// How changes to a table's `PARTITION BY` clause are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RangeRotationStrategy {
    /// A changed partition clause is emitted as its own option change.
    #[default]
    DistinctStatements,
    /// Partition clauses are left out of the comparison.
    Ignore,
}

/// Fixed knobs passed to every diff computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiffHints {
    pub auto_increment: AutoIncrementStrategy,
    pub range_rotation: RangeRotationStrategy,
}

/// A single change to one table or view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityDiff {
    CreateTable(Table),
    DropTable(Table),
    AlterTable {
        from: Table,
        to: Table,
        clauses: Vec<String>,
    },
    CreateView(View),
    DropView(View),
    AlterView {
        from: View,
        to: View,
    },
}

impl EntityDiff {
    /// Name of the entity the change applies to. Alterations use the source
    /// name.
    pub fn name(&self) -> &str {
        match self {
            EntityDiff::CreateTable(table) | EntityDiff::DropTable(table) => &table.name,
            EntityDiff::AlterTable { from, .. } => &from.name,
            EntityDiff::CreateView(view) | EntityDiff::DropView(view) => &view.name,
            EntityDiff::AlterView { from, .. } => &from.name,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            EntityDiff::CreateTable(_) | EntityDiff::DropTable(_) | EntityDiff::AlterTable { .. } => {
                EntityKind::Table
            }
            _ => EntityKind::View,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            EntityDiff::AlterTable { clauses, .. } => clauses.is_empty(),
            EntityDiff::AlterView { from, to } => from.body == to.body,
            _ => false,
        }
    }

    /// The SQL statement that performs this change, without a terminator.
    /// Empty alterations render as an empty string.
    pub fn canonical_statement_string(&self) -> String {
        if self.is_empty() {
            return String::new();
        }
        match self {
            EntityDiff::CreateTable(table) => table.create_statement(),
            EntityDiff::DropTable(table) => format!("DROP TABLE {}", quote_identifier(&table.name)),
            EntityDiff::AlterTable { from, clauses, .. } => format!(
                "ALTER TABLE {} {}",
                quote_identifier(&from.name),
                clauses.join(", ")
            ),
            EntityDiff::CreateView(view) => view.create_statement(),
            EntityDiff::DropView(view) => format!("DROP VIEW {}", quote_identifier(&view.name)),
            EntityDiff::AlterView { from, to } => {
                format!("ALTER VIEW {} AS {}", quote_identifier(&from.name), to.body)
            }
        }
    }

    /// Line-oriented rendering of the change against the canonical CREATE
    /// text: added lines start with `+`, removed lines with `-`, unchanged
    /// lines with a space.
    pub fn textual_diff(&self) -> String {
        if self.is_empty() {
            return String::new();
        }
        match self {
            EntityDiff::CreateTable(table) => prefix_lines(&table.create_statement(), '+'),
            EntityDiff::DropTable(table) => prefix_lines(&table.create_statement(), '-'),
            EntityDiff::AlterTable { from, to, .. } => line_diff(
                &from.create_statement(),
                &to.create_statement_named(&from.name),
            ),
            EntityDiff::CreateView(view) => prefix_lines(&view.create_statement(), '+'),
            EntityDiff::DropView(view) => prefix_lines(&view.create_statement(), '-'),
            EntityDiff::AlterView { from, to } => line_diff(
                &from.create_statement(),
                &to.create_statement_named(&from.name),
            ),
        }
    }

    /// References of the entity as it exists after the change. Drops have
    /// none.
    pub(crate) fn references_after(&self) -> Option<&BTreeSet<String>> {
        match self {
            EntityDiff::CreateTable(table) => Some(&table.references),
            EntityDiff::AlterTable { to, .. } => Some(&to.references),
            EntityDiff::CreateView(view) => Some(&view.references),
            EntityDiff::AlterView { to, .. } => Some(&to.references),
            EntityDiff::DropTable(_) | EntityDiff::DropView(_) => None,
        }
    }
}

/// Diff two CREATE TABLE statements. The tables may have different names; the
/// result is expressed against the first one.
pub fn diff_create_tables(from: &str, to: &str, hints: &DiffHints) -> Result<EntityDiff, EngineError> {
    let from = single_table(from)?;
    let to = single_table(to)?;
    Ok(diff_tables(&from, &to, hints))
}

/// Diff two CREATE VIEW statements. The views may have different names; the
/// result is expressed against the first one.
pub fn diff_create_views(from: &str, to: &str, hints: &DiffHints) -> Result<EntityDiff, EngineError> {
    let from = single_view(from)?;
    let to = single_view(to)?;
    Ok(diff_views(&from, &to, hints))
}

fn single_table(sql: &str) -> Result<Table, EngineError> {
    match single_entity(sql, EngineError::ExpectedCreateTable)? {
        Entity::Table(table) => Ok(table),
        Entity::View(view) => Err(EngineError::ExpectedCreateTable(view.create_statement())),
    }
}

fn single_view(sql: &str) -> Result<View, EngineError> {
    match single_entity(sql, EngineError::ExpectedCreateView)? {
        Entity::View(view) => Ok(view),
        Entity::Table(table) => Err(EngineError::ExpectedCreateView(table.create_statement())),
    }
}

fn single_entity(sql: &str, expected: fn(String) -> EngineError) -> Result<Entity, EngineError> {
    let mut entities = match Entity::parse(sql) {
        Ok(entities) => entities,
        Err(EngineError::UnsupportedStatement(found)) => return Err(expected(found)),
        Err(err) => return Err(err),
    };
    if entities.len() != 1 {
        return Err(expected(format!("{} statements", entities.len())));
    }
    Ok(entities.remove(0))
}

pub(crate) fn diff_tables(from: &Table, to: &Table, hints: &DiffHints) -> EntityDiff {
    let mut clauses = Vec::new();

    for key in &from.keys {
        if !to.key(&key.name).is_some_and(|other| other.definition == key.definition) {
            clauses.push(drop_key_clause(key));
        }
    }
    for column in &from.columns {
        if to.column(&column.name).is_none() {
            clauses.push(format!("DROP COLUMN {}", quote_identifier(&column.name)));
        }
    }
    for column in &to.columns {
        if let Some(old) = from.column(&column.name) {
            if old.definition != column.definition {
                clauses.push(format!("MODIFY COLUMN {}", column.to_sql()));
            }
        }
    }
    for column in &to.columns {
        if from.column(&column.name).is_none() {
            clauses.push(format!("ADD COLUMN {}", column.to_sql()));
        }
    }
    for key in &to.keys {
        if !from.key(&key.name).is_some_and(|old| old.definition == key.definition) {
            clauses.push(format!("ADD {}", key.definition));
        }
    }

    let old_options = comparable_options(&from.options, hints);
    let new_options = comparable_options(&to.options, hints);
    if old_options != new_options && !new_options.is_empty() {
        clauses.push(new_options);
    }

    EntityDiff::AlterTable {
        from: from.clone(),
        to: to.clone(),
        clauses,
    }
}

pub(crate) fn diff_views(from: &View, to: &View, _hints: &DiffHints) -> EntityDiff {
    EntityDiff::AlterView {
        from: from.clone(),
        to: to.clone(),
    }
}

fn drop_key_clause(key: &Key) -> String {
    match key.kind {
        KeyKind::Primary => "DROP PRIMARY KEY".to_string(),
        KeyKind::ForeignKey => format!("DROP FOREIGN KEY {}", quote_identifier(&key.name)),
        KeyKind::Check => format!("DROP CHECK {}", quote_identifier(&key.name)),
        _ => format!("DROP KEY {}", quote_identifier(&key.name)),
    }
}

fn comparable_options(options: &str, hints: &DiffHints) -> String {
    static AUTO_INCREMENT: OnceLock<Option<Regex>> = OnceLock::new();
    static PARTITION: OnceLock<Option<Regex>> = OnceLock::new();

    let mut options = options.to_string();
    if hints.auto_increment == AutoIncrementStrategy::Ignore {
        if let Some(re) = AUTO_INCREMENT
            .get_or_init(|| Regex::new(r"(?i)\bAUTO_INCREMENT\s*=?\s*\d+").ok())
            .as_ref()
        {
            options = re.replace_all(&options, "").to_string();
        }
    }
    if hints.range_rotation == RangeRotationStrategy::Ignore {
        if let Some(re) = PARTITION
            .get_or_init(|| Regex::new(r"(?is)\bPARTITION\s+BY\b.*$").ok())
            .as_ref()
        {
            options = re.replace(&options, "").to_string();
        }
    }
    options.split_whitespace().collect::<Vec<_>>().join(" ")
}
