//! Normalized table and view entities built from parsed CREATE statements.

use crate::diff::EntityDiff;
use crate::error::EngineError;
use crate::normalize::{canonicalize_fragment, lowercase_type, quote_identifier, referenced_identifiers};
use crate::parser::parse_sql;
use sqlparser::ast::{
    ColumnDef, ColumnOption, CreateTable, ObjectName, Query, SetExpr, Statement, TableConstraint,
    TableFactor, TableWithJoins,
};
use std::collections::BTreeSet;
use std::fmt;

/// Whether an entity is a base table or a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Table,
    View,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Table => write!(f, "TABLE"),
            EntityKind::View => write!(f, "VIEW"),
        }
    }
}

/// A column and its canonical definition (type followed by options).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub definition: String,
}

impl Column {
    pub fn to_sql(&self) -> String {
        format!("{} {}", quote_identifier(&self.name), self.definition)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum KeyKind {
    Primary,
    Unique,
    Index,
    ForeignKey,
    Check,
    Other,
}

/// An index or constraint of a table.
///
/// `name` identifies the key across two versions of a table. Unnamed indexes
/// take the name of their first column, as MySQL does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    pub kind: KeyKind,
    pub name: String,
    pub definition: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    pub keys: Vec<Key>,
    /// Table options following the column list, e.g. `ENGINE=InnoDB`.
    pub options: String,
    /// Tables referenced through foreign keys.
    pub references: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View {
    pub name: String,
    /// Canonical text of the view's SELECT.
    pub body: String,
    /// Every identifier the body mentions; filtered against known entity
    /// names when dependencies are resolved.
    pub references: BTreeSet<String>,
    /// Tables and views named in FROM clauses, CTE names excluded. Each must
    /// exist in the schema holding the view.
    pub relations: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entity {
    Table(Table),
    View(View),
}

impl Entity {
    /// Parse a single CREATE TABLE or CREATE VIEW statement.
    pub fn parse(sql: &str) -> Result<Vec<Self>, EngineError> {
        parse_sql(sql)?.iter().map(Self::from_statement).collect()
    }

    pub fn from_statement(statement: &Statement) -> Result<Self, EngineError> {
        match statement {
            Statement::CreateTable(create) => Table::from_create(create).map(Entity::Table),
            Statement::CreateView { name, query, .. } => {
                View::new(simple_name(name), query).map(Entity::View)
            }
            other => Err(EngineError::UnsupportedStatement(summarize(other))),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Entity::Table(table) => &table.name,
            Entity::View(view) => &view.name,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Table(_) => EntityKind::Table,
            Entity::View(_) => EntityKind::View,
        }
    }

    pub fn references(&self) -> &BTreeSet<String> {
        match self {
            Entity::Table(table) => &table.references,
            Entity::View(view) => &view.references,
        }
    }

    /// The diff that creates this entity from nothing.
    pub fn create(&self) -> EntityDiff {
        match self {
            Entity::Table(table) => EntityDiff::CreateTable(table.clone()),
            Entity::View(view) => EntityDiff::CreateView(view.clone()),
        }
    }

    pub fn canonical_create(&self) -> String {
        match self {
            Entity::Table(table) => table.create_statement(),
            Entity::View(view) => view.create_statement(),
        }
    }
}

impl Table {
    fn from_create(create: &CreateTable) -> Result<Self, EngineError> {
        let name = simple_name(&create.name);
        if create.query.is_some() {
            return Err(EngineError::UnsupportedStatement(format!(
                "CREATE TABLE {} AS SELECT",
                quote_identifier(&name)
            )));
        }

        let mut columns = Vec::with_capacity(create.columns.len());
        let mut primary_columns = Vec::new();
        let mut keys = Vec::new();
        for column in &create.columns {
            let (parsed, is_primary, is_unique) = column_from_def(column)?;
            let quoted = quote_identifier(&parsed.name);
            if is_primary {
                primary_columns.push(quoted.clone());
            }
            if is_unique {
                keys.push(Key {
                    kind: KeyKind::Unique,
                    name: parsed.name.clone(),
                    definition: format!("UNIQUE KEY {quoted} ({quoted})"),
                });
            }
            columns.push(parsed);
        }
        if !primary_columns.is_empty() {
            keys.push(Key {
                kind: KeyKind::Primary,
                name: "PRIMARY".to_string(),
                definition: format!("PRIMARY KEY ({})", primary_columns.join(", ")),
            });
        }

        let mut references = BTreeSet::new();
        for constraint in &create.constraints {
            if let TableConstraint::ForeignKey { foreign_table, .. } = constraint {
                let target = simple_name(foreign_table);
                if target != name {
                    references.insert(target);
                }
            }
            keys.push(key_from_text(&canonicalize_fragment(&constraint.to_string())?));
        }
        // Primary key first, everything else in declaration order.
        keys.sort_by_key(|key| key.kind != KeyKind::Primary);

        Ok(Self {
            options: table_options(create),
            name,
            columns,
            keys,
            references,
        })
    }

    pub fn create_statement(&self) -> String {
        self.create_statement_named(&self.name)
    }

    /// Render the CREATE statement of this table under another name.
    pub fn create_statement_named(&self, name: &str) -> String {
        let lines: Vec<String> = self
            .columns
            .iter()
            .map(Column::to_sql)
            .chain(self.keys.iter().map(|key| key.definition.clone()))
            .map(|line| format!("\t{line}"))
            .collect();
        let mut sql = format!(
            "CREATE TABLE {} (\n{}\n)",
            quote_identifier(name),
            lines.join(",\n")
        );
        if !self.options.is_empty() {
            sql.push(' ');
            sql.push_str(&self.options);
        }
        sql
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn key(&self, name: &str) -> Option<&Key> {
        self.keys.iter().find(|key| key.name == name)
    }
}

impl View {
    pub fn new(name: String, query: &Query) -> Result<Self, EngineError> {
        let body = canonicalize_fragment(&query.to_string())?;
        let references = referenced_identifiers(&body)?;
        let mut relations = BTreeSet::new();
        collect_relations_in_query(query, &mut relations);
        Ok(Self {
            name,
            body,
            references,
            relations,
        })
    }

    pub fn create_statement(&self) -> String {
        self.create_statement_named(&self.name)
    }

    pub fn create_statement_named(&self, name: &str) -> String {
        format!("CREATE VIEW {} AS {}", quote_identifier(name), self.body)
    }
}

fn collect_relations_in_query(query: &Query, relations: &mut BTreeSet<String>) {
    let mut found = BTreeSet::new();
    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            collect_relations_in_query(&cte.query, &mut found);
        }
    }
    collect_relations_in_set_expr(&query.body, &mut found);

    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            found.remove(&cte.alias.name.value);
        }
    }
    relations.extend(found);
}

fn collect_relations_in_set_expr(set_expr: &SetExpr, relations: &mut BTreeSet<String>) {
    match set_expr {
        SetExpr::Select(select) => {
            for table in &select.from {
                collect_relations_in_table_with_joins(table, relations);
            }
        }
        SetExpr::Query(query) => collect_relations_in_query(query, relations),
        SetExpr::SetOperation { left, right, .. } => {
            collect_relations_in_set_expr(left, relations);
            collect_relations_in_set_expr(right, relations);
        }
        _ => {}
    }
}

fn collect_relations_in_table_with_joins(table: &TableWithJoins, relations: &mut BTreeSet<String>) {
    collect_relations_in_table_factor(&table.relation, relations);
    for join in &table.joins {
        collect_relations_in_table_factor(&join.relation, relations);
    }
}

fn collect_relations_in_table_factor(factor: &TableFactor, relations: &mut BTreeSet<String>) {
    match factor {
        TableFactor::Table { name, .. } => {
            relations.insert(simple_name(name));
        }
        TableFactor::Derived { subquery, .. } => collect_relations_in_query(subquery, relations),
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => collect_relations_in_table_with_joins(table_with_joins, relations),
        TableFactor::Pivot { table, .. }
        | TableFactor::Unpivot { table, .. }
        | TableFactor::MatchRecognize { table, .. } => {
            collect_relations_in_table_factor(table, relations)
        }
        _ => {}
    }
}

/// Returns the column plus whether it carries inline PRIMARY KEY / UNIQUE.
fn column_from_def(column: &ColumnDef) -> Result<(Column, bool, bool), EngineError> {
    let mut definition = lowercase_type(&column.data_type.to_string());
    let mut is_primary = false;
    let mut is_unique = false;

    for option in &column.options {
        match &option.option {
            ColumnOption::Null => {}
            ColumnOption::Unique { is_primary: true, .. } => is_primary = true,
            ColumnOption::Unique { .. } => is_unique = true,
            other => {
                definition.push(' ');
                definition.push_str(&canonicalize_fragment(&other.to_string())?);
            }
        }
    }

    Ok((
        Column {
            name: column.name.value.clone(),
            definition,
        },
        is_primary,
        is_unique,
    ))
}

/// Classify and normalize a canonicalized table constraint.
fn key_from_text(text: &str) -> Key {
    let (constraint_name, rest) = match text.strip_prefix("CONSTRAINT ") {
        Some(after) => match split_leading_ident(after) {
            Some((name, rest)) => (Some(name), rest),
            None => (None, after),
        },
        None => (None, text),
    };

    if let Some(after) = rest.strip_prefix("PRIMARY KEY") {
        return Key {
            kind: KeyKind::Primary,
            name: "PRIMARY".to_string(),
            definition: format!("PRIMARY KEY {}", columns_part(after)),
        };
    }

    let index_prefix = [
        ("UNIQUE", KeyKind::Unique, "UNIQUE KEY"),
        ("FULLTEXT", KeyKind::Index, "FULLTEXT KEY"),
        ("SPATIAL", KeyKind::Index, "SPATIAL KEY"),
        ("KEY", KeyKind::Index, "KEY"),
        ("INDEX", KeyKind::Index, "KEY"),
    ]
    .into_iter()
    .find_map(|(prefix, kind, canonical)| {
        rest.strip_prefix(prefix)
            .filter(|after| after.is_empty() || after.starts_with(' '))
            .map(|after| (after, kind, canonical))
    });

    if let Some((after, kind, canonical)) = index_prefix {
        let after = after.trim_start();
        let after = after
            .strip_prefix("KEY ")
            .or_else(|| after.strip_prefix("INDEX "))
            .unwrap_or(after);
        let (index_name, after) = match split_leading_ident(after) {
            Some((name, rest)) => (Some(name), rest),
            None => (None, after),
        };
        let columns = columns_part(after);
        let name = index_name
            .or(constraint_name)
            .or_else(|| implicit_name(columns))
            .unwrap_or_else(|| columns.to_string());
        return Key {
            kind,
            definition: format!("{canonical} {} {columns}", quote_identifier(&name)),
            name,
        };
    }

    let kind = if rest.starts_with("FOREIGN KEY") {
        KeyKind::ForeignKey
    } else if rest.starts_with("CHECK") {
        KeyKind::Check
    } else {
        KeyKind::Other
    };
    let name = constraint_name
        .or_else(|| implicit_name(columns_part(rest)))
        .unwrap_or_else(|| text.to_string());
    Key {
        kind,
        name,
        definition: text.to_string(),
    }
}

/// The parenthesized column list and anything after it.
fn columns_part(text: &str) -> &str {
    let mut in_quote = false;
    for (idx, ch) in text.char_indices() {
        match ch {
            '`' => in_quote = !in_quote,
            '(' if !in_quote => return &text[idx..],
            _ => {}
        }
    }
    text.trim()
}

fn implicit_name(columns: &str) -> Option<String> {
    columns
        .strip_prefix('(')
        .and_then(split_leading_ident)
        .map(|(name, _)| name)
}

/// Split a leading backtick-quoted identifier off `text`.
fn split_leading_ident(text: &str) -> Option<(String, &str)> {
    let body = text.strip_prefix('`')?;
    let mut name = String::new();
    let mut chars = body.char_indices().peekable();
    while let Some((idx, ch)) = chars.next() {
        if ch == '`' {
            if matches!(chars.peek(), Some((_, '`'))) {
                chars.next();
                name.push('`');
                continue;
            }
            return Some((name, body[idx + 1..].trim_start()));
        }
        name.push(ch);
    }
    None
}

/// Table options rendered after the column list.
fn table_options(create: &CreateTable) -> String {
    let mut bare = create.clone();
    bare.columns.clear();
    bare.constraints.clear();
    let rendered = Statement::CreateTable(bare).to_string();
    rendered
        .find(" ()")
        .map(|idx| rendered[idx + 3..].split_whitespace().collect::<Vec<_>>().join(" "))
        .unwrap_or_default()
}

/// Unqualified, unquoted name of a table or view.
pub(crate) fn simple_name(name: &ObjectName) -> String {
    name.0
        .last()
        .map(|part| {
            part.as_ident()
                .map(|ident| ident.value.clone())
                .unwrap_or_else(|| part.to_string())
        })
        .unwrap_or_default()
}

fn summarize(statement: &Statement) -> String {
    let text = statement.to_string();
    match text.char_indices().nth(60) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_one(sql: &str) -> Entity {
        let mut entities = Entity::parse(sql).unwrap();
        assert_eq!(entities.len(), 1);
        entities.remove(0)
    }

    #[test]
    fn test_inline_primary_key_is_lifted() {
        let entity = parse_one("create table t1 (id int primary key)");
        assert_eq!(entity.kind(), EntityKind::Table);
        assert_eq!(
            entity.canonical_create(),
            "CREATE TABLE `t1` (\n\t`id` int,\n\tPRIMARY KEY (`id`)\n)"
        );
    }

    #[test]
    fn test_table_with_index() {
        let entity = parse_one(
            "create table t2 (id int, name varchar(12), primary key(id), key name_idx(name))",
        );
        assert_eq!(
            entity.canonical_create(),
            "CREATE TABLE `t2` (\n\t`id` int,\n\t`name` varchar(12),\n\tPRIMARY KEY (`id`),\n\tKEY `name_idx` (`name`)\n)"
        );
    }

    #[test]
    fn test_quoted_and_unquoted_definitions_agree() {
        let plain = parse_one("create table t2 (id int unsigned not null, key name_idx(id))");
        let quoted = parse_one(
            "CREATE TABLE `t2` (\n  `id` INT UNSIGNED NOT NULL,\n  KEY `name_idx` (`id`)\n)",
        );
        assert_eq!(plain, quoted);
    }

    #[test]
    fn test_unnamed_index_takes_first_column_name() {
        let Entity::Table(table) = parse_one("create table t (a int, b int, unique (b, a))") else {
            panic!("expected a table");
        };
        let key = table.key("b").expect("implicit key name");
        assert_eq!(key.kind, KeyKind::Unique);
        assert_eq!(key.definition, "UNIQUE KEY `b` (`b`, `a`)");
    }

    #[test]
    fn test_inline_unique_becomes_key() {
        let Entity::Table(table) = parse_one("create table t (email varchar(100) unique)") else {
            panic!("expected a table");
        };
        assert_eq!(table.columns[0].definition, "varchar(100)");
        assert_eq!(table.keys[0].definition, "UNIQUE KEY `email` (`email`)");
    }

    #[test]
    fn test_foreign_key_reference_recorded() {
        let Entity::Table(table) = parse_one(
            "create table child (id int, parent_id int, constraint fk_parent foreign key (parent_id) references parent (id))",
        ) else {
            panic!("expected a table");
        };
        assert!(table.references.contains("parent"));
        let key = table.key("fk_parent").expect("named foreign key");
        assert_eq!(key.kind, KeyKind::ForeignKey);
    }

    #[test]
    fn test_view_canonical_form() {
        let entity = parse_one("create view v1 as select id from t1");
        assert_eq!(entity.kind(), EntityKind::View);
        assert_eq!(entity.canonical_create(), "CREATE VIEW `v1` AS SELECT `id` FROM `t1`");
        assert!(entity.references().contains("t1"));
    }

    #[test]
    fn test_view_relations_skip_columns_and_ctes() {
        let Entity::View(view) = parse_one(
            "create view v as with recent as (select id from orders) \
             select r.id, c.name from recent r join customers c on c.id = r.id \
             union select id, name from (select id, name from `archive`.`old_customers`) x",
        ) else {
            panic!("expected a view");
        };
        let expected: BTreeSet<String> = ["orders", "customers", "old_customers"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(view.relations, expected);
    }

    #[test]
    fn test_rejects_other_statements() {
        assert!(matches!(
            Entity::parse("select 1"),
            Err(EngineError::UnsupportedStatement(_))
        ));
        assert!(matches!(
            Entity::parse("create table t2 as select * from t1"),
            Err(EngineError::UnsupportedStatement(_))
        ));
    }

    #[test]
    fn test_split_leading_ident() {
        assert_eq!(
            split_leading_ident("`a``b` (x)"),
            Some(("a`b".to_string(), "(x)"))
        );
        assert_eq!(split_leading_ident("(x)"), None);
    }
}
