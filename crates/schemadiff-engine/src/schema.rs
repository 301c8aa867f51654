//! Schemas as named collections of entities, and diffs between them.

use crate::diff::{diff_tables, diff_views, DiffHints, EntityDiff};
use crate::entity::Entity;
use crate::error::EngineError;
use crate::ordering::{order_diffs, VirtualSchema};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;
#[cfg(feature = "tracing")]
use tracing::debug;

/// A validated set of tables and views. Tables and views share one namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    entities: BTreeMap<String, Entity>,
}

impl Schema {
    /// Build a schema from CREATE TABLE / CREATE VIEW statements. A single
    /// query may hold several statements.
    pub fn from_queries<S: AsRef<str>>(queries: &[S]) -> Result<Self, EngineError> {
        let mut entities = BTreeMap::new();
        for query in queries {
            for entity in Entity::parse(query.as_ref())? {
                let name = entity.name().to_string();
                if entities.contains_key(&name) {
                    return Err(EngineError::DuplicateEntity(name));
                }
                entities.insert(name, entity);
            }
        }

        for entity in entities.values() {
            if let Entity::View(view) = entity {
                let missing: Vec<String> = view
                    .relations
                    .iter()
                    .filter(|relation| !entities.contains_key(*relation))
                    .cloned()
                    .collect();
                if !missing.is_empty() {
                    return Err(EngineError::UnresolvedViewReference {
                        view: view.name.clone(),
                        missing,
                    });
                }
            }
        }

        #[cfg(feature = "tracing")]
        debug!(entities = entities.len(), "built schema");

        Ok(Self { entities })
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.get(name)
    }

    /// Tables sorted by name, followed by views ordered so that every view
    /// comes after the views it selects from.
    pub fn entities(&self) -> Vec<&Entity> {
        let mut out: Vec<&Entity> = self
            .entities
            .values()
            .filter(|entity| matches!(entity, Entity::Table(_)))
            .collect();

        let views: BTreeMap<&str, &Entity> = self
            .entities
            .iter()
            .filter(|(_, entity)| matches!(entity, Entity::View(_)))
            .map(|(name, entity)| (name.as_str(), entity))
            .collect();
        let mut emitted: BTreeSet<&str> = BTreeSet::new();
        let mut remaining: Vec<&str> = views.keys().copied().collect();

        while !remaining.is_empty() {
            let ready = remaining.iter().position(|name| {
                views[name].references().iter().all(|reference| {
                    reference.as_str() == *name
                        || !views.contains_key(reference.as_str())
                        || emitted.contains(reference.as_str())
                })
            });
            // A cycle cannot be created by MySQL; fall back to name order.
            let name = remaining.remove(ready.unwrap_or(0));
            emitted.insert(name);
            out.push(views[name]);
        }
        out
    }

    /// Compute the changes that turn `self` into `other`.
    pub fn diff(&self, other: &Schema, hints: &DiffHints) -> SchemaDiff {
        let mut drop_views = Vec::new();
        let mut drop_tables = Vec::new();
        let mut alter_tables = Vec::new();
        let mut create_tables = Vec::new();
        let mut alter_views = Vec::new();
        let mut create_views = Vec::new();

        for (name, entity) in &self.entities {
            match (entity, other.entities.get(name)) {
                (Entity::Table(from), Some(Entity::Table(to))) => {
                    alter_tables.push(diff_tables(from, to, hints))
                }
                (Entity::View(from), Some(Entity::View(to))) => {
                    alter_views.push(diff_views(from, to, hints))
                }
                (Entity::Table(table), _) => drop_tables.push(EntityDiff::DropTable(table.clone())),
                (Entity::View(view), _) => drop_views.push(EntityDiff::DropView(view.clone())),
            }
        }
        for (name, entity) in &other.entities {
            let same_kind = self
                .entities
                .get(name)
                .is_some_and(|existing| existing.kind() == entity.kind());
            if same_kind {
                continue;
            }
            match entity {
                Entity::Table(_) => create_tables.push(entity.create()),
                Entity::View(_) => create_views.push(entity.create()),
            }
        }

        let diffs: Vec<EntityDiff> = drop_views
            .into_iter()
            .chain(drop_tables)
            .chain(alter_tables)
            .chain(create_tables)
            .chain(alter_views)
            .chain(create_views)
            .filter(|diff| !diff.is_empty())
            .collect();

        let known: BTreeSet<String> = self
            .entities
            .keys()
            .chain(other.entities.keys())
            .cloned()
            .collect();
        let mut initial = VirtualSchema::new(known);
        for entity in self.entities.values() {
            initial.insert(entity.name(), entity.references());
        }

        #[cfg(feature = "tracing")]
        debug!(changes = diffs.len(), "computed schema diff");

        SchemaDiff { diffs, initial }
    }
}

/// The changes between two schemas.
#[derive(Debug, Clone)]
pub struct SchemaDiff {
    diffs: Vec<EntityDiff>,
    initial: VirtualSchema,
}

impl SchemaDiff {
    pub fn is_empty(&self) -> bool {
        self.diffs.is_empty()
    }

    /// Changes grouped as drop views, drop tables, alter tables, create
    /// tables, alter views, create views; each group sorted by name.
    pub fn unordered_diffs(&self) -> &[EntityDiff] {
        &self.diffs
    }

    /// Changes in an order that can be applied one after the other.
    pub fn ordered_diffs(&self, deadline: Instant) -> Result<Vec<EntityDiff>, EngineError> {
        order_diffs(self.initial.clone(), self.diffs.clone(), deadline)
    }
}
