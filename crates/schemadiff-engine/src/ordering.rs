//! Dependency ordering of entity diffs.
//!
//! Changes are replayed against a virtual schema holding, for every entity,
//! the names of the entities it depends on (foreign-key targets for tables,
//! selected tables and views for views). At every step the first pending
//! change that can be applied to the current virtual state is taken:
//!
//! - a create needs its name to be free and its dependencies to exist
//! - an alteration needs the dependencies of its new definition to exist
//! - a drop needs no remaining entity to depend on it
//!
//! When nothing is applicable the remaining changes form a cycle.

use crate::diff::EntityDiff;
use crate::error::EngineError;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;
#[cfg(feature = "tracing")]
use tracing::debug;

/// Entity names mapped to the names they depend on.
#[derive(Debug, Clone, Default)]
pub(crate) struct VirtualSchema {
    entities: BTreeMap<String, BTreeSet<String>>,
    known: BTreeSet<String>,
}

impl VirtualSchema {
    /// `known` is every entity name that can appear as a dependency; other
    /// identifiers referenced by an entity are ignored.
    pub(crate) fn new(known: BTreeSet<String>) -> Self {
        Self {
            entities: BTreeMap::new(),
            known,
        }
    }

    pub(crate) fn insert(&mut self, name: &str, references: &BTreeSet<String>) {
        let dependencies = self.dependencies(name, references);
        self.entities.insert(name.to_string(), dependencies);
    }

    fn dependencies(&self, name: &str, references: &BTreeSet<String>) -> BTreeSet<String> {
        references
            .iter()
            .filter(|reference| reference.as_str() != name && self.known.contains(*reference))
            .cloned()
            .collect()
    }

    fn has_dependents(&self, name: &str) -> bool {
        self.entities
            .iter()
            .any(|(other, deps)| other != name && deps.contains(name))
    }

    fn accepts(&self, diff: &EntityDiff) -> bool {
        let name = diff.name();
        match diff {
            EntityDiff::DropTable(_) | EntityDiff::DropView(_) => !self.has_dependents(name),
            EntityDiff::CreateTable(_) | EntityDiff::CreateView(_) => {
                !self.entities.contains_key(name) && self.dependencies_exist(name, diff)
            }
            EntityDiff::AlterTable { .. } | EntityDiff::AlterView { .. } => {
                self.dependencies_exist(name, diff)
            }
        }
    }

    fn dependencies_exist(&self, name: &str, diff: &EntityDiff) -> bool {
        diff.references_after()
            .map(|references| {
                self.dependencies(name, references)
                    .iter()
                    .all(|dep| self.entities.contains_key(dep))
            })
            .unwrap_or(true)
    }

    fn apply(&mut self, diff: &EntityDiff) {
        let name = diff.name().to_string();
        match diff.references_after() {
            Some(references) => self.insert(&name, references),
            None => {
                self.entities.remove(&name);
            }
        }
    }
}

/// Order `diffs` so each one can be applied after its predecessors.
pub(crate) fn order_diffs(
    mut state: VirtualSchema,
    diffs: Vec<EntityDiff>,
    deadline: Instant,
) -> Result<Vec<EntityDiff>, EngineError> {
    let mut pending = diffs;
    let mut ordered = Vec::with_capacity(pending.len());

    while !pending.is_empty() {
        if Instant::now() >= deadline {
            return Err(EngineError::DeadlineExceeded);
        }
        let Some(idx) = pending.iter().position(|diff| state.accepts(diff)) else {
            let names = pending.iter().map(|diff| diff.name().to_string()).collect();
            return Err(EngineError::UnresolvableOrder(names));
        };
        let diff = pending.remove(idx);
        #[cfg(feature = "tracing")]
        debug!(entity = diff.name(), step = ordered.len(), "ordered diff");
        state.apply(&diff);
        ordered.push(diff);
    }

    Ok(ordered)
}
