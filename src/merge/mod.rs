//! @acp:module "Metadata Merger"
//! @acp:summary "Hierarchy walk merging imports, tags and members with child-first precedence"
//! @acp:domain annotations
//! @acp:layer service
//!
//! # Metadata Merger
//!
//! For a target entity the merger walks the supertype, the mixed-in units and the
//! implemented interfaces, then layers the target's own data on top:
//!
//! - imports are a union: supertype, then mixins, then interfaces, then own entries
//! - members merge by name; a re-declared member replaces the inherited one whole
//! - members carrying the exclusion marker are dropped at the very end, so a
//!   descendant that re-declares a member without the marker brings it back
//! - entity tags are ordered most-derived first, each unit contributing once
//!
//! Each section can instead be merged shallowly, using only the target's own data.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

use crate::error::{NotesError, Result};
use crate::imports::{normalize_name, ImportTable};
use crate::model::{Entity, EntityKind, Field, Member, Method, Tag};

/// How far a merged section reaches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    /// Whole hierarchy
    #[default]
    Full,
    /// Target entity only
    Shallow,
}

impl MergeMode {
    pub fn is_full(self) -> bool {
        self == MergeMode::Full
    }
}

/// @acp:summary "Merge mode per section of the merged view"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeOptions {
    #[serde(default)]
    pub imports: MergeMode,
    #[serde(default)]
    pub entity_tags: MergeMode,
    #[serde(default)]
    pub methods: MergeMode,
    #[serde(default)]
    pub fields: MergeMode,
}

impl MergeOptions {
    pub fn full() -> Self {
        Self::default()
    }

    pub fn shallow() -> Self {
        Self {
            imports: MergeMode::Shallow,
            entity_tags: MergeMode::Shallow,
            methods: MergeMode::Shallow,
            fields: MergeMode::Shallow,
        }
    }

    fn needs_walk(&self) -> bool {
        [self.imports, self.entity_tags, self.methods, self.fields]
            .iter()
            .any(|mode| mode.is_full())
    }
}

/// Trait for anything that can hand out entities by fully-qualified name
pub trait EntitySource {
    fn entity(&self, name: &str) -> Result<Arc<Entity>>;
}

/// @acp:summary "In-memory entity store"
#[derive(Debug, Default, Clone)]
pub struct EntityArena {
    entities: HashMap<String, Arc<Entity>>,
}

impl EntityArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entity: Entity) {
        self.entities
            .insert(normalize_name(&entity.name).to_string(), Arc::new(entity));
    }

    pub fn with(mut self, entity: Entity) -> Self {
        self.insert(entity);
        self
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl EntitySource for EntityArena {
    fn entity(&self, name: &str) -> Result<Arc<Entity>> {
        self.entities
            .get(normalize_name(name))
            .cloned()
            .ok_or_else(|| {
                NotesError::host(
                    format!("loading `{}`", name),
                    anyhow!("Entity `{}` is not registered", name),
                )
            })
    }
}

/// @acp:summary "Merged metadata of one entity and its ancestry"
///
/// Owns copies of everything it holds; binding descriptors into it never
/// touches the cached entities it was built from.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedView {
    pub name: String,
    pub kind: EntityKind,
    pub parent: Option<String>,
    pub mixins: Vec<String>,
    pub interfaces: Vec<String>,
    pub imports: ImportTable,
    pub tags: Vec<Tag>,
    pub fields: Vec<Field>,
    pub methods: Vec<Method>,
}

impl MergedView {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.iter().find(|method| method.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.method(name).is_some()
    }
}

/// Hierarchy data gathered for one unit, before the exclusion marker is applied
#[derive(Debug, Clone, Default)]
struct Gathered {
    imports: ImportTable,
    /// Entity tags per contributing unit, most-derived first
    tags: Vec<(String, Vec<Tag>)>,
    fields: Vec<Field>,
    methods: Vec<Method>,
}

impl Gathered {
    fn flat_tags(&self) -> Vec<Tag> {
        self.tags
            .iter()
            .flat_map(|(_, tags)| tags.iter().cloned())
            .collect()
    }
}

/// Replace a member of the same name in place, or append
fn overlay<M: Member>(members: &mut Vec<M>, incoming: &[M]) {
    for member in incoming {
        match members.iter_mut().find(|m| m.name() == member.name()) {
            Some(slot) => *slot = member.clone(),
            None => members.push(member.clone()),
        }
    }
}

fn without_marker<M: Member>(members: Vec<M>, marker: &str) -> Vec<M> {
    members
        .into_iter()
        .filter(|member| !member.has_tag(marker))
        .collect()
}

/// @acp:summary "Builds merged views over an entity source"
pub struct Merger<'a, S: EntitySource + ?Sized> {
    source: &'a S,
    options: MergeOptions,
    marker: &'a str,
}

impl<'a, S: EntitySource + ?Sized> Merger<'a, S> {
    pub fn new(source: &'a S, options: MergeOptions, marker: &'a str) -> Self {
        Self {
            source,
            options,
            marker,
        }
    }

    /// @acp:summary "Merged view of one entity"
    pub fn merge(&self, name: &str) -> Result<MergedView> {
        let entity = self.source.entity(name)?;

        let gathered = if self.options.needs_walk() {
            let mut done = HashMap::new();
            Some(self.gather(&entity.name, &mut Vec::new(), &mut done)?)
        } else {
            None
        };
        let full = |mode: MergeMode| gathered.as_ref().filter(|_| mode.is_full());

        let imports = match full(self.options.imports) {
            Some(gathered) => gathered.imports.clone(),
            None => entity.imports.clone(),
        };
        let tags = match full(self.options.entity_tags) {
            Some(gathered) => gathered.flat_tags(),
            None => entity.tags.clone(),
        };
        let fields = match full(self.options.fields) {
            Some(gathered) => gathered.fields.clone(),
            None => entity.fields.clone(),
        };
        let methods = match full(self.options.methods) {
            Some(gathered) => gathered.methods.clone(),
            None => entity.methods.clone(),
        };

        let view = MergedView {
            name: entity.name.clone(),
            kind: entity.kind,
            parent: entity.parent.clone(),
            mixins: entity.mixins.clone(),
            interfaces: entity.interfaces.clone(),
            imports,
            tags,
            fields: without_marker(fields, self.marker),
            methods: without_marker(methods, self.marker),
        };

        tracing::debug!(
            "Merged {} ({} imports, {} tags, {} fields, {} methods)",
            view.name,
            view.imports.len(),
            view.tags.len(),
            view.fields.len(),
            view.methods.len()
        );
        Ok(view)
    }

    fn gather(
        &self,
        name: &str,
        path: &mut Vec<String>,
        done: &mut HashMap<String, Gathered>,
    ) -> Result<Gathered> {
        let name = normalize_name(name);
        if path.iter().any(|seen| seen == name) {
            let mut cycle = path.clone();
            cycle.push(name.to_string());
            return Err(NotesError::CyclicHierarchy { path: cycle });
        }
        if let Some(gathered) = done.get(name) {
            return Ok(gathered.clone());
        }

        path.push(name.to_string());
        let entity = self.source.entity(name)?;

        let parent = match &entity.parent {
            Some(parent) => Some(self.gather(parent, path, done)?),
            None => None,
        };
        let mixins = entity
            .mixins
            .iter()
            .map(|mixin| self.gather(mixin, path, done))
            .collect::<Result<Vec<_>>>()?;
        let interfaces = entity
            .interfaces
            .iter()
            .map(|interface| self.gather(interface, path, done))
            .collect::<Result<Vec<_>>>()?;
        path.pop();

        let mut out = Gathered::default();

        if let Some(parent) = &parent {
            out.imports.extend(&parent.imports);
            out.fields = parent.fields.clone();
            out.methods = parent.methods.clone();
        }
        for mixin in &mixins {
            out.imports.extend(&mixin.imports);
            overlay(&mut out.fields, &mixin.fields);
            overlay(&mut out.methods, &mixin.methods);
        }
        for interface in &interfaces {
            out.imports.extend(&interface.imports);
        }
        out.imports.extend(&entity.imports);
        overlay(&mut out.fields, &entity.fields);
        overlay(&mut out.methods, &entity.methods);

        // Most-derived first; a unit reached twice keeps its first position
        let units = std::iter::once(vec![(name.to_string(), entity.tags.clone())])
            .chain(interfaces.iter().rev().map(|g| g.tags.clone()))
            .chain(mixins.iter().rev().map(|g| g.tags.clone()))
            .chain(parent.iter().map(|g| g.tags.clone()))
            .flatten();
        for (unit, tags) in units {
            if !out.tags.iter().any(|(seen, _)| *seen == unit) {
                out.tags.push((unit, tags));
            }
        }

        done.insert(name.to_string(), out.clone());
        Ok(out)
    }
}

/// @acp:summary "Merge one entity with the given options and exclusion marker"
pub fn merge<S: EntitySource + ?Sized>(
    source: &S,
    name: &str,
    options: MergeOptions,
    marker: &str,
) -> Result<MergedView> {
    Merger::new(source, options, marker).merge(name)
}
