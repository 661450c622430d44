//! @acp:module "Annotation Reader"
//! @acp:summary "Entry point: builds, caches, merges and resolves entities"
//! @acp:domain annotations
//! @acp:layer api
//!
//! # Annotation Reader
//!
//! [`AnnotationReader`] ties the host collaborators together. An entity is built
//! once per fully-qualified name: the host describes it, its source text is
//! scanned for imports, and every doc comment is parsed in the scope of its
//! declaring entity. Merged views and resolved objects are built fresh on each
//! call from the cached entities.
//!
//! ```rust,ignore
//! let reader = AnnotationReader::new(introspector, registry);
//! let order = reader.resolve("App\\Order")?;
//! let rule = order.annotation("App\\Validators\\Positive")?;
//! ```

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::config::Config;
use crate::error::{NotesError, Result};
use crate::host::{ConstantResolver, Introspector, NoConstants, SourceCache};
use crate::imports::{namespace_of, normalize_name, scan_imports};
use crate::merge::{EntitySource, MergeOptions, MergedView, Merger};
use crate::model::{Entity, Field, Method, Tag};
use crate::parse::{location, parse_doc_comment, ConstantScope};
use crate::resolve::{
    AnnotationMatch, Binder, Descriptor, DescriptorRegistry, ResolvedObject, TagOwner,
};

/// @acp:summary "Annotation engine facade over host collaborators"
/// @acp:lock normal
pub struct AnnotationReader {
    config: Config,
    introspector: Arc<dyn Introspector>,
    constants: Arc<dyn ConstantResolver>,
    registry: Arc<DescriptorRegistry>,
    sources: SourceCache,
    entities: RwLock<HashMap<String, Arc<Entity>>>,
}

impl AnnotationReader {
    /// @acp:summary "Create a reader with default configuration and no constants"
    pub fn new<I>(introspector: I, registry: DescriptorRegistry) -> Self
    where
        I: Introspector + 'static,
    {
        Self::from_parts(
            Config::default(),
            Arc::new(introspector),
            Arc::new(NoConstants),
            Arc::new(registry),
        )
    }

    /// @acp:summary "Create a reader from shared collaborators"
    pub fn from_parts(
        config: Config,
        introspector: Arc<dyn Introspector>,
        constants: Arc<dyn ConstantResolver>,
        registry: Arc<DescriptorRegistry>,
    ) -> Self {
        let sources = SourceCache::new(config.cache_sources);
        Self {
            config,
            introspector,
            constants,
            registry,
            sources,
            entities: RwLock::new(HashMap::new()),
        }
    }

    /// Replace the configuration; drops every cached entity and source
    pub fn with_config(mut self, config: Config) -> Self {
        self.sources = SourceCache::new(config.cache_sources);
        self.config = config;
        self.clear_cache();
        self
    }

    /// Replace the constant resolver; drops every cached entity
    pub fn with_constants<C>(mut self, constants: C) -> Self
    where
        C: ConstantResolver + 'static,
    {
        self.constants = Arc::new(constants);
        self.clear_cache();
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &DescriptorRegistry {
        &self.registry
    }

    pub fn sources(&self) -> &SourceCache {
        &self.sources
    }

    /// @acp:summary "Own, unmerged metadata of one entity (cached)"
    pub fn entity(&self, name: &str) -> Result<Arc<Entity>> {
        let key = normalize_name(name);
        {
            let entities = self.entities.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(entity) = entities.get(key) {
                tracing::trace!("Entity cache hit: {}", key);
                return Ok(Arc::clone(entity));
            }
        }

        let entity = Arc::new(self.build_entity(key)?);
        let mut entities = self.entities.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(entities.entry(key.to_string()).or_insert(entity)))
    }

    /// @acp:summary "Merged view with the configured merge options"
    pub fn read(&self, name: &str) -> Result<MergedView> {
        self.read_with(name, self.config.merge)
    }

    pub fn read_with(&self, name: &str, options: MergeOptions) -> Result<MergedView> {
        Merger::new(self, options, &self.config.exclusion_marker).merge(name)
    }

    /// @acp:summary "Merged view with every annotation bound to a descriptor"
    pub fn resolve(&self, name: &str) -> Result<ResolvedObject> {
        self.resolve_with(name, self.config.merge)
    }

    pub fn resolve_with(&self, name: &str, options: MergeOptions) -> Result<ResolvedObject> {
        let view = self.read_with(name, options)?;
        Binder::new(&self.registry, &self.config.exclusion_marker).bind(view)
    }

    /// First descriptor of a type on an entity or its members
    pub fn annotation(&self, entity: &str, descriptor: &str) -> Result<Arc<dyn Descriptor>> {
        self.resolve(entity)?.annotation(descriptor)
    }

    /// Every descriptor of a type on an entity and its members, with owners
    pub fn annotations(
        &self,
        entity: &str,
        descriptor: &str,
        fail_on_missing: bool,
    ) -> Result<Vec<(TagOwner, Arc<dyn Descriptor>)>> {
        let resolved = self.resolve(entity)?;
        let found = resolved.annotations(descriptor, fail_on_missing)?;
        Ok(found
            .into_iter()
            .map(|AnnotationMatch { owner, instance, .. }| (owner, instance))
            .collect())
    }

    /// Drop cached entities and source texts
    pub fn clear_cache(&self) {
        self.entities
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.sources.clear();
    }

    pub fn cached_entities(&self) -> usize {
        self.entities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn build_entity(&self, name: &str) -> Result<Entity> {
        let info = self
            .introspector
            .class_info(name)
            .map_err(|err| NotesError::host(format!("describing `{}`", name), err))?;
        let entity_name = normalize_name(&info.name).to_string();

        let source = self
            .sources
            .load(&info.source)
            .map_err(|err| NotesError::host(format!("reading source of `{}`", entity_name), err))?;
        let imports = scan_imports(&source);

        let parent = info.parent.as_deref().map(normalize_name);
        let scope = ConstantScope {
            entity: &entity_name,
            parent,
            namespace: namespace_of(&entity_name),
            imports: &imports,
            constants: self.constants.as_ref(),
        };

        let tags = self.parse_tags(info.doc_comment.as_deref(), &scope, None)?;

        let mut fields = Vec::with_capacity(info.fields.len());
        for field in info.fields {
            let tags = self.parse_tags(field.doc_comment.as_deref(), &scope, Some(&field.name))?;
            fields.push(Field {
                name: field.name,
                type_name: field.type_name,
                nullable: field.nullable,
                default: field.default,
                declared_in: entity_name.clone(),
                tags,
            });
        }

        let mut methods = Vec::with_capacity(info.methods.len());
        for method in info.methods {
            let tags = self.parse_tags(method.doc_comment.as_deref(), &scope, Some(&method.name))?;
            methods.push(Method {
                name: method.name,
                return_type: method.return_type,
                constructor: method.constructor,
                destructor: method.destructor,
                parameters: method.parameters,
                declared_in: entity_name.clone(),
                tags,
            });
        }

        tracing::debug!(
            "Built entity {} ({} imports, {} tags, {} fields, {} methods)",
            entity_name,
            imports.len(),
            tags.len(),
            fields.len(),
            methods.len()
        );

        Ok(Entity {
            parent: parent.map(String::from),
            mixins: info.mixins.iter().map(|m| normalize_name(m).to_string()).collect(),
            interfaces: info
                .interfaces
                .iter()
                .map(|i| normalize_name(i).to_string())
                .collect(),
            name: entity_name,
            kind: info.kind,
            imports,
            tags,
            fields,
            methods,
        })
    }

    fn parse_tags(
        &self,
        doc: Option<&str>,
        scope: &ConstantScope<'_>,
        member: Option<&str>,
    ) -> Result<Vec<Tag>> {
        match doc {
            Some(doc) => parse_doc_comment(doc, scope, &location(scope.entity, member), &self.config),
            None => Ok(Vec::new()),
        }
    }
}

impl EntitySource for AnnotationReader {
    fn entity(&self, name: &str) -> Result<Arc<Entity>> {
        AnnotationReader::entity(self, name)
    }
}

impl std::fmt::Debug for AnnotationReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnnotationReader")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("cached_entities", &self.cached_entities())
            .field("cached_sources", &self.sources.len())
            .finish()
    }
}
