//! @acp:module "Model"
//! @acp:summary "Entities, members and tags as seen by the annotation engine"
//! @acp:domain annotations
//! @acp:layer model

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::imports::{namespace_of, ImportTable};
use crate::parse::ParsedArguments;
use crate::resolve::Descriptor;

/// Kind of declared type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    #[default]
    Class,
    Trait,
    Interface,
}

/// @acp:summary "One annotation occurrence parsed from a doc comment"
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    /// Tag name as written, before alias resolution
    pub name: String,
    /// Text between the first `(` and the last `)`, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_arguments: Option<String>,
    #[serde(default)]
    pub arguments: ParsedArguments,
    /// Plain documentation tag (`@var`, `@param`, ...); never parsed or resolved
    #[serde(default)]
    pub doc_only: bool,
    /// Fully-qualified descriptor type, set once resolved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descriptor_type: Option<String>,
    /// Live descriptor instance, set once resolved
    #[serde(skip)]
    pub instance: Option<Arc<dyn Descriptor>>,
}

impl Tag {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Case-insensitive name comparison (used for the exclusion marker)
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    pub fn is_resolved(&self) -> bool {
        self.instance.is_some()
    }

    /// Whether this tag was resolved to the given descriptor type
    pub fn resolves_to(&self, descriptor: &str) -> bool {
        self.descriptor_type.as_deref() == Some(descriptor)
    }

    /// Source form of the tag, for error messages
    pub fn source_text(&self) -> String {
        match &self.raw_arguments {
            Some(raw) => format!("{}({})", self.name, raw),
            None => self.name.clone(),
        }
    }
}

/// @acp:summary "Behavior shared by fields and methods"
pub trait Member: Clone {
    fn name(&self) -> &str;

    fn tags(&self) -> &[Tag];

    fn tags_mut(&mut self) -> &mut Vec<Tag>;

    /// Entity that declares this member
    fn declared_in(&self) -> &str;

    /// Whether any tag carries `name` (case-insensitive)
    fn has_tag(&self, name: &str) -> bool {
        self.tags().iter().any(|tag| tag.is(name))
    }
}

/// @acp:summary "Parameter of a callable member"
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub name: String,
    pub position: usize,
    #[serde(default)]
    pub type_name: Option<String>,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub by_reference: bool,
    /// Accepts an array
    #[serde(default)]
    pub array: bool,
    /// Accepts a callable
    #[serde(default)]
    pub callable: bool,
}

impl Parameter {
    pub fn new(name: impl Into<String>, position: usize) -> Self {
        Self {
            name: name.into(),
            position,
            ..Default::default()
        }
    }

    /// Set the declared type; `array` and `callable` hints are derived from it
    pub fn typed(mut self, type_name: impl Into<String>, nullable: bool) -> Self {
        let type_name = type_name.into();
        self.array = type_name.eq_ignore_ascii_case("array");
        self.callable = type_name.eq_ignore_ascii_case("callable");
        self.type_name = Some(type_name);
        self.nullable = nullable;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn by_reference(mut self) -> Self {
        self.by_reference = true;
        self
    }
}

/// @acp:summary "Field member with its tags"
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub name: String,
    #[serde(default)]
    pub type_name: Option<String>,
    #[serde(default)]
    pub nullable: bool,
    /// Declared default; `Some(Value::Null)` is an explicit null default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    pub declared_in: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

impl Member for Field {
    fn name(&self) -> &str {
        &self.name
    }

    fn tags(&self) -> &[Tag] {
        &self.tags
    }

    fn tags_mut(&mut self) -> &mut Vec<Tag> {
        &mut self.tags
    }

    fn declared_in(&self) -> &str {
        &self.declared_in
    }
}

/// @acp:summary "Callable member with its parameters and tags"
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Method {
    pub name: String,
    #[serde(default)]
    pub return_type: Option<String>,
    #[serde(default)]
    pub constructor: bool,
    #[serde(default)]
    pub destructor: bool,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    pub declared_in: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

impl Method {
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|param| param.name == name)
    }
}

impl Member for Method {
    fn name(&self) -> &str {
        &self.name
    }

    fn tags(&self) -> &[Tag] {
        &self.tags
    }

    fn tags_mut(&mut self) -> &mut Vec<Tag> {
        &mut self.tags
    }

    fn declared_in(&self) -> &str {
        &self.declared_in
    }
}

/// @acp:summary "One declared type with its own, unmerged metadata"
///
/// Built once from the host's description and never mutated afterwards; merged
/// views clone what they need from it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub name: String,
    pub kind: EntityKind,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub mixins: Vec<String>,
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub imports: ImportTable,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default)]
    pub methods: Vec<Method>,
}

impl Entity {
    pub fn namespace(&self) -> &str {
        namespace_of(&self.name)
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.iter().find(|method| method.name == name)
    }
}
