//! @acp:module "Host Interfaces"
//! @acp:summary "Narrow traits through which the engine reads class metadata and constants"
//! @acp:domain annotations
//! @acp:layer api
//!
//! # Host Interfaces
//!
//! The engine never inspects a running program itself. A host describes its types
//! through [`Introspector`] (one [`ClassInfo`] per fully-qualified name) and the
//! values of constants referenced from annotation arguments through
//! [`ConstantResolver`]. Both return `anyhow::Result` so any host failure can be
//! carried through unchanged; the engine wraps it in `NotesError::Host`.
//!
//! [`MemoryIntrospector`] and [`StaticConstants`] are map-backed implementations for
//! hosts that register their metadata up front, and for tests.

mod memory;
mod source;

pub use memory::{MemoryIntrospector, StaticConstants};
pub use source::{SourceCache, SourceRef};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{EntityKind, Parameter};

/// Trait for class metadata providers
pub trait Introspector: Send + Sync {
    /// Describe one declared type by fully-qualified name
    fn class_info(&self, name: &str) -> anyhow::Result<ClassInfo>;
}

/// Trait for constant value providers
pub trait ConstantResolver: Send + Sync {
    /// Value of `class::name`, `None` when the class has no such constant
    fn class_constant(&self, class: &str, name: &str) -> anyhow::Result<Option<Value>>;

    /// Value of a free-standing constant, `None` when undefined
    fn constant(&self, _name: &str) -> anyhow::Result<Option<Value>> {
        Ok(None)
    }
}

/// Resolver for hosts without constants; every reference is undefined
#[derive(Debug, Default, Clone, Copy)]
pub struct NoConstants;

impl ConstantResolver for NoConstants {
    fn class_constant(&self, _class: &str, _name: &str) -> anyhow::Result<Option<Value>> {
        Ok(None)
    }
}

/// @acp:summary "Host description of one declared type"
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassInfo {
    /// Fully-qualified name
    pub name: String,
    #[serde(default)]
    pub kind: EntityKind,
    /// Supertype, if any
    #[serde(default)]
    pub parent: Option<String>,
    /// Mixed-in units in declaration order
    #[serde(default)]
    pub mixins: Vec<String>,
    /// Directly implemented (or, for interfaces, extended) interfaces
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub doc_comment: Option<String>,
    #[serde(default)]
    pub source: SourceRef,
    /// Fields declared by this type itself
    #[serde(default)]
    pub fields: Vec<FieldInfo>,
    /// Methods declared by this type itself
    #[serde(default)]
    pub methods: Vec<MethodInfo>,
}

impl ClassInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn kind(mut self, kind: EntityKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn mixin(mut self, name: impl Into<String>) -> Self {
        self.mixins.push(name.into());
        self
    }

    pub fn implements(mut self, name: impl Into<String>) -> Self {
        self.interfaces.push(name.into());
        self
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc_comment = Some(doc.into());
        self
    }

    pub fn source(mut self, source: SourceRef) -> Self {
        self.source = source;
        self
    }

    pub fn field(mut self, field: FieldInfo) -> Self {
        self.fields.push(field);
        self
    }

    pub fn method(mut self, method: MethodInfo) -> Self {
        self.methods.push(method);
        self
    }
}

/// @acp:summary "Host description of a declared field"
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldInfo {
    pub name: String,
    #[serde(default)]
    pub type_name: Option<String>,
    #[serde(default)]
    pub nullable: bool,
    /// `Some(Value::Null)` is an explicit null default, `None` means no default
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub doc_comment: Option<String>,
}

impl FieldInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn typed(mut self, type_name: impl Into<String>, nullable: bool) -> Self {
        self.type_name = Some(type_name.into());
        self.nullable = nullable;
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc_comment = Some(doc.into());
        self
    }
}

/// @acp:summary "Host description of a declared method"
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodInfo {
    pub name: String,
    /// Declared return type, `None` when the method has none
    #[serde(default)]
    pub return_type: Option<String>,
    #[serde(default)]
    pub constructor: bool,
    #[serde(default)]
    pub destructor: bool,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub doc_comment: Option<String>,
}

impl MethodInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn returns(mut self, type_name: impl Into<String>) -> Self {
        self.return_type = Some(type_name.into());
        self
    }

    pub fn constructor(mut self) -> Self {
        self.constructor = true;
        self
    }

    pub fn parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc_comment = Some(doc.into());
        self
    }
}
