//! @acp:module "Annotation Resolver"
//! @acp:summary "Descriptor traits, registry, and binding of merged tags to live instances"
//! @acp:domain annotations
//! @acp:layer service
//!
//! # Annotation Resolver
//!
//! A tag such as `@Positive(0.01, message: "too small")` resolves in three steps:
//!
//! 1. `Positive` is looked up as an alias in the merged import table
//! 2. the fully-qualified name selects a constructor in the [`DescriptorRegistry`]
//! 3. positional arguments go to the constructor, named arguments are assigned
//!    one by one through [`Descriptor::set_attribute`]
//!
//! The resulting [`ResolvedObject`] answers first-match and all-matches lookups.

mod binder;
mod object;
mod registry;

pub use binder::Binder;
pub use object::{AnnotationMatch, ResolvedObject, TagOwner};
pub use registry::DescriptorRegistry;

use std::any::Any;
use std::fmt;

use serde_json::Value;
use thiserror::Error;

/// Upcast to `Any`, implemented for every sized `'static` type
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Why a named argument could not be assigned
#[derive(Debug, Error)]
pub enum AttributeError {
    /// The descriptor exposes no attribute by that name
    #[error("unknown attribute `{0}`")]
    Unknown(String),

    /// The attribute exists but refused the value
    #[error(transparent)]
    Rejected(#[from] anyhow::Error),
}

impl AttributeError {
    pub fn unknown(name: impl Into<String>) -> Self {
        AttributeError::Unknown(name.into())
    }
}

/// @acp:summary "Host object an annotation is bound to"
///
/// Implementors are plain host types; the engine only ever constructs them
/// through the registry and assigns named arguments through `set_attribute`.
pub trait Descriptor: AsAny + fmt::Debug + Send + Sync {
    /// Assign one named argument
    fn set_attribute(&mut self, name: &str, value: Value) -> Result<(), AttributeError>;
}

impl dyn Descriptor {
    /// Concrete descriptor behind a trait object
    pub fn downcast_ref<T: Descriptor>(&self) -> Option<&T> {
        <dyn Descriptor as AsAny>::as_any(self).downcast_ref::<T>()
    }

    pub fn is<T: Descriptor>(&self) -> bool {
        self.downcast_ref::<T>().is_some()
    }
}

/// Descriptor types that build themselves from positional arguments
pub trait Constructible: Descriptor + Sized {
    fn construct(args: Vec<Value>) -> anyhow::Result<Self>;
}
