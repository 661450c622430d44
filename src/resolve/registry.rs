//! @acp:module "Descriptor Registry"
//! @acp:summary "String-keyed constructors for descriptor types"
//! @acp:domain annotations
//! @acp:layer service

use std::collections::HashMap;
use std::fmt;

use anyhow::anyhow;
use serde_json::Value;

use super::{Constructible, Descriptor};
use crate::imports::normalize_name;

type Constructor = Box<dyn Fn(Vec<Value>) -> anyhow::Result<Box<dyn Descriptor>> + Send + Sync>;

/// @acp:summary "Maps fully-qualified descriptor names to constructors"
#[derive(Default)]
pub struct DescriptorRegistry {
    constructors: HashMap<String, Constructor>,
}

impl DescriptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a [`Constructible`] type under a fully-qualified name
    pub fn register<T: Constructible>(&mut self, name: impl AsRef<str>) -> &mut Self {
        self.register_with(name, |args| {
            T::construct(args).map(|descriptor| Box::new(descriptor) as Box<dyn Descriptor>)
        })
    }

    /// Register an arbitrary constructor under a fully-qualified name
    pub fn register_with<F>(&mut self, name: impl AsRef<str>, constructor: F) -> &mut Self
    where
        F: Fn(Vec<Value>) -> anyhow::Result<Box<dyn Descriptor>> + Send + Sync + 'static,
    {
        let name = normalize_name(name.as_ref()).to_string();
        if self
            .constructors
            .insert(name.clone(), Box::new(constructor))
            .is_some()
        {
            tracing::debug!("Replaced descriptor constructor for {}", name);
        }
        self
    }

    /// Builder form of [`register`](Self::register)
    pub fn with<T: Constructible>(mut self, name: impl AsRef<str>) -> Self {
        self.register::<T>(name);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(normalize_name(name))
    }

    /// Construct a descriptor from positional arguments
    pub fn construct(&self, name: &str, args: Vec<Value>) -> anyhow::Result<Box<dyn Descriptor>> {
        let constructor = self
            .constructors
            .get(normalize_name(name))
            .ok_or_else(|| anyhow!("no descriptor type registered for `{}`", name))?;
        constructor(args)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }
}

impl fmt::Debug for DescriptorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("DescriptorRegistry")
            .field("types", &names)
            .finish()
    }
}
