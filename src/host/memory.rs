//! @acp:module "In-Memory Host"
//! @acp:summary "Map-backed introspector and constant resolver"
//! @acp:domain annotations
//! @acp:layer service

use std::collections::HashMap;

use anyhow::anyhow;
use serde_json::Value;

use super::{ClassInfo, ConstantResolver, Introspector};
use crate::imports::normalize_name;

/// @acp:summary "Introspector over class descriptions registered up front"
#[derive(Debug, Default, Clone)]
pub struct MemoryIntrospector {
    classes: HashMap<String, ClassInfo>,
}

impl MemoryIntrospector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a class description
    pub fn insert(&mut self, info: ClassInfo) {
        self.classes
            .insert(normalize_name(&info.name).to_string(), info);
    }

    pub fn with(mut self, info: ClassInfo) -> Self {
        self.insert(info);
        self
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl Introspector for MemoryIntrospector {
    fn class_info(&self, name: &str) -> anyhow::Result<ClassInfo> {
        self.classes
            .get(normalize_name(name))
            .cloned()
            .ok_or_else(|| anyhow!("Class `{}` does not exist", name))
    }
}

impl FromIterator<ClassInfo> for MemoryIntrospector {
    fn from_iter<I: IntoIterator<Item = ClassInfo>>(iter: I) -> Self {
        let mut introspector = MemoryIntrospector::new();
        for info in iter {
            introspector.insert(info);
        }
        introspector
    }
}

/// @acp:summary "Constant resolver over fixed tables"
#[derive(Debug, Default, Clone)]
pub struct StaticConstants {
    classes: HashMap<String, HashMap<String, Value>>,
    globals: HashMap<String, Value>,
}

impl StaticConstants {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_class_constant(
        mut self,
        class: impl AsRef<str>,
        name: impl Into<String>,
        value: Value,
    ) -> Self {
        self.classes
            .entry(normalize_name(class.as_ref()).to_string())
            .or_default()
            .insert(name.into(), value);
        self
    }

    pub fn with_constant(mut self, name: impl AsRef<str>, value: Value) -> Self {
        self.globals
            .insert(normalize_name(name.as_ref()).to_string(), value);
        self
    }
}

impl ConstantResolver for StaticConstants {
    fn class_constant(&self, class: &str, name: &str) -> anyhow::Result<Option<Value>> {
        Ok(self
            .classes
            .get(normalize_name(class))
            .and_then(|constants| constants.get(name))
            .cloned())
    }

    fn constant(&self, name: &str) -> anyhow::Result<Option<Value>> {
        Ok(self.globals.get(normalize_name(name)).cloned())
    }
}
