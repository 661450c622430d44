#![forbid(unsafe_code)]

//! @acp:module "docnotes Library"
//! @acp:summary "Doc-comment annotations bound to live descriptor objects"
//! @acp:domain annotations
//! @acp:layer api
//! @acp:stability stable
//!
//! # docnotes
//!
//! Declarative metadata written as doc-comment tags on types, fields and
//! methods, turned into live, fully-bound descriptor instances.
//!
//! ## Features
//!
//! - **Safe arguments**: literals, collections and constant references only; nothing is evaluated
//! - **Import aware**: tag names resolve through the declaring file's `use` statements
//! - **Inheritance**: supertypes, mixins and interfaces merge with child-first precedence
//! - **Exclusion marker**: `@Ignore` drops a member from every descendant that keeps it
//!
//! ## Example
//!
//! ```rust,no_run
//! use docnotes::{
//!     AnnotationReader, AttributeError, ClassInfo, Constructible, Descriptor,
//!     DescriptorRegistry, FieldInfo, MemoryIntrospector, SourceRef,
//! };
//! use serde_json::Value;
//!
//! #[derive(Debug)]
//! struct Positive {
//!     min: f64,
//!     message: String,
//! }
//!
//! impl Descriptor for Positive {
//!     fn set_attribute(&mut self, name: &str, value: Value) -> Result<(), AttributeError> {
//!         match (name, value) {
//!             ("message", Value::String(text)) => {
//!                 self.message = text;
//!                 Ok(())
//!             }
//!             (other, _) => Err(AttributeError::unknown(other)),
//!         }
//!     }
//! }
//!
//! impl Constructible for Positive {
//!     fn construct(args: Vec<Value>) -> anyhow::Result<Self> {
//!         let min = args.first().and_then(Value::as_f64).unwrap_or_default();
//!         Ok(Positive { min, message: String::new() })
//!     }
//! }
//!
//! fn main() -> docnotes::Result<()> {
//!     let source = "<?php namespace App; use App\\Validators\\Positive; class Order {}";
//!     let introspector = MemoryIntrospector::new().with(
//!         ClassInfo::new("App\\Order")
//!             .source(SourceRef::Text(source.into()))
//!             .field(FieldInfo::new("amount").doc("/** @Positive(0.01, message: \"too small\") */")),
//!     );
//!     let registry = DescriptorRegistry::new().with::<Positive>("App\\Validators\\Positive");
//!
//!     let reader = AnnotationReader::new(introspector, registry);
//!     let rule = reader.annotation("App\\Order", "App\\Validators\\Positive")?;
//!     let rule = rule.downcast_ref::<Positive>().expect("registered type");
//!     assert_eq!(rule.message, "too small");
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod host;
pub mod imports;
pub mod merge;
pub mod model;
pub mod parse;
pub mod reader;
pub mod resolve;

// Re-exports
pub use config::Config;
pub use error::{ErrorKind, NotesError, Result};
pub use host::{
    ClassInfo, ConstantResolver, FieldInfo, Introspector, MemoryIntrospector, MethodInfo,
    NoConstants, SourceCache, SourceRef, StaticConstants,
};
pub use imports::{scan_imports, ImportEntry, ImportTable};
pub use merge::{EntityArena, EntitySource, MergeMode, MergeOptions, MergedView, Merger};
pub use model::{Entity, EntityKind, Field, Member, Method, Parameter, Tag};
pub use parse::{extract_tags, parse_arguments, parse_doc_comment, ConstantScope, ParsedArguments};
pub use reader::AnnotationReader;
pub use resolve::{
    AnnotationMatch, AttributeError, Binder, Constructible, Descriptor, DescriptorRegistry,
    ResolvedObject, TagOwner,
};

/// Version of the docnotes library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
