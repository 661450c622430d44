//! Annotation resolution integration tests
//!
//! End-to-end tests through `AnnotationReader`: source scanning, doc-comment
//! parsing, hierarchy merging and descriptor binding.

use std::sync::Arc;

use anyhow::anyhow;
use docnotes::{
    AnnotationReader, AttributeError, ClassInfo, Config, Constructible, Descriptor,
    DescriptorRegistry, EntityKind, ErrorKind, FieldInfo, MemoryIntrospector, MethodInfo,
    NotesError, Parameter, SourceRef, StaticConstants, TagOwner,
};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// =============================================================================
// Descriptor types
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
struct Positive {
    min: f64,
    message: Option<String>,
}

impl Descriptor for Positive {
    fn set_attribute(&mut self, name: &str, value: Value) -> Result<(), AttributeError> {
        match name {
            "message" => {
                let text = value.as_str().ok_or_else(|| anyhow!("message must be a string"))?;
                self.message = Some(text.to_string());
                Ok(())
            }
            other => Err(AttributeError::unknown(other)),
        }
    }
}

impl Constructible for Positive {
    fn construct(args: Vec<Value>) -> anyhow::Result<Self> {
        let min = args.first().and_then(Value::as_f64).unwrap_or_default();
        Ok(Positive { min, message: None })
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Table {
    name: String,
}

impl Descriptor for Table {
    fn set_attribute(&mut self, name: &str, _value: Value) -> Result<(), AttributeError> {
        Err(AttributeError::unknown(name))
    }
}

impl Constructible for Table {
    fn construct(args: Vec<Value>) -> anyhow::Result<Self> {
        let name = args
            .first()
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("table name required"))?;
        Ok(Table {
            name: name.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
struct Route {
    path: String,
    methods: Vec<String>,
    options: Value,
}

impl Descriptor for Route {
    fn set_attribute(&mut self, name: &str, value: Value) -> Result<(), AttributeError> {
        match name {
            "methods" => {
                self.methods = serde_json::from_value(value).map_err(anyhow::Error::from)?;
                Ok(())
            }
            "options" => {
                self.options = value;
                Ok(())
            }
            other => Err(AttributeError::unknown(other)),
        }
    }
}

impl Constructible for Route {
    fn construct(args: Vec<Value>) -> anyhow::Result<Self> {
        Ok(Route {
            path: args
                .first()
                .and_then(Value::as_str)
                .unwrap_or("/")
                .to_string(),
            ..Default::default()
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Limit {
    max: i64,
}

impl Descriptor for Limit {
    fn set_attribute(&mut self, name: &str, _value: Value) -> Result<(), AttributeError> {
        Err(AttributeError::unknown(name))
    }
}

impl Constructible for Limit {
    fn construct(args: Vec<Value>) -> anyhow::Result<Self> {
        Ok(Limit {
            max: args.first().and_then(Value::as_i64).unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Verb {
    name: String,
}

impl Descriptor for Verb {
    fn set_attribute(&mut self, name: &str, _value: Value) -> Result<(), AttributeError> {
        Err(AttributeError::unknown(name))
    }
}

impl Constructible for Verb {
    fn construct(args: Vec<Value>) -> anyhow::Result<Self> {
        let name = args
            .first()
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("verb name required"))?;
        Ok(Verb {
            name: name.to_string(),
        })
    }
}

fn registry() -> DescriptorRegistry {
    DescriptorRegistry::new()
        .with::<Positive>("App\\Validators\\Positive")
        .with::<Table>("App\\Mapping\\Table")
        .with::<Route>("App\\Http\\Route")
        .with::<Limit>("App\\Validators\\Limit")
        .with::<Verb>("App\\Http\\Method")
}

fn text(source: &str) -> SourceRef {
    SourceRef::Text(source.to_string())
}

const ORDER_SOURCE: &str = r#"<?php
namespace App;

use App\Validators\Positive as Positive;
use App\Mapping\Table;

class Order extends Model {}
"#;

fn order() -> ClassInfo {
    ClassInfo::new("App\\Order")
        .source(text(ORDER_SOURCE))
        .doc("/**\n * Customer order.\n * @Table(\"orders\")\n */")
        .field(
            FieldInfo::new("amount")
                .typed("float", false)
                .doc("/**\n * @var float\n * @Positive(0.01, message: \"too small\")\n */"),
        )
}

// =============================================================================
// Binding
// =============================================================================

mod binding_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_field_annotation_is_bound() {
        init_tracing();
        let reader = AnnotationReader::new(MemoryIntrospector::new().with(order()), registry());

        let resolved = reader.resolve("App\\Order").unwrap();
        let amount = resolved.field("amount").unwrap();
        let tag = amount
            .tags
            .iter()
            .find(|tag| tag.name == "Positive")
            .unwrap();

        assert_eq!(tag.arguments.positional, vec![json!(0.01)]);
        assert_eq!(tag.arguments.named.get("message"), Some(&json!("too small")));
        assert_eq!(tag.descriptor_type.as_deref(), Some("App\\Validators\\Positive"));

        let instance = resolved.annotation("App\\Validators\\Positive").unwrap();
        assert_eq!(
            instance.downcast_ref::<Positive>(),
            Some(&Positive {
                min: 0.01,
                message: Some("too small".to_string()),
            })
        );
    }

    #[test]
    fn test_doc_tags_are_left_alone() {
        let reader = AnnotationReader::new(MemoryIntrospector::new().with(order()), registry());
        let resolved = reader.resolve("App\\Order").unwrap();
        let var = &resolved.field("amount").unwrap().tags[0];
        assert!(var.doc_only);
        assert!(!var.is_resolved());
    }

    #[test]
    fn test_imported_descriptor_named_like_doc_tag() {
        let source = r#"<?php
namespace App\Http;

use App\Http\Method;

class Controller {}
"#;
        let info = ClassInfo::new("App\\Http\\Controller")
            .source(text(source))
            .method(MethodInfo::new("index").doc(concat!(
                "/**\n",
                " * @Method(\"GET\")\n",
                " * @return array\n",
                " */"
            )));
        let reader = AnnotationReader::new(MemoryIntrospector::new().with(info), registry());

        let resolved = reader.resolve("App\\Http\\Controller").unwrap();
        let verb = resolved.annotation_as::<Verb>("App\\Http\\Method").unwrap().unwrap();
        assert_eq!(verb.name, "GET");

        let index = resolved.method("index").unwrap();
        assert!(!index.tags[0].doc_only);
        assert!(index.tags[1].doc_only);
    }

    #[test]
    fn test_collections_and_constants_in_arguments() {
        let source = r#"<?php
namespace App\Http;

use App\Http\Route;
use App\Validators\Limit;
use App\Support\Status as S;

class Api {}
"#;
        let api = ClassInfo::new("App\\Http\\Api")
            .source(text(source))
            .method(
                MethodInfo::new("list")
                    .returns("array")
                    .parameter(Parameter::new("page", 0).typed("int", false).optional())
                    .doc(concat!(
                        "/**\n",
                        " * @Route(\"/items\", methods: [\"GET\", \"HEAD\"], options: {cache: true, ttl: 0x3C})\n",
                        " * @Limit(S::MAX)\n",
                        " */"
                    )),
            );

        let constants = StaticConstants::new().with_class_constant("App\\Support\\Status", "MAX", json!(50));
        let reader = AnnotationReader::new(MemoryIntrospector::new().with(api), registry())
            .with_constants(constants);

        let resolved = reader.resolve("App\\Http\\Api").unwrap();
        let route = resolved.annotation_as::<Route>("App\\Http\\Route").unwrap().unwrap();
        assert_eq!(
            route,
            &Route {
                path: "/items".to_string(),
                methods: vec!["GET".to_string(), "HEAD".to_string()],
                options: json!({"cache": true, "ttl": 60}),
            }
        );

        let limit = resolved.annotation("App\\Validators\\Limit").unwrap();
        assert_eq!(limit.downcast_ref::<Limit>().unwrap().max, 50);

        let list = resolved.method("list").unwrap();
        assert_eq!(list.return_type.as_deref(), Some("array"));
        assert!(list.parameter("page").unwrap().optional);
    }

    #[test]
    fn test_resolving_twice_is_structurally_equal() {
        let reader = AnnotationReader::new(MemoryIntrospector::new().with(order()), registry());

        let first = reader.resolve("App\\Order").unwrap();
        let second = reader.resolve("App\\Order").unwrap();

        let a = first.annotation("App\\Validators\\Positive").unwrap();
        let b = second.annotation("App\\Validators\\Positive").unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(a.downcast_ref::<Positive>(), b.downcast_ref::<Positive>());
        assert_eq!(
            serde_json::to_value(first.view()).unwrap(),
            serde_json::to_value(second.view()).unwrap()
        );
    }

    #[test]
    fn test_cached_entity_stays_unbound() {
        let reader = AnnotationReader::new(MemoryIntrospector::new().with(order()), registry());
        reader.resolve("App\\Order").unwrap();

        let entity = reader.entity("App\\Order").unwrap();
        assert!(entity.tags.iter().all(|tag| !tag.is_resolved()));
    }
}

// =============================================================================
// Failures
// =============================================================================

mod failure_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_unbalanced_parentheses() {
        let info = ClassInfo::new("App\\Order")
            .source(text(ORDER_SOURCE))
            .method(MethodInfo::new("save").doc("/** @Foo(bar( */"));
        let reader = AnnotationReader::new(MemoryIntrospector::new().with(info), registry());

        let err = reader.resolve("App\\Order").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert!(err.to_string().contains("App\\Order::save"));
    }

    #[test]
    fn test_deeply_nested_arguments() {
        let doc = format!("/** @Limit({}{}) */", "[".repeat(1000), "]".repeat(1000));
        let info = ClassInfo::new("App\\Order")
            .source(text(ORDER_SOURCE))
            .doc(doc);
        let reader = AnnotationReader::new(MemoryIntrospector::new().with(info), registry());

        let err = reader.resolve("App\\Order").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert!(err.to_string().contains("nested deeper"));
    }

    #[test]
    fn test_unresolved_annotation() {
        let info = ClassInfo::new("App\\Order")
            .source(text(ORDER_SOURCE))
            .doc("/** @Cacheable */");
        let reader = AnnotationReader::new(MemoryIntrospector::new().with(info), registry());

        let err = reader.resolve("App\\Order").unwrap_err();
        assert!(matches!(
            err,
            NotesError::UnresolvedAnnotation { ref entity, ref tag, .. }
                if entity == "App\\Order" && tag == "Cacheable"
        ));
        // Reading without binding does not need the alias
        assert!(reader.read("App\\Order").is_ok());
    }

    #[test]
    fn test_unknown_attribute() {
        let info = ClassInfo::new("App\\Order")
            .source(text(ORDER_SOURCE))
            .doc("/** @Table(\"orders\", engine: \"inno\") */");
        let reader = AnnotationReader::new(MemoryIntrospector::new().with(info), registry());

        let err = reader.resolve("App\\Order").unwrap_err();
        assert!(matches!(
            err,
            NotesError::UnknownAttribute { ref descriptor, ref attribute, .. }
                if descriptor == "App\\Mapping\\Table" && attribute == "engine"
        ));
    }

    #[test]
    fn test_constructor_failure_is_host_error() {
        let info = ClassInfo::new("App\\Order")
            .source(text(ORDER_SOURCE))
            .doc("/** @Table */");
        let reader = AnnotationReader::new(MemoryIntrospector::new().with(info), registry());
        assert_eq!(reader.resolve("App\\Order").unwrap_err().kind(), ErrorKind::Host);
    }

    #[test]
    fn test_cyclic_hierarchy() {
        let introspector = MemoryIntrospector::new()
            .with(ClassInfo::new("App\\A").extends("App\\C"))
            .with(ClassInfo::new("App\\B").extends("App\\A"))
            .with(ClassInfo::new("App\\C").extends("App\\B"));
        let reader = AnnotationReader::new(introspector, registry());

        let err = reader.resolve("App\\A").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cyclic hierarchy detected: App\\A -> App\\C -> App\\B -> App\\A"
        );
    }

    #[test]
    fn test_lookup_of_missing_descriptor() {
        let reader = AnnotationReader::new(MemoryIntrospector::new().with(order()), registry());
        let resolved = reader.resolve("App\\Order").unwrap();

        assert_eq!(
            resolved.annotation("App\\Http\\Route").unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert!(resolved.annotations("App\\Http\\Route", false).unwrap().is_empty());
        assert!(resolved.annotations("App\\Http\\Route", true).is_err());
    }
}

// =============================================================================
// Inheritance
// =============================================================================

mod inheritance_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MODEL_SOURCE: &str = r#"<?php
namespace App;

use App\Mapping\Table;

abstract class Model {}
"#;

    fn model() -> ClassInfo {
        ClassInfo::new("App\\Model")
            .source(text(MODEL_SOURCE))
            .doc("/** @Table(\"models\") */")
            .method(MethodInfo::new("save").doc("/** @Ignore */"))
            .method(MethodInfo::new("delete"))
    }

    #[test]
    fn test_ignored_method_is_absent_in_child() {
        let order = order().extends("App\\Model");
        let reader = AnnotationReader::new(
            MemoryIntrospector::new().with(model()).with(order),
            registry(),
        );

        let resolved = reader.resolve("App\\Order").unwrap();
        assert!(!resolved.has_method("save"));
        assert!(resolved.has_method("delete"));
        assert_eq!(resolved.method("delete").unwrap().declared_in, "App\\Model");
    }

    #[test]
    fn test_redeclared_method_returns() {
        let order = order()
            .extends("App\\Model")
            .method(MethodInfo::new("save").doc("/** @Table(\"audit\") */"));
        let reader = AnnotationReader::new(
            MemoryIntrospector::new().with(model()).with(order),
            registry(),
        );

        let resolved = reader.resolve("App\\Order").unwrap();
        assert_eq!(resolved.method("save").unwrap().declared_in, "App\\Order");
    }

    #[test]
    fn test_child_entity_tag_wins() {
        let order = order().extends("App\\Model");
        let reader = AnnotationReader::new(
            MemoryIntrospector::new().with(model()).with(order),
            registry(),
        );
        let resolved = reader.resolve("App\\Order").unwrap();

        let first = resolved.annotation("App\\Mapping\\Table").unwrap();
        assert_eq!(first.downcast_ref::<Table>().unwrap().name, "orders");

        let all = resolved.annotations("App\\Mapping\\Table", true).unwrap();
        let names: Vec<_> = all
            .iter()
            .map(|found| found.downcast_ref::<Table>().unwrap().name.as_str())
            .collect();
        assert_eq!(names, vec!["orders", "models"]);
        assert!(all.iter().all(|found| found.owner == TagOwner::Entity));
    }

    #[test]
    fn test_mixin_brings_its_own_imports() {
        let trait_source = r#"<?php
namespace App\Concerns;

use App\Http\{Route as Endpoint};

trait Exposes {}
"#;
        let exposes = ClassInfo::new("App\\Concerns\\Exposes")
            .kind(EntityKind::Trait)
            .source(text(trait_source))
            .method(MethodInfo::new("show").doc("/** @Endpoint(\"/show\") */"));
        let order = order().mixin("App\\Concerns\\Exposes");

        let reader = AnnotationReader::new(
            MemoryIntrospector::new().with(exposes).with(order),
            registry(),
        );
        let resolved = reader.resolve("App\\Order").unwrap();

        let all = resolved.annotations("App\\Http\\Route", true).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].owner, TagOwner::Method("show".to_string()));
        assert_eq!(all[0].downcast_ref::<Route>().unwrap().path, "/show");
    }

    #[test]
    fn test_interface_tags_are_merged() {
        let contract = ClassInfo::new("App\\Contracts\\Persistable")
            .kind(EntityKind::Interface)
            .source(text("<?php namespace App\\Contracts; use App\\Mapping\\Table; interface Persistable {}"))
            .doc("/** @Table(\"contract\") */");
        let order = order().implements("App\\Contracts\\Persistable");

        let reader = AnnotationReader::new(
            MemoryIntrospector::new().with(contract).with(order),
            registry(),
        );
        let resolved = reader.resolve("App\\Order").unwrap();
        let all = resolved.annotations("App\\Mapping\\Table", true).unwrap();
        let names: Vec<_> = all
            .iter()
            .map(|found| found.downcast_ref::<Table>().unwrap().name.clone())
            .collect();
        assert_eq!(names, vec!["orders".to_string(), "contract".to_string()]);
    }

    #[test]
    fn test_custom_exclusion_marker() {
        let model = ClassInfo::new("App\\Model")
            .source(text(MODEL_SOURCE))
            .method(MethodInfo::new("save").doc("/** @skip */"));
        let order = order().extends("App\\Model");

        let reader = AnnotationReader::new(
            MemoryIntrospector::new().with(model).with(order),
            registry(),
        )
        .with_config(Config::default().with_exclusion_marker("Skip"));

        assert!(!reader.resolve("App\\Order").unwrap().has_method("save"));
    }
}

// =============================================================================
// Source files
// =============================================================================

mod source_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_shared_file_is_read_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Models.php");
        std::fs::write(
            &path,
            r#"<?php
namespace App;

use App\Validators\{Positive, Limit as Max};
use App\Mapping\Table;

class Order {}
class Invoice {}
"#,
        )
        .unwrap();

        let introspector = MemoryIntrospector::new()
            .with(
                ClassInfo::new("App\\Order")
                    .source(SourceRef::File(path.clone()))
                    .field(FieldInfo::new("amount").doc("/** @Positive(1) */")),
            )
            .with(
                ClassInfo::new("App\\Invoice")
                    .source(SourceRef::File(path.clone()))
                    .doc("/** @Max(10) */"),
            );
        let reader = AnnotationReader::new(introspector, registry());

        reader.resolve("App\\Order").unwrap();
        let invoice = reader.resolve("App\\Invoice").unwrap();

        assert_eq!(reader.sources().len(), 1);
        assert_eq!(reader.cached_entities(), 2);
        let max = invoice.annotation("App\\Validators\\Limit").unwrap();
        assert_eq!(max.downcast_ref::<Limit>().unwrap().max, 10);
    }

    #[test]
    fn test_missing_file_is_host_error() {
        let info = ClassInfo::new("App\\Order").source(SourceRef::File("/no/such/Order.php".into()));
        let reader = AnnotationReader::new(MemoryIntrospector::new().with(info), registry());
        assert_eq!(reader.entity("App\\Order").unwrap_err().kind(), ErrorKind::Host);
    }

    #[test]
    fn test_config_file_drives_reader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".docnotes.json");
        std::fs::write(&path, r#"{ "cacheSources": false, "merge": { "methods": "shallow" } }"#).unwrap();
        let config = Config::load(&path).unwrap();

        let model = ClassInfo::new("App\\Model").method(MethodInfo::new("delete"));
        let order = order().extends("App\\Model");
        let reader = AnnotationReader::new(
            MemoryIntrospector::new().with(model).with(order),
            registry(),
        )
        .with_config(config);

        let resolved = reader.resolve("App\\Order").unwrap();
        assert!(!resolved.has_method("delete"));
        assert!(resolved.has_field("amount"));
        assert!(reader.sources().is_empty());
    }
}
