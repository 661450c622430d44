//! @acp:module "Resolved Object"
//! @acp:summary "Merged view with bound descriptors and its annotation lookups"
//! @acp:domain annotations
//! @acp:layer model

use std::ops::Deref;
use std::sync::Arc;

use super::Descriptor;
use crate::error::{NotesError, Result};
use crate::imports::normalize_name;
use crate::merge::MergedView;
use crate::model::{Member, Tag};

/// Declaration a matched tag is attached to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TagOwner {
    Entity,
    Field(String),
    Method(String),
}

/// @acp:summary "One tag resolved to the requested descriptor type"
#[derive(Debug, Clone)]
pub struct AnnotationMatch<'a> {
    pub owner: TagOwner,
    pub tag: &'a Tag,
    pub instance: Arc<dyn Descriptor>,
}

impl AnnotationMatch<'_> {
    pub fn downcast_ref<T: Descriptor>(&self) -> Option<&T> {
        self.instance.downcast_ref::<T>()
    }
}

/// @acp:summary "Merged view whose annotations are bound to live descriptors"
#[derive(Debug, Clone)]
pub struct ResolvedObject {
    view: MergedView,
}

impl ResolvedObject {
    pub(crate) fn new(view: MergedView) -> Self {
        Self { view }
    }

    pub fn view(&self) -> &MergedView {
        &self.view
    }

    pub fn into_view(self) -> MergedView {
        self.view
    }

    /// @acp:summary "First instance of a descriptor type: entity tags, then fields, then methods"
    pub fn annotation(&self, descriptor: &str) -> Result<Arc<dyn Descriptor>> {
        let descriptor = normalize_name(descriptor);
        if let Some(found) = self.matches(descriptor).next() {
            return Ok(found.instance);
        }

        let reason = if self.view.imports.contains(descriptor) {
            "no annotation on the entity or its members resolves to it"
        } else {
            "it is not imported by the entity or its parents / mixins"
        };
        Err(self.not_found(descriptor, reason))
    }

    /// @acp:summary "Every instance of a descriptor type, in lookup order"
    ///
    /// When the type is not among the merged imports, fails if `fail_on_missing`
    /// and otherwise returns nothing.
    pub fn annotations(
        &self,
        descriptor: &str,
        fail_on_missing: bool,
    ) -> Result<Vec<AnnotationMatch<'_>>> {
        let descriptor = normalize_name(descriptor);
        if !self.view.imports.contains(descriptor) {
            if fail_on_missing {
                return Err(self.not_found(
                    descriptor,
                    "it is not imported by the entity or its parents / mixins",
                ));
            }
            return Ok(Vec::new());
        }
        Ok(self.matches(descriptor).collect())
    }

    /// Typed form of [`annotation`](Self::annotation)
    pub fn annotation_as<T: Descriptor>(&self, descriptor: &str) -> Result<Option<&T>> {
        let descriptor = normalize_name(descriptor);
        let found = self
            .tagged()
            .filter(|(_, tag)| tag.resolves_to(descriptor))
            .find_map(|(_, tag)| tag.instance.as_deref());
        match found {
            Some(instance) => Ok(instance.downcast_ref::<T>()),
            None => Err(self.not_found(descriptor, "no annotation resolves to it")),
        }
    }

    fn not_found(&self, descriptor: &str, reason: &str) -> NotesError {
        NotesError::NotFound {
            entity: self.view.name.clone(),
            descriptor: descriptor.to_string(),
            reason: reason.to_string(),
        }
    }

    fn tagged(&self) -> impl Iterator<Item = (TagOwner, &Tag)> + '_ {
        let entity = self.view.tags.iter().map(|tag| (TagOwner::Entity, tag));
        let fields = self.view.fields.iter().flat_map(|field| {
            field
                .tags()
                .iter()
                .map(move |tag| (TagOwner::Field(field.name.clone()), tag))
        });
        let methods = self.view.methods.iter().flat_map(|method| {
            method
                .tags()
                .iter()
                .map(move |tag| (TagOwner::Method(method.name.clone()), tag))
        });
        entity.chain(fields).chain(methods)
    }

    fn matches(&self, descriptor: &str) -> impl Iterator<Item = AnnotationMatch<'_>> + '_ {
        let descriptor = descriptor.to_string();
        self.tagged().filter_map(move |(owner, tag)| {
            if !tag.resolves_to(&descriptor) {
                return None;
            }
            let instance = tag.instance.clone()?;
            Some(AnnotationMatch {
                owner,
                tag,
                instance,
            })
        })
    }
}

impl Deref for ResolvedObject {
    type Target = MergedView;

    fn deref(&self) -> &MergedView {
        &self.view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::model::{Field, Method};
    use crate::resolve::testing::{Marker, Positive};
    use serde_json::json;

    fn bound(descriptor: &str, instance: Arc<dyn Descriptor>) -> Tag {
        Tag {
            name: descriptor.rsplit('\\').next().unwrap_or(descriptor).to_string(),
            descriptor_type: Some(descriptor.to_string()),
            instance: Some(instance),
            ..Default::default()
        }
    }

    fn marker(values: &[i64]) -> Arc<dyn Descriptor> {
        Arc::new(Marker {
            values: values.iter().map(|v| json!(v)).collect(),
        })
    }

    fn object() -> ResolvedObject {
        ResolvedObject::new(MergedView {
            name: "App\\B".to_string(),
            imports: [("App\\Marker", "Marker"), ("App\\Positive", "Positive")]
                .into_iter()
                .collect(),
            tags: vec![
                bound("App\\Marker", marker(&[2])),
                bound("App\\Marker", marker(&[1])),
            ],
            fields: vec![Field {
                name: "amount".to_string(),
                declared_in: "App\\B".to_string(),
                tags: vec![bound("App\\Marker", marker(&[3]))],
                ..Default::default()
            }],
            methods: vec![Method {
                name: "save".to_string(),
                declared_in: "App\\A".to_string(),
                tags: vec![bound("App\\Marker", marker(&[4]))],
                ..Default::default()
            }],
            ..Default::default()
        })
    }

    fn first_value(instance: &dyn Descriptor) -> i64 {
        instance.downcast_ref::<Marker>().unwrap().values[0]
            .as_i64()
            .unwrap()
    }

    #[test]
    fn test_annotation_returns_most_derived() {
        let object = object();
        let instance = object.annotation("\\App\\Marker").unwrap();
        assert_eq!(first_value(instance.as_ref()), 2);
    }

    #[test]
    fn test_annotations_in_lookup_order() {
        let object = object();
        let all = object.annotations("App\\Marker", true).unwrap();
        let owners: Vec<_> = all.iter().map(|m| m.owner.clone()).collect();
        assert_eq!(
            owners,
            vec![
                TagOwner::Entity,
                TagOwner::Entity,
                TagOwner::Field("amount".to_string()),
                TagOwner::Method("save".to_string()),
            ]
        );
        let values: Vec<_> = all.iter().map(|m| first_value(m.instance.as_ref())).collect();
        assert_eq!(values, vec![2, 1, 3, 4]);
    }

    #[test]
    fn test_matches_outlive_the_queried_name() {
        let object = object();
        let found = {
            let name = format!("\\{}", "App\\Marker");
            object.annotations(&name, true).unwrap()
        };
        assert_eq!(found.len(), 4);
        assert!(found.iter().all(|m| m.tag.resolves_to("App\\Marker")));
    }

    #[test]
    fn test_imported_but_unused() {
        let object = object();
        let err = object.annotation("App\\Positive").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("resolves to it"));
        assert!(object.annotations("App\\Positive", true).unwrap().is_empty());
    }

    #[test]
    fn test_not_imported() {
        let object = object();
        let err = object.annotation("App\\Route").unwrap_err();
        assert!(err.to_string().contains("not imported"));

        assert!(object.annotations("App\\Route", false).unwrap().is_empty());
        assert_eq!(
            object.annotations("App\\Route", true).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn test_typed_lookup() {
        let object = object();
        let found = object.annotation_as::<Marker>("App\\Marker").unwrap();
        assert_eq!(found.map(|m| m.values.len()), Some(1));
        assert!(object.annotation_as::<Positive>("App\\Marker").unwrap().is_none());
    }
}
