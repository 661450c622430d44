//! @acp:module "Annotation Binder"
//! @acp:summary "Resolves merged tags to descriptor types and instantiates them"
//! @acp:domain annotations
//! @acp:layer service

use std::sync::Arc;

use super::{AttributeError, DescriptorRegistry, ResolvedObject};
use crate::error::{NotesError, Result};
use crate::imports::ImportTable;
use crate::merge::MergedView;
use crate::model::{Member, Tag};
use crate::parse::location;

/// @acp:summary "Binds every annotation of a merged view to a live descriptor"
#[derive(Debug, Clone, Copy)]
pub struct Binder<'a> {
    registry: &'a DescriptorRegistry,
    marker: &'a str,
}

impl<'a> Binder<'a> {
    pub fn new(registry: &'a DescriptorRegistry, marker: &'a str) -> Self {
        Self { registry, marker }
    }

    /// @acp:summary "Bind entity, field and method tags, failing on the first error"
    pub fn bind(&self, mut view: MergedView) -> Result<ResolvedObject> {
        let entity = view.name.clone();

        let here = location(&entity, None);
        for tag in view.tags.iter_mut() {
            self.bind_tag(&entity, &view.imports, &here, tag)?;
        }
        self.bind_members(&entity, &view.imports, &mut view.fields)?;
        self.bind_members(&entity, &view.imports, &mut view.methods)?;

        tracing::debug!(
            "Bound {} ({} entity tags, {} fields, {} methods)",
            entity,
            view.tags.len(),
            view.fields.len(),
            view.methods.len()
        );
        Ok(ResolvedObject::new(view))
    }

    fn bind_members<M: Member>(
        &self,
        entity: &str,
        imports: &ImportTable,
        members: &mut [M],
    ) -> Result<()> {
        for member in members.iter_mut() {
            let here = location(member.declared_in(), Some(member.name()));
            for tag in member.tags_mut().iter_mut() {
                self.bind_tag(entity, imports, &here, tag)?;
            }
        }
        Ok(())
    }

    fn bind_tag(
        &self,
        entity: &str,
        imports: &ImportTable,
        location: &str,
        tag: &mut Tag,
    ) -> Result<()> {
        if tag.doc_only || tag.is(self.marker) {
            return Ok(());
        }

        let descriptor = imports
            .resolve(&tag.name)
            .ok_or_else(|| NotesError::UnresolvedAnnotation {
                entity: entity.to_string(),
                location: location.to_string(),
                tag: tag.name.clone(),
            })?
            .to_string();

        let mut instance = self
            .registry
            .construct(&descriptor, tag.arguments.positional.clone())
            .map_err(|err| {
                NotesError::host(format!("constructing `{}` for '{}'", descriptor, location), err)
            })?;

        for (name, value) in &tag.arguments.named {
            instance
                .set_attribute(name, value.clone())
                .map_err(|err| match err {
                    AttributeError::Unknown(attribute) => NotesError::UnknownAttribute {
                        descriptor: descriptor.clone(),
                        attribute,
                        location: location.to_string(),
                    },
                    AttributeError::Rejected(source) => NotesError::host(
                        format!("setting `{}` on `{}` for '{}'", name, descriptor, location),
                        source,
                    ),
                })?;
        }

        tracing::trace!("Bound @{} on '{}' to {}", tag.name, location, descriptor);
        tag.descriptor_type = Some(descriptor);
        tag.instance = Some(Arc::from(instance));
        Ok(())
    }
}
