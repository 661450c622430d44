//! @acp:module "Errors"
//! @acp:summary "Error types for annotation parsing, merging and binding"
//! @acp:domain annotations
//! @acp:layer types

use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, NotesError>;

/// @acp:summary "Flat classification of NotesError for matching"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Parse,
    UnresolvedAnnotation,
    UnknownAttribute,
    NotFound,
    CyclicHierarchy,
    Host,
    Io,
    Json,
}

/// @acp:summary "All failures surfaced by the annotation engine"
#[derive(Debug, Error)]
pub enum NotesError {
    /// Malformed argument text on a declaration
    #[error("An error occurred while parsing annotation from '{location}' : @{raw} -- {message}")]
    Parse {
        location: String,
        raw: String,
        message: String,
    },

    /// Tag name has no matching alias in the merged import table
    #[error("Annotation `{tag}` on '{location}' was not found within {entity} imports (or its parents / mixins)")]
    UnresolvedAnnotation {
        entity: String,
        location: String,
        tag: String,
    },

    /// Named argument targets an attribute the descriptor does not expose
    #[error("Descriptor `{descriptor}` has no settable attribute `{attribute}` (annotation on '{location}')")]
    UnknownAttribute {
        descriptor: String,
        attribute: String,
        location: String,
    },

    /// A single-result lookup found nothing
    #[error("Annotation `{descriptor}` could not be found within `{entity}`: {reason}")]
    NotFound {
        entity: String,
        descriptor: String,
        reason: String,
    },

    /// The hierarchy walk came back to a unit already on the current path
    #[error("Cyclic hierarchy detected: {}", path.join(" -> "))]
    CyclicHierarchy { path: Vec<String> },

    /// Failure reported by the host introspection or construction collaborators
    #[error("Host error while {context}: {source}")]
    Host {
        context: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl NotesError {
    /// Wrap a host failure with a description of what was being attempted
    pub fn host(context: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        NotesError::Host {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            NotesError::Parse { .. } => ErrorKind::Parse,
            NotesError::UnresolvedAnnotation { .. } => ErrorKind::UnresolvedAnnotation,
            NotesError::UnknownAttribute { .. } => ErrorKind::UnknownAttribute,
            NotesError::NotFound { .. } => ErrorKind::NotFound,
            NotesError::CyclicHierarchy { .. } => ErrorKind::CyclicHierarchy,
            NotesError::Host { .. } => ErrorKind::Host,
            NotesError::Io(_) => ErrorKind::Io,
            NotesError::Json(_) => ErrorKind::Json,
        }
    }
}
