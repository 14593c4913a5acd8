//! Error types

use fos_dom::NodeId;

use crate::ControllerError;

/// Failure reported by a [`Loader`](crate::Loader)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("resource not found")]
    NotFound,

    #[error("network error: {0}")]
    Network(String),

    #[error("evaluation failed: {0}")]
    Evaluation(String),

    #[error("no loader configured")]
    Unavailable,
}

/// Failure turning a controller name into a factory.
///
/// Cloned into every element waiting on the same resolution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("No load reference declared for controller \"{name}\"")]
    UnresolvedName { name: String },

    #[error("Load reference for controller \"{name}\" has no href")]
    MissingReference { name: String },

    #[error("Invalid href \"{href}\" for controller \"{name}\": {reason}")]
    InvalidReference {
        name: String,
        href: String,
        reason: String,
    },

    #[error("Unable to determine how to load controller \"{name}\" (kind \"{kind}\")")]
    UnsupportedLoadKind { name: String, kind: String },

    #[error("Failed to load controller \"{name}\" from {url}: {source}")]
    LoadFailed {
        name: String,
        url: String,
        #[source]
        source: LoadError,
    },

    #[error("No controller registered for \"{name}\" after loading {url}")]
    RegistrationMissing { name: String, url: String },
}

impl ResolveError {
    /// Controller name the failure is about
    pub fn name(&self) -> &str {
        match self {
            Self::UnresolvedName { name }
            | Self::MissingReference { name }
            | Self::InvalidReference { name, .. }
            | Self::UnsupportedLoadKind { name, .. }
            | Self::LoadFailed { name, .. }
            | Self::RegistrationMissing { name, .. } => name,
        }
    }
}

/// Failures inside the attach/detach lifecycle. These are logged, never
/// returned to the tree watcher.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("Error instantiating controller \"{name}\" for {element}: {source}")]
    Instantiation {
        name: String,
        element: NodeId,
        #[source]
        source: ControllerError,
    },

    #[error("Error attaching controller \"{name}\" to {element}: {source}")]
    Attach {
        name: String,
        element: NodeId,
        #[source]
        source: ControllerError,
    },

    #[error("Error detaching controller \"{name}\" from {element}: {source}")]
    Detach {
        name: String,
        element: NodeId,
        #[source]
        source: ControllerError,
    },
}

/// Engine set-up and registration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid controller name \"{0}\"")]
    InvalidName(String),

    #[error("Engine already started")]
    AlreadyStarted,

    #[error("Controller registered without a name (script {0})")]
    UnnamedRegistration(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_error_name() {
        let err = ResolveError::LoadFailed {
            name: "menu".into(),
            url: "https://example.com/menu.js".into(),
            source: LoadError::NotFound,
        };
        assert_eq!(err.name(), "menu");
        assert_eq!(
            err.to_string(),
            "Failed to load controller \"menu\" from https://example.com/menu.js: resource not found"
        );
    }
}
