//! Error types for the KIT operator

use thiserror::Error;

/// Result type alias using the operator's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Operator error types
#[derive(Error, Debug)]
pub enum Error {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Resource no longer exists in the store
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Optimistic lock conflict on a patch
    #[error("Conflict updating {0}")]
    Conflict(String),

    /// Expected to resolve on a later cycle (e.g. waiting for sub-resources)
    #[error("{0}")]
    Transient(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Adding or removing the engine's finalizer token failed
    #[error("Patching finalizer {token}: {source}")]
    Finalizer {
        token: String,
        #[source]
        source: Box<Error>,
    },

    /// Persisting the status sub-object failed
    #[error("Failed to persist status of {key}: {source}")]
    Persist {
        key: String,
        #[source]
        source: Box<Error>,
    },

    /// Controller returned neither a result nor an error
    #[error("Controller {controller} returned no result for {key}")]
    MissingResult { controller: String, key: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML rendering error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// Create a transient error, safe to retry later without alarming
    pub fn transient(msg: impl Into<String>) -> Self {
        Error::Transient(msg.into())
    }

    /// Whether the resource disappeared from the store
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound(_) => true,
            Error::Kube(kube::Error::Api(resp)) => resp.code == 404,
            Error::Finalizer { source, .. } | Error::Persist { source, .. } => {
                source.is_not_found()
            }
            _ => false,
        }
    }

    /// Whether the error is an optimistic lock conflict
    pub fn is_conflict(&self) -> bool {
        match self {
            Error::Conflict(_) => true,
            Error::Kube(kube::Error::Api(resp)) => resp.code == 409,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_seen_through_wrappers() {
        let err = Error::Finalizer {
            token: "kit.k8s.amazonaws.com/ctrl".to_string(),
            source: Box::new(Error::NotFound("ns/db-1".to_string())),
        };
        assert!(err.is_not_found());
        assert!(!err.is_conflict());
    }

    #[test]
    fn test_transient_message_is_verbatim() {
        let err = Error::transient("waiting for etcd");
        assert_eq!(err.to_string(), "waiting for etcd");
    }
}
