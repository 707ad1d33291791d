//! Error classification
//!
//! Ignorable errors are expected to resolve on their own. The engine records
//! them in status and requeues instead of reporting a failure.

use crate::error::Error;

/// Partitions errors into ignorable and fatal
pub trait ErrorClassifier: Send + Sync {
    fn is_ignorable(&self, error: &Error) -> bool;
}

impl<F> ErrorClassifier for F
where
    F: Fn(&Error) -> bool + Send + Sync,
{
    fn is_ignorable(&self, error: &Error) -> bool {
        self(error)
    }
}

/// Default classifier: transient errors and optimistic lock conflicts
#[derive(Clone, Copy, Debug, Default)]
pub struct SafeToIgnore;

impl ErrorClassifier for SafeToIgnore {
    fn is_ignorable(&self, error: &Error) -> bool {
        matches!(error, Error::Transient(_)) || error.is_conflict()
    }
}
