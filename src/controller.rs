//! Controller capability
//!
//! A [`Controller`] supplies the resource-type-specific reconcile and finalize
//! logic. The [`GenericController`](crate::engine::GenericController) wraps it
//! with finalizer bookkeeping, status conditions and persistence.

use std::fmt::Debug;

use async_trait::async_trait;
use kube::{runtime::controller::Action, Resource};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::Result;
use crate::status::StatusConditions;

/// Bounds every resource handled by the engine must satisfy
pub trait ManagedResource:
    Resource<DynamicType = ()>
    + StatusConditions
    + Clone
    + Serialize
    + DeserializeOwned
    + Debug
    + Send
    + Sync
    + 'static
{
}

impl<T> ManagedResource for T where
    T: Resource<DynamicType = ()>
        + StatusConditions
        + Clone
        + Serialize
        + DeserializeOwned
        + Debug
        + Send
        + Sync
        + 'static
{
}

/// Per-resource-type reconcile and finalize logic
#[async_trait]
pub trait Controller: Send + Sync {
    /// Resource type this controller handles
    type Resource: ManagedResource;

    /// Stable identifier, used to derive the finalizer token
    fn name(&self) -> &str;

    /// Drive the resource towards its desired state
    ///
    /// Returning `Ok(None)` violates the contract and is reported as an error.
    async fn reconcile(&self, resource: &mut Self::Resource) -> Result<Option<Action>>;

    /// Release everything the resource owns before it is deleted
    async fn finalize(&self, resource: &mut Self::Resource) -> Result<Option<Action>>;
}
