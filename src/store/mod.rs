//! Resource store access
//!
//! The engine talks to the store only through [`ResourceStore`], so it can run
//! against the Kubernetes API server or an in-memory store in tests.

pub mod merge;

use std::fmt::Debug;
use std::marker::PhantomData;

use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use kube::{
    api::{Patch, PatchParams},
    Api, Client, Resource,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::resource::NamespacedName;

/// Field manager used for every patch issued by the operator
pub const FIELD_MANAGER: &str = "kit-operator";

/// Get and merge-patch operations on a typed resource
#[async_trait]
pub trait ResourceStore<K: Send + Sync + 'static>: Send + Sync {
    /// Fetch a resource, `None` if it does not exist
    async fn get(&self, key: &NamespacedName) -> Result<Option<K>>;

    /// Apply a merge patch to the resource
    ///
    /// Returns `Error::NotFound` if the resource is gone and `Error::Conflict`
    /// if the patch carries a stale `metadata.resourceVersion`.
    async fn patch(&self, key: &NamespacedName, patch: &Value) -> Result<K>;

    /// Apply a merge patch to the status subresource
    async fn patch_status(&self, key: &NamespacedName, patch: &Value) -> Result<()>;
}

/// Store backed by the Kubernetes API server
pub struct KubeStore<K> {
    client: Client,
    _resource: PhantomData<fn() -> K>,
}

impl<K> KubeStore<K> {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            _resource: PhantomData,
        }
    }
}

impl<K> Clone for KubeStore<K> {
    fn clone(&self) -> Self {
        Self::new(self.client.clone())
    }
}

impl<K> KubeStore<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
{
    fn api(&self, key: &NamespacedName) -> Api<K> {
        Api::namespaced(self.client.clone(), &key.namespace)
    }
}

/// Map API status codes onto the store's error taxonomy
fn classify_api_error(key: &NamespacedName, err: kube::Error) -> Error {
    match err {
        kube::Error::Api(resp) if resp.code == 404 => Error::NotFound(key.to_string()),
        kube::Error::Api(resp) if resp.code == 409 => Error::Conflict(key.to_string()),
        other => Error::Kube(other),
    }
}

#[async_trait]
impl<K> ResourceStore<K> for KubeStore<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + DeserializeOwned
        + Debug
        + Send
        + Sync
        + 'static,
{
    async fn get(&self, key: &NamespacedName) -> Result<Option<K>> {
        self.api(key)
            .get_opt(&key.name)
            .await
            .map_err(|e| classify_api_error(key, e))
    }

    async fn patch(&self, key: &NamespacedName, patch: &Value) -> Result<K> {
        self.api(key)
            .patch(&key.name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(patch))
            .await
            .map_err(|e| classify_api_error(key, e))
    }

    async fn patch_status(&self, key: &NamespacedName, patch: &Value) -> Result<()> {
        self.api(key)
            .patch_status(&key.name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(patch))
            .await
            .map_err(|e| classify_api_error(key, e))?;
        Ok(())
    }
}
