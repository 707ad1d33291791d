//! Finalizer bookkeeping
//!
//! The engine claims the deletion path of a resource by adding its own token
//! to `metadata.finalizers` and releases it once the controller's finalize
//! step succeeds. Tokens owned by other controllers are never touched.
//!
//! Patches carry the `resourceVersion` of the snapshot they were computed
//! from. A conflict means the list changed underneath us: the current list is
//! re-read and the change re-applied, up to a bounded number of attempts.

use std::marker::PhantomData;

use kube::{Resource, ResourceExt};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::resource::NamespacedName;
use crate::store::{merge, ResourceStore};

/// Domain prefix of every finalizer token owned by the operator
pub const FINALIZER_DOMAIN: &str = "kit.k8s.amazonaws.com";

/// Finalizer token for a controller: `kit.k8s.amazonaws.com/<name>`
pub fn finalizer_token(controller_name: &str) -> String {
    format!("{}/{}", FINALIZER_DOMAIN, controller_name)
}

/// Adds and removes one controller's token on resources of type `K`
pub struct Finalizers<'a, K, S: ?Sized> {
    store: &'a S,
    token: String,
    attempts: u32,
    _resource: PhantomData<fn() -> K>,
}

impl<'a, K, S> Finalizers<'a, K, S>
where
    K: Resource + Clone + Serialize + Send + Sync + 'static,
    S: ResourceStore<K> + ?Sized,
{
    pub fn new(store: &'a S, controller_name: &str, attempts: u32) -> Self {
        Self {
            store,
            token: finalizer_token(controller_name),
            attempts: attempts.max(1),
            _resource: PhantomData,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn is_present(&self, obj: &K) -> bool {
        obj.finalizers().iter().any(|f| *f == self.token)
    }

    /// Append the token if missing. Returns whether a patch was sent.
    pub async fn ensure_present(&self, key: &NamespacedName, obj: &mut K) -> Result<bool> {
        self.update(key, obj, |finalizers| {
            if finalizers.iter().any(|f| *f == self.token) {
                return None;
            }
            let mut updated = finalizers.to_vec();
            updated.push(self.token.clone());
            Some(updated)
        })
        .await
    }

    /// Drop the token, keeping every other token in order. Returns whether a
    /// patch was sent.
    pub async fn remove(&self, key: &NamespacedName, obj: &mut K) -> Result<bool> {
        self.update(key, obj, |finalizers| {
            let remaining: Vec<String> = finalizers
                .iter()
                .filter(|f| **f != self.token)
                .cloned()
                .collect();
            (remaining.len() < finalizers.len()).then_some(remaining)
        })
        .await
    }

    async fn update<F>(&self, key: &NamespacedName, obj: &mut K, mutate: F) -> Result<bool>
    where
        F: Fn(&[String]) -> Option<Vec<String>> + Send + Sync,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let Some(finalizers) = mutate(obj.finalizers()) else {
                return Ok(false);
            };

            let persisted = obj.clone();
            obj.meta_mut().finalizers = Some(finalizers);
            let patch = self.finalizers_patch(&persisted, obj)?;

            match self.store.patch(key, &patch).await {
                Ok(updated) => {
                    adopt_finalizers(obj, &updated);
                    debug!(name = %key, token = %self.token, "Patched finalizers");
                    return Ok(true);
                }
                Err(e) if e.is_conflict() && attempt < self.attempts => {
                    debug!(name = %key, attempt, "Conflict patching finalizers, re-reading");
                    let fresh = self
                        .store
                        .get(key)
                        .await
                        .map_err(|e| self.wrap(e))?
                        .ok_or_else(|| self.wrap(Error::NotFound(key.to_string())))?;
                    adopt_finalizers(obj, &fresh);
                }
                Err(e) => {
                    obj.meta_mut().finalizers = persisted.meta().finalizers.clone();
                    return Err(self.wrap(e));
                }
            }
        }
    }

    /// Merge patch of `metadata.finalizers` only, locked to the snapshot's
    /// resourceVersion
    fn finalizers_patch(&self, persisted: &K, current: &K) -> Result<Value> {
        let diff = merge::only_field(merge::merge_from(persisted, current)?, "metadata");
        let mut patch = diff.unwrap_or_else(|| serde_json::json!({ "metadata": {} }));
        if let (Some(version), Some(metadata)) = (
            persisted.meta().resource_version.as_ref(),
            patch.get_mut("metadata").and_then(Value::as_object_mut),
        ) {
            metadata.insert("resourceVersion".to_string(), Value::String(version.clone()));
        }
        Ok(patch)
    }

    fn wrap(&self, source: Error) -> Error {
        Error::Finalizer {
            token: self.token.clone(),
            source: Box::new(source),
        }
    }
}

/// Take the store's view of finalizers and resourceVersion, leaving any other
/// in-memory changes alone
fn adopt_finalizers<K: Resource>(obj: &mut K, source: &K) {
    let meta = obj.meta_mut();
    meta.finalizers = source.meta().finalizers.clone();
    meta.resource_version = source.meta().resource_version.clone();
}
