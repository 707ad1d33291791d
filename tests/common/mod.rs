//! Shared test fixtures: an in-memory resource store, scripted controllers
//! and a recording observer.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use kube::runtime::controller::Action;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use kit_operator::controller::Controller;
use kit_operator::crd::{ControlPlane, ControlPlaneSpec, MasterSpec};
use kit_operator::error::{Error, Result};
use kit_operator::observe::{CycleObserver, PatchKind};
use kit_operator::store::ResourceStore;
use kit_operator::NamespacedName;

// ============================================================================
// Resources
// ============================================================================

pub fn key(namespace: &str, name: &str) -> NamespacedName {
    NamespacedName::new(namespace, name)
}

pub fn control_plane(namespace: &str, name: &str) -> ControlPlane {
    ControlPlane {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: ControlPlaneSpec {
            cluster_name: None,
            kubernetes_version: "1.21".to_string(),
            master: MasterSpec::default(),
        },
        status: None,
    }
}

pub fn with_finalizers(mut obj: ControlPlane, finalizers: &[&str]) -> ControlPlane {
    obj.metadata.finalizers = Some(finalizers.iter().map(|f| f.to_string()).collect());
    obj
}

pub fn terminating(mut obj: ControlPlane) -> ControlPlane {
    obj.metadata.deletion_timestamp = Some(Time(Utc::now()));
    obj
}

// ============================================================================
// In-memory store
// ============================================================================

/// Which endpoint a patch was sent to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endpoint {
    Main,
    Status,
}

#[derive(Clone, Debug)]
pub struct RecordedPatch {
    pub endpoint: Endpoint,
    pub key: NamespacedName,
    pub body: Value,
}

type Interference = Box<dyn FnOnce(&mut Value) + Send>;

/// Store holding objects as JSON, applying RFC 7386 merge patches with
/// `json_patch::merge`.
///
/// Main-resource patches carrying a stale `metadata.resourceVersion` fail with
/// `Error::Conflict`. A terminating object whose finalizer list becomes empty
/// is deleted, as the API server does.
pub struct InMemoryStore<K> {
    objects: Mutex<HashMap<NamespacedName, Value>>,
    patches: Mutex<Vec<RecordedPatch>>,
    get_failures: Mutex<VecDeque<Error>>,
    patch_failures: Mutex<VecDeque<Error>>,
    status_failures: Mutex<VecDeque<Error>>,
    interference: Mutex<VecDeque<Interference>>,
    _resource: PhantomData<fn() -> K>,
}

impl<K> Default for InMemoryStore<K> {
    fn default() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            patches: Mutex::new(Vec::new()),
            get_failures: Mutex::new(VecDeque::new()),
            patch_failures: Mutex::new(VecDeque::new()),
            status_failures: Mutex::new(VecDeque::new()),
            interference: Mutex::new(VecDeque::new()),
            _resource: PhantomData,
        }
    }
}

impl<K: Serialize + DeserializeOwned> InMemoryStore<K> {
    pub fn with(objects: Vec<(NamespacedName, K)>) -> Self {
        let store = Self::default();
        for (key, obj) in objects {
            store.insert(&key, &obj);
        }
        store
    }

    pub fn insert(&self, key: &NamespacedName, obj: &K) {
        let mut value = serde_json::to_value(obj).unwrap();
        value["metadata"]["resourceVersion"] = Value::String("1".to_string());
        self.objects.lock().unwrap().insert(key.clone(), value);
    }

    pub fn object(&self, key: &NamespacedName) -> Option<K> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|v| serde_json::from_value(v.clone()).unwrap())
    }

    pub fn patches(&self) -> Vec<RecordedPatch> {
        self.patches.lock().unwrap().clone()
    }

    pub fn patches_to(&self, endpoint: Endpoint) -> Vec<RecordedPatch> {
        self.patches()
            .into_iter()
            .filter(|p| p.endpoint == endpoint)
            .collect()
    }

    pub fn clear_patches(&self) {
        self.patches.lock().unwrap().clear();
    }

    /// Fail the next read with `error`
    pub fn fail_next_get(&self, error: Error) {
        self.get_failures.lock().unwrap().push_back(error);
    }

    /// Fail the next main-resource patch with `error`
    pub fn fail_next_patch(&self, error: Error) {
        self.patch_failures.lock().unwrap().push_back(error);
    }

    /// Fail the next status patch with `error`
    pub fn fail_next_status_patch(&self, error: Error) {
        self.status_failures.lock().unwrap().push_back(error);
    }

    /// Mutate the stored object right before the next main-resource patch is
    /// evaluated, as a concurrent writer would
    pub fn interfere_before_next_patch(&self, change: impl FnOnce(&mut Value) + Send + 'static) {
        self.interference.lock().unwrap().push_back(Box::new(change));
    }

    fn apply(
        &self,
        endpoint: Endpoint,
        key: &NamespacedName,
        patch: &Value,
    ) -> Result<Value> {
        let mut objects = self.objects.lock().unwrap();
        let current = objects
            .get_mut(key)
            .ok_or_else(|| Error::NotFound(key.to_string()))?;

        if endpoint == Endpoint::Main {
            if let Some(change) = self.interference.lock().unwrap().pop_front() {
                change(current);
                bump_version(current);
            }
            if let Some(expected) = patch["metadata"]["resourceVersion"].as_str() {
                if current["metadata"]["resourceVersion"].as_str() != Some(expected) {
                    return Err(Error::Conflict(key.to_string()));
                }
            }
        }

        let mut body = patch.clone();
        if let Some(fields) = body.as_object_mut() {
            match endpoint {
                Endpoint::Main => {
                    fields.remove("status");
                }
                Endpoint::Status => fields.retain(|k, _| k == "status"),
            }
            if let Some(metadata) = fields.get_mut("metadata").and_then(Value::as_object_mut) {
                metadata.remove("resourceVersion");
            }
        }

        json_patch::merge(current, &body);
        bump_version(current);
        let updated = current.clone();

        self.patches.lock().unwrap().push(RecordedPatch {
            endpoint,
            key: key.clone(),
            body: patch.clone(),
        });

        let released = !updated["metadata"]["deletionTimestamp"].is_null()
            && updated["metadata"]["finalizers"]
                .as_array()
                .map_or(true, |f| f.is_empty());
        if released {
            objects.remove(key);
        }
        Ok(updated)
    }
}

#[async_trait]
impl<K> ResourceStore<K> for InMemoryStore<K>
where
    K: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn get(&self, key: &NamespacedName) -> Result<Option<K>> {
        if let Some(error) = self.get_failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        Ok(self.object(key))
    }

    async fn patch(&self, key: &NamespacedName, patch: &Value) -> Result<K> {
        if let Some(error) = self.patch_failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        let updated = self.apply(Endpoint::Main, key, patch)?;
        Ok(serde_json::from_value(updated)?)
    }

    async fn patch_status(&self, key: &NamespacedName, patch: &Value) -> Result<()> {
        if let Some(error) = self.status_failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        self.apply(Endpoint::Status, key, patch)?;
        Ok(())
    }
}

fn bump_version(obj: &mut Value) {
    let next = obj["metadata"]["resourceVersion"]
        .as_str()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0)
        + 1;
    obj["metadata"]["resourceVersion"] = Value::String(next.to_string());
}

// ============================================================================
// Controllers
// ============================================================================

type Delegate = Box<dyn Fn() -> Result<Option<Action>> + Send + Sync>;

/// Controller whose reconcile and finalize outcomes are set by the test
pub struct ScriptedController {
    name: String,
    reconcile: Delegate,
    finalize: Delegate,
    pub reconcile_calls: AtomicUsize,
    pub finalize_calls: AtomicUsize,
}

pub const RESYNC: Duration = Duration::from_secs(600);

impl ScriptedController {
    /// Reconcile requeues after [`RESYNC`], finalize awaits changes
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            reconcile: Box::new(|| Ok(Some(Action::requeue(RESYNC)))),
            finalize: Box::new(|| Ok(Some(Action::await_change()))),
            reconcile_calls: AtomicUsize::new(0),
            finalize_calls: AtomicUsize::new(0),
        }
    }

    pub fn reconcile_with(
        mut self,
        f: impl Fn() -> Result<Option<Action>> + Send + Sync + 'static,
    ) -> Self {
        self.reconcile = Box::new(f);
        self
    }

    pub fn finalize_with(
        mut self,
        f: impl Fn() -> Result<Option<Action>> + Send + Sync + 'static,
    ) -> Self {
        self.finalize = Box::new(f);
        self
    }

    pub fn reconcile_count(&self) -> usize {
        self.reconcile_calls.load(Ordering::SeqCst)
    }

    pub fn finalize_count(&self) -> usize {
        self.finalize_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Controller for ScriptedController {
    type Resource = ControlPlane;

    fn name(&self) -> &str {
        &self.name
    }

    async fn reconcile(&self, _resource: &mut ControlPlane) -> Result<Option<Action>> {
        self.reconcile_calls.fetch_add(1, Ordering::SeqCst);
        (self.reconcile)()
    }

    async fn finalize(&self, _resource: &mut ControlPlane) -> Result<Option<Action>> {
        self.finalize_calls.fetch_add(1, Ordering::SeqCst);
        (self.finalize)()
    }
}

// ============================================================================
// Observer
// ============================================================================

/// Observer keeping a log of every hook call
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl CycleObserver for RecordingObserver {
    fn cycle_started(&self, _controller: &str, key: &NamespacedName) {
        self.record(format!("started {}", key));
    }

    fn error_classified(
        &self,
        _controller: &str,
        key: &NamespacedName,
        _error: &Error,
        ignorable: bool,
    ) {
        let class = if ignorable { "ignorable" } else { "fatal" };
        self.record(format!("error {} {}", class, key));
    }

    fn patch_applied(&self, _controller: &str, key: &NamespacedName, kind: PatchKind) {
        self.record(format!("patch {} {}", kind.as_str(), key));
    }

    fn released(&self, _controller: &str, key: &NamespacedName) {
        self.record(format!("released {}", key));
    }

    fn cycle_finished(
        &self,
        _controller: &str,
        key: &NamespacedName,
        _elapsed: Duration,
        outcome: std::result::Result<&Action, &Error>,
    ) {
        let result = if outcome.is_ok() { "ok" } else { "err" };
        self.record(format!("finished {} {}", key, result));
    }
}
