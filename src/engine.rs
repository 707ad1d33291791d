//! Generic reconciliation engine
//!
//! [`GenericController`] runs one reconcile cycle per dispatch event:
//!
//! 1. Fetch the resource (not found means already cleaned up)
//! 2. Snapshot it as the merge patch base
//! 3. Active: ensure the finalizer token, then `Controller::reconcile`.
//!    Terminating: `Controller::finalize`, then remove the finalizer token.
//! 4. Record the outcome in the `Active` condition
//! 5. Persist status with a single merge patch against the snapshot
//!
//! The delivery layer guarantees at most one cycle per resource at a time, so
//! the engine keeps no locks and no state between cycles.

use std::sync::Arc;
use std::time::Instant;

use kube::runtime::controller::Action;
use tracing::{instrument, warn};

use crate::classify::{ErrorClassifier, SafeToIgnore};
use crate::config::EngineConfig;
use crate::controller::Controller;
use crate::error::{Error, Result};
use crate::finalizer::Finalizers;
use crate::observe::{CycleObserver, PatchKind, TracingObserver};
use crate::resource::{is_terminating, NamespacedName};
use crate::status::{self, ACTIVE};
use crate::store::{merge, ResourceStore};

/// Condition reasons recorded on `Active` when a cycle fails
pub mod reason {
    pub const RECONCILE_FAILED: &str = "ReconcileFailed";
    pub const FINALIZE_FAILED: &str = "FinalizeFailed";
    pub const FINALIZER_PATCH_FAILED: &str = "FinalizerPatchFailed";
    pub const MISSING_RESULT: &str = "MissingResult";
}

/// Why the delegate stage of a cycle failed
#[derive(Debug)]
enum Failure {
    /// Controller reconcile/finalize returned an error, subject to classification
    Delegate { reason: &'static str, error: Error },
    /// Adding or removing the finalizer token failed, never ignorable
    Finalizer(Error),
    /// Controller returned neither a result nor an error, never ignorable
    MissingResult(Error),
}

impl Failure {
    fn reason(&self) -> &'static str {
        match self {
            Failure::Delegate { reason, .. } => *reason,
            Failure::Finalizer(_) => reason::FINALIZER_PATCH_FAILED,
            Failure::MissingResult(_) => reason::MISSING_RESULT,
        }
    }

    fn error(&self) -> &Error {
        match self {
            Failure::Delegate { error, .. }
            | Failure::Finalizer(error)
            | Failure::MissingResult(error) => error,
        }
    }

    fn into_error(self) -> Error {
        match self {
            Failure::Delegate { error, .. }
            | Failure::Finalizer(error)
            | Failure::MissingResult(error) => error,
        }
    }
}

/// Wraps a [`Controller`] with finalizer, status and persistence semantics
pub struct GenericController<C, S> {
    controller: C,
    store: S,
    classifier: Arc<dyn ErrorClassifier>,
    observer: Arc<dyn CycleObserver>,
    config: EngineConfig,
}

impl<C, S> GenericController<C, S>
where
    C: Controller,
    S: ResourceStore<C::Resource>,
{
    /// Engine with the default classifier, observer and configuration
    pub fn new(controller: C, store: S) -> Self {
        Self {
            controller,
            store,
            classifier: Arc::new(SafeToIgnore),
            observer: Arc::new(TracingObserver),
            config: EngineConfig::default(),
        }
    }

    /// Replace the classifier deciding which delegate errors are requeued
    pub fn with_classifier(mut self, classifier: impl ErrorClassifier + 'static) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    /// Replace the observer notified at each step of a cycle
    pub fn with_observer(mut self, observer: Arc<dyn CycleObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Override requeue delay and finalizer patch attempts
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// The wrapped controller
    pub fn controller(&self) -> &C {
        &self.controller
    }

    /// The store the engine reads and patches
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Token this engine owns on every resource it manages
    pub fn finalizer_token(&self) -> String {
        crate::finalizer::finalizer_token(self.controller.name())
    }

    /// Run one reconcile cycle for the resource identified by `key`
    #[instrument(skip(self, key), fields(controller = self.controller.name(), name = %key))]
    pub async fn reconcile(&self, key: &NamespacedName) -> Result<Action> {
        let name = self.controller.name();
        let started = Instant::now();
        self.observer.cycle_started(name, key);

        let outcome = self.run_cycle(key).await;

        self.observer
            .cycle_finished(name, key, started.elapsed(), outcome.as_ref());
        outcome
    }

    async fn run_cycle(&self, key: &NamespacedName) -> Result<Action> {
        // 1. Read the resource
        let Some(mut resource) = self.store.get(key).await? else {
            return Ok(Action::await_change());
        };

        // 2. Copy for the merge patch base
        let persisted = resource.clone();

        // 3. Reconcile, or finalize if the resource is being deleted
        match self.reconcile_or_finalize(key, &mut resource).await {
            Ok(result) => {
                status::mark_true(&mut resource, ACTIVE);
                if !self.persist_status(key, &persisted, &resource).await? {
                    return Ok(Action::await_change());
                }
                Ok(result)
            }
            // The resource itself went away under a finalizer patch
            Err(Failure::Finalizer(e)) if e.is_not_found() => Ok(Action::await_change()),
            Err(failure) => self.handle_failure(key, &persisted, resource, failure).await,
        }
    }

    async fn reconcile_or_finalize(
        &self,
        key: &NamespacedName,
        resource: &mut C::Resource,
    ) -> std::result::Result<Action, Failure> {
        let name = self.controller.name();
        let finalizers = Finalizers::new(&self.store, name, self.config.finalizer_patch_attempts);

        if !is_terminating(&*resource) {
            if finalizers
                .ensure_present(key, resource)
                .await
                .map_err(Failure::Finalizer)?
            {
                self.observer.patch_applied(name, key, PatchKind::Finalizers);
            }
            let result = self
                .controller
                .reconcile(resource)
                .await
                .map_err(|error| Failure::Delegate {
                    reason: reason::RECONCILE_FAILED,
                    error,
                })?;
            return self.require_result(key, result);
        }

        let result = self
            .controller
            .finalize(resource)
            .await
            .map_err(|error| Failure::Delegate {
                reason: reason::FINALIZE_FAILED,
                error,
            })?;
        let result = self.require_result(key, result)?;

        if finalizers
            .remove(key, resource)
            .await
            .map_err(Failure::Finalizer)?
        {
            self.observer.patch_applied(name, key, PatchKind::Finalizers);
            self.observer.released(name, key);
        }
        Ok(result)
    }

    fn require_result(
        &self,
        key: &NamespacedName,
        result: Option<Action>,
    ) -> std::result::Result<Action, Failure> {
        result.ok_or_else(|| {
            Failure::MissingResult(Error::MissingResult {
                controller: self.controller.name().to_string(),
                key: key.to_string(),
            })
        })
    }

    /// Record the failure in status, persist it and decide what to return
    async fn handle_failure(
        &self,
        key: &NamespacedName,
        persisted: &C::Resource,
        mut resource: C::Resource,
        failure: Failure,
    ) -> Result<Action> {
        let name = self.controller.name();
        let message = failure.error().to_string();
        status::mark_false(&mut resource, ACTIVE, failure.reason(), &message);

        let ignorable = matches!(
            &failure,
            Failure::Delegate { error, .. } if self.classifier.is_ignorable(error)
        );
        self.observer
            .error_classified(name, key, failure.error(), ignorable);

        let recorded = self.persist_status(key, persisted, &resource).await;

        if ignorable {
            return match recorded {
                Ok(true) => Ok(Action::requeue(self.config.ignored_error_requeue)),
                Ok(false) => Ok(Action::await_change()),
                Err(e) => Err(e),
            };
        }

        if let Err(e) = recorded {
            warn!(name = %key, error = %e, "Failed to record failure in status");
        }
        Err(failure.into_error())
    }

    /// Send the status diff against the snapshot, if any.
    ///
    /// Returns `Ok(false)` if the resource disappeared in the meantime.
    async fn persist_status(
        &self,
        key: &NamespacedName,
        persisted: &C::Resource,
        resource: &C::Resource,
    ) -> Result<bool> {
        let Some(patch) = merge::only_field(merge::merge_from(persisted, resource)?, "status")
        else {
            return Ok(true);
        };

        match self.store.patch_status(key, &patch).await {
            Ok(()) => {
                self.observer
                    .patch_applied(self.controller.name(), key, PatchKind::Status);
                Ok(true)
            }
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(Error::Persist {
                key: key.to_string(),
                source: Box::new(e),
            }),
        }
    }
}
