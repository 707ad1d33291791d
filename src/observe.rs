//! Cycle observation hooks
//!
//! The engine reports what it does through a [`CycleObserver`] instead of
//! logging inline. [`TracingObserver`] emits structured `tracing` events and
//! updates the Prometheus metrics.

use std::time::Duration;

use kube::runtime::controller::Action;
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::metrics;
use crate::resource::NamespacedName;

/// Which part of the resource a merge patch touched
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PatchKind {
    Finalizers,
    Status,
}

impl PatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatchKind::Finalizers => "finalizers",
            PatchKind::Status => "status",
        }
    }
}

/// Structured event sink invoked at fixed points of a reconcile cycle
pub trait CycleObserver: Send + Sync {
    /// A cycle began for `key`
    fn cycle_started(&self, controller: &str, key: &NamespacedName);

    /// A delegate or finalizer error was classified
    fn error_classified(
        &self,
        controller: &str,
        key: &NamespacedName,
        error: &Error,
        ignorable: bool,
    );

    /// A merge patch was accepted by the store
    fn patch_applied(&self, controller: &str, key: &NamespacedName, kind: PatchKind);

    /// The engine's finalizer token was removed after a successful finalize
    fn released(&self, controller: &str, key: &NamespacedName);

    /// A cycle ended, successfully or not
    fn cycle_finished(
        &self,
        controller: &str,
        key: &NamespacedName,
        elapsed: Duration,
        outcome: Result<&Action, &Error>,
    );
}

/// Observer that logs and records metrics
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

impl CycleObserver for TracingObserver {
    fn cycle_started(&self, controller: &str, key: &NamespacedName) {
        debug!(controller, name = %key, "Starting reconcile cycle");
        metrics::RECONCILIATIONS.with_label_values(&[controller]).inc();
    }

    fn error_classified(
        &self,
        controller: &str,
        key: &NamespacedName,
        error: &Error,
        ignorable: bool,
    ) {
        let class = if ignorable { "ignorable" } else { "fatal" };
        if ignorable {
            debug!(controller, name = %key, error = %error, "Ignored error, will retry");
        } else {
            warn!(controller, name = %key, error = %error, "Reconcile failed");
        }
        metrics::RECONCILIATION_ERRORS
            .with_label_values(&[controller, class])
            .inc();
    }

    fn patch_applied(&self, controller: &str, key: &NamespacedName, kind: PatchKind) {
        debug!(controller, name = %key, kind = kind.as_str(), "Applied merge patch");
        metrics::PATCHES
            .with_label_values(&[controller, kind.as_str()])
            .inc();
    }

    fn released(&self, controller: &str, key: &NamespacedName) {
        info!(controller, name = %key, "Released resource for deletion");
        metrics::FINALIZED.with_label_values(&[controller]).inc();
    }

    fn cycle_finished(
        &self,
        controller: &str,
        key: &NamespacedName,
        elapsed: Duration,
        outcome: Result<&Action, &Error>,
    ) {
        metrics::RECONCILE_DURATION
            .with_label_values(&[controller])
            .observe(elapsed.as_secs_f64());
        match outcome {
            Ok(action) => info!(controller, name = %key, ?action, "Reconciled resource"),
            Err(e) => debug!(controller, name = %key, error = %e, "Reconcile cycle returned error"),
        }
    }
}
