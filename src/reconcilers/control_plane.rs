//! ControlPlane controller
//!
//! Validates ControlPlane specs and schedules periodic resyncs. Guest cluster
//! components are provisioned by separate providers, so finalizing has
//! nothing to release here.

use std::time::Duration;

use async_trait::async_trait;
use kube::{runtime::controller::Action, ResourceExt};
use tracing::info;

use crate::controller::Controller;
use crate::crd::ControlPlane;
use crate::error::{Error, Result};

/// Name used for the `kit.k8s.amazonaws.com/control-plane` finalizer
pub const CONTROLLER_NAME: &str = "control-plane";

/// Periodic resync interval for healthy control planes
const RESYNC_INTERVAL: Duration = Duration::from_secs(300);

/// Longest cluster name that still fits generated object names
const MAX_CLUSTER_NAME_LEN: usize = 40;

/// Validate the ControlPlane spec
pub fn validate(control_plane: &ControlPlane) -> Result<()> {
    let cluster_name = control_plane.cluster_name();
    if cluster_name.is_empty() {
        return Err(Error::validation("Cluster name must not be empty"));
    }
    if cluster_name.len() > MAX_CLUSTER_NAME_LEN {
        return Err(Error::validation(format!(
            "Cluster name '{}' is longer than {} characters",
            cluster_name, MAX_CLUSTER_NAME_LEN
        )));
    }
    if !cluster_name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(Error::validation(format!(
            "Cluster name '{}' must contain only lowercase letters, digits and '-'",
            cluster_name
        )));
    }

    validate_version(&control_plane.spec.kubernetes_version)?;

    if let Some(replicas) = control_plane.spec.master.api_server_replicas {
        if replicas < 1 {
            return Err(Error::validation(format!(
                "Invalid apiServerReplicas {}: must be at least 1",
                replicas
            )));
        }
    }

    Ok(())
}

/// Versions are `major.minor`, e.g. `1.21`
fn validate_version(version: &str) -> Result<()> {
    let valid = match version.split_once('.') {
        Some((major, minor)) => {
            !major.is_empty()
                && !minor.is_empty()
                && major.chars().all(|c| c.is_ascii_digit())
                && minor.chars().all(|c| c.is_ascii_digit())
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(Error::validation(format!(
            "Invalid kubernetesVersion '{}': expected major.minor",
            version
        )))
    }
}

/// Controller for ControlPlane resources
#[derive(Clone, Debug, Default)]
pub struct ControlPlaneController;

#[async_trait]
impl Controller for ControlPlaneController {
    type Resource = ControlPlane;

    fn name(&self) -> &str {
        CONTROLLER_NAME
    }

    async fn reconcile(&self, control_plane: &mut ControlPlane) -> Result<Option<Action>> {
        validate(control_plane)?;
        info!(
            name = %control_plane.name_any(),
            cluster = %control_plane.cluster_name(),
            version = %control_plane.spec.kubernetes_version,
            "Reconciled ControlPlane"
        );
        Ok(Some(Action::requeue(RESYNC_INTERVAL)))
    }

    async fn finalize(&self, control_plane: &mut ControlPlane) -> Result<Option<Action>> {
        info!(name = %control_plane.name_any(), "Finalizing ControlPlane");
        Ok(Some(Action::await_change()))
    }
}
