//! Custom Resource Definitions for the KIT operator

mod control_plane;

pub use control_plane::*;

use kube::CustomResourceExt;

use crate::error::Result;

/// Generate all CRD YAML manifests
pub fn generate_crds() -> Result<Vec<String>> {
    Ok(vec![serde_yaml::to_string(&ControlPlane::crd())?])
}
