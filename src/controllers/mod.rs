//! Kubernetes controllers for KIT CRDs
//!
//! Hooks controllers up to the watch-and-dispatch machinery of
//! `kube::runtime`, with the generic reconciliation engine in between.

mod runner;

pub use runner::run;

use kube::Client;

use crate::config::EngineConfig;
use crate::reconcilers::control_plane::ControlPlaneController;

/// Run the ControlPlane controller
pub async fn run_control_plane_controller(client: Client, config: EngineConfig) {
    run(client, ControlPlaneController, config).await
}
