//! Watch loop wiring
//!
//! Feeds watch events from `kube::runtime::Controller` into a
//! [`GenericController`]. The runtime serializes cycles per object and applies
//! the error policy below to errors the engine propagates.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use k8s_openapi::NamespaceResourceScope;
use kube::{
    api::ListParams,
    runtime::{
        controller::{Action, Controller as Runtime},
        watcher::Config as WatcherConfig,
    },
    Api, Client, Resource,
};
use tracing::{debug, error, info};

use crate::config::EngineConfig;
use crate::controller::Controller;
use crate::engine::GenericController;
use crate::error::{Error, Result};
use crate::resource::NamespacedName;
use crate::store::KubeStore;

type Engine<C> = GenericController<C, KubeStore<<C as Controller>::Resource>>;

/// Run `controller` against every resource of its type until shutdown
pub async fn run<C>(client: Client, controller: C, config: EngineConfig)
where
    C: Controller + 'static,
    C::Resource: Resource<Scope = NamespaceResourceScope>,
{
    let kind = <C::Resource as Resource>::kind(&()).to_string();
    let api: Api<C::Resource> = Api::all(client.clone());

    // Verify CRD is installed
    if let Err(e) = api.list(&ListParams::default().limit(1)).await {
        error!(kind = %kind, error = %e, "CRD not installed");
        return;
    }

    info!(kind = %kind, controller = controller.name(), "Starting controller");

    let engine: Arc<Engine<C>> =
        Arc::new(GenericController::new(controller, KubeStore::new(client)).with_config(config));

    Runtime::new(api, WatcherConfig::default())
        .shutdown_on_signal()
        .run(reconcile::<C>, error_policy::<C>, engine)
        .for_each(|result| {
            let kind = kind.clone();
            async move {
                match result {
                    Ok((obj, action)) => {
                        debug!(
                            kind = %kind,
                            name = %obj.name,
                            namespace = obj.namespace.as_deref().unwrap_or("default"),
                            ?action,
                            "Reconcile cycle complete"
                        );
                    }
                    Err(e) => {
                        error!(kind = %kind, error = %e, "Reconciliation error");
                    }
                }
            }
        })
        .await;
}

async fn reconcile<C>(obj: Arc<C::Resource>, engine: Arc<Engine<C>>) -> Result<Action>
where
    C: Controller + 'static,
    C::Resource: Resource<Scope = NamespaceResourceScope>,
{
    let key = NamespacedName::from_object(obj.as_ref());
    engine.reconcile(&key).await
}

/// Requeue delay for errors the engine propagated
fn error_policy<C>(obj: Arc<C::Resource>, error: &Error, _engine: Arc<Engine<C>>) -> Action
where
    C: Controller + 'static,
{
    error!(
        name = %NamespacedName::from_object(obj.as_ref()),
        error = %error,
        "Reconciliation failed, scheduling retry"
    );
    Action::requeue(retry_delay(error))
}

fn retry_delay(error: &Error) -> Duration {
    match error {
        Error::Validation(_) | Error::Config(_) => Duration::from_secs(300),
        Error::MissingResult { .. } => Duration::from_secs(60),
        _ => Duration::from_secs(30),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_delay_by_error() {
        assert_eq!(
            retry_delay(&Error::validation("bad")),
            Duration::from_secs(300)
        );
        assert_eq!(
            retry_delay(&Error::Conflict("ns/db-1".to_string())),
            Duration::from_secs(30)
        );
    }
}
