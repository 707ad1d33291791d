//! Kubernetes Iteration Toolkit operator
//!
//! A generic reconciliation engine for declarative resources. Each resource
//! type plugs in a [`Controller`] with its own reconcile and finalize logic;
//! the [`GenericController`] wraps it with finalizer bookkeeping, the `Active`
//! status condition, merge-patch persistence and error classification.

pub mod classify;
pub mod config;
pub mod controller;
pub mod controllers;
pub mod crd;
pub mod engine;
pub mod error;
pub mod finalizer;
pub mod metrics;
pub mod observe;
pub mod reconcilers;
pub mod resource;
pub mod status;
pub mod store;

pub use controller::Controller;
pub use engine::GenericController;
pub use error::{Error, Result};
pub use resource::NamespacedName;
