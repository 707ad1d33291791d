//! Controllers for KIT resources
//!
//! Each controller supplies the resource-specific half of a reconcile cycle.
//! Finalizers, conditions and persistence are handled by the engine.

pub mod control_plane;
