//! Cluster Controller domain (spec.md §4.4): admin actions, Pod helpers, and
//! the `kube::runtime::Controller` wiring that dispatches into them.

pub mod actions;
pub mod pod;
pub mod reconcile;
