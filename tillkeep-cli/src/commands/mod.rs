//! CLI command implementations.

pub mod fingerprint;
pub mod reconcile;
pub mod webhook;
