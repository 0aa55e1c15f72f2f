//! Backend implementations for state storage

mod local;

pub use local::LocalBackend;

use kiln_core::config::BackendConfig;

use crate::backend::{BackendError, BackendResult, StateBackend};

/// Create a backend from configuration
///
/// With no backend configured, state lives in `kiln.state.json` in the
/// current directory.
pub fn create_backend(config: Option<&BackendConfig>) -> BackendResult<Box<dyn StateBackend>> {
    match config {
        None => Ok(Box::new(LocalBackend::new())),
        Some(config) => match config.backend_type.as_str() {
            "local" => Ok(Box::new(LocalBackend::from_config(config)?)),
            other => Err(BackendError::unsupported_backend(other)),
        },
    }
}
