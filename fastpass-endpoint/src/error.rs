use thiserror::Error;

use crate::config::ConfigError;
use crate::horizon::HorizonError;

/// Umbrella error type for the endpoint-side queueing discipline, unifying
/// the per-module errors a caller driving a full endpoint client may need
/// to match on without importing each submodule's type directly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("horizon error: {0}")]
    Horizon(#[from] HorizonError),
}
