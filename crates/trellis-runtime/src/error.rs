//! Runtime error types.

use thiserror::Error;
use trellis_core::{ConfigError, DependencyCycle, InstanceInitError};

/// Errors that abort runtime startup.
///
/// All variants propagate out of `initialize()`; steady-state failures never
/// surface here — they are logged at the dispatcher or transport boundary.
#[derive(Debug, Error)]
pub enum StartupError {
    /// Configuration loading, validation, or binding failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The kind graph contains a cycle.
    #[error(transparent)]
    Cycle(#[from] DependencyCycle),

    /// A component instance failed to initialize or start.
    #[error(transparent)]
    Init(#[from] InstanceInitError),
}

/// Errors from the running server (signal handling and the like).
#[derive(Debug, Error)]
#[error("{0}")]
pub struct RuntimeError(pub String);

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
