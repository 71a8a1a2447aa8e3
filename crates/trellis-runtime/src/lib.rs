//! # Trellis Runtime
//!
//! Orchestration layer for the Trellis automation server:
//!
//! - configuration loading and binding ([`config`]),
//! - the instance manager owning every live component ([`manager`]),
//! - the trigger dispatcher ([`dispatcher`]),
//! - startup/shutdown orchestration ([`runtime`]),
//! - logging setup ([`logging`]),
//! - the built-in `jobs/basic` plugin ([`jobs`]).
//!
//! All component operations run as cooperative tasks on one logical event
//! loop; pair this crate with a current-thread tokio runtime at the binary
//! edge. The synchronous startup phases — registry collection, dependency
//! resolution, configuration binding — run to completion before the first
//! instance initializes.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod jobs;
pub mod logging;
pub mod manager;
pub mod runtime;

pub use config::{ConfigLoader, bind};
pub use error::{RuntimeError, RuntimeResult, StartupError};
pub use jobs::{ActionSpec, BasicJob, BasicJobConfig};
pub use logging::{LoggingBuilder, SpanEvents};
pub use manager::InstanceManager;
pub use runtime::{RuntimeOptions, TrellisRuntime};

// Re-export tracing for embedding applications.
pub use tracing;
pub use tracing_subscriber;

/// Prelude with the common logging macros.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
