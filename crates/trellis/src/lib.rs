//! # Trellis
//!
//! An event-driven automation server. External events arrive at ingress
//! adapters, are normalized into envelopes, dispatched through a pluggable
//! transport, matched against subscriber hooks, and delivered to job
//! handlers. All behavior is supplied by independently loadable components
//! wired together by configuration.
//!
//! This facade links the core engine, the runtime, the socket transport, and
//! the HTTP adapters, so that every built-in kind is registered by linking
//! this one crate.
//!
//! ```rust,ignore
//! use trellis::TrellisRuntime;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     TrellisRuntime::init_logging();
//!     let runtime = TrellisRuntime::with_defaults().await?;
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```

pub use trellis_adapter_http as http;
pub use trellis_core as core;
pub use trellis_runtime as runtime;
pub use trellis_transport as transport;

pub use trellis_runtime::{RuntimeOptions, StartupError, TrellisRuntime};

/// Prelude for applications embedding Trellis.
pub mod prelude {
    pub use trellis_core::prelude::*;
    pub use trellis_runtime::prelude::*;
    pub use trellis_runtime::{RuntimeOptions, TrellisRuntime};
}
