//! Runtime orchestration.
//!
//! [`TrellisRuntime`] wires the startup pipeline together:
//!
//! 1. collect the kind registry (or accept one from the caller),
//! 2. resolve the topological construction order,
//! 3. load the configuration document,
//! 4. bind it into component specs,
//! 5. materialize instances and start their long-lived listeners.
//!
//! Startup errors propagate out of [`initialize`](TrellisRuntime::initialize);
//! after that the server runs until a shutdown signal arrives.
//!
//! ```rust,ignore
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     TrellisRuntime::init_logging();
//!     let runtime = TrellisRuntime::from_config_file("trellis.yaml").await?;
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;
use tracing::{Level, info};
use trellis_core::{KindRegistry, resolution_order};

use crate::config::{ConfigLoader, bind};
use crate::error::{RuntimeError, StartupError};
use crate::logging::{LoggingBuilder, SpanEvents};
use crate::manager::InstanceManager;

/// Tracks whether logging has been initialized, so embedding applications and
/// tests can call in freely.
static LOGGING_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Startup options for [`TrellisRuntime::initialize`].
#[derive(Default)]
pub struct RuntimeOptions {
    /// Load configuration from this file.
    pub config_path: Option<PathBuf>,
    /// Parse configuration from this YAML string.
    pub config_yaml: Option<String>,
    /// Use this document directly (wins over the other sources).
    pub document: Option<Value>,
    /// Use this registry instead of collecting the linked kinds.
    pub kinds: Option<KindRegistry>,
    /// When no explicit source is given, search the default config paths.
    pub search_default_paths: bool,
}

impl RuntimeOptions {
    fn load_document(&self) -> Result<Value, StartupError> {
        if let Some(document) = &self.document {
            return Ok(document.clone());
        }
        if let Some(yaml) = &self.config_yaml {
            return Ok(ConfigLoader::new().load_from_str(yaml)?);
        }
        if let Some(path) = &self.config_path {
            return Ok(ConfigLoader::new().load_from_file(path)?);
        }
        if self.search_default_paths {
            return Ok(ConfigLoader::default().load()?);
        }
        Ok(Value::Null)
    }
}

/// The running Trellis server: one instance manager plus its lifecycle.
pub struct TrellisRuntime {
    manager: Arc<InstanceManager>,
}

impl std::fmt::Debug for TrellisRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrellisRuntime").finish_non_exhaustive()
    }
}

impl TrellisRuntime {
    /// Initializes a runtime from explicit options.
    pub async fn initialize(options: RuntimeOptions) -> Result<Self, StartupError> {
        let document = options.load_document()?;
        let kinds = match options.kinds {
            Some(kinds) => {
                kinds.validate()?;
                kinds
            }
            None => KindRegistry::collect()?,
        };
        let order = resolution_order(&kinds)?;
        let specs = bind(&kinds, &order, &document)?;
        info!(
            kinds = kinds.len(),
            specs = specs.len(),
            "materializing component instances"
        );
        let manager = InstanceManager::new(kinds);
        manager.materialize(specs).await?;
        manager.start_all().await?;
        Ok(Self { manager })
    }

    /// Initializes from a configuration file.
    pub async fn from_config_file(path: impl Into<PathBuf>) -> Result<Self, StartupError> {
        Self::initialize(RuntimeOptions {
            config_path: Some(path.into()),
            ..Default::default()
        })
        .await
    }

    /// Initializes from a YAML string.
    pub async fn from_yaml(yaml: impl Into<String>) -> Result<Self, StartupError> {
        Self::initialize(RuntimeOptions {
            config_yaml: Some(yaml.into()),
            ..Default::default()
        })
        .await
    }

    /// Initializes with the default config search paths.
    pub async fn with_defaults() -> Result<Self, StartupError> {
        Self::initialize(RuntimeOptions {
            search_default_paths: true,
            ..Default::default()
        })
        .await
    }

    /// The instance manager.
    pub fn manager(&self) -> &Arc<InstanceManager> {
        &self.manager
    }

    /// Runs until a shutdown signal (ctrl-c) arrives, then shuts down.
    pub async fn run(&self) -> Result<(), RuntimeError> {
        info!("trellis running, press ctrl-c to stop");
        tokio::signal::ctrl_c()
            .await
            .map_err(|e| RuntimeError(format!("failed to listen for shutdown signal: {e}")))?;
        info!("shutdown signal received");
        self.shutdown().await;
        Ok(())
    }

    /// Shuts down every instance in reverse construction order.
    pub async fn shutdown(&self) {
        self.manager.shutdown().await;
    }

    /// Initializes logging with default settings (INFO level). Idempotent.
    pub fn init_logging() {
        if LOGGING_INITIALIZED
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            LoggingBuilder::new()
                .with_level(Level::INFO)
                .span_events(SpanEvents::NONE)
                .init();
        }
    }

    /// Initializes logging with a custom filter directive. Idempotent.
    pub fn init_logging_with(directive: &str) {
        if LOGGING_INITIALIZED
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            LoggingBuilder::new().directive(directive).init();
        }
    }
}
