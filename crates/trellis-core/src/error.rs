//! Unified error types for the Trellis core.
//!
//! Startup errors (`ConfigError`, `DependencyCycle`, `InstanceInitError`)
//! propagate out of initialization and abort the process. Steady-state errors
//! (`OperationError`, `DispatchError`, `EncodingError`) are logged at the
//! dispatcher or transport boundary and never cross envelope boundaries.

use std::path::PathBuf;

use thiserror::Error;

/// Boxed error used at callback and factory boundaries.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors raised while loading, validating, or binding configuration.
///
/// All of these are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File not found at the specified path.
    #[error("configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// Failed to read the configuration file.
    #[error("failed to read configuration file: {0}")]
    Read(#[from] std::io::Error),

    /// YAML/configuration parsing error.
    #[error("configuration parse error: {0}")]
    Parse(String),

    /// A second `plugin_base` kind was registered for a component namespace.
    #[error(
        "duplicate plugin base for component namespace '{namespace}': '{first}' and '{second}'"
    )]
    DuplicatePluginBase {
        /// The contested component namespace.
        namespace: String,
        /// The kind registered first.
        first: String,
        /// The kind that collided with it.
        second: String,
    },

    /// A second `plugin` kind was registered for a `(namespace, plugin_type)` pair.
    #[error("duplicate plugin kind for '{namespace}/{plugin_type}': '{first}' and '{second}'")]
    DuplicatePlugin {
        /// The component namespace of the colliding kinds.
        namespace: String,
        /// The contested plugin type.
        plugin_type: String,
        /// The kind registered first.
        first: String,
        /// The kind that collided with it.
        second: String,
    },

    /// Two distinct kinds were registered under the same kind id.
    #[error("duplicate kind id '{0}'")]
    DuplicateKindId(String),

    /// A kind referenced a parent kind that is not registered.
    #[error("kind '{kind}' names unknown parent '{parent}'")]
    UnknownParent {
        /// The kind with the dangling reference.
        kind: String,
        /// The missing parent name.
        parent: String,
    },

    /// A plugin kind is structurally invalid (missing plugin_type, namespace
    /// mismatch with its plugin base, missing factory).
    #[error("kind '{kind}' is malformed: {reason}")]
    MalformedKind {
        /// The offending kind.
        kind: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A configured plugin type did not resolve to exactly one plugin kind.
    #[error("unknown plugin type '{plugin_type}' under component namespace '{namespace}'")]
    UnknownPluginType {
        /// The component namespace being bound.
        namespace: String,
        /// The plugin type that failed to resolve.
        plugin_type: String,
    },

    /// Schema validation failed for a configuration node.
    #[error("invalid configuration at '{path}': {reason}")]
    Schema {
        /// Dotted path of the offending node, e.g. `jobs.basic[0]`.
        path: String,
        /// Why the node was rejected.
        reason: String,
    },
}

// =============================================================================
// Dependency Resolution
// =============================================================================

/// A cycle was found in the resolved kind graph.
#[derive(Debug, Error)]
#[error("dependency cycle among kinds: {}", .kinds.join(", "))]
pub struct DependencyCycle {
    /// Names of the kinds participating in (or blocked behind) the cycle.
    pub kinds: Vec<String>,
}

// =============================================================================
// Instance Lifecycle
// =============================================================================

/// A component instance failed to construct, initialize, or start.
#[derive(Debug, Error)]
#[error("component '{kind}' (instance {name:?}) failed to initialize: {source}")]
pub struct InstanceInitError {
    /// The kind id of the failing instance.
    pub kind: String,
    /// The configured instance name, if any.
    pub name: Option<String>,
    /// The underlying failure.
    #[source]
    pub source: BoxError,
}

// =============================================================================
// Transport Operations
// =============================================================================

/// Recoverable transport failures. Callers log and continue; a consumer that
/// sees these repeatedly backs off linearly.
#[derive(Debug, Error)]
pub enum OperationError {
    /// A required configuration key is absent.
    #[error("socket is not configured: missing '{0}'")]
    NotConfigured(&'static str),

    /// No peer is connected on the other end of the socket.
    #[error("socket is not connected")]
    NotConnected,

    /// Binding the local endpoint failed.
    #[error("bind failed on {addr}: {source}")]
    Bind {
        /// The address that could not be bound.
        addr: String,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// Connecting to the remote endpoint failed.
    #[error("connect failed to {addr}: {source}")]
    Connect {
        /// The address that could not be reached.
        addr: String,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// The endpoint address could not be parsed.
    #[error("invalid endpoint url '{0}'")]
    InvalidUrl(String),

    /// Sending a message failed.
    #[error("send failed: {0}")]
    Send(String),

    /// Receiving a message failed.
    #[error("receive failed: {0}")]
    Recv(String),

    /// The transport has been closed.
    #[error("transport closed")]
    Closed,

    /// The envelope could not be encoded for the wire.
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    /// Other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Dispatch
// =============================================================================

/// A hook callback raised an error. Logged with hook and instance context;
/// sibling callbacks are unaffected.
#[derive(Debug, Error)]
#[error("hook callback for sender kind '{kind}' failed: {source}")]
pub struct DispatchError {
    /// The sender kind the failing hook was registered against.
    pub kind: &'static str,
    /// The underlying failure.
    #[source]
    pub source: BoxError,
}

// =============================================================================
// Envelope Encoding
// =============================================================================

/// An envelope could not be serialized, or a received multipart message was
/// structurally invalid. The message is dropped and logged.
#[derive(Debug, Error)]
pub enum EncodingError {
    /// A received multipart message had fewer than two frames.
    #[error("message had {0} frame(s), need at least 2")]
    TooFewFrames(usize),

    /// A required identity field was empty.
    #[error("identity field '{0}' must be non-empty")]
    EmptyIdentity(&'static str),

    /// A top-level `meta` value was not a mapping.
    #[error("meta section '{0}' must be a mapping")]
    MetaNotMapping(String),

    /// A frame did not contain valid JSON.
    #[error("frame {index} is not valid JSON: {source}")]
    Frame {
        /// Zero-based frame index.
        index: usize,
        /// The JSON parse failure.
        source: serde_json::Error,
    },

    /// Serialization failed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
