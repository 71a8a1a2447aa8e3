//! Component instances and their lifecycle.
//!
//! A [`Component`] is the behavior of a live plugin instance. The runtime owns
//! each instance through a [`ComponentCell`], which pairs the behavior with
//! its kind, effective configuration, lifecycle state, and background-task
//! bookkeeping.
//!
//! During initialization a component receives a [`ComponentContext`] — its
//! window onto the owning host: peer lookup, hook registration, triggering,
//! and task spawning. The context is cheap to clone, so long-lived listeners
//! capture one.
//!
//! # Lifecycle
//!
//! ```text
//! Unborn → Constructed → Initializing → Ready → Closing → Closed
//! ```
//!
//! `on_init` runs during `Initializing` and must not block: long-running
//! listeners are dispatched as background tasks. `on_start` runs once every
//! instance has reached `Ready`; hooks registered during `on_init` are
//! therefore visible to every envelope dispatched afterwards.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::error::{BoxError, EncodingError};
use crate::hook::HookCallback;
use crate::kind::{KindDescriptor, KindPredicate};
use crate::message::{Envelope, Identity, MetaMap};
use crate::registry::KindRegistry;
use crate::transport::Transport;

// =============================================================================
// Lifecycle state
// =============================================================================

/// Lifecycle state of a component instance.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentState {
    /// Spec exists, nothing constructed yet.
    Unborn = 0,
    /// The factory has produced the component.
    Constructed = 1,
    /// `on_init` is running.
    Initializing = 2,
    /// Initialized and visible to `find` and hook matching.
    Ready = 3,
    /// Shutdown in progress.
    Closing = 4,
    /// Fully shut down, or failed during initialization.
    Closed = 5,
}

impl ComponentState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Unborn,
            1 => Self::Constructed,
            2 => Self::Initializing,
            3 => Self::Ready,
            4 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

// =============================================================================
// Component trait
// =============================================================================

/// Behavior of a component instance.
///
/// Implementations are created by their kind's factory and driven by the
/// instance manager. All methods are async seams; synchronous construction
/// happens in the factory.
impl std::fmt::Debug for dyn Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("dyn Component").finish_non_exhaustive()
    }
}

#[async_trait]
pub trait Component: Send + Sync + 'static {
    /// Called once, in dependency order, after construction.
    ///
    /// May register hooks, look up already-initialized peers via
    /// [`ComponentContext::find`], and spawn background tasks. Must not block.
    async fn on_init(&self, ctx: &ComponentContext) -> Result<(), BoxError> {
        let _ = ctx;
        Ok(())
    }

    /// Called once after *every* instance has reached `Ready`.
    ///
    /// Long-lived listeners (servers, consume loops) start here so that no
    /// envelope is dispatched before all hooks are registered.
    async fn on_start(&self, ctx: &ComponentContext) -> Result<(), BoxError> {
        let _ = ctx;
        Ok(())
    }

    /// Called once at shutdown, in reverse construction order.
    async fn on_close(&self) {}

    /// The transport this component exposes, if it is a transport peer.
    fn transport(&self) -> Option<&dyn Transport> {
        None
    }

    /// Downcasting support.
    fn as_any(&self) -> &dyn Any;
}

// =============================================================================
// ComponentCell
// =============================================================================

/// A live component instance owned by the instance manager.
///
/// Holds the kind, the effective configuration (kind defaults layered beneath
/// user values), the lifecycle state, and the instance's background tasks.
/// Created once, never cloned; shared through [`ComponentHandle`].
pub struct ComponentCell {
    kind: &'static KindDescriptor,
    name: Option<String>,
    config: Value,
    state: AtomicU8,
    component: Arc<dyn Component>,
    cancel: CancellationToken,
    tasks: TaskTracker,
}

/// Shared handle to a [`ComponentCell`].
pub type ComponentHandle = Arc<ComponentCell>;

impl ComponentCell {
    /// Assembles a cell around a freshly constructed component.
    pub fn new(
        kind: &'static KindDescriptor,
        name: Option<String>,
        config: Value,
        component: Arc<dyn Component>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            kind,
            name,
            config,
            state: AtomicU8::new(ComponentState::Constructed as u8),
            component,
            cancel,
            tasks: TaskTracker::new(),
        }
    }

    /// The kind this instance belongs to.
    pub fn kind(&self) -> &'static KindDescriptor {
        self.kind
    }

    /// The configured instance name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The effective configuration data.
    pub fn config(&self) -> &Value {
        &self.config
    }

    /// The component behavior.
    pub fn component(&self) -> &Arc<dyn Component> {
        &self.component
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ComponentState {
        ComponentState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Transitions the lifecycle state. Called by the instance manager only.
    pub fn set_state(&self, state: ComponentState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    /// The envelope identity of this instance.
    pub fn identity(&self) -> Identity {
        Identity::new(
            self.name.clone(),
            self.kind.namespace,
            self.kind.plugin_type.unwrap_or_default(),
        )
    }

    /// The transport exposed by this instance, if any.
    pub fn transport(&self) -> Option<&dyn Transport> {
        self.component.transport()
    }

    /// Name of the transport peer to publish through (`mq` config key).
    pub fn publish_peer(&self) -> Option<&str> {
        self.config.get("mq").and_then(Value::as_str)
    }

    /// Cancellation token for this instance's background tasks.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Spawns a background task owned by this instance.
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.spawn(future);
    }

    /// Cancels background tasks and waits for them to exit.
    pub async fn drain(&self) {
        self.cancel.cancel();
        self.tasks.close();
        self.tasks.wait().await;
    }
}

impl fmt::Debug for ComponentCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentCell")
            .field("kind", &self.kind.name)
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}

// =============================================================================
// ComponentHost
// =============================================================================

/// The host that owns instances and hooks — implemented by the instance
/// manager in the runtime crate.
///
/// Components only ever see this trait (through [`ComponentContext`]), which
/// keeps plugin crates independent of the runtime.
#[async_trait]
pub trait ComponentHost: Send + Sync {
    /// The kind registry this host was built from.
    fn kinds(&self) -> &KindRegistry;

    /// Returns all `Ready` instances whose kind matches the predicate, in
    /// construction order. Never returns an instance that has not completed
    /// `on_init`.
    fn find(&self, predicate: &KindPredicate) -> Vec<ComponentHandle>;

    /// Registers a hook: one record per kind matching `predicate`, owned by
    /// `owner`.
    fn register_hook(
        &self,
        owner: &ComponentHandle,
        predicate: &KindPredicate,
        match_data: Value,
        hook_type: Option<String>,
        callback: HookCallback,
    );

    /// Dispatches an envelope: publish through the sender's configured
    /// transport peer (best effort), then fire matching hooks.
    async fn trigger(&self, sender: &ComponentHandle, envelope: Envelope);
}

// =============================================================================
// ComponentContext
// =============================================================================

/// A component's window onto its host.
///
/// Cheap to clone; background tasks and route handlers capture one.
#[derive(Clone)]
pub struct ComponentContext {
    cell: ComponentHandle,
    host: Arc<dyn ComponentHost>,
}

impl ComponentContext {
    /// Creates a context for one instance.
    pub fn new(cell: ComponentHandle, host: Arc<dyn ComponentHost>) -> Self {
        Self { cell, host }
    }

    /// Handle to the owning instance.
    pub fn handle(&self) -> &ComponentHandle {
        &self.cell
    }

    /// The instance's kind.
    pub fn kind(&self) -> &'static KindDescriptor {
        self.cell.kind()
    }

    /// The instance's effective configuration.
    pub fn config(&self) -> &Value {
        self.cell.config()
    }

    /// The owning host.
    pub fn host(&self) -> &Arc<dyn ComponentHost> {
        &self.host
    }

    /// Looks up already-initialized peers by predicate.
    pub fn find(&self, predicate: &KindPredicate) -> Vec<ComponentHandle> {
        self.host.find(predicate)
    }

    /// Registers a hook owned by this instance.
    pub fn register_hook(
        &self,
        predicate: &KindPredicate,
        match_data: Value,
        hook_type: Option<String>,
        callback: HookCallback,
    ) {
        self.host
            .register_hook(&self.cell, predicate, match_data, hook_type, callback);
    }

    /// Announces an event: builds an envelope from this instance's identity
    /// and dispatches it.
    pub async fn trigger(&self, meta: MetaMap, data: Vec<Value>) -> Result<(), EncodingError> {
        let envelope = Envelope::new(self.cell.identity(), meta, data)?;
        self.host.trigger(&self.cell, envelope).await;
        Ok(())
    }

    /// Dispatches an already-built envelope with this instance as the sender.
    ///
    /// Used by consumer loops, which re-dispatch received envelopes without
    /// rewriting the original identity.
    pub async fn trigger_envelope(&self, envelope: Envelope) {
        self.host.trigger(&self.cell, envelope).await;
    }

    /// Spawns a background task owned by this instance.
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cell.spawn(future);
    }

    /// Cancellation token for this instance's background tasks.
    pub fn cancellation(&self) -> CancellationToken {
        self.cell.cancellation()
    }
}

impl fmt::Debug for ComponentContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentContext")
            .field("cell", &self.cell)
            .finish()
    }
}

// =============================================================================
// Test support
// =============================================================================

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// A component that does nothing.
    pub struct NullComponent;

    #[async_trait]
    impl Component for NullComponent {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    /// Factory producing a [`NullComponent`].
    pub fn make_null(
        _kind: &'static KindDescriptor,
        _config: &Value,
    ) -> Result<Arc<dyn Component>, BoxError> {
        Ok(Arc::new(NullComponent))
    }

    /// Builds a `Ready` cell for a kind, for registry/hook tests.
    pub fn ready_cell(kind: &'static KindDescriptor, name: Option<&str>) -> ComponentHandle {
        let cell = ComponentCell::new(
            kind,
            name.map(str::to_string),
            Value::Object(serde_json::Map::new()),
            Arc::new(NullComponent),
            CancellationToken::new(),
        );
        cell.set_state(ComponentState::Ready);
        Arc::new(cell)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::ready_cell;
    use super::*;

    static GAUGE: KindDescriptor =
        KindDescriptor::plugin("Gauge", "t.gauge", "Widget", "widgets", "gauge");

    #[test]
    fn identity_reflects_kind_and_name() {
        let cell = ready_cell(&GAUGE, Some("main"));
        let identity = cell.identity();
        assert_eq!(identity.name.as_deref(), Some("main"));
        assert_eq!(identity.plugin_namespace, "t.gauge");
        assert_eq!(identity.plugin_type, "gauge");
    }

    #[test]
    fn publish_peer_reads_mq_key() {
        let cell = ComponentCell::new(
            &GAUGE,
            None,
            serde_json::json!({"mq": "bus"}),
            Arc::new(test_support::NullComponent),
            CancellationToken::new(),
        );
        assert_eq!(cell.publish_peer(), Some("bus"));
    }

    #[test]
    fn state_transitions_are_observable() {
        let cell = ready_cell(&GAUGE, None);
        assert_eq!(cell.state(), ComponentState::Ready);
        cell.set_state(ComponentState::Closing);
        assert_eq!(cell.state(), ComponentState::Closing);
    }
}
