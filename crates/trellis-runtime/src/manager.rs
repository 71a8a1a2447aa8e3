//! Instance manager: owns every live component.
//!
//! Materializes ordered [`ComponentSpec`]s into [`ComponentCell`]s, drives
//! the lifecycle (`Constructed → Initializing → Ready → Closing → Closed`),
//! and answers peer lookups. The instance list is append-only after startup
//! and mutated only from the startup path, so readers never contend.
//!
//! Because specs arrive in topological order, any dependency an instance
//! declared is `Ready` — and therefore visible to
//! [`find`](InstanceManager::find) — by the time its `on_init` runs.

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use trellis_core::{
    ComponentCell, ComponentContext, ComponentHandle, ComponentHost, ComponentSpec,
    ComponentState, ConfigError, HookRegistry, InstanceInitError, KindDescriptor, KindPredicate,
    KindRegistry,
};

use crate::error::StartupError;

/// Central owner of all component instances and their hooks.
pub struct InstanceManager {
    kinds: KindRegistry,
    hooks: HookRegistry,
    instances: RwLock<Vec<ComponentHandle>>,
    cancel: CancellationToken,
}

impl InstanceManager {
    /// Creates an empty manager over a validated kind registry.
    pub fn new(kinds: KindRegistry) -> Arc<Self> {
        Arc::new(Self {
            kinds,
            hooks: HookRegistry::new(),
            instances: RwLock::new(Vec::new()),
            cancel: CancellationToken::new(),
        })
    }

    /// The kind registry this manager was built from.
    pub fn kinds(&self) -> &KindRegistry {
        &self.kinds
    }

    /// The hook registry.
    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    /// Snapshot of all instances, in construction order.
    pub fn instances(&self) -> Vec<ComponentHandle> {
        self.instances.read().clone()
    }

    /// All `Ready` instances whose kind matches the predicate, in
    /// construction order.
    pub fn find(&self, predicate: &KindPredicate) -> Vec<ComponentHandle> {
        self.instances
            .read()
            .iter()
            .filter(|cell| {
                cell.state() == ComponentState::Ready && predicate.matches(cell.kind())
            })
            .cloned()
            .collect()
    }

    /// Looks up a `Ready` transport instance by name.
    pub fn transport_peer(&self, name: &str) -> Option<ComponentHandle> {
        self.instances
            .read()
            .iter()
            .find(|cell| {
                cell.state() == ComponentState::Ready
                    && cell.name() == Some(name)
                    && cell.component().transport().is_some()
            })
            .cloned()
    }

    /// Constructs and initializes one instance per spec, in order.
    ///
    /// A failing factory or `on_init` marks the instance `Closed` and aborts
    /// startup with an error naming it.
    pub async fn materialize(
        self: &Arc<Self>,
        specs: Vec<ComponentSpec>,
    ) -> Result<(), StartupError> {
        for spec in specs {
            let kind = spec.kind;
            let config = layered_config(kind, &spec.config_data)?;
            let name = config
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_string);
            let create = kind.create.ok_or_else(|| ConfigError::MalformedKind {
                kind: kind.name.to_string(),
                reason: "plugin kinds need an instance factory".to_string(),
            })?;

            let component = create(kind, &config).map_err(|source| InstanceInitError {
                kind: kind.name.to_string(),
                name: name.clone(),
                source,
            })?;
            let cell: ComponentHandle = Arc::new(ComponentCell::new(
                kind,
                name,
                config,
                component,
                self.cancel.child_token(),
            ));
            self.instances.write().push(Arc::clone(&cell));

            cell.set_state(ComponentState::Initializing);
            debug!(kind = kind.name, name = ?cell.name(), "initializing component");
            let ctx = ComponentContext::new(Arc::clone(&cell), self.as_host());
            if let Err(source) = cell.component().on_init(&ctx).await {
                cell.set_state(ComponentState::Closed);
                error!(kind = kind.name, name = ?cell.name(), error = %source, "on_init failed");
                return Err(InstanceInitError {
                    kind: kind.name.to_string(),
                    name: cell.name().map(str::to_string),
                    source,
                }
                .into());
            }
            cell.set_state(ComponentState::Ready);
            info!(kind = kind.name, name = ?cell.name(), "component ready");
        }
        Ok(())
    }

    /// Calls `on_start` on every `Ready` instance, in construction order.
    ///
    /// Long-lived listeners (servers, consume loops) come up here, after all
    /// hooks have been registered.
    pub async fn start_all(self: &Arc<Self>) -> Result<(), StartupError> {
        for cell in self.instances() {
            if cell.state() != ComponentState::Ready {
                continue;
            }
            let ctx = ComponentContext::new(Arc::clone(&cell), self.as_host());
            if let Err(source) = cell.component().on_start(&ctx).await {
                cell.set_state(ComponentState::Closed);
                error!(kind = cell.kind().name, name = ?cell.name(), error = %source, "on_start failed");
                return Err(InstanceInitError {
                    kind: cell.kind().name.to_string(),
                    name: cell.name().map(str::to_string),
                    source,
                }
                .into());
            }
        }
        Ok(())
    }

    /// Shuts down every instance, in reverse construction order.
    ///
    /// Background tasks are cancelled and awaited; pending hook callbacks run
    /// to completion on their own tasks.
    pub async fn shutdown(&self) {
        let cells: Vec<ComponentHandle> = {
            let mut cells = self.instances.read().clone();
            cells.reverse();
            cells
        };
        for cell in cells {
            if matches!(
                cell.state(),
                ComponentState::Closing | ComponentState::Closed
            ) {
                continue;
            }
            cell.set_state(ComponentState::Closing);
            debug!(kind = cell.kind().name, name = ?cell.name(), "closing component");
            cell.cancellation().cancel();
            cell.component().on_close().await;
            cell.drain().await;
            cell.set_state(ComponentState::Closed);
        }
        self.cancel.cancel();
        info!("instance manager shut down");
    }

    pub(crate) fn as_host(self: &Arc<Self>) -> Arc<dyn ComponentHost> {
        Arc::clone(self) as Arc<dyn ComponentHost>
    }
}

/// Layers a kind's default document beneath user-supplied values.
///
/// User values override matching top-level keys; deeper structures are
/// replaced wholesale.
pub(crate) fn layered_config(
    kind: &'static KindDescriptor,
    user: &Value,
) -> Result<Value, ConfigError> {
    let mut merged = kind.default_document()?;
    match user {
        Value::Null => {}
        Value::Object(map) => {
            for (key, value) in map {
                merged.insert(key.clone(), value.clone());
            }
        }
        _ => {
            return Err(ConfigError::Schema {
                path: kind.name.to_string(),
                reason: "configuration item must be a mapping".to_string(),
            });
        }
    }
    Ok(Value::Object(merged))
}
