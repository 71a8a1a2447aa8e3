//! Trigger dispatcher.
//!
//! A *trigger* is one component announcing an event. Dispatch is two-legged
//! and best-effort on both legs:
//!
//! 1. If the sender's configuration names a transport peer (`mq` key), the
//!    envelope is published through it. A publish failure is logged and does
//!    not abort local dispatch.
//! 2. The envelope is matched against the hook registry; every matched
//!    callback is launched as its own task, in matcher order. Completion
//!    order is unspecified, and a failing callback never affects its
//!    siblings.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error, warn};
use trellis_core::{
    ComponentHandle, ComponentHost, DispatchError, Envelope, HookCallback, KindPredicate,
    KindRegistry,
};

use crate::manager::InstanceManager;

impl InstanceManager {
    /// Dispatches an envelope on behalf of `sender`.
    pub async fn trigger(&self, sender: &ComponentHandle, envelope: Envelope) {
        if let Some(peer) = sender.publish_peer() {
            match self.transport_peer(peer) {
                Some(mq) => {
                    if let Some(transport) = mq.component().transport()
                        && let Err(error) = transport.publish(&envelope).await
                    {
                        warn!(peer, %error, "publish failed, continuing local dispatch");
                    }
                }
                None => {
                    warn!(
                        peer,
                        sender = sender.kind().name,
                        "no transport instance with that name"
                    );
                }
            }
        }

        let instances = self.instances();
        let matched = self.hooks().matches(&envelope, &instances);
        debug!(
            sender = sender.kind().name,
            hooks = matched.len(),
            "dispatching envelope"
        );
        for (hook, instance) in matched {
            let envelope = envelope.clone();
            let instance_name = instance.name().map(str::to_string);
            tokio::spawn(async move {
                if let Err(source) = hook.invoke(instance, envelope).await {
                    let error = DispatchError {
                        kind: hook.kind.name,
                        source,
                    };
                    error!(instance = ?instance_name, %error, "hook callback failed");
                }
            });
        }
    }
}

#[async_trait]
impl ComponentHost for InstanceManager {
    fn kinds(&self) -> &KindRegistry {
        InstanceManager::kinds(self)
    }

    fn find(&self, predicate: &KindPredicate) -> Vec<ComponentHandle> {
        InstanceManager::find(self, predicate)
    }

    fn register_hook(
        &self,
        owner: &ComponentHandle,
        predicate: &KindPredicate,
        match_data: Value,
        hook_type: Option<String>,
        callback: HookCallback,
    ) {
        self.hooks().register(
            InstanceManager::kinds(self),
            owner,
            predicate,
            match_data,
            hook_type,
            callback,
        );
    }

    async fn trigger(&self, sender: &ComponentHandle, envelope: Envelope) {
        InstanceManager::trigger(self, sender, envelope).await;
    }
}
