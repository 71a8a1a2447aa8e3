//! Built-in `jobs/basic` plugin.
//!
//! A basic job subscribes to triggers through its `triggers` configuration
//! section and, when fired, walks its configured action list. The section
//! mirrors the binder's own shape — `plugin_type → list<match_data>` — where
//! each item is the payload subset that must appear in a triggering envelope:
//!
//! ```yaml
//! jobs:
//!   basic:
//!     - name: build
//!       triggers:
//!         http_webhook:
//!           - event_type: push
//!       actions:
//!         - name: checkout
//!         - name: compile
//!           run: "make all"
//! ```

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};
use linkme::distributed_slice;
use trellis_core::{
    BoxError, Component, ComponentContext, ComponentHandle, Envelope, Hook, KINDS, KindDescriptor,
    KindPredicate, hook_callback, validate_as,
};

/// Configuration accepted by a basic job.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BasicJobConfig {
    /// Instance name, used for cross-references.
    pub name: Option<String>,
    /// Transport peer to publish job events through.
    pub mq: Option<String>,
    /// Subscriptions: trigger plugin type → payload subsets that fire the job.
    pub triggers: serde_json::Map<String, Value>,
    /// Ordered actions to run when fired.
    pub actions: Vec<ActionSpec>,
}

/// One configured job action.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionSpec {
    /// Display name of the action.
    pub name: String,
    /// Optional command line, handed to the configured engine.
    #[serde(default)]
    pub run: Option<String>,
}

/// The `jobs/basic` component.
pub struct BasicJob {
    config: BasicJobConfig,
}

impl BasicJob {
    /// Runs the job in response to a matched hook.
    async fn execute(
        &self,
        cell: &ComponentHandle,
        sender: &ComponentHandle,
        envelope: &Envelope,
    ) -> Result<(), BoxError> {
        info!(
            job = ?cell.name(),
            sender = sender.kind().name,
            payloads = envelope.data().len(),
            "job triggered"
        );
        for action in &self.config.actions {
            info!(job = ?cell.name(), action = %action.name, run = ?action.run, "running action");
        }
        Ok(())
    }
}

#[async_trait]
impl Component for BasicJob {
    async fn on_init(&self, ctx: &ComponentContext) -> Result<(), BoxError> {
        for (plugin_type, items) in &self.config.triggers {
            let Some(items) = items.as_array() else {
                return Err(format!(
                    "jobs.basic triggers.{plugin_type} must be a list of match mappings"
                )
                .into());
            };
            for item in items {
                let predicate = KindPredicate::of_family("triggers", plugin_type.clone());
                let owner = Arc::downgrade(ctx.handle());
                let callback = hook_callback(move |hook: Arc<Hook>, sender, envelope| {
                    let owner = owner.clone();
                    async move {
                        let _ = hook;
                        let Some(cell) = owner.upgrade() else {
                            return Ok(());
                        };
                        let Some(job) = cell.component().as_any().downcast_ref::<BasicJob>()
                        else {
                            return Ok(());
                        };
                        job.execute(&cell, &sender, &envelope).await
                    }
                });
                debug!(plugin_type = %plugin_type, match_data = ?item, "subscribing job to trigger");
                ctx.register_hook(&predicate, item.clone(), None, callback);
            }
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn make_basic_job(
    _kind: &'static KindDescriptor,
    config: &Value,
) -> Result<Arc<dyn Component>, BoxError> {
    let config: BasicJobConfig = serde_json::from_value(config.clone())?;
    Ok(Arc::new(BasicJob { config }))
}

/// Kind descriptor for `jobs/basic`.
pub static BASIC_JOB: KindDescriptor =
    KindDescriptor::plugin("BasicJob", "trellis.jobs.basic", "Job", "jobs", "basic")
        .with_create(make_basic_job)
        .with_validate(validate_as::<BasicJobConfig>);

#[distributed_slice(KINDS)]
static BASIC_JOB_ENTRY: &KindDescriptor = &BASIC_JOB;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn config_parses_triggers_and_actions() {
        let config: BasicJobConfig = serde_json::from_value(json!({
            "name": "build",
            "triggers": {"http_webhook": [{"event_type": "push"}]},
            "actions": [{"name": "checkout"}, {"name": "compile", "run": "make all"}],
        }))
        .unwrap();
        assert_eq!(config.name.as_deref(), Some("build"));
        assert_eq!(config.actions.len(), 2);
        assert_eq!(config.actions[1].run.as_deref(), Some("make all"));
    }

    #[test]
    fn schema_rejects_unknown_keys() {
        let result = validate_as::<BasicJobConfig>(&json!({"trigger": {}}));
        assert!(result.is_err());
    }

    #[test]
    fn schema_rejects_non_mapping_triggers() {
        let result = validate_as::<BasicJobConfig>(&json!({"triggers": 42}));
        assert!(result.is_err());
    }
}
