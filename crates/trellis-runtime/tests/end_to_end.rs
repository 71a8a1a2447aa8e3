//! End-to-end startup scenarios against the full runtime pipeline:
//! collect → resolve → load → bind → materialize → start.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use trellis_core::{
    BoxError, Component, ComponentState, Envelope, KindDescriptor, KindRegistry, MetaMap, Role,
    families,
};
use trellis_runtime::jobs::BASIC_JOB;
use trellis_runtime::{RuntimeOptions, TrellisRuntime};

// ── A synthetic ingress trigger, registered manually (not via the linkme
//    slice, so it never leaks into other tests' collected registries). ──────

struct FakeWebhook;

#[async_trait]
impl Component for FakeWebhook {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn make_fake_webhook(
    _kind: &'static KindDescriptor,
    _config: &Value,
) -> Result<Arc<dyn Component>, BoxError> {
    Ok(Arc::new(FakeWebhook))
}

static FAKE_WEBHOOK: KindDescriptor = KindDescriptor::plugin(
    "FakeWebhook",
    "trellis.triggers.fake_webhook",
    "Trigger",
    "triggers",
    "fake_webhook",
)
.with_create(make_fake_webhook);

fn manual_registry() -> KindRegistry {
    let mut kinds = KindRegistry::new();
    for kind in [
        &families::COMPONENT,
        &families::MESSAGE_QUEUE,
        &families::TRIGGER,
        &families::JOB,
        &families::FRONTEND,
        &BASIC_JOB,
        &FAKE_WEBHOOK,
    ] {
        kinds.register(kind).unwrap();
    }
    kinds
}

#[tokio::test]
async fn default_instantiation_covers_every_plugin_kind() {
    let runtime = TrellisRuntime::initialize(RuntimeOptions::default())
        .await
        .unwrap();
    let manager = runtime.manager();
    let plugin_kinds = manager
        .kinds()
        .all()
        .iter()
        .filter(|k| k.role == Role::Plugin)
        .count();
    let instances = manager.instances();
    assert_eq!(instances.len(), plugin_kinds);
    assert!(instances.iter().all(|c| c.state() == ComponentState::Ready));
    // Unconfigured kinds come up with empty config data.
    let job = instances
        .iter()
        .find(|c| c.kind().name == "BasicJob")
        .expect("basic job instantiated by default");
    assert_eq!(job.config(), &json!({}));
    runtime.shutdown().await;
}

#[tokio::test]
async fn configured_job_subscribes_to_its_trigger() {
    let yaml = r#"
jobs:
  basic:
    - name: build
      triggers:
        fake_webhook:
          - event_type: push
"#;
    let runtime = TrellisRuntime::initialize(RuntimeOptions {
        config_yaml: Some(yaml.to_string()),
        kinds: Some(manual_registry()),
        ..Default::default()
    })
    .await
    .unwrap();
    let manager = runtime.manager();

    // One hook, bound to the sender kind named by the subscription.
    let hooks = manager.hooks().list();
    assert_eq!(hooks.len(), 1);
    assert_eq!(hooks[0].kind.name, "FakeWebhook");
    assert_eq!(hooks[0].match_data, json!({"event_type": "push"}));

    let webhook = manager
        .instances()
        .into_iter()
        .find(|c| c.kind().name == "FakeWebhook")
        .unwrap();

    let push = Envelope::new(
        webhook.identity(),
        MetaMap::new(),
        vec![json!({"event_type": "push", "ref": "main"})],
    )
    .unwrap();
    let pairs = manager.hooks().matches(&push, &manager.instances());
    assert_eq!(pairs.len(), 1);
    assert!(Arc::ptr_eq(&pairs[0].1, &webhook));

    let ping = Envelope::new(
        webhook.identity(),
        MetaMap::new(),
        vec![json!({"event_type": "ping"})],
    )
    .unwrap();
    assert!(manager.hooks().matches(&ping, &manager.instances()).is_empty());

    // Dispatch is fire-and-forget either way.
    manager.trigger(&webhook, push).await;
    runtime.shutdown().await;
}

#[tokio::test]
async fn malformed_job_config_is_rejected_at_binding() {
    let yaml = r#"
jobs:
  basic:
    - name: build
      trigger_on: oops
"#;
    let err = TrellisRuntime::initialize(RuntimeOptions {
        config_yaml: Some(yaml.to_string()),
        kinds: Some(manual_registry()),
        ..Default::default()
    })
    .await
    .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("jobs.basic[0]"), "got: {message}");
}
