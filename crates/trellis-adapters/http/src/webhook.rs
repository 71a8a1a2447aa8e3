//! The `triggers/http_webhook` plugin.
//!
//! Accepts GitHub-style webhook deliveries on the HTTP frontend, verifies the
//! `X-Hub-Signature-256` HMAC when a secret is configured, and turns each
//! accepted request into an envelope:
//!
//! - `meta.mq.event_type = "trigger"`;
//! - `meta.webhook` carries the delivery headers (`event_type`, `hook_id`,
//!   `delivery`);
//! - `data` is the JSON request body, as a single payload item.
//!
//! Accepted deliveries answer 204 with no body; a bad signature or a
//! non-JSON body answers 400.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use axum::Json;
use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use sha2::Sha256;
use tracing::{error, info, warn};
use linkme::distributed_slice;
use trellis_core::{
    BoxError, Component, ComponentContext, KINDS, KindDescriptor, KindPredicate, MetaMap,
    validate_as,
};

use crate::frontend::HttpFrontend;

type HmacSha256 = Hmac<Sha256>;

/// Configuration accepted by the webhook trigger.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WebhookConfig {
    /// Instance name, used for cross-references.
    pub name: Option<String>,
    /// Transport peer to publish through.
    pub mq: Option<String>,
    /// Shared secret for HMAC-SHA256 signature verification.
    pub secret: Option<String>,
    /// Route to mount on the frontend.
    pub path: Option<String>,
}

/// The `triggers/http_webhook` component.
pub struct WebhookTrigger {
    config: WebhookConfig,
}

#[derive(Clone)]
struct WebhookState {
    ctx: ComponentContext,
    secret: Option<String>,
}

#[async_trait]
impl Component for WebhookTrigger {
    async fn on_init(&self, ctx: &ComponentContext) -> Result<(), BoxError> {
        let path = self
            .config
            .path
            .clone()
            .unwrap_or_else(|| "/github_webhook".to_string());
        let frontends = ctx.find(&WEBHOOK_DEPS[0]);
        if frontends.is_empty() {
            warn!("no http frontend available, webhook route not mounted");
            return Ok(());
        }
        let state = WebhookState {
            ctx: ctx.clone(),
            secret: self.config.secret.clone(),
        };
        for cell in frontends {
            let Some(frontend) = cell.component().as_any().downcast_ref::<HttpFrontend>() else {
                continue;
            };
            info!(%path, frontend = ?cell.name(), "mounting webhook route");
            let state = state.clone();
            frontend.add_route(
                &path,
                post(move |headers: HeaderMap, body: Bytes| {
                    let state = state.clone();
                    async move { handle_webhook(state, headers, body).await }
                }),
            );
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

async fn handle_webhook(state: WebhookState, headers: HeaderMap, body: Bytes) -> Response {
    if let Some(secret) = &state.secret {
        let signature = header_str(&headers, "x-hub-signature-256");
        if !verify_signature(secret, &body, signature) {
            warn!("webhook rejected: invalid signature");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "invalid signature"})),
            )
                .into_response();
        }
    }

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(error) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": format!("request body must be JSON: {error}")})),
            )
                .into_response();
        }
    };

    if let Err(error) = state.ctx.trigger(webhook_meta(&headers), vec![payload]).await {
        error!(%error, "failed to dispatch webhook envelope");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    // 204 must carry no body at all.
    StatusCode::NO_CONTENT.into_response()
}

fn webhook_meta(headers: &HeaderMap) -> MetaMap {
    let header_value = |key: &str| -> Value {
        header_str(headers, key)
            .map(|v| Value::String(v.to_string()))
            .unwrap_or(Value::Null)
    };
    let mut webhook = Map::new();
    webhook.insert("event_type".to_string(), header_value("x-github-event"));
    webhook.insert("hook_id".to_string(), header_value("x-github-hook-id"));
    webhook.insert("delivery".to_string(), header_value("x-github-delivery"));

    let mut meta = MetaMap::new();
    meta.insert("mq".to_string(), json!({"event_type": "trigger"}));
    meta.insert("webhook".to_string(), Value::Object(webhook));
    meta
}

fn header_str<'h>(headers: &'h HeaderMap, key: &str) -> Option<&'h str> {
    headers.get(key).and_then(|value| value.to_str().ok())
}

/// Verifies a `sha256=<hex>` HMAC signature over the request body.
pub fn verify_signature(secret: &str, body: &[u8], provided: Option<&str>) -> bool {
    let Some(provided) = provided else {
        return false;
    };
    let hex_digest = provided.strip_prefix("sha256=").unwrap_or(provided);
    let Ok(expected) = hex::decode(hex_digest) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

fn make_webhook_trigger(
    _kind: &'static KindDescriptor,
    config: &Value,
) -> Result<Arc<dyn Component>, BoxError> {
    let config: WebhookConfig = serde_json::from_value(config.clone())?;
    Ok(Arc::new(WebhookTrigger { config }))
}

static WEBHOOK_DEPS: [KindPredicate; 1] = [KindPredicate::of_parent_and_type("Frontend", "http")];

/// Kind descriptor for `triggers/http_webhook`.
pub static WEBHOOK_TRIGGER: KindDescriptor = KindDescriptor::plugin(
    "WebhookTrigger",
    "trellis.triggers.http_webhook",
    "Trigger",
    "triggers",
    "http_webhook",
)
.with_defaults("path: /github_webhook\n")
.with_depends_on(&WEBHOOK_DEPS)
.with_create(make_webhook_trigger)
.with_validate(validate_as::<WebhookConfig>);

#[distributed_slice(KINDS)]
static WEBHOOK_TRIGGER_ENTRY: &KindDescriptor = &WEBHOOK_TRIGGER;
