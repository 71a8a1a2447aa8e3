//! # Trellis HTTP Adapter
//!
//! Two plugins sharing the axum stack:
//!
//! - [`frontend`] — the `frontend/http` plugin: an axum server with a route
//!   table that dependent adapters mount onto during `on_init`;
//! - [`webhook`] — the `triggers/http_webhook` ingress adapter: GitHub-style
//!   webhook deliveries with optional HMAC-SHA256 verification, turned into
//!   envelopes and dispatched through the trigger dispatcher.
//!
//! ```yaml
//! frontend:
//!   http:
//!     listen: 127.0.0.1:8000
//! triggers:
//!   http_webhook:
//!     - name: gh
//!       secret: "…"
//!       mq: bus
//! ```

pub mod frontend;
pub mod webhook;

pub use frontend::{HTTP_FRONTEND, HttpFrontend, HttpFrontendConfig};
pub use webhook::{WEBHOOK_TRIGGER, WebhookConfig, WebhookTrigger, verify_signature};
