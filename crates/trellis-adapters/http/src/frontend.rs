//! The `frontend/http` plugin.
//!
//! An axum server owning a mountable route table. Dependent adapters (the
//! webhook trigger, for one) look the frontend up during their `on_init` and
//! call [`HttpFrontend::add_route`]; the server itself binds and starts
//! serving at `on_start`, once every route is mounted.

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::routing::MethodRouter;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info};
use linkme::distributed_slice;
use trellis_core::{BoxError, Component, ComponentContext, KINDS, KindDescriptor, validate_as};

/// Configuration accepted by the HTTP frontend.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpFrontendConfig {
    /// Instance name, used for cross-references.
    pub name: Option<String>,
    /// Transport peer to publish through.
    pub mq: Option<String>,
    /// Listen address.
    pub listen: Option<String>,
}

/// The `frontend/http` component.
pub struct HttpFrontend {
    listen: String,
    routes: Mutex<Option<Router>>,
    bound: Mutex<Option<SocketAddr>>,
}

impl HttpFrontend {
    /// Mounts a route. Call during `on_init`, before the server starts.
    pub fn add_route(&self, path: &str, route: MethodRouter) {
        let mut routes = self.routes.lock();
        let router = routes.take().unwrap_or_default();
        *routes = Some(router.route(path, route));
    }

    /// The actually bound address, once serving.
    pub fn bound_addr(&self) -> Option<SocketAddr> {
        *self.bound.lock()
    }
}

#[async_trait]
impl Component for HttpFrontend {
    async fn on_start(&self, ctx: &ComponentContext) -> Result<(), BoxError> {
        let router = self.routes.lock().take().unwrap_or_default();
        let listener = tokio::net::TcpListener::bind(&self.listen).await?;
        let addr = listener.local_addr()?;
        *self.bound.lock() = Some(addr);
        info!(%addr, "http frontend listening");

        let cancel = ctx.cancellation();
        ctx.spawn(async move {
            let shutdown = async move { cancel.cancelled().await };
            if let Err(error) = axum::serve(listener, router)
                .with_graceful_shutdown(shutdown)
                .await
            {
                error!(%error, "http frontend server error");
            }
        });
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn make_http_frontend(
    _kind: &'static KindDescriptor,
    config: &Value,
) -> Result<Arc<dyn Component>, BoxError> {
    let config: HttpFrontendConfig = serde_json::from_value(config.clone())?;
    Ok(Arc::new(HttpFrontend {
        listen: config.listen.unwrap_or_else(|| "127.0.0.1:8000".to_string()),
        routes: Mutex::new(None),
        bound: Mutex::new(None),
    }))
}

/// Kind descriptor for `frontend/http`.
pub static HTTP_FRONTEND: KindDescriptor = KindDescriptor::plugin(
    "HttpFrontend",
    "trellis.frontend.http",
    "Frontend",
    "frontend",
    "http",
)
.with_defaults("listen: \"127.0.0.1:8000\"\n")
.with_create(make_http_frontend)
.with_validate(validate_as::<HttpFrontendConfig>);

#[distributed_slice(KINDS)]
static HTTP_FRONTEND_ENTRY: &KindDescriptor = &HTTP_FRONTEND;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_document_supplies_listen_address() {
        let defaults = HTTP_FRONTEND.default_document().unwrap();
        assert_eq!(defaults["listen"], "127.0.0.1:8000");
    }

    #[test]
    fn schema_rejects_unknown_keys() {
        assert!(validate_as::<HttpFrontendConfig>(&json!({"port": 8000})).is_err());
    }

    #[test]
    fn factory_reads_listen_address() {
        let component =
            make_http_frontend(&HTTP_FRONTEND, &json!({"listen": "127.0.0.1:0"})).unwrap();
        let frontend = component.as_any().downcast_ref::<HttpFrontend>().unwrap();
        assert_eq!(frontend.listen, "127.0.0.1:0");
    }
}
