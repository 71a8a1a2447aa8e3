//! # Trellis Socket Transport
//!
//! The `mq/socket` plugin: a zeromq-style socket transport carrying
//! envelopes as multipart messages over TCP.
//!
//! Configuration keys follow the transport contract in `trellis-core`:
//!
//! ```yaml
//! mq:
//!   socket:
//!     - name: bus
//!       url: tcp://127.0.0.1:5680
//!       socket_type: pull
//! ```
//!
//! An instance whose role consumes (`pull`, `sub`, `xsub`) runs a long-lived
//! consume loop: every received envelope is re-dispatched through the trigger
//! dispatcher. Repeated receive failures back off linearly; the loop honors
//! the instance's cancellation token and closes the socket on exit.

pub mod frame;
pub mod socket;

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::Duration;
use tracing::{debug, warn};
use linkme::distributed_slice;
use trellis_core::{
    BoxError, Component, ComponentContext, KINDS, KindDescriptor, OperationError, SocketConfig,
    Transport, validate_as,
};

pub use socket::Socket;

/// Base delay for the linear consume back-off.
const BACKOFF_STEP: Duration = Duration::from_millis(250);

/// Back-off cap, in steps.
const BACKOFF_MAX_STEPS: u32 = 20;

/// The `mq/socket` component.
pub struct SocketMq {
    socket: Arc<Socket>,
}

impl SocketMq {
    /// The underlying socket.
    pub fn socket(&self) -> &Arc<Socket> {
        &self.socket
    }
}

#[async_trait]
impl Component for SocketMq {
    async fn on_start(&self, ctx: &ComponentContext) -> Result<(), BoxError> {
        if self.socket.is_consumer() {
            let socket = Arc::clone(&self.socket);
            let loop_ctx = ctx.clone();
            ctx.spawn(run_consume_loop(socket, loop_ctx));
        }
        Ok(())
    }

    async fn on_close(&self) {
        self.socket.close().await;
    }

    fn transport(&self) -> Option<&dyn Transport> {
        Some(self.socket.as_ref())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Long-lived consumer: `consume → trigger` until cancelled.
async fn run_consume_loop(socket: Arc<Socket>, ctx: ComponentContext) {
    let cancel = ctx.cancellation();
    let mut failures: u32 = 0;
    loop {
        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = socket.consume() => result,
        };
        match result {
            Ok(envelope) => {
                failures = 0;
                ctx.trigger_envelope(envelope).await;
            }
            Err(OperationError::Closed) => break,
            Err(error) => {
                failures += 1;
                let delay = BACKOFF_STEP * failures.min(BACKOFF_MAX_STEPS);
                warn!(%error, failures, ?delay, "consume failed, backing off");
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
    socket.close().await;
    debug!(name = ?ctx.handle().name(), "consumer loop exited");
}

fn make_socket_mq(
    _kind: &'static KindDescriptor,
    config: &Value,
) -> Result<Arc<dyn Component>, BoxError> {
    let config: SocketConfig = serde_json::from_value(config.clone())?;
    if config.socket_type.is_some() && config.url.is_none() {
        return Err("'url' is required when 'socket_type' is set".into());
    }
    Ok(Arc::new(SocketMq {
        socket: Arc::new(Socket::from_config(&config)),
    }))
}

/// Kind descriptor for `mq/socket`.
pub static SOCKET_MQ: KindDescriptor =
    KindDescriptor::plugin("SocketMq", "trellis.mq.socket", "MessageQueue", "mq", "socket")
        .with_create(make_socket_mq)
        .with_validate(validate_as::<SocketConfig>);

#[distributed_slice(KINDS)]
static SOCKET_MQ_ENTRY: &KindDescriptor = &SOCKET_MQ;
