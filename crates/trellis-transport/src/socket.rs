//! TCP socket with zeromq-style roles.
//!
//! One [`Socket`] is one endpoint: it binds or connects according to its
//! role, speaks the multipart frame codec, and exposes the core
//! [`Transport`] contract. Incoming messages flow through a bounded channel
//! of capacity one — consumers pull one envelope at a time, and anything
//! faster than the consumer waits in the peer's send buffer.

use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use trellis_core::{
    Envelope, OperationError, SocketConfig, SocketOperation, SocketRole, Transport,
};

use crate::frame;

type RawMessage = Vec<Vec<u8>>;
type PeerList = Arc<Mutex<Vec<mpsc::UnboundedSender<Arc<Vec<u8>>>>>>;

enum OpenState {
    Unopened,
    Open,
    Closed,
}

/// A role-tagged TCP endpoint implementing the transport contract.
pub struct Socket {
    role: Option<SocketRole>,
    operation: Option<SocketOperation>,
    url: Option<String>,
    identity: Option<String>,
    topic: Option<String>,
    cancel: CancellationToken,
    state: tokio::sync::Mutex<OpenState>,
    incoming: tokio::sync::Mutex<Option<mpsc::Receiver<RawMessage>>>,
    peers: PeerList,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl Socket {
    /// Builds an unopened socket from configuration. Opening is lazy.
    pub fn from_config(config: &SocketConfig) -> Self {
        Self {
            role: config.socket_type,
            operation: config.operation(),
            url: config.url.clone(),
            identity: config.identity.clone(),
            topic: config.topic().map(str::to_string),
            cancel: CancellationToken::new(),
            state: tokio::sync::Mutex::new(OpenState::Unopened),
            incoming: tokio::sync::Mutex::new(None),
            peers: Arc::new(Mutex::new(Vec::new())),
            local_addr: Mutex::new(None),
        }
    }

    /// The bound or connected local address, once open.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    /// Number of live peer connections.
    pub fn peer_count(&self) -> usize {
        let mut peers = self.peers.lock();
        peers.retain(|tx| !tx.is_closed());
        peers.len()
    }
}

#[async_trait::async_trait]
impl Transport for Socket {
    async fn open(&self) -> Result<(), OperationError> {
        let mut state = self.state.lock().await;
        match *state {
            OpenState::Open => return Ok(()),
            OpenState::Closed => return Err(OperationError::Closed),
            OpenState::Unopened => {}
        }
        let role = self
            .role
            .ok_or(OperationError::NotConfigured("socket_type"))?;
        let url = self
            .url
            .as_deref()
            .ok_or(OperationError::NotConfigured("url"))?;
        let endpoint = parse_endpoint(url)?;
        let operation = self.operation.unwrap_or_else(|| role.default_operation());

        let (incoming_tx, incoming_rx) = mpsc::channel(1);
        match operation {
            SocketOperation::Bind => {
                let listener =
                    TcpListener::bind(endpoint)
                        .await
                        .map_err(|source| OperationError::Bind {
                            addr: endpoint.to_string(),
                            source,
                        })?;
                *self.local_addr.lock() = listener.local_addr().ok();
                tokio::spawn(accept_loop(
                    listener,
                    incoming_tx,
                    Arc::clone(&self.peers),
                    self.cancel.clone(),
                ));
            }
            SocketOperation::Connect => {
                let stream =
                    TcpStream::connect(endpoint)
                        .await
                        .map_err(|source| OperationError::Connect {
                            addr: endpoint.to_string(),
                            source,
                        })?;
                *self.local_addr.lock() = stream.local_addr().ok();
                register_connection(
                    stream,
                    incoming_tx,
                    &self.peers,
                    self.cancel.child_token(),
                );
            }
        }
        *self.incoming.lock().await = Some(incoming_rx);
        *state = OpenState::Open;
        debug!(
            role = role.as_str(),
            ?operation,
            url,
            identity = ?self.identity,
            "socket open"
        );
        Ok(())
    }

    async fn publish(&self, envelope: &Envelope) -> Result<(), OperationError> {
        self.open().await?;
        let frames = envelope.encode()?;
        let message = Arc::new(frame::encode_message(&frames));
        let mut peers = self.peers.lock();
        peers.retain(|tx| !tx.is_closed());
        if peers.is_empty() {
            return match self.operation {
                // A bound fan-out endpoint with no subscribers drops silently.
                Some(SocketOperation::Bind) => Ok(()),
                _ => Err(OperationError::NotConnected),
            };
        }
        for tx in peers.iter() {
            let _ = tx.send(Arc::clone(&message));
        }
        trace!(frames = frames.len(), peers = peers.len(), "published message");
        Ok(())
    }

    async fn consume(&self) -> Result<Envelope, OperationError> {
        self.open().await?;
        let mut guard = self.incoming.lock().await;
        let receiver = guard.as_mut().ok_or(OperationError::Closed)?;
        loop {
            let frames = tokio::select! {
                _ = self.cancel.cancelled() => return Err(OperationError::Closed),
                frames = receiver.recv() => frames.ok_or(OperationError::Closed)?,
            };
            match Envelope::decode(&frames) {
                Ok(envelope) => {
                    if let Some(topic) = &self.topic
                        && envelope.identity().name.as_deref() != Some(topic.as_str())
                    {
                        trace!(%topic, "skipping envelope for another topic");
                        continue;
                    }
                    return Ok(envelope);
                }
                Err(error) => {
                    warn!(%error, "dropping undecodable message");
                }
            }
        }
    }

    async fn close(&self) {
        let mut state = self.state.lock().await;
        let was_open = matches!(*state, OpenState::Open);
        *state = OpenState::Closed;
        drop(state);
        if was_open {
            self.cancel.cancel();
            self.peers.lock().clear();
            debug!("socket closed");
        }
    }

    fn is_consumer(&self) -> bool {
        self.role.is_some_and(SocketRole::is_consumer)
    }
}

fn parse_endpoint(url: &str) -> Result<&str, OperationError> {
    url.strip_prefix("tcp://")
        .filter(|rest| !rest.is_empty())
        .ok_or_else(|| OperationError::InvalidUrl(url.to_string()))
}

/// Accepts connections on a bound endpoint and wires each one up.
async fn accept_loop(
    listener: TcpListener,
    incoming: mpsc::Sender<RawMessage>,
    peers: PeerList,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, remote)) => {
                    debug!(%remote, "peer connected");
                    register_connection(stream, incoming.clone(), &peers, cancel.child_token());
                }
                Err(error) => {
                    warn!(%error, "accept failed");
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }
}

/// Splits a stream into reader and writer tasks and registers the writer as
/// a peer.
fn register_connection(
    stream: TcpStream,
    incoming: mpsc::Sender<RawMessage>,
    peers: &PeerList,
    cancel: CancellationToken,
) {
    let (read_half, write_half) = stream.into_split();
    let (peer_tx, peer_rx) = mpsc::unbounded_channel();
    peers.lock().push(peer_tx);
    tokio::spawn(run_writer(write_half, peer_rx, cancel.clone()));
    tokio::spawn(run_reader(read_half, incoming, cancel));
}

async fn run_writer(
    mut write_half: OwnedWriteHalf,
    mut outgoing: mpsc::UnboundedReceiver<Arc<Vec<u8>>>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            message = outgoing.recv() => match message {
                Some(bytes) => {
                    if let Err(error) = frame::write_message(&mut write_half, &bytes).await {
                        debug!(%error, "peer write failed");
                        break;
                    }
                }
                None => break,
            }
        }
    }
}

async fn run_reader(
    mut read_half: OwnedReadHalf,
    incoming: mpsc::Sender<RawMessage>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            result = frame::read_message(&mut read_half) => match result {
                Ok(Some(frames)) => {
                    if incoming.send(frames).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    debug!("peer disconnected");
                    break;
                }
                Err(error) => {
                    debug!(%error, "peer read failed");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use trellis_core::{Identity, MetaMap};

    fn socket(config: serde_json::Value) -> Socket {
        let config: SocketConfig = serde_json::from_value(config).unwrap();
        Socket::from_config(&config)
    }

    fn envelope(name: Option<&str>) -> Envelope {
        Envelope::new(
            Identity::new(name.map(str::to_string), "trellis.mq.socket", "socket"),
            MetaMap::new(),
            vec![json!({"k": 1}), json!({"k": 2})],
        )
        .unwrap()
    }

    async fn wait_for_peers(socket: &Socket, count: usize) {
        for _ in 0..100 {
            if socket.peer_count() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("peers never connected");
    }

    #[tokio::test]
    async fn push_pull_round_trip() {
        let pull = socket(json!({"url": "tcp://127.0.0.1:0", "socket_type": "pull"}));
        pull.open().await.unwrap();
        let addr = pull.local_addr().unwrap();

        let push = socket(json!({
            "url": format!("tcp://{addr}"),
            "socket_type": "push",
        }));
        let sent = envelope(None);
        push.publish(&sent).await.unwrap();
        let received = pull.consume().await.unwrap();
        assert_eq!(received, sent);

        push.close().await;
        pull.close().await;
    }

    #[tokio::test]
    async fn pub_sub_topic_filtering() {
        let publisher = socket(json!({"url": "tcp://127.0.0.1:0", "socket_type": "pub"}));
        publisher.open().await.unwrap();
        let addr = publisher.local_addr().unwrap();

        let matching = socket(json!({
            "url": format!("tcp://{addr}"),
            "socket_type": "sub",
            "queue": "bus",
        }));
        matching.open().await.unwrap();
        let other = socket(json!({
            "url": format!("tcp://{addr}"),
            "socket_type": "sub",
            "queue": "elsewhere",
        }));
        other.open().await.unwrap();
        wait_for_peers(&publisher, 2).await;

        publisher.publish(&envelope(Some("bus"))).await.unwrap();
        let received = matching.consume().await.unwrap();
        assert_eq!(received.identity().name.as_deref(), Some("bus"));

        // The mismatched subscriber sees nothing.
        let nothing =
            tokio::time::timeout(Duration::from_millis(200), other.consume()).await;
        assert!(nothing.is_err());

        publisher.close().await;
        matching.close().await;
        other.close().await;
    }

    #[tokio::test]
    async fn close_cancels_pending_consume() {
        let pull = socket(json!({"url": "tcp://127.0.0.1:0", "socket_type": "pull"}));
        pull.open().await.unwrap();
        let pull = Arc::new(pull);
        let consumer = {
            let pull = Arc::clone(&pull);
            tokio::spawn(async move { pull.consume().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        pull.close().await;
        let result = consumer.await.unwrap();
        assert!(matches!(result, Err(OperationError::Closed)));
    }

    #[tokio::test]
    async fn unconfigured_socket_reports_missing_keys() {
        let blank = socket(json!({}));
        assert!(matches!(
            blank.open().await,
            Err(OperationError::NotConfigured("socket_type"))
        ));

        let no_url = socket(json!({"socket_type": "pull"}));
        assert!(matches!(
            no_url.open().await,
            Err(OperationError::NotConfigured("url"))
        ));
    }

    #[tokio::test]
    async fn connect_failure_is_recoverable() {
        // Nothing is bound on the far side.
        let push = socket(json!({
            "url": "tcp://127.0.0.1:1",
            "socket_type": "push",
        }));
        let err = push.publish(&envelope(None)).await.unwrap_err();
        assert!(matches!(err, OperationError::Connect { .. }));
        // The socket stays usable: open remains lazy and retryable.
        let err = push.publish(&envelope(None)).await.unwrap_err();
        assert!(matches!(err, OperationError::Connect { .. }));
    }

    #[tokio::test]
    async fn invalid_url_is_rejected() {
        let push = socket(json!({
            "url": "udp://127.0.0.1:9",
            "socket_type": "push",
        }));
        assert!(matches!(
            push.open().await,
            Err(OperationError::InvalidUrl(_))
        ));
    }
}
