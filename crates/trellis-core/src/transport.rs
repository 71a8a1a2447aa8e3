//! Transport abstraction.
//!
//! A [`Transport`] carries envelopes between processes. The core does not
//! require a specific wire; it only requires that `publish(E)` on one side
//! yields an envelope structurally equal to `E` on the consuming side.
//! Concrete transports live in their own plugin crates and are reached
//! through [`Component::transport`](crate::component::Component::transport).
//!
//! The configuration keys a socket-style transport recognizes are part of the
//! contract and live here: `url`, `socket_type`, `socket_operation`,
//! `identity`, and `queue` (topic filter for sub roles).

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::OperationError;
use crate::message::Envelope;

// =============================================================================
// Transport trait
// =============================================================================

/// Publish/consume contract satisfied by concrete transport plugins.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Opens the underlying endpoint. Idempotent; opening is lazy and is also
    /// performed by the first `publish` or `consume`.
    async fn open(&self) -> Result<(), OperationError>;

    /// Publishes one envelope. May fail with a recoverable
    /// [`OperationError`]; never blocks indefinitely.
    async fn publish(&self, envelope: &Envelope) -> Result<(), OperationError>;

    /// Awaits the next envelope. Cancellable; returns
    /// [`OperationError::Closed`] once the transport shuts down.
    async fn consume(&self) -> Result<Envelope, OperationError>;

    /// Closes the endpoint. Idempotent.
    async fn close(&self);

    /// Whether this transport's role consumes (and should drive a consume
    /// loop).
    fn is_consumer(&self) -> bool {
        false
    }
}

// =============================================================================
// Socket configuration contract
// =============================================================================

/// Socket role of a transport endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SocketRole {
    /// Send side of a pipeline.
    Push,
    /// Receive side of a pipeline.
    Pull,
    /// Fan-out publisher.
    Pub,
    /// Subscriber with optional topic filter.
    Sub,
    /// Proxy-side publisher; behaves as `Pub` here.
    XPub,
    /// Proxy-side subscriber; behaves as `Sub` here.
    XSub,
}

impl SocketRole {
    /// The operation used when `socket_operation` is not configured:
    /// `connect` for push/sub, `bind` for pull/pub.
    pub fn default_operation(self) -> SocketOperation {
        match self {
            Self::Push | Self::Sub | Self::XSub => SocketOperation::Connect,
            Self::Pull | Self::Pub | Self::XPub => SocketOperation::Bind,
        }
    }

    /// Whether this role receives envelopes.
    pub fn is_consumer(self) -> bool {
        matches!(self, Self::Pull | Self::Sub | Self::XSub)
    }

    /// Lowercase name, as written in configuration.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Push => "push",
            Self::Pull => "pull",
            Self::Pub => "pub",
            Self::Sub => "sub",
            Self::XPub => "xpub",
            Self::XSub => "xsub",
        }
    }
}

/// Whether the endpoint binds locally or connects out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SocketOperation {
    /// Connect to a remote endpoint.
    Connect,
    /// Bind a local endpoint.
    Bind,
}

/// The `queue` configuration key: a topic filter for sub roles.
///
/// Either an explicit topic string, or `true` to subscribe to the instance's
/// own name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TopicFilter {
    /// Filter on this topic.
    Named(String),
    /// `true`: filter on the instance name; `false`: no filtering.
    Enabled(bool),
}

/// Configuration accepted by socket-style transport plugins.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SocketConfig {
    /// Instance name, used for cross-references and as the default topic.
    pub name: Option<String>,
    /// Transport peer to publish through (reserved key, rarely meaningful on
    /// a transport itself).
    pub mq: Option<String>,
    /// Endpoint address, e.g. `tcp://127.0.0.1:5680`.
    pub url: Option<String>,
    /// Socket role.
    pub socket_type: Option<SocketRole>,
    /// Bind or connect; defaults per role.
    pub socket_operation: Option<SocketOperation>,
    /// Optional peer identity tag, included in connection logs.
    pub identity: Option<String>,
    /// Topic filter for sub roles: only envelopes whose identity name equals
    /// the topic are consumed.
    pub queue: Option<TopicFilter>,
}

impl SocketConfig {
    /// The effective operation, honoring the per-role default.
    pub fn operation(&self) -> Option<SocketOperation> {
        self.socket_operation
            .or_else(|| self.socket_type.map(SocketRole::default_operation))
    }

    /// The effective topic filter: an explicit `queue` string, or the
    /// instance name when `queue: true`.
    pub fn topic(&self) -> Option<&str> {
        match &self.queue {
            Some(TopicFilter::Named(topic)) => Some(topic),
            Some(TopicFilter::Enabled(true)) => self.name.as_deref(),
            Some(TopicFilter::Enabled(false)) | None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_operations_per_role() {
        assert_eq!(SocketRole::Push.default_operation(), SocketOperation::Connect);
        assert_eq!(SocketRole::Sub.default_operation(), SocketOperation::Connect);
        assert_eq!(SocketRole::Pull.default_operation(), SocketOperation::Bind);
        assert_eq!(SocketRole::Pub.default_operation(), SocketOperation::Bind);
    }

    #[test]
    fn config_parses_role_names() {
        let cfg: SocketConfig = serde_json::from_value(json!({
            "name": "bus",
            "url": "tcp://127.0.0.1:5680",
            "socket_type": "xpub",
        }))
        .unwrap();
        assert_eq!(cfg.socket_type, Some(SocketRole::XPub));
        assert_eq!(cfg.operation(), Some(SocketOperation::Bind));
    }

    #[test]
    fn config_rejects_unknown_keys() {
        let result: Result<SocketConfig, _> =
            serde_json::from_value(json!({"socket_kind": "push"}));
        assert!(result.is_err());
    }

    #[test]
    fn explicit_operation_wins() {
        let cfg: SocketConfig = serde_json::from_value(json!({
            "socket_type": "push",
            "socket_operation": "bind",
        }))
        .unwrap();
        assert_eq!(cfg.operation(), Some(SocketOperation::Bind));
    }

    #[test]
    fn topic_accepts_string_and_bool_forms() {
        let named: SocketConfig = serde_json::from_value(json!({
            "name": "bus",
            "queue": "alerts",
        }))
        .unwrap();
        assert_eq!(named.topic(), Some("alerts"));

        let own_name: SocketConfig = serde_json::from_value(json!({
            "name": "bus",
            "queue": true,
        }))
        .unwrap();
        assert_eq!(own_name.topic(), Some("bus"));

        let unfiltered: SocketConfig =
            serde_json::from_value(json!({"name": "bus"})).unwrap();
        assert_eq!(unfiltered.topic(), None);
    }
}
