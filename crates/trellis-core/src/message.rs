//! Message envelopes.
//!
//! An [`Envelope`] is the immutable tri-part value passed between components
//! and over transports:
//!
//! - `identity` — who sent it (name, plugin namespace, plugin type);
//! - `meta` — a two-level mapping grouping metadata by concern (`mq`,
//!   `webhook`, …); every top-level value must itself be a mapping;
//! - `data` — an ordered sequence of opaque payload values.
//!
//! The wire form is an ordered multipart message
//! `[identity_json, meta_json, data[0]_json, …]`; anything with fewer than
//! two frames is rejected.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EncodingError;

/// Two-level metadata mapping carried by every envelope.
pub type MetaMap = serde_json::Map<String, Value>;

// =============================================================================
// Identity
// =============================================================================

/// The sender identity of an envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    /// Configured name of the sending instance, if any.
    #[serde(default)]
    pub name: Option<String>,
    /// The sender kind's namespace.
    pub plugin_namespace: String,
    /// The sender kind's plugin type.
    pub plugin_type: String,
}

impl Identity {
    /// Creates an identity.
    pub fn new(
        name: Option<String>,
        plugin_namespace: impl Into<String>,
        plugin_type: impl Into<String>,
    ) -> Self {
        Self {
            name,
            plugin_namespace: plugin_namespace.into(),
            plugin_type: plugin_type.into(),
        }
    }

    fn check(&self) -> Result<(), EncodingError> {
        if self.plugin_namespace.is_empty() {
            return Err(EncodingError::EmptyIdentity("plugin_namespace"));
        }
        if self.plugin_type.is_empty() {
            return Err(EncodingError::EmptyIdentity("plugin_type"));
        }
        Ok(())
    }
}

// =============================================================================
// Envelope
// =============================================================================

/// An immutable message envelope.
///
/// Construction validates the parts; after that the envelope never changes.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    identity: Identity,
    meta: MetaMap,
    data: Vec<Value>,
}

impl Envelope {
    /// Builds an envelope from explicit parts.
    ///
    /// Fails when an identity field is empty or a top-level `meta` value is
    /// not a mapping. `data` may be empty.
    pub fn new(identity: Identity, meta: MetaMap, data: Vec<Value>) -> Result<Self, EncodingError> {
        identity.check()?;
        for (key, value) in &meta {
            if !value.is_object() {
                return Err(EncodingError::MetaNotMapping(key.clone()));
            }
        }
        Ok(Self {
            identity,
            meta,
            data,
        })
    }

    /// The sender identity.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// The metadata mapping.
    pub fn meta(&self) -> &MetaMap {
        &self.meta
    }

    /// The ordered payload values.
    pub fn data(&self) -> &[Value] {
        &self.data
    }

    /// Serializes the envelope to its multipart wire form.
    pub fn encode(&self) -> Result<Vec<Vec<u8>>, EncodingError> {
        let mut frames = Vec::with_capacity(2 + self.data.len());
        frames.push(serde_json::to_vec(&self.identity)?);
        frames.push(serde_json::to_vec(&self.meta)?);
        for item in &self.data {
            frames.push(serde_json::to_vec(item)?);
        }
        Ok(frames)
    }

    /// Deserializes an envelope from its multipart wire form.
    ///
    /// The inverse of [`encode`](Self::encode); messages with fewer than two
    /// frames are rejected.
    pub fn decode(frames: &[Vec<u8>]) -> Result<Self, EncodingError> {
        if frames.len() < 2 {
            return Err(EncodingError::TooFewFrames(frames.len()));
        }
        let identity: Identity = serde_json::from_slice(&frames[0])
            .map_err(|source| EncodingError::Frame { index: 0, source })?;
        let meta: MetaMap = serde_json::from_slice(&frames[1])
            .map_err(|source| EncodingError::Frame { index: 1, source })?;
        let data = frames[2..]
            .iter()
            .enumerate()
            .map(|(i, frame)| {
                serde_json::from_slice(frame).map_err(|source| EncodingError::Frame {
                    index: i + 2,
                    source,
                })
            })
            .collect::<Result<Vec<Value>, _>>()?;
        Self::new(identity, meta, data)
    }
}
