//! # Trellis Core
//!
//! The component-graph engine of the Trellis automation server.
//!
//! Trellis composes all behavior out of independently loadable *components*:
//! transports, ingress triggers, jobs, frontends. This crate provides the
//! machinery that wires them together:
//!
//! - **Kinds & predicates** ([`KindDescriptor`], [`KindPredicate`]) — static
//!   descriptors of component types and the small records used to declare
//!   dependencies between them.
//! - **Registry** ([`KindRegistry`]) — the process-wide, write-once universe
//!   of kinds, populated through the [`KINDS`] distributed slice.
//! - **Resolver** ([`resolution_order`]) — topological ordering of kinds by
//!   structural parent edges and declared dependencies.
//! - **Envelopes** ([`Envelope`], [`Identity`]) — the immutable tri-part
//!   message value and its multipart wire codec.
//! - **Hooks** ([`Hook`], [`HookRegistry`]) — subscriptions binding a sender
//!   kind and a payload subset to an async callback.
//! - **Components** ([`Component`], [`ComponentCell`], [`ComponentContext`])
//!   — instance behavior, lifecycle, and the window onto the owning host.
//! - **Transports** ([`Transport`]) — the publish/consume contract satisfied
//!   by concrete transport plugins.
//!
//! ## Flow
//!
//! ```text
//! ┌──────────┐ envelope ┌────────────┐ publish ┌───────────┐
//! │ trigger  │─────────▶│ dispatcher │────────▶│ transport │
//! │ (ingress)│          │   (host)   │         └───────────┘
//! └──────────┘          │            │ match   ┌───────────┐
//!                       │            │────────▶│ hooks →   │
//!                       └────────────┘         │ callbacks │
//!                                              └───────────┘
//! ```
//!
//! The orchestration half — configuration binding, the instance manager, and
//! the trigger dispatcher — lives in `trellis-runtime`.

pub mod component;
pub mod error;
pub mod families;
pub mod hook;
pub mod kind;
pub mod message;
pub mod registry;
pub mod resolver;
pub mod transport;

pub use component::{
    Component, ComponentCell, ComponentContext, ComponentHandle, ComponentHost, ComponentState,
};
pub use error::{
    BoxError, ConfigError, DependencyCycle, DispatchError, EncodingError, InstanceInitError,
    OperationError,
};
pub use hook::{Hook, HookCallback, HookFuture, HookRegistry, hook_callback, is_subset};
pub use kind::{
    ComponentSpec, CreateFn, KindDescriptor, KindPredicate, ParseSectionFn, Role, ValidateFn,
    default_parse_section, resolve_plugin_kind, validate_as,
};
pub use message::{Envelope, Identity, MetaMap};
pub use registry::{KINDS, KindRegistry};
pub use resolver::resolution_order;
pub use transport::{SocketConfig, SocketOperation, SocketRole, TopicFilter, Transport};

/// Prelude for plugin crates.
pub mod prelude {
    pub use crate::component::{Component, ComponentContext, ComponentHandle};
    pub use crate::error::{BoxError, OperationError};
    pub use crate::hook::{HookCallback, hook_callback};
    pub use crate::kind::{KindDescriptor, KindPredicate, validate_as};
    pub use crate::message::{Envelope, Identity, MetaMap};
    pub use crate::registry::KINDS;
    pub use crate::transport::Transport;
}
