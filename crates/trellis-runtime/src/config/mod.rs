//! Configuration for the Trellis runtime.
//!
//! Two stages: the [`loader`] reads a YAML document (with environment
//! variable expansion) into a JSON tree, and the [`binder`] turns that tree
//! into ordered [`ComponentSpec`](trellis_core::ComponentSpec)s, one per
//! future component instance.

pub mod binder;
pub mod loader;

pub use binder::bind;
pub use loader::{ConfigLoader, load_document, load_document_from_file};
