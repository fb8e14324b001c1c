//! # Objectl Core
//!
//! `objectl-core` is the foundational library powering the Objectl CLI. It performs
//! create/read/update/delete/list operations against *any* object type exposed by a gRPC
//! service, discovered purely from the Protobuf schema, without generated client code.
//!
//! ## Key Components
//!
//! * **[`Registry`]:** Scans a [`prost_reflect::DescriptorPool`] once, finds the services that
//!   follow the `Get`/`List`/`Create`/`Update`/`Delete` convention and resolves object types by
//!   full name, singular or plural alias.
//! * **[`ObjectDescriptor`]:** The per-type dispatch record. Every operation builds a
//!   [`prost_reflect::DynamicMessage`] request and performs exactly one call on the [`Transport`].
//! * **[`expr::Environment`]:** Compiles CEL style expressions against a message schema, used for
//!   table columns and for checking the list filters built by clients.
//! * **[`TableRenderer`]:** Renders lists of objects as aligned text tables, translating enum
//!   values and object identifiers into human readable text.
//!
//! ## Transport
//!
//! * **[`GrpcTransport`]:** A [`Transport`] over any `tonic` service/channel using a
//!   [`grpc::codec::DynamicCodec`] that encodes and decodes `DynamicMessage` values on the fly.
//!
//! ## Re-exports
//!
//! This crate re-exports `prost`, `prost-reflect`, and `tonic` to ensure that consumers
//! use compatible versions of these underlying dependencies.
pub mod expr;
pub mod grpc;
pub mod reflection;
pub mod rendering;
pub mod transport;
mod wkt;

pub use grpc::client::GrpcTransport;
pub use reflection::{
    ListOptions, ListResult, Metadata, ObjectDescriptor, ObjectError, Operation, Registry,
};
pub use rendering::{RenderError, TableRenderer};
pub use transport::{InvokeError, Transport};

// Re-exports
pub use prost;
pub use prost_reflect;
pub use tonic;

/// Type alias for the standard boxed error used in generic bounds.
type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors returned by the builders when a mandatory input is missing.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("{0} is mandatory")]
    Missing(&'static str),
    #[error("at least one package is mandatory")]
    NoPackages,
}
