//! # Transport
//!
//! The only thing the object layer needs from a connection is "invoke this method path with
//! this request and give me back a message of that type". Keeping it behind a trait lets the
//! same dispatch code run over a real `tonic` channel or over an in-memory double in tests.
use crate::BoxError;
use prost_reflect::{DynamicMessage, MessageDescriptor};
use std::future::Future;
use tonic::Code;

/// Errors that can occur when invoking a method on the transport.
#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    #[error("Internal error, the client was not ready: '{0}'")]
    ClientNotReady(#[source] BoxError),
    #[error("gRPC call failed with code {:?}: '{}'", .0.code(), .0.message())]
    Status(#[from] tonic::Status),
}

impl InvokeError {
    /// Returns `true` when the server reported that the requested object doesn't exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, InvokeError::Status(status) if status.code() == Code::NotFound)
    }

    /// Returns the gRPC status, if the error was produced by the server.
    pub fn status(&self) -> Option<&tonic::Status> {
        match self {
            InvokeError::Status(status) => Some(status),
            InvokeError::ClientNotReady(_) => None,
        }
    }
}

/// A unary RPC transport addressed by method path (e.g. `/fulfillment.v1.Clusters/Get`).
///
/// Cancellation is the caller's business: dropping the returned future aborts the call. The
/// future must be `Send` so that the operations built on top of it can be spawned.
pub trait Transport {
    fn invoke(
        &self,
        path: &str,
        request: DynamicMessage,
        response: MessageDescriptor,
    ) -> impl Future<Output = Result<DynamicMessage, InvokeError>> + Send;
}
