//! # Generic gRPC Client
//!
//! This module wraps a standard `tonic` client to provide a [`Transport`] that is agnostic to
//! the specific Protobuf messages being exchanged.
//!
//! ## How it works
//!
//! The [`GrpcTransport`] utilizes the [`super::codec::DynamicCodec`] to handle serialization.
//! It receives the HTTP/2 path (e.g., `/package.Service/Method`) computed at scan time, the
//! request message and the descriptor of the expected response.
//!
//! ## Features
//!
//! * **Static Metadata**: Headers (e.g. `authorization`) are validated once when the transport
//!   is configured and attached to every call.
//! * **Any Service**: Works over a `Channel` or directly over an in-process `tonic` server.
use super::codec::DynamicCodec;
use crate::{
    BoxError,
    transport::{InvokeError, Transport},
};
use http_body::Body as HttpBody;
use prost_reflect::{DynamicMessage, MessageDescriptor};
use std::str::FromStr;
use tonic::{
    Status,
    client::GrpcService,
    metadata::{
        MetadataKey, MetadataMap, MetadataValue,
        errors::{InvalidMetadataKey, InvalidMetadataValue},
    },
    transport::{Channel, Endpoint},
};

/// Errors that can occur when connecting to a gRPC server.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("Invalid URL '{0}': {1}")]
    InvalidUrl(String, #[source] tonic::transport::Error),
    #[error("Failed to connect to '{0}': {1}")]
    ConnectionFailed(String, #[source] tonic::transport::Error),
}

/// Errors that can occur when configuring the request metadata.
#[derive(thiserror::Error, Debug)]
pub enum MetadataError {
    #[error("Invalid metadata (header) key '{key}': '{source}'")]
    InvalidMetadataKey {
        key: String,
        source: InvalidMetadataKey,
    },
    #[error("Invalid metadata (header) value for key '{key}': '{source}'")]
    InvalidMetadataValue {
        key: String,
        source: InvalidMetadataValue,
    },
}

/// A [`Transport`] performing unary gRPC calls with dynamic messages.
#[derive(Debug, Clone)]
pub struct GrpcTransport<S = Channel> {
    client: tonic::client::Grpc<S>,
    metadata: MetadataMap,
}

impl GrpcTransport<Channel> {
    /// Connects to a gRPC server.
    ///
    /// # Arguments
    ///
    /// * `addr` - The server URI (e.g., `http://localhost:8000`).
    pub async fn connect(addr: &str) -> Result<Self, ConnectError> {
        let endpoint = Endpoint::new(addr.to_string())
            .map_err(|e| ConnectError::InvalidUrl(addr.to_string(), e))?;

        let channel = endpoint
            .connect()
            .await
            .map_err(|e| ConnectError::ConnectionFailed(addr.to_string(), e))?;

        Ok(Self::new(channel))
    }

    /// Like [`GrpcTransport::connect`], but the connection is only established by the first
    /// call.
    pub fn connect_lazy(addr: &str) -> Result<Self, ConnectError> {
        let endpoint = Endpoint::new(addr.to_string())
            .map_err(|e| ConnectError::InvalidUrl(addr.to_string(), e))?;
        Ok(Self::new(endpoint.connect_lazy()))
    }
}

impl<S> GrpcTransport<S> {
    /// Creates a transport from an existing Tonic service/channel.
    pub fn new(service: S) -> Self {
        Self {
            client: tonic::client::Grpc::new(service),
            metadata: MetadataMap::new(),
        }
    }

    /// Attaches the given headers to every future call.
    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Result<Self, MetadataError> {
        for (k, v) in headers {
            let key =
                MetadataKey::from_str(&k).map_err(|source| MetadataError::InvalidMetadataKey {
                    key: k.clone(),
                    source,
                })?;
            let val = MetadataValue::from_str(&v)
                .map_err(|source| MetadataError::InvalidMetadataValue { key: k, source })?;
            self.metadata.insert(key, val);
        }
        Ok(self)
    }
}

impl<S> Transport for GrpcTransport<S>
where
    S: GrpcService<tonic::body::Body> + Clone + Send + Sync + 'static,
    S::Future: Send,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    async fn invoke(
        &self,
        path: &str,
        request: DynamicMessage,
        response: MessageDescriptor,
    ) -> Result<DynamicMessage, InvokeError> {
        // `ready` and `unary` need a mutable client.
        let mut client = self.client.clone();
        client
            .ready()
            .await
            .map_err(|e| InvokeError::ClientNotReady(e.into()))?;

        let path = http::uri::PathAndQuery::from_str(path)
            .map_err(|e| Status::invalid_argument(format!("Invalid method path '{path}': {e}")))?;

        let mut request = tonic::Request::new(request);
        *request.metadata_mut() = self.metadata.clone();

        let response = client
            .unary(request, path, DynamicCodec::new(response))
            .await?;

        Ok(response.into_inner())
    }
}
