//! # DynamicMessage <-> Protobuf Codec
//!
//! This module implements `tonic::codec::Codec` to enable `tonic` to transport
//! `prost_reflect::DynamicMessage` directly, bypassing the need for generated Rust structs.
//!
//! 1. **Encoder**: writes the already built request message as raw Protobuf bytes.
//! 2. **Decoder**: merges the bytes read from the wire into an empty message of the
//!    response type.
use prost::Message;
use prost_reflect::{DynamicMessage, MessageDescriptor};
use tonic::{
    Status,
    codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder},
};

/// A custom Codec for dynamic messages.
///
/// The request carries its own descriptor, so only the schema of the response needs to be
/// known up front.
pub struct DynamicCodec {
    /// Schema for the output message.
    res_desc: MessageDescriptor,
}

impl DynamicCodec {
    pub fn new(res_desc: MessageDescriptor) -> Self {
        Self { res_desc }
    }
}

impl Codec for DynamicCodec {
    type Encode = DynamicMessage;
    type Decode = DynamicMessage;

    type Encoder = DynamicEncoder;
    type Decoder = DynamicDecoder;

    fn encoder(&mut self) -> Self::Encoder {
        DynamicEncoder
    }

    fn decoder(&mut self) -> Self::Decoder {
        DynamicDecoder(self.res_desc.clone())
    }
}

/// Responsible for encoding a dynamic message into Protobuf bytes.
pub struct DynamicEncoder;

impl Encoder for DynamicEncoder {
    type Item = DynamicMessage;
    type Error = Status;

    fn encode(&mut self, item: Self::Item, dst: &mut EncodeBuf<'_>) -> Result<(), Self::Error> {
        item.encode_raw(dst);
        Ok(())
    }
}

/// Responsible for decoding Protobuf bytes into a dynamic message.
pub struct DynamicDecoder(MessageDescriptor);

impl Decoder for DynamicDecoder {
    type Item = DynamicMessage;
    type Error = Status;

    fn decode(&mut self, src: &mut DecodeBuf<'_>) -> Result<Option<Self::Item>, Self::Error> {
        let mut msg = DynamicMessage::new(self.0.clone());
        msg.merge(src).map_err(|e| {
            Status::internal(format!(
                "Failed to decode Protobuf bytes as '{}': {}",
                self.0.full_name(),
                e
            ))
        })?;
        Ok(Some(msg))
    }
}
