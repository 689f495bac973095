//! Payload Codec Module
//!
//! Serialization boundary between live values and the strings held by cache
//! entries. Every read decodes a fresh value, so callers never share state
//! with the cache or with each other.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CodecError;

// == Payload Codec ==
/// Encodes values to their stored string form and back.
pub trait PayloadCodec: Send + Sync + 'static {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, CodecError>;

    fn decode<T: DeserializeOwned>(&self, data: &str) -> Result<T, CodecError>;
}

// == JSON Codec ==
/// Default codec storing payloads as JSON text.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl PayloadCodec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, CodecError> {
        serde_json::to_string(value).map_err(CodecError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &str) -> Result<T, CodecError> {
        serde_json::from_str(data).map_err(CodecError::Decode)
    }
}
