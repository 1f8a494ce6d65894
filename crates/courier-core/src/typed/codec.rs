//! PayloadCodec - values to bytes and back.
//!
//! Payloads are JSON-shaped (`serde_json::Value`) and travel as CBOR.
//! `encode` / `decode` are the opaque pair shared with the worker side;
//! `PayloadCodec` adds the size check that decides whether encoding runs
//! inline or on the blocking pool.

use std::io;

use serde_json::Value;

use crate::config::CodecConfig;
use crate::domain::CodecError;

/// Encodes one value as CBOR.
pub fn encode(value: &Value) -> Result<Vec<u8>, CodecError> {
    let mut bytes = Vec::new();
    ciborium::into_writer(value, &mut bytes).map_err(|e| CodecError::Encode(e.to_string()))?;
    Ok(bytes)
}

/// Decodes exactly one value; leftover bytes are an error.
pub fn decode(bytes: &[u8]) -> Result<Value, CodecError> {
    let mut reader = bytes;
    let value: Value =
        ciborium::from_reader(&mut reader).map_err(|e| CodecError::Decode(e.to_string()))?;
    if !reader.is_empty() {
        return Err(CodecError::TrailingBytes {
            remaining: reader.len(),
        });
    }
    Ok(value)
}

#[derive(Debug, Clone, Default)]
pub struct PayloadCodec {
    config: CodecConfig,
}

impl PayloadCodec {
    pub fn new(config: CodecConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    pub fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        encode(value)
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        decode(bytes)
    }

    /// Whether the JSON rendering of `value` exceeds the threshold.
    /// Stops rendering as soon as the limit is crossed.
    pub fn is_large(&self, value: &Value) -> bool {
        let mut sink = LimitWriter {
            written: 0,
            limit: self.config.large_payload_threshold,
        };
        serde_json::to_writer(&mut sink, value).is_err()
    }

    /// Encodes on the blocking pool and hands the value back with its bytes.
    pub async fn encode_offloaded(&self, value: Value) -> Result<(Value, Vec<u8>), CodecError> {
        let (value, encoded) = tokio::task::spawn_blocking(move || {
            let encoded = encode(&value);
            (value, encoded)
        })
        .await
        .map_err(|e| CodecError::Join(e.to_string()))?;
        Ok((value, encoded?))
    }

    /// Small payloads inline, large ones offloaded. Same bytes either way.
    pub async fn encode_auto(&self, value: Value) -> Result<(Value, Vec<u8>), CodecError> {
        if self.is_large(&value) {
            tracing::debug!(
                threshold = self.config.large_payload_threshold,
                "encoding large payload off the async thread"
            );
            return self.encode_offloaded(value).await;
        }
        let encoded = encode(&value)?;
        Ok((value, encoded))
    }
}

struct LimitWriter {
    written: usize,
    limit: usize,
}

impl io::Write for LimitWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written += buf.len();
        if self.written > self.limit {
            return Err(io::Error::other("payload exceeds threshold"));
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
