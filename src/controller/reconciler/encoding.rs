//! # Payload Encoding
//!
//! Decides how the configuration document is stored in the ConfigMap:
//! documents up to 2.5 MiB are stored as plain JSON under `decofile.json`;
//! anything larger is Brotli-compressed at best quality and stored base64
//! encoded under `decofile.bin`.

use std::collections::BTreeMap;

use base64::Engine as _;
use tracing::info;

use crate::constants::{COMPRESSION_THRESHOLD, CONTENT_KEY_BIN, CONTENT_KEY_JSON};

use super::types::ReconcileError;

/// The ConfigMap key variant holding the document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKey {
    /// Plain JSON under `decofile.json`
    Json,
    /// base64(brotli(json)) under `decofile.bin`
    Bin,
}

impl ContentKey {
    /// The ConfigMap data key for this variant
    #[must_use]
    pub fn key(&self) -> &'static str {
        match self {
            ContentKey::Json => CONTENT_KEY_JSON,
            ContentKey::Bin => CONTENT_KEY_BIN,
        }
    }

    /// File extension consumers see under the mount directory
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            ContentKey::Json => "json",
            ContentKey::Bin => "bin",
        }
    }

    /// Detect which variant an existing ConfigMap uses
    #[must_use]
    pub fn from_data(data: &BTreeMap<String, String>) -> ContentKey {
        if data.contains_key(CONTENT_KEY_BIN) {
            ContentKey::Bin
        } else {
            ContentKey::Json
        }
    }
}

/// Encode the document for ConfigMap storage, compressing above the
/// threshold. Returns the selected key variant and the stored string.
pub fn encode_document(json: &str) -> Result<(ContentKey, String), ReconcileError> {
    if json.len() <= COMPRESSION_THRESHOLD {
        return Ok((ContentKey::Json, json.to_string()));
    }

    let compressed = compress_brotli(json.as_bytes())?;
    let ratio = compressed.len() as f64 / json.len() as f64 * 100.0;
    info!(
        original_size = json.len(),
        compressed_size = compressed.len(),
        "Compressed large document ({ratio:.1}% of original)"
    );

    let encoded = base64::engine::general_purpose::STANDARD.encode(&compressed);
    Ok((ContentKey::Bin, encoded))
}

fn compress_brotli(input: &[u8]) -> Result<Vec<u8>, ReconcileError> {
    let params = brotli::enc::BrotliEncoderParams {
        quality: 11,
        lgwin: 22,
        ..Default::default()
    };
    let mut reader = input;
    let mut output = Vec::new();
    brotli::BrotliCompress(&mut reader, &mut output, &params)
        .map_err(|e| ReconcileError::Encoding(format!("brotli compression failed: {e}")))?;
    Ok(output)
}

#[cfg(test)]
pub(crate) fn decode_document(encoded: &str) -> Vec<u8> {
    let compressed = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .expect("stored payload is valid base64");
    let mut reader = compressed.as_slice();
    let mut output = Vec::new();
    brotli::BrotliDecompress(&mut reader, &mut output).expect("stored payload is valid brotli");
    output
}
