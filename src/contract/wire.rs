//! Wire encodings for the contract messages
//!
//! - `Json`: field names preserved, digests as lowercase hex strings
//! - `Binary`: bincode, digests as raw length-prefixed bytes

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Supported encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    #[default]
    Json,
    Binary,
}

impl std::fmt::Display for WireFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WireFormat::Json => write!(f, "json"),
            WireFormat::Binary => write!(f, "binary"),
        }
    }
}

/// Encoding or decoding failure
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("binary codec error: {0}")]
    Binary(#[from] bincode::Error),
}

/// Encode a message
pub fn encode<T: Serialize>(value: &T, format: WireFormat) -> Result<Vec<u8>, WireError> {
    match format {
        WireFormat::Json => Ok(serde_json::to_vec(value)?),
        WireFormat::Binary => Ok(bincode::serialize(value)?),
    }
}

/// Decode a message
pub fn decode<T: DeserializeOwned>(bytes: &[u8], format: WireFormat) -> Result<T, WireError> {
    match format {
        WireFormat::Json => Ok(serde_json::from_slice(bytes)?),
        WireFormat::Binary => Ok(bincode::deserialize(bytes)?),
    }
}
