//! Content identifiers using BLAKE3
//!
//! A block is named by the hash of its encoded bytes, so the same block
//! always has the same identifier no matter which peer serves it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ContentIdError {
    #[error("content id must be 64 hex characters, got {0}")]
    InvalidLength(usize),
    #[error("content id is not valid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

/// A content-addressed block identifier
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentId(pub [u8; 32]);

impl ContentId {
    /// Compute the ContentId for given block bytes
    pub fn from_data(data: &[u8]) -> Self {
        let hash = blake3::hash(data);
        Self(*hash.as_bytes())
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string
    pub fn from_hex(s: &str) -> Result<Self, ContentIdError> {
        let s = s.trim();
        if s.len() != 64 {
            return Err(ContentIdError::InvalidLength(s.len()));
        }
        let mut arr = [0u8; 32];
        hex::decode_to_slice(s, &mut arr)?;
        Ok(Self(arr))
    }
}

impl FromStr for ContentId {
    type Err = ContentIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentId({}...)", &self.to_hex()[..8])
    }
}

/// Verify that block bytes match their claimed ContentId
pub fn verify_block(id: &ContentId, data: &[u8]) -> bool {
    ContentId::from_data(data) == *id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_content_same_id() {
        let id1 = ContentId::from_data(b"test data");
        let id2 = ContentId::from_data(b"test data");
        assert_eq!(id1, id2);
    }

    #[test]
    fn test_different_content_different_id() {
        let id1 = ContentId::from_data(b"data1");
        let id2 = ContentId::from_data(b"data2");
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_parse_display_form() {
        let id = ContentId::from_data(b"test");
        let parsed: ContentId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_rejects_malformed_ids() {
        assert_eq!(
            "abc".parse::<ContentId>(),
            Err(ContentIdError::InvalidLength(3))
        );
        let not_hex = "z".repeat(64);
        assert!(matches!(
            not_hex.parse::<ContentId>(),
            Err(ContentIdError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_hex_error_carries_position() {
        let mut id = ContentId::from_data(b"block").to_hex();
        id.replace_range(10..11, "g");
        assert_eq!(
            id.parse::<ContentId>(),
            Err(ContentIdError::InvalidHex(hex::FromHexError::InvalidHexCharacter {
                c: 'g',
                index: 10
            }))
        );
    }

    #[test]
    fn test_verify_block() {
        let id = ContentId::from_data(b"block");
        assert!(verify_block(&id, b"block"));
        assert!(!verify_block(&id, b"other"));
    }
}
