//! Content hashing.
//!
//! Wraps Blake3 with a 128-bit output. The digest travels on the wire as
//! 32 lowercase hex characters, both inside JSON payloads and as the fixed
//! header of a block response.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Digest length in bytes.
pub const DIGEST_LEN: usize = 16;

/// Digest length in hex characters.
pub const DIGEST_HEX_LEN: usize = DIGEST_LEN * 2;

/// A 128-bit content digest over a file's or block's full byte content.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash(pub [u8; DIGEST_LEN]);

impl ContentHash {
    /// Hash an in-memory byte slice.
    pub fn hash(data: &[u8]) -> Self {
        let mut hasher = ContentHasher::new();
        hasher.update(data);
        hasher.finalize()
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Convert to the 32-character hex form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from the 32-character hex form.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        if s.len() != DIGEST_HEX_LEN {
            return Err(CoreError::InvalidDigest(format!(
                "expected {} hex characters, got {}",
                DIGEST_HEX_LEN,
                s.len()
            )));
        }
        let mut arr = [0u8; DIGEST_LEN];
        hex::decode_to_slice(s, &mut arr).map_err(|e| CoreError::InvalidDigest(e.to_string()))?;
        Ok(Self(arr))
    }

    /// Parse the fixed-width ASCII header of a block response.
    pub fn from_hex_bytes(bytes: &[u8; DIGEST_HEX_LEN]) -> Result<Self, CoreError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| CoreError::InvalidDigest("digest header is not ASCII".into()))?;
        Self::from_hex(text)
    }

    /// The hex form as fixed-width ASCII bytes.
    pub fn to_hex_bytes(&self) -> [u8; DIGEST_HEX_LEN] {
        let mut out = [0u8; DIGEST_HEX_LEN];
        // Lengths are fixed, encoding cannot fail.
        let _ = hex::encode_to_slice(self.0, &mut out);
        out
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for ContentHash {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; DIGEST_LEN]> for ContentHash {
    fn from(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Incremental hasher for streaming file content.
#[derive(Clone, Default)]
pub struct ContentHasher {
    inner: blake3::Hasher,
}

impl ContentHasher {
    pub fn new() -> Self {
        Self {
            inner: blake3::Hasher::new(),
        }
    }

    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        self.inner.update(data);
        self
    }

    pub fn finalize(&self) -> ContentHash {
        let mut out = [0u8; DIGEST_LEN];
        self.inner.finalize_xof().fill(&mut out);
        ContentHash(out)
    }
}
