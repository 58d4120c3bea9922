//! Shared types and identifiers for Chandler.
//!
//! This crate defines the content-addressed identifiers used across the
//! workspace ([`ChunkId`], [`BlobId`]) and the chunking parameters
//! ([`ChunkerConfig`]) that every ingestion against a store must agree on.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Width in bytes of every digest (BLAKE3-256).
pub const DIGEST_LEN: usize = 32;

// ---------------------------------------------------------------------------
// ID types
// ---------------------------------------------------------------------------

/// Error returned when parsing an identifier from hex fails.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseIdError {
    /// The input is not 64 characters long.
    #[error("expected {expected} hex characters, got {found}")]
    Length {
        /// Required number of hex characters.
        expected: usize,
        /// Number of characters supplied.
        found: usize,
    },

    /// The input contains a non-hex character.
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
}

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
        pub struct $name([u8; DIGEST_LEN]);

        impl $name {
            /// Create an ID by hashing arbitrary data with BLAKE3.
            pub fn from_data(data: &[u8]) -> Self {
                Self(blake3::hash(data).into())
            }

            /// Return the raw 32-byte representation.
            pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
                &self.0
            }

            /// Whether every byte of the digest is zero.
            pub fn is_zero(&self) -> bool {
                self.0 == [0u8; DIGEST_LEN]
            }
        }

        impl From<[u8; DIGEST_LEN]> for $name {
            fn from(bytes: [u8; DIGEST_LEN]) -> Self {
                Self(bytes)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                for byte in &self.0 {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let s = s.trim();
                if s.len() != DIGEST_LEN * 2 {
                    return Err(ParseIdError::Length {
                        expected: DIGEST_LEN * 2,
                        found: s.len(),
                    });
                }
                let mut bytes = [0u8; DIGEST_LEN];
                hex::decode_to_slice(s, &mut bytes)?;
                Ok(Self(bytes))
            }
        }
    };
}

define_id!(
    /// Content-addressed identifier for a chunk: `blake3(chunk_data)`.
    ChunkId
);

define_id!(
    /// Content-addressed identifier for a whole stream, the "superhash":
    /// `blake3(chunk_id_0 ++ chunk_id_1 ++ ...)` in stream order.
    BlobId
);

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Default minimum chunk size (512 KiB).
pub const DEFAULT_MIN_SIZE: usize = 512 * 1024;

/// Default maximum chunk size (8 MiB).
pub const DEFAULT_MAX_SIZE: usize = 8 * 1024 * 1024;

/// Default number of fingerprint bits that must be zero at a cut point
/// (2^20, an average chunk of about 1 MiB).
pub const DEFAULT_AVERAGE_BITS: u32 = 20;

/// Size of the rolling-hash window in bytes.
pub const WINDOW_SIZE: usize = 64;

/// Content-defined chunking parameters.
///
/// Like the store polynomial, these are fixed for the lifetime of a store:
/// changing them shifts chunk boundaries and stops new data from
/// deduplicating against what is already stored. A store records the
/// values it was created with and refuses to open with different ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkerConfig {
    /// No cut point is considered before this many bytes.
    pub min_size: usize,
    /// A cut is forced once a chunk reaches this many bytes.
    pub max_size: usize,
    /// Number of low fingerprint bits that must be zero to cut.
    pub average_bits: u32,
}

impl ChunkerConfig {
    /// Mask applied to the fingerprint when looking for a cut point.
    pub fn split_mask(&self) -> u64 {
        (1u64 << self.average_bits) - 1
    }
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            min_size: DEFAULT_MIN_SIZE,
            max_size: DEFAULT_MAX_SIZE,
            average_bits: DEFAULT_AVERAGE_BITS,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_id_from_data_deterministic() {
        let id1 = ChunkId::from_data(b"hello world");
        let id2 = ChunkId::from_data(b"hello world");
        assert_eq!(id1, id2, "same data must produce same ChunkId");
    }

    #[test]
    fn test_chunk_id_different_data_different_id() {
        let id1 = ChunkId::from_data(b"hello");
        let id2 = ChunkId::from_data(b"world");
        assert_ne!(id1, id2, "different data must produce different ChunkId");
    }

    #[test]
    fn test_blob_id_matches_blake3() {
        let id = BlobId::from_data(b"digests");
        assert_eq!(id.as_bytes(), blake3::hash(b"digests").as_bytes());
    }

    #[test]
    fn test_id_from_bytes() {
        let bytes = [42u8; 32];
        let id = ChunkId::from(bytes);
        assert_eq!(id.as_bytes(), &bytes);
    }

    #[test]
    fn test_is_zero() {
        assert!(BlobId::from([0u8; 32]).is_zero());
        assert!(!BlobId::from_data(b"").is_zero());
    }

    #[test]
    fn test_display_outputs_hex() {
        let bytes = [
            0x0a, 0x1b, 0x2c, 0x3d, 0x4e, 0x5f, 0x60, 0x71, 0x82, 0x93, 0xa4, 0xb5, 0xc6, 0xd7,
            0xe8, 0xf9, 0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb,
            0xcc, 0xdd, 0xee, 0xff,
        ];
        let id = BlobId::from(bytes);
        let hex = id.to_string();
        assert_eq!(
            hex,
            "0a1b2c3d4e5f60718293a4b5c6d7e8f900112233445566778899aabbccddeeff"
        );
        assert_eq!(hex.len(), 64);
    }

    #[test]
    fn test_parse_display_roundtrip() {
        let id = BlobId::from_data(b"we out here!");
        let parsed: BlobId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);

        let upper: BlobId = id.to_string().to_uppercase().parse().unwrap();
        assert_eq!(upper, id);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        let err = "abcd".parse::<ChunkId>().unwrap_err();
        assert_eq!(
            err,
            ParseIdError::Length {
                expected: 64,
                found: 4
            }
        );

        let not_hex = "zz".repeat(32);
        assert!(matches!(
            not_hex.parse::<ChunkId>(),
            Err(ParseIdError::Hex(_))
        ));
    }

    #[test]
    fn test_debug_format() {
        let id = ChunkId::from([0u8; 32]);
        let debug = format!("{id:?}");
        assert!(debug.starts_with("ChunkId("));
        assert!(debug.ends_with(')'));
    }

    #[test]
    fn test_id_ordering() {
        let low = ChunkId::from([0u8; 32]);
        let high = ChunkId::from([0xffu8; 32]);
        assert!(low < high);
    }

    #[test]
    fn test_chunker_config_default() {
        let config = ChunkerConfig::default();
        assert_eq!(config.min_size, 524_288);
        assert_eq!(config.max_size, 8_388_608);
        assert_eq!(config.average_bits, 20);
        assert_eq!(config.split_mask(), 0x000f_ffff);
    }

    #[test]
    fn test_chunker_config_partial_toml() {
        let config: ChunkerConfig = toml::from_str("min_size = 4096").unwrap();
        assert_eq!(config.min_size, 4096);
        assert_eq!(config.max_size, DEFAULT_MAX_SIZE);
        assert_eq!(config.average_bits, DEFAULT_AVERAGE_BITS);
    }
}
