//! Schema records: the version byte, the chunker polynomial, and the chunk
//! size settings.
//!
//! All three are written once, together, when a store is first opened, and
//! read back on every later open.

use chandler_cas::Polynomial;
use chandler_types::ChunkerConfig;

use crate::error::StoreError;
use crate::keys::{CHUNKER_KEY, POLYNOMIAL_KEY, VERSION_KEY};
use crate::kv::{KvStore, WriteTx};

type Result<T> = std::result::Result<T, StoreError>;

/// Schema version this build reads and writes.
pub const SCHEMA_VERSION: u8 = 0;

fn decode_version(raw: &[u8]) -> Result<u8> {
    match raw {
        [v] => Ok(*v),
        _ => Err(StoreError::Corruption(format!(
            "version record is {} bytes, expected 1",
            raw.len()
        ))),
    }
}

fn decode_polynomial(raw: &[u8]) -> Result<Polynomial> {
    let bytes: [u8; 8] = raw.try_into().map_err(|_| {
        StoreError::Corruption(format!(
            "polynomial record is {} bytes, expected 8",
            raw.len()
        ))
    })?;
    Ok(Polynomial::from_le_bytes(bytes))
}

const CHUNKER_RECORD_LEN: usize = 20;

fn encode_chunker(config: &ChunkerConfig) -> Vec<u8> {
    let mut buf = Vec::with_capacity(CHUNKER_RECORD_LEN);
    buf.extend_from_slice(&(config.min_size as u64).to_le_bytes());
    buf.extend_from_slice(&(config.max_size as u64).to_le_bytes());
    buf.extend_from_slice(&config.average_bits.to_le_bytes());
    buf
}

fn decode_chunker(raw: &[u8]) -> Result<ChunkerConfig> {
    let corrupt = || {
        StoreError::Corruption(format!(
            "chunker record is {} bytes, expected {CHUNKER_RECORD_LEN}",
            raw.len()
        ))
    };
    if raw.len() != CHUNKER_RECORD_LEN {
        return Err(corrupt());
    }
    let min = u64::from_le_bytes(raw[0..8].try_into().map_err(|_| corrupt())?);
    let max = u64::from_le_bytes(raw[8..16].try_into().map_err(|_| corrupt())?);
    let bits = u32::from_le_bytes(raw[16..20].try_into().map_err(|_| corrupt())?);
    let size = |v: u64| {
        usize::try_from(v)
            .map_err(|_| StoreError::Corruption(format!("chunk size {v} does not fit usize")))
    };
    Ok(ChunkerConfig {
        min_size: size(min)?,
        max_size: size(max)?,
        average_bits: bits,
    })
}

impl KvStore {
    /// Committed schema version, if the store has been initialized.
    pub fn schema_version(&self) -> Result<Option<u8>> {
        self.get(VERSION_KEY)?
            .map(|raw| decode_version(&raw))
            .transpose()
    }

    /// Committed chunker polynomial, if any.
    pub fn stored_polynomial(&self) -> Result<Option<Polynomial>> {
        self.get(POLYNOMIAL_KEY)?
            .map(|raw| decode_polynomial(&raw))
            .transpose()
    }

    /// Committed chunk size settings, if any.
    pub fn stored_chunker(&self) -> Result<Option<ChunkerConfig>> {
        self.get(CHUNKER_KEY)?
            .map(|raw| decode_chunker(&raw))
            .transpose()
    }
}

impl WriteTx<'_> {
    /// Schema version as seen by this transaction.
    pub fn schema_version(&self) -> Result<Option<u8>> {
        self.get(VERSION_KEY)?
            .map(|raw| decode_version(&raw))
            .transpose()
    }

    /// Chunker polynomial as seen by this transaction.
    pub fn stored_polynomial(&self) -> Result<Option<Polynomial>> {
        self.get(POLYNOMIAL_KEY)?
            .map(|raw| decode_polynomial(&raw))
            .transpose()
    }

    pub fn set_schema_version(&mut self, version: u8) {
        self.insert(VERSION_KEY.to_vec(), vec![version]);
    }

    pub fn set_polynomial(&mut self, polynomial: Polynomial) {
        self.insert(POLYNOMIAL_KEY.to_vec(), polynomial.to_le_bytes().to_vec());
    }

    /// Chunk size settings as seen by this transaction.
    pub fn stored_chunker(&self) -> Result<Option<ChunkerConfig>> {
        self.get(CHUNKER_KEY)?
            .map(|raw| decode_chunker(&raw))
            .transpose()
    }

    pub fn set_chunker(&mut self, config: &ChunkerConfig) {
        self.insert(CHUNKER_KEY.to_vec(), encode_chunker(config));
    }
}
