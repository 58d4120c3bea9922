//! Content-defined chunking with a Rabin fingerprint.
//!
//! A 64-byte window slides over the input while its fingerprint modulo the
//! store polynomial is kept up to date with two lookup tables. A chunk ends
//! where the low `average_bits` of the fingerprint are all zero, but never
//! before `min_size` bytes and always by `max_size` bytes.
//!
//! The first `min_size - 64` bytes of every chunk are skipped without
//! hashing, so a cut point depends only on the 64 bytes in front of it.
//! Identical runs of data therefore produce identical boundaries wherever
//! they appear in a stream.

use std::io::{self, Read};

use bytes::Bytes;
use chandler_types::{ChunkId, ChunkerConfig, WINDOW_SIZE};

use crate::error::CasError;
use crate::polynomial::Polynomial;

/// Size of the block the chunker reads from its source at a time.
pub const READ_BUF_SIZE: usize = 512 * 1024;

/// Lowest polynomial degree the fingerprint tables accept.
pub const MIN_POLYNOMIAL_DEGREE: i32 = 9;

/// Highest polynomial degree the fingerprint tables accept.
///
/// The fingerprint is shifted left by one byte before reduction and must
/// still fit in 64 bits.
pub const MAX_POLYNOMIAL_DEGREE: i32 = 56;

/// A single chunk of data with its content-addressed ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Content-addressed identifier: `blake3(data)`.
    pub id: ChunkId,
    /// Byte offset within the original stream.
    pub offset: u64,
    /// The chunk bytes, owned independently of the chunker's read buffer.
    pub data: Bytes,
}

/// Validate chunker size parameters.
pub fn validate_config(config: &ChunkerConfig) -> Result<(), CasError> {
    if config.min_size < WINDOW_SIZE {
        return Err(CasError::InvalidConfig(format!(
            "min_size {} is smaller than the {WINDOW_SIZE}-byte window",
            config.min_size
        )));
    }
    if config.max_size < config.min_size {
        return Err(CasError::InvalidConfig(format!(
            "max_size {} is smaller than min_size {}",
            config.max_size, config.min_size
        )));
    }
    if !(1..=31).contains(&config.average_bits) {
        return Err(CasError::InvalidConfig(format!(
            "average_bits {} is outside 1..=31",
            config.average_bits
        )));
    }
    Ok(())
}

/// Fingerprint tables and size limits derived from one polynomial.
///
/// Building the tables costs a few thousand polynomial reductions, so a
/// store builds them once and shares them across ingestions.
pub struct ChunkerParams {
    polynomial: Polynomial,
    pol_shift: u32,
    split_mask: u64,
    config: ChunkerConfig,
    /// Contribution of a byte leaving the window.
    out_table: Box<[u64; 256]>,
    /// Reduction applied when the top byte is shifted out.
    mod_table: Box<[u64; 256]>,
}

impl ChunkerParams {
    /// Build the tables for `polynomial` and check `config`.
    pub fn new(polynomial: Polynomial, config: ChunkerConfig) -> Result<Self, CasError> {
        let degree = polynomial.degree();
        if !(MIN_POLYNOMIAL_DEGREE..=MAX_POLYNOMIAL_DEGREE).contains(&degree) {
            return Err(CasError::UnusablePolynomial {
                polynomial: polynomial.value(),
                degree,
                min: MIN_POLYNOMIAL_DEGREE,
                max: MAX_POLYNOMIAL_DEGREE,
            });
        }
        validate_config(&config)?;

        let mut out_table = Box::new([0u64; 256]);
        let mut mod_table = Box::new([0u64; 256]);

        for b in 0..256u64 {
            let mut h = append_byte(Polynomial::new(0), b as u8, polynomial);
            for _ in 0..WINDOW_SIZE - 1 {
                h = append_byte(h, 0, polynomial);
            }
            out_table[b as usize] = h.value();

            let shifted = b << degree;
            mod_table[b as usize] = Polynomial::new(shifted).rem(polynomial).value() | shifted;
        }

        Ok(Self {
            polynomial,
            pol_shift: (degree - 8) as u32,
            split_mask: config.split_mask(),
            config,
            out_table,
            mod_table,
        })
    }

    /// The polynomial the tables were built from.
    pub fn polynomial(&self) -> Polynomial {
        self.polynomial
    }

    /// The size limits in effect.
    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Start chunking `reader`.
    pub fn chunker<R: Read>(&self, reader: R) -> Chunker<'_, R> {
        Chunker::new(reader, self)
    }

    /// Chunk an in-memory buffer in one go.
    pub fn chunk(&self, data: &[u8]) -> Vec<Chunk> {
        // Reading from a slice cannot fail.
        self.chunker(data).filter_map(Result::ok).collect()
    }

    fn update(&self, digest: u64, b: u8) -> u64 {
        let index = (digest >> self.pol_shift) as u8;
        ((digest << 8) | u64::from(b)) ^ self.mod_table[index as usize]
    }
}

fn append_byte(hash: Polynomial, b: u8, pol: Polynomial) -> Polynomial {
    Polynomial::new((hash.value() << 8) | u64::from(b)).rem(pol)
}

/// Lazy, single-pass chunk iterator over a byte source.
///
/// Yields `Err` once and then stops if the source fails. Empty input yields
/// no chunks; the last chunk may be shorter than `min_size`.
pub struct Chunker<'p, R> {
    params: &'p ChunkerParams,
    reader: R,

    buf: Vec<u8>,
    bpos: usize,
    bmax: usize,
    eof: bool,
    done: bool,

    window: [u8; WINDOW_SIZE],
    wpos: usize,
    digest: u64,

    /// Bytes of the current chunk collected so far.
    data: Vec<u8>,
    /// Offset of the current chunk within the stream.
    offset: u64,
    /// Bytes still to skip before hashing starts.
    pre: usize,
}

impl<'p, R: Read> Chunker<'p, R> {
    /// Create a chunker reading from `reader`.
    pub fn new(reader: R, params: &'p ChunkerParams) -> Self {
        let mut chunker = Self {
            params,
            reader,
            buf: vec![0u8; READ_BUF_SIZE],
            bpos: 0,
            bmax: 0,
            eof: false,
            done: false,
            window: [0u8; WINDOW_SIZE],
            wpos: 0,
            digest: 0,
            data: Vec::new(),
            offset: 0,
            pre: 0,
        };
        chunker.reset();
        chunker
    }

    fn reset(&mut self) {
        self.window = [0u8; WINDOW_SIZE];
        self.wpos = 0;
        self.digest = 0;
        self.slide(1);
        self.pre = self.params.config.min_size - WINDOW_SIZE;
    }

    fn slide(&mut self, b: u8) {
        let out = self.window[self.wpos];
        self.window[self.wpos] = b;
        self.digest ^= self.params.out_table[out as usize];
        self.wpos = (self.wpos + 1) % WINDOW_SIZE;
        self.digest = self.params.update(self.digest, b);
    }

    /// Fill the read buffer, retrying short reads until it is full or the
    /// source is exhausted.
    fn fill(&mut self) -> Result<usize, CasError> {
        let mut filled = 0;
        while filled < self.buf.len() {
            match self.reader.read(&mut self.buf[filled..]) {
                Ok(0) => {
                    self.eof = true;
                    break;
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(CasError::Io(e)),
            }
        }
        Ok(filled)
    }

    fn emit(&mut self) -> Chunk {
        let data = Bytes::from(std::mem::take(&mut self.data));
        let chunk = Chunk {
            id: ChunkId::from_data(&data),
            offset: self.offset,
            data,
        };
        self.offset += chunk.data.len() as u64;
        self.reset();
        chunk
    }

    /// Produce the next chunk, or `None` at end of stream.
    pub fn next_chunk(&mut self) -> Result<Option<Chunk>, CasError> {
        let min_size = self.params.config.min_size;
        let max_size = self.params.config.max_size;
        let split_mask = self.params.split_mask;

        loop {
            if self.bpos >= self.bmax {
                if self.eof {
                    if self.data.is_empty() {
                        return Ok(None);
                    }
                    return Ok(Some(self.emit()));
                }
                self.bmax = self.fill()?;
                self.bpos = 0;
                continue;
            }

            if self.pre > 0 {
                let avail = self.bmax - self.bpos;
                let take = self.pre.min(avail);
                self.data
                    .extend_from_slice(&self.buf[self.bpos..self.bpos + take]);
                self.bpos += take;
                self.pre -= take;
                if self.pre > 0 {
                    continue;
                }
            }

            let start = self.bpos;
            let mut count = self.data.len();
            let mut digest = self.digest;
            let mut wpos = self.wpos;

            for i in start..self.bmax {
                let b = self.buf[i];
                let out = self.window[wpos];
                self.window[wpos] = b;
                digest ^= self.params.out_table[out as usize];
                wpos = (wpos + 1) % WINDOW_SIZE;
                digest = self.params.update(digest, b);
                count += 1;

                if count < min_size {
                    continue;
                }
                if digest & split_mask == 0 || count >= max_size {
                    self.data.extend_from_slice(&self.buf[start..=i]);
                    self.bpos = i + 1;
                    return Ok(Some(self.emit()));
                }
            }

            self.digest = digest;
            self.wpos = wpos;
            self.data.extend_from_slice(&self.buf[start..self.bmax]);
            self.bpos = self.bmax;
        }
    }
}

impl<R: Read> Iterator for Chunker<'_, R> {
    type Item = Result<Chunk, CasError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_chunk() {
            Ok(Some(chunk)) => Some(Ok(chunk)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    const TEST_POLYNOMIAL: Polynomial = Polynomial::new(0x3DA3_358B_4DC1_73);

    fn small_config() -> ChunkerConfig {
        ChunkerConfig {
            min_size: 2 * 1024,
            max_size: 64 * 1024,
            average_bits: 13,
        }
    }

    fn small_params() -> ChunkerParams {
        ChunkerParams::new(TEST_POLYNOMIAL, small_config()).unwrap()
    }

    /// Deterministic, non-repeating test data.
    fn test_data(size: usize, seed: u32) -> Vec<u8> {
        let mut data = Vec::with_capacity(size);
        let mut state: u32 = 0xDEAD_BEEF ^ seed;
        for _ in 0..size {
            state = state.wrapping_mul(1103515245).wrapping_add(12345);
            data.push((state >> 16) as u8);
        }
        data
    }

    /// A reader that hands out at most `step` bytes per call.
    struct Trickle<'a> {
        data: &'a [u8],
        step: usize,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.step.min(buf.len()).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    /// A reader that fails after yielding `ok_bytes`.
    struct Failing {
        remaining: usize,
    }

    impl Read for Failing {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.remaining == 0 {
                return Err(io::Error::other("disk on fire"));
            }
            let n = self.remaining.min(buf.len());
            buf[..n].fill(0x5A);
            self.remaining -= n;
            Ok(n)
        }
    }

    #[test]
    fn test_empty_input_yields_no_chunks() {
        let params = small_params();
        let chunks = params.chunk(b"");
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_small_input_single_chunk() {
        let params = ChunkerParams::new(TEST_POLYNOMIAL, ChunkerConfig::default()).unwrap();
        let chunks = params.chunk(b"we out here!");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].data.as_ref(), b"we out here!");
        assert_eq!(chunks[0].offset, 0);
        assert_eq!(chunks[0].id, ChunkId::from_data(b"we out here!"));
    }

    #[test]
    fn test_chunks_cover_input_contiguously() {
        let params = small_params();
        let data = test_data(1_000_000, 1);
        let chunks = params.chunk(&data);

        assert!(chunks.len() > 1, "1MB should produce multiple chunks");

        let mut expected_offset = 0u64;
        let mut rebuilt = Vec::with_capacity(data.len());
        for chunk in &chunks {
            assert_eq!(chunk.offset, expected_offset);
            expected_offset += chunk.data.len() as u64;
            rebuilt.extend_from_slice(&chunk.data);
        }
        assert_eq!(rebuilt, data);
    }

    #[test]
    fn test_chunk_sizes_within_bounds() {
        let params = small_params();
        let config = small_config();
        let data = test_data(1_000_000, 2);
        let chunks = params.chunk(&data);

        for (i, chunk) in chunks.iter().enumerate() {
            let len = chunk.data.len();
            if i < chunks.len() - 1 {
                assert!(len >= config.min_size, "chunk {i} size {len} < min");
            }
            assert!(len <= config.max_size, "chunk {i} size {len} > max");
        }
    }

    #[test]
    fn test_zero_data_cuts_at_min_size() {
        // A window of zeros has a zero fingerprint, so runs of zeros cut as
        // early as allowed.
        let params = small_params();
        let min = small_config().min_size;
        let data = vec![0u8; min * 3 + 100];
        let chunks = params.chunk(&data);
        assert_eq!(chunks.len(), 4);
        for chunk in &chunks[..3] {
            assert_eq!(chunk.data.len(), min);
        }
        assert_eq!(chunks[3].data.len(), 100);
        assert_eq!(chunks[0].id, chunks[1].id);
    }

    #[test]
    fn test_forced_cut_at_max_size() {
        // With 31 mask bits a natural cut inside 62 KB is vanishingly rare.
        let config = ChunkerConfig {
            average_bits: 31,
            ..small_config()
        };
        let params = ChunkerParams::new(TEST_POLYNOMIAL, config).unwrap();
        let data = test_data(config.max_size * 2 + 10, 8);
        let chunks = params.chunk(&data);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].data.len(), config.max_size);
        assert_eq!(chunks[1].data.len(), config.max_size);
        assert_eq!(chunks[2].data.len(), 10);
    }

    #[test]
    fn test_deterministic() {
        let params = small_params();
        let data = test_data(300_000, 3);
        let a = params.chunk(&data);
        let b = params.chunk(&data);
        assert_eq!(a, b);
    }

    #[test]
    fn test_read_pattern_does_not_change_boundaries() {
        let params = small_params();
        let data = test_data(400_000, 4);

        let whole = params.chunk(&data);
        let trickled: Vec<Chunk> = params
            .chunker(Trickle {
                data: &data,
                step: 777,
            })
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(whole, trickled);
    }

    #[test]
    fn test_input_larger_than_read_buffer() {
        let params = small_params();
        let data = test_data(READ_BUF_SIZE * 2 + 12_345, 5);
        let chunks = params.chunk(&data);
        let total: usize = chunks.iter().map(|c| c.data.len()).sum();
        assert_eq!(total, data.len());
    }

    #[test]
    fn test_boundaries_resync_after_prefix_insert() {
        let params = small_params();
        let original = test_data(500_000, 6);
        let mut shifted = b"a few inserted bytes".to_vec();
        shifted.extend_from_slice(&original);

        let ids_a: HashSet<ChunkId> = params.chunk(&original).iter().map(|c| c.id).collect();
        let chunks_b = params.chunk(&shifted);
        let ids_b: HashSet<ChunkId> = chunks_b.iter().map(|c| c.id).collect();

        let shared = ids_a.intersection(&ids_b).count();
        let ratio = shared as f64 / ids_a.len() as f64;
        assert!(
            ratio > 0.80,
            "expected >80% chunk reuse, got {:.1}% ({shared}/{})",
            ratio * 100.0,
            ids_a.len()
        );
    }

    #[test]
    fn test_different_polynomials_cut_differently() {
        let other = Polynomial::new(0x11B << 45 | 0x11B);
        let data = test_data(500_000, 7);

        let a = small_params().chunk(&data);
        let b = ChunkerParams::new(other, small_config())
            .unwrap()
            .chunk(&data);

        let ids_a: Vec<ChunkId> = a.iter().map(|c| c.id).collect();
        let ids_b: Vec<ChunkId> = b.iter().map(|c| c.id).collect();
        assert_ne!(ids_a, ids_b);
    }

    #[test]
    fn test_read_error_is_reported_once() {
        let params = small_params();
        let mut chunker = params.chunker(Failing { remaining: 10_000 });

        let err = chunker.next().unwrap().unwrap_err();
        assert!(matches!(err, CasError::Io(_)));
        assert!(chunker.next().is_none());
    }

    #[test]
    fn test_rejects_unusable_polynomial() {
        let err = ChunkerParams::new(Polynomial::new(0b1011), small_config())
            .err()
            .unwrap();
        assert!(matches!(err, CasError::UnusablePolynomial { degree: 3, .. }));

        assert!(ChunkerParams::new(Polynomial::new(u64::MAX), small_config()).is_err());
    }

    #[test]
    fn test_validate_config() {
        assert!(validate_config(&ChunkerConfig::default()).is_ok());
        assert!(validate_config(&small_config()).is_ok());

        let too_small = ChunkerConfig {
            min_size: 32,
            ..small_config()
        };
        assert!(validate_config(&too_small).is_err());

        let inverted = ChunkerConfig {
            min_size: 8192,
            max_size: 4096,
            average_bits: 12,
        };
        assert!(validate_config(&inverted).is_err());

        let bits = ChunkerConfig {
            average_bits: 0,
            ..small_config()
        };
        assert!(validate_config(&bits).is_err());
    }
}
