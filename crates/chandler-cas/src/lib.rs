//! Content addressing, chunking, and manifest encoding.
//!
//! This crate provides:
//! - [`Polynomial`]: GF(2) arithmetic and random irreducible polynomials.
//! - [`ChunkerParams`] / [`Chunker`]: Rabin content-defined chunking over any
//!   [`std::io::Read`], each chunk identified by its BLAKE3 hash.
//! - [`Manifest`]: the ordered chunk list of a blob and its flat encoding.

mod chunker;
mod error;
mod manifest;
mod polynomial;

pub use chunker::{
    Chunk, Chunker, ChunkerParams, MAX_POLYNOMIAL_DEGREE, MIN_POLYNOMIAL_DEGREE, READ_BUF_SIZE,
    validate_config,
};
pub use error::CasError;
pub use manifest::Manifest;
pub use polynomial::{POLYNOMIAL_DEGREE, Polynomial, RANDOM_POLYNOMIAL_MAX_TRIES};
