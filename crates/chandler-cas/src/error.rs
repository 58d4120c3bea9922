//! Error types for content addressing operations.

/// Errors that can occur during CAS operations.
#[derive(Debug, thiserror::Error)]
pub enum CasError {
    /// The input stream failed while being chunked.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored manifest is not a whole number of digest records.
    #[error("corrupt manifest: length {len} is not a multiple of {width}")]
    CorruptManifest {
        /// Length of the stored manifest in bytes.
        len: usize,
        /// Width of a single digest record.
        width: usize,
    },

    /// The polynomial cannot drive the rolling hash.
    #[error("polynomial {polynomial:#x} has degree {degree}, expected {min}..={max}")]
    UnusablePolynomial {
        /// Raw polynomial value.
        polynomial: u64,
        /// Its degree (-1 for the zero polynomial).
        degree: i32,
        /// Smallest accepted degree.
        min: i32,
        /// Largest accepted degree.
        max: i32,
    },

    /// Random search did not hit an irreducible polynomial.
    #[error("no irreducible polynomial found after {tries} tries")]
    NoIrreduciblePolynomial {
        /// Number of candidates tested.
        tries: usize,
    },

    /// Chunker size parameters are inconsistent.
    #[error("invalid chunker config: {0}")]
    InvalidConfig(String),
}
