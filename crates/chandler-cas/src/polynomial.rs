//! Polynomials over GF(2) packed into a `u64`.
//!
//! Bit `i` is the coefficient of `x^i`, so addition is xor and
//! multiplication is carry-less. A store picks one random irreducible
//! polynomial of degree 53 at creation and drives every Rabin fingerprint
//! with it.

use std::fmt;
use std::ops::Add;

use rand::Rng;
use tracing::debug;

use crate::error::CasError;

/// Degree of the polynomials produced by [`Polynomial::random`].
pub const POLYNOMIAL_DEGREE: i32 = 53;

/// Candidates tried by [`Polynomial::random`] before giving up.
///
/// Roughly one in 53 degree-53 polynomials is irreducible.
pub const RANDOM_POLYNOMIAL_MAX_TRIES: usize = 1_000_000;

/// A polynomial over GF(2) of degree at most 63.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Polynomial(u64);

impl Polynomial {
    /// Wrap a raw coefficient bitmap.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw coefficient bitmap.
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Little-endian encoding used in the store.
    pub fn to_le_bytes(self) -> [u8; 8] {
        self.0.to_le_bytes()
    }

    /// Decode the little-endian store encoding.
    pub fn from_le_bytes(bytes: [u8; 8]) -> Self {
        Self(u64::from_le_bytes(bytes))
    }

    /// Degree of the polynomial, or -1 for the zero polynomial.
    pub fn degree(self) -> i32 {
        if self.0 == 0 {
            -1
        } else {
            63 - self.0.leading_zeros() as i32
        }
    }

    /// Carry-less product, or `None` if a coefficient above `x^63` would be set.
    pub fn checked_mul(self, other: Self) -> Option<Self> {
        if self.0 == 0 || other.0 == 0 {
            return Some(Self(0));
        }
        if self.degree() + other.degree() > 63 {
            return None;
        }

        let mut res = 0u64;
        for i in 0..=other.degree() {
            if other.0 & (1 << i) != 0 {
                res ^= self.0 << i;
            }
        }
        Some(Self(res))
    }

    /// Remainder of polynomial long division.
    ///
    /// # Panics
    ///
    /// Panics if `divisor` is zero.
    pub fn rem(self, divisor: Self) -> Self {
        self.div_rem(divisor).1
    }

    /// Quotient and remainder in one long division.
    ///
    /// # Panics
    ///
    /// Panics if `divisor` is zero.
    pub fn div_rem(self, divisor: Self) -> (Self, Self) {
        assert!(divisor.0 != 0, "division by the zero polynomial");

        let d = divisor.degree();
        let mut x = self;
        let mut q = 0u64;
        while x.degree() >= d {
            let shift = (x.degree() - d) as u32;
            q |= 1 << shift;
            x = x + Self(divisor.0 << shift);
        }
        (Self(q), x)
    }

    /// Greatest common divisor.
    pub fn gcd(self, other: Self) -> Self {
        let (mut a, mut b) = (self, other);
        while b.0 != 0 {
            let r = a.rem(b);
            a = b;
            b = r;
        }
        a
    }

    /// `self * f mod g` without intermediate overflow.
    ///
    /// `g` must have degree at most 62.
    pub fn mul_mod(self, f: Self, g: Self) -> Self {
        let mut a = self.rem(g);
        let mut f = f.0;
        let mut res = 0u64;
        while f != 0 {
            if f & 1 != 0 {
                res ^= a.0;
            }
            a = Self(a.0 << 1).rem(g);
            f >>= 1;
        }
        Self(res).rem(g)
    }

    /// Ben-Or irreducibility test.
    ///
    /// `self` is irreducible iff `gcd(self, x^(2^i) - x mod self) == 1` for
    /// every `1 <= i <= deg/2`.
    pub fn is_irreducible(self) -> bool {
        let deg = self.degree();
        if deg < 1 || deg > 62 {
            return false;
        }
        for i in 1..=deg / 2 {
            if self.gcd(qp(i as u32, self)) != Self(1) {
                return false;
            }
        }
        true
    }

    /// Draw a random irreducible polynomial of degree 53 from the thread RNG.
    pub fn random() -> Result<Self, CasError> {
        Self::random_with(&mut rand::rng())
    }

    /// Draw a random irreducible polynomial of degree 53 from `rng`.
    pub fn random_with<R: Rng + ?Sized>(rng: &mut R) -> Result<Self, CasError> {
        for tries in 1..=RANDOM_POLYNOMIAL_MAX_TRIES {
            // Keep bits 0..=53, then pin the top and constant terms so the
            // degree is exactly 53 and `x` is not a trivial factor.
            let mut f = rng.random::<u64>() & ((1 << 54) - 1);
            f |= (1 << POLYNOMIAL_DEGREE) | 1;
            let candidate = Self(f);
            if candidate.is_irreducible() {
                debug!(polynomial = %candidate, tries, "found irreducible polynomial");
                return Ok(candidate);
            }
        }
        Err(CasError::NoIrreduciblePolynomial {
            tries: RANDOM_POLYNOMIAL_MAX_TRIES,
        })
    }
}

/// `x^(2^p) - x mod g`.
fn qp(p: u32, g: Polynomial) -> Polynomial {
    let mut res = Polynomial(2);
    for _ in 0..p {
        res = res.mul_mod(res, g);
    }
    (res + Polynomial(2)).rem(g)
}

impl Add for Polynomial {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 ^ rhs.0)
    }
}

impl From<u64> for Polynomial {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for Polynomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl fmt::Debug for Polynomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Polynomial({:#x})", self.0)
    }
}
