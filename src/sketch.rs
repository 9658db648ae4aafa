//! ## HyperLogLog sketch
//! Fixed-size, mergeable sketch estimating the number of distinct values added to it.
//!
//! The sketch is defined by its precision `P` in `[4..16]` range and holds `M = 2^P`
//! byte-wide registers. Each register stores the maximum rank observed for its bucket.
//!
//! Hashing:
//! - values are hashed with 32-bit MurmurHash3 (seed 0)
//! - top `P` bits of the hash select the register index
//! - rank is the 1-indexed position of the first set bit among the remaining `32 - P` bits,
//!   capped at `32 - P + 1` when those bits are all zero
//!
//! Registers never decrease: `add` and `merge` only ever raise them.
//!
//! Serialized form is the register array itself, exactly `M` bytes.
//!
//! [Original HyperLogLog paper](https://algo.inria.fr/flajolet/Publications/FlFuGaMe07.pdf)

use std::fmt::{Debug, Formatter};
use std::mem::{size_of, size_of_val};

use crate::error::SketchError;

/// Precision used when none is configured explicitly
pub const DEFAULT_PRECISION: u8 = 14;
/// Smallest supported precision
pub const MIN_PRECISION: u8 = 4;
/// Largest supported precision
pub const MAX_PRECISION: u8 = 16;

/// Size of the 32-bit hash space used by the large range correction.
const HASH_SPACE: f64 = 4_294_967_296.0;

/// HyperLogLog sketch with byte-wide registers
#[derive(Clone, PartialEq, Eq)]
pub struct Sketch {
    precision: u8,
    registers: Box<[u8]>,
}

impl Sketch {
    /// Creates new empty sketch with all registers set to zero
    pub fn new(precision: u8) -> Result<Self, SketchError> {
        let m = register_count(precision)?;
        Ok(Self {
            precision,
            registers: vec![0u8; m].into_boxed_slice(),
        })
    }

    /// Restores sketch from its serialized register array
    pub fn from_bytes(precision: u8, bytes: &[u8]) -> Result<Self, SketchError> {
        let m = register_count(precision)?;
        if bytes.len() != m {
            return Err(SketchError::InvalidBlobLength {
                precision,
                expected: m,
                actual: bytes.len(),
            });
        }
        Ok(Self {
            precision,
            registers: bytes.into(),
        })
    }

    /// Return sketch precision
    #[inline]
    pub fn precision(&self) -> u8 {
        self.precision
    }

    /// Return register array
    #[inline]
    pub fn registers(&self) -> &[u8] {
        &self.registers
    }

    /// Return whether no value was ever added or merged into the sketch
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.registers.iter().all(|&r| r == 0)
    }

    /// Add value into the sketch
    #[inline]
    pub fn add<T: AsRef<[u8]> + ?Sized>(&mut self, value: &T) {
        self.add_hash(hash_value(value.as_ref()));
    }

    /// Add precomputed 32-bit hash into the sketch
    #[inline]
    pub fn add_hash(&mut self, hash: u32) {
        let (idx, rank) = self.decode_hash(hash);
        // `idx` is `hash >> (32 - P)` and always below `M`
        let register = &mut self.registers[idx];
        if rank > *register {
            *register = rank;
        }
    }

    /// Return register index and rank for given hash
    #[inline]
    fn decode_hash(&self, hash: u32) -> (usize, u8) {
        let p = u32::from(self.precision);
        let idx = (hash >> (32 - p)) as usize;
        let w = hash & ((1u32 << (32 - p)) - 1);
        // `w` occupies the low `32 - P` bits, so it has at least `P` leading zeros.
        // An all-zero remainder yields `32 - P + 1` without looking at further bits.
        let rank = w.leading_zeros() - p + 1;
        (idx, rank as u8)
    }

    /// Merge `rhs` registers into `self`
    pub fn merge(&mut self, rhs: &Sketch) -> Result<(), SketchError> {
        if self.precision != rhs.precision {
            return Err(SketchError::PrecisionMismatch {
                expected: self.precision,
                actual: rhs.precision,
            });
        }
        self.registers
            .iter_mut()
            .zip(rhs.registers.iter())
            .for_each(|(lhs, &rhs)| *lhs = (*lhs).max(rhs));
        Ok(())
    }

    /// Return cardinality estimate
    pub fn estimate(&self) -> u64 {
        let m = self.registers.len() as f64;
        let (sum, zeros) = self
            .registers
            .iter()
            .fold((0.0f64, 0usize), |(sum, zeros), &r| {
                (sum + (-f64::from(r)).exp2(), zeros + usize::from(r == 0))
            });

        let mut estimate = alpha(self.registers.len()) * m * m / sum;
        if estimate <= 2.5 * m {
            // linear counting for small cardinalities
            if zeros > 0 {
                estimate = m * (m / zeros as f64).ln();
            }
        } else if estimate > HASH_SPACE / 30.0 && estimate < HASH_SPACE {
            estimate = -HASH_SPACE * (1.0 - estimate / HASH_SPACE).ln();
        }

        estimate.round().max(0.0) as u64
    }

    /// Return serialized register array
    #[inline]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.registers.to_vec()
    }

    /// Return serialized register array without copying
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.registers
    }

    /// Return memory size of the sketch
    #[inline]
    pub fn size_of(&self) -> usize {
        size_of::<Self>() + size_of_val(&*self.registers)
    }
}

impl Debug for Sketch {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{ precision: {}, estimate: {}, size: {} }}",
            self.precision,
            self.estimate(),
            self.size_of()
        )
    }
}

/// Return number of registers `2^precision`, validating precision range
#[inline]
pub fn register_count(precision: u8) -> Result<usize, SketchError> {
    if !(MIN_PRECISION..=MAX_PRECISION).contains(&precision) {
        return Err(SketchError::InvalidPrecision(precision));
    }
    Ok(1 << precision)
}

/// Hash value with 32-bit MurmurHash3, seed 0
#[inline]
pub fn hash_value(value: &[u8]) -> u32 {
    let mut source = value;
    // reading from an in-memory slice cannot fail
    murmur3::murmur3_32(&mut source, 0).unwrap_or_default()
}

/// Parameter for bias correction
#[inline]
fn alpha(m: usize) -> f64 {
    match m {
        16 => 0.673,
        32 => 0.697,
        64 => 0.709,
        _ => 0.7213 / (1.0 + 1.079 / (m as f64)),
    }
}
