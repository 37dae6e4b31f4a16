//! Fixed-width bitsets used as component masks.
//!
//! A [`Bitset`] is a plain array of unsigned machine words. Its width is fixed at
//! compile time (`WORDS * W::BITS`) so it can be copied around freely and stored
//! inline, one per entity. The entity manager uses it in two roles:
//!
//! - as the per-entity *archetype mask* (bit `i` set means the entity holds a
//!   component of slot `i`), and
//! - as the per-system *required mask* (bit `i` set means the system needs slot `i`).
//!
//! Indexing methods come in two flavors. [`Bitset::set`], [`Bitset::reset`] and
//! [`Bitset::bit_state`] panic on an out-of-range index and are meant for hot
//! paths where the caller has already range-checked. The `try_` variants never
//! panic and report whether the index was in range.

use std::fmt;
use std::hash::Hash;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Not};

// ---------------------------------------------------------------------------
// BitWord
// ---------------------------------------------------------------------------

/// An unsigned integer usable as the storage word of a [`Bitset`].
pub trait BitWord:
    Copy
    + Eq
    + Hash
    + fmt::Debug
    + Send
    + Sync
    + 'static
    + BitAnd<Output = Self>
    + BitOr<Output = Self>
    + Not<Output = Self>
    + BitAndAssign
    + BitOrAssign
{
    /// Number of bits in one word.
    const BITS: usize;
    /// The all-zero word.
    const ZERO: Self;

    /// A word with only bit `index` set. `index` must be below [`Self::BITS`].
    fn bit(index: usize) -> Self;

    /// Position of the lowest set bit.
    fn lowest_one(self) -> usize;

    /// `self` with its lowest set bit cleared.
    fn without_lowest_one(self) -> Self;

    /// Number of set bits.
    fn ones(self) -> usize;
}

macro_rules! impl_bit_word {
    ($($t:ty),* $(,)?) => {
        $(
            impl BitWord for $t {
                const BITS: usize = <$t>::BITS as usize;
                const ZERO: Self = 0;

                #[inline]
                fn bit(index: usize) -> Self {
                    (1 as $t) << index
                }

                #[inline]
                fn lowest_one(self) -> usize {
                    self.trailing_zeros() as usize
                }

                #[inline]
                fn without_lowest_one(self) -> Self {
                    self & self.wrapping_sub(1)
                }

                #[inline]
                fn ones(self) -> usize {
                    self.count_ones() as usize
                }
            }
        )*
    };
}

impl_bit_word!(u8, u16, u32, u64, u128, usize);

// ---------------------------------------------------------------------------
// Bitset
// ---------------------------------------------------------------------------

/// A fixed-width bit vector of `WORDS` words of type `W`.
///
/// Two bitsets of the same parameters are interchangeable values: `Copy`,
/// comparable word by word, with no shared ownership.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bitset<W: BitWord = u64, const WORDS: usize = 1> {
    words: [W; WORDS],
}

impl<W: BitWord, const WORDS: usize> Bitset<W, WORDS> {
    /// Total number of addressable bits.
    pub const BITS: usize = WORDS * W::BITS;

    /// An all-zero bitset.
    #[inline]
    pub fn new() -> Self {
        Self {
            words: [W::ZERO; WORDS],
        }
    }

    /// Build a bitset with the given positions set.
    ///
    /// Returns `None` if any position is out of range.
    pub fn from_indices<I>(indices: I) -> Option<Self>
    where
        I: IntoIterator<Item = usize>,
    {
        let mut bits = Self::new();
        for index in indices {
            if !bits.try_set(index) {
                return None;
            }
        }
        Some(bits)
    }

    #[inline]
    fn locate(index: usize) -> (usize, W) {
        (index / W::BITS, W::bit(index % W::BITS))
    }

    /// Set bit `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= Self::BITS`.
    #[inline]
    pub fn set(&mut self, index: usize) {
        assert!(
            index < Self::BITS,
            "bit index {index} out of range for a {}-bit set",
            Self::BITS
        );
        let (word, mask) = Self::locate(index);
        self.words[word] |= mask;
    }

    /// Set bit `index` if it is in range. Returns whether the bit was set.
    #[inline]
    pub fn try_set(&mut self, index: usize) -> bool {
        if index >= Self::BITS {
            return false;
        }
        self.set(index);
        true
    }

    /// Clear bit `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= Self::BITS`.
    #[inline]
    pub fn reset(&mut self, index: usize) {
        assert!(
            index < Self::BITS,
            "bit index {index} out of range for a {}-bit set",
            Self::BITS
        );
        let (word, mask) = Self::locate(index);
        self.words[word] &= !mask;
    }

    /// Clear bit `index` if it is in range. Returns whether the bit was cleared.
    #[inline]
    pub fn try_reset(&mut self, index: usize) -> bool {
        if index >= Self::BITS {
            return false;
        }
        self.reset(index);
        true
    }

    /// Clear every bit.
    #[inline]
    pub fn reset_all(&mut self) {
        self.words = [W::ZERO; WORDS];
    }

    /// State of bit `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= Self::BITS`.
    #[inline]
    pub fn bit_state(&self, index: usize) -> bool {
        assert!(
            index < Self::BITS,
            "bit index {index} out of range for a {}-bit set",
            Self::BITS
        );
        let (word, mask) = Self::locate(index);
        self.words[word] & mask != W::ZERO
    }

    /// State of bit `index`, or `None` if `index` is out of range.
    #[inline]
    pub fn try_bit_state(&self, index: usize) -> Option<bool> {
        (index < Self::BITS).then(|| self.bit_state(index))
    }

    /// Whether any bit is set in both `self` and `other`.
    ///
    /// Equivalent to `!(self & other).is_empty()` without building the result.
    #[inline]
    pub fn is_and_non_zero(&self, other: &Self) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .any(|(&a, &b)| a & b != W::ZERO)
    }

    /// Whether every bit set in `self` is also set in `other`.
    #[inline]
    pub fn is_subset_of(&self, other: &Self) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .all(|(&a, &b)| a & b == a)
    }

    /// Whether no bit is set.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == W::ZERO)
    }

    /// Number of set bits.
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.ones()).sum()
    }

    /// Positions of all set bits, ascending.
    pub fn ones(&self) -> Ones<W, WORDS> {
        Ones {
            words: self.words,
            word_index: 0,
            current: self.words.first().copied().unwrap_or(W::ZERO),
        }
    }

    /// Positions of all set bits collected into a vector, ascending.
    pub fn get_ones(&self) -> Vec<usize> {
        self.ones().collect()
    }
}

impl<W: BitWord, const WORDS: usize> Default for Bitset<W, WORDS> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: BitWord, const WORDS: usize> BitOrAssign for Bitset<W, WORDS> {
    fn bitor_assign(&mut self, rhs: Self) {
        for (a, b) in self.words.iter_mut().zip(rhs.words) {
            *a |= b;
        }
    }
}

impl<W: BitWord, const WORDS: usize> BitAndAssign for Bitset<W, WORDS> {
    fn bitand_assign(&mut self, rhs: Self) {
        for (a, b) in self.words.iter_mut().zip(rhs.words) {
            *a &= b;
        }
    }
}

impl<W: BitWord, const WORDS: usize> BitOr for Bitset<W, WORDS> {
    type Output = Self;

    fn bitor(mut self, rhs: Self) -> Self {
        self |= rhs;
        self
    }
}

impl<W: BitWord, const WORDS: usize> BitAnd for Bitset<W, WORDS> {
    type Output = Self;

    fn bitand(mut self, rhs: Self) -> Self {
        self &= rhs;
        self
    }
}

impl<W: BitWord, const WORDS: usize> fmt::Debug for Bitset<W, WORDS> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Bitset")?;
        f.debug_set().entries(self.ones()).finish()
    }
}

// ---------------------------------------------------------------------------
// Ones iterator
// ---------------------------------------------------------------------------

/// Iterator over the set positions of a [`Bitset`], ascending.
///
/// Holds a copy of the words, so the source bitset may be mutated while
/// iterating.
#[derive(Debug, Clone)]
pub struct Ones<W: BitWord, const WORDS: usize> {
    words: [W; WORDS],
    word_index: usize,
    current: W,
}

impl<W: BitWord, const WORDS: usize> Iterator for Ones<W, WORDS> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        loop {
            if self.current != W::ZERO {
                let bit = self.current.lowest_one();
                self.current = self.current.without_lowest_one();
                return Some(self.word_index * W::BITS + bit);
            }
            self.word_index += 1;
            if self.word_index >= WORDS {
                return None;
            }
            self.current = self.words[self.word_index];
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
