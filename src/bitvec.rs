//! Append-growable bit vector backing the block liveness bitmaps.
//!
//! Storage is packed into `u64` words; growth is geometric via `Vec`. Bits at
//! or beyond the logical length are always zero, which keeps population
//! counts cheap. Not thread safe — callers serialize access.
//!
//! The `serde` derive is the persistence hook: higher layers serialize the
//! used/valid bitmaps during checkpointing and hand them back on recovery;
//! this crate defines no on-disk layout of its own.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

const WORD_BITS: u64 = 64;

fn words_for(bits: u64) -> usize {
    ((bits + WORD_BITS - 1) / WORD_BITS) as usize
}

/// Word-packed bit array that grows on `set` and `append`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BitVec {
    words: Vec<u64>,
    len: u64,
}

impl BitVec {
    pub fn new() -> Self {
        BitVec::default()
    }

    /// Create with capacity reserved for `bits` bits (logical length stays 0).
    pub fn with_capacity(bits: u64) -> Self {
        BitVec {
            words: Vec::with_capacity(words_for(bits)),
            len: 0,
        }
    }

    /// Logical length in bits.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bit at `index`; out-of-range indices read as zero.
    pub fn get(&self, index: u64) -> bool {
        if index >= self.len {
            return false;
        }
        let word = self.words[(index / WORD_BITS) as usize];
        (word >> (index % WORD_BITS)) & 1 == 1
    }

    /// Set bit `index` to `flag`, extending the vector with zero bits if
    /// `index` is at or beyond the current length.
    pub fn set(&mut self, index: u64, flag: bool) {
        if index >= self.len {
            self.len = index + 1;
            let needed = words_for(self.len);
            if needed > self.words.len() {
                self.words.resize(needed, 0);
            }
        }
        let word = &mut self.words[(index / WORD_BITS) as usize];
        let mask = 1u64 << (index % WORD_BITS);
        if flag {
            *word |= mask;
        } else {
            *word &= !mask;
        }
    }

    /// Append one bit and return its index.
    pub fn append(&mut self, flag: bool) -> u64 {
        let index = self.len;
        self.set(index, flag);
        index
    }

    /// Grow capacity to hold `bits` bits without changing the logical length.
    pub fn reserve(&mut self, bits: u64) {
        let want = words_for(bits);
        if want > self.words.len() {
            self.words.reserve(want - self.words.len());
        }
    }

    /// Drop all bits; capacity is retained.
    pub fn clear(&mut self) {
        self.words.clear();
        self.len = 0;
    }

    /// Drop all bits and release the backing storage.
    pub fn reset(&mut self) {
        self.words = Vec::new();
        self.len = 0;
    }

    /// Number of one bits.
    pub fn count_ones(&self) -> u64 {
        // Bits beyond `len` are maintained as zero, so whole-word popcounts
        // are exact.
        self.words.iter().map(|w| u64::from(w.count_ones())).sum()
    }

    /// Number of zero bits within the logical length.
    pub fn count_zeros(&self) -> u64 {
        self.len - self.count_ones()
    }

    /// Hex word dump for diagnostics.
    pub fn dump_unit(&self) -> String {
        let mut out = format!("bits={}:", self.len);
        for word in self.words.iter().take(words_for(self.len)) {
            let _ = write!(out, " {word:016x}");
        }
        out
    }
}
