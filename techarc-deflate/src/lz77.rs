//! LZ77 match finding.
//!
//! Greedy parsing over a 32 KiB sliding window. Candidate positions are kept
//! in hash chains keyed on the next three bytes and visited from most to
//! least recent, and only a strictly longer match replaces the current best,
//! so among equal-length matches the smallest distance wins.

/// Maximum window size (32KB).
pub const WINDOW_SIZE: usize = 32768;

/// Minimum match length.
pub const MIN_MATCH: usize = 3;

/// Maximum match length.
pub const MAX_MATCH: usize = 258;

const HASH_BITS: u32 = 15;
const HASH_SIZE: usize = 1 << HASH_BITS;
const WINDOW_MASK: usize = WINDOW_SIZE - 1;
const NIL: usize = usize::MAX;

/// A token produced by LZ77 parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lz77Token {
    /// A literal byte.
    Literal(u8),
    /// A back-reference to previously seen data.
    Match {
        /// Number of bytes to copy (3-258).
        length: u16,
        /// Distance back into the window (1-32768).
        distance: u16,
    },
}

/// Match finder tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lz77Config {
    /// Maximum number of chain links followed per position.
    pub max_chain: usize,
}

impl Lz77Config {
    /// Short chains, fastest parsing.
    pub const FAST: Self = Self { max_chain: 16 };
    /// Balanced default.
    pub const DEFAULT: Self = Self { max_chain: 128 };
    /// Exhaustive search of the window.
    pub const BEST: Self = Self { max_chain: 4096 };
}

impl Default for Lz77Config {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Hash-chain match finder over a complete input buffer.
#[derive(Debug)]
pub struct Lz77Encoder<'a> {
    data: &'a [u8],
    /// Most recent position for each hash.
    head: Vec<usize>,
    /// Previous position with the same hash, indexed by `pos & WINDOW_MASK`.
    prev: Vec<usize>,
    config: Lz77Config,
}

impl<'a> Lz77Encoder<'a> {
    /// Create a match finder over `data`.
    pub fn new(data: &'a [u8], config: Lz77Config) -> Self {
        Self {
            data,
            head: vec![NIL; HASH_SIZE],
            prev: vec![NIL; WINDOW_SIZE],
            config,
        }
    }

    #[inline(always)]
    fn hash(b0: u8, b1: u8, b2: u8) -> usize {
        let key = (u32::from(b0) << 16) | (u32::from(b1) << 8) | u32::from(b2);
        (key.wrapping_mul(2654435761) >> (32 - HASH_BITS)) as usize
    }

    #[inline]
    fn insert(&mut self, pos: usize) {
        if pos + MIN_MATCH <= self.data.len() {
            let h = Self::hash(self.data[pos], self.data[pos + 1], self.data[pos + 2]);
            self.prev[pos & WINDOW_MASK] = self.head[h];
            self.head[h] = pos;
        }
    }

    /// Longest match for `pos` as `(length, distance)`.
    fn find_match(&self, pos: usize) -> Option<(usize, usize)> {
        let data = self.data;
        let max_len = MAX_MATCH.min(data.len() - pos);
        if max_len < MIN_MATCH {
            return None;
        }

        let h = Self::hash(data[pos], data[pos + 1], data[pos + 2]);
        let mut candidate = self.head[h];
        let mut best_len = MIN_MATCH - 1;
        let mut best_dist = 0;
        let mut chain = 0;

        while candidate != NIL && chain < self.config.max_chain {
            let distance = pos - candidate;
            if distance > WINDOW_SIZE {
                break;
            }

            if data[candidate + best_len] == data[pos + best_len] {
                let len = data[candidate..candidate + max_len]
                    .iter()
                    .zip(&data[pos..pos + max_len])
                    .take_while(|(a, b)| a == b)
                    .count();
                if len > best_len {
                    best_len = len;
                    best_dist = distance;
                    if len == max_len {
                        break;
                    }
                }
            }

            let next = self.prev[candidate & WINDOW_MASK];
            if next == NIL || next >= candidate {
                break;
            }
            candidate = next;
            chain += 1;
        }

        (best_len >= MIN_MATCH).then_some((best_len, best_dist))
    }

    /// Parse the whole input into tokens.
    pub fn tokenize(mut self) -> Vec<Lz77Token> {
        let data = self.data;
        let mut tokens = Vec::with_capacity(data.len() / 2);
        let mut pos = 0;

        while pos < data.len() {
            match self.find_match(pos) {
                Some((length, distance)) => {
                    tokens.push(Lz77Token::Match {
                        length: length as u16,
                        distance: distance as u16,
                    });
                    for p in pos..pos + length {
                        self.insert(p);
                    }
                    pos += length;
                }
                None => {
                    tokens.push(Lz77Token::Literal(data[pos]));
                    self.insert(pos);
                    pos += 1;
                }
            }
        }

        tokens
    }
}

/// Parse `data` into LZ77 tokens.
pub fn tokenize(data: &[u8], config: Lz77Config) -> Vec<Lz77Token> {
    Lz77Encoder::new(data, config).tokenize()
}

/// Expand tokens back into bytes (used by tests and benchmarks).
pub fn expand(tokens: &[Lz77Token]) -> Vec<u8> {
    let mut out = Vec::new();
    for token in tokens {
        match *token {
            Lz77Token::Literal(byte) => out.push(byte),
            Lz77Token::Match { length, distance } => {
                let start = out.len() - distance as usize;
                for i in 0..length as usize {
                    out.push(out[start + i]);
                }
            }
        }
    }
    out
}
