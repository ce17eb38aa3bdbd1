//! Chained SHA-512 conditioning of filled blocks.
//!
//! All post-processing of source bytes lives here. The pipeline hands every
//! filled [`Block`] to [`condition`] together with the run's [`ChainState`];
//! nothing else in the crate hashes or whitens data.
//!
//! # Construction
//!
//! ```text
//! input  = block || le64(chain[0]) || ... || le64(chain[7])
//! chain' = be64-words(SHA-512(input))
//! output = le64(chain'[0]) || ... || le64(chain'[7])      (64 bytes)
//! ```
//!
//! The chain starts at the SHA-512 initial hash value and is never reset for
//! the lifetime of a pipeline, so each output depends on every block that came
//! before it.

use sha2::{Digest, Sha512};

use crate::block::Block;

/// Number of 64-bit words in the chain state.
pub const CHAIN_WORDS: usize = 8;

/// Size of one serialized chain word.
pub const WORD_SIZE: usize = std::mem::size_of::<u64>();

/// Size of a conditioned output record.
pub const DIGEST_SIZE: usize = CHAIN_WORDS * WORD_SIZE;

/// SHA-512 initial hash value (FIPS 180-4, 5.3.5).
pub const SHA512_IV: [u64; CHAIN_WORDS] = [
    0x6A09E667F3BCC908,
    0xBB67AE8584CAA73B,
    0x3C6EF372FE94F82B,
    0xA54FF53A5F1D36F1,
    0x510E527FADE682D1,
    0x9B05688C2B3E6C1F,
    0x1F83D9ABFB41BD6B,
    0x5BE0CD19137E2179,
];

/// Conditioning mode for delivered output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConditioningMode {
    /// Fold every block into the SHA-512 chain and emit the new chain (default).
    #[default]
    Sha512,
    /// Forward blocks unchanged. Diagnostics only.
    Transparent,
}

impl std::fmt::Display for ConditioningMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sha512 => write!(f, "sha512"),
            Self::Transparent => write!(f, "transparent"),
        }
    }
}

/// Running digest state carried from block to block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainState {
    words: [u64; CHAIN_WORDS],
}

impl Default for ChainState {
    fn default() -> Self {
        Self { words: SHA512_IV }
    }
}

impl ChainState {
    /// Chain at the SHA-512 initial hash value.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_words(words: [u64; CHAIN_WORDS]) -> Self {
        Self { words }
    }

    pub fn words(&self) -> &[u64; CHAIN_WORDS] {
        &self.words
    }

    /// Words serialized in order, little-endian.
    pub fn to_bytes(&self) -> [u8; DIGEST_SIZE] {
        let mut out = [0u8; DIGEST_SIZE];
        for (dst, word) in out.chunks_exact_mut(WORD_SIZE).zip(self.words.iter()) {
            dst.copy_from_slice(&word.to_le_bytes());
        }
        out
    }

    /// Fold `block` into the chain.
    fn absorb(&mut self, block: &[u8]) {
        let mut input = Vec::with_capacity(block.len() + DIGEST_SIZE);
        input.extend_from_slice(block);
        input.extend_from_slice(&self.to_bytes());

        let digest = Sha512::digest(&input);
        for (word, bytes) in self.words.iter_mut().zip(digest.chunks_exact(WORD_SIZE)) {
            let mut be = [0u8; WORD_SIZE];
            be.copy_from_slice(bytes);
            *word = u64::from_be_bytes(be);
        }
    }
}

/// Result of conditioning one block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    /// Updated chain, delivered as eight fixed-width word records.
    Digest([u64; CHAIN_WORDS]),
    /// The block itself, delivered in one write.
    Raw(Block),
}

impl Output {
    /// Bytes exactly as they are delivered to the sink.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Digest(words) => ChainState::from_words(*words).to_bytes().to_vec(),
            Self::Raw(block) => block.as_bytes().to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Digest(_) => DIGEST_SIZE,
            Self::Raw(block) => block.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Condition one filled block.
///
/// In [`ConditioningMode::Sha512`] the chain is advanced and its new value is
/// returned; the output is always [`DIGEST_SIZE`] bytes regardless of the
/// block size. In [`ConditioningMode::Transparent`] the block is returned as
/// is and the chain is not touched.
pub fn condition(chain: &mut ChainState, block: Block, mode: ConditioningMode) -> Output {
    match mode {
        ConditioningMode::Sha512 => {
            chain.absorb(block.as_bytes());
            Output::Digest(*chain.words())
        }
        ConditioningMode::Transparent => Output::Raw(block),
    }
}
