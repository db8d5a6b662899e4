//! Cipher layer: block and stream primitives, chaining modes and the
//! uniform [`DFUCipher`] facade used by [`DFUClass`](crate::DFUClass).
//!
//! A primitive transforms exactly one block. [`BlockChain`] wraps a
//! [`BlockPrimitive`] with one of the [`ChainMode`]s and keeps the running
//! IV, [`StreamChain`] wraps a keystream generator. Both implement
//! [`DFUCipher`], which processes whole buffers.
//!
//! The chaining state is deterministic: it is re-seeded from the configured
//! nonce on every [`DFUCipher::reset()`], so a given plaintext, key and nonce
//! always produce the same ciphertext. Blocks must be processed in order.

use core::fmt;
use core::str::FromStr;

mod arc4;
mod blowfish;
mod chacha;
mod gost;
mod mode;
mod raiden;
mod rc5;
mod rc6;
mod registry;
mod rijndael;
mod rtea;
mod speck;
mod xtea;

pub use arc4::Arc4;
pub use blowfish::Blowfish;
pub use chacha::ChaCha20;
pub use gost::{Gost, Magma};
pub use mode::{BlockChain, NoCipher, StreamChain};
pub use raiden::Raiden;
pub use rc5::Rc5;
pub use rc6::Rc6;
pub use registry::{Cipher, CipherKind};
pub use rijndael::{Rijndael128, Rijndael192, Rijndael256};
pub use rtea::Rtea;
pub use speck::Speck;
pub use xtea::{Xtea, Xtea1};

/// Largest block size of any supported primitive, in bytes.
pub const MAX_BLOCK_SIZE: usize = 16;

/// Largest key size of any supported primitive, in bytes.
pub const MAX_KEY_SIZE: usize = 32;

/// Largest nonce accepted by any cipher, in bytes.
pub const MAX_NONCE_SIZE: usize = 16;

/// Errors reported by the cipher layer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CipherError {
    /// The key has an invalid size for the selected primitive
    InvalidKeySize,
    /// The nonce is shorter than the selected primitive and mode require
    InvalidNonceSize,
    /// The data length is not a multiple of the cipher block size
    UnalignedLength,
    /// Unknown cipher or mode name
    UnknownName,
}

impl fmt::Display for CipherError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CipherError::InvalidKeySize => "invalid key size",
            CipherError::InvalidNonceSize => "invalid nonce size",
            CipherError::UnalignedLength => "data length is not a multiple of the block size",
            CipherError::UnknownName => "unknown cipher or mode name",
        };
        f.write_str(s)
    }
}

/// A block cipher transforming one fixed-size block in place.
///
/// Implementations must be pure functions of the key: `decrypt_block`
/// is the exact inverse of `encrypt_block`.
pub trait BlockPrimitive: Sized {
    /// Human-readable name.
    const NAME: &'static str;
    /// Block size in bytes.
    const BLOCK_SIZE: usize;
    /// Key size in bytes.
    const KEY_SIZE: usize;

    /// Derive the round-key schedule. `key` is exactly [`KEY_SIZE`](BlockPrimitive::KEY_SIZE) bytes.
    fn new(key: &[u8]) -> Self;

    /// Encrypt one block of [`BLOCK_SIZE`](BlockPrimitive::BLOCK_SIZE) bytes.
    fn encrypt_block(&self, block: &mut [u8]);

    /// Decrypt one block of [`BLOCK_SIZE`](BlockPrimitive::BLOCK_SIZE) bytes.
    fn decrypt_block(&self, block: &mut [u8]);

    /// Like [`new()`](BlockPrimitive::new), but checks the key size.
    fn with_key(key: &[u8]) -> Result<Self, CipherError> {
        if key.len() != Self::KEY_SIZE {
            return Err(CipherError::InvalidKeySize);
        }
        Ok(Self::new(key))
    }
}

/// A keystream generator. Encryption and decryption are the same XOR.
pub trait StreamPrimitive: Sized {
    /// Human-readable name.
    const NAME: &'static str;
    /// Key size in bytes.
    const KEY_SIZE: usize;
    /// Nonce size in bytes, `0` if the primitive takes none.
    const NONCE_SIZE: usize;

    /// Set up the keystream. `key` and `nonce` have exactly the declared sizes.
    fn new(key: &[u8], nonce: &[u8]) -> Self;

    /// XOR the next `data.len()` keystream bytes into `data`.
    fn apply_keystream(&mut self, data: &mut [u8]);
}

/// Chaining mode applied to a block primitive.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChainMode {
    /// Electronic Codebook, stateless.
    Ecb,
    /// Cipher Block Chaining.
    Cbc,
    /// Propagating Cipher Block Chaining.
    Pcbc,
    /// Cipher Feedback.
    Cfb,
    /// Output Feedback.
    Ofb,
    /// Counter. Only the first little-endian 32-bit word of the IV counts,
    /// it wraps without carrying into the rest of the IV.
    Ctr,
}

impl ChainMode {
    /// All modes.
    pub const ALL: [ChainMode; 6] = [
        ChainMode::Ecb,
        ChainMode::Cbc,
        ChainMode::Pcbc,
        ChainMode::Cfb,
        ChainMode::Ofb,
        ChainMode::Ctr,
    ];

    /// Name used in cipher names, e.g. `CBC`.
    pub fn name(self) -> &'static str {
        match self {
            ChainMode::Ecb => "ECB",
            ChainMode::Cbc => "CBC",
            ChainMode::Pcbc => "PCBC",
            ChainMode::Cfb => "CFB",
            ChainMode::Ofb => "OFB",
            ChainMode::Ctr => "CTR",
        }
    }

    /// `false` for modes that never read the IV.
    pub fn uses_iv(self) -> bool {
        self != ChainMode::Ecb
    }
}

impl fmt::Display for ChainMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ChainMode {
    type Err = CipherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChainMode::ALL
            .iter()
            .copied()
            .find(|m| m.name().eq_ignore_ascii_case(s))
            .ok_or(CipherError::UnknownName)
    }
}

/// Display name of a cipher, `"<primitive>-<mode>"`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CipherName {
    /// Primitive name
    pub primitive: &'static str,
    /// Mode name, `None` for the pass-through cipher
    pub mode: Option<&'static str>,
}

impl fmt::Display for CipherName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            Some(mode) => write!(f, "{}-{}", self.primitive, mode),
            None => f.write_str(self.primitive),
        }
    }
}

/// The uniform cipher contract used by the DFU state machine and
/// by host tooling.
///
/// Buffers passed to [`encrypt()`](DFUCipher::encrypt) and
/// [`decrypt()`](DFUCipher::decrypt) must be a multiple of
/// [`block_size()`](DFUCipher::block_size). An unaligned buffer is
/// refused with [`CipherError::UnalignedLength`] and the running state
/// is left untouched.
pub trait DFUCipher {
    /// Unit of processing in bytes, `1` for stream ciphers.
    fn block_size(&self) -> usize;

    /// Human-readable name.
    fn name(&self) -> CipherName;

    /// Re-seed the running state (IV, counter, keystream) from the
    /// configured key and nonce.
    fn reset(&mut self);

    /// Encrypt `data` in place.
    fn encrypt(&mut self, data: &mut [u8]) -> Result<(), CipherError>;

    /// Decrypt `data` in place.
    fn decrypt(&mut self, data: &mut [u8]) -> Result<(), CipherError>;
}

pub(crate) fn load_words<const N: usize>(bytes: &[u8]) -> [u32; N] {
    let mut words = [0u32; N];
    for (w, c) in words.iter_mut().zip(bytes.chunks_exact(4)) {
        *w = u32::from_le_bytes([c[0], c[1], c[2], c[3]]);
    }
    words
}

pub(crate) fn store_words(bytes: &mut [u8], words: &[u32]) {
    for (c, w) in bytes.chunks_exact_mut(4).zip(words) {
        c.copy_from_slice(&w.to_le_bytes());
    }
}

pub(crate) fn xor_in_place(dst: &mut [u8], src: &[u8]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d ^= s;
    }
}
