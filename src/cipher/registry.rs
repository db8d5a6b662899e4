use core::fmt;
use core::str::FromStr;

use super::{
    Arc4, BlockChain, BlockPrimitive, Blowfish, ChaCha20, ChainMode, CipherError, CipherName,
    DFUCipher, Gost, Magma, NoCipher, Raiden, Rc5, Rc6, Rijndael128, Rijndael192, Rijndael256,
    Rtea, Speck, StreamChain, StreamPrimitive, Xtea, Xtea1,
};

/// Every primitive known to the runtime registry.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CipherKind {
    /// No encryption
    None,
    /// XTEA
    Xtea,
    /// XTEA-1
    Xtea1,
    /// RC5-32/12/16
    Rc5,
    /// RC6-32/20/16
    Rc6,
    /// SPECK 64/128
    Speck,
    /// Raiden
    Raiden,
    /// Blowfish with generated initial state
    Blowfish,
    /// GOST 28147-89, little-endian block words
    Gost,
    /// GOST R 34.12-2015 MAGMA, standard byte order
    Magma,
    /// RTEA
    Rtea,
    /// AES-128
    Rijndael128,
    /// AES-192
    Rijndael192,
    /// AES-256
    Rijndael256,
    /// ARCFOUR stream cipher
    Arc4,
    /// ChaCha20 stream cipher
    ChaCha20,
}

impl CipherKind {
    /// All registered kinds.
    pub const ALL: [CipherKind; 16] = [
        CipherKind::None,
        CipherKind::Xtea,
        CipherKind::Xtea1,
        CipherKind::Rc5,
        CipherKind::Rc6,
        CipherKind::Speck,
        CipherKind::Raiden,
        CipherKind::Blowfish,
        CipherKind::Gost,
        CipherKind::Magma,
        CipherKind::Rtea,
        CipherKind::Rijndael128,
        CipherKind::Rijndael192,
        CipherKind::Rijndael256,
        CipherKind::Arc4,
        CipherKind::ChaCha20,
    ];

    /// Short identifier used on command lines.
    pub fn id(self) -> &'static str {
        match self {
            CipherKind::None => "none",
            CipherKind::Xtea => "xtea",
            CipherKind::Xtea1 => "xtea1",
            CipherKind::Rc5 => "rc5",
            CipherKind::Rc6 => "rc6",
            CipherKind::Speck => "speck",
            CipherKind::Raiden => "raiden",
            CipherKind::Blowfish => "blowfish",
            CipherKind::Gost => "gost",
            CipherKind::Magma => "magma",
            CipherKind::Rtea => "rtea",
            CipherKind::Rijndael128 => "aes128",
            CipherKind::Rijndael192 => "aes192",
            CipherKind::Rijndael256 => "aes256",
            CipherKind::Arc4 => "arc4",
            CipherKind::ChaCha20 => "chacha20",
        }
    }

    /// Primitive name.
    pub fn name(self) -> &'static str {
        match self {
            CipherKind::None => "NONE",
            CipherKind::Xtea => Xtea::NAME,
            CipherKind::Xtea1 => Xtea1::NAME,
            CipherKind::Rc5 => Rc5::NAME,
            CipherKind::Rc6 => Rc6::NAME,
            CipherKind::Speck => Speck::NAME,
            CipherKind::Raiden => Raiden::NAME,
            CipherKind::Blowfish => Blowfish::NAME,
            CipherKind::Gost => Gost::NAME,
            CipherKind::Magma => Magma::NAME,
            CipherKind::Rtea => Rtea::NAME,
            CipherKind::Rijndael128 => Rijndael128::NAME,
            CipherKind::Rijndael192 => Rijndael192::NAME,
            CipherKind::Rijndael256 => Rijndael256::NAME,
            CipherKind::Arc4 => Arc4::NAME,
            CipherKind::ChaCha20 => ChaCha20::NAME,
        }
    }

    /// Unit of processing in bytes, `1` for stream ciphers and `None`.
    pub fn block_size(self) -> usize {
        match self {
            CipherKind::None | CipherKind::Arc4 | CipherKind::ChaCha20 => 1,
            CipherKind::Xtea => Xtea::BLOCK_SIZE,
            CipherKind::Xtea1 => Xtea1::BLOCK_SIZE,
            CipherKind::Rc5 => Rc5::BLOCK_SIZE,
            CipherKind::Rc6 => Rc6::BLOCK_SIZE,
            CipherKind::Speck => Speck::BLOCK_SIZE,
            CipherKind::Raiden => Raiden::BLOCK_SIZE,
            CipherKind::Blowfish => Blowfish::BLOCK_SIZE,
            CipherKind::Gost => Gost::BLOCK_SIZE,
            CipherKind::Magma => Magma::BLOCK_SIZE,
            CipherKind::Rtea => Rtea::BLOCK_SIZE,
            CipherKind::Rijndael128 => Rijndael128::BLOCK_SIZE,
            CipherKind::Rijndael192 => Rijndael192::BLOCK_SIZE,
            CipherKind::Rijndael256 => Rijndael256::BLOCK_SIZE,
        }
    }

    /// Key size in bytes, `0` for `None`.
    pub fn key_size(self) -> usize {
        match self {
            CipherKind::None => 0,
            CipherKind::Xtea => Xtea::KEY_SIZE,
            CipherKind::Xtea1 => Xtea1::KEY_SIZE,
            CipherKind::Rc5 => Rc5::KEY_SIZE,
            CipherKind::Rc6 => Rc6::KEY_SIZE,
            CipherKind::Speck => Speck::KEY_SIZE,
            CipherKind::Raiden => Raiden::KEY_SIZE,
            CipherKind::Blowfish => Blowfish::KEY_SIZE,
            CipherKind::Gost => Gost::KEY_SIZE,
            CipherKind::Magma => Magma::KEY_SIZE,
            CipherKind::Rtea => Rtea::KEY_SIZE,
            CipherKind::Rijndael128 => Rijndael128::KEY_SIZE,
            CipherKind::Rijndael192 => Rijndael192::KEY_SIZE,
            CipherKind::Rijndael256 => Rijndael256::KEY_SIZE,
            CipherKind::Arc4 => Arc4::KEY_SIZE,
            CipherKind::ChaCha20 => ChaCha20::KEY_SIZE,
        }
    }

    /// `true` for keystream ciphers, which ignore the chaining mode.
    pub fn is_stream(self) -> bool {
        matches!(self, CipherKind::Arc4 | CipherKind::ChaCha20)
    }
}

impl fmt::Display for CipherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CipherKind {
    type Err = CipherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CipherKind::ALL
            .iter()
            .copied()
            .find(|k| k.id().eq_ignore_ascii_case(s) || k.name().eq_ignore_ascii_case(s))
            .ok_or(CipherError::UnknownName)
    }
}

/// A cipher selected at run time from [`CipherKind`] and [`ChainMode`].
pub enum Cipher {
    /// Pass-through
    None(NoCipher),
    /// XTEA
    Xtea(BlockChain<Xtea>),
    /// XTEA-1
    Xtea1(BlockChain<Xtea1>),
    /// RC5
    Rc5(BlockChain<Rc5>),
    /// RC6
    Rc6(BlockChain<Rc6>),
    /// SPECK
    Speck(BlockChain<Speck>),
    /// Raiden
    Raiden(BlockChain<Raiden>),
    /// Blowfish
    Blowfish(BlockChain<Blowfish>),
    /// GOST
    Gost(BlockChain<Gost>),
    /// MAGMA
    Magma(BlockChain<Magma>),
    /// RTEA
    Rtea(BlockChain<Rtea>),
    /// AES-128
    Rijndael128(BlockChain<Rijndael128>),
    /// AES-192
    Rijndael192(BlockChain<Rijndael192>),
    /// AES-256
    Rijndael256(BlockChain<Rijndael256>),
    /// ARCFOUR
    Arc4(StreamChain<Arc4>),
    /// ChaCha20
    ChaCha20(StreamChain<ChaCha20>),
}

macro_rules! dispatch {
    ($self:expr, $c:ident => $body:expr) => {
        match $self {
            Cipher::None($c) => $body,
            Cipher::Xtea($c) => $body,
            Cipher::Xtea1($c) => $body,
            Cipher::Rc5($c) => $body,
            Cipher::Rc6($c) => $body,
            Cipher::Speck($c) => $body,
            Cipher::Raiden($c) => $body,
            Cipher::Blowfish($c) => $body,
            Cipher::Gost($c) => $body,
            Cipher::Magma($c) => $body,
            Cipher::Rtea($c) => $body,
            Cipher::Rijndael128($c) => $body,
            Cipher::Rijndael192($c) => $body,
            Cipher::Rijndael256($c) => $body,
            Cipher::Arc4($c) => $body,
            Cipher::ChaCha20($c) => $body,
        }
    };
}

impl Cipher {
    /// Builds a cipher. Stream kinds ignore `mode`; `None` ignores key and nonce.
    pub fn new(
        kind: CipherKind,
        mode: ChainMode,
        key: &[u8],
        nonce: &[u8],
    ) -> Result<Self, CipherError> {
        Ok(match kind {
            CipherKind::None => Cipher::None(NoCipher),
            CipherKind::Xtea => Cipher::Xtea(BlockChain::new(key, nonce, mode)?),
            CipherKind::Xtea1 => Cipher::Xtea1(BlockChain::new(key, nonce, mode)?),
            CipherKind::Rc5 => Cipher::Rc5(BlockChain::new(key, nonce, mode)?),
            CipherKind::Rc6 => Cipher::Rc6(BlockChain::new(key, nonce, mode)?),
            CipherKind::Speck => Cipher::Speck(BlockChain::new(key, nonce, mode)?),
            CipherKind::Raiden => Cipher::Raiden(BlockChain::new(key, nonce, mode)?),
            CipherKind::Blowfish => Cipher::Blowfish(BlockChain::new(key, nonce, mode)?),
            CipherKind::Gost => Cipher::Gost(BlockChain::new(key, nonce, mode)?),
            CipherKind::Magma => Cipher::Magma(BlockChain::new(key, nonce, mode)?),
            CipherKind::Rtea => Cipher::Rtea(BlockChain::new(key, nonce, mode)?),
            CipherKind::Rijndael128 => Cipher::Rijndael128(BlockChain::new(key, nonce, mode)?),
            CipherKind::Rijndael192 => Cipher::Rijndael192(BlockChain::new(key, nonce, mode)?),
            CipherKind::Rijndael256 => Cipher::Rijndael256(BlockChain::new(key, nonce, mode)?),
            CipherKind::Arc4 => Cipher::Arc4(StreamChain::new(key, nonce)?),
            CipherKind::ChaCha20 => Cipher::ChaCha20(StreamChain::new(key, nonce)?),
        })
    }

    /// Kind of the wrapped primitive.
    pub fn kind(&self) -> CipherKind {
        match self {
            Cipher::None(_) => CipherKind::None,
            Cipher::Xtea(_) => CipherKind::Xtea,
            Cipher::Xtea1(_) => CipherKind::Xtea1,
            Cipher::Rc5(_) => CipherKind::Rc5,
            Cipher::Rc6(_) => CipherKind::Rc6,
            Cipher::Speck(_) => CipherKind::Speck,
            Cipher::Raiden(_) => CipherKind::Raiden,
            Cipher::Blowfish(_) => CipherKind::Blowfish,
            Cipher::Gost(_) => CipherKind::Gost,
            Cipher::Magma(_) => CipherKind::Magma,
            Cipher::Rtea(_) => CipherKind::Rtea,
            Cipher::Rijndael128(_) => CipherKind::Rijndael128,
            Cipher::Rijndael192(_) => CipherKind::Rijndael192,
            Cipher::Rijndael256(_) => CipherKind::Rijndael256,
            Cipher::Arc4(_) => CipherKind::Arc4,
            Cipher::ChaCha20(_) => CipherKind::ChaCha20,
        }
    }
}

impl DFUCipher for Cipher {
    fn block_size(&self) -> usize {
        dispatch!(self, c => c.block_size())
    }

    fn name(&self) -> CipherName {
        dispatch!(self, c => c.name())
    }

    fn reset(&mut self) {
        dispatch!(self, c => c.reset())
    }

    fn encrypt(&mut self, data: &mut [u8]) -> Result<(), CipherError> {
        dispatch!(self, c => c.encrypt(data))
    }

    fn decrypt(&mut self, data: &mut [u8]) -> Result<(), CipherError> {
        dispatch!(self, c => c.decrypt(data))
    }
}
