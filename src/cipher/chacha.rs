use chacha20::cipher::generic_array::GenericArray;
use chacha20::cipher::{KeyIvInit, StreamCipher, StreamCipherSeek};

use super::StreamPrimitive;

/// Keystream offset of block counter 1.
const FIRST_BLOCK: u64 = 64;

/// ChaCha20 as in RFC 7539: 256-bit key, 96-bit nonce, the first
/// keystream block uses counter 1.
pub struct ChaCha20 {
    inner: chacha20::ChaCha20,
}

impl StreamPrimitive for ChaCha20 {
    const NAME: &'static str = "CHACHA20";
    const KEY_SIZE: usize = 32;
    const NONCE_SIZE: usize = 12;

    fn new(key: &[u8], nonce: &[u8]) -> Self {
        let mut inner = chacha20::ChaCha20::new(
            GenericArray::from_slice(key),
            GenericArray::from_slice(nonce),
        );
        inner.seek(FIRST_BLOCK);
        Self { inner }
    }

    fn apply_keystream(&mut self, data: &mut [u8]) {
        self.inner.apply_keystream(data);
    }
}
