use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};

use super::BlockPrimitive;

macro_rules! rijndael {
    ($name:ident, $inner:ty, $label:literal, $key_size:literal) => {
        #[doc = concat!($label, ", 128-bit block, backed by the `aes` crate.")]
        pub struct $name {
            inner: $inner,
        }

        impl BlockPrimitive for $name {
            const NAME: &'static str = $label;
            const BLOCK_SIZE: usize = 16;
            const KEY_SIZE: usize = $key_size;

            fn new(key: &[u8]) -> Self {
                Self {
                    inner: <$inner>::new(GenericArray::from_slice(key)),
                }
            }

            fn encrypt_block(&self, block: &mut [u8]) {
                self.inner
                    .encrypt_block(GenericArray::from_mut_slice(block));
            }

            fn decrypt_block(&self, block: &mut [u8]) {
                self.inner
                    .decrypt_block(GenericArray::from_mut_slice(block));
            }
        }
    };
}

rijndael!(Rijndael128, aes::Aes128, "RIJNDAEL-128", 16);
rijndael!(Rijndael192, aes::Aes192, "RIJNDAEL-192", 24);
rijndael!(Rijndael256, aes::Aes256, "RIJNDAEL-256", 32);
