use super::{load_words, store_words, BlockPrimitive};

const ROUNDS: usize = 16;

/// Raiden: 64-bit block, 128-bit key, 16 rounds.
pub struct Raiden {
    subkeys: [u32; ROUNDS],
}

#[inline]
fn f(sk: u32, x: u32) -> u32 {
    let sum = sk.wrapping_add(x);
    (sum << 9) ^ sk.wrapping_sub(x) ^ (sum >> 14)
}

impl BlockPrimitive for Raiden {
    const NAME: &'static str = "RAIDEN";
    const BLOCK_SIZE: usize = 8;
    const KEY_SIZE: usize = 16;

    fn new(key: &[u8]) -> Self {
        let mut k: [u32; 4] = load_words(key);
        let mut subkeys = [0u32; ROUNDS];
        for (i, sk) in subkeys.iter_mut().enumerate() {
            // shift amount is taken modulo 32
            let v = k[0]
                .wrapping_add(k[1])
                .wrapping_add(k[2].wrapping_add(k[3]) ^ k[0].wrapping_shl(k[2] & 31));
            k[i & 3] = v;
            *sk = v;
        }
        Self { subkeys }
    }

    fn encrypt_block(&self, block: &mut [u8]) {
        let [mut b0, mut b1] = load_words::<2>(block);
        for &sk in self.subkeys.iter() {
            b0 = b0.wrapping_add(f(sk, b1));
            b1 = b1.wrapping_add(f(sk, b0));
        }
        store_words(block, &[b0, b1]);
    }

    fn decrypt_block(&self, block: &mut [u8]) {
        let [mut b0, mut b1] = load_words::<2>(block);
        for &sk in self.subkeys.iter().rev() {
            b1 = b1.wrapping_sub(f(sk, b0));
            b0 = b0.wrapping_sub(f(sk, b1));
        }
        store_words(block, &[b0, b1]);
    }
}
