use super::{load_words, store_words, BlockPrimitive};

const ROUNDS: u32 = 64;

/// RTEA (Ruptor's TEA): 64-bit block, 256-bit key, 64 rounds.
pub struct Rtea {
    key: [u32; 8],
}

#[inline]
fn f(x: u32) -> u32 {
    x.wrapping_add((x << 6) ^ (x >> 8))
}

impl BlockPrimitive for Rtea {
    const NAME: &'static str = "RTEA";
    const BLOCK_SIZE: usize = 8;
    const KEY_SIZE: usize = 32;

    fn new(key: &[u8]) -> Self {
        Self {
            key: load_words(key),
        }
    }

    fn encrypt_block(&self, block: &mut [u8]) {
        let [mut a, mut b] = load_words::<2>(block);
        let k = &self.key;
        let mut r = 0u32;
        while r < ROUNDS {
            b = b
                .wrapping_add(f(a))
                .wrapping_add(k[(r & 7) as usize])
                .wrapping_add(r);
            r += 1;
            a = a
                .wrapping_add(f(b))
                .wrapping_add(k[(r & 7) as usize])
                .wrapping_add(r);
            r += 1;
        }
        store_words(block, &[a, b]);
    }

    fn decrypt_block(&self, block: &mut [u8]) {
        let [mut a, mut b] = load_words::<2>(block);
        let k = &self.key;
        let mut r = ROUNDS;
        while r > 0 {
            r -= 1;
            a = a
                .wrapping_sub(f(b))
                .wrapping_sub(k[(r & 7) as usize])
                .wrapping_sub(r);
            r -= 1;
            b = b
                .wrapping_sub(f(a))
                .wrapping_sub(k[(r & 7) as usize])
                .wrapping_sub(r);
        }
        store_words(block, &[a, b]);
    }
}
