use super::{load_words, store_words, BlockPrimitive};

const ROUNDS: usize = 27;

/// SPECK 64/128: 64-bit block, 128-bit key, 27 rounds.
pub struct Speck {
    rk: [u32; ROUNDS],
}

#[inline]
fn round(x: u32, y: u32, k: u32) -> (u32, u32) {
    let x = x.rotate_right(8).wrapping_add(y) ^ k;
    let y = y.rotate_left(3) ^ x;
    (x, y)
}

#[inline]
fn unround(x: u32, y: u32, k: u32) -> (u32, u32) {
    let y = (y ^ x).rotate_right(3);
    let x = (x ^ k).wrapping_sub(y).rotate_left(8);
    (x, y)
}

impl BlockPrimitive for Speck {
    const NAME: &'static str = "SPECK 64/128";
    const BLOCK_SIZE: usize = 8;
    const KEY_SIZE: usize = 16;

    fn new(key: &[u8]) -> Self {
        let mut k: [u32; 4] = load_words(key);
        let mut rk = [0u32; ROUNDS];
        let mut j = 0;
        for (i, r) in rk.iter_mut().enumerate() {
            *r = k[0];
            j = if j == 3 { 1 } else { j + 1 };
            let (x, y) = round(k[j], k[0], i as u32);
            k[j] = x;
            k[0] = y;
        }
        Self { rk }
    }

    fn encrypt_block(&self, block: &mut [u8]) {
        let [mut y, mut x] = load_words::<2>(block);
        for &k in self.rk.iter() {
            (x, y) = round(x, y, k);
        }
        store_words(block, &[y, x]);
    }

    fn decrypt_block(&self, block: &mut [u8]) {
        let [mut y, mut x] = load_words::<2>(block);
        for &k in self.rk.iter().rev() {
            (x, y) = unround(x, y, k);
        }
        store_words(block, &[y, x]);
    }
}
