use super::rc5::expand_key;
use super::{load_words, store_words, BlockPrimitive};

const ROUNDS: usize = 20;
const TABLE: usize = 2 * ROUNDS + 4;

/// RC6-32/20/16: 128-bit block, 20 rounds, 128-bit key.
pub struct Rc6 {
    s: [u32; TABLE],
}

#[inline]
fn mix(x: u32) -> u32 {
    x.wrapping_mul(x.wrapping_mul(2).wrapping_add(1)).rotate_left(5)
}

impl BlockPrimitive for Rc6 {
    const NAME: &'static str = "RC6-32/20/128";
    const BLOCK_SIZE: usize = 16;
    const KEY_SIZE: usize = 16;

    fn new(key: &[u8]) -> Self {
        Self {
            s: expand_key(key),
        }
    }

    fn encrypt_block(&self, block: &mut [u8]) {
        let s = &self.s;
        let [mut a, mut b, mut c, mut d] = load_words::<4>(block);
        b = b.wrapping_add(s[0]);
        d = d.wrapping_add(s[1]);
        for r in 1..=ROUNDS {
            let t = mix(b);
            let u = mix(d);
            a = (a ^ t).rotate_left(u & 31).wrapping_add(s[2 * r]);
            c = (c ^ u).rotate_left(t & 31).wrapping_add(s[2 * r + 1]);
            (a, b, c, d) = (b, c, d, a);
        }
        a = a.wrapping_add(s[2 * ROUNDS + 2]);
        c = c.wrapping_add(s[2 * ROUNDS + 3]);
        store_words(block, &[a, b, c, d]);
    }

    fn decrypt_block(&self, block: &mut [u8]) {
        let s = &self.s;
        let [mut a, mut b, mut c, mut d] = load_words::<4>(block);
        c = c.wrapping_sub(s[2 * ROUNDS + 3]);
        a = a.wrapping_sub(s[2 * ROUNDS + 2]);
        for r in (1..=ROUNDS).rev() {
            (a, b, c, d) = (d, a, b, c);
            let u = mix(d);
            let t = mix(b);
            c = c.wrapping_sub(s[2 * r + 1]).rotate_right(t & 31) ^ u;
            a = a.wrapping_sub(s[2 * r]).rotate_right(u & 31) ^ t;
        }
        d = d.wrapping_sub(s[1]);
        b = b.wrapping_sub(s[0]);
        store_words(block, &[a, b, c, d]);
    }
}
