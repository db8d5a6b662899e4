use super::{load_words, store_words, BlockPrimitive};

const ROUNDS: usize = 12;
const TABLE: usize = 2 * ROUNDS + 2;
const P32: u32 = 0xB7E1_5163;
const Q32: u32 = 0x9E37_79B9;

/// RC5-32/12/16: 64-bit block, 12 rounds, 128-bit key.
pub struct Rc5 {
    s: [u32; TABLE],
}

/// RC5/RC6 key expansion into `s`, using the 4-word key `l`.
pub(super) fn expand_key<const T: usize>(key: &[u8]) -> [u32; T] {
    let mut l: [u32; 4] = load_words(key);
    let mut s = [0u32; T];
    s[0] = P32;
    for i in 1..T {
        s[i] = s[i - 1].wrapping_add(Q32);
    }

    let (mut a, mut b) = (0u32, 0u32);
    let (mut i, mut j) = (0usize, 0usize);
    for _ in 0..3 * T {
        a = s[i].wrapping_add(a).wrapping_add(b).rotate_left(3);
        s[i] = a;
        let ab = a.wrapping_add(b);
        b = l[j].wrapping_add(ab).rotate_left(ab & 31);
        l[j] = b;
        i = (i + 1) % T;
        j = (j + 1) % l.len();
    }
    s
}

impl BlockPrimitive for Rc5 {
    const NAME: &'static str = "RC5-32/12/128";
    const BLOCK_SIZE: usize = 8;
    const KEY_SIZE: usize = 16;

    fn new(key: &[u8]) -> Self {
        Self {
            s: expand_key(key),
        }
    }

    fn encrypt_block(&self, block: &mut [u8]) {
        let s = &self.s;
        let [a, b] = load_words::<2>(block);
        let mut a = a.wrapping_add(s[0]);
        let mut b = b.wrapping_add(s[1]);
        for r in 1..=ROUNDS {
            a = (a ^ b).rotate_left(b & 31).wrapping_add(s[2 * r]);
            b = (b ^ a).rotate_left(a & 31).wrapping_add(s[2 * r + 1]);
        }
        store_words(block, &[a, b]);
    }

    fn decrypt_block(&self, block: &mut [u8]) {
        let s = &self.s;
        let [mut a, mut b] = load_words::<2>(block);
        for r in (1..=ROUNDS).rev() {
            b = b.wrapping_sub(s[2 * r + 1]).rotate_right(a & 31) ^ a;
            a = a.wrapping_sub(s[2 * r]).rotate_right(b & 31) ^ b;
        }
        store_words(block, &[a.wrapping_sub(s[0]), b.wrapping_sub(s[1])]);
    }
}
