use super::{load_words, store_words, BlockPrimitive};

const ROUNDS: usize = 16;
const SEED: u32 = 0xDEAD_BEEF;

/// Blowfish with a generated initial state: the P-array and S-boxes are
/// filled from an xorshift32 sequence instead of the digits of pi, then
/// the standard key expansion runs over a 256-bit key.
pub struct Blowfish {
    p: [u32; ROUNDS + 2],
    s: [[u32; 256]; 4],
}

fn xorshift(state: &mut u32) -> u32 {
    let mut x = *state;
    x ^= x << 13;
    x ^= x >> 17;
    x ^= x << 5;
    *state = x;
    x
}

impl Blowfish {
    #[inline]
    fn f(&self, x: u32) -> u32 {
        let [a, b, c, d] = x.to_be_bytes();
        let h = self.s[0][a as usize].wrapping_add(self.s[1][b as usize]);
        (h ^ self.s[2][c as usize]).wrapping_add(self.s[3][d as usize])
    }

    fn encrypt_words(&self, mut l: u32, mut r: u32) -> (u32, u32) {
        for i in (0..ROUNDS).step_by(2) {
            l ^= self.p[i];
            r ^= self.f(l);
            r ^= self.p[i + 1];
            l ^= self.f(r);
        }
        l ^= self.p[ROUNDS];
        r ^= self.p[ROUNDS + 1];
        (r, l)
    }

    fn decrypt_words(&self, x0: u32, x1: u32) -> (u32, u32) {
        let mut r = x0 ^ self.p[ROUNDS + 1];
        let mut l = x1 ^ self.p[ROUNDS];
        for i in (0..ROUNDS).step_by(2).rev() {
            l ^= self.f(r);
            r ^= self.p[i + 1];
            r ^= self.f(l);
            l ^= self.p[i];
        }
        (l, r)
    }
}

impl BlockPrimitive for Blowfish {
    const NAME: &'static str = "BLOWFISH";
    const BLOCK_SIZE: usize = 8;
    const KEY_SIZE: usize = 32;

    fn new(key: &[u8]) -> Self {
        let mut state = SEED;
        let mut bf = Self {
            p: [0; ROUNDS + 2],
            s: [[0; 256]; 4],
        };
        for p in bf.p.iter_mut() {
            *p = xorshift(&mut state);
        }
        for s in bf.s.iter_mut().flat_map(|b| b.iter_mut()) {
            *s = xorshift(&mut state);
        }

        // key bytes are mixed into the little-endian byte image of P
        let mut pb = [0u8; 4 * (ROUNDS + 2)];
        store_words(&mut pb, &bf.p);
        for (i, b) in pb.iter_mut().enumerate() {
            *b ^= key[i % Self::KEY_SIZE];
        }
        bf.p = load_words(&pb);

        let (mut l, mut r) = (0u32, 0u32);
        for i in (0..ROUNDS + 2).step_by(2) {
            (l, r) = bf.encrypt_words(l, r);
            bf.p[i] = l;
            bf.p[i + 1] = r;
        }
        for b in 0..4 {
            for i in (0..256).step_by(2) {
                (l, r) = bf.encrypt_words(l, r);
                bf.s[b][i] = l;
                bf.s[b][i + 1] = r;
            }
        }
        bf
    }

    fn encrypt_block(&self, block: &mut [u8]) {
        let [l, r] = load_words::<2>(block);
        let (x0, x1) = self.encrypt_words(l, r);
        store_words(block, &[x0, x1]);
    }

    fn decrypt_block(&self, block: &mut [u8]) {
        let [x0, x1] = load_words::<2>(block);
        let (l, r) = self.decrypt_words(x0, x1);
        store_words(block, &[l, r]);
    }
}
