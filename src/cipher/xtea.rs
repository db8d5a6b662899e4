use super::{load_words, store_words, BlockPrimitive};

const DELTA: u32 = 0x9E37_79B9;
const CYCLES: u32 = 32;

/// XTEA, 64-bit block, 128-bit key, 32 cycles.
pub struct Xtea {
    key: [u32; 4],
}

impl BlockPrimitive for Xtea {
    const NAME: &'static str = "XTEA 64/32/128";
    const BLOCK_SIZE: usize = 8;
    const KEY_SIZE: usize = 16;

    fn new(key: &[u8]) -> Self {
        Self {
            key: load_words(key),
        }
    }

    fn encrypt_block(&self, block: &mut [u8]) {
        let [mut a, mut b] = load_words::<2>(block);
        let k = &self.key;
        let mut sum = 0u32;
        for _ in 0..CYCLES {
            a = a.wrapping_add(
                (((b << 4) ^ (b >> 5)).wrapping_add(b)) ^ sum.wrapping_add(k[(sum & 3) as usize]),
            );
            sum = sum.wrapping_add(DELTA);
            b = b.wrapping_add(
                (((a << 4) ^ (a >> 5)).wrapping_add(a))
                    ^ sum.wrapping_add(k[((sum >> 11) & 3) as usize]),
            );
        }
        store_words(block, &[a, b]);
    }

    fn decrypt_block(&self, block: &mut [u8]) {
        let [mut a, mut b] = load_words::<2>(block);
        let k = &self.key;
        let mut sum = DELTA.wrapping_mul(CYCLES);
        for _ in 0..CYCLES {
            b = b.wrapping_sub(
                (((a << 4) ^ (a >> 5)).wrapping_add(a))
                    ^ sum.wrapping_add(k[((sum >> 11) & 3) as usize]),
            );
            sum = sum.wrapping_sub(DELTA);
            a = a.wrapping_sub(
                (((b << 4) ^ (b >> 5)).wrapping_add(b)) ^ sum.wrapping_add(k[(sum & 3) as usize]),
            );
        }
        store_words(block, &[a, b]);
    }
}

/// XTEA-1: XTEA with a data-dependent key rotation in every half round.
pub struct Xtea1 {
    key: [u32; 4],
}

#[inline]
fn xtea1_mix(x: u32, sum: u32, k: u32) -> u32 {
    ((x << 4) ^ (x >> 5))
        .wrapping_add(x ^ sum)
        .wrapping_add(k.rotate_left(x & 31))
}

impl BlockPrimitive for Xtea1 {
    const NAME: &'static str = "XTEA-1 64/32/128";
    const BLOCK_SIZE: usize = 8;
    const KEY_SIZE: usize = 16;

    fn new(key: &[u8]) -> Self {
        Self {
            key: load_words(key),
        }
    }

    fn encrypt_block(&self, block: &mut [u8]) {
        let [mut a, mut b] = load_words::<2>(block);
        let k = &self.key;
        let mut sum = 0u32;
        for _ in 0..CYCLES {
            a = a.wrapping_add(xtea1_mix(b, sum, k[(sum & 3) as usize]));
            sum = sum.wrapping_add(DELTA);
            b = b.wrapping_add(xtea1_mix(a, sum, k[((sum >> 11) & 3) as usize]));
        }
        store_words(block, &[a, b]);
    }

    fn decrypt_block(&self, block: &mut [u8]) {
        let [mut a, mut b] = load_words::<2>(block);
        let k = &self.key;
        let mut sum = DELTA.wrapping_mul(CYCLES);
        for _ in 0..CYCLES {
            b = b.wrapping_sub(xtea1_mix(a, sum, k[((sum >> 11) & 3) as usize]));
            sum = sum.wrapping_sub(DELTA);
            a = a.wrapping_sub(xtea1_mix(b, sum, k[(sum & 3) as usize]));
        }
        store_words(block, &[a, b]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn xtea_known_answer() {
        let c = Xtea::new(&hex!("03020100 07060504 0B0A0908 0F0E0D0C"));
        let mut block = hex!("4443424148474645");
        c.encrypt_block(&mut block);
        assert_eq!(block, hex!("d0f37d49b52c6172"));
        c.decrypt_block(&mut block);
        assert_eq!(block, hex!("4443424148474645"));
    }

    #[test]
    fn xtea1_known_answer() {
        let c = Xtea1::new(&hex!("0123456789ABCDEF FEDCBA9876543210"));
        let mut block = hex!("F0D5D4C9CEF7CFD2");
        c.encrypt_block(&mut block);
        assert_eq!(block, hex!("8b3bf4250d76ef2a"));
        c.decrypt_block(&mut block);
        assert_eq!(block, hex!("F0D5D4C9CEF7CFD2"));
    }
}
