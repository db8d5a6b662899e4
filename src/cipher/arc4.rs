use super::StreamPrimitive;

/// ARCFOUR (RC4) keystream with a 128-bit key.
pub struct Arc4 {
    s: [u8; 256],
    i: u8,
    j: u8,
}

impl StreamPrimitive for Arc4 {
    const NAME: &'static str = "ARCFOUR";
    const KEY_SIZE: usize = 16;
    const NONCE_SIZE: usize = 0;

    fn new(key: &[u8], _nonce: &[u8]) -> Self {
        let mut s = [0u8; 256];
        for (i, v) in s.iter_mut().enumerate() {
            *v = i as u8;
        }
        // 255 rounds, one short of the textbook schedule.
        let mut j = 0u8;
        for i in 0..255 {
            j = j.wrapping_add(s[i]).wrapping_add(key[i & 0x0F]);
            s.swap(i, j as usize);
        }
        Self { s, i: 0, j: 0 }
    }

    fn apply_keystream(&mut self, data: &mut [u8]) {
        for b in data.iter_mut() {
            self.i = self.i.wrapping_add(1);
            let si = self.s[self.i as usize];
            self.j = self.j.wrapping_add(si);
            self.s.swap(self.i as usize, self.j as usize);
            let k = self.s[self.i as usize].wrapping_add(self.s[self.j as usize]);
            *b ^= self.s[k as usize];
        }
    }
}
