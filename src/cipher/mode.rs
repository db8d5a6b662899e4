use super::{
    xor_in_place, BlockPrimitive, ChainMode, CipherError, CipherName, DFUCipher, StreamPrimitive,
    MAX_BLOCK_SIZE, MAX_KEY_SIZE, MAX_NONCE_SIZE,
};

/// A block primitive driven by one of the [`ChainMode`]s.
pub struct BlockChain<P: BlockPrimitive> {
    primitive: P,
    mode: ChainMode,
    nonce: [u8; MAX_BLOCK_SIZE],
    iv: [u8; MAX_BLOCK_SIZE],
}

impl<P: BlockPrimitive> BlockChain<P> {
    /// Creates a chain from a key and a nonce.
    ///
    /// The first `P::BLOCK_SIZE` bytes of `nonce` seed the IV; ECB ignores it.
    pub fn new(key: &[u8], nonce: &[u8], mode: ChainMode) -> Result<Self, CipherError> {
        let primitive = P::with_key(key)?;
        let mut seed = [0u8; MAX_BLOCK_SIZE];
        if mode.uses_iv() {
            if nonce.len() < P::BLOCK_SIZE {
                return Err(CipherError::InvalidNonceSize);
            }
            seed[..P::BLOCK_SIZE].copy_from_slice(&nonce[..P::BLOCK_SIZE]);
        }
        Ok(Self {
            primitive,
            mode,
            nonce: seed,
            iv: seed,
        })
    }

    /// The chaining mode.
    pub fn mode(&self) -> ChainMode {
        self.mode
    }

    /// Encrypt exactly one block, advancing the IV.
    pub fn encrypt_block(&mut self, block: &mut [u8]) {
        let bs = P::BLOCK_SIZE;
        let iv = &mut self.iv[..bs];
        match self.mode {
            ChainMode::Ecb => self.primitive.encrypt_block(block),
            ChainMode::Cbc => {
                xor_in_place(block, iv);
                self.primitive.encrypt_block(block);
                iv.copy_from_slice(block);
            }
            ChainMode::Pcbc => {
                let mut plain = [0u8; MAX_BLOCK_SIZE];
                plain[..bs].copy_from_slice(block);
                xor_in_place(iv, block);
                self.primitive.encrypt_block(iv);
                block.copy_from_slice(iv);
                xor_in_place(iv, &plain[..bs]);
            }
            ChainMode::Cfb => {
                self.primitive.encrypt_block(iv);
                xor_in_place(iv, block);
                block.copy_from_slice(iv);
            }
            ChainMode::Ofb => {
                self.primitive.encrypt_block(iv);
                xor_in_place(block, iv);
            }
            ChainMode::Ctr => self.counter_block(block),
        }
    }

    /// Decrypt exactly one block, advancing the IV.
    pub fn decrypt_block(&mut self, block: &mut [u8]) {
        let bs = P::BLOCK_SIZE;
        let iv = &mut self.iv[..bs];
        match self.mode {
            ChainMode::Ecb => self.primitive.decrypt_block(block),
            ChainMode::Cbc => {
                let mut cipher = [0u8; MAX_BLOCK_SIZE];
                cipher[..bs].copy_from_slice(block);
                self.primitive.decrypt_block(block);
                xor_in_place(block, iv);
                iv.copy_from_slice(&cipher[..bs]);
            }
            ChainMode::Pcbc => {
                let mut cipher = [0u8; MAX_BLOCK_SIZE];
                cipher[..bs].copy_from_slice(block);
                self.primitive.decrypt_block(block);
                xor_in_place(block, iv);
                iv.copy_from_slice(&cipher[..bs]);
                xor_in_place(iv, block);
            }
            ChainMode::Cfb => {
                let mut keystream = [0u8; MAX_BLOCK_SIZE];
                keystream[..bs].copy_from_slice(iv);
                self.primitive.encrypt_block(&mut keystream[..bs]);
                iv.copy_from_slice(block);
                xor_in_place(block, &keystream[..bs]);
            }
            ChainMode::Ofb => {
                self.primitive.encrypt_block(iv);
                xor_in_place(block, iv);
            }
            ChainMode::Ctr => self.counter_block(block),
        }
    }

    fn counter_block(&mut self, block: &mut [u8]) {
        let bs = P::BLOCK_SIZE;
        let mut keystream = [0u8; MAX_BLOCK_SIZE];
        keystream[..bs].copy_from_slice(&self.iv[..bs]);
        self.primitive.encrypt_block(&mut keystream[..bs]);
        xor_in_place(block, &keystream[..bs]);

        let counter = u32::from_le_bytes([self.iv[0], self.iv[1], self.iv[2], self.iv[3]]);
        self.iv[..4].copy_from_slice(&counter.wrapping_add(1).to_le_bytes());
    }
}

impl<P: BlockPrimitive> DFUCipher for BlockChain<P> {
    fn block_size(&self) -> usize {
        P::BLOCK_SIZE
    }

    fn name(&self) -> CipherName {
        CipherName {
            primitive: P::NAME,
            mode: Some(self.mode.name()),
        }
    }

    fn reset(&mut self) {
        self.iv = self.nonce;
    }

    fn encrypt(&mut self, data: &mut [u8]) -> Result<(), CipherError> {
        if data.len() % P::BLOCK_SIZE != 0 {
            return Err(CipherError::UnalignedLength);
        }
        for block in data.chunks_exact_mut(P::BLOCK_SIZE) {
            self.encrypt_block(block);
        }
        Ok(())
    }

    fn decrypt(&mut self, data: &mut [u8]) -> Result<(), CipherError> {
        if data.len() % P::BLOCK_SIZE != 0 {
            return Err(CipherError::UnalignedLength);
        }
        for block in data.chunks_exact_mut(P::BLOCK_SIZE) {
            self.decrypt_block(block);
        }
        Ok(())
    }
}

/// A keystream primitive used as a byte-granular stream cipher.
pub struct StreamChain<P: StreamPrimitive> {
    primitive: P,
    key: [u8; MAX_KEY_SIZE],
    nonce: [u8; MAX_NONCE_SIZE],
}

impl<P: StreamPrimitive> StreamChain<P> {
    /// Creates a stream cipher from a key and a nonce of at least
    /// `P::NONCE_SIZE` bytes.
    pub fn new(key: &[u8], nonce: &[u8]) -> Result<Self, CipherError> {
        if key.len() != P::KEY_SIZE {
            return Err(CipherError::InvalidKeySize);
        }
        if nonce.len() < P::NONCE_SIZE {
            return Err(CipherError::InvalidNonceSize);
        }
        let mut k = [0u8; MAX_KEY_SIZE];
        k[..P::KEY_SIZE].copy_from_slice(key);
        let mut n = [0u8; MAX_NONCE_SIZE];
        n[..P::NONCE_SIZE].copy_from_slice(&nonce[..P::NONCE_SIZE]);
        Ok(Self {
            primitive: P::new(key, &nonce[..P::NONCE_SIZE]),
            key: k,
            nonce: n,
        })
    }
}

impl<P: StreamPrimitive> DFUCipher for StreamChain<P> {
    fn block_size(&self) -> usize {
        1
    }

    fn name(&self) -> CipherName {
        CipherName {
            primitive: P::NAME,
            mode: Some("STREAM"),
        }
    }

    fn reset(&mut self) {
        self.primitive = P::new(&self.key[..P::KEY_SIZE], &self.nonce[..P::NONCE_SIZE]);
    }

    fn encrypt(&mut self, data: &mut [u8]) -> Result<(), CipherError> {
        self.primitive.apply_keystream(data);
        Ok(())
    }

    fn decrypt(&mut self, data: &mut [u8]) -> Result<(), CipherError> {
        self.primitive.apply_keystream(data);
        Ok(())
    }
}

/// Pass-through used when encryption is disabled.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoCipher;

impl DFUCipher for NoCipher {
    fn block_size(&self) -> usize {
        1
    }

    fn name(&self) -> CipherName {
        CipherName {
            primitive: "NONE",
            mode: None,
        }
    }

    fn reset(&mut self) {}

    fn encrypt(&mut self, _data: &mut [u8]) -> Result<(), CipherError> {
        Ok(())
    }

    fn decrypt(&mut self, _data: &mut [u8]) -> Result<(), CipherError> {
        Ok(())
    }
}
