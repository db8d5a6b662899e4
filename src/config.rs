//! Build-time configuration shared by the device and the host encrypter.
//!
//! Both sides must be built with the same selection and key material,
//! otherwise the device decrypts garbage and the image is rejected (or,
//! without a checksum, silently programmed).

use crate::checksum::ChecksumKind;
use crate::cipher::{ChainMode, CipherKind};

/// Cipher used to protect firmware images.
pub const CIPHER: CipherKind = CipherKind::Rc5;

/// Chaining mode for block ciphers. Ignored by stream ciphers.
pub const MODE: ChainMode = ChainMode::Cbc;

/// Checksum embedded into images by the host and verified by the device.
pub const CHECKSUM: Option<ChecksumKind> = None;

/// First 128 bits of key material.
pub const KEY_A: [u8; 16] = [
    0x2D, 0x4D, 0x61, 0x6B, 0x65, 0x4C, 0x6F, 0x76, 0x65, 0x4E, 0x6F, 0x74, 0x57, 0x61, 0x72, 0x2D,
];

/// Second 128 bits of key material.
pub const KEY_B: [u8; 16] = [
    0x10, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18, 0x19, 0x1A, 0x1B, 0x1C, 0x1D, 0x1E, 0x1F,
];

/// 192-bit key: `KEY_A` followed by the first half of `KEY_B`.
pub const KEY_192: [u8; 24] = concat_key::<24>();

/// 256-bit key: `KEY_A` followed by `KEY_B`.
pub const KEY_256: [u8; 32] = concat_key::<32>();

/// Nonce seeding IVs and counters. Block ciphers use its first
/// `block_size()` bytes, ChaCha20 the first 12.
pub const NONCE: [u8; 16] = [
    0x44, 0x33, 0x22, 0x11, 0x88, 0x77, 0x66, 0x55, 0xCC, 0xBB, 0xAA, 0x99, 0x44, 0x33, 0x22, 0x11,
];

/// USB vendor ID.
pub const USB_VID: u16 = 0x0483;
/// USB product ID.
pub const USB_PID: u16 = 0xDF11;
/// Manufacturer string.
pub const MANUFACTURER: &str = "Your company name";
/// Product string.
pub const PRODUCT: &str = "Secure bootloader";

/// DFU wTransferSize.
pub const TRANSFER_SIZE: u16 = 0x80;
/// bwPollTimeout reported by GETSTATUS, in milliseconds.
pub const POLL_TIMEOUT_MS: u32 = 20;
/// wDetachTimeOut, in milliseconds.
pub const DETACH_TIMEOUT: u16 = 200;

const fn concat_key<const N: usize>() -> [u8; N] {
    let mut key = [0u8; N];
    let mut i = 0;
    while i < N {
        key[i] = if i < 16 { KEY_A[i] } else { KEY_B[i - 16] };
        i += 1;
    }
    key
}

/// Compiled-in key for `kind`, sized to `kind.key_size()`.
pub fn default_key(kind: CipherKind) -> &'static [u8] {
    match kind.key_size() {
        0 => &[],
        24 => &KEY_192,
        32 => &KEY_256,
        _ => &KEY_A,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_prefixes() {
        assert_eq!(KEY_192[..16], KEY_A);
        assert_eq!(KEY_192[16..], KEY_B[..8]);
        assert_eq!(KEY_256[16..], KEY_B);
    }

    #[test]
    fn default_key_fits_every_cipher() {
        for kind in CipherKind::ALL {
            assert_eq!(default_key(kind).len(), kind.key_size(), "{}", kind);
        }
    }
}
