//! Host side of the secure DFU bootloader: turns a plain firmware image
//! into the byte stream the device decrypts, and back.
//!
//! Encrypted image layout, before encryption:
//!
//! ```text
//! [payload][checksum, little-endian][zero padding to the cipher block]
//! ```

use std::fs;
use std::path::Path;

use anyhow::Context;
use thiserror::Error;
use tracing::{debug, info};

use usbd_secure_dfu::checksum::{self, ChecksumKind};
use usbd_secure_dfu::{config, ChainMode, Cipher, CipherError, CipherKind, DFUCipher};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncrypterError {
    #[error("cipher setup failed: {0}")]
    Cipher(CipherError),

    #[error("checksum collision: payload of {expected} bytes validates at offset {found}")]
    Collision { expected: usize, found: usize },

    #[error("no {0} checksum found in the decrypted image")]
    ChecksumNotFound(ChecksumKind),

    #[error("input of {len} bytes is not a multiple of the {block}-byte cipher block")]
    Unaligned { len: usize, block: usize },
}

/// Direction of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Encrypt,
    Decrypt,
}

/// Cipher and checksum selection. Defaults to the compiled-in configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Settings {
    pub cipher: CipherKind,
    pub mode: ChainMode,
    pub checksum: Option<ChecksumKind>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cipher: config::CIPHER,
            mode: config::MODE,
            checksum: config::CHECKSUM,
        }
    }
}

impl Settings {
    /// A fresh cipher with the compiled-in key and nonce.
    pub fn cipher(&self) -> Result<Cipher, EncrypterError> {
        Cipher::new(
            self.cipher,
            self.mode,
            config::default_key(self.cipher),
            &config::NONCE,
        )
        .map_err(EncrypterError::Cipher)
    }

    /// Name printed in the summary line, e.g. `RC5-32/12/128-CBC`.
    pub fn name(&self) -> Result<String, EncrypterError> {
        Ok(self.cipher()?.name().to_string())
    }
}

/// Appends the checksum, pads and encrypts `plain`.
pub fn encrypt(settings: &Settings, plain: &[u8]) -> Result<Vec<u8>, EncrypterError> {
    let mut cipher = settings.cipher()?;
    let mut data = plain.to_vec();

    if let Some(kind) = settings.checksum {
        let len = data.len();
        data.resize(len + kind.width(), 0);
        let end = checksum::append(kind, &mut data, len).unwrap_or(len);
        debug!(%kind, payload = len, signed = end, "checksum appended");

        // the device takes the first match as the payload end
        let found = checksum::validate(kind, &data);
        if found != len {
            return Err(EncrypterError::Collision {
                expected: len,
                found,
            });
        }
    }

    let block = cipher.block_size();
    let padded = data.len().div_ceil(block) * block;
    data.resize(padded, 0);

    cipher.encrypt(&mut data).map_err(EncrypterError::Cipher)?;
    Ok(data)
}

/// Decrypts `data` and strips padding and checksum when one is configured.
pub fn decrypt(settings: &Settings, data: &[u8]) -> Result<Vec<u8>, EncrypterError> {
    let mut cipher = settings.cipher()?;
    let block = cipher.block_size();
    if data.len() % block != 0 {
        return Err(EncrypterError::Unaligned {
            len: data.len(),
            block,
        });
    }

    let mut plain = data.to_vec();
    cipher.decrypt(&mut plain).map_err(EncrypterError::Cipher)?;

    if let Some(kind) = settings.checksum {
        let len = checksum::validate(kind, &plain);
        if len == 0 {
            return Err(EncrypterError::ChecksumNotFound(kind));
        }
        debug!(%kind, payload = len, "checksum verified");
        plain.truncate(len);
    }

    Ok(plain)
}

/// Reads `input`, processes it and writes `output`. Returns the number
/// of bytes written.
pub fn process_file(
    settings: &Settings,
    direction: Direction,
    input: &Path,
    output: &Path,
) -> anyhow::Result<usize> {
    let data =
        fs::read(input).with_context(|| format!("unable to read {}", input.display()))?;
    info!(input = %input.display(), bytes = data.len(), ?direction, "processing");

    let result = match direction {
        Direction::Encrypt => encrypt(settings, &data)?,
        Direction::Decrypt => decrypt(settings, &data)?,
    };

    fs::write(output, &result)
        .with_context(|| format!("unable to write {}", output.display()))?;
    Ok(result.len())
}
