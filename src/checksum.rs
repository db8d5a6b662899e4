//! Firmware image checksums.
//!
//! A signed image is `[plaintext][checksum]`, the checksum stored
//! little-endian right after the payload and computed over the payload
//! only. The payload length is not transmitted: [`validate()`] and
//! [`ChecksumScanner`] find it by trying every offset until the bytes at
//! that offset equal the checksum of everything before it.
//!
//! None of the algorithms apply a final XOR.

use core::fmt;
use core::str::FromStr;

use crc::{Crc, Digest, NoTable, Table, CRC_32_JAMCRC};

/// CRC-64 with the XZ polynomial and no final XOR.
const CRC_64_IMAGE: crc::Algorithm<u64> = crc::Algorithm {
    width: 64,
    poly: 0xad93d23594c935a9,
    init: 0xffffffffffffffff,
    refin: true,
    refout: true,
    xorout: 0,
    check: 0xcaa717168609f281,
    residue: 0,
};

static CRC32: Crc<u32, Table<1>> = Crc::<u32, Table<1>>::new(&CRC_32_JAMCRC);
static CRC32_SMALL: Crc<u32, NoTable> = Crc::<u32, NoTable>::new(&CRC_32_JAMCRC);
static CRC64: Crc<u64, Table<1>> = Crc::<u64, Table<1>>::new(&CRC_64_IMAGE);
static CRC64_SMALL: Crc<u64, NoTable> = Crc::<u64, NoTable>::new(&CRC_64_IMAGE);

const FNV32_OFFSET: u32 = 0x811C_9DC5;
const FNV32_PRIME: u32 = 16_777_619;
const FNV64_OFFSET: u64 = 0xCBF2_9CE4_8422_2325;
const FNV64_PRIME: u64 = 1_099_511_628_211;

/// Largest checksum width in bytes.
pub const MAX_WIDTH: usize = 8;

/// Checksum algorithm.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChecksumKind {
    /// CRC-32 (JAMCRC), 256-entry lookup table (1 KiB)
    Crc32,
    /// CRC-32 computed bit by bit, no table
    Crc32Small,
    /// CRC-64, XZ polynomial without final XOR, 256-entry lookup table (2 KiB)
    Crc64,
    /// CRC-64 computed bit by bit, no table
    Crc64Small,
    /// 32-bit Fowler-Noll-Vo 1a
    Fnv1a32,
    /// 64-bit Fowler-Noll-Vo 1a
    Fnv1a64,
}

impl ChecksumKind {
    /// All algorithms.
    pub const ALL: [ChecksumKind; 6] = [
        ChecksumKind::Crc32,
        ChecksumKind::Crc32Small,
        ChecksumKind::Crc64,
        ChecksumKind::Crc64Small,
        ChecksumKind::Fnv1a32,
        ChecksumKind::Fnv1a64,
    ];

    /// Stored size in bytes.
    pub fn width(self) -> usize {
        match self {
            ChecksumKind::Crc32 | ChecksumKind::Crc32Small | ChecksumKind::Fnv1a32 => 4,
            ChecksumKind::Crc64 | ChecksumKind::Crc64Small | ChecksumKind::Fnv1a64 => 8,
        }
    }

    /// Algorithm name. Table and bitwise variants share a name.
    pub fn name(self) -> &'static str {
        match self {
            ChecksumKind::Crc32 | ChecksumKind::Crc32Small => "CRC-32",
            ChecksumKind::Crc64 | ChecksumKind::Crc64Small => "CRC-64",
            ChecksumKind::Fnv1a32 => "FNV1A-32",
            ChecksumKind::Fnv1a64 => "FNV1A-64",
        }
    }

    /// Short identifier used on command lines.
    pub fn id(self) -> &'static str {
        match self {
            ChecksumKind::Crc32 => "crc32",
            ChecksumKind::Crc32Small => "crc32-small",
            ChecksumKind::Crc64 => "crc64",
            ChecksumKind::Crc64Small => "crc64-small",
            ChecksumKind::Fnv1a32 => "fnv1a32",
            ChecksumKind::Fnv1a64 => "fnv1a64",
        }
    }
}

impl fmt::Display for ChecksumKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned by [`ChecksumKind::from_str()`] for an unknown identifier.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct UnknownChecksum;

impl fmt::Display for UnknownChecksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unknown checksum algorithm")
    }
}

impl FromStr for ChecksumKind {
    type Err = UnknownChecksum;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChecksumKind::ALL
            .iter()
            .copied()
            .find(|k| k.id().eq_ignore_ascii_case(s))
            .ok_or(UnknownChecksum)
    }
}

#[derive(Clone)]
enum State {
    Crc32(Digest<'static, u32, Table<1>>),
    Crc32Small(Digest<'static, u32, NoTable>),
    Crc64(Digest<'static, u64, Table<1>>),
    Crc64Small(Digest<'static, u64, NoTable>),
    Fnv1a32(u32),
    Fnv1a64(u64),
}

/// Running checksum.
#[derive(Clone)]
pub struct Checksum {
    kind: ChecksumKind,
    state: State,
}

impl Checksum {
    /// Checksum of the empty input.
    pub fn new(kind: ChecksumKind) -> Self {
        let state = match kind {
            ChecksumKind::Crc32 => State::Crc32(CRC32.digest()),
            ChecksumKind::Crc32Small => State::Crc32Small(CRC32_SMALL.digest()),
            ChecksumKind::Crc64 => State::Crc64(CRC64.digest()),
            ChecksumKind::Crc64Small => State::Crc64Small(CRC64_SMALL.digest()),
            ChecksumKind::Fnv1a32 => State::Fnv1a32(FNV32_OFFSET),
            ChecksumKind::Fnv1a64 => State::Fnv1a64(FNV64_OFFSET),
        };
        Self { kind, state }
    }

    /// The algorithm.
    pub fn kind(&self) -> ChecksumKind {
        self.kind
    }

    /// Feed more bytes.
    pub fn update(&mut self, data: &[u8]) {
        match &mut self.state {
            State::Crc32(d) => d.update(data),
            State::Crc32Small(d) => d.update(data),
            State::Crc64(d) => d.update(data),
            State::Crc64Small(d) => d.update(data),
            State::Fnv1a32(h) => {
                for &b in data {
                    *h = (*h ^ b as u32).wrapping_mul(FNV32_PRIME);
                }
            }
            State::Fnv1a64(h) => {
                for &b in data {
                    *h = (*h ^ b as u64).wrapping_mul(FNV64_PRIME);
                }
            }
        }
    }

    /// Current value, zero-extended to 64 bits.
    pub fn value(&self) -> u64 {
        match &self.state {
            State::Crc32(d) => d.clone().finalize() as u64,
            State::Crc32Small(d) => d.clone().finalize() as u64,
            State::Crc64(d) => d.clone().finalize(),
            State::Crc64Small(d) => d.clone().finalize(),
            State::Fnv1a32(h) => *h as u64,
            State::Fnv1a64(h) => *h,
        }
    }

    /// Little-endian stored form; only the first `width()` bytes are used.
    pub fn to_le_bytes(&self) -> [u8; MAX_WIDTH] {
        self.value().to_le_bytes()
    }

    /// `true` if `stored` begins with the stored form of this checksum.
    pub fn matches(&self, stored: &[u8]) -> bool {
        let w = self.kind.width();
        stored.len() >= w && stored[..w] == self.to_le_bytes()[..w]
    }
}

impl fmt::Debug for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Checksum")
            .field("kind", &self.kind)
            .field("value", &self.value())
            .finish()
    }
}

/// Checksum of `data`.
pub fn checksum(kind: ChecksumKind, data: &[u8]) -> u64 {
    let mut c = Checksum::new(kind);
    c.update(data);
    c.value()
}

/// Writes the checksum of `buf[..len]` right after it.
///
/// Returns the new length, or `None` if `buf` cannot hold the checksum.
pub fn append(kind: ChecksumKind, buf: &mut [u8], len: usize) -> Option<usize> {
    let end = len.checked_add(kind.width())?;
    if end > buf.len() {
        return None;
    }
    let mut c = Checksum::new(kind);
    c.update(&buf[..len]);
    buf[len..end].copy_from_slice(&c.to_le_bytes()[..kind.width()]);
    Some(end)
}

/// Finds the payload length of a signed image.
///
/// Scans from offset 0 and returns the first offset whose following
/// bytes hold the checksum of all bytes before it. Returns `0` when no
/// offset matches.
pub fn validate(kind: ChecksumKind, data: &[u8]) -> usize {
    let w = kind.width();
    let mut c = Checksum::new(kind);
    let mut offset = 0;
    while offset + w <= data.len() {
        if c.matches(&data[offset..]) {
            return offset;
        }
        c.update(&data[offset..offset + 1]);
        offset += 1;
    }
    0
}

/// Incremental form of [`validate()`] over a stream of chunks.
///
/// Feeding the image in any split gives the same first match as
/// `validate()` over the whole image, without buffering it.
#[derive(Clone, Debug)]
pub struct ChecksumScanner {
    running: Checksum,
    window: [u8; MAX_WIDTH],
    filled: usize,
    offset: usize,
    found: Option<usize>,
}

impl ChecksumScanner {
    /// Creates an empty scanner.
    pub fn new(kind: ChecksumKind) -> Self {
        Self {
            running: Checksum::new(kind),
            window: [0; MAX_WIDTH],
            filled: 0,
            offset: 0,
            found: None,
        }
    }

    /// Forget everything seen so far.
    pub fn reset(&mut self) {
        *self = Self::new(self.running.kind());
    }

    /// Feed the next chunk of the image.
    pub fn update(&mut self, data: &[u8]) {
        let w = self.running.kind().width();
        for &b in data {
            if self.found.is_some() {
                return;
            }
            self.window[self.filled] = b;
            self.filled += 1;
            if self.filled < w {
                continue;
            }
            if self.running.matches(&self.window[..w]) {
                self.found = Some(self.offset);
                return;
            }
            self.running.update(&self.window[..1]);
            self.window.copy_within(1..w, 0);
            self.filled -= 1;
            self.offset += 1;
        }
    }

    /// Payload length of the first match, if any.
    pub fn found(&self) -> Option<usize> {
        self.found
    }
}
