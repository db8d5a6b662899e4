#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
//!
//! Implements an encrypted DFU 1.1 bootloader class for a `usb-device` device.
//!
//! ## About
//!
//! Firmware images are encrypted on the host with `sdfu-encrypter` and
//! decrypted by the device block by block while they are written to
//! flash or EEPROM. The key, the nonce and the cipher are compiled into
//! both the bootloader and the host tool, see [`config`].
//!
//! Optionally, an image carries a checksum right after the payload.
//! The device scans the decrypted stream for it and reports the payload
//! length to [`DFUMemIO::manifestation()`].
//!
//! Protocol implementation follows
//! USB Device Firmware Upgrade Specification, Revision 1.1.
//!
//! This library is a protocol implementation only, actual code
//! that programs or reads memory or flash is not a part
//! of the library and is expected to be provided by library
//! user.
//!
//! ### Supported operations
//!
//! * Write (host to device) - download command, sequential from the region start
//! * Read (device to host) - upload command, encrypted with the same cipher
//! * Detach - system reset on the following USB reset, as does a USB reset
//!   after a completed manifestation
//! * Flash and EEPROM targets selected by the interface alternate setting
//!
//! ### Ciphers
//!
//! [`cipher`] provides a set of block primitives (XTEA, RC5, RC6, SPECK,
//! Raiden, Blowfish, GOST/MAGMA, RTEA, AES) combined with a chaining mode
//! (ECB, CBC, PCBC, CFB, OFB, CTR), and two stream ciphers (ARCFOUR,
//! ChaCha20). [`Cipher`] selects one at run time, or a concrete
//! [`cipher::BlockChain`] can be used directly.
//!
//! ### Limitations
//!
//! * Maximum USB transfer size is limited to what `usb-device` supports
//! for control enpoint transfers, which is `128` bytes by default.
//!
//! * Every download block must be a multiple of the cipher block size.
//!
//! * Ciphertext is deterministic: the same image, key and nonce always
//! give the same bytes. This protects firmware confidentiality, not
//! authenticity.
//!
//! ## Example
//!
//! The example below tries to focus on [`DFUClass`], parts related to a target
//! controller initialization and configuration (USB, interrupts, GPIO, etc.)
//! are not in the scope of the example.
//!
//! ```no_run
//! use usb_device::bus::{UsbBus, UsbBusAllocator};
//! use usb_device::prelude::*;
//! use usbd_secure_dfu::*;
//!
//! // DFUClass will use MyMem to actually read or program the memory.
//!
//! struct MyMem {
//!     flash_memory: [u8; 1024],
//! }
//!
//! impl DFUMemIO for MyMem {
//!     const TRANSFER_SIZE: u16 = config::TRANSFER_SIZE;
//!     const POLL_TIMEOUT_MS: u32 = config::POLL_TIMEOUT_MS;
//!     const CHECKSUM: Option<ChecksumKind> = config::CHECKSUM;
//!
//!     fn flash_region(&self) -> MemRegion {
//!         MemRegion { start: 0, length: 1024 }
//!     }
//!
//!     fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<(), DFUMemError> {
//!         let offset = address as usize;
//!         buf.copy_from_slice(&self.flash_memory[offset..offset + buf.len()]);
//!         Ok(())
//!     }
//!
//!     fn program_flash(&mut self, address: u32, data: &[u8]) -> Result<(), DFUMemError> {
//!         let offset = address as usize;
//!         self.flash_memory[offset..offset + data.len()].copy_from_slice(data);
//!         Ok(())
//!     }
//! }
//!
//! fn run<B: UsbBus>(usb_bus_alloc: &UsbBusAllocator<B>) -> Result<(), CipherError> {
//!     let cipher = Cipher::new(
//!         config::CIPHER,
//!         config::MODE,
//!         config::default_key(config::CIPHER),
//!         &config::NONCE,
//!     )?;
//!
//!     let mut dfu = DFUClass::new(usb_bus_alloc, MyMem { flash_memory: [0xff; 1024] }, cipher);
//!
//!     let mut usb_dev = UsbDeviceBuilder::new(usb_bus_alloc, UsbVidPid(config::USB_VID, config::USB_PID))
//!         .strings(&[StringDescriptors::default()
//!             .manufacturer(config::MANUFACTURER)
//!             .product(config::PRODUCT)])
//!         .expect("strings")
//!         .build();
//!
//!     // usb_dev.poll() must be called periodically, usually from USB interrupt handlers.
//!     // When USB input/output is done, handlers in MyMem may be called.
//!     loop {
//!         usb_dev.poll(&mut [&mut dfu]);
//!     }
//! }
//! ```
//!

/// Image checksums
pub mod checksum;
/// Block and stream ciphers, chaining modes
pub mod cipher;
/// DFU protocol module
pub mod class;
pub mod config;

#[doc(inline)]
pub use crate::checksum::{ChecksumKind, ChecksumScanner};
#[doc(inline)]
pub use crate::cipher::{ChainMode, Cipher, CipherError, CipherKind, DFUCipher};
#[doc(inline)]
pub use crate::class::{
    DFUClass, DFUManifestationError, DFUMemError, DFUMemIO, DFUTarget, MemRegion,
};
