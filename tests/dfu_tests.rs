mod helpers;
use helpers::*;

use usbd_class_tester::prelude::*;

use usb_device::bus::UsbBusAllocator;
use usb_device::class::UsbClass;
use usbd_secure_dfu::class::*;
use usbd_secure_dfu::{ChainMode, Cipher, CipherKind};

pub struct TestMem {
    flash: MemRegion,
}

impl DFUMemIO for TestMem {
    const TRANSFER_SIZE: u16 = 128;

    fn flash_region(&self) -> MemRegion {
        self.flash
    }

    fn eeprom_region(&self) -> Option<MemRegion> {
        Some(EEPROM_REGION)
    }

    fn program_flash(&mut self, address: u32, data: &[u8]) -> Result<(), DFUMemError> {
        program_flash(address, data)
    }

    fn program_eeprom(&mut self, address: u32, data: &[u8]) -> Result<(), DFUMemError> {
        program_eeprom(address, data)
    }

    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<(), DFUMemError> {
        read_flash(address, buf)
    }

    fn manifestation(&mut self, checked_length: Option<u32>) -> Result<(), DFUManifestationError> {
        record_manifestation(checked_length);
        Ok(())
    }

    fn usb_reset(&mut self) {
        record_usb_reset();
    }
}

/// Default DFU class factory
struct MkDFU {
    kind: CipherKind,
    mode: ChainMode,
    flash: MemRegion,
}

impl MkDFU {
    fn new() -> Self {
        Self::with_cipher(CipherKind::Rc5, ChainMode::Cbc)
    }

    fn with_cipher(kind: CipherKind, mode: ChainMode) -> Self {
        Self {
            kind,
            mode,
            flash: FLASH_REGION,
        }
    }

    fn with_flash_length(mut self, length: u32) -> Self {
        self.flash.length = length;
        self
    }
}

impl UsbDeviceCtx for MkDFU {
    type C<'c> = DFUClass<EmulatedUsbBus, TestMem, Cipher>;
    const EP0_SIZE: u8 = 32;

    fn create_class<'a>(
        &mut self,
        alloc: &'a UsbBusAllocator<EmulatedUsbBus>,
    ) -> AnyResult<DFUClass<EmulatedUsbBus, TestMem, Cipher>> {
        let mem = TestMem { flash: self.flash };
        Ok(DFUClass::new(alloc, mem, test_cipher(self.kind, self.mode)))
    }
}

const POLL: u32 = 20;

fn image(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 13 + 5) as u8).collect()
}

#[test]
fn test_get_configuration() {
    reset_mem();

    MkDFU::new()
        .with_usb(|mut dfu, mut dev| {
            let vec = dev
                .device_get_descriptor(&mut dfu, 2, 0, 0, 255)
                .expect("vec");

            #[rustfmt::skip]
            let expected: [u8; 45] = [
                /* Configuration */
                9, 2, 45, 0, 1, 1, 0, 0xc0, 125,
                /* Interface, alt 0, flash */
                9, 4, 0, 0, 0, 0xfe, 0x01, 0x02, 4,
                /* DFU Functional: Manifestation Tolerant, Can Upload, Can Download */
                9, 0x21, 0x07, 200, 0, 128, 0, 0x10, 0x01,
                /* Interface, alt 1, EEPROM */
                9, 4, 0, 1, 0, 0xfe, 0x01, 0x02, 5,
                /* DFU Functional */
                9, 0x21, 0x07, 200, 0, 128, 0, 0x10, 0x01,
            ];
            assert_eq!(&vec[..], &expected);

            let s = dev.device_get_string(&mut dfu, 4, 0x409).expect("str");
            assert_eq!(s, "Internal flash");

            let s = dev.device_get_string(&mut dfu, 5, 0x409).expect("str");
            assert_eq!(s, "Internal EEPROM");

            /* Unknown language */
            dev.device_get_string(&mut dfu, 4, 0x407).expect_err("stall");
        })
        .expect("with_usb");
}

#[test]
fn test_download_whole_image() {
    reset_mem();

    MkDFU::new()
        .with_usb(|mut dfu, mut dev| {
            let mut vec: Vec<u8>;
            let plain = image(512);
            let encrypted = encrypt_image(CipherKind::Rc5, ChainMode::Cbc, &plain);

            /* Get Status */
            vec = dev.get_status(&mut dfu).expect("vec");
            assert_eq!(&vec[..], &status(STATUS_OK, POLL, DFU_IDLE));

            /* Select flash */
            vec = dev.set_interface(&mut dfu, 0).expect("vec");
            assert_eq!(&vec[..], &[]);

            for (n, block) in encrypted.chunks(128).enumerate() {
                /* Download, block number is not used */
                vec = dev.download(&mut dfu, n as u16 + 2, block).expect("vec");
                assert_eq!(&vec[..], &[]);

                /* Get Status */
                vec = dev.get_status(&mut dfu).expect("vec");
                assert_eq!(&vec[..], &status(STATUS_OK, POLL, DFU_DNLOAD_IDLE));
            }

            assert_eq!(dfu.get_address_pointer(), FLASH_BASE + 512);

            /* Download len 0, trigger manifestation */
            vec = dev.download(&mut dfu, 0, &[]).expect("vec");
            assert_eq!(&vec[..], &[]);

            /* Get State */
            vec = dev.get_state(&mut dfu).expect("vec");
            assert_eq!(&vec[..], &[DFU_MANIFEST_SYNC]);

            /* Get Status, reply has the state before manifestation */
            vec = dev.get_status(&mut dfu).expect("vec");
            assert_eq!(&vec[..], &status(STATUS_OK, POLL, DFU_MANIFEST_SYNC));

            /* Get Status */
            vec = dev.get_status(&mut dfu).expect("vec");
            assert_eq!(&vec[..], &status(STATUS_OK, POLL, DFU_IDLE));

            assert_eq!(dfu.get_address_pointer(), FLASH_BASE);

            with_mem(|st| {
                assert_eq!(&st.flash[..512], &plain[..]);
                assert!(st.flash[512..].iter().all(|&b| b == 0xff));
                assert_eq!(st.manifested, vec![None]);
            });
        })
        .expect("with_usb");
}

#[test]
fn test_download_stream_cipher_odd_blocks() {
    reset_mem();

    MkDFU::with_cipher(CipherKind::ChaCha20, ChainMode::Ecb)
        .with_usb(|mut dfu, mut dev| {
            let mut vec: Vec<u8>;
            let plain = image(300);
            let encrypted = encrypt_image(CipherKind::ChaCha20, ChainMode::Ecb, &plain);

            for block in encrypted.chunks(77) {
                vec = dev.download(&mut dfu, 2, block).expect("vec");
                assert_eq!(&vec[..], &[]);
            }

            /* Get Status */
            vec = dev.get_status(&mut dfu).expect("vec");
            assert_eq!(&vec[..], &status(STATUS_OK, POLL, DFU_DNLOAD_IDLE));

            with_mem(|st| assert_eq!(&st.flash[..300], &plain[..]));
        })
        .expect("with_usb");
}

#[test]
fn test_download_past_region_end() {
    reset_mem();

    MkDFU::new()
        .with_usb(|mut dfu, mut dev| {
            let mut vec: Vec<u8>;
            let encrypted = encrypt_image(CipherKind::Rc5, ChainMode::Cbc, &image(1024 + 8));

            for block in encrypted[..1024].chunks(128) {
                vec = dev.download(&mut dfu, 2, block).expect("vec");
                assert_eq!(&vec[..], &[]);
            }

            /* One block too many, accepted but refused */
            vec = dev.download(&mut dfu, 2, &encrypted[1024..]).expect("vec");
            assert_eq!(&vec[..], &[]);

            /* Get Status */
            vec = dev.get_status(&mut dfu).expect("vec");
            assert_eq!(&vec[..], &status(STATUS_ERR_ADDRESS, POLL, DFU_ERROR));

            /* Download in error state stalls */
            dev.download(&mut dfu, 2, &encrypted[1024..])
                .expect_err("stall");

            /* Get Status */
            vec = dev.get_status(&mut dfu).expect("vec");
            assert_eq!(&vec[..], &status(STATUS_ERR_STALLED_PKT, POLL, DFU_ERROR));

            /* Abort does not leave the error state */
            dev.abort(&mut dfu).expect_err("stall");

            /* Clear Status */
            vec = dev.clear_status(&mut dfu).expect("vec");
            assert_eq!(&vec[..], &[]);

            /* Get Status */
            vec = dev.get_status(&mut dfu).expect("vec");
            assert_eq!(&vec[..], &status(STATUS_OK, POLL, DFU_IDLE));
        })
        .expect("with_usb");
}

#[test]
fn test_download_unaligned_block() {
    reset_mem();

    MkDFU::new()
        .with_usb(|mut dfu, mut dev| {
            let mut vec: Vec<u8>;

            /* RC5 block is 8 bytes */
            vec = dev.download(&mut dfu, 2, &[0x55; 12]).expect("vec");
            assert_eq!(&vec[..], &[]);

            /* Get Status */
            vec = dev.get_status(&mut dfu).expect("vec");
            assert_eq!(&vec[..], &status(STATUS_ERR_FILE, POLL, DFU_ERROR));
        })
        .expect("with_usb");

    with_mem(|st| assert!(st.flash.iter().all(|&b| b == 0xff)));
}

#[test]
fn test_download_program_error() {
    reset_mem();
    with_mem(|st| st.fail_program = Some(DFUMemError::Prog));

    MkDFU::new()
        .with_usb(|mut dfu, mut dev| {
            let mut vec: Vec<u8>;

            vec = dev.download(&mut dfu, 2, &[0; 16]).expect("vec");
            assert_eq!(&vec[..], &[]);

            /* Get Status */
            vec = dev.get_status(&mut dfu).expect("vec");
            assert_eq!(&vec[..], &status(STATUS_ERR_PROG, POLL, DFU_ERROR));

            /* Get State */
            vec = dev.get_state(&mut dfu).expect("vec");
            assert_eq!(&vec[..], &[DFU_ERROR]);

            /* Address pointer is not advanced */
            assert_eq!(dfu.get_address_pointer(), FLASH_BASE);
        })
        .expect("with_usb");
}

#[test]
fn test_download_restarts_after_abort() {
    reset_mem();

    MkDFU::new()
        .with_usb(|mut dfu, mut dev| {
            let mut vec: Vec<u8>;
            let plain = image(256);
            let encrypted = encrypt_image(CipherKind::Rc5, ChainMode::Cbc, &plain);

            /* Garbage first block */
            vec = dev.download(&mut dfu, 2, &[0xAA; 128]).expect("vec");
            assert_eq!(&vec[..], &[]);

            /* Abort */
            vec = dev.abort(&mut dfu).expect("vec");
            assert_eq!(&vec[..], &[]);

            /* Get Status */
            vec = dev.get_status(&mut dfu).expect("vec");
            assert_eq!(&vec[..], &status(STATUS_OK, POLL, DFU_IDLE));

            /* Cipher state and address pointer start over */
            for block in encrypted.chunks(128) {
                vec = dev.download(&mut dfu, 2, block).expect("vec");
                assert_eq!(&vec[..], &[]);
            }

            with_mem(|st| assert_eq!(&st.flash[..256], &plain[..]));
        })
        .expect("with_usb");
}

#[test]
fn test_upload_whole_region() {
    reset_mem();
    with_mem(|st| st.fill_flash_pattern());

    MkDFU::new()
        .with_usb(|mut dfu, mut dev| {
            let mut vec: Vec<u8>;
            let mut uploaded = Vec::new();

            for _ in 0..(FLASH_SIZE / 128) {
                vec = dev.upload(&mut dfu, 2, 128).expect("vec");
                assert_eq!(vec.len(), 128);
                uploaded.extend_from_slice(&vec);

                /* Get Status */
                vec = dev.get_status(&mut dfu).expect("vec");
                assert_eq!(&vec[..], &status(STATUS_OK, POLL, DFU_UPLOAD_IDLE));
            }

            /* Short frame at the end, back to idle */
            vec = dev.upload(&mut dfu, 2, 128).expect("vec");
            assert_eq!(&vec[..], &[]);

            /* Get Status */
            vec = dev.get_status(&mut dfu).expect("vec");
            assert_eq!(&vec[..], &status(STATUS_OK, POLL, DFU_IDLE));

            with_mem(|st| {
                assert_ne!(uploaded, st.flash);
                assert_eq!(decrypt_image(CipherKind::Rc5, ChainMode::Cbc, &uploaded), st.flash);
            });
        })
        .expect("with_usb");
}

#[test]
fn test_upload_unaligned_region() {
    reset_mem();
    with_mem(|st| st.fill_flash_pattern());

    MkDFU::new()
        .with_flash_length(1020)
        .with_usb(|mut dfu, mut dev| {
            let mut vec: Vec<u8>;
            let mut uploaded = Vec::new();

            for _ in 0..7 {
                vec = dev.upload(&mut dfu, 2, 128).expect("vec");
                assert_eq!(vec.len(), 128);
                uploaded.extend_from_slice(&vec);
            }

            /* 124 bytes left, zero padded to an RC5 block */
            vec = dev.upload(&mut dfu, 2, 128).expect("vec");
            assert_eq!(vec.len(), 128);
            uploaded.extend_from_slice(&vec);
            assert_eq!(dfu.get_address_pointer(), FLASH_BASE + 1020);

            /* Get Status */
            vec = dev.get_status(&mut dfu).expect("vec");
            assert_eq!(&vec[..], &status(STATUS_OK, POLL, DFU_UPLOAD_IDLE));

            /* Short frame at the end, back to idle */
            vec = dev.upload(&mut dfu, 2, 128).expect("vec");
            assert_eq!(&vec[..], &[]);

            /* Get Status */
            vec = dev.get_status(&mut dfu).expect("vec");
            assert_eq!(&vec[..], &status(STATUS_OK, POLL, DFU_IDLE));

            let plain = decrypt_image(CipherKind::Rc5, ChainMode::Cbc, &uploaded);
            with_mem(|st| assert_eq!(&plain[..1020], &st.flash[..1020]));
            assert_eq!(&plain[1020..], &[0; 4]);
        })
        .expect("with_usb");
}

#[test]
fn test_upload_rounds_to_cipher_block() {
    reset_mem();
    with_mem(|st| st.fill_flash_pattern());

    MkDFU::new()
        .with_usb(|mut dfu, mut dev| {
            let mut vec: Vec<u8>;

            /* 20 bytes requested, 16 sent */
            vec = dev.upload(&mut dfu, 2, 20).expect("vec");
            assert_eq!(vec.len(), 16);
            assert_eq!(dfu.get_address_pointer(), FLASH_BASE + 16);

            /* Less than one block */
            dev.upload(&mut dfu, 2, 5).expect_err("stall");

            /* Get Status */
            vec = dev.get_status(&mut dfu).expect("vec");
            assert_eq!(&vec[..], &status(STATUS_ERR_STALLED_PKT, POLL, DFU_ERROR));
        })
        .expect("with_usb");
}

#[test]
fn test_upload_after_download_stalls() {
    reset_mem();

    MkDFU::new()
        .with_usb(|mut dfu, mut dev| {
            let mut vec: Vec<u8>;

            vec = dev.download(&mut dfu, 2, &[0; 8]).expect("vec");
            assert_eq!(&vec[..], &[]);

            dev.upload(&mut dfu, 2, 128).expect_err("stall");

            /* Get Status */
            vec = dev.get_status(&mut dfu).expect("vec");
            assert_eq!(&vec[..], &status(STATUS_ERR_STALLED_PKT, POLL, DFU_ERROR));
        })
        .expect("with_usb");
}

#[test]
fn test_eeprom_alt_setting() {
    reset_mem();

    MkDFU::new()
        .with_usb(|mut dfu, mut dev| {
            let mut vec: Vec<u8>;
            let plain = image(64);
            let encrypted = encrypt_image(CipherKind::Rc5, ChainMode::Cbc, &plain);

            /* Select EEPROM */
            vec = dev.set_interface(&mut dfu, 1).expect("vec");
            assert_eq!(&vec[..], &[]);
            assert_eq!(dfu.target(), DFUTarget::Eeprom);
            assert_eq!(dfu.get_address_pointer(), EEPROM_BASE);

            /* Get Interface */
            vec = dev.get_interface(&mut dfu).expect("vec");
            assert_eq!(&vec[..], &[1]);

            vec = dev.download(&mut dfu, 2, &encrypted).expect("vec");
            assert_eq!(&vec[..], &[]);

            vec = dev.download(&mut dfu, 2, &[0; 128]).expect("vec");
            assert_eq!(&vec[..], &[]);

            /* EEPROM is smaller than flash */
            vec = dev.download(&mut dfu, 2, &[0; 128]).expect("vec");
            assert_eq!(&vec[..], &[]);

            /* Get Status */
            vec = dev.get_status(&mut dfu).expect("vec");
            assert_eq!(&vec[..], &status(STATUS_ERR_ADDRESS, POLL, DFU_ERROR));

            /* Unknown alternate setting */
            dev.set_interface(&mut dfu, 2).expect_err("stall");
            assert_eq!(dfu.target(), DFUTarget::Eeprom);

            /* Back to flash, setting the interface clears the error */
            vec = dev.set_interface(&mut dfu, 0).expect("vec");
            assert_eq!(&vec[..], &[]);
            assert_eq!(dfu.target(), DFUTarget::Flash);

            /* Get Status */
            vec = dev.get_status(&mut dfu).expect("vec");
            assert_eq!(&vec[..], &status(STATUS_OK, POLL, DFU_IDLE));

            with_mem(|st| {
                assert_eq!(&st.eeprom[..64], &plain[..]);
                assert!(st.flash.iter().all(|&b| b == 0xff));
            });
        })
        .expect("with_usb");
}

#[test]
fn test_detach_resets_on_usb_reset() {
    reset_mem();

    MkDFU::new()
        .with_usb(|mut dfu, mut dev| {
            let vec: Vec<u8>;

            /* Detach */
            vec = dev.detach(&mut dfu, 200).expect("vec");
            assert_eq!(&vec[..], &[]);
            assert_eq!(with_mem(|st| st.usb_resets), 0);

            UsbClass::<EmulatedUsbBus>::reset(&mut dfu);
            assert_eq!(with_mem(|st| st.usb_resets), 1);

            /* Not armed any more */
            UsbClass::<EmulatedUsbBus>::reset(&mut dfu);
            assert_eq!(with_mem(|st| st.usb_resets), 1);
        })
        .expect("with_usb");
}

#[test]
fn test_usb_reset_after_manifestation() {
    reset_mem();

    MkDFU::new()
        .with_usb(|mut dfu, mut dev| {
            let mut vec: Vec<u8>;
            let encrypted = encrypt_image(CipherKind::Rc5, ChainMode::Cbc, &image(128));

            vec = dev.download(&mut dfu, 2, &encrypted).expect("vec");
            assert_eq!(&vec[..], &[]);

            /* Download len 0, trigger manifestation */
            vec = dev.download(&mut dfu, 0, &[]).expect("vec");
            assert_eq!(&vec[..], &[]);

            /* Get Status */
            vec = dev.get_status(&mut dfu).expect("vec");
            assert_eq!(&vec[..], &status(STATUS_OK, POLL, DFU_MANIFEST_SYNC));

            /* Get Status */
            vec = dev.get_status(&mut dfu).expect("vec");
            assert_eq!(&vec[..], &status(STATUS_OK, POLL, DFU_IDLE));
            assert_eq!(with_mem(|st| st.usb_resets), 0);

            /* Bus reset leaves the bootloader without a detach */
            UsbClass::<EmulatedUsbBus>::reset(&mut dfu);
            assert_eq!(with_mem(|st| st.usb_resets), 1);

            /* Only once */
            UsbClass::<EmulatedUsbBus>::reset(&mut dfu);
            assert_eq!(with_mem(|st| st.usb_resets), 1);

            /* Get Status */
            vec = dev.get_status(&mut dfu).expect("vec");
            assert_eq!(&vec[..], &status(STATUS_OK, POLL, DFU_IDLE));
        })
        .expect("with_usb");
}

#[test]
fn test_usb_reset_during_download() {
    reset_mem();

    MkDFU::new()
        .with_usb(|mut dfu, mut dev| {
            let mut vec: Vec<u8>;

            vec = dev.download(&mut dfu, 2, &[0; 8]).expect("vec");
            assert_eq!(&vec[..], &[]);

            UsbClass::<EmulatedUsbBus>::reset(&mut dfu);

            /* Get Status */
            vec = dev.get_status(&mut dfu).expect("vec");
            assert_eq!(&vec[..], &status(STATUS_ERR_USBR, POLL, DFU_ERROR));
        })
        .expect("with_usb");

    assert_eq!(with_mem(|st| st.usb_resets), 0);
}

#[test]
fn test_bad_requests() {
    reset_mem();

    MkDFU::new()
        .with_usb(|mut dfu, mut dev| {
            let mut vec: Vec<u8>;

            /* Clear Status outside of the error state */
            dev.clear_status(&mut dfu).expect_err("stall");

            /* Get Status */
            vec = dev.get_status(&mut dfu).expect("vec");
            assert_eq!(&vec[..], &status(STATUS_ERR_STALLED_PKT, POLL, DFU_ERROR));

            /* Clear Status */
            vec = dev.clear_status(&mut dfu).expect("vec");
            assert_eq!(&vec[..], &[]);

            /* Unknown class request */
            dev.read(&mut dfu, 0x7, 0, 0, 1).expect_err("stall");

            /* Get State */
            vec = dev.get_state(&mut dfu).expect("vec");
            assert_eq!(&vec[..], &[DFU_ERROR]);

            /* Clear Status */
            vec = dev.clear_status(&mut dfu).expect("vec");
            assert_eq!(&vec[..], &[]);

            /* Short Get Status */
            dev.read(&mut dfu, 0x3, 0, 0, 2).expect_err("stall");

            /* Get State */
            vec = dev.get_state(&mut dfu).expect("vec");
            assert_eq!(&vec[..], &[DFU_ERROR]);
        })
        .expect("with_usb");
}

#[test]
fn test_manifestation_from_idle() {
    reset_mem();

    MkDFU::new()
        .with_usb(|mut dfu, mut dev| {
            let mut vec: Vec<u8>;

            /* Download len 0 */
            vec = dev.download(&mut dfu, 0, &[]).expect("vec");
            assert_eq!(&vec[..], &[]);

            /* Abort from manifest sync */
            vec = dev.abort(&mut dfu).expect("vec");
            assert_eq!(&vec[..], &[]);

            /* Get Status */
            vec = dev.get_status(&mut dfu).expect("vec");
            assert_eq!(&vec[..], &status(STATUS_OK, POLL, DFU_IDLE));
        })
        .expect("with_usb");

    assert!(with_mem(|st| st.manifested.is_empty()));
}

#[test]
fn test_err_por() {
    reset_mem();

    MkDFU::new()
        .with_usb(|mut dfu, mut dev| {
            let mut vec: Vec<u8>;

            dfu.set_unexpected_reset_state();

            /* Get Status */
            vec = dev.get_status(&mut dfu).expect("vec");
            assert_eq!(&vec[..], &status(STATUS_ERR_POR, POLL, DFU_ERROR));

            /* Clear Status */
            vec = dev.clear_status(&mut dfu).expect("vec");
            assert_eq!(&vec[..], &[]);

            /* Get Status */
            vec = dev.get_status(&mut dfu).expect("vec");
            assert_eq!(&vec[..], &status(STATUS_OK, POLL, DFU_IDLE));
        })
        .expect("with_usb");
}

#[test]
fn test_err_firmware() {
    reset_mem();

    MkDFU::new()
        .with_usb(|mut dfu, mut dev| {
            let vec: Vec<u8>;

            dfu.set_firmware_corrupted_state();

            /* Get Status */
            vec = dev.get_status(&mut dfu).expect("vec");
            assert_eq!(&vec[..], &status(STATUS_ERR_FIRMWARE, POLL, DFU_ERROR));

            /* Download is refused until the error is cleared */
            dev.download(&mut dfu, 2, &[0; 8]).expect_err("stall");
        })
        .expect("with_usb");
}
