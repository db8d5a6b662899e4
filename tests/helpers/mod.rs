#![allow(dead_code)]
use usb_device::class::UsbClass;
use usbd_class_tester::prelude::*;
use usbd_secure_dfu::{config, ChainMode, Cipher, CipherKind, DFUCipher, DFUMemError, MemRegion};

use std::cell::RefCell;

// State
pub const APP_IDLE: u8 = 0;
pub const APP_DETACH: u8 = 1;
pub const DFU_IDLE: u8 = 2;
pub const DFU_DNLOAD_SYNC: u8 = 3;
pub const DFU_DN_BUSY: u8 = 4;
pub const DFU_DNLOAD_IDLE: u8 = 5;
pub const DFU_MANIFEST_SYNC: u8 = 6;
pub const DFU_MANIFEST: u8 = 7;
pub const DFU_MANIFEST_WAIT_RESET: u8 = 8;
pub const DFU_UPLOAD_IDLE: u8 = 9;
pub const DFU_ERROR: u8 = 10;

pub const STATUS_OK: u8 = 0x00;
pub const STATUS_ERR_TARGET: u8 = 0x01;
pub const STATUS_ERR_FILE: u8 = 0x02;
pub const STATUS_ERR_WRITE: u8 = 0x03;
pub const STATUS_ERR_ERASE: u8 = 0x04;
pub const STATUS_ERR_CHECK_ERASED: u8 = 0x05;
pub const STATUS_ERR_PROG: u8 = 0x06;
pub const STATUS_ERR_VERIFY: u8 = 0x07;
pub const STATUS_ERR_ADDRESS: u8 = 0x08;
pub const STATUS_ERR_NOTDONE: u8 = 0x09;
pub const STATUS_ERR_FIRMWARE: u8 = 0x0A;
pub const STATUS_ERR_VENDOR: u8 = 0x0B;
pub const STATUS_ERR_USBR: u8 = 0x0C;
pub const STATUS_ERR_POR: u8 = 0x0D;
pub const STATUS_ERR_UNKNOWN: u8 = 0x0E;
pub const STATUS_ERR_STALLED_PKT: u8 = 0x0F;

pub const FLASH_BASE: u32 = 0x0800_2000;
pub const FLASH_SIZE: u32 = 1024;
pub const EEPROM_BASE: u32 = 0x0808_0000;
pub const EEPROM_SIZE: u32 = 256;

pub const FLASH_REGION: MemRegion = MemRegion {
    start: FLASH_BASE,
    length: FLASH_SIZE,
};
pub const EEPROM_REGION: MemRegion = MemRegion {
    start: EEPROM_BASE,
    length: EEPROM_SIZE,
};

/// Emulated memories and a record of the calls made by the class.
pub struct MemState {
    pub flash: Vec<u8>,
    pub eeprom: Vec<u8>,
    pub manifested: Vec<Option<u32>>,
    pub usb_resets: usize,
    pub fail_program: Option<DFUMemError>,
}

impl MemState {
    fn new() -> Self {
        MemState {
            flash: vec![0xff; FLASH_SIZE as usize],
            eeprom: vec![0xff; EEPROM_SIZE as usize],
            manifested: Vec::new(),
            usb_resets: 0,
            fail_program: None,
        }
    }

    pub fn fill_flash_pattern(&mut self) {
        for (i, b) in self.flash.iter_mut().enumerate() {
            *b = (i * 7 + (i >> 8)) as u8;
        }
    }
}

// `with_usb()` takes a plain fn, so the memories the class writes to are
// kept per test thread instead of being captured by the test case.
thread_local! {
    static MEM: RefCell<MemState> = RefCell::new(MemState::new());
}

/// Fresh memories for the current test.
pub fn reset_mem() {
    MEM.with(|m| *m.borrow_mut() = MemState::new());
}

pub fn with_mem<R>(f: impl FnOnce(&mut MemState) -> R) -> R {
    MEM.with(|m| f(&mut m.borrow_mut()))
}

fn region_slice(
    mem: &mut [u8],
    base: u32,
    address: u32,
    len: usize,
) -> Result<&mut [u8], DFUMemError> {
    let offset = address.checked_sub(base).ok_or(DFUMemError::Address)? as usize;
    mem.get_mut(offset..offset + len).ok_or(DFUMemError::Address)
}

pub fn program_flash(address: u32, data: &[u8]) -> Result<(), DFUMemError> {
    with_mem(|st| {
        if let Some(e) = st.fail_program {
            return Err(e);
        }
        region_slice(&mut st.flash, FLASH_BASE, address, data.len())?.copy_from_slice(data);
        Ok(())
    })
}

pub fn program_eeprom(address: u32, data: &[u8]) -> Result<(), DFUMemError> {
    with_mem(|st| {
        if let Some(e) = st.fail_program {
            return Err(e);
        }
        region_slice(&mut st.eeprom, EEPROM_BASE, address, data.len())?.copy_from_slice(data);
        Ok(())
    })
}

pub fn read_flash(address: u32, buf: &mut [u8]) -> Result<(), DFUMemError> {
    with_mem(|st| {
        buf.copy_from_slice(region_slice(&mut st.flash, FLASH_BASE, address, buf.len())?);
        Ok(())
    })
}

pub fn record_manifestation(checked_length: Option<u32>) {
    with_mem(|st| st.manifested.push(checked_length));
}

pub fn record_usb_reset() {
    with_mem(|st| st.usb_resets += 1);
}

pub trait DeviceExt<C> {
    fn upload(&mut self, cls: &mut C, block_num: u16, length: usize) -> AnyResult<Vec<u8>>;

    fn read(
        &mut self,
        cls: &mut C,
        req: u8,
        value: u16,
        index: u16,
        length: u16,
    ) -> AnyResult<Vec<u8>>;
    fn write(
        &mut self,
        cls: &mut C,
        req: u8,
        value: u16,
        index: u16,
        length: u16,
        data: &[u8],
    ) -> AnyResult<Vec<u8>>;

    fn download(&mut self, cls: &mut C, block_num: u16, data: &[u8]) -> AnyResult<Vec<u8>>;
    fn get_status(&mut self, cls: &mut C) -> AnyResult<Vec<u8>>;
    fn clear_status(&mut self, cls: &mut C) -> AnyResult<Vec<u8>>;
    fn get_state(&mut self, cls: &mut C) -> AnyResult<Vec<u8>>;
    fn abort(&mut self, cls: &mut C) -> AnyResult<Vec<u8>>;
    fn detach(&mut self, cls: &mut C, timeout: u16) -> AnyResult<Vec<u8>>;
    fn set_interface(&mut self, cls: &mut C, alt: u16) -> AnyResult<Vec<u8>>;
    fn get_interface(&mut self, cls: &mut C) -> AnyResult<Vec<u8>>;
}

impl<'a, C, M> DeviceExt<C> for Device<'a, C, M>
where
    C: UsbClass<EmulatedUsbBus>,
    M: UsbDeviceCtx<C<'a> = C>,
{
    fn read(
        &mut self,
        cls: &mut C,
        req: u8,
        value: u16,
        index: u16,
        length: u16,
    ) -> AnyResult<Vec<u8>> {
        self.control_read(
            cls,
            CtrRequestType::to_host().class().interface(),
            req,
            value,
            index,
            length,
        )
    }

    fn write(
        &mut self,
        cls: &mut C,
        req: u8,
        value: u16,
        index: u16,
        length: u16,
        data: &[u8],
    ) -> AnyResult<Vec<u8>> {
        self.control_write(
            cls,
            CtrRequestType::to_device().class().interface(),
            req,
            value,
            index,
            length,
            data,
        )
    }

    fn download(&mut self, cls: &mut C, block_num: u16, data: &[u8]) -> AnyResult<Vec<u8>> {
        if data.len() > u16::MAX as usize {
            return Err(AnyUsbError::DataConversion);
        }
        self.write(cls, 0x1, block_num, 0, data.len() as u16, data)
    }

    fn upload(&mut self, cls: &mut C, block_num: u16, length: usize) -> AnyResult<Vec<u8>> {
        if length > u16::MAX as usize {
            return Err(AnyUsbError::DataConversion);
        }
        self.read(cls, 0x2, block_num, 0, length as u16)
    }

    fn get_status(&mut self, cls: &mut C) -> AnyResult<Vec<u8>> {
        self.read(cls, 0x3, 0, 0, 6)
    }

    fn clear_status(&mut self, cls: &mut C) -> AnyResult<Vec<u8>> {
        self.write(cls, 0x4, 0, 0, 0, &[])
    }

    fn get_state(&mut self, cls: &mut C) -> AnyResult<Vec<u8>> {
        self.read(cls, 0x5, 0, 0, 1)
    }

    fn abort(&mut self, cls: &mut C) -> AnyResult<Vec<u8>> {
        self.write(cls, 0x6, 0, 0, 0, &[])
    }

    fn detach(&mut self, cls: &mut C, timeout: u16) -> AnyResult<Vec<u8>> {
        self.write(cls, 0x0, timeout, 0, 0, &[])
    }

    fn set_interface(&mut self, cls: &mut C, alt: u16) -> AnyResult<Vec<u8>> {
        self.control_write(
            cls,
            CtrRequestType::to_device().interface(),
            0x0B,
            alt,
            0,
            0,
            &[],
        )
    }

    fn get_interface(&mut self, cls: &mut C) -> AnyResult<Vec<u8>> {
        self.control_read(cls, CtrRequestType::to_host().interface(), 0x0A, 0, 0, 1)
    }
}

/// Cipher used by the tests, a fresh instance per call.
pub fn test_cipher(kind: CipherKind, mode: ChainMode) -> Cipher {
    Cipher::new(kind, mode, config::default_key(kind), &config::NONCE).expect("cipher")
}

/// Host side of a download: encrypt `plain` as one stream.
pub fn encrypt_image(kind: CipherKind, mode: ChainMode, plain: &[u8]) -> Vec<u8> {
    let mut data = plain.to_vec();
    test_cipher(kind, mode).encrypt(&mut data).expect("aligned");
    data
}

/// Host side of an upload: decrypt `data` as one stream.
pub fn decrypt_image(kind: CipherKind, mode: ChainMode, data: &[u8]) -> Vec<u8> {
    let mut plain = data.to_vec();
    test_cipher(kind, mode).decrypt(&mut plain).expect("aligned");
    plain
}

pub fn status(status: u8, poll_timeout: u32, state: u8) -> [u8; 6] {
    let t = poll_timeout.to_le_bytes();
    [status, t[0], t[1], t[2], state, 0]
}
