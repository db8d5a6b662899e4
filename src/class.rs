use core::cmp::min;
use core::marker::PhantomData;
use usb_device::{class_prelude::*, control::Request};

use crate::checksum::{Checksum, ChecksumKind, ChecksumScanner};
use crate::cipher::DFUCipher;
use crate::config;

const USB_CLASS_APPLICATION_SPECIFIC: u8 = 0xFE;
const USB_SUBCLASS_DFU: u8 = 0x01;
const USB_PROTOCOL_DFU_MODE: u8 = 0x02;

const DFU_DETACH: u8 = 0x00;
const DFU_DNLOAD: u8 = 0x01;
const DFU_UPLOAD: u8 = 0x02;
const DFU_GETSTATUS: u8 = 0x03;
const DFU_CLRSTATUS: u8 = 0x04;
const DFU_GETSTATE: u8 = 0x05;
const DFU_ABORT: u8 = 0x06;

const DESC_DESCTYPE_DFU: u8 = 0x21;

/// Largest supported [`DFUMemIO::TRANSFER_SIZE`], the size of the
/// internal block buffer.
pub const MAX_TRANSFER_SIZE: usize = 1024;

#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum DFUState {
    /// Device is running its normal application.
    #[allow(dead_code)]
    AppIdle = 0,
    /// Device is running its normal application, has received the DFU_DETACH request, and is waiting for a USB reset.
    #[allow(dead_code)]
    AppDetach = 1,
    /// Device is operating in the DFU mode and is waiting for requests.
    DfuIdle = 2,
    /// Device has received a block and is waiting for the host to solicit the status via DFU_GETSTATUS.
    DfuDnloadSync = 3,
    /// Device is programming a control-write block into its nonvolatile memories.
    #[allow(dead_code)]
    DfuDnBusy = 4,
    /// Device is processing a download operation. Expecting DFU_DNLOAD requests.
    DfuDnloadIdle = 5,
    /// Device has received the final block of firmware from the host and is waiting for receipt of DFU_GETSTATUS to begin the Manifestation phase.
    DfuManifestSync = 6,
    /// Device is in the Manifestation phase.
    #[allow(dead_code)]
    DfuManifest = 7,
    /// Device has programmed its memories and is waiting for a USB reset or a power on reset.
    #[allow(dead_code)]
    DfuManifestWaitReset = 8,
    /// The device is processing an upload operation. Expecting DFU_UPLOAD requests.
    DfuUploadIdle = 9,
    /// An error has occurred. Awaiting the DFU_CLRSTATUS request.
    DfuError = 10,
}

#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum DFUStatusCode {
    /// No error condition is present.
    OK = 0x00,
    /// File is not targeted for use by this device.
    ErrTarget = 0x01,
    /// File is for this device but fails some vendor-specific verification test.
    ErrFile = 0x02,
    /// Device is unable to write memory.
    ErrWrite = 0x03,
    /// Memory erase function failed.
    ErrErase = 0x04,
    /// Memory erase check failed.
    ErrCheckErased = 0x05,
    /// Program memory function failed.
    ErrProg = 0x06,
    /// Programmed memory failed verification.
    ErrVerify = 0x07,
    /// Cannot program memory due to received address that is out of range.
    ErrAddress = 0x08,
    /// Received DFU_DNLOAD with wLength = 0, but device does not think it has all of the data yet.
    ErrNotdone = 0x09,
    /// Device’s firmware is corrupt. It cannot return to run-time (non-DFU) operations.
    ErrFirmware = 0x0A,
    /// iString indicates a vendor-specific error.
    ErrVendor = 0x0B,
    /// Device detected unexpected USB reset signaling.
    ErrUsbr = 0x0C,
    /// Device detected unexpected power on reset.
    ErrPOR = 0x0D,
    /// Something went wrong, but the device does not know what it was.
    ErrUnknown = 0x0E,
    /// Device stalled an unexpected request.
    ErrStalledPkt = 0x0F,
}

/// Errors that may happen when working with the memory
/// (reading, writing). These will be translated
/// to a corresponding error codes in DFU protocol.
#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DFUMemError {
    /// File is not targeted for use by this device.
    Target = DFUStatusCode::ErrTarget as u8,
    /// File is for this device but fails some vendor-specific verification test.
    File = DFUStatusCode::ErrFile as u8,
    /// Device is unable to write memory.
    Write = DFUStatusCode::ErrWrite as u8,
    /// Memory erase function failed.
    Erase = DFUStatusCode::ErrErase as u8,
    /// Memory erase check failed.
    CheckErased = DFUStatusCode::ErrCheckErased as u8,
    /// Program memory function failed.
    Prog = DFUStatusCode::ErrProg as u8,
    /// Programmed memory failed verification.
    Verify = DFUStatusCode::ErrVerify as u8,
    /// Something went wrong, but the device does not know what it was.
    Unknown = DFUStatusCode::ErrUnknown as u8,
    /// Cannot program memory due to received address that is out of range.
    Address = DFUStatusCode::ErrAddress as u8,
    /// A vendor-specific error. iString in DFU_GETSTATUS reply will always be 0.
    ErrVendor = DFUStatusCode::ErrVendor as u8,
}

/// Errors that may happen when device enter Manifestation phase
#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DFUManifestationError {
    /// File is not targeted for use by this device.
    Target = DFUStatusCode::ErrTarget as u8,
    /// File is for this device but fails some vendor-specific verification test.
    File = DFUStatusCode::ErrFile as u8,
    /// Received DFU_DNLOAD with wLength = 0, but device does not think it has all of the data yet.
    NotDone = DFUStatusCode::ErrNotdone as u8,
    /// Device’s firmware is corrupt. It cannot return to run-time (non-DFU) operations.
    Firmware = DFUStatusCode::ErrFirmware as u8,
    /// A vendor-specific error. iString in DFU_GETSTATUS reply will always be 0.
    ErrVendor = DFUStatusCode::ErrVendor as u8,
    /// Something went wrong, but the device does not know what it was.
    Unknown = DFUStatusCode::ErrUnknown as u8,
}

/// Memory selected by the interface alternate setting.
#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DFUTarget {
    /// Application flash, alternate setting 0.
    Flash = 0,
    /// Data EEPROM, alternate setting 1.
    Eeprom = 1,
}

/// A contiguous memory region.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MemRegion {
    /// First address.
    pub start: u32,
    /// Size in bytes.
    pub length: u32,
}

/// Trait that describes the abstraction used to access memory
/// on a device. [`DFUClass`] will call corresponding
/// functions and will use provided constants to tailor
/// DFU features and time interval values that
/// are used in the protocol.
///
/// Every download block is written sequentially starting from the
/// beginning of the selected region. The data passed to
/// [`program_flash()`](DFUMemIO::program_flash) is already decrypted.
pub trait DFUMemIO {
    /// Interface string of alternate setting 0. Default is `"Internal flash"`.
    const FLASH_STRING: &'static str = "Internal flash";

    /// Interface string of alternate setting 1. Default is `"Internal EEPROM"`.
    const EEPROM_STRING: &'static str = "Internal EEPROM";

    /// If set, DFU descriptor will have *bitCanUpload* bit set and
    /// upload requests are served. Default is `true`.
    const HAS_UPLOAD: bool = true;

    /// If set, `DFU_DETACH` is accepted and the next USB reset calls
    /// [`usb_reset()`](DFUMemIO::usb_reset). Default is `true`.
    const HAS_DETACH: bool = true;

    /// If set, a programmed block leaves the device in dfuDNLOAD-SYNC
    /// until the host asks for the status. Default is `false`, the device
    /// goes straight to dfuDNLOAD-IDLE.
    const DNLOAD_SYNC: bool = false;

    /// bwPollTimeout reported to the host, in milliseconds. Default is `20`.
    const POLL_TIMEOUT_MS: u32 = config::POLL_TIMEOUT_MS;

    /// wDetachTimeOut field in DFU descriptor. Default value: `200` ms.
    const DETACH_TIMEOUT: u16 = config::DETACH_TIMEOUT;

    /// Maximum allowed transfer size. Default value: `128` bytes.
    ///
    /// All DFU transfers use Control endpoint only.
    ///
    /// **Warning**: must be less or equal of `usb-device`'s control endpoint buffer size (usually `128` bytes),
    /// otherwise data transfers may fail for no obvious reason. Must not exceed [`MAX_TRANSFER_SIZE`].
    const TRANSFER_SIZE: u16 = config::TRANSFER_SIZE;

    /// Checksum expected at the end of downloaded images and appended
    /// to uploads. Default is `None`.
    const CHECKSUM: Option<ChecksumKind> = None;

    /// Application flash region.
    fn flash_region(&self) -> MemRegion;

    /// EEPROM region. When `None` alternate setting 1 is not offered.
    fn eeprom_region(&self) -> Option<MemRegion> {
        None
    }

    /// Program decrypted `data` to flash at `address`.
    ///
    /// This function is called from `usb_dev.poll([])` (USB interrupt context).
    fn program_flash(&mut self, address: u32, data: &[u8]) -> Result<(), DFUMemError>;

    /// Program decrypted `data` to EEPROM at `address`.
    fn program_eeprom(&mut self, address: u32, data: &[u8]) -> Result<(), DFUMemError> {
        let _ = (address, data);
        Err(DFUMemError::Target)
    }

    /// Read memory at `address` into `buf`. Used by upload, the result is
    /// encrypted before it is sent to the host.
    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<(), DFUMemError>;

    /// Called when the host finishes a download.
    ///
    /// `checked_length` is the payload length found by the checksum scan,
    /// `None` if [`CHECKSUM`](DFUMemIO::CHECKSUM) is not set or no checksum
    /// was found.
    ///
    /// This function is called from `usb_dev.poll([])` (USB interrupt context).
    fn manifestation(&mut self, checked_length: Option<u32>) -> Result<(), DFUManifestationError> {
        let _ = checked_length;
        Ok(())
    }

    /// Called on the first USB reset after `DFU_DETACH`, or after a
    /// completed manifestation while the device is back in dfuIDLE.
    ///
    /// Usually resets the system and does not return.
    fn usb_reset(&mut self) {}
}

impl From<DFUMemError> for DFUStatusCode {
    fn from(e: DFUMemError) -> Self {
        match e {
            DFUMemError::File => DFUStatusCode::ErrFile,
            DFUMemError::Target => DFUStatusCode::ErrTarget,
            DFUMemError::Address => DFUStatusCode::ErrAddress,
            DFUMemError::CheckErased => DFUStatusCode::ErrCheckErased,
            DFUMemError::Erase => DFUStatusCode::ErrErase,
            DFUMemError::Write => DFUStatusCode::ErrWrite,
            DFUMemError::Prog => DFUStatusCode::ErrProg,
            DFUMemError::Verify => DFUStatusCode::ErrVerify,
            DFUMemError::Unknown => DFUStatusCode::ErrUnknown,
            DFUMemError::ErrVendor => DFUStatusCode::ErrVendor,
        }
    }
}

impl From<DFUManifestationError> for DFUStatusCode {
    fn from(e: DFUManifestationError) -> Self {
        match e {
            DFUManifestationError::NotDone => DFUStatusCode::ErrNotdone,
            DFUManifestationError::Firmware => DFUStatusCode::ErrFirmware,
            DFUManifestationError::Unknown => DFUStatusCode::ErrUnknown,
            DFUManifestationError::ErrVendor => DFUStatusCode::ErrVendor,
            DFUManifestationError::File => DFUStatusCode::ErrFile,
            DFUManifestationError::Target => DFUStatusCode::ErrTarget,
        }
    }
}

#[derive(Clone, Copy)]
struct DFUStatus {
    status: DFUStatusCode,
    poll_timeout: u32,
    state: DFUState,
}

impl DFUStatus {
    fn new(poll_timeout: u32) -> Self {
        Self {
            status: DFUStatusCode::OK,
            poll_timeout,
            state: DFUState::DfuIdle,
        }
    }

    fn new_state_ok(&mut self, state: DFUState) {
        self.new_state_status(state, DFUStatusCode::OK);
    }

    fn new_state_status(&mut self, state: DFUState, status: DFUStatusCode) {
        self.status = status;
        self.state = state;
    }

    fn state(&self) -> DFUState {
        self.state
    }
}

impl From<DFUStatus> for [u8; 6] {
    fn from(dfu: DFUStatus) -> Self {
        [
            // bStatus
            dfu.status as u8,
            // bwPollTimeout
            (dfu.poll_timeout & 0xff) as u8,
            ((dfu.poll_timeout >> 8) & 0xff) as u8,
            ((dfu.poll_timeout >> 16) & 0xff) as u8,
            // bState
            dfu.state as u8,
            // iString: Index of status description in string table.
            0,
        ]
    }
}

/// DFU protocol USB class implementation for usb-device library.
///
/// Downloaded blocks are decrypted with `C` before they reach
/// [`DFUMemIO`], uploaded blocks are encrypted with it.
pub struct DFUClass<B: UsbBus, M: DFUMemIO, C: DFUCipher> {
    if_num: InterfaceNumber,
    flash_string: StringIndex,
    eeprom_string: Option<StringIndex>,
    status: DFUStatus,
    target: DFUTarget,
    address: u32,
    remaining: u32,
    detach_armed: bool,
    manifested: bool,
    buffer: [u8; MAX_TRANSFER_SIZE],
    scanner: Option<ChecksumScanner>,
    upload_sum: Option<Checksum>,
    trailer_sent: bool,
    cipher: C,
    _bus: PhantomData<B>,
    mem: M,
}

impl<B: UsbBus, M: DFUMemIO, C: DFUCipher> UsbClass<B> for DFUClass<B, M, C> {
    fn get_configuration_descriptors(
        &self,
        writer: &mut DescriptorWriter,
    ) -> usb_device::Result<()> {
        self.write_alt_descriptors(writer, DFUTarget::Flash as u8, self.flash_string)?;

        if let Some(s) = self.eeprom_string {
            self.write_alt_descriptors(writer, DFUTarget::Eeprom as u8, s)?;
        }

        Ok(())
    }

    fn get_string(&self, index: StringIndex, lang_id: LangID) -> Option<&str> {
        if lang_id != LangID::EN_US && u16::from(lang_id) != 0 {
            return None;
        }
        if index == self.flash_string {
            return Some(M::FLASH_STRING);
        }
        if Some(index) == self.eeprom_string {
            return Some(M::EEPROM_STRING);
        }
        None
    }

    fn get_alt_setting(&mut self, interface: InterfaceNumber) -> Option<u8> {
        if interface == self.if_num {
            Some(self.target as u8)
        } else {
            None
        }
    }

    fn set_alt_setting(&mut self, interface: InterfaceNumber, alternative: u8) -> bool {
        if interface != self.if_num {
            return false;
        }

        let target = match alternative {
            0 => DFUTarget::Flash,
            1 if self.eeprom_string.is_some() => DFUTarget::Eeprom,
            _ => return false,
        };

        self.target = target;
        self.set_idle();
        true
    }

    // Handle control requests to the host.
    fn control_in(&mut self, xfer: ControlIn<B>) {
        let req = *xfer.request();

        if req.request_type != control::RequestType::Class {
            return;
        }

        if req.recipient != control::Recipient::Interface {
            return;
        }

        if req.index != u8::from(self.if_num) as u16 {
            return;
        }

        match req.request {
            DFU_UPLOAD => {
                self.upload(xfer, req);
            }
            DFU_GETSTATUS => {
                self.get_status(xfer, req);
            }
            DFU_GETSTATE => {
                self.get_state(xfer, req);
            }
            _ => {
                self.bad_request();
                xfer.reject().ok();
            }
        }
    }

    // Handle a control request from the host.
    fn control_out(&mut self, xfer: ControlOut<B>) {
        let req = *xfer.request();

        if req.request_type != control::RequestType::Class {
            return;
        }

        if req.recipient != control::Recipient::Interface {
            return;
        }

        if req.index != u8::from(self.if_num) as u16 {
            return;
        }

        match req.request {
            DFU_DETACH if M::HAS_DETACH => {
                #[cfg(feature = "defmt")]
                defmt::debug!("dfu: detach armed");
                self.detach_armed = true;
                xfer.accept().ok();
            }
            DFU_DNLOAD => {
                self.download(xfer, req);
            }
            DFU_CLRSTATUS => {
                self.clear_status(xfer);
            }
            DFU_ABORT => {
                self.abort(xfer);
            }
            _ => {
                self.bad_request();
                xfer.reject().ok();
            }
        }
    }

    fn reset(&mut self) {
        let manifested = self.manifested && self.status.state() == DFUState::DfuIdle;
        if self.detach_armed || manifested {
            #[cfg(feature = "defmt")]
            defmt::debug!("dfu: usb reset, leaving bootloader");
            self.detach_armed = false;
            self.manifested = false;
            // may not return
            self.mem.usb_reset();
        }

        // Try to signal an interrupted transfer to the host.
        match self.status.state() {
            DFUState::DfuUploadIdle
            | DFUState::DfuDnloadIdle
            | DFUState::DfuDnloadSync
            | DFUState::DfuDnBusy
            | DFUState::DfuManifest
            | DFUState::DfuManifestSync => {
                #[cfg(feature = "defmt")]
                defmt::warn!("dfu: usb reset in {}", self.status.state());
                self.status
                    .new_state_status(DFUState::DfuError, DFUStatusCode::ErrUsbr);
            }
            DFUState::DfuIdle
            | DFUState::DfuError
            | DFUState::AppDetach
            | DFUState::AppIdle
            | DFUState::DfuManifestWaitReset => {}
        }
    }
}

impl<B: UsbBus, M: DFUMemIO, C: DFUCipher> DFUClass<B, M, C> {
    const TRANSFER_SIZE_FITS: () = assert!(
        M::TRANSFER_SIZE as usize <= MAX_TRANSFER_SIZE,
        "TRANSFER_SIZE exceeds MAX_TRANSFER_SIZE"
    );

    /// Creates a new DFUClass with the provided UsbBus,
    /// DFUMemIO and cipher.
    ///
    /// The cipher must be built with the same key, nonce and mode
    /// as the images it is going to receive.
    pub fn new(alloc: &UsbBusAllocator<B>, mem: M, cipher: C) -> Self {
        #[allow(clippy::let_unit_value)]
        let _ = Self::TRANSFER_SIZE_FITS;

        let if_num = alloc.interface();
        let flash_string = alloc.string();
        let eeprom_string = mem.eeprom_region().map(|_| alloc.string());
        let mut dfu = Self {
            if_num,
            flash_string,
            eeprom_string,
            status: DFUStatus::new(M::POLL_TIMEOUT_MS),
            target: DFUTarget::Flash,
            address: 0,
            remaining: 0,
            detach_armed: false,
            manifested: false,
            buffer: [0; MAX_TRANSFER_SIZE],
            scanner: M::CHECKSUM.map(ChecksumScanner::new),
            upload_sum: None,
            trailer_sent: false,
            cipher,
            _bus: PhantomData,
            mem,
        };
        dfu.set_idle();
        dfu
    }

    /// This function may be called just after `DFUClass::new()` to
    /// set DFU error state to "Device detected unexpected power on reset"
    /// instead of the usual `dfuIdle`.
    pub fn set_unexpected_reset_state(&mut self) {
        self.status
            .new_state_status(DFUState::DfuError, DFUStatusCode::ErrPOR);
    }

    /// This function may be called just after `DFUClass::new()` to
    /// set DFU error state to "Device’s firmware is corrupt. It cannot return to run-time (non-DFU) operations"
    /// instead of the usual `dfuIdle`.
    pub fn set_firmware_corrupted_state(&mut self) {
        self.status
            .new_state_status(DFUState::DfuError, DFUStatusCode::ErrFirmware);
    }

    /// Return the address the next block is written to or read from.
    pub fn get_address_pointer(&self) -> u32 {
        self.address
    }

    /// Memory selected by the current alternate setting.
    pub fn target(&self) -> DFUTarget {
        self.target
    }

    /// Payload length found by the checksum scan of the current download.
    pub fn checked_length(&self) -> Option<u32> {
        self.scanner
            .as_ref()
            .and_then(|s| s.found())
            .filter(|&n| n > 0)
            .map(|n| n as u32)
    }

    fn write_alt_descriptors(
        &self,
        writer: &mut DescriptorWriter,
        alt: u8,
        string: StringIndex,
    ) -> usb_device::Result<()> {
        writer.interface_alt(
            self.if_num,
            alt,
            USB_CLASS_APPLICATION_SPECIFIC,
            USB_SUBCLASS_DFU,
            USB_PROTOCOL_DFU_MODE,
            Some(string),
        )?;

        // DFU Functional descriptor
        writer.write(
            DESC_DESCTYPE_DFU,
            &[
                // bmAttributes
                // Bit 3: bitWillDetach, not set
                // Bit 2: bitManifestationTolerant
                0x4 |
                    // Bit 1: bitCanUpload
                    (if M::HAS_UPLOAD {0x2} else {0}) |
                    // Bit 0: bitCanDnload
                    0x1,
                // wDetachTimeOut
                (M::DETACH_TIMEOUT & 0xff) as u8,
                (M::DETACH_TIMEOUT >> 8) as u8,
                // wTransferSize
                (M::TRANSFER_SIZE & 0xff) as u8,
                (M::TRANSFER_SIZE >> 8) as u8,
                // bcdDFUVersion
                0x10,
                0x01,
            ],
        )
    }

    fn region(&self) -> MemRegion {
        match self.target {
            DFUTarget::Flash => self.mem.flash_region(),
            DFUTarget::Eeprom => self.mem.eeprom_region().unwrap_or(MemRegion {
                start: 0,
                length: 0,
            }),
        }
    }

    /// Back to dfuIDLE with a fresh cipher state at the start of the
    /// selected region.
    fn set_idle(&mut self) {
        self.cipher.reset();
        let region = self.region();
        self.address = region.start;
        self.remaining = region.length;
        if let Some(s) = self.scanner.as_mut() {
            s.reset();
        }
        self.upload_sum = M::CHECKSUM.map(Checksum::new);
        self.trailer_sent = false;
        self.status.new_state_ok(DFUState::DfuIdle);
    }

    fn bad_request(&mut self) {
        #[cfg(feature = "defmt")]
        defmt::warn!("dfu: bad request in {}", self.status.state());
        self.status
            .new_state_status(DFUState::DfuError, DFUStatusCode::ErrStalledPkt);
    }

    fn clear_status(&mut self, xfer: ControlOut<B>) {
        match self.status.state() {
            DFUState::DfuError => {
                self.set_idle();
                xfer.accept().ok();
            }
            _ => {
                self.bad_request();
                xfer.reject().ok();
            }
        }
    }

    fn abort(&mut self, xfer: ControlOut<B>) {
        match self.status.state() {
            DFUState::DfuIdle
            | DFUState::DfuUploadIdle
            | DFUState::DfuDnloadIdle
            | DFUState::DfuDnloadSync
            | DFUState::DfuManifestSync => {
                self.set_idle();
                xfer.accept().ok();
            }
            DFUState::AppDetach
            | DFUState::AppIdle
            | DFUState::DfuDnBusy
            | DFUState::DfuManifest
            | DFUState::DfuManifestWaitReset
            | DFUState::DfuError => {
                self.bad_request();
                xfer.reject().ok();
            }
        }
    }

    fn download(&mut self, xfer: ControlOut<B>, req: Request) {
        match self.status.state() {
            DFUState::DfuIdle | DFUState::DfuDnloadSync | DFUState::DfuDnloadIdle => {}
            _ => {
                self.bad_request();
                xfer.reject().ok();
                return;
            }
        }

        if req.length == 0 {
            self.status.new_state_ok(DFUState::DfuManifestSync);
            xfer.accept().ok();
            return;
        }

        let data = xfer.data();
        let len = data.len();

        if len > M::TRANSFER_SIZE as usize {
            self.bad_request();
            xfer.reject().ok();
            return;
        }

        if len as u32 > self.remaining {
            #[cfg(feature = "defmt")]
            defmt::warn!("dfu: dnload of {=usize} bytes past the region end", len);
            self.status
                .new_state_status(DFUState::DfuError, DFUStatusCode::ErrAddress);
            xfer.accept().ok();
            return;
        }

        self.buffer[..len].copy_from_slice(data);
        xfer.accept().ok();

        if self.cipher.decrypt(&mut self.buffer[..len]).is_err() {
            #[cfg(feature = "defmt")]
            defmt::warn!("dfu: block of {=usize} bytes is not cipher aligned", len);
            self.status
                .new_state_status(DFUState::DfuError, DFUStatusCode::ErrFile);
            return;
        }

        if let Some(s) = self.scanner.as_mut() {
            s.update(&self.buffer[..len]);
        }

        let result = match self.target {
            DFUTarget::Flash => self.mem.program_flash(self.address, &self.buffer[..len]),
            DFUTarget::Eeprom => self.mem.program_eeprom(self.address, &self.buffer[..len]),
        };

        match result {
            Err(e) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("dfu: program at {=u32:#x} failed: {}", self.address, e);
                self.status.new_state_status(DFUState::DfuError, e.into());
            }
            Ok(()) => {
                #[cfg(feature = "defmt")]
                defmt::debug!("dfu: {=usize} bytes at {=u32:#x}", len, self.address);
                self.address = self.address.wrapping_add(len as u32);
                self.remaining -= len as u32;
                if M::DNLOAD_SYNC {
                    self.status.new_state_ok(DFUState::DfuDnloadSync);
                } else {
                    self.status.new_state_ok(DFUState::DfuDnloadIdle);
                }
            }
        }
    }

    fn upload(&mut self, xfer: ControlIn<B>, req: Request) {
        let initial_state = self.status.state();

        if !M::HAS_UPLOAD
            || (initial_state != DFUState::DfuIdle && initial_state != DFUState::DfuUploadIdle)
        {
            self.bad_request();
            xfer.reject().ok();
            return;
        }

        let bs = self.cipher.block_size();
        let limit = min(req.length, M::TRANSFER_SIZE) as usize;
        let remaining = self.remaining as usize;
        let width = match &self.upload_sum {
            Some(sum) if !self.trailer_sent => sum.kind().width(),
            _ => 0,
        };

        if remaining == 0 && width == 0 {
            // short frame, back to idle
            self.set_idle();
            xfer.accept_with(&[]).ok();
            return;
        }

        // The last frame carries the region tail and the checksum of the
        // whole region, zero padded to a cipher block.
        let last = (remaining + width + bs - 1) / bs * bs;
        let (data_len, chunk, trailer) = if last <= limit {
            (remaining, last, width)
        } else {
            let n = min(limit, remaining);
            (n - n % bs, n - n % bs, 0)
        };

        if chunk == 0 {
            self.bad_request();
            xfer.reject().ok();
            return;
        }

        if data_len > 0 {
            if let Err(e) = self.mem.read(self.address, &mut self.buffer[..data_len]) {
                self.status.new_state_status(DFUState::DfuError, e.into());
                xfer.reject().ok();
                return;
            }
        }

        let mut end = data_len;
        if let Some(sum) = self.upload_sum.as_mut() {
            sum.update(&self.buffer[..data_len]);
            if trailer > 0 {
                self.buffer[end..end + trailer].copy_from_slice(&sum.to_le_bytes()[..trailer]);
                end += trailer;
                self.trailer_sent = true;
            }
        }
        self.buffer[end..chunk].fill(0);

        if self.cipher.encrypt(&mut self.buffer[..chunk]).is_err() {
            self.status
                .new_state_status(DFUState::DfuError, DFUStatusCode::ErrFile);
            xfer.reject().ok();
            return;
        }

        #[cfg(feature = "defmt")]
        defmt::debug!("dfu: upload {=usize} bytes at {=u32:#x}", chunk, self.address);
        self.address = self.address.wrapping_add(data_len as u32);
        self.remaining -= data_len as u32;
        self.status.new_state_ok(DFUState::DfuUploadIdle);
        xfer.accept_with(&self.buffer[..chunk]).ok();
    }

    fn get_state(&mut self, xfer: ControlIn<B>, req: Request) {
        // return current state, without any state transition
        if req.length > 0 {
            let v = self.status.state() as u8;
            xfer.accept_with(&[v]).ok();
        } else {
            self.bad_request();
            xfer.reject().ok();
        }
    }

    fn get_status(&mut self, xfer: ControlIn<B>, req: Request) {
        if req.length < 6 {
            self.bad_request();
            xfer.reject().ok();
            return;
        }

        // reply carries the state before the transition below
        let v: [u8; 6] = self.status.into();

        match self.status.state() {
            DFUState::DfuIdle
            | DFUState::DfuDnloadIdle
            | DFUState::DfuUploadIdle
            | DFUState::DfuError => {}
            DFUState::DfuDnloadSync => {
                self.status.new_state_ok(DFUState::DfuDnloadIdle);
            }
            DFUState::DfuManifestSync => {
                let checked = self.checked_length();
                #[cfg(feature = "defmt")]
                defmt::debug!("dfu: manifestation, checked length {}", checked);
                // may not return
                match self.mem.manifestation(checked) {
                    Err(e) => self.status.new_state_status(DFUState::DfuError, e.into()),
                    Ok(()) => {
                        self.set_idle();
                        self.manifested = true;
                    }
                }
            }
            _ => {
                self.bad_request();
                xfer.reject().ok();
                return;
            }
        }

        xfer.accept_with(&v).ok();
    }
}
