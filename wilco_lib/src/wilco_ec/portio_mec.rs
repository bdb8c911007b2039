//! EMI transfers for MEC (Microchip) based embedded controllers
//!
//! The EC memory is reached through an 8 port window. The host selects an
//! EC address and access width, then moves data through four data ports.

use alloc::vec;
use alloc::vec::Vec;
use core::cmp;

use log::Level;
use spin::Mutex;

use super::portio::PortIo;
use super::protocol::*;
use crate::util;

/// Location of the EMI port window
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EmiWindow {
    base: u16,
    end: u16,
}

impl EmiWindow {
    /// Window of an EC without EMI, all transfers are no-ops
    pub const fn unconfigured() -> Self {
        EmiWindow { base: 0, end: 0 }
    }

    /// Whether all 8 ports of a window at `base` are addressable
    pub fn fits(base: u16) -> bool {
        base.checked_add(MEC_EMI_SIZE - 1).is_some()
    }

    /// Window starting at the port `base`. A base of 0 means there is no EMI
    pub fn new(base: u16) -> Self {
        if base == 0 {
            return Self::unconfigured();
        }
        if !Self::fits(base) {
            error!("EMI window at {:#X} runs past the last I/O port", base);
            return Self::unconfigured();
        }
        EmiWindow {
            base,
            end: base.saturating_add(EC_MAILBOX_DATA_SIZE as u16),
        }
    }

    pub fn base(&self) -> u16 {
        self.base
    }

    pub fn is_configured(&self) -> bool {
        self.base != 0 && self.end != 0
    }

    fn port(&self, register: u16) -> u16 {
        self.base + register
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferDirection {
    /// Host to EC
    Write,
    /// EC to host
    Read,
}

/// Transfer engine moving buffers in and out of EC memory
///
/// The access mode and address registers are shared by everyone using the
/// window, so each transfer holds the lock from the first address selection
/// until the last data byte.
pub struct Emi<P: PortIo> {
    io: P,
    window: EmiWindow,
    lock: Mutex<()>,
}

impl<P: PortIo> Emi<P> {
    pub fn new(io: P, window: EmiWindow) -> Self {
        Emi {
            io,
            window,
            lock: Mutex::new(()),
        }
    }

    pub fn window(&self) -> EmiWindow {
        self.window
    }

    pub fn is_configured(&self) -> bool {
        self.window.is_configured()
    }

    /// Raw port access, for the ports next to the window
    pub fn io(&self) -> &P {
        &self.io
    }

    fn write_access(&self, address: u16, access_type: EmiAccessMode) {
        let value = (address & 0xFFFC) | access_type as u16;
        trace!(
            "  Writing {:#X} to port {:#X}",
            value,
            self.window.port(MEC_EMI_EC_ADDRESS_B0)
        );
        self.io.outw(self.window.port(MEC_EMI_EC_ADDRESS_B0), value);
    }

    fn transfer_byte(&self, direction: TransferDirection, register: u16, storage: &mut u8) {
        let port = self.window.port(register);
        match direction {
            TransferDirection::Write => self.io.outb(port, *storage),
            TransferDirection::Read => *storage = self.io.inb(port),
        }
    }

    /// Copy `data.len()` bytes between `data` and EC memory at `address`
    ///
    /// Unaligned bytes at the start and the end go through byte access, the
    /// aligned middle through 32-bit autoincrement access.
    pub fn transfer(&self, direction: TransferDirection, address: u16, data: &mut [u8]) {
        if !self.window.is_configured() {
            trace!("EMI not configured, skipping transfer");
            return;
        }
        if data.is_empty() {
            return;
        }

        let _guard = self.lock.lock();

        trace!(
            "transfer_mec({:?}, address={:#X}, size={:#X})",
            direction,
            address,
            data.len()
        );
        if direction == TransferDirection::Write && log_enabled!(Level::Trace) {
            trace!("{}", util::format_multiline_buffer(data, address.into()));
        }

        let size = data.len();
        let start_address = address;
        let mut pos = 0;
        let mut address = address;

        // Unaligned start address
        // Up to three bytes one-by-one
        if address % 4 > 0 {
            trace!("  Single bytes to start at {:#X}", address);
            self.write_access(address, EmiAccessMode::Byte);

            let start = address % 4;
            let count = cmp::min(size, usize::from(4 - start));
            for (i, storage) in data[..count].iter_mut().enumerate() {
                self.transfer_byte(direction, MEC_EMI_EC_DATA_B0 + start + i as u16, storage);
            }
            pos = count;
            address = address.wrapping_add(4) & 0xFFFC; // Closest 4 byte alignment
        }

        // 4 byte chunks
        if size - pos >= 4 {
            trace!("  4 byte chunks from {:#X}", address);
            self.write_access(address, EmiAccessMode::LongAutoIncrement);
            let low = self.window.port(MEC_EMI_EC_DATA_B0);
            let high = self.window.port(MEC_EMI_EC_DATA_B2);
            while size - pos >= 4 {
                let chunk = &mut data[pos..pos + 4];
                match direction {
                    TransferDirection::Write => {
                        self.io.outw(low, u16::from_le_bytes([chunk[0], chunk[1]]));
                        self.io.outw(high, u16::from_le_bytes([chunk[2], chunk[3]]));
                    }
                    TransferDirection::Read => {
                        chunk[..2].copy_from_slice(&self.io.inw(low).to_le_bytes());
                        chunk[2..].copy_from_slice(&self.io.inw(high).to_le_bytes());
                    }
                }

                pos += 4;
                address = address.wrapping_add(4);
            }
        }

        // Last remaining bytes individually
        if size > pos {
            trace!("  Single bytes to end at {:#X}", address);
            self.write_access(address, EmiAccessMode::Byte);

            for (i, storage) in data[pos..].iter_mut().enumerate() {
                self.transfer_byte(direction, MEC_EMI_EC_DATA_B0 + i as u16, storage);
            }
        }

        if direction == TransferDirection::Read && log_enabled!(Level::Trace) {
            trace!("Read bytes:");
            trace!("{}", util::format_multiline_buffer(data, start_address.into()));
        }
    }

    /// Write a buffer to EC memory
    pub fn write(&self, address: u16, data: &[u8]) {
        let mut buffer = data.to_vec();
        self.transfer(TransferDirection::Write, address, &mut buffer);
    }

    /// Read `size` bytes of EC memory
    pub fn read(&self, address: u16, size: usize) -> Vec<u8> {
        let mut buffer = vec![0_u8; size];
        self.transfer(TransferDirection::Read, address, &mut buffer);
        buffer
    }
}
