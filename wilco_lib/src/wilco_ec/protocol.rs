use log::Level;

use crate::util;

/// Version of mailbox interface
pub const EC_MAILBOX_VERSION: u8 = 0;

/// Value written to the command port to start a mailbox transaction
pub const EC_MAILBOX_START_COMMAND: u8 = 0xda;

/// Version of EC protocol
pub const EC_MAILBOX_PROTO_VERSION: u8 = 3;

/// Normal commands have a maximum 32 bytes of data
pub const EC_MAILBOX_DATA_SIZE: usize = 32;

// EC command register bit functions
/// Data ready for host to read
pub const EC_CMDR_DATA: u8 = 1 << 0;
/// Write pending to EC
pub const EC_CMDR_PENDING: u8 = 1 << 1;
/// EC is busy processing a command
pub const EC_CMDR_BUSY: u8 = 1 << 2;
/// Last host write was a command
pub const EC_CMDR_CMD: u8 = 1 << 3;

// EMI registers are relative to the window base
pub const MEC_EMI_HOST_TO_EC: u16 = 0;
pub const MEC_EMI_EC_TO_HOST: u16 = 1;
pub const MEC_EMI_EC_ADDRESS_B0: u16 = 2;
pub const MEC_EMI_EC_ADDRESS_B1: u16 = 3;
pub const MEC_EMI_EC_DATA_B0: u16 = 4;
pub const MEC_EMI_EC_DATA_B1: u16 = 5;
pub const MEC_EMI_EC_DATA_B2: u16 = 6;
pub const MEC_EMI_EC_DATA_B3: u16 = 7;
/// Number of consecutive ports making up the EMI window
pub const MEC_EMI_SIZE: u16 = 8;

/// Access width selected through the low two bits of the EC address register
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum EmiAccessMode {
    /// 8-bit access
    Byte = 0x0,
    /// 16-bit access
    Word = 0x1,
    /// 32-bit access
    Long = 0x2,
    /// 32-bit access, read or write of MEC_EMI_EC_DATA_B3 causes the
    /// EC data register to be incremented.
    LongAutoIncrement = 0x3,
}

/// Mailbox request header
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EcMailboxRequest {
    /// Should be EC_MAILBOX_PROTO_VERSION
    pub struct_version: u8,

    /// Sum of all bytes, header and data, must be 0
    pub checksum: u8,

    /// Mailbox identifier, specifies the command set
    pub mailbox_id: u16,

    /// Mailbox interface version, EC_MAILBOX_VERSION
    pub mailbox_version: u8,

    /// Set to zero
    pub reserved: u8,

    /// Length of the data following the header
    pub data_len: u16,
}

impl EcMailboxRequest {
    pub const LEN: usize = 8;

    pub fn new(mailbox_id: u16, data_len: u16) -> Self {
        EcMailboxRequest {
            struct_version: EC_MAILBOX_PROTO_VERSION,
            checksum: 0,
            mailbox_id,
            mailbox_version: EC_MAILBOX_VERSION,
            reserved: 0,
            data_len,
        }
    }

    /// Fill in the checksum so that header and data add up to 0
    pub fn with_checksum(mut self, data: &[u8]) -> Self {
        self.checksum = 0;
        self.checksum = checksum_buffers(&[&self.to_bytes(), data]);
        self
    }

    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let id = self.mailbox_id.to_le_bytes();
        let len = self.data_len.to_le_bytes();
        [
            self.struct_version,
            self.checksum,
            id[0],
            id[1],
            self.mailbox_version,
            self.reserved,
            len[0],
            len[1],
        ]
    }

    pub fn from_bytes(bytes: &[u8; Self::LEN]) -> Self {
        EcMailboxRequest {
            struct_version: bytes[0],
            checksum: bytes[1],
            mailbox_id: u16::from_le_bytes([bytes[2], bytes[3]]),
            mailbox_version: bytes[4],
            reserved: bytes[5],
            data_len: u16::from_le_bytes([bytes[6], bytes[7]]),
        }
    }
}

/// Mailbox response header
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EcMailboxResponse {
    /// Should be EC_MAILBOX_PROTO_VERSION
    pub struct_version: u8,

    /// Sum of all bytes must be 0
    pub checksum: u8,

    /// Result code from the EC. Non-zero indicates an error
    pub result: u16,

    /// Length of the response data
    pub data_len: u16,

    /// Set to zero
    pub reserved: [u8; 2],
}

impl EcMailboxResponse {
    pub const LEN: usize = 8;

    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let result = self.result.to_le_bytes();
        let len = self.data_len.to_le_bytes();
        [
            self.struct_version,
            self.checksum,
            result[0],
            result[1],
            len[0],
            len[1],
            self.reserved[0],
            self.reserved[1],
        ]
    }

    pub fn from_bytes(bytes: &[u8; Self::LEN]) -> Self {
        EcMailboxResponse {
            struct_version: bytes[0],
            checksum: bytes[1],
            result: u16::from_le_bytes([bytes[2], bytes[3]]),
            data_len: u16::from_le_bytes([bytes[4], bytes[5]]),
            reserved: [bytes[6], bytes[7]],
        }
    }
}

/// Size of the response area read back after every command
pub const EC_MAILBOX_RESPONSE_SIZE: usize = EcMailboxResponse::LEN + EC_MAILBOX_DATA_SIZE;

pub fn checksum_fold(numbers: &[u8]) -> u8 {
    numbers.iter().fold(0u8, |acc, x| acc.wrapping_add(*x))
}

/// Two's complement of the byte sum of all buffers.
///
/// Storing it in the checksum field makes the total byte sum 0.
pub fn checksum_buffers(buffers: &[&[u8]]) -> u8 {
    if log_enabled!(Level::Trace) {
        trace!("Checksum of");
        for buffer in buffers {
            trace!("{}", util::format_multiline_buffer(buffer, 0));
        }
    }
    let cs = buffers
        .iter()
        .map(|x| checksum_fold(x))
        .fold(0u8, |acc, x| acc.wrapping_add(x))
        .wrapping_neg();
    trace!("  is: {:#X}", cs);

    cs
}
