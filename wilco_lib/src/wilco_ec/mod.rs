//! Host to EC communication with the Wilco mailbox protocol
//!
//! Layers, from the bottom:
//! - [`portio`]: raw 8/16 bit port access
//! - [`portio_mec`]: copying buffers through the MEC EMI window
//! - [`mailbox`]: framing, checksum, polling and validation of one command
//! - [`command`], [`kbbl`]: typed commands on top of the mailbox

use alloc::string::String;
use core::fmt;

pub mod command;
pub mod kbbl;
pub mod mailbox;
#[cfg(test)]
mod mock;
pub mod portio;
pub mod portio_mec;
pub mod protocol;

pub use mailbox::{Mailbox, MailboxTiming, Message, MessageType};
pub use portio::{EcPorts, PortIo};
pub use portio_mec::{Emi, EmiWindow, TransferDirection};

#[cfg(all(feature = "raw_pio", any(target_arch = "x86", target_arch = "x86_64")))]
use crate::config::EcConfig;
#[cfg(all(feature = "raw_pio", any(target_arch = "x86", target_arch = "x86_64")))]
use portio::RawPortIo;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EcError {
    /// EC kept the pending or busy flag set until the deadline
    Timeout,
    /// EC set the result flag, or the response header carries a non-zero result code
    DeviceReportedFailure(u16),
    /// Response declared a payload size other than EC_MAILBOX_DATA_SIZE
    ProtocolSizeMismatch { declared: u16 },
    /// EC didn't return as much data as the caller asked for
    InsufficientData { declared: u16, requested: usize },
    /// Request payload doesn't fit into the mailbox
    RequestTooLarge(usize),
    /// Failed to set up access to the device
    DeviceError(String),
    /// Configuration could not be read or parsed
    Config(String),
}

impl fmt::Display for EcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EcError::Timeout => write!(f, "EC response timed out"),
            EcError::DeviceReportedFailure(code) => write!(f, "EC reported failure: {:#04X}", code),
            EcError::ProtocolSizeMismatch { declared } => write!(
                f,
                "unexpected packet size ({} != {})",
                declared,
                protocol::EC_MAILBOX_DATA_SIZE
            ),
            EcError::InsufficientData {
                declared,
                requested,
            } => write!(
                f,
                "EC didn't return enough data ({} < {})",
                declared, requested
            ),
            EcError::RequestTooLarge(len) => write!(
                f,
                "request of {} bytes exceeds mailbox size of {}",
                len,
                protocol::EC_MAILBOX_DATA_SIZE
            ),
            EcError::DeviceError(msg) => write!(f, "device error: {}", msg),
            EcError::Config(msg) => write!(f, "invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for EcError {}

pub type EcResult<T> = Result<T, EcError>;

/// Set up port access and create a mailbox talking to the real hardware
#[cfg(all(feature = "raw_pio", any(target_arch = "x86", target_arch = "x86_64")))]
pub fn open(config: &EcConfig) -> EcResult<Mailbox<RawPortIo>> {
    portio::request_access(&config.ports)?;
    info!(
        "Wilco EC mailbox: EMI at {:#X}, data {:#X}, command {:#X}",
        config.ports.emi_base, config.ports.data, config.ports.command
    );
    Ok(Mailbox::with_timing(RawPortIo, config.ports, config.timing))
}
