//! Wilco EC mailbox protocol
//!
//! A transaction writes the request header and data into EC memory through
//! the EMI window, strobes the command port and waits for the EC to finish.
//! The response is then read back from the same EC memory.

use core::time::Duration;
use std::sync::{Mutex, PoisonError};

use log::Level;

use super::portio::{EcPorts, PortIo};
use super::portio_mec::{Emi, EmiWindow, TransferDirection};
use super::protocol::*;
use super::{EcError, EcResult};
use crate::os_specific::{Clock, OsClock};
use crate::util;

/// Message type to select a set of command codes
///
/// Sent as the mailbox identifier of the request header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageType(pub u16);

impl MessageType {
    /// Legacy EC messages for standard EC behavior
    pub const LEGACY: MessageType = MessageType(0x00f0);
    /// Get/Set/Sync EC controlled NVRAM property
    pub const PROPERTY: MessageType = MessageType(0x00f2);
    /// Request telemetry data from the EC
    pub const TELEMETRY: MessageType = MessageType(0x00f5);
}

/// Request and response of a single mailbox command
///
/// The length of `response` is the number of bytes the caller wants back.
#[derive(Debug)]
pub struct Message<'a> {
    pub msg_type: MessageType,
    /// EC does not respond to this command, e.g. shutdown
    pub no_response: bool,
    pub request: &'a [u8],
    pub response: &'a mut [u8],
}

impl<'a> Message<'a> {
    pub fn new(msg_type: MessageType, request: &'a [u8], response: &'a mut [u8]) -> Self {
        Message {
            msg_type,
            no_response: false,
            request,
            response,
        }
    }

    /// Message the EC won't answer
    pub fn without_response(msg_type: MessageType, request: &'a [u8]) -> Self {
        Message {
            msg_type,
            no_response: true,
            request,
            response: Default::default(),
        }
    }
}

/// How long to wait for the EC and how often to check on it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MailboxTiming {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for MailboxTiming {
    fn default() -> Self {
        MailboxTiming {
            timeout: Duration::from_secs(1),
            poll_interval: Duration::from_micros(100),
        }
    }
}

/// Mailbox of one EC
///
/// Only one command is in flight at a time. The response buffer doubles as
/// the transaction lock and is held from building the request until the
/// response has been copied out.
pub struct Mailbox<P: PortIo, C: Clock = OsClock> {
    emi: Emi<P>,
    data_port: u16,
    command_port: u16,
    clock: C,
    timing: MailboxTiming,
    response: Mutex<[u8; EC_MAILBOX_RESPONSE_SIZE]>,
}

impl<P: PortIo> Mailbox<P, OsClock> {
    pub fn new(io: P, ports: EcPorts) -> Self {
        Self::with_timing(io, ports, MailboxTiming::default())
    }

    pub fn with_timing(io: P, ports: EcPorts, timing: MailboxTiming) -> Self {
        Self::with_clock(io, ports, OsClock::new(), timing)
    }
}

impl<P: PortIo, C: Clock> Mailbox<P, C> {
    pub fn with_clock(io: P, ports: EcPorts, clock: C, timing: MailboxTiming) -> Self {
        Mailbox {
            emi: Emi::new(io, EmiWindow::new(ports.emi_base)),
            data_port: ports.data,
            command_port: ports.command,
            clock,
            timing,
            response: Mutex::new([0; EC_MAILBOX_RESPONSE_SIZE]),
        }
    }

    /// Transfer engine of the EMI window the mailbox lives in
    pub fn emi(&self) -> &Emi<P> {
        &self.emi
    }

    pub fn timing(&self) -> MailboxTiming {
        self.timing
    }

    /// Wait for the EC to consume the command
    ///
    /// Returns true if the EC still had the pending or busy flag set when the
    /// timeout expired.
    fn response_timed_out(&self) -> bool {
        let deadline = self.clock.now() + self.timing.timeout;
        let interval = self.timing.poll_interval.as_micros() as u64;

        loop {
            let status = self.emi.io().inb(self.command_port);
            if status & (EC_CMDR_PENDING | EC_CMDR_BUSY) == 0 {
                return false;
            }

            self.clock.sleep(interval);
            if self.clock.now() >= deadline {
                return true;
            }
        }
    }

    /// Send one message and wait for its response
    ///
    /// On success the first `msg.response.len()` bytes of the response data
    /// have been copied to `msg.response`. On failure `msg.response` is left
    /// untouched.
    pub fn execute(&self, msg: &mut Message) -> EcResult<()> {
        if msg.request.len() > EC_MAILBOX_DATA_SIZE {
            error!(
                "Request too large ({} > {})",
                msg.request.len(),
                EC_MAILBOX_DATA_SIZE
            );
            return Err(EcError::RequestTooLarge(msg.request.len()));
        }

        let mut rs = self.response.lock().unwrap_or_else(PoisonError::into_inner);

        trace!(
            "mailbox(type={:?}, request_len={}, response_len={})",
            msg.msg_type,
            msg.request.len(),
            msg.response.len()
        );

        // Checksum header and data
        let rq = EcMailboxRequest::new(msg.msg_type.0, msg.request.len() as u16)
            .with_checksum(msg.request);

        self.emi.write(0, &rq.to_bytes());
        self.emi.write(EcMailboxRequest::LEN as u16, msg.request);

        // Start the command
        self.emi.io().outb(self.command_port, EC_MAILBOX_START_COMMAND);

        // For some commands (eg shutdown) the EC will not respond, that's OK
        if msg.no_response {
            info!("EC does not respond to this command");
            return Ok(());
        }

        if self.response_timed_out() {
            error!("response timed out");
            return Err(EcError::Timeout);
        }

        let flag = self.emi.io().inb(self.data_port);
        if flag != 0 {
            error!("bad response: {:#04X}", flag);
            return Err(EcError::DeviceReportedFailure(flag.into()));
        }

        self.emi.transfer(TransferDirection::Read, 0, &mut rs[..]);
        let mut header_bytes = [0; EcMailboxResponse::LEN];
        header_bytes.copy_from_slice(&rs[..EcMailboxResponse::LEN]);
        let header = EcMailboxResponse::from_bytes(&header_bytes);

        if log_enabled!(Level::Debug) {
            let checksum = checksum_fold(&rs[..]);
            if checksum != 0 {
                debug!("Response checksum doesn't add up to 0: {:#04X}", checksum);
            }
        }

        if usize::from(header.data_len) != EC_MAILBOX_DATA_SIZE {
            error!(
                "unexpected packet size ({} != {})",
                header.data_len, EC_MAILBOX_DATA_SIZE
            );
            return Err(EcError::ProtocolSizeMismatch {
                declared: header.data_len,
            });
        }

        if usize::from(header.data_len) < msg.response.len() {
            error!(
                "EC didn't return enough data ({} < {})",
                header.data_len,
                msg.response.len()
            );
            return Err(EcError::InsufficientData {
                declared: header.data_len,
                requested: msg.response.len(),
            });
        }

        if header.result != 0 {
            error!("EC reported failure: {:#04X}", header.result);
            return Err(EcError::DeviceReportedFailure(header.result));
        }

        let len = msg.response.len();
        let data = &rs[EcMailboxResponse::LEN..EcMailboxResponse::LEN + len];
        msg.response.copy_from_slice(data);
        if log_enabled!(Level::Trace) {
            trace!("  Response: {}", util::format_buffer(msg.response));
        }

        Ok(())
    }
}
