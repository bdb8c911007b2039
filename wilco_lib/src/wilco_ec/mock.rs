//! Simulated Wilco EC behind an EMI window, for tests
//!
//! Models the address/access mode register with autoincrement, the command
//! and data ports, and EC firmware answering mailbox requests. Every port
//! access is recorded together with the thread that made it.

use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;
use core::time::Duration;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::thread::{self, ThreadId};

use super::portio::{EcPorts, PortIo};
use super::protocol::*;
use crate::os_specific::Clock;

pub const MOCK_EMI_BASE: u16 = 0x0800;
pub const MOCK_DATA: u16 = 0x0200;
pub const MOCK_COMMAND: u16 = 0x0204;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    InB(u16),
    OutB(u16, u8),
    InW(u16),
    OutW(u16, u16),
}

/// Request as the simulated firmware saw it
#[derive(Debug, Clone)]
pub struct MockRequest {
    pub header: EcMailboxRequest,
    pub payload: Vec<u8>,
    pub checksum_ok: bool,
}

/// What the simulated firmware answers
#[derive(Debug, Clone)]
pub struct MockReply {
    /// Value of the result flag on the data port
    pub flag: u8,
    pub result: u16,
    pub data_len: u16,
    pub data: [u8; EC_MAILBOX_DATA_SIZE],
}

impl MockReply {
    /// Successful reply, `data` zero-extended to the mailbox size
    pub fn ok(data: &[u8]) -> Self {
        let mut buffer = [0; EC_MAILBOX_DATA_SIZE];
        buffer[..data.len()].copy_from_slice(data);
        MockReply {
            flag: 0,
            result: 0,
            data_len: EC_MAILBOX_DATA_SIZE as u16,
            data: buffer,
        }
    }
}

type Firmware = Box<dyn Fn(&MockRequest) -> MockReply + Send>;

struct State {
    memory: Vec<u8>,
    address: u16,
    mode: u16,
    flag: u8,
    busy_polls: usize,
    busy_remaining: usize,
    firmware: Firmware,
    requests: Vec<MockRequest>,
    log: Vec<(ThreadId, Access)>,
}

pub struct MockEc {
    state: Mutex<State>,
}

impl MockEc {
    /// EC echoing the request payload back as response data
    pub fn new() -> Self {
        MockEc {
            state: Mutex::new(State {
                memory: vec![0; 0x10000],
                address: 0,
                mode: 0,
                flag: 0,
                busy_polls: 0,
                busy_remaining: 0,
                firmware: Box::new(|rq| MockReply::ok(&rq.payload)),
                requests: vec![],
                log: vec![],
            }),
        }
    }

    pub fn ports(&self) -> EcPorts {
        EcPorts {
            emi_base: MOCK_EMI_BASE,
            data: MOCK_DATA,
            command: MOCK_COMMAND,
        }
    }

    pub fn set_firmware(&self, firmware: impl Fn(&MockRequest) -> MockReply + Send + 'static) {
        self.state.lock().unwrap().firmware = Box::new(firmware);
    }

    /// Number of status reads reporting busy after each command
    pub fn set_busy_polls(&self, polls: usize) {
        self.state.lock().unwrap().busy_polls = polls;
    }

    pub fn load_memory(&self, address: u16, data: &[u8]) {
        let address = usize::from(address);
        self.state.lock().unwrap().memory[address..address + data.len()].copy_from_slice(data);
    }

    pub fn memory(&self, address: u16, len: usize) -> Vec<u8> {
        let address = usize::from(address);
        self.state.lock().unwrap().memory[address..address + len].to_vec()
    }

    pub fn requests(&self) -> Vec<MockRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn accesses(&self) -> Vec<Access> {
        let state = self.state.lock().unwrap();
        state.log.iter().map(|(_, access)| *access).collect()
    }

    pub fn clear_log(&self) {
        self.state.lock().unwrap().log.clear();
    }

    /// Lengths of the runs of consecutive accesses made by the same thread
    pub fn thread_runs(&self) -> Vec<usize> {
        let state = self.state.lock().unwrap();
        let mut runs: Vec<(ThreadId, usize)> = vec![];
        for (id, _) in state.log.iter() {
            if let Some((last, len)) = runs.last_mut() {
                if *last == *id {
                    *len += 1;
                    continue;
                }
            }
            runs.push((*id, 1));
        }
        runs.into_iter().map(|(_, len)| len).collect()
    }

    fn record(state: &mut State, access: Access) {
        state.log.push((thread::current().id(), access));
    }
}

impl Default for MockEc {
    fn default() -> Self {
        Self::new()
    }
}

impl State {
    /// EC memory address of a data register, None for other ports
    fn data_address(&self, port: u16) -> Option<usize> {
        let offset = port.checked_sub(MOCK_EMI_BASE)?;
        if (MEC_EMI_EC_DATA_B0..=MEC_EMI_EC_DATA_B3).contains(&offset) {
            Some(usize::from(self.address) + usize::from(offset - MEC_EMI_EC_DATA_B0))
        } else {
            None
        }
    }

    /// Touching data byte 3 in autoincrement mode moves to the next 4 bytes
    fn autoincrement(&mut self, port: u16, width: u16) {
        let last = MOCK_EMI_BASE + MEC_EMI_EC_DATA_B3;
        let touches_last = port <= last && last < port + width;
        if self.mode == EmiAccessMode::LongAutoIncrement as u16 && touches_last {
            self.address = self.address.wrapping_add(4);
        }
    }

    fn run_firmware(&mut self) {
        let mut header = [0; EcMailboxRequest::LEN];
        header.copy_from_slice(&self.memory[..EcMailboxRequest::LEN]);
        let header = EcMailboxRequest::from_bytes(&header);
        let start = EcMailboxRequest::LEN;
        let payload = self.memory[start..start + usize::from(header.data_len)].to_vec();
        let checksum_ok =
            checksum_fold(&header.to_bytes()).wrapping_add(checksum_fold(&payload)) == 0;
        let request = MockRequest {
            header,
            payload,
            checksum_ok,
        };

        let reply = (self.firmware)(&request);
        self.requests.push(request);

        let mut rs = EcMailboxResponse {
            struct_version: EC_MAILBOX_PROTO_VERSION,
            checksum: 0,
            result: reply.result,
            data_len: reply.data_len,
            reserved: [0; 2],
        };
        rs.checksum = checksum_buffers(&[&rs.to_bytes(), &reply.data]);
        self.memory[..EcMailboxResponse::LEN].copy_from_slice(&rs.to_bytes());
        self.memory[EcMailboxResponse::LEN..EC_MAILBOX_RESPONSE_SIZE].copy_from_slice(&reply.data);
        self.flag = reply.flag;
        self.busy_remaining = self.busy_polls;
    }
}

impl PortIo for MockEc {
    fn inb(&self, port: u16) -> u8 {
        let mut state = self.state.lock().unwrap();
        Self::record(&mut state, Access::InB(port));

        if port == MOCK_COMMAND {
            if state.busy_remaining > 0 {
                state.busy_remaining -= 1;
                return EC_CMDR_BUSY | EC_CMDR_PENDING;
            }
            return 0;
        }
        if port == MOCK_DATA {
            return state.flag;
        }
        match state.data_address(port) {
            Some(address) => {
                let value = state.memory[address];
                state.autoincrement(port, 1);
                value
            }
            None => 0xFF,
        }
    }

    fn outb(&self, port: u16, value: u8) {
        let mut state = self.state.lock().unwrap();
        Self::record(&mut state, Access::OutB(port, value));

        if port == MOCK_COMMAND {
            if value == EC_MAILBOX_START_COMMAND {
                state.run_firmware();
            }
            return;
        }
        if let Some(address) = state.data_address(port) {
            state.memory[address] = value;
            state.autoincrement(port, 1);
        }
    }

    fn inw(&self, port: u16) -> u16 {
        let mut state = self.state.lock().unwrap();
        Self::record(&mut state, Access::InW(port));

        match state.data_address(port) {
            Some(address) => {
                let value = u16::from_le_bytes([state.memory[address], state.memory[address + 1]]);
                state.autoincrement(port, 2);
                value
            }
            None => 0xFFFF,
        }
    }

    fn outw(&self, port: u16, value: u16) {
        let mut state = self.state.lock().unwrap();
        Self::record(&mut state, Access::OutW(port, value));

        if port == MOCK_EMI_BASE + MEC_EMI_EC_ADDRESS_B0 {
            state.address = value & 0xFFFC;
            state.mode = value & 0x3;
            return;
        }
        if let Some(address) = state.data_address(port) {
            state.memory[address..address + 2].copy_from_slice(&value.to_le_bytes());
            state.autoincrement(port, 2);
        }
    }
}

/// Clock that only advances when slept on
pub struct FakeClock {
    now_us: AtomicU64,
}

impl FakeClock {
    pub fn new() -> Self {
        FakeClock {
            now_us: AtomicU64::new(0),
        }
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Duration {
        Duration::from_micros(self.now_us.load(Ordering::SeqCst))
    }

    fn sleep(&self, micros: u64) {
        self.now_us.fetch_add(micros, Ordering::SeqCst);
    }
}
