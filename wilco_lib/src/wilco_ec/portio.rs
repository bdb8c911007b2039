//! Raw port I/O primitives used to reach the EC
//!
//! Everything above this module only talks to the hardware through [`PortIo`].

use alloc::sync::Arc;

#[cfg(all(feature = "raw_pio", any(target_arch = "x86", target_arch = "x86_64")))]
use hwio::{Io, Pio};

use super::EcResult;

/// 8 and 16 bit port reads and writes
pub trait PortIo: Send + Sync {
    fn inb(&self, port: u16) -> u8;
    fn outb(&self, port: u16, value: u8);
    fn inw(&self, port: u16) -> u16;
    fn outw(&self, port: u16, value: u16);
}

impl<T: PortIo + ?Sized> PortIo for &T {
    fn inb(&self, port: u16) -> u8 {
        (**self).inb(port)
    }
    fn outb(&self, port: u16, value: u8) {
        (**self).outb(port, value)
    }
    fn inw(&self, port: u16) -> u16 {
        (**self).inw(port)
    }
    fn outw(&self, port: u16, value: u16) {
        (**self).outw(port, value)
    }
}

impl<T: PortIo + ?Sized> PortIo for Arc<T> {
    fn inb(&self, port: u16) -> u8 {
        (**self).inb(port)
    }
    fn outb(&self, port: u16, value: u8) {
        (**self).outb(port, value)
    }
    fn inw(&self, port: u16) -> u16 {
        (**self).inw(port)
    }
    fn outw(&self, port: u16, value: u16) {
        (**self).outw(port, value)
    }
}

/// I/O ports the EC is reachable through, as enumerated by the platform
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EcPorts {
    /// Base of the 8 port EMI window. 0 if the EC has no EMI
    pub emi_base: u16,
    /// Port the result flag is read from
    pub data: u16,
    /// Command and status port
    pub command: u16,
}

/// Port I/O through the `in`/`out` instructions
#[cfg(all(feature = "raw_pio", any(target_arch = "x86", target_arch = "x86_64")))]
#[derive(Debug, Default, Clone, Copy)]
pub struct RawPortIo;

#[cfg(all(feature = "raw_pio", any(target_arch = "x86", target_arch = "x86_64")))]
impl PortIo for RawPortIo {
    fn inb(&self, port: u16) -> u8 {
        Pio::<u8>::new(port).read()
    }
    fn outb(&self, port: u16, value: u8) {
        Pio::<u8>::new(port).write(value)
    }
    fn inw(&self, port: u16) -> u16 {
        Pio::<u16>::new(port).read()
    }
    fn outw(&self, port: u16, value: u16) {
        Pio::<u16>::new(port).write(value)
    }
}

#[cfg(all(feature = "linux_pio", target_os = "linux"))]
#[derive(PartialEq, Clone, Copy)]
enum Initialized {
    NotYet,
    Succeeded,
    Failed,
}

#[cfg(all(feature = "linux_pio", target_os = "linux"))]
lazy_static! {
    static ref INITIALIZED: spin::Mutex<Initialized> = spin::Mutex::new(Initialized::NotYet);
}

/// Ask the kernel for access to the EC ports
///
/// In Linux userspace has to first request access to ioports. The result is
/// remembered for the whole process, trying again won't help.
#[cfg(all(feature = "linux_pio", target_os = "linux"))]
pub fn request_access(ports: &EcPorts) -> EcResult<()> {
    use super::EcError;
    use alloc::string::ToString;
    use libc::ioperm;
    use nix::unistd::Uid;

    let mut init = INITIALIZED.lock();
    match *init {
        Initialized::Failed => {
            return Err(EcError::DeviceError(
                "Port I/O access was already denied".to_string(),
            ))
        }
        Initialized::Succeeded => return Ok(()),
        Initialized::NotYet => {}
    }

    if !Uid::effective().is_root() {
        error!("Must be root to use port based I/O for EC communication.");
        *init = Initialized::Failed;
        return Err(EcError::DeviceError("Must be root".to_string()));
    }

    let mut regions = vec![(ports.data, 1), (ports.command, 1)];
    if ports.emi_base != 0 {
        regions.push((ports.emi_base, super::protocol::MEC_EMI_SIZE));
    }
    for (start, len) in regions {
        debug!("ioperm({:#X}, {})", start, len);
        let res = unsafe { ioperm(start as libc::c_ulong, len as libc::c_ulong, 1) };
        if res != 0 {
            error!("ioperm failed. portio driver is likely blocked by Linux kernel lockdown mode");
            *init = Initialized::Failed;
            return Err(EcError::DeviceError(alloc::format!(
                "ioperm failed for port {:#X}",
                start
            )));
        }
    }

    *init = Initialized::Succeeded;
    Ok(())
}

/// Nothing to request outside of Linux userspace, ring 0 code has direct access
#[cfg(not(all(feature = "linux_pio", target_os = "linux")))]
pub fn request_access(_ports: &EcPorts) -> EcResult<()> {
    Ok(())
}
