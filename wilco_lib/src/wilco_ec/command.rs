use alloc::vec;
use alloc::vec::Vec;

use super::mailbox::{Mailbox, Message, MessageType};
use super::portio::PortIo;
use super::EcResult;
use crate::os_specific::Clock;

/// Fixed size response of a mailbox command
pub trait EcResponse: Sized {
    /// Number of response bytes to ask the EC for
    const SIZE: usize;

    /// Parse exactly `SIZE` bytes
    fn from_response(bytes: &[u8]) -> Self;
}

/// For commands the EC doesn't answer
impl EcResponse for () {
    const SIZE: usize = 0;

    fn from_response(_bytes: &[u8]) {}
}

pub trait EcRequest<R: EcResponse> {
    // Can optionally override these
    fn msg_type() -> MessageType {
        MessageType::LEGACY
    }
    fn no_response() -> bool {
        false
    }

    fn format_request(&self) -> Vec<u8>;

    fn send_command<P: PortIo, C: Clock>(&self, ec: &Mailbox<P, C>) -> EcResult<R>
    where
        Self: Sized,
    {
        let request = self.format_request();
        let mut response = vec![0; if Self::no_response() { 0 } else { R::SIZE }];
        let mut msg = Message {
            msg_type: Self::msg_type(),
            no_response: Self::no_response(),
            request: &request,
            response: &mut response,
        };
        let res = ec.execute(&mut msg);
        trace!("send_command<{:?}>", Self::msg_type());
        trace!("  Request:  {:?}", request);
        trace!("  Response: {:?}", response);
        res?;

        Ok(R::from_response(&response))
    }
}
