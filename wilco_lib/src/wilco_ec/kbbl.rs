//! Keyboard backlight control through legacy mailbox messages

use alloc::vec::Vec;
use core::cmp;

use super::command::{EcRequest, EcResponse};
use super::mailbox::Mailbox;
use super::portio::PortIo;
use super::{EcError, EcResult};
use crate::os_specific::Clock;

pub const WILCO_EC_COMMAND_KBBL: u8 = 0x75;
/// Set brightness by percent
pub const WILCO_KBBL_MODE_FLAG_PWM: u8 = 1 << 1;
pub const WILCO_KBBL_DEFAULT_BRIGHTNESS: u8 = 0;
/// Status the EC sets when it has no keyboard backlight
const KBBL_STATUS_UNSUPPORTED: u8 = 0xFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum KbblSubcommand {
    GetFeatures = 0x00,
    GetState = 0x01,
    SetState = 0x02,
}

/// Message to and from the EC for keyboard LED control
///
/// Reserved bytes are always sent as 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyboardLedsMsg {
    /// Always WILCO_EC_COMMAND_KBBL
    pub command: u8,
    /// Set by EC to 0 on success, 0xFF on failure
    pub status: u8,
    /// One of KbblSubcommand
    pub subcmd: u8,
    /// Bit flags for used mode, we want to use WILCO_KBBL_MODE_FLAG_PWM
    pub mode: u8,
    /// Brightness in 0-100. Only meaningful in PWM mode
    pub percent: u8,
}

impl KeyboardLedsMsg {
    pub const SIZE: usize = 16;

    pub fn new(subcmd: KbblSubcommand) -> Self {
        KeyboardLedsMsg {
            command: WILCO_EC_COMMAND_KBBL,
            subcmd: subcmd as u8,
            ..Default::default()
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0; Self::SIZE];
        bytes[0] = self.command;
        bytes[1] = self.status;
        bytes[2] = self.subcmd;
        bytes[4] = self.mode;
        bytes[9] = self.percent;
        bytes
    }
}

impl EcResponse for KeyboardLedsMsg {
    const SIZE: usize = KeyboardLedsMsg::SIZE;

    fn from_response(bytes: &[u8]) -> Self {
        KeyboardLedsMsg {
            command: bytes[0],
            status: bytes[1],
            subcmd: bytes[2],
            mode: bytes[4],
            percent: bytes[9],
        }
    }
}

impl EcRequest<KeyboardLedsMsg> for KeyboardLedsMsg {
    fn format_request(&self) -> Vec<u8> {
        self.to_bytes().to_vec()
    }
}

/// Backlight state as reported by the EC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KbblState {
    /// Brightness is controlled by percent
    pub pwm: bool,
    pub percent: u8,
}

fn check_status(response: &KeyboardLedsMsg) -> EcResult<()> {
    if response.status != 0 {
        info!(
            "EC reported failure sending keyboard LEDs command: {}",
            response.status
        );
        return Err(EcError::DeviceReportedFailure(response.status.into()));
    }
    Ok(())
}

/// Whether the EC has a keyboard backlight
pub fn exists<P: PortIo, C: Clock>(ec: &Mailbox<P, C>) -> EcResult<bool> {
    let response = KeyboardLedsMsg::new(KbblSubcommand::GetFeatures).send_command(ec)?;
    Ok(response.status != KBBL_STATUS_UNSUPPORTED)
}

pub fn get_state<P: PortIo, C: Clock>(ec: &Mailbox<P, C>) -> EcResult<KbblState> {
    let response = KeyboardLedsMsg::new(KbblSubcommand::GetState).send_command(ec)?;
    check_status(&response)?;
    Ok(KbblState {
        pwm: response.mode & WILCO_KBBL_MODE_FLAG_PWM != 0,
        percent: response.percent,
    })
}

/// Set the brightness in percent, values above 100 are clamped
pub fn set_brightness<P: PortIo, C: Clock>(ec: &Mailbox<P, C>, percent: u8) -> EcResult<()> {
    let request = KeyboardLedsMsg {
        mode: WILCO_KBBL_MODE_FLAG_PWM,
        percent: cmp::min(percent, 100),
        ..KeyboardLedsMsg::new(KbblSubcommand::SetState)
    };
    let response = request.send_command(ec)?;
    check_status(&response)
}

/// Bring the backlight into a known state
///
/// If the BIOS already put the backlight into PWM mode, its brightness is
/// kept unless `current` is non-zero. Otherwise the brightness reported by
/// the EC is meaningless and the default brightness is set.
///
/// Returns the brightness the backlight ends up with.
pub fn init<P: PortIo, C: Clock>(ec: &Mailbox<P, C>, current: u8) -> EcResult<u8> {
    let state = get_state(ec)?;
    if state.pwm {
        return Ok(if current == 0 { state.percent } else { current });
    }

    set_brightness(ec, WILCO_KBBL_DEFAULT_BRIGHTNESS)?;
    Ok(WILCO_KBBL_DEFAULT_BRIGHTNESS)
}
