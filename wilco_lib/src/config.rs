//! Loading the EC port configuration from a TOML file
//!
//! ```toml
//! [ports]
//! emi_base = 0x0800
//! data = 0x0200
//! command = 0x0204
//!
//! [mailbox]
//! timeout_ms = 1000
//! poll_interval_us = 100
//! ```

use alloc::format;
use alloc::string::String;
use core::time::Duration;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::wilco_ec::{EcError, EcPorts, EcResult, EmiWindow, MailboxTiming};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Config {
    ports: Ports,
    mailbox: Option<Mailbox>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Ports {
    emi_base: u16,
    data: u16,
    command: u16,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Mailbox {
    timeout_ms: Option<u64>,
    poll_interval_us: Option<u64>,
}

const CONFIG_FILE: &str = "wilco_ec_config.toml";

/// Where the EC is and how patient to be with it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EcConfig {
    pub ports: EcPorts,
    pub timing: MailboxTiming,
}

impl EcConfig {
    pub fn from_toml_str(toml_str: &str) -> EcResult<Self> {
        let decoded: Config =
            toml::from_str(toml_str).map_err(|e| EcError::Config(format!("{}", e)))?;
        debug!("{:?}", decoded);

        if !EmiWindow::fits(decoded.ports.emi_base) {
            return Err(EcError::Config(format!(
                "EMI window at {:#X} runs past the last I/O port",
                decoded.ports.emi_base
            )));
        }

        let mut timing = MailboxTiming::default();
        if let Some(mailbox) = decoded.mailbox {
            if let Some(ms) = mailbox.timeout_ms {
                timing.timeout = Duration::from_millis(ms);
            }
            if let Some(us) = mailbox.poll_interval_us {
                if us == 0 {
                    return Err(EcError::Config(
                        "poll_interval_us must not be 0".into(),
                    ));
                }
                timing.poll_interval = Duration::from_micros(us);
            }
        }

        Ok(EcConfig {
            ports: EcPorts {
                emi_base: decoded.ports.emi_base,
                data: decoded.ports.data,
                command: decoded.ports.command,
            },
            timing,
        })
    }
}

fn read_config_file(path: &Path) -> EcResult<String> {
    std::fs::read_to_string(path)
        .map_err(|e| EcError::Config(format!("Failed to read {}: {}", path.display(), e)))
}

/// Load the config file next to the executable, or else from the working directory
pub fn load_config() -> EcResult<EcConfig> {
    if let Ok(mut path) = std::env::current_exe() {
        path.pop();
        path.push(CONFIG_FILE);
        if path.exists() {
            return load_config_from(&path);
        }
    }
    load_config_from(&PathBuf::from(CONFIG_FILE))
}

pub fn load_config_from(path: &Path) -> EcResult<EcConfig> {
    EcConfig::from_toml_str(&read_config_file(path)?)
}
