//! A library to talk to the Wilco embedded controller over the mailbox
//! interface, carried by the Microchip MEC EMI port window.

extern crate alloc;

#[macro_use]
extern crate lazy_static;

#[macro_use]
extern crate log;

pub mod config;
pub mod os_specific;
mod util;
pub mod wilco_ec;
