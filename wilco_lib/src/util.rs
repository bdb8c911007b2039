//! Miscellaneous utility functions to use across modules

use alloc::string::String;
use core::fmt::Write;

/// Format a byte buffer as a series of hex bytes
pub fn format_buffer(buffer: &[u8]) -> String {
    let mut out = String::new();
    for (i, byte) in buffer.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{:02X}", byte);
    }
    out
}

/// Format a byte buffer like a hexdump, 16 bytes per line.
///
/// Every line is prefixed with its address, starting at `offset`.
pub fn format_multiline_buffer(buffer: &[u8], offset: usize) -> String {
    let mut out = String::new();
    for (i, chunk) in buffer.chunks(16).enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let _ = write!(out, "{:08X}: {}", offset + i * 16, format_buffer(chunk));
    }
    out
}
