//! Runtime configuration and protocol constants

/// Capacity of the command line buffer
pub const LINE_CAPACITY: usize = 32;

/// Line terminator sent by the peer
pub const CR: u8 = 0x0D;

/// Line terminator for everything we send
pub const CRLF: &[u8] = b"\r\n";

/// Sent whenever the programmer is ready for a command
pub const PROMPT: &[u8] = b"ready>";

/// Programmer settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Echo received command characters back to the peer
    pub echo: bool,
    /// Unlock software data protection before a write and relock it after
    pub lock_mode: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            echo: true,
            lock_mode: false,
        }
    }
}
