//! Parsing of the line oriented command protocol.
//!
//! ```text
//! read 0xabcd 0xef01
//! 0      ^7     ^14
//! write 0xabcd 0xef01 nopage
//! 0       ^8     ^15  ^20
//! ```

use crate::device::MAX_ADDRESS;
use core::fmt;

/// Exact length of a `read` line
pub const READ_LEN: usize = 18;
/// Length of a `write` line without page mode field
pub const WRITE_LEN: usize = 19;
/// Length of a `write ... page` line
pub const WRITE_PAGE_LEN: usize = 24;
/// Length of a `write ... nopage` line
pub const WRITE_NOPAGE_LEN: usize = 26;

/// Argument of the `echo` command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoMode {
    /// Report the current setting
    Query,
    /// Echo command characters
    On,
    /// Stop echoing command characters
    Off,
    /// Loop every byte back until the next CR
    Test,
}

/// A parsed command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    /// `echo [on|off|test]`
    Echo(EchoMode),
    /// `read 0x#### 0x####`, inclusive range
    Read { start: u16, end: u16 },
    /// `write 0x#### 0x#### [page|nopage]`, inclusive range
    Write { start: u16, end: u16, page_mode: bool },
    /// `help`
    Help,
    /// Anything else
    Unknown(&'a [u8]),
}

/// Commands taking an address range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// `read`
    Read,
    /// `write`
    Write,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandKind::Read => f.write_str("read"),
            CommandKind::Write => f.write_str("write"),
        }
    }
}

/// A rejected command line. `Display` gives the reply sent to the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// The line does not have the fixed layout length
    WrongLength { kind: CommandKind, actual: usize },
    /// The start address field is not four hex digits
    BadStartAddress(CommandKind),
    /// The end address field is not four hex digits
    BadEndAddress(CommandKind),
    /// start > end
    StartAfterEnd(CommandKind),
    /// The range reaches past the end of the device
    OutOfRange(CommandKind),
    /// The write mode field is neither `page` nor `nopage`
    BadPageMode,
    /// The line did not fit the line buffer
    LineTooLong,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            CommandError::WrongLength { kind, actual } => {
                let expected = match kind {
                    CommandKind::Read => "18",
                    CommandKind::Write => "19, 24, or 26",
                };
                write!(
                    f,
                    "Invalid {} command: wrong length: {}, expecting {}",
                    kind, actual, expected
                )
            }
            CommandError::BadStartAddress(kind) => {
                write!(f, "Invalid {} command: cannot parse start addr", kind)
            }
            CommandError::BadEndAddress(kind) => {
                write!(f, "Invalid {} command: cannot parse end addr", kind)
            }
            CommandError::StartAfterEnd(kind) => {
                write!(f, "Invalid {} command: start-addr > end-addr", kind)
            }
            CommandError::OutOfRange(kind) => write!(
                f,
                "Invalid {} command: address out of range (max 0x{:04x})",
                kind, MAX_ADDRESS
            ),
            CommandError::BadPageMode => {
                f.write_str("Invalid write command: page/nopage not parsed")
            }
            CommandError::LineTooLong => write!(
                f,
                "Invalid command: line too long (max {} characters)",
                crate::config::LINE_CAPACITY
            ),
        }
    }
}

impl<'a> Command<'a> {
    /// Parse a line (without its CR). An empty line gives `Ok(None)`.
    ///
    /// Commands are recognised by prefix, in the order echo, read, write,
    /// help.
    pub fn parse(line: &'a [u8]) -> Result<Option<Self>, CommandError> {
        if line.is_empty() {
            return Ok(None);
        }
        let command = if line.starts_with(b"echo") {
            Command::Echo(parse_echo(line))
        } else if line.starts_with(b"read") {
            parse_read(line)?
        } else if line.starts_with(b"write") {
            parse_write(line)?
        } else if line.starts_with(b"help") {
            Command::Help
        } else {
            Command::Unknown(line)
        };
        Ok(Some(command))
    }
}

fn parse_echo(line: &[u8]) -> EchoMode {
    match line {
        b"echo on" => EchoMode::On,
        b"echo off" => EchoMode::Off,
        b"echo test" => EchoMode::Test,
        _ => EchoMode::Query,
    }
}

fn parse_read(line: &[u8]) -> Result<Command<'_>, CommandError> {
    if line.len() != READ_LEN {
        return Err(CommandError::WrongLength {
            kind: CommandKind::Read,
            actual: line.len(),
        });
    }
    let (start, end) = parse_range(CommandKind::Read, &line[7..11], &line[14..18])?;
    Ok(Command::Read { start, end })
}

fn parse_write(line: &[u8]) -> Result<Command<'_>, CommandError> {
    match line.len() {
        WRITE_LEN | WRITE_PAGE_LEN | WRITE_NOPAGE_LEN => {}
        actual => {
            return Err(CommandError::WrongLength {
                kind: CommandKind::Write,
                actual,
            })
        }
    }
    let (start, end) = parse_range(CommandKind::Write, &line[8..12], &line[15..19])?;
    let page_mode = match &line[WRITE_LEN..] {
        b"" | b" page" => true,
        b" nopage" => false,
        _ => return Err(CommandError::BadPageMode),
    };
    Ok(Command::Write {
        start,
        end,
        page_mode,
    })
}

fn parse_range(kind: CommandKind, start: &[u8], end: &[u8]) -> Result<(u16, u16), CommandError> {
    let start = parse_hex(start).ok_or(CommandError::BadStartAddress(kind))?;
    let end = parse_hex(end).ok_or(CommandError::BadEndAddress(kind))?;
    if start > end {
        return Err(CommandError::StartAfterEnd(kind));
    }
    if end > MAX_ADDRESS {
        return Err(CommandError::OutOfRange(kind));
    }
    Ok((start, end))
}

/// Exactly four hex digits, nothing else
fn parse_hex(field: &[u8]) -> Option<u16> {
    if field.len() != 4 || !field.iter().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let text = core::str::from_utf8(field).ok()?;
    u16::from_str_radix(text, 16).ok()
}

// Tests
#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Result<Option<Command<'_>>, CommandError> {
        Command::parse(line.as_bytes())
    }

    #[test]
    fn empty_line_is_not_a_command() {
        assert_eq!(parse(""), Ok(None));
    }

    #[test]
    fn echo_arguments() {
        assert_eq!(parse("echo"), Ok(Some(Command::Echo(EchoMode::Query))));
        assert_eq!(parse("echo on"), Ok(Some(Command::Echo(EchoMode::On))));
        assert_eq!(parse("echo off"), Ok(Some(Command::Echo(EchoMode::Off))));
        assert_eq!(parse("echo test"), Ok(Some(Command::Echo(EchoMode::Test))));
        assert_eq!(parse("echo maybe"), Ok(Some(Command::Echo(EchoMode::Query))));
    }

    #[test]
    fn read_range_is_parsed_from_fixed_offsets() {
        assert_eq!(
            parse("read 0x01ab 0x7FFF"),
            Ok(Some(Command::Read {
                start: 0x01ab,
                end: 0x7fff
            }))
        );
    }

    #[test]
    fn read_accepts_zero_addresses() {
        assert_eq!(
            parse("read 0x0000 0x0000"),
            Ok(Some(Command::Read { start: 0, end: 0 }))
        );
    }

    #[test]
    fn read_rejects_other_lengths() {
        let err = parse("read 0x0000 0x001").unwrap_err();
        assert_eq!(
            err,
            CommandError::WrongLength {
                kind: CommandKind::Read,
                actual: 17
            }
        );
        assert_eq!(
            err.to_string(),
            "Invalid read command: wrong length: 17, expecting 18"
        );
        assert!(parse("read 0x0000 0x00010").is_err());
        assert!(parse("read").is_err());
    }

    #[test]
    fn malformed_hex_is_rejected() {
        assert_eq!(
            parse("read 0x00g0 0x0010"),
            Err(CommandError::BadStartAddress(CommandKind::Read))
        );
        assert_eq!(
            parse("read 0x0010 0x1x00"),
            Err(CommandError::BadEndAddress(CommandKind::Read))
        );
        // a partial parse does not slip through as a smaller number
        assert_eq!(
            parse("read 0x12 z 0x0010"),
            Err(CommandError::BadStartAddress(CommandKind::Read))
        );
        assert_eq!(
            parse("read 0x+123 0x0010"),
            Err(CommandError::BadStartAddress(CommandKind::Read))
        );
        assert_eq!(
            CommandError::BadEndAddress(CommandKind::Write).to_string(),
            "Invalid write command: cannot parse end addr"
        );
    }

    #[test]
    fn inverted_and_out_of_range_addresses_are_rejected() {
        assert_eq!(
            parse("read 0x0010 0x000f"),
            Err(CommandError::StartAfterEnd(CommandKind::Read))
        );
        assert_eq!(
            parse("write 0x7fff 0x8000"),
            Err(CommandError::OutOfRange(CommandKind::Write))
        );
        assert_eq!(
            CommandError::StartAfterEnd(CommandKind::Read).to_string(),
            "Invalid read command: start-addr > end-addr"
        );
    }

    #[test]
    fn write_layouts() {
        let paged = Command::Write {
            start: 0x203e,
            end: 0x2041,
            page_mode: true,
        };
        assert_eq!(parse("write 0x203e 0x2041"), Ok(Some(paged)));
        assert_eq!(parse("write 0x203e 0x2041 page"), Ok(Some(paged)));
        assert_eq!(
            parse("write 0x203e 0x2041 nopage"),
            Ok(Some(Command::Write {
                start: 0x203e,
                end: 0x2041,
                page_mode: false
            }))
        );
        assert_eq!(
            parse("write 0x203e 0x2041 pgae"),
            Err(CommandError::BadPageMode)
        );
        let err = parse("write 0x203e 0x2041 p").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid write command: wrong length: 21, expecting 19, 24, or 26"
        );
    }

    #[test]
    fn prefixes_and_unknown_lines() {
        assert_eq!(parse("help"), Ok(Some(Command::Help)));
        assert_eq!(parse("helpme"), Ok(Some(Command::Help)));
        assert_eq!(
            parse("erase"),
            Ok(Some(Command::Unknown(b"erase".as_ref())))
        );
        assert_eq!(parse(" read"), Ok(Some(Command::Unknown(b" read".as_ref()))));
    }
}
