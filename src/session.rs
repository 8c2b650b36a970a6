//! Serial session driver, the receive side of the protocol.
//!
//! [`Session::on_byte`] plays the part of the receive interrupt: it runs to
//! completion for every byte and only reports a [`Wake`] once a command line,
//! a write chunk or an echo probe is complete. [`Session::wait`] is the
//! foreground's suspension point; no byte is consumed outside of it, so the
//! handler never runs while a command is being dispatched.

use crate::config::{CR, CRLF, LINE_CAPACITY};
use crate::device::PAGE_SIZE;
use hal::serial;
use heapless::Vec;
use log::warn;

/// A received command line
pub type Line = Vec<u8, LINE_CAPACITY>;

/// What the receive handler is collecting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing received since the last prompt
    AwaitingCommand,
    /// Part of a command line received
    CollectingCommandLine,
    /// Raw data for a write, never echoed
    AwaitingWriteChunk,
    /// Loopback: everything is echoed until CR
    EchoTestProbe,
}

/// Reason the receive handler woke the foreground
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// A command line ended with CR
    Line,
    /// The announced number of write bytes arrived
    Chunk,
    /// An echo probe ended, with the number of bytes looped back
    Probe(usize),
}

/// Called whenever no byte is waiting, e.g. to enter a low power mode until
/// the next interrupt
pub trait LowPower {
    /// Wait for the next interrupt
    fn sleep(&mut self);
}

impl<F: FnMut()> LowPower for F {
    fn sleep(&mut self) {
        self()
    }
}

/// Receive buffers and echo setting of the single serial peer
#[derive(Debug)]
pub struct Session {
    state: SessionState,
    echo: bool,
    line: Line,
    overflowed: bool,
    chunk: Vec<u8, PAGE_SIZE>,
    chunk_target: usize,
    probed: usize,
}

impl Session {
    /// A session waiting for its first command
    pub fn new(echo: bool) -> Self {
        Session {
            state: SessionState::AwaitingCommand,
            echo,
            line: Vec::new(),
            overflowed: false,
            chunk: Vec::new(),
            chunk_target: 0,
            probed: 0,
        }
    }

    /// What the receive handler is collecting
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether command characters are echoed
    pub fn echo(&self) -> bool {
        self.echo
    }

    /// Enable or disable echo of command characters
    pub fn set_echo(&mut self, echo: bool) {
        self.echo = echo;
    }

    /// Handle one received byte
    pub fn on_byte<S, E>(&mut self, byte: u8, serial: &mut S) -> Result<Option<Wake>, E>
    where
        S: serial::Write<u8, Error = E>,
    {
        match self.state {
            SessionState::AwaitingWriteChunk => {
                if self.chunk.len() < self.chunk_target {
                    // capacity is PAGE_SIZE and the target never exceeds it
                    let _ = self.chunk.push(byte);
                }
                if self.chunk.len() >= self.chunk_target {
                    return Ok(Some(Wake::Chunk));
                }
                Ok(None)
            }
            SessionState::EchoTestProbe => {
                if byte == CR {
                    write_all(serial, CRLF)?;
                    self.state = SessionState::AwaitingCommand;
                    return Ok(Some(Wake::Probe(self.probed)));
                }
                write_all(serial, &[byte])?;
                self.probed += 1;
                Ok(None)
            }
            SessionState::AwaitingCommand | SessionState::CollectingCommandLine => {
                if byte == CR {
                    if self.echo {
                        write_all(serial, CRLF)?;
                    }
                    self.state = SessionState::AwaitingCommand;
                    return Ok(Some(Wake::Line));
                }
                if self.echo {
                    write_all(serial, &[byte])?;
                }
                self.state = SessionState::CollectingCommandLine;
                if self.line.push(byte).is_err() {
                    self.overflowed = true;
                }
                Ok(None)
            }
        }
    }

    /// Feed received bytes to [`Session::on_byte`] until it wakes us,
    /// sleeping whenever the port has nothing. There is no timeout.
    ///
    /// Receive errors (overrun, framing, noise) drop the byte and waiting
    /// goes on; only a failed echo is returned.
    pub fn wait<S, E, Z>(&mut self, serial: &mut S, sleep: &mut Z) -> Result<Wake, E>
    where
        S: serial::Read<u8, Error = E> + serial::Write<u8, Error = E>,
        Z: LowPower,
    {
        loop {
            match serial.read() {
                Ok(byte) => {
                    if let Some(wake) = self.on_byte(byte, serial)? {
                        return Ok(wake);
                    }
                }
                Err(nb::Error::WouldBlock) => sleep.sleep(),
                Err(nb::Error::Other(_)) => warn!("serial receive error"),
            }
        }
    }

    /// Drop anything collected and wait for a new command line
    pub fn reset(&mut self) {
        self.line.clear();
        self.overflowed = false;
        self.chunk.clear();
        self.chunk_target = 0;
        self.probed = 0;
        self.state = SessionState::AwaitingCommand;
    }

    /// Hand over the completed line, `None` if it did not fit
    pub fn take_line(&mut self) -> Option<Line> {
        let line = core::mem::take(&mut self.line);
        let overflowed = core::mem::replace(&mut self.overflowed, false);
        self.state = SessionState::AwaitingCommand;
        if overflowed {
            None
        } else {
            Some(line)
        }
    }

    /// Start collecting `target` bytes (at most a page) of write data
    pub fn begin_chunk(&mut self, target: usize) {
        self.chunk.clear();
        self.chunk_target = target.min(PAGE_SIZE);
        self.state = SessionState::AwaitingWriteChunk;
    }

    /// The write data collected so far
    pub fn chunk(&self) -> &[u8] {
        &self.chunk
    }

    /// Leave write data mode
    pub fn finish_write(&mut self) {
        self.chunk.clear();
        self.chunk_target = 0;
        self.state = SessionState::AwaitingCommand;
    }

    /// Loop bytes back until the next CR
    pub fn begin_probe(&mut self) {
        self.probed = 0;
        self.state = SessionState::EchoTestProbe;
    }
}

/// Blocking write of every byte
pub(crate) fn write_all<S, E>(serial: &mut S, bytes: &[u8]) -> Result<(), E>
where
    S: serial::Write<u8, Error = E>,
{
    for byte in bytes {
        nb::block!(serial.write(*byte))?;
    }
    Ok(())
}
