//! Command protocol engine: prompt, dispatch and the read/write flows.

use crate::bus::ParallelBus;
use crate::command::{Command, CommandError, EchoMode};
use crate::config::{Config, CRLF, PROMPT};
use crate::device::page_remaining;
use crate::eeprom::{Eeprom, EepromError};
use crate::session::{write_all, LowPower, Session, Wake};
use crate::Error;
use core::convert::Infallible;
use core::fmt;
use hal::blocking::delay::DelayMs;
use hal::serial;
use log::{debug, trace, warn};

const HELP: &[&str] = &[
    "help: this help information",
    "echo {on,off,test}: display, enable, disable echo, or loop bytes back until CR",
    "read 0xabcd 0xef01: read bytes from start to end addr, inclusive",
    "write 0xabcd 0xef01 {page,nopage}: write bytes from start to end addr.",
    "  If nopage, bytes will be written individually with 10ms pauses",
    "  between each byte. By default, will RX bytes up to next 64-byte",
    "  boundary and write up to 64 bytes as a page.",
];

type Res<B, S> = Result<(), Error<B, S>>;

/// Size of the next write chunk starting at `current`, for a range ending at
/// `end` (inclusive)
pub fn chunk_len(current: u16, end: u16, page_mode: bool) -> usize {
    let remaining = usize::from(end) - usize::from(current) + 1;
    if page_mode {
        page_remaining(current).min(remaining)
    } else {
        1
    }
}

/// The programmer: one serial peer, one EEPROM
#[derive(Debug)]
pub struct Programmer<SERIAL, BUS, DELAY, SLEEP> {
    serial: SERIAL,
    eeprom: Eeprom<BUS, DELAY>,
    session: Session,
    sleep: SLEEP,
    config: Config,
}

impl<SERIAL, SE, BUS, BE, DELAY, SLEEP> Programmer<SERIAL, BUS, DELAY, SLEEP>
where
    SERIAL: serial::Read<u8, Error = SE> + serial::Write<u8, Error = SE>,
    BUS: ParallelBus<Error = BE>,
    DELAY: DelayMs<u16>,
    SLEEP: LowPower,
{
    /// Take ownership of the serial port and the EEPROM. `sleep` is called
    /// whenever no byte is waiting.
    pub fn new(serial: SERIAL, eeprom: Eeprom<BUS, DELAY>, sleep: SLEEP, config: Config) -> Self {
        Programmer {
            serial,
            eeprom,
            session: Session::new(config.echo),
            sleep,
            config,
        }
    }

    /// Send the boot line break
    pub fn start(&mut self) -> Res<BE, SE> {
        self.send(CRLF)
    }

    /// Prompt, wait for one command line and execute it.
    ///
    /// Anything left over from a command that ended in an error is dropped
    /// first.
    pub fn step(&mut self) -> Res<BE, SE> {
        self.session.reset();
        self.send(PROMPT)?;
        loop {
            match self.wait()? {
                Wake::Line => break,
                wake => warn!("unexpected {:?} while waiting for a command", wake),
            }
        }
        let line = match self.session.take_line() {
            Some(line) => line,
            None => {
                warn!("command line overflow");
                return self.reject(CommandError::LineTooLong);
            }
        };
        match Command::parse(&line) {
            Ok(Some(command)) => self.dispatch(command),
            Ok(None) => Ok(()),
            Err(e) => self.reject(e),
        }
    }

    /// Serve commands forever; only returns on a transmit or bus error
    pub fn run(&mut self) -> Result<Infallible, Error<BE, SE>> {
        self.start()?;
        loop {
            self.step()?;
        }
    }

    /// The configuration the programmer was created with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Borrow the serial session
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Borrow the serial port
    pub fn serial(&self) -> &SERIAL {
        &self.serial
    }

    /// Borrow the EEPROM
    pub fn eeprom(&self) -> &Eeprom<BUS, DELAY> {
        &self.eeprom
    }

    /// Destroy the programmer, returning the serial port and the EEPROM
    pub fn release(self) -> (SERIAL, Eeprom<BUS, DELAY>) {
        (self.serial, self.eeprom)
    }

    fn dispatch(&mut self, command: Command<'_>) -> Res<BE, SE> {
        debug!("dispatch {:?}", command);
        match command {
            Command::Echo(mode) => self.cmd_echo(mode),
            Command::Read { start, end } => self.cmd_read(start, end),
            Command::Write {
                start,
                end,
                page_mode,
            } => self.cmd_write(start, end, page_mode),
            Command::Help => self.cmd_help(),
            Command::Unknown(_) => self.line(format_args!("Invalid command")),
        }
    }

    fn cmd_echo(&mut self, mode: EchoMode) -> Res<BE, SE> {
        match mode {
            EchoMode::On => self.session.set_echo(true),
            EchoMode::Off => self.session.set_echo(false),
            EchoMode::Query => {}
            EchoMode::Test => return self.cmd_echo_test(),
        }
        let echo = self.session.echo();
        self.line(format_args!(
            "Current echo setting: {} ({})",
            echo as u8,
            if echo { "enabled" } else { "disabled" }
        ))
    }

    fn cmd_echo_test(&mut self) -> Res<BE, SE> {
        self.line(format_args!("Echo test: send bytes, CR to finish"))?;
        self.session.begin_probe();
        loop {
            if let Wake::Probe(count) = self.wait()? {
                return self.line(format_args!("Echo test complete: {} bytes", count));
            }
        }
    }

    fn cmd_read(&mut self, start: u16, end: u16) -> Res<BE, SE> {
        self.announce_range(start, end)?;
        self.line(format_args!(
            "Sending {} bytes now...",
            u32::from(end) - u32::from(start) + 1
        ))?;
        for byte in self.eeprom.read_range(start, end) {
            let byte = byte?;
            nb::block!(self.serial.write(byte)).map_err(Error::SerialError)?;
        }
        Ok(())
    }

    fn cmd_write(&mut self, start: u16, end: u16, page_mode: bool) -> Res<BE, SE> {
        self.announce_range(start, end)?;
        self.line(format_args!(
            "Total bytes to write: {}",
            u32::from(end) - u32::from(start) + 1
        ))?;
        self.line(format_args!(
            "{}",
            if page_mode { "Paging" } else { "No Paging" }
        ))?;

        if self.config.lock_mode {
            trace!("disabling software data protection");
            self.eeprom.unlock()?;
        }

        // leave data mode and relock even when the transfer failed
        let result = self.write_chunks(start, end, page_mode);
        self.session.finish_write();
        if self.config.lock_mode {
            trace!("enabling software data protection");
            let locked = self.eeprom.lock().map_err(Error::from);
            return result.and(locked);
        }
        result
    }

    fn write_chunks(&mut self, start: u16, end: u16, page_mode: bool) -> Res<BE, SE> {
        // u32 so that a range ending at the last address terminates
        let mut current = u32::from(start);
        while current <= u32::from(end) {
            let address = current as u16;
            let target = chunk_len(address, end, page_mode);
            self.line(format_args!(
                "Send {} bytes, {} remaining...",
                target,
                u32::from(end) - current + 1
            ))?;
            self.session.begin_chunk(target);
            while self.wait()? != Wake::Chunk {}

            self.line(format_args!(
                "Writing {} bytes starting at 0x{:04x}",
                target, address
            ))?;
            self.eeprom.write_page(address, self.session.chunk())?;
            current += target as u32;
        }
        Ok(())
    }

    fn cmd_help(&mut self) -> Res<BE, SE> {
        for text in HELP {
            self.line(format_args!("{}", text))?;
        }
        Ok(())
    }

    fn announce_range(&mut self, start: u16, end: u16) -> Res<BE, SE> {
        self.line(format_args!("Start addr: {:04x} ({})", start, start))?;
        self.line(format_args!("End addr: {:04x} ({})", end, end))
    }

    fn reject(&mut self, error: CommandError) -> Res<BE, SE> {
        warn!("rejected command: {:?}", error);
        self.line(format_args!("{}", error))
    }

    fn wait(&mut self) -> Result<Wake, Error<BE, SE>> {
        self.session
            .wait(&mut self.serial, &mut self.sleep)
            .map_err(Error::SerialError)
    }

    fn send(&mut self, bytes: &[u8]) -> Res<BE, SE> {
        write_all(&mut self.serial, bytes).map_err(Error::SerialError)
    }

    /// Formatted reply followed by CRLF
    fn line(&mut self, args: fmt::Arguments<'_>) -> Res<BE, SE> {
        let mut writer = Writer {
            serial: &mut self.serial,
            error: None,
        };
        let result = fmt::write(&mut writer, args);
        if let Some(e) = writer.error {
            return Err(Error::SerialError(e));
        }
        if result.is_err() {
            warn!("reply formatting failed");
        }
        self.send(CRLF)
    }
}

impl<B, S> From<EepromError<B>> for Error<B, S> {
    fn from(e: EepromError<B>) -> Self {
        match e {
            EepromError::BusError(e) => Error::BusError(e),
            EepromError::TooMuchData => Error::TooMuchData,
        }
    }
}

/// `fmt::Write` over a blocking serial port, keeping the port's error
struct Writer<'a, S: serial::Write<u8>> {
    serial: &'a mut S,
    error: Option<S::Error>,
}

impl<'a, S: serial::Write<u8>> fmt::Write for Writer<'a, S> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        write_all(&mut *self.serial, s.as_bytes()).map_err(|e| {
            self.error = Some(e);
            fmt::Error
        })
    }
}
