//! Test doubles: a simulated 28x device behind `ParallelBus`, a delay that
//! shares its event log, and an in-memory serial port.

use crate::bus::{ControlLines, ParallelBus};
use crate::device::MAX_ADDRESS;
use core::convert::Infallible;
use hal::blocking::delay::DelayMs;
use hal::serial;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::string::String;
use std::vec::Vec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Commit { address: u16, data: u8 },
    Read { address: u16 },
    Delay(u16),
}

pub type Log = Rc<RefCell<Vec<Event>>>;

pub fn new_log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Every committed (address, data) pair, in order
pub fn commits(log: &Log) -> Vec<(u16, u8)> {
    log.borrow()
        .iter()
        .filter_map(|event| match *event {
            Event::Commit { address, data } => Some((address, data)),
            _ => None,
        })
        .collect()
}

/// Behaves like the device at the far end of the shift registers: data is
/// committed on the rising edge of ~WE.
#[derive(Debug)]
pub struct SimBus {
    memory: Vec<u8>,
    address: u16,
    data: u8,
    lines: ControlLines,
    history: Vec<ControlLines>,
    log: Log,
}

impl SimBus {
    pub fn new(log: Log) -> Self {
        SimBus {
            memory: vec![0xFF; MAX_ADDRESS as usize + 1],
            address: 0,
            data: 0,
            lines: ControlLines::IDLE,
            history: Vec::new(),
            log,
        }
    }

    pub fn history(&self) -> &[ControlLines] {
        &self.history
    }

    fn cell(&self) -> usize {
        (self.address & MAX_ADDRESS) as usize
    }
}

impl ParallelBus for SimBus {
    type Error = Infallible;

    fn set_control(&mut self, lines: ControlLines) -> Result<(), Infallible> {
        let rising_we = self.lines.contains(ControlLines::WRITE_ENABLE)
            && !lines.contains(ControlLines::WRITE_ENABLE);
        let driven = lines.contains(ControlLines::CHIP_ENABLE | ControlLines::DATA_DRIVE)
            && !lines.contains(ControlLines::OUTPUT_ENABLE);
        if rising_we && driven {
            let cell = self.cell();
            self.memory[cell] = self.data;
            self.log.borrow_mut().push(Event::Commit {
                address: self.address,
                data: self.data,
            });
        }
        self.history.push(lines);
        self.lines = lines;
        Ok(())
    }

    fn control(&self) -> ControlLines {
        self.lines
    }

    fn set_address(&mut self, address: u16) -> Result<(), Infallible> {
        self.address = address;
        Ok(())
    }

    fn set_data(&mut self, value: u8) -> Result<(), Infallible> {
        self.data = value;
        Ok(())
    }

    fn read_data(&mut self) -> Result<u8, Infallible> {
        if self.lines.contains(ControlLines::READ) && !self.lines.contains(ControlLines::DATA_DRIVE)
        {
            self.log.borrow_mut().push(Event::Read {
                address: self.address,
            });
            Ok(self.memory[self.cell()])
        } else {
            // floating bus
            Ok(0xFF)
        }
    }
}

#[derive(Debug)]
pub struct SimDelay {
    log: Log,
}

impl SimDelay {
    pub fn new(log: Log) -> Self {
        SimDelay { log }
    }
}

impl DelayMs<u16> for SimDelay {
    fn delay_ms(&mut self, ms: u16) {
        self.log.borrow_mut().push(Event::Delay(ms));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialError {
    /// A receive fault: overrun, framing or noise
    Overrun,
    /// A transmit fault
    Transmit,
}

/// One step of the scripted input
#[derive(Debug, Clone, Copy)]
enum Rx {
    Byte(u8),
    Overrun,
    /// Fail the next write, then carry on reading
    FailWrite,
}

/// Scripted input, captured output. Reading past the end of the script
/// panics, so a test that waits for more input than it scripted fails loudly.
#[derive(Debug, Default)]
pub struct FakeSerial {
    input: VecDeque<Rx>,
    output: Vec<u8>,
    stall: bool,
    stalled: bool,
    fail_write: bool,
}

impl FakeSerial {
    pub fn new(input: &[u8]) -> Self {
        FakeSerial::default().then(input)
    }

    /// Append bytes to the script
    pub fn then(mut self, bytes: &[u8]) -> Self {
        self.input.extend(bytes.iter().map(|b| Rx::Byte(*b)));
        self
    }

    /// Append a receive error to the script
    pub fn then_overrun(mut self) -> Self {
        self.input.push_back(Rx::Overrun);
        self
    }

    /// Make the first write after this point of the script fail
    pub fn then_transmit_failure(mut self) -> Self {
        self.input.push_back(Rx::FailWrite);
        self
    }

    /// Report `WouldBlock` before every byte
    pub fn stall_every_read(mut self) -> Self {
        self.stall = true;
        self
    }

    pub fn output(&self) -> &[u8] {
        &self.output
    }

    pub fn output_text(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }

    pub fn pending_input(&self) -> usize {
        self.input.len()
    }
}

impl serial::Read<u8> for FakeSerial {
    type Error = SerialError;

    fn read(&mut self) -> nb::Result<u8, SerialError> {
        if self.stall && !self.stalled {
            self.stalled = true;
            return Err(nb::Error::WouldBlock);
        }
        self.stalled = false;
        loop {
            match self.input.pop_front() {
                Some(Rx::Byte(byte)) => return Ok(byte),
                Some(Rx::Overrun) => return Err(nb::Error::Other(SerialError::Overrun)),
                Some(Rx::FailWrite) => self.fail_write = true,
                None => panic!("scripted input exhausted"),
            }
        }
    }
}

impl serial::Write<u8> for FakeSerial {
    type Error = SerialError;

    fn write(&mut self, word: u8) -> nb::Result<(), SerialError> {
        if core::mem::replace(&mut self.fail_write, false) {
            return Err(nb::Error::Other(SerialError::Transmit));
        }
        self.output.push(word);
        Ok(())
    }

    fn flush(&mut self) -> nb::Result<(), SerialError> {
        Ok(())
    }
}
