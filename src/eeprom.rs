use crate::bus::{ControlLines, ParallelBus};
use crate::device::{ProtectCycle, PAGE_SIZE, PROTECT_DISABLE, PROTECT_ENABLE, WRITE_CYCLE_MS};
use core::iter::FusedIterator;
use hal::blocking::delay::DelayMs;
use log::trace;

/// Errors of the EEPROM access layer
#[derive(Debug, PartialEq, Eq)]
pub enum EepromError<E> {
    /// The bus could not be driven
    BusError(E),
    /// More than one page of data passed to a page write
    TooMuchData,
}

type BusRes<E> = Result<(), EepromError<E>>;

/// Byte and page access to a 28x series parallel EEPROM
#[derive(Debug)]
pub struct Eeprom<BUS, DELAY> {
    bus: BUS,
    delay: DELAY,
}

impl<BUS, E, DELAY> Eeprom<BUS, DELAY>
where
    BUS: ParallelBus<Error = E>,
    DELAY: DelayMs<u16>,
{
    /// Take ownership of the bus and a delay provider for write cycles
    pub fn new(bus: BUS, delay: DELAY) -> Self {
        Eeprom { bus, delay }
    }

    /// Read a single byte from an address
    pub fn read_byte(&mut self, address: u16) -> Result<u8, EepromError<E>> {
        self.bus
            .set_control(ControlLines::READ)
            .map_err(EepromError::BusError)?;
        self.bus
            .set_address(address)
            .map_err(EepromError::BusError)?;
        self.bus.read_data().map_err(EepromError::BusError)
    }

    /// Read every address in `start..=end`, in ascending order.
    ///
    /// Nothing is read until the iterator is advanced.
    pub fn read_range(&mut self, start: u16, end: u16) -> ReadRange<'_, BUS, DELAY> {
        ReadRange {
            eeprom: self,
            next: u32::from(start),
            end: u32::from(end),
        }
    }

    /// Write a single byte to an address.
    ///
    /// The device is busy for `WRITE_CYCLE_MS` afterwards; waiting is up to
    /// the caller so that page writes only pay for it once.
    pub fn write_byte(&mut self, address: u16, byte: u8) -> BusRes<E> {
        self.enter_write()?;
        self.program(address, byte)?;
        self.exit_write()
    }

    /// Write up to a page of bytes at consecutive addresses, followed by a
    /// single write cycle delay.
    ///
    /// The slice must not cross a device page boundary.
    pub fn write_page(&mut self, address: u16, bytes: &[u8]) -> BusRes<E> {
        if bytes.len() > PAGE_SIZE {
            return Err(EepromError::TooMuchData);
        }
        if bytes.is_empty() {
            return Ok(());
        }
        trace!("page write {:#06x}, {} bytes", address, bytes.len());
        self.enter_write()?;
        for (offset, byte) in bytes.iter().enumerate() {
            self.program(address.wrapping_add(offset as u16), *byte)?;
        }
        self.exit_write()?;
        self.delay.delay_ms(WRITE_CYCLE_MS);
        Ok(())
    }

    /// Issue the command cycles of a software data protection sequence.
    ///
    /// No delay is inserted between or after the cycles.
    pub fn run_protect_sequence(&mut self, sequence: &[ProtectCycle]) -> BusRes<E> {
        trace!("protect sequence, {} cycles", sequence.len());
        self.enter_write()?;
        for &(address, byte) in sequence {
            self.program(address, byte)?;
        }
        self.exit_write()
    }

    /// Enable software data protection
    pub fn lock(&mut self) -> BusRes<E> {
        self.run_protect_sequence(&PROTECT_ENABLE)
    }

    /// Disable software data protection
    pub fn unlock(&mut self) -> BusRes<E> {
        self.run_protect_sequence(&PROTECT_DISABLE)
    }

    /// Borrow the bus
    pub fn bus(&self) -> &BUS {
        &self.bus
    }

    /// Destroy the driver, returning the bus and the delay
    pub fn release(self) -> (BUS, DELAY) {
        (self.bus, self.delay)
    }

    fn enter_write(&mut self) -> BusRes<E> {
        self.bus
            .set_control(ControlLines::WRITE_SETUP)
            .map_err(EepromError::BusError)
    }

    // back to a state where nothing drives the data bus
    fn exit_write(&mut self) -> BusRes<E> {
        self.bus
            .set_control(ControlLines::IDLE)
            .map_err(EepromError::BusError)
    }

    /// Present address and data, then pulse ~WE; the device latches on the
    /// rising edge.
    fn program(&mut self, address: u16, byte: u8) -> BusRes<E> {
        self.bus
            .set_address(address)
            .map_err(EepromError::BusError)?;
        self.bus.set_data(byte).map_err(EepromError::BusError)?;
        self.bus
            .set_control(ControlLines::WRITE_STROBE)
            .map_err(EepromError::BusError)?;
        self.bus
            .set_control(ControlLines::WRITE_SETUP)
            .map_err(EepromError::BusError)
    }
}

/// Lazy read of an inclusive address range, see [`Eeprom::read_range`]
#[derive(Debug)]
pub struct ReadRange<'a, BUS, DELAY> {
    eeprom: &'a mut Eeprom<BUS, DELAY>,
    next: u32,
    end: u32,
}

impl<'a, BUS, E, DELAY> Iterator for ReadRange<'a, BUS, DELAY>
where
    BUS: ParallelBus<Error = E>,
    DELAY: DelayMs<u16>,
{
    type Item = Result<u8, EepromError<E>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next > self.end {
            return None;
        }
        let address = self.next as u16;
        self.next += 1;
        Some(self.eeprom.read_byte(address))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = (self.end + 1).saturating_sub(self.next) as usize;
        (len, Some(len))
    }
}

impl<'a, BUS, E, DELAY> ExactSizeIterator for ReadRange<'a, BUS, DELAY>
where
    BUS: ParallelBus<Error = E>,
    DELAY: DelayMs<u16>,
{
}

impl<'a, BUS, E, DELAY> FusedIterator for ReadRange<'a, BUS, DELAY>
where
    BUS: ParallelBus<Error = E>,
    DELAY: DelayMs<u16>,
{
}
