//! Shift-register bus driver.
//!
//! The programmer reaches the EEPROM through three serial-in/parallel-out
//! chains (flags, address, data) and one parallel-in/serial-out chain used to
//! sample the device's data pins. Every call re-drives the whole chain; nothing
//! about the register contents is cached apart from the logical control line
//! state.

use bit_field::BitField;
use bitflags::bitflags;
use hal::digital::v2::{InputPin, OutputPin};

/// Width of the flags register in bits
pub const FLAGS_BITS: usize = 8;
/// Width of the address register in bits
pub const ADDRESS_BITS: usize = 16;
/// Width of the data register in bits
pub const DATA_BITS: usize = 8;

/// The output chains of the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chain {
    /// Control lines of the EEPROM and the data bus driver
    Flags,
    /// A0..A15, low byte first
    Address,
    /// D0..D7
    Data,
}

bitflags! {
    /// Logical (active-high) state of the EEPROM control lines.
    ///
    /// The physical lines are active-low; [`ControlLines::flags_byte`] does
    /// the inversion.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ControlLines: u8 {
        /// ~CE asserted
        const CHIP_ENABLE = 1 << 0;
        /// ~OE asserted, the EEPROM drives the data bus
        const OUTPUT_ENABLE = 1 << 1;
        /// R/~W pulled low
        const WRITE_ENABLE = 1 << 2;
        /// The data register drives the data bus
        const DATA_DRIVE = 1 << 3;
    }
}

impl ControlLines {
    /// Everything released, nothing drives the data bus
    pub const IDLE: Self = Self::empty();
    /// The EEPROM drives the data bus
    pub const READ: Self = Self::CHIP_ENABLE.union(Self::OUTPUT_ENABLE);
    /// The data register drives the bus, ready for a write strobe
    pub const WRITE_SETUP: Self = Self::CHIP_ENABLE.union(Self::DATA_DRIVE);
    /// Write strobe active
    pub const WRITE_STROBE: Self = Self::WRITE_SETUP.union(Self::WRITE_ENABLE);

    /// Encode the flags register byte.
    ///
    /// | bit | line        |
    /// |----:|:------------|
    /// |   0 | ~OE         |
    /// |   1 | R/~W        |
    /// |   2 | ~CE         |
    /// |   3 | ~OE (data)  |
    pub fn flags_byte(self) -> u8 {
        let mut flags = 0u8;
        flags.set_bit(0, !self.contains(Self::OUTPUT_ENABLE));
        flags.set_bit(1, !self.contains(Self::WRITE_ENABLE));
        flags.set_bit(2, !self.contains(Self::CHIP_ENABLE));
        flags.set_bit(3, !self.contains(Self::DATA_DRIVE));
        flags
    }
}

/// What the EEPROM access layer needs from a bus
pub trait ParallelBus {
    /// Error raised by the underlying pins
    type Error;

    /// Drive the control lines
    fn set_control(&mut self, lines: ControlLines) -> Result<(), Self::Error>;

    /// The control line state last driven
    fn control(&self) -> ControlLines;

    /// Drive the address lines
    fn set_address(&mut self, address: u16) -> Result<(), Self::Error>;

    /// Drive the data register (only visible on the bus with `DATA_DRIVE`)
    fn set_data(&mut self, value: u8) -> Result<(), Self::Error>;

    /// Latch and shift in the current state of the data lines
    fn read_data(&mut self) -> Result<u8, Self::Error>;
}

/// A serial-in/parallel-out register chain (74HC595 style)
#[derive(Debug)]
pub struct ShiftRegister<P> {
    ser: P,
    srclk: P,
    rclk: P,
}

impl<P, E> ShiftRegister<P>
where
    P: OutputPin<Error = E>,
{
    /// Create a chain from its serial data, shift clock and latch clock pins
    pub fn new(ser: P, srclk: P, rclk: P) -> Self {
        ShiftRegister { ser, srclk, rclk }
    }

    /// Shift `bit_count` bits of `bytes` into the chain, LSB of the first
    /// byte first, then latch them onto the outputs
    pub fn shift_out(&mut self, bytes: &[u8], bit_count: usize) -> Result<(), E> {
        let bit_count = bit_count.min(bytes.len() * 8);
        for bit in 0..bit_count {
            if bytes[bit / 8].get_bit(bit % 8) {
                self.ser.set_high()?;
            } else {
                self.ser.set_low()?;
            }
            self.srclk.set_high()?;
            self.srclk.set_low()?;
        }
        self.ser.set_low()?;
        self.rclk.set_high()?;
        self.rclk.set_low()
    }

    /// Give back the pins
    pub fn release(self) -> (P, P, P) {
        (self.ser, self.srclk, self.rclk)
    }
}

/// A parallel-in/serial-out register chain (74HC165 style)
#[derive(Debug)]
pub struct ShiftInput<P, I> {
    load: P,
    clk: P,
    data: I,
}

impl<P, I, E> ShiftInput<P, I>
where
    P: OutputPin<Error = E>,
    I: InputPin<Error = E>,
{
    /// Create a chain from its shift/~load, clock and serial output pins,
    /// parking shift/~load high (shift) and the clock low
    pub fn new(mut load: P, mut clk: P, data: I) -> Result<Self, E> {
        load.set_high()?;
        clk.set_low()?;
        Ok(ShiftInput { load, clk, data })
    }

    /// Latch the parallel inputs and shift them in.
    ///
    /// Bit 0 is present right after the load strobe, every clock pulse
    /// exposes the next one.
    pub fn read_bits(&mut self) -> Result<u8, E> {
        self.load.set_low()?;
        self.load.set_high()?;
        let mut value = 0u8;
        for bit in 0..8 {
            if bit > 0 {
                self.clk.set_high()?;
                self.clk.set_low()?;
            }
            value.set_bit(bit, self.data.is_high()?);
        }
        Ok(value)
    }

    /// Give back the pins
    pub fn release(self) -> (P, P, I) {
        (self.load, self.clk, self.data)
    }
}

/// The complete bus: three output chains plus the input chain
#[derive(Debug)]
pub struct ShiftRegisterBus<P, I> {
    flags: ShiftRegister<P>,
    address: ShiftRegister<P>,
    data: ShiftRegister<P>,
    input: ShiftInput<P, I>,
    lines: ControlLines,
}

impl<P, I, E> ShiftRegisterBus<P, I>
where
    P: OutputPin<Error = E>,
    I: InputPin<Error = E>,
{
    /// Assemble the bus and drive the control lines to `IDLE`
    pub fn new(
        flags: ShiftRegister<P>,
        address: ShiftRegister<P>,
        data: ShiftRegister<P>,
        input: ShiftInput<P, I>,
    ) -> Result<Self, E> {
        let mut bus = ShiftRegisterBus {
            flags,
            address,
            data,
            input,
            lines: ControlLines::IDLE,
        };
        bus.set_control(ControlLines::IDLE)?;
        Ok(bus)
    }

    /// Shift `bit_count` bits of `bytes` into `chain`
    pub fn send(&mut self, chain: Chain, bytes: &[u8], bit_count: usize) -> Result<(), E> {
        match chain {
            Chain::Flags => self.flags.shift_out(bytes, bit_count),
            Chain::Address => self.address.shift_out(bytes, bit_count),
            Chain::Data => self.data.shift_out(bytes, bit_count),
        }
    }

    /// Load and shift in the 8 bits on the input chain
    pub fn read_input_bits(&mut self) -> Result<u8, E> {
        self.input.read_bits()
    }

    /// Destroy the bus, returning the chains
    pub fn release(
        self,
    ) -> (
        ShiftRegister<P>,
        ShiftRegister<P>,
        ShiftRegister<P>,
        ShiftInput<P, I>,
    ) {
        (self.flags, self.address, self.data, self.input)
    }
}

impl<P, I, E> ParallelBus for ShiftRegisterBus<P, I>
where
    P: OutputPin<Error = E>,
    I: InputPin<Error = E>,
{
    type Error = E;

    fn set_control(&mut self, lines: ControlLines) -> Result<(), E> {
        self.send(Chain::Flags, &[lines.flags_byte()], FLAGS_BITS)?;
        self.lines = lines;
        Ok(())
    }

    fn control(&self) -> ControlLines {
        self.lines
    }

    fn set_address(&mut self, address: u16) -> Result<(), E> {
        self.send(Chain::Address, &address.to_le_bytes(), ADDRESS_BITS)
    }

    fn set_data(&mut self, value: u8) -> Result<(), E> {
        self.send(Chain::Data, &[value], DATA_BITS)
    }

    fn read_data(&mut self) -> Result<u8, E> {
        self.read_input_bits()
    }
}
