/*!
This is a platform agnostic firmware core for a programmer of the [28x series parallel EEPROM chips](https://ww1.microchip.com/downloads/en/DeviceDoc/doc0006.pdf)
(28C256 and compatible), based on the [`embedded-hal`](https://github.com/rust-embedded/embedded-hal) traits.

The EEPROM's 15 address lines, 8 data lines and control lines are driven
through daisy-chained serial-in/parallel-out shift registers, and the data
lines are read back through a parallel-in/serial-out shift register, so a
handful of GPIO pins are enough. A host talks to the programmer over a serial
port using a small line oriented text protocol.

This crate allows you to:

- Drive the bus through shift registers. See: `ShiftRegisterBus`.
- Read a single byte or an address range. See: `Eeprom::read_byte()`, `Eeprom::read_range()`.
- Write a byte or a page of up to 64 bytes. See: `Eeprom::write_byte()`, `Eeprom::write_page()`.
- Enable and disable software data protection. See: `Eeprom::lock()`, `Eeprom::unlock()`.
- Serve the command protocol over a serial port. See: `Programmer::run()`.

# Supported devices

| Device | Memory bytes | Page size | Write cycle |
|-------:|-------------:|----------:|------------:|
| 28C256 |        32 KB |  64 bytes |       10 ms |

# Protocol

Every command is a single line terminated by CR. The programmer prompts with
`ready>` and answers with CRLF terminated lines.

```text
help
echo [on|off|test]
read 0xabcd 0xef01
write 0xabcd 0xef01 [page|nopage]
```

`read` answers with the inclusive byte range as raw binary after a short
announcement. `write` asks for the data in chunks (`Send n bytes, m
remaining...`) that never cross a 64-byte page boundary, or one byte at a
time with `nopage`.

# Usage

Some example usage:

```ignore
extern crate eeprom28x;
use eeprom28x::*;

fn main() -> ! {
    // 1. Ensure the shift register pins, the serial port and a delay are
    // defined (device specific). All output pins must share one type.

    // 2. Assemble the bus, this drives the control lines to idle
    let bus = ShiftRegisterBus::new(
        ShiftRegister::new(flags_ser, flags_srclk, flags_rclk),
        ShiftRegister::new(addr_ser, addr_srclk, addr_rclk),
        ShiftRegister::new(data_ser, data_srclk, data_rclk),
        ShiftInput::new(in_load, in_clk, in_data).unwrap(),
    )
    .unwrap();

    // 3. Instantiate the EEPROM access layer
    let mut eeprom = Eeprom::new(bus, delay);
    eeprom.write_page(0x0000, b"Microchip 28C256").unwrap();
    assert_eq!(eeprom.read_byte(0x0000).unwrap(), b'M');

    // 4. Serve the command protocol, sleeping while the port is idle
    let config = Config::default();
    let mut programmer = Programmer::new(serial, eeprom, || cortex_m::asm::wfi(), config);
    match programmer.run() {
        Ok(never) => match never {},
        Err(e) => panic!("programmer stopped: {:?}", e),
    }
}
```

*/
#![deny(unsafe_code)]
#![cfg_attr(not(test), no_std)]

extern crate bit_field;
extern crate embedded_hal as hal;

mod bus;
mod command;
mod config;
mod device;
mod eeprom;
mod engine;
mod session;
#[cfg(test)]
mod testing;

pub use crate::bus::{
    Chain, ControlLines, ParallelBus, ShiftInput, ShiftRegister, ShiftRegisterBus, ADDRESS_BITS,
    DATA_BITS, FLAGS_BITS,
};
pub use crate::command::{Command, CommandError, CommandKind, EchoMode};
pub use crate::config::{Config, CR, CRLF, LINE_CAPACITY, PROMPT};
pub use crate::device::{
    page_remaining, ProtectCycle, MAX_ADDRESS, PAGE_SIZE, PROTECT_DISABLE, PROTECT_ENABLE,
    WRITE_CYCLE_MS,
};
pub use crate::eeprom::{Eeprom, EepromError, ReadRange};
pub use crate::engine::{chunk_len, Programmer};
pub use crate::session::{Line, LowPower, Session, SessionState, Wake};

/// All possible errors of the programmer
#[derive(Debug, PartialEq, Eq)]
pub enum Error<B, S> {
    /// Bus (pin) error
    BusError(B),
    /// Serial port error
    SerialError(S),
    /// Too much data passed for a page write
    TooMuchData,
}
