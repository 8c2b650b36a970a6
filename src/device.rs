//! Constants of the supported 28x series device (AT28C256 and compatibles)

/// Highest valid address
pub const MAX_ADDRESS: u16 = 0x7FFF;

/// Bytes per device page
pub const PAGE_SIZE: usize = 64;

/// Write cycle time after a byte or page write, in milliseconds
pub const WRITE_CYCLE_MS: u16 = 10;

/// One command cycle of a software data protection sequence
pub type ProtectCycle = (u16, u8);

/// Software data protection: enable (lock)
pub const PROTECT_ENABLE: [ProtectCycle; 3] = [(0x5555, 0xAA), (0x2AAA, 0x55), (0x5555, 0xA0)];

/// Software data protection: disable (unlock)
pub const PROTECT_DISABLE: [ProtectCycle; 6] = [
    (0x5555, 0xAA),
    (0x2AAA, 0x55),
    (0x5555, 0x80),
    (0x5555, 0xAA),
    (0x2AAA, 0x55),
    (0x5555, 0x20),
];

/// Bytes that fit between `address` and the next page boundary
pub fn page_remaining(address: u16) -> usize {
    PAGE_SIZE - (address as usize % PAGE_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_remaining_counts_to_the_boundary() {
        assert_eq!(page_remaining(0x2000), 64);
        assert_eq!(page_remaining(0x203e), 2);
        assert_eq!(page_remaining(0x203f), 1);
        assert_eq!(page_remaining(MAX_ADDRESS), 1);
    }
}
