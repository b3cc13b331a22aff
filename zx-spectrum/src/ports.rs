//! IO port decoding: the one port the 48K actually implements, `0xFE`,
//! plus the "everything else reads as floating/open bus" fallback.

use crate::keyboard::KeyboardState;

/// Bits of a write to port `0xFE`.
const BORDER_MASK: u8 = 0x07;

/// Decodes port addresses into keyboard reads and border/speaker writes.
///
/// `Ports` holds no T-state knowledge of its own — [`crate::bus::BusAccess`]
/// is the only component that times IO, per §4.4's contention rules; this
/// type just answers "what value" and "what border colour", not "how long".
#[derive(Debug, Clone)]
pub struct Ports {
    pub keyboard: KeyboardState,
    border: u8,
}

impl Ports {
    #[must_use]
    pub fn new() -> Self {
        Self { keyboard: KeyboardState::new(), border: 0 }
    }

    #[must_use]
    pub fn border(&self) -> u8 {
        self.border
    }

    /// Read a port. Only even-low-byte ports (`port & 1 == 0`) are ULA
    /// ports on the 48K; the core only implements `0xFE`'s keyboard/EAR
    /// half. Every other port floats high, matching an unconnected bus.
    #[must_use]
    pub fn read(&self, port: u16) -> u8 {
        if port & 0x01 == 0 {
            let row_bits = self.keyboard.read((port >> 8) as u8);
            // Bits 0-4 keyboard, bit 6 EAR input (no tape, reads high),
            // bits 5 and 7 are always set on real hardware.
            row_bits & 0x1F | 0b1010_0000
        } else {
            0xFF
        }
    }

    /// Write a port. Only `port & 1 == 0` is decoded as the ULA; border
    /// colour is recorded, MIC/speaker (bits 3-4) are accepted but have no
    /// observable effect since sound synthesis is out of scope.
    pub fn write(&mut self, port: u16, value: u8) {
        if port & 0x01 == 0 {
            self.border = value & BORDER_MASK;
        }
    }
}

impl Default for Ports {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyboard::HostKey;

    #[test]
    fn reading_0xfe_with_nothing_pressed_returns_ear_and_unused_bits_high() {
        let ports = Ports::new();
        assert_eq!(ports.read(0xFEFE), 0xBF);
    }

    #[test]
    fn writing_0xfe_sets_border_from_low_three_bits() {
        let mut ports = Ports::new();
        ports.write(0xFEFE, 0b0000_0101);
        assert_eq!(ports.border(), 5);
    }

    #[test]
    fn odd_port_reads_as_floating_high() {
        let ports = Ports::new();
        assert_eq!(ports.read(0x1F, ), 0xFF);
    }

    #[test]
    fn pressed_key_clears_its_bit_through_port_read() {
        let mut ports = Ports::new();
        ports.keyboard.set_key(HostKey::Space, true);
        // SPACE is row 7; selecting row 7 requires bit7=0 in the high byte.
        let value = ports.read(0x7FFE);
        assert_eq!(value & 0x01, 0);
    }
}
