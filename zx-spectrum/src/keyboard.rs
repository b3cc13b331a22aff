//! The 8-row, 5-column keyboard matrix read through port `0xFE`.

/// A single matrix position: one of the eight half-rows selected by the
/// high byte of the port address, and the bit within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatrixPosition {
    row: usize,
    bit: u8,
}

/// Every physical key the Spectrum's matrix recognises, named the way the
/// keyboard itself is silkscreened rather than by the character it types
/// (`char_to_keys` in a higher layer decides which shifted combination
/// produces a given character).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostKey {
    CapsShift,
    Z,
    X,
    C,
    V,
    A,
    S,
    D,
    F,
    G,
    Q,
    W,
    E,
    R,
    T,
    Key1,
    Key2,
    Key3,
    Key4,
    Key5,
    Key0,
    Key9,
    Key8,
    Key7,
    Key6,
    P,
    O,
    I,
    U,
    Y,
    Enter,
    L,
    K,
    J,
    H,
    Space,
    SymbolShift,
    M,
    N,
    B,
}

impl HostKey {
    /// The `(row, bit)` this key occupies in the matrix, following the
    /// standard half-row layout (row 0 is `CAPS SHIFT`..`V`, row 7 is
    /// `SPACE`..`B`).
    #[must_use]
    pub const fn matrix(self) -> MatrixPosition {
        let (row, bit) = match self {
            Self::CapsShift => (0, 0),
            Self::Z => (0, 1),
            Self::X => (0, 2),
            Self::C => (0, 3),
            Self::V => (0, 4),
            Self::A => (1, 0),
            Self::S => (1, 1),
            Self::D => (1, 2),
            Self::F => (1, 3),
            Self::G => (1, 4),
            Self::Q => (2, 0),
            Self::W => (2, 1),
            Self::E => (2, 2),
            Self::R => (2, 3),
            Self::T => (2, 4),
            Self::Key1 => (3, 0),
            Self::Key2 => (3, 1),
            Self::Key3 => (3, 2),
            Self::Key4 => (3, 3),
            Self::Key5 => (3, 4),
            Self::Key0 => (4, 0),
            Self::Key9 => (4, 1),
            Self::Key8 => (4, 2),
            Self::Key7 => (4, 3),
            Self::Key6 => (4, 4),
            Self::P => (5, 0),
            Self::O => (5, 1),
            Self::I => (5, 2),
            Self::U => (5, 3),
            Self::Y => (5, 4),
            Self::Enter => (6, 0),
            Self::L => (6, 1),
            Self::K => (6, 2),
            Self::J => (6, 3),
            Self::H => (6, 4),
            Self::Space => (7, 0),
            Self::SymbolShift => (7, 1),
            Self::M => (7, 2),
            Self::N => (7, 3),
            Self::B => (7, 4),
        };
        MatrixPosition { row, bit }
    }
}

/// The live state of all 40 keys, as eight 5-bit half-rows.
///
/// Bit layout per row matches the Spectrum's own convention: `1` means
/// "not pressed", `0` means "pressed" — [`KeyboardState::read`] returns the
/// rows as-is rather than inverting a separately-sensed "pressed" bit, so a
/// freshly reset keyboard already reads as "nothing held".
#[derive(Debug, Clone)]
pub struct KeyboardState {
    rows: [u8; 8],
}

impl KeyboardState {
    #[must_use]
    pub fn new() -> Self {
        Self { rows: [0x1F; 8] }
    }

    pub fn set_key(&mut self, key: HostKey, pressed: bool) {
        let MatrixPosition { row, bit } = key.matrix();
        if pressed {
            self.rows[row] &= !(1 << bit);
        } else {
            self.rows[row] |= 1 << bit;
        }
    }

    pub fn release_all(&mut self) {
        self.rows = [0x1F; 8];
    }

    /// Read the keyboard half-rows selected by the high byte of the port
    /// address (`0` in a bit position selects that half-row). Bits 5-7 of
    /// the returned byte are forced high, as on real hardware where they
    /// come from unrelated floating bus lines.
    #[must_use]
    pub fn read(&self, addr_high: u8) -> u8 {
        let mut result = 0x1F;
        for row in 0..8 {
            if addr_high & (1 << row) == 0 {
                result &= self.rows[row];
            }
        }
        result | 0xE0
    }
}

impl Default for KeyboardState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_keyboard_reads_as_nothing_pressed() {
        let kb = KeyboardState::new();
        assert_eq!(kb.read(0xFE), 0xFF);
    }

    #[test]
    fn pressing_a_key_clears_its_bit() {
        let mut kb = KeyboardState::new();
        kb.set_key(HostKey::A, true);
        // A is row 1, bit 0; selecting row 1 via addr_high bit1=0.
        assert_eq!(kb.read(0b1111_1101) & 0x01, 0);
    }

    #[test]
    fn releasing_restores_the_bit() {
        let mut kb = KeyboardState::new();
        kb.set_key(HostKey::Space, true);
        kb.set_key(HostKey::Space, false);
        assert_eq!(kb.read(0b0111_1111), 0x1F | 0xE0);
    }

    #[test]
    fn selecting_no_rows_reads_all_high() {
        let kb = KeyboardState::new();
        assert_eq!(kb.read(0xFF), 0xFF);
    }

    #[test]
    fn release_all_clears_every_held_key() {
        let mut kb = KeyboardState::new();
        kb.set_key(HostKey::Q, true);
        kb.set_key(HostKey::Enter, true);
        kb.release_all();
        assert_eq!(kb.read(0x00), 0xFF);
    }

    #[test]
    fn top_three_bits_are_always_forced_high() {
        let mut kb = KeyboardState::new();
        kb.set_key(HostKey::B, true);
        let value = kb.read(0b1110_1111);
        assert_eq!(value & 0xE0, 0xE0);
    }
}
