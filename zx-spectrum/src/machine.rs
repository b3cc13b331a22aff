//! Wires `BusAccess`, `Z80`, and the frame loop together.

use crate::bus::{BusAccess, TSTATES_PER_INTERRUPT};
use crate::keyboard::HostKey;
use crate::snapshot::{self, SnapshotError};
use zx_core::{Observable, Ticks, Value};
use zx_z80::cpu::Z80;

/// A complete ZX Spectrum 48K: CPU plus the bus it runs against.
pub struct Machine {
    pub cpu: Z80,
    pub bus: BusAccess,
}

impl Machine {
    #[must_use]
    pub fn new() -> Self {
        Self { cpu: Z80::new(), bus: BusAccess::new() }
    }

    /// Loads a 16 KiB ROM image into the low 16 KiB of address space.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::RomWrongSize`] if `rom` is not exactly
    /// 16,384 bytes.
    pub fn load_rom(&mut self, rom: &[u8]) -> Result<(), SnapshotError> {
        if rom.len() != crate::memory::ROM_SIZE {
            return Err(SnapshotError::RomWrongSize { actual: rom.len() });
        }
        self.bus.memory.rom_load(rom);
        Ok(())
    }

    /// Loads an SNA snapshot, restoring CPU registers and RAM.
    ///
    /// # Errors
    ///
    /// See [`snapshot::load_sna`].
    pub fn load_sna(&mut self, data: &[u8]) -> Result<(), SnapshotError> {
        snapshot::load_sna(&mut self.cpu, &mut self.bus, data)
    }

    pub fn key_down(&mut self, key: HostKey) {
        self.bus.ports.keyboard.set_key(key, true);
    }

    pub fn key_up(&mut self, key: HostKey) {
        self.bus.ports.keyboard.set_key(key, false);
    }

    /// Runs one 50 Hz frame: §4.7's frame loop, verbatim.
    pub fn run_frame(&mut self) {
        self.bus.video.start_frame();
        self.cpu.execute(&mut self.bus, Ticks(TSTATES_PER_INTERRUPT));
        self.bus.end_frame(TSTATES_PER_INTERRUPT);
        let full_frame = self.bus.video.end_frame();
        let _ = full_frame; // presented by the host display collaborator
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

/// Routes dotted query paths to the component they name, mirroring the
/// teacher's top-level `Spectrum::query` dispatcher: `"cpu."` reaches the
/// Z80's registers, `"video."` the rasterizer, everything else `bus.`'s own
/// T-state/frame counters.
impl Observable for Machine {
    fn query(&self, path: &str) -> Option<Value> {
        if let Some(rest) = path.strip_prefix("cpu.") {
            self.cpu.query(rest)
        } else if let Some(rest) = path.strip_prefix("video.") {
            self.bus.video.query(rest)
        } else if let Some(rest) = path.strip_prefix("bus.") {
            self.bus.query(rest)
        } else {
            None
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &["cpu.<path>", "bus.<path>", "video.<path>"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zx_z80::bus::Bus;

    fn rom_stub() -> Vec<u8> {
        vec![0u8; crate::memory::ROM_SIZE]
    }

    #[test]
    fn load_rom_rejects_wrong_size() {
        let mut machine = Machine::new();
        let err = machine.load_rom(&[0u8; 100]).expect_err("wrong-size ROM must be rejected");
        assert!(matches!(err, SnapshotError::RomWrongSize { actual: 100 }));
    }

    #[test]
    fn run_frame_advances_tstate_counter_back_to_the_post_frame_window() {
        let mut machine = Machine::new();
        machine.load_rom(&rom_stub()).expect("stub ROM is the right size");
        machine.run_frame();
        // After end_frame the counter is whatever it overshot the frame
        // budget by: always small relative to a full frame.
        assert!(machine.bus.t_state() < 32);
    }

    #[test]
    fn run_frame_bumps_the_frame_counter() {
        let mut machine = Machine::new();
        machine.load_rom(&rom_stub()).expect("stub ROM is the right size");
        machine.run_frame();
        assert_eq!(machine.bus.frame_count(), 1);
    }

    #[test]
    fn observable_routes_cpu_bus_and_video_prefixes() {
        let mut machine = Machine::new();
        machine.cpu.regs.pc = 0x1234;
        machine.bus.video.set_border(2);
        assert_eq!(machine.query("cpu.pc"), Some(Value::U16(0x1234)));
        assert_eq!(machine.query("bus.t_state"), Some(Value::U32(0)));
        assert_eq!(machine.query("video.border"), Some(Value::U8(2)));
        assert_eq!(machine.query("nonexistent.path"), None);
    }
}
