//! The central arbiter between the CPU and the ULA: owns the T-state
//! counter, the contention table, the screen-byte emission schedule, and
//! drives the [`Video`] rasterizer on every timed bus operation.

use crate::memory::Memory;
use crate::ports::Ports;
use crate::video::{CELLS_PER_LINE, SCREEN_BYTES, SCREEN_HEIGHT, Video};
use zx_core::{Observable, Value};
use zx_z80::bus::Bus;

/// One Z80 frame at 50 Hz: 69,888 T-states.
pub const TSTATES_PER_INTERRUPT: u32 = 69_888;
/// T-state of the first contended cycle of the first visible scanline.
const FIRST_SCREEN_TSTATE: u32 = 14_335;
/// T-states per scanline, visible or not.
const TSTATES_PER_LINE: u32 = 224;
/// Per-8-pixel-group contention delay, indexed by cycle offset within the
/// group: the first cycle pays the most, the last two pay nothing.
const CONTENTION_PATTERN: [u8; 8] = [6, 5, 4, 3, 2, 1, 0, 0];
/// Number of T-states during which a contended access pays a delay at all
/// (191 full lines plus the 128 contended T-states of the 192nd).
const CONTENDED_WINDOW: u32 = 191 * TSTATES_PER_LINE + 128;
/// Width, in T-states, of a scanline's contended (visible) portion.
const CONTENDED_PORTION_OF_LINE: u32 = 128;
/// T-states during which the ULA holds the maskable interrupt line active.
const INTERRUPT_WINDOW: u32 = 24;

/// Low 16 KiB, where the ULA shares bus access with the CPU.
fn is_contended_address(addr: u16) -> bool {
    (0x4000..0x8000).contains(&addr)
}

/// The contended-memory, raster-synchronized bus.
pub struct BusAccess {
    pub memory: Memory,
    pub ports: Ports,
    pub video: Video,
    t_state: u32,
    frame_count: u64,
    contention_table: Box<[u8]>,
    screen_byte_tstate: Box<[u32; SCREEN_BYTES]>,
    int_line: bool,
}

impl BusAccess {
    #[must_use]
    pub fn new() -> Self {
        Self {
            memory: Memory::new(),
            ports: Ports::new(),
            video: Video::new(),
            t_state: 0,
            frame_count: 0,
            contention_table: build_contention_table(),
            screen_byte_tstate: build_screen_byte_tstate(),
            int_line: false,
        }
    }

    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Subtracts the frame budget from the running counter and bumps the
    /// frame count. Called by the `Machine` once per frame, after the CPU
    /// has executed the frame's full T-state budget.
    pub fn end_frame(&mut self, budget: u32) {
        self.t_state = self.t_state.saturating_sub(budget);
        self.frame_count += 1;
    }

    fn contention_delay(&self, t_state: u32) -> u32 {
        self.contention_table.get(t_state as usize).copied().unwrap_or(0).into()
    }

    /// Pay contention (if `contended`) then the base cost, driving the
    /// rasterizer once time has moved forward.
    fn charge(&mut self, contended: bool, base: u32) {
        if contended {
            self.t_state += self.contention_delay(self.t_state);
        }
        self.t_state += base;
        self.drive_raster();
    }

    fn charge_mem(&mut self, addr: u16, base: u32) {
        self.charge(is_contended_address(addr), base);
    }

    /// Emits every screen byte whose scheduled T-state has now been
    /// reached. Usually at most one byte per call, but a long
    /// `address_on_bus` block can make several come due at once.
    fn drive_raster(&mut self) {
        while self.video.next_screen_byte_index() < SCREEN_BYTES
            && self.t_state >= self.screen_byte_tstate[self.video.next_screen_byte_index()]
        {
            self.video.emit_next_byte(&self.memory);
        }
    }

    /// IO contention per §4.4: `hi` contended selects the low-16K window,
    /// `lo` contended is `port & 1 == 0`. The four combinations decide
    /// which of the access's phases pay the contention penalty.
    fn io_timing(&mut self, port: u16) {
        let hi = (port >> 8) as u8;
        let high_contended = (0x40..=0x7F).contains(&hi);
        let low_contended = port & 1 == 0;
        match (high_contended, low_contended) {
            (true, true) => {
                for _ in 0..4 {
                    self.charge(true, 1);
                }
            }
            (true, false) => {
                self.charge(true, 1);
                self.charge(false, 3);
            }
            (false, true) => {
                self.charge(false, 1);
                self.charge(true, 3);
            }
            (false, false) => {
                self.charge(false, 1);
                self.charge(false, 3);
            }
        }
    }
}

impl Default for BusAccess {
    fn default() -> Self {
        Self::new()
    }
}

impl Observable for BusAccess {
    fn query(&self, path: &str) -> Option<Value> {
        if let Some(rest) = path.strip_prefix("video.") {
            return self.video.query(rest);
        }
        Some(match path {
            "t_state" => Value::U32(self.t_state),
            "frame_count" => Value::U64(self.frame_count),
            "border" => self.video.query("border")?,
            _ => return None,
        })
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &["t_state", "frame_count", "border", "video.<path>"]
    }
}

impl Bus for BusAccess {
    fn fetch_opcode(&mut self, addr: u16) -> u8 {
        self.charge_mem(addr, 4);
        self.memory.peekb(addr)
    }

    fn peekb(&mut self, addr: u16) -> u8 {
        self.charge_mem(addr, 3);
        self.memory.peekb(addr)
    }

    fn pokeb(&mut self, addr: u16, value: u8) {
        self.charge_mem(addr, 3);
        self.memory.pokeb(addr, value);
    }

    fn in_port(&mut self, port: u16) -> u8 {
        self.io_timing(port);
        self.ports.read(port)
    }

    fn out_port(&mut self, port: u16, value: u8) {
        self.io_timing(port);
        self.ports.write(port, value);
        self.video.set_border(self.ports.border());
    }

    fn address_on_bus(&mut self, addr: u16, cycles: u32) {
        let contended = is_contended_address(addr);
        for _ in 0..cycles {
            self.charge(contended, 1);
        }
    }

    fn is_active_int(&self) -> bool {
        self.t_state < INTERRUPT_WINDOW
    }

    fn t_state(&self) -> u32 {
        self.t_state
    }
}

/// Builds the per-T-state contention delay table described in §3/§8: for
/// every T-state in `[FIRST_SCREEN_TSTATE, FIRST_SCREEN_TSTATE +
/// CONTENDED_WINDOW)`, the delay is `CONTENTION_PATTERN[(t - start) % 8]`
/// whenever `(t - start) % TSTATES_PER_LINE` falls in the visible (first
/// 128 T-state) portion of its line, else zero.
fn build_contention_table() -> Box<[u8]> {
    let len = (TSTATES_PER_INTERRUPT + 200) as usize;
    let mut table = vec![0u8; len];
    for offset in 0..CONTENDED_WINDOW {
        if offset % TSTATES_PER_LINE < CONTENDED_PORTION_OF_LINE {
            let t = (FIRST_SCREEN_TSTATE + offset) as usize;
            table[t] = CONTENTION_PATTERN[(offset % 8) as usize];
        }
    }
    table.into_boxed_slice()
}

/// Builds the T-state at which each of the 6144 screen bytes must be
/// emitted: `FIRST_SCREEN_TSTATE + line * TSTATES_PER_LINE + cell * 8`.
fn build_screen_byte_tstate() -> Box<[u32; SCREEN_BYTES]> {
    let mut table = Box::new([0u32; SCREEN_BYTES]);
    for line in 0..SCREEN_HEIGHT {
        for cell in 0..CELLS_PER_LINE {
            let i = line * CELLS_PER_LINE + cell;
            table[i] = FIRST_SCREEN_TSTATE + (line as u32) * TSTATES_PER_LINE + (cell as u32) * 8;
        }
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contention_table_matches_documented_formula_across_the_window() {
        let table = build_contention_table();
        for t in FIRST_SCREEN_TSTATE..57_247 {
            let offset = t - FIRST_SCREEN_TSTATE;
            let expected = if offset % TSTATES_PER_LINE < 128 {
                CONTENTION_PATTERN[(offset % 8) as usize]
            } else {
                0
            };
            assert_eq!(table[t as usize], expected, "t={t}");
        }
    }

    #[test]
    fn contention_window_ends_exactly_at_57247() {
        assert_eq!(FIRST_SCREEN_TSTATE + CONTENDED_WINDOW, 57_247);
    }

    #[test]
    fn fetch_opcode_at_contended_address_pays_full_delay_plus_base() {
        let mut bus = BusAccess::new();
        bus.t_state = FIRST_SCREEN_TSTATE;
        bus.fetch_opcode(0x4000);
        assert_eq!(bus.t_state(), FIRST_SCREEN_TSTATE + 6 + 4);
    }

    #[test]
    fn fetch_opcode_outside_contended_range_pays_only_base() {
        let mut bus = BusAccess::new();
        bus.t_state = FIRST_SCREEN_TSTATE;
        bus.fetch_opcode(0x8000);
        assert_eq!(bus.t_state(), FIRST_SCREEN_TSTATE + 4);
    }

    #[test]
    fn three_contended_accesses_from_tstate_14335_total_25_extra_tstates() {
        // Scenario 3: an opcode fetch (base 4) followed by two contended
        // operand reads (base 3 each), starting at tstate 14335, together
        // add 25 T-states over their uncontended 10-T-state base.
        let mut bus = BusAccess::new();
        bus.t_state = FIRST_SCREEN_TSTATE;
        bus.fetch_opcode(0x4000);
        bus.peekb(0x4001);
        bus.peekb(0x4002);
        assert_eq!(bus.t_state() - FIRST_SCREEN_TSTATE, 10 + 25);
    }

    #[test]
    fn is_active_int_true_only_in_first_24_tstates_of_frame() {
        let mut bus = BusAccess::new();
        assert!(bus.is_active_int());
        bus.t_state = 23;
        assert!(bus.is_active_int());
        bus.t_state = 24;
        assert!(!bus.is_active_int());
    }

    #[test]
    fn end_frame_subtracts_budget_and_bumps_frame_count() {
        let mut bus = BusAccess::new();
        bus.t_state = TSTATES_PER_INTERRUPT + 4;
        bus.end_frame(TSTATES_PER_INTERRUPT);
        assert_eq!(bus.t_state(), 4);
        assert_eq!(bus.frame_count(), 1);
    }

    #[test]
    fn io_write_to_0xfe_updates_video_border() {
        let mut bus = BusAccess::new();
        bus.out_port(0xFEFE, 0b0000_0011);
        assert_eq!(bus.ports.border(), 3);
    }

    #[test]
    fn address_on_bus_charges_contention_per_cycle() {
        let mut bus = BusAccess::new();
        bus.t_state = FIRST_SCREEN_TSTATE;
        bus.address_on_bus(0x4000, 2);
        // First cycle pays pattern[0]=6 then +1; second cycle re-reads the
        // table at the new tstate (offset 7 -> pattern[7]=0) then +1.
        assert_eq!(bus.t_state(), FIRST_SCREEN_TSTATE + 6 + 1 + 0 + 1);
    }

    #[test]
    fn observable_reports_tstate_and_routes_video_prefix() {
        let mut bus = BusAccess::new();
        bus.t_state = 1234;
        bus.video.set_border(6);
        assert_eq!(bus.query("t_state"), Some(Value::U32(1234)));
        assert_eq!(bus.query("video.border"), Some(Value::U8(6)));
        assert_eq!(bus.query("nonexistent"), None);
    }
}
