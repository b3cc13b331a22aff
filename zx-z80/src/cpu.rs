//! The `Z80` struct: register file plus the handful of latches that don't
//! belong to any single instruction, and the top-level fetch/execute/
//! interrupt loop.

use crate::bus::Bus;
use crate::dispatch;
use crate::registers::Registers;
use zx_core::{Observable, Ticks, Value};

/// Index register used by the currently-decoding instruction. Plain `Hl`
/// for unprefixed and `ED`-prefixed opcodes; `Ix`/`Iy` for the duration of
/// a `DD`/`FD`-prefixed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexMode {
    Hl,
    Ix,
    Iy,
}

/// A cycle-accurate Z80 interpreter.
///
/// `Z80` owns nothing but CPU state: no memory, no ports, no notion of
/// frames. Every access to the outside world goes through the [`Bus`]
/// passed into [`Z80::execute`]/[`Z80::step`].
#[derive(Debug, Clone)]
pub struct Z80 {
    pub regs: Registers,
    /// Set by `EI`; suppresses interrupt acceptance for exactly the next
    /// instruction, per the real chip's documented one-instruction delay.
    ei_delay: bool,
}

impl Default for Z80 {
    fn default() -> Self {
        Self::new()
    }
}

impl Z80 {
    #[must_use]
    pub fn new() -> Self {
        let mut z80 = Self { regs: Registers::default(), ei_delay: false };
        z80.reset();
        z80
    }

    /// Power-on/RESET-pin state: `PC=0`, `SP=0xFFFF`, `AF=0xFFFF`, `IFF1/2`
    /// cleared, `IM 0`, halt latch cleared. Matches the real chip; the
    /// Spectrum ROM initialises everything else it cares about itself.
    pub fn reset(&mut self) {
        self.regs = Registers { sp: 0xFFFF, a: 0xFF, f: 0xFF, ..Registers::default() };
        self.ei_delay = false;
    }

    /// Run instructions until the bus's T-state counter has advanced by at
    /// least `budget`. May overshoot by the length of the last instruction
    /// executed — callers that need frame-exact timing should pass a
    /// budget measured from the bus's own counter, not accumulate it
    /// separately.
    pub fn execute<B: Bus>(&mut self, bus: &mut B, budget: Ticks) {
        let target = bus.t_state().saturating_add(budget.get());
        while bus.t_state() < target {
            self.step(bus);
        }
    }

    /// Execute exactly one instruction (or, while halted, one `NOP`-length
    /// tick), then sample for interrupts.
    pub fn step<B: Bus>(&mut self, bus: &mut B) {
        let accept_interrupt = !self.ei_delay;
        self.ei_delay = false;

        if self.regs.halted {
            // The real chip keeps re-fetching the opcode at PC (a NOP,
            // since HALT left it pointing just past itself) without
            // advancing PC, so refresh still increments every cycle.
            bus.fetch_opcode(self.regs.pc);
            self.regs.bump_r(1);
        } else {
            let f_before = self.regs.f;
            dispatch::execute_instruction(self, bus);
            // Q latches the post-instruction F only when the instruction
            // actually wrote it; an instruction that leaves F untouched
            // clears Q to 0. (An instruction that rewrites F to the same
            // value it already held is indistinguishable from "untouched"
            // under this test, a documented simplification of the real
            // chip's per-opcode Q latch.)
            self.regs.q = if self.regs.f == f_before { 0 } else { self.regs.f };
        }

        if accept_interrupt && self.regs.iff1 && bus.is_active_int() {
            self.accept_maskable_interrupt(bus);
        }
    }

    pub(crate) fn request_ei_delay(&mut self) {
        self.ei_delay = true;
    }

    /// Read register code `0..=7` (`B,C,D,E,H,L,-,A`). `code == 6`, `(HL)`,
    /// is never valid here — callers resolve it through the bus instead.
    pub(crate) fn reg8(&self, code: u8, mode: IndexMode) -> u8 {
        match code {
            0 => self.regs.b,
            1 => self.regs.c,
            2 => self.regs.d,
            3 => self.regs.e,
            4 => match mode {
                IndexMode::Hl => self.regs.h,
                IndexMode::Ix => self.regs.ixh(),
                IndexMode::Iy => self.regs.iyh(),
            },
            5 => match mode {
                IndexMode::Hl => self.regs.l,
                IndexMode::Ix => self.regs.ixl(),
                IndexMode::Iy => self.regs.iyl(),
            },
            7 => self.regs.a,
            _ => unreachable!("register code 6 is (HL)/(IX+d)/(IY+d), not a plain register"),
        }
    }

    pub(crate) fn set_reg8(&mut self, code: u8, mode: IndexMode, value: u8) {
        match code {
            0 => self.regs.b = value,
            1 => self.regs.c = value,
            2 => self.regs.d = value,
            3 => self.regs.e = value,
            4 => match mode {
                IndexMode::Hl => self.regs.h = value,
                IndexMode::Ix => self.regs.set_ixh(value),
                IndexMode::Iy => self.regs.set_iyh(value),
            },
            5 => match mode {
                IndexMode::Hl => self.regs.l = value,
                IndexMode::Ix => self.regs.set_ixl(value),
                IndexMode::Iy => self.regs.set_iyl(value),
            },
            7 => self.regs.a = value,
            _ => unreachable!("register code 6 is (HL)/(IX+d)/(IY+d), not a plain register"),
        }
    }

    pub(crate) fn index_value(&self, mode: IndexMode) -> u16 {
        match mode {
            IndexMode::Hl => self.regs.hl(),
            IndexMode::Ix => self.regs.ix,
            IndexMode::Iy => self.regs.iy,
        }
    }

    pub(crate) fn set_index_value(&mut self, mode: IndexMode, value: u16) {
        match mode {
            IndexMode::Hl => self.regs.set_hl(value),
            IndexMode::Ix => self.regs.ix = value,
            IndexMode::Iy => self.regs.iy = value,
        }
    }

    fn accept_maskable_interrupt<B: Bus>(&mut self, bus: &mut B) {
        self.regs.halted = false;
        self.regs.iff1 = false;
        self.regs.iff2 = false;
        // Two wait states plus the 5-T-state acknowledge cycle.
        bus.address_on_bus(self.regs.pc, 7);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        bus.pokeb(self.regs.sp, (self.regs.pc >> 8) as u8);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        bus.pokeb(self.regs.sp, self.regs.pc as u8);
        self.regs.pc = match self.regs.im {
            2 => {
                let vector = u16::from(self.regs.i) << 8 | 0x00FF;
                bus.peekw(vector)
            }
            _ => 0x0038,
        };
        self.regs.wz = self.regs.pc;
        self.regs.bump_r(1);
    }

    /// Non-maskable interrupt: unconditional, clears only `IFF1`, always
    /// vectors to `0x0066`. The Spectrum 48K motherboard never asserts
    /// `/NMI` itself; this exists for add-ons (e.g. a Multiface) that do.
    pub fn nmi<B: Bus>(&mut self, bus: &mut B) {
        self.regs.halted = false;
        self.regs.iff2 = self.regs.iff1;
        self.regs.iff1 = false;
        bus.address_on_bus(self.regs.pc, 5);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        bus.pokeb(self.regs.sp, (self.regs.pc >> 8) as u8);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        bus.pokeb(self.regs.sp, self.regs.pc as u8);
        self.regs.pc = 0x0066;
        self.regs.wz = self.regs.pc;
        self.regs.bump_r(1);
    }
}

impl Observable for Z80 {
    fn query(&self, path: &str) -> Option<Value> {
        Some(match path {
            "a" => self.regs.a.into(),
            "f" => self.regs.f.into(),
            "bc" => self.regs.bc().into(),
            "de" => self.regs.de().into(),
            "hl" => self.regs.hl().into(),
            "ix" => self.regs.ix.into(),
            "iy" => self.regs.iy.into(),
            "sp" => self.regs.sp.into(),
            "pc" => self.regs.pc.into(),
            "i" => self.regs.i.into(),
            "r" => self.regs.r.into(),
            "wz" => self.regs.wz.into(),
            "im" => self.regs.im.into(),
            "iff1" => self.regs.iff1.into(),
            "iff2" => self.regs.iff2.into(),
            "halted" => self.regs.halted.into(),
            "q" => self.regs.q.into(),
            _ => return None,
        })
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "a", "f", "bc", "de", "hl", "ix", "iy", "sp", "pc", "i", "r", "wz", "im", "iff1",
            "iff2", "halted", "q",
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestBus;

    #[test]
    fn reset_gives_documented_power_on_state() {
        let cpu = Z80::new();
        assert_eq!(cpu.regs.pc, 0);
        assert_eq!(cpu.regs.sp, 0xFFFF);
        assert!(!cpu.regs.iff1);
        assert_eq!(cpu.regs.im, 0);
    }

    #[test]
    fn nop_advances_pc_by_one_and_consumes_four_tstates() {
        let mut cpu = Z80::new();
        let mut bus = TestBus::new();
        bus.mem[0] = 0x00; // NOP
        cpu.step(&mut bus);
        assert_eq!(cpu.regs.pc, 1);
        assert_eq!(bus.t_state(), 4);
    }

    #[test]
    fn halt_keeps_refetching_without_advancing_pc() {
        let mut cpu = Z80::new();
        let mut bus = TestBus::new();
        bus.mem[0] = 0x76; // HALT
        cpu.step(&mut bus);
        assert_eq!(cpu.regs.pc, 1);
        assert!(cpu.regs.halted);
        cpu.step(&mut bus);
        assert_eq!(cpu.regs.pc, 1);
        assert_eq!(bus.t_state(), 8);
    }

    #[test]
    fn maskable_interrupt_is_ignored_with_iff1_clear() {
        let mut cpu = Z80::new();
        let mut bus = TestBus::new();
        bus.mem[0] = 0x00;
        bus.int_line = true;
        cpu.step(&mut bus);
        assert_eq!(cpu.regs.pc, 1);
    }

    #[test]
    fn maskable_interrupt_im1_vectors_to_0038_and_pushes_pc() {
        let mut cpu = Z80::new();
        let mut bus = TestBus::new();
        bus.mem[0] = 0x00;
        cpu.regs.iff1 = true;
        cpu.regs.im = 1;
        cpu.regs.sp = 0x8000;
        bus.int_line = true;
        cpu.step(&mut bus);
        assert_eq!(cpu.regs.pc, 0x0038);
        assert_eq!(cpu.regs.sp, 0x7FFE);
        assert_eq!(bus.mem[0x7FFE] as u16 | (bus.mem[0x7FFF] as u16) << 8, 1);
    }

    #[test]
    fn ei_delays_interrupt_acceptance_by_one_instruction() {
        let mut cpu = Z80::new();
        let mut bus = TestBus::new();
        bus.mem[0] = 0xFB; // EI
        bus.mem[1] = 0x00; // NOP
        bus.int_line = true;
        cpu.regs.im = 1;
        cpu.step(&mut bus); // EI: iff1 set, but acceptance suppressed this step
        assert_eq!(cpu.regs.pc, 1);
        cpu.step(&mut bus); // NOP executes, *then* the interrupt is taken
        assert_eq!(cpu.regs.pc, 0x0038);
    }
}
