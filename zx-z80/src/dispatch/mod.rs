//! Opcode decode and dispatch.
//!
//! `main_table` holds the single shared implementation of the unprefixed
//! opcode table; `indexed` drives it a second time with IX/IY substituted
//! for HL so the two register sets never drift out of sync. `cb` and `ed`
//! are the two genuinely separate prefix tables.

mod alu_dispatch;
mod cb;
mod ed;
mod indexed;
mod main_table;

use crate::bus::Bus;
use crate::cpu::Z80;

pub(crate) fn fetch_and_bump<B: Bus>(cpu: &mut Z80, bus: &mut B) -> u8 {
    let op = bus.fetch_opcode(cpu.regs.pc);
    cpu.regs.pc = cpu.regs.pc.wrapping_add(1);
    cpu.regs.bump_r(1);
    op
}

pub(crate) fn condition(f: u8, cc: u8) -> bool {
    use crate::flags::{CF, PF, SF, ZF};
    match cc {
        0 => f & ZF == 0,
        1 => f & ZF != 0,
        2 => f & CF == 0,
        3 => f & CF != 0,
        4 => f & PF == 0,
        5 => f & PF != 0,
        6 => f & SF == 0,
        7 => f & SF != 0,
        _ => unreachable!("3-bit condition code"),
    }
}

pub fn execute_instruction<B: Bus>(cpu: &mut Z80, bus: &mut B) {
    let op = fetch_and_bump(cpu, bus);
    match op {
        0xCB => cb::execute(cpu, bus),
        0xDD => indexed::execute(cpu, bus, crate::cpu::IndexMode::Ix),
        0xED => ed::execute(cpu, bus),
        0xFD => indexed::execute(cpu, bus, crate::cpu::IndexMode::Iy),
        _ => main_table::execute(cpu, bus, op, crate::cpu::IndexMode::Hl, None),
    }
}
