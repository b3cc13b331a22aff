//! The `ED`-prefixed extended instruction group: 16-bit `ADC`/`SBC`,
//! far `LD`, `IM`/`I`/`R` access, `RRD`/`RLD`, I/O, and the block
//! transfer/search/I/O instructions.
//!
//! Repeated block forms (`LDIR` etc.) perform exactly one iteration per
//! call and, if the counter is still nonzero, back `PC` up over the `ED`
//! prefix so the very next [`crate::cpu::Z80::step`] re-fetches and
//! repeats it — matching how the real chip actually re-issues these as
//! one M1 cycle per element rather than looping internally.

use crate::alu;
use crate::bus::Bus;
use crate::cpu::{IndexMode, Z80};
use crate::flags::{CF, HF, NF, PF, SF, XF, YF, ZF, parity, sz53};

use super::fetch_and_bump;

pub(crate) fn execute<B: Bus>(cpu: &mut Z80, bus: &mut B) {
    let op = fetch_and_bump(cpu, bus);
    let x = op >> 6;
    let y = (op >> 3) & 7;
    let z = op & 7;
    let p = y >> 1;
    let q = y & 1;

    match (x, z) {
        (1, 0) => {
            let port = cpu.regs.bc();
            let value = bus.in_port(port);
            cpu.regs.wz = port.wrapping_add(1);
            if y != 6 {
                cpu.set_reg8(y, IndexMode::Hl, value);
            }
            cpu.regs.f = (cpu.regs.f & CF) | sz53(value) | (if parity(value) { PF } else { 0 });
        }
        (1, 1) => {
            let value = if y == 6 { 0 } else { cpu.reg8(y, IndexMode::Hl) };
            let port = cpu.regs.bc();
            bus.out_port(port, value);
            cpu.regs.wz = port.wrapping_add(1);
        }
        (1, 2) => {
            let hl = cpu.regs.hl();
            let rp = read_rp16(cpu, p);
            cpu.regs.wz = hl.wrapping_add(1);
            let result = if q == 0 { alu::sbc16(hl, rp, cpu.regs.f & CF != 0) } else { alu::adc16(hl, rp, cpu.regs.f & CF != 0) };
            cpu.regs.set_hl(result.value);
            cpu.regs.f = result.flags;
            bus.address_on_bus(cpu.regs.pc, 7);
        }
        (1, 3) => {
            let lo = bus.peekb(cpu.regs.pc);
            let hi = bus.peekb(cpu.regs.pc.wrapping_add(1));
            cpu.regs.pc = cpu.regs.pc.wrapping_add(2);
            let addr = u16::from_le_bytes([lo, hi]);
            cpu.regs.wz = addr.wrapping_add(1);
            if q == 0 {
                let value = read_rp16(cpu, p);
                bus.pokew(addr, value);
            } else {
                let value = bus.peekw(addr);
                write_rp16(cpu, p, value);
            }
        }
        (1, 4) => {
            let a = cpu.regs.a;
            let r = alu::sub8(0, a, false);
            cpu.regs.a = r.value;
            cpu.regs.f = r.flags;
        }
        (1, 5) => {
            cpu.regs.pc = pop16(cpu, bus);
            cpu.regs.wz = cpu.regs.pc;
            // RETI (y==1) leaves IFF1/IFF2 alone; only RETN restores IFF1.
            if y != 1 {
                cpu.regs.iff1 = cpu.regs.iff2;
            }
        }
        (1, 6) => {
            cpu.regs.im = match y {
                2 | 6 => 1,
                3 | 7 => 2,
                _ => 0,
            };
        }
        (1, 7) => match y {
            0 => {
                cpu.regs.i = cpu.regs.a;
                bus.address_on_bus(cpu.regs.pc, 1);
            }
            1 => {
                cpu.regs.r = cpu.regs.a;
                bus.address_on_bus(cpu.regs.pc, 1);
            }
            2 => {
                cpu.regs.a = cpu.regs.i;
                cpu.regs.f = (cpu.regs.f & CF) | sz53(cpu.regs.a) | (if cpu.regs.iff2 { PF } else { 0 });
                bus.address_on_bus(cpu.regs.pc, 1);
            }
            3 => {
                cpu.regs.a = cpu.regs.r;
                cpu.regs.f = (cpu.regs.f & CF) | sz53(cpu.regs.a) | (if cpu.regs.iff2 { PF } else { 0 });
                bus.address_on_bus(cpu.regs.pc, 1);
            }
            4 => rrd(cpu, bus),
            5 => rld(cpu, bus),
            _ => {}
        },
        (2, 0..=3) if y >= 4 => execute_block(cpu, bus, y, z),
        _ => {
            // Unknown ED opcode: the chip treats it as a no-op, already
            // fully accounted for by the two M1 fetches above.
        }
    }
}

fn read_rp16(cpu: &Z80, code: u8) -> u16 {
    match code {
        0 => cpu.regs.bc(),
        1 => cpu.regs.de(),
        2 => cpu.regs.hl(),
        3 => cpu.regs.sp,
        _ => unreachable!(),
    }
}

fn write_rp16(cpu: &mut Z80, code: u8, value: u16) {
    match code {
        0 => cpu.regs.set_bc(value),
        1 => cpu.regs.set_de(value),
        2 => cpu.regs.set_hl(value),
        3 => cpu.regs.sp = value,
        _ => unreachable!(),
    }
}

fn pop16<B: Bus>(cpu: &mut Z80, bus: &mut B) -> u16 {
    let lo = bus.peekb(cpu.regs.sp);
    cpu.regs.sp = cpu.regs.sp.wrapping_add(1);
    let hi = bus.peekb(cpu.regs.sp);
    cpu.regs.sp = cpu.regs.sp.wrapping_add(1);
    u16::from_le_bytes([lo, hi])
}

fn rrd<B: Bus>(cpu: &mut Z80, bus: &mut B) {
    let hl = cpu.regs.hl();
    let mem = bus.peekb(hl);
    let new_mem = (cpu.regs.a << 4) | (mem >> 4);
    let new_a = (cpu.regs.a & 0xF0) | (mem & 0x0F);
    bus.address_on_bus(hl, 4);
    bus.pokeb(hl, new_mem);
    cpu.regs.a = new_a;
    cpu.regs.f = (cpu.regs.f & CF) | sz53(new_a) | (if parity(new_a) { PF } else { 0 });
    cpu.regs.wz = hl.wrapping_add(1);
}

fn rld<B: Bus>(cpu: &mut Z80, bus: &mut B) {
    let hl = cpu.regs.hl();
    let mem = bus.peekb(hl);
    let new_mem = (mem << 4) | (cpu.regs.a & 0x0F);
    let new_a = (cpu.regs.a & 0xF0) | (mem >> 4);
    bus.address_on_bus(hl, 4);
    bus.pokeb(hl, new_mem);
    cpu.regs.a = new_a;
    cpu.regs.f = (cpu.regs.f & CF) | sz53(new_a) | (if parity(new_a) { PF } else { 0 });
    cpu.regs.wz = hl.wrapping_add(1);
}

fn execute_block<B: Bus>(cpu: &mut Z80, bus: &mut B, y: u8, z: u8) {
    match z {
        0 => block_transfer(cpu, bus, y),
        1 => block_compare(cpu, bus, y),
        2 => block_in(cpu, bus, y),
        3 => block_out(cpu, bus, y),
        _ => unreachable!(),
    }
}

fn transfer_flags(a: u8, transferred: u8, bc_after: u16, old_f: u8) -> u8 {
    let n = a.wrapping_add(transferred);
    let mut f = old_f & (SF | ZF | CF);
    if bc_after != 0 {
        f |= PF;
    }
    if n & 0x02 != 0 {
        f |= YF;
    }
    if n & 0x08 != 0 {
        f |= XF;
    }
    f
}

fn block_transfer<B: Bus>(cpu: &mut Z80, bus: &mut B, y: u8) {
    let increment = y & 1 == 0; // y=4 LDI, y=5 LDD, y=6 LDIR, y=7 LDDR
    let repeat = y >= 6;
    let hl = cpu.regs.hl();
    let de = cpu.regs.de();
    let value = bus.peekb(hl);
    bus.pokeb(de, value);
    bus.address_on_bus(de, 2);
    if increment {
        cpu.regs.set_hl(hl.wrapping_add(1));
        cpu.regs.set_de(de.wrapping_add(1));
    } else {
        cpu.regs.set_hl(hl.wrapping_sub(1));
        cpu.regs.set_de(de.wrapping_sub(1));
    }
    let bc = cpu.regs.bc().wrapping_sub(1);
    cpu.regs.set_bc(bc);
    cpu.regs.f = transfer_flags(cpu.regs.a, value, bc, cpu.regs.f);
    if repeat && bc != 0 {
        bus.address_on_bus(cpu.regs.de().wrapping_sub(if increment { 1 } else { 0 }), 5);
        cpu.regs.pc = cpu.regs.pc.wrapping_sub(2);
        cpu.regs.wz = cpu.regs.pc.wrapping_add(1);
    }
}

fn compare_flags(a: u8, value: u8, bc_after: u16, old_carry: u8) -> u8 {
    let diff = a.wrapping_sub(value);
    let half_borrow = (a & 0x0F) < (value & 0x0F);
    let mut f = NF | old_carry | (sz53(diff) & (SF | ZF));
    if half_borrow {
        f |= HF;
    }
    if bc_after != 0 {
        f |= PF;
    }
    let n = diff.wrapping_sub(u8::from(half_borrow));
    if n & 0x02 != 0 {
        f |= YF;
    }
    if n & 0x08 != 0 {
        f |= XF;
    }
    f
}

fn block_compare<B: Bus>(cpu: &mut Z80, bus: &mut B, y: u8) {
    let increment = y & 1 == 0; // y=4 CPI, y=5 CPD, y=6 CPIR, y=7 CPDR
    let repeat = y >= 6;
    let hl = cpu.regs.hl();
    let value = bus.peekb(hl);
    bus.address_on_bus(hl, 5);
    if increment {
        cpu.regs.set_hl(hl.wrapping_add(1));
        cpu.regs.wz = cpu.regs.wz.wrapping_add(1);
    } else {
        cpu.regs.set_hl(hl.wrapping_sub(1));
        cpu.regs.wz = cpu.regs.wz.wrapping_sub(1);
    }
    let bc = cpu.regs.bc().wrapping_sub(1);
    cpu.regs.set_bc(bc);
    cpu.regs.f = compare_flags(cpu.regs.a, value, bc, cpu.regs.f & CF);
    let found = cpu.regs.a == value;
    if repeat && bc != 0 && !found {
        bus.address_on_bus(cpu.regs.hl(), 5);
        cpu.regs.pc = cpu.regs.pc.wrapping_sub(2);
        cpu.regs.wz = cpu.regs.pc.wrapping_add(1);
    }
}

fn io_block_flags(value: u8, k: u16, b_after: u8) -> u8 {
    let mut f = sz53(b_after);
    if value & 0x80 != 0 {
        f |= NF;
    }
    if k > 0xFF {
        f |= HF | CF;
    }
    if parity((k as u8 & 0x07) ^ b_after) {
        f |= PF;
    }
    f
}

fn block_in<B: Bus>(cpu: &mut Z80, bus: &mut B, y: u8) {
    let increment = y & 1 == 0; // y=4 INI, y=5 IND, y=6 INIR, y=7 INDR
    let repeat = y >= 6;
    let port = cpu.regs.bc();
    let value = bus.in_port(port);
    let hl = cpu.regs.hl();
    bus.pokeb(hl, value);
    cpu.regs.wz = port.wrapping_add(if increment { 1 } else { u16::MAX });
    cpu.regs.set_hl(if increment { hl.wrapping_add(1) } else { hl.wrapping_sub(1) });
    cpu.regs.b = cpu.regs.b.wrapping_sub(1);
    let c_step = if increment { cpu.regs.c.wrapping_add(1) } else { cpu.regs.c.wrapping_sub(1) };
    let k = u16::from(value) + u16::from(c_step);
    cpu.regs.f = io_block_flags(value, k, cpu.regs.b);
    bus.address_on_bus(port, 1);
    if repeat && cpu.regs.b != 0 {
        bus.address_on_bus(cpu.regs.hl(), 5);
        cpu.regs.pc = cpu.regs.pc.wrapping_sub(2);
    }
}

fn block_out<B: Bus>(cpu: &mut Z80, bus: &mut B, y: u8) {
    let increment = y & 1 == 0; // y=4 OUTI, y=5 OUTD, y=6 OTIR, y=7 OTDR
    let repeat = y >= 6;
    let hl = cpu.regs.hl();
    let value = bus.peekb(hl);
    cpu.regs.b = cpu.regs.b.wrapping_sub(1);
    let port = cpu.regs.bc();
    bus.out_port(port, value);
    bus.address_on_bus(hl, 1);
    cpu.regs.set_hl(if increment { hl.wrapping_add(1) } else { hl.wrapping_sub(1) });
    cpu.regs.wz = port.wrapping_add(if increment { 1 } else { u16::MAX });
    let k = u16::from(value) + u16::from(cpu.regs.l);
    cpu.regs.f = io_block_flags(value, k, cpu.regs.b);
    if repeat && cpu.regs.b != 0 {
        bus.address_on_bus(port, 5);
        cpu.regs.pc = cpu.regs.pc.wrapping_sub(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestBus;

    #[test]
    fn ldi_copies_byte_and_updates_counters() {
        let mut cpu = Z80::new();
        let mut bus = TestBus::new();
        cpu.regs.set_hl(0x4000);
        cpu.regs.set_de(0x5000);
        cpu.regs.set_bc(2);
        bus.mem[0x4000] = 0xAB;
        bus.mem[0] = 0xED;
        bus.mem[1] = 0xA0; // LDI
        cpu.step(&mut bus);
        assert_eq!(bus.mem[0x5000], 0xAB);
        assert_eq!(cpu.regs.hl(), 0x4001);
        assert_eq!(cpu.regs.de(), 0x5001);
        assert_eq!(cpu.regs.bc(), 1);
        assert_eq!(cpu.regs.pc, 2);
    }

    #[test]
    fn ldir_repeats_until_bc_reaches_zero() {
        let mut cpu = Z80::new();
        let mut bus = TestBus::new();
        cpu.regs.set_hl(0x4000);
        cpu.regs.set_de(0x5000);
        cpu.regs.set_bc(3);
        bus.mem[0x4000] = 0x01;
        bus.mem[0x4001] = 0x02;
        bus.mem[0x4002] = 0x03;
        bus.mem[0] = 0xED;
        bus.mem[1] = 0xB0; // LDIR
        for _ in 0..3 {
            cpu.step(&mut bus);
        }
        assert_eq!(cpu.regs.bc(), 0);
        assert_eq!(cpu.regs.pc, 2);
        assert_eq!(bus.mem[0x5000..=0x5002], [0x01, 0x02, 0x03]);
    }

    #[test]
    fn neg_negates_a_and_sets_flags() {
        let mut cpu = Z80::new();
        let mut bus = TestBus::new();
        cpu.regs.a = 0x01;
        bus.mem[0] = 0xED;
        bus.mem[1] = 0x44; // NEG
        cpu.step(&mut bus);
        assert_eq!(cpu.regs.a, 0xFF);
        assert_eq!(cpu.regs.f & NF, NF);
        assert_eq!(cpu.regs.f & CF, CF);
    }

    #[test]
    fn ld_i_a_and_ld_a_i_round_trip() {
        let mut cpu = Z80::new();
        let mut bus = TestBus::new();
        cpu.regs.a = 0x42;
        cpu.regs.iff2 = true;
        bus.mem[0] = 0xED;
        bus.mem[1] = 0x47; // LD I,A
        bus.mem[2] = 0xED;
        bus.mem[3] = 0x57; // LD A,I
        cpu.step(&mut bus);
        cpu.regs.a = 0;
        cpu.step(&mut bus);
        assert_eq!(cpu.regs.a, 0x42);
        assert_eq!(cpu.regs.f & PF, PF);
    }

    #[test]
    fn im_sets_interrupt_mode() {
        let mut cpu = Z80::new();
        let mut bus = TestBus::new();
        bus.mem[0] = 0xED;
        bus.mem[1] = 0x5E; // IM 2
        cpu.step(&mut bus);
        assert_eq!(cpu.regs.im, 2);
    }

    #[test]
    fn unknown_ed_opcode_is_a_no_op() {
        let mut cpu = Z80::new();
        let mut bus = TestBus::new();
        bus.mem[0] = 0xED;
        bus.mem[1] = 0x00;
        cpu.step(&mut bus);
        assert_eq!(cpu.regs.pc, 2);
        assert_eq!(bus.t_state(), 8);
    }
}
