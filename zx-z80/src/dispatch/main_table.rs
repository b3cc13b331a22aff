//! The 256-entry unprefixed opcode table, shared verbatim by the real
//! unprefixed path (`mode = Hl`, `mem_addr = None`) and by the `DD`/`FD`
//! prefixes (`mode = Ix`/`Iy`, `mem_addr` precomputed when the opcode
//! touches `(HL)`/`(IX+d)`/`(IY+d)` memory).
//!
//! Decoded with the classic `x/y/z/p/q` breakdown (Young, "The
//! Undocumented Z80 Documented"): `x = op>>6`, `y = (op>>3)&7`,
//! `z = op&7`, `p = y>>1`, `q = y&1`.

use super::{alu_dispatch, condition};
use crate::alu;
use crate::bus::Bus;
use crate::cpu::{IndexMode, Z80};
use crate::flags::{CF, HF, NF, PF, SF, XF, YF, ZF};

fn operand_address(cpu: &Z80, mode: IndexMode, mem_addr: Option<u16>) -> u16 {
    mem_addr.unwrap_or_else(|| cpu.index_value(mode))
}

fn read_r<B: Bus>(cpu: &mut Z80, bus: &mut B, code: u8, mode: IndexMode, mem_addr: Option<u16>) -> u8 {
    if code == 6 {
        bus.peekb(operand_address(cpu, mode, mem_addr))
    } else {
        cpu.reg8(code, mode)
    }
}

fn write_r<B: Bus>(
    cpu: &mut Z80,
    bus: &mut B,
    code: u8,
    mode: IndexMode,
    mem_addr: Option<u16>,
    value: u8,
) {
    if code == 6 {
        bus.pokeb(operand_address(cpu, mode, mem_addr), value);
    } else {
        cpu.set_reg8(code, mode, value);
    }
}

fn read_rp(cpu: &Z80, code: u8, mode: IndexMode) -> u16 {
    match code {
        0 => cpu.regs.bc(),
        1 => cpu.regs.de(),
        2 => cpu.index_value(mode),
        3 => cpu.regs.sp,
        _ => unreachable!("2-bit rp selector"),
    }
}

fn write_rp(cpu: &mut Z80, code: u8, mode: IndexMode, value: u16) {
    match code {
        0 => cpu.regs.set_bc(value),
        1 => cpu.regs.set_de(value),
        2 => cpu.set_index_value(mode, value),
        3 => cpu.regs.sp = value,
        _ => unreachable!("2-bit rp selector"),
    }
}

fn read_rp2(cpu: &Z80, code: u8, mode: IndexMode) -> u16 {
    match code {
        0 => cpu.regs.bc(),
        1 => cpu.regs.de(),
        2 => cpu.index_value(mode),
        3 => cpu.regs.af(),
        _ => unreachable!("2-bit rp2 selector"),
    }
}

fn write_rp2(cpu: &mut Z80, code: u8, mode: IndexMode, value: u16) {
    match code {
        0 => cpu.regs.set_bc(value),
        1 => cpu.regs.set_de(value),
        2 => cpu.set_index_value(mode, value),
        3 => cpu.regs.set_af(value),
        _ => unreachable!("2-bit rp2 selector"),
    }
}

fn push<B: Bus>(cpu: &mut Z80, bus: &mut B, value: u16) {
    cpu.regs.sp = cpu.regs.sp.wrapping_sub(1);
    bus.pokeb(cpu.regs.sp, (value >> 8) as u8);
    cpu.regs.sp = cpu.regs.sp.wrapping_sub(1);
    bus.pokeb(cpu.regs.sp, value as u8);
}

fn pop<B: Bus>(cpu: &mut Z80, bus: &mut B) -> u16 {
    let lo = bus.peekb(cpu.regs.sp);
    cpu.regs.sp = cpu.regs.sp.wrapping_add(1);
    let hi = bus.peekb(cpu.regs.sp);
    cpu.regs.sp = cpu.regs.sp.wrapping_add(1);
    u16::from_le_bytes([lo, hi])
}

pub(crate) fn execute<B: Bus>(
    cpu: &mut Z80,
    bus: &mut B,
    op: u8,
    mode: IndexMode,
    mem_addr: Option<u16>,
) {
    let x = op >> 6;
    let y = (op >> 3) & 7;
    let z = op & 7;
    let p = y >> 1;
    let q = y & 1;

    match x {
        0 => execute_x0(cpu, bus, op, y, z, p, q, mode, mem_addr),
        1 => {
            if op == 0x76 {
                cpu.regs.halted = true;
            } else {
                let value = read_r(cpu, bus, z, mode, mem_addr);
                write_r(cpu, bus, y, mode, mem_addr, value);
            }
        }
        2 => {
            let operand = read_r(cpu, bus, z, mode, mem_addr);
            alu_dispatch::apply(&mut cpu.regs, y, operand);
        }
        3 => execute_x3(cpu, bus, op, y, z, p, q, mode, mem_addr),
        _ => unreachable!("2-bit x selector"),
    }
}

#[allow(clippy::too_many_arguments)]
fn execute_x0<B: Bus>(
    cpu: &mut Z80,
    bus: &mut B,
    op: u8,
    y: u8,
    z: u8,
    p: u8,
    q: u8,
    mode: IndexMode,
    mem_addr: Option<u16>,
) {
    match z {
        0 => match y {
            0 => {}
            1 => cpu.regs.ex_af_af_alt(),
            2 => {
                let offset = bus.peekb(cpu.regs.pc) as i8;
                cpu.regs.pc = cpu.regs.pc.wrapping_add(1);
                cpu.regs.b = cpu.regs.b.wrapping_sub(1);
                bus.address_on_bus(cpu.regs.pc.wrapping_sub(1), 1);
                if cpu.regs.b != 0 {
                    cpu.regs.pc = cpu.regs.pc.wrapping_add_signed(i16::from(offset));
                    cpu.regs.wz = cpu.regs.pc;
                    bus.address_on_bus(cpu.regs.pc, 5);
                }
            }
            3 => {
                let offset = bus.peekb(cpu.regs.pc) as i8;
                cpu.regs.pc = cpu.regs.pc.wrapping_add(1);
                cpu.regs.pc = cpu.regs.pc.wrapping_add_signed(i16::from(offset));
                cpu.regs.wz = cpu.regs.pc;
                bus.address_on_bus(cpu.regs.pc.wrapping_sub(1), 5);
            }
            4..=7 => {
                let offset = bus.peekb(cpu.regs.pc) as i8;
                cpu.regs.pc = cpu.regs.pc.wrapping_add(1);
                if condition(cpu.regs.f, y - 4) {
                    cpu.regs.pc = cpu.regs.pc.wrapping_add_signed(i16::from(offset));
                    cpu.regs.wz = cpu.regs.pc;
                    bus.address_on_bus(cpu.regs.pc, 5);
                }
            }
            _ => unreachable!(),
        },
        1 => {
            if q == 0 {
                let lo = bus.peekb(cpu.regs.pc);
                let hi = bus.peekb(cpu.regs.pc.wrapping_add(1));
                cpu.regs.pc = cpu.regs.pc.wrapping_add(2);
                write_rp(cpu, p, mode, u16::from_le_bytes([lo, hi]));
            } else {
                let hl = cpu.index_value(mode);
                let rp = read_rp(cpu, p, mode);
                let (result, hc) = alu::add16(hl, rp);
                cpu.regs.f = (cpu.regs.f & (SF | ZF | PF)) | hc;
                cpu.set_index_value(mode, result);
                cpu.regs.wz = hl.wrapping_add(1);
                bus.address_on_bus(cpu.regs.pc, 7);
            }
        }
        2 => {
            let addr = match p {
                0 => cpu.regs.bc(),
                1 => cpu.regs.de(),
                _ => {
                    let lo = bus.peekb(cpu.regs.pc);
                    let hi = bus.peekb(cpu.regs.pc.wrapping_add(1));
                    cpu.regs.pc = cpu.regs.pc.wrapping_add(2);
                    u16::from_le_bytes([lo, hi])
                }
            };
            if q == 0 {
                match p {
                    0 | 1 => {
                        bus.pokeb(addr, cpu.regs.a);
                        cpu.regs.wz = (u16::from(cpu.regs.a) << 8) | addr.wrapping_add(1) & 0x00FF;
                    }
                    2 => {
                        let hl = cpu.index_value(mode);
                        bus.pokew(addr, hl);
                        cpu.regs.wz = addr.wrapping_add(1);
                    }
                    _ => {
                        bus.pokeb(addr, cpu.regs.a);
                        cpu.regs.wz = (u16::from(cpu.regs.a) << 8) | addr.wrapping_add(1) & 0x00FF;
                    }
                }
            } else {
                match p {
                    0 | 1 => {
                        cpu.regs.a = bus.peekb(addr);
                        cpu.regs.wz = addr.wrapping_add(1);
                    }
                    2 => {
                        let value = bus.peekw(addr);
                        cpu.set_index_value(mode, value);
                        cpu.regs.wz = addr.wrapping_add(1);
                    }
                    _ => {
                        cpu.regs.a = bus.peekb(addr);
                        cpu.regs.wz = addr.wrapping_add(1);
                    }
                }
            }
        }
        3 => {
            let rp = read_rp(cpu, p, mode);
            let result = if q == 0 { rp.wrapping_add(1) } else { rp.wrapping_sub(1) };
            write_rp(cpu, p, mode, result);
            bus.address_on_bus(cpu.regs.pc, 2);
        }
        4 => {
            let v = read_r(cpu, bus, y, mode, mem_addr);
            if y == 6 {
                bus.address_on_bus(operand_address(cpu, mode, mem_addr), 1);
            }
            let r = alu::inc8(v);
            write_r(cpu, bus, y, mode, mem_addr, r.value);
            cpu.regs.f = (cpu.regs.f & CF) | r.flags;
        }
        5 => {
            let v = read_r(cpu, bus, y, mode, mem_addr);
            if y == 6 {
                bus.address_on_bus(operand_address(cpu, mode, mem_addr), 1);
            }
            let r = alu::dec8(v);
            write_r(cpu, bus, y, mode, mem_addr, r.value);
            cpu.regs.f = (cpu.regs.f & CF) | r.flags;
        }
        6 => {
            let n = bus.peekb(cpu.regs.pc);
            cpu.regs.pc = cpu.regs.pc.wrapping_add(1);
            write_r(cpu, bus, y, mode, mem_addr, n);
        }
        7 => match y {
            0 => {
                let r = alu::rlc8(cpu.regs.a);
                cpu.regs.a = r.value;
                cpu.regs.f = (cpu.regs.f & (SF | ZF | PF)) | (r.flags & (CF | YF | XF));
            }
            1 => {
                let r = alu::rrc8(cpu.regs.a);
                cpu.regs.a = r.value;
                cpu.regs.f = (cpu.regs.f & (SF | ZF | PF)) | (r.flags & (CF | YF | XF));
            }
            2 => {
                let r = alu::rl8(cpu.regs.a, cpu.regs.f & CF != 0);
                cpu.regs.a = r.value;
                cpu.regs.f = (cpu.regs.f & (SF | ZF | PF)) | (r.flags & (CF | YF | XF));
            }
            3 => {
                let r = alu::rr8(cpu.regs.a, cpu.regs.f & CF != 0);
                cpu.regs.a = r.value;
                cpu.regs.f = (cpu.regs.f & (SF | ZF | PF)) | (r.flags & (CF | YF | XF));
            }
            4 => {
                let r = alu::daa(cpu.regs.a, cpu.regs.f);
                cpu.regs.a = r.value;
                cpu.regs.f = r.flags;
            }
            5 => {
                cpu.regs.a = !cpu.regs.a;
                cpu.regs.f = (cpu.regs.f & (SF | ZF | PF | CF))
                    | HF
                    | NF
                    | (cpu.regs.a & (YF | XF));
            }
            6 => {
                let xy = (cpu.regs.q ^ cpu.regs.f | cpu.regs.a) & (YF | XF);
                cpu.regs.f = (cpu.regs.f & (SF | ZF | PF)) | CF | xy;
            }
            7 => {
                let had_carry = cpu.regs.f & CF != 0;
                let xy = (cpu.regs.q ^ cpu.regs.f | cpu.regs.a) & (YF | XF);
                let mut f = (cpu.regs.f & (SF | ZF | PF)) | xy;
                if had_carry {
                    f |= HF;
                } else {
                    f |= CF;
                }
                cpu.regs.f = f;
            }
            _ => unreachable!(),
        },
        _ => unreachable!(),
    }
}

#[allow(clippy::too_many_arguments)]
fn execute_x3<B: Bus>(
    cpu: &mut Z80,
    bus: &mut B,
    op: u8,
    y: u8,
    z: u8,
    p: u8,
    q: u8,
    mode: IndexMode,
    mem_addr: Option<u16>,
) {
    match z {
        0 => {
            bus.address_on_bus(cpu.regs.pc, 1);
            if condition(cpu.regs.f, y) {
                cpu.regs.pc = pop(cpu, bus);
                cpu.regs.wz = cpu.regs.pc;
            }
        }
        1 => {
            if q == 0 {
                let value = pop(cpu, bus);
                write_rp2(cpu, p, mode, value);
            } else {
                match p {
                    0 => {
                        cpu.regs.pc = pop(cpu, bus);
                        cpu.regs.wz = cpu.regs.pc;
                    }
                    1 => cpu.regs.exx(),
                    2 => cpu.regs.pc = cpu.index_value(mode),
                    3 => {
                        cpu.regs.sp = cpu.index_value(mode);
                        bus.address_on_bus(cpu.regs.pc, 2);
                    }
                    _ => unreachable!(),
                }
            }
        }
        2 => {
            let lo = bus.peekb(cpu.regs.pc);
            let hi = bus.peekb(cpu.regs.pc.wrapping_add(1));
            cpu.regs.pc = cpu.regs.pc.wrapping_add(2);
            let target = u16::from_le_bytes([lo, hi]);
            cpu.regs.wz = target;
            if condition(cpu.regs.f, y) {
                cpu.regs.pc = target;
            }
        }
        3 => match y {
            0 => {
                let lo = bus.peekb(cpu.regs.pc);
                let hi = bus.peekb(cpu.regs.pc.wrapping_add(1));
                cpu.regs.pc = u16::from_le_bytes([lo, hi]);
                cpu.regs.wz = cpu.regs.pc;
            }
            2 => {
                let n = bus.peekb(cpu.regs.pc);
                cpu.regs.pc = cpu.regs.pc.wrapping_add(1);
                let port = u16::from(cpu.regs.a) << 8 | u16::from(n);
                bus.out_port(port, cpu.regs.a);
                cpu.regs.wz = (port & 0xFF00) | (port.wrapping_add(1) & 0x00FF);
            }
            3 => {
                let n = bus.peekb(cpu.regs.pc);
                cpu.regs.pc = cpu.regs.pc.wrapping_add(1);
                let port = u16::from(cpu.regs.a) << 8 | u16::from(n);
                cpu.regs.a = bus.in_port(port);
                cpu.regs.wz = port.wrapping_add(1);
            }
            4 => {
                let sp_val = bus.peekw(cpu.regs.sp);
                let hl = cpu.index_value(mode);
                bus.pokew(cpu.regs.sp, hl);
                cpu.set_index_value(mode, sp_val);
                cpu.regs.wz = sp_val;
                bus.address_on_bus(cpu.regs.sp, 3);
            }
            5 => {
                // Always the real DE/HL, even under a DD/FD prefix.
                let de = cpu.regs.de();
                let hl = cpu.regs.hl();
                cpu.regs.set_de(hl);
                cpu.regs.set_hl(de);
            }
            6 => {
                cpu.regs.iff1 = false;
                cpu.regs.iff2 = false;
            }
            7 => {
                cpu.regs.iff1 = true;
                cpu.regs.iff2 = true;
                cpu.request_ei_delay();
            }
            _ => unreachable!(),
        },
        4 => {
            let lo = bus.peekb(cpu.regs.pc);
            let hi = bus.peekb(cpu.regs.pc.wrapping_add(1));
            cpu.regs.pc = cpu.regs.pc.wrapping_add(2);
            let target = u16::from_le_bytes([lo, hi]);
            cpu.regs.wz = target;
            if condition(cpu.regs.f, y) {
                bus.address_on_bus(cpu.regs.pc, 1);
                push(cpu, bus, cpu.regs.pc);
                cpu.regs.pc = target;
            }
        }
        5 => {
            if q == 0 {
                bus.address_on_bus(cpu.regs.pc, 1);
                let value = read_rp2(cpu, p, mode);
                push(cpu, bus, value);
            } else if p == 0 {
                let lo = bus.peekb(cpu.regs.pc);
                let hi = bus.peekb(cpu.regs.pc.wrapping_add(1));
                cpu.regs.pc = cpu.regs.pc.wrapping_add(2);
                let target = u16::from_le_bytes([lo, hi]);
                cpu.regs.wz = target;
                bus.address_on_bus(cpu.regs.pc, 1);
                push(cpu, bus, cpu.regs.pc);
                cpu.regs.pc = target;
            }
            // p=1,2,3 (DD/ED/FD) are intercepted in dispatch::mod before
            // reaching this table and never arrive here.
        }
        6 => {
            let n = bus.peekb(cpu.regs.pc);
            cpu.regs.pc = cpu.regs.pc.wrapping_add(1);
            alu_dispatch::apply(&mut cpu.regs, y, n);
        }
        7 => {
            bus.address_on_bus(cpu.regs.pc, 1);
            push(cpu, bus, cpu.regs.pc);
            cpu.regs.pc = u16::from(y) * 8;
            cpu.regs.wz = cpu.regs.pc;
        }
        _ => unreachable!(),
    }
    let _ = op;
}

#[cfg(test)]
mod tests {
    use crate::cpu::Z80;
    use crate::test_support::TestBus;

    #[test]
    fn ld_r_r_copies_between_registers() {
        // LD B,A (0x47)
        let mut cpu = Z80::new();
        let mut bus = TestBus::new();
        cpu.regs.a = 0x42;
        bus.mem[0] = 0x47;
        cpu.step(&mut bus);
        assert_eq!(cpu.regs.b, 0x42);
    }

    #[test]
    fn inc_dec_8_bit_leave_carry_untouched() {
        // INC B (0x04); DEC B (0x05)
        let mut cpu = Z80::new();
        let mut bus = TestBus::new();
        cpu.regs.f = crate::flags::CF;
        bus.mem[0] = 0x04;
        bus.mem[1] = 0x05;
        cpu.step(&mut bus);
        assert_eq!(cpu.regs.b, 1);
        assert_ne!(cpu.regs.f & crate::flags::CF, 0);
        cpu.step(&mut bus);
        assert_eq!(cpu.regs.b, 0);
        assert_ne!(cpu.regs.f & crate::flags::ZF, 0);
        assert_ne!(cpu.regs.f & crate::flags::CF, 0);
    }

    #[test]
    fn ld_dd_nn_loads_16_bit_immediate() {
        // LD HL,0x1234 (0x21 34 12)
        let mut cpu = Z80::new();
        let mut bus = TestBus::new();
        bus.mem[0] = 0x21;
        bus.mem[1] = 0x34;
        bus.mem[2] = 0x12;
        cpu.step(&mut bus);
        assert_eq!(cpu.regs.hl(), 0x1234);
        assert_eq!(cpu.regs.pc, 3);
    }

    #[test]
    fn add_hl_bc_sets_half_carry_on_nibble_overflow() {
        // ADD HL,BC (0x09)
        let mut cpu = Z80::new();
        let mut bus = TestBus::new();
        cpu.regs.set_hl(0x0FFF);
        cpu.regs.set_bc(0x0001);
        bus.mem[0] = 0x09;
        cpu.step(&mut bus);
        assert_eq!(cpu.regs.hl(), 0x1000);
        assert_ne!(cpu.regs.f & crate::flags::HF, 0);
    }

    #[test]
    fn call_pushes_return_address_and_jumps() {
        // CALL 0x8010 (0xCD 10 80)
        let mut cpu = Z80::new();
        let mut bus = TestBus::new();
        cpu.regs.sp = 0x9000;
        bus.mem[0] = 0xCD;
        bus.mem[1] = 0x10;
        bus.mem[2] = 0x80;
        cpu.step(&mut bus);
        assert_eq!(cpu.regs.pc, 0x8010);
        assert_eq!(cpu.regs.sp, 0x8FFE);
        let ret_lo = bus.mem[0x8FFE];
        let ret_hi = bus.mem[0x8FFF];
        assert_eq!(u16::from_le_bytes([ret_lo, ret_hi]), 3);
    }

    #[test]
    fn ret_pops_the_pushed_address() {
        // PUSH BC (0xC5); then a bare RET (0xC9) after manually setting PC.
        let mut cpu = Z80::new();
        let mut bus = TestBus::new();
        cpu.regs.sp = 0x9000;
        cpu.regs.set_bc(0x4321);
        bus.mem[0] = 0xC5; // PUSH BC
        cpu.step(&mut bus);
        bus.mem[1] = 0xC9; // RET, executed from pc=1
        cpu.step(&mut bus);
        assert_eq!(cpu.regs.pc, 0x4321);
    }

    #[test]
    fn djnz_branches_while_b_nonzero() {
        // DJNZ -2 (0x10 FE), looping on itself; B starts at 3.
        let mut cpu = Z80::new();
        let mut bus = TestBus::new();
        cpu.regs.b = 3;
        bus.mem[0] = 0x10;
        bus.mem[1] = 0xFE;
        cpu.step(&mut bus); // B=2, branch taken back to pc=0
        assert_eq!(cpu.regs.pc, 0);
        assert_eq!(cpu.regs.b, 2);
        cpu.step(&mut bus);
        assert_eq!(cpu.regs.b, 1);
        cpu.step(&mut bus);
        // B now 0, falls through past the DJNZ.
        assert_eq!(cpu.regs.b, 0);
        assert_eq!(cpu.regs.pc, 2);
    }

    #[test]
    fn ex_de_hl_swaps_even_under_index_prefix() {
        // DD EB: EX DE,HL always trades the real DE/HL, never IX.
        let mut cpu = Z80::new();
        let mut bus = TestBus::new();
        cpu.regs.set_de(0x1111);
        cpu.regs.set_hl(0x2222);
        cpu.regs.ix = 0x3333;
        bus.mem[0] = 0xDD;
        bus.mem[1] = 0xEB;
        cpu.step(&mut bus);
        assert_eq!(cpu.regs.de(), 0x2222);
        assert_eq!(cpu.regs.hl(), 0x1111);
        assert_eq!(cpu.regs.ix, 0x3333);
    }
}
