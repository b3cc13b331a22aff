//! The shared `ADD/ADC/SUB/SBC/AND/XOR/OR/CP A,operand` group, used by both
//! the `r`/`(HL)`/`(IX+d)` form (x=2 in the main table) and the immediate
//! form (`ALU A,n`, x=3 z=6).

use crate::alu;
use crate::flags::CF;
use crate::registers::Registers;

/// `y` selects the operation: 0 ADD, 1 ADC, 2 SUB, 3 SBC, 4 AND, 5 XOR, 6 OR, 7 CP.
pub(crate) fn apply(regs: &mut Registers, y: u8, operand: u8) {
    let carry_in = regs.f & CF != 0;
    let result = match y {
        0 => alu::add8(regs.a, operand, false),
        1 => alu::add8(regs.a, operand, carry_in),
        2 => alu::sub8(regs.a, operand, false),
        3 => alu::sub8(regs.a, operand, carry_in),
        4 => alu::and8(regs.a, operand),
        5 => alu::xor8(regs.a, operand),
        6 => alu::or8(regs.a, operand),
        7 => {
            regs.f = alu::cp8(regs.a, operand);
            return;
        }
        _ => unreachable!("3-bit ALU selector"),
    };
    regs.a = result.value;
    regs.f = result.flags;
}
