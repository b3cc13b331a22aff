//! The interface the CPU uses to reach outside itself.
//!
//! `zx-z80` knows nothing about contended memory, the ULA, or port
//! decoding; it only knows that every access costs some number of T-states
//! and that the bus is the thing that knows how many. Each method advances
//! the implementor's own T-state counter before returning.

/// Bus operations the Z80 interpreter needs from its host.
///
/// Implemented by `zx_spectrum::BusAccess`. Every method call accounts for
/// its own timing; the CPU never touches a T-state counter directly.
pub trait Bus {
    /// M1 cycle: fetch the opcode byte at `addr` (4 T-states unless the
    /// implementor adds wait states), bump the refresh counter, and
    /// advance time.
    fn fetch_opcode(&mut self, addr: u16) -> u8;

    /// Ordinary memory read (3 T-states).
    fn peekb(&mut self, addr: u16) -> u8;

    /// Ordinary memory write (3 T-states).
    fn pokeb(&mut self, addr: u16, value: u8);

    /// I/O port read (4 T-states, plus contention on the low/high byte).
    fn in_port(&mut self, port: u16) -> u8;

    /// I/O port write (4 T-states, plus contention on the low/high byte).
    fn out_port(&mut self, port: u16, value: u8);

    /// Charge `cycles` T-states for internal CPU work (e.g. the extra
    /// cycle between fetch and the `DAA`/`EX (SP),HL` internal operation)
    /// without performing a memory or I/O access. `addr` is the address the
    /// real hardware would have on the bus during that time, used only to
    /// decide contention.
    fn address_on_bus(&mut self, addr: u16, cycles: u32);

    /// True if an interrupt request is presently held active by the ULA.
    /// Sampled once at the end of an instruction, never mid-instruction.
    fn is_active_int(&self) -> bool;

    /// The running T-state counter the bus owns. The CPU consults this only
    /// to decide when to stop executing instructions for the current frame;
    /// it never advances it directly.
    fn t_state(&self) -> u32;

    /// Little-endian 16-bit read built from two [`Bus::peekb`] calls.
    fn peekw(&mut self, addr: u16) -> u16 {
        let lo = self.peekb(addr);
        let hi = self.peekb(addr.wrapping_add(1));
        u16::from_le_bytes([lo, hi])
    }

    /// Little-endian 16-bit write built from two [`Bus::pokeb`] calls.
    fn pokew(&mut self, addr: u16, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.pokeb(addr, lo);
        self.pokeb(addr.wrapping_add(1), hi);
    }
}
