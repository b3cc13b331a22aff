//! Foundational types for the ZX Spectrum emulator.
//!
//! Nothing in this crate knows anything about the Z80, the ULA, or the
//! Spectrum's memory map. It exists so `zx-z80` and `zx-spectrum` can share
//! a time unit and an introspection interface without either depending on
//! the other.

mod observable;
mod ticks;

pub use observable::{Observable, Value};
pub use ticks::Ticks;
