//! A cycle-accurate ZX Spectrum 48K: contended memory, raster-synchronized
//! video, and the Z80 CPU from `zx-z80`, wired into a 50 Hz frame loop.

pub mod bus;
pub mod keyboard;
pub mod machine;
pub mod memory;
pub mod palette;
pub mod ports;
pub mod snapshot;
pub mod video;

pub use bus::BusAccess;
pub use keyboard::{HostKey, KeyboardState};
pub use machine::Machine;
pub use memory::Memory;
pub use ports::Ports;
pub use snapshot::SnapshotError;
pub use video::Video;
