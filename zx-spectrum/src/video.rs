//! The raster-synchronized screen rasterizer: pixel-expansion table, raster
//! cursor, indexed frame buffer, and border history.
//!
//! This component never touches the T-state counter itself — it is driven
//! entirely by [`crate::bus::BusAccess`] calling [`Video::emit_next_byte`]
//! each time the schedule says the next screen byte is due (§4.4/§4.5).

use crate::memory::Memory;
use zx_core::{Observable, Value};

/// Base address of the 6144-byte pixel-pattern region.
const SCREEN_BASE: u16 = 0x4000;
/// Base address of the 768-byte attribute region, relative to `SCREEN_BASE`.
const ATTR_OFFSET: u16 = 0x1800;

/// Visible screen dimensions, in pixels/cells.
pub const SCREEN_WIDTH: usize = 256;
pub const SCREEN_HEIGHT: usize = 192;
pub const CELLS_PER_LINE: usize = 32;
pub const SCREEN_BYTES: usize = SCREEN_HEIGHT * CELLS_PER_LINE;

/// Full bordered frame dimensions.
pub const FULL_WIDTH: usize = 384;
pub const FULL_HEIGHT: usize = 256;
const BORDER_LEFT: usize = (FULL_WIDTH - SCREEN_WIDTH) / 2;
const BORDER_TOP: usize = (FULL_HEIGHT - SCREEN_HEIGHT) / 2;

/// Number of frames a FLASH attribute spends in each of its two phases.
const FLASH_FRAME_COUNT: u32 = 16;

/// `(pixel_base, attr_base)` offsets (from `SCREEN_BASE`/`SCREEN_BASE +
/// ATTR_OFFSET`) for each of the 192 on-screen lines, precomputed once
/// using the Spectrum's non-linear `y = (third<<6)|(cell<<3)|row` layout.
const LINE_TABLE: [(u16, u16); SCREEN_HEIGHT] = {
    let mut table = [(0u16, 0u16); SCREEN_HEIGHT];
    let mut y = 0usize;
    while y < SCREEN_HEIGHT {
        let third = y >> 6;
        let row = y & 7;
        let cell = (y >> 3) & 7;
        let pixel_base = third * 2048 + row * 256 + cell * 32;
        let attr_base = (y >> 3) * 32;
        table[y] = (pixel_base as u16, attr_base as u16);
        y += 1;
    }
    table
};

/// Maps `(attribute byte, pixel byte)` to the eight expanded palette
/// indices for that 8-pixel cell, so `emit_next_byte` never has to decode
/// an attribute byte's ink/paper/bright bits per pixel.
///
/// Flat `[u8; 256 * 256 * 8]`, indexed `attr * 2048 + pix * 8 + bit`
/// (`bit` counting `0` as the leftmost pixel, matching `7-b` in the
/// testable-properties bit ordering).
struct PixelMap(Box<[u8]>);

impl PixelMap {
    fn build() -> Self {
        let mut table = vec![0u8; 256 * 256 * 8].into_boxed_slice();
        for attr in 0..256u16 {
            let ink = (attr & 0x07) as u8;
            let paper = ((attr >> 3) & 0x07) as u8;
            let bright = ((attr >> 6) & 0x01) as u8;
            let ink_index = bright << 3 | ink;
            let paper_index = bright << 3 | paper;
            for pix in 0..256u16 {
                for b in 0..8u16 {
                    // Bit 7 of `pix` is the leftmost pixel.
                    let set = pix & (1 << (7 - b)) != 0;
                    let index = (attr as usize) * 2048 + (pix as usize) * 8 + b as usize;
                    table[index] = if set { ink_index } else { paper_index };
                }
            }
        }
        Self(table)
    }

    fn lookup(&self, attr: u8, pix: u8) -> &[u8] {
        let base = (attr as usize) * 2048 + (pix as usize) * 8;
        &self.0[base..base + 8]
    }
}

/// The rasterizer: holds the precomputed pixelmap, the raster cursor, the
/// 256×192 indexed pixel buffer, and the bordered presentation surface.
pub struct Video {
    pixelmap: PixelMap,
    next_screen_byte_index: usize,
    /// One Spectrum palette index (0..=15) per pixel, in row-major order.
    framebuffer: Box<[u8; SCREEN_WIDTH * SCREEN_HEIGHT]>,
    /// Border colour last written, applied uniformly across `end_frame`.
    border: u8,
    frame_count: u32,
    flash_on: bool,
}

impl Video {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pixelmap: PixelMap::build(),
            next_screen_byte_index: 0,
            framebuffer: Box::new([0; SCREEN_WIDTH * SCREEN_HEIGHT]),
            border: 0,
            frame_count: 0,
            flash_on: false,
        }
    }

    #[must_use]
    pub fn next_screen_byte_index(&self) -> usize {
        self.next_screen_byte_index
    }

    pub fn set_border(&mut self, border: u8) {
        self.border = border;
    }

    /// Resets the raster cursor. Called once per frame before the CPU runs.
    pub fn start_frame(&mut self) {
        self.next_screen_byte_index = 0;
        self.frame_count = self.frame_count.wrapping_add(1);
        if self.frame_count % FLASH_FRAME_COUNT == 0 {
            self.flash_on = !self.flash_on;
        }
    }

    /// Emits the screen byte at the current raster position: reads one
    /// pixel byte and its attribute byte, expands them through the
    /// pixelmap (swapping ink/paper if the attribute's FLASH bit is set
    /// and the frame-flash phase says to), and advances the cursor.
    pub fn emit_next_byte(&mut self, memory: &Memory) {
        if self.next_screen_byte_index >= SCREEN_BYTES {
            return;
        }
        let line = self.next_screen_byte_index / CELLS_PER_LINE;
        let cell = self.next_screen_byte_index % CELLS_PER_LINE;
        let (pixel_base, attr_base) = LINE_TABLE[line];
        let pix = memory.peekb(SCREEN_BASE + pixel_base + cell as u16);
        let mut attr = memory.peekb(SCREEN_BASE + ATTR_OFFSET + attr_base + cell as u16);
        if attr & 0x80 != 0 && self.flash_on {
            attr = (attr & 0xC0) | ((attr & 0x38) >> 3) | ((attr & 0x07) << 3);
        }
        let expanded = self.pixelmap.lookup(attr, pix);
        let row_start = line * SCREEN_WIDTH + cell * 8;
        self.framebuffer[row_start..row_start + 8].copy_from_slice(expanded);
        self.next_screen_byte_index += 1;
    }

    /// Composites the 256×192 buffer onto a 384×256 bordered surface,
    /// filling the border with the most recently written border colour.
    #[must_use]
    pub fn end_frame(&self) -> Box<[u8; FULL_WIDTH * FULL_HEIGHT]> {
        let mut full = Box::new([self.border; FULL_WIDTH * FULL_HEIGHT]);
        for y in 0..SCREEN_HEIGHT {
            let src = y * SCREEN_WIDTH;
            let dst = (y + BORDER_TOP) * FULL_WIDTH + BORDER_LEFT;
            full[dst..dst + SCREEN_WIDTH].copy_from_slice(&self.framebuffer[src..src + SCREEN_WIDTH]);
        }
        full
    }

    /// Publishes the indexed buffer to the external display collaborator.
    /// The core only hands back the buffer it already owns; presenting it
    /// on a real surface is out of scope.
    #[must_use]
    pub fn update_zx_screen(&self) -> &[u8; SCREEN_WIDTH * SCREEN_HEIGHT] {
        &self.framebuffer
    }
}

impl Default for Video {
    fn default() -> Self {
        Self::new()
    }
}

impl Observable for Video {
    fn query(&self, path: &str) -> Option<Value> {
        Some(match path {
            "border" => self.border.into(),
            "next_screen_byte_index" => Value::U32(self.next_screen_byte_index as u32),
            "flash_on" => self.flash_on.into(),
            _ => return None,
        })
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &["border", "next_screen_byte_index", "flash_on"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_table_matches_non_linear_scan_order_for_first_few_lines() {
        assert_eq!(LINE_TABLE[0], (0, 0));
        assert_eq!(LINE_TABLE[1], (256, 0));
        assert_eq!(LINE_TABLE[8], (32, 32));
        assert_eq!(LINE_TABLE[64], (2048, 256));
    }

    #[test]
    fn pixelmap_expands_ink_and_paper_by_bit_position() {
        let map = PixelMap::build();
        // attr = paper white(7), ink black(0), not bright; pix = 0b1000_0000
        // (leftmost pixel set) -> first entry is ink (black=0), rest paper (white=7).
        let attr = 0b0011_1000; // paper=7, ink=0
        let row = map.lookup(attr, 0b1000_0000);
        assert_eq!(row[0], 0);
        assert_eq!(row[1], 7);
    }

    #[test]
    fn emit_next_byte_reads_screen_memory_and_advances_cursor() {
        let mut mem = Memory::new();
        mem.pokeb(0x4000, 0xFF); // top-left cell, all pixels set
        mem.pokeb(0x5800, 0b0000_1000); // ink = white(7), paper = black(0)
        let mut video = Video::new();
        video.start_frame();
        video.emit_next_byte(&mem);
        assert_eq!(video.next_screen_byte_index(), 1);
        let buf = video.update_zx_screen();
        assert_eq!(buf[0], 7);
    }

    #[test]
    fn end_frame_centres_the_picture_in_the_border() {
        let mut video = Video::new();
        video.set_border(2);
        let full = video.end_frame();
        assert_eq!(full[0], 2);
        let picture_origin = BORDER_TOP * FULL_WIDTH + BORDER_LEFT;
        assert_eq!(full[picture_origin], 0);
    }

    #[test]
    fn emit_stops_after_a_full_screen_of_bytes() {
        let mem = Memory::new();
        let mut video = Video::new();
        video.start_frame();
        for _ in 0..SCREEN_BYTES + 10 {
            video.emit_next_byte(&mem);
        }
        assert_eq!(video.next_screen_byte_index(), SCREEN_BYTES);
    }

    #[test]
    fn observable_reports_border_colour() {
        let mut video = Video::new();
        video.set_border(4);
        assert_eq!(video.query("border"), Some(Value::U8(4)));
        assert_eq!(video.query("nonexistent"), None);
    }
}
