pub mod fixed;
pub mod pipeline;
pub mod raster;
pub mod regs;
pub mod tables;
pub mod texel;
pub mod tmu;
pub mod workers;

use std::sync::Arc;

use tracing::{debug, info};

use raster::PixelStats;
use regs::{reg, FbzMode, RegisterBank};
use tables::{argb_to_rgb565, SharedTables};
use tmu::TmuState;
use workers::RasterPool;

/// Back face culling selected through the API; interpretation of the
/// area sign follows the configured color origin.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum CullMode {
    #[default]
    Disable,
    Negative,
    Positive,
}

/// Cumulative counters since context creation (or the last reset).
#[derive(Copy, Clone, Debug, Default)]
pub struct RenderStats {
    pub triangles_in: u64,
    pub triangles_out: u64,
    pub degenerate: u64,
    pub culled: u64,
    pub clip_rejected: u64,
    pub invalid_params: u64,
    pub pixels_in: u64,
    pub pixels_out: u64,
    pub chroma_fail: u64,
    pub zfunc_fail: u64,
    pub afunc_fail: u64,
    pub stipple_count: u64,
}

/// Framebuffer interface state: the pixel memory (three RGB565 color
/// buffers plus one 16 bit aux buffer in a single allocation), buffer
/// rotation, and the per context drawing parameters that live outside
/// the register file.
pub struct FbiState {
    pub fb: Vec<u16>,
    pub rgboffs: [usize; 3],
    pub auxoffs: usize,
    pub num_color_bufs: usize,
    pub frontbuf: usize,
    pub backbuf: usize,
    pub rowpixels: usize,
    pub width: usize,
    pub height: usize,
    pub viewport: (f32, f32),
    pub cull_mode: CullMode,
    pub fogblend: [u8; 64],
    pub fogdelta: [u8; 64],
}

/// The emulated chip: register file, FBI, two TMUs, the shared decode
/// tables and the rasterizer worker pool. Exactly one instance exists
/// per open context and owns everything transitively.
pub struct VoodooState {
    pub regs: RegisterBank,
    pub fbi: FbiState,
    pub tmu: [TmuState; 2],
    pub num_tmus: usize,
    pub tables: Arc<SharedTables>,
    pub pool: Option<RasterPool>,
    pub stats: RenderStats,
}

impl VoodooState {
    pub fn new(
        width: usize,
        height: usize,
        num_color_bufs: usize,
        num_tmus: usize,
        worker_threads: usize,
    ) -> Result<Self, String> {
        if width == 0 || height == 0 || width > 1024 || height > 1024 {
            return Err(format!("unsupported resolution {width}x{height}"));
        }
        if !(2..=3).contains(&num_color_bufs) {
            return Err(format!("unsupported color buffer count {num_color_bufs}"));
        }
        if !(1..=2).contains(&num_tmus) {
            return Err(format!("unsupported TMU count {num_tmus}"));
        }

        let rowpixels = width;
        let page = rowpixels * height;
        let fb = vec![0u16; page * 4];

        let mut regs = RegisterBank::new();
        // color and aux writes start enabled so clears work out of the box
        regs.write(
            reg::FBZ_MODE,
            FbzMode::RGB_BUFFER_MASK.set(FbzMode::AUX_BUFFER_MASK.set(0, 1), 1),
        );

        let pool = if worker_threads > 0 {
            Some(RasterPool::new(worker_threads).map_err(|e| format!("worker spawn: {e}"))?)
        } else {
            None
        };

        info!(
            width,
            height,
            num_color_bufs,
            num_tmus,
            worker_threads,
            "voodoo context created"
        );
        Ok(Self {
            regs,
            fbi: FbiState {
                fb,
                rgboffs: [0, page, page * 2],
                auxoffs: page * 3,
                num_color_bufs,
                frontbuf: 0,
                backbuf: 1,
                rowpixels,
                width,
                height,
                viewport: (0.0, 0.0),
                cull_mode: CullMode::Disable,
                fogblend: [0; 64],
                fogdelta: [0; 64],
            },
            tmu: [TmuState::new(), TmuState::new()],
            num_tmus,
            tables: Arc::new(SharedTables::new()),
            pool,
            stats: RenderStats::default(),
        })
    }

    /// Physical row for an application-space scanline, honoring the
    /// configured y origin.
    #[inline]
    pub fn row_index(&self, y: i32) -> usize {
        if FbzMode(self.regs.read(reg::FBZ_MODE)).y_origin_lower_left() {
            (self.fbi.height as i32 - 1 - y) as usize
        } else {
            y as usize
        }
    }

    /// Clears the draw buffer and/or aux buffer inside the clip window,
    /// honoring the write masks.
    pub fn buffer_clear(&mut self, color: u32, alpha: u8, depth: u16) {
        let fbz = FbzMode(self.regs.read(reg::FBZ_MODE));
        let (left, right, top, bottom) = self.clip_window();
        if left >= right || top >= bottom {
            return;
        }
        let (left, right) = (left as usize, right as usize);
        debug!(color, alpha, depth, "buffer clear");

        if fbz.rgb_buffer_mask() {
            let pix = argb_to_rgb565(color);
            let base = self.fbi.rgboffs[self.fbi.backbuf];
            for y in top..bottom {
                let row = base + self.row_index(y) * self.fbi.rowpixels;
                self.fbi.fb[row + left..row + right].fill(pix);
            }
        }
        if fbz.aux_buffer_mask() {
            let val = if fbz.enable_alpha_planes() {
                alpha as u16
            } else {
                depth
            };
            let base = self.fbi.auxoffs;
            for y in top..bottom {
                let row = base + self.row_index(y) * self.fbi.rowpixels;
                self.fbi.fb[row + left..row + right].fill(val);
            }
        }
    }

    /// Advances the buffer rotation; the previous back buffer becomes
    /// visible.
    pub fn swap_buffers(&mut self) {
        self.fbi.frontbuf = self.fbi.backbuf;
        self.fbi.backbuf = (self.fbi.backbuf + 1) % self.fbi.num_color_bufs;
        debug!(
            front = self.fbi.frontbuf,
            back = self.fbi.backbuf,
            "buffer swap"
        );
    }

    /// The currently displayed color buffer.
    pub fn front_pixels(&self) -> &[u16] {
        let base = self.fbi.rgboffs[self.fbi.frontbuf];
        &self.fbi.fb[base..base + self.fbi.rowpixels * self.fbi.height]
    }

    /// Resolves a color buffer index (0 = front, 1 = back, others
    /// rotate behind the back buffer) to its offset in fb memory.
    pub fn color_buffer_offset(&self, index: usize) -> Option<usize> {
        if index >= self.fbi.num_color_bufs {
            return None;
        }
        let buf = match index {
            0 => self.fbi.frontbuf,
            1 => self.fbi.backbuf,
            n => (self.fbi.backbuf + n - 1) % self.fbi.num_color_bufs,
        };
        Some(self.fbi.rgboffs[buf])
    }

    /// Folds one triangle's pixel counters into the cumulative stats
    /// and the 24 bit hardware counter registers.
    pub fn merge_stats(&mut self, s: &PixelStats) {
        self.stats.pixels_in += s.pixels_in as u64;
        self.stats.pixels_out += s.pixels_out as u64;
        self.stats.chroma_fail += s.chroma_fail as u64;
        self.stats.zfunc_fail += s.zfunc_fail as u64;
        self.stats.afunc_fail += s.afunc_fail as u64;
        self.stats.stipple_count += s.stipple_count as u64;

        let mut bump = |index: usize, amount: u32| {
            let cur = self.regs.read(index);
            self.regs.write(index, cur.wrapping_add(amount) & 0x00ff_ffff);
        };
        bump(reg::FBI_PIXELS_IN, s.pixels_in);
        bump(reg::FBI_PIXELS_OUT, s.pixels_out);
        bump(reg::FBI_CHROMA_FAIL, s.chroma_fail);
        bump(reg::FBI_ZFUNC_FAIL, s.zfunc_fail);
        bump(reg::FBI_AFUNC_FAIL, s.afunc_fail);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_respects_write_masks() {
        let mut v = VoodooState::new(64, 32, 2, 1, 0).unwrap();
        v.buffer_clear(0x0000_0040, 0, 0xffff);
        let back = v.fbi.rgboffs[v.fbi.backbuf];
        assert_eq!(v.fbi.fb[back], 0x0008);
        assert_eq!(v.fbi.fb[v.fbi.auxoffs], 0xffff);

        // mask color writes off: aux still clears
        v.regs
            .write_field(reg::FBZ_MODE, FbzMode::RGB_BUFFER_MASK, 0);
        v.buffer_clear(0x00ff_0000, 0, 0x1234);
        assert_eq!(v.fbi.fb[back], 0x0008);
        assert_eq!(v.fbi.fb[v.fbi.auxoffs], 0x1234);
    }

    #[test]
    fn clear_honors_clip_window() {
        let mut v = VoodooState::new(64, 32, 2, 1, 0).unwrap();
        v.regs
            .write_field(reg::FBZ_MODE, FbzMode::ENABLE_CLIPPING, 1);
        v.regs.write(reg::CLIP_LEFT_RIGHT, (8 << 16) | 16);
        v.regs.write(reg::CLIP_LOWY_HIGHY, (4 << 16) | 8);
        v.buffer_clear(0x00ff_ffff, 0, 0);
        let back = v.fbi.rgboffs[v.fbi.backbuf];
        let row = |y: usize| &v.fbi.fb[back + y * 64..back + y * 64 + 64];
        assert_eq!(row(3)[8], 0x0000);
        assert_eq!(row(4)[8], 0xffff);
        assert_eq!(row(4)[7], 0x0000);
        assert_eq!(row(4)[16], 0x0000);
        assert_eq!(row(7)[15], 0xffff);
        assert_eq!(row(8)[8], 0x0000);
    }

    #[test]
    fn swap_rotates_two_buffers() {
        let mut v = VoodooState::new(32, 32, 2, 1, 0).unwrap();
        assert_eq!((v.fbi.frontbuf, v.fbi.backbuf), (0, 1));
        v.swap_buffers();
        assert_eq!((v.fbi.frontbuf, v.fbi.backbuf), (1, 0));
        v.swap_buffers();
        assert_eq!((v.fbi.frontbuf, v.fbi.backbuf), (0, 1));
    }

    #[test]
    fn swap_rotates_three_buffers() {
        let mut v = VoodooState::new(32, 32, 3, 1, 0).unwrap();
        v.swap_buffers();
        assert_eq!((v.fbi.frontbuf, v.fbi.backbuf), (1, 2));
        v.swap_buffers();
        assert_eq!((v.fbi.frontbuf, v.fbi.backbuf), (2, 0));
        v.swap_buffers();
        assert_eq!((v.fbi.frontbuf, v.fbi.backbuf), (0, 1));
    }

    #[test]
    fn rejects_bad_configuration() {
        assert!(VoodooState::new(0, 480, 2, 1, 0).is_err());
        assert!(VoodooState::new(640, 480, 4, 1, 0).is_err());
        assert!(VoodooState::new(640, 480, 2, 3, 0).is_err());
    }

    #[test]
    fn hardware_counters_wrap_at_24_bits() {
        let mut v = VoodooState::new(32, 32, 2, 1, 0).unwrap();
        v.regs.write(reg::FBI_PIXELS_IN, 0x00ff_fffe);
        let stats = PixelStats {
            pixels_in: 5,
            ..Default::default()
        };
        v.merge_stats(&stats);
        assert_eq!(v.regs.read(reg::FBI_PIXELS_IN), 3);
    }
}
