use std::marker::PhantomData;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tracing::debug;

use super::fixed::fast_reciplog;
use super::pipeline;
use super::regs::{
    clip_bounds, reg, AlphaMode, Argb, ChromaRange, FbzColorPath, FbzMode, FogMode, TextureMode,
};
use super::tables::SharedTables;
use super::{CullMode, VoodooState};

/// Triangles below this covered pixel count skip the worker pool.
pub const THREAD_THRESHOLD: u32 = 200;

/// Read-only view of context memory handed to rasterizer workers. The
/// dispatching thread blocks until every worker is done, so the backing
/// allocation outlives all uses.
pub struct RawSlice<T> {
    ptr: *const T,
    len: usize,
    _marker: PhantomData<T>,
}

unsafe impl<T: Sync> Send for RawSlice<T> {}
unsafe impl<T: Sync> Sync for RawSlice<T> {}

impl<T: Copy> RawSlice<T> {
    pub fn new(slice: &[T]) -> Self {
        Self {
            ptr: slice.as_ptr(),
            len: slice.len(),
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn get(&self, index: usize) -> T {
        debug_assert!(index < self.len);
        unsafe { *self.ptr.add(index) }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }
}

/// Mutable counterpart for the framebuffer and aux buffer. Workers write
/// disjoint scanline ranges, so concurrent use needs no synchronization.
pub struct RawSliceMut<T> {
    ptr: *mut T,
    len: usize,
    _marker: PhantomData<T>,
}

unsafe impl<T: Sync> Send for RawSliceMut<T> {}
unsafe impl<T: Sync> Sync for RawSliceMut<T> {}

impl<T: Copy> RawSliceMut<T> {
    pub fn new(slice: &mut [T]) -> Self {
        Self {
            ptr: slice.as_mut_ptr(),
            len: slice.len(),
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn get(&self, index: usize) -> T {
        debug_assert!(index < self.len);
        unsafe { *self.ptr.add(index) }
    }

    #[inline]
    pub fn set(&self, index: usize, value: T) {
        debug_assert!(index < self.len);
        unsafe { *self.ptr.add(index) = value }
    }
}

/// Per pixel skip and output counters. One block per worker, padded to
/// its own cache line.
#[repr(align(64))]
#[derive(Copy, Clone, Default, Debug, PartialEq, Eq)]
pub struct PixelStats {
    pub pixels_in: u32,
    pub pixels_out: u32,
    pub chroma_fail: u32,
    pub zfunc_fail: u32,
    pub afunc_fail: u32,
    pub stipple_count: u32,
}

impl PixelStats {
    pub fn merge(&mut self, other: &PixelStats) {
        self.pixels_in = self.pixels_in.wrapping_add(other.pixels_in);
        self.pixels_out = self.pixels_out.wrapping_add(other.pixels_out);
        self.chroma_fail = self.chroma_fail.wrapping_add(other.chroma_fail);
        self.zfunc_fail = self.zfunc_fail.wrapping_add(other.zfunc_fail);
        self.afunc_fail = self.afunc_fail.wrapping_add(other.afunc_fail);
        self.stipple_count = self.stipple_count.wrapping_add(other.stipple_count);
    }
}

/// One clipped scanline extent; `cum` is the number of covered pixels on
/// the scanlines before this one (used to map work units to spans).
#[derive(Copy, Clone, Debug)]
pub struct Span {
    pub y: i32,
    pub startx: i32,
    pub stopx: i32,
    pub cum: u32,
}

/// Per TMU snapshot for one in-flight triangle.
pub struct TmuJob {
    pub texmode: TextureMode,
    pub lookup: RawSlice<u32>,
    pub ram: RawSlice<u8>,
    pub mask: u32,
    pub wmask: u32,
    pub hmask: u32,
    pub lodmin: i32,
    pub lodmax: i32,
    pub lodbias: i32,
    pub lodbase: i32,
    pub lodmask: u32,
    pub lodoffset: [u32; 9],
    pub detailmax: i32,
    pub detailbias: i32,
    pub detailscale: u32,
    pub format: u32,
    pub starts: i64,
    pub startt: i64,
    pub startw: i64,
    pub dsdx: i64,
    pub dtdx: i64,
    pub dwdx: i64,
    pub dsdy: i64,
    pub dtdy: i64,
    pub dwdy: i64,
}

/// Scanline routine chosen once per triangle. The generic path consults
/// every mode flag per pixel; common register combinations get a
/// specialized loop instead.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RasterVariant {
    Generic,
    /// untextured opaque iterated color, color writes only
    GouraudFill,
}

impl RasterVariant {
    /// Detected at setup from the register snapshot; state changes mark
    /// the snapshot dirty, so this runs only when modes changed.
    pub fn select(
        fbzmode: FbzMode,
        fbzcp: FbzColorPath,
        alphamode: AlphaMode,
        fogmode: FogMode,
    ) -> Self {
        let plain = !fbzmode.enable_stipple()
            && !fbzmode.enable_chromakey()
            && !fbzmode.enable_alpha_mask()
            && !fbzmode.enable_depthbuf()
            && !fbzmode.enable_dithering()
            && fbzmode.rgb_buffer_mask()
            && !fbzmode.aux_buffer_mask()
            && !alphamode.alphatest()
            && !alphamode.alphablend()
            && !fogmode.enable_fog();
        // passthrough iterated color: every combine stage at its default
        let passthrough = fbzcp.0 & 0x0fff_ffff == 0;
        if plain && passthrough {
            RasterVariant::GouraudFill
        } else {
            RasterVariant::Generic
        }
    }
}

/// Everything a worker needs to rasterize its share of one triangle:
/// mode register snapshot, gradients, span list and destination views.
pub struct TriangleJob {
    pub fb: RawSliceMut<u16>,
    pub dest_offs: usize,
    pub aux_offs: usize,
    pub rowpixels: i32,
    pub height: i32,

    pub fbzmode: FbzMode,
    pub fbzcp: FbzColorPath,
    pub alphamode: AlphaMode,
    pub fogmode: FogMode,
    pub zacolor: u32,
    pub stipple: u32,
    pub color0: Argb,
    pub color1: Argb,
    pub chromakey: Argb,
    pub chromarange: ChromaRange,
    pub fogcolor: Argb,
    pub fogblend: [u8; 64],
    pub fogdelta: [u8; 64],
    pub tables: Arc<SharedTables>,

    /// top vertex position in 12.4
    pub ax: i32,
    pub ay: i32,
    pub startr: i32,
    pub startg: i32,
    pub startb: i32,
    pub starta: i32,
    pub startz: i32,
    pub startw: i64,
    pub drdx: i32,
    pub dgdx: i32,
    pub dbdx: i32,
    pub dadx: i32,
    pub dzdx: i32,
    pub dwdx: i64,
    pub drdy: i32,
    pub dgdy: i32,
    pub dbdy: i32,
    pub dady: i32,
    pub dzdy: i32,
    pub dwdy: i64,

    pub tmu: [Option<TmuJob>; 2],

    pub variant: RasterVariant,
    pub spans: Vec<Span>,
    pub total_pixels: u32,
    pub units: u32,
    /// next work unit to claim. Lives in the job, not the pool, so a
    /// worker still draining a previous job cannot steal units from the
    /// one currently in flight.
    pub next_unit: AtomicU32,
}

impl TriangleJob {
    /// Claims the next unclaimed work unit, if any remain.
    pub fn claim_unit(&self) -> Option<u32> {
        let unit = self.next_unit.fetch_add(1, Ordering::AcqRel);
        (unit < self.units).then_some(unit)
    }

    /// Rasterizes the spans belonging to work unit `unit`: those whose
    /// first pixel index falls inside the unit's share of the total.
    pub fn rasterize_unit(&self, unit: u32, stats: &mut PixelStats) {
        let lo = (self.total_pixels as u64 * unit as u64 / self.units as u64) as u32;
        let hi = (self.total_pixels as u64 * (unit as u64 + 1) / self.units as u64) as u32;
        // spans are cum-sorted; a binary search would also do, but span
        // lists are short enough that the scan never shows up in profiles
        for span in &self.spans {
            if span.cum >= hi {
                break;
            }
            if span.cum >= lo {
                pipeline::shade_span(self, span, stats);
            }
        }
    }

    pub fn rasterize_all(&self, stats: &mut PixelStats) {
        for span in &self.spans {
            pipeline::shade_span(self, span, stats);
        }
    }
}

/// One vertex after layout unpacking: window coordinates plus the
/// attributes the pipeline iterates. `oow` is 1/w; per TMU coordinates
/// are already multiplied by their 1/w.
#[derive(Copy, Clone, Debug, Default)]
pub struct SetupVertex {
    pub x: f32,
    pub y: f32,
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
    pub z: f32,
    pub oow: f32,
    pub tmu: [TmuVertex; 2],
}

#[derive(Copy, Clone, Debug, Default)]
pub struct TmuVertex {
    pub sow: f32,
    pub tow: f32,
    pub oow: f32,
}

#[inline]
fn to_fixed4(v: f32) -> i32 {
    (v * 16.0) as i32
}

/// X of the edge (x0,y0)-(x1,y1) at scanline center `fy`, all in 12.4.
#[inline]
fn edge_x(x0: i32, y0: i32, x1: i32, y1: i32, fy: i32) -> i32 {
    (x0 as i64 + ((fy - y0) as i64 * (x1 - x0) as i64) / (y1 - y0) as i64) as i32
}

struct Gradient {
    start: f64,
    ddx: f64,
    ddy: f64,
}

/// Plane gradient through three vertices sharing one inverse area.
fn gradient(a: [f64; 3], dx1: f64, dx2: f64, dy1: f64, dy2: f64, divisor: f64) -> Gradient {
    Gradient {
        start: a[0],
        ddx: ((a[0] - a[1]) * dx1 - (a[0] - a[2]) * dx2) * divisor,
        ddy: ((a[0] - a[2]) * dy1 - (a[0] - a[1]) * dy2) * divisor,
    }
}

impl Gradient {
    fn scaled_i32(&self, scale: f64) -> (i32, i32, i32) {
        (
            (self.start * scale) as i32,
            (self.ddx * scale) as i32,
            (self.ddy * scale) as i32,
        )
    }

    fn scaled_i64(&self, scale: f64) -> (i64, i64, i64) {
        (
            (self.start * scale) as i64,
            (self.ddx * scale) as i64,
            (self.ddy * scale) as i64,
        )
    }
}

impl VoodooState {
    /// The active clip window: screen bounds intersected with the clip
    /// registers when clipping is enabled.
    pub fn clip_window(&self) -> (i32, i32, i32, i32) {
        let mut left = 0;
        let mut right = self.fbi.width as i32;
        let mut top = 0;
        let mut bottom = self.fbi.height as i32;
        if FbzMode(self.regs.read(reg::FBZ_MODE)).enable_clipping() {
            let (cl, cr) = clip_bounds(self.regs.read(reg::CLIP_LEFT_RIGHT));
            let (ct, cb) = clip_bounds(self.regs.read(reg::CLIP_LOWY_HIGHY));
            left = left.max(cl);
            right = right.min(cr);
            top = top.max(ct);
            bottom = bottom.min(cb);
        }
        (left, right, top, bottom)
    }

    /// Full triangle path: cull, clip reject, gradient setup, edge walk
    /// and dispatch. Setup failures drop the triangle silently and count
    /// it as rejected.
    pub fn draw_triangle(&mut self, vin: &[SetupVertex; 3]) {
        self.stats.triangles_in += 1;

        let mut v = *vin;
        for vert in v.iter_mut() {
            vert.x += self.fbi.viewport.0;
            vert.y += self.fbi.viewport.1;
        }

        // signed area in the application's winding, before sorting
        let area = (v[1].x - v[0].x) as f64 * (v[2].y - v[0].y) as f64
            - (v[2].x - v[0].x) as f64 * (v[1].y - v[0].y) as f64;
        if area == 0.0 {
            self.stats.degenerate += 1;
            return;
        }

        let fbzmode = FbzMode(self.regs.read(reg::FBZ_MODE));
        let area_negative = (area < 0.0) ^ fbzmode.y_origin_lower_left();
        match self.fbi.cull_mode {
            CullMode::Disable => {}
            CullMode::Negative => {
                if area_negative {
                    self.stats.culled += 1;
                    return;
                }
            }
            CullMode::Positive => {
                if !area_negative {
                    self.stats.culled += 1;
                    return;
                }
            }
        }

        // sort by window y so vertex a is the top one
        v.sort_by(|l, r| l.y.total_cmp(&r.y));

        let (ax, ay) = (to_fixed4(v[0].x), to_fixed4(v[0].y));
        let (bx, by) = (to_fixed4(v[1].x), to_fixed4(v[1].y));
        let (cx, cy) = (to_fixed4(v[2].x), to_fixed4(v[2].y));
        if ay == cy {
            self.stats.degenerate += 1;
            return;
        }

        // quick reject on the bounding box
        let (clip_l, clip_r, clip_t, clip_b) = self.clip_window();
        let minx = (ax.min(bx).min(cx) + 7) >> 4;
        let maxx = (ax.max(bx).max(cx) + 7) >> 4;
        let miny = (ay + 7) >> 4;
        let maxy = (cy + 7) >> 4;
        if maxx <= clip_l || minx >= clip_r || maxy <= clip_t || miny >= clip_b {
            self.stats.clip_rejected += 1;
            return;
        }

        // one shared inverse area for every parameter plane
        let (x0, y0) = (v[0].x as f64, v[0].y as f64);
        let (x1, y1) = (v[1].x as f64, v[1].y as f64);
        let (x2, y2) = (v[2].x as f64, v[2].y as f64);
        let divisor = 1.0 / ((x0 - x1) * (y0 - y2) - (x0 - x2) * (y0 - y1));
        let dx1 = y0 - y2;
        let dx2 = y0 - y1;
        let dy1 = x0 - x1;
        let dy2 = x0 - x2;
        let plane = |a: [f64; 3]| gradient(a, dx1, dx2, dy1, dy2, divisor);

        const COLOR_SCALE: f64 = 4096.0;
        const Z_SCALE: f64 = 4096.0;
        const W_SCALE: f64 = 281_474_976_710_656.0; // 2^48
        const ST_SCALE: f64 = 262_144.0; // 2^18

        let (startr, drdx, drdy) =
            plane([v[0].r as f64, v[1].r as f64, v[2].r as f64]).scaled_i32(COLOR_SCALE);
        let (startg, dgdx, dgdy) =
            plane([v[0].g as f64, v[1].g as f64, v[2].g as f64]).scaled_i32(COLOR_SCALE);
        let (startb, dbdx, dbdy) =
            plane([v[0].b as f64, v[1].b as f64, v[2].b as f64]).scaled_i32(COLOR_SCALE);
        let (starta, dadx, dady) =
            plane([v[0].a as f64, v[1].a as f64, v[2].a as f64]).scaled_i32(COLOR_SCALE);
        let (startz, dzdx, dzdy) =
            plane([v[0].z as f64, v[1].z as f64, v[2].z as f64]).scaled_i32(Z_SCALE);
        let (startw, dwdx, dwdy) =
            plane([v[0].oow as f64, v[1].oow as f64, v[2].oow as f64]).scaled_i64(W_SCALE);

        // per TMU iterators and the lazy parameter recompute
        let fbzcp = FbzColorPath(self.regs.read(reg::FBZ_COLOR_PATH));
        let mut tmu_jobs: [Option<TmuJob>; 2] = [None, None];
        if fbzcp.enable_texture() {
            for i in 0..self.num_tmus {
                let (s, t, w) = (
                    plane([
                        v[0].tmu[i].sow as f64,
                        v[1].tmu[i].sow as f64,
                        v[2].tmu[i].sow as f64,
                    ]),
                    plane([
                        v[0].tmu[i].tow as f64,
                        v[1].tmu[i].tow as f64,
                        v[2].tmu[i].tow as f64,
                    ]),
                    plane([
                        v[0].tmu[i].oow as f64,
                        v[1].tmu[i].oow as f64,
                        v[2].tmu[i].oow as f64,
                    ]),
                );
                let (starts, dsdx, dsdy) = s.scaled_i64(ST_SCALE);
                let (startt, dtdx, dtdy) = t.scaled_i64(ST_SCALE);
                let (starttw, dtwdx, dtwdy) = w.scaled_i64(W_SCALE);

                let tmu = &mut self.tmu[i];
                tmu.starts = starts;
                tmu.startt = startt;
                tmu.startw = starttw;
                tmu.dsdx = dsdx;
                tmu.dtdx = dtdx;
                tmu.dwdx = dtwdx;
                tmu.dsdy = dsdy;
                tmu.dtdy = dtdy;
                tmu.dwdy = dtwdy;
                if tmu.regdirty {
                    tmu.recompute();
                }

                // LOD base from the texel gradient magnitude
                let texdx = (dsdx >> 14) * (dsdx >> 14) + (dtdx >> 14) * (dtdx >> 14);
                let texdy = (dsdy >> 14) * (dsdy >> 14) + (dtdy >> 14) * (dtdy >> 14);
                let (_, log) = fast_reciplog(texdx.max(texdy));
                tmu.lodbase = ((40 << 8) - log) / 2;

                tmu_jobs[i] = Some(TmuJob {
                    texmode: tmu.texture_mode(),
                    lookup: RawSlice::new(tmu.lookup_table(&self.tables)),
                    ram: RawSlice::new(&tmu.ram),
                    mask: tmu.mask as u32,
                    wmask: tmu.wmask,
                    hmask: tmu.hmask,
                    lodmin: tmu.lodmin,
                    lodmax: tmu.lodmax.min(8 << 8),
                    lodbias: tmu.lodbias,
                    lodbase: tmu.lodbase,
                    lodmask: tmu.lodmask,
                    lodoffset: tmu.lodoffset,
                    detailmax: tmu.detailmax,
                    detailbias: tmu.detailbias,
                    detailscale: tmu.detailscale,
                    format: tmu.format,
                    starts,
                    startt,
                    startw: starttw,
                    dsdx,
                    dtdx,
                    dwdx: dtwdx,
                    dsdy,
                    dtdy,
                    dwdy: dtwdy,
                });
            }
        }

        // walk the edges into clipped spans
        let starty = ((ay + 7) >> 4).max(clip_t);
        let stopy = ((cy + 7) >> 4).min(clip_b);
        let mut spans = Vec::with_capacity((stopy - starty).max(0) as usize);
        let mut total: u32 = 0;
        for y in starty..stopy {
            let fy = (y << 4) + 8;
            if fy < ay || fy >= cy {
                continue;
            }
            let xl = edge_x(ax, ay, cx, cy, fy);
            let xr = if fy < by {
                edge_x(ax, ay, bx, by, fy)
            } else {
                edge_x(bx, by, cx, cy, fy)
            };
            let (lo, hi) = if xl <= xr { (xl, xr) } else { (xr, xl) };
            let startx = ((lo + 7) >> 4).max(clip_l);
            let stopx = ((hi + 7) >> 4).min(clip_r);
            if startx < stopx {
                spans.push(Span {
                    y,
                    startx,
                    stopx,
                    cum: total,
                });
                total += (stopx - startx) as u32;
            }
        }
        if total == 0 {
            self.stats.clip_rejected += 1;
            return;
        }

        let units = (self.pool_units() as u32).max(1);
        let alphamode = AlphaMode(self.regs.read(reg::ALPHA_MODE));
        let fogmode = FogMode(self.regs.read(reg::FOG_MODE));
        let variant = RasterVariant::select(fbzmode, fbzcp, alphamode, fogmode);
        let job = TriangleJob {
            fb: RawSliceMut::new(&mut self.fbi.fb),
            dest_offs: self.fbi.rgboffs[self.fbi.backbuf],
            aux_offs: self.fbi.auxoffs,
            rowpixels: self.fbi.rowpixels as i32,
            height: self.fbi.height as i32,
            fbzmode,
            fbzcp,
            alphamode,
            fogmode,
            zacolor: self.regs.read(reg::ZA_COLOR),
            stipple: self.regs.read(reg::STIPPLE),
            color0: Argb(self.regs.read(reg::COLOR0)),
            color1: Argb(self.regs.read(reg::COLOR1)),
            chromakey: Argb(self.regs.read(reg::CHROMA_KEY)),
            chromarange: ChromaRange(self.regs.read(reg::CHROMA_RANGE)),
            fogcolor: Argb(self.regs.read(reg::FOG_COLOR)),
            fogblend: self.fbi.fogblend,
            fogdelta: self.fbi.fogdelta,
            tables: Arc::clone(&self.tables),
            ax,
            ay,
            startr,
            startg,
            startb,
            starta,
            startz,
            startw,
            drdx,
            dgdx,
            dbdx,
            dadx,
            dzdx,
            dwdx,
            drdy,
            dgdy,
            dbdy,
            dady,
            dzdy,
            dwdy,
            tmu: tmu_jobs,
            variant,
            spans,
            total_pixels: total,
            units,
            next_unit: AtomicU32::new(0),
        };

        debug!(
            pixels = total,
            spans = job.spans.len(),
            threaded = total >= THREAD_THRESHOLD && self.pool.is_some(),
            "triangle"
        );
        self.dispatch(job);
        self.stats.triangles_out += 1;
    }

    fn pool_units(&self) -> usize {
        match &self.pool {
            Some(pool) => (pool.workers() + 1) * 4,
            None => 1,
        }
    }

    fn dispatch(&mut self, job: TriangleJob) {
        let mut stats = PixelStats::default();
        if job.total_pixels >= THREAD_THRESHOLD {
            if let Some(pool) = &self.pool {
                let job = Arc::new(job);
                pool.dispatch(&job, &mut stats);
                self.merge_stats(&stats);
                return;
            }
        }
        job.rasterize_all(&mut stats);
        self.merge_stats(&stats);
    }

    /// Line rasterization reuses the triangle pipeline with gradients
    /// projected onto the line direction; each covered pixel becomes a
    /// one pixel span.
    pub fn draw_line(&mut self, vin: &[SetupVertex; 2]) {
        let mut v = *vin;
        for vert in v.iter_mut() {
            vert.x += self.fbi.viewport.0;
            vert.y += self.fbi.viewport.1;
        }
        let dxl = (v[1].x - v[0].x) as f64;
        let dyl = (v[1].y - v[0].y) as f64;
        let len2 = dxl * dxl + dyl * dyl;
        if len2 == 0.0 {
            self.draw_point_at(v[0]);
            return;
        }

        let (clip_l, clip_r, clip_t, clip_b) = self.clip_window();
        let x0 = ((to_fixed4(v[0].x) + 7) >> 4).clamp(-4096, 4096);
        let y0 = ((to_fixed4(v[0].y) + 7) >> 4).clamp(-4096, 4096);
        let x1 = ((to_fixed4(v[1].x) + 7) >> 4).clamp(-4096, 4096);
        let y1 = ((to_fixed4(v[1].y) + 7) >> 4).clamp(-4096, 4096);
        let steps = (x1 - x0).abs().max((y1 - y0).abs());
        let mut spans = Vec::with_capacity(steps as usize + 1);
        let mut total = 0u32;
        let mut last = None;
        for i in 0..=steps {
            let x = x0 + if steps == 0 { 0 } else { (x1 - x0) * i / steps };
            let y = y0 + if steps == 0 { 0 } else { (y1 - y0) * i / steps };
            if last == Some((x, y)) {
                continue;
            }
            last = Some((x, y));
            if x < clip_l || x >= clip_r || y < clip_t || y >= clip_b {
                continue;
            }
            spans.push(Span {
                y,
                startx: x,
                stopx: x + 1,
                cum: total,
            });
            total += 1;
        }
        if total == 0 {
            self.stats.clip_rejected += 1;
            return;
        }

        let line_grad = move |a0: f64, a1: f64| Gradient {
            start: a0,
            ddx: (a1 - a0) * dxl / len2,
            ddy: (a1 - a0) * dyl / len2,
        };
        self.emit_degenerate(v[0], v[1], total, spans, &line_grad);
    }

    pub fn draw_point(&mut self, vin: &SetupVertex) {
        let mut v = *vin;
        v.x += self.fbi.viewport.0;
        v.y += self.fbi.viewport.1;
        self.draw_point_at(v);
    }

    fn draw_point_at(&mut self, v: SetupVertex) {
        let (clip_l, clip_r, clip_t, clip_b) = self.clip_window();
        let x = (to_fixed4(v.x) + 7) >> 4;
        let y = (to_fixed4(v.y) + 7) >> 4;
        if x < clip_l || x >= clip_r || y < clip_t || y >= clip_b {
            self.stats.clip_rejected += 1;
            return;
        }
        let spans = vec![Span {
            y,
            startx: x,
            stopx: x + 1,
            cum: 0,
        }];
        let flat = |a0: f64, _a1: f64| Gradient {
            start: a0,
            ddx: 0.0,
            ddy: 0.0,
        };
        self.emit_degenerate(v, v, 1, spans, &flat);
    }

    /// Shared tail of the line/point paths: builds a job whose gradients
    /// come from `grad` and whose pixel pipeline is the triangle one.
    fn emit_degenerate(
        &mut self,
        v0: SetupVertex,
        v1: SetupVertex,
        total: u32,
        spans: Vec<Span>,
        grad: &dyn Fn(f64, f64) -> Gradient,
    ) {
        const COLOR_SCALE: f64 = 4096.0;
        const W_SCALE: f64 = 281_474_976_710_656.0;
        const ST_SCALE: f64 = 262_144.0;

        let fbzcp = FbzColorPath(self.regs.read(reg::FBZ_COLOR_PATH));
        let fbzmode = FbzMode(self.regs.read(reg::FBZ_MODE));

        let (startr, drdx, drdy) = grad(v0.r as f64, v1.r as f64).scaled_i32(COLOR_SCALE);
        let (startg, dgdx, dgdy) = grad(v0.g as f64, v1.g as f64).scaled_i32(COLOR_SCALE);
        let (startb, dbdx, dbdy) = grad(v0.b as f64, v1.b as f64).scaled_i32(COLOR_SCALE);
        let (starta, dadx, dady) = grad(v0.a as f64, v1.a as f64).scaled_i32(COLOR_SCALE);
        let (startz, dzdx, dzdy) = grad(v0.z as f64, v1.z as f64).scaled_i32(COLOR_SCALE);
        let (startw, dwdx, dwdy) = grad(v0.oow as f64, v1.oow as f64).scaled_i64(W_SCALE);

        let mut tmu_jobs: [Option<TmuJob>; 2] = [None, None];
        if fbzcp.enable_texture() {
            for i in 0..self.num_tmus {
                let (starts, dsdx, dsdy) =
                    grad(v0.tmu[i].sow as f64, v1.tmu[i].sow as f64).scaled_i64(ST_SCALE);
                let (startt, dtdx, dtdy) =
                    grad(v0.tmu[i].tow as f64, v1.tmu[i].tow as f64).scaled_i64(ST_SCALE);
                let (starttw, dtwdx, dtwdy) =
                    grad(v0.tmu[i].oow as f64, v1.tmu[i].oow as f64).scaled_i64(W_SCALE);
                let tmu = &mut self.tmu[i];
                if tmu.regdirty {
                    tmu.recompute();
                }
                let texdx = (dsdx >> 14) * (dsdx >> 14) + (dtdx >> 14) * (dtdx >> 14);
                let texdy = (dsdy >> 14) * (dsdy >> 14) + (dtdy >> 14) * (dtdy >> 14);
                let (_, log) = fast_reciplog(texdx.max(texdy));
                tmu.lodbase = ((40 << 8) - log) / 2;
                tmu_jobs[i] = Some(TmuJob {
                    texmode: tmu.texture_mode(),
                    lookup: RawSlice::new(tmu.lookup_table(&self.tables)),
                    ram: RawSlice::new(&tmu.ram),
                    mask: tmu.mask as u32,
                    wmask: tmu.wmask,
                    hmask: tmu.hmask,
                    lodmin: tmu.lodmin,
                    lodmax: tmu.lodmax.min(8 << 8),
                    lodbias: tmu.lodbias,
                    lodbase: tmu.lodbase,
                    lodmask: tmu.lodmask,
                    lodoffset: tmu.lodoffset,
                    detailmax: tmu.detailmax,
                    detailbias: tmu.detailbias,
                    detailscale: tmu.detailscale,
                    format: tmu.format,
                    starts,
                    startt,
                    startw: starttw,
                    dsdx,
                    dtdx,
                    dwdx: dtwdx,
                    dsdy,
                    dtdy,
                    dwdy: dtwdy,
                });
            }
        }

        let ax = to_fixed4(v0.x);
        let ay = to_fixed4(v0.y);
        let alphamode = AlphaMode(self.regs.read(reg::ALPHA_MODE));
        let fogmode = FogMode(self.regs.read(reg::FOG_MODE));
        let variant = RasterVariant::select(fbzmode, fbzcp, alphamode, fogmode);
        let job = TriangleJob {
            fb: RawSliceMut::new(&mut self.fbi.fb),
            dest_offs: self.fbi.rgboffs[self.fbi.backbuf],
            aux_offs: self.fbi.auxoffs,
            rowpixels: self.fbi.rowpixels as i32,
            height: self.fbi.height as i32,
            fbzmode,
            fbzcp,
            alphamode,
            fogmode,
            zacolor: self.regs.read(reg::ZA_COLOR),
            stipple: self.regs.read(reg::STIPPLE),
            color0: Argb(self.regs.read(reg::COLOR0)),
            color1: Argb(self.regs.read(reg::COLOR1)),
            chromakey: Argb(self.regs.read(reg::CHROMA_KEY)),
            chromarange: ChromaRange(self.regs.read(reg::CHROMA_RANGE)),
            fogcolor: Argb(self.regs.read(reg::FOG_COLOR)),
            fogblend: self.fbi.fogblend,
            fogdelta: self.fbi.fogdelta,
            tables: Arc::clone(&self.tables),
            ax,
            ay,
            startr,
            startg,
            startb,
            starta,
            startz,
            startw,
            drdx,
            dgdx,
            dbdx,
            dadx,
            dzdx,
            dwdx,
            drdy,
            dgdy,
            dbdy,
            dady,
            dzdy,
            dwdy,
            tmu: tmu_jobs,
            variant,
            spans,
            total_pixels: total,
            units: 1,
            next_unit: AtomicU32::new(0),
        };
        let mut stats = PixelStats::default();
        job.rasterize_all(&mut stats);
        self.merge_stats(&stats);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vert(x: f32, y: f32, r: f32, g: f32, b: f32) -> SetupVertex {
        SetupVertex {
            x,
            y,
            r,
            g,
            b,
            a: 255.0,
            z: 0.0,
            oow: 1.0,
            ..Default::default()
        }
    }

    #[test]
    fn variant_selection_prefers_the_fast_path() {
        let plain = FbzMode(FbzMode::RGB_BUFFER_MASK.set(0, 1));
        assert_eq!(
            RasterVariant::select(plain, FbzColorPath(0), AlphaMode(0), FogMode(0)),
            RasterVariant::GouraudFill
        );
        // any active pipeline stage falls back to the generic loop
        let dithered = FbzMode(FbzMode::ENABLE_DITHERING.set(plain.0, 1));
        assert_eq!(
            RasterVariant::select(dithered, FbzColorPath(0), AlphaMode(0), FogMode(0)),
            RasterVariant::Generic
        );
        let textured = FbzColorPath(FbzColorPath::ENABLE_TEXTURE.set(0, 1));
        assert_eq!(
            RasterVariant::select(plain, textured, AlphaMode(0), FogMode(0)),
            RasterVariant::Generic
        );
        let blended = AlphaMode(AlphaMode::ALPHABLEND.set(0, 1));
        assert_eq!(
            RasterVariant::select(plain, FbzColorPath(0), blended, FogMode(0)),
            RasterVariant::Generic
        );
    }

    #[test]
    fn flat_triangle_covers_and_counts() {
        let mut v = VoodooState::new(64, 64, 2, 1, 0).unwrap();
        v.draw_triangle(&[
            vert(10.0, 10.0, 255.0, 0.0, 0.0),
            vert(50.0, 10.0, 255.0, 0.0, 0.0),
            vert(10.0, 50.0, 255.0, 0.0, 0.0),
        ]);
        assert_eq!(v.stats.triangles_out, 1);
        assert!(v.stats.pixels_in > 0);
        assert_eq!(v.stats.pixels_in, v.stats.pixels_out);
        let back = v.fbi.rgboffs[v.fbi.backbuf];
        assert_eq!(v.fbi.fb[back + 11 * 64 + 11], 0xf800);
        // beyond the hypotenuse nothing is touched
        assert_eq!(v.fbi.fb[back + 11 * 64 + 60], 0x0000);
    }

    #[test]
    fn cull_mode_drops_by_winding() {
        let mut v = VoodooState::new(64, 64, 2, 1, 0).unwrap();
        v.fbi.cull_mode = CullMode::Positive;
        let a = vert(10.0, 10.0, 255.0, 255.0, 255.0);
        let b = vert(50.0, 10.0, 255.0, 255.0, 255.0);
        let c = vert(10.0, 50.0, 255.0, 255.0, 255.0);
        v.draw_triangle(&[a, b, c]);
        assert_eq!(v.stats.culled, 1);
        assert_eq!(v.stats.triangles_out, 0);
        // reversed winding survives
        v.draw_triangle(&[a, c, b]);
        assert_eq!(v.stats.culled, 1);
        assert_eq!(v.stats.triangles_out, 1);
    }

    #[test]
    fn bounding_box_outside_the_clip_window_is_rejected() {
        let mut v = VoodooState::new(64, 64, 2, 1, 0).unwrap();
        v.regs
            .write_field(reg::FBZ_MODE, FbzMode::ENABLE_CLIPPING, 1);
        v.regs.write(reg::CLIP_LEFT_RIGHT, 32);
        v.regs.write(reg::CLIP_LOWY_HIGHY, 32);
        v.draw_triangle(&[
            vert(40.0, 40.0, 255.0, 0.0, 0.0),
            vert(60.0, 40.0, 255.0, 0.0, 0.0),
            vert(50.0, 60.0, 255.0, 0.0, 0.0),
        ]);
        assert_eq!(v.stats.clip_rejected, 1);
        assert_eq!(v.stats.pixels_in, 0);
    }

    #[test]
    fn lines_and_points_write_single_pixel_spans() {
        let mut v = VoodooState::new(64, 64, 2, 1, 0).unwrap();
        let back = v.fbi.rgboffs[v.fbi.backbuf];
        v.draw_point(&vert(5.0, 5.0, 0.0, 255.0, 0.0));
        assert_eq!(v.fbi.fb[back + 5 * 64 + 5], 0x07e0);

        v.draw_line(&[
            vert(0.0, 9.0, 0.0, 0.0, 255.0),
            vert(9.0, 9.0, 0.0, 0.0, 255.0),
        ]);
        for x in 0..=9 {
            assert_eq!(v.fbi.fb[back + 9 * 64 + x], 0x001f, "line pixel {x}");
        }
        assert_eq!(v.fbi.fb[back + 9 * 64 + 10], 0x0000);
    }
}
