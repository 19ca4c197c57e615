pub mod lfb;
pub mod state;
pub mod texture;
pub mod vertex;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tracing::{info, warn};

use crate::config::RvConfig;
use crate::core::voodoo::{RenderStats, VoodooState};
use crate::renderer::DisplaySink;

/*
Glide 3.x entry points. The API is single threaded from the
application's point of view: every call retrieves the one process-wide
context and operates on it. State calls translate enums into register
bits; draw calls go through the rasterizer; swap hands the front buffer
to the display sink.
 */

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GlideError {
    NotInitialized,
    AlreadyOpen,
    BadParameter(&'static str),
    Resource(String),
}

impl fmt::Display for GlideError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GlideError::NotInitialized => write!(f, "grGlideInit has not been called"),
            GlideError::AlreadyOpen => write!(f, "a context is already open"),
            GlideError::BadParameter(what) => write!(f, "bad parameter: {what}"),
            GlideError::Resource(what) => write!(f, "resource failure: {what}"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GrScreenResolution {
    R320x200,
    R320x240,
    R400x256,
    R512x384,
    R640x200,
    R640x350,
    R640x400,
    R640x480,
    R800x600,
}

impl GrScreenResolution {
    pub fn dimensions(self) -> (usize, usize) {
        match self {
            GrScreenResolution::R320x200 => (320, 200),
            GrScreenResolution::R320x240 => (320, 240),
            GrScreenResolution::R400x256 => (400, 256),
            GrScreenResolution::R512x384 => (512, 384),
            GrScreenResolution::R640x200 => (640, 200),
            GrScreenResolution::R640x350 => (640, 350),
            GrScreenResolution::R640x400 => (640, 400),
            GrScreenResolution::R640x480 => (640, 480),
            GrScreenResolution::R800x600 => (800, 600),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GrScreenRefresh {
    R60Hz,
    R70Hz,
    R72Hz,
    R75Hz,
    R85Hz,
    R120Hz,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum GrColorFormat {
    #[default]
    Argb,
    Abgr,
    Rgba,
    Bgra,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum GrOriginLocation {
    #[default]
    UpperLeft,
    LowerLeft,
    Any,
}

/// Synthesized hardware descriptor for the query calls.
#[derive(Copy, Clone, Debug)]
pub struct GrHwConfiguration {
    pub num_boards: u32,
    pub is_voodoo2: bool,
    pub num_tmus: u32,
    pub fb_ram_mb: u32,
    pub tmu_ram_mb: u32,
}

pub struct GlideContext {
    pub voodoo: VoodooState,
    pub sink: Box<dyn DisplaySink>,
    pub layout: vertex::VertexLayout,
    pub lfb: lfb::LfbState,
    pub color_format: GrColorFormat,
    pub origin: GrOriginLocation,
    pub refresh: GrScreenRefresh,
    pub num_aux_bufs: usize,
    pub depth_mask: bool,
    pub alpha_mask: bool,
    pub tex_mipmap_disable: [bool; 2],
}

impl GlideContext {
    /// Translates a GrColor in the configured color format into the
    /// internal ARGB order.
    pub fn color_to_argb(&self, color: u32) -> u32 {
        match self.color_format {
            GrColorFormat::Argb => color,
            GrColorFormat::Abgr => {
                (color & 0xff00_ff00) | ((color & 0xff) << 16) | ((color >> 16) & 0xff)
            }
            GrColorFormat::Rgba => color.rotate_right(8),
            GrColorFormat::Bgra => {
                let argb = color.rotate_right(8);
                (argb & 0xff00_ff00) | ((argb & 0xff) << 16) | ((argb >> 16) & 0xff)
            }
        }
    }
}

static INITIALIZED: AtomicBool = AtomicBool::new(false);
static CONTEXT: Mutex<Option<GlideContext>> = Mutex::new(None);

/// Runs `f` against the open context; returns None (and counts nothing)
/// when no context is open.
pub(crate) fn with_context<R>(f: impl FnOnce(&mut GlideContext) -> R) -> Option<R> {
    let mut guard = CONTEXT.lock().unwrap();
    guard.as_mut().map(f)
}

pub fn gr_glide_init() {
    INITIALIZED.store(true, Ordering::Release);
    info!("glide initialized");
}

pub fn gr_glide_shutdown() {
    let mut guard = CONTEXT.lock().unwrap();
    *guard = None;
    INITIALIZED.store(false, Ordering::Release);
    info!("glide shut down");
}

pub fn gr_glide_get_version() -> String {
    format!(
        "Glide Version 3.04 (r-voodoo {} {})",
        env!("CARGO_PKG_VERSION"),
        build_time::build_time_utc!("%Y-%m-%d")
    )
}

pub fn gr_sst_select(board: u32) -> bool {
    board == 0
}

pub fn gr_sst_query_boards() -> u32 {
    1
}

pub fn gr_sst_query_hardware() -> GrHwConfiguration {
    let num_tmus = with_context(|ctx| ctx.voodoo.num_tmus as u32).unwrap_or(1);
    GrHwConfiguration {
        num_boards: 1,
        is_voodoo2: num_tmus == 2,
        num_tmus,
        fb_ram_mb: 2,
        tmu_ram_mb: 2,
    }
}

#[allow(clippy::too_many_arguments)]
pub fn gr_sst_win_open(
    sink: Box<dyn DisplaySink>,
    resolution: GrScreenResolution,
    refresh: GrScreenRefresh,
    color_format: GrColorFormat,
    origin: GrOriginLocation,
    num_color_bufs: usize,
    num_aux_bufs: usize,
) -> Result<(), GlideError> {
    if !INITIALIZED.load(Ordering::Acquire) {
        return Err(GlideError::NotInitialized);
    }
    let mut guard = CONTEXT.lock().unwrap();
    if guard.is_some() {
        return Err(GlideError::AlreadyOpen);
    }
    if num_aux_bufs > 1 {
        return Err(GlideError::BadParameter("num_aux_bufs"));
    }

    let (width, height) = resolution.dimensions();
    let config = RvConfig::load();
    let threads = config.worker_threads();

    let mut sink = sink;
    if !sink.open(width, height) {
        return Err(GlideError::Resource("display sink refused window".into()));
    }

    let num_tmus = 2;
    let mut voodoo = VoodooState::new(width, height, num_color_bufs, num_tmus, threads)
        .map_err(GlideError::Resource)?;
    if origin == GrOriginLocation::LowerLeft {
        use crate::core::voodoo::regs::{reg, FbzMode};
        voodoo
            .regs
            .write_field(reg::FBZ_MODE, FbzMode::Y_ORIGIN, 1);
    }

    *guard = Some(GlideContext {
        voodoo,
        sink,
        layout: vertex::VertexLayout::default(),
        lfb: lfb::LfbState::default(),
        color_format,
        origin,
        refresh,
        num_aux_bufs,
        depth_mask: false,
        alpha_mask: false,
        tex_mipmap_disable: [false; 2],
    });
    info!(?resolution, ?refresh, ?color_format, ?origin, "win open");
    Ok(())
}

pub fn gr_sst_win_close() {
    let mut guard = CONTEXT.lock().unwrap();
    if guard.take().is_none() {
        warn!("grSstWinClose without an open context");
    }
}

pub fn gr_sst_screen_width() -> u32 {
    with_context(|ctx| ctx.voodoo.fbi.width as u32).unwrap_or(0)
}

pub fn gr_sst_screen_height() -> u32 {
    with_context(|ctx| ctx.voodoo.fbi.height as u32).unwrap_or(0)
}

/// Clears the draw buffer / aux buffer inside the clip window. `color`
/// is in the context's color format; `depth` fills the aux buffer
/// unless alpha planes are enabled, in which case `alpha` does.
pub fn gr_buffer_clear(color: u32, alpha: u8, depth: u16) {
    with_context(|ctx| {
        let argb = ctx.color_to_argb(color);
        ctx.voodoo.buffer_clear(argb, alpha, depth);
    });
}

/// Swaps and presents. The interval argument (vsync count) is accepted
/// for compatibility; the synchronous model presents immediately.
pub fn gr_buffer_swap(_swap_interval: u32) {
    with_context(|ctx| {
        ctx.voodoo.swap_buffers();
        let width = ctx.voodoo.fbi.width;
        let height = ctx.voodoo.fbi.height;
        let rowpixels = ctx.voodoo.fbi.rowpixels;
        let base = ctx.voodoo.fbi.rgboffs[ctx.voodoo.fbi.frontbuf];
        let pixels = &ctx.voodoo.fbi.fb[base..base + rowpixels * height];
        ctx.sink.present(pixels, width, height, rowpixels);
    });
}

pub fn gr_buffer_num_pending() -> u32 {
    // swaps complete synchronously
    0
}

pub fn gr_sst_idle() {}

pub fn gr_flush() {}

pub fn gr_finish() {}

/// Values readable through grGet.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GrGetName {
    BitsDepth,
    FogTableEntries,
    MaxTextureSize,
    MaxTextureAspectRatio,
    MemoryFb,
    MemoryTmu,
    NumBoards,
    NumFb,
    NumTmu,
    PendingBufferSwaps,
    WdepthMinMax,
    ZdepthMinMax,
    StatsPixelsIn,
    StatsPixelsOut,
    StatsPixelsChromaFail,
    StatsPixelsDepthFuncFail,
    StatsPixelsAfuncFail,
    StatsTrianglesIn,
    StatsTrianglesOut,
}

pub fn gr_get(name: GrGetName) -> Vec<u32> {
    match name {
        GrGetName::BitsDepth => vec![16],
        GrGetName::FogTableEntries => vec![64],
        GrGetName::MaxTextureSize => vec![256],
        GrGetName::MaxTextureAspectRatio => vec![3],
        GrGetName::NumBoards => vec![1],
        GrGetName::NumFb => vec![1],
        GrGetName::PendingBufferSwaps => vec![0],
        GrGetName::WdepthMinMax => vec![0, 0xffff],
        GrGetName::ZdepthMinMax => vec![0, 0xffff],
        GrGetName::NumTmu => {
            vec![with_context(|ctx| ctx.voodoo.num_tmus as u32).unwrap_or(0)]
        }
        GrGetName::MemoryFb => {
            vec![with_context(|ctx| (ctx.voodoo.fbi.fb.len() * 2) as u32).unwrap_or(0)]
        }
        GrGetName::MemoryTmu => vec![
            with_context(|ctx| (ctx.voodoo.tmu[0].ram.len() * ctx.voodoo.num_tmus) as u32)
                .unwrap_or(0),
        ],
        GrGetName::StatsPixelsIn => {
            vec![with_context(|ctx| ctx.voodoo.stats.pixels_in as u32).unwrap_or(0)]
        }
        GrGetName::StatsPixelsOut => {
            vec![with_context(|ctx| ctx.voodoo.stats.pixels_out as u32).unwrap_or(0)]
        }
        GrGetName::StatsPixelsChromaFail => {
            vec![with_context(|ctx| ctx.voodoo.stats.chroma_fail as u32).unwrap_or(0)]
        }
        GrGetName::StatsPixelsDepthFuncFail => {
            vec![with_context(|ctx| ctx.voodoo.stats.zfunc_fail as u32).unwrap_or(0)]
        }
        GrGetName::StatsPixelsAfuncFail => {
            vec![with_context(|ctx| ctx.voodoo.stats.afunc_fail as u32).unwrap_or(0)]
        }
        GrGetName::StatsTrianglesIn => {
            vec![with_context(|ctx| ctx.voodoo.stats.triangles_in as u32).unwrap_or(0)]
        }
        GrGetName::StatsTrianglesOut => {
            vec![with_context(|ctx| ctx.voodoo.stats.triangles_out as u32).unwrap_or(0)]
        }
    }
}

/// Full counter snapshot (supplementary diagnostics surface).
pub fn gr_render_stats() -> Option<RenderStats> {
    with_context(|ctx| ctx.voodoo.stats)
}

pub fn gr_reset_stats() {
    with_context(|ctx| ctx.voodoo.stats = RenderStats::default());
}
