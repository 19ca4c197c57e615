use tracing::{debug, warn};

use super::with_context;
use super::state::{GrCombineFactor, GrCombineFunction};
use crate::core::voodoo::regs::{reg, TexDetail, TexLod, TextureMode};
use crate::core::voodoo::tmu::{TEXADDR_MASK, TEXADDR_SHIFT, TMU_RAM_SIZE};

/*
Texture downloads and TMU state. Addresses are byte addresses into the
TMU's RAM; the mip chain layout must match what the sampler derives in
its recompute step, so both share the same size formulas here and
there: 256x256 at hardware LOD 0, narrowed by the aspect ratio, halved
per level, four texels minimum.
 */

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GrTextureFormat {
    Rgb332,
    Yiq422,
    Alpha8,
    Intensity8,
    AlphaIntensity44,
    P8,
    Argb8332,
    Ayiq8422,
    Rgb565,
    Argb1555,
    Argb4444,
    AlphaIntensity88,
    Ap88,
}

impl GrTextureFormat {
    pub(crate) fn code(self) -> u32 {
        match self {
            GrTextureFormat::Rgb332 => 0,
            GrTextureFormat::Yiq422 => 1,
            GrTextureFormat::Alpha8 => 2,
            GrTextureFormat::Intensity8 => 3,
            GrTextureFormat::AlphaIntensity44 => 4,
            GrTextureFormat::P8 => 5,
            GrTextureFormat::Argb8332 => 8,
            GrTextureFormat::Ayiq8422 => 9,
            GrTextureFormat::Rgb565 => 10,
            GrTextureFormat::Argb1555 => 11,
            GrTextureFormat::Argb4444 => 12,
            GrTextureFormat::AlphaIntensity88 => 13,
            GrTextureFormat::Ap88 => 14,
        }
    }

    fn bpp_shift(self) -> u32 {
        self.code() >> 3
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GrAspectRatio {
    Aspect8x1,
    Aspect4x1,
    Aspect2x1,
    Aspect1x1,
    Aspect1x2,
    Aspect1x4,
    Aspect1x8,
}

impl GrAspectRatio {
    fn log2(self) -> i32 {
        match self {
            GrAspectRatio::Aspect8x1 => 3,
            GrAspectRatio::Aspect4x1 => 2,
            GrAspectRatio::Aspect2x1 => 1,
            GrAspectRatio::Aspect1x1 => 0,
            GrAspectRatio::Aspect1x2 => -1,
            GrAspectRatio::Aspect1x4 => -2,
            GrAspectRatio::Aspect1x8 => -3,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GrMipMapLevelMask {
    Even,
    Odd,
    Both,
}

impl GrMipMapLevelMask {
    fn lodmask(self) -> u32 {
        match self {
            GrMipMapLevelMask::Both => 0x1ff,
            GrMipMapLevelMask::Even => 0x155,
            GrMipMapLevelMask::Odd => 0x0aa,
        }
    }
}

/// Mipmap description for source binding and downloads. LODs are the
/// log2 of the larger dimension (8 = 256 ... 0 = 1).
pub struct GrTexInfo<'a> {
    pub small_lod_log2: u32,
    pub large_lod_log2: u32,
    pub aspect: GrAspectRatio,
    pub format: GrTextureFormat,
    pub data: &'a [u8],
}

fn masks_for_aspect(aspect_log2: i32) -> (u32, u32) {
    if aspect_log2 >= 0 {
        (0xff, 0xff >> aspect_log2)
    } else {
        (0xff >> -aspect_log2, 0xff)
    }
}

fn level_bytes(aspect: GrAspectRatio, format: GrTextureFormat, hw_lod: u32) -> u32 {
    let (wmask, hmask) = masks_for_aspect(aspect.log2());
    let texels = (((wmask >> hw_lod) + 1) * ((hmask >> hw_lod) + 1)).max(4);
    texels << format.bpp_shift()
}

/// Byte offset of `hw_lod` from the chain base, counting only levels
/// present under the even/odd mask.
fn chain_offset(
    aspect: GrAspectRatio,
    format: GrTextureFormat,
    even_odd: GrMipMapLevelMask,
    hw_lod: u32,
) -> u32 {
    let lodmask = even_odd.lodmask();
    let mut offset = 0;
    for lod in 0..hw_lod.min(9) {
        if lodmask & (1 << lod) != 0 {
            offset += level_bytes(aspect, format, lod);
        }
    }
    offset
}

fn tmu_ok(tmu: usize) -> bool {
    let ok = with_context(|ctx| {
        if tmu < ctx.voodoo.num_tmus {
            true
        } else {
            ctx.voodoo.stats.invalid_params += 1;
            false
        }
    })
    .unwrap_or(false);
    if !ok {
        warn!(tmu, "bad TMU index");
    }
    ok
}

pub fn gr_tex_min_address(_tmu: usize) -> u32 {
    0
}

pub fn gr_tex_max_address(_tmu: usize) -> u32 {
    (TMU_RAM_SIZE as u32) - 8
}

/// Bytes a mip chain occupies under the given level mask.
pub fn gr_tex_texture_mem_required(even_odd: GrMipMapLevelMask, info: &GrTexInfo) -> u32 {
    if info.large_lod_log2 > 8 || info.small_lod_log2 > info.large_lod_log2 {
        return 0;
    }
    let hw_large = 8 - info.large_lod_log2;
    let hw_small = 8 - info.small_lod_log2;
    chain_offset(info.aspect, info.format, even_odd, hw_small + 1)
        - chain_offset(info.aspect, info.format, even_odd, hw_large)
}

/// Binds the mip chain at `start_address` as the TMU's current texture.
pub fn gr_tex_source(
    tmu: usize,
    start_address: u32,
    even_odd: GrMipMapLevelMask,
    info: &GrTexInfo,
) {
    if !tmu_ok(tmu) {
        return;
    }
    if info.large_lod_log2 > 8 || info.small_lod_log2 > info.large_lod_log2 {
        with_context(|ctx| ctx.voodoo.stats.invalid_params += 1);
        warn!(
            small = info.small_lod_log2,
            large = info.large_lod_log2,
            "grTexSource rejected"
        );
        return;
    }
    let hw_large = 8 - info.large_lod_log2;
    let hw_small = 8 - info.small_lod_log2;

    with_context(|ctx| {
        // bias the base so the derived offset of the largest present
        // level lands exactly on the application's start address
        let bias = chain_offset(info.aspect, info.format, even_odd, hw_large);
        let base = start_address.wrapping_sub(bias);

        let mipmap_disabled = ctx.tex_mipmap_disable[tmu];
        let t = &mut ctx.voodoo.tmu[tmu];
        t.regs.write(
            reg::TEX_BASE_ADDR,
            (base >> TEXADDR_SHIFT) & TEXADDR_MASK,
        );

        let mut tlod = t.regs.read(reg::T_LOD);
        tlod = TexLod::LOD_MIN.set(tlod, hw_large << 2);
        let lodmax = if mipmap_disabled { hw_large } else { hw_small };
        tlod = TexLod::LOD_MAX.set(tlod, lodmax << 2);
        tlod = TexLod::LOD_TSPLIT.set(tlod, (even_odd != GrMipMapLevelMask::Both) as u32);
        tlod = TexLod::LOD_ODD.set(tlod, (even_odd == GrMipMapLevelMask::Odd) as u32);
        let aspect = info.aspect.log2();
        tlod = TexLod::LOD_S_IS_WIDER.set(tlod, (aspect >= 0) as u32);
        tlod = TexLod::LOD_ASPECT.set(tlod, aspect.unsigned_abs().min(3));
        t.regs.write(reg::T_LOD, tlod);

        let mut texmode = t.regs.read(reg::TEXTURE_MODE);
        texmode = TextureMode::FORMAT.set(texmode, info.format.code());
        texmode = TextureMode::ENABLE_PERSPECTIVE.set(texmode, 1);
        texmode = TextureMode::CLAMP_NEG_W.set(texmode, 1);
        t.regs.write(reg::TEXTURE_MODE, texmode);
        t.regdirty = true;
        debug!(tmu, start_address, ?even_odd, format = ?info.format, "grTexSource");
    });
}

/// Downloads a full mip chain (optionally restricted to even or odd
/// levels) to `start_address`.
pub fn gr_tex_download_mip_map(
    tmu: usize,
    start_address: u32,
    even_odd: GrMipMapLevelMask,
    info: &GrTexInfo,
) {
    if !tmu_ok(tmu) {
        return;
    }
    if info.large_lod_log2 > 8 || info.small_lod_log2 > info.large_lod_log2 {
        with_context(|ctx| ctx.voodoo.stats.invalid_params += 1);
        return;
    }
    let needed = gr_tex_texture_mem_required(even_odd, info) as usize;
    if info.data.len() < needed {
        with_context(|ctx| ctx.voodoo.stats.invalid_params += 1);
        warn!(
            have = info.data.len(),
            needed, "grTexDownloadMipMap data too short"
        );
        return;
    }

    let hw_large = 8 - info.large_lod_log2;
    let hw_small = 8 - info.small_lod_log2;
    let lodmask = even_odd.lodmask();
    with_context(|ctx| {
        let t = &mut ctx.voodoo.tmu[tmu];
        let mut src = 0usize;
        let mut dst = start_address;
        for lod in hw_large..=hw_small {
            if lodmask & (1 << lod) == 0 {
                continue;
            }
            let bytes = level_bytes(info.aspect, info.format, lod) as usize;
            t.write_ram(dst, &info.data[src..src + bytes]);
            src += bytes;
            dst = dst.wrapping_add(bytes as u32);
        }
        debug!(tmu, start_address, bytes = src, "grTexDownloadMipMap");
    });
}

/// Downloads a single mipmap level.
#[allow(clippy::too_many_arguments)]
pub fn gr_tex_download_mip_map_level(
    tmu: usize,
    start_address: u32,
    this_lod_log2: u32,
    large_lod_log2: u32,
    aspect: GrAspectRatio,
    format: GrTextureFormat,
    even_odd: GrMipMapLevelMask,
    data: &[u8],
) {
    let (_, hmask) = masks_for_aspect(aspect.log2());
    let hw_this = 8u32.saturating_sub(this_lod_log2);
    let height = (hmask >> hw_this) + 1;
    gr_tex_download_mip_map_level_partial(
        tmu,
        start_address,
        this_lod_log2,
        large_lod_log2,
        aspect,
        format,
        even_odd,
        data,
        0,
        height - 1,
    );
}

/// Downloads a contiguous row range of one level; the range must stay
/// inside the level.
#[allow(clippy::too_many_arguments)]
pub fn gr_tex_download_mip_map_level_partial(
    tmu: usize,
    start_address: u32,
    this_lod_log2: u32,
    large_lod_log2: u32,
    aspect: GrAspectRatio,
    format: GrTextureFormat,
    even_odd: GrMipMapLevelMask,
    data: &[u8],
    start_row: u32,
    end_row: u32,
) {
    if !tmu_ok(tmu) {
        return;
    }
    if large_lod_log2 > 8 || this_lod_log2 > large_lod_log2 {
        with_context(|ctx| ctx.voodoo.stats.invalid_params += 1);
        return;
    }
    let hw_large = 8 - large_lod_log2;
    let hw_this = 8 - this_lod_log2;
    let (wmask, hmask) = masks_for_aspect(aspect.log2());
    let width = (wmask >> hw_this) + 1;
    let height = (hmask >> hw_this) + 1;
    if start_row > end_row || end_row >= height {
        with_context(|ctx| ctx.voodoo.stats.invalid_params += 1);
        warn!(start_row, end_row, height, "partial download outside the level");
        return;
    }
    let row_bytes = width << format.bpp_shift();
    let bytes = ((end_row - start_row + 1) * row_bytes) as usize;
    if data.len() < bytes {
        with_context(|ctx| ctx.voodoo.stats.invalid_params += 1);
        return;
    }

    let level = chain_offset(aspect, format, even_odd, hw_this)
        - chain_offset(aspect, format, even_odd, hw_large);
    let offset = start_address
        .wrapping_add(level)
        .wrapping_add(start_row * row_bytes);
    with_context(|ctx| {
        ctx.voodoo.tmu[tmu].write_ram(offset, &data[..bytes]);
    });
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GrTexTable<'a> {
    Ncc0(&'a [u32; 12]),
    Ncc1(&'a [u32; 12]),
    Palette(&'a [u32; 256]),
    /// packed 6-6-6-6 entries, expanded to 8 bits per channel
    Palette6666(&'a [u32; 256]),
}

#[inline]
fn expand6(v: u32) -> u8 {
    (((v & 0x3f) << 2) | ((v & 0x3f) >> 4)) as u8
}

/// Palette and NCC table downloads. Downloading an NCC table also
/// selects it for YIQ decoding.
pub fn gr_tex_download_table(tmu: usize, table: GrTexTable) {
    if !tmu_ok(tmu) {
        return;
    }
    with_context(|ctx| {
        let t = &mut ctx.voodoo.tmu[tmu];
        match table {
            GrTexTable::Ncc0(words) => {
                for (i, word) in words.iter().enumerate() {
                    t.write_ncc(0, i, *word);
                }
                t.regs
                    .write_field(reg::TEXTURE_MODE, TextureMode::NCC_TABLE_SELECT, 0);
            }
            GrTexTable::Ncc1(words) => {
                for (i, word) in words.iter().enumerate() {
                    t.write_ncc(1, i, *word);
                }
                t.regs
                    .write_field(reg::TEXTURE_MODE, TextureMode::NCC_TABLE_SELECT, 1);
            }
            GrTexTable::Palette(entries) => {
                for (i, argb) in entries.iter().enumerate() {
                    t.write_palette(false, i, *argb);
                }
            }
            GrTexTable::Palette6666(entries) => {
                for (i, packed) in entries.iter().enumerate() {
                    let a = expand6(packed >> 18);
                    let r = expand6(packed >> 12);
                    let g = expand6(packed >> 6);
                    let b = expand6(*packed);
                    t.write_palette(
                        true,
                        i,
                        u32::from_be_bytes([a, r, g, b]),
                    );
                }
            }
        }
        t.regdirty = true;
    });
}

pub fn gr_tex_combine(
    tmu: usize,
    rgb_function: GrCombineFunction,
    rgb_factor: GrCombineFactor,
    alpha_function: GrCombineFunction,
    alpha_factor: GrCombineFactor,
    rgb_invert: bool,
    alpha_invert: bool,
) {
    if !tmu_ok(tmu) {
        return;
    }
    with_context(|ctx| {
        let (zo, sub, add) = rgb_function.bits();
        let (azo, asub, aadd) = alpha_function.bits();
        let t = &mut ctx.voodoo.tmu[tmu];
        let mut word = t.regs.read(reg::TEXTURE_MODE);
        word = TextureMode::TC_ZERO_OTHER.set(word, zo);
        word = TextureMode::TC_SUB_CLOCAL.set(word, sub);
        word = TextureMode::TC_MSELECT.set(word, rgb_factor.mselect());
        word = TextureMode::TC_REVERSE_BLEND.set(word, rgb_factor.reverse_blend());
        word = TextureMode::TC_ADD_CLOCAL.set(word, (add == 1) as u32);
        word = TextureMode::TC_ADD_ALOCAL.set(word, (add == 2) as u32);
        word = TextureMode::TC_INVERT_OUTPUT.set(word, rgb_invert as u32);
        word = TextureMode::TCA_ZERO_OTHER.set(word, azo);
        word = TextureMode::TCA_SUB_CLOCAL.set(word, asub);
        word = TextureMode::TCA_MSELECT.set(word, alpha_factor.mselect());
        word = TextureMode::TCA_REVERSE_BLEND.set(word, alpha_factor.reverse_blend());
        word = TextureMode::TCA_ADD_CLOCAL.set(word, (aadd == 1) as u32);
        word = TextureMode::TCA_ADD_ALOCAL.set(word, (aadd == 2) as u32);
        word = TextureMode::TCA_INVERT_OUTPUT.set(word, alpha_invert as u32);
        t.regs.write(reg::TEXTURE_MODE, word);
        t.regdirty = true;
        debug!(tmu, ?rgb_function, ?rgb_factor, "grTexCombine");
    });
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GrTextureFilterMode {
    PointSampled,
    Bilinear,
}

pub fn gr_tex_filter_mode(
    tmu: usize,
    min_filter: GrTextureFilterMode,
    mag_filter: GrTextureFilterMode,
) {
    if !tmu_ok(tmu) {
        return;
    }
    with_context(|ctx| {
        let t = &mut ctx.voodoo.tmu[tmu];
        let mut word = t.regs.read(reg::TEXTURE_MODE);
        word = TextureMode::MINIFICATION_FILTER.set(
            word,
            (min_filter == GrTextureFilterMode::Bilinear) as u32,
        );
        word = TextureMode::MAGNIFICATION_FILTER.set(
            word,
            (mag_filter == GrTextureFilterMode::Bilinear) as u32,
        );
        t.regs.write(reg::TEXTURE_MODE, word);
        t.regdirty = true;
    });
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GrTextureClampMode {
    Wrap,
    Clamp,
    MirrorExt,
}

pub fn gr_tex_clamp_mode(tmu: usize, s: GrTextureClampMode, t_mode: GrTextureClampMode) {
    if !tmu_ok(tmu) {
        return;
    }
    if s == GrTextureClampMode::MirrorExt || t_mode == GrTextureClampMode::MirrorExt {
        warn!("mirror clamp is not supported, wrapping instead");
    }
    with_context(|ctx| {
        let t = &mut ctx.voodoo.tmu[tmu];
        let mut word = t.regs.read(reg::TEXTURE_MODE);
        word = TextureMode::CLAMP_S.set(word, (s == GrTextureClampMode::Clamp) as u32);
        word = TextureMode::CLAMP_T.set(word, (t_mode == GrTextureClampMode::Clamp) as u32);
        t.regs.write(reg::TEXTURE_MODE, word);
        t.regdirty = true;
    });
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GrMipMapMode {
    Disable,
    Nearest,
    NearestDither,
}

pub fn gr_tex_mipmap_mode(tmu: usize, mode: GrMipMapMode, _lod_blend: bool) {
    if !tmu_ok(tmu) {
        return;
    }
    with_context(|ctx| {
        ctx.tex_mipmap_disable[tmu] = mode == GrMipMapMode::Disable;
        let t = &mut ctx.voodoo.tmu[tmu];
        let mut word = t.regs.read(reg::TEXTURE_MODE);
        word = TextureMode::ENABLE_LOD_DITHER.set(
            word,
            (mode == GrMipMapMode::NearestDither) as u32,
        );
        t.regs.write(reg::TEXTURE_MODE, word);
        if mode == GrMipMapMode::Disable {
            let mut tlod = t.regs.read(reg::T_LOD);
            let lodmin = TexLod::LOD_MIN.get(tlod);
            tlod = TexLod::LOD_MAX.set(tlod, lodmin);
            t.regs.write(reg::T_LOD, tlod);
        }
        t.regdirty = true;
    });
}

/// LOD bias in LODs, stored as signed 4.2.
pub fn gr_tex_lod_bias_value(tmu: usize, bias: f32) {
    if !tmu_ok(tmu) {
        return;
    }
    with_context(|ctx| {
        let fixed = ((bias * 4.0).round() as i32).clamp(-32, 31);
        let t = &mut ctx.voodoo.tmu[tmu];
        t.regs
            .write_field(reg::T_LOD, TexLod::LOD_BIAS, (fixed & 0x3f) as u32);
        t.regdirty = true;
    });
}

/// Detail texture merge control: bias and scale shape the detail
/// factor curve, `detail_max` (0..=1) caps it.
pub fn gr_tex_detail_control(tmu: usize, lod_bias: i32, detail_scale: u8, detail_max: f32) {
    if !tmu_ok(tmu) {
        return;
    }
    with_context(|ctx| {
        let t = &mut ctx.voodoo.tmu[tmu];
        let mut word = t.regs.read(reg::T_DETAIL);
        word = TexDetail::DETAIL_MAX.set(
            word,
            ((detail_max.clamp(0.0, 1.0) * 255.0) as u32) & 0xff,
        );
        word = TexDetail::DETAIL_BIAS.set(word, (lod_bias.clamp(-32, 31) & 0x3f) as u32);
        word = TexDetail::DETAIL_SCALE.set(word, detail_scale.min(7) as u32);
        t.regs.write(reg::T_DETAIL, word);
        t.regdirty = true;
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_sizes_match_the_sampler_layout() {
        // full 256x256 16bpp chain
        let info = GrTexInfo {
            small_lod_log2: 0,
            large_lod_log2: 8,
            aspect: GrAspectRatio::Aspect1x1,
            format: GrTextureFormat::Rgb565,
            data: &[],
        };
        let total = gr_tex_texture_mem_required(GrMipMapLevelMask::Both, &info);
        // sum of 256^2..2^2 with the 4 texel floor on 1x1
        let mut expect = 0u32;
        for lod in 0..=8u32 {
            let side = 256 >> lod;
            expect += (side * side).max(4) * 2;
        }
        assert_eq!(total, expect);
    }

    #[test]
    fn single_level_16x16() {
        let info = GrTexInfo {
            small_lod_log2: 4,
            large_lod_log2: 4,
            aspect: GrAspectRatio::Aspect1x1,
            format: GrTextureFormat::Rgb565,
            data: &[],
        };
        assert_eq!(
            gr_tex_texture_mem_required(GrMipMapLevelMask::Both, &info),
            16 * 16 * 2
        );
    }

    #[test]
    fn aspect_narrows_the_chain() {
        let info = GrTexInfo {
            small_lod_log2: 8,
            large_lod_log2: 8,
            aspect: GrAspectRatio::Aspect8x1,
            format: GrTextureFormat::Alpha8,
            data: &[],
        };
        assert_eq!(
            gr_tex_texture_mem_required(GrMipMapLevelMask::Both, &info),
            256 * 32
        );
    }

    #[test]
    fn even_mask_skips_odd_levels() {
        let info = GrTexInfo {
            small_lod_log2: 6,
            large_lod_log2: 8,
            aspect: GrAspectRatio::Aspect1x1,
            format: GrTextureFormat::Alpha8,
            data: &[],
        };
        // hw lods 0..=2; even mask keeps 0 and 2
        assert_eq!(
            gr_tex_texture_mem_required(GrMipMapLevelMask::Even, &info),
            256 * 256 + 64 * 64
        );
        assert_eq!(
            gr_tex_texture_mem_required(GrMipMapLevelMask::Odd, &info),
            128 * 128
        );
    }

    #[test]
    fn expand6_replicates_high_bits() {
        assert_eq!(expand6(0x3f), 0xff);
        assert_eq!(expand6(0x00), 0x00);
        assert_eq!(expand6(0x20), 0x82);
    }
}
