use tracing::{debug, warn};

use super::with_context;
use crate::core::voodoo::regs::{
    reg, AlphaMode, ChromaRange, FbzColorPath, FbzMode, FogMode,
};
use crate::core::voodoo::CullMode;

/*
Mode-setting entry points. Each call decodes its enums into register
bit fields and leaves unrelated fields untouched; invalid input returns
without side effects and bumps the diagnostic counter.
 */

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GrCombineFunction {
    Zero,
    Local,
    LocalAlpha,
    ScaleOther,
    ScaleOtherAddLocal,
    ScaleOtherAddLocalAlpha,
    ScaleOtherMinusLocal,
    ScaleOtherMinusLocalAddLocal,
    ScaleOtherMinusLocalAddLocalAlpha,
    ScaleMinusLocalAddLocal,
    ScaleMinusLocalAddLocalAlpha,
}

impl GrCombineFunction {
    /// (zero_other, sub_clocal, add_aclocal) register values.
    pub(crate) fn bits(self) -> (u32, u32, u32) {
        match self {
            GrCombineFunction::Zero => (1, 0, 0),
            GrCombineFunction::Local => (1, 0, 1),
            GrCombineFunction::LocalAlpha => (1, 0, 2),
            GrCombineFunction::ScaleOther => (0, 0, 0),
            GrCombineFunction::ScaleOtherAddLocal => (0, 0, 1),
            GrCombineFunction::ScaleOtherAddLocalAlpha => (0, 0, 2),
            GrCombineFunction::ScaleOtherMinusLocal => (0, 1, 0),
            GrCombineFunction::ScaleOtherMinusLocalAddLocal => (0, 1, 1),
            GrCombineFunction::ScaleOtherMinusLocalAddLocalAlpha => (0, 1, 2),
            GrCombineFunction::ScaleMinusLocalAddLocal => (1, 1, 1),
            GrCombineFunction::ScaleMinusLocalAddLocalAlpha => (1, 1, 2),
        }
    }
}

/// Combine scale factors. `TextureAlpha`/`TextureRgb` double as the
/// detail factor and LOD fraction in the texture combine units.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GrCombineFactor {
    Zero,
    Local,
    OtherAlpha,
    LocalAlpha,
    TextureAlpha,
    TextureRgb,
    One,
    OneMinusLocal,
    OneMinusOtherAlpha,
    OneMinusLocalAlpha,
    OneMinusTextureAlpha,
    OneMinusTextureRgb,
}

impl GrCombineFactor {
    fn code(self) -> u32 {
        match self {
            GrCombineFactor::Zero => 0x0,
            GrCombineFactor::Local => 0x1,
            GrCombineFactor::OtherAlpha => 0x2,
            GrCombineFactor::LocalAlpha => 0x3,
            GrCombineFactor::TextureAlpha => 0x4,
            GrCombineFactor::TextureRgb => 0x5,
            GrCombineFactor::One => 0x8,
            GrCombineFactor::OneMinusLocal => 0x9,
            GrCombineFactor::OneMinusOtherAlpha => 0xa,
            GrCombineFactor::OneMinusLocalAlpha => 0xb,
            GrCombineFactor::OneMinusTextureAlpha => 0xc,
            GrCombineFactor::OneMinusTextureRgb => 0xd,
        }
    }

    pub(crate) fn mselect(self) -> u32 {
        self.code() & 7
    }

    /// The hardware multiplies by the complement unless this bit is set.
    pub(crate) fn reverse_blend(self) -> u32 {
        ((self.code() >> 3) & 1) ^ 1
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GrCombineLocal {
    Iterated,
    Constant,
    Depth,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GrCombineOther {
    Iterated,
    Texture,
    Constant,
}

impl GrCombineOther {
    fn select(self) -> u32 {
        match self {
            GrCombineOther::Iterated => 0,
            GrCombineOther::Texture => 1,
            GrCombineOther::Constant => 2,
        }
    }
}

/// Recomputed after every combine change: the texture units only run
/// when some combine input consumes their output.
fn update_texture_enable(word: u32) -> u32 {
    let cp = FbzColorPath(word);
    let uses_texture = cp.cc_rgbselect() == 1
        || cp.cc_aselect() == 1
        || matches!(cp.cc_mselect(), 4 | 5)
        || cp.cca_mselect() == 4
        || cp.cc_localselect_override();
    FbzColorPath::ENABLE_TEXTURE.set(word, uses_texture as u32)
}

pub fn gr_color_combine(
    function: GrCombineFunction,
    factor: GrCombineFactor,
    local: GrCombineLocal,
    other: GrCombineOther,
    invert: bool,
) {
    with_context(|ctx| {
        let (zero_other, sub_clocal, add_aclocal) = function.bits();
        let mut word = ctx.voodoo.regs.read(reg::FBZ_COLOR_PATH);
        word = FbzColorPath::CC_RGBSELECT.set(word, other.select());
        word = FbzColorPath::CC_LOCALSELECT.set(
            word,
            (local == GrCombineLocal::Constant) as u32,
        );
        word = FbzColorPath::CC_ZERO_OTHER.set(word, zero_other);
        word = FbzColorPath::CC_SUB_CLOCAL.set(word, sub_clocal);
        word = FbzColorPath::CC_MSELECT.set(word, factor.mselect());
        word = FbzColorPath::CC_REVERSE_BLEND.set(word, factor.reverse_blend());
        word = FbzColorPath::CC_ADD_ACLOCAL.set(word, add_aclocal);
        word = FbzColorPath::CC_INVERT_OUTPUT.set(word, invert as u32);
        word = update_texture_enable(word);
        ctx.voodoo.regs.write(reg::FBZ_COLOR_PATH, word);
        debug!(?function, ?factor, ?local, ?other, invert, "grColorCombine");
    });
}

pub fn gr_alpha_combine(
    function: GrCombineFunction,
    factor: GrCombineFactor,
    local: GrCombineLocal,
    other: GrCombineOther,
    invert: bool,
) {
    with_context(|ctx| {
        let (zero_other, sub_clocal, add_aclocal) = function.bits();
        let mut word = ctx.voodoo.regs.read(reg::FBZ_COLOR_PATH);
        word = FbzColorPath::CC_ASELECT.set(word, other.select());
        word = FbzColorPath::CCA_LOCALSELECT.set(
            word,
            (local == GrCombineLocal::Constant) as u32,
        );
        word = FbzColorPath::CCA_ZERO_OTHER.set(word, zero_other);
        word = FbzColorPath::CCA_SUB_CLOCAL.set(word, sub_clocal);
        word = FbzColorPath::CCA_MSELECT.set(word, factor.mselect());
        word = FbzColorPath::CCA_REVERSE_BLEND.set(word, factor.reverse_blend());
        word = FbzColorPath::CCA_ADD_ACLOCAL.set(word, add_aclocal);
        word = FbzColorPath::CCA_INVERT_OUTPUT.set(word, invert as u32);
        word = update_texture_enable(word);
        ctx.voodoo.regs.write(reg::FBZ_COLOR_PATH, word);
        debug!(?function, ?factor, ?local, ?other, invert, "grAlphaCombine");
    });
}

/// Alpha blend factor codes as the hardware stores them. Codes 8..=14
/// are Voodoo 2 extensions the pipeline treats as zero.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GrBlend {
    Zero,
    SrcAlpha,
    /// destination color for source factors, source color for
    /// destination factors
    Color,
    DstAlpha,
    One,
    OneMinusSrcAlpha,
    OneMinusColor,
    OneMinusDstAlpha,
    AlphaSaturate,
    Reserved(u8),
}

impl GrBlend {
    fn code(self) -> u32 {
        match self {
            GrBlend::Zero => 0x0,
            GrBlend::SrcAlpha => 0x1,
            GrBlend::Color => 0x2,
            GrBlend::DstAlpha => 0x3,
            GrBlend::One => 0x4,
            GrBlend::OneMinusSrcAlpha => 0x5,
            GrBlend::OneMinusColor => 0x6,
            GrBlend::OneMinusDstAlpha => 0x7,
            GrBlend::AlphaSaturate => 0xf,
            GrBlend::Reserved(code) => code as u32 & 0xf,
        }
    }
}

pub fn gr_alpha_blend_function(
    rgb_src: GrBlend,
    rgb_dst: GrBlend,
    alpha_src: GrBlend,
    alpha_dst: GrBlend,
) {
    with_context(|ctx| {
        let enable = !(rgb_src == GrBlend::One
            && rgb_dst == GrBlend::Zero
            && alpha_src == GrBlend::One
            && alpha_dst == GrBlend::Zero);
        let mut word = ctx.voodoo.regs.read(reg::ALPHA_MODE);
        word = AlphaMode::SRCRGBBLEND.set(word, rgb_src.code());
        word = AlphaMode::DSTRGBBLEND.set(word, rgb_dst.code());
        word = AlphaMode::SRCALPHABLEND.set(word, alpha_src.code());
        word = AlphaMode::DSTALPHABLEND.set(word, alpha_dst.code());
        word = AlphaMode::ALPHABLEND.set(word, enable as u32);
        ctx.voodoo.regs.write(reg::ALPHA_MODE, word);
        debug!(?rgb_src, ?rgb_dst, ?alpha_src, ?alpha_dst, enable, "grAlphaBlendFunction");
    });
}

/// Comparison functions shared by the depth and alpha tests.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GrCmpFnc {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

impl GrCmpFnc {
    fn code(self) -> u32 {
        self as u32
    }
}

pub fn gr_alpha_test_function(function: GrCmpFnc) {
    with_context(|ctx| {
        let mut word = ctx.voodoo.regs.read(reg::ALPHA_MODE);
        word = AlphaMode::ALPHAFUNCTION.set(word, function.code());
        word = AlphaMode::ALPHATEST.set(word, (function != GrCmpFnc::Always) as u32);
        ctx.voodoo.regs.write(reg::ALPHA_MODE, word);
    });
}

pub fn gr_alpha_test_reference_value(value: u8) {
    with_context(|ctx| {
        ctx.voodoo
            .regs
            .write_field(reg::ALPHA_MODE, AlphaMode::ALPHAREF, value as u32);
    });
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GrDepthBufferMode {
    Disable,
    ZBuffer,
    WBuffer,
    ZBufferCompareToBias,
    WBufferCompareToBias,
}

pub fn gr_depth_buffer_mode(mode: GrDepthBufferMode) {
    with_context(|ctx| {
        let (enable, wbuffer, compare_to_bias) = match mode {
            GrDepthBufferMode::Disable => (0, 0, 0),
            GrDepthBufferMode::ZBuffer => (1, 0, 0),
            GrDepthBufferMode::WBuffer => (1, 1, 0),
            GrDepthBufferMode::ZBufferCompareToBias => (1, 0, 1),
            GrDepthBufferMode::WBufferCompareToBias => (1, 1, 1),
        };
        let mut word = ctx.voodoo.regs.read(reg::FBZ_MODE);
        word = FbzMode::ENABLE_DEPTHBUF.set(word, enable);
        word = FbzMode::WBUFFER_SELECT.set(word, wbuffer);
        word = FbzMode::DEPTH_SOURCE_COMPARE.set(word, compare_to_bias);
        ctx.voodoo.regs.write(reg::FBZ_MODE, word);
        debug!(?mode, "grDepthBufferMode");
    });
}

pub fn gr_depth_buffer_function(function: GrCmpFnc) {
    with_context(|ctx| {
        ctx.voodoo
            .regs
            .write_field(reg::FBZ_MODE, FbzMode::DEPTH_FUNCTION, function.code());
    });
}

/// Aux writes happen when either depth or alpha writes are on.
pub fn gr_depth_mask(enable: bool) {
    with_context(|ctx| {
        ctx.depth_mask = enable;
        let aux = ctx.depth_mask || ctx.alpha_mask;
        ctx.voodoo
            .regs
            .write_field(reg::FBZ_MODE, FbzMode::AUX_BUFFER_MASK, aux as u32);
    });
}

pub fn gr_color_mask(rgb: bool, alpha: bool) {
    with_context(|ctx| {
        ctx.alpha_mask = alpha;
        let mut word = ctx.voodoo.regs.read(reg::FBZ_MODE);
        word = FbzMode::RGB_BUFFER_MASK.set(word, rgb as u32);
        word = FbzMode::AUX_BUFFER_MASK.set(
            word,
            (ctx.depth_mask || ctx.alpha_mask) as u32,
        );
        ctx.voodoo.regs.write(reg::FBZ_MODE, word);
    });
}

pub fn gr_depth_bias_level(level: i16) {
    with_context(|ctx| {
        let mut word = ctx.voodoo.regs.read(reg::ZA_COLOR);
        word = (word & 0xffff_0000) | (level as u16 as u32);
        ctx.voodoo.regs.write(reg::ZA_COLOR, word);
        ctx.voodoo.regs.write_field(
            reg::FBZ_MODE,
            FbzMode::ENABLE_DEPTH_BIAS,
            (level != 0) as u32,
        );
    });
}

/// Writes both constant color registers; the combine units pick color0
/// as c_local and color1 as c_other.
pub fn gr_constant_color_value(color: u32) {
    with_context(|ctx| {
        let argb = ctx.color_to_argb(color);
        ctx.voodoo.regs.write(reg::COLOR0, argb);
        ctx.voodoo.regs.write(reg::COLOR1, argb);
    });
}

pub fn gr_chromakey_mode(enable: bool) {
    with_context(|ctx| {
        ctx.voodoo.regs.write_field(
            reg::FBZ_MODE,
            FbzMode::ENABLE_CHROMAKEY,
            enable as u32,
        );
    });
}

pub fn gr_chromakey_value(color: u32) {
    with_context(|ctx| {
        let argb = ctx.color_to_argb(color);
        ctx.voodoo.regs.write(reg::CHROMA_KEY, argb & 0x00ff_ffff);
    });
}

pub fn gr_chroma_range_mode(enable: bool) {
    with_context(|ctx| {
        ctx.voodoo
            .regs
            .write_field(reg::CHROMA_RANGE, ChromaRange::ENABLE, enable as u32);
    });
}

/// Per channel upper bounds plus the union/exclusive flags of the range
/// compare; the chromaKey register holds the lower bounds.
#[derive(Copy, Clone, Debug, Default)]
pub struct GrChromaRangeFlags {
    pub union_mode: bool,
    pub red_exclusive: bool,
    pub green_exclusive: bool,
    pub blue_exclusive: bool,
}

pub fn gr_chroma_range_value(color: u32, flags: GrChromaRangeFlags) {
    with_context(|ctx| {
        let argb = ctx.color_to_argb(color);
        let mut word = ctx.voodoo.regs.read(reg::CHROMA_RANGE);
        word = (word & 0xff00_0000) | (argb & 0x00ff_ffff);
        word = ChromaRange::UNION_MODE.set(word, flags.union_mode as u32);
        word = ChromaRange::RED_EXCLUSIVE.set(word, flags.red_exclusive as u32);
        word = ChromaRange::GREEN_EXCLUSIVE.set(word, flags.green_exclusive as u32);
        word = ChromaRange::BLUE_EXCLUSIVE.set(word, flags.blue_exclusive as u32);
        ctx.voodoo.regs.write(reg::CHROMA_RANGE, word);
    });
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GrFogSource {
    Disable,
    TableOnQ,
    TableOnFogCoord,
    IteratedZ,
    IteratedAlpha,
}

pub fn gr_fog_mode(source: GrFogSource, mult2: bool, add2: bool) {
    with_context(|ctx| {
        let (enable, zalpha) = match source {
            GrFogSource::Disable => (0, 0),
            GrFogSource::TableOnQ | GrFogSource::TableOnFogCoord => (1, 0),
            GrFogSource::IteratedAlpha => (1, 1),
            GrFogSource::IteratedZ => (1, 2),
        };
        let mut word = ctx.voodoo.regs.read(reg::FOG_MODE);
        word = FogMode::ENABLE_FOG.set(word, enable);
        word = FogMode::FOG_ZALPHA.set(word, zalpha);
        word = FogMode::FOG_MULT.set(word, mult2 as u32);
        word = FogMode::FOG_ADD.set(word, add2 as u32);
        ctx.voodoo.regs.write(reg::FOG_MODE, word);
        debug!(?source, mult2, add2, "grFogMode");
    });
}

pub fn gr_fog_color_value(color: u32) {
    with_context(|ctx| {
        let argb = ctx.color_to_argb(color);
        ctx.voodoo.regs.write(reg::FOG_COLOR, argb & 0x00ff_ffff);
    });
}

/// Uploads the 64 entry fog table and recomputes the per entry deltas
/// as the difference to the next entry (the last entry has none).
pub fn gr_fog_table(table: &[u8; 64]) {
    with_context(|ctx| {
        ctx.voodoo.fbi.fogblend = *table;
        for i in 0..63 {
            ctx.voodoo.fbi.fogdelta[i] = table[i + 1].wrapping_sub(table[i]);
        }
        ctx.voodoo.fbi.fogdelta[63] = 0;
    });
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GrDitherMode {
    Disable,
    Dither2x2,
    Dither4x4,
}

pub fn gr_dither_mode(mode: GrDitherMode) {
    with_context(|ctx| {
        let mut word = ctx.voodoo.regs.read(reg::FBZ_MODE);
        word = FbzMode::ENABLE_DITHERING.set(word, (mode != GrDitherMode::Disable) as u32);
        word = FbzMode::DITHER_TYPE.set(word, (mode == GrDitherMode::Dither2x2) as u32);
        ctx.voodoo.regs.write(reg::FBZ_MODE, word);
    });
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GrStippleMode {
    Disable,
    Pattern,
    Rotate,
}

pub fn gr_stipple_mode(mode: GrStippleMode) {
    with_context(|ctx| {
        let mut word = ctx.voodoo.regs.read(reg::FBZ_MODE);
        word = FbzMode::ENABLE_STIPPLE.set(word, (mode != GrStippleMode::Disable) as u32);
        word = FbzMode::STIPPLE_PATTERN.set(word, (mode == GrStippleMode::Pattern) as u32);
        ctx.voodoo.regs.write(reg::FBZ_MODE, word);
    });
}

pub fn gr_stipple_pattern(pattern: u32) {
    with_context(|ctx| {
        ctx.voodoo.regs.write(reg::STIPPLE, pattern);
    });
}

pub fn gr_clip_window(min_x: u32, min_y: u32, max_x: u32, max_y: u32) {
    with_context(|ctx| {
        let width = ctx.voodoo.fbi.width as u32;
        let height = ctx.voodoo.fbi.height as u32;
        if min_x >= max_x || min_y >= max_y || max_x > width || max_y > height {
            ctx.voodoo.stats.invalid_params += 1;
            warn!(min_x, min_y, max_x, max_y, "grClipWindow rejected");
            return;
        }
        ctx.voodoo
            .regs
            .write(reg::CLIP_LEFT_RIGHT, (min_x << 16) | max_x);
        ctx.voodoo
            .regs
            .write(reg::CLIP_LOWY_HIGHY, (min_y << 16) | max_y);
        ctx.voodoo
            .regs
            .write_field(reg::FBZ_MODE, FbzMode::ENABLE_CLIPPING, 1);
    });
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GrCullMode {
    Disable,
    Negative,
    Positive,
}

pub fn gr_cull_mode(mode: GrCullMode) {
    with_context(|ctx| {
        ctx.voodoo.fbi.cull_mode = match mode {
            GrCullMode::Disable => CullMode::Disable,
            GrCullMode::Negative => CullMode::Negative,
            GrCullMode::Positive => CullMode::Positive,
        };
    });
}

/// Only the offset of the viewport applies in window coordinate mode.
pub fn gr_viewport(x: f32, y: f32, _width: f32, _height: f32) {
    with_context(|ctx| {
        ctx.voodoo.fbi.viewport = (x, y);
    });
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GrCoordinateSpace {
    Window,
    Clip,
}

pub fn gr_coordinate_space(mode: GrCoordinateSpace) {
    with_context(|ctx| {
        if mode == GrCoordinateSpace::Clip {
            ctx.voodoo.stats.invalid_params += 1;
            warn!("clip coordinate space is not supported; staying in window coordinates");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine_function_bits_cover_the_table() {
        assert_eq!(GrCombineFunction::Zero.bits(), (1, 0, 0));
        assert_eq!(GrCombineFunction::Local.bits(), (1, 0, 1));
        assert_eq!(
            GrCombineFunction::ScaleOtherMinusLocalAddLocal.bits(),
            (0, 1, 1)
        );
        assert_eq!(
            GrCombineFunction::ScaleMinusLocalAddLocalAlpha.bits(),
            (1, 1, 2)
        );
    }

    #[test]
    fn factor_codes_split_into_mselect_and_reverse() {
        // plain factors keep the reverse bit set
        assert_eq!(GrCombineFactor::Zero.mselect(), 0);
        assert_eq!(GrCombineFactor::Zero.reverse_blend(), 1);
        assert_eq!(GrCombineFactor::Local.mselect(), 1);
        assert_eq!(GrCombineFactor::Local.reverse_blend(), 1);
        // "one minus" factors clear it so the hardware complements
        assert_eq!(GrCombineFactor::One.mselect(), 0);
        assert_eq!(GrCombineFactor::One.reverse_blend(), 0);
        assert_eq!(GrCombineFactor::OneMinusTextureRgb.mselect(), 5);
        assert_eq!(GrCombineFactor::OneMinusTextureRgb.reverse_blend(), 0);
    }

    #[test]
    fn cmp_codes_match_hardware_order() {
        assert_eq!(GrCmpFnc::Never.code(), 0);
        assert_eq!(GrCmpFnc::Less.code(), 1);
        assert_eq!(GrCmpFnc::GreaterEqual.code(), 6);
        assert_eq!(GrCmpFnc::Always.code(), 7);
    }

    #[test]
    fn blend_codes_match_hardware_values() {
        assert_eq!(GrBlend::Zero.code(), 0x0);
        assert_eq!(GrBlend::SrcAlpha.code(), 0x1);
        assert_eq!(GrBlend::One.code(), 0x4);
        assert_eq!(GrBlend::OneMinusDstAlpha.code(), 0x7);
        assert_eq!(GrBlend::AlphaSaturate.code(), 0xf);
        assert_eq!(GrBlend::Reserved(0xb).code(), 0xb);
    }
}
