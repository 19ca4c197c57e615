use std::fmt;

/*
Register file layout (word offsets match the hardware byte map / 4):
  0x104 fbzColorPath   color/alpha combine unit control
  0x108 fogMode        fog unit control
  0x10c alphaMode      alpha test and blend control
  0x110 fbzMode        framebuffer/depth unit control
  0x118 clipLeftRight  10 bit left (high half) / right (low half)
  0x11c clipLowYHighY  10 bit top  (high half) / bottom (low half)
  0x12c fogColor       0x130 zaColor  0x134 chromaKey  0x138 chromaRange
  0x140 stipple  0x144 color0  0x148 color1
  0x14c..0x15c pixel statistics  0x160.. fog table (32 words)
  0x300 textureMode  0x304 tLOD  0x308 tDetail  0x30c texBaseAddr
  0x324.. nccTable (two tables of 12 words)
All semantics live in bit fields inside these words; writes go through
the Glide translator, never raw.
 */
pub mod reg {
    pub const STATUS: usize = 0x000 / 4;
    pub const FBZ_COLOR_PATH: usize = 0x104 / 4;
    pub const FOG_MODE: usize = 0x108 / 4;
    pub const ALPHA_MODE: usize = 0x10c / 4;
    pub const FBZ_MODE: usize = 0x110 / 4;
    pub const LFB_MODE: usize = 0x114 / 4;
    pub const CLIP_LEFT_RIGHT: usize = 0x118 / 4;
    pub const CLIP_LOWY_HIGHY: usize = 0x11c / 4;
    pub const FOG_COLOR: usize = 0x12c / 4;
    pub const ZA_COLOR: usize = 0x130 / 4;
    pub const CHROMA_KEY: usize = 0x134 / 4;
    pub const CHROMA_RANGE: usize = 0x138 / 4;
    pub const STIPPLE: usize = 0x140 / 4;
    pub const COLOR0: usize = 0x144 / 4;
    pub const COLOR1: usize = 0x148 / 4;
    pub const FBI_PIXELS_IN: usize = 0x14c / 4;
    pub const FBI_CHROMA_FAIL: usize = 0x150 / 4;
    pub const FBI_ZFUNC_FAIL: usize = 0x154 / 4;
    pub const FBI_AFUNC_FAIL: usize = 0x158 / 4;
    pub const FBI_PIXELS_OUT: usize = 0x15c / 4;
    pub const FOG_TABLE: usize = 0x160 / 4;
    pub const TEXTURE_MODE: usize = 0x300 / 4;
    pub const T_LOD: usize = 0x304 / 4;
    pub const T_DETAIL: usize = 0x308 / 4;
    pub const TEX_BASE_ADDR: usize = 0x30c / 4;
    pub const TEX_BASE_ADDR_1: usize = 0x310 / 4;
    pub const TEX_BASE_ADDR_2: usize = 0x314 / 4;
    pub const TEX_BASE_ADDR_3_8: usize = 0x318 / 4;
    pub const TREX_INIT0: usize = 0x31c / 4;
    pub const TREX_INIT1: usize = 0x320 / 4;
    pub const NCC_TABLE: usize = 0x324 / 4;

    pub const FOG_TABLE_WORDS: usize = 32;
    pub const NCC_TABLE_WORDS: usize = 12;
}

/// One contiguous bit field inside a 32 bit register word.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Field {
    pub lsb: u32,
    pub width: u32,
}

impl Field {
    pub const fn new(lsb: u32, width: u32) -> Self {
        Self { lsb, width }
    }

    #[inline]
    pub const fn mask(self) -> u32 {
        ((1u64 << self.width) - 1) as u32
    }

    #[inline]
    pub const fn get(self, word: u32) -> u32 {
        (word >> self.lsb) & self.mask()
    }

    #[inline]
    pub const fn set(self, word: u32, value: u32) -> u32 {
        (word & !(self.mask() << self.lsb)) | ((value & self.mask()) << self.lsb)
    }
}

/// Fixed bank of 32 bit register words, addressed by the constants in
/// [`reg`]. All writes funnel through the Glide translator.
pub struct RegisterBank {
    words: [u32; 0x100],
}

impl RegisterBank {
    pub fn new() -> Self {
        Self { words: [0; 0x100] }
    }

    #[inline]
    pub fn read(&self, index: usize) -> u32 {
        self.words[index]
    }

    #[inline]
    pub fn write(&mut self, index: usize, value: u32) {
        self.words[index] = value;
    }

    #[inline]
    pub fn read_field(&self, index: usize, field: Field) -> u32 {
        field.get(self.words[index])
    }

    #[inline]
    pub fn write_field(&mut self, index: usize, field: Field, value: u32) {
        self.words[index] = field.set(self.words[index], value);
    }
}

impl Default for RegisterBank {
    fn default() -> Self {
        Self::new()
    }
}

/// Packed ARGB color word, 8 bits per channel.
#[derive(Copy, Clone, PartialEq, Eq, Default)]
pub struct Argb(pub u32);

impl Argb {
    #[inline]
    pub const fn from_channels(a: u8, r: u8, g: u8, b: u8) -> Self {
        Self(((a as u32) << 24) | ((r as u32) << 16) | ((g as u32) << 8) | b as u32)
    }

    #[inline]
    pub const fn a(self) -> i32 {
        ((self.0 >> 24) & 0xff) as i32
    }

    #[inline]
    pub const fn r(self) -> i32 {
        ((self.0 >> 16) & 0xff) as i32
    }

    #[inline]
    pub const fn g(self) -> i32 {
        ((self.0 >> 8) & 0xff) as i32
    }

    #[inline]
    pub const fn b(self) -> i32 {
        (self.0 & 0xff) as i32
    }
}

impl fmt::Debug for Argb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Argb({:08X})", self.0)
    }
}

/*
fbzColorPath
  0-1   cc_rgbselect      (0=iterated, 1=texture, 2=color1, 3=reserved)
  2-3   cc_aselect        (same encoding for alpha)
  4     cc_localselect    (0=iterated RGB, 1=color0)
  5-6   cca_localselect   (0=iterated A, 1=color0 A, 2=fixed 0xFF)
  7     cc_localselect_override (texel alpha bit 7 picks c_local)
  8     cc_zero_other     9   cc_sub_clocal
  10-12 cc_mselect        (0, clocal, aother, alocal, texture a, texture rgb)
  13    cc_reverse_blend  14-15 cc_add_aclocal (0=none, 1=clocal, 2=alocal)
  16    cc_invert_output
  17-25 cca_* mirror of the above for the alpha channel
  27    enable_texture
 */
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FbzColorPath(pub u32);

impl FbzColorPath {
    pub const CC_RGBSELECT: Field = Field::new(0, 2);
    pub const CC_ASELECT: Field = Field::new(2, 2);
    pub const CC_LOCALSELECT: Field = Field::new(4, 1);
    pub const CCA_LOCALSELECT: Field = Field::new(5, 2);
    pub const CC_LOCALSELECT_OVERRIDE: Field = Field::new(7, 1);
    pub const CC_ZERO_OTHER: Field = Field::new(8, 1);
    pub const CC_SUB_CLOCAL: Field = Field::new(9, 1);
    pub const CC_MSELECT: Field = Field::new(10, 3);
    pub const CC_REVERSE_BLEND: Field = Field::new(13, 1);
    pub const CC_ADD_ACLOCAL: Field = Field::new(14, 2);
    pub const CC_INVERT_OUTPUT: Field = Field::new(16, 1);
    pub const CCA_ZERO_OTHER: Field = Field::new(17, 1);
    pub const CCA_SUB_CLOCAL: Field = Field::new(18, 1);
    pub const CCA_MSELECT: Field = Field::new(19, 3);
    pub const CCA_REVERSE_BLEND: Field = Field::new(22, 1);
    pub const CCA_ADD_ACLOCAL: Field = Field::new(23, 2);
    pub const CCA_INVERT_OUTPUT: Field = Field::new(25, 1);
    pub const ENABLE_TEXTURE: Field = Field::new(27, 1);

    #[inline]
    pub fn cc_rgbselect(self) -> u32 {
        Self::CC_RGBSELECT.get(self.0)
    }

    #[inline]
    pub fn cc_aselect(self) -> u32 {
        Self::CC_ASELECT.get(self.0)
    }

    #[inline]
    pub fn cc_localselect(self) -> bool {
        Self::CC_LOCALSELECT.get(self.0) != 0
    }

    #[inline]
    pub fn cca_localselect(self) -> u32 {
        Self::CCA_LOCALSELECT.get(self.0)
    }

    #[inline]
    pub fn cc_localselect_override(self) -> bool {
        Self::CC_LOCALSELECT_OVERRIDE.get(self.0) != 0
    }

    #[inline]
    pub fn cc_zero_other(self) -> bool {
        Self::CC_ZERO_OTHER.get(self.0) != 0
    }

    #[inline]
    pub fn cc_sub_clocal(self) -> bool {
        Self::CC_SUB_CLOCAL.get(self.0) != 0
    }

    #[inline]
    pub fn cc_mselect(self) -> u32 {
        Self::CC_MSELECT.get(self.0)
    }

    #[inline]
    pub fn cc_reverse_blend(self) -> bool {
        Self::CC_REVERSE_BLEND.get(self.0) != 0
    }

    #[inline]
    pub fn cc_add_aclocal(self) -> u32 {
        Self::CC_ADD_ACLOCAL.get(self.0)
    }

    #[inline]
    pub fn cc_invert_output(self) -> bool {
        Self::CC_INVERT_OUTPUT.get(self.0) != 0
    }

    #[inline]
    pub fn cca_zero_other(self) -> bool {
        Self::CCA_ZERO_OTHER.get(self.0) != 0
    }

    #[inline]
    pub fn cca_sub_clocal(self) -> bool {
        Self::CCA_SUB_CLOCAL.get(self.0) != 0
    }

    #[inline]
    pub fn cca_mselect(self) -> u32 {
        Self::CCA_MSELECT.get(self.0)
    }

    #[inline]
    pub fn cca_reverse_blend(self) -> bool {
        Self::CCA_REVERSE_BLEND.get(self.0) != 0
    }

    #[inline]
    pub fn cca_add_aclocal(self) -> u32 {
        Self::CCA_ADD_ACLOCAL.get(self.0)
    }

    #[inline]
    pub fn cca_invert_output(self) -> bool {
        Self::CCA_INVERT_OUTPUT.get(self.0) != 0
    }

    #[inline]
    pub fn enable_texture(self) -> bool {
        Self::ENABLE_TEXTURE.get(self.0) != 0
    }
}

/*
alphaMode
  0     alphatest enable    1-3  alpha function (never..always)
  4     alphablend enable
  8-11  src rgb factor      12-15 dst rgb factor
  16-19 src alpha factor    20-23 dst alpha factor
  24-31 alpha reference
 */
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct AlphaMode(pub u32);

impl AlphaMode {
    pub const ALPHATEST: Field = Field::new(0, 1);
    pub const ALPHAFUNCTION: Field = Field::new(1, 3);
    pub const ALPHABLEND: Field = Field::new(4, 1);
    pub const SRCRGBBLEND: Field = Field::new(8, 4);
    pub const DSTRGBBLEND: Field = Field::new(12, 4);
    pub const SRCALPHABLEND: Field = Field::new(16, 4);
    pub const DSTALPHABLEND: Field = Field::new(20, 4);
    pub const ALPHAREF: Field = Field::new(24, 8);

    #[inline]
    pub fn alphatest(self) -> bool {
        Self::ALPHATEST.get(self.0) != 0
    }

    #[inline]
    pub fn alphafunction(self) -> u32 {
        Self::ALPHAFUNCTION.get(self.0)
    }

    #[inline]
    pub fn alphablend(self) -> bool {
        Self::ALPHABLEND.get(self.0) != 0
    }

    #[inline]
    pub fn srcrgbblend(self) -> u32 {
        Self::SRCRGBBLEND.get(self.0)
    }

    #[inline]
    pub fn dstrgbblend(self) -> u32 {
        Self::DSTRGBBLEND.get(self.0)
    }

    #[inline]
    pub fn srcalphablend(self) -> u32 {
        Self::SRCALPHABLEND.get(self.0)
    }

    #[inline]
    pub fn dstalphablend(self) -> u32 {
        Self::DSTALPHABLEND.get(self.0)
    }

    #[inline]
    pub fn alpharef(self) -> i32 {
        Self::ALPHAREF.get(self.0) as i32
    }
}

/*
fogMode
  0 enable  1 fog_add  2 fog_mult  3-4 fog_zalpha (0=table, 1=iterated a,
  2=iterated z, 3=iterated w)  5 fog_constant  6 fog_dither  7 fog_zones
 */
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FogMode(pub u32);

impl FogMode {
    pub const ENABLE_FOG: Field = Field::new(0, 1);
    pub const FOG_ADD: Field = Field::new(1, 1);
    pub const FOG_MULT: Field = Field::new(2, 1);
    pub const FOG_ZALPHA: Field = Field::new(3, 2);
    pub const FOG_CONSTANT: Field = Field::new(5, 1);
    pub const FOG_DITHER: Field = Field::new(6, 1);
    pub const FOG_ZONES: Field = Field::new(7, 1);

    #[inline]
    pub fn enable_fog(self) -> bool {
        Self::ENABLE_FOG.get(self.0) != 0
    }

    #[inline]
    pub fn fog_add(self) -> bool {
        Self::FOG_ADD.get(self.0) != 0
    }

    #[inline]
    pub fn fog_mult(self) -> bool {
        Self::FOG_MULT.get(self.0) != 0
    }

    #[inline]
    pub fn fog_zalpha(self) -> u32 {
        Self::FOG_ZALPHA.get(self.0)
    }

    #[inline]
    pub fn fog_constant(self) -> bool {
        Self::FOG_CONSTANT.get(self.0) != 0
    }

    #[inline]
    pub fn fog_dither(self) -> bool {
        Self::FOG_DITHER.get(self.0) != 0
    }

    #[inline]
    pub fn fog_zones(self) -> bool {
        Self::FOG_ZONES.get(self.0) != 0
    }
}

/*
fbzMode
  0  enable_clipping   1  enable_chromakey  2  enable_stipple
  3  wbuffer_select    4  enable_depthbuf   5-7 depth function
  8  enable_dithering  9  rgb_buffer_mask   10 aux_buffer_mask
  11 dither_type (0=4x4, 1=2x2)             12 stipple_pattern
  13 enable_alpha_mask 14-15 draw_buffer    16 enable_depth_bias
  17 y_origin          18 enable_alpha_planes
  19 alpha_dither_subtract                  20 depth_source_compare
  21 depth_float_select
 */
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FbzMode(pub u32);

impl FbzMode {
    pub const ENABLE_CLIPPING: Field = Field::new(0, 1);
    pub const ENABLE_CHROMAKEY: Field = Field::new(1, 1);
    pub const ENABLE_STIPPLE: Field = Field::new(2, 1);
    pub const WBUFFER_SELECT: Field = Field::new(3, 1);
    pub const ENABLE_DEPTHBUF: Field = Field::new(4, 1);
    pub const DEPTH_FUNCTION: Field = Field::new(5, 3);
    pub const ENABLE_DITHERING: Field = Field::new(8, 1);
    pub const RGB_BUFFER_MASK: Field = Field::new(9, 1);
    pub const AUX_BUFFER_MASK: Field = Field::new(10, 1);
    pub const DITHER_TYPE: Field = Field::new(11, 1);
    pub const STIPPLE_PATTERN: Field = Field::new(12, 1);
    pub const ENABLE_ALPHA_MASK: Field = Field::new(13, 1);
    pub const DRAW_BUFFER: Field = Field::new(14, 2);
    pub const ENABLE_DEPTH_BIAS: Field = Field::new(16, 1);
    pub const Y_ORIGIN: Field = Field::new(17, 1);
    pub const ENABLE_ALPHA_PLANES: Field = Field::new(18, 1);
    pub const ALPHA_DITHER_SUBTRACT: Field = Field::new(19, 1);
    pub const DEPTH_SOURCE_COMPARE: Field = Field::new(20, 1);
    pub const DEPTH_FLOAT_SELECT: Field = Field::new(21, 1);

    #[inline]
    pub fn enable_clipping(self) -> bool {
        Self::ENABLE_CLIPPING.get(self.0) != 0
    }

    #[inline]
    pub fn enable_chromakey(self) -> bool {
        Self::ENABLE_CHROMAKEY.get(self.0) != 0
    }

    #[inline]
    pub fn enable_stipple(self) -> bool {
        Self::ENABLE_STIPPLE.get(self.0) != 0
    }

    #[inline]
    pub fn wbuffer_select(self) -> bool {
        Self::WBUFFER_SELECT.get(self.0) != 0
    }

    #[inline]
    pub fn enable_depthbuf(self) -> bool {
        Self::ENABLE_DEPTHBUF.get(self.0) != 0
    }

    #[inline]
    pub fn depth_function(self) -> u32 {
        Self::DEPTH_FUNCTION.get(self.0)
    }

    #[inline]
    pub fn enable_dithering(self) -> bool {
        Self::ENABLE_DITHERING.get(self.0) != 0
    }

    #[inline]
    pub fn rgb_buffer_mask(self) -> bool {
        Self::RGB_BUFFER_MASK.get(self.0) != 0
    }

    #[inline]
    pub fn aux_buffer_mask(self) -> bool {
        Self::AUX_BUFFER_MASK.get(self.0) != 0
    }

    #[inline]
    pub fn dither_type_2x2(self) -> bool {
        Self::DITHER_TYPE.get(self.0) != 0
    }

    #[inline]
    pub fn stipple_pattern(self) -> bool {
        Self::STIPPLE_PATTERN.get(self.0) != 0
    }

    #[inline]
    pub fn enable_alpha_mask(self) -> bool {
        Self::ENABLE_ALPHA_MASK.get(self.0) != 0
    }

    #[inline]
    pub fn enable_depth_bias(self) -> bool {
        Self::ENABLE_DEPTH_BIAS.get(self.0) != 0
    }

    #[inline]
    pub fn y_origin_lower_left(self) -> bool {
        Self::Y_ORIGIN.get(self.0) != 0
    }

    #[inline]
    pub fn enable_alpha_planes(self) -> bool {
        Self::ENABLE_ALPHA_PLANES.get(self.0) != 0
    }

    #[inline]
    pub fn alpha_dither_subtract(self) -> bool {
        Self::ALPHA_DITHER_SUBTRACT.get(self.0) != 0
    }

    #[inline]
    pub fn depth_source_compare(self) -> bool {
        Self::DEPTH_SOURCE_COMPARE.get(self.0) != 0
    }

    #[inline]
    pub fn depth_float_select(self) -> bool {
        Self::DEPTH_FLOAT_SELECT.get(self.0) != 0
    }
}

/*
textureMode (one per TMU)
  0  enable_perspective  1 minification bilinear  2 magnification bilinear
  3  clamp_neg_w  4 enable_lod_dither  5 ncc_table_select
  6  clamp_s  7 clamp_t  8-11 format
  12-20 tc_* rgb combine (zero_other, sub_clocal, mselect, reverse,
        add_clocal, add_alocal, invert)
  21-29 tca_* alpha combine, same layout
  30 trilinear (unimplemented, Voodoo 2)
 */
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TextureMode(pub u32);

impl TextureMode {
    pub const ENABLE_PERSPECTIVE: Field = Field::new(0, 1);
    pub const MINIFICATION_FILTER: Field = Field::new(1, 1);
    pub const MAGNIFICATION_FILTER: Field = Field::new(2, 1);
    pub const CLAMP_NEG_W: Field = Field::new(3, 1);
    pub const ENABLE_LOD_DITHER: Field = Field::new(4, 1);
    pub const NCC_TABLE_SELECT: Field = Field::new(5, 1);
    pub const CLAMP_S: Field = Field::new(6, 1);
    pub const CLAMP_T: Field = Field::new(7, 1);
    pub const FORMAT: Field = Field::new(8, 4);
    pub const TC_ZERO_OTHER: Field = Field::new(12, 1);
    pub const TC_SUB_CLOCAL: Field = Field::new(13, 1);
    pub const TC_MSELECT: Field = Field::new(14, 3);
    pub const TC_REVERSE_BLEND: Field = Field::new(17, 1);
    pub const TC_ADD_CLOCAL: Field = Field::new(18, 1);
    pub const TC_ADD_ALOCAL: Field = Field::new(19, 1);
    pub const TC_INVERT_OUTPUT: Field = Field::new(20, 1);
    pub const TCA_ZERO_OTHER: Field = Field::new(21, 1);
    pub const TCA_SUB_CLOCAL: Field = Field::new(22, 1);
    pub const TCA_MSELECT: Field = Field::new(23, 3);
    pub const TCA_REVERSE_BLEND: Field = Field::new(26, 1);
    pub const TCA_ADD_CLOCAL: Field = Field::new(27, 1);
    pub const TCA_ADD_ALOCAL: Field = Field::new(28, 1);
    pub const TCA_INVERT_OUTPUT: Field = Field::new(29, 1);
    pub const TRILINEAR: Field = Field::new(30, 1);

    #[inline]
    pub fn enable_perspective(self) -> bool {
        Self::ENABLE_PERSPECTIVE.get(self.0) != 0
    }

    #[inline]
    pub fn minification_bilinear(self) -> bool {
        Self::MINIFICATION_FILTER.get(self.0) != 0
    }

    #[inline]
    pub fn magnification_bilinear(self) -> bool {
        Self::MAGNIFICATION_FILTER.get(self.0) != 0
    }

    #[inline]
    pub fn clamp_neg_w(self) -> bool {
        Self::CLAMP_NEG_W.get(self.0) != 0
    }

    #[inline]
    pub fn enable_lod_dither(self) -> bool {
        Self::ENABLE_LOD_DITHER.get(self.0) != 0
    }

    #[inline]
    pub fn ncc_table_select(self) -> usize {
        Self::NCC_TABLE_SELECT.get(self.0) as usize
    }

    #[inline]
    pub fn clamp_s(self) -> bool {
        Self::CLAMP_S.get(self.0) != 0
    }

    #[inline]
    pub fn clamp_t(self) -> bool {
        Self::CLAMP_T.get(self.0) != 0
    }

    #[inline]
    pub fn format(self) -> u32 {
        Self::FORMAT.get(self.0)
    }

    #[inline]
    pub fn tc_zero_other(self) -> bool {
        Self::TC_ZERO_OTHER.get(self.0) != 0
    }

    #[inline]
    pub fn tc_sub_clocal(self) -> bool {
        Self::TC_SUB_CLOCAL.get(self.0) != 0
    }

    #[inline]
    pub fn tc_mselect(self) -> u32 {
        Self::TC_MSELECT.get(self.0)
    }

    #[inline]
    pub fn tc_reverse_blend(self) -> bool {
        Self::TC_REVERSE_BLEND.get(self.0) != 0
    }

    #[inline]
    pub fn tc_add_clocal(self) -> bool {
        Self::TC_ADD_CLOCAL.get(self.0) != 0
    }

    #[inline]
    pub fn tc_add_alocal(self) -> bool {
        Self::TC_ADD_ALOCAL.get(self.0) != 0
    }

    #[inline]
    pub fn tc_invert_output(self) -> bool {
        Self::TC_INVERT_OUTPUT.get(self.0) != 0
    }

    #[inline]
    pub fn tca_zero_other(self) -> bool {
        Self::TCA_ZERO_OTHER.get(self.0) != 0
    }

    #[inline]
    pub fn tca_sub_clocal(self) -> bool {
        Self::TCA_SUB_CLOCAL.get(self.0) != 0
    }

    #[inline]
    pub fn tca_mselect(self) -> u32 {
        Self::TCA_MSELECT.get(self.0)
    }

    #[inline]
    pub fn tca_reverse_blend(self) -> bool {
        Self::TCA_REVERSE_BLEND.get(self.0) != 0
    }

    #[inline]
    pub fn tca_add_clocal(self) -> bool {
        Self::TCA_ADD_CLOCAL.get(self.0) != 0
    }

    #[inline]
    pub fn tca_add_alocal(self) -> bool {
        Self::TCA_ADD_ALOCAL.get(self.0) != 0
    }

    #[inline]
    pub fn tca_invert_output(self) -> bool {
        Self::TCA_INVERT_OUTPUT.get(self.0) != 0
    }
}

/*
tLOD
  0-5 lodmin (4.2)  6-11 lodmax (4.2)  12-17 lodbias (signed 4.2)
  18 lod_odd  19 lod_tsplit  20 lod_s_is_wider  21-22 lod_aspect
  24 tmultibaseaddr
 */
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TexLod(pub u32);

impl TexLod {
    pub const LOD_MIN: Field = Field::new(0, 6);
    pub const LOD_MAX: Field = Field::new(6, 6);
    pub const LOD_BIAS: Field = Field::new(12, 6);
    pub const LOD_ODD: Field = Field::new(18, 1);
    pub const LOD_TSPLIT: Field = Field::new(19, 1);
    pub const LOD_S_IS_WIDER: Field = Field::new(20, 1);
    pub const LOD_ASPECT: Field = Field::new(21, 2);
    pub const TMULTIBASEADDR: Field = Field::new(24, 1);

    /// lodmin in .8
    #[inline]
    pub fn lodmin(self) -> i32 {
        (Self::LOD_MIN.get(self.0) << 6) as i32
    }

    /// lodmax in .8
    #[inline]
    pub fn lodmax(self) -> i32 {
        (Self::LOD_MAX.get(self.0) << 6) as i32
    }

    /// sign extended lodbias in .8
    #[inline]
    pub fn lodbias(self) -> i32 {
        (((Self::LOD_BIAS.get(self.0) << 2) as u8) as i8 as i32) << 4
    }

    #[inline]
    pub fn lod_odd(self) -> bool {
        Self::LOD_ODD.get(self.0) != 0
    }

    #[inline]
    pub fn lod_tsplit(self) -> bool {
        Self::LOD_TSPLIT.get(self.0) != 0
    }

    #[inline]
    pub fn lod_s_is_wider(self) -> bool {
        Self::LOD_S_IS_WIDER.get(self.0) != 0
    }

    #[inline]
    pub fn lod_aspect(self) -> u32 {
        Self::LOD_ASPECT.get(self.0)
    }
}

/*
tDetail: 0-7 detail_max, 8-13 detail_bias (signed), 14-16 detail_scale
 */
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TexDetail(pub u32);

impl TexDetail {
    pub const DETAIL_MAX: Field = Field::new(0, 8);
    pub const DETAIL_BIAS: Field = Field::new(8, 6);
    pub const DETAIL_SCALE: Field = Field::new(14, 3);

    #[inline]
    pub fn detail_max(self) -> i32 {
        Self::DETAIL_MAX.get(self.0) as i32
    }

    /// sign extended detail bias in .8
    #[inline]
    pub fn detail_bias(self) -> i32 {
        (((Self::DETAIL_BIAS.get(self.0) << 2) as u8) as i8 as i32) << 6
    }

    #[inline]
    pub fn detail_scale(self) -> u32 {
        Self::DETAIL_SCALE.get(self.0)
    }
}

/*
chromaRange: 0-23 high range color, 24/25/26 blue/green/red exclusive,
27 union mode, 28 enable
 */
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ChromaRange(pub u32);

impl ChromaRange {
    pub const BLUE_EXCLUSIVE: Field = Field::new(24, 1);
    pub const GREEN_EXCLUSIVE: Field = Field::new(25, 1);
    pub const RED_EXCLUSIVE: Field = Field::new(26, 1);
    pub const UNION_MODE: Field = Field::new(27, 1);
    pub const ENABLE: Field = Field::new(28, 1);

    #[inline]
    pub fn enable(self) -> bool {
        Self::ENABLE.get(self.0) != 0
    }

    #[inline]
    pub fn union_mode(self) -> bool {
        Self::UNION_MODE.get(self.0) != 0
    }

    #[inline]
    pub fn blue_exclusive(self) -> u32 {
        Self::BLUE_EXCLUSIVE.get(self.0)
    }

    #[inline]
    pub fn green_exclusive(self) -> u32 {
        Self::GREEN_EXCLUSIVE.get(self.0)
    }

    #[inline]
    pub fn red_exclusive(self) -> u32 {
        Self::RED_EXCLUSIVE.get(self.0)
    }
}

/// High half of `clipLeftRight` / `clipLowYHighY` holds the lower bound,
/// the low half the upper bound, both 10 bits.
#[inline]
pub fn clip_bounds(word: u32) -> (i32, i32) {
    (((word >> 16) & 0x3ff) as i32, (word & 0x3ff) as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_roundtrip() {
        let f = Field::new(10, 3);
        let w = f.set(0xffff_ffff, 0b010);
        assert_eq!(f.get(w), 0b010);
        // neighbours untouched
        assert_eq!(w | (f.mask() << f.lsb), 0xffff_ffff);
    }

    #[test]
    fn bank_write_field_preserves_rest() {
        let mut bank = RegisterBank::new();
        bank.write(reg::ALPHA_MODE, 0xffff_ffff);
        bank.write_field(reg::ALPHA_MODE, AlphaMode::SRCRGBBLEND, 0x5);
        let am = AlphaMode(bank.read(reg::ALPHA_MODE));
        assert_eq!(am.srcrgbblend(), 0x5);
        assert_eq!(am.dstrgbblend(), 0xf);
        assert_eq!(am.alpharef(), 0xff);
    }

    #[test]
    fn lodbias_sign_extends() {
        // -0.5 LOD = 4.2 value 0b111110
        let t = TexLod(TexLod::LOD_BIAS.set(0, 0b11_1110));
        assert_eq!(t.lodbias(), -128);
        let t = TexLod(TexLod::LOD_BIAS.set(0, 0b00_0010));
        assert_eq!(t.lodbias(), 128);
    }

    #[test]
    fn lodmin_max_scale_to_q8() {
        let t = TexLod(TexLod::LOD_MIN.set(TexLod::LOD_MAX.set(0, 8 << 2), 4 << 2));
        assert_eq!(t.lodmin(), 4 << 8);
        assert_eq!(t.lodmax(), 8 << 8);
    }

    #[test]
    fn argb_channels() {
        let c = Argb::from_channels(0x12, 0x34, 0x56, 0x78);
        assert_eq!(c.0, 0x1234_5678);
        assert_eq!((c.a(), c.r(), c.g(), c.b()), (0x12, 0x34, 0x56, 0x78));
    }

    #[test]
    fn clip_word_unpacks() {
        let (lo, hi) = clip_bounds((5 << 16) | 635);
        assert_eq!((lo, hi), (5, 635));
    }
}
