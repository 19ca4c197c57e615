use super::raster::TmuJob;
use super::regs::Argb;
use super::fixed::fast_reciplog;
use super::tmu::INVALID_TEXEL;

/*
One texel per pixel per TMU: perspective divide, LOD selection,
clamp/wrap addressing, format decode, optional bilinear filter, then the
TMU's own combine against the cascaded "other" input. TMU1 output feeds
TMU0 as c_other; TMU0 output becomes the color path's texture source.
 */

/// Four neighbour weighting with 8 bit fractions.
#[inline]
fn bilinear_filter(c00: Argb, c01: Argb, c10: Argb, c11: Argb, u: i32, v: i32) -> Argb {
    #[inline]
    fn channel(c00: i32, c01: i32, c10: i32, c11: i32, u: i32, v: i32) -> u8 {
        let top = c00 * (0x100 - u) + c01 * u;
        let bot = c10 * (0x100 - u) + c11 * u;
        ((top * (0x100 - v) + bot * v) >> 16) as u8
    }
    Argb::from_channels(
        channel(c00.a(), c01.a(), c10.a(), c11.a(), u, v),
        channel(c00.r(), c01.r(), c10.r(), c11.r(), u, v),
        channel(c00.g(), c01.g(), c10.g(), c11.g(), u, v),
        channel(c00.b(), c01.b(), c10.b(), c11.b(), u, v),
    )
}

/// Reads and decodes one texel at integer coordinates for the given LOD
/// base. 8 bit formats fetch a byte through the 256 entry lookup; 16 bit
/// formats fetch a word, either through the 64K tables or by splitting
/// into a low byte lookup plus a raw alpha byte.
#[inline]
fn fetch_texel(t: &TmuJob, texbase: u32, ts: i32, tt: i32, smax: i32) -> Argb {
    let index = (tt * (smax + 1) + ts) as u32;
    match t.format {
        f if f < 8 => {
            let byte = t.ram.get((texbase.wrapping_add(index) & t.mask) as usize);
            Argb(t.lookup.get(byte as usize))
        }
        10..=13 => {
            let addr = texbase.wrapping_add(index * 2);
            let lo = t.ram.get((addr & t.mask) as usize) as usize;
            let hi = t.ram.get((addr.wrapping_add(1) & t.mask) as usize) as usize;
            Argb(t.lookup.get((hi << 8) | lo))
        }
        8 | 9 | 14 => {
            let addr = texbase.wrapping_add(index * 2);
            let lo = t.ram.get((addr & t.mask) as usize) as u32;
            let hi = t.ram.get((addr.wrapping_add(1) & t.mask) as usize) as u32;
            Argb((t.lookup.get(lo as usize) & 0x00ff_ffff) | (hi << 24))
        }
        _ => Argb(INVALID_TEXEL),
    }
}

#[inline]
fn clamp_or_wrap(v: i32, max: i32, clamp: bool) -> i32 {
    if clamp {
        v.clamp(0, max)
    } else {
        v & max
    }
}

/// Samples one TMU for the pixel at `x` and combines with the cascaded
/// input. `iters`/`itert` are 14.18, `iterw` is 16.48.
pub fn sample(
    t: &TmuJob,
    dither4: &[u8],
    x: i32,
    iters: i64,
    itert: i64,
    iterw: i64,
    c_other: Argb,
) -> Argb {
    let texmode = t.texmode;

    // perspective and starting LOD
    let (mut s, mut tc, mut lod);
    if texmode.enable_perspective() {
        let (recip, log2) = fast_reciplog(iterw);
        s = iters.wrapping_mul(recip) >> 29;
        tc = itert.wrapping_mul(recip) >> 29;
        lod = log2 + t.lodbase;
    } else {
        s = iters;
        tc = itert;
        lod = t.lodbase;
    }
    if texmode.clamp_neg_w() && iterw < 0 {
        s = 0;
        tc = 0;
    }

    // clamp the LOD, dithering it first if requested
    lod += t.lodbias;
    if texmode.enable_lod_dither() {
        lod += (dither4[(x & 3) as usize] as i32) << 4;
    }
    lod = lod.clamp(t.lodmin, t.lodmax);

    // if this LOD is not present, sample the next coarser one
    let mut ilod = (lod >> 8) as u32;
    if (t.lodmask >> ilod) & 1 == 0 {
        ilod += 1;
    }
    let ilod = ilod.min(8);
    let texbase = t.lodoffset[ilod as usize];
    let smax = (t.wmask >> ilod) as i32;
    let tmax = (t.hmask >> ilod) as i32;

    let bilinear = (texmode.magnification_bilinear() && lod == t.lodmin)
        || (texmode.minification_bilinear() && lod != t.lodmin);

    let c_local = if bilinear {
        // center on the texel grid and keep an 8 bit fraction
        let s = ((s >> (ilod + 10)) as i32).wrapping_sub(0x80);
        let tc = ((tc >> (ilod + 10)) as i32).wrapping_sub(0x80);
        let sfrac = s & 0xff;
        let tfrac = tc & 0xff;
        let s0 = clamp_or_wrap(s >> 8, smax, texmode.clamp_s());
        let s1 = clamp_or_wrap((s >> 8) + 1, smax, texmode.clamp_s());
        let t0 = clamp_or_wrap(tc >> 8, tmax, texmode.clamp_t());
        let t1 = clamp_or_wrap((tc >> 8) + 1, tmax, texmode.clamp_t());
        let c00 = fetch_texel(t, texbase, s0, t0, smax);
        let c01 = fetch_texel(t, texbase, s1, t0, smax);
        let c10 = fetch_texel(t, texbase, s0, t1, smax);
        let c11 = fetch_texel(t, texbase, s1, t1, smax);
        bilinear_filter(c00, c01, c10, c11, sfrac, tfrac)
    } else {
        let s0 = clamp_or_wrap((s >> (ilod + 18)) as i32, smax, texmode.clamp_s());
        let t0 = clamp_or_wrap((tc >> (ilod + 18)) as i32, tmax, texmode.clamp_t());
        fetch_texel(t, texbase, s0, t0, smax)
    };

    combine(t, lod, c_local, c_other)
}

/// The TMU combine: same algebra as the color path but with the TMU's
/// own mode bits and the detail/LOD blend factors.
fn combine(t: &TmuJob, lod: i32, c_local: Argb, c_other: Argb) -> Argb {
    let texmode = t.texmode;

    let mut tr = if texmode.tc_zero_other() { 0 } else { c_other.r() };
    let mut tg = if texmode.tc_zero_other() { 0 } else { c_other.g() };
    let mut tb = if texmode.tc_zero_other() { 0 } else { c_other.b() };
    let mut ta = if texmode.tca_zero_other() { 0 } else { c_other.a() };

    if texmode.tc_sub_clocal() {
        tr -= c_local.r();
        tg -= c_local.g();
        tb -= c_local.b();
    }
    if texmode.tca_sub_clocal() {
        ta -= c_local.a();
    }

    let detail = |lod: i32| -> i32 {
        if t.detailbias <= lod {
            0
        } else {
            (((t.detailbias - lod) << t.detailscale) >> 8).min(t.detailmax)
        }
    };

    let (mut blendr, mut blendg, mut blendb) = match texmode.tc_mselect() {
        1 => (c_local.r(), c_local.g(), c_local.b()),
        2 => (c_other.a(), c_other.a(), c_other.a()),
        3 => (c_local.a(), c_local.a(), c_local.a()),
        4 => {
            let d = detail(lod);
            (d, d, d)
        }
        5 => {
            let f = lod & 0xff;
            (f, f, f)
        }
        _ => (0, 0, 0),
    };
    let mut blenda = match texmode.tca_mselect() {
        1 => c_local.a(),
        2 => c_other.a(),
        3 => c_local.a(),
        4 => detail(lod),
        5 => lod & 0xff,
        _ => 0,
    };

    if !texmode.tc_reverse_blend() {
        blendr ^= 0xff;
        blendg ^= 0xff;
        blendb ^= 0xff;
    }
    if !texmode.tca_reverse_blend() {
        blenda ^= 0xff;
    }

    tr = (tr * (blendr + 1)) >> 8;
    tg = (tg * (blendg + 1)) >> 8;
    tb = (tb * (blendb + 1)) >> 8;
    ta = (ta * (blenda + 1)) >> 8;

    if texmode.tc_add_clocal() {
        tr += c_local.r();
        tg += c_local.g();
        tb += c_local.b();
    }
    if texmode.tc_add_alocal() {
        tr += c_local.a();
        tg += c_local.a();
        tb += c_local.a();
    }
    if texmode.tca_add_clocal() || texmode.tca_add_alocal() {
        ta += c_local.a();
    }

    let mut tr = tr.clamp(0, 0xff);
    let mut tg = tg.clamp(0, 0xff);
    let mut tb = tb.clamp(0, 0xff);
    let mut ta = ta.clamp(0, 0xff);

    if texmode.tc_invert_output() {
        tr ^= 0xff;
        tg ^= 0xff;
        tb ^= 0xff;
    }
    if texmode.tca_invert_output() {
        ta ^= 0xff;
    }
    Argb::from_channels(ta as u8, tr as u8, tg as u8, tb as u8)
}
