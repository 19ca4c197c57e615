use super::fixed::{clamp_u8, wfloat_from_iterw, zfloat_from_iterz};
use super::raster::{PixelStats, RasterVariant, Span, TriangleJob};
use super::regs::{Argb, FbzColorPath};
use super::tables::{DITHER_2X2, DITHER_4X4};
use super::texel;

/*
The per pixel state machine, in fixed order: stipple, w-float, depth
value, depth test, texture, source selects, color/alpha combine, chroma
key, alpha mask, alpha test, fog, alpha blend, dither, write. Every skip
leaves through one early exit that bumps its category counter, so
  pixels_out + zfunc_fail + afunc_fail + chroma_fail + stipple_count
always equals the covered pixel count.
 */

struct CombineInputs {
    iter: Argb,
    texel: Argb,
    color0: Argb,
    color1: Argb,
}

/// The Voodoo combine: out = ((other - sub?local) * factor + add) ^ invert,
/// computed per channel with an 8 bit factor and saturation.
fn color_combine(fbzcp: FbzColorPath, inputs: &CombineInputs) -> Argb {
    let CombineInputs {
        iter,
        texel,
        color0,
        color1,
    } = *inputs;

    let c_other = match fbzcp.cc_rgbselect() {
        0 => iter,
        1 => texel,
        2 => color1,
        _ => Argb(0),
    };
    let a_other = match fbzcp.cc_aselect() {
        0 => iter.a(),
        1 => texel.a(),
        2 => color1.a(),
        _ => 0,
    };

    // texel alpha bit 7 can override the local select
    let c_local = if !fbzcp.cc_localselect_override() {
        if fbzcp.cc_localselect() { color0 } else { iter }
    } else if texel.a() & 0x80 != 0 {
        color0
    } else {
        iter
    };
    let a_local = match fbzcp.cca_localselect() {
        0 => iter.a(),
        1 => color0.a(),
        _ => 0xff,
    };

    let mut r = if fbzcp.cc_zero_other() { 0 } else { c_other.r() };
    let mut g = if fbzcp.cc_zero_other() { 0 } else { c_other.g() };
    let mut b = if fbzcp.cc_zero_other() { 0 } else { c_other.b() };
    let mut a = if fbzcp.cca_zero_other() { 0 } else { a_other };

    if fbzcp.cc_sub_clocal() {
        r -= c_local.r();
        g -= c_local.g();
        b -= c_local.b();
    }
    if fbzcp.cca_sub_clocal() {
        a -= a_local;
    }

    let (mut blendr, mut blendg, mut blendb) = match fbzcp.cc_mselect() {
        1 => (c_local.r(), c_local.g(), c_local.b()),
        2 => (a_other, a_other, a_other),
        3 => (a_local, a_local, a_local),
        4 => (texel.a(), texel.a(), texel.a()),
        5 => (texel.r(), texel.g(), texel.b()),
        _ => (0, 0, 0),
    };
    let mut blenda = match fbzcp.cca_mselect() {
        1 | 3 => a_local,
        2 => a_other,
        4 => texel.a(),
        _ => 0,
    };
    if !fbzcp.cc_reverse_blend() {
        blendr ^= 0xff;
        blendg ^= 0xff;
        blendb ^= 0xff;
    }
    if !fbzcp.cca_reverse_blend() {
        blenda ^= 0xff;
    }

    r = (r * (blendr + 1)) >> 8;
    g = (g * (blendg + 1)) >> 8;
    b = (b * (blendb + 1)) >> 8;
    a = (a * (blenda + 1)) >> 8;

    match fbzcp.cc_add_aclocal() {
        1 => {
            r += c_local.r();
            g += c_local.g();
            b += c_local.b();
        }
        2 | 3 => {
            r += a_local;
            g += a_local;
            b += a_local;
        }
        _ => {}
    }
    if fbzcp.cca_add_aclocal() != 0 {
        a += a_local;
    }

    let mut r = r.clamp(0, 0xff);
    let mut g = g.clamp(0, 0xff);
    let mut b = b.clamp(0, 0xff);
    let mut a = a.clamp(0, 0xff);
    if fbzcp.cc_invert_output() {
        r ^= 0xff;
        g ^= 0xff;
        b ^= 0xff;
    }
    if fbzcp.cca_invert_output() {
        a ^= 0xff;
    }
    Argb::from_channels(a as u8, r as u8, g as u8, b as u8)
}

/// One alpha blend factor applied to a channel value.
#[inline]
fn blend_factor(select: u32, chan: i32, own_alpha: i32, other_chan: i32, dst_alpha: i32) -> i32 {
    match select {
        1 => (chan * (own_alpha + 1)) >> 8,
        2 => (chan * (other_chan + 1)) >> 8,
        3 => (chan * (dst_alpha + 1)) >> 8,
        4 => chan,
        5 => (chan * (0x100 - own_alpha)) >> 8,
        6 => (chan * (0x100 - other_chan)) >> 8,
        7 => (chan * (0x100 - dst_alpha)) >> 8,
        15 => {
            let sat = own_alpha.min(0x100 - dst_alpha);
            (chan * (sat + 1)) >> 8
        }
        // 8..=14 are Voodoo 2 extensions left unimplemented on purpose
        _ => 0,
    }
}

/// Rasterizes one clipped span. The variant chosen at triangle setup
/// picks between the generic loop and a specialized one.
pub fn shade_span(job: &TriangleJob, span: &Span, stats: &mut PixelStats) {
    match job.variant {
        RasterVariant::GouraudFill => gouraud_span(job, span, stats),
        RasterVariant::Generic => generic_span(job, span, stats),
    }
}

/// Fast path for the most common register combination: untextured
/// iterated color straight into the color buffer, every per pixel test
/// disabled. The selection in [`RasterVariant::select`] guarantees no
/// stage between combine and write is active.
fn gouraud_span(job: &TriangleJob, span: &Span, stats: &mut PixelStats) {
    let y = span.y;
    let row = if job.fbzmode.y_origin_lower_left() {
        job.height - 1 - y
    } else {
        y
    };
    if row < 0 || row >= job.height {
        return;
    }
    let dbase = job.dest_offs + (row * job.rowpixels) as usize;

    let dx = span.startx - (job.ax >> 4);
    let dy = y - (job.ay >> 4);
    let at = |start: i32, ddx: i32, ddy: i32| -> i32 {
        start
            .wrapping_add(dy.wrapping_mul(ddy))
            .wrapping_add(dx.wrapping_mul(ddx))
    };
    let mut ir = at(job.startr, job.drdx, job.drdy);
    let mut ig = at(job.startg, job.dgdx, job.dgdy);
    let mut ib = at(job.startb, job.dbdx, job.dbdy);

    for x in span.startx..span.stopx {
        let r = clamp_u8(ir >> 12) as u16;
        let g = clamp_u8(ig >> 12) as u16;
        let b = clamp_u8(ib >> 12) as u16;
        job.fb
            .set(dbase + x as usize, ((r & 0xf8) << 8) | ((g & 0xfc) << 3) | (b >> 3));
        ir = ir.wrapping_add(job.drdx);
        ig = ig.wrapping_add(job.dgdx);
        ib = ib.wrapping_add(job.dbdx);
    }
    let count = (span.stopx - span.startx) as u32;
    stats.pixels_in += count;
    stats.pixels_out += count;
}

fn generic_span(job: &TriangleJob, span: &Span, stats: &mut PixelStats) {
    let y = span.y;
    let fbzmode = job.fbzmode;
    let fbzcp = job.fbzcp;
    let alphamode = job.alphamode;
    let fogmode = job.fogmode;
    let tables = &*job.tables;

    let row = if fbzmode.y_origin_lower_left() {
        job.height - 1 - y
    } else {
        y
    };
    if row < 0 || row >= job.height {
        return;
    }
    let dbase = job.dest_offs + (row * job.rowpixels) as usize;
    let abase = job.aux_offs + (row * job.rowpixels) as usize;

    let drow_base = ((y & 3) * 4) as usize;
    let dither4 = &DITHER_4X4[drow_base..drow_base + 4];
    let dmatrix: &[u8; 16] = if fbzmode.dither_type_2x2() {
        &DITHER_2X2
    } else {
        &DITHER_4X4
    };
    let drow = &dmatrix[drow_base..drow_base + 4];

    // iterator values at the leftmost pixel of this span
    let dx = span.startx - (job.ax >> 4);
    let dy = y - (job.ay >> 4);
    let at = |start: i32, ddx: i32, ddy: i32| -> i32 {
        start
            .wrapping_add(dy.wrapping_mul(ddy))
            .wrapping_add(dx.wrapping_mul(ddx))
    };
    let at64 = |start: i64, ddx: i64, ddy: i64| -> i64 {
        start
            .wrapping_add((dy as i64).wrapping_mul(ddy))
            .wrapping_add((dx as i64).wrapping_mul(ddx))
    };
    let mut ir = at(job.startr, job.drdx, job.drdy);
    let mut ig = at(job.startg, job.dgdx, job.dgdy);
    let mut ib = at(job.startb, job.dbdx, job.dbdy);
    let mut ia = at(job.starta, job.dadx, job.dady);
    let mut iz = at(job.startz, job.dzdx, job.dzdy);
    let mut iw = at64(job.startw, job.dwdx, job.dwdy);

    let mut ts = [0i64; 2];
    let mut tt = [0i64; 2];
    let mut tw = [0i64; 2];
    let mut tdx = [(0i64, 0i64, 0i64); 2];
    for i in 0..2 {
        if let Some(t) = &job.tmu[i] {
            ts[i] = at64(t.starts, t.dsdx, t.dsdy);
            tt[i] = at64(t.startt, t.dtdx, t.dtdy);
            tw[i] = at64(t.startw, t.dwdx, t.dwdy);
            tdx[i] = (t.dsdx, t.dtdx, t.dwdx);
        }
    }

    // rotate mode stipple reseeds per scanline so output is independent
    // of how spans are distributed across workers
    let mut stipple = job.stipple;

    for x in span.startx..span.stopx {
        stats.pixels_in += 1;
        'pixel: {
            // stipple
            if fbzmode.enable_stipple() {
                if !fbzmode.stipple_pattern() {
                    stipple = stipple.rotate_left(1);
                    if stipple & 0x8000_0000 == 0 {
                        stats.stipple_count += 1;
                        break 'pixel;
                    }
                } else {
                    let bit = ((y & 3) << 3) | (!x & 7);
                    if (stipple >> bit) & 1 == 0 {
                        stats.stipple_count += 1;
                        break 'pixel;
                    }
                }
            }

            // perspective depth word
            let wfloat = wfloat_from_iterw(iw);

            // depth value: clamped z, the w float, or floating point z
            let mut depthval = if !fbzmode.wbuffer_select() {
                (iz >> 12).clamp(0, 0xffff)
            } else if !fbzmode.depth_float_select() {
                wfloat
            } else {
                zfloat_from_iterz(iz)
            };
            if fbzmode.enable_depth_bias() {
                depthval = (depthval + job.zacolor as u16 as i16 as i32).clamp(0, 0xffff);
            }

            let didx = dbase + x as usize;
            let aidx = abase + x as usize;

            // depth test
            if fbzmode.enable_depthbuf() {
                let comparand = if fbzmode.depth_source_compare() {
                    (job.zacolor & 0xffff) as i32
                } else {
                    depthval
                };
                let stored = job.fb.get(aidx) as i32;
                let pass = match fbzmode.depth_function() {
                    0 => false,
                    1 => comparand < stored,
                    2 => comparand == stored,
                    3 => comparand <= stored,
                    4 => comparand > stored,
                    5 => comparand != stored,
                    6 => comparand >= stored,
                    _ => true,
                };
                if !pass {
                    stats.zfunc_fail += 1;
                    break 'pixel;
                }
            }

            // texture sampling, TMU1 cascading into TMU0
            let mut texel_color = Argb(0);
            if fbzcp.enable_texture() {
                if let Some(t1) = &job.tmu[1] {
                    texel_color =
                        texel::sample(t1, dither4, x, ts[1], tt[1], tw[1], texel_color);
                }
                if let Some(t0) = &job.tmu[0] {
                    texel_color =
                        texel::sample(t0, dither4, x, ts[0], tt[0], tw[0], texel_color);
                }
            }

            // color and alpha combine
            let iter = Argb::from_channels(
                clamp_u8(ia >> 12),
                clamp_u8(ir >> 12),
                clamp_u8(ig >> 12),
                clamp_u8(ib >> 12),
            );
            let combined = color_combine(
                fbzcp,
                &CombineInputs {
                    iter,
                    texel: texel_color,
                    color0: job.color0,
                    color1: job.color1,
                },
            );
            let mut r = combined.r();
            let mut g = combined.g();
            let mut b = combined.b();
            let a = combined.a();

            // chroma key
            if fbzmode.enable_chromakey() {
                if !job.chromarange.enable() {
                    if (combined.0 ^ job.chromakey.0) & 0x00ff_ffff == 0 {
                        stats.chroma_fail += 1;
                        break 'pixel;
                    }
                } else {
                    let range = Argb(job.chromarange.0);
                    let mut results =
                        (b >= job.chromakey.b() && b <= range.b()) as u32;
                    results ^= job.chromarange.blue_exclusive();
                    results <<= 1;
                    results |= (g >= job.chromakey.g() && g <= range.g()) as u32;
                    results ^= job.chromarange.green_exclusive();
                    results <<= 1;
                    results |= (r >= job.chromakey.r() && r <= range.r()) as u32;
                    results ^= job.chromarange.red_exclusive();
                    let fail = if job.chromarange.union_mode() {
                        results != 0
                    } else {
                        results == 7
                    };
                    if fail {
                        stats.chroma_fail += 1;
                        break 'pixel;
                    }
                }
            }

            // alpha mask
            if fbzmode.enable_alpha_mask() && a & 1 == 0 {
                stats.afunc_fail += 1;
                break 'pixel;
            }

            // alpha test
            if alphamode.alphatest() {
                let reference = alphamode.alpharef();
                let pass = match alphamode.alphafunction() {
                    0 => false,
                    1 => a < reference,
                    2 => a == reference,
                    3 => a <= reference,
                    4 => a > reference,
                    5 => a != reference,
                    6 => a >= reference,
                    _ => true,
                };
                if !pass {
                    stats.afunc_fail += 1;
                    break 'pixel;
                }
            }

            // fog
            if fogmode.enable_fog() {
                let (mut fr, mut fg, mut fb);
                if fogmode.fog_constant() {
                    fr = job.fogcolor.r();
                    fg = job.fogcolor.g();
                    fb = job.fogcolor.b();
                } else {
                    if !fogmode.fog_add() {
                        fr = job.fogcolor.r();
                        fg = job.fogcolor.g();
                        fb = job.fogcolor.b();
                    } else {
                        fr = 0;
                        fg = 0;
                        fb = 0;
                    }
                    if !fogmode.fog_mult() {
                        fr -= r;
                        fg -= g;
                        fb -= b;
                    }
                    let fogblend = match fogmode.fog_zalpha() {
                        0 => {
                            // fog table indexed by the top 6 bits of the
                            // w float, with a dithered delta in between
                            let idx = (wfloat >> 10) as usize & 0x3f;
                            let delta = job.fogdelta[idx] as i32;
                            let mut deltaval = delta * ((wfloat >> 2) & 0xff);
                            if fogmode.fog_zones() && delta & 2 != 0 {
                                deltaval = -deltaval;
                            }
                            deltaval >>= 6;
                            if fogmode.fog_dither() {
                                deltaval += dither4[(x & 3) as usize] as i32;
                            }
                            deltaval >>= 4;
                            job.fogblend[idx] as i32 + deltaval
                        }
                        1 => clamp_u8(ia >> 12) as i32,
                        2 => (iz >> 12).clamp(0, 0xffff) >> 8,
                        _ => ((iw >> 48) as i32).clamp(0, 0xff),
                    } + 1;
                    fr = (fr * fogblend) >> 8;
                    fg = (fg * fogblend) >> 8;
                    fb = (fb * fogblend) >> 8;
                }
                if !fogmode.fog_mult() {
                    r += fr;
                    g += fg;
                    b += fb;
                } else {
                    r = fr;
                    g = fg;
                    b = fb;
                }
                r = r.clamp(0, 0xff);
                g = g.clamp(0, 0xff);
                b = b.clamp(0, 0xff);
            }

            // alpha blend against the destination pixel
            let mut a = a;
            if alphamode.alphablend() {
                let dst = Argb(tables.rgb565[job.fb.get(didx) as usize]);
                let mut dr = dst.r();
                let mut dg = dst.g();
                let mut db = dst.b();
                let da = if fbzmode.enable_alpha_planes() {
                    (job.fb.get(aidx) & 0xff) as i32
                } else {
                    0xff
                };
                if fbzmode.alpha_dither_subtract() {
                    let dith = drow[(x & 3) as usize] as i32;
                    dr = ((dr << 1) + 15 - dith) >> 1;
                    dg = ((dg << 2) + 15 - dith) >> 2;
                    db = ((db << 1) + 15 - dith) >> 1;
                }
                let src_sel = alphamode.srcrgbblend();
                let dst_sel = alphamode.dstrgbblend();
                let sr = blend_factor(src_sel, r, a, dr, da);
                let sg = blend_factor(src_sel, g, a, dg, da);
                let sb = blend_factor(src_sel, b, a, db, da);
                let tr = blend_factor(dst_sel, dr, a, r, da);
                let tg = blend_factor(dst_sel, dg, a, g, da);
                let tb = blend_factor(dst_sel, db, a, b, da);
                r = (sr + tr).clamp(0, 0xff);
                g = (sg + tg).clamp(0, 0xff);
                b = (sb + tb).clamp(0, 0xff);
                let sa = blend_factor(alphamode.srcalphablend(), a, a, da, da);
                let ta = blend_factor(alphamode.dstalphablend(), da, a, a, da);
                a = (sa + ta).clamp(0, 0xff);
            }

            // dither to 5-6-5 and write
            if fbzmode.rgb_buffer_mask() {
                let (r5, g6, b5);
                if fbzmode.enable_dithering() {
                    let dith = drow[(x & 3) as usize] as usize;
                    r5 = tables.dither_rb[dith][r as usize] as u16;
                    g6 = tables.dither_g[dith][g as usize] as u16;
                    b5 = tables.dither_rb[dith][b as usize] as u16;
                } else {
                    r5 = (r >> 3) as u16;
                    g6 = (g >> 2) as u16;
                    b5 = (b >> 3) as u16;
                }
                job.fb.set(didx, (r5 << 11) | (g6 << 5) | b5);
            }
            if fbzmode.aux_buffer_mask() {
                let auxval = if fbzmode.enable_alpha_planes() {
                    a as u16
                } else {
                    depthval as u16
                };
                job.fb.set(aidx, auxval);
            }
            stats.pixels_out += 1;
        }

        ir = ir.wrapping_add(job.drdx);
        ig = ig.wrapping_add(job.dgdx);
        ib = ib.wrapping_add(job.dbdx);
        ia = ia.wrapping_add(job.dadx);
        iz = iz.wrapping_add(job.dzdx);
        iw = iw.wrapping_add(job.dwdx);
        for i in 0..2 {
            ts[i] = ts[i].wrapping_add(tdx[i].0);
            tt[i] = tt[i].wrapping_add(tdx[i].1);
            tw[i] = tw[i].wrapping_add(tdx[i].2);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::voodoo::regs::FbzColorPath as Cp;

    fn inputs() -> CombineInputs {
        CombineInputs {
            iter: Argb::from_channels(0x80, 0x10, 0x20, 0x30),
            texel: Argb::from_channels(0x40, 0xff, 0x00, 0x80),
            color0: Argb::from_channels(0x11, 0x22, 0x33, 0x44),
            color1: Argb::from_channels(0x55, 0x66, 0x77, 0x88),
        }
    }

    fn path(bits: &[(crate::core::voodoo::regs::Field, u32)]) -> Cp {
        let mut word = 0;
        for (field, value) in bits {
            word = field.set(word, *value);
        }
        Cp(word)
    }

    #[test]
    fn passthrough_iterated_color() {
        // other = iterated, factor = one: zero_other off, mselect 0,
        // reverse off -> blend 0xff
        let cp = path(&[]);
        let out = color_combine(cp, &inputs());
        assert_eq!(out, Argb::from_channels(0x80, 0x10, 0x20, 0x30));
    }

    #[test]
    fn texture_select_passthrough() {
        let cp = path(&[(Cp::CC_RGBSELECT, 1), (Cp::CC_ASELECT, 1)]);
        let out = color_combine(cp, &inputs());
        assert_eq!(out, Argb::from_channels(0x40, 0xff, 0x00, 0x80));
    }

    #[test]
    fn constant_color_from_color1() {
        let cp = path(&[(Cp::CC_RGBSELECT, 2), (Cp::CC_ASELECT, 2)]);
        let out = color_combine(cp, &inputs());
        assert_eq!(out, Argb::from_channels(0x55, 0x66, 0x77, 0x88));
    }

    #[test]
    fn modulate_texture_by_iterated() {
        // out = texel * iterated: other = texture, factor = local
        // (mselect 1, reverse on), local = iterated
        let cp = path(&[
            (Cp::CC_RGBSELECT, 1),
            (Cp::CC_MSELECT, 1),
            (Cp::CC_REVERSE_BLEND, 1),
        ]);
        let out = color_combine(cp, &inputs());
        // 0xff * (0x10+1) >> 8 = 0x10
        assert_eq!(out.r(), 0x10);
        assert_eq!(out.g(), 0x00);
        // 0x80 * 0x31 >> 8 = 0x18
        assert_eq!(out.b(), 0x18);
    }

    #[test]
    fn blend_function_decal() {
        // out = other * f + local * (1 - f), f = texture alpha:
        // sub_clocal, mselect = texture alpha, reverse on, add clocal
        let cp = path(&[
            (Cp::CC_RGBSELECT, 2),
            (Cp::CC_SUB_CLOCAL, 1),
            (Cp::CC_MSELECT, 4),
            (Cp::CC_REVERSE_BLEND, 1),
            (Cp::CC_ADD_ACLOCAL, 1),
        ]);
        let out = color_combine(cp, &inputs());
        // r: (0x66 - 0x10) * 0x41 >> 8 + 0x10 = 0x15 + 0x10
        assert_eq!(out.r(), 0x25);
    }

    #[test]
    fn invert_output() {
        let cp = path(&[(Cp::CC_INVERT_OUTPUT, 1)]);
        let out = color_combine(cp, &inputs());
        assert_eq!(out.r(), 0x10 ^ 0xff);
        assert_eq!(out.a(), 0x80);
    }

    #[test]
    fn localselect_override_uses_texel_alpha_bit() {
        // texel alpha 0x40 has bit 7 clear -> local stays iterated;
        // function LOCAL outputs c_local
        let cp = path(&[
            (Cp::CC_ZERO_OTHER, 1),
            (Cp::CC_LOCALSELECT, 1),
            (Cp::CC_LOCALSELECT_OVERRIDE, 1),
            (Cp::CC_ADD_ACLOCAL, 1),
        ]);
        let out = color_combine(cp, &inputs());
        assert_eq!(out.r(), 0x10);

        let mut inp = inputs();
        inp.texel = Argb::from_channels(0x80, 0, 0, 0);
        let out = color_combine(cp, &inp);
        assert_eq!(out.r(), 0x22);
    }

    #[test]
    fn blend_factors_match_the_hardware_set() {
        // ZERO and ONE
        assert_eq!(blend_factor(0, 0x80, 0xff, 0x40, 0x20), 0);
        assert_eq!(blend_factor(4, 0x80, 0xff, 0x40, 0x20), 0x80);
        // source alpha saturates at one
        assert_eq!(blend_factor(1, 0x80, 0xff, 0x40, 0x20), 0x80);
        assert_eq!(blend_factor(1, 0x80, 0x00, 0x40, 0x20), 0);
        // one minus source alpha
        assert_eq!(blend_factor(5, 0x80, 0x00, 0x40, 0x20), 0x80);
        assert_eq!(blend_factor(5, 0x80, 0xff, 0x40, 0x20), 0);
        // destination color
        assert_eq!(blend_factor(2, 0xff, 0, 0x7f, 0), 0x7f);
        // alpha saturate picks min(sa, 1-da)
        assert_eq!(blend_factor(15, 0x80, 0xff, 0, 0xc0), 0x20);
        // Voodoo 2 only codes pass through as zero
        for code in 8..15 {
            assert_eq!(blend_factor(code, 0x80, 0x80, 0x80, 0x80), 0);
        }
    }
}
