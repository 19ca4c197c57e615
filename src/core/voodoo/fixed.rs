use std::sync::OnceLock;

/*
Fixed point formats used by the pixel pipeline:
  r,g,b,a,z   20.12 (i32)
  w           16.48 (i64) - iterated 1/w from the vertex stream
  s,t         14.18 (i64) - texel coordinates at the largest mipmap
  lod         .8   (i32)
The reciprocal/log lookup mirrors the hardware divider: normalize the
input to a 32 bit mantissa, take the top 10 bits into a 1024 entry table
of 1/m and log2(m) in .22, interpolate with the next 8 bits.
 */

const RECIPLOG_LOOKUP_BITS: u32 = 10;
const RECIPLOG_LOOKUP_PREC: u32 = 22;
const LOG_OUTPUT_PREC: u32 = 8;

/// Reciprocal is scaled so that `(iter_s * recip) >> 29` yields 14.18
/// texel coordinates when `iter_w` is 16.48.
const RECIP_BASE_SHIFT: i32 = 24;
/// Keeps `iter_s * recip` inside an i64 for any representable w.
const RECIP_MAX_SHIFT: i32 = 24;

/// Sentinel log2 for a zero input (1000 in .8).
pub const RECIPLOG_ZERO_LOG: i32 = 1000 << LOG_OUTPUT_PREC;

static RECIPLOG: OnceLock<Vec<(u32, u32)>> = OnceLock::new();

fn reciplog_table() -> &'static [(u32, u32)] {
    RECIPLOG.get_or_init(|| {
        let entries = 1usize << RECIPLOG_LOOKUP_BITS;
        let mut table = Vec::with_capacity(entries + 1);
        for i in 0..=entries as u64 {
            // mantissa m = 1 + i/1024, both values in .22
            let recip = ((1u64 << 32) / (entries as u64 + i)) as u32;
            let log = ((1.0 + i as f64 / entries as f64).log2()
                * (1u64 << RECIPLOG_LOOKUP_PREC) as f64)
                .round() as u32;
            table.push((recip, log));
        }
        table
    })
}

/// Combined reciprocal and log2 of a 16.48 value.
///
/// Returns `1/v` scaled per `RECIP_BASE_SHIFT` and `log2(1/|v|)` in .8,
/// which is the quantity the LOD computation wants (w grows with
/// distance once the iterated 1/w is inverted). A zero input yields a
/// saturated reciprocal and the sentinel log. Error is within 1 ulp of
/// the interpolated table.
pub fn fast_reciplog(v: i64) -> (i64, i32) {
    let neg = v < 0;
    let mut raw = v.unsigned_abs();
    if raw == 0 {
        let recip = 0x7fff_ffff;
        return (if neg { -recip } else { recip }, RECIPLOG_ZERO_LOG);
    }

    // bring the value under 32 bits, then shift the leading one up to bit 31
    let mut exp: i32 = 0;
    while raw >> 32 != 0 {
        raw >>= 16;
        exp -= 16;
    }
    let mut temp = raw as u32;
    let lz = temp.leading_zeros() as i32;
    temp <<= lz;
    exp += lz;
    // temp in [2^31, 2^32): real value = (temp / 2^31) * 2^-(exp + 17)

    let table = reciplog_table();
    let index = ((temp >> (31 - RECIPLOG_LOOKUP_BITS)) & ((1 << RECIPLOG_LOOKUP_BITS) - 1)) as usize;
    let interp = ((temp >> (31 - RECIPLOG_LOOKUP_BITS - 8)) & 0xff) as u64;

    let (r0, l0) = table[index];
    let (r1, l1) = table[index + 1];
    let recip22 = (r0 as u64 * (0x100 - interp) + r1 as u64 * interp) >> 8;
    let log22 = (l0 as u64 * (0x100 - interp) + l1 as u64 * interp) >> 8;

    let round = 1u64 << (RECIPLOG_LOOKUP_PREC - LOG_OUTPUT_PREC - 1);
    let log2 = ((exp + 17) << LOG_OUTPUT_PREC)
        - (((log22 + round) >> (RECIPLOG_LOOKUP_PREC - LOG_OUTPUT_PREC)) as i32);

    let shift = (exp + RECIP_BASE_SHIFT).min(RECIP_MAX_SHIFT);
    let recip = left_shift_signed(recip22 as i64, shift);
    (if neg { -recip } else { recip }, log2)
}

/// Left shift for non-negative counts, arithmetic right shift otherwise.
#[inline]
pub fn left_shift_signed(v: i64, n: i32) -> i64 {
    if n >= 0 {
        v << n.min(63)
    } else {
        v >> (-n).min(63)
    }
}

#[inline]
pub fn clamp_to_i32(v: i64) -> i32 {
    v.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

#[inline]
pub fn clamp_u8(v: i32) -> u8 {
    v.clamp(0, 0xff) as u8
}

#[inline]
pub fn clamp_u16(v: i32) -> u16 {
    v.clamp(0, 0xffff) as u16
}

/// 16 bit "w float" used for depth and fog: 4 bit exponent, 12 bit
/// inverted mantissa, saturating at both ends. Input is iterated 16.48 w.
pub fn wfloat_from_iterw(iterw: i64) -> i32 {
    if iterw < 0 || (iterw >> 48) != 0 {
        return 0x0000;
    }
    let temp = (iterw >> 16) as u32;
    if temp & 0xffff_0000 == 0 {
        return 0xffff;
    }
    let exp = temp.leading_zeros() as i32;
    let mut wfloat = (exp << 12) | (((!temp >> (19 - exp)) & 0xfff) as i32);
    if wfloat < 0xffff {
        wfloat += 1;
    }
    wfloat
}

/// Same float encoding applied to iterated 20.12 z when the depth mode
/// asks for floating point z.
pub fn zfloat_from_iterz(iterz: i32) -> i32 {
    if (iterz as u32) & 0xf000_0000 != 0 {
        return 0x0000;
    }
    let temp = (iterz as u32) << 4;
    if temp & 0xffff_0000 == 0 {
        return 0xffff;
    }
    let exp = temp.leading_zeros() as i32;
    let mut depth = (exp << 12) | (((!temp >> (19 - exp)) & 0xfff) as i32);
    if depth < 0xffff {
        depth += 1;
    }
    depth
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reciplog_of_one() {
        // 1.0 in 16.48
        let (recip, log2) = fast_reciplog(1i64 << 48);
        assert_eq!(log2, 0);
        assert_eq!(recip, 1i64 << 29);
    }

    #[test]
    fn reciplog_of_powers_of_two() {
        for e in 1..10 {
            let (recip, log2) = fast_reciplog(1i64 << (48 + e));
            assert_eq!(log2, -(e << 8) as i32, "log2 of 2^{e}");
            assert_eq!(recip, 1i64 << (29 - e), "recip of 2^{e}");
            let (recip, log2) = fast_reciplog(1i64 << (48 - e));
            assert_eq!(log2, (e << 8) as i32, "log2 of 2^-{e}");
            assert_eq!(recip, 1i64 << (29 + e), "recip of 2^-{e}");
        }
    }

    #[test]
    fn reciplog_interpolates_between_entries() {
        // 1.5 in 16.48: log2 = 0.585, recip = 2/3
        let (recip, log2) = fast_reciplog(3i64 << 47);
        let expect_log = -(0.584_962_5 * 256.0) as i32;
        assert!((log2 - expect_log).abs() <= 1, "log2 {log2} vs {expect_log}");
        let expect_recip = (2.0 / 3.0 * (1i64 << 29) as f64) as i64;
        assert!((recip - expect_recip).abs() <= (1 << 8), "recip {recip} vs {expect_recip}");
    }

    #[test]
    fn reciplog_zero_is_saturated() {
        let (recip, log2) = fast_reciplog(0);
        assert_eq!(recip, 0x7fff_ffff);
        assert_eq!(log2, RECIPLOG_ZERO_LOG);
    }

    #[test]
    fn reciplog_restores_sign() {
        let (pos, plog) = fast_reciplog(1i64 << 47);
        let (neg, nlog) = fast_reciplog(-(1i64 << 47));
        assert_eq!(pos, -neg);
        assert_eq!(plog, nlog);
    }

    #[test]
    fn signed_shift_both_directions() {
        assert_eq!(left_shift_signed(3, 4), 48);
        assert_eq!(left_shift_signed(48, -4), 3);
        assert_eq!(left_shift_signed(-48, -4), -3);
    }

    #[test]
    fn clamps_saturate() {
        assert_eq!(clamp_to_i32(i64::MAX), i32::MAX);
        assert_eq!(clamp_to_i32(i64::MIN), i32::MIN);
        assert_eq!(clamp_u8(-1), 0);
        assert_eq!(clamp_u8(256), 255);
        assert_eq!(clamp_u16(0x12345), 0xffff);
    }

    #[test]
    fn wfloat_extremes() {
        // w >= 1.0 saturates to the near plane
        assert_eq!(wfloat_from_iterw(1i64 << 48), 0);
        assert_eq!(wfloat_from_iterw(-1), 0);
        // tiny w saturates to the far plane
        assert_eq!(wfloat_from_iterw(1), 0xffff);
        assert_eq!(wfloat_from_iterw(1i64 << 31), 0xffff);
    }

    #[test]
    fn wfloat_is_monotonic_in_depth() {
        // larger 1/w (closer) must give a smaller depth word
        let near = wfloat_from_iterw(1i64 << 47); // 1/w = 0.5
        let far = wfloat_from_iterw(1i64 << 40); // 1/w = 2^-8
        assert!(near < far, "near {near:04x} far {far:04x}");
    }
}
