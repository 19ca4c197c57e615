use tracing::{debug, warn};

use super::{with_context, GrOriginLocation};
use crate::core::voodoo::tables::{
    argb_to_rgb565, rgb555_to_rgb565, rgb565_to_argb, rgb565_to_rgb555,
};

/*
Linear frame buffer access. Two byte write modes hand out a pointer
straight into the native buffer; wider modes go through a shadow buffer
whose stride matches the requested format (width * bpp) and which is
format converted on unlock. Returning a 16 bit stride for a 32 bit lock
corrupts the application's row layout, so the acknowledged stride always
follows the write mode.
 */

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GrBuffer {
    FrontBuffer,
    BackBuffer,
    AuxBuffer,
}

impl GrBuffer {
    fn slot(self) -> usize {
        match self {
            GrBuffer::FrontBuffer => 0,
            GrBuffer::BackBuffer => 1,
            GrBuffer::AuxBuffer => 2,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GrLock {
    ReadOnly,
    WriteOnly,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GrLfbWriteMode {
    Rgb565,
    Rgb555,
    Argb1555,
    Rgb888,
    Argb8888,
    Z32,
}

impl GrLfbWriteMode {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            GrLfbWriteMode::Rgb565 | GrLfbWriteMode::Rgb555 | GrLfbWriteMode::Argb1555 => 2,
            GrLfbWriteMode::Rgb888 | GrLfbWriteMode::Argb8888 | GrLfbWriteMode::Z32 => 4,
        }
    }
}

/// Result of a successful lock. The pointer stays valid until the
/// matching unlock; the context must not be used for drawing meanwhile.
#[derive(Debug)]
pub struct LfbInfo {
    pub lfb_ptr: *mut u8,
    pub stride_in_bytes: usize,
    pub write_mode: GrLfbWriteMode,
    pub origin: GrOriginLocation,
}

#[derive(Copy, Clone, Debug)]
struct LockRecord {
    lock_type: GrLock,
    write_mode: GrLfbWriteMode,
}

/// Outstanding locks and the reusable shadow allocation, which only
/// ever grows to the largest request seen.
pub struct LfbState {
    locks: [Option<LockRecord>; 3],
    shadow: Vec<u8>,
}

impl Default for LfbState {
    fn default() -> Self {
        Self {
            locks: [None; 3],
            shadow: Vec::new(),
        }
    }
}

pub fn gr_lfb_lock(
    lock_type: GrLock,
    buffer: GrBuffer,
    write_mode: GrLfbWriteMode,
    origin: GrOriginLocation,
    _pixel_pipeline: bool,
) -> Option<LfbInfo> {
    with_context(|ctx| {
        let slot = buffer.slot();
        if ctx.lfb.locks[slot].is_some() {
            warn!(?buffer, "lock on an already locked buffer");
            ctx.voodoo.stats.invalid_params += 1;
            return None;
        }

        let width = ctx.voodoo.fbi.width;
        let height = ctx.voodoo.fbi.height;
        let rowpixels = ctx.voodoo.fbi.rowpixels;
        let base = match buffer {
            GrBuffer::FrontBuffer => ctx.voodoo.color_buffer_offset(0).unwrap(),
            GrBuffer::BackBuffer => ctx.voodoo.color_buffer_offset(1).unwrap(),
            GrBuffer::AuxBuffer => ctx.voodoo.fbi.auxoffs,
        };

        let bpp = write_mode.bytes_per_pixel();
        let info = if bpp == 2 {
            LfbInfo {
                lfb_ptr: ctx.voodoo.fbi.fb[base..].as_mut_ptr() as *mut u8,
                stride_in_bytes: rowpixels * 2,
                write_mode,
                origin: effective_origin(origin, ctx.origin),
            }
        } else {
            let needed = width * height * bpp;
            if ctx.lfb.shadow.len() < needed {
                ctx.lfb.shadow.resize(needed, 0);
            }
            if lock_type == GrLock::ReadOnly {
                // convert the native pixels up into the shadow
                for y in 0..height {
                    let src_row = base + ctx.voodoo.row_index(y as i32) * rowpixels;
                    for x in 0..width {
                        let value: u32 = match (buffer, write_mode) {
                            (GrBuffer::AuxBuffer, _) => {
                                ctx.voodoo.fbi.fb[src_row + x] as u32
                            }
                            (_, _) => rgb565_to_argb(ctx.voodoo.fbi.fb[src_row + x]),
                        };
                        let at = (y * width + x) * 4;
                        ctx.lfb.shadow[at..at + 4].copy_from_slice(&value.to_le_bytes());
                    }
                }
            }
            LfbInfo {
                lfb_ptr: ctx.lfb.shadow.as_mut_ptr(),
                stride_in_bytes: width * bpp,
                write_mode,
                origin: effective_origin(origin, ctx.origin),
            }
        };

        ctx.lfb.locks[slot] = Some(LockRecord {
            lock_type,
            write_mode,
        });
        debug!(?lock_type, ?buffer, ?write_mode, stride = info.stride_in_bytes, "lfb lock");
        Some(info)
    })
    .flatten()
}

fn effective_origin(requested: GrOriginLocation, context: GrOriginLocation) -> GrOriginLocation {
    if requested == GrOriginLocation::Any {
        context
    } else {
        requested
    }
}

/// Commits a shadow buffer (write locks in wide modes) and releases the
/// lock. Unlocking a buffer that is not locked is a no-op.
pub fn gr_lfb_unlock(lock_type: GrLock, buffer: GrBuffer) -> bool {
    with_context(|ctx| {
        let slot = buffer.slot();
        let Some(record) = ctx.lfb.locks[slot] else {
            return false;
        };
        if record.lock_type != lock_type {
            return false;
        }

        if record.lock_type == GrLock::WriteOnly && record.write_mode.bytes_per_pixel() > 2 {
            let width = ctx.voodoo.fbi.width;
            let height = ctx.voodoo.fbi.height;
            let rowpixels = ctx.voodoo.fbi.rowpixels;
            let base = match buffer {
                GrBuffer::FrontBuffer => ctx.voodoo.color_buffer_offset(0).unwrap(),
                GrBuffer::BackBuffer => ctx.voodoo.color_buffer_offset(1).unwrap(),
                GrBuffer::AuxBuffer => ctx.voodoo.fbi.auxoffs,
            };
            for y in 0..height {
                let dst_row = base + ctx.voodoo.row_index(y as i32) * rowpixels;
                for x in 0..width {
                    let at = (y * width + x) * 4;
                    let word = u32::from_le_bytes(
                        ctx.lfb.shadow[at..at + 4].try_into().unwrap(),
                    );
                    let native = match (buffer, record.write_mode) {
                        (GrBuffer::AuxBuffer, _) | (_, GrLfbWriteMode::Z32) => {
                            (word & 0xffff) as u16
                        }
                        _ => argb_to_rgb565(word),
                    };
                    ctx.voodoo.fbi.fb[dst_row + x] = native;
                }
            }
        }
        ctx.lfb.locks[slot] = None;
        debug!(?buffer, "lfb unlock");
        true
    })
    .unwrap_or(false)
}

/// Source formats accepted by `gr_lfb_write_region`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GrLfbSrcFmt {
    Rgb565,
    Rgb555,
    Argb1555,
    Rgb888,
    Argb8888,
    /// raw 16 bit words, for the aux buffer
    Raw16,
}

impl GrLfbSrcFmt {
    fn bytes_per_pixel(self) -> usize {
        match self {
            GrLfbSrcFmt::Rgb565 | GrLfbSrcFmt::Rgb555 | GrLfbSrcFmt::Argb1555 | GrLfbSrcFmt::Raw16 => 2,
            GrLfbSrcFmt::Rgb888 | GrLfbSrcFmt::Argb8888 => 4,
        }
    }
}

/// Converting bulk write of a rectangle.
#[allow(clippy::too_many_arguments)]
pub fn gr_lfb_write_region(
    buffer: GrBuffer,
    dst_x: usize,
    dst_y: usize,
    src_format: GrLfbSrcFmt,
    width: usize,
    height: usize,
    src_stride: usize,
    data: &[u8],
) -> bool {
    with_context(|ctx| {
        let fb_width = ctx.voodoo.fbi.width;
        let fb_height = ctx.voodoo.fbi.height;
        let bpp = src_format.bytes_per_pixel();
        if dst_x + width > fb_width
            || dst_y + height > fb_height
            || src_stride < width * bpp
            || data.len() < src_stride * height
        {
            ctx.voodoo.stats.invalid_params += 1;
            warn!(dst_x, dst_y, width, height, "lfb write region rejected");
            return false;
        }
        let rowpixels = ctx.voodoo.fbi.rowpixels;
        let base = match buffer {
            GrBuffer::FrontBuffer => ctx.voodoo.color_buffer_offset(0).unwrap(),
            GrBuffer::BackBuffer => ctx.voodoo.color_buffer_offset(1).unwrap(),
            GrBuffer::AuxBuffer => ctx.voodoo.fbi.auxoffs,
        };
        for y in 0..height {
            let src_row = &data[y * src_stride..];
            let dst_row = base + ctx.voodoo.row_index((dst_y + y) as i32) * rowpixels + dst_x;
            for x in 0..width {
                let native = match src_format {
                    GrLfbSrcFmt::Rgb565 | GrLfbSrcFmt::Raw16 => {
                        u16::from_le_bytes([src_row[x * 2], src_row[x * 2 + 1]])
                    }
                    GrLfbSrcFmt::Rgb555 | GrLfbSrcFmt::Argb1555 => rgb555_to_rgb565(
                        u16::from_le_bytes([src_row[x * 2], src_row[x * 2 + 1]]),
                    ),
                    GrLfbSrcFmt::Rgb888 | GrLfbSrcFmt::Argb8888 => {
                        let word = u32::from_le_bytes(
                            src_row[x * 4..x * 4 + 4].try_into().unwrap(),
                        );
                        argb_to_rgb565(word)
                    }
                };
                ctx.voodoo.fbi.fb[dst_row + x] = native;
            }
        }
        true
    })
    .unwrap_or(false)
}

/// Destination formats produced by `gr_lfb_read_region`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GrLfbDstFmt {
    Rgb565,
    Rgb555,
    Argb8888,
    Raw16,
}

impl GrLfbDstFmt {
    fn bytes_per_pixel(self) -> usize {
        match self {
            GrLfbDstFmt::Rgb565 | GrLfbDstFmt::Rgb555 | GrLfbDstFmt::Raw16 => 2,
            GrLfbDstFmt::Argb8888 => 4,
        }
    }
}

/// Converting bulk read of a rectangle.
#[allow(clippy::too_many_arguments)]
pub fn gr_lfb_read_region(
    buffer: GrBuffer,
    src_x: usize,
    src_y: usize,
    dst_format: GrLfbDstFmt,
    width: usize,
    height: usize,
    dst_stride: usize,
    out: &mut [u8],
) -> bool {
    with_context(|ctx| {
        let fb_width = ctx.voodoo.fbi.width;
        let fb_height = ctx.voodoo.fbi.height;
        let bpp = dst_format.bytes_per_pixel();
        if src_x + width > fb_width
            || src_y + height > fb_height
            || dst_stride < width * bpp
            || out.len() < dst_stride * height
        {
            ctx.voodoo.stats.invalid_params += 1;
            warn!(src_x, src_y, width, height, "lfb read region rejected");
            return false;
        }
        let rowpixels = ctx.voodoo.fbi.rowpixels;
        let base = match buffer {
            GrBuffer::FrontBuffer => ctx.voodoo.color_buffer_offset(0).unwrap(),
            GrBuffer::BackBuffer => ctx.voodoo.color_buffer_offset(1).unwrap(),
            GrBuffer::AuxBuffer => ctx.voodoo.fbi.auxoffs,
        };
        for y in 0..height {
            let src_row = base + ctx.voodoo.row_index((src_y + y) as i32) * rowpixels + src_x;
            let dst_row = &mut out[y * dst_stride..];
            for x in 0..width {
                let pix = ctx.voodoo.fbi.fb[src_row + x];
                match dst_format {
                    GrLfbDstFmt::Rgb565 | GrLfbDstFmt::Raw16 => {
                        dst_row[x * 2..x * 2 + 2].copy_from_slice(&pix.to_le_bytes());
                    }
                    GrLfbDstFmt::Rgb555 => {
                        dst_row[x * 2..x * 2 + 2]
                            .copy_from_slice(&rgb565_to_rgb555(pix).to_le_bytes());
                    }
                    GrLfbDstFmt::Argb8888 => {
                        dst_row[x * 4..x * 4 + 4]
                            .copy_from_slice(&rgb565_to_argb(pix).to_le_bytes());
                    }
                }
            }
        }
        true
    })
    .unwrap_or(false)
}
