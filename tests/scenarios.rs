use std::sync::Mutex;

use r_voodoo::glide::lfb::*;
use r_voodoo::glide::state::*;
use r_voodoo::glide::texture::*;
use r_voodoo::glide::vertex::*;
use r_voodoo::glide::*;
use r_voodoo::renderer::NullSink;

/*
End to end scenarios through the public Glide surface. The context is
process wide, so every test takes the serialization lock and opens a
fresh 640x480 window.
 */

static LOCK: Mutex<()> = Mutex::new(());

fn glide_test(f: impl FnOnce()) {
    let _guard = LOCK.lock().unwrap_or_else(|e| e.into_inner());
    gr_glide_init();
    gr_sst_win_open(
        Box::new(NullSink),
        GrScreenResolution::R640x480,
        GrScreenRefresh::R60Hz,
        GrColorFormat::Argb,
        GrOriginLocation::UpperLeft,
        2,
        1,
    )
    .expect("win open");
    gr_vertex_layout(GrVertexParam::Xy, 0, GrParamMode::Enable);
    gr_vertex_layout(GrVertexParam::Rgb, 8, GrParamMode::Enable);
    f();
    gr_sst_win_close();
    gr_glide_shutdown();
}

fn read_pixel(buffer: GrBuffer, x: usize, y: usize) -> u16 {
    let mut out = [0u8; 2];
    assert!(gr_lfb_read_region(
        buffer,
        x,
        y,
        GrLfbDstFmt::Rgb565,
        1,
        1,
        2,
        &mut out
    ));
    u16::from_le_bytes(out)
}

fn read_aux(x: usize, y: usize) -> u16 {
    let mut out = [0u8; 2];
    assert!(gr_lfb_read_region(
        GrBuffer::AuxBuffer,
        x,
        y,
        GrLfbDstFmt::Raw16,
        1,
        1,
        2,
        &mut out
    ));
    u16::from_le_bytes(out)
}

fn channels(pix: u16) -> (i32, i32, i32) {
    (
        (((pix >> 11) & 0x1f) << 3) as i32,
        (((pix >> 5) & 0x3f) << 2) as i32,
        ((pix & 0x1f) << 3) as i32,
    )
}

fn iterated_color_combine() {
    gr_color_combine(
        GrCombineFunction::Local,
        GrCombineFactor::Zero,
        GrCombineLocal::Iterated,
        GrCombineOther::Iterated,
        false,
    );
    gr_alpha_combine(
        GrCombineFunction::Local,
        GrCombineFactor::Zero,
        GrCombineLocal::Iterated,
        GrCombineOther::Iterated,
        false,
    );
}

fn texture_combine() {
    gr_color_combine(
        GrCombineFunction::ScaleOther,
        GrCombineFactor::One,
        GrCombineLocal::Iterated,
        GrCombineOther::Texture,
        false,
    );
    gr_alpha_combine(
        GrCombineFunction::ScaleOther,
        GrCombineFactor::One,
        GrCombineLocal::Iterated,
        GrCombineOther::Texture,
        false,
    );
}

/// Axis aligned quad with optional per vertex extras appended after
/// x, y, r, g, b, drawn through the packed vertex path.
fn draw_quad(x0: f32, y0: f32, x1: f32, y1: f32, rgb: (f32, f32, f32), extra: &[f32]) {
    let mut data = Vec::new();
    for (x, y) in [(x0, y0), (x1, y0), (x1, y1), (x0, y1)] {
        data.extend_from_slice(&[x, y, rgb.0, rgb.1, rgb.2]);
        data.extend_from_slice(extra);
    }
    gr_draw_vertex_array_linear(GrPrimitive::TriangleFan, &data, (5 + extra.len()) * 4);
}

/// Textured quad mapping [s0,s1]x[t0,t1] across the rectangle.
fn draw_textured_quad(x0: f32, y0: f32, x1: f32, y1: f32, s1: f32, t1: f32) {
    let v = |x: f32, y: f32, s: f32, t: f32| vec![x, y, 255.0, 255.0, 255.0, s, t];
    let a = v(x0, y0, 0.0, 0.0);
    let b = v(x1, y0, s1, 0.0);
    let c = v(x1, y1, s1, t1);
    let d = v(x0, y1, 0.0, t1);
    gr_draw_vertex_array(
        GrPrimitive::TriangleFan,
        &[&a[..], &b[..], &c[..], &d[..]],
    );
}

#[test]
fn clear_and_present() {
    glide_test(|| {
        gr_buffer_clear(0x0000_0040, 0, 0xffff);
        gr_buffer_swap(1);
        // blue 0x40 truncates to five bits = 8
        for (x, y) in [(0, 0), (639, 0), (320, 240), (0, 479), (639, 479)] {
            assert_eq!(read_pixel(GrBuffer::FrontBuffer, x, y), 0x0008, "at {x},{y}");
            assert_eq!(read_aux(x, y), 0xffff, "aux at {x},{y}");
        }
    });
}

#[test]
fn single_colored_triangle() {
    glide_test(|| {
        iterated_color_combine();
        gr_buffer_clear(0, 0, 0);
        gr_draw_triangle(
            &[320.0, 100.0, 255.0, 0.0, 0.0],
            &[160.0, 380.0, 0.0, 255.0, 0.0],
            &[480.0, 380.0, 0.0, 0.0, 255.0],
        );
        // near the centroid all three weights approach 1/3
        let (r, g, b) = channels(read_pixel(GrBuffer::BackBuffer, 320, 287));
        for (name, c) in [("r", r), ("g", g), ("b", b)] {
            assert!((c - 85).abs() <= 8, "{name} = {c}");
        }
        // close to a vertex its color dominates
        let (r, g, b) = channels(read_pixel(GrBuffer::BackBuffer, 320, 110));
        assert!(r > 200 && g < 40 && b < 40, "near apex: {r},{g},{b}");
    });
}

#[test]
fn texture_passthrough_point_sampled() {
    glide_test(|| {
        texture_combine();
        gr_vertex_layout(GrVertexParam::St0, 20, GrParamMode::Enable);
        gr_buffer_clear(0, 0, 0);

        // distinct RGB565 color per row
        let mut data = Vec::with_capacity(16 * 16 * 2);
        let mut rows = [0u16; 16];
        for y in 0..16u16 {
            let pix = (y << 11) | ((y * 3) << 5) | (y * 2);
            rows[y as usize] = pix;
            for _ in 0..16 {
                data.extend_from_slice(&pix.to_le_bytes());
            }
        }
        let info = GrTexInfo {
            small_lod_log2: 4,
            large_lod_log2: 4,
            aspect: GrAspectRatio::Aspect1x1,
            format: GrTextureFormat::Rgb565,
            data: &data,
        };
        gr_tex_download_mip_map(0, 0, GrMipMapLevelMask::Both, &info);
        gr_tex_source(0, 0, GrMipMapLevelMask::Both, &info);
        gr_tex_filter_mode(
            0,
            GrTextureFilterMode::PointSampled,
            GrTextureFilterMode::PointSampled,
        );
        gr_tex_combine(
            0,
            GrCombineFunction::Local,
            GrCombineFactor::Zero,
            GrCombineFunction::Local,
            GrCombineFactor::Zero,
            false,
            false,
        );

        draw_textured_quad(0.0, 0.0, 16.0, 16.0, 256.0, 256.0);
        for y in 0..16 {
            for x in 0..16 {
                assert_eq!(
                    read_pixel(GrBuffer::BackBuffer, x, y),
                    rows[y],
                    "texel {x},{y}"
                );
            }
        }
        // untouched outside the quad
        assert_eq!(read_pixel(GrBuffer::BackBuffer, 16, 0), 0);
    });
}

#[test]
fn alpha_blend_opaque_and_transparent() {
    glide_test(|| {
        texture_combine();
        gr_vertex_layout(GrVertexParam::St0, 20, GrParamMode::Enable);
        gr_alpha_blend_function(
            GrBlend::SrcAlpha,
            GrBlend::OneMinusSrcAlpha,
            GrBlend::One,
            GrBlend::Zero,
        );
        gr_tex_filter_mode(
            0,
            GrTextureFilterMode::PointSampled,
            GrTextureFilterMode::PointSampled,
        );
        gr_tex_combine(
            0,
            GrCombineFunction::Local,
            GrCombineFactor::Zero,
            GrCombineFunction::Local,
            GrCombineFactor::Zero,
            false,
            false,
        );
        let background = 0x0000_4000; // (0, 64, 0)
        let cleared = read_after_clear(background);

        // solid red, alpha = 1 (ARGB1555)
        let opaque: u16 = 0x8000 | (0x1f << 10);
        let pix = draw_16x16_textured(GrTextureFormat::Argb1555, opaque, background);
        assert_eq!(pix, 0xf800);

        // solid red, alpha = 0 (ARGB4444) leaves the background
        let transparent: u16 = 0x0f00;
        let pix = draw_16x16_textured(GrTextureFormat::Argb4444, transparent, background);
        assert_eq!(pix, cleared);
    });
}

fn read_after_clear(color: u32) -> u16 {
    gr_buffer_clear(color, 0, 0xffff);
    read_pixel(GrBuffer::BackBuffer, 8, 8)
}

fn draw_16x16_textured(format: GrTextureFormat, texel: u16, background: u32) -> u16 {
    gr_buffer_clear(background, 0, 0xffff);
    let mut data = Vec::with_capacity(16 * 16 * 2);
    for _ in 0..256 {
        data.extend_from_slice(&texel.to_le_bytes());
    }
    let info = GrTexInfo {
        small_lod_log2: 4,
        large_lod_log2: 4,
        aspect: GrAspectRatio::Aspect1x1,
        format,
        data: &data,
    };
    gr_tex_download_mip_map(0, 0, GrMipMapLevelMask::Both, &info);
    gr_tex_source(0, 0, GrMipMapLevelMask::Both, &info);
    draw_textured_quad(0.0, 0.0, 16.0, 16.0, 256.0, 256.0);
    read_pixel(GrBuffer::BackBuffer, 8, 8)
}

#[test]
fn depth_occlusion() {
    glide_test(|| {
        iterated_color_combine();
        gr_vertex_layout(GrVertexParam::Z, 20, GrParamMode::Enable);
        gr_depth_buffer_mode(GrDepthBufferMode::ZBuffer);
        gr_depth_buffer_function(GrCmpFnc::Less);
        gr_depth_mask(true);
        gr_buffer_clear(0, 0, 0xffff);

        // near quad first, far quad inside it second
        draw_quad(200.0, 200.0, 400.0, 400.0, (255.0, 0.0, 0.0), &[16384.0]);
        draw_quad(250.0, 250.0, 350.0, 350.0, (0.0, 255.0, 0.0), &[32768.0]);

        assert_eq!(read_pixel(GrBuffer::BackBuffer, 300, 300), 0xf800);
        // outside the small quad but inside the big one: still red
        assert_eq!(read_pixel(GrBuffer::BackBuffer, 210, 210), 0xf800);
        let stats = gr_render_stats().unwrap();
        assert!(stats.zfunc_fail > 0);

        // the depth buffer kept the near values
        assert_eq!(read_aux(300, 300), 16384);
    });
}

#[test]
fn lfb_stride_at_32_bit() {
    glide_test(|| {
        gr_buffer_clear(0, 0, 0);
        let info = gr_lfb_lock(
            GrLock::WriteOnly,
            GrBuffer::BackBuffer,
            GrLfbWriteMode::Argb8888,
            GrOriginLocation::UpperLeft,
            false,
        )
        .expect("lock");
        assert_eq!(info.stride_in_bytes, 2560);
        assert_eq!(info.write_mode, GrLfbWriteMode::Argb8888);

        // row-major gradient: x in red, y in green
        let pixels = unsafe {
            std::slice::from_raw_parts_mut(info.lfb_ptr as *mut u32, 640 * 480)
        };
        for y in 0..480usize {
            for x in 0..640usize {
                let r = (x / 3) as u32 & 0xff;
                let g = (y / 2) as u32 & 0xff;
                pixels[y * 640 + x] = 0xff00_0000 | (r << 16) | (g << 8);
            }
        }
        assert!(gr_lfb_unlock(GrLock::WriteOnly, GrBuffer::BackBuffer));

        // no wrap at x = 320: the right half carries the high red values
        let (r, g, _) = channels(read_pixel(GrBuffer::BackBuffer, 600, 100));
        assert!((r - 200).abs() <= 8, "r = {r}");
        assert!((g - 50).abs() <= 8, "g = {g}");
        let (r2, _, _) = channels(read_pixel(GrBuffer::BackBuffer, 10, 100));
        assert!(r2 <= 8, "r2 = {r2}");
    });
}

#[test]
fn lfb_565_roundtrip() {
    glide_test(|| {
        gr_buffer_clear(0, 0, 0);
        let mut pattern = Vec::with_capacity(32 * 8 * 2);
        for i in 0..(32 * 8) as u32 {
            pattern.extend_from_slice(&((i.wrapping_mul(2654435761)) as u16).to_le_bytes());
        }
        assert!(gr_lfb_write_region(
            GrBuffer::BackBuffer,
            100,
            50,
            GrLfbSrcFmt::Rgb565,
            32,
            8,
            64,
            &pattern
        ));
        let mut out = vec![0u8; 32 * 8 * 2];
        assert!(gr_lfb_read_region(
            GrBuffer::BackBuffer,
            100,
            50,
            GrLfbDstFmt::Rgb565,
            32,
            8,
            64,
            &mut out
        ));
        assert_eq!(pattern, out);
    });
}

#[test]
fn lock_misuse_is_rejected() {
    glide_test(|| {
        let first = gr_lfb_lock(
            GrLock::ReadOnly,
            GrBuffer::FrontBuffer,
            GrLfbWriteMode::Rgb565,
            GrOriginLocation::Any,
            false,
        );
        assert!(first.is_some());
        // double lock fails
        assert!(gr_lfb_lock(
            GrLock::ReadOnly,
            GrBuffer::FrontBuffer,
            GrLfbWriteMode::Rgb565,
            GrOriginLocation::Any,
            false,
        )
        .is_none());
        assert!(gr_lfb_unlock(GrLock::ReadOnly, GrBuffer::FrontBuffer));
        // unlock without a lock is a no-op
        assert!(!gr_lfb_unlock(GrLock::ReadOnly, GrBuffer::FrontBuffer));
    });
}

#[test]
fn clip_rejection_and_degenerate_triangles() {
    glide_test(|| {
        iterated_color_combine();
        gr_clip_window(100, 100, 200, 200);
        gr_buffer_clear(0, 0, 0);
        let before = gr_render_stats().unwrap();

        // fully outside the clip window
        gr_draw_triangle(
            &[300.0, 300.0, 255.0, 255.0, 255.0],
            &[400.0, 300.0, 255.0, 255.0, 255.0],
            &[350.0, 400.0, 255.0, 255.0, 255.0],
        );
        // zero area
        gr_draw_triangle(
            &[150.0, 150.0, 255.0, 255.0, 255.0],
            &[150.0, 150.0, 255.0, 255.0, 255.0],
            &[150.0, 150.0, 255.0, 255.0, 255.0],
        );
        let after = gr_render_stats().unwrap();
        assert_eq!(after.clip_rejected, before.clip_rejected + 1);
        assert_eq!(after.degenerate, before.degenerate + 1);
        assert_eq!(after.pixels_in, before.pixels_in);

        // a triangle crossing the window only writes inside it
        gr_draw_triangle(
            &[50.0, 50.0, 255.0, 255.0, 255.0],
            &[250.0, 50.0, 255.0, 255.0, 255.0],
            &[150.0, 250.0, 255.0, 255.0, 255.0],
        );
        assert_eq!(read_pixel(GrBuffer::BackBuffer, 150, 99), 0);
        assert_ne!(read_pixel(GrBuffer::BackBuffer, 150, 150), 0);
        assert_eq!(read_pixel(GrBuffer::BackBuffer, 99, 150), 0);
    });
}

#[test]
fn pixel_accounting_invariant() {
    glide_test(|| {
        iterated_color_combine();
        gr_buffer_clear(0, 0, 0);
        gr_reset_stats();

        // stipple away half the pixels with a checkerboard pattern
        gr_stipple_mode(GrStippleMode::Pattern);
        gr_stipple_pattern(0x5555_5555);
        gr_draw_triangle(
            &[100.0, 100.0, 255.0, 0.0, 0.0],
            &[300.0, 100.0, 255.0, 0.0, 0.0],
            &[200.0, 300.0, 255.0, 0.0, 0.0],
        );
        let stats = gr_render_stats().unwrap();
        assert!(stats.pixels_in > 0);
        assert!(stats.stipple_count > 0);
        assert_eq!(
            stats.pixels_in,
            stats.pixels_out
                + stats.zfunc_fail
                + stats.afunc_fail
                + stats.chroma_fail
                + stats.stipple_count
        );
    });
}

#[test]
fn chroma_key_rejects_matching_pixels() {
    glide_test(|| {
        iterated_color_combine();
        gr_buffer_clear(0, 0, 0);
        gr_chromakey_mode(true);
        gr_chromakey_value(0x00ff_0000);
        gr_reset_stats();

        // flat red triangle is entirely keyed out
        gr_draw_triangle(
            &[100.0, 100.0, 255.0, 0.0, 0.0],
            &[300.0, 100.0, 255.0, 0.0, 0.0],
            &[200.0, 300.0, 255.0, 0.0, 0.0],
        );
        let stats = gr_render_stats().unwrap();
        assert!(stats.chroma_fail > 0);
        assert_eq!(stats.pixels_out, 0);
        assert_eq!(read_pixel(GrBuffer::BackBuffer, 200, 150), 0);

        // a different color passes
        gr_draw_triangle(
            &[100.0, 100.0, 0.0, 0.0, 255.0],
            &[300.0, 100.0, 0.0, 0.0, 255.0],
            &[200.0, 300.0, 0.0, 0.0, 255.0],
        );
        assert_eq!(read_pixel(GrBuffer::BackBuffer, 200, 150), 0x001f);
    });
}

#[test]
fn swap_preserves_displayed_pixels() {
    glide_test(|| {
        gr_buffer_clear(0x00ff_ffff, 0, 0);
        gr_buffer_swap(1);
        let displayed = read_pixel(GrBuffer::FrontBuffer, 320, 240);
        assert_eq!(displayed, 0xffff);

        // drawing into the new back buffer must not touch the front
        iterated_color_combine();
        gr_buffer_clear(0, 0, 0);
        gr_draw_triangle(
            &[100.0, 100.0, 255.0, 0.0, 0.0],
            &[500.0, 100.0, 255.0, 0.0, 0.0],
            &[300.0, 400.0, 255.0, 0.0, 0.0],
        );
        assert_eq!(read_pixel(GrBuffer::FrontBuffer, 320, 240), 0xffff);
        assert_ne!(read_pixel(GrBuffer::BackBuffer, 320, 240), 0xffff);
    });
}

#[test]
fn fog_blends_toward_the_fog_color() {
    glide_test(|| {
        iterated_color_combine();
        gr_vertex_layout(GrVertexParam::W, 20, GrParamMode::Enable);
        gr_buffer_clear(0, 0, 0);
        gr_fog_color_value(0x0000_00ff);
        // saturated fog at every depth
        gr_fog_table(&[255u8; 64]);
        gr_fog_mode(GrFogSource::TableOnQ, false, false);

        // far away quad (small 1/w)
        draw_quad(100.0, 100.0, 200.0, 200.0, (255.0, 0.0, 0.0), &[0.001]);
        let (r, _, b) = channels(read_pixel(GrBuffer::BackBuffer, 150, 150));
        assert!(b > 200, "fogged blue, got b={b}");
        assert!(r < 60, "fogged red residue r={r}");

        gr_fog_mode(GrFogSource::Disable, false, false);
        gr_buffer_clear(0, 0, 0);
        draw_quad(100.0, 100.0, 200.0, 200.0, (255.0, 0.0, 0.0), &[0.001]);
        assert_eq!(read_pixel(GrBuffer::BackBuffer, 150, 150), 0xf800);
    });
}

#[test]
fn version_and_queries() {
    glide_test(|| {
        assert!(gr_glide_get_version().starts_with("Glide Version 3"));
        assert_eq!(gr_sst_screen_width(), 640);
        assert_eq!(gr_sst_screen_height(), 480);
        assert_eq!(gr_sst_query_boards(), 1);
        let hw = gr_sst_query_hardware();
        assert_eq!(hw.num_boards, 1);
        assert_eq!(hw.num_tmus, 2);
        assert_eq!(gr_get(GrGetName::NumTmu), vec![2]);
        assert_eq!(gr_get(GrGetName::BitsDepth), vec![16]);
        assert_eq!(gr_get(GrGetName::WdepthMinMax), vec![0, 0xffff]);
        assert_eq!(gr_buffer_num_pending(), 0);
        assert!(gr_sst_select(0));
        assert!(!gr_sst_select(1));
    });
}
