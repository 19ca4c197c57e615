use std::sync::mpsc::Receiver;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use tracing::info;

use r_voodoo::glide::lfb::{gr_lfb_read_region, GrBuffer, GrLfbDstFmt};
use r_voodoo::glide::state::*;
use r_voodoo::glide::texture::*;
use r_voodoo::glide::vertex::*;
use r_voodoo::glide::*;
use r_voodoo::log::Logger;
use r_voodoo::renderer::pixels::{run_loop, PixelsSink};

const WIDTH: usize = 640;
const HEIGHT: usize = 480;

#[derive(Copy, Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
enum Scene {
    /// rotating gouraud shaded triangle
    Gouraud,
    /// spinning checkerboard textured quad
    Texture,
    /// alpha blended triangles over a gradient
    Blend,
}

#[derive(Parser, Debug)]
#[command(name = "rv-demo", about = "Voodoo/Glide software rasterizer demo")]
struct Args {
    /// scene to render
    #[arg(long, value_enum, default_value_t = Scene::Gouraud)]
    scene: Scene,
    /// window scale factor
    #[arg(long, default_value_t = 1)]
    scale: usize,
    /// rasterizer worker threads (overrides GLIDE3X_THREADS)
    #[arg(long)]
    threads: Option<usize>,
    /// log filter
    #[arg(long, default_value = "info")]
    log: String,
}

fn main() {
    let args = Args::parse();
    let _logger = Logger::new(&args.log);
    if let Some(threads) = args.threads {
        unsafe { std::env::set_var("GLIDE3X_THREADS", threads.to_string()) };
    }

    info!("{}", gr_glide_get_version());
    let scene = args.scene;
    run_loop(
        move |sink, close| run_scene(sink, close, scene),
        WIDTH,
        HEIGHT,
        args.scale.max(1),
        "r-voodoo".to_string(),
    );
}

/// One vertex in the demo layout: xy at byte 0, rgb at byte 8.
fn vtx(x: f32, y: f32, r: f32, g: f32, b: f32) -> [f32; 5] {
    [x, y, r, g, b]
}

/// Textured layout: xy at 0, rgb at 8, st0 at byte 20.
fn tvtx(x: f32, y: f32, s: f32, t: f32) -> [f32; 7] {
    [x, y, 255.0, 255.0, 255.0, s, t]
}

fn run_scene(sink: PixelsSink, close: Receiver<()>, scene: Scene) {
    gr_glide_init();
    gr_sst_win_open(
        Box::new(sink),
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
    gr_dither_mode(GrDitherMode::Dither4x4);

    match scene {
        Scene::Gouraud => {}
        Scene::Texture => setup_texture_scene(),
        Scene::Blend => {
            gr_alpha_blend_function(
                GrBlend::SrcAlpha,
                GrBlend::OneMinusSrcAlpha,
                GrBlend::One,
                GrBlend::Zero,
            );
        }
    }

    let start = Instant::now();
    loop {
        if close.try_recv().is_ok() {
            break;
        }
        let t = start.elapsed().as_secs_f32();
        gr_buffer_clear(0x0000_0020, 0, 0xffff);
        match scene {
            Scene::Gouraud => draw_gouraud(t),
            Scene::Texture => draw_texture_quad(t),
            Scene::Blend => draw_blend(t),
        }
        gr_buffer_swap(1);
        thread::sleep(Duration::from_millis(16));
    }
    gr_sst_win_close();
    gr_glide_shutdown();
}

fn spin(cx: f32, cy: f32, radius: f32, angle: f32) -> (f32, f32) {
    (cx + radius * angle.cos(), cy + radius * angle.sin())
}

fn draw_gouraud(t: f32) {
    let (cx, cy) = (WIDTH as f32 / 2.0, HEIGHT as f32 / 2.0);
    let third = std::f32::consts::TAU / 3.0;
    let (x0, y0) = spin(cx, cy, 180.0, t);
    let (x1, y1) = spin(cx, cy, 180.0, t + third);
    let (x2, y2) = spin(cx, cy, 180.0, t + 2.0 * third);
    gr_draw_triangle(
        &vtx(x0, y0, 255.0, 0.0, 0.0),
        &vtx(x1, y1, 0.0, 255.0, 0.0),
        &vtx(x2, y2, 0.0, 0.0, 255.0),
    );
}

fn setup_texture_scene() {
    gr_vertex_layout(GrVertexParam::St0, 20, GrParamMode::Enable);
    gr_color_combine(
        GrCombineFunction::ScaleOther,
        GrCombineFactor::One,
        GrCombineLocal::Iterated,
        GrCombineOther::Texture,
        false,
    );

    // 16x16 checkerboard
    let mut data = Vec::with_capacity(16 * 16 * 2);
    for y in 0..16u16 {
        for x in 0..16u16 {
            let on = (x ^ y) & 1 != 0;
            let pix: u16 = if on { 0xffff } else { 0xf800 };
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
    let base = gr_tex_min_address(0);
    gr_tex_download_mip_map(0, base, GrMipMapLevelMask::Both, &info);
    gr_tex_source(0, base, GrMipMapLevelMask::Both, &info);
    gr_tex_filter_mode(
        0,
        GrTextureFilterMode::Bilinear,
        GrTextureFilterMode::Bilinear,
    );
    gr_tex_clamp_mode(0, GrTextureClampMode::Wrap, GrTextureClampMode::Wrap);
    gr_tex_combine(
        0,
        GrCombineFunction::Local,
        GrCombineFactor::Zero,
        GrCombineFunction::Local,
        GrCombineFactor::Zero,
        false,
        false,
    );
}

fn draw_texture_quad(t: f32) {
    let (cx, cy) = (WIDTH as f32 / 2.0, HEIGHT as f32 / 2.0);
    let corners = [
        (t, 0.0f32, 0.0f32),
        (t + std::f32::consts::FRAC_PI_2, 256.0, 0.0),
        (t + std::f32::consts::PI, 256.0, 256.0),
        (t + 1.5 * std::f32::consts::PI, 0.0, 256.0),
    ];
    let v: Vec<[f32; 7]> = corners
        .iter()
        .map(|&(a, s, tc)| {
            let (x, y) = spin(cx, cy, 200.0, a);
            tvtx(x, y, s, tc)
        })
        .collect();
    let refs: Vec<&[f32]> = v.iter().map(|v| &v[..]).collect();
    gr_draw_vertex_array(GrPrimitive::TriangleFan, &refs);
}

fn draw_blend(t: f32) {
    // opaque backdrop stripes, read back once to prove LFB access works
    for i in 0..3 {
        let phase = t + i as f32 * 2.1;
        let (cx, cy) = (WIDTH as f32 / 2.0, HEIGHT as f32 / 2.0);
        let (x0, y0) = spin(cx, cy, 150.0, phase);
        let (x1, y1) = spin(cx, cy, 150.0, phase + 2.0);
        let alpha = 128.0;
        let layout_a = [x0, y0, 255.0, 64.0 * i as f32, 32.0, alpha];
        let layout_b = [x1, y1, 0.0, 255.0, 128.0, alpha];
        let layout_c = [cx, cy, 32.0, 32.0, 255.0, alpha];
        gr_vertex_layout(GrVertexParam::A, 20, GrParamMode::Enable);
        gr_draw_triangle(&layout_a, &layout_b, &layout_c);
    }
    // sample the center pixel for the log, once a second
    if (t.fract() * 60.0) as u32 == 0 {
        let mut pixel = [0u8; 2];
        if gr_lfb_read_region(
            GrBuffer::BackBuffer,
            WIDTH / 2,
            HEIGHT / 2,
            GrLfbDstFmt::Rgb565,
            1,
            1,
            2,
            &mut pixel,
        ) {
            info!(
                "center pixel {:04x}",
                u16::from_le_bytes(pixel)
            );
        }
    }
}
