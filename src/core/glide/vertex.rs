use tracing::warn;

use super::{with_context, GlideContext};
use crate::core::voodoo::raster::{SetupVertex, TmuVertex};
use crate::core::voodoo::regs::{reg, Argb};

/*
Vertices are packed arrays of f32 words; the layout maps attributes to
word offsets. Absent attributes fall back to the constant color, w = 1
and st = 0, mirroring what the hardware registers would hold. Texture
coordinates arrive already multiplied by their 1/w, per the window
coordinate convention.
 */

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GrVertexParam {
    Xy,
    Z,
    W,
    Q,
    A,
    Rgb,
    Pargb,
    St0,
    St1,
    Q0,
    Q1,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GrParamMode {
    Disable,
    Enable,
}

/// Word offsets of enabled vertex attributes.
#[derive(Copy, Clone, Debug)]
pub struct VertexLayout {
    pub xy: usize,
    pub z: Option<usize>,
    pub w: Option<usize>,
    pub q: Option<usize>,
    pub a: Option<usize>,
    pub rgb: Option<usize>,
    pub pargb: Option<usize>,
    pub st0: Option<usize>,
    pub st1: Option<usize>,
    pub q0: Option<usize>,
    pub q1: Option<usize>,
}

impl Default for VertexLayout {
    fn default() -> Self {
        Self {
            xy: 0,
            z: None,
            w: None,
            q: None,
            a: None,
            rgb: None,
            pargb: None,
            st0: None,
            st1: None,
            q0: None,
            q1: None,
        }
    }
}

/// Configures one vertex attribute. Offsets are byte offsets into the
/// vertex and must be word aligned.
pub fn gr_vertex_layout(param: GrVertexParam, offset: usize, mode: GrParamMode) {
    if offset % 4 != 0 {
        with_context(|ctx| ctx.voodoo.stats.invalid_params += 1);
        warn!(?param, offset, "unaligned vertex offset");
        return;
    }
    let word = offset / 4;
    with_context(|ctx| {
        let enabled = mode == GrParamMode::Enable;
        let slot = |on: bool| if on { Some(word) } else { None };
        match param {
            GrVertexParam::Xy => {
                if enabled {
                    ctx.layout.xy = word;
                } else {
                    ctx.voodoo.stats.invalid_params += 1;
                    warn!("GR_PARAM_XY cannot be disabled");
                }
            }
            GrVertexParam::Z => ctx.layout.z = slot(enabled),
            GrVertexParam::W => ctx.layout.w = slot(enabled),
            GrVertexParam::Q => ctx.layout.q = slot(enabled),
            GrVertexParam::A => ctx.layout.a = slot(enabled),
            GrVertexParam::Rgb => ctx.layout.rgb = slot(enabled),
            GrVertexParam::Pargb => ctx.layout.pargb = slot(enabled),
            GrVertexParam::St0 => ctx.layout.st0 = slot(enabled),
            GrVertexParam::St1 => ctx.layout.st1 = slot(enabled),
            GrVertexParam::Q0 => ctx.layout.q0 = slot(enabled),
            GrVertexParam::Q1 => ctx.layout.q1 = slot(enabled),
        }
    });
}

fn unpack(ctx: &GlideContext, vertex: &[f32]) -> Option<SetupVertex> {
    let layout = ctx.layout;
    let fetch = |offset: usize| vertex.get(offset).copied();

    let x = fetch(layout.xy)?;
    let y = fetch(layout.xy + 1)?;

    let constant = Argb(ctx.voodoo.regs.read(reg::COLOR0));
    let (r, g, b, mut a) = if let Some(p) = layout.pargb {
        let bits = fetch(p)?.to_bits();
        let c = Argb(bits);
        (c.r() as f32, c.g() as f32, c.b() as f32, c.a() as f32)
    } else if let Some(p) = layout.rgb {
        (
            fetch(p)?,
            fetch(p + 1)?,
            fetch(p + 2)?,
            constant.a() as f32,
        )
    } else {
        (
            constant.r() as f32,
            constant.g() as f32,
            constant.b() as f32,
            constant.a() as f32,
        )
    };
    if let Some(p) = layout.a {
        a = fetch(p)?;
    }

    let z = match layout.z {
        Some(p) => fetch(p)?,
        None => 0.0,
    };
    let oow = match layout.w {
        Some(p) => fetch(p)?,
        None => 1.0,
    };
    let q = match layout.q {
        Some(p) => fetch(p)?,
        None => oow,
    };

    let mut tmu = [TmuVertex::default(); 2];
    for (i, (st, qn)) in [(layout.st0, layout.q0), (layout.st1, layout.q1)]
        .into_iter()
        .enumerate()
    {
        if let Some(p) = st {
            tmu[i].sow = fetch(p)?;
            tmu[i].tow = fetch(p + 1)?;
        }
        tmu[i].oow = match qn {
            Some(p) => fetch(p)?,
            None => q,
        };
    }

    Some(SetupVertex {
        x,
        y,
        r,
        g,
        b,
        a,
        z,
        oow,
        tmu,
    })
}

fn unpack_all(ctx: &mut GlideContext, vertices: &[&[f32]]) -> Option<Vec<SetupVertex>> {
    let mut out = Vec::with_capacity(vertices.len());
    for v in vertices {
        match unpack(ctx, v) {
            Some(sv) => out.push(sv),
            None => {
                ctx.voodoo.stats.invalid_params += 1;
                warn!("vertex shorter than the configured layout");
                return None;
            }
        }
    }
    Some(out)
}

pub fn gr_draw_triangle(a: &[f32], b: &[f32], c: &[f32]) {
    with_context(|ctx| {
        if let Some(v) = unpack_all(ctx, &[a, b, c]) {
            ctx.voodoo.draw_triangle(&[v[0], v[1], v[2]]);
        }
    });
}

pub fn gr_draw_line(a: &[f32], b: &[f32]) {
    with_context(|ctx| {
        if let Some(v) = unpack_all(ctx, &[a, b]) {
            ctx.voodoo.draw_line(&[v[0], v[1]]);
        }
    });
}

pub fn gr_draw_point(a: &[f32]) {
    with_context(|ctx| {
        if let Some(v) = unpack_all(ctx, &[a]) {
            ctx.voodoo.draw_point(&v[0]);
        }
    });
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GrPrimitive {
    Points,
    LineStrip,
    Lines,
    Polygon,
    TriangleStrip,
    TriangleFan,
    Triangles,
    TriangleStripContinue,
    TriangleFanContinue,
}

fn draw_primitives(ctx: &mut GlideContext, mode: GrPrimitive, v: &[SetupVertex]) {
    match mode {
        GrPrimitive::Points => {
            for vert in v {
                ctx.voodoo.draw_point(vert);
            }
        }
        GrPrimitive::Lines => {
            for pair in v.chunks_exact(2) {
                ctx.voodoo.draw_line(&[pair[0], pair[1]]);
            }
        }
        GrPrimitive::LineStrip => {
            for pair in v.windows(2) {
                ctx.voodoo.draw_line(&[pair[0], pair[1]]);
            }
        }
        GrPrimitive::Triangles => {
            for tri in v.chunks_exact(3) {
                ctx.voodoo.draw_triangle(&[tri[0], tri[1], tri[2]]);
            }
        }
        GrPrimitive::TriangleStrip | GrPrimitive::TriangleStripContinue => {
            // alternate the winding so culling stays consistent
            for i in 0..v.len().saturating_sub(2) {
                if i % 2 == 0 {
                    ctx.voodoo.draw_triangle(&[v[i], v[i + 1], v[i + 2]]);
                } else {
                    ctx.voodoo.draw_triangle(&[v[i + 1], v[i], v[i + 2]]);
                }
            }
        }
        GrPrimitive::TriangleFan | GrPrimitive::TriangleFanContinue | GrPrimitive::Polygon => {
            for i in 1..v.len().saturating_sub(1) {
                ctx.voodoo.draw_triangle(&[v[0], v[i], v[i + 1]]);
            }
        }
    }
}

pub fn gr_draw_vertex_array(mode: GrPrimitive, vertices: &[&[f32]]) {
    with_context(|ctx| {
        if let Some(v) = unpack_all(ctx, vertices) {
            draw_primitives(ctx, mode, &v);
        }
    });
}

/// Vertices packed back to back with a fixed byte stride.
pub fn gr_draw_vertex_array_contiguous(mode: GrPrimitive, data: &[f32], stride: usize) {
    if stride == 0 || stride % 4 != 0 {
        with_context(|ctx| ctx.voodoo.stats.invalid_params += 1);
        warn!(stride, "bad vertex stride");
        return;
    }
    let words = stride / 4;
    with_context(|ctx| {
        let refs: Vec<&[f32]> = data.chunks_exact(words).collect();
        if let Some(v) = unpack_all(ctx, &refs) {
            draw_primitives(ctx, mode, &v);
        }
    });
}

/// Tightly packed variant: the stride equals the vertex size itself.
pub fn gr_draw_vertex_array_linear(mode: GrPrimitive, data: &[f32], vertex_bytes: usize) {
    gr_draw_vertex_array_contiguous(mode, data, vertex_bytes);
}
