use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use tracing::info;

use super::raster::{PixelStats, TriangleJob};

/*
Fixed pool of rasterizer threads. A triangle is split into
(workers + 1) * 4 work units over its covered pixels; workers race on
the job's atomic unit index, accumulate statistics locally and publish
them once per triangle. The dispatching thread blocks on a condvar
until every unit has been rasterized, so the job snapshot may reference
context memory freely.
 */

pub struct RasterPool {
    shared: Arc<PoolShared>,
    handles: Vec<JoinHandle<()>>,
}

struct PoolShared {
    state: Mutex<PoolState>,
    start: Condvar,
    done: Condvar,
    shutdown: AtomicBool,
}

struct PoolState {
    job: Option<Arc<TriangleJob>>,
    generation: u64,
    completed_units: u32,
    stats: PixelStats,
}

/// A worker dying mid-triangle would leave the dispatcher waiting
/// forever; treat it as fatal.
struct AbortOnPanic;

impl Drop for AbortOnPanic {
    fn drop(&mut self) {
        if thread::panicking() {
            eprintln!("rasterizer worker panicked, aborting");
            std::process::abort();
        }
    }
}

fn worker_main(shared: Arc<PoolShared>) {
    let _guard = AbortOnPanic;
    let mut seen_generation = 0u64;
    loop {
        let job = {
            let mut state = shared.state.lock().unwrap();
            loop {
                if shared.shutdown.load(Ordering::Acquire) {
                    return;
                }
                if state.generation != seen_generation {
                    if let Some(job) = &state.job {
                        seen_generation = state.generation;
                        break Arc::clone(job);
                    }
                    seen_generation = state.generation;
                }
                state = shared.start.wait(state).unwrap();
            }
        };

        let mut local = PixelStats::default();
        let mut done_units = 0u32;
        while let Some(unit) = job.claim_unit() {
            job.rasterize_unit(unit, &mut local);
            done_units += 1;
        }

        let mut state = shared.state.lock().unwrap();
        state.stats.merge(&local);
        state.completed_units += done_units;
        if state.completed_units >= job.units {
            shared.done.notify_all();
        }
    }
}

impl RasterPool {
    /// Spawns `workers` rasterizer threads (at least one).
    pub fn new(workers: usize) -> std::io::Result<Self> {
        let workers = workers.max(1);
        let shared = Arc::new(PoolShared {
            state: Mutex::new(PoolState {
                job: None,
                generation: 0,
                completed_units: 0,
                stats: PixelStats::default(),
            }),
            start: Condvar::new(),
            done: Condvar::new(),
            shutdown: AtomicBool::new(false),
        });
        let mut handles = Vec::with_capacity(workers);
        for index in 0..workers {
            let shared = Arc::clone(&shared);
            let handle = thread::Builder::new()
                .name(format!("rv-raster-{index}"))
                .spawn(move || worker_main(shared))?;
            handles.push(handle);
        }
        info!(workers, "rasterizer pool started");
        Ok(Self { shared, handles })
    }

    pub fn workers(&self) -> usize {
        self.handles.len()
    }

    /// Hands one triangle to the pool and blocks until it is fully
    /// rasterized; merged worker statistics land in `stats_out`.
    pub fn dispatch(&self, job: &Arc<TriangleJob>, stats_out: &mut PixelStats) {
        let mut state = self.shared.state.lock().unwrap();
        state.job = Some(Arc::clone(job));
        state.generation = state.generation.wrapping_add(1);
        state.completed_units = 0;
        state.stats = PixelStats::default();
        self.shared.start.notify_all();

        while state.completed_units < job.units {
            state = self.shared.done.wait(state).unwrap();
        }
        *stats_out = state.stats;
        state.job = None;
    }
}

impl Drop for RasterPool {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        {
            let _state = self.shared.state.lock().unwrap();
            self.shared.start.notify_all();
        }
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;

    use super::*;
    use crate::core::voodoo::raster::{RasterVariant, RawSliceMut, Span};
    use crate::core::voodoo::regs::{
        AlphaMode, Argb, ChromaRange, FbzColorPath, FbzMode, FogMode,
    };
    use crate::core::voodoo::tables::SharedTables;

    fn solid_job(fb: &mut Vec<u16>, width: i32, height: i32) -> TriangleJob {
        let mut spans = Vec::new();
        let mut total = 0u32;
        for y in 0..height {
            spans.push(Span {
                y,
                startx: 0,
                stopx: width,
                cum: total,
            });
            total += width as u32;
        }
        TriangleJob {
            fb: RawSliceMut::new(fb),
            dest_offs: 0,
            aux_offs: (width * height) as usize,
            rowpixels: width,
            height,
            // rgb writes enabled, everything else off
            fbzmode: FbzMode(FbzMode::RGB_BUFFER_MASK.set(0, 1)),
            fbzcp: FbzColorPath(0),
            alphamode: AlphaMode(0),
            fogmode: FogMode(0),
            zacolor: 0,
            stipple: 0,
            color0: Argb(0),
            color1: Argb(0),
            chromakey: Argb(0),
            chromarange: ChromaRange(0),
            fogcolor: Argb(0),
            fogblend: [0; 64],
            fogdelta: [0; 64],
            tables: std::sync::Arc::new(SharedTables::new()),
            ax: 0,
            ay: 0,
            startr: 0xff << 12,
            startg: 0,
            startb: 0,
            starta: 0xff << 12,
            startz: 0,
            startw: 0,
            drdx: 0,
            dgdx: 0,
            dbdx: 0,
            dadx: 0,
            dzdx: 0,
            dwdx: 0,
            drdy: 0,
            dgdy: 0,
            dbdy: 0,
            dady: 0,
            dzdy: 0,
            dwdy: 0,
            tmu: [None, None],
            variant: RasterVariant::Generic,
            spans,
            total_pixels: total,
            units: 12,
            next_unit: AtomicU32::new(0),
        }
    }

    #[test]
    fn pool_covers_every_unit_exactly_once() {
        let width = 64;
        let height = 32;
        let mut fb = vec![0u16; (width * height * 2) as usize];
        let job = Arc::new(solid_job(&mut fb, width, height));
        let pool = RasterPool::new(3).unwrap();
        let mut stats = PixelStats::default();
        pool.dispatch(&job, &mut stats);
        assert_eq!(stats.pixels_in, (width * height) as u32);
        assert_eq!(stats.pixels_out, (width * height) as u32);
        drop(pool);
        // solid red at full intensity
        assert!(fb[..(width * height) as usize].iter().all(|&p| p == 0xf800));
    }

    #[test]
    fn pool_handles_consecutive_triangles() {
        let width = 16;
        let height = 4;
        let mut fb = vec![0u16; (width * height * 2) as usize];
        let pool = RasterPool::new(2).unwrap();
        let mut stats = PixelStats::default();
        pool.dispatch(&Arc::new(solid_job(&mut fb, width, height)), &mut stats);
        let first = stats;
        pool.dispatch(&Arc::new(solid_job(&mut fb, width, height)), &mut stats);
        assert_eq!(first, stats);
        assert_eq!(stats.pixels_out, (width * height) as u32);
    }
}
