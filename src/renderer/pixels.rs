use pixels::{wgpu, Pixels, PixelsBuilder, SurfaceTexture};
use std::sync::mpsc;
use std::thread;
use std::time::Instant;
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop, EventLoopProxy};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use super::{DisplayEvent, DisplaySink, FrameBuffer};

const FPS_PERIOD: f64 = 2.0;

/// Sink handed to the Glide context by the demo: forwards each swapped
/// frame to the winit event loop through its proxy.
pub struct PixelsSink {
    event_proxy: EventLoopProxy<DisplayEvent>,
}

impl PixelsSink {
    pub fn new(event_proxy: EventLoopProxy<DisplayEvent>) -> Self {
        Self { event_proxy }
    }
}

impl DisplaySink for PixelsSink {
    fn present(&mut self, pixels: &[u16], width: usize, height: usize, rowpixels: usize) {
        let frame = FrameBuffer::from_rgb565(pixels, width, height, rowpixels);
        let _ = self.event_proxy.send_event(DisplayEvent::NewFrame(frame));
    }
}

/// Runs the window loop on the calling thread and the application body
/// on a worker thread, like a real Glide app driving a display.
pub fn run_loop<F>(start: F, width: usize, height: usize, scale: usize, title: String)
where
    F: FnOnce(PixelsSink, mpsc::Receiver<()>) + Send + 'static,
{
    let event_loop = EventLoop::<DisplayEvent>::with_user_event().build().unwrap();
    event_loop.set_control_flow(ControlFlow::Wait);
    let proxy = event_loop.create_proxy();

    let (_close_tx, close_rx) = mpsc::channel::<()>();
    thread::spawn(move || start(PixelsSink::new(proxy), close_rx));

    let mut gui = PixelsRenderer::new(width, height, scale, title);
    event_loop.run_app(&mut gui).unwrap();
}

struct PixelsRenderer {
    window: Option<&'static Window>,
    pixels: Option<Pixels<'static>>,
    width: usize,
    height: usize,
    scale: usize,
    title: String,
    fps_last: Instant,
    fps_frames: u32,
}

impl PixelsRenderer {
    fn new(width: usize, height: usize, scale: usize, title: String) -> Self {
        Self {
            window: None,
            pixels: None,
            width,
            height,
            scale,
            title,
            fps_last: Instant::now(),
            fps_frames: 0,
        }
    }

    fn update_fps(&mut self) {
        self.fps_frames += 1;
        let duration = self.fps_last.elapsed().as_secs_f64();
        if duration >= FPS_PERIOD {
            let fps = self.fps_frames as f64 / duration;
            if let Some(window) = self.window {
                window.set_title(&format!(
                    "{} - FPS: {:.2} [{}x{}]",
                    self.title, fps, self.width, self.height
                ));
            }
            self.fps_frames = 0;
            self.fps_last = Instant::now();
        }
    }

    fn new_frame(&mut self, frame: &FrameBuffer) {
        if let Some(pixels) = &mut self.pixels {
            if frame.width != self.width || frame.height != self.height {
                self.width = frame.width;
                self.height = frame.height;
                if pixels
                    .resize_buffer(self.width as u32, self.height as u32)
                    .is_err()
                {
                    println!("Pixels buffer resize error");
                }
            }
            pixels.frame_mut().copy_from_slice(&frame.frame);
            if pixels.render().is_err() {
                println!("Pixels render error");
            }
            self.update_fps();
            self.window.unwrap().request_redraw();
        }
    }
}

impl ApplicationHandler<DisplayEvent> for PixelsRenderer {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let window_attrs = Window::default_attributes()
            .with_title(&self.title)
            .with_inner_size(winit::dpi::LogicalSize::new(
                (self.width * self.scale) as u32,
                (self.height * self.scale) as u32,
            ))
            .with_resizable(true);

        let window = event_loop.create_window(window_attrs).unwrap();
        let window_ref: &'static Window = Box::leak(Box::new(window));

        let window_size = window_ref.inner_size();
        let surface_texture =
            SurfaceTexture::new(window_size.width, window_size.height, window_ref);
        let mut builder =
            PixelsBuilder::new(self.width as u32, self.height as u32, surface_texture);
        builder = builder.request_adapter_options(wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        });
        let mut pixels = builder.build().expect("create pixels");
        pixels.set_present_mode(wgpu::PresentMode::Immediate);

        self.window = Some(window_ref);
        self.pixels = Some(pixels);
        self.fps_last = Instant::now();
        self.fps_frames = 0;
        window_ref.request_redraw();
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: DisplayEvent) {
        match event {
            DisplayEvent::NewFrame(frame) => self.new_frame(&frame),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(new_size) => {
                if let Some(pixels) = &mut self.pixels {
                    if pixels.resize_surface(new_size.width, new_size.height).is_err() {
                        println!("Pixels surface resize error");
                    }
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(KeyCode::Escape) = event.physical_key {
                    event_loop.exit();
                }
            }
            _ => {}
        }
    }
}
