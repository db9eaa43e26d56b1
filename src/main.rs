// =============================================================================
// HELLO SWAPCHAIN - clear-and-present loop on a native window
// =============================================================================
//
// Opens a fixed-size window, brings up a Vulkan device and swapchain on it and
// presents a cleared image as fast as the driver allows.
//
// ARCHITECTURE OVERVIEW:
// ┌─────────────────────────────────────────────────────────────────┐
// │  winit event loop (window, input, redraw pacing)                │
// │    └── Renderer<AshDriver>                                      │
// │          └── Instance / Device / Surface / Swapchain            │
// │                └── Pre-recorded clear command buffers           │
// │                      └── Semaphores (image-available, done)     │
// └─────────────────────────────────────────────────────────────────┘
//
// FRAME FLOW:
// 1. Acquire swapchain image (signals image-available)
// 2. Submit the command buffer recorded for that image
// 3. Present (waits on render-finished)
//
// =============================================================================

mod backend;
mod config;
mod renderer;
mod stats;

use anyhow::{Context, Result};
use backend::device::FirstEnumerated;
use backend::{AshDriver, FrameOutcome, SurfaceTarget};
use config::Config;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use renderer::Renderer;
use stats::FpsCounter;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::time::Instant;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowAttributes, WindowId},
};

// =============================================================================
// ENTRY POINT
// =============================================================================

fn main() {
    if let Err(e) = run() {
        // No logger means setup failed before or inside init_logging
        if log::max_level() == log::LevelFilter::Off {
            eprintln!("Fatal: {:#}", e);
        } else {
            log::error!("Fatal: {:#}", e);
        }
        std::process::exit(-1);
    }
}

fn run() -> Result<()> {
    let (config, config_error) = Config::load();

    init_logging(&config)?;
    if let Some(e) = config_error {
        log::warn!("Failed to load config.toml: {:#}. Using defaults.", e);
    }
    if let Err(e) = config.log_level() {
        log::warn!("{:#}, defaulting to info", e);
    }
    log::info!("Starting hello-swapchain");
    log::info!(
        "Window: {}x{}, clear color {:?}",
        config.window.width,
        config.window.height,
        config.graphics.clear_color
    );

    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    // Release Vulkan objects before reporting, so teardown happens either way
    let error = app.error.take();
    drop(app);

    match error {
        Some(e) => Err(e),
        None => {
            log::info!("Shut down cleanly");
            Ok(())
        }
    }
}

/// Initialize logging, optionally piping everything into a file
fn init_logging(config: &Config) -> Result<()> {
    use env_logger::{Builder, Target};

    let mut builder = Builder::from_default_env();
    builder.filter_level(config.log_level().unwrap_or(log::LevelFilter::Info));

    if config.debug.log_to_file {
        let file = open_log_file(&config.debug.log_file)?;
        builder.target(Target::Pipe(Box::new(file)));
    }

    builder.init();
    Ok(())
}

/// Truncate `path` and write the log header
fn open_log_file(path: &str) -> Result<File> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path))?;

    writeln!(file, "=== hello-swapchain log ===")?;
    writeln!(file, "Started: {:?}", std::time::SystemTime::now())?;
    writeln!(file)?;

    Ok(file)
}

// =============================================================================
// APPLICATION STATE
// =============================================================================

/// IMPORTANT: `renderer` is declared before `window` so it is dropped first;
/// the surface must go before the native window it was created on.
struct App {
    config: Config,
    renderer: Option<Renderer<AshDriver>>,
    window: Option<Window>,
    fps: Option<FpsCounter>,
    /// First fatal error; the event loop exits as soon as it is set
    error: Option<anyhow::Error>,
}

impl App {
    fn new(config: Config) -> Self {
        Self {
            config,
            renderer: None,
            window: None,
            fps: None,
            error: None,
        }
    }

    fn init_renderer(&self, window: &Window) -> Result<Renderer<AshDriver>> {
        let target = SurfaceTarget {
            display: window
                .display_handle()
                .context("Window has no display handle")?
                .as_raw(),
            window: window
                .window_handle()
                .context("Window has no native handle")?
                .as_raw(),
        };

        let driver = AshDriver::new().context("Failed to load Vulkan")?;
        let renderer = Renderer::new(
            driver,
            &self.config.renderer_settings(),
            &target,
            &FirstEnumerated,
        )
        .context("Failed to initialize Vulkan")?;

        if let (Some(gpu), Some(swapchain)) = (renderer.physical_device(), renderer.swapchain()) {
            log::info!(
                "Presenting on {} (queue family {}): {} images, {} command buffers",
                gpu.name,
                renderer.queue_family(),
                swapchain.image_count(),
                renderer.command_buffer_count()
            );
        }

        Ok(renderer)
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        if self.error.is_none() {
            self.error = Some(error);
        }
        event_loop.exit();
    }

    fn render_frame(&mut self) -> Result<()> {
        let Some(renderer) = self.renderer.as_mut() else {
            return Ok(());
        };

        match renderer.draw_frame().context("Frame failed")? {
            FrameOutcome::Presented { .. } => self.update_fps(),
            FrameOutcome::Skipped { stage, reason } => {
                log::trace!("Frame skipped at {}: {:?}", stage, reason);
            }
        }
        Ok(())
    }

    fn update_fps(&mut self) {
        if !self.config.debug.show_fps {
            return;
        }
        let Some(report) = self.fps.as_mut().and_then(|fps| fps.frame(Instant::now())) else {
            return;
        };

        log::info!("{:.0} fps", report.fps);
        if let Some(window) = &self.window {
            window.set_title(&format!(
                "{} - {:.0} FPS ({:.2}ms)",
                self.config.window.title, report.fps, report.frame_ms
            ));
        }
    }
}

// =============================================================================
// EVENT HANDLING
// =============================================================================

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        // Fixed size: the swapchain is never rebuilt
        let window_attributes = WindowAttributes::default()
            .with_title(&self.config.window.title)
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ))
            .with_resizable(false);

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => window,
            Err(e) => {
                self.fail(event_loop, anyhow::Error::new(e).context("Failed to create window"));
                return;
            }
        };

        match self.init_renderer(&window) {
            Ok(renderer) => self.renderer = Some(renderer),
            Err(e) => {
                self.fail(event_loop, e);
                return;
            }
        }

        self.window = Some(window);
        self.fps = Some(FpsCounter::new(Instant::now()));
        event_loop.set_control_flow(ControlFlow::Poll);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                event_loop.exit();
            }

            // Presentation keeps the original size; an out-of-date swapchain
            // only skips frames
            WindowEvent::Resized(size) => {
                log::debug!("Ignoring resize to {}x{}", size.width, size.height);
            }

            WindowEvent::RedrawRequested => {
                if let Err(e) = self.render_frame() {
                    self.fail(event_loop, e);
                }
            }

            WindowEvent::KeyboardInput { event, .. } => {
                use winit::keyboard::{KeyCode, PhysicalKey};

                if event.state.is_pressed()
                    && event.physical_key == PhysicalKey::Code(KeyCode::Escape)
                {
                    log::info!("ESC pressed, exiting...");
                    event_loop.exit();
                }
            }

            _ => {}
        }
    }

    /// Keep the loop busy: request the next frame as soon as events are drained
    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}
