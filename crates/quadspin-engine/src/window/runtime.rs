use std::time::Duration;

use anyhow::{Context, Result};
use ouroboros::self_referencing;

use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::device::SurfaceSource;
use crate::error::{FrameError, InitError};
use crate::render::{FrameRenderer, RendererConfig};
use crate::time::{FrameClock, FrameTime, Spin};

/// Window/runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
    /// Time between frames.
    pub tick_interval: Duration,
    /// Rotation speed in radians per second.
    pub spin_speed: f32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "quadspin".to_string(),
            initial_size: LogicalSize::new(640.0, 480.0),
            tick_interval: FrameClock::DEFAULT_INTERVAL,
            spin_speed: Spin::DEFAULT_SPEED,
        }
    }
}

/// Entry point for the runtime.
pub struct Runtime;

impl Runtime {
    /// Opens the window and renders until it is closed or rendering fails.
    pub fn run(config: RuntimeConfig, renderer: RendererConfig) -> Result<()> {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = AppState::new(config, renderer);

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        match state.failure.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[self_referencing]
struct WindowEntry {
    clock: FrameClock,
    spin: Spin,

    window: Window,

    #[borrows(window)]
    #[covariant]
    renderer: FrameRenderer<'this>,
}

struct AppState {
    config: RuntimeConfig,
    renderer_config: RendererConfig,

    entry: Option<WindowEntry>,
    /// First fatal error; returned from `Runtime::run`.
    failure: Option<anyhow::Error>,
}

impl AppState {
    fn new(config: RuntimeConfig, renderer_config: RendererConfig) -> Self {
        Self {
            config,
            renderer_config,
            entry: None,
            failure: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{err:#}");
        self.failure.get_or_insert(err);
        self.entry = None;
        event_loop.exit();
    }

    fn create_window_entry(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.initial_size);

        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;

        let renderer_config = self.renderer_config.clone();

        let entry = WindowEntryTryBuilder {
            clock: FrameClock::new(self.config.tick_interval),
            spin: Spin::new(self.config.spin_speed),
            window,
            renderer_builder: |w| {
                let mut renderer = FrameRenderer::new(renderer_config);
                renderer.initialize(SurfaceSource::Window(w))?;
                Ok::<_, InitError>(renderer)
            },
        }
        .try_build()
        .context("renderer initialization failed")?;

        log::info!(
            "window created; rendering every {:?} at {} rad/s",
            entry.with_clock(|clock| clock.interval()),
            entry.with_spin(|spin| spin.speed())
        );
        self.entry = Some(entry);
        Ok(())
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(entry) = self.entry.as_mut() else {
            return;
        };

        let result = entry.with_mut(|fields| {
            let ft: FrameTime = fields.clock.tick();
            let angle = fields.spin.advance(ft.dt);
            log::trace!("frame {} dt={:.4} angle={angle:.4}", ft.frame_index, ft.dt);
            fields.renderer.render_frame(angle)
        });

        if let Err(err) = result {
            let context = match err {
                FrameError::NotInitialized => "renderer is not initialized",
                FrameError::ContextLost => "rendering context lost",
            };
            self.fail(event_loop, anyhow::Error::new(err).context(context));
        }
    }
}

impl ApplicationHandler for AppState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(entry) = self.entry.as_mut() {
            // Time spent suspended does not advance the spin.
            entry.with_clock_mut(|clock| clock.reset());
            entry.with_window(|w| w.request_redraw());
            return;
        }

        if let Err(e) = self.create_window_entry(event_loop) {
            self.fail(event_loop, e);
            return;
        }

        if let Some(entry) = self.entry.as_ref() {
            entry.with_window(|w| w.request_redraw());
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let Some(entry) = self.entry.as_ref() else {
            return;
        };

        let next = entry.with_clock(|clock| clock.next_tick());
        event_loop.set_control_flow(ControlFlow::WaitUntil(next));

        if entry.with_clock(|clock| clock.is_due(std::time::Instant::now())) {
            entry.with_window(|w| w.request_redraw());
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("window closed");
                self.entry = None;
                event_loop.exit();
            }

            // The renderer picks up the new size at the start of the next frame.
            WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(entry) = self.entry.as_ref() {
                    entry.with_window(|w| w.request_redraw());
                }
            }

            WindowEvent::RedrawRequested => self.redraw(event_loop),

            _ => {}
        }
    }
}
