use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use winit::dpi::LogicalSize;
use winit::window::Window;

use super::ContextConfig;
use super::error::{SurfaceErrorAction, classify_surface_error};
use crate::error::InitError;

/// Depth buffer format used by every render pass.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// Drawing-buffer dimensions in pixels.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Width over height, or `None` for an empty size.
    #[inline]
    pub fn aspect(self) -> Option<f32> {
        (!self.is_empty()).then(|| self.width as f32 / self.height as f32)
    }

    fn extent(self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width.max(1),
            height: self.height.max(1),
            depth_or_array_layers: 1,
        }
    }
}

/// Where a `RenderSurface` draws.
#[derive(Debug, Copy, Clone)]
pub enum SurfaceSource<'w> {
    /// A window; the drawing buffer follows its logical inner size.
    Window(&'w Window),
    /// An owned texture; the drawing buffer follows the requested size.
    Offscreen { width: u32, height: u32 },
}

impl SurfaceSource<'_> {
    /// Client size of the drawable, in logical pixels.
    ///
    /// The backing-store (physical) size is deliberately not used.
    pub fn client_size(&self) -> SurfaceSize {
        match self {
            SurfaceSource::Window(window) => {
                let logical: LogicalSize<u32> =
                    window.inner_size().to_logical(window.scale_factor());
                SurfaceSize::new(logical.width, logical.height)
            }
            SurfaceSource::Offscreen { width, height } => SurfaceSize::new(*width, *height),
        }
    }
}

enum DrawTarget<'w> {
    Window {
        surface: wgpu::Surface<'w>,
        config: wgpu::SurfaceConfiguration,
    },
    Offscreen {
        texture: wgpu::Texture,
    },
}

/// Colour attachment for one frame.
///
/// Short-lived: hand it back through [`RenderSurface::present`] promptly. Holding a
/// window texture prevents acquisition of the next one.
pub struct FrameTarget {
    surface_texture: Option<wgpu::SurfaceTexture>,
    pub view: wgpu::TextureView,
}

/// Owned rendering context bound to one drawable.
///
/// A value of this type only exists once a device was obtained, so everything
/// downstream receives a live context by construction.
pub struct RenderSurface<'w> {
    /// Kept alive for the lifetime of the surface.
    _instance: wgpu::Instance,
    adapter_info: wgpu::AdapterInfo,
    device: wgpu::Device,
    queue: wgpu::Queue,

    source: SurfaceSource<'w>,
    target: DrawTarget<'w>,
    format: wgpu::TextureFormat,

    depth_view: wgpu::TextureView,

    /// Current drawing-buffer size.
    size: SurfaceSize,

    lost: Arc<AtomicBool>,
}

impl<'w> RenderSurface<'w> {
    /// Acquires a context for `source`.
    ///
    /// Tries `config.primary` first and `config.fallback` second; fails with
    /// [`InitError::NoContext`] only if neither yields an adapter and device.
    pub fn acquire(source: SurfaceSource<'w>, config: &ContextConfig) -> Result<Self, InitError> {
        for (kind, backends) in config.attempts() {
            match pollster::block_on(Self::open(source, backends, config)) {
                Ok(surface) => {
                    log::info!(
                        "{kind} context ready: {} ({:?})",
                        surface.adapter_info.name,
                        surface.backend()
                    );
                    return Ok(surface);
                }
                Err(e) => log::warn!("{kind} context unavailable ({backends:?}): {e:#}"),
            }
        }
        Err(InitError::NoContext)
    }

    async fn open(
        source: SurfaceSource<'w>,
        backends: wgpu::Backends,
        config: &ContextConfig,
    ) -> Result<Self> {
        let size = source.client_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends,
            ..Default::default()
        });

        let window_surface = match source {
            SurfaceSource::Window(window) => Some(
                instance
                    .create_surface(window)
                    .context("failed to create wgpu surface")?,
            ),
            SurfaceSource::Offscreen { .. } => None,
        };

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: config.power_preference,
                compatible_surface: window_surface.as_ref(),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("quadspin device"),
                required_features: wgpu::Features::empty(),
                required_limits: config
                    .required_limits
                    .clone()
                    .using_resolution(adapter.limits()),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create wgpu device/queue")?;

        let lost = Arc::new(AtomicBool::new(false));
        {
            let lost = Arc::clone(&lost);
            device.set_device_lost_callback(move |reason, message| {
                if matches!(reason, wgpu::DeviceLostReason::Destroyed) {
                    log::debug!("device destroyed: {message}");
                } else {
                    log::error!("device lost ({reason:?}): {message}");
                }
                lost.store(true, Ordering::Release);
            });
        }

        let (target, format) = match window_surface {
            Some(surface) => {
                let caps = surface.get_capabilities(&adapter);
                let format = choose_surface_format(&caps, config.prefer_srgb)
                    .context("no supported surface formats")?;
                let present_mode = if caps.present_modes.contains(&config.present_mode) {
                    config.present_mode
                } else {
                    wgpu::PresentMode::Fifo
                };
                let surface_config = wgpu::SurfaceConfiguration {
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                    format,
                    width: size.width.max(1),
                    height: size.height.max(1),
                    present_mode,
                    alpha_mode: choose_alpha_mode(&caps, config.alpha_mode),
                    view_formats: vec![],
                    desired_maximum_frame_latency: config.desired_maximum_frame_latency,
                };
                // Empty windows are configured once they get a size.
                if !size.is_empty() {
                    surface.configure(&device, &surface_config);
                }
                (
                    DrawTarget::Window {
                        surface,
                        config: surface_config,
                    },
                    format,
                )
            }
            None => (
                DrawTarget::Offscreen {
                    texture: create_offscreen_texture(&device, size),
                },
                OFFSCREEN_FORMAT,
            ),
        };

        let depth_view = create_depth_view(&device, size);

        log::debug!(
            "drawing buffer {}x{} ({format:?})",
            size.width,
            size.height
        );

        Ok(Self {
            _instance: instance,
            adapter_info: adapter.get_info(),
            device,
            queue,
            source,
            target,
            format,
            depth_view,
            size,
            lost,
        })
    }

    /// Colour format of the draw target.
    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    /// Current drawing-buffer size.
    pub fn size(&self) -> SurfaceSize {
        self.size
    }

    /// Backend the context was created on.
    pub fn backend(&self) -> wgpu::Backend {
        self.adapter_info.backend
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn depth_view(&self) -> &wgpu::TextureView {
        &self.depth_view
    }

    /// Whether the device reported itself lost.
    pub fn is_lost(&self) -> bool {
        self.lost.load(Ordering::Acquire)
    }

    /// Current client size of the drawable.
    pub fn client_size(&self) -> SurfaceSize {
        self.source.client_size()
    }

    /// Changes the client size an offscreen drawable reports.
    ///
    /// Takes effect on the next [`resize`](Self::resize). Ignored for windows,
    /// whose client size comes from the windowing system.
    pub fn request_client_size(&mut self, width: u32, height: u32) {
        if let SurfaceSource::Offscreen { .. } = self.source {
            self.source = SurfaceSource::Offscreen { width, height };
        }
    }

    /// Brings the drawing buffer to `width` x `height`.
    ///
    /// Returns `false` without touching GPU state when the size is unchanged.
    /// An empty size is recorded but configuring the target is deferred, since
    /// wgpu cannot configure zero-sized targets.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        let new_size = SurfaceSize::new(width, height);
        if new_size == self.size {
            return false;
        }

        log::debug!(
            "drawing buffer {}x{} -> {}x{}",
            self.size.width,
            self.size.height,
            width,
            height
        );
        self.size = new_size;

        if new_size.is_empty() {
            return true;
        }

        match &mut self.target {
            DrawTarget::Window { surface, config } => {
                config.width = width;
                config.height = height;
                surface.configure(&self.device, config);
            }
            DrawTarget::Offscreen { texture } => {
                *texture = create_offscreen_texture(&self.device, new_size);
            }
        }
        self.depth_view = create_depth_view(&self.device, new_size);

        true
    }

    /// Acquires the colour attachment for the next frame.
    pub fn begin_frame(&self) -> std::result::Result<FrameTarget, wgpu::SurfaceError> {
        match &self.target {
            DrawTarget::Window { surface, .. } => {
                let surface_texture = surface.get_current_texture()?;
                let view = surface_texture
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());
                Ok(FrameTarget {
                    surface_texture: Some(surface_texture),
                    view,
                })
            }
            DrawTarget::Offscreen { texture } => Ok(FrameTarget {
                surface_texture: None,
                view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
            }),
        }
    }

    /// Submits the recorded commands and presents the frame.
    pub fn present(&self, frame: FrameTarget, encoder: wgpu::CommandEncoder) {
        self.queue.submit(std::iter::once(encoder.finish()));
        drop(frame.view);

        if let Some(surface_texture) = frame.surface_texture {
            if let SurfaceSource::Window(window) = self.source {
                window.pre_present_notify();
            }
            surface_texture.present();
        }
    }

    /// Reacts to a failed [`begin_frame`](Self::begin_frame).
    ///
    /// Outdated surfaces are reconfigured in place; the caller skips the frame
    /// unless the action is [`SurfaceErrorAction::Fatal`].
    pub fn handle_surface_error(&mut self, err: wgpu::SurfaceError) -> SurfaceErrorAction {
        let action = classify_surface_error(&err);
        match action {
            SurfaceErrorAction::Reconfigured => {
                if let DrawTarget::Window { surface, config } = &self.target {
                    if !self.size.is_empty() {
                        surface.configure(&self.device, config);
                    }
                }
                log::warn!("surface outdated; reconfigured");
            }
            SurfaceErrorAction::SkipFrame => log::warn!("skipping frame: {err}"),
            SurfaceErrorAction::Fatal => log::error!("surface unusable: {err}"),
        }
        action
    }
}

fn create_offscreen_texture(device: &wgpu::Device, size: SurfaceSize) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("quadspin offscreen target"),
        size: size.extent(),
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: OFFSCREEN_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    })
}

fn create_depth_view(device: &wgpu::Device, size: SurfaceSize) -> wgpu::TextureView {
    device
        .create_texture(&wgpu::TextureDescriptor {
            label: Some("quadspin depth buffer"),
            size: size.extent(),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        })
        .create_view(&wgpu::TextureViewDescriptor::default())
}

fn choose_surface_format(
    caps: &wgpu::SurfaceCapabilities,
    prefer_srgb: bool,
) -> Option<wgpu::TextureFormat> {
    if prefer_srgb {
        if let Some(format) = caps.formats.iter().copied().find(|f| f.is_srgb()) {
            return Some(format);
        }
    }
    caps.formats.first().copied()
}

fn choose_alpha_mode(
    caps: &wgpu::SurfaceCapabilities,
    requested: Option<wgpu::CompositeAlphaMode>,
) -> wgpu::CompositeAlphaMode {
    requested
        .filter(|m| caps.alpha_modes.contains(m))
        .or_else(|| caps.alpha_modes.first().copied())
        .unwrap_or(wgpu::CompositeAlphaMode::Auto)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aspect_is_width_over_height() {
        assert_eq!(SurfaceSize::new(640, 480).aspect(), Some(640.0 / 480.0));
        assert_eq!(SurfaceSize::new(0, 480).aspect(), None);
        assert_eq!(SurfaceSize::new(640, 0).aspect(), None);
    }

    #[test]
    fn offscreen_client_size_is_the_requested_size() {
        let source = SurfaceSource::Offscreen {
            width: 300,
            height: 150,
        };
        assert_eq!(source.client_size(), SurfaceSize::new(300, 150));
    }

    #[test]
    fn extent_never_collapses_to_zero() {
        let extent = SurfaceSize::new(0, 0).extent();
        assert_eq!((extent.width, extent.height), (1, 1));
    }

    #[test]
    fn no_backends_means_no_context() {
        let config = ContextConfig {
            primary: wgpu::Backends::empty(),
            fallback: wgpu::Backends::empty(),
            ..Default::default()
        };
        let source = SurfaceSource::Offscreen {
            width: 8,
            height: 8,
        };
        assert!(matches!(
            RenderSurface::acquire(source, &config),
            Err(InitError::NoContext)
        ));
    }

    #[test]
    fn failed_attempts_end_in_no_context() {
        let source = SurfaceSource::Offscreen {
            width: 8,
            height: 8,
        };
        assert!(matches!(
            RenderSurface::acquire(source, &ContextConfig::unavailable()),
            Err(InitError::NoContext)
        ));
    }

    fn offscreen(width: u32, height: u32) -> Option<RenderSurface<'static>> {
        match RenderSurface::acquire(
            SurfaceSource::Offscreen { width, height },
            &ContextConfig::default(),
        ) {
            Ok(surface) => Some(surface),
            Err(_) => {
                eprintln!("no GPU adapter available; skipping");
                None
            }
        }
    }

    #[test]
    fn resize_is_a_no_op_for_the_current_size() {
        let Some(mut surface) = offscreen(32, 16) else { return };
        let defaults = ContextConfig::default();
        assert!((defaults.primary | defaults.fallback).contains(surface.backend().into()));
        assert_eq!(surface.size(), SurfaceSize::new(32, 16));
        assert!(!surface.resize(32, 16));
        assert!(surface.resize(64, 16));
        assert_eq!(surface.size(), SurfaceSize::new(64, 16));
    }

    #[test]
    fn requested_client_size_is_reported() {
        let Some(mut surface) = offscreen(32, 16) else { return };
        surface.request_client_size(20, 10);
        assert_eq!(surface.client_size(), SurfaceSize::new(20, 10));
        // The drawing buffer only follows on resize.
        assert_eq!(surface.size(), SurfaceSize::new(32, 16));
    }
}
