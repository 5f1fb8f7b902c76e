use std::borrow::Cow;

use crate::device::{ContextConfig, RenderSurface, SurfaceErrorAction, SurfaceSource};
use crate::error::{FrameError, InitError};

use super::geometry::GeometryBuffers;
use super::pipeline::ShaderPipeline;
use super::shader::{FRAGMENT_SHADER, VERTEX_SHADER};
use super::transform::Transform;

/// Renderer lifecycle.
///
/// `initialize` walks the first four transitions in order; `RenderReady` is
/// then re-entered by every frame.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RendererState {
    Uninitialized,
    ContextReady,
    PipelineReady,
    BuffersReady,
    RenderReady,
}

/// Renderer configuration.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Colour the drawing buffer is cleared to each frame.
    pub clear_color: wgpu::Color,
    pub context: ContextConfig,
    pub vertex_shader: Cow<'static, str>,
    pub fragment_shader: Cow<'static, str>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            clear_color: wgpu::Color::BLACK,
            context: ContextConfig::default(),
            vertex_shader: Cow::Borrowed(VERTEX_SHADER),
            fragment_shader: Cow::Borrowed(FRAGMENT_SHADER),
        }
    }
}

struct Resources<'w> {
    surface: RenderSurface<'w>,
    pipeline: ShaderPipeline,
    geometry: GeometryBuffers,
}

/// Draws the rotating quad, one synchronous call per tick.
///
/// Owns every GPU object it uses; the host only supplies the drawable once and
/// the rotation angle per frame. Not meant to be shared across threads without
/// external serialization.
pub struct FrameRenderer<'w> {
    config: RendererConfig,
    state: RendererState,
    resources: Option<Resources<'w>>,
    transform: Transform,
    /// Set when a live context went away; cleared by a successful initialize.
    lost: bool,
}

impl<'w> FrameRenderer<'w> {
    pub fn new(config: RendererConfig) -> Self {
        Self {
            config,
            state: RendererState::Uninitialized,
            resources: None,
            transform: Transform::new(),
            lost: false,
        }
    }

    pub fn state(&self) -> RendererState {
        self.state
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn surface(&self) -> Option<&RenderSurface<'w>> {
        self.resources.as_ref().map(|r| &r.surface)
    }

    pub fn surface_mut(&mut self) -> Option<&mut RenderSurface<'w>> {
        self.resources.as_mut().map(|r| &mut r.surface)
    }

    pub fn pipeline(&self) -> Option<&ShaderPipeline> {
        self.resources.as_ref().map(|r| &r.pipeline)
    }

    pub fn geometry(&self) -> Option<&GeometryBuffers> {
        self.resources.as_ref().map(|r| &r.geometry)
    }

    /// Acquires the context, builds the program and uploads the quad.
    ///
    /// Any failure is fatal: the renderer stays `Uninitialized` and holds no
    /// GPU objects. Calling this on an initialized renderer is an error.
    pub fn initialize(&mut self, source: SurfaceSource<'w>) -> Result<(), InitError> {
        if self.state != RendererState::Uninitialized {
            return Err(InitError::AlreadyInitialized);
        }

        match self.bring_up(source) {
            Ok(resources) => {
                self.resources = Some(resources);
                self.transform = Transform::new();
                self.lost = false;
                self.advance(RendererState::RenderReady);
                Ok(())
            }
            Err(err) => {
                log::debug!("initialization failed in state {:?}: {err}", self.state);
                self.state = RendererState::Uninitialized;
                Err(err)
            }
        }
    }

    fn bring_up(&mut self, source: SurfaceSource<'w>) -> Result<Resources<'w>, InitError> {
        let surface = RenderSurface::acquire(source, &self.config.context)?;
        self.advance(RendererState::ContextReady);

        let pipeline = ShaderPipeline::build(
            &surface,
            &self.config.vertex_shader,
            &self.config.fragment_shader,
        )?;
        self.advance(RendererState::PipelineReady);

        let geometry = GeometryBuffers::quad(surface.device());
        self.advance(RendererState::BuffersReady);

        Ok(Resources {
            surface,
            pipeline,
            geometry,
        })
    }

    fn advance(&mut self, next: RendererState) {
        log::debug!("renderer {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Renders one frame with the quad rotated by `angle` radians.
    ///
    /// Sequence: resize check, clear, projection, model-view, attribute
    /// binding, program activation, uniform upload, draw. A zero-area drawing
    /// buffer or a transient surface error skips the frame and returns `Ok`.
    pub fn render_frame(&mut self, angle: f32) -> Result<(), FrameError> {
        let Some(res) = self.resources.as_mut() else {
            return Err(if self.lost {
                FrameError::ContextLost
            } else {
                FrameError::NotInitialized
            });
        };

        if res.surface.is_lost() {
            return Err(self.lose_context());
        }

        let client = res.surface.client_size();
        res.surface.resize(client.width, client.height);
        let size = res.surface.size();
        let Some(aspect) = size.aspect() else {
            log::trace!("drawing buffer is empty; frame skipped");
            return Ok(());
        };

        let frame = match res.surface.begin_frame() {
            Ok(frame) => frame,
            Err(err) => {
                return match res.surface.handle_surface_error(err) {
                    SurfaceErrorAction::Reconfigured | SurfaceErrorAction::SkipFrame => Ok(()),
                    SurfaceErrorAction::Fatal => Err(self.lose_context()),
                };
            }
        };

        let Resources {
            surface,
            pipeline,
            geometry,
        } = res;

        let mut encoder = surface
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("quadspin frame encoder"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("quadspin quad pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &frame.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.config.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: surface.depth_view(),
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            pass.set_viewport(0.0, 0.0, size.width as f32, size.height as f32, 0.0, 1.0);

            self.transform.update_projection(aspect);
            self.transform.update_model_view(angle);

            pipeline.bind_attributes(&mut pass, geometry);
            pipeline.activate(&mut pass);
            pipeline.upload_uniforms(surface.queue(), &mut pass, &self.transform);
            pass.draw(geometry.vertices(), 0..1);
        }

        surface.present(frame, encoder);
        Ok(())
    }

    /// Drops every GPU object and falls back to `Uninitialized`.
    fn lose_context(&mut self) -> FrameError {
        log::error!("rendering context lost; renderer must be initialized again");
        self.resources = None;
        self.lost = true;
        self.state = RendererState::Uninitialized;
        FrameError::ContextLost
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::SurfaceSize;
    use crate::error::PipelineError;
    use crate::render::StageKind;

    fn offscreen_renderer(
        config: RendererConfig,
        width: u32,
        height: u32,
    ) -> Option<FrameRenderer<'static>> {
        let mut renderer = FrameRenderer::new(config);
        match renderer.initialize(SurfaceSource::Offscreen { width, height }) {
            Ok(()) => Some(renderer),
            Err(InitError::NoContext) => {
                eprintln!("no GPU adapter available; skipping");
                None
            }
            Err(e) => panic!("unexpected initialization failure: {e}"),
        }
    }

    fn no_backends() -> RendererConfig {
        RendererConfig {
            context: ContextConfig {
                primary: wgpu::Backends::empty(),
                fallback: wgpu::Backends::empty(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn render_before_initialize_fails() {
        let mut renderer = FrameRenderer::new(RendererConfig::default());
        assert_eq!(renderer.state(), RendererState::Uninitialized);
        assert_eq!(renderer.render_frame(0.0), Err(FrameError::NotInitialized));
    }

    #[test]
    fn missing_context_is_reported_and_leaves_renderer_uninitialized() {
        let mut renderer = FrameRenderer::new(no_backends());
        let source = SurfaceSource::Offscreen {
            width: 64,
            height: 64,
        };

        assert_eq!(renderer.initialize(source), Err(InitError::NoContext));
        assert_eq!(renderer.state(), RendererState::Uninitialized);
        assert!(renderer.surface().is_none());
        assert_eq!(renderer.render_frame(0.1), Err(FrameError::NotInitialized));

        // A failed attempt does not poison later ones.
        assert_eq!(renderer.initialize(source), Err(InitError::NoContext));
    }

    #[test]
    fn ten_frames_stay_render_ready() {
        let Some(mut renderer) = offscreen_renderer(RendererConfig::default(), 64, 48) else {
            return;
        };
        assert_eq!(renderer.state(), RendererState::RenderReady);
        assert_eq!(renderer.geometry().map(|g| g.vertex_count()), Some(4));

        let mut angle = 0.0_f32;
        for _ in 0..10 {
            angle += 0.1;
            renderer.render_frame(angle).unwrap();
            assert_eq!(renderer.state(), RendererState::RenderReady);
        }

        let transform = renderer.transform();
        assert_eq!(transform.aspect(), 64.0 / 48.0);
        assert!((transform.angle() - angle).abs() < 1e-6);
    }

    #[test]
    fn unavailable_backends_leave_renderer_uninitialized() {
        let mut renderer = FrameRenderer::new(RendererConfig {
            context: ContextConfig::unavailable(),
            ..Default::default()
        });
        let result = renderer.initialize(SurfaceSource::Offscreen {
            width: 16,
            height: 16,
        });

        assert_eq!(result, Err(InitError::NoContext));
        assert_eq!(renderer.state(), RendererState::Uninitialized);
        assert!(renderer.surface().is_none());
        assert_eq!(renderer.render_frame(0.0), Err(FrameError::NotInitialized));
    }

    #[test]
    fn second_initialize_is_rejected() {
        let Some(mut renderer) = offscreen_renderer(RendererConfig::default(), 8, 8) else {
            return;
        };
        let again = renderer.initialize(SurfaceSource::Offscreen {
            width: 8,
            height: 8,
        });
        assert_eq!(again, Err(InitError::AlreadyInitialized));
        assert_eq!(renderer.state(), RendererState::RenderReady);
    }

    #[test]
    fn frames_follow_client_size_changes() {
        let Some(mut renderer) = offscreen_renderer(RendererConfig::default(), 64, 64) else {
            return;
        };
        renderer.render_frame(0.0).unwrap();

        renderer
            .surface_mut()
            .unwrap()
            .request_client_size(128, 32);
        renderer.render_frame(0.5).unwrap();
        assert_eq!(
            renderer.surface().unwrap().size(),
            SurfaceSize::new(128, 32)
        );
        assert_eq!(renderer.transform().aspect(), 4.0);

        // Zero area: skipped, still ready.
        renderer.surface_mut().unwrap().request_client_size(0, 32);
        assert_eq!(renderer.render_frame(1.0), Ok(()));
        assert_eq!(renderer.state(), RendererState::RenderReady);
    }

    #[test]
    fn compile_failure_aborts_initialize() {
        let config = RendererConfig {
            fragment_shader: Cow::Borrowed("@fragment fn fs_main( {"),
            ..Default::default()
        };
        let mut renderer = FrameRenderer::new(config);
        let result = renderer.initialize(SurfaceSource::Offscreen {
            width: 8,
            height: 8,
        });
        match result {
            Err(InitError::NoContext) => eprintln!("no GPU adapter available; skipping"),
            Err(InitError::Pipeline(PipelineError::Compile { stage, log })) => {
                assert_eq!(stage, StageKind::Fragment);
                assert!(!log.is_empty());
                assert_eq!(renderer.state(), RendererState::Uninitialized);
                assert!(renderer.pipeline().is_none());
                assert_eq!(renderer.render_frame(0.0), Err(FrameError::NotInitialized));
            }
            other => panic!("expected a fragment compile error, got {other:?}"),
        }
    }

    #[test]
    fn interpolation_mismatch_aborts_initialize() {
        let config = RendererConfig {
            vertex_shader: Cow::Borrowed(
                "
                @group(0) @binding(0) var<uniform> projection: mat4x4<f32>;
                struct Out {
                    @builtin(position) clip_position: vec4<f32>,
                    @location(0) @interpolate(flat) color: vec4<f32>,
                };
                @vertex fn vs_main(@location(0) position: vec2<f32>, @location(1) color: vec4<f32>) -> Out {
                    var o: Out;
                    o.clip_position = projection * vec4<f32>(position, 0.0, 1.0);
                    o.color = color;
                    return o;
                }",
            ),
            ..Default::default()
        };
        let mut renderer = FrameRenderer::new(config);
        let result = renderer.initialize(SurfaceSource::Offscreen {
            width: 8,
            height: 8,
        });
        match result {
            Err(InitError::NoContext) => eprintln!("no GPU adapter available; skipping"),
            Err(InitError::Pipeline(PipelineError::Link { log })) => {
                assert!(log.contains("interpolation"), "{log}");
                assert_eq!(renderer.state(), RendererState::Uninitialized);
                assert!(renderer.pipeline().is_none());
                assert_eq!(renderer.render_frame(0.0), Err(FrameError::NotInitialized));
            }
            other => panic!("expected a link error, got {other:?}"),
        }
    }

    #[test]
    fn link_failure_aborts_initialize() {
        let config = RendererConfig {
            fragment_shader: Cow::Borrowed(
                "@fragment fn fs_main(@location(2) tint: vec4<f32>) -> @location(0) vec4<f32> { return tint; }",
            ),
            ..Default::default()
        };
        let mut renderer = FrameRenderer::new(config);
        let result = renderer.initialize(SurfaceSource::Offscreen {
            width: 8,
            height: 8,
        });
        match result {
            Err(InitError::NoContext) => eprintln!("no GPU adapter available; skipping"),
            Err(InitError::Pipeline(PipelineError::Link { log })) => {
                assert!(log.contains("@location(2)"), "{log}");
                assert_eq!(renderer.state(), RendererState::Uninitialized);
                assert!(renderer.surface().is_none());
            }
            other => panic!("expected a link error, got {other:?}"),
        }
    }
}
