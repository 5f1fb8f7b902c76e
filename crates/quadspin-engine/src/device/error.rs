/// High-level response after a surface error.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SurfaceErrorAction {
    /// Surface was reconfigured; rendering may resume next frame.
    Reconfigured,
    /// Transient error; skip the current frame.
    SkipFrame,
    /// The context can no longer present; the renderer has to be rebuilt.
    Fatal,
}

/// Maps a `SurfaceError` to the action the frame loop should take.
pub(crate) fn classify_surface_error(err: &wgpu::SurfaceError) -> SurfaceErrorAction {
    match err {
        wgpu::SurfaceError::Outdated => SurfaceErrorAction::Reconfigured,
        wgpu::SurfaceError::Timeout | wgpu::SurfaceError::Other => SurfaceErrorAction::SkipFrame,
        wgpu::SurfaceError::Lost | wgpu::SurfaceError::OutOfMemory => SurfaceErrorAction::Fatal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outdated_surface_is_reconfigured() {
        assert_eq!(
            classify_surface_error(&wgpu::SurfaceError::Outdated),
            SurfaceErrorAction::Reconfigured
        );
    }

    #[test]
    fn transient_errors_skip_the_frame() {
        for err in [wgpu::SurfaceError::Timeout, wgpu::SurfaceError::Other] {
            assert_eq!(classify_surface_error(&err), SurfaceErrorAction::SkipFrame);
        }
    }

    #[test]
    fn lost_surface_is_fatal() {
        for err in [wgpu::SurfaceError::Lost, wgpu::SurfaceError::OutOfMemory] {
            assert_eq!(classify_surface_error(&err), SurfaceErrorAction::Fatal);
        }
    }
}
