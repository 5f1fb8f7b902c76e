/// Context acquisition parameters.
///
/// Keep this structure stable and minimal. Add configuration flags only when a
/// concrete platform or backend requirement exists.
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Backends tried first.
    pub primary: wgpu::Backends,

    /// Compatibility backends tried when the primary set yields no device.
    ///
    /// Set to `Backends::empty()` to disable the fallback.
    pub fallback: wgpu::Backends,

    pub power_preference: wgpu::PowerPreference,

    /// Prefer an sRGB surface format when available.
    pub prefer_srgb: bool,

    /// Present mode (swap behavior). Falls back to FIFO when unsupported.
    pub present_mode: wgpu::PresentMode,

    /// Optional alpha mode preference for window surfaces.
    ///
    /// If provided but unsupported on the current surface, a supported mode is selected.
    pub alpha_mode: Option<wgpu::CompositeAlphaMode>,

    /// Baseline limits requested from the device.
    ///
    /// The texture-size limits are raised to what the adapter supports at
    /// request time, so large windows still fit.
    pub required_limits: wgpu::Limits,

    /// Desired maximum frame latency for window surfaces. Hint only.
    pub desired_maximum_frame_latency: u32,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            primary: wgpu::Backends::PRIMARY,
            fallback: wgpu::Backends::SECONDARY,
            power_preference: wgpu::PowerPreference::HighPerformance,
            prefer_srgb: true,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: None,
            // Conservative so the GL fallback can satisfy it.
            required_limits: wgpu::Limits::downlevel_webgl2_defaults(),
            desired_maximum_frame_latency: 2,
        }
    }
}

impl ContextConfig {
    /// Ordered context kinds to try, skipping empty backend sets.
    pub(crate) fn attempts(&self) -> impl Iterator<Item = (&'static str, wgpu::Backends)> {
        [("primary", self.primary), ("fallback", self.fallback)]
            .into_iter()
            .filter(|(_, backends)| !backends.is_empty())
    }
}

#[cfg(test)]
impl ContextConfig {
    /// Both attempts name a backend this platform does not build, so each one
    /// is tried and fails.
    pub(crate) fn unavailable() -> Self {
        #[cfg(target_os = "macos")]
        let missing = wgpu::Backends::DX12;
        #[cfg(not(target_os = "macos"))]
        let missing = wgpu::Backends::METAL;

        Self {
            primary: missing,
            fallback: missing,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tries_primary_then_fallback() {
        let kinds: Vec<_> = ContextConfig::default().attempts().collect();
        assert_eq!(
            kinds,
            vec![
                ("primary", wgpu::Backends::PRIMARY),
                ("fallback", wgpu::Backends::SECONDARY),
            ]
        );
    }

    #[test]
    fn empty_backend_sets_are_skipped() {
        let config = ContextConfig {
            fallback: wgpu::Backends::empty(),
            ..Default::default()
        };
        let kinds: Vec<_> = config.attempts().map(|(kind, _)| kind).collect();
        assert_eq!(kinds, vec!["primary"]);
    }

    #[test]
    fn unavailable_config_still_makes_both_attempts() {
        let kinds: Vec<_> = ContextConfig::unavailable()
            .attempts()
            .map(|(kind, _)| kind)
            .collect();
        assert_eq!(kinds, vec!["primary", "fallback"]);
    }
}
