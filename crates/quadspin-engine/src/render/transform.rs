use std::f32::consts::TAU;

use glam::{Mat4, Vec3};

pub const FIELD_OF_VIEW_DEGREES: f32 = 45.0;
pub const Z_NEAR: f32 = 0.1;
pub const Z_FAR: f32 = 100.0;

/// Where the quad sits relative to the camera. Off the view axis on purpose.
pub const MODEL_OFFSET: Vec3 = Vec3::new(-1.5, 0.0, -6.0);

/// Brings `angle` into `[0, 2π)`. Non-finite input maps to zero.
#[inline]
pub fn normalize_angle(angle: f32) -> f32 {
    if !angle.is_finite() {
        return 0.0;
    }
    let wrapped = angle.rem_euclid(TAU);
    // rem_euclid can round up to TAU for tiny negative inputs.
    if wrapped >= TAU { 0.0 } else { wrapped }
}

/// Projection and model-view matrices for the quad.
///
/// Both matrices are rebuilt from scratch on every update; nothing accumulates
/// across frames.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    aspect: f32,
    angle: f32,
    projection: Mat4,
    model_view: Mat4,
}

impl Default for Transform {
    fn default() -> Self {
        let mut transform = Self {
            aspect: 1.0,
            angle: 0.0,
            projection: Mat4::IDENTITY,
            model_view: Mat4::IDENTITY,
        };
        transform.update_projection(1.0);
        transform.update_model_view(0.0);
        transform
    }
}

impl Transform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the perspective projection for `aspect` (width / height).
    ///
    /// Non-positive or non-finite ratios are ignored and the previous matrix is kept.
    pub fn update_projection(&mut self, aspect: f32) {
        if !(aspect.is_finite() && aspect > 0.0) {
            log::warn!("ignoring invalid aspect ratio {aspect}");
            return;
        }
        self.aspect = aspect;
        self.projection =
            Mat4::perspective_rh(FIELD_OF_VIEW_DEGREES.to_radians(), aspect, Z_NEAR, Z_FAR);
    }

    /// Resets the model-view to identity, then translates by [`MODEL_OFFSET`]
    /// and rotates about Z by `angle` (radians, normalised to one turn).
    pub fn update_model_view(&mut self, angle: f32) {
        self.angle = normalize_angle(angle);
        self.model_view = Mat4::IDENTITY;
        self.model_view *= Mat4::from_translation(MODEL_OFFSET);
        self.model_view *= Mat4::from_rotation_z(self.angle);
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    /// Rotation applied by the last model-view update, in `[0, 2π)`.
    pub fn angle(&self) -> f32 {
        self.angle
    }

    pub fn projection(&self) -> &Mat4 {
        &self.projection
    }

    pub fn model_view(&self) -> &Mat4 {
        &self.model_view
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    #[test]
    fn projection_aspect_term_matches_ratio() {
        for (w, h) in [(640u32, 480u32), (1920, 1080), (300, 900), (1, 1)] {
            let aspect = w as f32 / h as f32;
            let mut t = Transform::new();
            t.update_projection(aspect);

            assert_eq!(t.aspect(), aspect);
            let p = t.projection();
            // perspective: x scale = y scale / aspect
            assert!((p.y_axis.y / p.x_axis.x - aspect).abs() < EPS * aspect.max(1.0));
        }
    }

    #[test]
    fn projection_is_rebuilt_not_accumulated() {
        let mut once = Transform::new();
        once.update_projection(16.0 / 9.0);

        let mut twice = Transform::new();
        twice.update_projection(16.0 / 9.0);
        twice.update_projection(16.0 / 9.0);

        assert_eq!(once.projection(), twice.projection());

        twice.update_projection(4.0 / 3.0);
        twice.update_projection(16.0 / 9.0);
        assert_eq!(once.projection(), twice.projection());
    }

    #[test]
    fn invalid_aspect_keeps_previous_projection() {
        let mut t = Transform::new();
        t.update_projection(2.0);
        let before = *t.projection();
        t.update_projection(0.0);
        t.update_projection(f32::NAN);
        assert_eq!(*t.projection(), before);
        assert_eq!(t.aspect(), 2.0);
    }

    #[test]
    fn model_view_is_translate_then_rotate() {
        let mut t = Transform::new();
        t.update_model_view(0.7);
        let expected = Mat4::from_translation(MODEL_OFFSET) * Mat4::from_rotation_z(0.7);
        assert!(t.model_view().abs_diff_eq(expected, EPS));
    }

    #[test]
    fn rotations_compose_additively() {
        let (a, b) = (0.4_f32, 1.1_f32);

        let mut first = Transform::new();
        first.update_model_view(a);
        let composed = *first.model_view() * Mat4::from_rotation_z(b);

        let mut single = Transform::new();
        single.update_model_view(a + b);

        assert!(composed.abs_diff_eq(*single.model_view(), EPS));
    }

    #[test]
    fn repeated_updates_do_not_drift() {
        let mut t = Transform::new();
        t.update_model_view(0.3);
        let first = *t.model_view();
        for _ in 0..100 {
            t.update_model_view(0.3);
        }
        assert_eq!(*t.model_view(), first);
        // The translation column stays put.
        assert!(t.model_view().w_axis.truncate().abs_diff_eq(MODEL_OFFSET, EPS));
    }

    #[test]
    fn angles_wrap_to_one_turn() {
        assert_eq!(normalize_angle(0.0), 0.0);
        assert!((normalize_angle(TAU + 0.5) - 0.5).abs() < EPS);
        assert!((normalize_angle(-0.5) - (TAU - 0.5)).abs() < EPS);
        assert_eq!(normalize_angle(f32::INFINITY), 0.0);

        let mut big = Transform::new();
        big.update_model_view(100.0 * TAU + 0.25);
        assert!(big.angle() < TAU);

        let mut small = Transform::new();
        small.update_model_view(0.25);
        assert!(big.model_view().abs_diff_eq(*small.model_view(), 1e-3));
    }
}
