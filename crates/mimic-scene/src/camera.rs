//! Perspective camera and viewport

use crate::Vec3;

/// Output surface size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width over height; 1.0 for a degenerate (zero height) surface
    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1280, 720)
    }
}

/// Perspective camera framing the avatar's head and shoulders
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    /// Vertical field of view in degrees
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
}

impl Camera {
    pub fn for_viewport(viewport: Viewport) -> Self {
        Self {
            fov_y: 50.0,
            aspect: viewport.aspect(),
            near: 0.1,
            far: 1000.0,
            position: Vec3::new(0.0, 1.5, 2.2),
        }
    }

    /// Follow a surface resize
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.aspect = viewport.aspect();
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::for_viewport(Viewport::default())
    }
}
