use glam::{Mat4, Quat, Vec3};
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};

const MIN_FOV_DEG: f32 = 30.0;
const MAX_FOV_DEG: f32 = 110.0;
/// Stop just short of straight up/down so the view never rolls over.
const MAX_PITCH_RAD: f32 = 89.0 * std::f32::consts::PI / 180.0;

/// Head-at-origin camera for the desktop preview: the mouse turns the head,
/// the wheel changes the field of view.
#[derive(Debug, Clone)]
pub struct LookCamera {
    /// Rotation about +Y, radians. Positive turns left.
    pub yaw_rad: f32,
    /// Rotation about the camera's X axis, radians. Positive looks up.
    pub pitch_rad: f32,
    pub fov_y_deg: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl LookCamera {
    pub fn new(aspect: f32) -> Self {
        Self {
            yaw_rad: 0.0,
            pitch_rad: 0.0,
            fov_y_deg: 75.0,
            aspect,
            near: 0.05,
            far: 100.0,
        }
    }

    pub fn set_aspect(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    pub fn orientation(&self) -> Quat {
        Quat::from_rotation_y(self.yaw_rad) * Quat::from_rotation_x(self.pitch_rad)
    }

    /// Direction the camera looks in.
    pub fn forward(&self) -> Vec3 {
        self.orientation() * Vec3::NEG_Z
    }

    /// World-to-eye transform. The head sits at the origin.
    pub fn view(&self) -> Mat4 {
        Mat4::from_quat(self.orientation().inverse())
    }

    /// Right-handed perspective with wgpu's 0..1 depth range.
    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.fov_y_deg.to_radians(),
            self.aspect.max(f32::EPSILON),
            self.near,
            self.far,
        )
    }

    pub fn turn(&mut self, d_yaw: f32, d_pitch: f32) {
        self.yaw_rad = (self.yaw_rad + d_yaw).rem_euclid(std::f32::consts::TAU);
        self.pitch_rad = (self.pitch_rad + d_pitch).clamp(-MAX_PITCH_RAD, MAX_PITCH_RAD);
    }

    pub fn zoom(&mut self, scroll: f32) {
        // Scroll up narrows the view.
        self.fov_y_deg = (self.fov_y_deg * 1.1_f32.powf(-scroll)).clamp(MIN_FOV_DEG, MAX_FOV_DEG);
    }
}

#[derive(Debug, Default)]
pub struct CameraController {
    mouse_down: bool,
    last_mouse: Option<(f64, f64)>,
}

impl CameraController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles window events and updates the camera.
    pub fn handle_event(&mut self, event: &WindowEvent, camera: &mut LookCamera) {
        match event {
            WindowEvent::MouseInput { button, state, .. } => {
                if *button == MouseButton::Left {
                    self.mouse_down = *state == ElementState::Pressed;
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.handle_cursor((position.x, position.y), camera);
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let scroll = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 120.0,
                };
                camera.zoom(scroll);
            }
            WindowEvent::Resized(size) => camera.set_aspect(size.width, size.height),
            _ => {}
        }
    }

    /// Drags the scene: moving the mouse right turns the head left.
    fn handle_cursor(&mut self, xy: (f64, f64), camera: &mut LookCamera) {
        if let Some(last) = self.last_mouse {
            if self.mouse_down {
                // Scale with the field of view so dragging feels the same zoomed in.
                let k = 0.005 * camera.fov_y_deg / 75.0;
                let dx = (xy.0 - last.0) as f32 * k;
                let dy = (xy.1 - last.1) as f32 * k;
                camera.turn(dx, dy);
            }
        }
        self.last_mouse = Some(xy);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_view_looks_down_negative_z() {
        let camera = LookCamera::new(16.0 / 9.0);
        assert!(camera.forward().abs_diff_eq(Vec3::NEG_Z, 1e-6));
        let ahead = camera.view().transform_point3(Vec3::new(0.0, 0.0, -2.0));
        assert!(ahead.abs_diff_eq(Vec3::new(0.0, 0.0, -2.0), 1e-6));
    }

    #[test]
    fn turning_left_moves_forward_towards_negative_x() {
        let mut camera = LookCamera::new(1.0);
        camera.turn(std::f32::consts::FRAC_PI_2, 0.0);
        assert!(camera.forward().abs_diff_eq(Vec3::NEG_X, 1e-5));
    }

    #[test]
    fn pitch_and_fov_are_clamped() {
        let mut camera = LookCamera::new(1.0);
        camera.turn(0.0, 10.0);
        assert!(camera.pitch_rad <= MAX_PITCH_RAD);
        camera.zoom(100.0);
        assert_eq!(camera.fov_y_deg, MIN_FOV_DEG);
        camera.zoom(-100.0);
        assert_eq!(camera.fov_y_deg, MAX_FOV_DEG);
    }
}
