//! Camera, projection and orbit controls.
//!
//! The camera is a plain look-at camera (`position` looking at `target`).
//! [`OrbitController`] turns pointer input into rotation around, panning of
//! and zooming towards that target. Input is accumulated from window events
//! and applied once per frame in [`OrbitController::update`].

use std::f32::consts::PI;

use cgmath::{InnerSpace, Matrix4, Point3, Rad, Vector3, perspective};
use wgpu::util::DeviceExt;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

// Keeps the orbit away from the poles where look_at degenerates
const POLAR_EPSILON: f32 = 0.000_1;
// Pixel deltas of a trackpad are mapped onto wheel "lines"
const PIXELS_PER_LINE: f32 = 50.0;

#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
}

impl Camera {
    pub fn new<P: Into<Point3<f32>>, T: Into<Point3<f32>>>(position: P, target: T) -> Self {
        Self {
            position: position.into(),
            target: target.into(),
        }
    }

    pub fn look_at(&mut self, target: Point3<f32>) {
        self.target = target;
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.position, self.target, Vector3::unit_y())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Projection {
    aspect: f32,
    fovy: Rad<f32>,
    znear: f32,
    zfar: f32,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width as f32 / height.max(1) as f32,
            fovy: fovy.into(),
            znear,
            zfar,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height.max(1) as f32;
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

// We need this for Rust to store our data correctly for the shaders
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    view_position: [f32; 4],
    view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        use cgmath::SquareMatrix;
        Self {
            view_position: [0.0; 4],
            view_proj: Matrix4::identity().into(),
        }
    }

    pub fn update_view_proj(&mut self, camera: &Camera, projection: &Projection) {
        self.view_position = camera.position.to_homogeneous().into();
        self.view_proj = (projection.calc_matrix() * camera.calc_matrix()).into();
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Drag {
    None,
    Rotate,
    Pan,
}

/// Pointer driven orbit controls.
///
/// Left drag rotates around the target, right drag pans, the wheel zooms.
#[derive(Debug)]
pub struct OrbitController {
    rotate_speed: f32,
    pan_speed: f32,
    zoom_speed: f32,
    min_distance: f32,
    max_distance: f32,
    drag: Drag,
    cursor: Option<(f64, f64)>,
    rotate_delta: (f32, f32),
    pan_delta: (f32, f32),
    zoom_lines: f32,
}

impl OrbitController {
    pub fn new(rotate_speed: f32, pan_speed: f32, zoom_speed: f32) -> Self {
        Self {
            rotate_speed,
            pan_speed,
            zoom_speed,
            min_distance: 1.0,
            max_distance: 500.0,
            drag: Drag::None,
            cursor: None,
            rotate_delta: (0.0, 0.0),
            pan_delta: (0.0, 0.0),
            zoom_lines: 0.0,
        }
    }

    pub fn with_distance_limits(mut self, min_distance: f32, max_distance: f32) -> Self {
        self.min_distance = min_distance.min(max_distance);
        self.max_distance = max_distance.max(min_distance);
        self
    }

    /// Horizontal and vertical rotation in pixels of pointer travel.
    pub fn handle_rotate(&mut self, dx: f32, dy: f32) {
        self.rotate_delta.0 += dx;
        self.rotate_delta.1 += dy;
    }

    pub fn handle_pan(&mut self, dx: f32, dy: f32) {
        self.pan_delta.0 += dx;
        self.pan_delta.1 += dy;
    }

    /// Positive lines zoom in, negative lines zoom out.
    pub fn handle_scroll(&mut self, delta: &MouseScrollDelta) {
        self.zoom_lines += match delta {
            MouseScrollDelta::LineDelta(_, lines) => *lines,
            MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / PIXELS_PER_LINE,
        };
    }

    pub fn handle_window_events(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::MouseInput { state, button, .. } => {
                self.drag = match (state, button) {
                    (ElementState::Pressed, MouseButton::Left) => Drag::Rotate,
                    (ElementState::Pressed, MouseButton::Right) => Drag::Pan,
                    (ElementState::Released, _) => Drag::None,
                    _ => self.drag,
                };
            }
            WindowEvent::CursorMoved { position, .. } => {
                let current = (position.x, position.y);
                if let Some((x, y)) = self.cursor {
                    let (dx, dy) = ((current.0 - x) as f32, (current.1 - y) as f32);
                    match self.drag {
                        Drag::Rotate => self.handle_rotate(dx, dy),
                        Drag::Pan => self.handle_pan(dx, dy),
                        Drag::None => (),
                    }
                }
                self.cursor = Some(current);
            }
            WindowEvent::CursorLeft { .. } => {
                self.cursor = None;
                self.drag = Drag::None;
            }
            WindowEvent::MouseWheel { delta, .. } => self.handle_scroll(delta),
            _ => (),
        }
    }

    /// Applies the accumulated input to `camera`. Returns `true` if the camera
    /// moved.
    pub fn update(&mut self, camera: &mut Camera) -> bool {
        let rotate = std::mem::take(&mut self.rotate_delta);
        let pan = std::mem::take(&mut self.pan_delta);
        let zoom_lines = std::mem::take(&mut self.zoom_lines);
        if rotate == (0.0, 0.0) && pan == (0.0, 0.0) && zoom_lines == 0.0 {
            return false;
        }

        let offset = camera.position - camera.target;
        let radius = offset.magnitude();
        if radius <= f32::EPSILON {
            log::warn!("Camera sits on its orbit target, orbit controls are inactive");
            return false;
        }
        let before = camera.clone();

        // Spherical coordinates around +y
        let mut theta = offset.x.atan2(offset.z);
        let mut phi = (offset.y / radius).clamp(-1.0, 1.0).acos();
        theta -= rotate.0 * self.rotate_speed;
        phi -= rotate.1 * self.rotate_speed;
        phi = phi.clamp(POLAR_EPSILON, PI - POLAR_EPSILON);

        let radius = (radius * self.zoom_speed.powf(zoom_lines))
            .clamp(self.min_distance, self.max_distance);

        if pan != (0.0, 0.0) {
            let forward = (camera.target - camera.position).normalize();
            let right = forward.cross(Vector3::unit_y()).normalize();
            let up = right.cross(forward).normalize();
            let scale = self.pan_speed * radius;
            camera.target += (-right * pan.0 + up * pan.1) * scale;
        }

        let new_offset = Vector3::new(
            radius * phi.sin() * theta.sin(),
            radius * phi.cos(),
            radius * phi.sin() * theta.cos(),
        );
        camera.position = camera.target + new_offset;
        *camera != before
    }
}

impl Default for OrbitController {
    fn default() -> Self {
        Self::new(0.005, 0.001, 0.95)
    }
}

/// Camera state plus its GPU uniform and bind group.
#[derive(Debug)]
pub struct CameraResources {
    pub camera: Camera,
    pub controller: OrbitController,
    pub uniform: CameraUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

impl CameraResources {
    pub fn new(device: &wgpu::Device, camera: Camera, projection: &Projection) -> Self {
        let mut uniform = CameraUniform::new();
        uniform.update_view_proj(&camera, projection);

        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
            label: Some("camera_bind_group_layout"),
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("camera_bind_group"),
        });

        Self {
            camera,
            controller: OrbitController::default(),
            uniform,
            buffer,
            bind_group,
            bind_group_layout,
        }
    }

    /// Applies pending orbit input and uploads the view projection.
    pub fn update(&mut self, queue: &wgpu::Queue, projection: &Projection) {
        self.controller.update(&mut self.camera);
        self.uniform.update_view_proj(&self.camera, projection);
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[self.uniform]));
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{Deg, MetricSpace};

    use super::*;

    fn camera() -> Camera {
        Camera::new((0.0, 5.0, 10.0), (0.0, 3.0, 0.0))
    }

    #[test]
    fn projection_tracks_viewport_aspect() {
        let mut projection = Projection::new(800, 600, Deg(75.0), 0.1, 1000.0);
        assert_eq!(projection.aspect(), 800.0 / 600.0);
        projection.resize(1920, 1080);
        assert_eq!(projection.aspect(), 1920.0 / 1080.0);
    }

    #[test]
    fn rotating_keeps_distance_to_target() {
        let mut camera = camera();
        let distance = camera.position.distance(camera.target);
        let mut controller = OrbitController::default();
        controller.handle_rotate(120.0, -40.0);
        assert!(controller.update(&mut camera));
        assert!((camera.position.distance(camera.target) - distance).abs() < 1e-3);
        assert_eq!(camera.target, Point3::new(0.0, 3.0, 0.0));
    }

    #[test]
    fn pitch_never_flips_over_the_pole() {
        let mut camera = camera();
        let mut controller = OrbitController::default();
        controller.handle_rotate(0.0, 100_000.0);
        controller.update(&mut camera);
        let offset = camera.position - camera.target;
        assert!(offset.y > 0.0);
        assert!(offset.x.abs() + offset.z.abs() > 0.0);
    }

    #[test]
    fn zoom_is_clamped_to_limits() {
        let mut camera = camera();
        let mut controller = OrbitController::default().with_distance_limits(2.0, 20.0);
        controller.handle_scroll(&MouseScrollDelta::LineDelta(0.0, 1_000.0));
        controller.update(&mut camera);
        assert!((camera.position.distance(camera.target) - 2.0).abs() < 1e-4);

        controller.handle_scroll(&MouseScrollDelta::LineDelta(0.0, -1_000.0));
        controller.update(&mut camera);
        assert!((camera.position.distance(camera.target) - 20.0).abs() < 1e-3);
    }

    #[test]
    fn panning_moves_target_and_camera_together() {
        let mut camera = camera();
        let offset = camera.position - camera.target;
        let mut controller = OrbitController::default();
        controller.handle_pan(50.0, 0.0);
        assert!(controller.update(&mut camera));
        assert_ne!(camera.target, Point3::new(0.0, 3.0, 0.0));
        assert!((camera.position - camera.target - offset).magnitude() < 1e-3);
    }

    #[test]
    fn idle_update_leaves_camera_alone() {
        let mut camera = camera();
        let mut controller = OrbitController::default();
        assert!(!controller.update(&mut camera));
        assert_eq!(camera, self::camera());
    }

    #[test]
    fn uniform_matches_shader_layout() {
        assert_eq!(std::mem::size_of::<CameraUniform>(), 80);
    }
}
