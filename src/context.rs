use std::sync::Arc;

use anyhow::Context as _;
use winit::window::Window;

use crate::{
    camera::{Camera, CameraResources, Projection},
    config::SceneConfig,
    data_structures::texture,
    pipelines::{basic::mk_basic_pipeline, light::LightResources},
};

/// Window, GPU handles and the scene-wide resources every flow renders with.
pub struct Context {
    pub(crate) window: Arc<Window>,
    pub(crate) depth_texture: texture::Texture,
    /// Colour target resolved into the surface, `None` without MSAA.
    pub(crate) msaa_texture: Option<texture::Texture>,
    pub sample_count: u32,
    pub surface: wgpu::Surface<'static>,
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    pub config: wgpu::SurfaceConfiguration,
    pub camera: CameraResources,
    pub projection: Projection,
    pub light: LightResources,
    pub pipeline: wgpu::RenderPipeline,
    pub clear_colour: wgpu::Color,
}

/// The parts of a [`Context`] a flow needs while it is being constructed,
/// before the frame loop starts.
#[derive(Clone)]
pub struct InitContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    pub config: SceneConfig,
}

impl Context {
    pub async fn new(window: Arc<Window>, scene: &SceneConfig) -> anyhow::Result<Self> {
        let size = window.inner_size();

        // The instance is a handle to our GPU
        // BackendBit::PRIMARY => Vulkan + Metal + DX12 + Browser WebGPU
        log::info!("WGPU setup");
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            #[cfg(not(target_arch = "wasm32"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_arch = "wasm32")]
            backends: wgpu::Backends::GL,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .context("Could not create a surface for the window")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("No graphics adapter can present to this window")?;
        log::info!("Using adapter {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: None,
                    required_features: wgpu::Features::empty(),
                    // WebGL doesn't support all of wgpu's features, so if
                    // we're building for the web we'll have to disable some.
                    required_limits: if cfg!(target_arch = "wasm32") {
                        wgpu::Limits::downlevel_webgl2_defaults()
                    } else {
                        wgpu::Limits::default()
                    },
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .context("Could not open the graphics device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        // The shader assumes an sRGB surface, anything else renders too dark.
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("The surface supports no texture formats")?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps
                .present_modes
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo),
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let sample_count = pick_sample_count(
            adapter.get_texture_format_features(config.format).flags,
            adapter
                .get_texture_format_features(texture::Texture::DEPTH_FORMAT)
                .flags,
        );
        log::info!("Rendering with {sample_count}x MSAA");

        let projection = Projection::new(
            config.width,
            config.height,
            scene.projection.fovy,
            scene.projection.znear,
            scene.projection.zfar,
        );
        let camera = Camera::new(scene.camera_position, (0.0, 0.0, 0.0));
        let camera = CameraResources::new(&device, camera, &projection);

        let depth_texture = texture::Texture::create_depth_texture(
            &device,
            [config.width, config.height],
            sample_count,
            "depth_texture",
        );
        let msaa_texture = mk_msaa_texture(&device, &config, sample_count);

        let light = LightResources::new(&scene.light, &device);

        let pipeline = mk_basic_pipeline(
            &device,
            config.format,
            sample_count,
            &camera.bind_group_layout,
            &light.bind_group_layout,
        );

        Ok(Self {
            window,
            depth_texture,
            msaa_texture,
            sample_count,
            surface,
            device: Arc::new(device),
            queue: Arc::new(queue),
            config,
            camera,
            projection,
            light,
            pipeline,
            clear_colour: wgpu::Color {
                r: 0.0,
                g: 0.0,
                b: 0.0,
                a: 1.0,
            },
        })
    }

    pub fn init_context(&self, config: &SceneConfig) -> InitContext {
        InitContext {
            device: self.device.clone(),
            queue: self.queue.clone(),
            config: config.clone(),
        }
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Matches surface, depth buffer and projection to the new window size.
    pub fn resize(&mut self, width: u32, height: u32) {
        if resize_surface_config(&mut self.config, &mut self.projection, width, height) {
            self.surface.configure(&self.device, &self.config);
            self.depth_texture = texture::Texture::create_depth_texture(
                &self.device,
                [self.config.width, self.config.height],
                self.sample_count,
                "depth_texture",
            );
            self.msaa_texture = mk_msaa_texture(&self.device, &self.config, self.sample_count);
        }
    }

    pub fn reconfigure(&self) {
        self.surface.configure(&self.device, &self.config);
    }
}

/// Samples per pixel of the colour and depth targets.
pub const MSAA_SAMPLES: u32 = 4;

/// 4x MSAA when the surface format can be multisampled and resolved and the
/// depth format can be multisampled, single sampling otherwise.
pub fn pick_sample_count(
    colour: wgpu::TextureFormatFeatureFlags,
    depth: wgpu::TextureFormatFeatureFlags,
) -> u32 {
    if colour.sample_count_supported(MSAA_SAMPLES)
        && colour.contains(wgpu::TextureFormatFeatureFlags::MULTISAMPLE_RESOLVE)
        && depth.sample_count_supported(MSAA_SAMPLES)
    {
        MSAA_SAMPLES
    } else {
        1
    }
}

fn mk_msaa_texture(
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
    sample_count: u32,
) -> Option<texture::Texture> {
    (sample_count > 1).then(|| {
        texture::Texture::create_multisampled_framebuffer(device, config, sample_count, "msaa_texture")
    })
}

/// Applies a new size to the surface configuration and the projection.
/// Returns `false` for zero sizes, which happen while minimized.
pub fn resize_surface_config(
    config: &mut wgpu::SurfaceConfiguration,
    projection: &mut Projection,
    width: u32,
    height: u32,
) -> bool {
    if width == 0 || height == 0 {
        return false;
    }
    config.width = width;
    config.height = height;
    projection.resize(width, height);
    true
}

#[cfg(test)]
mod tests {
    use cgmath::Deg;

    use super::*;

    fn surface_config(width: u32, height: u32) -> wgpu::SurfaceConfiguration {
        wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: wgpu::TextureFormat::Bgra8UnormSrgb,
            width,
            height,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        }
    }

    #[test]
    fn resize_updates_surface_and_aspect() {
        let mut config = surface_config(800, 600);
        let mut projection = Projection::new(800, 600, Deg(75.0), 0.1, 1000.0);

        assert!(resize_surface_config(&mut config, &mut projection, 1920, 1080));
        assert_eq!((config.width, config.height), (1920, 1080));
        assert!((projection.aspect() - 1920.0 / 1080.0).abs() < 1e-6);
    }

    #[test]
    fn msaa_needs_support_for_colour_and_depth() {
        use wgpu::TextureFormatFeatureFlags as Flags;
        let x4 = Flags::MULTISAMPLE_X4 | Flags::MULTISAMPLE_RESOLVE;

        assert_eq!(pick_sample_count(x4, Flags::MULTISAMPLE_X4), MSAA_SAMPLES);
        assert_eq!(pick_sample_count(x4, Flags::empty()), 1);
        assert_eq!(pick_sample_count(Flags::MULTISAMPLE_X2, Flags::MULTISAMPLE_X4), 1);
        // Multisampled but not resolvable into the surface
        assert_eq!(pick_sample_count(Flags::MULTISAMPLE_X4, Flags::MULTISAMPLE_X4), 1);
    }

    #[test]
    fn zero_sizes_are_ignored() {
        let mut config = surface_config(800, 600);
        let mut projection = Projection::new(800, 600, Deg(75.0), 0.1, 1000.0);

        assert!(!resize_surface_config(&mut config, &mut projection, 0, 600));
        assert!(!resize_surface_config(&mut config, &mut projection, 800, 0));
        assert_eq!((config.width, config.height), (800, 600));
        assert!((projection.aspect() - 800.0 / 600.0).abs() < 1e-6);
    }
}
