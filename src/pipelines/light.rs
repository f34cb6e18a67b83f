use cgmath::InnerSpace;
use wgpu::util::DeviceExt;

use crate::config::LightConfig;

/// Ambient and directional light, bound at group 2 of the model pipeline.
#[derive(Debug)]
pub struct LightResources {
    pub uniform: LightUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

impl LightResources {
    pub fn new(light: &LightConfig, device: &wgpu::Device) -> Self {
        let uniform = LightUniform::from(light);
        let buffer = mk_buffer(device, uniform);
        let bind_group_layout = mk_bind_group_layout(device);
        let bind_group = mk_bind_group(device, &bind_group_layout, &buffer);
        Self {
            uniform,
            buffer,
            bind_group,
            bind_group_layout,
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniform {
    direction: [f32; 3],
    // vec3 + f32 share one 16 byte slot in WGSL
    intensity: f32,
    color: [f32; 3],
    ambient_intensity: f32,
    ambient_color: [f32; 3],
    _padding: u32,
}

impl From<&LightConfig> for LightUniform {
    fn from(light: &LightConfig) -> Self {
        Self {
            direction: light.directional_position.normalize().into(),
            intensity: light.directional_intensity,
            color: light.directional_color,
            ambient_intensity: light.ambient_intensity,
            ambient_color: light.ambient_color,
            _padding: 0,
        }
    }
}

pub fn mk_buffer(device: &wgpu::Device, light_uniform: LightUniform) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Light Buffer"),
        contents: bytemuck::cast_slice(&[light_uniform]),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    })
}

pub fn mk_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
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
        label: Some("light_bind_group_layout"),
    })
}

pub fn mk_bind_group(
    device: &wgpu::Device,
    bind_group_layout: &wgpu::BindGroupLayout,
    light_buffer: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout: bind_group_layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: light_buffer.as_entire_binding(),
        }],
        label: Some("light_bind_group"),
    })
}

#[cfg(test)]
mod tests {
    use crate::config::SceneConfig;

    use super::*;

    #[test]
    fn uniform_is_built_from_scene_lights() {
        let uniform = LightUniform::from(&SceneConfig::default().light);
        assert_eq!(std::mem::size_of::<LightUniform>(), 48);
        assert_eq!(uniform.ambient_intensity, 0.5);
        assert_eq!(uniform.intensity, 1.0);
        let len = uniform.direction.iter().map(|c| c * c).sum::<f32>().sqrt();
        assert!((len - 1.0).abs() < 1e-6);
        assert!(uniform.direction[1] > uniform.direction[0]);
    }
}
