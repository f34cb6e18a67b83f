use wgpu::util::DeviceExt;

use crate::data_structures::model;

/// Converts tobj meshes into vertex data. Texture v coordinates are flipped
/// because OBJ puts the origin at the bottom left.
pub fn to_vertices(mesh: &tobj::Mesh) -> Vec<model::ModelVertex> {
    (0..mesh.positions.len() / 3)
        .map(|i| model::ModelVertex {
            position: [
                mesh.positions[i * 3],
                mesh.positions[i * 3 + 1],
                mesh.positions[i * 3 + 2],
            ],
            tex_coords: [
                mesh.texcoords.get(i * 2).map_or(0.0, |f| *f),
                1.0 - mesh.texcoords.get(i * 2 + 1).map_or(0.0, |f| *f),
            ],
            normal: [
                mesh.normals.get(i * 3).map_or(0.0, |f| *f),
                mesh.normals.get(i * 3 + 1).map_or(0.0, |f| *f),
                mesh.normals.get(i * 3 + 2).map_or(0.0, |f| *f),
            ],
        })
        .collect()
}

/// Uploads every OBJ model as one mesh. Meshes without a material use
/// `fallback_material`.
pub fn load_meshes(
    models: &[tobj::Model],
    file_name: &str,
    fallback_material: usize,
    device: &wgpu::Device,
) -> Vec<model::Mesh> {
    models
        .iter()
        .filter(|m| {
            if m.mesh.indices.is_empty() {
                log::warn!("Skipping empty mesh {} in {}", m.name, file_name);
            }
            !m.mesh.indices.is_empty()
        })
        .map(|m| {
            let vertices = to_vertices(&m.mesh);
            upload_mesh(
                device,
                &format!("{file_name}:{}", m.name),
                &vertices,
                &m.mesh.indices,
                m.mesh.material_id.unwrap_or(fallback_material),
            )
        })
        .collect()
}

pub fn upload_mesh(
    device: &wgpu::Device,
    name: &str,
    vertices: &[model::ModelVertex],
    indices: &[u32],
    material: usize,
) -> model::Mesh {
    let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(&format!("{:?} Vertex Buffer", name)),
        contents: bytemuck::cast_slice(vertices),
        usage: wgpu::BufferUsages::VERTEX,
    });

    let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(&format!("{:?} Index Buffer", name)),
        contents: bytemuck::cast_slice(indices),
        usage: wgpu::BufferUsages::INDEX,
    });

    model::Mesh {
        name: name.to_string(),
        vertex_buffer,
        index_buffer,
        num_elements: indices.len() as u32,
        material,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn obj_vertices_flip_v_and_default_missing_attributes() {
        let mesh = tobj::Mesh {
            positions: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            texcoords: vec![0.0, 0.25, 1.0, 1.0],
            indices: vec![0, 1, 2],
            ..Default::default()
        };
        let vertices = to_vertices(&mesh);
        assert_eq!(vertices.len(), 3);
        assert_eq!(vertices[0].tex_coords, [0.0, 0.75]);
        assert_eq!(vertices[1].tex_coords, [1.0, 0.0]);
        // Third vertex has no texcoord or normal in the file
        assert_eq!(vertices[2].tex_coords, [0.0, 1.0]);
        assert_eq!(vertices[2].normal, [0.0; 3]);
        assert_eq!(vertices[1].position, [1.0, 0.0, 0.0]);
    }
}
