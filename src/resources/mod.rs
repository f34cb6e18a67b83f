use std::{
    io::{BufReader, Cursor},
    path::Path,
    sync::Arc,
};

use anyhow::{Context, bail};

use crate::{
    data_structures::{
        model::{self, ModelVertex},
        scene_graph::{ModelNode, SceneNode, to_scene_node, wrap_roots},
        texture::{Texture, apply_factor, decode_image},
    },
    resources::texture::{AssetSource, diffuse_layout, load_binary, load_string, resolve_relative},
};

/**
 * This module contains all logic for loading mesh/textures/etc. from external files.
 */
pub mod mesh;
pub mod texture;

/// Model file formats the loader understands, picked by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    /// `.gltf` with external or embedded buffers, or binary `.glb`.
    Gltf,
    /// Wavefront `.obj` with an optional `.mtl`.
    Obj,
}

impl ModelFormat {
    pub fn from_path(file_name: &str) -> anyhow::Result<Self> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("gltf") | Some("glb") => Ok(Self::Gltf),
            Some("obj") => Ok(Self::Obj),
            Some(other) => bail!("Unsupported model format .{other} for {file_name}"),
            None => bail!("Model {file_name} has no file extension"),
        }
    }
}

/// Loads a model file and uploads it to the GPU as a scene graph.
pub async fn load_model(
    source: &AssetSource,
    file_name: &str,
    device: &wgpu::Device,
    queue: &wgpu::Queue,
) -> anyhow::Result<Box<dyn SceneNode>> {
    log::debug!("Loading model {file_name}");
    let node = match ModelFormat::from_path(file_name)? {
        ModelFormat::Gltf => load_model_gltf(source, file_name, device, queue).await,
        ModelFormat::Obj => load_model_obj(source, file_name, device, queue).await,
    }
    .with_context(|| format!("Could not load {file_name}"))?;
    log::info!("Loaded model {file_name}");
    Ok(node)
}

pub async fn load_model_obj(
    source: &AssetSource,
    file_name: &str,
    device: &wgpu::Device,
    queue: &wgpu::Queue,
) -> anyhow::Result<Box<dyn SceneNode>> {
    let obj_text = load_string(source, file_name).await?;
    let mut obj_reader = BufReader::new(Cursor::new(obj_text));

    // The async loader is deprecated in favour of the blocking one, which
    // cannot fetch the material library over HTTP on wasm.
    #[allow(deprecated)]
    let (models, obj_materials) = tobj::load_obj_buf_async(
        &mut obj_reader,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
        |p| {
            let mtl_path = resolve_relative(file_name, &p);
            async move {
                match load_string(source, &mtl_path).await {
                    Ok(mat_text) => tobj::load_mtl_buf(&mut BufReader::new(Cursor::new(mat_text))),
                    Err(e) => {
                        log::warn!("Material library not found: {e:#}");
                        Err(tobj::LoadError::OpenFileFailed)
                    }
                }
            }
        },
    )
    .await
    .with_context(|| format!("Could not parse {file_name}"))?;

    let obj_materials = obj_materials.unwrap_or_else(|e| {
        log::warn!("Using default materials for {file_name}: {e}");
        Vec::new()
    });

    let layout = diffuse_layout(device);
    let mut materials = Vec::new();
    for m in obj_materials {
        let diffuse_texture = match &m.diffuse_texture {
            Some(tex) => {
                let tex_path = resolve_relative(file_name, tex);
                match texture::load_texture(source, &tex_path, device, queue, None).await {
                    Ok(loaded) => Some(loaded),
                    Err(e) => {
                        log::warn!("Material {} of {file_name} drops its texture: {e:#}", m.name);
                        None
                    }
                }
            }
            None => None,
        };
        let diffuse_texture = diffuse_texture.unwrap_or_else(|| {
            let [r, g, b] = m.diffuse.unwrap_or([1.0, 1.0, 1.0]);
            Texture::solid(device, queue, [r, g, b, m.dissolve.unwrap_or(1.0)], &m.name)
        });
        materials.push(model::Material::new(device, &m.name, diffuse_texture, &layout));
    }
    let fallback_material = materials.len();
    materials.push(default_material(device, queue, &layout));

    let meshes = mesh::load_meshes(&models, file_name, fallback_material, device);
    let model = model::Model {
        meshes,
        materials: Arc::new(materials),
    };
    Ok(wrap_roots(vec![Box::new(ModelNode::from_model(device, model))]))
}

pub async fn load_model_gltf(
    source: &AssetSource,
    file_name: &str,
    device: &wgpu::Device,
    queue: &wgpu::Queue,
) -> anyhow::Result<Box<dyn SceneNode>> {
    let gltf_bytes = load_binary(source, file_name).await?;
    let gltf = gltf::Gltf::from_slice(&gltf_bytes)
        .with_context(|| format!("Could not parse {file_name}"))?;

    // Load buffers
    let mut buffer_data: Vec<Vec<u8>> = Vec::new();
    for buffer in gltf.buffers() {
        match buffer.source() {
            gltf::buffer::Source::Bin => {
                let blob = gltf
                    .blob
                    .as_deref()
                    .with_context(|| format!("{file_name} references a missing GLB chunk"))?;
                buffer_data.push(blob.into());
            }
            gltf::buffer::Source::Uri(uri) => {
                if uri.starts_with("data:") {
                    bail!("Embedded data URIs are not supported ({file_name})");
                }
                let bin = load_binary(source, &resolve_relative(file_name, uri)).await?;
                buffer_data.push(bin);
            }
        }
    }

    // Load materials
    let layout = diffuse_layout(device);
    let mut materials = Vec::new();
    for material in gltf.materials() {
        let name = material.name().unwrap_or(file_name);
        let pbr = material.pbr_metallic_roughness();
        let diffuse_texture =
            match base_colour_image(source, file_name, &material, &buffer_data).await {
                Some(rgba) => Texture::from_image(
                    device,
                    queue,
                    &image::DynamicImage::ImageRgba8(rgba),
                    Some(name),
                ),
                None => Texture::solid(device, queue, pbr.base_color_factor(), name),
            };
        materials.push(model::Material::new(device, name, diffuse_texture, &layout));
    }
    // Primitives without a material
    let default_material_index = materials.len();
    materials.push(default_material(device, queue, &layout));
    let materials = Arc::new(materials);

    // Upload every mesh once, nodes pick them up by index
    let mut meshes = Vec::new();
    for mesh in gltf.meshes() {
        let mut primitives = Vec::new();
        for primitive in mesh.primitives() {
            let reader = primitive.reader(|buffer| buffer_data.get(buffer.index()).map(Vec::as_slice));
            let Some(positions) = reader.read_positions() else {
                log::warn!(
                    "Skipping primitive {} of mesh {} in {file_name}: no positions",
                    primitive.index(),
                    mesh.index()
                );
                continue;
            };
            let mut vertices: Vec<ModelVertex> = positions
                .map(|position| ModelVertex {
                    position,
                    ..Default::default()
                })
                .collect();
            if let Some(normals) = reader.read_normals() {
                vertices
                    .iter_mut()
                    .zip(normals)
                    .for_each(|(v, normal)| v.normal = normal);
            }
            if let Some(tex_coords) = reader.read_tex_coords(0) {
                vertices
                    .iter_mut()
                    .zip(tex_coords.into_f32())
                    .for_each(|(v, tc)| v.tex_coords = tc);
            }
            let indices: Vec<u32> = match reader.read_indices() {
                Some(indices) => indices.into_u32().collect(),
                None => (0..vertices.len() as u32).collect(),
            };
            let name = format!(
                "{file_name}:{}:{}",
                mesh.name().unwrap_or("mesh"),
                primitive.index()
            );
            let material = primitive
                .material()
                .index()
                .unwrap_or(default_material_index);
            primitives.push(mesh::upload_mesh(device, &name, &vertices, &indices, material));
        }
        meshes.push(Some(primitives));
    }

    let scene = gltf
        .default_scene()
        .or_else(|| gltf.scenes().next())
        .with_context(|| format!("{file_name} contains no scene"))?;
    let nodes: Vec<Box<dyn SceneNode>> = scene
        .nodes()
        .map(|node| to_scene_node(node, &mut meshes, &materials, device))
        .collect();

    Ok(wrap_roots(nodes))
}

/// Decodes the base-colour texture of a glTF material and multiplies it by
/// the material's base-colour factor.
///
/// Returns `None` when the material has no texture or the image cannot be
/// read. The caller then falls back to a solid texture of the factor, so a
/// single broken image never fails the whole model.
pub async fn base_colour_image(
    source: &AssetSource,
    file_name: &str,
    material: &gltf::Material<'_>,
    buffer_data: &[Vec<u8>],
) -> Option<image::RgbaImage> {
    let pbr = material.pbr_metallic_roughness();
    let info = pbr.base_color_texture()?;
    let name = material.name().unwrap_or(file_name);

    let decoded = match info.texture().source().source() {
        gltf::image::Source::View { view, mime_type } => buffer_data
            .get(view.buffer().index())
            .and_then(|buffer| buffer.get(view.offset()..view.offset() + view.length()))
            .with_context(|| format!("Image view of {name} is out of bounds"))
            .and_then(|bytes| decode_image(bytes, name, mime_type.split('/').last())),
        gltf::image::Source::Uri { uri, mime_type } => {
            let path = resolve_relative(file_name, uri);
            match load_binary(source, &path).await {
                Ok(bytes) => decode_image(&bytes, &path, mime_type.and_then(|mt| mt.split('/').last())),
                Err(e) => Err(e),
            }
        }
    };

    match decoded {
        Ok(img) => {
            let mut rgba = img.to_rgba8();
            apply_factor(&mut rgba, pbr.base_color_factor());
            Some(rgba)
        }
        Err(e) => {
            log::warn!("Material {name} of {file_name} falls back to its base colour: {e:#}");
            None
        }
    }
}

fn default_material(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layout: &wgpu::BindGroupLayout,
) -> model::Material {
    let texture = Texture::solid(device, queue, [1.0, 1.0, 1.0, 1.0], "Default Material");
    model::Material::new(device, "Default Material", texture, layout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_are_chosen_by_extension() {
        assert_eq!(
            ModelFormat::from_path("models/PorcheCar/scene.gltf").unwrap(),
            ModelFormat::Gltf
        );
        assert_eq!(ModelFormat::from_path("car.GLB").unwrap(), ModelFormat::Gltf);
        assert_eq!(ModelFormat::from_path("cube.obj").unwrap(), ModelFormat::Obj);
    }

    #[tokio::test]
    async fn broken_textures_fall_back_and_factors_tint() {
        let dir = std::env::temp_dir().join(format!("car-scene-materials-{}", std::process::id()));
        std::fs::create_dir_all(dir.join("car")).unwrap();
        image::RgbaImage::from_pixel(1, 1, image::Rgba([255, 255, 255, 255]))
            .save(dir.join("car/white.png"))
            .unwrap();
        let json = r#"{
            "asset": {"version": "2.0"},
            "images": [{"uri": "missing.png"}, {"uri": "white.png"}],
            "textures": [{"source": 0}, {"source": 1}],
            "materials": [
                {"name": "broken", "pbrMetallicRoughness": {"baseColorTexture": {"index": 0}}},
                {"name": "paint", "pbrMetallicRoughness": {
                    "baseColorTexture": {"index": 1},
                    "baseColorFactor": [1.0, 0.0, 0.0, 1.0]
                }}
            ]
        }"#;
        let gltf = gltf::Gltf::from_slice(json.as_bytes()).unwrap();
        let source = AssetSource::new(dir.to_string_lossy().into_owned());

        let materials: Vec<_> = gltf.materials().collect();
        let broken = base_colour_image(&source, "car/scene.gltf", &materials[0], &[]).await;
        assert!(broken.is_none());

        let paint = base_colour_image(&source, "car/scene.gltf", &materials[1], &[])
            .await
            .unwrap();
        assert_eq!(paint.get_pixel(0, 0).0, [255, 0, 0, 255]);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn unknown_formats_are_rejected() {
        let err = ModelFormat::from_path("models/car.fbx").unwrap_err();
        assert!(err.to_string().contains(".fbx"));
        assert!(ModelFormat::from_path("models/car").is_err());
    }
}
