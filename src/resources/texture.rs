use anyhow::Context;

use crate::data_structures::texture;

/// Root that model paths are resolved against: a directory on native, a path
/// below the page origin on the web.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetSource {
    root: String,
}

impl AssetSource {
    pub fn new(root: impl Into<String>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn path_of(&self, file_name: &str) -> std::path::PathBuf {
        std::path::Path::new(&self.root).join(file_name.trim_start_matches('/'))
    }

    #[cfg(target_arch = "wasm32")]
    fn url_of(&self, file_name: &str) -> anyhow::Result<reqwest::Url> {
        let window = web_sys::window().context("No browser window")?;
        let origin = window
            .location()
            .origin()
            .map_err(|e| anyhow::anyhow!("Could not read page origin: {e:?}"))?;
        let root = self.root.trim_matches('/');
        let base = if root.is_empty() {
            format!("{origin}/")
        } else {
            format!("{origin}/{root}/")
        };
        let base = reqwest::Url::parse(&base)?;
        Ok(base.join(file_name.trim_start_matches('/'))?)
    }
}

impl Default for AssetSource {
    fn default() -> Self {
        Self::new("assets")
    }
}

/// Resolves `uri` (as found inside a model file) relative to the model's own
/// directory.
pub fn resolve_relative(model_path: &str, uri: &str) -> String {
    match model_path.rfind('/') {
        Some(idx) => format!("{}/{}", &model_path[..idx], uri),
        None => uri.to_string(),
    }
}

pub fn diffuse_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
        label: Some("Model texture_bind_group_layout"),
    })
}

pub async fn load_string(source: &AssetSource, file_name: &str) -> anyhow::Result<String> {
    #[cfg(target_arch = "wasm32")]
    let txt = {
        let url = source.url_of(file_name)?;
        reqwest::get(url.clone())
            .await?
            .error_for_status()
            .with_context(|| format!("Could not fetch {url}"))?
            .text()
            .await?
    };
    #[cfg(not(target_arch = "wasm32"))]
    let txt = {
        let path = source.path_of(file_name);
        tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Could not read {}", path.display()))?
    };

    Ok(txt)
}

pub async fn load_binary(source: &AssetSource, file_name: &str) -> anyhow::Result<Vec<u8>> {
    #[cfg(target_arch = "wasm32")]
    let data = {
        let url = source.url_of(file_name)?;
        reqwest::get(url.clone())
            .await?
            .error_for_status()
            .with_context(|| format!("Could not fetch {url}"))?
            .bytes()
            .await?
            .to_vec()
    };
    #[cfg(not(target_arch = "wasm32"))]
    let data = {
        let path = source.path_of(file_name);
        tokio::fs::read(&path)
            .await
            .with_context(|| format!("Could not read {}", path.display()))?
    };

    Ok(data)
}

pub async fn load_texture(
    source: &AssetSource,
    file_name: &str,
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    format: Option<&str>,
) -> anyhow::Result<texture::Texture> {
    let data = load_binary(source, file_name).await?;
    texture::Texture::from_bytes(device, queue, &data, file_name, format)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uris_resolve_next_to_the_model() {
        assert_eq!(
            resolve_relative("models/overpass/scene.gltf", "scene.bin"),
            "models/overpass/scene.bin"
        );
        assert_eq!(
            resolve_relative("models/overpass/scene.gltf", "textures/Road_baseColor.png"),
            "models/overpass/textures/Road_baseColor.png"
        );
        assert_eq!(resolve_relative("scene.gltf", "scene.bin"), "scene.bin");
    }

    #[tokio::test]
    async fn reading_a_missing_file_names_the_path() {
        let source = AssetSource::new("does-not-exist");
        let err = load_binary(&source, "models/nothing.gltf").await.unwrap_err();
        assert!(format!("{err:#}").contains("nothing.gltf"));
    }

    #[tokio::test]
    async fn files_are_read_below_the_root() {
        let dir = std::env::temp_dir().join(format!("car-scene-assets-{}", std::process::id()));
        std::fs::create_dir_all(dir.join("models")).unwrap();
        std::fs::write(dir.join("models/hello.txt"), "hello").unwrap();

        let source = AssetSource::new(dir.to_string_lossy());
        assert_eq!(load_string(&source, "/models/hello.txt").await.unwrap(), "hello");
        assert_eq!(load_binary(&source, "models/hello.txt").await.unwrap(), b"hello");

        std::fs::remove_dir_all(dir).unwrap();
    }
}
