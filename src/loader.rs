//! Concurrent loading of the three scene assets.

use std::sync::Arc;

use log::info;

use crate::{
    config::SceneConfig,
    data_structures::scene_graph::SceneNode,
    resources::{load_model, texture::AssetSource},
    scene::{AssetKind, SceneState},
};

/// Loads one model file. The scene only needs the future; what a model is
/// depends on the implementation.
#[allow(async_fn_in_trait)]
pub trait ModelLoader {
    type Model;

    async fn load(&self, path: &str) -> anyhow::Result<Self::Model>;
}

/// Loads models from the asset root and uploads them to the GPU.
pub struct GpuModelLoader {
    source: AssetSource,
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
}

impl GpuModelLoader {
    pub fn new(source: AssetSource, device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        Self {
            source,
            device,
            queue,
        }
    }
}

impl ModelLoader for GpuModelLoader {
    type Model = Box<dyn SceneNode>;

    async fn load(&self, path: &str) -> anyhow::Result<Self::Model> {
        load_model(&self.source, path, &self.device, &self.queue).await
    }
}

/// Loads car, buildings and road concurrently and settles all three before
/// the car is seated on the road, so the result does not depend on which
/// load finishes first.
pub async fn load_scene<L: ModelLoader>(loader: &L, config: &SceneConfig) -> SceneState<L::Model> {
    let mut state = SceneState::new(config);

    let (car, buildings, road) = futures::join!(
        loader.load(config.car.path),
        loader.load(config.buildings.path),
        loader.load(config.road.path),
    );
    state.settle(AssetKind::Car, car);
    state.settle(AssetKind::Buildings, buildings);
    state.settle(AssetKind::Road, road);

    if state.seat_car_on_road() {
        info!("Placed the car on the road");
    }
    let failures = state.failures().len();
    info!("Scene loaded, {} of 3 models available", 3 - failures);

    state
}
