//! The car scene as a [`GraphicsFlow`].

use std::{pin::Pin, sync::Arc};

use cgmath::Point3;
use instant::Duration;
use winit::event::WindowEvent;

use crate::{
    context::{Context, InitContext},
    data_structures::scene_graph::{SceneNode, place},
    flow::{FlowConstructor, GraphicsFlow},
    loader::{GpuModelLoader, load_scene},
    render::Render,
    resources::texture::AssetSource,
    scene::SceneState,
};

pub struct CarFlow {
    scene: SceneState<Box<dyn SceneNode>>,
    queue: Arc<wgpu::Queue>,
    camera_position: Point3<f32>,
}

impl CarFlow {
    /// Loads the three models and builds the flow.
    pub async fn new(init: InitContext) -> Self {
        let loader = GpuModelLoader::new(
            AssetSource::new(init.config.asset_root.clone()),
            init.device.clone(),
            init.queue.clone(),
        );
        let scene = load_scene(&loader, &init.config).await;
        Self {
            scene,
            queue: init.queue,
            camera_position: init.config.camera_position,
        }
    }

    pub fn constructor() -> FlowConstructor {
        Box::new(|init: InitContext| {
            let flow: Pin<Box<dyn Future<Output = Box<dyn GraphicsFlow>>>> =
                Box::pin(async move { Box::new(CarFlow::new(init).await) as Box<dyn GraphicsFlow> });
            flow
        })
    }

    pub fn scene(&self) -> &SceneState<Box<dyn SceneNode>> {
        &self.scene
    }

    /// Copies every placement into its scene graph and uploads the result.
    fn push_transforms(&mut self) {
        for object in self.scene.objects_mut() {
            place(object.model.as_mut(), &object.transform);
            object.model.write_to_buffers(&self.queue);
        }
    }
}

impl GraphicsFlow for CarFlow {
    fn on_init(&mut self, ctx: &mut Context) {
        if let Some(car) = self.scene.car_position() {
            ctx.camera.camera.position = self.camera_position;
            ctx.camera.camera.look_at(Point3::new(car.x, car.y, car.z));
        }
        self.push_transforms();
    }

    fn on_update(&mut self, _ctx: &Context, _dt: Duration) {
        self.scene.advance();
        self.push_transforms();
    }

    fn on_window_events(&mut self, _ctx: &Context, event: &WindowEvent) {
        self.scene.keys.handle_window_event(event);
    }

    fn on_render(&self) -> Render<'_> {
        Render::Composed(
            self.scene
                .objects()
                .map(|object| Render::from(object.model.as_ref()))
                .collect(),
        )
    }
}
