//! car-scene
//!
//! A small cross-platform demo: a car parked on an overpass in front of a
//! night skyline, rendered with wgpu on native and in the browser. Holding
//! `Space` drives the car along the z axis; the mouse orbits the camera
//! around it.
//!
//! High-level modules
//! - `camera`: camera, projection, orbit controller and the camera uniform
//! - `config`: every scene constant in one place
//! - `context`: central GPU and window context that owns device/queue/pipeline
//! - `data_structures`: meshes, instances, textures and the scene graph
//! - `flow`: event loop, flow trait and shutdown token
//! - `input`: keyboard state
//! - `loader`: concurrent loading of the scene models
//! - `scene`: named assets, their load state and the car movement
//! - `car_flow`: the scene wired into the event loop
//! - `pipelines`: the model pipeline and the light uniform
//! - `resources`: helpers to load textures/models and create GPU resources
//! - `render`: render composition
//!

pub mod camera;
pub mod car_flow;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod flow;
pub mod input;
pub mod loader;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod scene;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

use crate::{
    car_flow::CarFlow,
    config::SceneConfig,
    flow::{ShutdownToken, init_logging},
};

/// Runs the car scene until its window is closed.
pub fn run_scene() -> anyhow::Result<()> {
    init_logging();
    let config = SceneConfig::from_env();
    log::info!("Loading assets from {}", config.asset_root);
    flow::run(vec![CarFlow::constructor()], config, ShutdownToken::new())
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn run_web() -> Result<(), JsValue> {
    run_scene().map_err(|e| JsValue::from_str(&format!("{e:#}")))
}
