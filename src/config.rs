//! Scene constants.
//!
//! Everything the demo places, scales or tunes lives in [`SceneConfig`]. The
//! defaults are the scene; only the asset root can be overridden from the
//! environment so the binary can be started from any working directory.

use cgmath::{Deg, Point3, Vector3};
use winit::keyboard::KeyCode;

/// Environment variable that replaces [`SceneConfig::asset_root`].
pub const ASSET_ROOT_ENV: &str = "CAR_SCENE_ASSET_ROOT";

/// Where a model file lives and how it is placed once loaded.
#[derive(Clone, Debug, PartialEq)]
pub struct Placement {
    pub path: &'static str,
    pub scale: Vector3<f32>,
    pub position: Vector3<f32>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LightConfig {
    pub ambient_color: [f32; 3],
    pub ambient_intensity: f32,
    pub directional_color: [f32; 3],
    pub directional_intensity: f32,
    /// Points from the scene towards the light; normalized on upload.
    pub directional_position: Vector3<f32>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProjectionConfig {
    pub fovy: Deg<f32>,
    pub znear: f32,
    pub zfar: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SceneConfig {
    pub asset_root: String,
    pub car: Placement,
    pub buildings: Placement,
    pub road: Placement,
    /// Distance added to the car's z every frame the movement key is held.
    pub speed: f32,
    pub move_key: KeyCode,
    /// Height of the car above the road's origin once both are loaded.
    pub road_clearance: f32,
    pub camera_position: Point3<f32>,
    pub projection: ProjectionConfig,
    pub light: LightConfig,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            asset_root: "assets".to_string(),
            car: Placement {
                path: "models/PorcheCar/scene.gltf",
                scale: Vector3::new(2.0, 2.0, 2.0),
                position: Vector3::new(0.0, 3.0, 0.0),
            },
            buildings: Placement {
                path: "models/low_poly_night_city_building_skyline/scene.gltf",
                scale: Vector3::new(2.0, 2.0, 2.0),
                position: Vector3::new(0.0, 0.0, -50.0),
            },
            road: Placement {
                path: "models/overpass/scene.gltf",
                scale: Vector3::new(10.0, 10.0, 10.0),
                position: Vector3::new(0.0, 0.0, -100.0),
            },
            speed: 0.9,
            move_key: KeyCode::Space,
            road_clearance: 0.5,
            camera_position: Point3::new(0.0, 5.0, 10.0),
            projection: ProjectionConfig {
                fovy: Deg(75.0),
                znear: 0.1,
                zfar: 1000.0,
            },
            light: LightConfig {
                ambient_color: [1.0, 1.0, 1.0],
                ambient_intensity: 0.5,
                directional_color: [1.0, 1.0, 1.0],
                directional_intensity: 1.0,
                directional_position: Vector3::new(5.0, 10.0, 7.5),
            },
        }
    }
}

impl SceneConfig {
    /// Defaults with the environment applied. On the web there is no
    /// process environment, so this is the same as `default()`.
    pub fn from_env() -> Self {
        #[allow(unused_mut)]
        let mut config = Self::default();
        #[cfg(not(target_arch = "wasm32"))]
        if let Ok(root) = std::env::var(ASSET_ROOT_ENV) {
            config = config.with_asset_root(root);
        }
        config
    }

    pub fn with_asset_root(mut self, root: impl Into<String>) -> Self {
        let root = root.into();
        if root.trim().is_empty() {
            log::warn!("Ignoring empty asset root, keeping {}", self.asset_root);
        } else {
            self.asset_root = root;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_describe_the_demo_scene() {
        let config = SceneConfig::default();
        assert_eq!(config.car.scale, Vector3::new(2.0, 2.0, 2.0));
        assert_eq!(config.car.position, Vector3::new(0.0, 3.0, 0.0));
        assert_eq!(config.road.position.z, -100.0);
        assert_eq!(config.buildings.position.z, -50.0);
        assert_eq!(config.speed, 0.9);
        assert_eq!(config.move_key, KeyCode::Space);
        assert_eq!(config.camera_position, Point3::new(0.0, 5.0, 10.0));
    }

    #[test]
    fn empty_asset_root_is_ignored() {
        let config = SceneConfig::default().with_asset_root("  ");
        assert_eq!(config.asset_root, "assets");

        let config = SceneConfig::default().with_asset_root("/srv/demo");
        assert_eq!(config.asset_root, "/srv/demo");
    }
}
