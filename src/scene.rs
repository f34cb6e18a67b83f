//! Application state of the car scene.
//!
//! [`SceneState`] owns the three named assets and the keyboard state. It is
//! generic over the model type so the loading sequence and the per-frame car
//! movement can be exercised without a GPU.

use std::fmt;

use cgmath::Vector3;
use log::{error, warn};
use winit::keyboard::KeyCode;

use crate::{
    config::{Placement, SceneConfig},
    data_structures::instance::Instance,
    input::KeyState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Car,
    Buildings,
    Road,
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AssetKind::Car => "car",
            AssetKind::Buildings => "buildings",
            AssetKind::Road => "road",
        };
        f.write_str(name)
    }
}

/// A loaded model and where it is placed in the world.
#[derive(Debug)]
pub struct SceneObject<M> {
    pub model: M,
    pub transform: Instance,
}

impl<M> SceneObject<M> {
    pub fn position(&self) -> Vector3<f32> {
        self.transform.position
    }
}

/// Load state of one named asset. Only `Pending` may change.
#[derive(Debug, Default)]
pub enum Slot<M> {
    #[default]
    Pending,
    Loaded(SceneObject<M>),
    Failed(String),
}

impl<M> Slot<M> {
    pub fn is_pending(&self) -> bool {
        matches!(self, Slot::Pending)
    }

    pub fn loaded(&self) -> Option<&SceneObject<M>> {
        match self {
            Slot::Loaded(object) => Some(object),
            _ => None,
        }
    }

    pub fn loaded_mut(&mut self) -> Option<&mut SceneObject<M>> {
        match self {
            Slot::Loaded(object) => Some(object),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&str> {
        match self {
            Slot::Failed(message) => Some(message),
            _ => None,
        }
    }
}

pub struct SceneState<M> {
    pub car: Slot<M>,
    pub buildings: Slot<M>,
    pub road: Slot<M>,
    pub keys: KeyState,
    placements: [Placement; 3],
    speed: f32,
    move_key: KeyCode,
    road_clearance: f32,
}

impl<M> SceneState<M> {
    pub fn new(config: &SceneConfig) -> Self {
        Self {
            car: Slot::Pending,
            buildings: Slot::Pending,
            road: Slot::Pending,
            keys: KeyState::new(),
            placements: [
                config.car.clone(),
                config.buildings.clone(),
                config.road.clone(),
            ],
            speed: config.speed,
            move_key: config.move_key,
            road_clearance: config.road_clearance,
        }
    }

    pub fn slot(&self, kind: AssetKind) -> &Slot<M> {
        match kind {
            AssetKind::Car => &self.car,
            AssetKind::Buildings => &self.buildings,
            AssetKind::Road => &self.road,
        }
    }

    fn slot_mut(&mut self, kind: AssetKind) -> &mut Slot<M> {
        match kind {
            AssetKind::Car => &mut self.car,
            AssetKind::Buildings => &mut self.buildings,
            AssetKind::Road => &mut self.road,
        }
    }

    pub fn placement(&self, kind: AssetKind) -> &Placement {
        match kind {
            AssetKind::Car => &self.placements[0],
            AssetKind::Buildings => &self.placements[1],
            AssetKind::Road => &self.placements[2],
        }
    }

    /// Stores the outcome of one load. A successful model is scaled and
    /// placed from its [`Placement`]; a failure is logged and kept as text.
    pub fn settle(&mut self, kind: AssetKind, result: anyhow::Result<M>) {
        if !self.slot(kind).is_pending() {
            warn!("Ignoring a second load result for the {kind} model");
            return;
        }
        let slot = match result {
            Ok(model) => {
                let placement = self.placement(kind);
                Slot::Loaded(SceneObject {
                    model,
                    transform: Instance::placed(placement.position, placement.scale),
                })
            }
            Err(err) => {
                error!("An error occurred while loading the {kind} model: {err:#}");
                Slot::Failed(format!("{err:#}"))
            }
        };
        *self.slot_mut(kind) = slot;
    }

    /// Puts the car on top of the road. Does nothing unless both loaded.
    pub fn seat_car_on_road(&mut self) -> bool {
        let Some(road_y) = self.road.loaded().map(|road| road.position().y) else {
            return false;
        };
        let clearance = self.road_clearance;
        match self.car.loaded_mut() {
            Some(car) => {
                car.transform.position.y = road_y + clearance;
                true
            }
            None => false,
        }
    }

    /// Moves the car one frame forward if the movement key is held.
    pub fn advance(&mut self) -> bool {
        if !self.keys.is_pressed(self.move_key) {
            return false;
        }
        let speed = self.speed;
        match self.car.loaded_mut() {
            Some(car) => {
                car.transform.position.z += speed;
                true
            }
            None => false,
        }
    }

    pub fn car_position(&self) -> Option<Vector3<f32>> {
        self.car.loaded().map(SceneObject::position)
    }

    pub fn failures(&self) -> Vec<(AssetKind, &str)> {
        [AssetKind::Car, AssetKind::Buildings, AssetKind::Road]
            .into_iter()
            .filter_map(|kind| self.slot(kind).failure().map(|message| (kind, message)))
            .collect()
    }

    /// Every loaded object, in car, buildings, road order.
    pub fn objects_mut(&mut self) -> impl Iterator<Item = &mut SceneObject<M>> {
        [&mut self.car, &mut self.buildings, &mut self.road]
            .into_iter()
            .filter_map(Slot::loaded_mut)
    }

    pub fn objects(&self) -> impl Iterator<Item = &SceneObject<M>> {
        [&self.car, &self.buildings, &self.road]
            .into_iter()
            .filter_map(Slot::loaded)
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use winit::event::ElementState;

    use super::*;

    #[test]
    fn slots_start_pending() {
        assert!(Slot::<&'static str>::default().is_pending());
        let scene = state();
        assert!(scene.car.is_pending() && scene.buildings.is_pending() && scene.road.is_pending());
    }

    fn state() -> SceneState<&'static str> {
        SceneState::new(&SceneConfig::default())
    }

    #[test]
    fn loaded_models_are_placed() {
        let mut state = state();
        state.settle(AssetKind::Buildings, Ok("buildings"));
        state.settle(AssetKind::Road, Ok("road"));

        let buildings = state.buildings.loaded().unwrap();
        assert_eq!(buildings.position(), Vector3::new(0.0, 0.0, -50.0));
        assert_eq!(buildings.transform.scale, Vector3::new(2.0, 2.0, 2.0));
        let road = state.road.loaded().unwrap();
        assert_eq!(road.position(), Vector3::new(0.0, 0.0, -100.0));
        assert_eq!(road.transform.scale, Vector3::new(10.0, 10.0, 10.0));
        assert!(state.car.is_pending());
    }

    #[test]
    fn settled_slots_do_not_change() {
        let mut state = state();
        state.settle(AssetKind::Car, Err(anyhow!("404")));
        state.settle(AssetKind::Car, Ok("car"));
        assert_eq!(state.car.failure(), Some("404"));

        state.settle(AssetKind::Road, Ok("road"));
        state.settle(AssetKind::Road, Err(anyhow!("late failure")));
        assert_eq!(state.road.loaded().map(|road| road.model), Some("road"));
    }

    #[test]
    fn car_is_seated_on_the_road() {
        let mut state = state();
        state.settle(AssetKind::Car, Ok("car"));
        assert!(!state.seat_car_on_road());
        assert_eq!(state.car_position().map(|p| p.y), Some(3.0));

        state.settle(AssetKind::Road, Ok("road"));
        assert!(state.seat_car_on_road());
        assert_eq!(state.car_position().map(|p| p.y), Some(0.5));
    }

    #[test]
    fn car_moves_only_while_the_key_is_held() {
        let mut state = state();
        state.keys.set(KeyCode::Space, ElementState::Pressed);
        assert!(!state.advance());

        state.settle(AssetKind::Car, Ok("car"));
        assert!(state.advance());
        state.keys.set(KeyCode::Space, ElementState::Released);
        assert!(!state.advance());
        state.keys.set(KeyCode::KeyW, ElementState::Pressed);
        assert!(!state.advance());

        let z = state.car_position().unwrap().z;
        assert!((z - 0.9).abs() < 1e-6);
    }

    #[test]
    fn failures_are_listed_by_kind() {
        let mut state = state();
        state.settle(AssetKind::Road, Err(anyhow!("missing scene.bin")));
        state.settle(AssetKind::Car, Ok("car"));
        assert_eq!(state.failures(), vec![(AssetKind::Road, "missing scene.bin")]);
        assert_eq!(state.objects().count(), 1);
        assert_eq!(AssetKind::Buildings.to_string(), "buildings");
    }
}
