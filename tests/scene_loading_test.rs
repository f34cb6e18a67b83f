use car_scene::{
    config::SceneConfig,
    loader::load_scene,
    scene::{AssetKind, SceneState},
};
use cgmath::Vector3;
use winit::{event::ElementState, keyboard::KeyCode};

use crate::common::test_utils::FakeLoader;

mod common;

fn paths() -> (&'static str, &'static str, &'static str) {
    let config = SceneConfig::default();
    (config.car.path, config.buildings.path, config.road.path)
}

fn drive(state: &mut SceneState<&'static str>, frames: usize) {
    state.keys.set(KeyCode::Space, ElementState::Pressed);
    for _ in 0..frames {
        state.advance();
    }
    state.keys.set(KeyCode::Space, ElementState::Released);
}

#[tokio::test]
async fn car_sits_on_the_road_whichever_load_finishes_first() {
    let (car, buildings, road) = paths();
    let config = SceneConfig::default();

    let car_first = FakeLoader::new()
        .succeed(car, "car", 0)
        .succeed(buildings, "buildings", 1)
        .succeed(road, "road", 5);
    let road_first = FakeLoader::new()
        .succeed(car, "car", 5)
        .succeed(buildings, "buildings", 1)
        .succeed(road, "road", 0);

    let state = load_scene(&car_first, &config).await;
    assert_eq!(car_first.completed(), vec!["car", "buildings", "road"]);
    assert_eq!(state.car_position(), Some(Vector3::new(0.0, 0.5, 0.0)));

    let state = load_scene(&road_first, &config).await;
    assert_eq!(road_first.completed(), vec!["road", "buildings", "car"]);
    assert_eq!(state.car_position(), Some(Vector3::new(0.0, 0.5, 0.0)));
}

#[tokio::test]
async fn car_keeps_its_height_without_a_road() {
    let (car, buildings, road) = paths();
    let loader = FakeLoader::new()
        .succeed(car, "car", 0)
        .succeed(buildings, "buildings", 0)
        .fail(road, "overpass/scene.bin not found", 2);

    let state = load_scene(&loader, &SceneConfig::default()).await;

    let car = state.car.loaded().unwrap();
    assert_eq!(car.model, "car");
    assert_eq!(car.transform.position, Vector3::new(0.0, 3.0, 0.0));
    assert_eq!(car.transform.scale, Vector3::new(2.0, 2.0, 2.0));
}

#[tokio::test]
async fn a_failed_load_leaves_the_others_intact() {
    let (car, buildings, road) = paths();
    let loader = FakeLoader::new()
        .succeed(car, "car", 3)
        .fail(buildings, "invalid glTF", 0)
        .succeed(road, "road", 1);

    let state = load_scene(&loader, &SceneConfig::default()).await;

    assert_eq!(state.failures(), vec![(AssetKind::Buildings, "invalid glTF")]);
    assert!(state.buildings.loaded().is_none());
    assert_eq!(state.road.loaded().map(|road| road.model), Some("road"));
    assert_eq!(
        state.road.loaded().map(|road| road.transform.scale),
        Some(Vector3::new(10.0, 10.0, 10.0))
    );
    assert_eq!(state.car_position().map(|p| p.y), Some(0.5));
}

#[tokio::test]
async fn missing_files_fail_every_slot() {
    let loader = FakeLoader::new();
    let state = load_scene(&loader, &SceneConfig::default()).await;

    assert_eq!(state.failures().len(), 3);
    assert!(state.failures()[0].1.contains("PorcheCar"));
    assert!(state.car_position().is_none());
}

#[tokio::test]
async fn holding_space_moves_the_car_point_nine_per_frame() {
    let (car, buildings, road) = paths();
    let loader = FakeLoader::new()
        .succeed(car, "car", 0)
        .succeed(buildings, "buildings", 0)
        .succeed(road, "road", 0);
    let mut state = load_scene(&loader, &SceneConfig::default()).await;

    drive(&mut state, 10);
    let position = state.car_position().unwrap();
    assert!((position.z - 10.0 * 0.9).abs() < 1e-4);
    assert_eq!(position.x, 0.0);
    assert_eq!(position.y, 0.5);

    // Released key, no movement
    state.advance();
    assert!((state.car_position().unwrap().z - 9.0).abs() < 1e-4);

    // Scenery never moves
    assert_eq!(
        state.road.loaded().map(|road| road.position()),
        Some(Vector3::new(0.0, 0.0, -100.0))
    );
    assert_eq!(
        state.buildings.loaded().map(|buildings| buildings.position()),
        Some(Vector3::new(0.0, 0.0, -50.0))
    );
}

#[tokio::test]
async fn nothing_moves_without_a_car() {
    let (car, buildings, road) = paths();
    let loader = FakeLoader::new()
        .fail(car, "404", 0)
        .succeed(buildings, "buildings", 0)
        .succeed(road, "road", 0);
    let mut state = load_scene(&loader, &SceneConfig::default()).await;

    drive(&mut state, 5);
    assert!(state.car_position().is_none());
    assert_eq!(state.car.failure(), Some("404"));
}
