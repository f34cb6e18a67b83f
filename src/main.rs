fn main() {
    if let Err(e) = car_scene::run_scene() {
        eprintln!("car-scene: {e:#}");
        std::process::exit(1);
    }
}
