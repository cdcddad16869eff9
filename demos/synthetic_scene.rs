/// Run every synthetic scene through the detector and save annotated frames
use std::time::Duration;

use bulb_sentinel::input::Scene;
use bulb_sentinel::{detect, renderer, Acquirer, ThresholdConfig};

fn main() -> anyhow::Result<()> {
    let acquirer = Acquirer::system();
    let config = ThresholdConfig::default();

    for scene in [Scene::LightsOn, Scene::LightsOff, Scene::Ambient] {
        let frame = acquirer.with_session(scene.device_id(), |s| s.capture())?;
        let result = detect(&frame, &config);
        println!(
            "{:<20} {} bulbs={} brightness={:.1}",
            scene.device_id(),
            result.signal(),
            result.bulb_count(),
            result.average_brightness()
        );
        for region in result.regions() {
            println!(
                "    ({:>4},{:>4}) {}x{} area={} {:?}",
                region.x, region.y, region.width, region.height, region.area, region.light_type
            );
        }

        let out = format!("{}.png", scene.device_id().replace(':', "_"));
        renderer::annotate(&frame, &result).save(&out)?;
        println!("    -> {}", out);
    }

    // a short monitoring run over the alternating scene
    let handle = bulb_sentinel::start_monitoring(
        &acquirer,
        Scene::Cycle.device_id(),
        std::sync::Arc::new(config),
        bulb_sentinel::MonitorOptions {
            interval: Duration::from_millis(100),
            ..Default::default()
        },
    )?;
    std::thread::sleep(Duration::from_millis(1500));
    for result in handle.history() {
        println!("cycle: {} ({} bulbs)", result.signal(), result.bulb_count());
    }
    println!("final state: {:?}", handle.stop());
    Ok(())
}
