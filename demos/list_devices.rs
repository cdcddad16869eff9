/// List the camera ids the acquirer can open
use bulb_sentinel::Acquirer;

fn main() {
    println!("🔍 Scanning video devices...\n");

    let devices = Acquirer::system().list_devices();

    if devices.is_empty() {
        println!("⚠️  No video devices found");
    } else {
        println!("✅ Found {} device(s):\n", devices.len());
        for device in &devices {
            println!("  📹 {}", device);
        }
    }

    println!("\n✅ Scan complete");
}
