//! Example: Scanning for gateways
//!
//! Lists every peripheral advertising the gateway name, or every
//! peripheral in range when run with `--all`.
//!
//! Run with: `cargo run --example scan_gateways [-- --all]`

use nrfgate_core::Target;
use nrfgate_core::scan::{self, ScanOptions};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let target = Target::default();
    let mut options = ScanOptions::default().duration_secs(8);
    if std::env::args().any(|a| a == "--all") {
        options = options.all_devices();
    }

    println!("Scanning for {}...", target.device_name);
    println!();

    let devices = scan::scan_with_options(&target, options).await?;

    if devices.is_empty() {
        println!("No gateway found.");
        println!();
        println!("Make sure:");
        println!("  - The gateway is powered on and advertising");
        println!("  - Bluetooth is enabled on this computer");
        println!("  - No other central is connected to it");
    } else {
        println!("Found {} device(s):", devices.len());
        println!();

        for device in &devices {
            let rssi = device
                .rssi
                .map(|r| format!("{} dBm", r))
                .unwrap_or_else(|| "N/A".to_string());

            println!("  {}", device.name.as_deref().unwrap_or("Unknown"));
            println!("    Identifier: {}", device.identifier);
            println!("    RSSI: {}", rssi);
            println!(
                "    Advertises gateway service: {}",
                device.advertises(&target.service)
            );
            println!();
        }
    }

    Ok(())
}
