//! Frame loop printing the merged pad state whenever it changes.
//!
//! ```text
//! RUST_LOG=padlink=debug cargo run --example poll -- [config.toml] [frames]
//! ```

use padlink::{ControllerKey, InputAggregator, PadConfig, PadState};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const FRAME: Duration = Duration::from_millis(16);

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => match PadConfig::load(&path) {
            Ok(c) => c,
            Err(err) => {
                eprintln!("poll: {path}: {err}");
                std::process::exit(2);
            }
        },
        None => PadConfig::default(),
    };
    let frames: u64 = args.next().and_then(|s| s.parse().ok()).unwrap_or(u64::MAX);

    let mut input = match InputAggregator::from_config(&config) {
        Ok(i) => i,
        Err(err) => {
            eprintln!("poll: {err}");
            std::process::exit(1);
        }
    };

    println!(
        "watching {:04x}:{:04x}; press Start+Select to quit",
        config.device.vendor_id, config.device.product_id
    );

    let mut last_pad = PadState::Disconnected;
    for _ in 0..frames {
        input.poll_user_input();

        let pad = input.pad_state();
        if pad.is_connected() != last_pad.is_connected() {
            println!("pad {}", if pad.is_connected() { "connected" } else { "disconnected" });
        }
        last_pad = pad;

        let now = input.snapshot();
        if now != input.previous_snapshot() {
            println!("frame {:>6}: {}", input.frame(), input.all_keys());
        }

        if input.is_pressed(ControllerKey::START | ControllerKey::SELECT) {
            break;
        }
        std::thread::sleep(FRAME);
    }
}
