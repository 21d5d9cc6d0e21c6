//! Locate the pad, read one report and print what was found as JSON.
//!
//! ```text
//! cargo run --example diagnose -- [config.toml]
//! ```

use padlink::channel::ReportChannel;
use padlink::{DeviceLocator, HidLocator, HidOptions, PadConfig};
use serde::Serialize;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Serialize)]
struct Report {
    identity: String,
    attached: Vec<padlink::DeviceMeta>,
    located: Option<Located>,
}

#[derive(Serialize)]
struct Located {
    path: String,
    capabilities: padlink::DeviceCapabilities,
    first_key: Option<String>,
    error: Option<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => PadConfig::load(&path).unwrap_or_else(|err| {
            eprintln!("diagnose: {path}: {err}");
            std::process::exit(2);
        }),
        None => PadConfig::default(),
    };
    let identity = config.device.identity();

    let mut locator = match HidLocator::new(HidOptions::from(&config.device)) {
        Ok(l) => l,
        Err(err) => {
            eprintln!("diagnose: {err}");
            std::process::exit(1);
        }
    };

    let attached = locator.list(identity);
    let located = locator.find(identity).map(|device| {
        let mut out = Located {
            path: device.path.to_string(),
            capabilities: device.capabilities,
            first_key: None,
            error: None,
        };
        let exchange = locator.open(&device).and_then(|transport| {
            ReportChannel::open(
                transport,
                device.capabilities,
                config.device.channel_options(),
            )
        });
        match exchange {
            Ok(channel) => {
                match channel.begin_query() {
                    Ok(_) => {
                        channel.wait_idle(Duration::from_secs(1));
                        out.first_key = channel.latest().map(|k| k.to_string());
                    }
                    Err(err) => out.error = Some(err.to_string()),
                }
                channel.shutdown();
            }
            Err(err) => out.error = Some(err.to_string()),
        }
        out
    });

    let report = Report {
        identity: identity.to_string(),
        attached,
        located,
    };
    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{json}"),
        Err(err) => eprintln!("diagnose: {err}"),
    }
}
