// SPDX-License-Identifier: MPL-2.0

//! Console monitor: prints the device shadow and toggles its LED.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example shadow_monitor -- <config.json>
//! ```
//!
//! The config file is a serialized `SyncConfig`, for example:
//!
//! ```json
//! {
//!   "thing_name": "ChariotFall2019",
//!   "broker": { "endpoint": "mqtts://broker.example.com:8883" },
//!   "reconnect": { "enabled": true }
//! }
//! ```
//!
//! Type `on` or `off` to switch the LED, `quit` to exit. Set `RUST_LOG` to
//! control logging (default `shadow_sync=info`).

use std::env;

use shadow_sync::transport::MqttTransport;
use shadow_sync::view::SnapshotLabels;
use shadow_sync::{Disposition, ShadowSynchronizer, SyncConfig};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("shadow_sync=info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: {} <config.json>", args[0]);
        std::process::exit(1);
    }

    let config = SyncConfig::from_json_file(&args[1])?;
    println!(
        "Monitoring {} via {}",
        config.thing_name, config.broker.endpoint
    );

    let transport = MqttTransport::new(config.broker.clone())?;
    let sync = ShadowSynchronizer::new(config, transport)?;

    sync.on_snapshot_changed(|snapshot| println!("{}", SnapshotLabels::from(snapshot)));
    sync.on_connection_changed(|state| println!("connection: {state}"));
    sync.on_failure(|failure| eprintln!("failure: {failure}"));

    sync.start()?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let result = match line.trim() {
            "on" => sync.set_led(true),
            "off" => sync.set_led(false),
            "start" => {
                if let Err(e) = sync.start() {
                    eprintln!("error: {e}");
                }
                continue;
            }
            "quit" | "exit" => break,
            "" => continue,
            other => {
                eprintln!("unknown command {other:?} (on, off, start, quit)");
                continue;
            }
        };

        match result {
            Ok(Disposition::Queued) => println!("offline, request queued"),
            Ok(Disposition::Published) => {}
            Err(e) => eprintln!("error: {e}"),
        }
    }

    sync.stop();
    println!("Done!");
    Ok(())
}
