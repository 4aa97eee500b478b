//! `craftbot ping` — One status query against the configured server.

use std::path::Path;
use std::time::Duration;

use craftbot_connectors::SlpStatusSource;
use craftbot_core::StatusSource;

pub async fn run(explicit: Option<&Path>, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(explicit)?;
    let host = &config.server.host;
    let port = config.server.port;

    let source = SlpStatusSource::new(Duration::from_secs(5));
    match source.query_status(host, port).await {
        Ok(status) if json => println!("{}", serde_json::to_string_pretty(&status)?),
        Ok(status) => {
            println!("🟢 {host}:{port} is online");
            println!(
                "   Players: {}/{}",
                status.online_players, status.max_players
            );
            if let Some(version) = &status.version {
                println!("   Version: {version}");
            }
        }
        Err(e) if e.is_unreachable() => {
            println!("🔴 {host}:{port} is offline");
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
