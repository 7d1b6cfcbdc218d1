use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use clap::Parser;
use log::{info, warn};
use miette::{IntoDiagnostic, Result};

use tapedeck_server::store::ArtifactStore;
use tapedeck_server::{Cli, Command, SessionControl};

fn unix_now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.verbosity.log_level_filter())
        .init();

    let store = match &cli.data_dir {
        Some(dir) => ArtifactStore::with_base_dir(dir.clone()),
        None => ArtifactStore::new(),
    };

    let mut control = SessionControl::new(
        store,
        cli.subscribe.clone(),
        cli.publish.clone(),
        cli.tuning(),
    );

    match cli.command {
        Command::Record { ref name } => {
            let name = name
                .clone()
                .unwrap_or_else(|| control.store().default_name());
            control.start_recording(&name).await.into_diagnostic()?;
            info!("recording '{}', press Ctrl-C to stop", name);

            tokio::signal::ctrl_c().await.into_diagnostic()?;

            let saved = control.stop_recording(&name).await.into_diagnostic()?;
            if saved {
                println!("saved '{}'", name);
            } else {
                warn!("no messages recorded, nothing saved");
            }
        }
        Command::Replay { ref name } => {
            control.start_replay(name).await.into_diagnostic()?;
            if let Some(addr) = control.replay_addr() {
                info!("replaying '{}' on {}, press Ctrl-C to stop", name, addr);
            }

            // Drive the clock like a steadily playing client, as when
            // testing without a real controller.
            let started = Instant::now();
            let mut ticker = tokio::time::interval(Duration::from_millis(100));
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    _ = ticker.tick() => {
                        let position = started.elapsed().as_secs_f64();
                        control.update_clock(unix_now_secs(), position, true);

                        let status = control.status();
                        if status.records_loaded > 0
                            && status.current_cursor >= status.records_loaded
                        {
                            info!("replay finished, {} records emitted", status.current_cursor);
                            break;
                        }
                    }
                }
            }
            control.stop_replay().await;
        }
        Command::List { json } => {
            let artifacts = control.store().list_artifacts();
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&artifacts).into_diagnostic()?
                );
            } else if artifacts.is_empty() {
                println!("no artifacts in {}", control.store().base_dir().display());
            } else {
                for info in artifacts {
                    println!(
                        "{:<32} {:>8} records {:>10} bytes",
                        info.name, info.record_count, info.size
                    );
                }
            }
        }
        Command::Delete { ref name } => {
            control.store().delete_artifact(name).into_diagnostic()?;
            println!("deleted '{}'", name);
        }
    }

    Ok(())
}
