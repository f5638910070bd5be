// Binaire Backdrop sans interface graphique
//
// - devices : liste les périphériques audio
// - route   : route une entrée vers une sortie jusqu'à Ctrl+C

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use audio::{AudioHost, CpalHost, Direction, enumerator};
use backdrop::cli::{Cli, Command, RouteArgs};
use backdrop::{Coordinator, NONE_LABEL, demo, device_label, logging};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use video::{SimulatedCamera, VideoConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(&cli.log_level, cli.json_logs);

    match cli.command {
        Command::Devices { simulated } => list_devices(simulated),
        Command::Route(args) => run_route(args).await,
    }
}

fn list_devices(simulated: bool) -> Result<()> {
    let host: Arc<dyn AudioHost> = if simulated {
        demo::demo_host().host
    } else {
        Arc::new(CpalHost::new())
    };
    info!(host = host.name(), "énumération des périphériques audio");

    for direction in [Direction::Input, Direction::Output] {
        let devices = enumerator::snapshot(host.as_ref(), direction)
            .with_context(|| format!("énumération {direction} impossible"))?;
        println!("🎧 Périphériques de {direction} :");
        println!("   • {NONE_LABEL}");
        for device in devices {
            println!("   • {}", device.name);
        }
    }
    Ok(())
}

async fn run_route(args: RouteArgs) -> Result<()> {
    let config = args
        .audio_config()
        .map_err(|err| anyhow!(err))
        .context("configuration audio invalide")?;
    let format = config.line_format();
    let video_config = if args.low_latency {
        VideoConfig::low_latency()
    } else {
        VideoConfig::default()
    };
    video_config
        .validate()
        .map_err(|err| anyhow!(err))
        .context("configuration vidéo invalide")?;

    let (host, feeder) = if args.simulated {
        let simulated = demo::demo_host();
        (
            simulated.host as Arc<dyn AudioHost>,
            Some(demo::spawn_tone(simulated.input, format)),
        )
    } else {
        (Arc::new(CpalHost::new()) as Arc<dyn AudioHost>, None)
    };

    // Pas de backend webcam réel : la partie vidéo reste inactive
    let coordinator = Coordinator::new(
        host,
        config,
        Arc::new(SimulatedCamera::new()),
        video_config,
    );

    coordinator.select_audio_output(Some(args.output.clone())).await;
    let state = coordinator.select_audio_input(Some(args.input.clone())).await;

    if state.has_audio_error() {
        warn!(
            input = device_label(state.audio_input.as_deref()),
            output = device_label(state.audio_output.as_deref()),
            input_error = state.input_error,
            output_error = state.output_error,
            "passthrough impossible"
        );
        coordinator.shutdown().await;
        return Err(anyhow!(
            "route {} → {} indisponible",
            args.input,
            args.output
        ));
    }

    println!("🔊 {} → {} (Ctrl+C pour arrêter)", args.input, args.output);
    let mut report = tokio::time::interval(Duration::from_secs(5));
    report.tick().await;
    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("arrêt demandé");
                break;
            }
            _ = report.tick() => {
                let stats = coordinator.audio_stats().await;
                info!(bytes = stats.bytes_copied, blocks = stats.blocks, "passthrough en cours");
                if !coordinator.is_playing().await {
                    warn!("la boucle de copie s'est arrêtée");
                    break;
                }
            }
        }
    }

    if let Some(feeder) = feeder {
        feeder.abort();
    }
    coordinator.shutdown().await;
    let stats = coordinator.audio_stats().await;
    println!("👋 {} bytes recopiés en {} blocs", stats.bytes_copied, stats.blocks);
    Ok(())
}
