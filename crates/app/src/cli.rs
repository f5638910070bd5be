//! Ligne de commande du binaire `backdrop`

use audio::AudioConfig;
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about = "Backdrop : passthrough audio et suivi webcam")]
pub struct Cli {
    /// Niveau de log par défaut (ignoré si RUST_LOG est défini)
    #[arg(long, global = true, env = "BACKDROP_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Logs au format JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Liste les périphériques audio d'entrée et de sortie
    Devices {
        /// Utilise le host simulé au lieu de la carte son
        #[arg(long)]
        simulated: bool,
    },
    /// Route une entrée audio vers une sortie jusqu'à Ctrl+C
    Route(RouteArgs),
}

#[derive(Debug, Args)]
pub struct RouteArgs {
    /// Périphérique de capture
    #[arg(short, long, env = "BACKDROP_INPUT")]
    pub input: String,

    /// Périphérique de lecture
    #[arg(short, long, env = "BACKDROP_OUTPUT")]
    pub output: String,

    /// Taille des blocs copiés, en bytes
    #[arg(long)]
    pub block_size: Option<usize>,

    #[arg(long)]
    pub sample_rate: Option<u32>,

    #[arg(long)]
    pub channels: Option<u16>,

    /// Profil faible latence (blocs de 256 bytes)
    #[arg(long)]
    pub low_latency: bool,

    #[arg(long)]
    pub simulated: bool,
}

impl RouteArgs {
    /// Configuration audio résultant des options, validée
    pub fn audio_config(&self) -> Result<AudioConfig, String> {
        let mut config = if self.low_latency {
            AudioConfig::low_latency()
        } else {
            AudioConfig::default()
        };
        if let Some(block_size) = self.block_size {
            config.block_size = block_size;
        }
        if let Some(sample_rate) = self.sample_rate {
            config.sample_rate = sample_rate;
        }
        if let Some(channels) = self.channels {
            config.channels = channels;
        }
        config.validate()?;
        Ok(config)
    }
}
