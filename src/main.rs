use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;
use voicelink::{audio, Config};

#[derive(Parser)]
#[command(name = "voicelink", version, about = "WAV codec and voice session tools")]
struct Cli {
    /// Config file (extension optional)
    #[arg(long, global = true, default_value = "config/voicelink")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decode a WAV file and print its format
    Inspect {
        path: PathBuf,
    },
    /// Encode raw little-endian f32 samples as a WAV file
    Convert {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        /// Defaults to the configured capture rate
        #[arg(long)]
        sample_rate: Option<u32>,
        #[arg(long, default_value_t = 1)]
        channels: u16,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Inspect { path } => inspect(&path),
        Command::Convert {
            input,
            output,
            sample_rate,
            channels,
        } => {
            let sample_rate = match sample_rate {
                Some(rate) => rate,
                None => {
                    let cfg = Config::load(&cli.config)?;
                    info!("Loaded config: {}", cfg.service.name);
                    cfg.audio.sample_rate
                }
            };
            convert(&input, &output, sample_rate, channels)
        }
    }
}

fn inspect(path: &Path) -> Result<()> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let buffer = audio::decode(&bytes).context("Failed to decode WAV")?;

    info!("File: {}", path.display());
    info!("Sample rate: {} Hz", buffer.sample_rate());
    info!("Channels: {}", buffer.channels());
    info!("Frames: {}", buffer.frames());
    info!("Duration: {:.2} seconds", buffer.duration_seconds());
    info!("Peak: {:.3}", buffer.peak());

    Ok(())
}

fn convert(input: &Path, output: &Path, sample_rate: u32, channels: u16) -> Result<()> {
    let raw = fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
    if raw.len() % 4 != 0 {
        anyhow::bail!("{} is not a whole number of f32 samples", input.display());
    }

    let samples: Vec<f32> = raw
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();

    let wav = audio::encode_samples(sample_rate, channels, &samples)
        .context("Failed to encode WAV")?;
    fs::write(output, wav.as_bytes())
        .with_context(|| format!("Failed to write {}", output.display()))?;

    info!(
        "Wrote {} samples ({} bytes) to {}",
        samples.len(),
        wav.len(),
        output.display()
    );
    Ok(())
}
