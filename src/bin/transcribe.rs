//! Demo driver: stream a WAV file (or the microphone) to the recognition
//! service and print transcripts as they arrive.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use voxline::audio::FileAudioGen;
use voxline::config::Config;
use voxline::pipeline::Pipeline;
use voxline::session::{Credentials, Transcriber};
use voxline::sink::Printer;

#[derive(Parser)]
#[command(name = "transcribe", version, about = "Stream audio to a speech-to-text service")]
struct Cli {
    /// WAV file to transcribe. Without it, capture from the microphone
    /// (requires the cpal-audio feature).
    audio_file: Option<PathBuf>,

    /// Path to the service credentials JSON
    #[arg(short, long)]
    credentials: Option<PathBuf>,

    /// Config file (defaults to ~/.config/voxline/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Recognition model, e.g. en-US_BroadbandModel
    #[arg(short, long)]
    model: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => Config::default_path()?,
    };
    let mut config = Config::load_or_default(&config_path).with_env_overrides();
    if let Some(model) = cli.model {
        config.service.model = Some(model);
    }
    if let Some(path) = &cli.credentials {
        config.service.credentials_file = Some(path.clone());
    }
    config.validate()?;

    let credentials: Credentials = config.credentials();
    let transcriber = Transcriber::new(config.session_config(), &credentials)
        .context("failed to set up the transcription session")?;

    let format = config.audio_format();
    let chunk_frames = config.audio.chunk_frames;

    match cli.audio_file {
        Some(path) => {
            let duration = wav_duration(&path)?;
            let source = FileAudioGen::new(&path, format, chunk_frames);
            let handle = Pipeline::source(source)
                .then(transcriber)
                .then(Printer::stdout())
                .start();

            // The file is pushed as fast as the service accepts it; wait for
            // its playback length plus slack for the final results.
            std::thread::sleep(duration + Duration::from_secs(5));
            handle.shutdown(Duration::from_secs(10));
        }
        None => run_mic(config, transcriber, format, chunk_frames)?,
    }

    Ok(())
}

fn wav_duration(path: &std::path::Path) -> Result<Duration> {
    let reader = hound::WavReader::open(path)
        .with_context(|| format!("cannot open {}", path.display()))?;
    let spec = reader.spec();
    let seconds = reader.duration() as f64 / spec.sample_rate as f64;
    Ok(Duration::from_secs_f64(seconds))
}

#[cfg(feature = "cpal-audio")]
fn run_mic(
    config: Config,
    transcriber: Transcriber,
    format: voxline::audio::AudioFormat,
    chunk_frames: usize,
) -> Result<()> {
    use voxline::audio::MicAudioGen;

    let source = MicAudioGen::new(config.audio.device.clone(), format, chunk_frames);
    let handle = Pipeline::source(source)
        .then(transcriber)
        .then(Printer::stdout())
        .start();

    eprintln!("transcribing from the microphone, press Ctrl-C to stop");
    loop {
        std::thread::sleep(Duration::from_secs(1));
        if handle.is_finished() {
            handle.join(Duration::from_secs(5));
            return Ok(());
        }
    }
}

#[cfg(not(feature = "cpal-audio"))]
fn run_mic(
    _config: Config,
    _transcriber: Transcriber,
    _format: voxline::audio::AudioFormat,
    _chunk_frames: usize,
) -> Result<()> {
    anyhow::bail!("microphone capture requires the cpal-audio feature; pass a WAV file instead")
}
