use anyhow::{Context, Result};
use clap::Parser;
use floppymusic::midi::total_duration;
use floppymusic::{AppConfig, DriveRegistry, EventPump, GpioChip, Smf, VirtualChip, merge_tracks};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "floppymusic")]
#[command(about = "Play MIDI files on floppy drive stepper motors")]
#[command(version)]
struct Cli {
    /// Standard MIDI file to play
    midi: PathBuf,

    /// Drive configuration file
    #[arg(short, long, default_value = "drives.ron")]
    config: PathBuf,

    /// Divide every note frequency by this factor (overrides config)
    #[arg(short, long)]
    drop_factor: Option<f64>,

    /// Print lyric events while playing
    #[arg(short, long)]
    lyrics: bool,

    /// Skip the events of a track (repeatable)
    #[arg(short, long = "mute", value_name = "TRACK")]
    mute: Vec<usize>,

    /// Play on virtual lines instead of real GPIO
    #[arg(long)]
    dry_run: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let mut config = AppConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(factor) = cli.drop_factor {
        config.drop_factor = factor;
    }
    config.lyrics |= cli.lyrics;
    config.mute_tracks.extend(cli.mute.iter().copied());
    config.validate()?;

    // Parse before touching hardware so a bad file leaves the drives alone
    let smf = Smf::open(&cli.midi).with_context(|| format!("reading {}", cli.midi.display()))?;
    let events = merge_tracks(&smf, &config.mute_tracks);
    tracing::info!(
        tracks = smf.track_count(),
        events = events.len(),
        duration_secs = total_duration(&events).as_secs_f64(),
        "loaded {}",
        cli.midi.display()
    );

    let chip: Arc<dyn GpioChip> = if cli.dry_run {
        Arc::new(VirtualChip::new())
    } else {
        config.backend.open().context("opening GPIO backend")?
    };

    let mut registry = DriveRegistry::new(config.drives.clone(), chip, config.registry_options());
    registry.setup().context("setting up drives")?;

    let mut stdout = io::stdout().lock();
    EventPump::new(&registry, config.drop_factor)
        .with_lyrics(config.lyrics)
        .run(events, &mut stdout)?;

    // Dropping the registry stops the scheduler and releases every line
    drop(registry);
    Ok(())
}
