//! comper - add a chord accompaniment to a monophonic melody
//!
//! Subcommands:
//! - `comper generate <in.mid> <out.mid>` - Append an accompaniment track to a MIDI file
//! - `comper grid <grid.toml> <out.mid>` - Build a MIDI file from a step grid
//! - `comper analyze <in.mid>` - Print the key and chord summary without writing

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use comping::{
    append_accompaniment, generate_accompaniment, melody_from_smf, sequence_to_midi,
    Accompaniment, ArpDirection, BassPattern, NoteSequence, StyleKind, Summary,
};
use midly::Smf;
use serde::Serialize;
use tracing::{debug, info};

mod config;
mod grid;

use config::ComperConfig;

#[derive(Parser)]
#[command(name = "comper")]
#[command(about = "Generate a chord accompaniment for a monophonic melody")]
#[command(version)]
struct Cli {
    /// Config file to use instead of ./comper.toml
    #[arg(long, global = true, env = "COMPER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read a MIDI melody and write it back with an accompaniment track
    Generate {
        /// Input MIDI file
        input: PathBuf,

        /// Output MIDI file
        output: PathBuf,

        #[command(flatten)]
        generation: GenerationArgs,
    },

    /// Read a step grid and write melody plus accompaniment as MIDI
    Grid {
        /// Grid TOML file
        grid: PathBuf,

        /// Output MIDI file
        output: PathBuf,

        #[command(flatten)]
        generation: GenerationArgs,
    },

    /// Print the estimated key and chord summary for a MIDI melody
    Analyze {
        /// Input MIDI file
        input: PathBuf,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        generation: GenerationArgs,
    },
}

/// Flags that override config files and environment variables.
#[derive(Args, Debug)]
struct GenerationArgs {
    /// Accompaniment style: block, bass or arp
    #[arg(short, long)]
    style: Option<StyleKind>,

    /// Bass rhythm: quarter, eighth or syncopated
    #[arg(long)]
    bass_pattern: Option<BassPattern>,

    /// Arpeggio order: up, down or up-down
    #[arg(long)]
    arp_direction: Option<ArpDirection>,

    /// Octave of the accompaniment register (2-5)
    #[arg(short, long, allow_hyphen_values = true)]
    octave: Option<i64>,

    /// Accompaniment velocity (20-120)
    #[arg(long, allow_hyphen_values = true)]
    velocity: Option<i64>,

    /// Minimum beats a chord is held before it may change (0.25-4)
    #[arg(long, allow_hyphen_values = true)]
    min_hold_beats: Option<f64>,

    /// MIDI channel for the accompaniment (0-15)
    #[arg(short, long)]
    channel: Option<u8>,
}

impl GenerationArgs {
    fn apply(&self, config: &mut ComperConfig) {
        let g = &mut config.generation;
        g.style = self.style.or(g.style);
        g.bass_pattern = self.bass_pattern.or(g.bass_pattern);
        g.arp_direction = self.arp_direction.or(g.arp_direction);
        g.target_octave = self.octave.or(g.target_octave);
        g.velocity = self.velocity.or(g.velocity);
        g.min_hold_beats = self.min_hold_beats.or(g.min_hold_beats);
        config.export.channel = self.channel.or(config.export.channel);
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let (mut config, sources) = ComperConfig::load_from(cli.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level())),
        )
        .with_writer(std::io::stderr)
        .init();

    debug!(
        files = ?sources.files,
        env_overrides = ?sources.env_overrides,
        "loaded config"
    );

    match cli.command {
        Commands::Generate {
            input,
            output,
            generation,
        } => {
            generation.apply(&mut config);
            generate(&input, &output, &config)
        }
        Commands::Grid {
            grid,
            output,
            generation,
        } => {
            generation.apply(&mut config);
            grid_to_midi(&grid, &output, &config)
        }
        Commands::Analyze {
            input,
            json,
            generation,
        } => {
            generation.apply(&mut config);
            analyze(&input, json, &config)
        }
    }
}

fn read_midi(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

fn parse_midi<'a>(bytes: &'a [u8], path: &Path) -> Result<Smf<'a>> {
    Smf::parse(bytes).with_context(|| format!("failed to parse MIDI file {}", path.display()))
}

fn run_generation(melody: &NoteSequence, config: &ComperConfig) -> Accompaniment {
    let generation = config
        .generation_settings()
        .into_config(melody.ticks_per_beat);
    generate_accompaniment(&melody.notes, &generation)
}

fn no_melody() -> ExitCode {
    eprintln!("No melody notes found.");
    ExitCode::FAILURE
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<ExitCode> {
    std::fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), bytes = bytes.len(), "wrote MIDI file");
    println!("Wrote {} with accompaniment track.", path.display());
    Ok(ExitCode::SUCCESS)
}

fn generate(input: &Path, output: &Path, config: &ComperConfig) -> Result<ExitCode> {
    let bytes = read_midi(input)?;
    let smf = parse_midi(&bytes, input)?;

    let melody = melody_from_smf(&smf);
    if melody.is_empty() {
        return Ok(no_melody());
    }

    let result = run_generation(&melody, config);
    let out = append_accompaniment(&smf, &result.notes, &config.export_options())?;
    write_output(output, &out)
}

fn grid_to_midi(grid_path: &Path, output: &Path, config: &ComperConfig) -> Result<ExitCode> {
    let melody = grid::load_grid(grid_path)?;
    if melody.is_empty() {
        return Ok(no_melody());
    }

    let result = run_generation(&melody, config);
    let out = sequence_to_midi(&melody, &result.notes, &config.export_options())?;
    write_output(output, &out)
}

/// What `analyze` prints: the generation summary plus the track count
/// `generate` would write for the same input.
#[derive(Debug, Serialize)]
struct Report {
    #[serde(flatten)]
    summary: Summary,
    output_tracks: usize,
}

fn analyze(input: &Path, json: bool, config: &ComperConfig) -> Result<ExitCode> {
    let bytes = read_midi(input)?;
    let smf = parse_midi(&bytes, input)?;

    let melody = melody_from_smf(&smf);
    if melody.is_empty() {
        return Ok(no_melody());
    }

    let report = Report {
        summary: run_generation(&melody, config).summary(),
        output_tracks: smf.tracks.len() + 1,
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let summary = &report.summary;
        println!("Key: {} {}", summary.tonic_name, summary.mode);
        println!("Tracks: {}", report.output_tracks);
        println!("Melody notes: {}", summary.melody_notes);
        println!("Accompaniment notes: {}", summary.accompaniment_notes);
        println!("Chord changes: {}", summary.chord_changes);
        println!("Progression: {}", summary.progression.join(" "));
    }

    Ok(ExitCode::SUCCESS)
}
