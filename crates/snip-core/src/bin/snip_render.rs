//! snip-render - headless slicing and export
//!
//! Decodes a WAV file, slices it, prints the regions with a coarse envelope
//! per region and exports one region as a content-addressed WAV.
//!
//! ## Usage
//!
//! ```text
//! snip-render <input.wav> <out-dir> [--config file.yaml] [--slice p]... [--region i]
//! ```
//!
//! `<out-dir>` may be left out when the config sets `export.output_dir`.
//!
//! Set `RUST_LOG=debug` for per-stage timings.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use snip_core::audio_file::WavDecoder;
use snip_core::config::{default_config_path, load_config, SnipConfig};
use snip_core::waveform::{compute_envelope, TileOutcome};
use snip_core::Session;

/// Envelope buckets printed per region
const SUMMARY_BUCKETS: usize = 16;

const USAGE: &str = "usage: snip-render <input.wav> <out-dir> [--config file.yaml] [--slice p]... [--region i]";

struct Args {
    input: PathBuf,
    out_dir: Option<PathBuf>,
    config: Option<PathBuf>,
    slices: Vec<f64>,
    region: usize,
}

fn parse_args() -> Result<Args> {
    let mut positional = Vec::new();
    let mut config = None;
    let mut slices = Vec::new();
    let mut region = 0;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                config = Some(PathBuf::from(args.next().context("--config needs a path")?));
            }
            "--slice" => {
                let value = args.next().context("--slice needs a position")?;
                slices.push(value.parse().with_context(|| format!("Invalid slice position: {}", value))?);
            }
            "--region" => {
                let value = args.next().context("--region needs an index")?;
                region = value.parse().with_context(|| format!("Invalid region index: {}", value))?;
            }
            "-h" | "--help" => {
                println!("{}", USAGE);
                std::process::exit(0);
            }
            _ if arg.starts_with("--") => bail!("Unknown flag {}\n{}", arg, USAGE),
            _ => positional.push(PathBuf::from(arg)),
        }
    }

    let mut positional = positional.into_iter();
    let (Some(input), out_dir, None) = (positional.next(), positional.next(), positional.next()) else {
        bail!("Expected an input file and an output directory\n{}", USAGE);
    };

    Ok(Args {
        input,
        out_dir,
        config,
        slices,
        region,
    })
}

/// Draw an envelope as one row of block characters
fn sparkline(envelope: &[(f32, f32)]) -> String {
    const LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
    envelope
        .iter()
        .map(|&(min, max)| {
            let peak = min.abs().max(max.abs()).min(1.0);
            LEVELS[((peak * (LEVELS.len() - 1) as f32).round() as usize).min(LEVELS.len() - 1)]
        })
        .collect()
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = parse_args()?;

    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let config: SnipConfig = load_config(&config_path);

    let mut session = Session::new(config).context("Failed to start session")?;
    session
        .load_file(&WavDecoder, &args.input)
        .with_context(|| format!("Failed to load {:?}", args.input))?;

    for position in &args.slices {
        if session.slice(*position)?.is_none() {
            log::warn!("Slice at {} ignored (duplicate or outside [0, 1))", position);
        }
    }

    // Warm the waveform pool with the first tile, the way a view would
    if session.tile_count() > 0 {
        let ticket = session.request_tile(0, 0, 0)?;
        if let TileOutcome::Failed(e) = session.wait_envelope(ticket) {
            log::warn!("First waveform tile failed: {}", e);
        }
    }

    let Some(clip) = session.clip().cloned() else {
        bail!("No clip loaded");
    };
    println!("{}: {} ch, {} Hz, {:.3} s", clip.name(), clip.num_channels(), clip.sample_rate(), clip.duration_secs());

    for (index, region) in session.regions().iter().enumerate() {
        let frames = clip.region_frames(region);
        let summary = clip
            .channel(0)
            .map(|samples| sparkline(&compute_envelope(&samples[frames.clone()], SUMMARY_BUCKETS)))
            .unwrap_or_default();
        let marker = if index == args.region { '*' } else { ' ' };
        println!(
            "{} [{:2}] {:.4} - {:.4}  {:>9} frames  {}",
            marker,
            index,
            region.start,
            region.end,
            frames.len(),
            summary
        );
    }

    let Some(out_dir) = args.out_dir.or_else(|| session.config().export.output_dir.clone()) else {
        bail!("No output directory given and none configured\n{}", USAGE);
    };
    let file = session
        .export(args.region, None)
        .with_context(|| format!("Cannot export region {}", args.region))?
        .wait()
        .context("Export failed")?;
    let path = file.write_to(&out_dir).with_context(|| format!("Failed to write into {:?}", out_dir))?;

    println!("{}", file.name);
    log::info!("Wrote {} frames to {:?}", file.frames, path);

    session.teardown();
    Ok(())
}
