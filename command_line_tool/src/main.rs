mod stack_io;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colocalization::synthetic::colocalized_spot_fields;
use colocalization::{
    ColocalizationPipeline, NeighborSearch, PipelineConfig, PixelSize, SegmentationMethod,
};
use flexi_logger::Logger;
use log::info;

use crate::stack_io::{load_channel, save_intensity, save_labels, write_json_file};

/// Command line arguments structure.
#[derive(Parser, Debug)]
#[command(author, version, about = "CLI for 3D spot segmentation and cross-channel colocalization.")]
struct Cli {
    /// Log level filter, e.g. "info", "debug" or "colocalization=debug"
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Segment every channel and measure distances between their spots.
    Analyze(AnalyzeArgs),
    /// Write synthetic colocalized z-stacks.
    Simulate(SimulateArgs),
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Directory of z-slices for one channel; repeat once per channel
    #[arg(long = "channel", required = true)]
    channels: Vec<PathBuf>,

    /// JSON pipeline configuration; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Physical voxel size along x, y and z
    #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"])]
    pixel_size: Option<Vec<f64>>,

    /// Segmentation method: hysteresis or local_max
    #[arg(long)]
    method: Option<SegmentationMethod>,

    /// Closing cube side and minimum peak separation, in voxels
    #[arg(long)]
    min_distance: Option<usize>,

    /// Gaussian pre-filter sigma in voxels
    #[arg(long)]
    smoothing_sigma: Option<f64>,

    /// Largest reported distance, in physical units
    #[arg(long)]
    distance_cutoff: Option<f64>,

    /// Use a k-d tree for the nearest-neighbor search
    #[arg(long)]
    kd_tree: bool,

    /// Output file for the JSON result; printed to stdout when absent
    #[arg(long)]
    output: Option<PathBuf>,

    /// Optionally write every channel's label volume as 16-bit PNG slices
    #[arg(long)]
    labels_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct SimulateArgs {
    /// Output directory; one sub-directory per channel is created
    #[arg(long)]
    output_dir: PathBuf,

    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Spots per channel
    #[arg(long, default_value_t = 20)]
    spots: usize,

    #[arg(long, default_value_t = 2)]
    channels: usize,

    /// Volume shape as Z Y X
    #[arg(long, num_args = 3, value_names = ["Z", "Y", "X"], default_values_t = [16, 64, 64])]
    size: Vec<usize>,

    /// Largest per-axis displacement of a spot between channels, in voxels
    #[arg(long, default_value_t = 1.0)]
    jitter: f64,
}

fn load_config(args: &AnalyzeArgs) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("failed to parse {}", path.display()))?
        }
        None => PipelineConfig::default(),
    };

    if let Some(size) = &args.pixel_size {
        config.pixel_size = Some(PixelSize::new(size[0], size[1], size[2])?);
    }
    if let Some(method) = args.method {
        config.segmentation.method = method;
    }
    if let Some(min_distance) = args.min_distance {
        config.segmentation.min_distance = min_distance;
    }
    if args.smoothing_sigma.is_some() {
        config.segmentation.smoothing_sigma = args.smoothing_sigma;
    }
    if let Some(cutoff) = args.distance_cutoff {
        config.matching.distance_cutoff = cutoff;
    }
    if args.kd_tree {
        config.matching.search = NeighborSearch::KdTree;
    }
    Ok(config)
}

fn analyze(args: AnalyzeArgs) -> Result<()> {
    let config = load_config(&args)?;
    let pipeline = ColocalizationPipeline::new(config)?;

    let volumes = args
        .channels
        .iter()
        .map(|dir| load_channel(dir))
        .collect::<Result<Vec<_>>>()?;
    info!(
        "loaded {} channels of shape {:?}",
        volumes.len(),
        volumes.first().map(|v| v.shape())
    );

    let result = pipeline.run(&volumes)?;

    if let Some(dir) = &args.labels_dir {
        for channel in &result.channels {
            save_labels(&channel.labels, dir, &format!("labels_c{}", channel.channel))?;
        }
        info!("label slices written to {}", dir.display());
    }

    match &args.output {
        Some(path) => {
            write_json_file(&result, path)?;
            println!("Result written to {}", path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&result)?),
    }
    Ok(())
}

fn simulate(args: SimulateArgs) -> Result<()> {
    let shape = (args.size[0], args.size[1], args.size[2]);
    let fields = colocalized_spot_fields(args.channels, args.spots, shape, args.jitter, args.seed);
    for (channel, field) in fields.iter().enumerate() {
        let volume = field.render(shape, args.seed.wrapping_add(channel as u64));
        let dir = channel_dir(&args.output_dir, channel);
        save_intensity(&volume, &dir, "slice")?;
        info!("channel {channel}: {} spots written to {}", field.centers.len(), dir.display());
    }
    println!(
        "{} channels of shape {:?} written to {}",
        fields.len(),
        shape,
        args.output_dir.display()
    );
    Ok(())
}

fn channel_dir(root: &Path, channel: usize) -> PathBuf {
    root.join(format!("c{channel}"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let _logger = Logger::try_with_str(&cli.log_level)
        .with_context(|| format!("invalid log level '{}'", cli.log_level))?
        .log_to_stderr()
        .start()?;

    match cli.command {
        Command::Analyze(args) => analyze(args),
        Command::Simulate(args) => simulate(args),
    }
}
